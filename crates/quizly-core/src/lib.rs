pub mod error;
pub mod question;
pub mod types;
pub mod video;

pub use error::{ProviderFailure, QuestionInvalid};
pub use question::{Question, MAX_CANDIDATES, MIN_CANDIDATES};
pub use types::*;
pub use video::{is_youtube_url, youtube_video_id, VideoReference};
