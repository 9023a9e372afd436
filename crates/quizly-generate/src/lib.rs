//! Quiz generation: turn a transcript into a validated quiz via an
//! external text-generation provider.
//!
//! The provider is non-deterministic, so generation is a validate-then-
//! retry loop with a bounded attempt count. Post-validation is mandatory
//! and deterministic and never delegated upstream: malformed questions are
//! dropped, and if too few survive the whole attempt fails rather than
//! returning a partially-empty quiz.

pub mod cli_provider;
pub mod generator;
pub mod parse;
pub mod prompt;
pub mod provider;
pub mod validate;

pub use cli_provider::CliTextGenerator;
pub use generator::{GenerateConfig, GenerateError, Generator};
pub use provider::{MockTextGenerator, TextGenerator};
