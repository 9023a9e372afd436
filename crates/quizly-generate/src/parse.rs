use serde::Deserialize;

use quizly_core::Question;

/// The provider's wire shape: answers are repeated verbatim among the
/// options rather than sent as an index.
#[derive(Debug, Deserialize)]
pub struct RawQuiz {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub questions: Vec<RawQuestion>,
}

#[derive(Debug, Deserialize)]
pub struct RawQuestion {
    #[serde(default)]
    pub question_title: String,
    #[serde(default)]
    pub question_options: Vec<String>,
    #[serde(default)]
    pub answer: String,
}

/// Parse the raw provider response into a `RawQuiz`.
///
/// Providers asked for "JSON only" still wrap the payload in a markdown
/// fence often enough that we strip one before parsing.
pub fn parse_quiz_payload(raw: &str) -> Result<RawQuiz, String> {
    let body = strip_code_fence(raw.trim());
    serde_json::from_str(body).map_err(|e| e.to_string())
}

/// Map one raw question to the internal model by locating the answer
/// string among the options. Returns None when the answer is absent, which
/// counts as an invalid question for the validation pass.
pub fn map_question(raw: &RawQuestion) -> Option<Question> {
    let correct_index = raw
        .question_options
        .iter()
        .position(|o| o == &raw.answer)?;
    Some(Question {
        prompt: raw.question_title.clone(),
        candidates: raw.question_options.clone(),
        correct_index,
        explanation: None,
    })
}

fn strip_code_fence(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    // Drop the info string ("json") up to the first newline.
    let rest = match rest.find('\n') {
        Some(i) => &rest[i + 1..],
        None => rest,
    };
    rest.strip_suffix("```").map(str::trim).unwrap_or(s)
}
