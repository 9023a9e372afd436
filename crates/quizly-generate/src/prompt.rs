use quizly_core::Transcript;

/// Build the strict JSON-only generation prompt.
///
/// The provider is asked for the original wire shape: a `questions` array
/// of `{question_title, question_options, answer}` where `answer` repeats
/// one of the options verbatim.
pub fn quiz_prompt(transcript: &Transcript, question_count: usize, candidate_count: usize) -> String {
    format!(
        "Generate a quiz JSON with exactly {question_count} questions, each with \
         {candidate_count} options.\n\
         Fields: title, description, questions:[{{question_title, \
         question_options:[...], answer(one of the options, verbatim)}}].\n\
         Base it ONLY on this transcript:\n\
         {}\n\
         Respond with JSON only, no prose.",
        transcript.text
    )
}
