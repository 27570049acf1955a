use crate::error::QaError;
use crate::types::AnswerSpan;

/// Index of the maximum value. Ties resolve to the lowest index.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best = *scores.first()?;
    let mut best_idx = 0usize;
    for (idx, &score) in scores.iter().enumerate().skip(1) {
        if score > best {
            best = score;
            best_idx = idx;
        }
    }
    Some(best_idx)
}

/// Decode the answer span from per-position start/end scores.
///
/// The start boundary is the argmax of `start_scores`. The end score peaks at
/// the last token *of* the answer, so the exclusive upper bound is
/// `argmax(end_scores) + 1`. Each boundary is chosen independently; there is
/// no joint scoring, no candidate re-ranking, and no answer-length cap.
///
/// `end <= start` is not rejected: when the end peak lands at or before the
/// start peak the returned span is empty and decodes to an empty string.
pub fn extract_answer_span(
    start_scores: &[f32],
    end_scores: &[f32],
) -> Result<AnswerSpan, QaError> {
    if start_scores.is_empty() || end_scores.is_empty() {
        return Err(QaError::invalid_input("span scores must be non-empty"));
    }
    if start_scores.len() != end_scores.len() {
        return Err(QaError::invalid_input(format!(
            "span score lengths differ: start={}, end={}",
            start_scores.len(),
            end_scores.len()
        )));
    }

    let start = argmax(start_scores)
        .ok_or_else(|| QaError::invalid_input("start scores must be non-empty"))?;
    let end = argmax(end_scores)
        .ok_or_else(|| QaError::invalid_input("end scores must be non-empty"))?
        + 1;

    Ok(AnswerSpan { start, end })
}
