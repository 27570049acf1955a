use crate::types::AnswerSpan;

/// Numerically stable softmax over one score row.
pub fn softmax(scores: &[f32]) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }

    let max_score = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f64> = scores
        .iter()
        .map(|&x| ((x - max_score) as f64).exp())
        .collect();
    let denom: f64 = exps.iter().sum();
    if denom <= 0.0 || !denom.is_finite() {
        return vec![0.0; scores.len()];
    }
    exps.iter().map(|&e| (e / denom) as f32).collect()
}

/// Probability of an already-chosen span: softmax of the start scores at the
/// start boundary times softmax of the end scores at the last answer token.
/// Reporting only; never feeds back into span selection. `None` for empty or
/// out-of-range spans.
pub fn span_confidence(
    start_scores: &[f32],
    end_scores: &[f32],
    span: &AnswerSpan,
) -> Option<f32> {
    if span.is_empty() {
        return None;
    }
    if span.start >= start_scores.len() || span.end > end_scores.len() {
        return None;
    }

    let p_start = softmax(start_scores)[span.start];
    let p_end = softmax(end_scores)[span.end - 1];
    Some(p_start * p_end)
}
