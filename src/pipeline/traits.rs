use crate::error::QaError;
use crate::types::{AnswerSpan, TokenizedInput};

/// Encodes a (question, context) pair and decodes token-id slices back to
/// text. Decoding strips special/control tokens.
pub trait QaTokenizer: Send + Sync {
    fn encode(&self, question: &str, context: &str) -> Result<TokenizedInput, QaError>;

    fn decode(&self, token_ids: &[u32]) -> Result<String, QaError>;
}

/// Selects the answer span from per-position start/end scores.
pub trait SpanExtractor: Send + Sync {
    fn extract(&self, start_scores: &[f32], end_scores: &[f32]) -> Result<AnswerSpan, QaError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeKind {
    Candle,
    Onnx,
}

/// Host-side scores for one query. Both sequences have length `seq_len`,
/// matching the tokenized input positionally.
#[derive(Debug, Clone)]
pub struct RuntimeInferenceOutput {
    pub start_logits: Vec<f32>,
    pub end_logits: Vec<f32>,
    pub seq_len: usize,
    pub dtype: String,
}

/// An inference engine producing start/end scores for a tokenized input.
/// Direct model execution and the optimized ONNX runtime sit behind the same
/// contract and must be numerically compatible on the same input shape.
pub trait RuntimeBackend: Send + Sync {
    fn infer(&self, encoding: &TokenizedInput) -> Result<RuntimeInferenceOutput, QaError>;

    fn device_label(&self) -> String;
}
