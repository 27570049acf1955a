use std::path::Path;

use tokenizers::{PaddingParams, PaddingStrategy, TruncationParams, TruncationStrategy};

use crate::error::QaError;
use crate::extraction::span::extract_answer_span;
use crate::pipeline::traits::{QaTokenizer, SpanExtractor};
use crate::types::{AnswerSpan, TokenizedInput};

/// WordPiece tokenizer loaded from a HF `tokenizer.json`, configured for QA:
/// every encoding is padded to a fixed length and only the context half is
/// truncated, so the question always survives intact.
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
}

impl HfTokenizer {
    pub fn from_file(path: &Path, max_seq_len: usize) -> Result<Self, QaError> {
        let mut inner = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| QaError::runtime("load tokenizer.json", e))?;

        let pad_id = inner.token_to_id("[PAD]").unwrap_or(0);
        inner.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::Fixed(max_seq_len),
            pad_id,
            pad_token: "[PAD]".to_string(),
            ..PaddingParams::default()
        }));
        inner
            .with_truncation(Some(TruncationParams {
                max_length: max_seq_len,
                strategy: TruncationStrategy::OnlySecond,
                ..TruncationParams::default()
            }))
            .map_err(|e| QaError::runtime("configure truncation", e))?;

        Ok(Self { inner })
    }
}

impl QaTokenizer for HfTokenizer {
    fn encode(&self, question: &str, context: &str) -> Result<TokenizedInput, QaError> {
        let encoding = self
            .inner
            .encode((question, context), true)
            .map_err(|e| QaError::runtime("tokenize", e))?;

        Ok(TokenizedInput {
            input_ids: encoding.get_ids().to_vec(),
            attention_mask: encoding.get_attention_mask().to_vec(),
            token_type_ids: encoding.get_type_ids().to_vec(),
        })
    }

    fn decode(&self, token_ids: &[u32]) -> Result<String, QaError> {
        if token_ids.is_empty() {
            return Ok(String::new());
        }
        self.inner
            .decode(token_ids, true)
            .map_err(|e| QaError::runtime("detokenize", e))
    }
}

pub struct ArgmaxSpanExtractor;

impl SpanExtractor for ArgmaxSpanExtractor {
    fn extract(&self, start_scores: &[f32], end_scores: &[f32]) -> Result<AnswerSpan, QaError> {
        extract_answer_span(start_scores, end_scores)
    }
}
