use crate::error::QaError;
use crate::extraction::scoring::span_confidence;
use crate::pipeline::traits::{QaTokenizer, RuntimeBackend, SpanExtractor};
use crate::types::{QaAnswer, QaInput};

pub struct QaPipeline {
    runtime_backend: Box<dyn RuntimeBackend>,
    tokenizer: Box<dyn QaTokenizer>,
    span_extractor: Box<dyn SpanExtractor>,
    max_seq_len: usize,
}

pub(crate) struct QaPipelineParts {
    pub runtime_backend: Box<dyn RuntimeBackend>,
    pub tokenizer: Box<dyn QaTokenizer>,
    pub span_extractor: Box<dyn SpanExtractor>,
    pub max_seq_len: usize,
}

impl QaPipeline {
    pub(crate) fn from_parts(parts: QaPipelineParts) -> Self {
        Self {
            runtime_backend: parts.runtime_backend,
            tokenizer: parts.tokenizer,
            span_extractor: parts.span_extractor,
            max_seq_len: parts.max_seq_len,
        }
    }

    pub fn max_seq_len(&self) -> usize {
        self.max_seq_len
    }

    pub fn device_label(&self) -> String {
        self.runtime_backend.device_label()
    }

    /// Answer one question against one context. Pure per-query: nothing is
    /// retained between calls.
    pub fn answer(&self, input: &QaInput) -> Result<QaAnswer, QaError> {
        if input.question.trim().is_empty() {
            return Err(QaError::invalid_input("question is empty"));
        }
        if input.context.trim().is_empty() {
            return Err(QaError::invalid_input("context is empty"));
        }

        let encoding = self.tokenizer.encode(&input.question, &input.context)?;
        let seq_len = encoding.input_ids.len();
        if seq_len == 0 {
            return Err(QaError::invalid_input("tokenizer produced no tokens"));
        }
        if encoding.attention_mask.len() != seq_len || encoding.token_type_ids.len() != seq_len {
            return Err(QaError::invalid_input(format!(
                "encoding sequences are not paired 1:1: ids={}, mask={}, type_ids={}",
                seq_len,
                encoding.attention_mask.len(),
                encoding.token_type_ids.len()
            )));
        }

        let scores = self.runtime_backend.infer(&encoding)?;
        if scores.start_logits.len() != seq_len || scores.end_logits.len() != seq_len {
            return Err(QaError::invalid_input(format!(
                "score sequences do not match the {seq_len}-token input: start={}, end={}",
                scores.start_logits.len(),
                scores.end_logits.len()
            )));
        }

        let span = self
            .span_extractor
            .extract(&scores.start_logits, &scores.end_logits)?;
        if span.is_empty() {
            tracing::debug!(
                start = span.start,
                end = span.end,
                "end peak at or before start peak; returning empty answer"
            );
        }

        let answer_ids = span.token_slice(&encoding.input_ids);
        let text = self.tokenizer.decode(answer_ids)?;
        let confidence = span_confidence(&scores.start_logits, &scores.end_logits, &span);

        tracing::debug!(
            start = span.start,
            end = span.end,
            confidence,
            dtype = %scores.dtype,
            "decoded answer span"
        );

        Ok(QaAnswer {
            text: text.trim().to_string(),
            span,
            confidence,
        })
    }
}
