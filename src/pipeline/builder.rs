use std::path::Path;

use crate::config::{BertModelConfig, BertQaConfig};
use crate::error::QaError;
use crate::pipeline::defaults::{ArgmaxSpanExtractor, HfTokenizer};
use crate::pipeline::model_runtime::build_runtime_backend;
use crate::pipeline::runtime::{QaPipeline, QaPipelineParts};
use crate::pipeline::traits::{QaTokenizer, RuntimeBackend, RuntimeKind, SpanExtractor};

pub struct QaPipelineBuilder {
    config: BertQaConfig,
    runtime_kind: RuntimeKind,
    runtime_backend: Option<Box<dyn RuntimeBackend>>,
    tokenizer: Option<Box<dyn QaTokenizer>>,
    span_extractor: Option<Box<dyn SpanExtractor>>,
}

impl QaPipelineBuilder {
    pub fn new(config: BertQaConfig) -> Self {
        Self {
            config,
            runtime_kind: RuntimeKind::Candle,
            runtime_backend: None,
            tokenizer: None,
            span_extractor: None,
        }
    }

    pub fn with_runtime_kind(mut self, runtime_kind: RuntimeKind) -> Self {
        self.runtime_kind = runtime_kind;
        self
    }

    pub fn with_runtime_backend(mut self, runtime_backend: Box<dyn RuntimeBackend>) -> Self {
        self.runtime_backend = Some(runtime_backend);
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: Box<dyn QaTokenizer>) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    pub fn with_span_extractor(mut self, span_extractor: Box<dyn SpanExtractor>) -> Self {
        self.span_extractor = Some(span_extractor);
        self
    }

    pub fn build(self) -> Result<QaPipeline, QaError> {
        let model_cfg = BertModelConfig::load(Path::new(&self.config.config_path))?;

        let mut max_seq_len = if self.config.max_seq_len == 0 {
            BertQaConfig::DEFAULT_MAX_SEQ_LEN
        } else {
            self.config.max_seq_len
        };
        if max_seq_len > model_cfg.max_position_embeddings {
            tracing::warn!(
                requested = max_seq_len,
                max_position_embeddings = model_cfg.max_position_embeddings,
                "max_seq_len exceeds the model's position table; clamping"
            );
            max_seq_len = model_cfg.max_position_embeddings;
        }

        let runtime_backend = if let Some(runtime_backend) = self.runtime_backend {
            runtime_backend
        } else {
            build_runtime_backend(self.runtime_kind, &self.config, &model_cfg)?
        };

        let tokenizer: Box<dyn QaTokenizer> = if let Some(tokenizer) = self.tokenizer {
            tokenizer
        } else {
            Box::new(HfTokenizer::from_file(
                Path::new(&self.config.tokenizer_path),
                max_seq_len,
            )?)
        };

        Ok(QaPipeline::from_parts(QaPipelineParts {
            runtime_backend,
            tokenizer,
            span_extractor: self
                .span_extractor
                .unwrap_or_else(|| Box::new(ArgmaxSpanExtractor)),
            max_seq_len,
        }))
    }
}
