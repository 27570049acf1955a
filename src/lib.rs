pub mod config;
pub mod error;
pub mod extraction;
mod model;
pub mod pipeline;
pub mod types;

pub use config::BertQaConfig;
pub use error::QaError;
pub use pipeline::builder::QaPipelineBuilder;
pub use pipeline::runtime::QaPipeline;
pub use pipeline::traits::{QaTokenizer, RuntimeBackend, RuntimeKind, SpanExtractor};
pub use types::{AnswerSpan, QaAnswer, QaInput, TokenizedInput};
