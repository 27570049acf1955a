use std::path::Path;

use crate::error::QaError;

#[derive(Debug, Clone)]
pub struct BertQaConfig {
    pub model_path: String,
    pub config_path: String,
    pub tokenizer_path: String,
    pub device: String,
    pub max_seq_len: usize,
}

impl BertQaConfig {
    pub const DEFAULT_MAX_SEQ_LEN: usize = 384;
}

impl Default for BertQaConfig {
    fn default() -> Self {
        Self {
            model_path: String::new(),
            config_path: String::new(),
            tokenizer_path: String::new(),
            device: "cpu".to_string(),
            max_seq_len: Self::DEFAULT_MAX_SEQ_LEN,
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub(crate) struct BertModelConfig {
    pub vocab_size: usize,
    pub hidden_size: usize,
    pub num_hidden_layers: usize,
    pub num_attention_heads: usize,
    pub intermediate_size: usize,
    pub max_position_embeddings: usize,
    #[serde(default = "default_type_vocab_size")]
    pub type_vocab_size: usize,
    #[serde(default = "default_eps")]
    pub layer_norm_eps: f64,
    #[serde(default)]
    pub pad_token_id: usize,
    #[serde(default)]
    pub hidden_act: HiddenAct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum HiddenAct {
    #[default]
    Gelu,
    #[serde(alias = "gelu_pytorch_tanh")]
    GeluNew,
}

fn default_eps() -> f64 {
    1e-12
}
fn default_type_vocab_size() -> usize {
    2
}

impl BertModelConfig {
    pub(crate) fn load(path: &Path) -> Result<Self, QaError> {
        let data =
            std::fs::read_to_string(path).map_err(|e| QaError::io("read config.json", e))?;
        serde_json::from_str(&data).map_err(|e| QaError::json("parse config.json", e))
    }

    pub(crate) fn head_dim(&self) -> usize {
        self.hidden_size / self.num_attention_heads
    }
}
