use candle_core::{DType, Module, Tensor};
use candle_nn::{Linear, VarBuilder};

use crate::config::BertModelConfig;
use crate::model::embeddings::BertEmbeddings;
use crate::model::encoder::Encoder;

pub(crate) struct BertForQuestionAnswering {
    embeddings: BertEmbeddings,
    encoder: Encoder,
    qa_outputs: Linear,
}

impl BertForQuestionAnswering {
    pub(crate) fn load(cfg: &BertModelConfig, vb: VarBuilder) -> candle_core::Result<Self> {
        let b = vb.pp("bert");
        Ok(Self {
            embeddings: BertEmbeddings::load(cfg, b.pp("embeddings"))?,
            encoder: Encoder::load(cfg, b.pp("encoder"))?,
            qa_outputs: candle_nn::linear(cfg.hidden_size, 2, vb.pp("qa_outputs"))?,
        })
    }

    /// Returns `(start_logits, end_logits)`, each of shape `(batch, seq_len)`.
    pub(crate) fn forward(
        &self,
        input_ids: &Tensor,
        token_type_ids: &Tensor,
        attention_mask: &Tensor,
    ) -> candle_core::Result<(Tensor, Tensor)> {
        let bias = attention_bias(attention_mask)?;
        let h = self.embeddings.forward(input_ids, token_type_ids)?;
        let h = self.encoder.forward(&h, Some(&bias))?;

        let logits = self.qa_outputs.forward(&h)?;
        let start = logits.narrow(2, 0, 1)?.squeeze(2)?;
        let end = logits.narrow(2, 1, 1)?.squeeze(2)?;
        Ok((start, end))
    }
}

/// `(batch, seq_len)` {0,1} mask -> `(batch, 1, 1, seq_len)` additive bias:
/// 0 at real tokens, -1e4 at padding. Finite on purpose so a fully masked
/// row still softmaxes without NaN.
fn attention_bias(attention_mask: &Tensor) -> candle_core::Result<Tensor> {
    attention_mask
        .to_dtype(DType::F32)?
        .unsqueeze(1)?
        .unsqueeze(1)?
        .affine(10_000.0, -10_000.0)
}
