use candle_core::{Module, Tensor, D};
use candle_nn::{LayerNorm, Linear, VarBuilder};

use crate::config::{BertModelConfig, HiddenAct};

struct SelfAttention {
    q: Linear,
    k: Linear,
    v: Linear,
    out: Linear,
    num_heads: usize,
    head_dim: usize,
    scale: f64,
}

impl SelfAttention {
    fn load(cfg: &BertModelConfig, vb: VarBuilder) -> candle_core::Result<Self> {
        let hd = cfg.head_dim();
        let self_vb = vb.pp("self");
        Ok(Self {
            q: candle_nn::linear(cfg.hidden_size, cfg.hidden_size, self_vb.pp("query"))?,
            k: candle_nn::linear(cfg.hidden_size, cfg.hidden_size, self_vb.pp("key"))?,
            v: candle_nn::linear(cfg.hidden_size, cfg.hidden_size, self_vb.pp("value"))?,
            out: candle_nn::linear(
                cfg.hidden_size,
                cfg.hidden_size,
                vb.pp("output").pp("dense"),
            )?,
            num_heads: cfg.num_attention_heads,
            head_dim: hd,
            scale: (hd as f64).powf(-0.5),
        })
    }

    fn forward(&self, xs: &Tensor, bias: Option<&Tensor>) -> candle_core::Result<Tensor> {
        let (b, t, _) = xs.dims3()?;
        let reshape = |x: Tensor| {
            x.reshape((b, t, self.num_heads, self.head_dim))?
                .transpose(1, 2)?
                .contiguous()
        };

        let q = reshape((self.q.forward(xs)? * self.scale)?)?;
        let k = reshape(self.k.forward(xs)?)?;
        let v = reshape(self.v.forward(xs)?)?;

        let mut scores = q.matmul(&k.transpose(2, 3)?.contiguous()?)?;
        if let Some(bias) = bias {
            scores = scores.broadcast_add(bias)?;
        }
        let attn = candle_nn::ops::softmax(&scores, D::Minus1)?;
        let out = attn.matmul(&v)?.transpose(1, 2)?.contiguous()?.reshape((
            b,
            t,
            self.num_heads * self.head_dim,
        ))?;
        self.out.forward(&out)
    }
}

struct FeedForward {
    up: Linear,
    down: Linear,
    act: HiddenAct,
}

impl FeedForward {
    fn load(cfg: &BertModelConfig, vb: VarBuilder) -> candle_core::Result<Self> {
        Ok(Self {
            up: candle_nn::linear(
                cfg.hidden_size,
                cfg.intermediate_size,
                vb.pp("intermediate").pp("dense"),
            )?,
            down: candle_nn::linear(
                cfg.intermediate_size,
                cfg.hidden_size,
                vb.pp("output").pp("dense"),
            )?,
            act: cfg.hidden_act,
        })
    }

    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let h = self.up.forward(xs)?;
        let h = match self.act {
            // BERT checkpoints use the exact (erf) gelu.
            HiddenAct::Gelu => h.gelu_erf()?,
            HiddenAct::GeluNew => h.gelu()?,
        };
        self.down.forward(&h)
    }
}

struct EncoderLayer {
    attn: SelfAttention,
    attn_ln: LayerNorm,
    ff: FeedForward,
    out_ln: LayerNorm,
}

impl EncoderLayer {
    fn load(cfg: &BertModelConfig, vb: VarBuilder) -> candle_core::Result<Self> {
        Ok(Self {
            attn: SelfAttention::load(cfg, vb.pp("attention"))?,
            attn_ln: candle_nn::layer_norm(
                cfg.hidden_size,
                cfg.layer_norm_eps,
                vb.pp("attention").pp("output").pp("LayerNorm"),
            )?,
            ff: FeedForward::load(cfg, vb.clone())?,
            out_ln: candle_nn::layer_norm(
                cfg.hidden_size,
                cfg.layer_norm_eps,
                vb.pp("output").pp("LayerNorm"),
            )?,
        })
    }

    fn forward(&self, xs: &Tensor, bias: Option<&Tensor>) -> candle_core::Result<Tensor> {
        // Post-norm residual blocks:
        //   h = ln1(x + attn(x))
        //   y = ln2(h + ff(h))
        let h = self.attn_ln.forward(&(xs + self.attn.forward(xs, bias)?)?)?;
        self.out_ln.forward(&(&h + self.ff.forward(&h)?)?)
    }
}

pub(crate) struct Encoder {
    layers: Vec<EncoderLayer>,
}

impl Encoder {
    pub(crate) fn load(cfg: &BertModelConfig, vb: VarBuilder) -> candle_core::Result<Self> {
        let mut layers = Vec::with_capacity(cfg.num_hidden_layers);
        for i in 0..cfg.num_hidden_layers {
            layers.push(EncoderLayer::load(cfg, vb.pp(format!("layer.{i}")))?);
        }
        Ok(Self { layers })
    }

    pub(crate) fn forward(
        &self,
        xs: &Tensor,
        bias: Option<&Tensor>,
    ) -> candle_core::Result<Tensor> {
        let mut h = xs.clone();
        for layer in &self.layers {
            h = layer.forward(&h, bias)?;
        }
        Ok(h)
    }
}
