#[cfg(feature = "onnx")]
use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;

use crate::config::{BertModelConfig, BertQaConfig};
use crate::error::QaError;
use crate::model::qa_model::BertForQuestionAnswering;
use crate::pipeline::traits::{RuntimeBackend, RuntimeInferenceOutput, RuntimeKind};
use crate::types::TokenizedInput;

pub(crate) fn build_runtime_backend(
    runtime_kind: RuntimeKind,
    config: &BertQaConfig,
    model_cfg: &BertModelConfig,
) -> Result<Box<dyn RuntimeBackend>, QaError> {
    match runtime_kind {
        RuntimeKind::Candle => Ok(Box::new(CandleRuntimeBackend::load(config, model_cfg)?)),
        RuntimeKind::Onnx => build_onnx_runtime_backend(config),
    }
}

fn build_onnx_runtime_backend(
    config: &BertQaConfig,
) -> Result<Box<dyn RuntimeBackend>, QaError> {
    #[cfg(feature = "onnx")]
    {
        Ok(Box::new(OnnxRuntimeBackend::load(config)?))
    }

    #[cfg(not(feature = "onnx"))]
    {
        let _ = config;
        Err(QaError::runtime(
            "build runtime backend",
            "ONNX runtime support is disabled; enable the `onnx` cargo feature",
        ))
    }
}

struct CandleRuntimeBackend {
    model: BertForQuestionAnswering,
    device: Device,
}

impl CandleRuntimeBackend {
    fn load(config: &BertQaConfig, model_cfg: &BertModelConfig) -> Result<Self, QaError> {
        let device = match config.device.as_str() {
            "cuda" => Device::new_cuda(0).map_err(|e| QaError::runtime("CUDA init", e))?,
            _ => Device::Cpu,
        };

        let model_data =
            std::fs::read(&config.model_path).map_err(|e| QaError::io("read safetensors", e))?;
        let vb = VarBuilder::from_buffered_safetensors(model_data, DType::F32, &device)
            .map_err(|e| QaError::runtime("load safetensors", e))?;
        let model = BertForQuestionAnswering::load(model_cfg, vb)
            .map_err(|e| QaError::runtime("build model", e))?;

        tracing::info!(
            hidden_size = model_cfg.hidden_size,
            layers = model_cfg.num_hidden_layers,
            vocab = model_cfg.vocab_size,
            ?device,
            "BERT QA Candle runtime loaded"
        );

        Ok(Self { model, device })
    }

    fn build_input_tensor(&self, values: &[u32]) -> Result<Tensor, QaError> {
        Tensor::from_vec(values.to_vec(), (1, values.len()), &self.device)
            .map_err(|e| QaError::runtime("tensor creation", e))
    }
}

impl RuntimeBackend for CandleRuntimeBackend {
    fn infer(&self, encoding: &TokenizedInput) -> Result<RuntimeInferenceOutput, QaError> {
        let seq_len = encoding.input_ids.len();
        let input_ids = self.build_input_tensor(&encoding.input_ids)?;
        let token_type_ids = self.build_input_tensor(&encoding.token_type_ids)?;
        let attention_mask = self.build_input_tensor(&encoding.attention_mask)?;

        let (start_t, end_t) = self
            .model
            .forward(&input_ids, &token_type_ids, &attention_mask)
            .map_err(|e| QaError::runtime("forward pass", e))?;

        let dtype = format!("{:?}", start_t.dtype()).to_ascii_lowercase();
        let start_logits = start_t
            .squeeze(0)
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(|e| QaError::runtime("extract start logits", e))?;
        let end_logits = end_t
            .squeeze(0)
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(|e| QaError::runtime("extract end logits", e))?;

        Ok(RuntimeInferenceOutput {
            start_logits,
            end_logits,
            seq_len,
            dtype,
        })
    }

    fn device_label(&self) -> String {
        if self.device.is_cuda() {
            "cuda".to_string()
        } else if self.device.is_metal() {
            "metal".to_string()
        } else {
            "cpu".to_string()
        }
    }
}

#[cfg(feature = "onnx")]
struct OnnxRuntimeBackend {
    session: std::sync::Mutex<ort::session::Session>,
    device_label: String,
    feeds_token_type_ids: bool,
    start_output_index: usize,
    end_output_index: usize,
}

#[cfg(feature = "onnx")]
impl OnnxRuntimeBackend {
    fn load(config: &BertQaConfig) -> Result<Self, QaError> {
        let execution_providers = onnx_execution_providers(config.device.as_str())?;
        let session = ort::session::Session::builder()
            .map_err(|e| QaError::runtime("onnx session builder", e))?
            .with_execution_providers(execution_providers)
            .map_err(|e| QaError::runtime("onnx execution providers", e))?
            .commit_from_file(Path::new(&config.model_path))
            .map_err(|e| QaError::runtime("onnx model load", e))?;

        if session.outputs().len() < 2 {
            return Err(QaError::runtime(
                "onnx model load",
                format!(
                    "QA model must expose start and end logit outputs, got {}",
                    session.outputs().len()
                ),
            ));
        }

        let feeds_token_type_ids = session
            .inputs()
            .iter()
            .any(|input| input.name == "token_type_ids");
        let start_output_index = output_index(&session, "start_logits", 0);
        let end_output_index = output_index(&session, "end_logits", 1);

        tracing::info!(
            inputs = session.inputs().len(),
            outputs = session.outputs().len(),
            feeds_token_type_ids,
            model_path = %config.model_path,
            device = %config.device,
            "BERT QA ONNX runtime loaded"
        );

        let device_label = parse_onnx_device(config.device.as_str())?;
        Ok(Self {
            session: std::sync::Mutex::new(session),
            device_label: device_label.to_string(),
            feeds_token_type_ids,
            start_output_index,
            end_output_index,
        })
    }

    fn run_forward(&self, encoding: &TokenizedInput) -> Result<RuntimeInferenceOutput, QaError> {
        let shape = [1usize, encoding.input_ids.len()];
        let input_ids = widen_to_i64(&encoding.input_ids);
        let attention_mask = widen_to_i64(&encoding.attention_mask);
        let token_type_ids = widen_to_i64(&encoding.token_type_ids);

        let input_ids = ort::value::TensorRef::from_array_view((shape, input_ids.as_slice()))
            .map_err(|e| QaError::runtime("onnx input tensor", e))?;
        let attention_mask =
            ort::value::TensorRef::from_array_view((shape, attention_mask.as_slice()))
                .map_err(|e| QaError::runtime("onnx input tensor", e))?;
        let token_type_ids =
            ort::value::TensorRef::from_array_view((shape, token_type_ids.as_slice()))
                .map_err(|e| QaError::runtime("onnx input tensor", e))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| QaError::runtime("onnx session lock", "session mutex poisoned"))?;
        let outputs = if self.feeds_token_type_ids {
            session
                .run(ort::inputs![
                    "input_ids" => input_ids,
                    "attention_mask" => attention_mask,
                    "token_type_ids" => token_type_ids
                ])
                .map_err(|e| QaError::runtime("onnx forward pass", e))?
        } else {
            session
                .run(ort::inputs![
                    "input_ids" => input_ids,
                    "attention_mask" => attention_mask
                ])
                .map_err(|e| QaError::runtime("onnx forward pass", e))?
        };

        let output_count = outputs.len();
        if output_count <= self.start_output_index.max(self.end_output_index) {
            return Err(QaError::runtime(
                "onnx forward pass",
                format!("model produced {output_count} outputs"),
            ));
        }

        let (start_logits, start_len) =
            extract_logits(&outputs[self.start_output_index], "start")?;
        let (end_logits, end_len) = extract_logits(&outputs[self.end_output_index], "end")?;
        if start_len != end_len {
            return Err(QaError::invalid_input(format!(
                "start/end logits disagree on sequence length: {start_len} vs {end_len}"
            )));
        }

        Ok(RuntimeInferenceOutput {
            start_logits,
            end_logits,
            seq_len: start_len,
            dtype: "f32".to_string(),
        })
    }
}

#[cfg(feature = "onnx")]
impl RuntimeBackend for OnnxRuntimeBackend {
    fn infer(&self, encoding: &TokenizedInput) -> Result<RuntimeInferenceOutput, QaError> {
        self.run_forward(encoding)
    }

    fn device_label(&self) -> String {
        self.device_label.clone()
    }
}

#[cfg(feature = "onnx")]
fn widen_to_i64(values: &[u32]) -> Vec<i64> {
    values.iter().map(|&v| i64::from(v)).collect()
}

#[cfg(feature = "onnx")]
fn output_index(session: &ort::session::Session, name: &str, fallback: usize) -> usize {
    session
        .outputs()
        .iter()
        .position(|output| output.name == name)
        .unwrap_or(fallback)
}

#[cfg(feature = "onnx")]
fn extract_logits(
    output: &ort::value::DynValue,
    which: &'static str,
) -> Result<(Vec<f32>, usize), QaError> {
    let (shape, logits) = output
        .try_extract_tensor::<f32>()
        .map_err(|e| QaError::runtime("onnx extract logits", e))?;
    let dims: Vec<i64> = shape.iter().copied().collect();
    let seq_len = parse_onnx_logits_shape(&dims, logits.len(), which)?;
    Ok((logits.to_vec(), seq_len))
}

#[cfg(feature = "onnx")]
fn onnx_execution_providers(
    device: &str,
) -> Result<Vec<ort::ep::ExecutionProviderDispatch>, QaError> {
    match parse_onnx_device(device)? {
        "cpu" => Ok(vec![ort::ep::CPU::default().build()]),
        "cuda" => Ok(vec![
            ort::ep::CUDA::default()
                .with_device_id(0)
                .build()
                .error_on_failure(),
            ort::ep::CPU::default().build(),
        ]),
        _ => Err(QaError::invalid_input(format!(
            "unsupported ONNX device '{device}', expected 'cpu' or 'cuda'"
        ))),
    }
}

#[cfg(feature = "onnx")]
fn parse_onnx_device(device: &str) -> Result<&'static str, QaError> {
    if device.eq_ignore_ascii_case("cpu") {
        Ok("cpu")
    } else if device.eq_ignore_ascii_case("cuda") {
        Ok("cuda")
    } else {
        Err(QaError::invalid_input(format!(
            "unsupported ONNX device '{device}', expected 'cpu' or 'cuda'"
        )))
    }
}

/// Accepts `[1, L]` or `[L]` logits and returns `L`.
#[cfg(feature = "onnx")]
fn parse_onnx_logits_shape(
    dims: &[i64],
    logits_len: usize,
    which: &'static str,
) -> Result<usize, QaError> {
    let seq_len = match dims {
        [batch, l] => {
            if *batch != 1 {
                return Err(QaError::invalid_input(format!(
                    "ONNX {which} logits batch size must be 1, got {batch}"
                )));
            }
            positive_dim(*l, which)?
        }
        [l] => positive_dim(*l, which)?,
        _ => {
            return Err(QaError::invalid_input(format!(
                "unsupported ONNX {which} logits rank {}; expected [1, L] or [L]",
                dims.len()
            )));
        }
    };

    if seq_len != logits_len {
        return Err(QaError::invalid_input(format!(
            "ONNX {which} logits shape/data mismatch: shape implies {seq_len} values, got {logits_len}"
        )));
    }
    Ok(seq_len)
}

#[cfg(feature = "onnx")]
fn positive_dim(value: i64, which: &'static str) -> Result<usize, QaError> {
    if value <= 0 {
        return Err(QaError::invalid_input(format!(
            "ONNX {which} logits sequence dimension must be > 0, got {value}"
        )));
    }
    Ok(value as usize)
}
