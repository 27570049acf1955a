//! Full-pipeline tests over mock collaborators: no model files, the real
//! orchestration and span decode.

use bert_qa_rs::pipeline::runtime::QaPipeline;
use bert_qa_rs::pipeline::traits::{QaTokenizer, RuntimeBackend, RuntimeInferenceOutput};
use bert_qa_rs::{BertQaConfig, QaError, QaInput, QaPipelineBuilder, TokenizedInput};

/// `[CLS] what is onnx ? [SEP] onnx ( open neural network exchange ) is an
/// open standard format [SEP] [PAD] [PAD]`, fixed length 21.
const VOCAB: [&str; 21] = [
    "[CLS]", "what", "is", "onnx", "?", "[SEP]", "onnx", "(", "open", "neural", "network",
    "exchange", ")", "is", "an", "open", "standard", "format", "[SEP]", "[PAD]", "[PAD]",
];

const SEQ_LEN: usize = VOCAB.len();
const QUESTION_LEN: usize = 6;
const PADDING_LEN: usize = 2;

struct FixedTokenizer;

impl QaTokenizer for FixedTokenizer {
    fn encode(&self, _question: &str, _context: &str) -> Result<TokenizedInput, QaError> {
        let real_len = SEQ_LEN - PADDING_LEN;
        let mut attention_mask = vec![1u32; real_len];
        attention_mask.resize(SEQ_LEN, 0);
        let mut token_type_ids = vec![0u32; QUESTION_LEN];
        token_type_ids.resize(real_len, 1);
        token_type_ids.resize(SEQ_LEN, 0);
        Ok(TokenizedInput {
            input_ids: (0..SEQ_LEN as u32).collect(),
            attention_mask,
            token_type_ids,
        })
    }

    fn decode(&self, token_ids: &[u32]) -> Result<String, QaError> {
        let words: Vec<&str> = token_ids
            .iter()
            .map(|&id| VOCAB[id as usize])
            .filter(|w| !w.starts_with('['))
            .collect();
        Ok(words.join(" "))
    }
}

struct ScoredBackend {
    start: Vec<f32>,
    end: Vec<f32>,
}

impl ScoredBackend {
    /// Flat scores with a single peak per sequence.
    fn peaks(start_peak: usize, end_peak: usize) -> Self {
        let mut start = vec![0.1f32; SEQ_LEN];
        let mut end = vec![0.1f32; SEQ_LEN];
        start[start_peak] = 9.0;
        end[end_peak] = 9.0;
        Self { start, end }
    }
}

impl RuntimeBackend for ScoredBackend {
    fn infer(&self, _encoding: &TokenizedInput) -> Result<RuntimeInferenceOutput, QaError> {
        Ok(RuntimeInferenceOutput {
            start_logits: self.start.clone(),
            end_logits: self.end.clone(),
            seq_len: self.start.len(),
            dtype: "f32".to_string(),
        })
    }

    fn device_label(&self) -> String {
        "mock".to_string()
    }
}

const MINIMAL_CONFIG_JSON: &str = r#"{
    "vocab_size": 30522,
    "hidden_size": 768,
    "num_hidden_layers": 12,
    "num_attention_heads": 12,
    "intermediate_size": 3072,
    "max_position_embeddings": 512
}"#;

fn build_pipeline(backend: ScoredBackend, test_name: &str) -> QaPipeline {
    let config_path = std::env::temp_dir().join(format!("bert_qa_rs_{test_name}_config.json"));
    std::fs::write(&config_path, MINIMAL_CONFIG_JSON).expect("write config");

    let config = BertQaConfig {
        config_path: config_path.to_string_lossy().to_string(),
        ..BertQaConfig::default()
    };
    let pipeline = QaPipelineBuilder::new(config)
        .with_runtime_backend(Box::new(backend))
        .with_tokenizer(Box::new(FixedTokenizer))
        .build()
        .expect("build should succeed");

    let _ = std::fs::remove_file(&config_path);
    pipeline
}

fn onnx_question() -> QaInput {
    QaInput {
        question: "What is ONNX?".to_string(),
        context: "ONNX (Open Neural Network Exchange) is an open standard format for \
                  representing machine learning models."
            .to_string(),
    }
}

#[test]
fn answer_decodes_expected_span() {
    // Start peak at "open" (8), end peak at "exchange" (11) -> span [8, 12).
    let pipeline = build_pipeline(ScoredBackend::peaks(8, 11), "expected_span");
    let answer = pipeline.answer(&onnx_question()).unwrap();

    assert_eq!(answer.span.start, 8);
    assert_eq!(answer.span.end, 12);
    assert_eq!(answer.text, "open neural network exchange");
    let confidence = answer.confidence.expect("non-empty span has a confidence");
    assert!(confidence > 0.0 && confidence <= 1.0);
}

#[test]
fn answer_is_deterministic() {
    let pipeline = build_pipeline(ScoredBackend::peaks(8, 11), "deterministic");
    let input = onnx_question();
    let first = pipeline.answer(&input).unwrap();
    let second = pipeline.answer(&input).unwrap();
    assert_eq!(first, second);
}

#[test]
fn single_token_span_decodes_one_word() {
    // Both peaks at "onnx" (6) -> span [6, 7).
    let pipeline = build_pipeline(ScoredBackend::peaks(6, 6), "single_token");
    let answer = pipeline.answer(&onnx_question()).unwrap();
    assert_eq!(answer.span.start, 6);
    assert_eq!(answer.span.end, 7);
    assert_eq!(answer.text, "onnx");
}

#[test]
fn inverted_peaks_yield_empty_answer_without_error() {
    // End peak (3) lands before the start peak (9): the permissive decode
    // returns an empty span and an empty string, not an error.
    let pipeline = build_pipeline(ScoredBackend::peaks(9, 3), "inverted_peaks");
    let answer = pipeline.answer(&onnx_question()).unwrap();
    assert!(answer.span.is_empty());
    assert!(answer.text.is_empty());
    assert_eq!(answer.confidence, None);
}

#[test]
fn mismatched_score_lengths_are_rejected() {
    let backend = ScoredBackend {
        start: vec![0.1; 3],
        end: vec![0.1; 3],
    };
    let pipeline = build_pipeline(backend, "mismatched_scores");
    let err = pipeline.answer(&onnx_question()).unwrap_err();
    assert!(matches!(err, QaError::InvalidInput { .. }));
}

#[test]
fn empty_question_and_context_are_rejected() {
    let pipeline = build_pipeline(ScoredBackend::peaks(8, 11), "empty_inputs");

    let no_question = QaInput {
        question: "  ".to_string(),
        context: "something".to_string(),
    };
    assert!(matches!(
        pipeline.answer(&no_question),
        Err(QaError::InvalidInput { .. })
    ));

    let no_context = QaInput {
        question: "What is ONNX?".to_string(),
        context: String::new(),
    };
    assert!(matches!(
        pipeline.answer(&no_context),
        Err(QaError::InvalidInput { .. })
    ));
}

#[test]
fn full_sequence_decode_reproduces_input_text() {
    // Decoding the unmodified token sequence gives back question + context,
    // modulo special-token stripping.
    let tokenizer = FixedTokenizer;
    let encoding = tokenizer.encode("unused", "unused").unwrap();
    let text = tokenizer.decode(&encoding.input_ids).unwrap();
    assert_eq!(
        text,
        "what is onnx ? onnx ( open neural network exchange ) is an open standard format"
    );
}
