//! Reference answers against a real pretrained model. Gated on
//! `BERT_QA_MODEL_DIR` pointing at a directory with `config.json`,
//! `tokenizer.json` and `model.safetensors` (or `model.onnx` when
//! `BERT_QA_RUNTIME=onnx`); the suite runs ignored without it.

use std::path::{Path, PathBuf};

use bert_qa_rs::{BertQaConfig, QaInput, QaPipelineBuilder, RuntimeKind};
use libtest_mimic::{Arguments, Failed, Trial};

const SUITE_NAME: &str = "pretrained_qa_reference";

struct ReferenceCase {
    id: &'static str,
    question: &'static str,
    context: &'static str,
    expected_answer: &'static str,
}

static CASES: [ReferenceCase; 3] = [
    ReferenceCase {
        id: "onnx_definition",
        question: "What is ONNX?",
        context: "ONNX (Open Neural Network Exchange) is an open standard format for \
                  representing machine learning models.",
        expected_answer: "Open Neural Network Exchange",
    },
    ReferenceCase {
        id: "eiffel_location",
        question: "Where is the Eiffel Tower located?",
        context: "The Eiffel Tower, completed in 1889 for the World's Fair, is located in \
                  Paris, France.",
        expected_answer: "Paris",
    },
    ReferenceCase {
        id: "bert_authors",
        question: "Who introduced BERT?",
        context: "BERT was introduced in 2018 by researchers at Google working on deep \
                  bidirectional language representations.",
        expected_answer: "Google",
    },
];

fn main() {
    let mut args = Arguments::from_args();
    // Model loading is heavy; one pipeline per thread is not worth it here.
    if args.test_threads.is_none() {
        args.test_threads = Some(1);
    }

    let model_dir = std::env::var_os("BERT_QA_MODEL_DIR").map(PathBuf::from);
    let runtime_kind = match std::env::var("BERT_QA_RUNTIME").as_deref() {
        Ok("onnx") => RuntimeKind::Onnx,
        _ => RuntimeKind::Candle,
    };

    let run_by_default = model_dir.is_some();
    let mut tests = Vec::with_capacity(CASES.len());
    for case in &CASES {
        let test_name = format!("{SUITE_NAME}::{}", case.id);
        let model_dir = model_dir.clone();
        let trial = Trial::test(test_name, move || match model_dir {
            Some(dir) => run_case(&dir, runtime_kind, case),
            None => Err(Failed::from("BERT_QA_MODEL_DIR is not set")),
        })
        .with_ignored_flag(!run_by_default);
        tests.push(trial);
    }

    libtest_mimic::run(&args, tests).exit();
}

fn run_case(
    model_dir: &Path,
    runtime_kind: RuntimeKind,
    case: &ReferenceCase,
) -> Result<(), Failed> {
    let model_filename = match runtime_kind {
        RuntimeKind::Candle => "model.safetensors",
        RuntimeKind::Onnx => "model.onnx",
    };
    let config = BertQaConfig {
        model_path: model_dir.join(model_filename).to_string_lossy().to_string(),
        config_path: model_dir.join("config.json").to_string_lossy().to_string(),
        tokenizer_path: model_dir
            .join("tokenizer.json")
            .to_string_lossy()
            .to_string(),
        ..BertQaConfig::default()
    };

    let pipeline = QaPipelineBuilder::new(config)
        .with_runtime_kind(runtime_kind)
        .build()
        .map_err(|e| Failed::from(format!("failed to build pipeline: {e}")))?;

    let answer = pipeline
        .answer(&QaInput {
            question: case.question.to_string(),
            context: case.context.to_string(),
        })
        .map_err(|e| Failed::from(format!("failed to answer: {e}")))?;

    let got = answer.text.to_lowercase();
    let expected = case.expected_answer.to_lowercase();
    if !got.contains(&expected) {
        return Err(Failed::from(format!(
            "case '{}': expected answer containing '{}', got '{}' at [{}, {})",
            case.id, case.expected_answer, answer.text, answer.span.start, answer.span.end
        )));
    }
    Ok(())
}
