use std::path::{Path, PathBuf};

use bert_qa_rs::{BertQaConfig, QaAnswer, QaInput, QaPipeline, QaPipelineBuilder, RuntimeKind};
use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RuntimeChoice {
    Candle,
    Onnx,
}

impl RuntimeChoice {
    fn model_filename(self) -> &'static str {
        match self {
            Self::Candle => "model.safetensors",
            Self::Onnx => "model.onnx",
        }
    }

    fn runtime_kind(self) -> RuntimeKind {
        match self {
            Self::Candle => RuntimeKind::Candle,
            Self::Onnx => RuntimeKind::Onnx,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Candle => "candle",
            Self::Onnx => "onnx",
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "qa",
    about = "Extractive question answering with a pretrained BERT QA model"
)]
struct Args {
    /// Directory holding config.json, tokenizer.json and the model weights
    /// (model.safetensors for candle, model.onnx for onnx).
    #[arg(long)]
    model_dir: PathBuf,

    #[arg(long)]
    question: String,

    /// Context passage to answer from.
    #[arg(long, conflicts_with = "context_file")]
    context: Option<String>,

    /// Read the context passage from a file instead.
    #[arg(long)]
    context_file: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = RuntimeChoice::Candle)]
    runtime: RuntimeChoice,

    /// "cpu" or "cuda".
    #[arg(long, default_value = "cpu")]
    device: String,

    #[arg(long, default_value_t = BertQaConfig::DEFAULT_MAX_SEQ_LEN)]
    max_seq_len: usize,

    /// Print the answer as JSON.
    #[arg(long)]
    json: bool,

    /// Run the query through both the direct and the optimized runtime and
    /// require them to decode the same answer.
    #[arg(long)]
    check_parity: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args = Args::parse();
    let context = load_context(&args)?;
    let input = QaInput {
        question: args.question.clone(),
        context,
    };

    if args.check_parity {
        return run_parity(&args, &input);
    }

    let pipeline = build_pipeline(&args, args.runtime)?;
    let answer = pipeline.answer(&input).map_err(|e| e.to_string())?;
    print_answer(&args, args.runtime, &answer)
}

fn run_parity(args: &Args, input: &QaInput) -> Result<(), String> {
    let candle = build_pipeline(args, RuntimeChoice::Candle)?;
    let onnx = build_pipeline(args, RuntimeChoice::Onnx)?;

    let candle_answer = candle.answer(input).map_err(|e| e.to_string())?;
    let onnx_answer = onnx.answer(input).map_err(|e| e.to_string())?;

    print_answer(args, RuntimeChoice::Candle, &candle_answer)?;
    print_answer(args, RuntimeChoice::Onnx, &onnx_answer)?;

    // The optimized runtime must decode the same span as direct execution.
    if candle_answer.span != onnx_answer.span || candle_answer.text != onnx_answer.text {
        return Err(format!(
            "runtime parity check failed: candle answered '{}' at [{}, {}), onnx answered '{}' at [{}, {})",
            candle_answer.text,
            candle_answer.span.start,
            candle_answer.span.end,
            onnx_answer.text,
            onnx_answer.span.start,
            onnx_answer.span.end,
        ));
    }
    println!("parity ok");
    Ok(())
}

fn build_pipeline(args: &Args, runtime: RuntimeChoice) -> Result<QaPipeline, String> {
    let model_path = args.model_dir.join(runtime.model_filename());
    require_path_exists(&model_path)?;
    require_path_exists(&args.model_dir.join("config.json"))?;
    require_path_exists(&args.model_dir.join("tokenizer.json"))?;

    let config = BertQaConfig {
        model_path: path_str(&model_path),
        config_path: path_str(&args.model_dir.join("config.json")),
        tokenizer_path: path_str(&args.model_dir.join("tokenizer.json")),
        device: args.device.clone(),
        max_seq_len: args.max_seq_len,
    };

    QaPipelineBuilder::new(config)
        .with_runtime_kind(runtime.runtime_kind())
        .build()
        .map_err(|e| format!("failed to build {} pipeline: {e}", runtime.as_str()))
}

fn load_context(args: &Args) -> Result<String, String> {
    match (&args.context, &args.context_file) {
        (Some(context), None) => Ok(context.clone()),
        (None, Some(path)) => std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {e}", path.display())),
        (None, None) => Err("provide --context or --context-file".to_string()),
        (Some(_), Some(_)) => Err("--context conflicts with --context-file".to_string()),
    }
}

fn print_answer(args: &Args, runtime: RuntimeChoice, answer: &QaAnswer) -> Result<(), String> {
    if args.json {
        let line = serde_json::to_string(answer)
            .map_err(|e| format!("failed to serialize answer: {e}"))?;
        println!("{line}");
        return Ok(());
    }

    println!("[{}] answer: {}", runtime.as_str(), answer.text);
    println!(
        "[{}] span: [{}, {})",
        runtime.as_str(),
        answer.span.start,
        answer.span.end
    );
    if let Some(confidence) = answer.confidence {
        println!("[{}] confidence: {confidence:.4}", runtime.as_str());
    }
    Ok(())
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn require_path_exists(path: &Path) -> Result<(), String> {
    if !path.exists() {
        return Err(format!("missing required file: {}", path.display()));
    }
    Ok(())
}
