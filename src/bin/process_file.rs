//! Offline batch mode: run a recorded WAV through the same pipeline a live
//! session uses, without the HTTP layer.
//!
//!   process_file <recording.wav> [output_dir]
//!
//! Engine configuration comes from the usual ENGINE_* variables; dev mode
//! (ENGINE_MODE=dev) runs end-to-end with no models installed.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tracing::info;

use recap_engine::audio::AudioFile;
use recap_engine::config::{Config, RuntimeMode};
use recap_engine::output::{OutputConfig, OutputWriter};
use recap_engine::session::{Session, SessionConfig};
use recap_engine::stt::{create_backend, BackendKind};
use recap_engine::summarizer::{
    default_prompts, CannedLlm, LlmClient, MapReduceSummarizer, OllamaClient,
};

/// Seconds of audio pushed per pipeline iteration.
const FEED_SECONDS: f64 = 1.0;

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(wav_path) = args.next() else {
        bail!("usage: process_file <recording.wav> [output_dir]");
    };
    let output_dir = args.next().unwrap_or_else(|| "./summaries".to_string());

    let config = Config::from_env().context("invalid engine configuration")?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&config.log_level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let file = AudioFile::open(&wav_path)?;
    info!(
        path = %file.path,
        seconds = file.duration_seconds(),
        sample_rate = file.sample_rate,
        "processing recording"
    );

    let llm: Arc<dyn LlmClient> = match config.mode {
        RuntimeMode::Prod => Arc::new(OllamaClient::new(&config.llm_url)),
        RuntimeMode::Dev => Arc::new(CannedLlm),
    };
    let llm_model = "qwen3:4b-instruct".to_string();
    llm.ensure_model(&llm_model).await?;

    let prompts = default_prompts();
    let output = OutputConfig {
        output_dir: output_dir.clone(),
        csv_export_path: format!("{output_dir}/meetings.csv"),
        append_csv: true,
        companion_folders: false,
    };
    let session_config = SessionConfig::from_engine(
        &config,
        uuid::Uuid::new_v4().to_string(),
        BackendKind::Whisper,
        "whisper".to_string(),
        file.sample_rate,
        llm_model.clone(),
        prompts,
        output,
    );

    let backend_kind = session_config.backend;
    let stt_model = session_config.stt_model.clone();
    let sample_rate = file.sample_rate;
    let engine_config = config.clone();
    let stt = tokio::task::spawn_blocking(move || {
        create_backend(backend_kind, &stt_model, sample_rate, &engine_config)
    })
    .await??;

    let summarizer = MapReduceSummarizer::new(
        llm,
        session_config.llm_model.clone(),
        session_config.prompts.clone(),
        session_config.token_budgets.clone(),
        Arc::new(Semaphore::new(config.max_concurrent_llm_calls)),
    );
    let writer = OutputWriter::new(session_config.output.clone(), Arc::new(Mutex::new(())));

    let session = Session::new(session_config, stt, summarizer, writer);
    session.activate();

    // Feed the file in live-sized chunks so chunking and MAP behave exactly
    // as they would during a recording.
    use base64::Engine as _;
    let chunk_samples = (file.sample_rate as f64 * FEED_SECONDS) as usize;
    for window in file.samples.chunks(chunk_samples) {
        let bytes: Vec<u8> = window.iter().flat_map(|s| s.to_le_bytes()).collect();
        let pcm_b64 = base64::engine::general_purpose::STANDARD.encode(bytes);
        match session.push_chunk(&pcm_b64, file.sample_rate).await {
            Ok(_) => {}
            // The engine accepted the audio but wants the producer to slow
            // down; pause before the next chunk instead of resending.
            Err(e) if e.error_code() == "ENGINE_OVERLOADED" => {
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let (outcome, _) = session.stop().await?;
    println!("session_status: {:?}", outcome.session_status);
    if let Some(path) = outcome.summary_path {
        println!("summary: {}", path.display());
    }
    if let Some(path) = outcome.data_path {
        println!("data:    {}", path.display());
    }
    if let Some(path) = outcome.csv_path {
        println!("csv:     {}", path.display());
    }

    Ok(())
}
