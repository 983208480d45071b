//! Minimal capture-client stand-in: drives a running engine through one
//! full session with a generated tone.
//!
//! Start the engine first (dev mode keeps it self-contained):
//!   ENGINE_MODE=dev cargo run
//! then:
//!   cargo run --example session_client

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::json;

const ENGINE_URL: &str = "http://127.0.0.1:8756";
const SAMPLE_RATE: u32 = 16_000;

fn tone_chunk(seconds: f64, hz: f32) -> String {
    let n = (SAMPLE_RATE as f64 * seconds) as usize;
    let samples: Vec<f32> = (0..n)
        .map(|i| (2.0 * std::f32::consts::PI * hz * i as f32 / SAMPLE_RATE as f32).sin() * 0.5)
        .collect();
    let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    BASE64.encode(bytes)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let http = reqwest::Client::new();
    let session_id = uuid::Uuid::new_v4().to_string();

    let health: serde_json::Value = http
        .get(format!("{ENGINE_URL}/health"))
        .send()
        .await?
        .json()
        .await?;
    println!("health: {health}");

    let resp = http
        .post(format!("{ENGINE_URL}/start_session"))
        .json(&json!({
            "session_id": session_id,
            "model": "whisper",
            "sample_rate": SAMPLE_RATE,
            "user_settings": {
                "chunk_summary_prompt": "Summarize this segment:\n{text}\n",
                "final_summary_prompt": "Combine these summaries:\n{summaries_text}\n",
                "output_dir": "./summaries",
                "csv_export_path": "./summaries/meetings.csv",
                "append_csv": true
            }
        }))
        .send()
        .await?;
    println!("start_session: {} {}", resp.status(), resp.text().await?);

    for i in 0..5 {
        let resp: serde_json::Value = http
            .post(format!("{ENGINE_URL}/audio_chunk"))
            .json(&json!({
                "session_id": session_id,
                "timestamp": i as f64,
                "pcm_b64": tone_chunk(1.0, 440.0),
                "sample_rate": SAMPLE_RATE,
            }))
            .send()
            .await?
            .json()
            .await?;
        println!("audio_chunk {i}: {resp}");
    }

    let resp: serde_json::Value = http
        .post(format!("{ENGINE_URL}/stop_session"))
        .json(&json!({ "session_id": session_id }))
        .send()
        .await?
        .json()
        .await?;
    println!("stop_session: {resp}");

    Ok(())
}
