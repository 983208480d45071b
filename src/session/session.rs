//! One recording lifecycle: audio in, artifacts out.
//!
//! A session owns its STT backend, transcript buffer, and summarizer, plus
//! a single MAP worker task that folds sealed chunks into summaries while
//! audio is still streaming. All mutation happens through the owning
//! session; the registry only routes requests here.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::audio;
use crate::error::{EngineError, Result};
use crate::output::OutputWriter;
use crate::stt::SttBackend;
use crate::summarizer::{MapReduceSummarizer, MeetingData, UNAVAILABLE_SUMMARY};
use crate::transcript::{TranscriptBuffer, TranscriptChunk};

use super::config::SessionConfig;
use super::stats::{PushOutcome, SessionStats, SessionStatus, StopOutcome};

/// Canned summary used when a session ends with nothing usable captured.
pub const INSUFFICIENT_CONTENT_SUMMARY: &str = "No usable call audio was captured from the \
target app. Please check your capture configuration.";

pub struct Session {
    config: SessionConfig,
    status: Mutex<SessionStatus>,

    /// Serializes every STT call; the backend is not reentrant.
    stt: Arc<tokio::sync::Mutex<Box<dyn SttBackend>>>,
    buffer: Mutex<TranscriptBuffer>,
    summarizer: Arc<MapReduceSummarizer>,
    writer: OutputWriter,

    /// Sender side of the MAP queue; dropped at stop to let the worker
    /// drain and exit.
    chunk_tx: Mutex<Option<mpsc::UnboundedSender<TranscriptChunk>>>,
    worker: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    chunk_summaries: Arc<Mutex<Vec<String>>>,
    /// Chunks enqueued but not yet MAPped.
    maps_pending: Arc<AtomicUsize>,
    map_summary_count: Arc<AtomicUsize>,

    total_audio_seconds: Mutex<f64>,
    outcome: Mutex<Option<StopOutcome>>,
    /// Serializes the stop sequence; late callers get the cached outcome.
    stop_gate: tokio::sync::Mutex<()>,
}

impl Session {
    pub fn new(
        config: SessionConfig,
        stt: Box<dyn SttBackend>,
        summarizer: MapReduceSummarizer,
        writer: OutputWriter,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel::<TranscriptChunk>();
        let summarizer = Arc::new(summarizer);
        let chunk_summaries = Arc::new(Mutex::new(Vec::new()));
        let maps_pending = Arc::new(AtomicUsize::new(0));
        let map_summary_count = Arc::new(AtomicUsize::new(0));

        let worker = spawn_map_worker(
            config.session_id.clone(),
            rx,
            Arc::clone(&summarizer),
            Arc::clone(&chunk_summaries),
            Arc::clone(&maps_pending),
            Arc::clone(&map_summary_count),
        );

        Arc::new(Self {
            buffer: Mutex::new(TranscriptBuffer::new(config.chunk_duration_seconds)),
            config,
            status: Mutex::new(SessionStatus::Starting),
            stt: Arc::new(tokio::sync::Mutex::new(stt)),
            summarizer,
            writer,
            chunk_tx: Mutex::new(Some(tx)),
            worker: tokio::sync::Mutex::new(Some(worker)),
            chunk_summaries,
            maps_pending,
            map_summary_count,
            total_audio_seconds: Mutex::new(0.0),
            outcome: Mutex::new(None),
            stop_gate: tokio::sync::Mutex::new(()),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.config.session_id
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.lock()
    }

    /// Flip Starting → Active once construction is fully wired.
    pub fn activate(&self) {
        let mut status = self.status.lock();
        if *status == SessionStatus::Starting {
            *status = SessionStatus::Active;
        }
    }

    pub fn outcome(&self) -> Option<StopOutcome> {
        self.outcome.lock().clone()
    }

    pub fn stats(&self) -> SessionStats {
        let buffer = self.buffer.lock();
        SessionStats {
            session_id: self.config.session_id.clone(),
            status: self.status(),
            total_audio_seconds: *self.total_audio_seconds.lock(),
            total_segments: buffer.total_segments(),
            chunk_count: buffer.chunks_sealed(),
            map_summary_count: self.map_summary_count.load(Ordering::SeqCst),
        }
    }

    fn queue_depth(&self) -> usize {
        self.buffer.lock().pending_segments() + self.maps_pending.load(Ordering::SeqCst)
    }

    /// Handle one /audio_chunk: decode, transcribe, fold segments into the
    /// buffer, and apply the backpressure policy. Raw PCM is never retained
    /// past this call.
    pub async fn push_chunk(&self, pcm_b64: &str, sample_rate: u32) -> Result<PushOutcome> {
        match self.status() {
            SessionStatus::Active => {}
            SessionStatus::Starting => {
                return Err(EngineError::SessionNotReady(self.config.session_id.clone()))
            }
            _ => return Err(EngineError::SessionNotFound(self.config.session_id.clone())),
        }

        let decoded = audio::decode_pcm_base64(pcm_b64, sample_rate)?;
        let duration = decoded.duration_seconds;

        // Blocking STT work runs off the async threads, bounded by the soft
        // deadline. On expiry the request fails but the session stays
        // active; the decode thread finishes in the background while the
        // per-session mutex keeps ordering intact.
        let stt = Arc::clone(&self.stt);
        let samples = decoded.samples;
        let stt_call = tokio::task::spawn_blocking(move || {
            let mut backend = stt.blocking_lock();
            let segments = backend.push(&samples)?;
            Ok::<_, EngineError>((segments, backend.buffered_seconds()))
        });

        let deadline = Duration::from_secs(self.config.stt_soft_deadline_seconds);
        let (segments, buffered_seconds) = match tokio::time::timeout(deadline, stt_call).await {
            Err(_) => {
                warn!(
                    session_id = %self.config.session_id,
                    deadline_s = self.config.stt_soft_deadline_seconds,
                    "stt push exceeded soft deadline"
                );
                return Err(EngineError::SttBackendFailure(
                    "transcription exceeded soft deadline".to_string(),
                ));
            }
            Ok(Err(join_err)) => {
                return Err(EngineError::Internal(format!("stt task failed: {join_err}")))
            }
            Ok(Ok(Err(stt_err))) => return Err(stt_err),
            Ok(Ok(Ok(result))) => result,
        };

        *self.total_audio_seconds.lock() += duration;

        let mut sealed = Vec::new();
        {
            let mut buffer = self.buffer.lock();
            for seg in segments {
                if let Some(chunk) = buffer.add(seg.text, seg.start_s, seg.end_s) {
                    sealed.push(chunk);
                }
            }
        }
        for chunk in sealed {
            self.enqueue_chunk(chunk);
        }

        let queue_depth = self.queue_depth();
        if queue_depth > self.config.max_queue_depth {
            return Err(EngineError::EngineOverloaded {
                depth: queue_depth,
                limit: self.config.max_queue_depth,
            });
        }

        Ok(PushOutcome {
            buffered_seconds,
            queue_depth,
            accepted_seconds: duration,
        })
    }

    fn enqueue_chunk(&self, chunk: TranscriptChunk) {
        debug!(
            session_id = %self.config.session_id,
            chunk_index = chunk.index,
            segments = chunk.segments.len(),
            "chunk sealed"
        );
        self.maps_pending.fetch_add(1, Ordering::SeqCst);
        let tx = self.chunk_tx.lock();
        if let Some(tx) = tx.as_ref() {
            if tx.send(chunk).is_err() {
                // Worker gone; the stop path will surface the stall.
                self.maps_pending.fetch_sub(1, Ordering::SeqCst);
            }
        } else {
            self.maps_pending.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Stop sequence: flush STT, finalize the buffer, drain MAP, run the
    /// low-content guard or REDUCE + extraction, persist artifacts.
    /// Idempotent: terminal sessions return their cached outcome.
    pub async fn stop(&self) -> Result<(StopOutcome, bool)> {
        let _gate = self.stop_gate.lock().await;

        if let Some(outcome) = self.outcome() {
            return Ok((outcome, true));
        }

        {
            let mut status = self.status.lock();
            if status.is_terminal() {
                // Terminal without an outcome only happens on abort races;
                // synthesize a failed outcome.
                drop(status);
                let outcome = self.record_outcome(SessionStatus::Failed, Default::default());
                return Ok((outcome, true));
            }
            *status = SessionStatus::Stopping;
        }

        info!(session_id = %self.config.session_id, "stopping session");

        // Flush whatever audio the backend still holds.
        let stt = Arc::clone(&self.stt);
        let flush_result =
            tokio::task::spawn_blocking(move || stt.blocking_lock().flush()).await;
        match flush_result {
            Ok(Ok(segments)) => {
                let mut sealed = Vec::new();
                {
                    let mut buffer = self.buffer.lock();
                    for seg in segments {
                        if let Some(chunk) = buffer.add(seg.text, seg.start_s, seg.end_s) {
                            sealed.push(chunk);
                        }
                    }
                }
                for chunk in sealed {
                    self.enqueue_chunk(chunk);
                }
            }
            Ok(Err(e)) => warn!(session_id = %self.config.session_id, error = %e, "stt flush failed"),
            Err(e) => warn!(session_id = %self.config.session_id, error = %e, "stt flush task failed"),
        }

        if let Some(chunk) = self.buffer.lock().force_finalize() {
            self.enqueue_chunk(chunk);
        }

        // Close the queue and wait for the worker to drain it.
        self.chunk_tx.lock().take();
        let worker = self.worker.lock().await.take();
        if let Some(mut worker) = worker {
            let drain = Duration::from_secs(self.config.stop_drain_timeout_seconds);
            match tokio::time::timeout(drain, &mut worker).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(session_id = %self.config.session_id, error = %e, "map worker panicked");
                    self.record_outcome(SessionStatus::Failed, Default::default());
                    self.release_text();
                    return Err(EngineError::Internal("map worker panicked".to_string()));
                }
                Err(_) => {
                    error!(
                        session_id = %self.config.session_id,
                        timeout_s = self.config.stop_drain_timeout_seconds,
                        "map worker failed to drain"
                    );
                    worker.abort();
                    self.record_outcome(SessionStatus::Failed, Default::default());
                    self.release_text();
                    return Err(EngineError::MapStall(self.config.stop_drain_timeout_seconds));
                }
            }
        }

        let summaries = self.chunk_summaries.lock().clone();

        let (status, summary, data) = if self.is_low_content(&summaries) {
            (
                SessionStatus::InsufficientContent,
                INSUFFICIENT_CONTENT_SUMMARY.to_string(),
                MeetingData::default(),
            )
        } else {
            let reduced = match self.summarizer.reduce(&summaries).await {
                Ok(summary) => summary,
                Err(e) => {
                    error!(session_id = %self.config.session_id, error = %e, "final summary failed");
                    self.record_outcome(SessionStatus::Failed, Default::default());
                    self.release_text();
                    return Err(e);
                }
            };
            let summary = format!(
                "Summary Generated: {}\nSegments Summarized: {}\n\n{}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                summaries.len(),
                reduced.trim()
            );
            let data = self.summarizer.extract(&summaries).await;
            (SessionStatus::Completed, summary, data)
        };

        let (paths, write_result) = self.writer.persist(&summary, &data, Local::now());
        let outcome = self.record_outcome(status, paths);
        let stats = self.stats();
        self.release_text();
        info!(
            session_id = %self.config.session_id,
            status = ?status,
            stt_model = %self.config.stt_model,
            llm_model = %self.summarizer.model(),
            audio_seconds = stats.total_audio_seconds,
            segments = stats.total_segments,
            chunks = stats.chunk_count,
            summaries = stats.map_summary_count,
            "session stopped"
        );

        write_result?;
        Ok((outcome, false))
    }

    /// Low-content guard: nothing summarized, or a short transcript that is
    /// mostly filler.
    fn is_low_content(&self, summaries: &[String]) -> bool {
        if summaries.is_empty() {
            return true;
        }
        let buffer = self.buffer.lock();
        let text = buffer.full_text().to_lowercase();
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.len() >= self.config.low_content_min_words {
            return false;
        }
        filler_fraction(&words, &self.config.filler_phrases)
            >= self.config.low_content_filler_ratio
    }

    fn record_outcome(&self, status: SessionStatus, paths: crate::output::ArtifactPaths) -> StopOutcome {
        *self.status.lock() = status;
        let outcome = StopOutcome {
            summary_path: paths.summary_path,
            data_path: paths.data_path,
            csv_path: paths.csv_path,
            session_status: status,
        };
        *self.outcome.lock() = Some(outcome.clone());
        outcome
    }

    /// Drop retained transcript text and summaries once the terminal
    /// artifacts exist.
    fn release_text(&self) {
        *self.buffer.lock() = TranscriptBuffer::new(self.config.chunk_duration_seconds);
        self.chunk_summaries.lock().clear();
    }

    /// Shutdown path: mark failed and best-effort persist whatever MAP
    /// summaries completed. Terminal sessions are untouched.
    pub fn abort(&self) {
        {
            let mut status = self.status.lock();
            if status.is_terminal() {
                return;
            }
            *status = SessionStatus::Failed;
        }
        self.chunk_tx.lock().take();

        let summaries = self.chunk_summaries.lock().clone();
        let paths = if summaries.is_empty() {
            Default::default()
        } else {
            let partial = summaries.join("\n\n");
            let (paths, result) =
                self.writer
                    .persist(&partial, &MeetingData::default(), Local::now());
            if let Err(e) = result {
                warn!(session_id = %self.config.session_id, error = %e, "abort-time artifact write failed");
            }
            paths
        };
        self.record_outcome(SessionStatus::Failed, paths);
        self.release_text();
        warn!(session_id = %self.config.session_id, "session aborted");
    }
}

/// Fraction of words covered by the filler-phrase set. Two-word phrases are
/// matched greedily before single words.
fn filler_fraction(words: &[&str], phrases: &[String]) -> f64 {
    if words.is_empty() {
        return 1.0;
    }
    let clean = |w: &str| -> String {
        w.chars()
            .filter(|c| c.is_alphanumeric() || *c == '\'')
            .collect::<String>()
    };

    let singles: Vec<&str> = phrases
        .iter()
        .filter(|p| !p.contains(' '))
        .map(|p| p.as_str())
        .collect();
    let pairs: Vec<(&str, &str)> = phrases
        .iter()
        .filter_map(|p| p.split_once(' '))
        .collect();

    let mut filler = 0usize;
    let mut i = 0usize;
    while i < words.len() {
        let w = clean(words[i]);
        if i + 1 < words.len() {
            let next = clean(words[i + 1]);
            if pairs.iter().any(|(a, b)| *a == w && *b == next) {
                filler += 2;
                i += 2;
                continue;
            }
        }
        if singles.iter().any(|s| *s == w) {
            filler += 1;
        }
        i += 1;
    }
    filler as f64 / words.len() as f64
}

fn spawn_map_worker(
    session_id: String,
    mut rx: mpsc::UnboundedReceiver<TranscriptChunk>,
    summarizer: Arc<MapReduceSummarizer>,
    summaries: Arc<Mutex<Vec<String>>>,
    maps_pending: Arc<AtomicUsize>,
    map_summary_count: Arc<AtomicUsize>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(session_id = %session_id, "map worker started");
        while let Some(chunk) = rx.recv().await {
            let index = chunk.index;
            let text = chunk.text();
            drop(chunk);

            let summary = match summarizer.map(&text).await {
                Ok(summary) => summary,
                Err(e) => {
                    warn!(
                        session_id = %session_id,
                        chunk_index = index,
                        error = %e,
                        "chunk summary failed persistently, substituting placeholder"
                    );
                    UNAVAILABLE_SUMMARY.to_string()
                }
            };

            if !summary.is_empty() {
                summaries.lock().push(summary);
                map_summary_count.fetch_add(1, Ordering::SeqCst);
            }
            maps_pending.fetch_sub(1, Ordering::SeqCst);
            debug!(session_id = %session_id, chunk_index = index, "chunk mapped");
        }
        debug!(session_id = %session_id, "map worker drained");
    })
}
