//! Per-judge-call trace capture.
//!
//! Every dimension score produced during a run can be streamed to a
//! [`TraceSink`]. [`JsonlTraceSink`] writes one JSON object per line from a
//! background thread; drop every sink clone before calling
//! [`TraceWorker::join`] so the writer sees the end of the channel.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{mpsc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scoring::{ScoreRecord, ScoringSystem};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreTrace {
    pub timestamp_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
    /// Outer round, 1-based.
    pub test_round: usize,
    pub query: String,
    pub engine: String,
    /// Inner round, 1-based.
    pub round: usize,
    pub scoring_system: ScoringSystem,
    pub dimension: String,
    pub score: i32,
    pub error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    pub reasoning: String,
    pub result_count: usize,
    pub latency_ms: u64,
}

/// Where a score was produced.
#[derive(Debug, Clone, Copy)]
pub struct TraceContext<'a> {
    pub run_id: Option<Uuid>,
    pub test_round: usize,
    pub query: &'a str,
    pub engine: &'a str,
}

impl ScoreTrace {
    pub fn from_record(ctx: TraceContext<'_>, round: usize, record: &ScoreRecord) -> Self {
        Self {
            timestamp_ms: now_epoch_ms(),
            run_id: ctx.run_id,
            test_round: ctx.test_round,
            query: ctx.query.to_string(),
            engine: ctx.engine.to_string(),
            round,
            scoring_system: record.scoring_system,
            dimension: record.dimension.clone(),
            score: record.score,
            error: record.error,
            error_kind: record.error_kind.clone(),
            reasoning: record.reasoning.clone(),
            result_count: record.result_count,
            latency_ms: record.latency_ms,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(String),
    #[error("trace channel closed")]
    Closed,
    #[error("trace worker failed: {0}")]
    Join(String),
}

pub trait TraceSink: Send + Sync {
    fn record(&self, event: ScoreTrace) -> Result<(), TraceError>;
}

#[derive(Clone)]
pub struct JsonlTraceSink {
    sender: mpsc::Sender<ScoreTrace>,
}

pub struct TraceWorker {
    handle: Option<std::thread::JoinHandle<Result<usize, TraceError>>>,
}

impl TraceWorker {
    /// Wait for the writer to drain; returns the number of lines written.
    pub fn join(mut self) -> Result<usize, TraceError> {
        match self.handle.take() {
            Some(handle) => match handle.join() {
                Ok(result) => result,
                Err(_) => Err(TraceError::Join("trace worker panicked".to_string())),
            },
            None => Ok(0),
        }
    }
}

impl JsonlTraceSink {
    pub fn new(path: impl AsRef<Path>) -> Result<(Self, TraceWorker), TraceError> {
        let file = std::fs::File::create(path)?;
        let (sender, receiver) = mpsc::channel::<ScoreTrace>();
        let handle = std::thread::spawn(move || write_trace_loop(file, receiver));
        Ok((
            Self { sender },
            TraceWorker {
                handle: Some(handle),
            },
        ))
    }
}

impl TraceSink for JsonlTraceSink {
    fn record(&self, event: ScoreTrace) -> Result<(), TraceError> {
        self.sender.send(event).map_err(|_| TraceError::Closed)
    }
}

fn write_trace_loop(
    file: std::fs::File,
    receiver: mpsc::Receiver<ScoreTrace>,
) -> Result<usize, TraceError> {
    let mut writer = BufWriter::new(file);
    let mut written = 0;
    for event in receiver {
        let line = serde_json::to_string(&event).map_err(|e| TraceError::Serde(e.to_string()))?;
        writeln!(writer, "{line}")?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

/// Collects traces in memory.
#[derive(Default)]
pub struct MemoryTraceSink {
    events: Mutex<Vec<ScoreTrace>>,
}

impl MemoryTraceSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ScoreTrace> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl TraceSink for MemoryTraceSink {
    fn record(&self, event: ScoreTrace) -> Result<(), TraceError> {
        self.events
            .lock()
            .map_err(|_| TraceError::Closed)?
            .push(event);
        Ok(())
    }
}

pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
