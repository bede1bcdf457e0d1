use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex,
};
use std::thread;
use std::time::{Duration, Instant};

use tracing::info;

/// Chunk/byte counters for a long push or restore, with an optional ticker that
/// logs them every few seconds.
#[derive(Clone)]
pub struct Progress {
    enabled: bool,
    stage: Arc<Mutex<String>>,
    chunks_done: Arc<AtomicU64>,
    chunks_total: Arc<AtomicU64>,
    bytes_done: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
}

impl Progress {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            stage: Arc::new(Mutex::new(String::new())),
            chunks_done: Arc::new(AtomicU64::new(0)),
            chunks_total: Arc::new(AtomicU64::new(0)),
            bytes_done: Arc::new(AtomicU64::new(0)),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Switch to a new stage and reset the counters.
    pub fn set_stage(&self, s: &str, chunks_total: u64) {
        *self.stage.lock().unwrap_or_else(|e| e.into_inner()) = s.to_string();
        self.chunks_total.store(chunks_total, Ordering::Relaxed);
        self.chunks_done.store(0, Ordering::Relaxed);
        self.bytes_done.store(0, Ordering::Relaxed);
    }

    pub fn add_chunk(&self, bytes: u64) {
        self.chunks_done.fetch_add(1, Ordering::Relaxed);
        self.bytes_done.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn chunks_done(&self) -> u64 {
        self.chunks_done.load(Ordering::Relaxed)
    }

    pub fn bytes_done(&self) -> u64 {
        self.bytes_done.load(Ordering::Relaxed)
    }

    pub fn start(&self) {
        if !self.enabled || self.running.swap(true, Ordering::Relaxed) {
            return;
        }
        let this = self.clone();
        thread::spawn(move || {
            let t0 = Instant::now();
            while this.running.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_secs(5));
                if !this.running.load(Ordering::Relaxed) {
                    break;
                }
                let stage = this.stage.lock().unwrap_or_else(|e| e.into_inner()).clone();
                let done = this.chunks_done();
                let total = this.chunks_total.load(Ordering::Relaxed);
                let pct = if total > 0 { done * 100 / total } else { 0 };
                info!(
                    elapsed_s = t0.elapsed().as_secs(),
                    stage = %stage,
                    chunks = done,
                    total,
                    bytes = this.bytes_done(),
                    "progress {pct}%"
                );
            }
        });
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}
