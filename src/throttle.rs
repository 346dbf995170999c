//! Progress throttling between the fetch worker and the user
//!
//! The fetch engine reports progress many times per second from a blocking
//! worker thread. [`ProgressThrottle`] turns that stream into at most one
//! status line per five percentage points or two seconds, and hands each line
//! to the async side over an unbounded channel so the worker never waits on
//! delivery.
//!
//! The throttle is also the cancellation checkpoint: every observed snapshot
//! first checks the task's [`CancellationToken`]. A stalled engine that stops
//! reporting progress is therefore only interrupted at its next report.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::types::{ProgressPhase, ProgressSnapshot};
use crate::utils::sizeof_fmt;

/// Minimum percentage advance that emits regardless of elapsed time
pub const PERCENT_STEP: u8 = 5;

/// Elapsed time after which any non-regressing percentage emits
pub const EMIT_INTERVAL: Duration = Duration::from_secs(2);

/// Rate limiter and cancellation checkpoint for engine progress
#[derive(Debug)]
pub struct ProgressThrottle {
    label: String,
    cancel: CancellationToken,
    tx: mpsc::UnboundedSender<String>,
    phase: ProgressPhase,
    last_percent: Option<u8>,
    last_emit: Option<Instant>,
}

impl ProgressThrottle {
    /// Create a throttle for one fetch pass
    ///
    /// `label` names the pass in status lines (e.g. "video").
    pub fn new(
        label: impl Into<String>,
        cancel: CancellationToken,
        tx: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            label: label.into(),
            cancel,
            tx,
            phase: ProgressPhase::Downloading,
            last_percent: None,
            last_emit: None,
        }
    }

    /// Fail with [`Error::Canceled`] if cancellation was requested
    pub fn checkpoint(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Canceled);
        }
        Ok(())
    }

    /// Observe a snapshot using the current time
    pub fn observe(&mut self, snapshot: &ProgressSnapshot) -> Result<()> {
        self.observe_at(snapshot, Instant::now())
    }

    /// Observe a snapshot at an explicit instant
    pub fn observe_at(&mut self, snapshot: &ProgressSnapshot, now: Instant) -> Result<()> {
        self.checkpoint()?;

        match snapshot.phase {
            ProgressPhase::Finalizing => {
                if self.phase != ProgressPhase::Finalizing {
                    self.phase = ProgressPhase::Finalizing;
                    let text = format!("📦 Processing {}…", self.label);
                    self.emit(text, now);
                }
            }
            ProgressPhase::Downloading => {
                if self.phase == ProgressPhase::Finalizing {
                    // next stream of a merged download starts from zero
                    self.phase = ProgressPhase::Downloading;
                    self.last_percent = None;
                }

                let Some(percent) = snapshot.percent() else {
                    return Ok(());
                };

                if self.is_due(percent, now) {
                    self.last_percent = Some(percent);
                    let text = format_progress(&self.label, percent, snapshot);
                    self.emit(text, now);
                }
            }
        }
        Ok(())
    }

    fn is_due(&self, percent: u8, now: Instant) -> bool {
        let Some(last) = self.last_percent else {
            return true;
        };
        if percent < last {
            return false;
        }
        if percent >= last.saturating_add(PERCENT_STEP) {
            return true;
        }
        match self.last_emit {
            Some(at) => now.saturating_duration_since(at) > EMIT_INTERVAL,
            None => true,
        }
    }

    fn emit(&mut self, text: String, now: Instant) {
        self.last_emit = Some(now);
        if self.tx.send(text).is_err() {
            tracing::trace!(label = %self.label, "progress receiver closed, dropping update");
        }
    }
}

/// Render a progress line: `⬇️ video: 42% • 1.5 MB/s • ETA 12s`
pub fn format_progress(label: &str, percent: u8, snapshot: &ProgressSnapshot) -> String {
    let mut parts = vec![format!("⬇️ {label}: {percent}%")];
    if let Some(speed) = snapshot.speed_bytes_per_sec.filter(|s| *s > 0.0) {
        parts.push(format!("{}/s", sizeof_fmt(speed)));
    }
    if let Some(eta) = snapshot.eta_seconds.filter(|e| *e > 0) {
        parts.push(format!("ETA {eta}s"));
    }
    parts.join(" • ")
}
