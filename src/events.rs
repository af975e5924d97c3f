// SPDX-License-Identifier: GPL-3.0-only

//! End-of-stream, error and telemetry reporting
//!
//! Bus handlers run on the engine dispatch loop and fps callbacks on
//! streaming threads. Both only touch the atomics and the error slot of a
//! [`StreamTelemetry`]; the control thread reads them back by polling.

use crate::engine::{BusEvent, BusHandler, BusReaction};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info};

/// Flags and measurements of one stream
#[derive(Debug, Default)]
pub struct StreamTelemetry {
    eos: AtomicBool,
    failed: AtomicBool,
    stop_requested: AtomicBool,
    /// Left (processed) and right (raw) display branch
    fps: [AtomicU32; 2],
    bitrate: AtomicU32,
    error: Mutex<Option<String>>,
}

impl StreamTelemetry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn error_slot(&self) -> MutexGuard<'_, Option<String>> {
        self.error.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn mark_eos(&self) {
        self.eos.store(true, Ordering::SeqCst);
    }

    pub fn is_eos(&self) -> bool {
        self.eos.load(Ordering::SeqCst)
    }

    /// Keep the first message only; returns whether it was stored
    pub fn record_error(&self, message: &str) -> bool {
        self.failed.store(true, Ordering::SeqCst);
        let mut slot = self.error_slot();
        if slot.is_some() {
            return false;
        }
        *slot = Some(message.to_string());
        true
    }

    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn error_message(&self) -> Option<String> {
        self.error_slot().clone()
    }

    pub fn clear_error(&self) {
        self.error_slot().take();
        self.failed.store(false, Ordering::SeqCst);
    }

    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    pub fn set_fps(&self, branch: usize, fps: u32) {
        if let Some(slot) = self.fps.get(branch) {
            slot.store(fps, Ordering::Relaxed);
        }
    }

    pub fn fps(&self, branch: usize) -> u32 {
        self.fps
            .get(branch)
            .map(|slot| slot.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// First non-zero tag wins
    pub fn record_bitrate(&self, bitrate: u32) -> bool {
        bitrate != 0
            && self
                .bitrate
                .compare_exchange(0, bitrate, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
    }

    pub fn bitrate(&self) -> u32 {
        self.bitrate.load(Ordering::SeqCst)
    }
}

/// Bus message handler of one stream
pub struct BusReporter {
    stream: usize,
    telemetry: Arc<StreamTelemetry>,
    /// Every stream of the session, this one included
    peers: Vec<Arc<StreamTelemetry>>,
    /// File sources loop on end-of-stream
    loops: bool,
}

impl BusReporter {
    pub fn new(stream: usize, peers: Vec<Arc<StreamTelemetry>>, loops: bool) -> Option<Self> {
        let telemetry = peers.get(stream)?.clone();
        Some(Self {
            stream,
            telemetry,
            peers,
            loops,
        })
    }

    pub fn handle(&self, event: BusEvent) -> BusReaction {
        match event {
            BusEvent::EndOfStream => {
                if self.loops && !self.telemetry.stop_requested() {
                    debug!(stream = self.stream, "End of stream, rewinding file source");
                    return BusReaction::Rewind;
                }
                self.telemetry.mark_eos();
                if self.peers.iter().all(|t| t.is_eos()) {
                    info!(stream = self.stream, "End of stream on every stream");
                    BusReaction::Quit
                } else {
                    debug!(stream = self.stream, "End of stream");
                    BusReaction::Continue
                }
            }
            BusEvent::Error { message, source } => {
                error!(stream = self.stream, src = source.as_deref().unwrap_or("?"), "Error: {}", message);
                self.telemetry.record_error(&message);
                BusReaction::Quit
            }
            BusEvent::Tag { bitrate } => {
                if let Some(bitrate) = bitrate {
                    if self.telemetry.record_bitrate(bitrate) {
                        debug!(stream = self.stream, bitrate, "Average bitrate tag");
                    }
                }
                BusReaction::Continue
            }
        }
    }

    pub fn into_handler(self) -> BusHandler {
        Box::new(move |event| self.handle(event))
    }
}

/// Result of polling the session for asynchronous events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolledEvent {
    None,
    /// Every active stream reached end-of-stream
    EndOfStream,
    /// Runtime pipeline failure on the polled stream
    Error { stream: usize, message: String },
}

/// End-of-stream is reported only when all streams agree
pub fn poll(streams: &[Arc<StreamTelemetry>], index: usize) -> PolledEvent {
    if !streams.is_empty() && streams.iter().all(|t| t.is_eos()) {
        return PolledEvent::EndOfStream;
    }
    match streams.get(index).and_then(|t| t.error_message()) {
        Some(message) => PolledEvent::Error {
            stream: index,
            message,
        },
        None => PolledEvent::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_first_error_is_kept() {
        let t = StreamTelemetry::new();
        assert!(t.record_error("first"));
        assert!(!t.record_error("second"));
        assert_eq!(t.error_message().as_deref(), Some("first"));
        t.clear_error();
        assert!(!t.has_failed());
    }

    #[test]
    fn fps_branches_are_bounded() {
        let t = StreamTelemetry::new();
        t.set_fps(1, 30);
        t.set_fps(5, 99);
        assert_eq!((t.fps(0), t.fps(1), t.fps(5)), (0, 30, 0));
    }
}
