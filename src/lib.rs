// SPDX-License-Identifier: GPL-3.0-only

//! vidpipe - hardware-accelerated video pipeline orchestrator
//!
//! Builds capture, filter, encode and display graphs on embedded boards and
//! switches between them at runtime.
//!
//! # Architecture
//!
//! - [`validator`]: parameter rules and the source configuration they derive
//! - [`registry`]: sources, sinks and accelerator filters present on the board
//! - [`pipelines`]: per-stream graph construction, linking and teardown
//! - [`controller`]: the mode-change state machine
//! - [`events`]: bus handling and per-stream telemetry
//! - [`engine`]: media framework seam and its GStreamer implementation
//! - [`device`]: V4L2 and display-connector control
//! - [`demo`]: scripted walk through source and filter combinations
//!
//! # Example
//!
//! ```ignore
//! let engine = GstEngine::new()?;
//! let mut session = PipelineSession::new(engine, V4lDevices::new(0), SessionConfig::default());
//! session.change_mode(session.config())?;
//! session.engine().run_loop();
//! session.stop()?;
//! ```

pub mod config;
pub mod constants;
pub mod controller;
pub mod demo;
pub mod device;
pub mod engine;
pub mod errors;
pub mod events;
pub mod pipelines;
pub mod registry;
pub mod validator;

// Re-export commonly used types
pub use config::{PipelineConfig, SessionConfig};
pub use controller::{PipelineSession, SessionState};
pub use errors::{AppError, AppResult, SessionError};
