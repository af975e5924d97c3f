// SPDX-License-Identifier: GPL-3.0-only

//! Per-stream graph construction
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │  Source  │──▶│ Caps/Parse  │──▶│ Filter | Enc/Dec │──▶│ Display/File │
//! │ v4l2/uri │   │             │   │    (optional)    │   │   /UDP sink  │
//! └──────────┘   └─────────────┘   └──────────────────┘   └──────────────┘
//! ```
//!
//! - [`builder`]: picks the topology and creates its stages
//! - [`linker`]: connects them, deferring URI sources until a video pad shows up
//! - [`playback`]: owns the result and tears it down in one place

pub mod builder;
pub mod linker;
pub mod playback;
pub mod stages;

pub use builder::{BuildRequest, Topology};
pub use linker::Linked;
pub use playback::PlaybackState;
pub use stages::{Role, StageSet};
