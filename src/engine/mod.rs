// SPDX-License-Identifier: GPL-3.0-only

//! Media graph engine abstraction
//!
//! The orchestrator never talks to the multimedia framework directly. It
//! goes through [`GraphEngine`], which the GStreamer implementation in
//! [`gst`] provides for real boards and the test suite fakes.

pub mod gst;
pub mod settings;

pub use settings::{EncoderSettings, StageSettings};

use crate::registry::PluginHost;

/// Target state for a whole graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphState {
    Null,
    Playing,
}

/// Bus messages the reporter cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    EndOfStream,
    Error {
        message: String,
        /// Path of the stage that posted the error
        source: Option<String>,
    },
    /// Tag list; only the bitrate tag is extracted
    Tag { bitrate: Option<u32> },
}

/// What the engine should do after a bus message was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusReaction {
    Continue,
    /// Flush-seek the graph back to time zero
    Rewind,
    /// Leave the run loop
    Quit,
}

pub type BusHandler = Box<dyn FnMut(BusEvent) -> BusReaction + Send + 'static>;

/// Receives rounded fps measurements from a display wrapper
pub type FpsCallback = Box<dyn Fn(u32) + Send + Sync + 'static>;

/// Display overlay placement in plane coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Narrow interface to the multimedia framework.
///
/// # Ownership
///
/// Handles are reference-counted on the engine side, so `Graph` and `Stage`
/// are cheap to clone. Request pads, bus watches and pending dynamic links
/// are owned values that must be handed back through
/// [`release_request_pad`](Self::release_request_pad),
/// [`remove_watch`](Self::remove_watch) and
/// [`cancel_pending`](Self::cancel_pending) on teardown.
///
/// # Threading
///
/// All methods are called from the control thread. Bus handlers run on the
/// engine's dispatch loop and fps callbacks on streaming threads, which is
/// why both must be `Send`.
pub trait GraphEngine: PluginHost {
    type Graph: Clone;
    type Stage: Clone;
    type Pad;
    type Watch;
    type Pending;

    fn new_graph(&self, name: &str) -> Result<Self::Graph, String>;

    /// `None` when the factory is not available
    fn make_stage(&self, factory: &str, name: &str) -> Option<Self::Stage>;

    fn add_stages(&self, graph: &Self::Graph, stages: &[&Self::Stage]) -> Result<(), String>;

    /// Link each stage to the next one
    fn link_chain(&self, chain: &[&Self::Stage]) -> Result<(), String>;

    /// Request a new source pad on a tee and link it to `downstream`
    fn link_request_pad(
        &self,
        tee: &Self::Stage,
        downstream: &Self::Stage,
    ) -> Result<Self::Pad, String>;

    fn release_request_pad(&self, tee: &Self::Stage, pad: Self::Pad);

    /// Link the first video pad `source` exposes to `downstream`.
    ///
    /// Fires at most once; non-video pads are ignored.
    fn link_on_video_pad(&self, source: &Self::Stage, downstream: &Self::Stage) -> Self::Pending;

    /// Disarm a dynamic link that may not have fired yet
    fn cancel_pending(&self, source: &Self::Stage, pending: Self::Pending);

    fn apply(&self, stage: &Self::Stage, settings: &StageSettings) -> Result<(), String>;

    /// Make `sink` the video sink rendered by a display wrapper
    fn embed_video_sink(&self, wrapper: &Self::Stage, sink: &Self::Stage);

    fn on_fps(&self, wrapper: &Self::Stage, callback: FpsCallback);

    fn set_render_rectangle(&self, sink: &Self::Stage, rect: RenderRect) -> Result<(), String>;

    /// Blocks until the state is reached or the change failed
    fn set_state(&self, graph: &Self::Graph, state: GraphState) -> Result<(), String>;

    fn watch_bus(&self, graph: &Self::Graph, handler: BusHandler) -> Result<Self::Watch, String>;

    fn remove_watch(&self, watch: Self::Watch);

    /// Dispatch bus messages until [`quit_loop`](Self::quit_loop)
    fn run_loop(&self);

    fn quit_loop(&self);
}
