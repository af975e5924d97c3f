// SPDX-License-Identifier: GPL-3.0-only

//! Live graph of one stream and its teardown

use super::builder::Topology;
use super::linker::Linked;
use super::stages::{Role, StageSet};
use crate::engine::{BusHandler, GraphEngine, GraphState, RenderRect};
use crate::events::StreamTelemetry;
use std::sync::Arc;
use tracing::{debug, warn};

/// Owns every handle of a built stream.
///
/// [`teardown`](Self::teardown) consumes the state, so a stream can only be
/// released once and no pad or watch outlives it.
pub struct PlaybackState<E: GraphEngine> {
    stream: usize,
    topology: Topology,
    graph: E::Graph,
    stages: StageSet<E::Stage>,
    linked: Linked<E>,
    watch: Option<E::Watch>,
    telemetry: Arc<StreamTelemetry>,
    running: bool,
}

impl<E: GraphEngine> PlaybackState<E> {
    pub fn new(
        stream: usize,
        topology: Topology,
        graph: E::Graph,
        stages: StageSet<E::Stage>,
        linked: Linked<E>,
        telemetry: Arc<StreamTelemetry>,
    ) -> Self {
        Self {
            stream,
            topology,
            graph,
            stages,
            linked,
            watch: None,
            telemetry,
            running: false,
        }
    }

    pub fn stream(&self) -> usize {
        self.stream
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn graph(&self) -> &E::Graph {
        &self.graph
    }

    pub fn stages(&self) -> &StageSet<E::Stage> {
        &self.stages
    }

    pub fn telemetry(&self) -> &Arc<StreamTelemetry> {
        &self.telemetry
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Route fps measurements of every display branch into telemetry
    pub fn connect_fps(&self, engine: &E) {
        for (branch, role) in [(0, Role::Display), (1, Role::Display2)] {
            if let Some(wrapper) = self.stages.get(role) {
                let telemetry = Arc::clone(&self.telemetry);
                engine.on_fps(wrapper, Box::new(move |fps| telemetry.set_fps(branch, fps)));
            }
        }
    }

    /// Place display sinks at the given rectangles, first one per branch
    pub fn place(&self, engine: &E, rects: &[RenderRect]) -> Result<(), String> {
        for (role, rect) in [Role::DisplaySink, Role::DisplaySink2].iter().zip(rects) {
            if let Some(sink) = self.stages.get(*role) {
                engine.set_render_rectangle(sink, *rect)?;
            }
        }
        Ok(())
    }

    pub fn watch(&mut self, engine: &E, handler: BusHandler) -> Result<(), String> {
        let watch = engine.watch_bus(&self.graph, handler)?;
        if let Some(old) = self.watch.replace(watch) {
            engine.remove_watch(old);
        }
        Ok(())
    }

    pub fn start(&mut self, engine: &E) -> Result<(), String> {
        engine.set_state(&self.graph, GraphState::Playing)?;
        self.running = true;
        Ok(())
    }

    /// Quiesce and release the stream.
    ///
    /// Every step runs even if the state change fails; the state change
    /// error is returned afterwards.
    pub fn teardown(mut self, engine: &E) -> Result<(), String> {
        self.telemetry.request_stop();

        if let Some((source, pending)) = self.linked.pending.take() {
            engine.cancel_pending(&source, pending);
        }

        debug!(stream = self.stream, "Setting graph to NULL");
        let result = engine.set_state(&self.graph, GraphState::Null);
        if let Err(e) = &result {
            warn!(stream = self.stream, error = %e, "State change to NULL failed");
        }

        for (tee, pad) in self.linked.pads.drain(..) {
            debug!(stream = self.stream, "Releasing request pad");
            engine.release_request_pad(&tee, pad);
        }
        if let Some(watch) = self.watch.take() {
            engine.remove_watch(watch);
        }
        self.telemetry.clear_error();
        self.running = false;

        result
    }
}
