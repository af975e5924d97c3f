// SPDX-License-Identifier: GPL-3.0-only

//! Mode-change state machine
//!
//! A [`PipelineSession`] owns the parameters, the capability registry and
//! the running streams. Every source, filter or resolution change goes
//! through [`PipelineSession::change_mode`], which always stops the current
//! graphs before building new ones.

use crate::config::{
    AccelMode, CommonParams, Coefficients, IoMode, PipelineConfig, ProcessingPath, SessionConfig,
    SinkType, SourceType, StreamParams,
};
use crate::constants::QUADRANTS;
use crate::device::{DeviceControl, SourceControl};
use crate::engine::{GraphEngine, RenderRect};
use crate::errors::{BuildError, SessionError};
use crate::events::{self, BusReporter, PolledEvent, StreamTelemetry};
use crate::pipelines::{BuildRequest, PlaybackState, Topology, builder, linker};
use crate::registry::{DeviceClass, FilterRegistry, Registry, SourceRegistry};
use crate::validator::{self, SourceConfig};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Where the session is in a mode change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Building,
    Linking,
    Running,
    /// Last mode change aborted; nothing is running
    Failed,
}

pub struct PipelineSession<E: GraphEngine, D: DeviceControl> {
    engine: E,
    device: D,
    registry: Registry,
    common: CommonParams,
    streams: Vec<StreamParams>,
    config: PipelineConfig,
    playback: Vec<PlaybackState<E>>,
    telemetry: Vec<Arc<StreamTelemetry>>,
    source_config: Option<SourceConfig>,
    state: SessionState,
    has_started: bool,
}

impl<E: GraphEngine, D: DeviceControl> PipelineSession<E, D> {
    /// Enumerate sources and filters, then take ownership of the collaborators.
    ///
    /// The file source is always offered as the terminal slot.
    pub fn new(engine: E, mut device: D, session: SessionConfig) -> Self {
        let sources = SourceRegistry::from_classes(device.enumerate_sources(), true);
        let mut filters = FilterRegistry::discover(&engine);
        if let Some(coefficients) = session.streams.first().and_then(|s| s.filter.coefficients) {
            filters.set_filter2d_coefficients(coefficients);
        }
        info!(
            sources = sources.count(),
            filters = filters.count(),
            "Capability registry ready"
        );
        Self::with_registry(engine, device, Registry::new(sources, filters), session)
    }

    pub fn with_registry(engine: E, device: D, registry: Registry, session: SessionConfig) -> Self {
        let mut session = session;
        session.normalize();
        let mut common = session.common;
        if common.plane_id == 0 {
            common.plane_id = device.active_plane_id();
        }
        Self {
            engine,
            device,
            registry,
            common,
            streams: session.streams,
            config: session.pipeline,
            playback: Vec::new(),
            telemetry: Vec::new(),
            source_config: None,
            state: SessionState::Stopped,
            has_started: false,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn common(&self) -> &CommonParams {
        &self.common
    }

    pub fn common_mut(&mut self) -> &mut CommonParams {
        &mut self.common
    }

    pub fn streams(&self) -> &[StreamParams] {
        &self.streams
    }

    pub fn stream_mut(&mut self, index: usize) -> Option<&mut StreamParams> {
        self.streams.get_mut(index)
    }

    pub fn config(&self) -> PipelineConfig {
        self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn source_config(&self) -> Option<SourceConfig> {
        self.source_config
    }

    /// Stream graphs currently owned by the session
    pub fn playback(&self) -> &[PlaybackState<E>] {
        &self.playback
    }

    pub fn set_uri(&mut self, stream: usize, uri: Option<String>) -> Result<(), SessionError> {
        let params = self
            .streams
            .get_mut(stream)
            .ok_or_else(|| SessionError::InvalidSelection(format!("stream {}", stream)))?;
        params.input.uri = uri;
        Ok(())
    }

    /// Stop the current pipeline, apply `config` and start a new one
    pub fn change_mode(&mut self, config: PipelineConfig) -> Result<(), SessionError> {
        if self.has_started {
            if let Err(e) = self.stop() {
                warn!(error = %e, "Stopping the previous pipeline failed");
            }
        }
        self.has_started = true;

        self.config = config;
        self.common.frame_rate = config.frame_rate;
        info!(
            source = config.source,
            filter_type = config.filter_type,
            filter_mode = config.filter_mode,
            width = config.width,
            height = config.height,
            fps = config.frame_rate,
            "Mode change"
        );

        let result = self.start_pipeline();
        if let Err(e) = &result {
            error!(error = %e, "Mode change failed");
            // Streams built before the failure never reach the caller
            for playback in self.playback.drain(..) {
                if let Err(e) = playback.teardown(&self.engine) {
                    warn!(error = %e, "Teardown of partial pipeline failed");
                }
            }
            self.state = SessionState::Failed;
        }
        result
    }

    fn start_pipeline(&mut self) -> Result<(), SessionError> {
        self.derive_input()?;

        self.source_config = validator::validate(&self.common, &mut self.streams)?;
        if let Some(source) = self.source_config.filter(|s| s.live) {
            self.device.configure_source(&source)?;
        }

        let num_src = self.common.num_src.min(self.streams.len());
        self.telemetry = (0..num_src).map(|_| StreamTelemetry::new()).collect();
        for index in 0..num_src {
            self.build_stream(index)?;
        }

        for index in 0..self.playback.len() {
            self.run_stream(index)?;
        }
        self.state = SessionState::Running;
        info!(streams = self.playback.len(), "Pipeline running");
        Ok(())
    }

    /// Re-derive stream 0's input from the selected source and filter
    fn derive_input(&mut self) -> Result<(), SessionError> {
        let source = self.config.source;
        let class = self
            .registry
            .sources
            .class(source)
            .ok_or_else(|| SessionError::InvalidSelection(format!("source {}", source)))?;
        let stream = self
            .streams
            .first()
            .ok_or_else(|| SessionError::InvalidSelection("no stream configured".to_string()))?;

        if self.registry.sources.is_terminal_file(source) && stream.input.uri.is_none() {
            return Err(SessionError::NoFileSelected);
        }

        let filter = if self.config.filter_type > 0 {
            let index = self.config.filter_type - 1;
            let filter = self.registry.filters.get(index).ok_or_else(|| {
                SessionError::InvalidSelection(format!("filter type {}", self.config.filter_type))
            })?;
            if self.config.filter_mode >= filter.modes.len() {
                debug!(requested = self.config.filter_mode, "Filter mode out of range, using mode 0");
                self.config.filter_mode = 0;
            }
            let mode = match filter.mode_name(self.config.filter_mode) {
                Some(name) if name.eq_ignore_ascii_case("SW") => AccelMode::Software,
                _ => AccelMode::Hardware,
            };
            Some((filter.plugin, mode))
        } else {
            None
        };

        let config = self.config;
        let device_name = self.device.device_name(source);
        self.registry.sources.bind_with(source, |_| device_name);

        let Some(stream) = self.streams.first_mut() else {
            return Err(SessionError::InvalidSelection("no stream configured".to_string()));
        };
        let input = &mut stream.input;
        input.device = class;
        input.device_index = source;
        input.width = config.width;
        input.height = config.height;
        input.source_type = match (class, input.uri.as_deref()) {
            (DeviceClass::File, Some(uri)) if uri.contains("://") && !uri.starts_with("file:") => {
                SourceType::Streaming
            }
            (DeviceClass::File, _) => SourceType::File,
            _ => SourceType::Live,
        };

        match filter {
            Some((plugin, mode)) => {
                input.raw = false;
                input.path = ProcessingPath::SdxFilter;
                input.io_mode = if mode == AccelMode::Software || class.needs_mmap() {
                    IoMode::Mmap
                } else {
                    IoMode::DmabufExport
                };
                stream.filter.plugin = plugin.to_string();
                stream.filter.mode = mode;
                if self.common.partial_reconfig {
                    info!(plugin, ?mode, "Filter bitstream loaded by partial reconfiguration");
                }
            }
            None => {
                input.raw = !config.encode;
                input.path = ProcessingPath::Vcu;
                input.io_mode = IoMode::DmabufExport;
            }
        }
        debug!(
            device = ?class,
            source_type = %stream.input.source_type,
            raw = stream.input.raw,
            path = %stream.input.path,
            "Input derived"
        );
        Ok(())
    }

    fn build_stream(&mut self, index: usize) -> Result<(), SessionError> {
        self.state = SessionState::Building;
        let params = &self.streams[index];
        let filter = if params.input.path == ProcessingPath::SdxFilter {
            self.registry
                .filters
                .iter()
                .find(|f| f.plugin == params.filter.plugin)
        } else {
            None
        };
        let device = self.registry.sources.get(params.input.device_index).and_then(|s| {
            (s.class == params.input.device)
                .then(|| s.handle.clone())
                .flatten()
        });
        let req = BuildRequest {
            stream: index,
            common: &self.common,
            params,
            filter,
            device: device.as_deref(),
        };

        let topology = Topology::select(&req)?;
        let graph = self
            .engine
            .new_graph(&format!("vidpipe-{}", index))
            .map_err(BuildError::Engine)?;
        let stages = builder::build(&self.engine, &graph, &req, topology)?;

        self.state = SessionState::Linking;
        let linked = linker::link(&self.engine, topology, &stages)?;

        self.playback.push(PlaybackState::new(
            index,
            topology,
            graph,
            stages,
            linked,
            Arc::clone(&self.telemetry[index]),
        ));
        Ok(())
    }

    fn render_rects(&self, index: usize) -> Vec<RenderRect> {
        let input = &self.streams[index].input;
        let rect = |q: usize| {
            QUADRANTS.get(q).map(|(x, y)| RenderRect {
                x: *x,
                y: *y,
                width: input.width as i32,
                height: input.height as i32,
            })
        };
        match self.common.sink_type {
            SinkType::SplitScreen => [rect(2 * index), rect(2 * index + 1)]
                .into_iter()
                .flatten()
                .collect(),
            SinkType::Display if self.common.num_src > 1 => rect(index).into_iter().collect(),
            _ => Vec::new(),
        }
    }

    fn run_stream(&mut self, index: usize) -> Result<(), SessionError> {
        let stream = self.playback[index].stream();
        let loops = self.streams[stream].input.source_type == SourceType::File;
        let reporter = BusReporter::new(stream, self.telemetry.clone(), loops)
            .ok_or(SessionError::NotInitialized)?;
        let rects = self.render_rects(stream);

        let playback = &mut self.playback[index];
        playback
            .watch(&self.engine, reporter.into_handler())
            .map_err(SessionError::StateChange)?;
        playback.connect_fps(&self.engine);
        if let Err(e) = playback.place(&self.engine, &rects) {
            warn!(stream, error = %e, "Failed to place display overlay");
        }
        playback.start(&self.engine).map_err(SessionError::StateChange)?;
        debug!(stream, "Stream playing");
        Ok(())
    }

    /// Tear down every stream; the first state change failure is returned
    pub fn stop(&mut self) -> Result<(), SessionError> {
        if !self.has_started {
            return Err(SessionError::NotInitialized);
        }
        let mut result = Ok(());
        for playback in self.playback.drain(..) {
            let stream = playback.stream();
            if let Err(e) = playback.teardown(&self.engine) {
                error!(stream, error = %e, "Teardown failed");
                if result.is_ok() {
                    result = Err(SessionError::StateChange(e));
                }
            }
        }
        self.state = SessionState::Stopped;
        debug!("Pipeline stopped");
        result
    }

    /// Switch to another source, restoring the previous configuration if
    /// the new one cannot run.
    ///
    /// A missing file is reported without rollback; the attempted source
    /// index stays selected.
    pub fn select_input(&mut self, source: usize) -> Result<(), SessionError> {
        let previous = self.config;
        let attempt = PipelineConfig { source, ..previous };
        match self.change_mode(attempt) {
            Ok(()) => Ok(()),
            Err(SessionError::NoFileSelected) => Err(SessionError::NoFileSelected),
            Err(e) => {
                warn!(source, previous = previous.source, "Rolling back to previous input");
                if let Err(rollback) = self.change_mode(previous) {
                    error!(error = %rollback, "Rollback to previous input failed");
                }
                Err(e)
            }
        }
    }

    pub fn set_filter_type(&mut self, filter_type: usize) -> Result<(), SessionError> {
        self.change_mode(PipelineConfig {
            filter_type,
            ..self.config
        })
    }

    pub fn set_filter_mode(&mut self, filter_mode: usize) -> Result<(), SessionError> {
        self.change_mode(PipelineConfig {
            filter_mode,
            ..self.config
        })
    }

    pub fn set_video(&mut self, width: u32, height: u32, frame_rate: u32) -> Result<(), SessionError> {
        self.change_mode(PipelineConfig {
            width,
            height,
            frame_rate,
            ..self.config
        })
    }

    /// Store a 2D filter kernel for the next build
    pub fn set_filter_coefficients(&mut self, coefficients: Coefficients) -> bool {
        let applied = self.registry.filters.set_filter2d_coefficients(coefficients);
        if applied {
            for stream in &mut self.streams {
                stream.filter.coefficients = Some(coefficients);
            }
        } else {
            warn!("2D filter not present, coefficients ignored");
        }
        applied
    }

    pub fn set_source_control(&mut self, control: SourceControl, value: i64) -> Result<(), SessionError> {
        self.device
            .set_control(control.class(), control.driver_name(), value)?;
        Ok(())
    }

    /// One value per display branch: two for split screen
    pub fn fps(&self, stream: usize) -> Vec<u32> {
        let Some(t) = self.telemetry.get(stream) else {
            return Vec::new();
        };
        if self.common.sink_type == SinkType::SplitScreen {
            vec![t.fps(0), t.fps(1)]
        } else {
            vec![t.fps(0)]
        }
    }

    /// Average bitrate tag, reported for file and network sources only
    pub fn bitrate(&self, stream: usize) -> u32 {
        let non_live = self
            .streams
            .get(stream)
            .map(|s| matches!(s.input.source_type, SourceType::File | SourceType::Streaming))
            .unwrap_or(false);
        match self.telemetry.get(stream) {
            Some(t) if non_live => t.bitrate(),
            _ => 0,
        }
    }

    pub fn poll_event(&self, stream: usize) -> PolledEvent {
        events::poll(&self.telemetry, stream)
    }
}
