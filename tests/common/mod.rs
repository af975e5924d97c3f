// SPDX-License-Identifier: GPL-3.0-only

//! Recording graph engine and device used by the integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use vidpipe::config::SessionConfig;
use vidpipe::constants::{SDX_FILTER2D_PLUGIN, SDX_OPTICALFLOW_PLUGIN};
use vidpipe::controller::PipelineSession;
use vidpipe::device::DeviceControl;
use vidpipe::engine::{
    BusEvent, BusHandler, BusReaction, FpsCallback, GraphEngine, GraphState, RenderRect,
    StageSettings,
};
use vidpipe::errors::DeviceError;
use vidpipe::registry::{DeviceClass, PluginHost};
use vidpipe::validator::SourceConfig;

#[derive(Default)]
pub struct EngineLog {
    /// (factory, name)
    pub stages: Vec<(String, String)>,
    pub added: Vec<String>,
    pub links: Vec<Vec<String>>,
    pub settings: Vec<(String, StageSettings)>,
    pub states: Vec<(String, GraphState)>,
    pub embedded: Vec<(String, String)>,
    pub rects: Vec<(String, RenderRect)>,
    pub live_pads: HashSet<usize>,
    pub released_pads: usize,
    pub live_watches: HashSet<usize>,
    pub live_pending: HashSet<usize>,
    pub cancelled_pending: usize,
    next_id: usize,
}

#[derive(Default)]
pub struct Faults {
    pub missing_factories: HashSet<String>,
    /// Any chain containing this stage name fails to link
    pub broken_link: Option<String>,
    /// Tee refuses a pad towards this stage
    pub broken_pad: Option<String>,
    pub fail_state: Option<GraphState>,
}

/// Graph engine that records every call instead of building media graphs
pub struct FakeEngine {
    plugins: Vec<&'static str>,
    pub faults: Mutex<Faults>,
    log: Mutex<EngineLog>,
    handlers: Mutex<HashMap<String, BusHandler>>,
    fps: Mutex<Vec<(String, FpsCallback)>>,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self::with_plugins(vec![SDX_FILTER2D_PLUGIN, SDX_OPTICALFLOW_PLUGIN])
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

impl FakeEngine {
    pub fn with_plugins(plugins: Vec<&'static str>) -> Self {
        Self {
            plugins,
            faults: Mutex::new(Faults::default()),
            log: Mutex::new(EngineLog::default()),
            handlers: Mutex::new(HashMap::new()),
            fps: Mutex::new(Vec::new()),
        }
    }

    pub fn log(&self) -> MutexGuard<'_, EngineLog> {
        lock(&self.log)
    }

    pub fn faults(&self) -> MutexGuard<'_, Faults> {
        lock(&self.faults)
    }

    pub fn clear_log(&self) {
        *lock(&self.log) = EngineLog::default();
    }

    /// Stage names in creation order
    pub fn stage_names(&self) -> Vec<String> {
        self.log().stages.iter().map(|(_, n)| n.clone()).collect()
    }

    pub fn factories(&self) -> Vec<String> {
        self.log().stages.iter().map(|(f, _)| f.clone()).collect()
    }

    pub fn settings_of(&self, name: &str) -> Option<StageSettings> {
        self.log()
            .settings
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s.clone())
    }

    pub fn last_state(&self, graph: &str) -> Option<GraphState> {
        self.log()
            .states
            .iter()
            .rev()
            .find(|(g, _)| g == graph)
            .map(|(_, s)| *s)
    }

    /// Deliver a bus message to the graph's watch
    pub fn post(&self, graph: &str, event: BusEvent) -> Option<BusReaction> {
        lock(&self.handlers).get_mut(graph).map(|h| h(event))
    }

    pub fn report_fps(&self, wrapper: &str, fps: u32) {
        for (name, cb) in lock(&self.fps).iter() {
            if name == wrapper {
                cb(fps);
            }
        }
    }

    fn next_id(log: &mut EngineLog) -> usize {
        log.next_id += 1;
        log.next_id
    }
}

impl PluginHost for FakeEngine {
    fn has_plugin(&self, name: &str) -> bool {
        self.plugins.contains(&name)
    }
}

impl GraphEngine for FakeEngine {
    type Graph = String;
    type Stage = String;
    type Pad = usize;
    type Watch = (String, usize);
    type Pending = usize;

    fn new_graph(&self, name: &str) -> Result<String, String> {
        Ok(name.to_string())
    }

    fn make_stage(&self, factory: &str, name: &str) -> Option<String> {
        if self.faults().missing_factories.contains(factory) {
            return None;
        }
        self.log()
            .stages
            .push((factory.to_string(), name.to_string()));
        Some(name.to_string())
    }

    fn add_stages(&self, _graph: &String, stages: &[&String]) -> Result<(), String> {
        self.log()
            .added
            .extend(stages.iter().map(|s| s.to_string()));
        Ok(())
    }

    fn link_chain(&self, chain: &[&String]) -> Result<(), String> {
        if let Some(broken) = &self.faults().broken_link {
            if chain.iter().any(|s| *s == broken) {
                return Err(format!("cannot link {}", broken));
            }
        }
        self.log()
            .links
            .push(chain.iter().map(|s| s.to_string()).collect());
        Ok(())
    }

    fn link_request_pad(&self, tee: &String, downstream: &String) -> Result<usize, String> {
        if self.faults().broken_pad.as_ref() == Some(downstream) {
            return Err(format!("no pad towards {}", downstream));
        }
        let mut log = self.log();
        let id = Self::next_id(&mut log);
        log.live_pads.insert(id);
        log.links.push(vec![tee.clone(), downstream.clone()]);
        Ok(id)
    }

    fn release_request_pad(&self, _tee: &String, pad: usize) {
        let mut log = self.log();
        log.live_pads.remove(&pad);
        log.released_pads += 1;
    }

    fn link_on_video_pad(&self, _source: &String, _downstream: &String) -> usize {
        let mut log = self.log();
        let id = Self::next_id(&mut log);
        log.live_pending.insert(id);
        id
    }

    fn cancel_pending(&self, _source: &String, pending: usize) {
        let mut log = self.log();
        log.live_pending.remove(&pending);
        log.cancelled_pending += 1;
    }

    fn apply(&self, stage: &String, settings: &StageSettings) -> Result<(), String> {
        self.log().settings.push((stage.clone(), settings.clone()));
        Ok(())
    }

    fn embed_video_sink(&self, wrapper: &String, sink: &String) {
        self.log().embedded.push((wrapper.clone(), sink.clone()));
    }

    fn on_fps(&self, wrapper: &String, callback: FpsCallback) {
        lock(&self.fps).push((wrapper.clone(), callback));
    }

    fn set_render_rectangle(&self, sink: &String, rect: RenderRect) -> Result<(), String> {
        self.log().rects.push((sink.clone(), rect));
        Ok(())
    }

    fn set_state(&self, graph: &String, state: GraphState) -> Result<(), String> {
        self.log().states.push((graph.clone(), state));
        if self.faults().fail_state == Some(state) {
            return Err(format!("{} refused {:?}", graph, state));
        }
        Ok(())
    }

    fn watch_bus(&self, graph: &String, handler: BusHandler) -> Result<(String, usize), String> {
        lock(&self.handlers).insert(graph.clone(), handler);
        let mut log = self.log();
        let id = Self::next_id(&mut log);
        log.live_watches.insert(id);
        Ok((graph.clone(), id))
    }

    fn remove_watch(&self, watch: (String, usize)) {
        lock(&self.handlers).remove(&watch.0);
        self.log().live_watches.remove(&watch.1);
    }

    fn run_loop(&self) {}

    fn quit_loop(&self) {}
}

/// Device layer with a fixed set of sources
pub struct FakeDevice {
    pub sources: Vec<DeviceClass>,
    pub configured: Vec<SourceConfig>,
    pub controls: Vec<(DeviceClass, String, i64)>,
    pub modes: Vec<(u32, u32)>,
    pub plane_id: u32,
    pub fail_configure: Option<DeviceError>,
}

impl FakeDevice {
    pub fn new(sources: Vec<DeviceClass>) -> Self {
        Self {
            sources,
            configured: Vec::new(),
            controls: Vec::new(),
            modes: vec![(3840, 2160), (1920, 1080)],
            plane_id: 0,
            fail_configure: None,
        }
    }
}

impl Default for FakeDevice {
    fn default() -> Self {
        Self::new(vec![DeviceClass::Tpg, DeviceClass::Csi, DeviceClass::Uvc])
    }
}

impl DeviceControl for FakeDevice {
    fn enumerate_sources(&mut self) -> Vec<DeviceClass> {
        self.sources.clone()
    }

    fn active_plane_id(&self) -> u32 {
        self.plane_id
    }

    fn active_resolution(&self) -> (u32, u32) {
        (3840, 2160)
    }

    fn frame_rate(&self) -> u32 {
        60
    }

    fn configure_source(&mut self, config: &SourceConfig) -> Result<(), DeviceError> {
        if let Some(e) = self.fail_configure.clone() {
            return Err(e);
        }
        self.configured.push(*config);
        Ok(())
    }

    fn device_name(&self, index: usize) -> Option<String> {
        (index < self.sources.len()).then(|| format!("/dev/video{}", index))
    }

    fn try_display_mode(&mut self, _display_id: u32, width: u32, height: u32) -> Result<u32, DeviceError> {
        if self.modes.contains(&(width, height)) {
            Ok(60)
        } else {
            Err(DeviceError::ModeUnavailable { width, height })
        }
    }

    fn set_control(&mut self, class: DeviceClass, name: &str, value: i64) -> Result<(), DeviceError> {
        if !self.sources.contains(&class) {
            return Err(DeviceError::NotFound(format!("{:?}", class)));
        }
        self.controls.push((class, name.to_string(), value));
        Ok(())
    }
}

pub fn session() -> PipelineSession<FakeEngine, FakeDevice> {
    session_with(FakeEngine::default(), FakeDevice::default(), SessionConfig::default())
}

pub fn session_with(
    engine: FakeEngine,
    device: FakeDevice,
    config: SessionConfig,
) -> PipelineSession<FakeEngine, FakeDevice> {
    PipelineSession::new(engine, device, config)
}

/// Existing file to play back
pub fn media_file(name: &str) -> String {
    let path = std::env::temp_dir().join(format!("vidpipe-test-{}-{}", std::process::id(), name));
    std::fs::write(&path, b"\0").unwrap();
    path.display().to_string()
}
