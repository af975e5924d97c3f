// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Listing sources, sinks and filters
//! - Running one pipeline until end-of-stream, error or Ctrl+C
//! - Cycling through the demo sequence

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use gstreamer::glib;
use tracing::warn;
use vidpipe::config::{
    Codec, GopMode, LatencyMode, Profile, QpMode, RateControl, SessionConfig, SinkType,
};
use vidpipe::constants::{DISPLAY_MODES, STATS_INTERVAL};
use vidpipe::controller::PipelineSession;
use vidpipe::demo::DemoSequence;
use vidpipe::device::{DeviceControl, SourceControl, V4lDevices};
use vidpipe::engine::GraphEngine;
use vidpipe::engine::gst::GstEngine;
use vidpipe::events::PolledEvent;
use vidpipe::registry::filters::FILTER2D_PRESETS;
use vidpipe::registry::{FilterRegistry, SourceRegistry, parse_filter_spec, sinks};

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Options shared by every subcommand
pub struct GlobalOptions {
    pub drm_module: u32,
    pub resolution: Option<String>,
    pub partial_reconfig: bool,
}

/// Selection and encoder flags of `run`
#[derive(Default)]
pub struct RunOptions {
    pub source: Option<String>,
    pub sink: Option<String>,
    pub filter: Option<String>,
    pub accel: Option<String>,
    pub mode: Option<String>,
    pub uri: Option<String>,
    pub sink_type: Option<SinkType>,
    pub output: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u32>,
    pub duration: Option<u32>,
    pub codec: Option<Codec>,
    pub bitrate: Option<u32>,
    pub gop_length: Option<u32>,
    pub b_frames: Option<u32>,
    pub slices: Option<u32>,
    pub profile: Option<Profile>,
    pub rate_control: Option<RateControl>,
    pub gop_mode: Option<GopMode>,
    pub latency_mode: Option<LatencyMode>,
    pub qp_mode: Option<QpMode>,
    /// Route unfiltered display through the encoder and decoder
    pub encode: bool,
    pub controls: Vec<String>,
    pub config: Option<PathBuf>,
    pub stats: bool,
}

/// Resolve a selection value against `choices`.
///
/// `h` prints the choices and yields `None`.
fn pick(kind: &str, value: &str, choices: &[&str]) -> Result<Option<usize>, String> {
    if value == "h" {
        println!("Available {}s:", kind);
        for choice in choices {
            println!("  {}", choice);
        }
        return Ok(None);
    }
    choices
        .iter()
        .position(|c| c.eq_ignore_ascii_case(value))
        .map(Some)
        .ok_or_else(|| {
            format!(
                "Unknown {} '{}'. Valid values: {}",
                kind,
                value,
                choices.join(", ")
            )
        })
}

/// Parse `720p`, `1080p`, `2160p` or `WxH`
fn parse_resolution(value: &str) -> Option<(u32, u32)> {
    match value.to_ascii_lowercase().as_str() {
        "720p" => Some((1280, 720)),
        "1080p" => Some((1920, 1080)),
        "2160p" | "4k" => Some((3840, 2160)),
        other => {
            let (w, h) = other.split_once('x')?;
            Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
        }
    }
}

/// Pick the display mode: the forced one, or the first the connector accepts
fn choose_display_mode(
    device: &mut impl DeviceControl,
    global: &GlobalOptions,
) -> Result<(u32, u32, u32), String> {
    const UNSUPPORTED: &str = "Only supported: 720p, 1080p, 2160p";

    if let Some(value) = global.resolution.as_deref() {
        let mode = parse_resolution(value).ok_or_else(|| format!("Invalid size '{}'", value))?;
        if !DISPLAY_MODES.contains(&mode) {
            return Err(UNSUPPORTED.to_string());
        }
        let refresh = device
            .try_display_mode(global.drm_module, mode.0, mode.1)
            .map_err(|e| format!("Display cannot show {}: {}", value, e))?;
        return Ok((mode.0, mode.1, refresh));
    }

    DISPLAY_MODES
        .iter()
        .find_map(|&(w, h)| {
            device
                .try_display_mode(global.drm_module, w, h)
                .ok()
                .map(|refresh| (w, h, refresh))
        })
        .ok_or_else(|| UNSUPPORTED.to_string())
}

/// List sources, sinks or filters
pub fn list(target: &str) -> CliResult {
    match target {
        "sources" => {
            let mut device = V4lDevices::new(0);
            let sources = SourceRegistry::from_classes(device.enumerate_sources(), true);
            println!("Video sources:");
            for (index, source) in sources.iter().enumerate() {
                println!(
                    "  [{}] {:<8} {} ({}){}",
                    index,
                    source.class.source_type_name(),
                    source.name,
                    source.short_name,
                    if source.has_panel { " *" } else { "" }
                );
            }
            println!();
            println!("  * tunable with --control, e.g. --control tpg-box-speed=4");
        }
        "sinks" => {
            println!("Sinks:");
            for sink in sinks::listed() {
                println!("  {}", sink.name);
            }
        }
        "filters" => {
            let engine = GstEngine::new()?;
            let filters = FilterRegistry::discover(&engine);
            if filters.count() == 0 {
                println!("No accelerator filters found.");
            } else {
                println!("Filters:");
                for filter in filters.iter() {
                    println!(
                        "  {:<12} {} [{}]",
                        filter.alias,
                        filter.display_text,
                        filter.modes.join("/")
                    );
                }
            }
            println!();
            println!("2D filter presets (or NAME/ddddddddd for a custom kernel):");
            for (name, _) in FILTER2D_PRESETS {
                println!("  {}", name);
            }
        }
        other => {
            return Err(format!(
                "Unknown list target '{}'. Valid values: sources, sinks, filters",
                other
            )
            .into());
        }
    }
    Ok(())
}

/// Copy flag values into the session parameters; `false` when only help was printed
fn apply_run_options(config: &mut SessionConfig, opts: &RunOptions) -> Result<bool, String> {
    if let Some(name) = opts.sink.as_deref() {
        let names: Vec<&str> = sinks::SINKS.iter().map(|s| s.name).collect();
        match pick("sink", name, &names)? {
            Some(index) => config.common.driver_type = sinks::SINKS[index].driver,
            None => return Ok(false),
        }
    }
    if let Some(sink_type) = opts.sink_type {
        config.common.sink_type = sink_type;
    }

    for stream in &mut config.streams {
        if let Some(uri) = &opts.uri {
            stream.input.uri = Some(uri.clone());
        }
        if let Some(output) = &opts.output {
            stream.output.file_out = Some(output.clone());
        }
        if let Some(host) = &opts.host {
            stream.output.host_ip = host.clone();
        }
        if let Some(port) = opts.port {
            stream.output.port = port;
        }
        if let Some(duration) = opts.duration {
            stream.output.duration = duration;
        }
        let encode = &mut stream.encode;
        if let Some(codec) = opts.codec {
            encode.codec = codec;
        }
        if let Some(bitrate) = opts.bitrate {
            encode.bitrate = bitrate;
        }
        if let Some(gop) = opts.gop_length {
            encode.gop_len = gop;
        }
        if let Some(b) = opts.b_frames {
            encode.b_frames = b;
        }
        if let Some(slices) = opts.slices {
            encode.slices = slices;
        }
        if let Some(profile) = opts.profile {
            encode.profile = profile;
        }
        if let Some(rc) = opts.rate_control {
            encode.rate_control = rc;
        }
        if let Some(mode) = opts.gop_mode {
            encode.gop_mode = mode;
        }
        if let Some(mode) = opts.latency_mode {
            encode.latency_mode = mode;
        }
        if let Some(mode) = opts.qp_mode {
            encode.qp_mode = mode;
        }
    }
    Ok(true)
}

/// Build the session: display mode, registry, parameters
fn open_session(
    global: &GlobalOptions,
    mut config: SessionConfig,
) -> Result<PipelineSession<GstEngine, V4lDevices>, Box<dyn std::error::Error>> {
    let engine = GstEngine::new()?;
    let mut device = V4lDevices::new(0);
    let (width, height, refresh) = choose_display_mode(&mut device, global)?;
    println!("Display mode: {}x{}@{}", width, height, refresh);

    config.common.partial_reconfig |= global.partial_reconfig;
    config.pipeline.width = width;
    config.pipeline.height = height;
    config.pipeline.frame_rate = refresh;
    Ok(PipelineSession::new(engine, device, config))
}

/// Quit the engine loop and raise the stop flag on Ctrl+C
fn install_stop_handler(engine: &GstEngine) -> Result<Arc<AtomicBool>, ctrlc::Error> {
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    let main_loop = engine.main_loop();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
        main_loop.quit();
    })?;
    Ok(stop_flag)
}

/// Run one pipeline until end-of-stream, a runtime error or Ctrl+C
pub fn run(global: GlobalOptions, opts: RunOptions) -> CliResult {
    let mut config = SessionConfig::load_or_default(opts.config.as_deref())?;
    if !apply_run_options(&mut config, &opts)? {
        return Ok(());
    }

    let mut session = open_session(&global, config)?;
    let mut pipeline = session.config();

    // Source
    if let Some(name) = opts.source.as_deref() {
        let names: Vec<&str> = session
            .registry()
            .sources
            .iter()
            .map(|s| s.class.source_type_name())
            .collect();
        match pick("source", name, &names)? {
            Some(index) => pipeline.source = index,
            None => return Ok(()),
        }
    }

    // Filter
    let filter_names: Vec<&str> = session.registry().filters.iter().map(|f| f.alias).collect();
    if let Some(spec) = opts.filter.as_deref() {
        if spec == "h" {
            pick("filter", spec, &filter_names)?;
            return Ok(());
        }
        let spec = parse_filter_spec(spec)?;
        let index = session
            .registry()
            .filters
            .position(&spec.name)
            .or_else(|| {
                // Preset names select the 2D filter
                vidpipe::registry::filters::preset(&spec.name)
                    .and_then(|_| session.registry().filters.position("filter2d"))
            })
            .ok_or_else(|| {
                format!(
                    "Unknown filter '{}'. Valid values: {}",
                    spec.name,
                    filter_names.join(", ")
                )
            })?;
        if let Some(coefficients) = spec.coefficients {
            session.set_filter_coefficients(coefficients);
        }
        pipeline.filter_type = index + 1;
    }

    // Processing mode
    if let Some(mode) = opts.mode.as_deref() {
        match pick("mode", mode, &["passthrough", "processing"])? {
            None => return Ok(()),
            Some(0) => pipeline.filter_type = 0,
            Some(_) if pipeline.filter_type == 0 => {
                if session.registry().filters.count() == 0 {
                    return Err("No accelerator filter available for processing mode".into());
                }
                pipeline.filter_type = 1;
            }
            Some(_) => {}
        }
    }

    // Acceleration
    if let Some(accel) = opts.accel.as_deref() {
        let modes = session
            .registry()
            .filters
            .modes(pipeline.filter_type.saturating_sub(1));
        match pick("acceleration mode", accel, modes)? {
            Some(index) => pipeline.filter_mode = index,
            None => return Ok(()),
        }
    }

    pipeline.encode |= opts.encode;

    // Device controls
    for control in &opts.controls {
        let (name, value) = control
            .split_once('=')
            .ok_or_else(|| format!("Expected NAME=VALUE, got '{}'", control))?;
        let names: Vec<&str> = SourceControl::ALL.iter().map(|c| c.name()).collect();
        let Some(index) = pick("control", name, &names)? else {
            return Ok(());
        };
        let value: i64 = value
            .parse()
            .map_err(|_| format!("Invalid value for {}: '{}'", name, value))?;
        session.set_source_control(SourceControl::ALL[index], value)?;
    }

    let stop_flag = install_stop_handler(session.engine())?;

    session.change_mode(pipeline)?;
    println!("Pipeline running (press Ctrl+C to stop)");

    let stats_thread = opts.stats.then(|| {
        let telemetry: Vec<_> = session
            .playback()
            .iter()
            .map(|p| Arc::clone(p.telemetry()))
            .collect();
        let stop = stop_flag.clone();
        std::thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                std::thread::sleep(STATS_INTERVAL);
                for (index, t) in telemetry.iter().enumerate() {
                    println!(
                        "stream {}: {} fps (raw branch {} fps), {} bps",
                        index,
                        t.fps(0),
                        t.fps(1),
                        t.bitrate()
                    );
                }
            }
        })
    });

    session.engine().run_loop();

    let mut failure = None;
    for stream in 0..session.common().num_src {
        match session.poll_event(stream) {
            PolledEvent::EndOfStream => println!("End of stream"),
            PolledEvent::Error { stream, message } => {
                failure = Some(format!("stream {}: {}", stream, message));
                break;
            }
            PolledEvent::None => {}
        }
    }

    stop_flag.store(true, Ordering::SeqCst);
    if let Some(handle) = stats_thread {
        if handle.join().is_err() {
            warn!("Stats thread panicked");
        }
    }
    session.stop()?;

    match failure {
        Some(message) => Err(message.into()),
        None => Ok(()),
    }
}

/// Run the main loop for at most `interval`.
///
/// The timer lives on the loop's context, so it fires only while the loop
/// runs and a zero interval still returns.
fn run_for(engine: &GstEngine, interval: Duration) {
    let main_loop = engine.main_loop();
    let context = main_loop.context();
    let timer = glib::timeout_source_new(
        interval,
        Some("demo-step"),
        glib::Priority::DEFAULT,
        move || {
            main_loop.quit();
            glib::ControlFlow::Break
        },
    );
    timer.attach(Some(&context));
    engine.run_loop();
    // Loop may have ended early on end-of-stream or Ctrl+C
    timer.destroy();
}

/// Cycle through the demo steps, `interval` seconds each
pub fn demo(
    global: GlobalOptions,
    interval: u64,
    cycles: Option<usize>,
    uri: Option<String>,
) -> CliResult {
    let mut config = SessionConfig::default();
    if let Some(uri) = uri {
        config.streams[0].input.uri = Some(uri);
    }
    let mut session = open_session(&global, config)?;
    let stop_flag = install_stop_handler(session.engine())?;
    let mut sequence = DemoSequence::default();
    let steps = vidpipe::demo::DEFAULT_STEPS.len();
    let mut remaining = cycles.map(|c| c * steps);

    println!("Demo running (press Ctrl+C to stop)");
    while !stop_flag.load(Ordering::SeqCst) && remaining != Some(0) {
        let step = sequence.advance(&mut session)?;
        println!(
            "Source: {}, filter: {}",
            step.source.source_type_name(),
            step.filter.unwrap_or("none")
        );

        run_for(session.engine(), Duration::from_secs(interval));

        if let PolledEvent::Error { message, .. } = session.poll_event(0) {
            eprintln!("Runtime error: {}", message);
        }
        remaining = remaining.map(|r| r.saturating_sub(1));
    }

    session.stop()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidpipe::errors::DeviceError;
    use vidpipe::registry::DeviceClass;
    use vidpipe::validator::SourceConfig;

    /// Connector that only lists the given modes
    struct Connector(Vec<(u32, u32)>);

    impl DeviceControl for Connector {
        fn enumerate_sources(&mut self) -> Vec<DeviceClass> {
            vec![DeviceClass::Tpg]
        }

        fn active_plane_id(&self) -> u32 {
            0
        }

        fn active_resolution(&self) -> (u32, u32) {
            (3840, 2160)
        }

        fn frame_rate(&self) -> u32 {
            60
        }

        fn configure_source(&mut self, _config: &SourceConfig) -> Result<(), DeviceError> {
            Ok(())
        }

        fn device_name(&self, _index: usize) -> Option<String> {
            None
        }

        fn try_display_mode(&mut self, _display_id: u32, width: u32, height: u32) -> Result<u32, DeviceError> {
            if self.0.contains(&(width, height)) {
                Ok(30)
            } else {
                Err(DeviceError::ModeUnavailable { width, height })
            }
        }

        fn set_control(&mut self, _class: DeviceClass, name: &str, _value: i64) -> Result<(), DeviceError> {
            Err(DeviceError::NotFound(name.to_string()))
        }
    }

    fn global(resolution: Option<&str>) -> GlobalOptions {
        GlobalOptions {
            drm_module: 0,
            resolution: resolution.map(str::to_string),
            partial_reconfig: false,
        }
    }

    #[test]
    fn forced_mode_must_be_available() {
        let mut connector = Connector(vec![(1920, 1080)]);
        assert_eq!(
            choose_display_mode(&mut connector, &global(Some("1080p"))),
            Ok((1920, 1080, 30))
        );
        assert!(choose_display_mode(&mut connector, &global(Some("2160p"))).is_err());
        assert_eq!(
            choose_display_mode(&mut connector, &global(Some("800x600"))),
            Err("Only supported: 720p, 1080p, 2160p".to_string())
        );
    }

    #[test]
    fn step_timer_ends_loop_even_when_immediate() {
        let Ok(engine) = GstEngine::new() else { return };
        run_for(&engine, Duration::ZERO);
        run_for(&engine, Duration::from_millis(20));
        assert!(!engine.main_loop().is_running());
    }

    #[test]
    fn probing_takes_first_available_mode() {
        let mut connector = Connector(vec![(1280, 720), (1920, 1080)]);
        assert_eq!(
            choose_display_mode(&mut connector, &global(None)),
            Ok((1920, 1080, 30))
        );
        assert!(choose_display_mode(&mut Connector(Vec::new()), &global(None)).is_err());
    }
}
