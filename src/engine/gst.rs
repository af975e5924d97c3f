// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer implementation of the graph engine

use super::{
    BusEvent, BusHandler, BusReaction, FpsCallback, GraphEngine, GraphState, RenderRect,
    StageSettings,
};
use crate::constants::{
    FPS_UPDATE_INTERVAL, MAX_FRAME_RATE_DENOM, QOS_DSCP_VALUE, UDP_BUFFER_SIZE,
};
use crate::registry::PluginHost;
use gstreamer as gst;
use gstreamer::glib;
use gstreamer::prelude::*;
use gstreamer_video::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

/// GStreamer-backed engine owning the process main loop
pub struct GstEngine {
    main_loop: glib::MainLoop,
}

/// Dynamic link waiting for the ingestion stage to expose a video pad
pub struct GstPending {
    handler: Option<glib::SignalHandlerId>,
    armed: Arc<AtomicBool>,
}

impl GstEngine {
    pub fn new() -> Result<Self, String> {
        gst::init().map_err(|e| format!("Failed to initialize GStreamer: {}", e))?;
        info!(version = %gst::version_string(), "GStreamer initialized");
        Ok(Self {
            main_loop: glib::MainLoop::new(None, false),
        })
    }

    /// Handle for quitting the loop from a signal handler
    pub fn main_loop(&self) -> glib::MainLoop {
        self.main_loop.clone()
    }
}

/// Set a property from its string form if the stage has it.
///
/// Vendor plugins differ in which knobs they expose and which enum nicks
/// they accept, so a missing property or an unparsable value is logged and
/// skipped.
fn set_if_present(stage: &gst::Element, name: &str, value: &str) -> bool {
    let Some(pspec) = stage.find_property(name) else {
        debug!(stage = %stage.name(), property = name, "Property not supported, skipping");
        return false;
    };
    if !pspec.flags().contains(glib::ParamFlags::WRITABLE) {
        debug!(stage = %stage.name(), property = name, "Property is read-only, skipping");
        return false;
    }
    match glib::Value::deserialize(value, pspec.value_type()) {
        Ok(parsed) => {
            stage.set_property_from_value(name, &parsed);
            true
        }
        Err(err) => {
            warn!(stage = %stage.name(), property = name, value, %err, "Value rejected by plugin, skipping");
            false
        }
    }
}

fn raw_structure(width: u32, height: u32, format: &str) -> gst::structure::Builder {
    gst::Structure::builder("video/x-raw")
        .field("width", width as i32)
        .field("height", height as i32)
        .field("format", format)
}

impl PluginHost for GstEngine {
    fn has_plugin(&self, name: &str) -> bool {
        gst::Registry::get().find_plugin(name).is_some()
    }
}

impl GraphEngine for GstEngine {
    type Graph = gst::Pipeline;
    type Stage = gst::Element;
    type Pad = gst::Pad;
    type Watch = gst::bus::BusWatchGuard;
    type Pending = GstPending;

    fn new_graph(&self, name: &str) -> Result<Self::Graph, String> {
        Ok(gst::Pipeline::with_name(name))
    }

    fn make_stage(&self, factory: &str, name: &str) -> Option<Self::Stage> {
        match gst::ElementFactory::make(factory).name(name).build() {
            Ok(element) => Some(element),
            Err(e) => {
                warn!(factory, error = %e, "Element factory unavailable");
                None
            }
        }
    }

    fn add_stages(&self, graph: &Self::Graph, stages: &[&Self::Stage]) -> Result<(), String> {
        graph
            .add_many(stages.iter().copied())
            .map_err(|e| format!("Failed to add elements: {}", e))
    }

    fn link_chain(&self, chain: &[&Self::Stage]) -> Result<(), String> {
        gst::Element::link_many(chain.iter().copied())
            .map_err(|e| format!("Failed to link elements: {}", e))
    }

    fn link_request_pad(
        &self,
        tee: &Self::Stage,
        downstream: &Self::Stage,
    ) -> Result<Self::Pad, String> {
        let src_pad = tee
            .request_pad_simple("src_%u")
            .ok_or_else(|| format!("{} has no request pad", tee.name()))?;
        let sink_pad = downstream
            .static_pad("sink")
            .ok_or_else(|| format!("{} has no sink pad", downstream.name()))?;
        if let Err(e) = src_pad.link(&sink_pad) {
            tee.release_request_pad(&src_pad);
            return Err(format!("Failed to link tee branch: {:?}", e));
        }
        Ok(src_pad)
    }

    fn release_request_pad(&self, tee: &Self::Stage, pad: Self::Pad) {
        debug!(tee = %tee.name(), pad = %pad.name(), "Releasing request pad");
        tee.release_request_pad(&pad);
    }

    fn link_on_video_pad(&self, source: &Self::Stage, downstream: &Self::Stage) -> Self::Pending {
        let armed = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&armed);
        let downstream = downstream.clone();

        let handler = source.connect_pad_added(move |src, pad| {
            if !flag.load(Ordering::SeqCst) {
                return;
            }
            let caps = pad.current_caps().unwrap_or_else(|| pad.query_caps(None));
            let is_video = caps
                .structure(0)
                .is_some_and(|s| s.name().as_str().starts_with("video/"));
            if !is_video {
                debug!(pad = %pad.name(), caps = %caps, "Ignoring non-video pad");
                return;
            }
            let Some(sink_pad) = downstream.static_pad("sink") else {
                error!(stage = %downstream.name(), "Downstream stage has no sink pad");
                return;
            };
            match pad.link(&sink_pad) {
                Ok(_) => {
                    flag.store(false, Ordering::SeqCst);
                    info!(source = %src.name(), pad = %pad.name(), "Linked dynamic video pad");
                }
                Err(e) => error!(error = ?e, "Failed to link dynamic video pad"),
            }
        });

        GstPending {
            handler: Some(handler),
            armed,
        }
    }

    fn cancel_pending(&self, source: &Self::Stage, mut pending: Self::Pending) {
        pending.armed.store(false, Ordering::SeqCst);
        if let Some(id) = pending.handler.take() {
            source.disconnect(id);
        }
    }

    fn apply(&self, stage: &Self::Stage, settings: &StageSettings) -> Result<(), String> {
        match settings {
            StageSettings::LiveSource {
                device,
                io_mode,
                num_buffers,
            } => {
                if let Some(device) = device {
                    stage.set_property("device", device.as_str());
                }
                set_if_present(stage, "io-mode", io_mode.nick());
                if let Some(n) = num_buffers {
                    stage.set_property("num-buffers", *n);
                }
            }
            StageSettings::FileSource { location } => {
                stage.set_property("location", location.as_str());
            }
            StageSettings::UriSource { uri, buffering } => {
                stage.set_property("uri", uri.as_str());
                if let Some(bytes) = buffering {
                    set_if_present(stage, "buffer-size", &bytes.to_string());
                    set_if_present(stage, "use-buffering", "true");
                }
            }
            StageSettings::SourceCaps {
                width,
                height,
                format,
                frame_rate,
                any_rate,
            } => {
                let rated = raw_structure(*width, *height, format.name())
                    .field(
                        "framerate",
                        gst::Fraction::new(*frame_rate as i32, MAX_FRAME_RATE_DENOM),
                    )
                    .build();
                let mut builder = gst::Caps::builder_full().structure(rated);
                if *any_rate {
                    builder = builder.structure(raw_structure(*width, *height, format.name()).build());
                }
                let caps = builder.build();
                debug!(caps = %caps, "Source caps");
                stage.set_property("caps", &caps);
            }
            StageSettings::RawParse {
                width,
                height,
                format,
            } => {
                stage.set_property("width", *width as i32);
                stage.set_property("height", *height as i32);
                set_if_present(stage, "format", format.raw_parse_nick());
            }
            StageSettings::Encoder(enc) => {
                set_if_present(stage, "gop-length", &enc.gop_len.to_string());
                set_if_present(stage, "gop-mode", enc.gop_mode.nick());
                set_if_present(stage, "low-bandwidth", &enc.low_bandwidth.to_string());
                set_if_present(stage, "target-bitrate", &enc.bitrate.to_string());
                set_if_present(stage, "b-frames", &enc.b_frames.to_string());
                set_if_present(stage, "num-slices", &enc.slices.to_string());
                set_if_present(stage, "control-rate", enc.rate_control.nick());
                set_if_present(stage, "qp-mode", enc.qp_mode.nick());
                set_if_present(stage, "periodicity-idr", &enc.gop_len.to_string());
                if enc.prefetch_buffer {
                    set_if_present(stage, "prefetch-buffer", "true");
                }
                if let Some(filler) = enc.filler_data {
                    set_if_present(stage, "filler-data", &filler.to_string());
                }
                set_if_present(stage, "latency-mode", enc.latency_mode.nick());
            }
            StageSettings::EncodedCaps { codec, profile } => {
                let caps = gst::Caps::builder(codec.media_type())
                    .field("profile", profile.caps_name())
                    .build();
                debug!(caps = %caps, "Encoder caps");
                stage.set_property("caps", &caps);
            }
            StageSettings::Decoder {
                entropy_buffers,
                sub_frame,
            } => {
                if *sub_frame {
                    set_if_present(stage, "latency-mode", "low-latency");
                }
                set_if_present(stage, "internal-entropy-buffers", &entropy_buffers.to_string());
            }
            StageSettings::Filter {
                kernel,
                mode,
                coefficients,
            } => {
                if let Some(kernel) = kernel {
                    set_if_present(stage, "filter-kernel", kernel);
                }
                set_if_present(stage, "filter-mode", &mode.as_property().to_string());
                if let Some(kernel) = coefficients {
                    let flat: Vec<String> =
                        kernel.iter().flatten().map(|c| c.to_string()).collect();
                    set_if_present(stage, "coefficients", &format!("<{}>", flat.join(", ")));
                }
            }
            StageSettings::DisplayWrapper { sync } => {
                set_if_present(stage, "fps-update-interval", &FPS_UPDATE_INTERVAL.to_string());
                set_if_present(stage, "signal-fps-measurements", "true");
                set_if_present(stage, "text-overlay", "false");
                if !sync {
                    set_if_present(stage, "sync", "false");
                }
            }
            StageSettings::KmsSink { bus_id, plane_id } => {
                set_if_present(stage, "bus-id", bus_id);
                if let Some(plane) = plane_id {
                    set_if_present(stage, "plane-id", &plane.to_string());
                }
            }
            StageSettings::FileSink { location } => {
                stage.set_property("location", location.to_string_lossy().as_ref());
            }
            StageSettings::TsMux { alignment } => {
                set_if_present(stage, "alignment", &alignment.to_string());
            }
            StageSettings::UdpSink {
                host,
                port,
                max_bitrate,
            } => {
                stage.set_property("host", host.as_str());
                stage.set_property("port", *port);
                set_if_present(stage, "max-bitrate", &max_bitrate.to_string());
                set_if_present(stage, "qos-dscp", &QOS_DSCP_VALUE.to_string());
                set_if_present(stage, "async", "false");
                set_if_present(stage, "buffer-size", &UDP_BUFFER_SIZE.to_string());
                set_if_present(stage, "max-lateness", "-1");
            }
            StageSettings::Queue => {
                set_if_present(stage, "max-size-bytes", "0");
            }
        }
        Ok(())
    }

    fn embed_video_sink(&self, wrapper: &Self::Stage, sink: &Self::Stage) {
        wrapper.set_property("video-sink", sink);
    }

    fn on_fps(&self, wrapper: &Self::Stage, callback: FpsCallback) {
        wrapper.connect("fps-measurements", false, move |values| {
            if let Some(fps) = values.get(1).and_then(|v| v.get::<f64>().ok()) {
                callback(fps.round().max(0.0) as u32);
            }
            None
        });
    }

    fn set_render_rectangle(&self, sink: &Self::Stage, rect: RenderRect) -> Result<(), String> {
        let overlay = sink
            .dynamic_cast_ref::<gstreamer_video::VideoOverlay>()
            .ok_or_else(|| format!("{} does not implement VideoOverlay", sink.name()))?;
        overlay
            .set_render_rectangle(rect.x, rect.y, rect.width, rect.height)
            .map_err(|e| format!("Failed to set render rectangle: {}", e))?;
        overlay.expose();
        Ok(())
    }

    fn set_state(&self, graph: &Self::Graph, state: GraphState) -> Result<(), String> {
        let target = match state {
            GraphState::Null => gst::State::Null,
            GraphState::Playing => gst::State::Playing,
        };
        graph
            .set_state(target)
            .map(|_| ())
            .map_err(|e| format!("Failed to set {:?}: {}", target, e))
    }

    fn watch_bus(&self, graph: &Self::Graph, mut handler: BusHandler) -> Result<Self::Watch, String> {
        let bus = graph.bus().ok_or("Pipeline has no bus")?;
        let weak = graph.downgrade();
        let main_loop = self.main_loop.clone();

        bus.add_watch(move |_, msg| {
            use gst::MessageView;

            let event = match msg.view() {
                MessageView::Eos(_) => BusEvent::EndOfStream,
                MessageView::Error(err) => BusEvent::Error {
                    message: err.error().to_string(),
                    source: msg.src().map(|s| s.path_string().to_string()),
                },
                MessageView::Tag(tag) => BusEvent::Tag {
                    bitrate: tag.tags().get::<gst::tags::Bitrate>().map(|v| v.get()),
                },
                _ => return glib::ControlFlow::Continue,
            };

            match handler(event) {
                BusReaction::Continue => {}
                BusReaction::Rewind => {
                    if let Some(pipeline) = weak.upgrade() {
                        match pipeline.seek_simple(
                            gst::SeekFlags::FLUSH | gst::SeekFlags::ACCURATE,
                            gst::ClockTime::ZERO,
                        ) {
                            Ok(_) => debug!("Seek to start succeeded"),
                            Err(e) => warn!(error = %e, "Seek to start failed"),
                        }
                    }
                }
                BusReaction::Quit => {
                    if main_loop.is_running() {
                        debug!("Quitting the main loop");
                        main_loop.quit();
                    }
                }
            }
            glib::ControlFlow::Continue
        })
        .map_err(|e| format!("Failed to add bus watch: {}", e))
    }

    fn remove_watch(&self, watch: Self::Watch) {
        drop(watch);
    }

    fn run_loop(&self) {
        self.main_loop.run();
    }

    fn quit_loop(&self) {
        self.main_loop.quit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> Option<gst::Element> {
        gst::init().ok()?;
        gst::ElementFactory::make("queue").build().ok()
    }

    #[test]
    fn unknown_enum_nick_is_skipped() {
        let Some(queue) = queue() else { return };
        assert!(!set_if_present(&queue, "leaky", "sideways"));
        assert!(set_if_present(&queue, "leaky", "downstream"));
    }

    #[test]
    fn missing_property_is_skipped() {
        let Some(queue) = queue() else { return };
        assert!(!set_if_present(&queue, "latency-mode", "low-latency"));
        assert!(set_if_present(&queue, "max-size-bytes", "0"));
        assert_eq!(queue.property::<u32>("max-size-bytes"), 0);
    }
}
