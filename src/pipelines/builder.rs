// SPDX-License-Identifier: GPL-3.0-only

//! Stage creation for one stream
//!
//! The topology is chosen from three axes: source kind, processing kind and
//! sink kind. Only the stages the chosen topology links are created, in the
//! order common, sink, filter, encode, so a missing plugin is reported
//! against the group that needs it.

use super::stages::{Role, StageSet};
use crate::config::{
    Codec, CommonParams, IoMode, ProcessingPath, SinkType, SourceType, StreamParams,
    default_record_path,
};
use crate::constants::factories;
use crate::constants::{
    DEFAULT_DEC_BUFFER_CNT, FILTER2D_KERNEL, MIN_DEC_BUFFER_CNT, PKT_NUMBER_PER_BUFFER,
    SDX_FILTER2D_PLUGIN,
};
use crate::engine::{EncoderSettings, GraphEngine, StageSettings};
use crate::errors::BuildError;
use crate::registry::FilterDescriptor;
use crate::registry::sinks::bus_id;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Wiring of one stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// Src -> Caps -> Display
    Raw,
    /// Decoding URI source, linked to Queue -> Display once a video pad appears
    UriDisplay,
    /// Src -> Caps | RawParse -> Filter -> Display
    Filter,
    /// Src -> Caps -> Enc -> EncCaps -> EncQueue -> Dec -> Queue -> Display
    EncodeDisplay,
    /// Src -> Caps -> Enc -> EncQueue -> EncCaps -> Parser -> Mux -> FileSink
    Record,
    /// Src -> Caps -> Enc -> EncCaps -> Tee, Tee -> TsMux -> RtpPay -> EncQueue -> UdpSink
    Stream,
    /// Src -> Caps -> Tee, Tee -> Queue -> [Filter] -> Display, Tee -> Queue2 -> Display2
    Split { filtered: bool },
}

/// Everything the builder needs for one stream
#[derive(Debug, Clone, Copy)]
pub struct BuildRequest<'a> {
    pub stream: usize,
    pub common: &'a CommonParams,
    pub params: &'a StreamParams,
    /// Present when the filter path is selected
    pub filter: Option<&'a FilterDescriptor>,
    /// Capture device node for live sources
    pub device: Option<&'a str>,
}

impl BuildRequest<'_> {
    fn filtered(&self) -> bool {
        self.params.input.path == ProcessingPath::SdxFilter
    }

    fn live(&self) -> bool {
        self.params.input.source_type == SourceType::Live
    }
}

impl Topology {
    pub fn select(req: &BuildRequest<'_>) -> Result<Topology, BuildError> {
        let input = &req.params.input;
        let sink = req.common.sink_type;

        if sink == SinkType::SplitScreen {
            if !req.live() {
                return Err(BuildError::Unsupported(format!(
                    "split screen with {} source",
                    input.source_type
                )));
            }
            if !req.filtered() && !input.raw {
                return Err(BuildError::Unsupported(
                    "split screen with encode path".to_string(),
                ));
            }
            return Ok(Topology::Split {
                filtered: req.filtered(),
            });
        }

        if req.filtered() {
            if sink != SinkType::Display {
                return Err(BuildError::Unsupported(format!("filter with {} sink", sink)));
            }
            if input.source_type == SourceType::Streaming {
                return Err(BuildError::Unsupported(
                    "filter with streaming source".to_string(),
                ));
            }
            return Ok(Topology::Filter);
        }

        if !req.live() {
            return match sink {
                SinkType::Display => Ok(Topology::UriDisplay),
                other => Err(BuildError::Unsupported(format!(
                    "{} source with {} sink",
                    input.source_type, other
                ))),
            };
        }

        match (input.raw, sink) {
            (true, SinkType::Display) => Ok(Topology::Raw),
            (true, other) => Err(BuildError::Unsupported(format!("raw capture with {} sink", other))),
            (false, SinkType::Display) => Ok(Topology::EncodeDisplay),
            (false, SinkType::Record) => Ok(Topology::Record),
            (false, SinkType::Stream) => Ok(Topology::Stream),
            (false, SinkType::SplitScreen) => Err(BuildError::Unsupported(
                "split screen with encode path".to_string(),
            )),
        }
    }

    fn has_display(&self) -> bool {
        matches!(
            self,
            Topology::Raw
                | Topology::UriDisplay
                | Topology::Filter
                | Topology::EncodeDisplay
                | Topology::Split { .. }
        )
    }

    fn encodes(&self) -> bool {
        matches!(self, Topology::EncodeDisplay | Topology::Record | Topology::Stream)
    }

    fn filters(&self) -> bool {
        matches!(self, Topology::Filter | Topology::Split { filtered: true })
    }
}

#[derive(Debug, Clone, Copy)]
enum Group {
    Common,
    Sink,
    Filter,
    Encode,
}

struct Stager<'e, E: GraphEngine> {
    engine: &'e E,
    stream: usize,
    stages: StageSet<E::Stage>,
}

impl<E: GraphEngine> Stager<'_, E> {
    fn make(
        &mut self,
        group: Group,
        role: Role,
        factory: &str,
        settings: Option<StageSettings>,
    ) -> Result<(), BuildError> {
        let name = role.stage_name(self.stream);
        let Some(stage) = self.engine.make_stage(factory, &name) else {
            let what = format!("{} ({})", factory, name);
            return Err(match group {
                Group::Common => BuildError::Common(what),
                Group::Sink => BuildError::Sink(what),
                Group::Filter => BuildError::Filter(what),
                Group::Encode => BuildError::Encode(what),
            });
        };
        if let Some(settings) = settings {
            self.engine
                .apply(&stage, &settings)
                .map_err(|e| BuildError::Engine(format!("{}: {}", name, e)))?;
        }
        debug!(stream = self.stream, %role, factory, "Stage created");
        self.stages.insert(role, stage);
        Ok(())
    }
}

/// Turn a plain path into a `file://` URI for the decoding source
pub fn to_uri(location: &str) -> String {
    if location.contains("://") {
        return location.to_string();
    }
    let path = Path::new(location);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|dir| dir.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    format!("file://{}", absolute.display())
}

fn mux_factory(location: &Path) -> &'static str {
    match location.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("mkv") => factories::MKV_MUX,
        Some(ext) if ext.eq_ignore_ascii_case("ts") => factories::TS_MUX,
        _ => factories::MP4_MUX,
    }
}

fn codec_factories(codec: Codec) -> (&'static str, &'static str, &'static str) {
    match codec {
        Codec::Avc => (factories::H264_ENC, factories::H264_DEC, factories::H264_PARSE),
        Codec::Hevc => (factories::H265_ENC, factories::H265_DEC, factories::H265_PARSE),
    }
}

/// Decoder entropy buffers are shared by every running stream
pub fn entropy_buffers(num_src: usize) -> u32 {
    let per_stream = DEFAULT_DEC_BUFFER_CNT / num_src.max(1) as u32;
    per_stream.max(MIN_DEC_BUFFER_CNT)
}

/// Number of buffers the live source captures for a bounded recording
fn record_buffers(duration_minutes: u32, frame_rate: u32) -> Option<i32> {
    if duration_minutes == 0 {
        return None;
    }
    let total = u64::from(duration_minutes) * 60 * u64::from(frame_rate);
    Some(i32::try_from(total).unwrap_or(i32::MAX))
}

/// Record location, defaulting to the videos folder
pub fn record_location(params: &StreamParams) -> PathBuf {
    params
        .output
        .file_out
        .clone()
        .unwrap_or_else(|| default_record_path("mp4"))
}

/// Create and add every stage `topology` needs.
///
/// # Arguments
/// * `engine` - Graph engine creating the stages
/// * `graph` - Container the stages are added to
/// * `req` - Validated parameters of the stream
/// * `topology` - Wiring chosen by [`Topology::select`]
///
/// # Returns
/// * `Ok(StageSet)` - Stages keyed by role, display sinks embedded
/// * `Err(BuildError)` - First stage group that could not be created
pub fn build<E: GraphEngine>(
    engine: &E,
    graph: &E::Graph,
    req: &BuildRequest<'_>,
    topology: Topology,
) -> Result<StageSet<E::Stage>, BuildError> {
    let input = &req.params.input;
    let common = req.common;
    let mut st = Stager {
        engine,
        stream: req.stream,
        stages: StageSet::new(),
    };

    info!(stream = req.stream, ?topology, source = %input.source_type, sink = %common.sink_type, "Building pipeline");

    // Common
    let file_raw = topology == Topology::Filter && input.source_type == SourceType::File;
    let uri_source = topology == Topology::UriDisplay;
    if file_raw {
        let location = input.uri.clone().unwrap_or_default();
        st.make(
            Group::Common,
            Role::Source,
            factories::FILE_SRC,
            Some(StageSettings::FileSource { location }),
        )?;
        st.make(
            Group::Common,
            Role::RawParse,
            factories::RAW_PARSE,
            Some(StageSettings::RawParse {
                width: input.width,
                height: input.height,
                format: input.format,
            }),
        )?;
    } else if uri_source {
        let uri = to_uri(input.uri.as_deref().unwrap_or_default());
        let buffering = (input.source_type == SourceType::Streaming)
            .then(|| i32::try_from(u64::from(req.params.encode.bitrate) * 1000).unwrap_or(i32::MAX));
        st.make(
            Group::Common,
            Role::Source,
            factories::URI_SRC,
            Some(StageSettings::UriSource { uri, buffering }),
        )?;
    } else {
        let io_mode = if req.filtered() {
            input.io_mode
        } else {
            IoMode::DmabufExport
        };
        let num_buffers = if common.sink_type == SinkType::Record {
            record_buffers(req.params.output.duration, common.frame_rate)
        } else {
            None
        };
        st.make(
            Group::Common,
            Role::Source,
            factories::V4L2_SRC,
            Some(StageSettings::LiveSource {
                device: req.device.map(str::to_string),
                io_mode,
                num_buffers,
            }),
        )?;
        st.make(
            Group::Common,
            Role::SourceCaps,
            factories::CAPS_FILTER,
            Some(StageSettings::SourceCaps {
                width: input.width,
                height: input.height,
                format: input.format,
                frame_rate: common.frame_rate,
                any_rate: req.filtered(),
            }),
        )?;
    }
    if matches!(topology, Topology::UriDisplay | Topology::EncodeDisplay | Topology::Split { .. }) {
        st.make(Group::Common, Role::Queue, factories::QUEUE, Some(StageSettings::Queue))?;
    }
    if let Topology::Split { .. } = topology {
        st.make(Group::Common, Role::Queue2, factories::QUEUE, Some(StageSettings::Queue))?;
        st.make(Group::Common, Role::Tee, factories::TEE, None)?;
    }

    // Sink
    if topology.has_display() {
        let plane = (common.plane_id > 0).then_some(common.plane_id + req.stream as u32);
        let sync = !topology.filters() && !matches!(topology, Topology::Split { .. });
        st.make(
            Group::Sink,
            Role::Display,
            factories::FPS_DISPLAY_SINK,
            Some(StageSettings::DisplayWrapper { sync }),
        )?;
        st.make(
            Group::Sink,
            Role::DisplaySink,
            factories::KMS_SINK,
            Some(StageSettings::KmsSink {
                bus_id: bus_id(common.driver_type),
                plane_id: plane,
            }),
        )?;
        if let Topology::Split { .. } = topology {
            st.make(
                Group::Sink,
                Role::Display2,
                factories::FPS_DISPLAY_SINK,
                Some(StageSettings::DisplayWrapper { sync }),
            )?;
            st.make(
                Group::Sink,
                Role::DisplaySink2,
                factories::KMS_SINK,
                Some(StageSettings::KmsSink {
                    bus_id: bus_id(common.driver_type),
                    plane_id: plane.map(|p| p + 1),
                }),
            )?;
        }
    }
    let (enc_factory, dec_factory, parse_factory) = codec_factories(req.params.encode.codec);
    match topology {
        Topology::Record => {
            let location = record_location(req.params);
            if let Some(dir) = location.parent() {
                if !dir.as_os_str().is_empty() && !dir.exists() {
                    std::fs::create_dir_all(dir)
                        .map_err(|e| BuildError::Sink(format!("{}: {}", dir.display(), e)))?;
                }
            }
            st.make(Group::Sink, Role::Parser, parse_factory, None)?;
            st.make(Group::Sink, Role::Mux, mux_factory(&location), None)?;
            st.make(
                Group::Sink,
                Role::FileSink,
                factories::FILE_SINK,
                Some(StageSettings::FileSink { location }),
            )?;
        }
        Topology::Stream => {
            let output = &req.params.output;
            st.make(Group::Sink, Role::Tee, factories::TEE, None)?;
            st.make(
                Group::Sink,
                Role::Mux,
                factories::TS_MUX,
                Some(StageSettings::TsMux {
                    alignment: PKT_NUMBER_PER_BUFFER,
                }),
            )?;
            st.make(Group::Sink, Role::RtpPay, factories::RTP_MP2T_PAY, None)?;
            st.make(
                Group::Sink,
                Role::UdpSink,
                factories::UDP_SINK,
                Some(StageSettings::UdpSink {
                    host: output.host_ip.clone(),
                    port: i32::try_from(output.port).unwrap_or(i32::MAX),
                    max_bitrate: u64::from(req.params.encode.bitrate) * 1000,
                }),
            )?;
        }
        _ => {}
    }

    // Filter
    if topology.filters() {
        let filter = req
            .filter
            .ok_or_else(|| BuildError::Filter("no filter selected".to_string()))?;
        let is_2d = filter.plugin == SDX_FILTER2D_PLUGIN;
        let coefficients = if is_2d {
            filter.coefficients.or(req.params.filter.coefficients)
        } else {
            None
        };
        st.make(
            Group::Filter,
            Role::Filter,
            filter.plugin,
            Some(StageSettings::Filter {
                kernel: is_2d.then_some(FILTER2D_KERNEL),
                mode: req.params.filter.mode,
                coefficients,
            }),
        )?;
    }

    // Encode
    if topology.encodes() {
        let encode = &req.params.encode;
        st.make(
            Group::Encode,
            Role::Encoder,
            enc_factory,
            Some(StageSettings::Encoder(EncoderSettings::from(encode))),
        )?;
        st.make(
            Group::Encode,
            Role::EncodedCaps,
            factories::CAPS_FILTER,
            Some(StageSettings::EncodedCaps {
                codec: encode.codec,
                profile: encode.profile,
            }),
        )?;
        st.make(Group::Encode, Role::EncodeQueue, factories::QUEUE, Some(StageSettings::Queue))?;
        if topology == Topology::EncodeDisplay {
            st.make(
                Group::Encode,
                Role::Decoder,
                dec_factory,
                Some(StageSettings::Decoder {
                    entropy_buffers: entropy_buffers(common.num_src),
                    sub_frame: encode.latency_mode == crate::config::LatencyMode::SubFrame,
                }),
            )?;
        }
    }

    let stages = st.stages;

    // Display sinks live inside their wrappers, not in the graph
    let in_graph: Vec<&E::Stage> = stages
        .roles()
        .filter(|r| !matches!(r, Role::DisplaySink | Role::DisplaySink2))
        .filter_map(|r| stages.get(r))
        .collect();
    engine.add_stages(graph, &in_graph).map_err(BuildError::Engine)?;

    for (wrapper, sink) in [
        (Role::Display, Role::DisplaySink),
        (Role::Display2, Role::DisplaySink2),
    ] {
        if let (Some(w), Some(s)) = (stages.get(wrapper), stages.get(sink)) {
            engine.embed_video_sink(w, s);
        }
    }

    debug!(stream = req.stream, count = stages.len(), "All stages created");
    Ok(stages)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(common: &'a CommonParams, params: &'a StreamParams) -> BuildRequest<'a> {
        BuildRequest {
            stream: 0,
            common,
            params,
            filter: None,
            device: None,
        }
    }

    #[test]
    fn topology_follows_sink_and_raw_flag() {
        let mut common = CommonParams::default();
        let mut params = StreamParams::default();
        assert_eq!(Topology::select(&request(&common, &params)), Ok(Topology::Raw));

        params.input.raw = false;
        assert_eq!(Topology::select(&request(&common, &params)), Ok(Topology::EncodeDisplay));
        common.sink_type = SinkType::Record;
        assert_eq!(Topology::select(&request(&common, &params)), Ok(Topology::Record));
        common.sink_type = SinkType::Stream;
        assert_eq!(Topology::select(&request(&common, &params)), Ok(Topology::Stream));
    }

    #[test]
    fn non_live_sources_decode_to_display() {
        let common = CommonParams::default();
        let mut params = StreamParams::default();
        params.input.source_type = SourceType::Streaming;
        assert_eq!(Topology::select(&request(&common, &params)), Ok(Topology::UriDisplay));
    }

    #[test]
    fn filter_cannot_record() {
        let common = CommonParams {
            sink_type: SinkType::Record,
            ..Default::default()
        };
        let mut params = StreamParams::default();
        params.input.path = ProcessingPath::SdxFilter;
        assert!(matches!(
            Topology::select(&request(&common, &params)),
            Err(BuildError::Unsupported(_))
        ));
    }

    #[test]
    fn entropy_buffers_are_split_between_streams() {
        assert_eq!(entropy_buffers(1), 10);
        assert_eq!(entropy_buffers(4), 2);
        assert_eq!(entropy_buffers(8), 2);
    }

    #[test]
    fn mux_follows_extension() {
        assert_eq!(mux_factory(Path::new("a.MKV")), factories::MKV_MUX);
        assert_eq!(mux_factory(Path::new("a.ts")), factories::TS_MUX);
        assert_eq!(mux_factory(Path::new("a")), factories::MP4_MUX);
    }

    #[test]
    fn plain_paths_become_file_uris() {
        assert_eq!(to_uri("/tmp/a.mp4"), "file:///tmp/a.mp4");
        assert_eq!(to_uri("rtsp://cam/1"), "rtsp://cam/1");
        assert_eq!(record_buffers(2, 30), Some(3600));
        assert_eq!(record_buffers(0, 30), None);
    }
}
