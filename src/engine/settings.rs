// SPDX-License-Identifier: GPL-3.0-only

//! Typed per-stage settings
//!
//! Builders describe what a stage should do with one of these records; the
//! engine translates it to framework properties. Nothing outside the engine
//! sets properties by name.

use crate::config::{
    AccelMode, Codec, Coefficients, EncodeParams, Format, GopMode, IoMode, LatencyMode, Profile,
    QpMode, RateControl,
};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum StageSettings {
    /// V4L2 capture
    LiveSource {
        device: Option<String>,
        io_mode: IoMode,
        /// Stop after this many buffers (record duration)
        num_buffers: Option<i32>,
    },
    /// Raw frames read from disk, filter path only
    FileSource { location: String },
    /// Decoding ingestion for file and network URIs
    UriSource {
        uri: String,
        /// Buffer size in bytes for network sources
        buffering: Option<i32>,
    },
    /// Raw caps constraint after ingestion
    SourceCaps {
        width: u32,
        height: u32,
        format: Format,
        frame_rate: u32,
        /// Also accept any frame rate (filter path)
        any_rate: bool,
    },
    /// Unframed raw video on the filter path
    RawParse {
        width: u32,
        height: u32,
        format: Format,
    },
    Encoder(EncoderSettings),
    /// Encoded caps carrying the profile
    EncodedCaps { codec: Codec, profile: Profile },
    Decoder {
        entropy_buffers: u32,
        sub_frame: bool,
    },
    Filter {
        /// Kernel the PL accelerator loads
        kernel: Option<&'static str>,
        mode: AccelMode,
        coefficients: Option<Coefficients>,
    },
    /// fpsdisplaysink wrapper around the display sink
    DisplayWrapper { sync: bool },
    KmsSink {
        bus_id: &'static str,
        plane_id: Option<u32>,
    },
    FileSink { location: PathBuf },
    TsMux { alignment: i32 },
    UdpSink {
        host: String,
        port: i32,
        /// Bits per second
        max_bitrate: u64,
    },
    /// Queue with no byte limit
    Queue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderSettings {
    pub gop_len: u32,
    pub gop_mode: GopMode,
    pub low_bandwidth: bool,
    /// kbps
    pub bitrate: u32,
    pub b_frames: u32,
    pub slices: u32,
    pub rate_control: RateControl,
    pub qp_mode: QpMode,
    pub prefetch_buffer: bool,
    /// Only meaningful for CBR
    pub filler_data: Option<bool>,
    pub latency_mode: LatencyMode,
}

impl From<&EncodeParams> for EncoderSettings {
    fn from(p: &EncodeParams) -> Self {
        Self {
            gop_len: p.gop_len,
            gop_mode: p.gop_mode,
            low_bandwidth: p.low_bandwidth,
            bitrate: p.bitrate,
            b_frames: p.b_frames,
            slices: p.slices,
            rate_control: p.rate_control,
            qp_mode: p.qp_mode,
            prefetch_buffer: p.enable_l2_cache,
            filler_data: (p.rate_control == RateControl::Cbr).then_some(p.filler_data),
            latency_mode: p.latency_mode,
        }
    }
}

impl GopMode {
    pub fn nick(&self) -> &'static str {
        match self {
            GopMode::Basic => "basic",
            GopMode::Pyramidal => "pyramidal",
            GopMode::Adaptive => "adaptive",
            GopMode::LowDelayP => "low-delay-p",
            GopMode::LowDelayB => "low-delay-b",
        }
    }
}

impl RateControl {
    pub fn nick(&self) -> &'static str {
        match self {
            RateControl::ConstQp => "disable",
            RateControl::Vbr => "variable",
            RateControl::Cbr => "constant",
            RateControl::LowLatency => "low-latency",
        }
    }
}

impl QpMode {
    pub fn nick(&self) -> &'static str {
        match self {
            QpMode::Uniform => "uniform",
            QpMode::Roi => "roi",
            QpMode::Auto => "auto",
        }
    }
}

impl LatencyMode {
    pub fn nick(&self) -> &'static str {
        match self {
            LatencyMode::Normal => "normal",
            LatencyMode::SubFrame => "low-latency",
        }
    }
}

impl Codec {
    pub fn media_type(&self) -> &'static str {
        match self {
            Codec::Avc => "video/x-h264",
            Codec::Hevc => "video/x-h265",
        }
    }
}

impl Format {
    /// Value of rawvideoparse's `format` enum
    pub fn raw_parse_nick(&self) -> &'static str {
        match self {
            Format::Nv12 => "nv12",
            Format::Nv16 => "nv16",
            Format::Yuy2 => "yuy2",
        }
    }
}
