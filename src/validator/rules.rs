// SPDX-License-Identifier: GPL-3.0-only

//! Rule tables, evaluated top to bottom

use crate::config::{
    Codec, CommonParams, DriverType, EncodeParams, Format, GopMode, InputParams, LatencyMode,
    OutputParams, ProcessingPath, Profile, QpMode, RateControl, SinkType, SourceType,
};
use crate::constants::*;
use crate::errors::ValidationError;
use crate::registry::DeviceClass;
use std::path::Path;

/// What one stream rule gets to look at
pub struct StreamView<'a> {
    pub input: &'a InputParams,
    pub encode: &'a EncodeParams,
    pub output: &'a OutputParams,
    pub common: &'a CommonParams,
}

impl StreamView<'_> {
    fn filter_path(&self) -> bool {
        self.input.path == ProcessingPath::SdxFilter
    }

    fn live(&self) -> bool {
        self.input.source_type == SourceType::Live
    }

    fn is_4k(&self) -> bool {
        self.input.width == MAX_WIDTH && self.input.height == MAX_HEIGHT
    }

    fn is_1080p(&self) -> bool {
        self.input.width == MAX_WIDTH / 2 && self.input.height == MAX_HEIGHT / 2
    }

    fn bitrate_over(&self, divisor: u32) -> bool {
        let ceiling = match self.encode.codec {
            Codec::Avc => MAX_H264_BITRATE,
            Codec::Hevc => MAX_H265_BITRATE,
        };
        self.encode.bitrate > ceiling / divisor
    }

    fn base_limits_hit(&self) -> bool {
        self.encode.b_frames > 0
            || !self.encode.enable_l2_cache
            || self.encode.gop_mode == GopMode::LowDelayB
    }
}

pub struct CommonRule {
    pub name: &'static str,
    pub violated: fn(&CommonParams) -> bool,
    pub error: ValidationError,
}

/// When a stream rule applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Always,
    /// Live source, encode path, raw off
    LiveEncode,
}

pub struct StreamRule {
    pub name: &'static str,
    pub scope: Scope,
    pub violated: fn(&StreamView<'_>) -> bool,
    pub error: ValidationError,
}

/// One entry of the per-stream sequence
pub enum Step {
    Check(StreamRule),
    /// Record and stream sinks cannot take raw frames
    CoerceRaw,
}

pub const COMMON_RULES: &[CommonRule] = &[
    CommonRule {
        name: "source-count",
        violated: |c| c.num_src > MAX_SRC_NUM,
        error: ValidationError::SourceCountInvalid,
    },
    CommonRule {
        name: "multi-stream-driver",
        violated: |c| !c.driver_type.is_multi_stream_capable() && c.num_src > 1,
        error: ValidationError::MultiStreamFail,
    },
    CommonRule {
        name: "split-screen-driver",
        violated: |c| {
            !c.driver_type.is_multi_stream_capable() && c.sink_type == SinkType::SplitScreen
        },
        error: ValidationError::SplitScreenFail,
    },
    CommonRule {
        name: "driver-type",
        violated: |c| {
            !matches!(
                c.driver_type,
                DriverType::Dp | DriverType::HdmiTx | DriverType::SdiTx
            )
        },
        error: ValidationError::DriverTypeMismatch,
    },
];

fn file_missing(v: &StreamView<'_>) -> bool {
    match v.input.uri.as_deref() {
        None => true,
        Some(uri) => {
            // Encode path receives `file:` URIs for uridecodebin
            let path = if v.filter_path() {
                uri
            } else {
                uri.strip_prefix("file://")
                    .or_else(|| uri.strip_prefix("file:"))
                    .unwrap_or(uri)
            };
            !Path::new(path).exists()
        }
    }
}

/// Upper slice bound for the (codec, resolution) pair, if bounded
pub fn slice_ceiling(codec: Codec, width: u32, height: u32) -> Option<u32> {
    let uhd = width == MAX_WIDTH && height == MAX_HEIGHT;
    let fhd = width == MAX_WIDTH / 2 && height == MAX_HEIGHT / 2;
    match (codec, uhd, fhd) {
        (Codec::Hevc, true, _) => Some(MAX_H265_4KP_SLICE_CNT),
        (Codec::Hevc, _, true) => Some(MAX_H265_1080P_SLICE_CNT),
        (Codec::Avc, true, _) => Some(MAX_H264_4KP_SLICE_CNT),
        (Codec::Avc, _, true) => Some(MAX_H264_1080P_SLICE_CNT),
        _ => None,
    }
}

pub const STREAM_STEPS: &[Step] = &[
    Step::Check(StreamRule {
        name: "source-type",
        scope: Scope::Always,
        violated: |v| {
            !matches!(
                v.input.source_type,
                SourceType::Live | SourceType::File | SourceType::Streaming
            )
        },
        error: ValidationError::SourceTypeNotSupported,
    }),
    Step::Check(StreamRule {
        name: "format",
        scope: Scope::Always,
        violated: |v| !v.filter_path() && v.input.format != Format::Nv12,
        error: ValidationError::FormatNotSupported,
    }),
    Step::Check(StreamRule {
        name: "file-exists",
        scope: Scope::Always,
        violated: |v| v.input.source_type == SourceType::File && file_missing(v),
        error: ValidationError::FileIo,
    }),
    Step::Check(StreamRule {
        name: "file-single-stream",
        scope: Scope::Always,
        violated: |v| v.input.source_type == SourceType::File && v.common.num_src > 1,
        error: ValidationError::FileInMultiStream,
    }),
    Step::Check(StreamRule {
        name: "max-resolution",
        scope: Scope::Always,
        violated: |v| v.input.width > MAX_WIDTH || v.input.height > MAX_HEIGHT,
        error: ValidationError::ResolutionNotSupported,
    }),
    Step::Check(StreamRule {
        name: "tpg-4k-only",
        scope: Scope::Always,
        violated: |v| {
            !v.filter_path() && v.live() && v.input.device == DeviceClass::Tpg && !v.is_4k()
        },
        error: ValidationError::TpgNot4k,
    }),
    Step::CoerceRaw,
    Step::Check(StreamRule {
        name: "device-type",
        scope: Scope::LiveEncode,
        violated: |v| !v.input.device.is_encode_capable(),
        error: ValidationError::DeviceTypeInvalid,
    }),
    Step::Check(StreamRule {
        name: "non-live-display-only",
        scope: Scope::Always,
        violated: |v| {
            !v.live() && matches!(v.common.sink_type, SinkType::Record | SinkType::Stream)
        },
        error: ValidationError::InputOptionsInvalid,
    }),
    Step::Check(StreamRule {
        name: "sub-frame-record",
        scope: Scope::Always,
        violated: |v| {
            v.common.sink_type == SinkType::Record
                && v.encode.latency_mode == LatencyMode::SubFrame
        },
        error: ValidationError::SubFrameOnRecord,
    }),
    Step::Check(StreamRule {
        name: "limit-1x4kp60",
        scope: Scope::LiveEncode,
        violated: |v| {
            v.is_4k()
                && v.common.num_src == 1
                && v.common.frame_rate == MAX_SUPPORTED_FRAME_RATE
                && v.base_limits_hit()
        },
        error: ValidationError::Limit4kp60,
    }),
    Step::Check(StreamRule {
        name: "limit-2x4kp30",
        scope: Scope::LiveEncode,
        violated: |v| {
            v.is_4k()
                && v.common.num_src == 2
                && v.common.frame_rate == MAX_SUPPORTED_FRAME_RATE / 2
                && (v.base_limits_hit()
                    || v.encode.latency_mode == LatencyMode::SubFrame
                    || v.bitrate_over(2))
        },
        error: ValidationError::Limit2x4kp30,
    }),
    Step::Check(StreamRule {
        name: "limit-4x1080p60",
        scope: Scope::LiveEncode,
        violated: |v| {
            v.is_1080p()
                && v.common.num_src == 4
                && v.common.frame_rate == MAX_SUPPORTED_FRAME_RATE
                && (v.base_limits_hit()
                    || v.encode.latency_mode == LatencyMode::SubFrame
                    || v.bitrate_over(4))
        },
        error: ValidationError::Limit4x1080p60,
    }),
    Step::Check(StreamRule {
        name: "latency-mode",
        scope: Scope::LiveEncode,
        violated: |v| {
            !matches!(
                v.encode.latency_mode,
                LatencyMode::Normal | LatencyMode::SubFrame
            )
        },
        error: ValidationError::LatencyModeNotSupported,
    }),
    Step::Check(StreamRule {
        name: "b-frames-low-latency",
        scope: Scope::LiveEncode,
        violated: |v| {
            (v.encode.rate_control == RateControl::LowLatency
                || v.encode.latency_mode == LatencyMode::SubFrame)
                && v.encode.b_frames > 0
        },
        error: ValidationError::BFrameInLowLatency,
    }),
    Step::Check(StreamRule {
        name: "gop-mode",
        scope: Scope::LiveEncode,
        violated: |v| {
            !matches!(
                v.encode.gop_mode,
                GopMode::Basic | GopMode::LowDelayP | GopMode::LowDelayB
            )
        },
        error: ValidationError::GopModeNotSupported,
    }),
    Step::Check(StreamRule {
        name: "b-frame-range",
        scope: Scope::LiveEncode,
        violated: |v| !(MIN_B_FRAME..=MAX_B_FRAME).contains(&v.encode.b_frames),
        error: ValidationError::BFrameRangeMismatch,
    }),
    Step::Check(StreamRule {
        name: "gop-multiple",
        scope: Scope::LiveEncode,
        violated: |v| v.encode.gop_len % (v.encode.b_frames + 1) != 0,
        error: ValidationError::GopNotSupported,
    }),
    Step::Check(StreamRule {
        name: "gop-length",
        scope: Scope::LiveEncode,
        violated: |v| !(MIN_GOP_LEN..=MAX_GOP_LEN).contains(&v.encode.gop_len),
        error: ValidationError::GopLengthRangeMismatch,
    }),
    Step::Check(StreamRule {
        name: "codec",
        scope: Scope::LiveEncode,
        violated: |v| !matches!(v.encode.codec, Codec::Avc | Codec::Hevc),
        error: ValidationError::EncoderTypeNotSupported,
    }),
    Step::Check(StreamRule {
        name: "slice-range",
        scope: Scope::LiveEncode,
        violated: |v| match slice_ceiling(v.encode.codec, v.input.width, v.input.height) {
            Some(max) => !(MIN_SLICE_VALUE..=max).contains(&v.encode.slices),
            None => false,
        },
        error: ValidationError::SliceRangeMismatch,
    }),
    Step::Check(StreamRule {
        name: "profile",
        scope: Scope::LiveEncode,
        violated: |v| match v.encode.codec {
            Codec::Avc => !matches!(
                v.encode.profile,
                Profile::Baseline | Profile::Main | Profile::High
            ),
            Codec::Hevc => v.encode.profile != Profile::Main,
        },
        error: ValidationError::ProfileNotSupported,
    }),
    Step::Check(StreamRule {
        name: "bitrate",
        scope: Scope::LiveEncode,
        violated: |v| v.bitrate_over(1),
        error: ValidationError::BitrateNotSupported,
    }),
    Step::Check(StreamRule {
        name: "qp-mode",
        scope: Scope::LiveEncode,
        violated: |v| !matches!(v.encode.qp_mode, QpMode::Uniform | QpMode::Auto),
        error: ValidationError::QpModeNotSupported,
    }),
    Step::Check(StreamRule {
        name: "rate-control",
        scope: Scope::LiveEncode,
        violated: |v| {
            !matches!(
                v.encode.rate_control,
                RateControl::Vbr | RateControl::Cbr | RateControl::LowLatency
            )
        },
        error: ValidationError::RateControlNotSupported,
    }),
    Step::Check(StreamRule {
        name: "port-range",
        scope: Scope::LiveEncode,
        violated: |v| {
            v.common.sink_type == SinkType::Stream
                && !(u32::from(MIN_PORT_NUMBER)..=u32::from(MAX_PORT_NUMBER))
                    .contains(&v.output.port)
        },
        error: ValidationError::PortNumberRangeMismatch,
    }),
];
