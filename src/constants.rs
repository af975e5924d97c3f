// SPDX-License-Identifier: GPL-3.0-only

//! Hardware limits and stage factory names

use std::time::Duration;

/// Maximum number of concurrent input streams
pub const MAX_SRC_NUM: usize = 4;

/// Maximum supported capture resolution
pub const MAX_WIDTH: u32 = 3840;
pub const MAX_HEIGHT: u32 = 2160;

/// Highest display refresh the encoder limits are specified against
pub const MAX_SUPPORTED_FRAME_RATE: u32 = 60;
pub const MAX_FRAME_RATE_DENOM: i32 = 1;

/// Encoder ranges
pub const MIN_B_FRAME: u32 = 0;
pub const MAX_B_FRAME: u32 = 4;
pub const MIN_GOP_LEN: u32 = 1;
pub const MAX_GOP_LEN: u32 = 1000;

/// Bitrate ceilings in kbps
pub const MAX_H264_BITRATE: u32 = 60_000;
pub const MAX_H265_BITRATE: u32 = 60_000;

/// Slice count bounds per (codec, resolution)
pub const MIN_SLICE_VALUE: u32 = 1;
pub const MAX_H265_4KP_SLICE_CNT: u32 = 22;
pub const MAX_H265_1080P_SLICE_CNT: u32 = 17;
pub const MAX_H264_4KP_SLICE_CNT: u32 = 32;
pub const MAX_H264_1080P_SLICE_CNT: u32 = 28;

/// Stream-out port range
pub const MIN_PORT_NUMBER: u16 = 1024;
pub const MAX_PORT_NUMBER: u16 = 65535;

/// Decoder entropy buffers are shared between streams
pub const DEFAULT_DEC_BUFFER_CNT: u32 = 10;
pub const MIN_DEC_BUFFER_CNT: u32 = 2;

/// Display wrapper fps measurement period in milliseconds
pub const FPS_UPDATE_INTERVAL: i32 = 1000;

/// Stream-out network tuning
pub const QOS_DSCP_VALUE: i32 = 60;
pub const PKT_NUMBER_PER_BUFFER: i32 = 7;
pub const UDP_BUFFER_SIZE: i32 = 20_000_000;

/// DRM bus ids for the display sink
pub const DP_BUS_ID: &str = "fd4a0000.zynqmp-display";
pub const MIXER_BUS_ID: &str = "a0070000.v_mix";

/// Plugins probed for accelerator filters
pub const SDX_FILTER2D_PLUGIN: &str = "sdxfilter2d";
pub const SDX_OPTICALFLOW_PLUGIN: &str = "sdxopticalflow";
pub const FILTER2D_KERNEL: &str = "filter2d_pl_accel";

/// Period used by `run --stats`
pub const STATS_INTERVAL: Duration = Duration::from_secs(1);

/// Display modes tried in order when no resolution is forced
pub const DISPLAY_MODES: [(u32, u32); 3] = [(3840, 2160), (1920, 1080), (1280, 720)];

/// Render rectangle origins for up to four tiles on a 4K plane
pub const QUADRANTS: [(i32, i32); 4] = [(0, 0), (1920, 0), (0, 1080), (1920, 1080)];

/// Stage factory names
pub mod factories {
    pub const V4L2_SRC: &str = "v4l2src";
    pub const FILE_SRC: &str = "filesrc";
    pub const URI_SRC: &str = "uridecodebin";
    pub const RAW_PARSE: &str = "rawvideoparse";
    pub const CAPS_FILTER: &str = "capsfilter";
    pub const QUEUE: &str = "queue";
    pub const TEE: &str = "tee";
    pub const KMS_SINK: &str = "kmssink";
    pub const FPS_DISPLAY_SINK: &str = "fpsdisplaysink";
    pub const FILE_SINK: &str = "filesink";
    pub const UDP_SINK: &str = "udpsink";
    pub const TS_MUX: &str = "mpegtsmux";
    pub const RTP_MP2T_PAY: &str = "rtpmp2tpay";
    pub const MP4_MUX: &str = "qtmux";
    pub const MKV_MUX: &str = "matroskamux";
    pub const H264_ENC: &str = "omxh264enc";
    pub const H264_DEC: &str = "omxh264dec";
    pub const H264_PARSE: &str = "h264parse";
    pub const H265_ENC: &str = "omxh265enc";
    pub const H265_DEC: &str = "omxh265dec";
    pub const H265_PARSE: &str = "h265parse";
}

/// Application information utilities
pub mod app_info {
    /// Version string injected at build time
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}
