// SPDX-License-Identifier: GPL-3.0-only

//! Parameter records and session configuration
//!
//! The flat records mirror what each stage needs: [`InputParams`] for the
//! ingestion side, [`EncodeParams`] for the codec, [`OutputParams`] for the
//! record/stream sinks and [`CommonParams`] for values shared by every
//! stream. A [`SessionConfig`] bundles one set per stream and can be read
//! from JSON so multi-stream setups do not need a wall of flags.

use crate::errors::{AppError, AppResult};
use crate::registry::DeviceClass;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Fixed set of named values that can be parsed from the command line
pub trait Choice: Sized + Copy + 'static {
    const KIND: &'static str;
    const ALL: &'static [Self];

    fn name(&self) -> &'static str;
}

/// Unknown value for a [`Choice`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseChoiceError {
    pub kind: &'static str,
    pub value: String,
    pub valid: Vec<&'static str>,
}

impl fmt::Display for ParseChoiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown {} '{}', expected one of: {}",
            self.kind,
            self.value,
            self.valid.join(", ")
        )
    }
}

impl std::error::Error for ParseChoiceError {}

/// Case-insensitive lookup against [`Choice::ALL`]
pub fn parse_choice<T: Choice>(s: &str) -> Result<T, ParseChoiceError> {
    T::ALL
        .iter()
        .copied()
        .find(|v| v.name().eq_ignore_ascii_case(s.trim()))
        .ok_or_else(|| ParseChoiceError {
            kind: T::KIND,
            value: s.to_string(),
            valid: T::ALL.iter().map(|v| v.name()).collect(),
        })
}

macro_rules! choice {
    ($ty:ident, $kind:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl Choice for $ty {
            const KIND: &'static str = $kind;
            const ALL: &'static [Self] = &[$($ty::$variant),+];

            fn name(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }

        impl FromStr for $ty {
            type Err = ParseChoiceError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_choice(s)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

/// Where a stream ends up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SinkType {
    /// RTP/MPEG-TS over UDP
    Stream,
    /// Muxed file on disk
    Record,
    #[default]
    Display,
    /// Processed and raw branches side by side
    SplitScreen,
}
choice!(SinkType, "sink type", {
    Stream => "stream",
    Record => "record",
    Display => "display",
    SplitScreen => "split-screen",
});

/// Display or transport output driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DriverType {
    #[default]
    Dp,
    HdmiTx,
    SdiTx,
}
choice!(DriverType, "sink", {
    Dp => "dp",
    HdmiTx => "hdmi",
    SdiTx => "sdi",
});

impl DriverType {
    /// DP and SDI carry a single stream and cannot split the screen
    pub fn is_multi_stream_capable(&self) -> bool {
        matches!(self, DriverType::HdmiTx)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceType {
    #[default]
    Live,
    File,
    Streaming,
}
choice!(SourceType, "source type", {
    Live => "live",
    File => "file",
    Streaming => "streaming",
});

/// Which accelerator sits between ingestion and sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessingPath {
    /// Video codec unit: raw passthrough or encode/decode
    #[default]
    Vcu,
    /// Programmable-logic image filter
    SdxFilter,
}
choice!(ProcessingPath, "mode", {
    Vcu => "passthrough",
    SdxFilter => "processing",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Format {
    #[default]
    Nv12,
    Nv16,
    Yuy2,
}
choice!(Format, "format", {
    Nv12 => "NV12",
    Nv16 => "NV16",
    Yuy2 => "YUY2",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Codec {
    #[default]
    Avc,
    Hevc,
}
choice!(Codec, "codec", {
    Avc => "avc",
    Hevc => "hevc",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LatencyMode {
    #[default]
    Normal,
    SubFrame,
}
choice!(LatencyMode, "latency mode", {
    Normal => "normal",
    SubFrame => "sub-frame",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RateControl {
    ConstQp,
    #[default]
    Vbr,
    Cbr,
    LowLatency,
}
choice!(RateControl, "rate control", {
    ConstQp => "const-qp",
    Vbr => "vbr",
    Cbr => "cbr",
    LowLatency => "low-latency",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QpMode {
    #[default]
    Uniform,
    Roi,
    Auto,
}
choice!(QpMode, "qp mode", {
    Uniform => "uniform",
    Roi => "roi",
    Auto => "auto",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GopMode {
    #[default]
    Basic,
    Pyramidal,
    Adaptive,
    LowDelayP,
    LowDelayB,
}
choice!(GopMode, "gop mode", {
    Basic => "basic",
    Pyramidal => "pyramidal",
    Adaptive => "adaptive",
    LowDelayP => "low-delay-p",
    LowDelayB => "low-delay-b",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    Baseline,
    #[default]
    Main,
    High,
}
choice!(Profile, "profile", {
    Baseline => "baseline",
    Main => "main",
    High => "high",
});

impl Profile {
    /// Profile string carried in encoder caps
    pub fn caps_name(&self) -> &'static str {
        match self {
            Profile::Baseline => "constrained-baseline",
            Profile::Main => "main",
            Profile::High => "high",
        }
    }
}

/// Buffer sharing mode of the live capture stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IoMode {
    Mmap,
    #[default]
    DmabufExport,
}

impl IoMode {
    pub fn nick(&self) -> &'static str {
        match self {
            IoMode::Mmap => "mmap",
            IoMode::DmabufExport => "dmabuf",
        }
    }
}

/// Filter execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccelMode {
    Software,
    #[default]
    Hardware,
}
choice!(AccelMode, "accel", {
    Software => "sw",
    Hardware => "hw",
});

impl AccelMode {
    /// Value of the filter stage's `filter-mode` property
    pub fn as_property(&self) -> i32 {
        match self {
            AccelMode::Software => 0,
            AccelMode::Hardware => 1,
        }
    }
}

/// 3x3 convolution kernel for the 2D filter
pub type Coefficients = [[i16; 3]; 3];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeParams {
    pub enable_l2_cache: bool,
    pub low_bandwidth: bool,
    pub filler_data: bool,
    /// Target bitrate in kbps
    pub bitrate: u32,
    pub gop_len: u32,
    pub b_frames: u32,
    pub slices: u32,
    pub qp_mode: QpMode,
    pub rate_control: RateControl,
    pub profile: Profile,
    pub codec: Codec,
    pub gop_mode: GopMode,
    pub latency_mode: LatencyMode,
}

impl Default for EncodeParams {
    fn default() -> Self {
        Self {
            enable_l2_cache: true,
            low_bandwidth: false,
            filler_data: true,
            bitrate: 10_000,
            gop_len: 30,
            b_frames: 0,
            slices: 8,
            qp_mode: QpMode::Uniform,
            rate_control: RateControl::Vbr,
            profile: Profile::High,
            codec: Codec::Avc,
            gop_mode: GopMode::Basic,
            latency_mode: LatencyMode::Normal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputParams {
    /// File path or `file:`/network URI for non-live sources
    pub uri: Option<String>,
    pub format: Format,
    /// No filter and no encode stage when set
    pub raw: bool,
    pub width: u32,
    pub height: u32,
    pub source_type: SourceType,
    pub device: DeviceClass,
    /// Registry slot the device was selected from
    pub device_index: usize,
    pub path: ProcessingPath,
    pub io_mode: IoMode,
}

impl Default for InputParams {
    fn default() -> Self {
        Self {
            uri: None,
            format: Format::Nv12,
            raw: true,
            width: 3840,
            height: 2160,
            source_type: SourceType::Live,
            device: DeviceClass::Tpg,
            device_index: 0,
            path: ProcessingPath::Vcu,
            io_mode: IoMode::DmabufExport,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputParams {
    pub file_out: Option<PathBuf>,
    pub host_ip: String,
    /// Record length in minutes, 0 for unbounded
    pub duration: u32,
    pub port: u32,
}

impl Default for OutputParams {
    fn default() -> Self {
        Self {
            file_out: None,
            host_ip: "192.168.25.89".to_string(),
            duration: 0,
            port: 5004,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommonParams {
    pub num_src: usize,
    pub sink_type: SinkType,
    pub driver_type: DriverType,
    pub plane_id: u32,
    pub frame_rate: u32,
    /// Accelerator bitstreams are swapped in at filter selection
    pub partial_reconfig: bool,
}

impl Default for CommonParams {
    fn default() -> Self {
        Self {
            num_src: 1,
            sink_type: SinkType::Display,
            driver_type: DriverType::Dp,
            plane_id: 0,
            frame_rate: 60,
            partial_reconfig: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterParams {
    /// Plugin factory name of the filter stage
    pub plugin: String,
    pub mode: AccelMode,
    pub coefficients: Option<Coefficients>,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            plugin: crate::constants::SDX_FILTER2D_PLUGIN.to_string(),
            mode: AccelMode::Hardware,
            coefficients: None,
        }
    }
}

/// Everything one stream needs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamParams {
    pub input: InputParams,
    pub encode: EncodeParams,
    pub output: OutputParams,
    pub filter: FilterParams,
}

/// User-selected mode, the input to every mode change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Registry slot of the source
    pub source: usize,
    /// 0 for no filter, otherwise registry filter index + 1
    pub filter_type: usize,
    pub filter_mode: usize,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    /// Route unfiltered display through the encoder and decoder
    pub encode: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source: 0,
            filter_type: 0,
            filter_mode: 0,
            width: 3840,
            height: 2160,
            frame_rate: 60,
            encode: false,
        }
    }
}

/// Full session setup as loaded from disk or assembled from flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub common: CommonParams,
    pub pipeline: PipelineConfig,
    /// One entry per stream; missing entries use defaults
    pub streams: Vec<StreamParams>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            common: CommonParams::default(),
            pipeline: PipelineConfig::default(),
            streams: vec![StreamParams::default()],
        }
    }
}

impl SessionConfig {
    /// Default location: `$XDG_CONFIG_HOME/vidpipe/session.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("vidpipe").join("session.json"))
    }

    pub fn from_json(text: &str) -> AppResult<Self> {
        let mut config: SessionConfig = serde_json::from_str(text)?;
        config.normalize();
        Ok(config)
    }

    pub fn load(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_json(&text)?;
        info!(path = %path.display(), streams = config.streams.len(), "Loaded session config");
        Ok(config)
    }

    /// Explicit path must load; the default path is optional
    pub fn load_or_default(explicit: Option<&Path>) -> AppResult<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                debug!("No session config found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Keep one parameter set per configured stream
    pub fn normalize(&mut self) {
        let wanted = self.common.num_src.max(1);
        if self.streams.len() < wanted {
            self.streams.resize_with(wanted, StreamParams::default);
        }
    }

    pub fn to_json(&self) -> AppResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Default folder name for recordings
const DEFAULT_SAVE_FOLDER: &str = "vidpipe";

/// `~/Videos/vidpipe/vidpipe_<timestamp>.<ext>`
pub fn default_record_path(extension: &str) -> PathBuf {
    let dir = dirs::video_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(DEFAULT_SAVE_FOLDER);
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    dir.join(format!("vidpipe_{}.{}", stamp, extension))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choices_parse_case_insensitively() {
        assert_eq!("HEVC".parse::<Codec>(), Ok(Codec::Hevc));
        assert_eq!("split-screen".parse::<SinkType>(), Ok(SinkType::SplitScreen));
        assert_eq!("passthrough".parse::<ProcessingPath>(), Ok(ProcessingPath::Vcu));
    }

    #[test]
    fn unknown_choice_lists_valid_values() {
        let err = "vp9".parse::<Codec>().unwrap_err();
        assert_eq!(err.valid, vec!["avc", "hevc"]);
        assert!(err.to_string().contains("vp9"));
    }

    #[test]
    fn normalize_fills_missing_streams() {
        let config = SessionConfig::from_json(r#"{"common": {"num_src": 2}}"#).unwrap();
        assert_eq!(config.streams.len(), 2);
        assert_eq!(config.streams[1], StreamParams::default());
    }
}
