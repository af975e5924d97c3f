// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the pipeline orchestrator
//!
//! Every failure a session can report maps to one of these enums. Validation
//! failures carry a stable numeric code so callers and scripts can tell rules
//! apart without matching on text.

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Top-level error type used by the binary and configuration loading
#[derive(Debug, Clone)]
pub enum AppError {
    /// Session (mode-change) failures
    Session(SessionError),
    /// Configuration file or flag errors
    Config(String),
    /// Filesystem errors
    Io(String),
    /// Generic error with message
    Other(String),
}

/// A parameter combination rejected by the validator.
///
/// The first violated rule wins, so exactly one of these is reported per
/// validation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    FileIo,
    GopNotSupported,
    BFrameRangeMismatch,
    GopLengthRangeMismatch,
    EncoderTypeNotSupported,
    SourceTypeNotSupported,
    FormatNotSupported,
    SourceCountInvalid,
    ResolutionNotSupported,
    DeviceTypeInvalid,
    MultiStreamFail,
    SplitScreenFail,
    DriverTypeMismatch,
    SliceRangeMismatch,
    BitrateNotSupported,
    QpModeNotSupported,
    ProfileNotSupported,
    RateControlNotSupported,
    PortNumberRangeMismatch,
    GopModeNotSupported,
    BFrameInLowLatency,
    LatencyModeNotSupported,
    InputOptionsInvalid,
    Limit4kp60,
    Limit2x4kp30,
    Limit4x1080p60,
    SubFrameOnRecord,
    TpgNot4k,
    FileInMultiStream,
}

impl ValidationError {
    /// Stable numeric code, unique per rule
    pub fn code(&self) -> i32 {
        match self {
            ValidationError::FileIo => 1,
            ValidationError::GopNotSupported => 2,
            ValidationError::BFrameRangeMismatch => 3,
            ValidationError::GopLengthRangeMismatch => 4,
            ValidationError::EncoderTypeNotSupported => 5,
            ValidationError::SourceTypeNotSupported => 6,
            ValidationError::FormatNotSupported => 7,
            ValidationError::SourceCountInvalid => 8,
            ValidationError::ResolutionNotSupported => 9,
            ValidationError::DeviceTypeInvalid => 10,
            ValidationError::MultiStreamFail => 11,
            ValidationError::SplitScreenFail => 12,
            ValidationError::DriverTypeMismatch => 13,
            ValidationError::SliceRangeMismatch => 14,
            ValidationError::BitrateNotSupported => 15,
            ValidationError::QpModeNotSupported => 16,
            ValidationError::ProfileNotSupported => 17,
            ValidationError::RateControlNotSupported => 18,
            ValidationError::PortNumberRangeMismatch => 19,
            ValidationError::GopModeNotSupported => 20,
            ValidationError::BFrameInLowLatency => 21,
            ValidationError::LatencyModeNotSupported => 22,
            ValidationError::InputOptionsInvalid => 23,
            ValidationError::Limit4kp60 => 24,
            ValidationError::Limit2x4kp30 => 25,
            ValidationError::Limit4x1080p60 => 26,
            ValidationError::SubFrameOnRecord => 27,
            ValidationError::TpgNot4k => 28,
            ValidationError::FileInMultiStream => 29,
        }
    }
}

/// Stage creation failures, grouped by the part of the graph that was
/// being assembled when the factory came back empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// Ingestion, caps or queue stages
    Common(String),
    /// Display, record or stream-out stages
    Sink(String),
    /// Accelerator filter stage
    Filter(String),
    /// Encoder, decoder, parser or transport stages
    Encode(String),
    /// Combination the builder has no topology for
    Unsupported(String),
    /// Container could not accept the stages
    Engine(String),
}

/// Stage connection failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// A chain could not be linked; holds the chain description
    Failed(String),
    /// Tee did not hand out a request pad
    RequestPad(String),
}

/// Errors from the device/driver collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    Init,
    Deinit,
    SourceConfig,
    HdmiRxInvalidState,
    HdmiRxInvalidResolution,
    HdmiRxInvalidFps,
    HdmiRxInvalidSequence,
    SetFps,
    MipiConfigFailed,
    MipiNotConnected,
    InvalidState,
    InvalidResolution,
    SetFormatFailed,
    GetFormatFailed,
    /// No device bound to the requested index or class
    NotFound(String),
    /// Display mode rejected by the connector
    ModeUnavailable { width: u32, height: u32 },
    /// Control name not exposed by the device
    UnknownControl(String),
    Io(String),
}

/// Failures reported by the mode-change controller
#[derive(Debug, Clone)]
pub enum SessionError {
    /// File-class source selected without a URI
    NoFileSelected,
    Validation(ValidationError),
    Build(BuildError),
    Link(LinkError),
    /// Engine refused a state transition
    StateChange(String),
    Device(DeviceError),
    /// Operation needs a built pipeline
    NotInitialized,
    /// Source, sink or filter index outside the registry
    InvalidSelection(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Session(e) => write!(f, "{}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Io(msg) => write!(f, "I/O error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ValidationError::FileIo => "File I/O Error",
            ValidationError::GopNotSupported => "Gop length must be multiple of b-frames+1",
            ValidationError::BFrameRangeMismatch => "b-frames should be in the range of 0-4",
            ValidationError::GopLengthRangeMismatch => "GoP length should be in the range of 1 -1000",
            ValidationError::EncoderTypeNotSupported => "Encoder type not supported",
            ValidationError::SourceTypeNotSupported => "Source type not supported",
            ValidationError::FormatNotSupported => "format type not supported",
            ValidationError::SourceCountInvalid => "source count invalid",
            ValidationError::ResolutionNotSupported => "Resolution WxH should be 3840x2160",
            ValidationError::DeviceTypeInvalid => "Device type invalid",
            ValidationError::MultiStreamFail => "Multi stream on DP or SDI not supported",
            ValidationError::SplitScreenFail => "Split Screen on DP or SDI not supported",
            ValidationError::DriverTypeMismatch => "driver type mismatched",
            ValidationError::SliceRangeMismatch => "Slice range mismatched",
            ValidationError::BitrateNotSupported => "bitrate not supported",
            ValidationError::QpModeNotSupported => "Qp mode not supported",
            ValidationError::ProfileNotSupported => "Profile not supported",
            ValidationError::RateControlNotSupported => "Rate control mode not supported",
            ValidationError::PortNumberRangeMismatch => "Port number range mismatched",
            ValidationError::GopModeNotSupported => "Gop-mode not supported",
            ValidationError::BFrameInLowLatency => {
                "b-frame in low_latency or sub_frame latency mode not supported"
            }
            ValidationError::LatencyModeNotSupported => "low latency mode not supported",
            ValidationError::InputOptionsInvalid => "Input options are incorrect",
            ValidationError::Limit4kp60 => {
                "(b-frame>0) (gop-mode=low_delay_b) (l2-cache=false) in 1-4kp60 not supported"
            }
            ValidationError::Limit2x4kp30 => {
                "(b-frame>0) (gop-mode=low_delay_b) (l2-cache=false) (bitrate>30Mbps) \
                 (latency-mode=SubFrame) in 2-4kp30 not supported"
            }
            ValidationError::Limit4x1080p60 => {
                "(b-frame>0) (gop-mode=low_delay_b) (l2-cache=false) (bitrate>15Mbps) \
                 (latency-mode=SubFrame) in 4-1080p60 not supported"
            }
            ValidationError::SubFrameOnRecord => {
                "Sub frame latency is not supported in record option"
            }
            ValidationError::TpgNot4k => "TPG other than 4k resolution not supported",
            ValidationError::FileInMultiStream => "File playback in multi stream not supported",
        };
        write!(f, "{}", msg)
    }
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Common(stage) => write!(f, "failed to create common element: {}", stage),
            BuildError::Sink(stage) => write!(f, "failed to create sink element: {}", stage),
            BuildError::Filter(stage) => write!(f, "failed to create videofilter element: {}", stage),
            BuildError::Encode(stage) => {
                write!(f, "failed to create enc-dec-parser element: {}", stage)
            }
            BuildError::Unsupported(combo) => write!(f, "unsupported pipeline: {}", combo),
            BuildError::Engine(msg) => write!(f, "pipeline creation failed: {}", msg),
        }
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::Failed(chain) => write!(f, "pipeline linking failed: {}", chain),
            LinkError::RequestPad(tee) => write!(f, "no request pad available on {}", tee),
        }
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::Init => write!(f, "VLIB Source Init Error"),
            DeviceError::Deinit => write!(f, "VLIB Source Un-init Error"),
            DeviceError::SourceConfig => write!(f, "VLIB Source Config Error"),
            DeviceError::HdmiRxInvalidState => {
                write!(f, "VLIB HDMI-RX Invalid State: check link/resolution")
            }
            DeviceError::HdmiRxInvalidResolution => write!(
                f,
                "VLIB HDMI-RX Invalid Resolution: supported input resolutions are 1080p and 4K"
            ),
            DeviceError::HdmiRxInvalidFps => write!(
                f,
                "VLIB HDMI-RX Invalid FPS: supported max input frame rate is 30fps"
            ),
            DeviceError::HdmiRxInvalidSequence => write!(
                f,
                "VLIB HDMI-RX Invalid Sequence: derived HDMI must run alongside its source"
            ),
            DeviceError::SetFps => write!(f, "VLIB TPG set fps failed"),
            DeviceError::MipiConfigFailed => {
                write!(f, "VLIB MIPI Invalid State: check MIPI sensor connection")
            }
            DeviceError::MipiNotConnected => write!(f, "VLIB MIPI Not Connected"),
            DeviceError::InvalidState => {
                write!(f, "VLIB Source is in invalid state: check link/resolution")
            }
            DeviceError::InvalidResolution => write!(f, "VLIB set and get resolution mismatch"),
            DeviceError::SetFormatFailed => write!(f, "VLIB unable to set format"),
            DeviceError::GetFormatFailed => write!(f, "VLIB unable to get format"),
            DeviceError::NotFound(what) => write!(f, "device not found: {}", what),
            DeviceError::ModeUnavailable { width, height } => {
                write!(f, "display mode {}x{} not available", width, height)
            }
            DeviceError::UnknownControl(name) => write!(f, "unknown device control: {}", name),
            DeviceError::Io(msg) => write!(f, "device I/O error: {}", msg),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::NoFileSelected => write!(
                f,
                "No video file selected. Use --uri to select an input file."
            ),
            SessionError::Validation(e) => write!(f, "{} (code {})", e, e.code()),
            SessionError::Build(e) => write!(f, "{}", e),
            SessionError::Link(e) => write!(f, "{}", e),
            SessionError::StateChange(msg) => write!(f, "state change failed: {}", msg),
            SessionError::Device(e) => write!(f, "{}", e),
            SessionError::NotInitialized => write!(f, "pipeline not initialized"),
            SessionError::InvalidSelection(msg) => write!(f, "invalid selection: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for ValidationError {}
impl std::error::Error for BuildError {}
impl std::error::Error for LinkError {}
impl std::error::Error for DeviceError {}
impl std::error::Error for SessionError {}

impl From<ValidationError> for SessionError {
    fn from(err: ValidationError) -> Self {
        SessionError::Validation(err)
    }
}

impl From<BuildError> for SessionError {
    fn from(err: BuildError) -> Self {
        SessionError::Build(err)
    }
}

impl From<LinkError> for SessionError {
    fn from(err: LinkError) -> Self {
        SessionError::Link(err)
    }
}

impl From<DeviceError> for SessionError {
    fn from(err: DeviceError) -> Self {
        SessionError::Device(err)
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        AppError::Session(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<std::io::Error> for DeviceError {
    fn from(err: std::io::Error) -> Self {
        DeviceError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_codes_are_unique() {
        let all = [
            ValidationError::FileIo,
            ValidationError::GopNotSupported,
            ValidationError::BFrameRangeMismatch,
            ValidationError::GopLengthRangeMismatch,
            ValidationError::EncoderTypeNotSupported,
            ValidationError::SourceTypeNotSupported,
            ValidationError::FormatNotSupported,
            ValidationError::SourceCountInvalid,
            ValidationError::ResolutionNotSupported,
            ValidationError::DeviceTypeInvalid,
            ValidationError::MultiStreamFail,
            ValidationError::SplitScreenFail,
            ValidationError::DriverTypeMismatch,
            ValidationError::SliceRangeMismatch,
            ValidationError::BitrateNotSupported,
            ValidationError::QpModeNotSupported,
            ValidationError::ProfileNotSupported,
            ValidationError::RateControlNotSupported,
            ValidationError::PortNumberRangeMismatch,
            ValidationError::GopModeNotSupported,
            ValidationError::BFrameInLowLatency,
            ValidationError::LatencyModeNotSupported,
            ValidationError::InputOptionsInvalid,
            ValidationError::Limit4kp60,
            ValidationError::Limit2x4kp30,
            ValidationError::Limit4x1080p60,
            ValidationError::SubFrameOnRecord,
            ValidationError::TpgNot4k,
            ValidationError::FileInMultiStream,
        ];
        let mut codes: Vec<i32> = all.iter().map(|e| e.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len(), "every rule needs its own code");
    }

    #[test]
    fn session_error_wraps_validation_code() {
        let err = SessionError::from(ValidationError::GopNotSupported);
        assert_eq!(
            err.to_string(),
            "Gop length must be multiple of b-frames+1 (code 2)"
        );
    }
}
