// SPDX-License-Identifier: GPL-3.0-only

//! Parameter validation against the hardware capability table
//!
//! Rules live in [`rules`] as an ordered list; the first violated rule wins
//! and its error is returned. The raw-capture correction for record and
//! stream sinks is the one step that edits parameters instead of failing.

pub mod rules;

use crate::config::{CommonParams, ProcessingPath, SinkType, SourceType, StreamParams};
use crate::errors::ValidationError;
use crate::registry::DeviceClass;
use rules::{COMMON_RULES, STREAM_STEPS, Scope, Step, StreamView};
use tracing::{debug, error, warn};

/// Capture settings forwarded to the device collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceConfig {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub device: DeviceClass,
    pub device_index: usize,
    /// Only live sources are configured on the device side
    pub live: bool,
}

/// Check every stream in order and apply the raw-flag correction.
///
/// Returns the source configuration of the first stream outside the
/// filter path, which the caller hands to the device layer.
pub fn validate(
    common: &CommonParams,
    streams: &mut [StreamParams],
) -> Result<Option<SourceConfig>, ValidationError> {
    for rule in COMMON_RULES {
        if (rule.violated)(common) {
            error!(rule = rule.name, "{}", rule.error);
            return Err(rule.error);
        }
    }

    let mut source_config = None;
    for (index, stream) in streams.iter_mut().take(common.num_src).enumerate() {
        for step in STREAM_STEPS {
            match step {
                Step::CoerceRaw => coerce_raw(common, stream, index),
                Step::Check(rule) => {
                    let view = StreamView {
                        input: &stream.input,
                        encode: &stream.encode,
                        output: &stream.output,
                        common,
                    };
                    if rule.scope == Scope::LiveEncode && !is_live_encode(&view) {
                        continue;
                    }
                    if (rule.violated)(&view) {
                        error!(stream = index, rule = rule.name, "{}", rule.error);
                        return Err(rule.error);
                    }
                }
            }
        }

        if source_config.is_none() && stream.input.path != ProcessingPath::SdxFilter {
            source_config = Some(SourceConfig {
                width: stream.input.width,
                height: stream.input.height,
                frame_rate: common.frame_rate,
                device: stream.input.device,
                device_index: stream.input.device_index,
                live: stream.input.source_type == SourceType::Live,
            });
        }
        debug!(stream = index, raw = stream.input.raw, "Stream parameters accepted");
    }

    Ok(source_config)
}

fn is_live_encode(view: &StreamView<'_>) -> bool {
    view.input.path != ProcessingPath::SdxFilter
        && view.input.source_type == SourceType::Live
        && !view.input.raw
}

fn coerce_raw(common: &CommonParams, stream: &mut StreamParams, index: usize) {
    if matches!(common.sink_type, SinkType::Stream | SinkType::Record) && stream.input.raw {
        warn!(stream = index, sink = %common.sink_type, "Raw capture cannot be recorded or streamed, enabling encoder");
        stream.input.raw = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DriverType, Format};

    fn encode_stream() -> StreamParams {
        let mut s = StreamParams::default();
        s.input.raw = false;
        s
    }

    #[test]
    fn common_rules_run_before_stream_rules() {
        let common = CommonParams {
            num_src: 5,
            ..Default::default()
        };
        let mut streams = vec![StreamParams::default(); 5];
        streams[0].input.format = Format::Nv16;
        assert_eq!(
            validate(&common, &mut streams),
            Err(ValidationError::SourceCountInvalid)
        );
    }

    #[test]
    fn filter_path_skips_format_and_source_config() {
        let common = CommonParams::default();
        let mut streams = vec![StreamParams::default()];
        streams[0].input.path = ProcessingPath::SdxFilter;
        streams[0].input.format = Format::Yuy2;
        streams[0].input.device = DeviceClass::Uvc;
        streams[0].input.width = 1920;
        streams[0].input.height = 1080;
        assert_eq!(validate(&common, &mut streams), Ok(None));
    }

    #[test]
    fn first_encode_stream_fills_source_config() {
        let common = CommonParams {
            num_src: 1,
            frame_rate: 30,
            driver_type: DriverType::HdmiTx,
            ..Default::default()
        };
        let mut streams = vec![encode_stream()];
        let cfg = validate(&common, &mut streams).unwrap().unwrap();
        assert_eq!((cfg.width, cfg.height, cfg.frame_rate), (3840, 2160, 30));
        assert!(cfg.live);
    }
}
