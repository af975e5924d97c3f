// SPDX-License-Identifier: GPL-3.0-only

//! Capability registry
//!
//! Small linear tables of what this board can do: which sources were
//! enumerated, which sink drivers exist and which accelerator filters the
//! running plugin host actually provides.

pub mod filters;
pub mod sinks;
pub mod sources;

pub use filters::{FilterDescriptor, FilterRegistry, FilterSpec, PluginHost, parse_filter_spec};
pub use sinks::{SinkDescriptor, SINKS};
pub use sources::{SourceDescriptor, SourceRegistry};

use serde::{Deserialize, Serialize};

/// Device class of a video source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceClass {
    /// Test pattern generator
    #[default]
    Tpg,
    /// MIPI CSI-2 camera sensor
    Csi,
    /// USB webcam
    Uvc,
    Hdmi,
    Sdi,
    /// Virtual video test driver
    Vivid,
    File,
}

impl DeviceClass {
    pub const ALL: [DeviceClass; 7] = [
        DeviceClass::Tpg,
        DeviceClass::Csi,
        DeviceClass::Uvc,
        DeviceClass::Hdmi,
        DeviceClass::Sdi,
        DeviceClass::Vivid,
        DeviceClass::File,
    ];

    /// Name used to list and select the source on the command line
    pub fn source_type_name(&self) -> &'static str {
        match self {
            DeviceClass::Tpg => "tpg",
            DeviceClass::Csi => "mipi",
            DeviceClass::Uvc => "usbcam",
            DeviceClass::Hdmi => "hdmi",
            DeviceClass::Sdi => "sdi",
            DeviceClass::Vivid => "vivid",
            DeviceClass::File => "file",
        }
    }

    pub fn from_source_type_name(name: &str) -> Option<DeviceClass> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.source_type_name().eq_ignore_ascii_case(name))
    }

    /// Classes the encoder path accepts as live inputs
    pub fn is_encode_capable(&self) -> bool {
        matches!(
            self,
            DeviceClass::Tpg | DeviceClass::Hdmi | DeviceClass::Csi | DeviceClass::Sdi
        )
    }

    /// Capture drivers that cannot export dma-buf to the filter
    pub fn needs_mmap(&self) -> bool {
        matches!(self, DeviceClass::File | DeviceClass::Uvc | DeviceClass::Vivid)
    }
}

/// All three tables together
#[derive(Debug, Clone)]
pub struct Registry {
    pub sources: SourceRegistry,
    pub filters: FilterRegistry,
}

impl Registry {
    pub fn new(sources: SourceRegistry, filters: FilterRegistry) -> Self {
        Self { sources, filters }
    }

    pub fn sinks(&self) -> &'static [SinkDescriptor] {
        SINKS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_type_names_round_trip() {
        for class in DeviceClass::ALL {
            assert_eq!(
                DeviceClass::from_source_type_name(class.source_type_name()),
                Some(class)
            );
        }
        assert_eq!(DeviceClass::from_source_type_name("MIPI"), Some(DeviceClass::Csi));
        assert_eq!(DeviceClass::from_source_type_name("webcam"), None);
    }
}
