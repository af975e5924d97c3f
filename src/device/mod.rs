// SPDX-License-Identifier: GPL-3.0-only

//! Device and display driver collaborator
//!
//! Everything that touches capture hardware or the display controller goes
//! through [`DeviceControl`]. The V4L2/sysfs implementation lives in
//! [`v4l2`].

pub mod v4l2;

pub use v4l2::V4lDevices;

use crate::errors::DeviceError;
use crate::registry::DeviceClass;
use crate::validator::SourceConfig;

/// Hardware side of a session.
///
/// Indices are source registry slots, so `device_name(i)` resolves the
/// node behind slot `i`.
pub trait DeviceControl {
    /// Capture devices in enumeration order
    fn enumerate_sources(&mut self) -> Vec<DeviceClass>;

    fn active_plane_id(&self) -> u32;

    /// Output resolution of the active display mode
    fn active_resolution(&self) -> (u32, u32);

    fn frame_rate(&self) -> u32;

    /// Apply capture width, height and rate to a live source
    fn configure_source(&mut self, config: &SourceConfig) -> Result<(), DeviceError>;

    /// System device name (e.g. `/dev/video0`) of a registry slot
    fn device_name(&self, index: usize) -> Option<String>;

    /// Switch the display to `width`x`height`; returns the refresh rate
    fn try_display_mode(&mut self, display_id: u32, width: u32, height: u32)
    -> Result<u32, DeviceError>;

    /// Set a named driver control on the first source of `class`
    fn set_control(&mut self, class: DeviceClass, name: &str, value: i64)
    -> Result<(), DeviceError>;
}

/// Tunable controls of the TPG and CSI sources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceControl {
    TpgPattern,
    TpgBoxSize,
    TpgBoxColor,
    TpgBoxSpeed,
    TpgCrossRows,
    TpgCrossColumns,
    TpgZoneHStart,
    TpgZoneHDelta,
    TpgZoneVStart,
    TpgZoneVDelta,
    CsiRedGamma,
    CsiGreenGamma,
    CsiBlueGamma,
    CsiContrast,
    CsiBrightness,
    CsiRedGain,
    CsiGreenGain,
    CsiBlueGain,
    CsiExposure,
    CsiSensorGain,
    CsiTestPattern,
    CsiVerticalFlip,
}

impl SourceControl {
    pub const ALL: [SourceControl; 22] = [
        SourceControl::TpgPattern,
        SourceControl::TpgBoxSize,
        SourceControl::TpgBoxColor,
        SourceControl::TpgBoxSpeed,
        SourceControl::TpgCrossRows,
        SourceControl::TpgCrossColumns,
        SourceControl::TpgZoneHStart,
        SourceControl::TpgZoneHDelta,
        SourceControl::TpgZoneVStart,
        SourceControl::TpgZoneVDelta,
        SourceControl::CsiRedGamma,
        SourceControl::CsiGreenGamma,
        SourceControl::CsiBlueGamma,
        SourceControl::CsiContrast,
        SourceControl::CsiBrightness,
        SourceControl::CsiRedGain,
        SourceControl::CsiGreenGain,
        SourceControl::CsiBlueGain,
        SourceControl::CsiExposure,
        SourceControl::CsiSensorGain,
        SourceControl::CsiTestPattern,
        SourceControl::CsiVerticalFlip,
    ];

    /// (source class, command-line name, driver control name)
    fn entry(&self) -> (DeviceClass, &'static str, &'static str) {
        use DeviceClass::{Csi, Tpg};
        match self {
            SourceControl::TpgPattern => (Tpg, "tpg-pattern", "Test Pattern"),
            SourceControl::TpgBoxSize => (Tpg, "tpg-box-size", "Box Size"),
            SourceControl::TpgBoxColor => (Tpg, "tpg-box-color", "Box Color"),
            SourceControl::TpgBoxSpeed => (Tpg, "tpg-box-speed", "Box Speed"),
            SourceControl::TpgCrossRows => (Tpg, "tpg-cross-rows", "Cross Hair Row"),
            SourceControl::TpgCrossColumns => (Tpg, "tpg-cross-columns", "Cross Hair Column"),
            SourceControl::TpgZoneHStart => (Tpg, "tpg-zone-h", "Zplate Horizontal Start"),
            SourceControl::TpgZoneHDelta => (Tpg, "tpg-zone-h-delta", "Zplate Horizontal Speed"),
            SourceControl::TpgZoneVStart => (Tpg, "tpg-zone-v", "Zplate Vertical Start"),
            SourceControl::TpgZoneVDelta => (Tpg, "tpg-zone-v-delta", "Zplate Vertical Speed"),
            SourceControl::CsiRedGamma => (Csi, "csi-red-gamma", "Red Gamma Correction"),
            SourceControl::CsiGreenGamma => (Csi, "csi-green-gamma", "Green Gamma Correction"),
            SourceControl::CsiBlueGamma => (Csi, "csi-blue-gamma", "Blue Gamma Correction"),
            SourceControl::CsiContrast => (Csi, "csi-contrast", "Contrast"),
            SourceControl::CsiBrightness => (Csi, "csi-brightness", "Brightness"),
            SourceControl::CsiRedGain => (Csi, "csi-red-gain", "Red Gain"),
            SourceControl::CsiGreenGain => (Csi, "csi-green-gain", "Green Gain"),
            SourceControl::CsiBlueGain => (Csi, "csi-blue-gain", "Blue Gain"),
            SourceControl::CsiExposure => (Csi, "csi-exposure", "Exposure"),
            SourceControl::CsiSensorGain => (Csi, "csi-sensor-gain", "Gain"),
            SourceControl::CsiTestPattern => (Csi, "csi-test-pattern", "Test Pattern"),
            SourceControl::CsiVerticalFlip => (Csi, "csi-vertical-flip", "Vertical Flip"),
        }
    }

    pub fn class(&self) -> DeviceClass {
        self.entry().0
    }

    pub fn name(&self) -> &'static str {
        self.entry().1
    }

    pub fn driver_name(&self) -> &'static str {
        self.entry().2
    }

    pub fn from_name(name: &str) -> Option<SourceControl> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_names_are_unique() {
        let mut names: Vec<_> = SourceControl::ALL.iter().map(|c| c.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), SourceControl::ALL.len());
    }

    #[test]
    fn controls_target_panel_sources() {
        assert_eq!(SourceControl::from_name("tpg-box-speed").map(|c| c.class()), Some(DeviceClass::Tpg));
        assert_eq!(SourceControl::from_name("csi-exposure").map(|c| c.class()), Some(DeviceClass::Csi));
    }
}
