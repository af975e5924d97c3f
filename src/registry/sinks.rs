// SPDX-License-Identifier: GPL-3.0-only

//! Output drivers

use crate::config::DriverType;
use crate::constants::{DP_BUS_ID, MIXER_BUS_ID};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkDescriptor {
    pub driver: DriverType,
    pub name: &'static str,
    /// Shown by `list sinks`
    pub listed: bool,
}

pub const SINKS: &[SinkDescriptor] = &[
    SinkDescriptor {
        driver: DriverType::Dp,
        name: "dp",
        listed: true,
    },
    SinkDescriptor {
        driver: DriverType::HdmiTx,
        name: "hdmi",
        listed: true,
    },
    SinkDescriptor {
        driver: DriverType::SdiTx,
        name: "sdi",
        listed: false,
    },
];

pub fn find_by_name(name: &str) -> Option<&'static SinkDescriptor> {
    SINKS.iter().find(|s| s.name.eq_ignore_ascii_case(name))
}

pub fn listed() -> impl Iterator<Item = &'static SinkDescriptor> {
    SINKS.iter().filter(|s| s.listed)
}

/// DRM bus the display sink binds to
pub fn bus_id(driver: DriverType) -> &'static str {
    match driver {
        DriverType::Dp => DP_BUS_ID,
        DriverType::HdmiTx | DriverType::SdiTx => MIXER_BUS_ID,
    }
}
