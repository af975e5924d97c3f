// SPDX-License-Identifier: GPL-3.0-only

//! Accelerator filter discovery and 2D filter coefficients

use crate::config::Coefficients;
use crate::constants::{SDX_FILTER2D_PLUGIN, SDX_OPTICALFLOW_PLUGIN};
use std::fmt;
use tracing::{debug, info};

/// Answers whether a plugin is registered in the running media framework
pub trait PluginHost {
    fn has_plugin(&self, name: &str) -> bool;
}

/// Filters this build knows how to drive, in registration order
const DISCOVERY_TABLE: &[(&str, &str, &str, &[&str])] = &[
    (SDX_FILTER2D_PLUGIN, "2D Filter", "filter2d", &["HW", "SW"]),
    (SDX_OPTICALFLOW_PLUGIN, "Optical Flow", "opticalflow", &["HW", "SW"]),
];

/// Named 3x3 kernels for the 2D filter
pub const FILTER2D_PRESETS: &[(&str, Coefficients)] = &[
    ("identity", [[0, 0, 0], [0, 1, 0], [0, 0, 0]]),
    ("blur", [[1, 1, 1], [1, 1, 1], [1, 1, 1]]),
    ("edge", [[0, 1, 0], [1, -4, 1], [0, 1, 0]]),
    ("horizontal-edge", [[0, -1, 0], [0, 2, 0], [0, -1, 0]]),
    ("vertical-edge", [[0, 0, 0], [-1, 2, -1], [0, 0, 0]]),
    ("emboss", [[-2, -1, 0], [-1, 1, 1], [0, 1, 2]]),
    ("horizontal-sobel", [[1, 2, 1], [0, 0, 0], [-1, -2, -1]]),
    ("vertical-sobel", [[1, 0, -1], [2, 0, -2], [1, 0, -1]]),
    ("sharpen", [[0, -1, 0], [-1, 5, -1], [0, -1, 0]]),
];

pub fn preset(name: &str) -> Option<Coefficients> {
    FILTER2D_PRESETS
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, c)| *c)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterDescriptor {
    /// Plugin factory name, also the discovery comparison string
    pub plugin: &'static str,
    pub display_text: &'static str,
    /// Short name accepted on the command line
    pub alias: &'static str,
    pub modes: &'static [&'static str],
    /// 2D filter kernel; `None` keeps the plugin default
    pub coefficients: Option<Coefficients>,
}

impl FilterDescriptor {
    pub fn mode_name(&self, mode: usize) -> Option<&'static str> {
        self.modes.get(mode).copied()
    }

    pub fn matches(&self, name: &str) -> bool {
        self.plugin.eq_ignore_ascii_case(name)
            || self.alias.eq_ignore_ascii_case(name)
            || self.display_text.eq_ignore_ascii_case(name)
    }
}

/// Filters actually present in the running environment
#[derive(Debug, Clone, Default)]
pub struct FilterRegistry {
    entries: Vec<FilterDescriptor>,
}

impl FilterRegistry {
    pub fn discover(host: &impl PluginHost) -> Self {
        let mut entries = Vec::new();
        for (plugin, display_text, alias, modes) in DISCOVERY_TABLE {
            if !host.has_plugin(plugin) {
                debug!(plugin, "Filter plugin not found");
                continue;
            }
            info!(plugin, display_text, "Filter registered");
            entries.push(FilterDescriptor {
                plugin,
                display_text,
                alias,
                modes,
                coefficients: None,
            });
        }
        Self { entries }
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, index: usize) -> Option<&FilterDescriptor> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FilterDescriptor> {
        self.entries.iter()
    }

    pub fn modes(&self, index: usize) -> &'static [&'static str] {
        self.get(index).map(|f| f.modes).unwrap_or(&[])
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|f| f.matches(name))
    }

    pub fn is_present(&self, plugin: &str) -> bool {
        self.entries.iter().any(|f| f.plugin == plugin)
    }

    /// Store a kernel on the 2D filter; ignored when the plugin is absent
    pub fn set_filter2d_coefficients(&mut self, coefficients: Coefficients) -> bool {
        match self.entries.iter_mut().find(|f| f.plugin == SDX_FILTER2D_PLUGIN) {
            Some(filter) => {
                filter.coefficients = Some(coefficients);
                true
            }
            None => false,
        }
    }
}

/// Parsed `name[/ddddddddd]` filter selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    pub name: String,
    pub coefficients: Option<Coefficients>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterSpecError {
    EmptyName,
    /// Anything but exactly nine digits after the slash
    BadCoefficients(String),
}

impl fmt::Display for FilterSpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterSpecError::EmptyName => write!(f, "filter name is empty"),
            FilterSpecError::BadCoefficients(s) => {
                write!(f, "expected exactly 9 digits after '/', got '{}'", s)
            }
        }
    }
}

impl std::error::Error for FilterSpecError {}

/// Parse `blur/123456789` into a name and a row-major 3x3 kernel.
///
/// Without a slash the name alone is returned, with the matching preset
/// kernel if there is one.
pub fn parse_filter_spec(spec: &str) -> Result<FilterSpec, FilterSpecError> {
    let (name, digits) = match spec.split_once('/') {
        Some((name, digits)) => (name.trim(), Some(digits.trim())),
        None => (spec.trim(), None),
    };
    if name.is_empty() {
        return Err(FilterSpecError::EmptyName);
    }

    let coefficients = match digits {
        None => preset(name),
        Some(digits) => {
            if digits.len() != 9 || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(FilterSpecError::BadCoefficients(digits.to_string()));
            }
            let mut kernel: Coefficients = [[0; 3]; 3];
            for (i, b) in digits.bytes().enumerate() {
                kernel[i / 3][i % 3] = i16::from(b - b'0');
            }
            Some(kernel)
        }
    };

    Ok(FilterSpec {
        name: name.to_string(),
        coefficients,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Host(&'static [&'static str]);

    impl PluginHost for Host {
        fn has_plugin(&self, name: &str) -> bool {
            self.0.contains(&name)
        }
    }

    #[test]
    fn discovery_keeps_only_present_plugins() {
        let reg = FilterRegistry::discover(&Host(&["sdxopticalflow"]));
        assert_eq!(reg.count(), 1);
        assert_eq!(reg.get(0).map(|f| f.plugin), Some("sdxopticalflow"));
        assert!(!reg.is_present("sdxfilter2d"));
    }

    #[test]
    fn coefficients_need_filter2d() {
        let mut reg = FilterRegistry::discover(&Host(&["sdxopticalflow"]));
        assert!(!reg.set_filter2d_coefficients([[1; 3]; 3]));
    }

    #[test]
    fn bare_preset_name_resolves_kernel() {
        let spec = parse_filter_spec("sharpen").unwrap();
        assert_eq!(spec.coefficients, Some([[0, -1, 0], [-1, 5, -1], [0, -1, 0]]));
        assert_eq!(parse_filter_spec("filter2d").unwrap().coefficients, None);
    }
}
