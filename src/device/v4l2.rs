// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 capture devices and DRM connector modes from sysfs

use super::DeviceControl;
use crate::errors::DeviceError;
use crate::registry::DeviceClass;
use crate::validator::SourceConfig;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::video::capture::Parameters;
use v4l::{Format, FourCC};

const DEV_ROOT: &str = "/dev";
const DRM_ROOT: &str = "/sys/class/drm";

/// Refresh rate reported for every mode the connector accepts
const DEFAULT_REFRESH: u32 = 60;

/// Map a QUERYCAP driver/card pair to a source class
pub fn classify(driver: &str, card: &str) -> Option<DeviceClass> {
    let card = card.to_ascii_lowercase();
    match driver {
        "uvcvideo" => return Some(DeviceClass::Uvc),
        "vivid" => return Some(DeviceClass::Vivid),
        _ => {}
    }
    if card.contains("tpg") {
        Some(DeviceClass::Tpg)
    } else if card.contains("hdmi") {
        Some(DeviceClass::Hdmi)
    } else if card.contains("sdi") {
        Some(DeviceClass::Sdi)
    } else if card.contains("csi") || card.contains("mipi") || card.contains("imx") {
        Some(DeviceClass::Csi)
    } else {
        None
    }
}

/// Parse one line of a connector `modes` file (`1920x1080` or `1920x1080i`)
pub fn parse_mode_line(line: &str) -> Option<(u32, u32)> {
    let (w, h) = line.trim().split_once('x')?;
    let h: String = h.chars().take_while(|c| c.is_ascii_digit()).collect();
    Some((w.parse().ok()?, h.parse().ok()?))
}

/// Every mode listed by the connectors of DRM card `card`
pub fn connector_modes(drm_root: &Path, card: u32) -> Result<Vec<(u32, u32)>, DeviceError> {
    let prefix = format!("card{}-", card);
    let mut modes = Vec::new();
    let mut connectors = 0;
    for entry in std::fs::read_dir(drm_root)?.flatten() {
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(&prefix) {
            continue;
        }
        connectors += 1;
        let Ok(text) = std::fs::read_to_string(entry.path().join("modes")) else {
            continue;
        };
        modes.extend(text.lines().filter_map(parse_mode_line));
    }
    if connectors == 0 {
        return Err(DeviceError::NotFound(format!("DRM card {}", card)));
    }
    Ok(modes)
}

/// `video12` sorts after `video2`
fn node_number(path: &Path) -> u32 {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_prefix("video"))
        .and_then(|n| n.parse().ok())
        .unwrap_or(u32::MAX)
}

/// Capture nodes of the board, one per source class
pub struct V4lDevices {
    dev_root: PathBuf,
    drm_root: PathBuf,
    nodes: Vec<(DeviceClass, PathBuf)>,
    plane_id: u32,
    resolution: (u32, u32),
    frame_rate: u32,
}

impl V4lDevices {
    pub fn new(plane_id: u32) -> Self {
        Self::with_roots(DEV_ROOT, DRM_ROOT, plane_id)
    }

    pub fn with_roots(dev_root: impl Into<PathBuf>, drm_root: impl Into<PathBuf>, plane_id: u32) -> Self {
        Self {
            dev_root: dev_root.into(),
            drm_root: drm_root.into(),
            nodes: Vec::new(),
            plane_id,
            resolution: (0, 0),
            frame_rate: DEFAULT_REFRESH,
        }
    }

    fn node_of_class(&self, class: DeviceClass) -> Option<&Path> {
        self.nodes
            .iter()
            .find(|(c, _)| *c == class)
            .map(|(_, p)| p.as_path())
    }

    fn open(path: &Path) -> Result<Device, DeviceError> {
        Device::with_path(path).map_err(|e| {
            warn!(path = %path.display(), error = %e, "Failed to open capture device");
            DeviceError::Init
        })
    }
}

impl DeviceControl for V4lDevices {
    fn enumerate_sources(&mut self) -> Vec<DeviceClass> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.dev_root)
            .into_iter()
            .flatten()
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with("video"))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort_by_key(|p| node_number(p));

        self.nodes.clear();
        for path in paths {
            let Ok(dev) = Device::with_path(&path) else {
                continue;
            };
            let Ok(caps) = dev.query_caps() else {
                continue;
            };
            let Some(class) = classify(&caps.driver, &caps.card) else {
                debug!(path = %path.display(), driver = %caps.driver, card = %caps.card, "Skipping unknown capture device");
                continue;
            };
            if self.nodes.iter().any(|(c, _)| *c == class) {
                continue;
            }
            info!(path = %path.display(), card = %caps.card, ?class, "Found video source");
            self.nodes.push((class, path));
        }
        self.nodes.iter().map(|(c, _)| *c).collect()
    }

    fn active_plane_id(&self) -> u32 {
        self.plane_id
    }

    fn active_resolution(&self) -> (u32, u32) {
        self.resolution
    }

    fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    fn configure_source(&mut self, config: &SourceConfig) -> Result<(), DeviceError> {
        if !config.live {
            return Ok(());
        }
        let path = self
            .nodes
            .get(config.device_index)
            .filter(|(class, _)| *class == config.device)
            .map(|(_, p)| p.clone())
            .or_else(|| self.node_of_class(config.device).map(Path::to_path_buf))
            .ok_or_else(|| DeviceError::NotFound(config.device.source_type_name().to_string()))?;

        let dev = Self::open(&path)?;
        let current = dev.format().map_err(|_| DeviceError::GetFormatFailed)?;
        let wanted = Format::new(config.width, config.height, FourCC::new(b"NV12"));
        let applied = dev.set_format(&wanted).map_err(|e| {
            warn!(path = %path.display(), error = %e, previous = ?current.fourcc, "VIDIOC_S_FMT failed");
            DeviceError::SetFormatFailed
        })?;
        if applied.width != config.width || applied.height != config.height {
            return Err(DeviceError::InvalidResolution);
        }

        dev.set_params(&Parameters::with_fps(config.frame_rate))
            .map_err(|_| DeviceError::SetFps)?;

        info!(
            path = %path.display(),
            width = config.width,
            height = config.height,
            fps = config.frame_rate,
            "Configured capture source"
        );
        Ok(())
    }

    fn device_name(&self, index: usize) -> Option<String> {
        self.nodes
            .get(index)
            .map(|(_, p)| p.to_string_lossy().into_owned())
    }

    fn try_display_mode(
        &mut self,
        display_id: u32,
        width: u32,
        height: u32,
    ) -> Result<u32, DeviceError> {
        let modes = connector_modes(&self.drm_root, display_id)?;
        if !modes.contains(&(width, height)) {
            debug!(display_id, width, height, "Display mode not offered by connector");
            return Err(DeviceError::ModeUnavailable { width, height });
        }
        self.resolution = (width, height);
        self.frame_rate = DEFAULT_REFRESH;
        info!(display_id, width, height, refresh = DEFAULT_REFRESH, "Display mode selected");
        Ok(DEFAULT_REFRESH)
    }

    fn set_control(
        &mut self,
        class: DeviceClass,
        name: &str,
        value: i64,
    ) -> Result<(), DeviceError> {
        let path = self
            .node_of_class(class)
            .ok_or_else(|| DeviceError::NotFound(class.source_type_name().to_string()))?
            .to_path_buf();
        let dev = Self::open(&path)?;
        let description = dev
            .query_controls()?
            .into_iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| DeviceError::UnknownControl(name.to_string()))?;

        dev.set_control(v4l::control::Control {
            id: description.id,
            value: v4l::control::Value::Integer(value),
        })?;
        debug!(path = %path.display(), control = name, value, "Set device control");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_by_driver_then_card() {
        assert_eq!(classify("uvcvideo", "HD Webcam"), Some(DeviceClass::Uvc));
        assert_eq!(classify("xilinx-vipp", "vcap_tpg output 0"), Some(DeviceClass::Tpg));
        assert_eq!(classify("xilinx-vipp", "vcap_hdmi output 0"), Some(DeviceClass::Hdmi));
        assert_eq!(classify("xilinx-vipp", "vcap_mipi_0 output 0"), Some(DeviceClass::Csi));
        assert_eq!(classify("xilinx-vipp", "vcap_scaler"), None);
    }

    #[test]
    fn mode_lines_ignore_interlace_suffix() {
        assert_eq!(parse_mode_line("3840x2160"), Some((3840, 2160)));
        assert_eq!(parse_mode_line("1920x1080i"), Some((1920, 1080)));
        assert_eq!(parse_mode_line("garbage"), None);
    }

    #[test]
    fn display_mode_probe_reads_connector_modes() {
        let root = std::env::temp_dir().join(format!("vidpipe-drm-{}", std::process::id()));
        let connector = root.join("card0-DP-1");
        std::fs::create_dir_all(&connector).unwrap();
        std::fs::write(connector.join("modes"), "1920x1080\n1280x720\n").unwrap();

        let mut dev = V4lDevices::with_roots(root.join("dev"), &root, 39);
        assert!(matches!(
            dev.try_display_mode(0, 3840, 2160),
            Err(DeviceError::ModeUnavailable { .. })
        ));
        assert_eq!(dev.try_display_mode(0, 1920, 1080).unwrap(), 60);
        assert_eq!(dev.active_resolution(), (1920, 1080));
        assert!(matches!(dev.try_display_mode(1, 1920, 1080), Err(DeviceError::NotFound(_))));

        std::fs::remove_dir_all(&root).unwrap();
    }
}
