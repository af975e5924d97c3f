// SPDX-License-Identifier: GPL-3.0-only

//! Enumerated video sources

use super::DeviceClass;

/// One enumerated source slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub class: DeviceClass,
    /// Human-readable name
    pub name: &'static str,
    pub short_name: &'static str,
    /// Source exposes tunable controls (pattern, gain, ...)
    pub has_panel: bool,
    /// Device node, attached on first selection
    pub handle: Option<String>,
}

impl SourceDescriptor {
    pub fn new(class: DeviceClass) -> Self {
        let (name, short_name, has_panel) = match class {
            DeviceClass::Tpg => ("Test Pattern Generator", "TPG", true),
            DeviceClass::Csi => ("MIPI CSI2 Rx", "CSI", true),
            DeviceClass::Uvc => ("USB Webcam", "UVC", false),
            DeviceClass::Hdmi => ("HDMI Input", "HDMI", false),
            DeviceClass::Sdi => ("SDI Input", "SDI", false),
            DeviceClass::Vivid => ("Virtual Video Device", "vivid", false),
            DeviceClass::File => ("File", "File", false),
        };
        Self {
            class,
            name,
            short_name,
            has_panel,
            handle: None,
        }
    }
}

/// Sources in enumeration order; the file source, when enabled, is the last slot
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    entries: Vec<SourceDescriptor>,
}

impl SourceRegistry {
    pub fn from_classes(classes: impl IntoIterator<Item = DeviceClass>, file_enabled: bool) -> Self {
        let mut entries: Vec<SourceDescriptor> = classes
            .into_iter()
            .filter(|c| *c != DeviceClass::File)
            .map(SourceDescriptor::new)
            .collect();
        if file_enabled {
            entries.push(SourceDescriptor::new(DeviceClass::File));
        }
        Self { entries }
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, index: usize) -> Option<&SourceDescriptor> {
        self.entries.get(index)
    }

    pub fn class(&self, index: usize) -> Option<DeviceClass> {
        self.get(index).map(|s| s.class)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceDescriptor> {
        self.entries.iter()
    }

    /// First slot of the given class
    pub fn index_of_class(&self, class: DeviceClass) -> Option<usize> {
        self.entries.iter().position(|s| s.class == class)
    }

    /// Lookup by command-line source type name (`tpg`, `mipi`, ...)
    pub fn index_of_name(&self, name: &str) -> Option<usize> {
        DeviceClass::from_source_type_name(name).and_then(|c| self.index_of_class(c))
    }

    /// File-class source sitting in the terminal slot
    pub fn is_terminal_file(&self, index: usize) -> bool {
        index + 1 == self.entries.len() && self.class(index) == Some(DeviceClass::File)
    }

    /// Attach the device handle if it is not bound yet; returns the bound handle
    pub fn bind_with<F>(&mut self, index: usize, resolve: F) -> Option<&str>
    where
        F: FnOnce(&SourceDescriptor) -> Option<String>,
    {
        let entry = self.entries.get_mut(index)?;
        if entry.handle.is_none() {
            entry.handle = resolve(entry);
        }
        entry.handle.as_deref()
    }
}
