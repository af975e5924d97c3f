// SPDX-License-Identifier: GPL-3.0-only

//! Scripted walk through source and filter combinations

use crate::config::PipelineConfig;
use crate::constants::{SDX_FILTER2D_PLUGIN, SDX_OPTICALFLOW_PLUGIN};
use crate::controller::PipelineSession;
use crate::device::DeviceControl;
use crate::engine::GraphEngine;
use crate::errors::SessionError;
use crate::registry::DeviceClass;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoStep {
    pub source: DeviceClass,
    /// Filter plugin, `None` for passthrough
    pub filter: Option<&'static str>,
    pub filter_mode: usize,
}

const fn step(source: DeviceClass, filter: Option<&'static str>, filter_mode: usize) -> DemoStep {
    DemoStep {
        source,
        filter,
        filter_mode,
    }
}

pub const DEFAULT_STEPS: &[DemoStep] = &[
    step(DeviceClass::Tpg, None, 0),
    step(DeviceClass::Tpg, Some(SDX_FILTER2D_PLUGIN), 0),
    step(DeviceClass::Tpg, Some(SDX_FILTER2D_PLUGIN), 1),
    step(DeviceClass::Csi, None, 0),
    step(DeviceClass::Csi, Some(SDX_OPTICALFLOW_PLUGIN), 0),
    step(DeviceClass::Uvc, None, 0),
    step(DeviceClass::Uvc, Some(SDX_FILTER2D_PLUGIN), 1),
    step(DeviceClass::Hdmi, None, 0),
];

pub struct DemoSequence {
    steps: Vec<DemoStep>,
    cursor: usize,
}

impl Default for DemoSequence {
    fn default() -> Self {
        Self::new(DEFAULT_STEPS.to_vec())
    }
}

impl DemoSequence {
    pub fn new(steps: Vec<DemoStep>) -> Self {
        Self { steps, cursor: 0 }
    }

    /// Step the next call to [`advance`](Self::advance) starts from
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Run the next step that both exists on this board and starts.
    ///
    /// Gives up after one full cycle and returns the last failure.
    pub fn advance<E: GraphEngine, D: DeviceControl>(
        &mut self,
        session: &mut PipelineSession<E, D>,
    ) -> Result<DemoStep, SessionError> {
        let mut last_error = None;
        for _ in 0..self.steps.len() {
            let step = self.steps[self.cursor];
            self.cursor = (self.cursor + 1) % self.steps.len();

            let registry = session.registry();
            let Some(source) = registry.sources.index_of_class(step.source) else {
                continue;
            };
            let filter_type = match step.filter {
                None => 0,
                Some(plugin) => match registry.filters.iter().position(|f| f.plugin == plugin) {
                    Some(index) => index + 1,
                    None => continue,
                },
            };

            let config = PipelineConfig {
                source,
                filter_type,
                filter_mode: step.filter_mode,
                ..session.config()
            };
            match session.change_mode(config) {
                Ok(()) => {
                    info!(source = ?step.source, filter = step.filter.unwrap_or("none"), mode = step.filter_mode, "Demo step");
                    return Ok(step);
                }
                Err(e) => {
                    warn!(source = ?step.source, error = %e, "Demo step failed, skipping");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error
            .unwrap_or_else(|| SessionError::InvalidSelection("no demo step available".to_string())))
    }
}
