use shared::{
    domain::{EnvironmentId, ProcessId},
    protocol::{ProcessStep, Zone},
};

use crate::error::PreconditionFailure;

/// Zones and steps a tracking session runs against.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionPlan {
    pub environment_id: EnvironmentId,
    pub process_id: ProcessId,
    pub zones: Vec<Zone>,
    pub steps: Vec<ProcessStep>,
}

impl SessionPlan {
    pub fn new(
        environment_id: EnvironmentId,
        process_id: ProcessId,
        zones: Vec<Zone>,
        steps: Vec<ProcessStep>,
    ) -> Self {
        Self {
            environment_id,
            process_id,
            zones,
            steps,
        }
    }

    /// Drops inactive zones, orders steps by number and checks that the
    /// plan can be tracked: steps numbered `1..=N` without gaps, each
    /// targeting a zone of the plan with a positive duration.
    pub fn validated(mut self) -> Result<Self, PreconditionFailure> {
        self.zones.retain(|zone| zone.active);
        if self.zones.is_empty() {
            return Err(PreconditionFailure::NoZones);
        }
        if self.steps.is_empty() {
            return Err(PreconditionFailure::NoSteps);
        }

        self.steps.sort_by_key(|step| step.step_number);
        for (index, step) in self.steps.iter().enumerate() {
            let expected = index as u32 + 1;
            if step.step_number != expected {
                return Err(PreconditionFailure::InvalidSteps(format!(
                    "expected step {expected}, found step {}",
                    step.step_number
                )));
            }
            if !self.zones.iter().any(|zone| zone.id == step.target_zone_id) {
                return Err(PreconditionFailure::InvalidSteps(format!(
                    "step {} targets unknown zone {}",
                    step.step_number, step.target_zone_id.0
                )));
            }
            let duration = step.target_duration_seconds;
            if duration.is_nan() || duration <= 0.0 {
                return Err(PreconditionFailure::InvalidSteps(format!(
                    "step {} needs a positive target duration",
                    step.step_number
                )));
            }
        }
        Ok(self)
    }

    pub fn total_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn target_total_seconds(&self) -> f64 {
        self.steps
            .iter()
            .map(|step| step.target_duration_seconds)
            .sum()
    }
}

#[cfg(test)]
#[path = "tests/plan_tests.rs"]
mod tests;
