use shared::{
    domain::{EnvironmentId, ProcessId, ZoneId},
    protocol::{ProcessStep, StepListUpdate, Zone, ZoneListUpdate},
};
use tracing::info;

use crate::{error::TransportError, transport::HttpTransport};

/// Zone and step persistence.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    transport: HttpTransport,
}

impl CatalogClient {
    pub fn new(transport: HttpTransport) -> Self {
        Self { transport }
    }

    pub async fn list_zones(
        &self,
        environment_id: EnvironmentId,
    ) -> Result<Vec<Zone>, TransportError> {
        self.transport
            .get_json(&format!("/environments/{}/zones", environment_id.0))
            .await
    }

    /// Replaces every zone of the environment and returns the stored list,
    /// in which provisional ids have been swapped for real ones.
    pub async fn replace_zones(
        &self,
        environment_id: EnvironmentId,
        zones: Vec<Zone>,
    ) -> Result<Vec<Zone>, TransportError> {
        let count = zones.len();
        let stored: Vec<Zone> = self
            .transport
            .put_json(
                &format!("/environments/{}/zones", environment_id.0),
                &ZoneListUpdate { zones },
            )
            .await?;
        info!(
            environment_id = environment_id.0,
            sent = count,
            stored = stored.len(),
            "zones saved"
        );
        Ok(stored)
    }

    pub async fn create_zone(&self, zone: &Zone) -> Result<Zone, TransportError> {
        self.transport.post_json("/zones", zone).await
    }

    pub async fn delete_zone(&self, zone_id: ZoneId) -> Result<(), TransportError> {
        self.transport.delete(&format!("/zones/{}", zone_id.0)).await
    }

    pub async fn list_steps(
        &self,
        process_id: ProcessId,
    ) -> Result<Vec<ProcessStep>, TransportError> {
        self.transport
            .get_json(&format!("/processes/{}/steps", process_id.0))
            .await
    }

    pub async fn replace_steps(
        &self,
        process_id: ProcessId,
        steps: Vec<ProcessStep>,
    ) -> Result<Vec<ProcessStep>, TransportError> {
        let stored: Vec<ProcessStep> = self
            .transport
            .post_json(
                &format!("/processes/{}/steps", process_id.0),
                &StepListUpdate { steps },
            )
            .await?;
        info!(process_id = process_id.0, stored = stored.len(), "steps saved");
        Ok(stored)
    }
}

#[cfg(test)]
#[path = "tests/catalog_tests.rs"]
mod tests;
