//! Homes endpoints: list, read alarm status, set alarm status

use serde::{Deserialize, Serialize};

use super::client::{ApiError, ResourceClient};
use crate::models::{AlarmMode, CoarseAlarmStatus, Home, ResourceStatus};

#[derive(Debug, Deserialize)]
struct HomesResponse {
    homes: Vec<Home>,
}

/// Body of `PATCH /homes/{id}/alarm`
#[derive(Debug, Serialize)]
struct AlarmRequest {
    alarm_status: CoarseAlarmStatus,
    alarm_mode: AlarmMode,
    silent_alarm: bool,
    scheduled_alarm_active: bool,
}

impl AlarmRequest {
    fn manual(armed: bool) -> Self {
        Self {
            alarm_status: if armed {
                CoarseAlarmStatus::On
            } else {
                CoarseAlarmStatus::Off
            },
            alarm_mode: AlarmMode::Manual,
            silent_alarm: false,
            scheduled_alarm_active: false,
        }
    }
}

impl ResourceClient {
    /// List homes in server order.
    pub async fn list_resources(&self, token: &str) -> Result<Vec<Home>, ApiError> {
        let resp: HomesResponse = self.get_json(self.endpoint(&["homes"]), token).await?;
        Ok(resp.homes)
    }

    pub async fn get_status(&self, home_id: &str, token: &str) -> Result<ResourceStatus, ApiError> {
        self.get_json(self.endpoint(&["homes", home_id]), token)
            .await
    }

    /// Arm or disarm in manual mode.
    pub async fn set_status(
        &self,
        home_id: &str,
        armed: bool,
        token: &str,
    ) -> Result<(), ApiError> {
        let url = self.endpoint(&["homes", home_id, "alarm"]);
        self.patch_json(url, &AlarmRequest::manual(armed), token)
            .await
    }
}
