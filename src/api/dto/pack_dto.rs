//! Pack DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{DogProfile, PackCode};
use crate::persistence::PackRecord;

/// Response body for `POST /pack`.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreatePackResponse {
    /// Shareable pack code.
    pub code: PackCode,
}

/// Request body for `POST /pack/join`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct JoinPackRequest {
    /// Code from the invitation link. When absent, the code cached in the
    /// profile is used.
    #[serde(default)]
    pub code: Option<String>,
}

/// Response body for `GET /pack/{code}`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PackResponse {
    /// Pack code.
    pub code: PackCode,
    /// Shared dog profile.
    pub profile: DogProfile,
    /// Last publish time.
    pub updated_at: DateTime<Utc>,
}

impl From<PackRecord> for PackResponse {
    fn from(record: PackRecord) -> Self {
        Self {
            code: record.code,
            profile: record.profile,
            updated_at: record.updated_at,
        }
    }
}
