use atlas_application::BulkOutcome;
use serde::Serialize;
use ts_rs::TS;

/// Health response payload.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/health-response.ts"
)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Applied and skipped counts of a bulk ledger mutation.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../../packages/api-types/src/generated/bulk-outcome-response.ts"
)]
pub struct BulkOutcomeResponse {
    pub applied: u32,
    pub skipped: u32,
}

impl From<BulkOutcome> for BulkOutcomeResponse {
    fn from(value: BulkOutcome) -> Self {
        Self {
            applied: u32::try_from(value.applied).unwrap_or(u32::MAX),
            skipped: u32::try_from(value.skipped).unwrap_or(u32::MAX),
        }
    }
}
