// Dashboard status notices
use serde::Serialize;

/// Explicit dashboard states that replace the regular panels.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// The selected vehicle has no records in the window.
    Empty { entity_id: String },
    /// The data source could not be reached or queried.
    Unavailable { reason: String },
    /// The replay revealed every record.
    Complete {
        entity_id: String,
        ticks: usize,
        duration_ms: i64,
    },
}
