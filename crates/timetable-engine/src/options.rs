//! Engine settings.

use serde::{Deserialize, Serialize};

use crate::expander::DEFAULT_MAX_OCCURRENCES;

/// Tunables for expansion and normalisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// IANA zone in which naive dates and wall-clock times are interpreted.
    pub timezone: String,
    /// Upper bound on the occurrences a single expansion may produce.
    pub max_occurrences: u16,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            max_occurrences: DEFAULT_MAX_OCCURRENCES,
        }
    }
}
