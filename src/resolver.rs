//! Target lookup for inbound scrapes.

use crate::config::TargetConfig;

/// Read-only table of configured targets, built once at startup.
#[derive(Debug, Clone)]
pub struct TargetTable {
    targets: Vec<TargetConfig>,
}

impl TargetTable {
    pub fn new(targets: Vec<TargetConfig>) -> Self {
        Self { targets }
    }

    /// Resolve a scrape key to a configured target.
    ///
    /// A key matches a target's room case-insensitively (Unicode-aware, so
    /// "büro" finds "Büro"), or its address exactly. The first matching
    /// target in configured order wins.
    pub fn resolve(&self, key: &str) -> Option<&TargetConfig> {
        let key_folded = key.to_lowercase();
        self.targets
            .iter()
            .find(|t| t.room.to_lowercase() == key_folded || t.address == key)
    }
}
