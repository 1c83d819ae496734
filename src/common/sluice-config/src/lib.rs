use common_error::SluiceResult;
use serde::{Deserialize, Serialize};

/// Environment variable that turns off map-key narrowing.
pub const DISABLE_MAP_KEY_PRUNING: &str = "SLUICE_DISABLE_MAP_KEY_PRUNING";
/// Environment variable that turns off handing projections to data sources.
pub const DISABLE_PROJECTION_PUSHDOWN: &str = "SLUICE_DISABLE_PROJECTION_PUSHDOWN";
/// Environment variable that silences pruning diagnostics.
pub const DISABLE_PRUNE_DIAGNOSTICS: &str = "SLUICE_DISABLE_PRUNE_DIAGNOSTICS";

/// Configuration for the column pruning pass.
///
/// Fields that are missing when deserializing take their default value, so a
/// partial JSON document such as `{"enable_map_key_pruning": false}` is valid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnPruneConfig {
    /// Track required keys of map-typed fields and report / push them down.
    pub enable_map_key_pruning: bool,
    /// Offer the final projection to data sources that can skip fields physically.
    pub enable_projection_pushdown: bool,
    /// Keep the first field of an operator whose consumers need none of its fields,
    /// so rows keep flowing with a non-empty schema.
    pub retain_one_column: bool,
    /// Produce and log "Columns pruned" / "Map key required" records.
    pub emit_diagnostics: bool,
}

impl Default for ColumnPruneConfig {
    fn default() -> Self {
        Self {
            enable_map_key_pruning: true,
            enable_projection_pushdown: true,
            retain_one_column: true,
            emit_diagnostics: true,
        }
    }
}

fn env_flag_set(name: &str) -> bool {
    match std::env::var(name) {
        Ok(val) => matches!(val.trim().to_lowercase().as_str(), "1" | "true"),
        Err(_) => false,
    }
}

impl ColumnPruneConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if env_flag_set(DISABLE_MAP_KEY_PRUNING) {
            cfg.enable_map_key_pruning = false;
        }
        if env_flag_set(DISABLE_PROJECTION_PUSHDOWN) {
            cfg.enable_projection_pushdown = false;
        }
        if env_flag_set(DISABLE_PRUNE_DIAGNOSTICS) {
            cfg.emit_diagnostics = false;
        }
        cfg
    }

    pub fn from_json(json: &str) -> SluiceResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_map_key_pruning(mut self, enabled: bool) -> Self {
        self.enable_map_key_pruning = enabled;
        self
    }

    pub fn with_projection_pushdown(mut self, enabled: bool) -> Self {
        self.enable_projection_pushdown = enabled;
        self
    }

    pub fn with_retain_one_column(mut self, enabled: bool) -> Self {
        self.retain_one_column = enabled;
        self
    }

    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.emit_diagnostics = enabled;
        self
    }
}
