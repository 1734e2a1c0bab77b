use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db;
use crate::report::ReportOptions;
use crate::stats::RECENT_WINDOW;

pub const STATS_CONFIG_KEY: &str = "stats.config";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionOrder {
    /// Oldest first, by session date.
    Chronological,
    /// As supplied by the caller or as stored.
    Input,
}

impl SessionOrder {
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.eq_ignore_ascii_case("chronological") {
            Some(SessionOrder::Chronological)
        } else if raw.eq_ignore_ascii_case("input") {
            Some(SessionOrder::Input)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionOrder::Chronological => "chronological",
            SessionOrder::Input => "input",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatsConfig {
    pub recent_window: usize,
    pub session_order: SessionOrder,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            recent_window: RECENT_WINDOW,
            session_order: SessionOrder::Chronological,
        }
    }
}

impl StatsConfig {
    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            recent_window: self.recent_window.max(1),
        }
    }

    /// Applies a partial update; unknown keys are ignored.
    pub fn apply_patch(&mut self, patch: &serde_json::Value) -> Result<(), String> {
        if let Some(v) = patch.get("recentWindow").filter(|v| !v.is_null()) {
            let Some(n) = v.as_u64() else {
                return Err("recentWindow must be a positive integer".to_string());
            };
            if n == 0 {
                return Err("recentWindow must be >= 1".to_string());
            }
            self.recent_window = n as usize;
        }
        if let Some(v) = patch.get("sessionOrder").filter(|v| !v.is_null()) {
            let order = v.as_str().and_then(SessionOrder::parse).ok_or_else(|| {
                "sessionOrder must be one of: chronological, input".to_string()
            })?;
            self.session_order = order;
        }
        Ok(())
    }
}

/// Stored config, or defaults when nothing has been saved. A stored value
/// that no longer parses falls back to defaults.
pub fn load(conn: &Connection) -> anyhow::Result<StatsConfig> {
    let Some(raw) = db::settings_get_json(conn, STATS_CONFIG_KEY)? else {
        return Ok(StatsConfig::default());
    };
    match serde_json::from_value::<StatsConfig>(raw) {
        Ok(cfg) => Ok(cfg),
        Err(e) => {
            tracing::warn!(error = %e, "ignoring unreadable stats config");
            Ok(StatsConfig::default())
        }
    }
}

pub fn save(conn: &Connection, cfg: &StatsConfig) -> anyhow::Result<()> {
    db::settings_set_json(conn, STATS_CONFIG_KEY, &serde_json::to_value(cfg)?)
}
