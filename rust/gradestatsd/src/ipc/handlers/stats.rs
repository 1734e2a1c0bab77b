use crate::config::{self, SessionOrder, StatsConfig};
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::{db_conn, optional_str};
use crate::ipc::types::{AppState, Request};
use crate::report::{self, ClassReport};
use crate::session::{self, Session};
use crate::stats;
use serde_json::json;

fn parse_order(req: &Request, default: SessionOrder) -> Result<SessionOrder, serde_json::Value> {
    match req.params.get("order") {
        None => Ok(default),
        Some(v) if v.is_null() => Ok(default),
        Some(v) => v.as_str().and_then(SessionOrder::parse).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                "order must be one of: chronological, input",
                Some(json!({ "order": v })),
            )
        }),
    }
}

/// Inline `params.sessions` when given, otherwise the workspace history.
fn source_sessions(state: &AppState, req: &Request) -> Result<Vec<Session>, serde_json::Value> {
    if let Some(raw) = req.params.get("sessions").filter(|v| !v.is_null()) {
        return serde_json::from_value::<Vec<Session>>(raw.clone()).map_err(|e| {
            err(
                &req.id,
                "bad_params",
                format!("sessions must be an array of sessions: {e}"),
                None,
            )
        });
    }
    let conn = db_conn(state, req)?;
    db::sessions_load(conn).map_err(|e| {
        tracing::warn!(error = ?e, "stored sessions unreadable");
        err(&req.id, "bad_sessions", format!("{e:#}"), None)
    })
}

/// `None` without a workspace or when the stored config is unreadable.
fn workspace_config(state: &AppState) -> Option<StatsConfig> {
    let conn = state.db.as_ref()?;
    match config::load(conn) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            tracing::warn!(error = ?e, "stats config unreadable, using defaults");
            None
        }
    }
}

/// Report JSON plus the bar colour of every histogram bucket, so the
/// display layer does not need to recompute them.
fn report_json(report: &ClassReport) -> serde_json::Value {
    let mut classes = serde_json::Map::new();
    for (key, class) in report {
        let mut value = json!(class);
        let buckets = class.score_distribution.ranges.len();
        let colors: Vec<String> = (0..buckets)
            .map(|i| stats::score_bar_color(i, buckets))
            .collect();
        value["scoreDistribution"]["colors"] = json!(colors);
        classes.insert(key.clone(), value);
    }
    serde_json::Value::Object(classes)
}

fn handle_stats_compute(state: &mut AppState, req: &Request) -> serde_json::Value {
    let cfg = workspace_config(state);
    let default_order = cfg.map_or(SessionOrder::Chronological, |c| c.session_order);
    let order = match parse_order(req, default_order) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_id = match optional_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut sessions = match source_sessions(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    if let Some(class_id) = class_id.as_deref() {
        sessions.retain(|s| s.class_key() == class_id);
    }
    if order == SessionOrder::Chronological {
        session::sort_chronological(&mut sessions);
    }

    let report = match cfg {
        Some(cfg) => report::calculate_with_options(&sessions, &cfg.report_options()),
        None => report::calculate_advanced_statistics(&sessions),
    };

    ok(
        &req.id,
        json!({
            "order": order.as_str(),
            "sessionCount": sessions.len(),
            "classes": report_json(&report)
        }),
    )
}

fn handle_stats_config_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match config::load(conn) {
        Ok(cfg) => ok(&req.id, json!({ "config": cfg })),
        Err(e) => err(&req.id, "db_query_failed", format!("{e:?}"), None),
    }
}

fn handle_stats_config_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut cfg = match config::load(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", format!("{e:?}"), None),
    };
    if let Err(msg) = cfg.apply_patch(&req.params) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = config::save(conn, &cfg) {
        return err(&req.id, "db_update_failed", format!("{e:?}"), None);
    }
    tracing::info!(
        recent_window = cfg.recent_window,
        order = cfg.session_order.as_str(),
        "stats config updated"
    );
    ok(&req.id, json!({ "config": cfg }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "stats.compute" => Some(handle_stats_compute(state, req)),
        "stats.config.get" => Some(handle_stats_config_get(state, req)),
        "stats.config.update" => Some(handle_stats_config_update(state, req)),
        _ => None,
    }
}
