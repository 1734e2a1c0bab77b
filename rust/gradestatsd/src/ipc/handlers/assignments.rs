use crate::ipc::error::{err, ok};
use crate::ipc::handlers::{db_conn, optional_str};
use crate::ipc::types::{AppState, Request};
use crate::roster::{self, RosterError};
use serde_json::json;

fn handle_assignments_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "assignments": [] }));
    };
    let class_id = match optional_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut assignments = match roster::assignments_load(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", format!("{e:#}"), None),
    };
    if let Some(class_id) = class_id.as_deref() {
        assignments.retain(|a| a.class_id == class_id);
    }
    ok(&req.id, json!({ "assignments": assignments }))
}

fn handle_assignments_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_id = match optional_str(req, "classId") {
        Ok(Some(v)) => v,
        Ok(None) => return err(&req.id, "bad_params", "missing classId", None),
        Err(e) => return e,
    };
    let classes = match roster::classes_load(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", format!("{e:#}"), None),
    };
    if !classes.iter().any(|c| c.id == class_id) {
        return err(
            &req.id,
            "not_found",
            "class not found",
            Some(json!({ "classId": class_id })),
        );
    }

    let title = req.params.get("title").and_then(|v| v.as_str()).unwrap_or("");
    let created = roster::parse_max_score(req.params.get("maxScore"))
        .and_then(|max_score| roster::new_assignment(&class_id, title, max_score));
    let assignment = match created {
        Ok(v) => v,
        Err(RosterError::NoTitle) => {
            return err(&req.id, "no_title", "assignment title is required", None)
        }
        Err(RosterError::InvalidMaxScore) | Err(RosterError::NoClassName) => {
            return err(
                &req.id,
                "invalid_max_score",
                "maxScore must be a whole number greater than 0",
                Some(json!({ "maxScore": req.params.get("maxScore") })),
            )
        }
    };

    let mut assignments = match roster::assignments_load(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", format!("{e:#}"), None),
    };
    assignments.push(assignment.clone());
    if let Err(e) = roster::assignments_store(conn, &assignments) {
        return err(&req.id, "db_update_failed", format!("{e:?}"), None);
    }
    tracing::info!(
        assignment = %assignment.id,
        class = %assignment.class_id,
        max_score = assignment.max_score,
        "assignment created"
    );
    ok(&req.id, json!({ "assignment": assignment }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "assignments.list" => Some(handle_assignments_list(state, req)),
        "assignments.create" => Some(handle_assignments_create(state, req)),
        _ => None,
    }
}
