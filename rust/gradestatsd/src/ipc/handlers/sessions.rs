use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::{db_conn, optional_str};
use crate::ipc::types::{AppState, Request};
use crate::session::{self, DraftError, Session, SessionDraft};
use rusqlite::Connection;
use serde_json::json;

fn load_sessions(conn: &Connection, req: &Request) -> Result<Vec<Session>, serde_json::Value> {
    db::sessions_load(conn).map_err(|e| {
        tracing::warn!(error = ?e, "stored sessions unreadable");
        err(&req.id, "bad_sessions", format!("{e:#}"), None)
    })
}

fn handle_sessions_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_id = match optional_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut sessions = match load_sessions(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Some(class_id) = class_id.as_deref() {
        sessions.retain(|s| s.class_key() == class_id);
    }
    session::sort_newest_first(&mut sessions);

    ok(&req.id, json!({ "sessions": sessions }))
}

fn handle_sessions_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let draft: SessionDraft = match serde_json::from_value(req.params.clone()) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "bad_params",
                format!("invalid session draft: {e}"),
                None,
            )
        }
    };
    let mut sessions = match load_sessions(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let new_session = match session::build_session(&draft, chrono::Utc::now()) {
        Ok(v) => v,
        Err(DraftError::NoData) => {
            return err(&req.id, "no_data", "nothing to save: the session has no operations", None)
        }
        Err(DraftError::NoName) => {
            return err(&req.id, "no_name", "student name is required", None)
        }
        Err(DraftError::InvalidMaxScore) => {
            return err(
                &req.id,
                "invalid_max_score",
                "assignment maxScore must be greater than 0",
                None,
            )
        }
    };

    let assignment_id = draft.assignment.as_ref().map(|a| a.id.as_str());
    if session::is_duplicate(&sessions, &draft.student_name, assignment_id) {
        return err(
            &req.id,
            "duplicate_student",
            "student already has a session for this assignment",
            Some(json!({
                "studentName": draft.student_name.trim(),
                "assignmentId": assignment_id
            })),
        );
    }

    sessions.insert(0, new_session.clone());
    if let Err(e) = db::sessions_store(conn, &sessions) {
        tracing::warn!(error = ?e, "session save failed");
        return err(&req.id, "db_update_failed", format!("{e:?}"), None);
    }
    tracing::info!(
        student = new_session.student_key(),
        class = new_session.class_key(),
        total = new_session.total,
        "session saved"
    );

    ok(
        &req.id,
        json!({
            "session": new_session,
            "sessionCount": sessions.len()
        }),
    )
}

fn handle_sessions_check_duplicate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(student_name) = req.params.get("studentName").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing studentName", None);
    };
    let assignment_id = match optional_str(req, "assignmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let sessions = match load_sessions(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    ok(
        &req.id,
        json!({
            "duplicate": session::is_duplicate(&sessions, student_name, assignment_id.as_deref())
        }),
    )
}

fn handle_sessions_clear(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match db::sessions_clear(conn) {
        Ok(removed) => {
            tracing::info!(removed, "session history cleared");
            ok(&req.id, json!({ "removed": removed }))
        }
        Err(e) => err(&req.id, "db_update_failed", format!("{e:?}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sessions.list" => Some(handle_sessions_list(state, req)),
        "sessions.save" => Some(handle_sessions_save(state, req)),
        "sessions.checkDuplicate" => Some(handle_sessions_check_duplicate(state, req)),
        "sessions.clear" => Some(handle_sessions_clear(state, req)),
        _ => None,
    }
}
