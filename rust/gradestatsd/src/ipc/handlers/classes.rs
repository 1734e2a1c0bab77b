use crate::ipc::error::{err, ok};
use crate::ipc::handlers::db_conn;
use crate::ipc::types::{AppState, Request};
use crate::roster::{self, ClassEntry};
use rusqlite::Connection;
use serde_json::json;

fn load_classes(conn: &Connection, req: &Request) -> Result<Vec<ClassEntry>, serde_json::Value> {
    roster::classes_load(conn).map_err(|e| err(&req.id, "db_query_failed", format!("{e:#}"), None))
}

fn required_class_id(req: &Request) -> Result<String, serde_json::Value> {
    match req.params.get("classId").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(err(&req.id, "bad_params", "missing classId", None)),
    }
}

fn handle_classes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "classes": [] }));
    };
    match load_classes(conn, req) {
        Ok(classes) => ok(&req.id, json!({ "classes": classes })),
        Err(e) => e,
    }
}

fn handle_classes_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = req.params.get("name").and_then(|v| v.as_str()).unwrap_or("");
    let class = match roster::new_class(name) {
        Ok(v) => v,
        Err(_) => return err(&req.id, "no_class_name", "class name is required", None),
    };
    let mut classes = match load_classes(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    classes.push(class.clone());
    if let Err(e) = roster::classes_store(conn, &classes) {
        return err(&req.id, "db_update_failed", format!("{e:?}"), None);
    }
    tracing::info!(class = %class.id, name = %class.name, "class created");
    ok(&req.id, json!({ "class": class }))
}

fn handle_classes_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_id = match required_class_id(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = req
        .params
        .get("name")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .unwrap_or("");
    if name.is_empty() {
        return err(&req.id, "no_class_name", "class name is required", None);
    }
    let mut classes = match load_classes(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(class) = classes.iter_mut().find(|c| c.id == class_id) else {
        return err(&req.id, "not_found", "class not found", None);
    };
    class.name = name.to_string();
    let updated = class.clone();
    if let Err(e) = roster::classes_store(conn, &classes) {
        return err(&req.id, "db_update_failed", format!("{e:?}"), None);
    }
    ok(&req.id, json!({ "class": updated }))
}

/// Removes the class entry only; saved sessions and assignments keep
/// their class id.
fn handle_classes_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_id = match required_class_id(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut classes = match load_classes(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let before = classes.len();
    classes.retain(|c| c.id != class_id);
    if classes.len() == before {
        return err(&req.id, "not_found", "class not found", None);
    }
    if let Err(e) = roster::classes_store(conn, &classes) {
        return err(&req.id, "db_update_failed", format!("{e:?}"), None);
    }
    tracing::info!(class = %class_id, "class deleted");
    ok(&req.id, json!({ "classId": class_id }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(handle_classes_list(state, req)),
        "classes.create" => Some(handle_classes_create(state, req)),
        "classes.update" => Some(handle_classes_update(state, req)),
        "classes.delete" => Some(handle_classes_delete(state, req)),
        _ => None,
    }
}
