mod test_support;

use serde_json::json;
use test_support::{error_code, request, request_ok, spawn_sidecar, temp_dir};

#[test]
fn saved_sessions_are_listed_newest_first_and_can_be_cleared() {
    let workspace = temp_dir("gradestats-sessions-history");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "sessions.save",
        json!({
            "studentName": " 11 ",
            "classId": "c1",
            "className": "Physics",
            "items": [
                { "value": 4, "timestamp": 1000 },
                { "value": 6, "timestamp": 5000 }
            ],
            "assignment": { "id": "a1", "title": "Lab 1", "maxScore": 20 }
        }),
    );
    let saved = &first["session"];
    assert_eq!(saved["studentName"], "11");
    assert_eq!(saved["total"].as_f64(), Some(10.0));
    assert_eq!(saved["percentageScore"].as_f64(), Some(50.0));
    assert_eq!(saved["assignmentStats"]["totalTime"].as_f64(), Some(4.0));
    assert_eq!(saved["assignmentStats"]["averageTimePerOperation"].as_f64(), Some(2.0));
    assert_eq!(saved["assignmentStats"]["accuracy"].as_f64(), Some(50.0));
    assert_eq!(first["sessionCount"].as_u64(), Some(1));

    let second = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "sessions.save",
        json!({
            "studentName": "12",
            "items": [{ "value": 3, "timestamp": 1000 }]
        }),
    );
    assert_eq!(second["sessionCount"].as_u64(), Some(2));

    let listed = request_ok(&mut stdin, &mut reader, "4", "sessions.list", json!({}));
    let sessions = listed["sessions"].as_array().cloned().unwrap_or_default();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0]["studentName"], "12");
    assert_eq!(sessions[1]["studentName"], "11");

    let physics = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "sessions.list",
        json!({ "classId": "c1" }),
    );
    assert_eq!(physics["sessions"].as_array().map(|a| a.len()), Some(1));
    let unassigned = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "sessions.list",
        json!({ "classId": "no-class" }),
    );
    assert_eq!(unassigned["sessions"][0]["studentName"], "12");

    let cleared = request_ok(&mut stdin, &mut reader, "7", "sessions.clear", json!({}));
    assert_eq!(cleared["removed"].as_u64(), Some(2));
    let after = request_ok(&mut stdin, &mut reader, "8", "sessions.list", json!({}));
    assert_eq!(after["sessions"].as_array().map(|a| a.len()), Some(0));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn save_rejects_invalid_drafts_and_duplicate_assignment_attempts() {
    let workspace = temp_dir("gradestats-sessions-validation");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let blank = request(
        &mut stdin,
        &mut reader,
        "2",
        "sessions.save",
        json!({ "studentName": "   ", "items": [{ "value": 1, "timestamp": 0 }] }),
    );
    assert_eq!(error_code(&blank), Some("no_name"));

    let empty = request(
        &mut stdin,
        &mut reader,
        "2b",
        "sessions.save",
        json!({ "studentName": "7", "items": [] }),
    );
    assert_eq!(error_code(&empty), Some("no_data"));

    let negative_max = request(
        &mut stdin,
        &mut reader,
        "2c",
        "sessions.save",
        json!({
            "studentName": "7",
            "items": [{ "value": 2, "timestamp": 0 }],
            "assignment": { "id": "a", "title": "t", "maxScore": -20 }
        }),
    );
    assert_eq!(error_code(&negative_max), Some("invalid_max_score"));

    let draft = json!({
        "studentName": "42",
        "classId": "c1",
        "items": [{ "value": 8, "timestamp": 10 }],
        "assignment": { "id": "a1", "title": "Quiz", "maxScore": 10 }
    });
    let _ = request_ok(&mut stdin, &mut reader, "3", "sessions.save", draft.clone());

    let check = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "sessions.checkDuplicate",
        json!({ "studentName": "42 ", "assignmentId": "a1" }),
    );
    assert_eq!(check["duplicate"].as_bool(), Some(true));
    let other = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "sessions.checkDuplicate",
        json!({ "studentName": "42", "assignmentId": "a2" }),
    );
    assert_eq!(other["duplicate"].as_bool(), Some(false));

    let again = request(&mut stdin, &mut reader, "6", "sessions.save", draft);
    assert_eq!(error_code(&again), Some("duplicate_student"));

    let malformed = request(
        &mut stdin,
        &mut reader,
        "7",
        "sessions.save",
        json!({ "studentName": "43", "items": "lots" }),
    );
    assert_eq!(error_code(&malformed), Some("bad_params"));

    let listed = request_ok(&mut stdin, &mut reader, "8", "sessions.list", json!({}));
    assert_eq!(listed["sessions"].as_array().map(|a| a.len()), Some(1));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
