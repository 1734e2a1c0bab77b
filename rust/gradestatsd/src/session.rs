use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Class key used for sessions recorded without a class.
pub const NO_CLASS_KEY: &str = "no-class";
pub const NO_CLASS_NAME: &str = "No Class";
/// Student key used for sessions recorded without a student name.
pub const NO_STUDENT: &str = "No Student";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub value: f64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentTiming {
    pub average_time_per_operation: f64,
    pub total_time: f64,
    pub accuracy: f64,
}

/// One recorded grading pass, as persisted by the calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub date: String,
    #[serde(default)]
    pub items: Vec<Operation>,
    pub total: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_stats: Option<AssignmentTiming>,
}

fn non_empty(v: Option<&str>) -> Option<&str> {
    v.filter(|s| !s.is_empty())
}

/// Assignment fields of a session that is tied to a graded assignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssignmentRef<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub max_score: f64,
}

impl Session {
    pub fn class_key(&self) -> &str {
        non_empty(self.class_id.as_deref()).unwrap_or(NO_CLASS_KEY)
    }

    pub fn class_display_name(&self) -> &str {
        let key = self.class_key();
        if key == NO_CLASS_KEY {
            return NO_CLASS_NAME;
        }
        non_empty(self.class_name.as_deref()).unwrap_or(key)
    }

    pub fn student_key(&self) -> &str {
        non_empty(self.student_name.as_deref()).unwrap_or(NO_STUDENT)
    }

    /// Present only when id and title are non-empty and the max score is a
    /// usable non-zero number.
    pub fn assignment(&self) -> Option<AssignmentRef<'_>> {
        let id = non_empty(self.assignment_id.as_deref())?;
        let title = non_empty(self.assignment_title.as_deref())?;
        let max_score = self.max_score.filter(|m| *m != 0.0 && !m.is_nan())?;
        Some(AssignmentRef {
            id,
            title,
            max_score,
        })
    }

    /// RFC 3339 timestamps, or a bare `YYYY-MM-DD` read as UTC midnight.
    pub fn parsed_date(&self) -> Option<DateTime<Utc>> {
        if let Ok(d) = DateTime::parse_from_rfc3339(&self.date) {
            return Some(d.with_timezone(&Utc));
        }
        NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|d| d.and_utc())
    }
}

/// Stable ascending sort by session date. Sessions whose date does not
/// parse sort ahead of every dated session.
pub fn sort_chronological(sessions: &mut [Session]) {
    sessions.sort_by_key(|s| s.parsed_date());
}

/// Newest first, the order the history view lists sessions in.
pub fn sort_newest_first(sessions: &mut [Session]) {
    sessions.sort_by(|a, b| b.parsed_date().cmp(&a.parsed_date()));
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentDraft {
    pub id: String,
    pub title: String,
    pub max_score: f64,
}

/// What the calculator hands over when a session is saved.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDraft {
    #[serde(default)]
    pub student_name: String,
    #[serde(default)]
    pub items: Vec<Operation>,
    #[serde(default)]
    pub class_id: Option<String>,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub assignment: Option<AssignmentDraft>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftError {
    NoData,
    NoName,
    InvalidMaxScore,
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Turns a calculator draft into a persisted session.
///
/// Times are stored in seconds, percentages with two decimals. Without an
/// assignment the score is taken against a max of 1.
pub fn build_session(draft: &SessionDraft, now: DateTime<Utc>) -> Result<Session, DraftError> {
    if draft.items.is_empty() {
        return Err(DraftError::NoData);
    }
    if let Some(a) = &draft.assignment {
        if !(a.max_score.is_finite() && a.max_score > 0.0) {
            return Err(DraftError::InvalidMaxScore);
        }
    }
    let student_name = draft.student_name.trim();
    if student_name.is_empty() {
        return Err(DraftError::NoName);
    }

    let total: f64 = draft.items.iter().map(|op| op.value).sum();

    let total_time_ms = match (draft.items.first(), draft.items.last()) {
        (Some(first), Some(last)) if draft.items.len() > 1 => {
            (last.timestamp - first.timestamp) as f64
        }
        _ => 0.0,
    };
    let per_operation_ms = total_time_ms / draft.items.len().max(1) as f64;

    let max_score = draft
        .assignment
        .as_ref()
        .map(|a| a.max_score)
        .unwrap_or(1.0);
    let percentage = total / max_score * 100.0;

    Ok(Session {
        date: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        items: draft.items.clone(),
        total,
        student_name: Some(student_name.to_string()),
        class_id: draft.class_id.clone(),
        class_name: draft.class_name.clone(),
        assignment_id: draft.assignment.as_ref().map(|a| a.id.clone()),
        assignment_title: draft.assignment.as_ref().map(|a| a.title.clone()),
        max_score: draft.assignment.as_ref().map(|a| a.max_score),
        percentage_score: Some(round2(percentage)),
        assignment_stats: Some(AssignmentTiming {
            average_time_per_operation: round2(per_operation_ms / 1000.0),
            total_time: round2(total_time_ms / 1000.0),
            accuracy: round2(percentage.min(100.0)),
        }),
    })
}

/// True when `student_name` already has a session on `assignment_id`.
/// Sessions outside an assignment are never duplicates.
pub fn is_duplicate(sessions: &[Session], student_name: &str, assignment_id: Option<&str>) -> bool {
    let Some(assignment_id) = assignment_id else {
        return false;
    };
    let wanted = student_name.trim();
    sessions.iter().any(|s| {
        s.assignment_id.as_deref() == Some(assignment_id)
            && s.student_name.as_deref().map(str::trim) == Some(wanted)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn plain(total: f64) -> Session {
        Session {
            date: "2024-01-01T00:00:00.000Z".to_string(),
            items: Vec::new(),
            total,
            student_name: None,
            class_id: None,
            class_name: None,
            assignment_id: None,
            assignment_title: None,
            max_score: None,
            percentage_score: None,
            assignment_stats: None,
        }
    }

    #[test]
    fn missing_identifiers_fall_back_to_sentinels() {
        let mut s = plain(3.0);
        assert_eq!(s.class_key(), NO_CLASS_KEY);
        assert_eq!(s.class_display_name(), NO_CLASS_NAME);
        assert_eq!(s.student_key(), NO_STUDENT);

        s.student_name = Some(String::new());
        s.class_id = Some(String::new());
        assert_eq!(s.student_key(), NO_STUDENT);
        assert_eq!(s.class_key(), NO_CLASS_KEY);

        s.class_id = Some("c7".to_string());
        assert_eq!(s.class_display_name(), "c7");
        s.class_name = Some("Grade 7".to_string());
        assert_eq!(s.class_display_name(), "Grade 7");
    }

    #[test]
    fn assignment_requires_all_fields_and_nonzero_max() {
        let mut s = plain(3.0);
        s.assignment_id = Some("a1".to_string());
        s.assignment_title = Some("Quiz".to_string());
        assert!(s.assignment().is_none());
        s.max_score = Some(0.0);
        assert!(s.assignment().is_none());
        s.max_score = Some(20.0);
        let a = s.assignment().expect("assignment");
        assert_eq!(a.id, "a1");
        assert_eq!(a.max_score, 20.0);
        s.assignment_title = Some(String::new());
        assert!(s.assignment().is_none());
    }

    #[test]
    fn session_json_uses_camel_case_and_skips_absent_fields() {
        let raw = serde_json::json!({
            "date": "2024-03-01T10:00:00.000Z",
            "items": [{ "value": 2, "timestamp": 1000 }],
            "total": 2,
            "studentName": "12",
            "assignmentStats": { "averageTimePerOperation": 0.5, "totalTime": 1.0, "accuracy": 10.0 }
        });
        let s: Session = serde_json::from_value(raw).expect("session");
        assert_eq!(s.student_key(), "12");
        assert_eq!(s.assignment_stats.map(|t| t.total_time), Some(1.0));

        let back = serde_json::to_value(&s).expect("json");
        assert!(back.get("classId").is_none());
        assert_eq!(back["studentName"], "12");
    }

    #[test]
    fn chronological_sort_is_stable_and_puts_bad_dates_first() {
        let mut a = plain(1.0);
        a.date = "2024-05-02T08:00:00.000Z".to_string();
        let mut b = plain(2.0);
        b.date = "2024-05-01T08:00:00.000Z".to_string();
        let mut c = plain(3.0);
        c.date = "not a date".to_string();
        let mut d = plain(4.0);
        d.date = "2024-05-01T08:00:00.000Z".to_string();

        let mut sessions = vec![a, b, c, d];
        sort_chronological(&mut sessions);
        let totals: Vec<f64> = sessions.iter().map(|s| s.total).collect();
        assert_eq!(totals, vec![3.0, 2.0, 4.0, 1.0]);

        sort_newest_first(&mut sessions);
        assert_eq!(sessions[0].total, 1.0);
    }

    #[test]
    fn build_session_derives_totals_and_timing() {
        let draft = SessionDraft {
            student_name: "  42 ".to_string(),
            items: vec![
                Operation { value: 5.0, timestamp: 1_000 },
                Operation { value: 2.5, timestamp: 2_500 },
                Operation { value: -0.5, timestamp: 4_000 },
            ],
            class_id: Some("c1".to_string()),
            class_name: Some("Math".to_string()),
            assignment: Some(AssignmentDraft {
                id: "a1".to_string(),
                title: "Quiz".to_string(),
                max_score: 20.0,
            }),
        };
        let now = Utc.with_ymd_and_hms(2024, 9, 1, 12, 0, 0).single().expect("time");
        let s = build_session(&draft, now).expect("session");
        assert_eq!(s.total, 7.0);
        assert_eq!(s.student_name.as_deref(), Some("42"));
        assert_eq!(s.date, "2024-09-01T12:00:00.000Z");
        assert_eq!(s.percentage_score, Some(35.0));
        let timing = s.assignment_stats.expect("timing");
        assert_eq!(timing.total_time, 3.0);
        assert_eq!(timing.average_time_per_operation, 1.0);
        assert_eq!(timing.accuracy, 35.0);
        assert!(s.assignment().is_some());
    }

    #[test]
    fn build_session_without_assignment_scores_against_one() {
        let draft = SessionDraft {
            student_name: "7".to_string(),
            items: vec![Operation { value: 3.0, timestamp: 10 }],
            class_id: None,
            class_name: None,
            assignment: None,
        };
        let s = build_session(&draft, Utc::now()).expect("session");
        assert_eq!(s.percentage_score, Some(300.0));
        let timing = s.assignment_stats.expect("timing");
        assert_eq!(timing.accuracy, 100.0);
        assert_eq!(timing.total_time, 0.0);
        assert!(s.assignment().is_none());
    }

    #[test]
    fn build_session_rejects_blank_name() {
        let draft = SessionDraft {
            student_name: "   ".to_string(),
            items: vec![Operation { value: 1.0, timestamp: 0 }],
            class_id: None,
            class_name: None,
            assignment: None,
        };
        assert_eq!(build_session(&draft, Utc::now()), Err(DraftError::NoName));
    }

    #[test]
    fn build_session_rejects_empty_items() {
        let draft = SessionDraft {
            student_name: "7".to_string(),
            items: Vec::new(),
            class_id: None,
            class_name: None,
            assignment: None,
        };
        assert_eq!(build_session(&draft, Utc::now()), Err(DraftError::NoData));
    }

    #[test]
    fn build_session_rejects_non_positive_max_score() {
        for max_score in [0.0, -20.0, f64::NAN] {
            let draft = SessionDraft {
                student_name: "7".to_string(),
                items: vec![Operation { value: 3.0, timestamp: 10 }],
                class_id: None,
                class_name: None,
                assignment: Some(AssignmentDraft {
                    id: "a".to_string(),
                    title: "t".to_string(),
                    max_score,
                }),
            };
            assert_eq!(
                build_session(&draft, Utc::now()),
                Err(DraftError::InvalidMaxScore)
            );
        }
    }

    #[test]
    fn date_only_strings_parse_as_utc_midnight() {
        let mut s = plain(1.0);
        s.date = "2024-03-01".to_string();
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).single();
        assert_eq!(s.parsed_date(), expected);

        let mut later = plain(2.0);
        later.date = "2024-03-01T09:00:00.000Z".to_string();
        let mut bad = plain(3.0);
        bad.date = "someday".to_string();
        let mut sessions = vec![later, s, bad];
        sort_chronological(&mut sessions);
        let totals: Vec<f64> = sessions.iter().map(|s| s.total).collect();
        assert_eq!(totals, vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn duplicates_are_scoped_to_assignment() {
        let mut s = plain(1.0);
        s.student_name = Some("42".to_string());
        s.assignment_id = Some("a1".to_string());
        let sessions = vec![s];
        assert!(is_duplicate(&sessions, " 42", Some("a1")));
        assert!(!is_duplicate(&sessions, "42", Some("a2")));
        assert!(!is_duplicate(&sessions, "42", None));
        assert!(!is_duplicate(&sessions, "43", Some("a1")));
    }
}
