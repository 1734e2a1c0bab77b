use crate::session::{AssignmentRef, AssignmentTiming, Session, NO_CLASS_KEY, NO_CLASS_NAME};
use crate::stats::{self, Comparison, ProgressTrend, ScoreDistribution};
use serde::Serialize;
use std::collections::BTreeMap;

/// Class key -> statistics. Always holds the `no-class` bucket.
pub type ClassReport = BTreeMap<String, ClassStatistics>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportOptions {
    pub recent_window: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            recent_window: stats::RECENT_WINDOW,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStatistics {
    pub name: String,
    pub count: usize,
    pub total_score: f64,
    pub max_score: f64,
    pub min_score: f64,
    pub scores: Vec<f64>,
    pub standard_deviation: f64,
    pub median_score: f64,
    pub progress_trend: ProgressTrend,
    pub consistency_score: f64,
    pub improvement_rate: f64,
    pub percentile: f64,
    pub comparison_to_class: Comparison,
    pub recent_performance: f64,
}

impl StudentStatistics {
    fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            count: 0,
            total_score: 0.0,
            max_score: 0.0,
            min_score: f64::INFINITY,
            scores: Vec::new(),
            standard_deviation: 0.0,
            median_score: 0.0,
            progress_trend: ProgressTrend::NoTrend,
            consistency_score: 0.0,
            improvement_rate: 0.0,
            percentile: 0.0,
            comparison_to_class: Comparison::At,
            recent_performance: 0.0,
        }
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.total_score / self.count as f64
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAssignmentPerformance {
    pub attempts: usize,
    pub best_score: f64,
    pub average_score: f64,
    /// Percent change of the latest attempt against the average of the
    /// attempts before it.
    pub improvement: f64,
    pub average_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentStatistics {
    pub id: String,
    pub title: String,
    pub max_score: f64,
    pub average_score: f64,
    pub average_percentage: f64,
    pub highest_score: f64,
    pub lowest_score: f64,
    pub total_attempts: usize,
    pub average_accuracy: f64,
    pub average_completion_time: f64,
    pub average_time_per_operation: f64,
    pub student_performance: BTreeMap<String, StudentAssignmentPerformance>,
}

impl AssignmentStatistics {
    fn empty(assignment: &AssignmentRef<'_>) -> Self {
        Self {
            id: assignment.id.to_string(),
            title: assignment.title.to_string(),
            max_score: assignment.max_score,
            average_score: 0.0,
            average_percentage: 0.0,
            highest_score: 0.0,
            lowest_score: f64::INFINITY,
            total_attempts: 0,
            average_accuracy: 0.0,
            average_completion_time: 0.0,
            average_time_per_operation: 0.0,
            student_performance: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassStatistics {
    pub name: String,
    pub count: usize,
    pub total_score: f64,
    pub max_score: f64,
    pub min_score: f64,
    pub standard_deviation: f64,
    pub median_score: f64,
    pub score_distribution: ScoreDistribution,
    pub students: BTreeMap<String, StudentStatistics>,
    pub assignments: BTreeMap<String, AssignmentStatistics>,
}

impl ClassStatistics {
    fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            count: 0,
            total_score: 0.0,
            max_score: 0.0,
            min_score: f64::INFINITY,
            standard_deviation: 0.0,
            median_score: 0.0,
            score_distribution: ScoreDistribution::default(),
            students: BTreeMap::new(),
            assignments: BTreeMap::new(),
        }
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.total_score / self.count as f64
    }
}

/// Normalized, borrowed view of one session: the only shape the builder
/// folds.
#[derive(Debug, Clone, Copy)]
struct SessionRecord<'a> {
    class_key: &'a str,
    class_name: &'a str,
    student: &'a str,
    total: f64,
    assignment: Option<AssignmentRef<'a>>,
    timing: Option<AssignmentTiming>,
}

impl<'a> From<&'a Session> for SessionRecord<'a> {
    fn from(s: &'a Session) -> Self {
        Self {
            class_key: s.class_key(),
            class_name: s.class_display_name(),
            student: s.student_key(),
            total: s.total,
            assignment: s.assignment(),
            timing: s.assignment_stats,
        }
    }
}

/// `(prev * (n - 1) + x) / n`, with `n` already counting `x`.
fn incremental_mean(prev: f64, n: usize, x: f64) -> f64 {
    let n = n as f64;
    (prev * (n - 1.0) + x) / n
}

fn normalize_sentinel(v: &mut f64) {
    if *v == f64::INFINITY {
        *v = 0.0;
    }
}

/// Accumulates sessions one at a time; `finish` runs the second pass that
/// derives spreads, trends and rankings.
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    classes: ClassReport,
    options: ReportOptions,
}

impl ReportBuilder {
    pub fn new(options: ReportOptions) -> Self {
        let mut classes = ClassReport::new();
        classes.insert(
            NO_CLASS_KEY.to_string(),
            ClassStatistics::empty(NO_CLASS_NAME),
        );
        Self { classes, options }
    }

    pub fn push(&mut self, session: &Session) {
        self.fold(SessionRecord::from(session));
    }

    fn fold(&mut self, rec: SessionRecord<'_>) {
        let class = self
            .classes
            .entry(rec.class_key.to_string())
            .or_insert_with(|| ClassStatistics::empty(rec.class_name));

        class.count += 1;
        class.total_score += rec.total;
        class.max_score = class.max_score.max(rec.total);
        class.min_score = class.min_score.min(rec.total);

        if let Some(assignment) = rec.assignment.as_ref() {
            let stats = class
                .assignments
                .entry(assignment.id.to_string())
                .or_insert_with(|| AssignmentStatistics::empty(assignment));
            fold_assignment(stats, &rec);
        }

        let student = class
            .students
            .entry(rec.student.to_string())
            .or_insert_with(|| StudentStatistics::empty(rec.student));
        student.count += 1;
        student.total_score += rec.total;
        student.max_score = student.max_score.max(rec.total);
        student.min_score = student.min_score.min(rec.total);
        student.scores.push(rec.total);
    }

    pub fn finish(self) -> ClassReport {
        let mut classes = self.classes;
        for class in classes.values_mut() {
            finalize_class(class, &self.options);
        }
        classes
    }
}

fn fold_assignment(stats: &mut AssignmentStatistics, rec: &SessionRecord<'_>) {
    stats.total_attempts += 1;
    stats.highest_score = stats.highest_score.max(rec.total);
    stats.lowest_score = stats.lowest_score.min(rec.total);
    let attempts_total = stats.total_attempts;

    let perf = stats
        .student_performance
        .entry(rec.student.to_string())
        .or_default();
    perf.attempts += 1;
    perf.best_score = perf.best_score.max(rec.total);

    let before = perf.average_score;
    if perf.attempts > 1 {
        perf.improvement = if before != 0.0 {
            (rec.total - before) / before * 100.0
        } else {
            0.0
        };
    }
    perf.average_score = incremental_mean(before, perf.attempts, rec.total);

    if let Some(timing) = rec.timing {
        perf.average_time = incremental_mean(perf.average_time, perf.attempts, timing.total_time);
        stats.average_completion_time =
            incremental_mean(stats.average_completion_time, attempts_total, timing.total_time);
        stats.average_time_per_operation = incremental_mean(
            stats.average_time_per_operation,
            attempts_total,
            timing.average_time_per_operation,
        );
        stats.average_accuracy =
            incremental_mean(stats.average_accuracy, attempts_total, timing.accuracy);
    }

    stats.average_score = incremental_mean(stats.average_score, attempts_total, rec.total);
    stats.average_percentage = stats.average_score / stats.max_score * 100.0;
}

fn finalize_class(class: &mut ClassStatistics, options: &ReportOptions) {
    normalize_sentinel(&mut class.min_score);
    for assignment in class.assignments.values_mut() {
        normalize_sentinel(&mut assignment.lowest_score);
    }

    let class_count = class.count;
    let class_mean = class.mean();
    if class_count > 0 {
        let pooled: Vec<f64> = class
            .students
            .values()
            .flat_map(|s| s.scores.iter().copied())
            .collect();
        class.standard_deviation = stats::standard_deviation(&pooled, class_mean);
        class.median_score = stats::median(&pooled);
        class.score_distribution = stats::score_distribution(&pooled);
    }

    let student_means: Vec<f64> = class
        .students
        .values()
        .filter(|s| s.count > 0)
        .map(StudentStatistics::mean)
        .collect();

    for student in class.students.values_mut() {
        normalize_sentinel(&mut student.min_score);
        if student.count == 0 {
            continue;
        }

        let mean = student.mean();
        student.standard_deviation = stats::standard_deviation(&student.scores, mean);
        student.median_score = stats::median(&student.scores);
        student.progress_trend = stats::progress_trend(&student.scores);
        student.consistency_score = stats::consistency_score(student.standard_deviation, mean);
        student.improvement_rate = stats::improvement_rate(&student.scores);
        student.recent_performance =
            stats::recent_performance(&student.scores, options.recent_window);

        if class_count > 1 {
            student.percentile = stats::percentile(mean, &student_means);
            student.comparison_to_class = stats::compare_to_reference(mean, class_mean);
        }
    }
}

/// Builds the per-class report.
///
/// Trend and recency metrics follow the order of `sessions`; pass them
/// sorted oldest first (see `session::sort_chronological`) to get
/// chronological trends.
pub fn calculate_advanced_statistics(sessions: &[Session]) -> ClassReport {
    calculate_with_options(sessions, &ReportOptions::default())
}

pub fn calculate_with_options(sessions: &[Session], options: &ReportOptions) -> ClassReport {
    let mut builder = ReportBuilder::new(*options);
    for session in sessions {
        builder.push(session);
    }
    let report = builder.finish();
    tracing::debug!(
        sessions = sessions.len(),
        classes = report.len(),
        "computed class statistics"
    );
    report
}
