use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Number of equal-width buckets in a score histogram.
pub const DISTRIBUTION_BUCKETS: usize = 5;

/// Default window for `recent_performance`.
pub const RECENT_WINDOW: usize = 3;

/// Tolerance band around the reference used by `compare_to_reference`.
const COMPARISON_BAND: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProgressTrend {
    Improving,
    Declining,
    Stable,
    NoTrend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Comparison {
    Above,
    Below,
    At,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreDistribution {
    pub ranges: Vec<String>,
    pub frequencies: Vec<usize>,
}

fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted
}

fn max_of(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

fn min_of(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

/// Population standard deviation around a caller-supplied mean.
/// Zero for fewer than two values.
pub fn standard_deviation(values: &[f64], mean: f64) -> f64 {
    if values.len() <= 1 {
        return 0.0;
    }
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (sum_sq / values.len() as f64).sqrt()
}

pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sorted = sorted_copy(values);
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[(n / 2) - 1] + sorted[n / 2]) / 2.0
    }
}

/// Integer label matching `Number.prototype.toFixed(0)`: ties round away
/// from zero, negative values below one keep their sign (`-0`).
fn fixed0(x: f64) -> String {
    format!("{:.0}", x.round())
}

/// Histogram over `[min, max]` split into five equal-width buckets.
///
/// Every bucket is right-open except the last one, which also takes `max`.
/// When all scores are equal the width is zero, so only the last bucket
/// counts anything.
pub fn score_distribution(scores: &[f64]) -> ScoreDistribution {
    if scores.is_empty() {
        return ScoreDistribution::default();
    }

    let min = min_of(scores);
    let max = max_of(scores);
    let step = (max - min) / DISTRIBUTION_BUCKETS as f64;

    let mut ranges = Vec::with_capacity(DISTRIBUTION_BUCKETS);
    let mut frequencies = vec![0_usize; DISTRIBUTION_BUCKETS];
    for (i, freq) in frequencies.iter_mut().enumerate() {
        let last = i == DISTRIBUTION_BUCKETS - 1;
        let start = min + (i as f64) * step;
        let end = if last { max } else { min + ((i + 1) as f64) * step };
        ranges.push(format!("{}-{}", fixed0(start), fixed0(end)));

        *freq = scores
            .iter()
            .filter(|s| **s >= start && if last { **s <= end } else { **s < end })
            .count();
    }

    ScoreDistribution {
        ranges,
        frequencies,
    }
}

/// Share of `all_values` strictly below `value`, scaled to 0-100 over
/// `n - 1` comparisons. A group of one sits at the 50th percentile.
pub fn percentile(value: f64, all_values: &[f64]) -> f64 {
    if all_values.len() <= 1 {
        return 50.0;
    }
    let lower = all_values.iter().filter(|v| **v < value).count();
    (lower as f64) / ((all_values.len() - 1) as f64) * 100.0
}

/// 100 means perfectly tight scores; a coefficient of variation of 0.5 or
/// more bottoms out at 0.
pub fn consistency_score(standard_deviation: f64, mean: f64) -> f64 {
    if mean == 0.0 || standard_deviation == 0.0 {
        return 100.0;
    }
    let cv = standard_deviation / mean;
    (100.0 * (1.0 - cv * 2.0)).clamp(0.0, 100.0)
}

/// Least-squares slope of the scores against their 1-based position,
/// normalized by the best score and the sample size, clamped to ±100.
pub fn improvement_rate(scores: &[f64]) -> f64 {
    if scores.len() < 2 {
        return 0.0;
    }

    let n = scores.len() as f64;
    let mut sum_x = 0.0_f64;
    let mut sum_y = 0.0_f64;
    let mut sum_xy = 0.0_f64;
    let mut sum_xx = 0.0_f64;
    for (i, y) in scores.iter().enumerate() {
        let x = (i + 1) as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }

    let slope = (n * sum_xy - sum_x * sum_y) / (n * sum_xx - sum_x * sum_x);
    // A best score of 0 sends the ratio to ±inf, which the clamp saturates.
    let best = max_of(scores);
    let normalized = (slope / best) * 100.0 * n;
    if normalized.is_nan() {
        return 0.0;
    }
    normalized.clamp(-100.0, 100.0)
}

/// Direction of the last three scores (first vs last of the window).
pub fn progress_trend(scores: &[f64]) -> ProgressTrend {
    if scores.len() < 3 {
        return ProgressTrend::NoTrend;
    }
    let recent = &scores[scores.len() - 3..];
    match recent[2].partial_cmp(&recent[0]) {
        Some(Ordering::Greater) => ProgressTrend::Improving,
        Some(Ordering::Less) => ProgressTrend::Declining,
        _ => ProgressTrend::Stable,
    }
}

pub fn compare_to_reference(value: f64, reference: f64) -> Comparison {
    if value > reference * (1.0 + COMPARISON_BAND) {
        Comparison::Above
    } else if value < reference * (1.0 - COMPARISON_BAND) {
        Comparison::Below
    } else {
        Comparison::At
    }
}

/// Mean of the last `min(window, len)` scores.
pub fn recent_performance(scores: &[f64], window: usize) -> f64 {
    if scores.is_empty() || window == 0 {
        return 0.0;
    }
    let take = window.min(scores.len());
    let recent = &scores[scores.len() - take..];
    recent.iter().sum::<f64>() / take as f64
}

/// Bar colour for histogram bucket `index` of `total`, red (hue 0) through
/// green (hue 120).
pub fn score_bar_color(index: usize, total: usize) -> String {
    let hue = if total <= 1 {
        0.0
    } else {
        (index as f64) / ((total - 1) as f64) * 120.0
    };
    format!("hsl({}, 80%, 45%)", hue)
}
