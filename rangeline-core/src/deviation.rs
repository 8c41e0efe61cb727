//! Điểm độ lệch so với khoảng bình thường.
//!
//! Với khoảng hai cận, điểm nằm trong `[0, 50]`: 0 là giữa dải bình thường,
//! 50 là mép trục hiển thị.

use crate::bounds::normalized_bounds;
use crate::{clamp_to, Observed, ReferenceRange};

/// Độ lệch của `value` so với khoảng tham chiếu; `None` khi không có giá trị.
pub fn normal_range_deviation(value: Option<f64>, ranges: &[ReferenceRange]) -> Option<f64> {
    let value = value?;
    let bounds = normalized_bounds(ranges);
    let clamped = clamp_to(value, bounds.lower, bounds.upper);

    let score = match (bounds.lower, bounds.range_min, bounds.range_max, bounds.upper) {
        (Some(lower), _, _, Some(upper)) => {
            let Some(percent) = percent_within(clamped, lower, upper) else {
                return Some(0.0);
            };
            (50.0 - percent).abs()
        }
        (None, Some(range_min), Some(range_max), Some(upper)) => {
            let Some(percent) = percent_within(clamped, range_min, upper) else {
                return Some(0.0);
            };
            if clamped >= range_min && clamped <= range_max {
                (50.0 - (percent * 0.75 + 20.0)).abs()
            } else {
                percent - 50.0
            }
        }
        (Some(lower), Some(range_min), Some(range_max), None) => {
            let Some(percent) = percent_within(clamped, lower, range_max) else {
                return Some(0.0);
            };
            if clamped >= range_min && clamped <= range_max {
                (50.0 - ((percent - 20.0) * 0.75 + 20.0)).abs()
            } else {
                30.0 + (20.0 - percent)
            }
        }
        _ => clamped,
    };

    Some(score)
}

/// Độ lệch của một quan sát.
pub fn cluster_deviation(observation: &impl Observed) -> Option<f64> {
    normal_range_deviation(observation.value(), observation.reference_ranges())
}

fn percent_within(value: f64, from: f64, to: f64) -> Option<f64> {
    let span = to - from;
    if span == 0.0 {
        None
    } else {
        Some((value - from) / span * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(actual: Option<f64>, expected: f64) -> bool {
        actual.is_some_and(|value| (value - expected).abs() < 1e-9)
    }

    #[test]
    fn missing_value_has_no_score() {
        let ranges = [ReferenceRange::inclusive(Some(4.0), Some(10.0))];
        assert_eq!(normal_range_deviation(None, &ranges), None);
    }

    #[test]
    fn two_sided_scores_distance_from_centre() {
        let ranges = [ReferenceRange::inclusive(Some(4.0), Some(10.0))];
        assert!(close(normal_range_deviation(Some(7.0), &ranges), 0.0));
        assert!(close(normal_range_deviation(Some(4.0), &ranges), 30.0));
        assert!(close(normal_range_deviation(Some(12.0), &ranges), 50.0));
        // clamped to the display edge
        assert!(close(normal_range_deviation(Some(40.0), &ranges), 50.0));
        assert!(close(normal_range_deviation(Some(-3.0), &ranges), 50.0));
    }

    #[test]
    fn upper_only_scores() {
        let ranges = [ReferenceRange::inclusive(None, Some(200.0))];
        assert!(close(normal_range_deviation(Some(100.0), &ranges), 0.0));
        assert!(close(normal_range_deviation(Some(0.0), &ranges), 30.0));
        assert!(close(normal_range_deviation(Some(200.0), &ranges), 30.0));
        assert!(close(normal_range_deviation(Some(225.0), &ranges), 40.0));
        assert!(close(normal_range_deviation(Some(900.0), &ranges), 50.0));
    }

    #[test]
    fn negative_reading_with_lower_only_range_is_capped() {
        let ranges = [ReferenceRange::inclusive(Some(60.0), None)];
        assert!(close(normal_range_deviation(Some(-10.0), &ranges), 50.0));
        assert!(close(normal_range_deviation(Some(0.0), &ranges), 50.0));
    }

    #[test]
    fn lower_only_scores() {
        let ranges = [ReferenceRange::inclusive(Some(60.0), None)];
        assert!(close(normal_range_deviation(Some(180.0), &ranges), 0.0));
        assert!(close(normal_range_deviation(Some(60.0), &ranges), 30.0));
        assert!(close(normal_range_deviation(Some(300.0), &ranges), 30.0));
        assert!(close(normal_range_deviation(Some(30.0), &ranges), 40.0));
        assert!(close(normal_range_deviation(Some(0.0), &ranges), 50.0));
    }

    #[test]
    fn unbounded_returns_value() {
        assert!(close(normal_range_deviation(Some(42.0), &[]), 42.0));
    }

    #[test]
    fn degenerate_range_scores_zero() {
        let ranges = [ReferenceRange::inclusive(Some(5.0), Some(5.0))];
        assert!(close(normal_range_deviation(Some(9.0), &ranges), 0.0));
    }
}
