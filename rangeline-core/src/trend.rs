//! Độ dốc và xu hướng của hai quan sát cuối trong chuỗi.

use serde::{Deserialize, Serialize};

use crate::bounds::normalized_bounds;
use crate::Observed;

/// Phân loại xu hướng để chọn biểu tượng và màu.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrendClass {
    Favorable,
    Unfavorable,
    Flat,
}

impl TrendClass {
    pub fn from_trend(trend: f64) -> Self {
        if trend > 0.0 {
            TrendClass::Favorable
        } else if trend < 0.0 {
            TrendClass::Unfavorable
        } else {
            TrendClass::Flat
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            TrendClass::Favorable => "Favorable Trend",
            TrendClass::Unfavorable => "Unfavorable Trend",
            TrendClass::Flat => "Flat Trend",
        }
    }
}

/// Hướng của độ dốc.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SlopeDirection {
    Rising,
    Falling,
    Flat,
}

impl SlopeDirection {
    pub fn from_slope(slope: f64) -> Self {
        if slope > 0.0 {
            SlopeDirection::Rising
        } else if slope < 0.0 {
            SlopeDirection::Falling
        } else {
            SlopeDirection::Flat
        }
    }
}

/// Đưa `value` về `[0, 1]` theo `[min, max]`; `None` khi khoảng suy biến.
pub fn normalize_value(value: f64, min: f64, max: f64) -> Option<f64> {
    let span = max - min;
    if span == 0.0 {
        None
    } else {
        Some((value - min) / span)
    }
}

/// Độ dốc giữa hai điểm cuối, trên trục giá trị và thời gian đã chuẩn hoá.
///
/// Trục giá trị lấy theo khoảng tham chiếu của điểm kế cuối (mở rộng để chứa
/// cả hai giá trị); trục thời gian đi từ điểm đầu chuỗi tới điểm cuối.
pub fn slope<T: Observed>(series: &[T]) -> f64 {
    let (Some(first), [.., a, b]) = (series.first(), series) else {
        return 0.0;
    };
    let Some(origin) = first.recorded_at() else {
        return 0.0;
    };
    let (Some(a_value), Some(b_value)) = (a.value(), b.value()) else {
        return 0.0;
    };
    let (Some(a_at), Some(b_at)) = (a.recorded_at(), b.recorded_at()) else {
        return 0.0;
    };

    let bounds = normalized_bounds(a.reference_ranges());
    // Cận trục bằng 0 nhường chỗ cho cận của dải bình thường.
    let (Some(floor), Some(ceiling)) = (
        bounds.lower.filter(|v| *v != 0.0).or(bounds.range_min),
        bounds.upper.filter(|v| *v != 0.0).or(bounds.range_max),
    ) else {
        return 0.0;
    };
    let floor = floor.min(a_value).min(b_value);
    let ceiling = ceiling.max(a_value).max(b_value);

    let (Some(a_norm), Some(b_norm)) = (
        normalize_value(a_value, floor, ceiling),
        normalize_value(b_value, floor, ceiling),
    ) else {
        return 0.0;
    };

    let start = origin.timestamp() as f64;
    let end = b_at.timestamp() as f64;
    let (Some(a_time), Some(b_time)) = (
        normalize_value(a_at.timestamp() as f64, start, end),
        normalize_value(end, start, end),
    ) else {
        return 0.0;
    };

    let elapsed = b_time - a_time;
    if elapsed == 0.0 {
        return 0.0;
    }
    let slope = (b_norm - a_norm) / elapsed;
    if slope.is_finite() {
        slope
    } else {
        0.0
    }
}

/// Xu hướng: dương khi hai điểm cuối đi về phía khoảng bình thường, âm khi đi xa.
///
/// Độ lớn bằng `|slope|`. Không có cận dưới thì giảm luôn có lợi; không có cận
/// trên thì tăng luôn có lợi.
pub fn trend<T: Observed>(series: &[T]) -> f64 {
    let (Some(first), [.., a, b]) = (series.first(), series) else {
        return 0.0;
    };
    let (Some(a_value), Some(b_value)) = (a.value(), b.value()) else {
        return 0.0;
    };

    let slope = slope(series);
    let magnitude = slope.abs();
    let bounds = normalized_bounds(first.reference_ranges());

    if bounds.lower.is_none() && slope < 0.0 {
        return magnitude;
    }
    if bounds.upper.is_none() && slope > 0.0 {
        return magnitude;
    }

    let (Some(range_min), Some(range_max)) = (bounds.range_min, bounds.range_max) else {
        return 0.0;
    };

    if slope < 0.0 && a_value > range_max && b_value >= range_min {
        return magnitude;
    }
    if slope > 0.0 && a_value < range_min && b_value <= range_max {
        return magnitude;
    }

    if magnitude == 0.0 {
        0.0
    } else {
        -magnitude
    }
}
