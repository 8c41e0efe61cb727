//! Miền trục, dải tham chiếu và vạch chia cho biểu đồ.

use serde::{Deserialize, Serialize};

use crate::bounds::{normalized_bounds, PRIMARY_COLOR};
use crate::{clamp_to, round, ReferenceRange};

/// Màu hai bên dải bình thường trên thanh chỉ báo.
pub const OUT_OF_RANGE_COLOR: &str = "red";

/// Miền trục giá trị.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AxisDomain {
    pub min: f64,
    pub max: f64,
}

/// Một vùng màu trên trục; cận vắng mặt nghĩa là kéo tới mép biểu đồ.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReferenceBand {
    pub low: Option<f64>,
    pub high: Option<f64>,
    pub color: String,
}

/// Bố cục thanh chỉ báo một giá trị.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndicatorLayout {
    /// Vị trí của giá trị sau khi kẹp vào trục.
    pub position: f64,
    pub ticks: Vec<f64>,
    pub segments: Vec<ReferenceBand>,
}

/// Miền trục Y: bao cả các mốc tham chiếu (làm tròn 1 chữ số) lẫn dữ liệu.
pub fn value_axis_domain<I>(ranges: &[ReferenceRange], values: I) -> Option<AxisDomain>
where
    I: IntoIterator<Item = f64>,
{
    let bounds = normalized_bounds(ranges);
    let graph_min = bounds.defined().reduce(f64::min).map(|v| round(v, 1));
    let graph_max = bounds.defined().reduce(f64::max).map(|v| round(v, 1));

    let mut data_min: Option<f64> = None;
    let mut data_max: Option<f64> = None;
    for value in values {
        data_min = Some(data_min.map_or(value, |min| min.min(value)));
        data_max = Some(data_max.map_or(value, |max| max.max(value)));
    }

    Some(AxisDomain {
        min: merge(graph_min, data_min, f64::min)?,
        max: merge(graph_max, data_max, f64::max)?,
    })
}

fn merge(a: Option<f64>, b: Option<f64>, pick: fn(f64, f64) -> f64) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(pick(a, b)),
        (a, b) => a.or(b),
    }
}

/// Một vùng màu cho mỗi khoảng tham chiếu, dùng trên biểu đồ chuỗi.
pub fn reference_bands(ranges: &[ReferenceRange]) -> Vec<ReferenceBand> {
    ranges
        .iter()
        .map(|range| ReferenceBand {
            low: range.display_min(),
            high: range.display_max(),
            color: range
                .color
                .clone()
                .unwrap_or_else(|| PRIMARY_COLOR.to_string()),
        })
        .collect()
}

pub fn indicator_layout(value: Option<f64>, ranges: &[ReferenceRange]) -> Option<IndicatorLayout> {
    let value = value?;
    let bounds = normalized_bounds(ranges);
    let position = clamp_to(value, bounds.lower, bounds.upper);

    let mut ticks: Vec<f64> = Vec::new();
    let candidates = bounds
        .as_array()
        .into_iter()
        .chain(bounds.additional.iter().flat_map(|b| [b.min, b.max]))
        .flatten();
    for tick in candidates {
        if !ticks.contains(&tick) {
            ticks.push(tick);
        }
    }

    let mut segments = Vec::new();
    if let (Some(lower), Some(range_min)) = (bounds.lower, bounds.range_min) {
        segments.push(segment(lower, range_min, OUT_OF_RANGE_COLOR));
    }
    if let (Some(range_min), Some(range_max)) = (bounds.range_min, bounds.range_max) {
        segments.push(segment(range_min, range_max, PRIMARY_COLOR));
    }
    if let (Some(range_max), Some(upper)) = (bounds.range_max, bounds.upper) {
        segments.push(segment(range_max, upper, OUT_OF_RANGE_COLOR));
    }
    segments.extend(bounds.additional.iter().map(|extra| ReferenceBand {
        low: extra.min,
        high: extra.max,
        color: extra
            .color
            .clone()
            .unwrap_or_else(|| OUT_OF_RANGE_COLOR.to_string()),
    }));

    Some(IndicatorLayout {
        position,
        ticks,
        segments,
    })
}

fn segment(low: f64, high: f64, color: &str) -> ReferenceBand {
    ReferenceBand {
        low: Some(low),
        high: Some(high),
        color: color.to_string(),
    }
}

/// Nhãn vạch chia: 1 chữ số thập phân, thêm `+` ở vạch lớn nhất.
pub fn format_tick(tick: f64, ticks: &[f64]) -> String {
    let is_last = ticks
        .iter()
        .copied()
        .reduce(f64::max)
        .is_some_and(|max| tick >= max);
    let suffix = if is_last { "+" } else { "" };
    format!("{}{suffix}", format_number(tick, 1))
}

/// Số làm tròn, không kèm số 0 thừa.
pub fn format_number(value: f64, digits: i32) -> String {
    // + 0.0 normalizes -0.0
    format!("{}", round(value, digits) + 0.0)
}
