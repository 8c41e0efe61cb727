//! Chuẩn hoá khoảng tham chiếu về không gian hiển thị và chấm điểm.
//!
//! Khi có đủ hai cận, dải bình thường chiếm 60% trục và mỗi bên 20%.
//! Khi chỉ có cận trên, trục bắt đầu từ 0 và phần vượt ngưỡng chiếm 20%.
//! Khi chỉ có cận dưới, phần dưới ngưỡng chiếm 20% và dải bình thường
//! được kéo dài thành 80% còn lại.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::ReferenceRange;

/// Khoảng trừ đi để biểu diễn cận loại trừ trên trục hiển thị.
pub const EXCLUSIVE_OFFSET: f64 = 0.01;

/// Màu của khoảng tham chiếu chính.
pub const PRIMARY_COLOR: &str = "green";

const NORMAL_SHARE: f64 = 0.6;
const FLANK_SHARE: f64 = 0.2;
const WIDE_SHARE: f64 = 0.8;

/// Dải phụ (khoảng tham chiếu thứ hai trở đi).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdditionalBound {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub color: Option<String>,
}

/// Bốn mốc `[lower, range_min, range_max, upper]` cùng các dải phụ.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NormalizedBounds {
    pub lower: Option<f64>,
    pub range_min: Option<f64>,
    pub range_max: Option<f64>,
    pub upper: Option<f64>,
    pub additional: Vec<AdditionalBound>,
}

/// Dạng của khoảng đã chuẩn hoá.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BoundsShape {
    Bounded,
    UpperOnly,
    LowerOnly,
    Unbounded,
}

impl NormalizedBounds {
    pub fn as_array(&self) -> [Option<f64>; 4] {
        [self.lower, self.range_min, self.range_max, self.upper]
    }

    /// Các mốc có mặt, theo thứ tự.
    pub fn defined(&self) -> impl Iterator<Item = f64> {
        self.as_array().into_iter().flatten()
    }

    pub fn shape(&self) -> BoundsShape {
        match (self.lower, self.upper) {
            (Some(_), Some(_)) => BoundsShape::Bounded,
            (None, Some(_)) => BoundsShape::UpperOnly,
            (Some(_), None) => BoundsShape::LowerOnly,
            (None, None) => BoundsShape::Unbounded,
        }
    }

    /// Giá trị nằm trong dải bình thường `[range_min, range_max]`.
    pub fn normal_contains(&self, value: f64) -> bool {
        match (self.range_min, self.range_max) {
            (Some(min), Some(max)) => value >= min && value <= max,
            _ => false,
        }
    }
}

/// Tính các mốc hiển thị từ danh sách khoảng tham chiếu (khoảng đầu là khoảng chính).
pub fn normalized_bounds(ranges: &[ReferenceRange]) -> NormalizedBounds {
    let Some((primary, rest)) = ranges.split_first() else {
        return NormalizedBounds::default();
    };

    let mut range_min = primary.display_min();
    let mut range_max = primary.display_max();

    let mut additional: Vec<AdditionalBound> = rest
        .iter()
        .map(|range| AdditionalBound {
            min: range.display_min(),
            max: range.display_max(),
            color: range.color.clone(),
        })
        .collect();
    additional.sort_by(|a, b| match (a.min, b.min) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    let additional_min = additional.iter().filter_map(|b| b.min).reduce(f64::min);
    let additional_max = additional.iter().filter_map(|b| b.max).reduce(f64::max);

    let mut lower = None;
    let mut upper = None;

    match (range_min, range_max) {
        (Some(min), Some(max)) => {
            let context_min = additional_min.map_or(min, |extra| extra.min(min));
            let context_max = additional_max.map_or(max, |extra| extra.max(max));
            let flank = (context_max - context_min) * FLANK_SHARE / NORMAL_SHARE;
            lower = Some(context_min - flank);
            upper = Some(context_max + flank);
        }
        (None, Some(max)) => {
            range_min = Some(0.0);
            let context_max = additional_max.map_or(max, |extra| extra.max(max));
            upper = Some(context_max + context_max * FLANK_SHARE / WIDE_SHARE);
        }
        (Some(min), None) => {
            lower = Some(0.0);
            let context_min = additional_min.map_or(min, |extra| extra.min(min));
            range_max = Some(context_min + context_min * WIDE_SHARE / FLANK_SHARE);
        }
        (None, None) => {
            log::debug!("primary reference range has no usable bound");
        }
    }

    NormalizedBounds {
        lower,
        range_min,
        range_max,
        upper,
        additional,
    }
}

/// Màu chấm cho một giá trị: xanh trong khoảng chính, màu của dải phụ chứa nó,
/// nếu không thì `default`.
pub fn color_for_value(
    value: f64,
    ranges: &[ReferenceRange],
    default: Option<&str>,
) -> Option<String> {
    let fallback = || default.map(str::to_string);
    let Some((primary, rest)) = ranges.split_first() else {
        return fallback();
    };
    if primary.is_empty() {
        return fallback();
    }
    if primary.contains(value) {
        return Some(PRIMARY_COLOR.to_string());
    }
    match rest.iter().find(|range| range.contains(value)) {
        Some(range) => range.color.clone().or_else(fallback),
        None => fallback(),
    }
}
