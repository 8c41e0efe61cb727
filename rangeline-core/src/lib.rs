//! Lõi tính toán khoảng tham chiếu, độ lệch và xu hướng cho timeline xét nghiệm.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod axis;
pub mod bounds;
pub mod deviation;
pub mod elapsed;
pub mod trend;
pub mod window;

pub use axis::{
    format_number, format_tick, indicator_layout, reference_bands, value_axis_domain, AxisDomain,
    IndicatorLayout, ReferenceBand,
};
pub use bounds::{
    color_for_value, normalized_bounds, AdditionalBound, BoundsShape, NormalizedBounds,
    EXCLUSIVE_OFFSET,
};
pub use deviation::{cluster_deviation, normal_range_deviation};
pub use elapsed::{format_date, format_elapsed, format_elapsed_in, format_hour, ElapsedUnit};
pub use trend::{normalize_value, slope, trend, SlopeDirection, TrendClass};
pub use window::{
    drag, initial_window, locate_window, nearest_index, pointer_fraction, visible_window, zoom,
    AggregationScale, IndexWindow, PlotMargins, TimeWindow, ZoomGesture, ZoomedWindow,
};

/// Cấu hình sắp xếp timeline và tương tác biểu đồ.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimelineConfig {
    /// Thứ tự hiển thị các dòng timeline.
    pub sort_mode: SortMode,
    /// Màu điểm khi giá trị không thuộc khoảng tham chiếu nào.
    pub default_color: Option<String>,
    /// Số điểm hiển thị ban đầu với chuỗi dữ liệu dài.
    pub initial_window_points: usize,
    pub wheel_zoom_factor: f64,
    pub trackpad_zoom_factor: f64,
    /// Dưới ngưỡng `|deltaY|` này coi như thao tác trackpad.
    pub trackpad_delta_threshold: f64,
    pub drag_step: f64,
    pub scroll_drag_step: f64,
    pub plot_margins: PlotMargins,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            sort_mode: SortMode::Date,
            default_color: None,
            initial_window_points: 11,
            wheel_zoom_factor: 0.05,
            trackpad_zoom_factor: 0.02,
            trackpad_delta_threshold: 50.0,
            drag_step: 0.1,
            scroll_drag_step: 0.01,
            plot_margins: PlotMargins::default(),
        }
    }
}

/// Chế độ sắp xếp timeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    /// Mới nhất trước.
    #[default]
    Date,
    /// Lệch khỏi khoảng bình thường nhiều nhất trước.
    Deviation,
    /// Xu hướng có lợi nhất trước.
    Favorability,
    /// Xu hướng bất lợi nhất trước.
    Unfavorability,
}

impl SortMode {
    pub const ALL: [SortMode; 4] = [
        SortMode::Date,
        SortMode::Deviation,
        SortMode::Favorability,
        SortMode::Unfavorability,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Date => "date",
            SortMode::Deviation => "deviation",
            SortMode::Favorability => "favorability",
            SortMode::Unfavorability => "unfavorability",
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortMode {
    type Err = TimelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        SortMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == needle)
            .ok_or_else(|| TimelineError::InvalidInput(format!("chế độ sắp xếp `{s}`")))
    }
}

/// Khoảng tham chiếu lâm sàng, mọi cận đều có thể vắng mặt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ReferenceRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub excl_min: Option<f64>,
    pub excl_max: Option<f64>,
    /// Nhãn dạng chữ, ví dụ `"70-100"`.
    pub range: Option<String>,
    pub color: Option<String>,
    pub primary: Option<bool>,
}

impl ReferenceRange {
    /// Khoảng bao hàm `[min, max]`.
    pub fn inclusive(min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            min,
            max,
            ..Self::default()
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Giá trị có nằm trong khoảng không (chỉ xét các cận có mặt).
    pub fn contains(&self, value: f64) -> bool {
        if self.max.is_some_and(|max| value > max) {
            return false;
        }
        if self.min.is_some_and(|min| value < min) {
            return false;
        }
        if self.excl_max.is_some_and(|max| value >= max) {
            return false;
        }
        if self.excl_min.is_some_and(|min| value <= min) {
            return false;
        }
        true
    }

    /// Khoảng rỗng: không có cận, nhãn, màu hay cờ nào.
    pub fn is_empty(&self) -> bool {
        self.min.is_none()
            && self.max.is_none()
            && self.excl_min.is_none()
            && self.excl_max.is_none()
            && self.range.is_none()
            && self.color.is_none()
            && self.primary.is_none()
    }

    /// Cận dưới dùng để hiển thị.
    pub fn display_min(&self) -> Option<f64> {
        self.min
            .or_else(|| self.excl_min.map(|min| min - EXCLUSIVE_OFFSET))
    }

    /// Cận trên dùng để hiển thị.
    pub fn display_max(&self) -> Option<f64> {
        self.max
            .or_else(|| self.excl_max.map(|max| max - EXCLUSIVE_OFFSET))
    }
}

/// Loại sự kiện gốc.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum EventKind {
    #[default]
    Observation,
    Document,
    Medication,
}

/// Quan sát mới nhất của một tên sự kiện, do backend trả về.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct EventCluster {
    pub id: String,
    pub event: String,
    pub patient_id: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub codes: BTreeMap<String, Vec<String>>,
    pub reference_ranges: Vec<ReferenceRange>,
    pub unit: Option<String>,
    pub abnormal_flags: Option<String>,
    pub is_favorite: bool,
    pub is_line_disabled: bool,
    pub file: Option<String>,
    pub is_group: bool,
    pub date: Option<DateTime<Utc>>,
    pub value: Option<f64>,
    /// Xu hướng backend tính sẵn.
    pub trend: f64,
    pub slope: f64,
    pub count: u32,
    /// Epoch milli giây.
    pub ts: i64,
}

/// Cặp min/max của một điểm dữ liệu lớn đã gộp.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MinMaxValue {
    pub min: f64,
    pub max: f64,
}

/// Giá trị đơn hoặc khoảng min/max.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum EventValue {
    Single(f64),
    Span(MinMaxValue),
}

impl EventValue {
    pub fn scalar(&self) -> Option<f64> {
        match self {
            EventValue::Single(value) => Some(*value),
            EventValue::Span(_) => None,
        }
    }

    /// Thay khoảng min/max bằng trung điểm.
    pub fn averaged(self) -> Self {
        match self {
            EventValue::Span(span) => EventValue::Single((span.min + span.max) / 2.0),
            single => single,
        }
    }

    /// Giá trị nhỏ nhất và lớn nhất của điểm.
    pub fn extent(&self) -> (f64, f64) {
        match self {
            EventValue::Single(value) => (*value, *value),
            EventValue::Span(span) => (span.min, span.max),
        }
    }
}

/// Một điểm trong chuỗi sự kiện của bệnh nhân.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub patient_id: String,
    #[serde(rename = "type", default)]
    pub kind: EventKind,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub reference_ranges: Vec<ReferenceRange>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ts: i64,
    pub value: EventValue,
}

/// Nguồn dữ liệu cho các phép tính độ lệch/xu hướng.
pub trait Observed {
    fn value(&self) -> Option<f64>;
    fn recorded_at(&self) -> Option<DateTime<Utc>>;
    fn reference_ranges(&self) -> &[ReferenceRange];
}

impl Observed for EventCluster {
    fn value(&self) -> Option<f64> {
        self.value
    }

    fn recorded_at(&self) -> Option<DateTime<Utc>> {
        self.date
    }

    fn reference_ranges(&self) -> &[ReferenceRange] {
        &self.reference_ranges
    }
}

impl Observed for PatientEvent {
    fn value(&self) -> Option<f64> {
        self.value.scalar()
    }

    fn recorded_at(&self) -> Option<DateTime<Utc>> {
        self.date
    }

    fn reference_ranges(&self) -> &[ReferenceRange] {
        &self.reference_ranges
    }
}

/// Một dòng timeline đã chấm điểm.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineItem {
    pub key: String,
    pub latest: EventCluster,
    pub history_len: usize,
    pub deviation: Option<f64>,
    pub slope: f64,
    pub trend: f64,
    pub trend_class: TrendClass,
    pub slope_direction: SlopeDirection,
    /// Màu của chấm tham chiếu cho giá trị mới nhất.
    pub color: Option<String>,
}

impl TimelineItem {
    /// Chấm điểm một nhóm cluster cùng tên (cũ trước, mới sau).
    pub fn score(key: impl Into<String>, history: &[EventCluster], config: &TimelineConfig) -> Option<Self> {
        let latest = history.last()?;
        let slope = slope(history);
        let trend = trend(history);
        let color = match latest.value {
            Some(value) => {
                color_for_value(value, &latest.reference_ranges, config.default_color.as_deref())
            }
            None => config.default_color.clone(),
        };

        Some(Self {
            key: key.into(),
            latest: latest.clone(),
            history_len: history.len(),
            deviation: cluster_deviation(latest),
            slope,
            trend,
            trend_class: TrendClass::from_trend(trend),
            slope_direction: SlopeDirection::from_slope(slope),
            color,
        })
    }
}

/// Kết quả tổng hợp timeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineSummary {
    pub generated_at: DateTime<Utc>,
    pub sort_mode: SortMode,
    pub items: Vec<TimelineItem>,
}

impl TimelineSummary {
    /// Khởi tạo và sắp xếp theo `sort_mode`.
    pub fn new(items: Vec<TimelineItem>, sort_mode: SortMode) -> Self {
        let mut summary = Self {
            generated_at: Utc::now(),
            sort_mode,
            items,
        };
        summary.resort(sort_mode);
        summary
    }

    /// Sắp xếp lại (ổn định) theo chế độ mới.
    pub fn resort(&mut self, sort_mode: SortMode) {
        self.sort_mode = sort_mode;
        self.items.sort_by(|a, b| compare_items(a, b, sort_mode));
    }

    pub fn items(&self) -> &[TimelineItem] {
        &self.items
    }

    pub fn keys(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.key.as_str()).collect()
    }
}

fn compare_items(a: &TimelineItem, b: &TimelineItem, sort_mode: SortMode) -> Ordering {
    match sort_mode {
        SortMode::Date => b.latest.ts.cmp(&a.latest.ts),
        SortMode::Deviation => match (a.deviation, b.deviation) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        SortMode::Favorability => b.trend.total_cmp(&a.trend),
        SortMode::Unfavorability => a.trend.total_cmp(&b.trend),
    }
}

/// Lỗi chung khi đọc và chấm điểm dữ liệu.
#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    #[error("Dữ liệu đầu vào thiếu thông tin tối thiểu")]
    MissingData,
    #[error("Không đọc được dữ liệu: {0}")]
    Parse(String),
    #[error("Giá trị không hợp lệ: {0}")]
    InvalidInput(String),
}

/// Làm tròn nửa lên với `digits` chữ số thập phân.
pub fn round(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    ((value + f64::EPSILON) * factor + 0.5).floor() / factor
}

/// Kẹp giá trị vào các giới hạn có mặt.
pub fn clamp_to(value: f64, min: Option<f64>, max: Option<f64>) -> f64 {
    let mut result = value;
    if let Some(min) = min {
        result = result.max(min);
    }
    if let Some(max) = max {
        result = result.min(max);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn cluster(event: &str, day: i64, value: Option<f64>, ranges: Vec<ReferenceRange>) -> EventCluster {
        let date = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap() + Duration::days(day);
        EventCluster {
            id: format!("{event}-{day}"),
            event: event.to_string(),
            reference_ranges: ranges,
            date: Some(date),
            ts: date.timestamp_millis(),
            value,
            ..EventCluster::default()
        }
    }

    #[test]
    fn contains_respects_exclusive_bounds() {
        let range = ReferenceRange {
            excl_min: Some(3.5),
            excl_max: Some(5.0),
            ..ReferenceRange::default()
        };
        assert!(!range.contains(3.5));
        assert!(range.contains(3.6));
        assert!(!range.contains(5.0));
    }

    #[test]
    fn zero_bounds_are_honoured() {
        let range = ReferenceRange::inclusive(Some(0.0), Some(0.0));
        assert!(range.contains(0.0));
        assert!(!range.contains(0.5));
        assert!(!range.contains(-0.5));
    }

    #[test]
    fn round_matches_half_up() {
        assert_eq!(round(1.005, 2), 1.01);
        assert_eq!(round(2.45, 1), 2.5);
        assert_eq!(round(12.0, 1), 12.0);
    }

    #[test]
    fn clamp_ignores_missing_limits() {
        assert_eq!(clamp_to(5.0, None, None), 5.0);
        assert_eq!(clamp_to(5.0, Some(6.0), None), 6.0);
        assert_eq!(clamp_to(5.0, None, Some(4.0)), 4.0);
        assert_eq!(clamp_to(-1.0, Some(0.0), Some(4.0)), 0.0);
    }

    #[test]
    fn sort_mode_parses_case_insensitively() {
        assert_eq!("Deviation".parse::<SortMode>().unwrap(), SortMode::Deviation);
        assert!("latest".parse::<SortMode>().is_err());
    }

    #[test]
    fn summary_orders_by_mode() {
        let normal = vec![ReferenceRange::inclusive(Some(4.0), Some(10.0))];
        let config = TimelineConfig::default();

        let improving = [
            cluster("a", 0, Some(12.0), normal.clone()),
            cluster("a", 1, Some(11.0), normal.clone()),
            cluster("a", 2, Some(9.0), normal.clone()),
        ];
        let worsening = [
            cluster("b", 0, Some(5.0), normal.clone()),
            cluster("b", 1, Some(11.5), normal.clone()),
        ];
        let unscored = [cluster("c", 3, None, Vec::new())];

        let items = vec![
            TimelineItem::score("a", &improving, &config).unwrap(),
            TimelineItem::score("b", &worsening, &config).unwrap(),
            TimelineItem::score("c", &unscored, &config).unwrap(),
        ];

        let mut summary = TimelineSummary::new(items, SortMode::Date);
        assert_eq!(summary.keys(), vec!["c", "a", "b"]);

        summary.resort(SortMode::Deviation);
        assert_eq!(summary.keys(), vec!["b", "a", "c"]);

        summary.resort(SortMode::Favorability);
        assert_eq!(summary.keys(), vec!["a", "c", "b"]);

        summary.resort(SortMode::Unfavorability);
        assert_eq!(summary.keys(), vec!["b", "c", "a"]);
    }

    #[test]
    fn item_color_falls_back_to_default() {
        let config = TimelineConfig {
            default_color: Some("gray".to_string()),
            ..TimelineConfig::default()
        };
        let history = [cluster("x", 0, Some(50.0), vec![ReferenceRange::inclusive(Some(1.0), Some(2.0))])];
        let item = TimelineItem::score("x", &history, &config).unwrap();
        assert_eq!(item.color.as_deref(), Some("gray"));
    }
}
