//! Cửa sổ thời gian cho biểu đồ có thể phóng to và kéo.
//!
//! Mọi mốc thời gian là epoch milli giây, chuỗi đã sắp xếp tăng dần.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{TimelineConfig, TimelineError};

/// Khoảng `[start_ms, end_ms]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeWindow {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl TimeWindow {
    pub fn new(start_ms: i64, end_ms: i64) -> Self {
        Self { start_ms, end_ms }
    }

    pub fn span_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }

    pub fn contains(&self, ts: i64) -> bool {
        ts >= self.start_ms && ts <= self.end_ms
    }
}

/// Đoạn chỉ số đang hiển thị (`end_index` không bao gồm) và khoảng thời gian tương ứng.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ZoomedWindow {
    pub start_index: usize,
    pub end_index: usize,
    pub start_ms: i64,
    pub end_ms: i64,
}

impl ZoomedWindow {
    pub fn len(&self) -> usize {
        self.end_index - self.start_index
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cặp chỉ số đầu/cuối (bao gồm cả hai).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexWindow {
    pub start: usize,
    pub end: usize,
}

/// Lề vùng vẽ (pixel).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PlotMargins {
    pub left: f64,
    pub right: f64,
}

impl Default for PlotMargins {
    fn default() -> Self {
        Self {
            left: 60.0,
            right: 20.0,
        }
    }
}

/// Thao tác phóng to/thu nhỏ.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ZoomGesture {
    /// Con lăn chuột hoặc trackpad; `delta_y < 0` là phóng to.
    Wheel { delta_y: f64 },
    /// Hai ngón tay; chưa có khoảng cách trước thì chưa xác định hướng.
    Pinch {
        previous_distance: Option<f64>,
        current_distance: f64,
    },
}

/// Mức gộp dữ liệu lớn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AggregationScale {
    TenMinutes,
    Hour,
    Day,
    Week,
}

impl AggregationScale {
    pub const ALL: [AggregationScale; 4] = [
        AggregationScale::TenMinutes,
        AggregationScale::Hour,
        AggregationScale::Day,
        AggregationScale::Week,
    ];

    /// Độ dài một nhóm, tính bằng phút.
    pub fn minutes(&self) -> u32 {
        match self {
            AggregationScale::TenMinutes => 10,
            AggregationScale::Hour => 60,
            AggregationScale::Day => 1440,
            AggregationScale::Week => 10080,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AggregationScale::TenMinutes => "m",
            AggregationScale::Hour => "h",
            AggregationScale::Day => "d",
            AggregationScale::Week => "w",
        }
    }

    /// Khoảng phóng to nhỏ nhất cho phép.
    pub fn min_distance_ms(&self) -> i64 {
        i64::from(self.minutes()) * 60 * 1000
    }

    /// Chỉ mức mịn nhất lấy trung điểm thay cho cặp min/max.
    pub fn averages_spans(&self) -> bool {
        matches!(self, AggregationScale::TenMinutes)
    }

    pub fn from_minutes(minutes: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|scale| scale.minutes() == minutes)
    }
}

impl FromStr for AggregationScale {
    type Err = TimelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|scale| scale.label() == trimmed)
            .or_else(|| trimmed.parse().ok().and_then(Self::from_minutes))
            .ok_or_else(|| TimelineError::InvalidInput(format!("mức gộp `{s}`")))
    }
}

/// Các điểm nằm trong cửa sổ; nếu ít hơn hai điểm thì lấy hai điểm ở đầu gần cửa sổ hơn.
pub fn visible_window(timestamps: &[i64], window: Option<TimeWindow>) -> Option<ZoomedWindow> {
    let (&first, &last) = (timestamps.first()?, timestamps.last()?);
    let len = timestamps.len();

    let Some(window) = window else {
        return Some(ZoomedWindow {
            start_index: 0,
            end_index: len,
            start_ms: first,
            end_ms: last,
        });
    };

    let start = timestamps.iter().position(|ts| window.contains(*ts));
    let end = timestamps.iter().rposition(|ts| window.contains(*ts));
    if let (Some(start), Some(end)) = (start, end) {
        if end > start {
            return Some(ZoomedWindow {
                start_index: start,
                end_index: end + 1,
                start_ms: window.start_ms,
                end_ms: window.end_ms,
            });
        }
    }

    let (start_index, end_index) = if len < 2 {
        (0, len)
    } else if (window.end_ms - last).abs() < (window.start_ms - first).abs() {
        (len - 2, len)
    } else {
        (0, 2)
    };

    Some(ZoomedWindow {
        start_index,
        end_index,
        start_ms: timestamps[start_index],
        end_ms: timestamps[end_index - 1],
    })
}

/// Cửa sổ ban đầu: `points` điểm cuối khi chuỗi dài hơn.
pub fn initial_window(timestamps: &[i64], points: usize) -> Option<TimeWindow> {
    if points == 0 || timestamps.len() <= points {
        return None;
    }
    let start = timestamps.get(timestamps.len() - points)?;
    let end = timestamps.last()?;
    Some(TimeWindow::new(*start, *end))
}

/// Phóng to/thu nhỏ quanh vị trí con trỏ (`pointer` trong `[0, 1]` của vùng vẽ).
///
/// Trả về `None` khi thao tác bị bỏ qua.
pub fn zoom(
    current: TimeWindow,
    extent: TimeWindow,
    gesture: ZoomGesture,
    pointer: f64,
    min_distance_ms: Option<i64>,
    config: &TimelineConfig,
) -> Option<TimeWindow> {
    let (factor, direction) = match gesture {
        ZoomGesture::Wheel { delta_y } => {
            let factor = if delta_y.abs() < config.trackpad_delta_threshold {
                config.trackpad_zoom_factor
            } else {
                config.wheel_zoom_factor
            };
            (factor, if delta_y < 0.0 { 1.0 } else { -1.0 })
        }
        ZoomGesture::Pinch {
            previous_distance,
            current_distance,
        } => {
            let direction = match previous_distance {
                Some(previous) if current_distance > previous => 1.0,
                Some(_) => -1.0,
                None => return None,
            };
            (config.wheel_zoom_factor, direction)
        }
    };

    let amount = current.span_ms() as f64 * factor * direction;
    let mut start = (current.start_ms as f64 + amount * pointer).round() as i64;
    let mut end = (current.end_ms as f64 - amount * (1.0 - pointer)).round() as i64;
    start = start.max(extent.start_ms);
    end = end.min(extent.end_ms);
    if start > end {
        std::mem::swap(&mut start, &mut end);
    }

    let span = end - start;
    if span == 0 {
        return None;
    }
    if min_distance_ms.is_some_and(|min| span <= min) && amount > 0.0 {
        log::trace!("zoom rejected: span {span}ms under minimum distance");
        return None;
    }

    Some(TimeWindow::new(start, end))
}

/// Vị trí con trỏ trong vùng vẽ, `None` khi nằm ngoài lề.
pub fn pointer_fraction(client_x: f64, left: f64, right: f64, margins: PlotMargins) -> Option<f64> {
    let offset = client_x - (left + margins.left);
    if offset < 0.0 || client_x > right - margins.right {
        return None;
    }
    let width = (right - left) - (margins.left + margins.right);
    if width <= 0.0 {
        return None;
    }
    Some(offset / width)
}

/// Kéo cửa sổ theo chỉ số. `inverted` là kéo trên thanh cuộn (ngược chiều, bước nhỏ hơn).
pub fn drag(
    indices: IndexWindow,
    len: usize,
    start_fraction: f64,
    current_fraction: f64,
    inverted: bool,
    config: &TimelineConfig,
) -> Option<IndexWindow> {
    let last = len.checked_sub(1)?;
    let delta = start_fraction - current_fraction;
    if delta == 0.0 {
        return None;
    }
    let direction = if inverted { -delta.signum() } else { delta.signum() };

    if (direction > 0.0 && indices.end == last) || (direction < 0.0 && indices.start == 0) {
        return None;
    }

    let step = if inverted {
        config.scroll_drag_step
    } else {
        config.drag_step
    };
    let steps = delta.abs() / step;
    if steps < 1.0 {
        return None;
    }

    let start = (indices.start as f64 + steps * direction).round();
    let end = (indices.end as f64 + steps * direction).round();
    if start < 0.0 || end > last as f64 {
        return None;
    }

    Some(IndexWindow {
        start: start as usize,
        end: end as usize,
    })
}

/// Chỉ số của mốc gần `target` nhất.
pub fn nearest_index(timestamps: &[i64], target: i64) -> Option<usize> {
    timestamps
        .iter()
        .enumerate()
        .min_by_key(|(_, ts)| ts.abs_diff(target))
        .map(|(index, _)| index)
}

/// Chuyển cửa sổ thời gian về cặp chỉ số gần nhất.
pub fn locate_window(timestamps: &[i64], window: TimeWindow) -> Option<IndexWindow> {
    Some(IndexWindow {
        start: nearest_index(timestamps, window.start_ms)?,
        end: nearest_index(timestamps, window.end_ms)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERIES: [i64; 5] = [0, 10, 20, 30, 40];

    #[test]
    fn window_keeps_points_inside() {
        let zoomed = visible_window(&SERIES, Some(TimeWindow::new(5, 25))).unwrap();
        assert_eq!((zoomed.start_index, zoomed.end_index), (1, 3));
        assert_eq!((zoomed.start_ms, zoomed.end_ms), (5, 25));
        assert_eq!(zoomed.len(), 2);
    }

    #[test]
    fn sparse_window_falls_back_to_closest_pair() {
        let zoomed = visible_window(&SERIES, Some(TimeWindow::new(12, 18))).unwrap();
        assert_eq!((zoomed.start_index, zoomed.end_index), (0, 2));
        assert_eq!((zoomed.start_ms, zoomed.end_ms), (0, 10));

        let zoomed = visible_window(&SERIES, Some(TimeWindow::new(35, 39))).unwrap();
        assert_eq!((zoomed.start_index, zoomed.end_index), (3, 5));
        assert_eq!((zoomed.start_ms, zoomed.end_ms), (30, 40));
    }

    #[test]
    fn no_window_shows_everything() {
        let zoomed = visible_window(&SERIES, None).unwrap();
        assert_eq!((zoomed.start_index, zoomed.end_index), (0, 5));
        assert_eq!(visible_window(&[], None), None);
    }

    #[test]
    fn initial_window_takes_tail() {
        let series: Vec<i64> = (0..20).map(|i| i * 100).collect();
        assert_eq!(initial_window(&series, 11), Some(TimeWindow::new(900, 1900)));
        assert_eq!(initial_window(&SERIES, 11), None);
    }

    #[test]
    fn wheel_zoom_splits_around_pointer() {
        let config = TimelineConfig::default();
        let full = TimeWindow::new(0, 1000);

        let zoomed = zoom(full, full, ZoomGesture::Wheel { delta_y: -100.0 }, 0.5, None, &config);
        assert_eq!(zoomed, Some(TimeWindow::new(25, 975)));

        let trackpad = zoom(full, full, ZoomGesture::Wheel { delta_y: -10.0 }, 0.5, None, &config);
        assert_eq!(trackpad, Some(TimeWindow::new(10, 990)));

        let out = zoom(full, full, ZoomGesture::Wheel { delta_y: 100.0 }, 0.5, None, &config);
        assert_eq!(out, Some(full));
    }

    #[test]
    fn zoom_respects_min_distance() {
        let config = TimelineConfig::default();
        let extent = TimeWindow::new(0, 1000);
        let narrow = TimeWindow::new(0, 100);
        let gesture = ZoomGesture::Wheel { delta_y: -100.0 };
        assert_eq!(zoom(narrow, extent, gesture, 0.5, Some(200), &config), None);
        assert!(zoom(narrow, extent, gesture, 0.5, None, &config).is_some());
    }

    #[test]
    fn pinch_needs_previous_distance() {
        let config = TimelineConfig::default();
        let full = TimeWindow::new(0, 1000);
        let first = ZoomGesture::Pinch {
            previous_distance: None,
            current_distance: 100.0,
        };
        assert_eq!(zoom(full, full, first, 0.5, None, &config), None);

        let spread = ZoomGesture::Pinch {
            previous_distance: Some(100.0),
            current_distance: 120.0,
        };
        assert_eq!(zoom(full, full, spread, 0.5, None, &config), Some(TimeWindow::new(25, 975)));
    }

    #[test]
    fn pointer_fraction_is_relative_to_plot_area() {
        let margins = PlotMargins::default();
        assert_eq!(pointer_fraction(50.0, 0.0, 1080.0, margins), None);
        assert_eq!(pointer_fraction(1070.0, 0.0, 1080.0, margins), None);
        assert_eq!(pointer_fraction(560.0, 0.0, 1080.0, margins), Some(0.5));
    }

    #[test]
    fn drag_moves_by_whole_steps() {
        let config = TimelineConfig::default();
        let window = IndexWindow { start: 10, end: 20 };

        let moved = drag(window, 100, 0.5, 0.3, false, &config);
        assert_eq!(moved, Some(IndexWindow { start: 12, end: 22 }));

        let scrolled = drag(window, 100, 0.5, 0.45, true, &config);
        assert_eq!(scrolled, Some(IndexWindow { start: 5, end: 15 }));

        assert_eq!(drag(window, 100, 0.5, 0.46, false, &config), None);
    }

    #[test]
    fn drag_stops_at_edges() {
        let config = TimelineConfig::default();
        let at_end = IndexWindow { start: 89, end: 99 };
        assert_eq!(drag(at_end, 100, 0.5, 0.3, false, &config), None);

        let near_start = IndexWindow { start: 1, end: 11 };
        assert_eq!(drag(near_start, 100, 0.3, 0.6, false, &config), None);
    }

    #[test]
    fn locate_window_picks_nearest_points() {
        assert_eq!(nearest_index(&SERIES, 27), Some(3));
        assert_eq!(
            locate_window(&SERIES, TimeWindow::new(4, 33)),
            Some(IndexWindow { start: 0, end: 3 })
        );
    }

    #[test]
    fn aggregation_scales() {
        assert_eq!("h".parse::<AggregationScale>().unwrap(), AggregationScale::Hour);
        assert_eq!("1440".parse::<AggregationScale>().unwrap(), AggregationScale::Day);
        assert!("5".parse::<AggregationScale>().is_err());
        assert_eq!(AggregationScale::TenMinutes.min_distance_ms(), 600_000);
        assert!(AggregationScale::TenMinutes.averages_spans());
        assert!(!AggregationScale::Week.averages_spans());
    }
}
