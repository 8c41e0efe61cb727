//! Bridge WASM <-> JavaScript cho timeline và biểu đồ khoảng tham chiếu.

use rangeline_core::{
    indicator_layout, normal_range_deviation, AggregationScale, PlotMargins, ReferenceRange,
    SortMode, TimeWindow, TimelineConfig, TimelineError, ZoomGesture,
};
use serde::Deserialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

/// Cấu hình từ JS; trường vắng mặt giữ giá trị mặc định.
#[derive(Deserialize, Default)]
struct JsTimelineConfig {
    #[serde(default)]
    sort_mode: Option<SortMode>,
    #[serde(default)]
    default_color: Option<String>,
    #[serde(default)]
    initial_window_points: Option<usize>,
    #[serde(default)]
    wheel_zoom_factor: Option<f64>,
    #[serde(default)]
    trackpad_zoom_factor: Option<f64>,
    #[serde(default)]
    trackpad_delta_threshold: Option<f64>,
    #[serde(default)]
    drag_step: Option<f64>,
    #[serde(default)]
    scroll_drag_step: Option<f64>,
    #[serde(default)]
    plot_margins: Option<PlotMargins>,
}

impl From<JsTimelineConfig> for TimelineConfig {
    fn from(cfg: JsTimelineConfig) -> Self {
        let mut base = TimelineConfig::default();
        if let Some(mode) = cfg.sort_mode {
            base.sort_mode = mode;
        }
        if cfg.default_color.is_some() {
            base.default_color = cfg.default_color;
        }
        if let Some(points) = cfg.initial_window_points {
            base.initial_window_points = points;
        }
        if let Some(factor) = cfg.wheel_zoom_factor {
            base.wheel_zoom_factor = factor;
        }
        if let Some(factor) = cfg.trackpad_zoom_factor {
            base.trackpad_zoom_factor = factor;
        }
        if let Some(threshold) = cfg.trackpad_delta_threshold {
            base.trackpad_delta_threshold = threshold;
        }
        if let Some(step) = cfg.drag_step {
            base.drag_step = step;
        }
        if let Some(step) = cfg.scroll_drag_step {
            base.scroll_drag_step = step;
        }
        if let Some(margins) = cfg.plot_margins {
            base.plot_margins = margins;
        }
        base
    }
}

/// Một lần zoom trên biểu đồ chuỗi.
#[derive(Deserialize)]
struct JsZoomRequest {
    current: TimeWindow,
    extent: TimeWindow,
    gesture: ZoomGesture,
    pointer: f64,
    #[serde(default)]
    scale: Option<AggregationScale>,
}

#[wasm_bindgen]
pub fn summarize_clusters(payload: JsValue, config: Option<JsValue>) -> Result<JsValue, JsValue> {
    set_panic_hook();

    let payload = from_value::<serde_json::Value>(payload)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được JSON clusters: {err}")))?;
    let cfg = read_config(config)?;

    let summary = rangeline_events::summarize_clusters_value(&payload, &cfg)
        .map_err(|err| JsValue::from_str(&format_timeline_error(err)))?;

    to_value(&summary).map_err(|err| JsValue::from_str(&format!("Không serialize timeline: {err}")))
}

#[wasm_bindgen]
pub fn summarize_series(
    payload: JsValue,
    average_out: bool,
    config: Option<JsValue>,
) -> Result<JsValue, JsValue> {
    set_panic_hook();

    let payload = from_value::<serde_json::Value>(payload)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được JSON events: {err}")))?;
    let cfg = read_config(config)?;

    let events = rangeline_events::parse_events_value(&payload, average_out)
        .map_err(|err| JsValue::from_str(&format_timeline_error(err)))?;
    let summary = rangeline_events::summarize_series(&events, &cfg);

    to_value(&summary).map_err(|err| JsValue::from_str(&format!("Không serialize chuỗi: {err}")))
}

#[wasm_bindgen]
pub fn normalized_bounds(ranges: JsValue) -> Result<JsValue, JsValue> {
    let ranges = read_ranges(ranges)?;
    to_value(&rangeline_core::normalized_bounds(&ranges))
        .map_err(|err| JsValue::from_str(&format!("Không serialize bounds: {err}")))
}

/// Độ lệch khỏi khoảng bình thường; `undefined` khi không tính được.
#[wasm_bindgen]
pub fn deviation(value: Option<f64>, ranges: JsValue) -> Result<Option<f64>, JsValue> {
    let ranges = read_ranges(ranges)?;
    Ok(normal_range_deviation(value, &ranges))
}

#[wasm_bindgen]
pub fn indicator(value: Option<f64>, ranges: JsValue) -> Result<JsValue, JsValue> {
    let ranges = read_ranges(ranges)?;
    to_value(&indicator_layout(value, &ranges))
        .map_err(|err| JsValue::from_str(&format!("Không serialize chỉ báo: {err}")))
}

/// Cửa sổ mới sau thao tác zoom, hoặc `null` khi thao tác bị bỏ qua.
#[wasm_bindgen]
pub fn zoom_window(request: JsValue, config: Option<JsValue>) -> Result<JsValue, JsValue> {
    let request: JsZoomRequest = from_value(request)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được yêu cầu zoom: {err}")))?;
    let cfg = read_config(config)?;

    let window = rangeline_core::zoom(
        request.current,
        request.extent,
        request.gesture,
        request.pointer,
        request.scale.map(|scale| scale.min_distance_ms()),
        &cfg,
    );

    to_value(&window).map_err(|err| JsValue::from_str(&format!("Không serialize cửa sổ: {err}")))
}

fn read_config(config: Option<JsValue>) -> Result<TimelineConfig, JsValue> {
    match config {
        Some(js_cfg) if !js_cfg.is_undefined() && !js_cfg.is_null() => {
            let cfg: JsTimelineConfig = from_value(js_cfg)
                .map_err(|err| JsValue::from_str(&format!("Không đọc được config: {err}")))?;
            Ok(TimelineConfig::from(cfg))
        }
        _ => Ok(TimelineConfig::default()),
    }
}

fn read_ranges(ranges: JsValue) -> Result<Vec<ReferenceRange>, JsValue> {
    from_value(ranges)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được khoảng tham chiếu: {err}")))
}

fn set_panic_hook() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

fn format_timeline_error(err: TimelineError) -> String {
    format!("Timeline error: {err}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let cfg: JsTimelineConfig =
            serde_json::from_value(serde_json::json!({"sort_mode": "favorability"})).unwrap();
        let cfg = TimelineConfig::from(cfg);

        assert_eq!(cfg.sort_mode, SortMode::Favorability);
        assert_eq!(cfg.initial_window_points, 11);
        assert_eq!(cfg.default_color, None);
    }

    #[test]
    fn interaction_settings_can_be_overridden() {
        let cfg: JsTimelineConfig = serde_json::from_value(serde_json::json!({
            "trackpad_delta_threshold": 30.0,
            "drag_step": 0.2,
            "scroll_drag_step": 0.05,
            "plot_margins": {"left": 40.0, "right": 10.0}
        }))
        .unwrap();
        let cfg = TimelineConfig::from(cfg);

        assert_eq!(cfg.trackpad_delta_threshold, 30.0);
        assert_eq!(cfg.drag_step, 0.2);
        assert_eq!(cfg.scroll_drag_step, 0.05);
        assert_eq!(
            cfg.plot_margins,
            PlotMargins {
                left: 40.0,
                right: 10.0
            }
        );
        assert_eq!(cfg.wheel_zoom_factor, TimelineConfig::default().wheel_zoom_factor);
    }

    #[test]
    fn empty_config_is_default() {
        assert_eq!(
            TimelineConfig::from(JsTimelineConfig::default()),
            TimelineConfig::default()
        );
    }

    #[test]
    fn timeline_errors_are_prefixed() {
        assert!(format_timeline_error(TimelineError::MissingData).starts_with("Timeline error: "));
    }
}
