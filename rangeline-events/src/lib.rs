//! Backend JSON payloads to scored `TimelineSummary` rows and series summaries.
//!
//! Parsing is tolerant: fields may be missing, numbers may arrive as strings,
//! and date formats vary. Entries that cannot be identified are skipped and
//! logged.

use std::collections::{hash_map::Entry, BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rangeline_core::{
    initial_window, reference_bands, slope, trend, value_axis_domain, visible_window, AxisDomain,
    EventCluster, EventKind, EventValue, MinMaxValue, PatientEvent, ReferenceBand, ReferenceRange,
    SlopeDirection, TimeWindow, TimelineConfig, TimelineError, TimelineItem, TimelineSummary,
    TrendClass, ZoomedWindow,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Summarize a clusters payload given as a JSON string.
pub fn summarize_clusters_str(
    payload: &str,
    config: &TimelineConfig,
) -> Result<TimelineSummary, TimelineError> {
    let value: Value =
        serde_json::from_str(payload).map_err(|err| TimelineError::Parse(err.to_string()))?;
    summarize_clusters_value(&value, config)
}

/// Summarize a clusters payload: `{"data": {"clusters": [...]}}` or a bare array.
pub fn summarize_clusters_value(
    payload: &Value,
    config: &TimelineConfig,
) -> Result<TimelineSummary, TimelineError> {
    let entries = payload_entries(payload, "clusters")?;

    let mut groups = ClusterGroups::default();
    for (index, entry) in entries.iter().enumerate() {
        match parse_cluster(entry) {
            Some(cluster) => groups.push(cluster),
            None => log::debug!("skipping cluster #{index}: no event name"),
        }
    }

    Ok(groups.finalize(config))
}

/// Parse an events payload (`{"data": {"events": [...]}}` or a bare array) into a
/// series sorted by timestamp. With `average_out`, min/max spans become midpoints.
pub fn parse_events_str(
    payload: &str,
    average_out: bool,
) -> Result<Vec<PatientEvent>, TimelineError> {
    let value: Value =
        serde_json::from_str(payload).map_err(|err| TimelineError::Parse(err.to_string()))?;
    parse_events_value(&value, average_out)
}

pub fn parse_events_value(
    payload: &Value,
    average_out: bool,
) -> Result<Vec<PatientEvent>, TimelineError> {
    let entries = payload_entries(payload, "events")?;

    let mut events: Vec<PatientEvent> = entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let event = parse_event(entry);
            if event.is_none() {
                log::debug!("skipping event #{index}: no usable value");
            }
            event
        })
        .map(|mut event| {
            if average_out {
                event.value = event.value.averaged();
            }
            event
        })
        .collect();
    events.sort_by_key(|event| event.ts);

    Ok(events)
}

/// Chart-ready summary of one event series.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeriesSummary {
    pub event: Option<String>,
    pub unit: Option<String>,
    pub points: usize,
    pub axis: Option<AxisDomain>,
    pub bands: Vec<ReferenceBand>,
    pub initial_window: Option<TimeWindow>,
    pub visible: Option<ZoomedWindow>,
    pub slope: f64,
    pub trend: f64,
    pub trend_class: TrendClass,
    pub slope_direction: SlopeDirection,
}

/// Axis, bands, initial window and trend for a series sorted by timestamp.
/// Reference ranges are taken from the first point.
pub fn summarize_series(events: &[PatientEvent], config: &TimelineConfig) -> SeriesSummary {
    let ranges: &[ReferenceRange] = events
        .first()
        .map(|event| event.reference_ranges.as_slice())
        .unwrap_or_default();
    let timestamps: Vec<i64> = events.iter().map(|event| event.ts).collect();

    let values = events.iter().flat_map(|event| {
        let (min, max) = event.value.extent();
        [min, max]
    });
    let window = initial_window(&timestamps, config.initial_window_points);
    let slope = slope(events);
    let trend = trend(events);

    SeriesSummary {
        event: events.first().map(|event| event.event.clone()),
        unit: events.iter().find_map(|event| event.unit.clone()),
        points: events.len(),
        axis: value_axis_domain(ranges, values),
        bands: reference_bands(ranges),
        initial_window: window,
        visible: visible_window(&timestamps, window),
        slope,
        trend,
        trend_class: TrendClass::from_trend(trend),
        slope_direction: SlopeDirection::from_slope(slope),
    }
}

/// Clusters grouped by event name, in first-seen order.
#[derive(Default)]
struct ClusterGroups {
    order: Vec<String>,
    groups: HashMap<String, Vec<EventCluster>>,
}

impl ClusterGroups {
    fn push(&mut self, cluster: EventCluster) {
        match self.groups.entry(cluster.event.clone()) {
            Entry::Occupied(mut entry) => entry.get_mut().push(cluster),
            Entry::Vacant(entry) => {
                self.order.push(entry.key().clone());
                entry.insert(vec![cluster]);
            }
        }
    }

    fn finalize(mut self, config: &TimelineConfig) -> TimelineSummary {
        let items = self
            .order
            .into_iter()
            .filter_map(|key| {
                let history = self.groups.remove(&key)?;
                TimelineItem::score(key, &history, config)
            })
            .collect();

        TimelineSummary::new(items, config.sort_mode)
    }
}

fn payload_entries<'a>(payload: &'a Value, key: &str) -> Result<&'a [Value], TimelineError> {
    if let Some(entries) = payload.as_array() {
        return Ok(entries);
    }

    let object = payload.as_object().ok_or_else(|| {
        TimelineError::Parse(format!(
            "Expected an object or array, received {}",
            kind_of(payload)
        ))
    })?;
    let data = object.get("data").ok_or(TimelineError::MissingData)?;

    match data.get(key) {
        Some(Value::Array(entries)) => Ok(entries),
        Some(Value::Null) | None => {
            log::warn!("payload has no `{key}` list, treating it as empty");
            Ok(&[])
        }
        Some(other) => Err(TimelineError::Parse(format!(
            "Expected `{key}` to be an array, received {}",
            kind_of(other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn parse_cluster(entry: &Value) -> Option<EventCluster> {
    let event = non_empty_str(entry.get("event"))?;
    let date = entry.get("date").and_then(Value::as_str).and_then(parse_datetime);

    Some(EventCluster {
        id: entry_id(entry, &event),
        patient_id: non_empty_str(entry.get("patient_id")).unwrap_or_default(),
        kind: parse_kind(entry.get("type")),
        codes: parse_codes(entry.get("codes")),
        reference_ranges: parse_reference_ranges(entry.get("reference_ranges")),
        unit: non_empty_str(entry.get("unit")),
        abnormal_flags: non_empty_str(entry.get("abnormal_flags")),
        is_favorite: flag(entry.get("is_favorite")),
        is_line_disabled: flag(entry.get("is_line_disabled")),
        file: non_empty_str(entry.get("file")),
        is_group: flag(entry.get("is_group")),
        date,
        value: entry.get("value").and_then(number),
        trend: entry.get("trend").and_then(number).unwrap_or_default(),
        slope: entry.get("slope").and_then(number).unwrap_or_default(),
        count: entry
            .get("count")
            .and_then(Value::as_u64)
            .and_then(|count| u32::try_from(count).ok())
            .unwrap_or_default(),
        ts: timestamp(entry, date),
        event,
    })
}

fn parse_event(entry: &Value) -> Option<PatientEvent> {
    let value = parse_event_value(entry.get("value")?)?;
    let event = non_empty_str(entry.get("event")).unwrap_or_default();
    let date = entry.get("date").and_then(Value::as_str).and_then(parse_datetime);

    Some(PatientEvent {
        id: entry_id(entry, &event),
        patient_id: non_empty_str(entry.get("patient_id")).unwrap_or_default(),
        kind: parse_kind(entry.get("type")),
        source: non_empty_str(entry.get("source")),
        reference_ranges: parse_reference_ranges(entry.get("reference_ranges")),
        unit: non_empty_str(entry.get("unit")),
        date,
        ts: timestamp(entry, date),
        value,
        event,
    })
}

fn parse_event_value(value: &Value) -> Option<EventValue> {
    if let Some(single) = number(value) {
        return Some(EventValue::Single(single));
    }
    let min = value.get("min").and_then(number)?;
    let max = value.get("max").and_then(number)?;
    Some(EventValue::Span(MinMaxValue { min, max }))
}

fn parse_reference_ranges(value: Option<&Value>) -> Vec<ReferenceRange> {
    value
        .and_then(Value::as_array)
        .map(|ranges| ranges.iter().filter_map(parse_reference_range).collect())
        .unwrap_or_default()
}

fn parse_reference_range(value: &Value) -> Option<ReferenceRange> {
    value.as_object()?;
    Some(ReferenceRange {
        min: value.get("min").and_then(number),
        max: value.get("max").and_then(number),
        excl_min: value.get("excl_min").and_then(number),
        excl_max: value.get("excl_max").and_then(number),
        range: non_empty_str(value.get("range")),
        color: non_empty_str(value.get("color")),
        primary: value.get("primary").and_then(Value::as_bool),
    })
}

fn parse_kind(value: Option<&Value>) -> EventKind {
    match value.and_then(Value::as_str) {
        Some("Document") => EventKind::Document,
        Some("Medication") => EventKind::Medication,
        Some("Observation") | None => EventKind::Observation,
        Some(other) => {
            log::debug!("unknown event type `{other}`, assuming Observation");
            EventKind::Observation
        }
    }
}

/// Codes come as `{system: [code, ...]}` on clusters and `{system: code}` on events.
fn parse_codes(value: Option<&Value>) -> BTreeMap<String, Vec<String>> {
    let Some(object) = value.and_then(Value::as_object) else {
        return BTreeMap::new();
    };
    object
        .iter()
        .filter_map(|(system, codes)| {
            let codes: Vec<String> = match codes {
                Value::String(code) => vec![code.clone()],
                Value::Array(codes) => codes
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
                _ => return None,
            };
            Some((system.clone(), codes))
        })
        .collect()
}

fn entry_id(entry: &Value, event: &str) -> String {
    match entry.get("id") {
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => format!("{event}-unknown"),
    }
}

fn timestamp(entry: &Value, date: Option<DateTime<Utc>>) -> i64 {
    entry
        .get("ts")
        .and_then(Value::as_i64)
        .or_else(|| date.map(|date| date.timestamp_millis()))
        .unwrap_or_default()
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn flag(value: Option<&Value>) -> bool {
    value.and_then(Value::as_bool).unwrap_or(false)
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    let text = value?.as_str()?.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_mixed_date_formats() {
        let rfc = parse_datetime("2024-01-10T08:00:00Z").unwrap();
        assert_eq!(rfc.timestamp(), 1_704_873_600);

        let naive = parse_datetime("2024-01-05T00:00:00").unwrap();
        assert_eq!(naive.timestamp(), 1_704_412_800);

        let spaced = parse_datetime("2024-01-05 00:00:00.250").unwrap();
        assert_eq!(spaced.timestamp_millis(), 1_704_412_800_250);

        let date = parse_datetime("2023-11-01").unwrap();
        assert_eq!(date.timestamp(), 1_698_796_800);

        assert_eq!(parse_datetime("yesterday"), None);
    }

    #[test]
    fn cluster_fields_are_tolerant() {
        let cluster = parse_cluster(&json!({
            "event": "  Sodium ",
            "value": "139.5",
            "type": "Lab",
            "codes": {"LOINC": "2951-2"},
            "reference_ranges": [{"min": 135, "max": 145}, "junk"],
            "date": "2024-02-01",
            "count": 3
        }))
        .unwrap();

        assert_eq!(cluster.event, "Sodium");
        assert_eq!(cluster.id, "Sodium-unknown");
        assert_eq!(cluster.value, Some(139.5));
        assert_eq!(cluster.kind, EventKind::Observation);
        assert_eq!(cluster.codes["LOINC"], vec!["2951-2".to_string()]);
        assert_eq!(cluster.reference_ranges.len(), 1);
        assert_eq!(cluster.count, 3);
        assert_eq!(cluster.ts, 1_706_745_600_000);
        assert!(!cluster.is_favorite);
    }

    #[test]
    fn cluster_without_event_is_rejected() {
        assert!(parse_cluster(&json!({"value": 3})).is_none());
        assert!(parse_cluster(&json!({"event": "   "})).is_none());
    }

    #[test]
    fn event_values_can_be_spans() {
        let event = parse_event(&json!({"value": {"min": 60, "max": 80}, "ts": 5})).unwrap();
        assert_eq!(event.value, EventValue::Span(MinMaxValue { min: 60.0, max: 80.0 }));
        assert_eq!(event.value.averaged(), EventValue::Single(70.0));
        assert!(parse_event(&json!({"value": {"min": 60}})).is_none());
    }

    #[test]
    fn payload_shapes() {
        let config = TimelineConfig::default();

        let bare = summarize_clusters_value(&json!([{"event": "A", "value": 1}]), &config).unwrap();
        assert_eq!(bare.keys(), vec!["A"]);

        let empty = summarize_clusters_value(&json!({"data": {}}), &config).unwrap();
        assert!(empty.items.is_empty());

        assert!(matches!(
            summarize_clusters_value(&json!({"status": "ok"}), &config),
            Err(TimelineError::MissingData)
        ));
        assert!(matches!(
            summarize_clusters_value(&json!({"data": {"clusters": 4}}), &config),
            Err(TimelineError::Parse(_))
        ));
        assert!(matches!(
            summarize_clusters_str("not json", &config),
            Err(TimelineError::Parse(_))
        ));
        assert!(matches!(
            summarize_clusters_value(&json!("clusters"), &config),
            Err(TimelineError::Parse(_))
        ));
    }

    #[test]
    fn events_are_sorted_by_timestamp() {
        let events = parse_events_value(
            &json!({"data": {"events": [
                {"value": 2, "ts": 20},
                {"value": 1, "ts": 10},
                {"ts": 30}
            ]}}),
            false,
        )
        .unwrap();
        let ts: Vec<i64> = events.iter().map(|event| event.ts).collect();
        assert_eq!(ts, vec![10, 20]);
    }
}
