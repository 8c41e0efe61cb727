use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use rangeline_core::{
    format_elapsed, format_number, AggregationScale, SortMode, TimelineConfig, TimelineSummary,
};
use rangeline_events::{parse_events_str, summarize_clusters_str, summarize_series, SeriesSummary};

#[derive(Parser, Debug)]
#[command(
    name = "rangeline-cli",
    about = "Chấm điểm timeline xét nghiệm theo khoảng tham chiếu từ file JSON."
)]
struct Args {
    /// Đường dẫn tới file JSON (clusters hoặc events).
    #[arg(short, long)]
    input: PathBuf,

    /// File cấu hình JSON (`TimelineConfig`).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Chế độ sắp xếp: date, deviation, favorability, unfavorability.
    #[arg(short, long)]
    sort: Option<SortMode>,

    /// Đọc file như một chuỗi events thay vì clusters.
    #[arg(long)]
    series: bool,

    /// Lấy trung bình các giá trị min/max.
    #[arg(long)]
    average_out: bool,

    /// Mức gộp của chuỗi (m, h, d, w hoặc số phút); mức 10 phút tự lấy trung bình.
    #[arg(long)]
    scale: Option<AggregationScale>,

    /// In kết quả dạng JSON.
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    let data = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Không đọc được file {:?}", args.input))?;

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => TimelineConfig::default(),
    };
    if let Some(mode) = args.sort {
        config.sort_mode = mode;
    }

    if args.series {
        let average_out =
            args.average_out || args.scale.is_some_and(|scale| scale.averages_spans());
        let events = parse_events_str(&data, average_out)?;
        log::debug!("parsed {} events from {:?}", events.len(), args.input);
        let summary = summarize_series(&events, &config);

        if args.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            print_series(&summary);
        }
        return Ok(());
    }

    let summary = summarize_clusters_str(&data, &config)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_timeline(&summary);
    }

    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<TimelineConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Không đọc được file cấu hình {path:?}"))?;
    serde_json::from_str(&raw).with_context(|| format!("Cấu hình không hợp lệ trong {path:?}"))
}

fn print_timeline(summary: &TimelineSummary) {
    println!(
        "Generated at: {}\nSort mode: {}\nRows: {}",
        summary.generated_at,
        summary.sort_mode,
        summary.items().len()
    );

    let now = Utc::now();
    for item in summary.items() {
        let value = match item.latest.value {
            Some(value) => format!(
                "{} {}",
                format_number(value, 2),
                item.latest.unit.as_deref().unwrap_or_default()
            ),
            None => "-".to_string(),
        };
        let deviation = item
            .deviation
            .map_or_else(|| "-".to_string(), |d| format_number(d, 1));
        let when = item
            .latest
            .date
            .map_or_else(|| "-".to_string(), |date| format_elapsed(date, now));

        println!(
            "{:<24} {:>14}  dev {:>5}  {:<18} ({}x, {})",
            item.key,
            value.trim_end(),
            deviation,
            item.trend_class.title(),
            item.history_len,
            when
        );
    }
}

fn print_series(summary: &SeriesSummary) {
    println!(
        "Event: {}\nPoints: {}\nTrend: {} ({})",
        summary.event.as_deref().unwrap_or("-"),
        summary.points,
        format_number(summary.trend, 3),
        summary.trend_class.title()
    );
    if let Some(axis) = summary.axis {
        println!(
            "Axis: {} .. {}",
            format_number(axis.min, 1),
            format_number(axis.max, 1)
        );
    }
    if let Some(visible) = summary.visible {
        println!(
            "Visible: points {}..{} ({} of {})",
            visible.start_index,
            visible.end_index,
            visible.len(),
            summary.points
        );
    }
}
