use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Weekday};
use opsgate_core::registry::parse_args;
use opsgate_core::{ParamType, ToolContext, ToolDescriptor, ToolError, ToolHandler, ToolOutput};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::files::{read_text, write_output};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d-%b-%Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d %b %Y",
    "%d %B %Y",
];

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

#[derive(Debug, Deserialize)]
struct Args {
    file_path: PathBuf,
    day: String,
    file_dest: PathBuf,
}

/// Counts the dates in a file that fall on a given weekday.
pub struct CountDays;

#[async_trait]
impl ToolHandler for CountDays {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "count_days",
            "Count how many dates in a file (one per line) fall on a given day of the week \
             and write the count to a destination file.",
        )
        .required("file_path", ParamType::String, "Path of the file with one date per line")
        .required("day", ParamType::String, "Day of the week, e.g. Wednesday")
        .required("file_dest", ParamType::String, "Path to write the count to")
    }

    async fn call(&self, _ctx: &ToolContext, arguments: Value) -> Result<ToolOutput, ToolError> {
        let args: Args = parse_args(arguments)?;
        let weekday = parse_weekday(&args.day)?;

        let text = read_text(&args.file_path).await?;
        let count = count_weekday(&text, weekday);

        write_output(&args.file_dest, &count.to_string()).await?;
        Ok(ToolOutput::new(format!(
            "{count} {weekday} date(s) written to {}",
            args.file_dest.display()
        )))
    }
}

/// Match a weekday by its first three letters, case-insensitively.
fn parse_weekday(day: &str) -> Result<Weekday, ToolError> {
    let prefix: String = day.trim().to_lowercase().chars().take(3).collect();
    WEEKDAYS
        .iter()
        .copied()
        .find(|w| w.to_string().to_lowercase() == prefix)
        .ok_or_else(|| ToolError::InvalidArguments(format!("'{day}' is not a day of the week")))
}

fn count_weekday(text: &str, weekday: Weekday) -> usize {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let date = parse_date(line);
            if date.is_none() {
                warn!("Skipping unparseable date line: {line}");
            }
            date
        })
        .filter(|date| date.weekday() == weekday)
        .count()
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.date_naive());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok().map(|dt| dt.date()))
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
        })
}
