//! Timeline bucketing for trend charts.
//!
//! Sparse daily entries are mapped onto a fixed number of date buckets and one
//! representative value is picked per bucket:
//! - Daily (7 points): the entry for exactly that day
//! - Weekly (4 points of 7 days) and monthly (12 calendar months): the
//!   latest-dated entry in the bucket that has a value for the metric
//!
//! Latest-wins is applied to every metric, including cumulative ones like
//! steps, rather than summing or averaging.

use crate::{Error, MetricEntry, MetricField, Result};
use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Bucketing scheme for a chart
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// Last 7 days, one point per day
    Daily7,
    /// Last 28 days in 4 consecutive 7-day buckets
    Weekly4x7,
    /// Last 12 calendar months, ending with the current month
    Monthly12,
}

impl Granularity {
    /// Number of points a chart at this granularity always has
    pub fn len(self) -> usize {
        match self {
            Granularity::Daily7 => 7,
            Granularity::Weekly4x7 => 4,
            Granularity::Monthly12 => 12,
        }
    }

    /// Inclusive date ranges of each bucket, oldest first
    pub fn ranges(self, today: NaiveDate) -> Vec<(NaiveDate, NaiveDate)> {
        match self {
            Granularity::Daily7 => (0..7)
                .rev()
                .map(|offset| {
                    let day = today - Duration::days(offset);
                    (day, day)
                })
                .collect(),
            Granularity::Weekly4x7 => (0..4)
                .map(|i| {
                    let start = today - Duration::days(27 - 7 * i);
                    (start, start + Duration::days(6))
                })
                .collect(),
            Granularity::Monthly12 => {
                let current = first_of_month(today);
                (0..12u32)
                    .rev()
                    .map(|back| {
                        let start = current
                            .checked_sub_months(Months::new(back))
                            .unwrap_or(NaiveDate::MIN);
                        (start, last_of_month(start))
                    })
                    .collect()
            }
        }
    }

    fn label(self, start: NaiveDate) -> String {
        match self {
            Granularity::Daily7 => start.format("%a").to_string(),
            Granularity::Weekly4x7 => start.format("%m/%d").to_string(),
            Granularity::Monthly12 => start.format("%b").to_string(),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Granularity::Daily7 => "week",
            Granularity::Weekly4x7 => "month",
            Granularity::Monthly12 => "year",
        };
        f.write_str(name)
    }
}

impl FromStr for Granularity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "week" | "daily" | "daily7" => Ok(Granularity::Daily7),
            "month" | "weekly" | "weekly4x7" => Ok(Granularity::Weekly4x7),
            "year" | "monthly" | "monthly12" => Ok(Granularity::Monthly12),
            other => Err(Error::Other(format!("Unknown range: {}", other))),
        }
    }
}

/// One plotted unit in a chart
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimelinePoint {
    pub label: String,
    /// Representative value, or `None` when the bucket has no data
    pub value: Option<f64>,
    /// First day of the bucket
    pub anchor_date: NaiveDate,
    /// Last day of the bucket (same as `anchor_date` for daily points)
    pub end_date: NaiveDate,
}

/// Map entries onto the fixed buckets of `granularity` ending at `today`.
///
/// Always returns exactly `granularity.len()` points in ascending date order.
/// Entries outside every bucket are ignored.
pub fn bucket<F>(
    entries: &[MetricEntry],
    granularity: Granularity,
    accessor: F,
    today: NaiveDate,
) -> Vec<TimelinePoint>
where
    F: Fn(&MetricEntry) -> Option<f64>,
{
    let points: Vec<TimelinePoint> = granularity
        .ranges(today)
        .into_iter()
        .map(|(start, end)| {
            let value = match granularity {
                Granularity::Daily7 => entries
                    .iter()
                    .rev()
                    .find(|e| e.date == start)
                    .and_then(&accessor),
                Granularity::Weekly4x7 | Granularity::Monthly12 => {
                    latest_in_range(entries, &accessor, start, end)
                }
            };
            TimelinePoint {
                label: granularity.label(start),
                value,
                anchor_date: start,
                end_date: end,
            }
        })
        .collect();

    tracing::debug!(
        "Bucketed {} entries into {} {} points ({} with data)",
        entries.len(),
        points.len(),
        granularity,
        points.iter().filter(|p| p.value.is_some()).count()
    );

    points
}

/// [`bucket`] using a metric field as the accessor
pub fn bucket_field(
    entries: &[MetricEntry],
    granularity: Granularity,
    field: MetricField,
    today: NaiveDate,
) -> Vec<TimelinePoint> {
    bucket(entries, granularity, |e| field.get(e), today)
}

/// Vertical scale denominator for rendering a series.
///
/// The larger of the goal and the series maximum, never below 1.
pub fn scale_max(points: &[TimelinePoint], goal: Option<f64>) -> f64 {
    points
        .iter()
        .filter_map(|p| p.value)
        .chain(goal)
        .filter(|v| v.is_finite())
        .fold(1.0, f64::max)
}

fn latest_in_range<F>(
    entries: &[MetricEntry],
    accessor: &F,
    start: NaiveDate,
    end: NaiveDate,
) -> Option<f64>
where
    F: Fn(&MetricEntry) -> Option<f64>,
{
    // max_by_key keeps the last of equal dates, so later input wins ties
    entries
        .iter()
        .filter(|e| e.date >= start && e.date <= end)
        .filter_map(|e| accessor(e).map(|v| (e.date, v)))
        .max_by_key(|(date, _)| *date)
        .map(|(_, v)| v)
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.day0()))
}

fn last_of_month(first: NaiveDate) -> NaiveDate {
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}
