use anyhow::{bail, Result};
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::util::effective_now;

// Windowing-related types live here to keep the pipeline modules focused.

/// Human-facing timeframe selection, as shown in the caller's UI.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum Timeframe {
  LastFullDay,
  LastFullWorkWeek,
  Last30Days,
  CustomRange,
}

impl Timeframe {
  /// The display label the caller-facing UI and the summarize prompt use.
  pub fn label(&self) -> &'static str {
    match self {
      Timeframe::LastFullDay => "Last Full Day",
      Timeframe::LastFullWorkWeek => "Last Full Work Week",
      Timeframe::Last30Days => "Last 30 Days",
      Timeframe::CustomRange => "Custom Range",
    }
  }

  /// Parse a display label back into a timeframe. Unrecognized labels are
  /// invalid input, rejected before any remote call.
  pub fn parse(label: &str) -> Result<Timeframe> {
    match label {
      "Last Full Day" => Ok(Timeframe::LastFullDay),
      "Last Full Work Week" => Ok(Timeframe::LastFullWorkWeek),
      "Last 30 Days" => Ok(Timeframe::Last30Days),
      "Custom Range" => Ok(Timeframe::CustomRange),
      other => bail!("unrecognized timeframe label: {other:?}"),
    }
  }
}

/// Absolute fetch window. `end` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimeWindow {
  pub start: NaiveDateTime,
  pub end: NaiveDateTime,
}

impl TimeWindow {
  /// Query-parameter rendering, `YYYY-MM-DDTHH:MM:SS` in local time.
  pub fn start_iso(&self) -> String {
    self.start.format("%Y-%m-%dT%H:%M:%S").to_string()
  }

  pub fn end_iso(&self) -> String {
    self.end.format("%Y-%m-%dT%H:%M:%S").to_string()
  }
}

/// Compute the absolute (start, end) window for a timeframe.
///
/// Custom ranges require both calendar dates; the end date is made inclusive
/// by bumping the exclusive bound to the following midnight. Supports an
/// optional `now` override for deterministic testing.
pub fn resolve_window(
  timeframe: Timeframe,
  custom_start: Option<NaiveDate>,
  custom_end: Option<NaiveDate>,
  now: Option<DateTime<Local>>,
) -> Result<TimeWindow> {
  let now = effective_now(now);

  match timeframe {
    Timeframe::LastFullDay => {
      let end = day_start(now.date_naive());
      Ok(TimeWindow {
        start: end - Duration::days(1),
        end,
      })
    }
    Timeframe::LastFullWorkWeek => {
      // Most recently completed Sunday-through-Saturday span. The end bound
      // is the latest Sunday 00:00 at or before now; a week still in
      // progress is never included.
      let today = now.date_naive();
      let mut days_to_last_sat = (today.weekday().num_days_from_monday() + 2) % 7;
      if days_to_last_sat == 0 {
        days_to_last_sat = 7;
      }
      let last_saturday = today - Duration::days(i64::from(days_to_last_sat));
      let end = day_start(last_saturday + Duration::days(1));
      Ok(TimeWindow {
        start: end - Duration::days(7),
        end,
      })
    }
    Timeframe::Last30Days => {
      let end = day_start(now.date_naive());
      Ok(TimeWindow {
        start: end - Duration::days(30),
        end,
      })
    }
    Timeframe::CustomRange => {
      let (Some(start_date), Some(end_date)) = (custom_start, custom_end) else {
        bail!("Custom Range requires both a start and an end date");
      };
      let start = day_start(start_date);
      let end = day_start(end_date + Duration::days(1));
      if start >= end {
        bail!("custom range start must precede its end");
      }
      Ok(TimeWindow { start, end })
    }
  }
}

fn day_start(date: NaiveDate) -> NaiveDateTime {
  date.and_hms_opt(0, 0, 0).unwrap()
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::{TimeZone, Weekday};

  fn local(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(y, m, d, h, mi, s).single().unwrap()
  }

  #[test]
  fn last_full_day_anchors_to_previous_midnight() {
    let now = local(2025, 8, 15, 14, 30, 0); // a Friday
    let w = resolve_window(Timeframe::LastFullDay, None, None, Some(now)).unwrap();
    assert_eq!(w.start_iso(), "2025-08-14T00:00:00");
    assert_eq!(w.end_iso(), "2025-08-15T00:00:00");
  }

  #[test]
  fn presets_are_pure_in_now() {
    let now = local(2025, 8, 15, 14, 30, 0);
    for tf in [Timeframe::LastFullDay, Timeframe::LastFullWorkWeek, Timeframe::Last30Days] {
      let a = resolve_window(tf, None, None, Some(now)).unwrap();
      let b = resolve_window(tf, None, None, Some(now)).unwrap();
      assert_eq!(a, b, "{tf:?} not deterministic");
    }
  }

  #[test]
  fn work_week_is_sunday_through_saturday() {
    // Friday 2025-08-15: last completed week is Sun 2025-08-03 .. Sat 2025-08-09.
    let now = local(2025, 8, 15, 9, 0, 0);
    let w = resolve_window(Timeframe::LastFullWorkWeek, None, None, Some(now)).unwrap();
    assert_eq!(w.start_iso(), "2025-08-03T00:00:00");
    assert_eq!(w.end_iso(), "2025-08-10T00:00:00");
    assert_eq!(w.start.date().weekday(), Weekday::Sun);
  }

  #[test]
  fn work_week_never_includes_week_in_progress() {
    // Scan a full cycle of weekdays; end must always be a Sunday midnight
    // at or before now, and less than 7 days behind.
    for day in 10..=17 {
      let now = local(2025, 8, day, 13, 0, 0);
      let w = resolve_window(Timeframe::LastFullWorkWeek, None, None, Some(now)).unwrap();
      assert_eq!(w.end.date().weekday(), Weekday::Sun);
      assert!(w.end <= now.naive_local(), "end after now for day {day}");
      assert!(
        now.naive_local() - w.end < Duration::days(7),
        "end more than a week behind for day {day}"
      );
      assert_eq!(w.end - w.start, Duration::days(7));
    }
  }

  #[test]
  fn work_week_on_sunday_ends_today_at_midnight() {
    // 2025-08-17 is a Sunday; the week ending this midnight just completed.
    let now = local(2025, 8, 17, 8, 0, 0);
    let w = resolve_window(Timeframe::LastFullWorkWeek, None, None, Some(now)).unwrap();
    assert_eq!(w.end_iso(), "2025-08-17T00:00:00");
    assert_eq!(w.start_iso(), "2025-08-10T00:00:00");
  }

  #[test]
  fn last_30_days_spans_thirty_days() {
    let now = local(2025, 8, 15, 23, 59, 59);
    let w = resolve_window(Timeframe::Last30Days, None, None, Some(now)).unwrap();
    assert_eq!(w.end_iso(), "2025-08-15T00:00:00");
    assert_eq!(w.end - w.start, Duration::days(30));
  }

  #[test]
  fn custom_range_end_is_exclusive_next_midnight() {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2024, 1, 7).unwrap();
    let w = resolve_window(Timeframe::CustomRange, Some(start), Some(end), None).unwrap();
    assert_eq!(w.start_iso(), "2024-01-01T00:00:00");
    assert_eq!(w.end_iso(), "2024-01-08T00:00:00");
  }

  #[test]
  fn custom_range_requires_both_dates() {
    let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    assert!(resolve_window(Timeframe::CustomRange, Some(d), None, None).is_err());
    assert!(resolve_window(Timeframe::CustomRange, None, Some(d), None).is_err());
    assert!(resolve_window(Timeframe::CustomRange, None, None, None).is_err());
  }

  #[test]
  fn labels_round_trip_and_unknown_labels_error() {
    for tf in [
      Timeframe::LastFullDay,
      Timeframe::LastFullWorkWeek,
      Timeframe::Last30Days,
      Timeframe::CustomRange,
    ] {
      assert_eq!(Timeframe::parse(tf.label()).unwrap(), tf);
    }
    assert!(Timeframe::parse("Last Fortnight").is_err());
  }
}
