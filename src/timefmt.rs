//! Temporal classification of message timestamps.
//!
//! Buckets a timestamp into a human-readable label relative to "now":
//! a relative phrase within the last hour, `HH:mm` for earlier today,
//! `MMM DD` within the last year, `YYYY/MM/DD` beyond that.

use chrono::{DateTime, Duration, Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::to_millis;

static DOUBLE_QUOTES: Lazy<Regex> = Lazy::new(|| Regex::new("\"+").expect("static regex"));

/// Strip quotation artifacts from a formatted label.
pub fn strip_double_quotes(text: &str) -> String {
    DOUBLE_QUOTES.replace_all(text, "").into_owned()
}

/// Interpret normalized epoch milliseconds in the local timezone.
pub fn local_datetime(millis: i64) -> DateTime<Local> {
    DateTime::from_timestamp_millis(millis)
        .unwrap_or_default()
        .with_timezone(&Local)
}

/// Local calendar date of a raw (seconds-or-millis) timestamp.
pub fn local_date(timestamp: i64) -> NaiveDate {
    local_datetime(to_millis(timestamp)).date_naive()
}

/// Human-readable label for `timestamp`, pure in `(timestamp, now)`.
///
/// Rules, in order:
/// 1. same local calendar day and within the last hour: "just now" /
///    "N minutes ago";
/// 2. same calendar day: `HH:mm`;
/// 3. within the 365 days before `now`: `MMM DD`;
/// 4. otherwise: `YYYY/MM/DD`.
///
/// "Same calendar day" compares local-midnight-truncated dates, not 24-hour
/// deltas; "within the last hour" is the half-open interval `(now - 1h, now]`.
pub fn human_readable_time(timestamp: i64, now: DateTime<Local>) -> String {
    let t = local_datetime(to_millis(timestamp));

    if t.date_naive() == now.date_naive() {
        let elapsed = now.signed_duration_since(t);
        if elapsed >= Duration::zero() && elapsed < Duration::hours(1) {
            return strip_double_quotes(&relative_minutes(elapsed));
        }
        return t.format("%H:%M").to_string();
    }

    let elapsed = now.signed_duration_since(t);
    if elapsed >= Duration::zero() && elapsed < Duration::days(365) {
        return t.format("%b %d").to_string();
    }
    t.format("%Y/%m/%d").to_string()
}

/// Label using the wall clock as reference.
pub fn human_readable_time_now(timestamp: i64) -> String {
    human_readable_time(timestamp, Local::now())
}

fn relative_minutes(elapsed: Duration) -> String {
    match elapsed.num_minutes() {
        0 => "just now".to_string(),
        1 => "1 minute ago".to_string(),
        n => format!("{} minutes ago", n),
    }
}
