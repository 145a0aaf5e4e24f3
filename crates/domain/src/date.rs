use chrono::{prelude::*, Duration};
use chrono_tz::Tz;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("`{0}` is not a valid duration, expected something like `2h`, `10m` or `1h30m`")]
pub struct InvalidDuration(pub String);

/// Parses compact durations like `2h`, `10m`, `1h30m`, `45s` or `1d`.
pub fn parse_compact_duration(input: &str) -> Result<Duration, InvalidDuration> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(InvalidDuration(input.to_string()));
    }

    let mut total = Duration::zero();
    let mut digits = String::new();
    for c in trimmed.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let amount = digits
            .parse::<i64>()
            .map_err(|_| InvalidDuration(input.to_string()))?;
        digits.clear();
        let unit = match c.to_ascii_lowercase() {
            'd' => Duration::try_days(amount),
            'h' => Duration::try_hours(amount),
            'm' => Duration::try_minutes(amount),
            's' => Duration::try_seconds(amount),
            _ => return Err(InvalidDuration(input.to_string())),
        };
        total = unit
            .and_then(|unit| total.checked_add(&unit))
            .ok_or_else(|| InvalidDuration(input.to_string()))?;
    }
    // Trailing digits without a unit
    if !digits.is_empty() {
        return Err(InvalidDuration(input.to_string()));
    }
    if total <= Duration::zero() {
        return Err(InvalidDuration(input.to_string()));
    }

    Ok(total)
}

/// Inverse of `parse_compact_duration`, always using the largest units first.
pub fn format_compact_duration(duration: Duration) -> String {
    let mut secs = duration.num_seconds();
    if secs <= 0 {
        return "0s".into();
    }
    let mut out = String::new();
    for (unit, unit_secs) in [("d", 86_400), ("h", 3_600), ("m", 60), ("s", 1)] {
        let amount = secs / unit_secs;
        if amount > 0 {
            out.push_str(&format!("{}{}", amount, unit));
            secs -= amount * unit_secs;
        }
    }
    out
}

/// Human friendly rendering used in SMS copy, e.g. `2 hours` or `1 hour 30 minutes`
pub fn humanize_duration(duration: Duration) -> String {
    let mut parts = Vec::new();
    let mut secs = duration.num_seconds().max(0);
    for (singular, unit_secs) in [("day", 86_400), ("hour", 3_600), ("minute", 60), ("second", 1)] {
        let amount = secs / unit_secs;
        if amount > 0 {
            let suffix = if amount == 1 { "" } else { "s" };
            parts.push(format!("{} {}{}", amount, singular, suffix));
            secs -= amount * unit_secs;
        }
    }
    if parts.is_empty() {
        return "a moment".into();
    }
    parts.join(" ")
}

/// Start and end (exclusive) of the local day containing `now`, as UTC instants.
pub fn local_day_bounds(now: DateTime<Utc>, tz: &Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let local_date = now.with_timezone(tz).date_naive();
    let start = start_of_local_day(local_date, tz);
    let end = match local_date.succ_opt() {
        Some(next) => start_of_local_day(next, tz),
        None => start + Duration::days(1),
    };
    (start, end)
}

fn start_of_local_day(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&midnight)
        .earliest()
        // Midnight skipped by a DST transition, the day starts an hour later
        .or_else(|| tz.from_local_datetime(&(midnight + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

/// Formats a time of day like `3:05 PM` in the given timezone
pub fn format_local_time(dt: &DateTime<Utc>, tz: &Tz) -> String {
    let local = dt.with_timezone(tz);
    local
        .format("%I:%M %p")
        .to_string()
        .trim_start_matches('0')
        .to_string()
}
