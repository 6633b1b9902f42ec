use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;
use tracing::error;

use crate::error::{PagecastError, Result};

/// Every ten minutes.
pub const DEFAULT_SCHEDULE: &str = "*/10 * * * *";

/// Parses a cron expression.
///
/// Five-field expressions are standard cron: they get a leading seconds field
/// of `0` and days of the week numbered 0-7 from Sunday (7 is Sunday again).
/// Six- and seven-field expressions use the `cron` crate's syntax unchanged.
pub fn parse_schedule(expr: &str) -> Result<Schedule> {
	let fields: Vec<&str> = expr.split_whitespace().collect();
	let normalized = match fields.as_slice() {
		[minute, hour, day, month, weekday] => {
			let weekday = standard_weekdays(weekday).map_err(|reason| PagecastError::Config(format!("invalid cron expression {expr:?}: {reason}")))?;
			format!("0 {minute} {hour} {day} {month} {weekday}")
		}
		_ => fields.join(" "),
	};
	Schedule::from_str(&normalized).map_err(|e| PagecastError::Config(format!("invalid cron expression {expr:?}: {e}")))
}

/// Rewrites a standard day-of-week field (Sunday = 0 or 7) into the `cron`
/// crate's numbering (Sunday = 1). Day names pass through.
fn standard_weekdays(field: &str) -> std::result::Result<String, String> {
	if field == "*" || field == "?" {
		return Ok(field.to_string());
	}

	let mut names = Vec::new();
	let mut days = BTreeSet::new();
	for item in field.split(',') {
		if item.chars().any(|c| c.is_ascii_alphabetic()) {
			names.push(item.to_string());
			continue;
		}

		let (range, step) = match item.split_once('/') {
			Some((range, step)) => match step.parse::<usize>() {
				Ok(step) if step > 0 => (range, Some(step)),
				_ => return Err(format!("bad day-of-week step in {item:?}")),
			},
			None => (item, None),
		};
		let (first, last) = match (range, range.split_once('-')) {
			("*", _) => (0, 6),
			(_, Some((first, last))) => (weekday_number(first)?, weekday_number(last)?),
			(single, None) if step.is_some() => (weekday_number(single)?, 6),
			(single, None) => {
				let day = weekday_number(single)?;
				(day, day)
			}
		};
		if first > last {
			return Err(format!("day-of-week range {item:?} runs backwards"));
		}
		days.extend((first..=last).step_by(step.unwrap_or(1)).map(|day| day % 7 + 1));
	}

	names.extend(days.iter().map(u8::to_string));
	Ok(names.join(","))
}

fn weekday_number(value: &str) -> std::result::Result<u8, String> {
	match value.parse::<u8>() {
		Ok(day) if day <= 7 => Ok(day),
		_ => Err(format!("day of week {value:?} is not between 0 and 7")),
	}
}

/// Like [`parse_schedule`], logging and falling back to [`DEFAULT_SCHEDULE`] on error.
pub fn schedule_or_default(expr: &str) -> Result<Schedule> {
	parse_schedule(expr).or_else(|err| {
		error!(target = "pagecast.liveness", error = %err, fallback = DEFAULT_SCHEDULE, "invalid status schedule, using default");
		parse_schedule(DEFAULT_SCHEDULE)
	})
}

/// Time from `now` until the next scheduled run (UTC).
pub fn until_next(schedule: &Schedule, now: DateTime<Utc>) -> Option<Duration> {
	let next = schedule.after(&now).next()?;
	Some((next - now).to_std().unwrap_or(Duration::ZERO))
}
