//! Schedule parsing and fire-time calculation.
//!
//! A [`Schedule`] turns a cron-style expression into concrete fire instants.
//! Supported forms: standard 5-field cron, extended 6-field cron (leading
//! seconds field), shortcuts (`@daily`, `@hourly`, ...), and fixed intervals
//! (`@every 5m`). Evaluation happens in the schedule's timezone; results are
//! always UTC.
//!
//! `next_after` is pure: the same expression and reference instant always
//! yield the same fire time, and the result is strictly in the future of the
//! reference. Occurrences that fell inside a window the caller slept through
//! are never replayed.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors from parsing or evaluating a schedule expression.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// Malformed cron expression or unknown shortcut.
    #[error("invalid cron expression: {0}")]
    InvalidCron(String),

    /// Malformed `@every` interval.
    #[error("invalid interval expression: {0}")]
    InvalidInterval(String),

    /// Unknown IANA timezone name.
    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),

    /// The expression has no matching instant after the reference time.
    #[error("no future occurrence for expression")]
    NoMoreOccurrences,
}

/// A parsed, timezone-aware schedule.
#[derive(Debug, Clone)]
pub struct Schedule {
    expression: String,
    tz: Tz,
    kind: ScheduleKind,
}

#[derive(Debug, Clone)]
enum ScheduleKind {
    Cron(Box<CronSchedule>),
    Every(Duration),
}

impl Schedule {
    /// Parse an expression, evaluated in UTC.
    pub fn new(expression: impl Into<String>) -> Result<Self, ScheduleError> {
        Self::with_timezone(expression, "UTC")
    }

    /// Parse an expression evaluated in the given IANA timezone.
    pub fn with_timezone(
        expression: impl Into<String>,
        timezone: &str,
    ) -> Result<Self, ScheduleError> {
        let expression = expression.into();
        let tz: Tz = timezone
            .parse()
            .map_err(|_| ScheduleError::InvalidTimezone(timezone.to_string()))?;
        let kind = Self::parse_kind(&expression)?;

        Ok(Self {
            expression,
            tz,
            kind,
        })
    }

    fn parse_kind(expression: &str) -> Result<ScheduleKind, ScheduleError> {
        let trimmed = expression.trim();
        if let Some(rest) = trimmed.strip_prefix('@') {
            return Self::parse_shortcut(trimmed, rest);
        }
        Self::parse_cron(trimmed)
    }

    fn parse_shortcut(full: &str, rest: &str) -> Result<ScheduleKind, ScheduleError> {
        match rest.to_lowercase().as_str() {
            "yearly" | "annually" => Self::parse_cron("0 0 1 1 *"),
            "monthly" => Self::parse_cron("0 0 1 * *"),
            "weekly" => Self::parse_cron("0 0 * * SUN"),
            "daily" | "midnight" => Self::parse_cron("0 0 * * *"),
            "hourly" => Self::parse_cron("0 * * * *"),
            s if s.starts_with("every ") => {
                Self::parse_interval(s.trim_start_matches("every ").trim())
            }
            _ => Err(ScheduleError::InvalidCron(format!(
                "unknown shortcut: {}",
                full
            ))),
        }
    }

    fn parse_cron(expression: &str) -> Result<ScheduleKind, ScheduleError> {
        // The cron crate wants a seconds field; plain 5-field input gets one.
        let normalized = match expression.split_whitespace().count() {
            5 => format!("0 {}", expression),
            6 => expression.to_string(),
            n => {
                return Err(ScheduleError::InvalidCron(format!(
                    "expected 5 or 6 fields, got {}",
                    n
                )));
            }
        };

        let parsed = CronSchedule::from_str(&normalized)
            .map_err(|e| ScheduleError::InvalidCron(e.to_string()))?;
        Ok(ScheduleKind::Cron(Box::new(parsed)))
    }

    /// Parse a compound duration like `30s`, `5m`, `1h30m`, `2d`.
    fn parse_interval(spec: &str) -> Result<ScheduleKind, ScheduleError> {
        let invalid = || ScheduleError::InvalidInterval(spec.to_string());
        let mut total = 0u64;
        let mut digits = String::new();

        for c in spec.chars() {
            if c.is_ascii_digit() {
                digits.push(c);
                continue;
            }
            let n: u64 = digits.parse().map_err(|_| invalid())?;
            digits.clear();
            let unit = match c {
                's' => 1,
                'm' => 60,
                'h' => 3600,
                'd' => 86400,
                _ => return Err(invalid()),
            };
            total += n * unit;
        }

        if total == 0 || !digits.is_empty() {
            return Err(invalid());
        }
        Ok(ScheduleKind::Every(Duration::from_secs(total)))
    }

    /// Earliest fire instant strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Result<DateTime<Utc>, ScheduleError> {
        match &self.kind {
            ScheduleKind::Cron(schedule) => {
                let local = after.with_timezone(&self.tz);
                schedule
                    .after(&local)
                    .next()
                    .map(|dt| dt.with_timezone(&Utc))
                    .ok_or(ScheduleError::NoMoreOccurrences)
            }
            ScheduleKind::Every(period) => {
                let period =
                    chrono::Duration::from_std(*period).map_err(|_| ScheduleError::NoMoreOccurrences)?;
                Ok(after + period)
            }
        }
    }

    /// Earliest fire instant after the current time.
    pub fn next(&self) -> Result<DateTime<Utc>, ScheduleError> {
        self.next_after(Utc::now())
    }

    /// The next `n` fire instants strictly after `after`, in order.
    pub fn next_n_after(
        &self,
        after: DateTime<Utc>,
        n: usize,
    ) -> Result<Vec<DateTime<Utc>>, ScheduleError> {
        match &self.kind {
            ScheduleKind::Cron(schedule) => {
                let local = after.with_timezone(&self.tz);
                Ok(schedule
                    .after(&local)
                    .take(n)
                    .map(|dt| dt.with_timezone(&Utc))
                    .collect())
            }
            ScheduleKind::Every(period) => {
                let period =
                    chrono::Duration::from_std(*period).map_err(|_| ScheduleError::NoMoreOccurrences)?;
                let mut out = Vec::with_capacity(n);
                let mut cursor = after;
                for _ in 0..n {
                    cursor += period;
                    out.push(cursor);
                }
                Ok(out)
            }
        }
    }

    /// The original expression string.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// The timezone this schedule is evaluated in.
    pub fn timezone(&self) -> &str {
        self.tz.name()
    }
}
