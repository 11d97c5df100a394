use std::fmt;

use chrono::{DateTime, Duration, Months, Utc};

/// Largest window accepted from configuration, in years.
pub const MAX_WINDOW_YEARS: i64 = 1000;
use serde::Serialize;

/// Calendar-aware offset such as "-1mo" or "-2w3d".
///
/// Months are applied first, then days and seconds, so "-1mo" from March 31st
/// lands on the last day of February.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RelativeWindow {
    pub months: i32,
    pub days: i64,
    pub seconds: i64,
}

impl RelativeWindow {
    pub fn months(months: i32) -> Self {
        RelativeWindow { months, ..Default::default() }
    }

    pub fn is_zero(&self) -> bool {
        self.months == 0 && self.days == 0 && self.seconds == 0
    }

    /// True when every component spans at most `MAX_WINDOW_YEARS`.
    pub fn is_bounded(&self) -> bool {
        let max_days = MAX_WINDOW_YEARS * 366;
        i64::from(self.months).abs() <= MAX_WINDOW_YEARS * 12
            && self.days.abs() <= max_days
            && self.seconds.abs() <= max_days * 86_400
    }

    /// Shift `from` by this window. None when the result is out of range.
    pub fn apply(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let shifted = if self.months >= 0 {
            from.checked_add_months(Months::new(self.months as u32))?
        } else {
            from.checked_sub_months(Months::new(self.months.unsigned_abs()))?
        };
        shifted
            .checked_add_signed(Duration::try_days(self.days)?)?
            .checked_add_signed(Duration::try_seconds(self.seconds)?)
    }
}

impl fmt::Display for RelativeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() { return write!(f, "0s"); }
        let mut parts: Vec<String> = Vec::new();
        if self.months != 0 { parts.push(format!("{}mo", self.months)); }
        if self.days != 0 { parts.push(format!("{}d", self.days)); }
        if self.seconds != 0 { parts.push(format!("{}s", self.seconds)); }
        write!(f, "{}", parts.join(" "))
    }
}

// Parse a window string like "-1mo", "-2w3d", "12h" or "1y-6mo".
// A leading sign applies to every component that follows it until the next sign.
// Returns None if unparseable.
pub fn parse_window_str(s: &str) -> Option<RelativeWindow> {
    let s = s.trim();
    if s.is_empty() { return None; }

    let mut out = RelativeWindow::default();
    let mut sign: i64 = 1;
    let mut chars = s.chars().peekable();
    let mut seen_component = false;

    while chars.peek().is_some() {
        match chars.peek() {
            Some('-') => { sign = -1; chars.next(); }
            Some('+') => { sign = 1; chars.next(); }
            Some(c) if c.is_whitespace() => { chars.next(); }
            Some(c) if !c.is_ascii_alphanumeric() => return None,
            _ => {}
        }

        let mut digits = String::new();
        while let Some(c) = chars.peek().copied() {
            if c.is_ascii_digit() { digits.push(c); chars.next(); } else { break; }
        }
        let mut unit = String::new();
        while let Some(c) = chars.peek().copied() {
            if c.is_ascii_alphabetic() { unit.push(c); chars.next(); } else { break; }
        }
        if digits.is_empty() && unit.is_empty() { continue; }
        if digits.is_empty() || unit.is_empty() { return None; }

        let n: i64 = digits.parse().ok()?;
        let n = n.checked_mul(sign)?;
        match unit.as_str() {
            "y" => out.months = out.months.checked_add(i32::try_from(n.checked_mul(12)?).ok()?)?,
            "mo" => out.months = out.months.checked_add(i32::try_from(n).ok()?)?,
            "w" => out.days = out.days.checked_add(n.checked_mul(7)?)?,
            "d" => out.days = out.days.checked_add(n)?,
            "h" => out.seconds = out.seconds.checked_add(n.checked_mul(3600)?)?,
            "m" => out.seconds = out.seconds.checked_add(n.checked_mul(60)?)?,
            "s" => out.seconds = out.seconds.checked_add(n)?,
            _ => return None,
        }
        seen_component = true;
    }
    if seen_component { Some(out) } else { None }
}

// Exclusion window as configured: "none"/"off"/"" disables filtering.
pub fn parse_exclude_when(s: &str) -> Result<Option<RelativeWindow>, String> {
    let t = s.trim();
    if t.is_empty() || t.eq_ignore_ascii_case("none") || t.eq_ignore_ascii_case("off") {
        return Ok(None);
    }
    match parse_window_str(t) {
        Some(w) if w.is_zero() => Ok(None),
        Some(w) if !w.is_bounded() => Err(format!("window '{t}' is out of range (at most {MAX_WINDOW_YEARS} years)")),
        Some(w) => Ok(Some(w)),
        None => Err(format!("invalid window '{t}' (expected e.g. -1mo, -2w3d, -12h)")),
    }
}
