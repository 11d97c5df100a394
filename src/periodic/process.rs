use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::util::time::RelativeWindow;

use super::fetch::{FetchError, FetchOutcome};
use super::parse::{parse_entries, FeedEntry};

pub const BAD_VALUE: &str = "??";
pub const NA_VALUE: &str = "N/A";

pub const STATUS_ALL_OK: &str = "All OK (no recent failures)";
pub const STATUS_TIMED_OUT: &str = "Fetch timed out";
pub const STATUS_CANCELLED: &str = "Fetch cancelled";
pub const STATUS_UNKNOWN: &str = "Unknown fetch error";
pub const STATUS_MALFORMED: &str = "Malformed feed";

/// Summary of one health feed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FeedResult {
    pub status: String,
    pub last_fail: String,
    pub last_fail_url: String,
    pub discarded: usize,
}

impl FeedResult {
    fn all_ok(discarded: usize) -> Self {
        FeedResult { status: STATUS_ALL_OK.to_string(), last_fail: NA_VALUE.to_string(), last_fail_url: NA_VALUE.to_string(), discarded }
    }

    fn degraded(status: impl Into<String>) -> Self {
        FeedResult { status: status.into(), last_fail: BAD_VALUE.to_string(), last_fail_url: BAD_VALUE.to_string(), discarded: 0 }
    }
}

/// Turn a fetch outcome into a row-ready summary; never fails.
pub fn process_outcome(outcome: &FetchOutcome, exclude_when: Option<RelativeWindow>, now: DateTime<Utc>) -> FeedResult {
    match outcome {
        Err(FetchError::Timeout) => FeedResult::degraded(STATUS_TIMED_OUT),
        Err(FetchError::Cancelled) => FeedResult::degraded(STATUS_CANCELLED),
        Err(e) => {
            tracing::warn!(error = %e, "failed fetching feed");
            FeedResult::degraded(STATUS_UNKNOWN)
        }
        // the health API answers 400 instead of an empty feed
        Ok(r) if r.status == 400 && r.body.contains("No Failed Runs") => FeedResult::all_ok(0),
        Ok(r) if r.status != 200 => FeedResult::degraded(format!("Fetch failure ({})", r.reason)),
        Ok(r) => process_feed(&r.body, exclude_when, now),
    }
}

pub fn process_feed(body: &str, exclude_when: Option<RelativeWindow>, now: DateTime<Utc>) -> FeedResult {
    let entries = match parse_entries(body) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(error = %e, "unusable feed body");
            return FeedResult::degraded(STATUS_MALFORMED);
        }
    };
    let total = entries.len();

    let expire_after = match exclude_when.map(|w| (w, w.apply(now))) {
        Some((_, Some(cutoff))) => Some(cutoff),
        Some((w, None)) => {
            tracing::warn!(window = %w, "exclusion window is out of range, reporting every entry");
            None
        }
        None => None,
    };
    let mut kept: Vec<FeedEntry> = match expire_after {
        Some(cutoff) => entries.into_iter().filter(|e| e.published.instant() > cutoff).collect(),
        None => entries,
    };
    let discarded = total - kept.len();

    if kept.is_empty() { return FeedResult::all_ok(discarded); }

    kept.sort_by_key(|e| e.published.instant());
    let fails = kept.len();
    let Some(latest) = kept.last() else { return FeedResult::all_ok(discarded) };
    FeedResult {
        status: format!("{} failures", fails),
        last_fail: latest.published.display(),
        last_fail_url: latest.link.clone().unwrap_or_else(|| BAD_VALUE.to_string()),
        discarded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::periodic::fetch::FeedResponse;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> { Utc.with_ymd_and_hms(2016, 3, 15, 12, 0, 0).unwrap() }

    fn rss(items: &[(&str, &str)]) -> String {
        let body: String = items
            .iter()
            .map(|(date, link)| format!("<item><title>fail</title><link>{link}</link><pubDate>{date}</pubDate></item>"))
            .collect();
        format!(r#"<rss version="2.0"><channel><title>h</title><link>http://h</link><description>d</description>{body}</channel></rss>"#)
    }

    #[test]
    fn all_entries_older_than_cutoff_is_all_ok() {
        let body = rss(&[
            ("Mon, 01 Feb 2016 10:00:00 +0000", "http://logs/1"),
            ("Tue, 02 Feb 2016 10:00:00 +0000", "http://logs/2"),
        ]);
        let got = process_feed(&body, Some(RelativeWindow::months(-1)), now());
        assert_eq!(got, FeedResult::all_ok(2));
        assert_eq!(got.last_fail, NA_VALUE);
        assert_eq!(got.last_fail_url, NA_VALUE);
    }

    #[test]
    fn latest_surviving_entry_wins() {
        let body = rss(&[
            ("Wed, 09 Mar 2016 08:00:00 +0000", "http://logs/mid"),
            ("Mon, 01 Feb 2016 10:00:00 +0000", "http://logs/old"),
            ("Sat, 12 Mar 2016 23:30:00 +0000", "http://logs/new"),
            ("Thu, 10 Mar 2016 08:00:00 +0000", "http://logs/other"),
        ]);
        let got = process_feed(&body, Some(RelativeWindow::months(-1)), now());
        assert_eq!(got.status, "3 failures");
        assert_eq!(got.last_fail_url, "http://logs/new");
        assert_eq!(got.last_fail, "Saturday Mar, 12, 2016 at 23:30:00 UTC");
        assert_eq!(got.discarded, 1);
    }

    #[test]
    fn entry_exactly_at_cutoff_is_discarded() {
        let body = rss(&[("Mon, 15 Feb 2016 12:00:00 +0000", "http://logs/edge")]);
        let got = process_feed(&body, Some(RelativeWindow::months(-1)), now());
        assert_eq!(got.status, STATUS_ALL_OK);
        assert_eq!(got.discarded, 1);
    }

    #[test]
    fn no_window_keeps_everything() {
        let body = rss(&[("Mon, 01 Feb 2010 10:00:00 +0000", "http://logs/ancient")]);
        let got = process_feed(&body, None, now());
        assert_eq!(got.status, "1 failures");
        assert_eq!(got.discarded, 0);
    }

    #[test]
    fn out_of_range_window_keeps_entries_without_panicking() {
        let body = rss(&[("Mon, 01 Feb 2016 10:00:00 +0000", "http://logs/1")]);
        let window = RelativeWindow { months: 0, days: i64::MIN / 2, seconds: 0 };
        let got = process_feed(&body, Some(window), now());
        assert_eq!(got.status, "1 failures");
        assert_eq!(got.discarded, 0);
    }

    #[test]
    fn naive_timestamps_format_without_zone() {
        let body = rss(&[("2016-03-14 07:01:02", "http://logs/naive")]);
        let got = process_feed(&body, Some(RelativeWindow::months(-1)), now());
        assert_eq!(got.last_fail, "Monday Mar, 14, 2016 at  7:01:02");
    }

    #[test]
    fn fetch_errors_become_statuses() {
        let t = process_outcome(&Err(FetchError::Timeout), None, now());
        assert_eq!((t.status.as_str(), t.last_fail.as_str(), t.last_fail_url.as_str()), (STATUS_TIMED_OUT, BAD_VALUE, BAD_VALUE));
        assert_eq!(process_outcome(&Err(FetchError::Cancelled), None, now()).status, STATUS_CANCELLED);
        assert_eq!(process_outcome(&Err(FetchError::Other("boom".into())), None, now()).status, STATUS_UNKNOWN);

        let not_found = FeedResponse { status: 404, reason: "Not Found".into(), body: String::new() };
        assert_eq!(process_outcome(&Ok(not_found), None, now()).status, "Fetch failure (Not Found)");

        let no_runs = FeedResponse { status: 400, reason: "Bad Request".into(), body: "No Failed Runs".into() };
        let got = process_outcome(&Ok(no_runs), None, now());
        assert_eq!(got.status, STATUS_ALL_OK);
        assert_eq!(got.last_fail_url, NA_VALUE);

        let garbage = FeedResponse::ok("<html/>");
        assert_eq!(process_outcome(&Ok(garbage), None, now()).status, STATUS_MALFORMED);
    }
}
