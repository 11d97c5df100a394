use regex::Regex;

use crate::periodic::fetch::FeedResponse;

/// Latest minutes page linked from a yearly archive listing.
///
/// Archive listings link every meeting twice (`.html` minutes and `.log.html`
/// transcripts); only the minutes count. Links are de-duplicated in the order
/// they first appear and the last one is taken as the most recent meeting.
pub fn extract_meeting_url(team: &str, archive_url: &str, resp: &FeedResponse) -> Option<String> {
    if resp.status != 200 {
        return None;
    }
    let re = Regex::new(&format!("({}.+?[.]html)", regex::escape(team))).ok()?;
    let mut matches: Vec<&str> = Vec::new();
    for cap in re.captures_iter(&resp.body) {
        let Some(m) = cap.get(1) else { continue };
        let m = m.as_str();
        if m.ends_with(".log.html") || matches.contains(&m) {
            continue;
        }
        matches.push(m);
    }
    matches.last().map(|m| format!("{archive_url}{m}"))
}
