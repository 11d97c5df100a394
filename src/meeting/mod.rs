use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use chrono::{Datelike, Local};
use clap::Args;
use serde::Serialize;
use tracing::Instrument;

use crate::periodic::fetch::{FeedSource, FetchError, HttpFeedSource};
use crate::settings::{PluginConfig, Settings};
use crate::telemetry::{self};
use crate::telemetry::ops::meeting::Phase as MeetingPhase;
use crate::util::template;

pub mod extract;

use extract::extract_meeting_url;

/// No archive predates this year.
pub const FIRST_MEETING_YEAR: i32 = 2010;

/// oslobot meeting [TEAM]
#[derive(Args, Debug)]
pub struct MeetingCmd {
    /// Team whose archive is searched; defaults to the configured team
    pub team: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MeetingLookup {
    pub team: String,
    pub url: Option<String>,
    pub years_checked: Vec<i32>,
}

impl MeetingLookup {
    pub fn reply(&self) -> String {
        match &self.url {
            Some(url) => format!("Last meeting url is {url}"),
            None => format!("Could not find meeting url for project {}", self.team),
        }
    }
}

/// Walks the yearly meeting archives backwards until a minutes page turns up.
pub struct MeetingFinder {
    source: Arc<dyn FeedSource>,
    url_tpl: String,
}

impl MeetingFinder {
    pub fn from_config(cfg: &PluginConfig) -> Result<Self> {
        let source = HttpFeedSource::new(cfg.connect_timeout(), cfg.meeting_timeout())?;
        Ok(Self::with_source(Arc::new(source), &cfg.meeting_url_tpl))
    }

    pub fn with_source(source: Arc<dyn FeedSource>, url_tpl: &str) -> Self {
        Self { source, url_tpl: url_tpl.to_string() }
    }

    pub async fn latest(&self, team: &str, now_year: i32) -> Result<MeetingLookup> {
        let log = telemetry::meeting();
        let mut lookup = MeetingLookup { team: team.to_string(), url: None, years_checked: Vec::new() };

        let mut year = now_year;
        while year >= FIRST_MEETING_YEAR {
            let year_s = year.to_string();
            let archive = template::render(&self.url_tpl, &[("team", team), ("year", &year_s)]).map_err(|e| anyhow!(e))?;
            lookup.years_checked.push(year);

            let outcome = self.source.fetch(&archive).instrument(log.span(&MeetingPhase::FetchYear)).await;
            match outcome {
                Err(FetchError::Timeout) => {
                    log.warn_kv("meeting archive timed out, giving up", [("url", archive)]);
                    break;
                }
                Err(e) => {
                    log.warn_kv("failed fetching meeting archive", [("url", archive), ("error", e.to_string())]);
                }
                Ok(resp) => {
                    let found = {
                        let _s = log.span(&MeetingPhase::Extract).entered();
                        extract_meeting_url(team, &archive, &resp)
                    };
                    if let Some(url) = found {
                        log.debug_kv("found last meeting url", [("url", url.clone()), ("team", team.to_string())]);
                        lookup.url = Some(url);
                        break;
                    }
                }
            }
            year -= 1;
        }
        Ok(lookup)
    }
}

pub async fn run(settings: &Settings, args: MeetingCmd) -> Result<()> {
    let started = Instant::now();
    let log = telemetry::meeting();
    let team = args.team.unwrap_or_else(|| settings.plugin.meeting_team.clone());
    let _g = log.root_span_kv([("team", team.clone())]).entered();

    let finder = MeetingFinder::from_config(&settings.plugin)?;
    let lookup = finder.latest(&team, Local::now().year()).await?;
    log.result_timed(&lookup, Some(lookup.reply()), started)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::periodic::fetch::FeedResponse;
    use crate::periodic::pool::mock::{MockFeedSource, MockReply};

    const TPL: &str = "http://eavesdrop.test/meetings/{team}/{year}/";

    fn listing(file: &str) -> MockReply {
        MockReply::Body(FeedResponse::ok(format!("<a href=\"{file}\">{file}</a>")))
    }

    #[tokio::test]
    async fn falls_back_to_previous_years() {
        let source = Arc::new(
            MockFeedSource::new()
                .reply("http://eavesdrop.test/meetings/oslo/2016/", 0, MockReply::Body(FeedResponse::ok("<html>empty</html>")))
                .reply("http://eavesdrop.test/meetings/oslo/2014/", 0, listing("oslo.2014-12-01-16.00.html")),
        );
        let finder = MeetingFinder::with_source(source.clone(), TPL);
        let got = finder.latest("oslo", 2016).await.unwrap();
        assert_eq!(got.years_checked, vec![2016, 2015, 2014]);
        assert_eq!(got.url.as_deref(), Some("http://eavesdrop.test/meetings/oslo/2014/oslo.2014-12-01-16.00.html"));
        assert_eq!(got.reply(), "Last meeting url is http://eavesdrop.test/meetings/oslo/2014/oslo.2014-12-01-16.00.html");
        assert_eq!(source.calls().len(), 3);
    }

    #[tokio::test]
    async fn timeout_stops_the_search() {
        let source = Arc::new(
            MockFeedSource::new()
                .reply("http://eavesdrop.test/meetings/oslo/2016/", 0, MockReply::Timeout)
                .reply("http://eavesdrop.test/meetings/oslo/2015/", 0, listing("oslo.2015-06-01-16.00.html")),
        );
        let finder = MeetingFinder::with_source(source.clone(), TPL);
        let got = finder.latest("oslo", 2016).await.unwrap();
        assert_eq!(got.url, None);
        assert_eq!(got.reply(), "Could not find meeting url for project oslo");
        assert_eq!(source.calls(), vec!["http://eavesdrop.test/meetings/oslo/2016/".to_string()]);
    }

    #[tokio::test]
    async fn transport_errors_move_on_and_search_ends_at_first_year() {
        let source = Arc::new(
            MockFeedSource::new().reply("http://eavesdrop.test/meetings/heat/2012/", 0, MockReply::Error("connection reset".into())),
        );
        let finder = MeetingFinder::with_source(source.clone(), TPL);
        let got = finder.latest("heat", 2012).await.unwrap();
        assert_eq!(got.years_checked, vec![2012, 2011, 2010]);
        assert_eq!(got.url, None);
        assert_eq!(source.calls().last().map(String::as_str), Some("http://eavesdrop.test/meetings/heat/2010/"));
    }

    #[tokio::test]
    async fn unknown_placeholder_in_template_is_an_error() {
        let finder = MeetingFinder::with_source(Arc::new(MockFeedSource::new()), "http://eavesdrop.test/{project}/{year}/");
        assert!(finder.latest("oslo", 2016).await.is_err());
    }
}
