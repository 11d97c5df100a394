use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Datelike, Local};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::meeting::MeetingFinder;
use crate::periodic::pool::FetchPool;
use crate::periodic::Reporter;
use crate::settings::Settings;
use crate::telemetry::{self};
use crate::telemetry::ops::bot::Phase as BotPhase;

use super::{BotPlugin, Message, ReplyTarget, Responder};

struct Poller {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Periodic-job and meeting-notes commands, plus the unsolicited room report.
pub struct OsloBot {
    settings: Settings,
    reporter: Arc<Reporter>,
    meetings: MeetingFinder,
    responder: Arc<dyn Responder>,
    poll_every: Option<Duration>,
    pool: Option<Arc<FetchPool>>,
    poller: Option<Poller>,
}

impl OsloBot {
    pub fn from_settings(settings: Settings, responder: Arc<dyn Responder>) -> Result<Self> {
        let reporter = Reporter::from_config(settings.plugin.clone())?;
        let meetings = MeetingFinder::from_config(&settings.plugin)?;
        Ok(Self::with_parts(settings, reporter, meetings, responder))
    }

    pub fn with_parts(settings: Settings, reporter: Reporter, meetings: MeetingFinder, responder: Arc<dyn Responder>) -> Self {
        let poll_every = settings.plugin.check_interval();
        Self { settings, reporter: Arc::new(reporter), meetings, responder, poll_every, pool: None, poller: None }
    }

    pub fn is_active(&self) -> bool { self.pool.is_some() }

    fn pool(&self) -> Result<&FetchPool> {
        self.pool.as_deref().ok_or_else(|| anyhow!("oslobot is not active"))
    }

    async fn check_periodics(&self, projects: &[String]) -> Result<String> {
        self.reporter.table(self.pool()?, projects).await
    }

    async fn meeting_notes(&self, args: &[String]) -> Result<String> {
        let team = args.first().cloned().unwrap_or_else(|| self.settings.plugin.meeting_team.clone());
        let lookup = self.meetings.latest(&team, Local::now().year()).await?;
        Ok(lookup.reply())
    }

    fn show_config(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.settings)?)
    }

    async fn send_public_or_private(&self, msg: &Message, content: &str, kind: &str) -> Result<()> {
        match msg.reply_target() {
            Some(to) => self.responder.send(&to, content).await,
            None => {
                telemetry::bot().warn_kv("No recipient targeted for request", [("kind", kind.to_string()), ("from", msg.from.clone())]);
                Ok(())
            }
        }
    }

    fn spawn_poller(&self, every: Duration, pool: Arc<FetchPool>) -> Poller {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let reporter = Arc::clone(&self.reporter);
        let responder = Arc::clone(&self.responder);
        let rooms = self.settings.bot.rooms.clone();
        let log = telemetry::bot();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick fires immediately; reports start one interval in
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let run = async {
                    let table = reporter.table(&pool, &[]).await?;
                    for room in &rooms {
                        responder.send(&ReplyTarget::Room(room.clone()), &table).await?;
                    }
                    anyhow::Ok(())
                };
                if let Err(e) = run.instrument(log.span(&BotPhase::Poll)).await {
                    log.warn_kv("periodic report failed", [("error", e.to_string())]);
                }
            }
        });
        Poller { cancel, handle }
    }
}

#[async_trait]
impl BotPlugin for OsloBot {
    async fn activate(&mut self) -> Result<()> {
        if self.is_active() { return Ok(()); }
        let log = telemetry::bot();
        let pool = {
            let _s = log.span(&BotPhase::Activate).entered();
            Arc::new(FetchPool::new(self.settings.plugin.fetch_workers))
        };
        if let Some(every) = self.poll_every {
            log.info_kv("starting poller", [("every_secs", every.as_secs_f64().to_string()), ("rooms", self.settings.bot.rooms.join(","))]);
            self.poller = Some(self.spawn_poller(every, Arc::clone(&pool)));
        }
        self.pool = Some(pool);
        Ok(())
    }

    async fn deactivate(&mut self) -> Result<()> {
        let log = telemetry::bot();
        if let Some(poller) = self.poller.take() {
            poller.cancel.cancel();
            if let Err(e) = poller.handle.await {
                log.warn_kv("poller ended abnormally", [("error", e.to_string())]);
            }
        }
        if let Some(pool) = self.pool.take() {
            pool.shutdown().instrument(log.span(&BotPhase::Deactivate)).await;
        }
        Ok(())
    }

    async fn handle(&self, msg: &Message) -> Result<()> {
        let log = telemetry::bot();
        let mut words = msg.text.split_whitespace();
        let Some(cmd) = words.next() else { return Ok(()) };
        let cmd = cmd.strip_prefix('!').unwrap_or(cmd);
        let args: Vec<String> = words.map(str::to_string).collect();
        log.debug_kv("got request", [("cmd", cmd.to_string()), ("from", msg.from.clone()), ("args", args.join(" "))]);

        let (content, kind) = match cmd {
            "check_periodics" => (self.check_periodics(&args).instrument(log.span(&BotPhase::Dispatch)).await?, "check"),
            "meeting_notes" => (self.meeting_notes(&args).instrument(log.span(&BotPhase::Dispatch)).await?, "meeting notes"),
            "config" if self.settings.bot.is_admin(&msg.from) => (self.show_config()?, "config"),
            "config" => {
                log.warn_kv("config requested by non-admin", [("from", msg.from.clone())]);
                return Ok(());
            }
            _ => return Ok(()),
        };
        self.send_public_or_private(msg, &content, kind).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::mock::RecordingResponder;
    use crate::periodic::fetch::FeedResponse;
    use crate::periodic::pool::mock::{MockFeedSource, MockReply};
    use crate::periodic::task::PyVersion;

    const URL_TPL: &str = "http://health.test/{build_name}/rss";
    const MEETING_TPL: &str = "http://eavesdrop.test/meetings/{team}/{year}/";

    fn settings() -> Settings {
        let mut s = Settings::default();
        s.plugin.periodic_project_names = vec!["nova".into()];
        s.plugin.periodic_python_versions = vec![PyVersion::new(3, 4)];
        s.plugin.periodic_url_tpl = URL_TPL.into();
        s.plugin.meeting_url_tpl = MEETING_TPL.into();
        s.bot.admins = vec!["Harlowja".into()];
        s
    }

    fn bot_with(source: MockFeedSource) -> (OsloBot, Arc<RecordingResponder>) {
        let s = settings();
        let source = Arc::new(source);
        let reporter = Reporter::with_parts(s.plugin.clone(), source.clone(), None);
        let meetings = MeetingFinder::with_source(source, MEETING_TPL);
        let responder = Arc::new(RecordingResponder::default());
        (OsloBot::with_parts(s, reporter, meetings, responder.clone()), responder)
    }

    #[tokio::test]
    async fn check_in_a_room_replies_to_the_room() {
        let (mut bot, responder) = bot_with(MockFeedSource::new());
        bot.activate().await.unwrap();
        bot.handle(&Message::group("dims", "#openstack-oslo", "!check_periodics")).await.unwrap();
        bot.deactivate().await.unwrap();

        let sent = responder.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, ReplyTarget::Room("#openstack-oslo".into()));
        assert!(sent[0].1.contains("Nova (3.4)"));
        assert!(sent[0].1.contains("Fetch failure (Not Found)"));
    }

    #[tokio::test]
    async fn meeting_notes_in_private_replies_to_sender() {
        let year = Local::now().year();
        let archive = format!("http://eavesdrop.test/meetings/nova/{year}/");
        let listing = FeedResponse::ok("<a href=\"nova.x-14.00.html\">nova.x-14.00.html</a>");
        let (bot, responder) = bot_with(MockFeedSource::new().reply(&archive, 0, MockReply::Body(listing)));

        bot.handle(&Message::direct("dims", "meeting_notes nova")).await.unwrap();
        assert_eq!(responder.sent(), vec![(ReplyTarget::User("dims".into()), format!("Last meeting url is {archive}nova.x-14.00.html"))]);
    }

    #[tokio::test]
    async fn unknown_commands_and_untargeted_messages_send_nothing() {
        let (mut bot, responder) = bot_with(MockFeedSource::new());
        bot.activate().await.unwrap();
        bot.handle(&Message::group("dims", "#openstack-oslo", "hello there")).await.unwrap();
        bot.handle(&Message::group("dims", "#openstack-oslo", "   ")).await.unwrap();
        let stray = Message { from: "dims".into(), room: None, is_group: false, is_direct: false, text: "check_periodics".into() };
        bot.handle(&stray).await.unwrap();
        bot.deactivate().await.unwrap();
        assert!(responder.sent().is_empty());
    }

    #[tokio::test]
    async fn check_before_activation_is_an_error() {
        let (bot, _) = bot_with(MockFeedSource::new());
        assert!(bot.handle(&Message::direct("dims", "check_periodics")).await.is_err());
    }

    #[tokio::test]
    async fn config_is_admin_only() {
        let (bot, responder) = bot_with(MockFeedSource::new());
        bot.handle(&Message::direct("dims", "config")).await.unwrap();
        assert!(responder.sent().is_empty());

        bot.handle(&Message::direct("harlowja", "config")).await.unwrap();
        let sent = responder.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("\"periodic_project_names\""));
        assert!(sent[0].1.contains("#openstack-oslo"));
    }

    #[tokio::test]
    async fn poller_reports_to_every_room_until_deactivated() {
        let (mut bot, responder) = bot_with(MockFeedSource::new());
        bot.settings.bot.rooms = vec!["#openstack-oslo".into(), "#openstack-dev".into()];
        bot.poll_every = Some(Duration::from_millis(20));

        bot.activate().await.unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        bot.deactivate().await.unwrap();
        assert!(!bot.is_active());

        let sent = responder.sent();
        assert!(sent.len() >= 2);
        assert!(sent.iter().any(|(to, _)| *to == ReplyTarget::Room("#openstack-dev".into())));
        assert!(sent.iter().all(|(_, body)| body.contains("Nova (3.4)")));

        let after = sent.len();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(responder.sent().len(), after);
    }
}
