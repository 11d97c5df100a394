use std::fmt;

use anyhow::{bail, Result};
use async_trait::async_trait;
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::settings::Settings;
use crate::telemetry::{self};

pub mod oslobot;

pub use oslobot::OsloBot;

/// An incoming chat message as the host runtime hands it over.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub from: String,
    pub room: Option<String>,
    pub is_group: bool,
    pub is_direct: bool,
    pub text: String,
}

impl Message {
    #[cfg(test)]
    pub fn group(from: &str, room: &str, text: impl Into<String>) -> Self {
        Message { from: from.to_string(), room: Some(room.to_string()), is_group: true, is_direct: false, text: text.into() }
    }

    pub fn direct(from: &str, text: impl Into<String>) -> Self {
        Message { from: from.to_string(), room: None, is_group: false, is_direct: true, text: text.into() }
    }

    /// Group messages are answered in their room, direct ones to the sender.
    pub fn reply_target(&self) -> Option<ReplyTarget> {
        match (&self.room, self.is_group, self.is_direct) {
            (Some(room), true, _) => Some(ReplyTarget::Room(room.clone())),
            (_, _, true) => Some(ReplyTarget::User(self.from.clone())),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplyTarget {
    Room(String),
    User(String),
}

impl fmt::Display for ReplyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyTarget::Room(r) => f.write_str(r),
            ReplyTarget::User(u) => write!(f, "@{u}"),
        }
    }
}

#[async_trait]
pub trait Responder: Send + Sync {
    async fn send(&self, to: &ReplyTarget, content: &str) -> Result<()>;
}

/// Prints replies; stands in for a chat backend on the command line.
pub struct StdoutResponder;

#[async_trait]
impl Responder for StdoutResponder {
    async fn send(&self, to: &ReplyTarget, content: &str) -> Result<()> {
        println!("[{to}]\n{}", content.trim_end());
        Ok(())
    }
}

/// Lifecycle and message hooks a chat host drives.
#[async_trait]
pub trait BotPlugin: Send + Sync {
    async fn activate(&mut self) -> Result<()>;
    async fn deactivate(&mut self) -> Result<()>;
    async fn handle(&self, msg: &Message) -> Result<()>;
}

/// oslobot watch
#[derive(Args, Debug)]
pub struct WatchCmd {
    /// Seconds between reports, overriding the configured frequency
    #[arg(long)] pub every: Option<i64>,
    /// Sender name for commands typed on stdin
    #[arg(long, default_value = "console")] pub user: String,
}

/// Activate the bot, report to the configured rooms on every tick and answer
/// commands typed on stdin until Ctrl-C.
pub async fn run_watch(settings: &Settings, args: WatchCmd) -> Result<()> {
    let log = telemetry::bot();
    let _g = log.root_span_kv([("every", format!("{:?}", args.every)), ("user", args.user.clone())]).entered();

    let mut settings = settings.clone();
    if let Some(every) = args.every { settings.plugin.periodic_check_frequency = every; }
    if settings.plugin.check_interval().is_none() {
        bail!("watch needs a positive check frequency (set OSLOBOT_CHECK_FREQUENCY or pass --every)");
    }

    let mut bot = OsloBot::from_settings(settings, std::sync::Arc::new(StdoutResponder))?;
    bot.activate().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            r = tokio::signal::ctrl_c() => { r?; break; }
            line = lines.next_line(), if stdin_open => match line? {
                Some(text) if text.trim().is_empty() => {}
                Some(text) => {
                    if let Err(e) = bot.handle(&Message::direct(&args.user, text)).await {
                        log.warn_kv("command failed", [("error", e.to_string())]);
                    }
                }
                None => stdin_open = false,
            },
        }
    }

    log.info("shutting down");
    bot.deactivate().await
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replies_follow_the_message_kind() {
        assert_eq!(Message::group("dims", "#openstack-oslo", "hi").reply_target(), Some(ReplyTarget::Room("#openstack-oslo".into())));
        assert_eq!(Message::direct("dims", "hi").reply_target(), Some(ReplyTarget::User("dims".into())));

        let stray = Message { from: "dims".into(), room: None, is_group: true, is_direct: false, text: "hi".into() };
        assert_eq!(stray.reply_target(), None);
    }

    #[test]
    fn targets_display_like_chat_addresses() {
        assert_eq!(ReplyTarget::Room("#oslo".into()).to_string(), "#oslo");
        assert_eq!(ReplyTarget::User("harlowja".into()).to_string(), "@harlowja");
    }
}
