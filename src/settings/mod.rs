use std::time::Duration;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::periodic::report::TableFormat;
use crate::periodic::task::PyVersion;
use crate::telemetry::{self};
use crate::util::time::{parse_exclude_when, RelativeWindow};

pub const ENV_PREFIX: &str = "OSLOBOT_";

const DEFAULT_PROJECTS: &[&str] = &[
    "ceilometer", "cinder", "cue", "glance", "heat", "ironic",
    "keystone", "murano", "neutron", "nova", "octavia", "trove",
];
const DEFAULT_BUILD_NAME_TPL: &str = "periodic-{project_name}-{py_version}-with-oslo-master";
const DEFAULT_URL_TPL: &str = "http://health.openstack.org/runs/key/build_name/{build_name}/recent/rss";
const DEFAULT_MEETING_URL_TPL: &str = "http://eavesdrop.openstack.org/meetings/{team}/{year}/";
const DEFAULT_SHORTENER_URL: &str = "https://www.googleapis.com/urlshortener/v1/url";
const DEFAULT_FETCH_WORKERS: usize = 3;
const MAX_TIMEOUT_SECS: f64 = 86_400.0;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{key}: {reason}")]
    Invalid { key: String, reason: String },
}

impl ConfigError {
    fn invalid(key: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid { key: format!("{ENV_PREFIX}{key}"), reason: reason.into() }
    }
}

/// Options of the periodic/meeting plugin. Read once at activation.
#[derive(Clone, Debug, Serialize)]
pub struct PluginConfig {
    /// Seconds between unsolicited reports; zero or negative disables the poller.
    pub periodic_check_frequency: i64,
    pub periodic_python_versions: Vec<PyVersion>,
    pub periodic_project_names: Vec<String>,
    pub periodic_shorten: bool,
    pub periodic_build_name_tpl: String,
    pub periodic_url_tpl: String,
    pub periodic_fetch_timeout: f64,
    pub periodic_connect_timeout: f64,
    pub fetch_workers: usize,
    pub table_format: TableFormat,
    /// Failures published at or before `now + window` are ignored.
    pub periodic_exclude_when: Option<RelativeWindow>,
    pub meeting_team: String,
    pub meeting_url_tpl: String,
    pub meeting_fetch_timeout: f64,
    #[serde(serialize_with = "redact")]
    pub shortener_api_key: Option<String>,
    pub shortener_url: String,
    pub shortener_fetch_timeout: f64,
    pub shortener_connect_timeout: f64,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            periodic_check_frequency: -1,
            periodic_python_versions: vec![PyVersion::new(3, 4), PyVersion::new(2, 7)],
            periodic_project_names: DEFAULT_PROJECTS.iter().map(|s| s.to_string()).collect(),
            periodic_shorten: false,
            periodic_build_name_tpl: DEFAULT_BUILD_NAME_TPL.to_string(),
            periodic_url_tpl: DEFAULT_URL_TPL.to_string(),
            periodic_fetch_timeout: 30.0,
            periodic_connect_timeout: 1.0,
            fetch_workers: DEFAULT_FETCH_WORKERS,
            table_format: TableFormat::Plain,
            periodic_exclude_when: Some(RelativeWindow::months(-1)),
            meeting_team: "oslo".to_string(),
            meeting_url_tpl: DEFAULT_MEETING_URL_TPL.to_string(),
            meeting_fetch_timeout: 10.0,
            shortener_api_key: None,
            shortener_url: DEFAULT_SHORTENER_URL.to_string(),
            shortener_fetch_timeout: 5.0,
            shortener_connect_timeout: 1.0,
        }
    }
}

impl PluginConfig {
    pub fn fetch_timeout(&self) -> Duration { secs(self.periodic_fetch_timeout) }
    pub fn connect_timeout(&self) -> Duration { secs(self.periodic_connect_timeout) }
    pub fn meeting_timeout(&self) -> Duration { secs(self.meeting_fetch_timeout) }
    pub fn shortener_timeout(&self) -> Duration { secs(self.shortener_fetch_timeout) }
    pub fn shortener_connect(&self) -> Duration { secs(self.shortener_connect_timeout) }

    pub fn check_interval(&self) -> Option<Duration> {
        (self.periodic_check_frequency > 0).then(|| Duration::from_secs(self.periodic_check_frequency as u64))
    }

    /// Shortening only happens when it is switched on and a key is present.
    pub fn shortening_enabled(&self) -> bool {
        self.periodic_shorten && self.shortener_api_key.is_some()
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Identity {
    pub server: String,
    pub nickname: String,
}

/// Host-level bot settings (who may administer it, where it lives).
#[derive(Clone, Debug, Serialize)]
pub struct BotSettings {
    pub admins: Vec<String>,
    pub backend: String,
    pub identity: Identity,
    pub rooms: Vec<String>,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            admins: Vec::new(),
            backend: "IRC".to_string(),
            identity: Identity { server: "chat.freenode.net".to_string(), nickname: "oslobot".to_string() },
            rooms: vec!["#openstack-oslo".to_string()],
        }
    }
}

impl BotSettings {
    pub fn is_admin(&self, nick: &str) -> bool {
        self.admins.iter().any(|a| a.eq_ignore_ascii_case(nick))
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Settings {
    pub bot: BotSettings,
    pub plugin: PluginConfig,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(format!("{ENV_PREFIX}{key}")).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each un-prefixed key.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut s = Settings::default();
        let p = &mut s.plugin;

        if let Some(v) = lookup("CHECK_FREQUENCY") {
            p.periodic_check_frequency = v.trim().parse().map_err(|_| ConfigError::invalid("CHECK_FREQUENCY", "expected integer seconds"))?;
        }
        if let Some(v) = lookup("PYTHON_VERSIONS") {
            p.periodic_python_versions = parse_csv(&v)
                .iter()
                .map(|s| s.parse::<PyVersion>().map_err(|e| ConfigError::invalid("PYTHON_VERSIONS", e)))
                .collect::<Result<_, _>>()?;
        }
        if let Some(v) = lookup("PROJECTS") { p.periodic_project_names = parse_csv(&v); }
        if let Some(v) = lookup("SHORTEN") { p.periodic_shorten = parse_bool("SHORTEN", &v)?; }
        if let Some(v) = lookup("BUILD_NAME_TPL") { p.periodic_build_name_tpl = v; }
        if let Some(v) = lookup("URL_TPL") { p.periodic_url_tpl = v; }
        if let Some(v) = lookup("FETCH_TIMEOUT") { p.periodic_fetch_timeout = parse_secs("FETCH_TIMEOUT", &v)?; }
        if let Some(v) = lookup("CONNECT_TIMEOUT") { p.periodic_connect_timeout = parse_secs("CONNECT_TIMEOUT", &v)?; }
        if let Some(v) = lookup("FETCH_WORKERS") {
            p.fetch_workers = match v.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError::invalid("FETCH_WORKERS", "expected a positive integer")),
            };
        }
        if let Some(v) = lookup("TABLE_FORMAT") {
            p.table_format = v.parse().map_err(|e| ConfigError::invalid("TABLE_FORMAT", e))?;
        }
        if let Some(v) = lookup("EXCLUDE_WHEN") {
            p.periodic_exclude_when = parse_exclude_when(&v).map_err(|e| ConfigError::invalid("EXCLUDE_WHEN", e))?;
        }
        if let Some(v) = lookup("MEETING_TEAM") { p.meeting_team = v.trim().to_string(); }
        if let Some(v) = lookup("MEETING_URL_TPL") { p.meeting_url_tpl = v; }
        if let Some(v) = lookup("MEETING_FETCH_TIMEOUT") { p.meeting_fetch_timeout = parse_secs("MEETING_FETCH_TIMEOUT", &v)?; }
        if let Some(v) = lookup("SHORTENER_API_KEY") {
            let v = v.trim();
            p.shortener_api_key = (!v.is_empty()).then(|| v.to_string());
        }
        if let Some(v) = lookup("SHORTENER_URL") { p.shortener_url = v; }
        if let Some(v) = lookup("SHORTENER_FETCH_TIMEOUT") { p.shortener_fetch_timeout = parse_secs("SHORTENER_FETCH_TIMEOUT", &v)?; }
        if let Some(v) = lookup("SHORTENER_CONNECT_TIMEOUT") { p.shortener_connect_timeout = parse_secs("SHORTENER_CONNECT_TIMEOUT", &v)?; }

        let b = &mut s.bot;
        if let Some(v) = lookup("ADMINS") { b.admins = parse_csv(&v); }
        if let Some(v) = lookup("BACKEND") { b.backend = v.trim().to_string(); }
        if let Some(v) = lookup("SERVER") { b.identity.server = v.trim().to_string(); }
        if let Some(v) = lookup("NICKNAME") { b.identity.nickname = v.trim().to_string(); }
        if let Some(v) = lookup("ROOMS") { b.rooms = parse_csv(&v); }

        Ok(s)
    }
}

/// oslobot config: print the effective configuration, secrets redacted.
pub fn show(settings: &Settings) -> anyhow::Result<()> {
    let log = telemetry::settings();
    let text = serde_json::to_string_pretty(settings)?;
    log.result(settings, Some(text))
}

fn parse_csv(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn parse_bool(key: &str, v: &str) -> Result<bool, ConfigError> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::invalid(key, "expected true/false")),
    }
}

fn parse_secs(key: &str, v: &str) -> Result<f64, ConfigError> {
    match v.trim().parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs > 0.0 && secs <= MAX_TIMEOUT_SECS => Ok(secs),
        _ => Err(ConfigError::invalid(key, format!("expected a positive number of seconds up to {MAX_TIMEOUT_SECS}"))),
    }
}

fn secs(v: f64) -> Duration {
    Duration::try_from_secs_f64(v.min(MAX_TIMEOUT_SECS)).unwrap_or(Duration::from_secs(1))
}

fn redact<S: Serializer>(key: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
    match key {
        Some(_) => s.serialize_str("********"),
        None => s.serialize_none(),
    }
}
