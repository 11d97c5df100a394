use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::Args;
use futures::StreamExt;
use tracing::Instrument;

use crate::settings::{PluginConfig, Settings};
use crate::shorten::{GoogleShortener, LinkShortener};
use crate::telemetry::{self};
use crate::telemetry::ops::report::Phase as ReportPhase;
use crate::util::time::parse_exclude_when;

pub mod fetch;
pub mod parse;
pub mod pool;
pub mod process;
pub mod report;
pub mod task;

use fetch::{FeedSource, HttpFeedSource};
use pool::FetchPool;
use process::{process_outcome, FeedResult};
use report::{ReportRow, TableFormat};
use task::{plan_tasks, FetchTask};

/// oslobot check [PROJECT ...]
#[derive(Args, Debug)]
pub struct CheckCmd {
    /// Projects to check; defaults to the configured list
    pub projects: Vec<String>,
    #[arg(long)] pub table_format: Option<TableFormat>,
    /// Exclusion window such as -1mo or -2w; "none" keeps every entry
    #[arg(long)] pub exclude_when: Option<String>,
    #[arg(long)] pub workers: Option<usize>,
    #[arg(long, default_value_t = false)] pub no_shorten: bool,
}

/// Builds the periodic-job table from health feeds.
pub struct Reporter {
    cfg: PluginConfig,
    source: Arc<dyn FeedSource>,
    shortener: Option<LinkShortener>,
}

impl Reporter {
    pub fn from_config(cfg: PluginConfig) -> Result<Self> {
        let source: Arc<dyn FeedSource> = Arc::new(HttpFeedSource::new(cfg.connect_timeout(), cfg.fetch_timeout())?);
        let shortener = match &cfg.shortener_api_key {
            Some(key) if cfg.shortening_enabled() => Some(LinkShortener::new(Arc::new(GoogleShortener::new(
                &cfg.shortener_url,
                key,
                cfg.shortener_connect(),
                cfg.shortener_timeout(),
            )?))),
            _ => None,
        };
        Ok(Self { cfg, source, shortener })
    }

    pub fn with_parts(cfg: PluginConfig, source: Arc<dyn FeedSource>, shortener: Option<LinkShortener>) -> Self {
        Self { cfg, source, shortener }
    }

    pub fn config(&self) -> &PluginConfig { &self.cfg }

    /// Fetch every (project, version) feed and summarise each as soon as it completes.
    pub async fn collect(&self, pool: &FetchPool, projects: &[String]) -> Result<Vec<(FetchTask, FeedResult)>> {
        let log = telemetry::report();
        let projects: &[String] = if projects.is_empty() { &self.cfg.periodic_project_names } else { projects };

        let tasks = {
            let _s = log.span(&ReportPhase::Plan).entered();
            plan_tasks(projects, &self.cfg.periodic_python_versions, &self.cfg.periodic_build_name_tpl, &self.cfg.periodic_url_tpl)
                .map_err(|e| anyhow!(e))?
        };
        let expected = tasks.len();
        log.debug(format!("Waiting for {} fetch requests", expected));

        let mut pending = {
            let _s = log.span_kv(&ReportPhase::Dispatch, [("tasks", expected.to_string()), ("workers", pool.workers().to_string())]).entered();
            pool.dispatch(Arc::clone(&self.source), tasks)
        };

        let mut results = Vec::with_capacity(expected);
        while let Some((task, outcome)) = pending.next().await {
            let _s = log.span(&ReportPhase::Process).entered();
            log.debug_kv("processing completion", [("url", task.rss_url.clone()), ("build_name", task.build_name.clone())]);
            let result = process_outcome(&outcome, self.cfg.periodic_exclude_when, Utc::now());
            results.push((task, result));
        }
        debug_assert_eq!(results.len(), expected);
        Ok(results)
    }

    pub async fn rows(&self, pool: &FetchPool, projects: &[String]) -> Result<Vec<ReportRow>> {
        let results = self.collect(pool, projects).await?;
        let log = telemetry::report();
        Ok(report::build_rows(results, self.shortener.as_ref()).instrument(log.span(&ReportPhase::Shorten)).await)
    }

    pub async fn table(&self, pool: &FetchPool, projects: &[String]) -> Result<String> {
        let rows = self.rows(pool, projects).await?;
        let log = telemetry::report();
        let _s = log.span(&ReportPhase::Render).entered();
        Ok(report::render_table(&rows, self.cfg.table_format))
    }
}

pub async fn run(settings: &Settings, args: CheckCmd) -> Result<()> {
    let started = Instant::now();
    let log = telemetry::report();
    let _g = log.root_span_kv([
        ("projects", format!("{:?}", args.projects)),
        ("table_format", format!("{:?}", args.table_format)),
        ("exclude_when", format!("{:?}", args.exclude_when)),
        ("workers", format!("{:?}", args.workers)),
        ("no_shorten", args.no_shorten.to_string()),
    ]).entered();

    let mut cfg = settings.plugin.clone();
    if let Some(f) = args.table_format { cfg.table_format = f; }
    if let Some(w) = &args.exclude_when { cfg.periodic_exclude_when = parse_exclude_when(w).map_err(|e| anyhow!(e))?; }
    if let Some(n) = args.workers { cfg.fetch_workers = n.max(1); }
    if args.no_shorten { cfg.periodic_shorten = false; }

    let pool = FetchPool::new(cfg.fetch_workers);
    let reporter = Reporter::from_config(cfg)?;
    let rows = reporter.rows(&pool, &args.projects).await;
    pool.shutdown().await;
    let rows = rows?;

    let table = {
        let _s = log.span(&ReportPhase::Render).entered();
        report::render_table(&rows, reporter.config().table_format)
    };
    log.result_timed(&rows, Some(table), started)?;
    log.totals(&rows);
    Ok(())
}
