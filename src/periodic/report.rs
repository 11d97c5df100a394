use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use comfy_table::presets::{ASCII_FULL, ASCII_HORIZONTAL_ONLY, ASCII_MARKDOWN, NOTHING, UTF8_FULL};
use comfy_table::Table;
use serde::{Serialize, Serializer};

use crate::shorten::LinkShortener;

use super::process::{FeedResult, BAD_VALUE, NA_VALUE};
use super::task::{FetchTask, PyVersion};

pub const HEADERS: [&str; 5] = ["Project", "Status", "Last failed", "Last failed url", "Discarded"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableFormat {
    Plain,
    Simple,
    Grid,
    FancyGrid,
    Github,
}

impl TableFormat {
    pub fn name(&self) -> &'static str {
        match self {
            TableFormat::Plain => "plain",
            TableFormat::Simple => "simple",
            TableFormat::Grid => "grid",
            TableFormat::FancyGrid => "fancy_grid",
            TableFormat::Github => "github",
        }
    }

    fn preset(&self) -> &'static str {
        match self {
            TableFormat::Plain => NOTHING,
            TableFormat::Simple => ASCII_HORIZONTAL_ONLY,
            TableFormat::Grid => ASCII_FULL,
            TableFormat::FancyGrid => UTF8_FULL,
            TableFormat::Github => ASCII_MARKDOWN,
        }
    }
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

impl FromStr for TableFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" => Ok(TableFormat::Plain),
            "simple" => Ok(TableFormat::Simple),
            "grid" => Ok(TableFormat::Grid),
            "fancy_grid" => Ok(TableFormat::FancyGrid),
            "github" | "pipe" | "markdown" => Ok(TableFormat::Github),
            other => Err(format!("unknown table format '{other}' (plain, simple, grid, fancy_grid, github)")),
        }
    }
}

impl Serialize for TableFormat {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> { s.serialize_str(self.name()) }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub project: String,
    pub status: String,
    pub last_fail: String,
    pub last_fail_url: String,
    pub discarded: String,
}

/// Title case: a letter is upper-cased when the previous character is not a letter.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_cased = false;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if prev_cased { out.extend(ch.to_lowercase()); } else { out.extend(ch.to_uppercase()); }
            prev_cased = true;
        } else {
            out.push(ch);
            prev_cased = false;
        }
    }
    out
}

/// Group by project, order projects case-insensitively and versions numerically.
pub fn group_results(results: Vec<(FetchTask, FeedResult)>) -> Vec<(String, PyVersion, FeedResult)> {
    let mut by_project: BTreeMap<(String, String), Vec<(PyVersion, FeedResult)>> = BTreeMap::new();
    for (task, result) in results {
        by_project
            .entry((task.project_name.to_lowercase(), task.project_name))
            .or_default()
            .push((task.py_version, result));
    }
    let mut out = Vec::new();
    for ((_, project), mut rows) in by_project {
        rows.sort_by_key(|(v, _)| *v);
        out.extend(rows.into_iter().map(|(v, r)| (project.clone(), v, r)));
    }
    out
}

fn is_sentinel(url: &str) -> bool {
    url.is_empty() || url == BAD_VALUE || url == NA_VALUE
}

pub async fn build_rows(results: Vec<(FetchTask, FeedResult)>, shortener: Option<&LinkShortener>) -> Vec<ReportRow> {
    let mut rows = Vec::with_capacity(results.len());
    for (project, version, result) in group_results(results) {
        let last_fail_url = match shortener {
            Some(s) if !is_sentinel(&result.last_fail_url) => s.safe_shorten(&result.last_fail_url).await,
            _ => result.last_fail_url,
        };
        rows.push(ReportRow {
            project: format!("{} ({})", title_case(&project), version),
            status: result.status,
            last_fail: result.last_fail,
            last_fail_url,
            discarded: result.discarded.to_string(),
        });
    }
    rows
}

pub fn render_table(rows: &[ReportRow], format: TableFormat) -> String {
    let mut table = Table::new();
    table.load_preset(format.preset());
    table.set_header(HEADERS.to_vec());
    for r in rows {
        table.add_row(vec![
            r.project.as_str(),
            r.status.as_str(),
            r.last_fail.as_str(),
            r.last_fail_url.as_str(),
            r.discarded.as_str(),
        ]);
    }
    table.to_string()
}
