use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use url::Url;

use crate::util::template;

/// Interpreter version a periodic job runs under, ordered like a (major, minor) tuple.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PyVersion {
    pub major: u8,
    pub minor: u8,
}

impl PyVersion {
    pub const fn new(major: u8, minor: u8) -> Self { PyVersion { major, minor } }

    /// Build-name form, e.g. `py34`.
    pub fn tag(&self) -> String { format!("py{}{}", self.major, self.minor) }
}

impl fmt::Display for PyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}.{}", self.major, self.minor) }
}

impl FromStr for PyVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (major, minor) = s.split_once('.').ok_or_else(|| format!("invalid python version '{s}' (expected MAJOR.MINOR)"))?;
        let major = major.parse().map_err(|_| format!("invalid major version in '{s}'"))?;
        let minor = minor.parse().map_err(|_| format!("invalid minor version in '{s}'"))?;
        Ok(PyVersion { major, minor })
    }
}

impl Serialize for PyVersion {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> { s.collect_str(self) }
}

/// One health-feed lookup; travels with its outcome so results can be correlated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchTask {
    pub project_name: String,
    pub py_version: PyVersion,
    pub rss_url: String,
    pub build_name: String,
}

/// Cross product of projects and versions, de-duplicated, in input order.
pub fn plan_tasks(
    projects: &[String],
    versions: &[PyVersion],
    build_name_tpl: &str,
    url_tpl: &str,
) -> Result<Vec<FetchTask>, String> {
    let mut seen_projects: Vec<&str> = Vec::new();
    for p in projects.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
        if !seen_projects.contains(&p) { seen_projects.push(p); }
    }
    let mut seen_versions: Vec<PyVersion> = Vec::new();
    for v in versions {
        if !seen_versions.contains(v) { seen_versions.push(*v); }
    }

    let mut tasks = Vec::with_capacity(seen_projects.len() * seen_versions.len());
    for project_name in seen_projects {
        for py_version in &seen_versions {
            let tag = py_version.tag();
            let build_name = template::render(build_name_tpl, &[("project_name", project_name), ("py_version", &tag)])?;
            let rss_url = template::render(url_tpl, &[("build_name", &build_name)])?;
            if Url::parse(&rss_url).is_err() { return Err(format!("Invalid URL: {}", rss_url)); }
            tasks.push(FetchTask {
                project_name: project_name.to_string(),
                py_version: *py_version,
                rss_url,
                build_name,
            });
        }
    }
    Ok(tasks)
}
