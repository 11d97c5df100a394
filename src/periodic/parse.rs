use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use rss::{Channel, Item};
use thiserror::Error;

const NAIVE_LAYOUTS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%a, %d %b %Y %H:%M:%S",
];

const ZONED_LAYOUTS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f %z", "%Y-%m-%d %H:%M:%S %z"];

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("body is neither RSS nor Atom: {0}")]
    NotAFeed(String),
    #[error("entry has no publish date")]
    MissingDate,
    #[error("unrecognised publish date '{0}'")]
    BadDate(String),
}

/// Publish time as the feed stated it: with or without a zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishedAt {
    Zoned(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
}

impl PublishedAt {
    /// Point in time used for ordering and cutoffs; naive values are read as UTC.
    pub fn instant(&self) -> DateTime<Utc> {
        match self {
            PublishedAt::Zoned(dt) => dt.with_timezone(&Utc),
            PublishedAt::Naive(n) => n.and_utc(),
        }
    }

    pub fn display(&self) -> String {
        match self {
            PublishedAt::Zoned(dt) => {
                let zone = if dt.offset().local_minus_utc() == 0 { "UTC".to_string() } else { dt.format("%:z").to_string() };
                format!("{} {}", dt.format("%A %b, %e, %Y at %k:%M:%S"), zone)
            }
            PublishedAt::Naive(n) => n.format("%A %b, %e, %Y at %k:%M:%S").to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FeedEntry {
    pub published: PublishedAt,
    pub link: Option<String>,
}

pub fn parse_timestamp(raw: &str) -> Option<PublishedAt> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) { return Some(PublishedAt::Zoned(dt)); }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) { return Some(PublishedAt::Zoned(dt)); }
    for layout in ZONED_LAYOUTS {
        if let Ok(dt) = DateTime::parse_from_str(s, layout) { return Some(PublishedAt::Zoned(dt)); }
    }
    for layout in NAIVE_LAYOUTS {
        if let Ok(n) = NaiveDateTime::parse_from_str(s, layout) { return Some(PublishedAt::Naive(n)); }
    }
    None
}

fn item_published(item: &Item) -> Result<PublishedAt, ParseError> {
    let raw = item
        .pub_date()
        .map(str::to_string)
        .or_else(|| item.dublin_core_ext().and_then(|dc| dc.dates().first().cloned()))
        .ok_or(ParseError::MissingDate)?;
    parse_timestamp(&raw).ok_or(ParseError::BadDate(raw))
}

/// Entries of an RSS 2.0 document, falling back to Atom.
pub fn parse_entries(body: &str) -> Result<Vec<FeedEntry>, ParseError> {
    match Channel::read_from(body.as_bytes()) {
        Ok(channel) => channel
            .items()
            .iter()
            .map(|item| -> Result<FeedEntry, ParseError> {
                Ok(FeedEntry { published: item_published(item)?, link: item.link().map(str::to_string) })
            })
            .collect(),
        Err(rss_err) => parse_atom(body).map_err(|_| ParseError::NotAFeed(rss_err.to_string())),
    }
}

fn parse_atom(body: &str) -> Result<Vec<FeedEntry>, ParseError> {
    let feed = feed_rs::parser::parse(body.as_bytes()).map_err(|e| ParseError::NotAFeed(e.to_string()))?;
    feed.entries
        .into_iter()
        .map(|entry| -> Result<FeedEntry, ParseError> {
            let published = entry.published.or(entry.updated).ok_or(ParseError::MissingDate)?;
            Ok(FeedEntry {
                published: PublishedAt::Zoned(published.fixed_offset()),
                link: entry.links.first().map(|l| l.href.clone()),
            })
        })
        .collect()
}
