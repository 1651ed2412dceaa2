//! Loading the published deadline feed from a URL or a local file.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;
use thiserror::Error;

use crate::model::{DeadlineRecord, FeedEntry};

const USER_AGENT: &str = concat!("deadline-hub/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("no feed configured; set feed.url or feed.path, or pass --feed")]
    NotConfigured,
    #[error("building http client")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("reading feed file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("feed from {origin} is not a JSON array of deadlines")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    Url(String),
    Path(PathBuf),
}

impl FeedSource {
    /// `http://` and `https://` values are fetched, anything else is a file path.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        let lower = value.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            FeedSource::Url(value.to_string())
        } else {
            FeedSource::Path(PathBuf::from(value))
        }
    }

    /// Pick the first non-empty source: explicit override, then url, then path.
    pub fn resolve(
        override_value: Option<&str>,
        url: Option<&str>,
        path: Option<&Path>,
    ) -> Result<Self, FeedError> {
        if let Some(value) = override_value.filter(|v| !v.trim().is_empty()) {
            return Ok(FeedSource::parse(value));
        }
        if let Some(url) = url.filter(|v| !v.trim().is_empty()) {
            return Ok(FeedSource::Url(url.trim().to_string()));
        }
        match path {
            Some(path) if !path.as_os_str().is_empty() => Ok(FeedSource::Path(path.to_path_buf())),
            _ => Err(FeedError::NotConfigured),
        }
    }
}

impl fmt::Display for FeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedSource::Url(url) => f.write_str(url),
            FeedSource::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

pub fn load_feed(source: &FeedSource, timeout: Duration) -> Result<Vec<FeedEntry>, FeedError> {
    let body = match source {
        FeedSource::Url(url) => fetch(url, timeout)?,
        FeedSource::Path(path) => fs::read_to_string(path).map_err(|source| FeedError::Read {
            path: path.clone(),
            source,
        })?,
    };
    let entries = parse_feed(&body, &source.to_string())?;
    tracing::info!(%source, count = entries.len(), "feed loaded");
    Ok(entries)
}

pub fn parse_feed(body: &str, origin: &str) -> Result<Vec<FeedEntry>, FeedError> {
    serde_json::from_str(body).map_err(|source| FeedError::Parse {
        origin: origin.to_string(),
        source,
    })
}

/// Assign positional ids and parse every deadline once.
pub fn into_records(entries: Vec<FeedEntry>) -> Vec<DeadlineRecord> {
    entries
        .into_iter()
        .enumerate()
        .map(|(id, entry)| DeadlineRecord::from_entry(id, entry))
        .collect()
}

fn fetch(url: &str, timeout: Duration) -> Result<String, FeedError> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(FeedError::Client)?;
    let request_error = |source| FeedError::Request {
        url: url.to_string(),
        source,
    };
    client
        .get(url)
        .send()
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.text())
        .map_err(request_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;
    use tempfile::NamedTempFile;

    type TestResult<T = ()> = anyhow::Result<T>;

    #[test]
    fn http_prefixes_select_url_source() {
        assert_eq!(
            FeedSource::parse("https://example.org/deadlines.json"),
            FeedSource::Url("https://example.org/deadlines.json".into())
        );
        assert_eq!(
            FeedSource::parse("HTTP://example.org/d.json"),
            FeedSource::Url("HTTP://example.org/d.json".into())
        );
        assert_eq!(
            FeedSource::parse("data/deadlines.json"),
            FeedSource::Path(PathBuf::from("data/deadlines.json"))
        );
    }

    #[test]
    fn resolve_prefers_override_then_url_then_path() -> TestResult {
        let path = PathBuf::from("/tmp/feed.json");
        let source = FeedSource::resolve(Some("local.json"), Some("https://a/b.json"), Some(&path))?;
        assert_eq!(source, FeedSource::Path(PathBuf::from("local.json")));

        let source = FeedSource::resolve(Some("  "), Some("https://a/b.json"), Some(&path))?;
        assert_eq!(source, FeedSource::Url("https://a/b.json".into()));

        let source = FeedSource::resolve(None, Some(""), Some(&path))?;
        assert_eq!(source, FeedSource::Path(path));

        assert_matches!(FeedSource::resolve(None, None, None), Err(FeedError::NotConfigured));
        Ok(())
    }

    #[test]
    fn loads_local_json_array() -> TestResult {
        let mut file = NamedTempFile::new()?;
        write!(
            file,
            r#"[
                {{"name_display":"ICWSM","deadline":"2099-01-15T23:59:59Z","topics":["Social Media"]}},
                {{"name_display":"CHI","deadline":"Rolling","submission_stage":"Abstract"}}
            ]"#
        )?;
        let source = FeedSource::Path(file.path().to_path_buf());
        let entries = load_feed(&source, Duration::from_secs(1))?;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].submission_stage.as_deref(), Some("Abstract"));

        let records = into_records(entries);
        assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![0, 1]);
        assert!(records[1].due.is_special());
        Ok(())
    }

    #[test]
    fn non_array_body_is_a_parse_error() {
        let err = parse_feed(r#"{"deadlines":[]}"#, "inline").unwrap_err();
        assert_matches!(err, FeedError::Parse { ref origin, .. } if origin == "inline");
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let source = FeedSource::Path(PathBuf::from("/definitely/not/here.json"));
        assert_matches!(
            load_feed(&source, Duration::from_secs(1)),
            Err(FeedError::Read { .. })
        );
    }
}
