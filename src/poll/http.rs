// src/poll/http.rs
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use time::{format_description::well_known::Rfc2822, OffsetDateTime, UtcOffset};

use super::types::{ProbeOutcome, UrlProber};

pub const DEFAULT_USER_AGENT: &str = "regsource-monitor/0.3 (source accessibility check)";

/// Cap on the decoded body retained for marker checks.
const BODY_EXCERPT_MAX_BYTES: usize = 65_536;

/// Prober backed by `reqwest`. Redirects are never followed: a 3xx has to
/// surface with its own status code so scoring can see it.
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new(default_timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(default_timeout)
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("building http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl UrlProber for HttpProber {
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeOutcome {
        let t0 = Instant::now();
        match self.client.get(url).timeout(timeout).send().await {
            Ok(resp) => {
                let latency_ms = t0.elapsed().as_millis() as u64;
                let status = resp.status().as_u16();
                let last_modified_unix = resp
                    .headers()
                    .get(reqwest::header::LAST_MODIFIED)
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_rfc2822_to_unix);
                // Body is only interesting for marker checks, so only 2xx
                // pages are read; a failed read degrades to "no excerpt".
                let body_excerpt = if (200..=299).contains(&status) {
                    resp.text().await.ok().map(truncate_excerpt)
                } else {
                    None
                };
                ProbeOutcome {
                    status: Some(status),
                    latency_ms: Some(latency_ms),
                    error: None,
                    body_excerpt,
                    last_modified_unix,
                }
            }
            Err(e) => ProbeOutcome {
                status: None,
                latency_ms: None,
                error: Some(error_message(&e)),
                body_excerpt: None,
                last_modified_unix: None,
            },
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Short, stable messages for the report; full error text only for the
/// cases we have no name for.
fn error_message(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "timeout".to_string()
    } else if e.is_connect() {
        "connect failed".to_string()
    } else {
        e.to_string()
    }
}

fn parse_rfc2822_to_unix(ts: &str) -> Option<u64> {
    OffsetDateTime::parse(ts, &Rfc2822)
        .ok()
        .map(|dt| dt.to_offset(UtcOffset::UTC).unix_timestamp())
        .and_then(|x| u64::try_from(x).ok())
}

fn truncate_excerpt(mut body: String) -> String {
    if body.len() <= BODY_EXCERPT_MAX_BYTES {
        return body;
    }
    let mut cut = BODY_EXCERPT_MAX_BYTES;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    body.truncate(cut);
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_modified_header_parses_to_unix() {
        let ts = parse_rfc2822_to_unix("Wed, 21 Oct 2015 07:28:00 GMT");
        assert_eq!(ts, Some(1_445_412_480));
        assert_eq!(parse_rfc2822_to_unix("not a date"), None);
    }

    #[test]
    fn excerpt_truncation_respects_char_boundaries() {
        let body = "é".repeat(BODY_EXCERPT_MAX_BYTES); // 2 bytes per char
        let cut = truncate_excerpt(body);
        assert!(cut.len() <= BODY_EXCERPT_MAX_BYTES);
        assert!(cut.chars().all(|c| c == 'é'));

        let short = truncate_excerpt("small".to_string());
        assert_eq!(short, "small");
    }
}
