use super::AlertPayload;
use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_WEBHOOK_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_WEBHOOK_RETRIES: u8 = 3;

#[derive(Clone)]
pub struct WebhookNotifier {
    webhook: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl WebhookNotifier {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(DEFAULT_WEBHOOK_TIMEOUT_SECS),
            max_retries: DEFAULT_WEBHOOK_RETRIES,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }

    pub async fn send_alert(&self, alert: &AlertPayload) -> Result<()> {
        let payload = WebhookBody::from_alert(alert);

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.webhook)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            match res {
                Ok(rsp) => {
                    if let Err(e) = rsp.error_for_status_ref() {
                        if attempt < self.max_retries {
                            tokio::time::sleep(backoff_delay(attempt)).await;
                            continue;
                        }
                        return Err(anyhow!("alert webhook HTTP error: {e}"));
                    }
                    return Ok(());
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        tokio::time::sleep(backoff_delay(attempt)).await;
                        continue;
                    }
                    return Err(anyhow!("alert webhook request failed: {e}"));
                }
            }
        }
    }
}

/// Exponential backoff starting at 500 ms, capped at 32 s so an arbitrary
/// retry count can never overflow the shift.
fn backoff_delay(attempt: u8) -> Duration {
    let exp = u32::from(attempt.saturating_sub(1)).min(6);
    Duration::from_millis(500u64 << exp)
}

#[derive(Serialize)]
struct WebhookBody {
    text: String,
    pipeline: String,
    #[serde(rename = "newlyFlagged")]
    newly_flagged: Vec<String>,
    cleared: Vec<String>,
    problematic: Vec<String>,
    timestamp: String,
}

impl WebhookBody {
    fn from_alert(alert: &AlertPayload) -> Self {
        let join = |codes: &[String]| {
            if codes.is_empty() {
                "—".to_string()
            } else {
                codes.join(", ")
            }
        };
        let text = format!(
            "[{}] problematic states changed — flagged: {}; cleared: {}; now problematic: {}",
            alert.pipeline,
            join(&alert.newly_flagged),
            join(&alert.cleared),
            join(&alert.problematic),
        );
        Self {
            text,
            pipeline: alert.pipeline.clone(),
            newly_flagged: alert.newly_flagged.clone(),
            cleared: alert.cleared.clone(),
            problematic: alert.problematic.clone(),
            timestamp: alert.timestamp_iso.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_caps() {
        assert_eq!(backoff_delay(1), Duration::from_millis(500));
        assert_eq!(backoff_delay(2), Duration::from_millis(1000));
        assert_eq!(backoff_delay(7), Duration::from_secs(32));
        // no shift overflow for retry counts past the cap
        assert_eq!(backoff_delay(200), Duration::from_secs(32));
        assert_eq!(backoff_delay(u8::MAX), Duration::from_secs(32));
        // attempt 0 never happens, but must not underflow either
        assert_eq!(backoff_delay(0), Duration::from_millis(500));
    }

    #[test]
    fn body_text_summarizes_the_change() {
        let alert = AlertPayload {
            pipeline: "cannabis-hemp-poller".into(),
            newly_flagged: vec!["AR".into()],
            cleared: vec![],
            problematic: vec!["AR".into(), "CO".into()],
            timestamp_iso: "2026-01-01T00:00:00Z".into(),
        };
        let body = WebhookBody::from_alert(&alert);
        assert!(body.text.contains("flagged: AR"));
        assert!(body.text.contains("cleared: —"));
        assert!(body.text.contains("AR, CO"));
        assert_eq!(body.newly_flagged, vec!["AR".to_string()]);
    }
}
