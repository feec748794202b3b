//! Cross-request cache collaborator, keyed by content hash. Reads are
//! consulted once per request; writes are best-effort and never fail the
//! request.

use std::time::Duration;

use auscult_analysis::report::Report;
use log::{debug, warn};

use crate::config::Settings;

pub struct CacheClient {
    base: String,
    agent: ureq::Agent,
}

impl CacheClient {
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        Self {
            base: settings.cache_base.trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(settings.http_timeout_secs.min(5)))
                .build(),
        }
    }

    /// Look up a prior report; any failure (including 404) is a miss.
    #[must_use]
    pub fn get(&self, hash: &str, auth: Option<&str>) -> Option<Report> {
        let url = format!("{}/cache/{hash}", self.base);
        let mut request = self.agent.get(&url);
        if let Some(header) = auth {
            request = request.set("Authorization", header);
        }
        let response = match request.call() {
            Ok(r) => r,
            Err(ureq::Error::Status(404, _)) => return None,
            Err(e) => {
                debug!("cache lookup failed for {hash}: {e}");
                return None;
            }
        };
        let value: serde_json::Value = match response.into_json() {
            Ok(v) => v,
            Err(e) => {
                warn!("cache returned malformed JSON for {hash}: {e}");
                return None;
            }
        };
        match serde_json::from_value(value.get("adv")?.clone()) {
            Ok(report) => Some(report),
            Err(e) => {
                warn!("cached report for {hash} does not parse: {e}");
                None
            }
        }
    }

    /// Store a report; failures are logged and swallowed.
    pub fn put(&self, hash: &str, report: &Report, auth: Option<&str>) {
        let url = format!("{}/cache", self.base);
        let mut request = self.agent.post(&url);
        if let Some(header) = auth {
            request = request.set("Authorization", header);
        }
        let body = serde_json::json!({ "hash": hash, "adv": report });
        if let Err(e) = request.send_json(body) {
            warn!("cache store failed for {hash}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auscult_analysis::{PcgSignal, SAMPLE_RATE, analyze};

    fn unreachable_client() -> CacheClient {
        CacheClient::new(&Settings {
            cache_base: "http://127.0.0.1:1".into(),
            http_timeout_secs: 1,
            ..Settings::default()
        })
    }

    #[test]
    fn test_unreachable_cache_is_a_miss() {
        let client = unreachable_client();
        assert!(client.get("0123456789abcdef0123456789abcdef", None).is_none());
    }

    #[test]
    fn test_unreachable_store_is_swallowed() {
        let client = unreachable_client();
        let signal = PcgSignal::new(vec![0.01f32; 2 * SAMPLE_RATE as usize], SAMPLE_RATE);
        let report = analyze(&signal, false).unwrap();
        // must not panic or error
        client.put("0123456789abcdef0123456789abcdef", &report, Some("Bearer t"));
    }
}
