//! Attachment downloads from the messaging provider.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use logging::redact_sensitive_data;
use meterline_core::{MediaFetcher, MeterError, MeterResult};
use reqwest::Client;
use tracing::info;

/// Per-request download timeout.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Basic-auth credentials for provider-hosted media.
#[derive(Debug, Clone)]
pub struct MediaCredentials {
    pub account_sid: String,
    pub auth_token: String,
}

impl MediaCredentials {
    /// Both halves are required; a lone SID or token is treated as none.
    pub fn from_parts(account_sid: Option<String>, auth_token: Option<String>) -> Option<Self> {
        match (account_sid, auth_token) {
            (Some(account_sid), Some(auth_token))
                if !account_sid.is_empty() && !auth_token.is_empty() =>
            {
                Some(Self {
                    account_sid,
                    auth_token,
                })
            }
            _ => None,
        }
    }
}

/// Fetches media URLs over HTTP.
pub struct HttpMediaFetcher {
    http: Client,
    credentials: Option<MediaCredentials>,
}

impl HttpMediaFetcher {
    pub fn new(credentials: Option<MediaCredentials>) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .context("Failed to build media download client")?;
        Ok(Self { http, credentials })
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn fetch(&self, url: &str) -> MeterResult<Bytes> {
        info!(url = %redact_sensitive_data(url), "Downloading media");
        let mut request = self.http.get(url);
        if let Some(creds) = &self.credentials {
            request = request.basic_auth(&creds.account_sid, Some(&creds.auth_token));
        }

        let resp = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| MeterError::Download(redact_sensitive_data(&e.to_string())))?;
        resp.bytes()
            .await
            .map_err(|e| MeterError::Download(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_need_both_parts() {
        assert!(MediaCredentials::from_parts(Some("AC1".into()), Some("tok".into())).is_some());
        assert!(MediaCredentials::from_parts(Some("AC1".into()), None).is_none());
        assert!(MediaCredentials::from_parts(Some("AC1".into()), Some(String::new())).is_none());
    }

    #[test]
    fn fetcher_reports_auth_mode() {
        let creds = MediaCredentials::from_parts(Some("AC1".into()), Some("tok".into()));
        assert!(HttpMediaFetcher::new(creds).unwrap().is_authenticated());
        assert!(!HttpMediaFetcher::new(None).unwrap().is_authenticated());
    }

    #[tokio::test]
    async fn unreachable_host_is_download_error() {
        let fetcher = HttpMediaFetcher::new(None).unwrap();
        let err = fetcher.fetch("http://127.0.0.1:9/media.jpg").await.unwrap_err();
        assert!(matches!(err, MeterError::Download(_)));
    }
}
