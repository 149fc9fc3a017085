//! Goodput events from Cloud Logging
//!
//! The tracker writes each event as a structured log entry under the log
//! name `<job>-goodput`. This source queries those entries back inside a
//! lookback window, page by page.
//!
//! # Example
//!
//! ```no_run
//! use goodput::goodput::{CloudLoggingEventSource, EventSource, HttpLogEntriesClient};
//!
//! let source = CloudLoggingEventSource::<HttpLogEntriesClient>::from_env("llama-70b", 7.0, 500)?;
//! let events = source.load_events()?;
//! println!("Got {} events", events.len());
//! # Ok::<(), goodput::goodput::GoodputError>(())
//! ```

use super::event::Event;
use super::loader::{sort_by_timestamp, EventSource};
use super::tracker::log_name_for;
use super::{GoodputError, Result};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Deserialize;

/// Environment variables consulted for an explicit access token, in order
pub const TOKEN_ENV_VARS: [&str; 2] = ["CLOUDSDK_AUTH_ACCESS_TOKEN", "GOOGLE_OAUTH_ACCESS_TOKEN"];

/// Environment variables consulted for the project id, in order
pub const PROJECT_ENV_VARS: [&str; 3] =
    ["GOOGLE_CLOUD_PROJECT", "CLOUDSDK_CORE_PROJECT", "GCLOUD_PROJECT"];

/// OAuth scope needed to list log entries
pub const LOGGING_READ_SCOPE: &str = "https://www.googleapis.com/auth/logging.read";

#[cfg_attr(not(feature = "cloud-logging"), allow(dead_code))]
fn first_env(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

/// One log entry; only structured payloads are goodput events
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    #[serde(default)]
    pub json_payload: Option<serde_json::Value>,
}

/// One page of a log query
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntriesPage {
    #[serde(default)]
    pub entries: Vec<LogEntry>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Paged log query transport
pub trait LogEntriesClient {
    fn list_entries(
        &self,
        project_id: &str,
        filter: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<EntriesPage>;
}

/// Event source backed by a log query
pub struct CloudLoggingEventSource<C: LogEntriesClient> {
    client: C,
    project_id: String,
    log_name: String,
    lookback_days: f64,
    page_size: u32,
}

impl<C: LogEntriesClient> CloudLoggingEventSource<C> {
    /// Create a source querying through `client`
    pub fn with_client(
        client: C,
        project_id: impl Into<String>,
        job_name: &str,
        lookback_days: f64,
        page_size: u32,
    ) -> Self {
        let project_id = project_id.into();
        tracing::info!(project_id = %project_id, "Using Cloud Logging");
        Self {
            client,
            project_id,
            log_name: log_name_for(job_name),
            lookback_days,
            page_size,
        }
    }

    /// Query filter for entries newer than `now - lookback`
    ///
    /// Fails with [`GoodputError::Query`] when the window reaches outside
    /// the representable date range.
    pub fn filter(&self, now: DateTime<Utc>) -> Result<String> {
        let out_of_range = || {
            GoodputError::Query(format!(
                "lookback of {} days is out of range",
                self.lookback_days
            ))
        };
        let lookback_ms = self.lookback_days * 86_400_000.0;
        if !(lookback_ms.is_finite() && lookback_ms >= 0.0 && lookback_ms < i64::MAX as f64) {
            return Err(out_of_range());
        }
        let lookback = Duration::try_milliseconds(lookback_ms as i64).ok_or_else(out_of_range)?;
        let since = now.checked_sub_signed(lookback).ok_or_else(out_of_range)?;

        Ok(format!(
            "severity>=INFO AND logName=\"projects/{}/logs/{}\" AND timestamp>\"{}\"",
            self.project_id,
            self.log_name,
            since.to_rfc3339_opts(SecondsFormat::Micros, true)
        ))
    }

    fn fetch(&self, filter: &str, events: &mut Vec<Event>) -> Result<()> {
        let mut page_token: Option<String> = None;
        loop {
            let page = self.client.list_entries(
                &self.project_id,
                filter,
                self.page_size,
                page_token.as_deref(),
            )?;

            for entry in page.entries {
                let Some(payload) = entry.json_payload else {
                    continue;
                };
                match serde_json::from_value::<Event>(payload) {
                    Ok(event) => events.push(event),
                    Err(e) => tracing::warn!(error = %e, "Skipping malformed log entry"),
                }
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => return Ok(()),
            }
        }
    }
}

impl<C: LogEntriesClient> EventSource for CloudLoggingEventSource<C> {
    /// Query failures are logged; events fetched before the failure are
    /// still returned.
    fn load_events(&self) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        let fetched = self.filter(Utc::now()).and_then(|filter| {
            tracing::info!(filter = %filter, "Fetching logs");
            self.fetch(&filter, &mut events)
        });
        if let Err(e) = fetched {
            tracing::error!(error = %e, fetched = events.len(), "Failed to fetch logs from Cloud Logging");
        }

        sort_by_timestamp(&mut events);
        tracing::info!(count = events.len(), "Loaded events");
        Ok(events)
    }

    fn describe(&self) -> String {
        format!("logName=projects/{}/logs/{}", self.project_id, self.log_name)
    }
}

#[cfg(feature = "cloud-logging")]
pub use http::{AccessToken, AdcTokenProvider, Credentials, HttpLogEntriesClient};

#[cfg(feature = "cloud-logging")]
mod http {
    use super::{
        first_env, EntriesPage, LogEntriesClient, LOGGING_READ_SCOPE, PROJECT_ENV_VARS,
        TOKEN_ENV_VARS,
    };
    use crate::goodput::{GoodputError, Result};
    use std::sync::Arc;

    const ENTRIES_LIST_URL: &str = "https://logging.googleapis.com/v2/entries:list";

    /// Application default credentials
    ///
    /// Owns a small tokio runtime so the async provider can be driven from
    /// the synchronous calculator.
    pub struct AdcTokenProvider {
        runtime: tokio::runtime::Runtime,
        provider: Arc<dyn gcp_auth::TokenProvider>,
    }

    impl AdcTokenProvider {
        /// Find application default credentials
        ///
        /// Tries the service-account file named by
        /// `GOOGLE_APPLICATION_CREDENTIALS`, the gcloud user credentials, the
        /// GCE/GKE metadata server, and finally the gcloud CLI.
        pub fn resolve() -> Result<Self> {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| {
                    GoodputError::CredentialsUnavailable(format!(
                        "failed to start auth runtime: {}",
                        e
                    ))
                })?;

            let provider = runtime
                .block_on(gcp_auth::provider())
                .map_err(|e| GoodputError::CredentialsUnavailable(e.to_string()))?;

            Ok(Self { runtime, provider })
        }

        /// A currently valid access token; the provider caches and refreshes
        pub fn token(&self) -> Result<String> {
            let token = self
                .runtime
                .block_on(self.provider.token(&[LOGGING_READ_SCOPE]))
                .map_err(|e| GoodputError::Query(format!("failed to refresh access token: {}", e)))?;
            Ok(token.as_str().to_string())
        }

        /// Project the credentials belong to
        pub fn project_id(&self) -> Result<String> {
            self.runtime
                .block_on(self.provider.project_id())
                .map(|id| id.to_string())
                .map_err(|e| {
                    GoodputError::CredentialsUnavailable(format!("no project id: {}", e))
                })
        }
    }

    /// Bearer token source for the logging API
    pub enum AccessToken {
        /// Taken verbatim from [`TOKEN_ENV_VARS`]
        Static(String),
        Adc(AdcTokenProvider),
    }

    impl AccessToken {
        fn bearer(&self) -> Result<String> {
            match self {
                AccessToken::Static(token) => Ok(token.clone()),
                AccessToken::Adc(provider) => provider.token(),
            }
        }
    }

    impl std::fmt::Debug for AccessToken {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                AccessToken::Static(_) => f.write_str("Static(<redacted>)"),
                AccessToken::Adc(_) => f.write_str("Adc"),
            }
        }
    }

    /// Resolved credentials for the logging API
    #[derive(Debug)]
    pub struct Credentials {
        pub project_id: String,
        pub token: AccessToken,
    }

    impl Credentials {
        /// Resolve ambient credentials
        ///
        /// An access token in [`TOKEN_ENV_VARS`] is used as-is; otherwise
        /// application default credentials supply the token. The project
        /// comes from [`PROJECT_ENV_VARS`], falling back to the ADC project.
        /// Fails with [`GoodputError::CredentialsUnavailable`] when either
        /// part cannot be found.
        pub fn resolve() -> Result<Self> {
            let env_token = first_env(&TOKEN_ENV_VARS);
            let env_project = first_env(&PROJECT_ENV_VARS);

            if let (Some(token), Some(project_id)) = (&env_token, &env_project) {
                return Ok(Self {
                    project_id: project_id.clone(),
                    token: AccessToken::Static(token.clone()),
                });
            }

            tracing::debug!("Resolving application default credentials");
            let adc = AdcTokenProvider::resolve()?;
            let project_id = match env_project {
                Some(project_id) => project_id,
                None => adc.project_id()?,
            };
            let token = match env_token {
                Some(token) => AccessToken::Static(token),
                None => AccessToken::Adc(adc),
            };

            Ok(Self { project_id, token })
        }
    }

    /// `entries:list` over HTTPS with a bearer token
    pub struct HttpLogEntriesClient {
        http: reqwest::blocking::Client,
        token: AccessToken,
    }

    impl HttpLogEntriesClient {
        /// Create a client authenticating with `token`
        pub fn new(token: AccessToken) -> Result<Self> {
            let http = reqwest::blocking::Client::builder()
                .build()
                .map_err(|e| GoodputError::CredentialsUnavailable(e.to_string()))?;
            Ok(Self { http, token })
        }
    }

    impl LogEntriesClient for HttpLogEntriesClient {
        fn list_entries(
            &self,
            project_id: &str,
            filter: &str,
            page_size: u32,
            page_token: Option<&str>,
        ) -> Result<EntriesPage> {
            let mut body = serde_json::json!({
                "resourceNames": [format!("projects/{}", project_id)],
                "filter": filter,
                "orderBy": "timestamp asc",
                "pageSize": page_size,
            });
            if let Some(token) = page_token {
                body["pageToken"] = serde_json::Value::String(token.to_string());
            }

            let response = self
                .http
                .post(ENTRIES_LIST_URL)
                .bearer_auth(self.token.bearer()?)
                .json(&body)
                .send()
                .map_err(|e| GoodputError::Query(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let text = response.text().unwrap_or_default();
                return Err(GoodputError::Query(format!("HTTP {}: {}", status, text)));
            }

            response
                .json::<EntriesPage>()
                .map_err(|e| GoodputError::Query(e.to_string()))
        }
    }
}

#[cfg(feature = "cloud-logging")]
impl CloudLoggingEventSource<HttpLogEntriesClient> {
    /// Resolve ambient credentials and build the HTTPS source
    ///
    /// Fails with [`GoodputError::CredentialsUnavailable`] before any query
    /// is issued when credentials cannot be found.
    pub fn from_env(job_name: &str, lookback_days: f64, page_size: u32) -> Result<Self> {
        let credentials = Credentials::resolve().map_err(|e| {
            tracing::error!(error = %e, "Failed to initialize Cloud Logging");
            e
        })?;
        tracing::debug!(credentials = ?credentials, "Resolved Cloud Logging credentials");
        let client = HttpLogEntriesClient::new(credentials.token)?;
        Ok(Self::with_client(
            client,
            credentials.project_id,
            job_name,
            lookback_days,
            page_size,
        ))
    }
}

// Stub constructor when the HTTPS client is not compiled in
#[cfg(not(feature = "cloud-logging"))]
pub struct HttpLogEntriesClient;

#[cfg(not(feature = "cloud-logging"))]
impl LogEntriesClient for HttpLogEntriesClient {
    fn list_entries(&self, _: &str, _: &str, _: u32, _: Option<&str>) -> Result<EntriesPage> {
        Err(GoodputError::RemoteUnsupported)
    }
}

#[cfg(not(feature = "cloud-logging"))]
impl CloudLoggingEventSource<HttpLogEntriesClient> {
    /// Always fails: the HTTPS client is not compiled in
    pub fn from_env(_job_name: &str, _lookback_days: f64, _page_size: u32) -> Result<Self> {
        Err(GoodputError::RemoteUnsupported)
    }
}
