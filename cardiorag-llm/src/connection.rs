use std::fmt;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

/// Shared HTTP plumbing for the chat and embedding clients.
#[derive(Clone)]
pub(crate) struct Connection {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<SecretString>,
    timeout: Duration,
}

#[derive(Debug)]
pub(crate) enum HttpFailure {
    Timeout(Duration),
    Transport(String),
    Status { status: u16, message: String },
    Decode(String),
}

impl fmt::Display for HttpFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpFailure::Timeout(limit) => write!(f, "request timed out after {limit:?}"),
            HttpFailure::Transport(message) => write!(f, "transport error: {message}"),
            HttpFailure::Status { status, message } => write!(f, "HTTP {status}: {message}"),
            HttpFailure::Decode(message) => write!(f, "invalid response body: {message}"),
        }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl Connection {
    pub(crate) fn new(
        base_url: Url,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, String> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| err.to_string())?;
        Ok(Self {
            http,
            base_url,
            api_key,
            timeout,
        })
    }

    pub(crate) fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub(crate) async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, HttpFailure>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.http.post(self.endpoint(path)).json(body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await.map_err(|err| self.transport(err))?;
        let status = response.status();
        let text = response.text().await.map_err(|err| self.transport(err))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|envelope| envelope.error.message)
                .unwrap_or(text);
            return Err(HttpFailure::Status {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&text).map_err(|err| HttpFailure::Decode(err.to_string()))
    }

    fn transport(&self, err: reqwest::Error) -> HttpFailure {
        if err.is_timeout() {
            HttpFailure::Timeout(self.timeout)
        } else {
            HttpFailure::Transport(err.to_string())
        }
    }
}

pub(crate) fn parse_base_url(value: &str) -> Result<Url, String> {
    let url = Url::parse(value.trim()).map_err(|err| format!("invalid base url '{value}': {err}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme in base url '{value}'"));
    }
    Ok(url)
}

pub(crate) fn non_empty_secret(value: String) -> Option<SecretString> {
    if value.trim().is_empty() {
        None
    } else {
        Some(SecretString::new(value))
    }
}
