use std::fmt;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::{Neo4jClient, Neo4jError};

const DEFAULT_DATABASE: &str = "neo4j";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Default, Clone)]
pub struct Neo4jStoreBuilder {
    uri: Option<String>,
    user: Option<String>,
    password: Option<SecretString>,
    database: Option<String>,
    timeout: Option<Duration>,
}

impl fmt::Debug for Neo4jStoreBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let password = if self.password.is_some() {
            "<redacted>"
        } else {
            "<none>"
        };

        f.debug_struct("Neo4jStoreBuilder")
            .field("uri", &self.uri)
            .field("user", &self.user)
            .field("password", &password)
            .field("database", &self.database)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Neo4jStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// HTTP(S) address of the server, e.g. `http://localhost:7474`.
    pub fn uri(mut self, value: impl Into<String>) -> Self {
        self.uri = Some(value.into());
        self
    }

    pub fn user(mut self, value: impl Into<String>) -> Self {
        let value = value.into();
        self.user = if value.trim().is_empty() {
            None
        } else {
            Some(value)
        };
        self
    }

    pub fn password(mut self, value: impl Into<String>) -> Self {
        let value = value.into();
        self.password = if value.is_empty() {
            None
        } else {
            Some(SecretString::new(value))
        };
        self
    }

    pub fn database(mut self, value: impl Into<String>) -> Self {
        self.database = Some(value.into());
        self
    }

    pub fn timeout(mut self, value: Duration) -> Self {
        self.timeout = Some(value);
        self
    }

    pub fn build(self) -> Result<Neo4jClient, Neo4jError> {
        let raw = self.uri.ok_or(Neo4jError::MissingUri)?;
        let base_url = parse_http_uri(&raw)?;

        let database = self.database.unwrap_or_else(|| DEFAULT_DATABASE.to_string());
        if database.trim().is_empty() {
            return Err(Neo4jError::EmptyDatabase);
        }

        if self.user.is_some() != self.password.is_some() {
            tracing::warn!(
                uri = %base_url,
                "neo4j user and password should be set together; requests may be rejected"
            );
        }

        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Neo4jClient {
            http,
            base_url,
            database,
            user: self.user,
            password: self.password,
            timeout,
        })
    }
}

fn parse_http_uri(raw: &str) -> Result<Url, Neo4jError> {
    let url = Url::parse(raw.trim())
        .map_err(|err| Neo4jError::InvalidUri(format!("invalid neo4j uri '{raw}': {err}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme if scheme.starts_with("bolt") || scheme.starts_with("neo4j") => {
            Err(Neo4jError::InvalidUri(format!(
                "'{raw}' is a bolt address; use the HTTP endpoint (port 7474, or https for Aura)"
            )))
        }
        other => Err(Neo4jError::InvalidUri(format!(
            "unsupported scheme '{other}' in neo4j uri '{raw}'"
        ))),
    }
}
