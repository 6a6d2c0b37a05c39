//! Google Calendar provider configuration.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// OAuth 2.0 client credentials registered in Google Cloud Console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl OAuthCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Checks that the credentials look like Google OAuth client credentials.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.client_id.is_empty() {
            return Err("client_id is required");
        }
        if !self.client_id.ends_with(".apps.googleusercontent.com") {
            return Err("client_id should end with .apps.googleusercontent.com");
        }
        if self.client_secret.is_empty() {
            return Err("client_secret is required");
        }
        Ok(())
    }
}

/// A service-account key, as downloaded from Cloud Console.
///
/// The calendar must be shared with `client_email`.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceAccountKey {
    pub client_email: String,
    /// PEM-encoded RSA private key.
    pub private_key: String,
    pub private_key_id: Option<String>,
    /// Endpoint the signed assertion is exchanged at.
    pub token_uri: String,
}

impl ServiceAccountKey {
    pub fn new(client_email: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            client_email: client_email.into(),
            private_key: private_key.into(),
            private_key_id: None,
            token_uri: GoogleConfig::DEFAULT_TOKEN_URL.to_string(),
        }
    }

    pub fn with_token_uri(mut self, token_uri: impl Into<String>) -> Self {
        self.token_uri = token_uri.into();
        self
    }

    fn validate(&self) -> Result<(), String> {
        if !self.client_email.contains('@') {
            return Err(format!(
                "service account client_email '{}' is not an email address",
                self.client_email
            ));
        }
        if self.token_uri.is_empty() {
            return Err("service account token_uri is empty".to_string());
        }
        jsonwebtoken::EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .map_err(|e| format!("invalid service account private key: {}", e))?;
        Ok(())
    }
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

/// Structure of a Google credentials JSON file.
///
/// Accepts `service_account` keys, the `authorized_user` format written by
/// `gcloud auth application-default login`, and the Cloud Console client
/// format (`installed` or `web` section) with a `refresh_token` added at the
/// root.
#[derive(Debug, Deserialize)]
struct CredentialsFile {
    #[serde(rename = "type")]
    kind: Option<String>,
    installed: Option<NestedCredentials>,
    web: Option<NestedCredentials>,
    client_id: Option<String>,
    client_secret: Option<String>,
    refresh_token: Option<String>,
    client_email: Option<String>,
    private_key: Option<String>,
    private_key_id: Option<String>,
    token_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NestedCredentials {
    client_id: String,
    client_secret: String,
}

/// How the provider obtains access tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoogleAuth {
    /// Long-lived refresh token exchanged for access tokens as they expire.
    RefreshToken {
        credentials: OAuthCredentials,
        refresh_token: String,
    },
    /// Service-account key; each access token is obtained with a freshly
    /// signed JWT assertion.
    ServiceAccount(ServiceAccountKey),
    /// A pre-issued access token used as-is until it is rejected.
    AccessToken(String),
}

impl GoogleAuth {
    /// Loads credentials from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read credentials file {}: {}", path.display(), e))?;
        Self::from_json(&content)
    }

    /// Parses a credentials JSON string.
    pub fn from_json(json: &str) -> Result<Self, String> {
        let file: CredentialsFile = serde_json::from_str(json)
            .map_err(|e| format!("failed to parse credentials JSON: {}", e))?;

        if file.kind.as_deref() == Some("service_account") {
            let required = |name: &str, value: Option<String>| {
                value
                    .filter(|v| !v.is_empty())
                    .ok_or_else(|| format!("service account key has no {}", name))
            };
            return Ok(Self::ServiceAccount(ServiceAccountKey {
                client_email: required("client_email", file.client_email)?,
                private_key: required("private_key", file.private_key)?,
                private_key_id: file.private_key_id,
                token_uri: file
                    .token_uri
                    .unwrap_or_else(|| GoogleConfig::DEFAULT_TOKEN_URL.to_string()),
            }));
        }

        let credentials = match (file.installed.or(file.web), file.client_id, file.client_secret) {
            (Some(nested), _, _) => OAuthCredentials::new(nested.client_id, nested.client_secret),
            (None, Some(id), Some(secret)) => OAuthCredentials::new(id, secret),
            _ => {
                return Err(
                    "credentials must contain client_id and client_secret, at the root or in an 'installed'/'web' section"
                        .to_string(),
                );
            }
        };

        let refresh_token = file
            .refresh_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| "credentials file has no refresh_token".to_string())?;

        Ok(Self::RefreshToken {
            credentials,
            refresh_token,
        })
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            Self::RefreshToken {
                credentials,
                refresh_token,
            } => {
                credentials
                    .validate()
                    .map_err(|e| format!("invalid credentials: {}", e))?;
                if refresh_token.is_empty() {
                    return Err("refresh token is empty".to_string());
                }
                Ok(())
            }
            Self::ServiceAccount(key) => key.validate(),
            Self::AccessToken(token) if token.is_empty() => {
                Err("access token is empty".to_string())
            }
            Self::AccessToken(_) => Ok(()),
        }
    }
}

/// Configuration for the Google Calendar provider.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub auth: GoogleAuth,

    /// Account label used in logs and error messages.
    pub account_name: String,

    /// Where refreshed access tokens are cached between runs.
    ///
    /// When unset, tokens only live for the lifetime of the process.
    pub token_path: Option<PathBuf>,

    /// Per-request HTTP timeout.
    pub timeout: Duration,

    pub user_agent: String,

    /// Base URL of the Calendar v3 API. Overridden in tests.
    pub api_base: String,

    /// OAuth token endpoint. Overridden in tests.
    pub token_url: String,
}

impl GoogleConfig {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
    pub const DEFAULT_API_BASE: &'static str = "https://www.googleapis.com/calendar/v3";
    pub const DEFAULT_TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";

    pub fn new(auth: GoogleAuth) -> Self {
        Self {
            auth,
            account_name: "default".to_string(),
            token_path: None,
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("calsync/{}", env!("CARGO_PKG_VERSION")),
            api_base: Self::DEFAULT_API_BASE.to_string(),
            token_url: Self::DEFAULT_TOKEN_URL.to_string(),
        }
    }

    /// Returns the default token cache path for an account.
    pub fn default_token_path(data_dir: &Path, account_name: &str) -> PathBuf {
        data_dir.join(format!("google-tokens-{}.json", account_name))
    }

    pub fn with_account_name(mut self, name: impl Into<String>) -> Self {
        self.account_name = name.into();
        self
    }

    /// Returns the provider name for this account (e.g. `"google:work"`).
    pub fn provider_name(&self) -> String {
        format!("google:{}", self.account_name)
    }

    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = Some(path.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.auth.validate()?;
        if self.timeout.is_zero() {
            return Err("timeout must be greater than zero".to_string());
        }
        if self.api_base.is_empty() {
            return Err("api base URL is empty".to_string());
        }
        Ok(())
    }
}
