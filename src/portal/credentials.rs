use crate::error::CredentialError;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub identifier: String,
    pub secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Short label for logs
    fn source(&self) -> String;

    async fn credentials(&self) -> Result<Credentials, CredentialError>;
}

/// Reads credentials from two environment variables
pub struct EnvCredentials {
    identifier_var: String,
    secret_var: String,
}

impl EnvCredentials {
    pub fn new(identifier_var: impl Into<String>, secret_var: impl Into<String>) -> Self {
        Self {
            identifier_var: identifier_var.into(),
            secret_var: secret_var.into(),
        }
    }

    fn read(var: &str) -> Result<String, CredentialError> {
        match std::env::var(var) {
            Ok(v) if !v.trim().is_empty() => Ok(v),
            _ => Err(CredentialError::MissingVar(var.to_string())),
        }
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentials {
    fn source(&self) -> String {
        format!("env:{}", self.identifier_var)
    }

    async fn credentials(&self) -> Result<Credentials, CredentialError> {
        Ok(Credentials {
            identifier: Self::read(&self.identifier_var)?,
            secret: Self::read(&self.secret_var)?,
        })
    }
}

/// Reads `{"identifier": .., "secret": ..}` from a JSON file
pub struct FileCredentials {
    path: PathBuf,
}

impl FileCredentials {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CredentialProvider for FileCredentials {
    fn source(&self) -> String {
        format!("file:{}", self.path.display())
    }

    async fn credentials(&self) -> Result<Credentials, CredentialError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| CredentialError::Unreadable {
                path: self.path.clone(),
                source,
            })?;
        let creds: Credentials =
            serde_json::from_str(&raw).map_err(|e| CredentialError::Malformed(e.to_string()))?;
        if creds.identifier.is_empty() || creds.secret.is_empty() {
            return Err(CredentialError::Malformed(
                "identifier and secret must not be empty".to_string(),
            ));
        }
        Ok(creds)
    }
}

/// Tries the primary source, then the fallback
pub struct FallbackCredentials<P, F> {
    primary: P,
    fallback: F,
}

impl<P, F> FallbackCredentials<P, F>
where
    P: CredentialProvider,
    F: CredentialProvider,
{
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl<P, F> CredentialProvider for FallbackCredentials<P, F>
where
    P: CredentialProvider,
    F: CredentialProvider,
{
    fn source(&self) -> String {
        format!("{} -> {}", self.primary.source(), self.fallback.source())
    }

    async fn credentials(&self) -> Result<Credentials, CredentialError> {
        let primary_err = match self.primary.credentials().await {
            Ok(c) => return Ok(c),
            Err(e) => e,
        };
        tracing::warn!(
            "Primary credentials ({}) unavailable: {}; trying {}",
            self.primary.source(),
            primary_err,
            self.fallback.source()
        );
        self.fallback
            .credentials()
            .await
            .map_err(|fallback_err| CredentialError::Exhausted {
                primary: primary_err.to_string(),
                fallback: fallback_err.to_string(),
            })
    }
}
