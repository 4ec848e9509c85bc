use super::{ClaimField, ClaimPortal, Credentials, Located, Target};
use crate::error::PortalError;
use async_trait::async_trait;
use std::path::Path;

/// Walks the whole workflow without contacting the platform.
///
/// Submit answers with text that carries neither a success nor a failure
/// signal, so every claim ends as "confirmation pending".
#[derive(Debug, Default)]
pub struct DryRunPortal {
    actions: Vec<String>,
}

impl DryRunPortal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything the run would have done, in order
    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    fn record(&mut self, action: String) -> Located {
        tracing::info!("[dry-run] {}", action);
        self.actions.push(action);
        Located::by("dry-run")
    }
}

#[async_trait]
impl ClaimPortal for DryRunPortal {
    async fn establish_session(&mut self, credentials: &Credentials) -> Result<(), PortalError> {
        tracing::debug!("[dry-run] account {}", credentials.identifier);
        self.record("sign in".to_string());
        Ok(())
    }

    async fn locate(&mut self, target: &Target) -> Result<Located, PortalError> {
        Ok(self.record(format!("locate {target}")))
    }

    async fn fill(&mut self, field: ClaimField, value: &str) -> Result<Located, PortalError> {
        Ok(self.record(format!("fill {field} = {value}")))
    }

    async fn upload(&mut self, path: &Path) -> Result<Located, PortalError> {
        Ok(self.record(format!("upload {}", path.display())))
    }

    async fn submit(&mut self) -> Result<String, PortalError> {
        self.record("submit".to_string());
        Ok("Dry run: nothing was sent to the platform".to_string())
    }

    async fn snapshot(&mut self, dest: &Path) -> Result<(), PortalError> {
        self.record(format!("snapshot {}", dest.display()));
        Ok(())
    }
}
