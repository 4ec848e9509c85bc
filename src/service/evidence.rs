use crate::models::Stage;
use crate::portal::ClaimPortal;
use chrono::Utc;
use std::path::PathBuf;
use std::time::Duration;

/// Best-effort page snapshots taken when a claim attempt fails
#[derive(Debug, Clone)]
pub struct EvidenceCapture {
    dir: PathBuf,
    timeout: Duration,
}

impl EvidenceCapture {
    pub fn new(dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            timeout,
        }
    }

    /// Snapshot the current page, tagged with the failing stage.
    /// Never fails: problems are logged and `None` is returned.
    pub async fn capture<P>(&self, portal: &mut P, match_ref: &str, stage: Stage) -> Option<PathBuf>
    where
        P: ClaimPortal,
    {
        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            tracing::warn!("Cannot create evidence dir {}: {}", self.dir.display(), e);
            return None;
        }

        let path = self.dir.join(format!(
            "failure-{}-{}-{}.png",
            stage.tag(),
            sanitize(match_ref),
            Utc::now().timestamp_millis()
        ));

        match tokio::time::timeout(self.timeout, portal.snapshot(&path)).await {
            Ok(Ok(())) => {
                if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    tracing::info!("No failure evidence written for {}", match_ref);
                    return None;
                }
                tracing::info!("Failure evidence for {} saved to {}", match_ref, path.display());
                Some(path)
            }
            Ok(Err(e)) => {
                tracing::warn!("Evidence capture for {} failed: {}", match_ref, e);
                None
            }
            Err(_) => {
                tracing::warn!("Evidence capture for {} timed out after {:?}", match_ref, self.timeout);
                None
            }
        }
    }
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::DryRunPortal;

    #[test]
    fn match_refs_are_sanitized() {
        assert_eq!(sanitize("R-1:T/2 x"), "R-1_T_2_x");
    }

    #[tokio::test]
    async fn dry_run_capture_yields_no_path() {
        let dir = tempfile::tempdir().unwrap();
        let capture = EvidenceCapture::new(dir.path().join("evidence"), Duration::from_secs(5));
        let mut portal = DryRunPortal::new();

        let path = capture.capture(&mut portal, "R1:T1", Stage::Submit).await;
        assert!(path.is_none());
        assert!(dir.path().join("evidence").is_dir());
        assert_eq!(portal.actions().len(), 1);
        assert!(portal.actions()[0].contains("failure-submit-R1_T1-"));
    }
}
