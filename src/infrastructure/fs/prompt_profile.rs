use std::path::Path;

use tracing::{debug, info};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{JudgeKind, JudgeProfile, BUILTIN_PROFILE};

/// Resolve a judge profile by version.
///
/// `builtin` returns the compiled-in templates. Any other version reads
/// `<prompts_dir>/<version>/<judge>.txt` for each judge that has a built-in
/// template; judges without a file keep the built-in text. A version whose
/// directory is missing is an error so a typo never silently falls back.
pub async fn load_profile(prompts_dir: &Path, version: &str) -> DomainResult<JudgeProfile> {
    let mut profile = JudgeProfile::builtin();
    if version == BUILTIN_PROFILE {
        return Ok(profile);
    }

    let dir = prompts_dir.join(version);
    if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
        return Err(DomainError::JudgeProfile(format!(
            "profile {version} not found under {}",
            prompts_dir.display()
        )));
    }

    let mut overridden = 0usize;
    let kinds: Vec<JudgeKind> = profile.templates.keys().copied().collect();
    for kind in kinds {
        let path = dir.join(format!("{}.txt", kind.as_str()));
        match tokio::fs::read_to_string(&path).await {
            Ok(text) if !text.trim().is_empty() => {
                profile.templates.insert(kind, text);
                overridden += 1;
            }
            Ok(_) => debug!(judge = %kind, "empty template file, keeping built-in"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(judge = %kind, "no template file, keeping built-in");
            }
            Err(e) => {
                return Err(DomainError::JudgeProfile(format!("{}: {e}", path.display())));
            }
        }
    }

    profile.version = version.to_string();
    info!(version, overridden, "judge profile resolved");
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builtin_needs_no_directory() {
        let profile = load_profile(Path::new("/nonexistent"), "builtin").await.unwrap();
        assert_eq!(profile, JudgeProfile::builtin());
    }

    #[tokio::test]
    async fn test_named_version_overrides_some_judges() {
        let dir = tempfile::tempdir().unwrap();
        let version_dir = dir.path().join("v2");
        std::fs::create_dir_all(&version_dir).unwrap();
        std::fs::write(
            version_dir.join("completeness.txt"),
            "Is anything missing? {question}",
        )
        .unwrap();

        let profile = load_profile(dir.path(), "v2").await.unwrap();
        assert_eq!(profile.version, "v2");
        assert_eq!(
            profile.template(JudgeKind::Completeness),
            Some("Is anything missing? {question}")
        );
        assert_eq!(
            profile.template(JudgeKind::Arbiter),
            JudgeProfile::builtin().template(JudgeKind::Arbiter)
        );
    }

    #[tokio::test]
    async fn test_unknown_version_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_profile(dir.path(), "v9").await.unwrap_err();
        assert!(matches!(err, DomainError::JudgeProfile(msg) if msg.contains("v9")));
    }
}
