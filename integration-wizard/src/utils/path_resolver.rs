use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::config::WizardSettings;

pub const LOG_FOLDER_NAME: &str = "wizard_logs";

/// Resolve log folder (absolute path), creating it when needed.
///
/// Order: configured `log_dir`, an existing `wizard_logs/` in the CWD or any
/// ancestor, then `<data dir>/integration-wizard/logs`.
pub fn resolve_log_folder(settings: &WizardSettings) -> Result<PathBuf> {
    if let Some(dir) = settings.log_dir.as_ref() {
        return ensure_dir(dir.clone());
    }

    if let Ok(cwd) = std::env::current_dir() {
        if let Some(found) = find_log_folder_from(&cwd) {
            return Ok(found);
        }
    }

    let base = dirs::data_dir()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));
    ensure_dir(base.join("integration-wizard").join("logs"))
}

/// Walk up from `start` looking for an existing `wizard_logs/` directory.
pub fn find_log_folder_from(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    for _ in 0..12 {
        let current = dir?;
        let candidate = current.join(LOG_FOLDER_NAME);
        if candidate.is_dir() {
            return Some(candidate);
        }
        dir = current.parent();
    }
    None
}

fn ensure_dir(dir: PathBuf) -> Result<PathBuf> {
    std::fs::create_dir_all(&dir)
        .map_err(|e| anyhow::anyhow!("Failed to create log folder {:?}: {}", dir, e))?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_dir_wins_and_is_created() {
        let tmp = tempfile::tempdir().unwrap();
        let wanted = tmp.path().join("nested").join("logs");
        let settings = WizardSettings {
            log_dir: Some(wanted.clone()),
            ..WizardSettings::default()
        };
        let resolved = resolve_log_folder(&settings).unwrap();
        assert_eq!(resolved, wanted);
        assert!(wanted.is_dir());
    }

    #[test]
    fn walks_up_to_existing_log_folder() {
        let tmp = tempfile::tempdir().unwrap();
        let logs = tmp.path().join(LOG_FOLDER_NAME);
        std::fs::create_dir_all(&logs).unwrap();
        let deep = tmp.path().join("a").join("b").join("c");
        std::fs::create_dir_all(&deep).unwrap();

        assert_eq!(find_log_folder_from(&deep), Some(logs));
    }

    #[test]
    fn plain_file_named_like_the_folder_is_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(LOG_FOLDER_NAME), b"").unwrap();
        let found = find_log_folder_from(tmp.path());
        assert_ne!(found, Some(tmp.path().join(LOG_FOLDER_NAME)));
    }
}
