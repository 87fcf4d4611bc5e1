//! Global pause marker (C10): presence of a path suppresses all scheduled runs without
//! touching the registry.
use std::path::{Path, PathBuf};

pub struct PauseMarker {
    path: PathBuf,
}

impl PauseMarker {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Derives the marker path from the registry path's parent directory
    /// (spec.md §6: `<ConfigDir>/schedule.disabled`).
    pub fn beside_registry(registry_path: &Path) -> Self {
        let dir = registry_path.parent().unwrap_or_else(|| Path::new("."));
        Self::new(dir.join("schedule.disabled"))
    }

    pub fn is_paused(&self) -> bool {
        self.path.exists()
    }

    pub fn pause(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, b"")
    }

    pub fn resume(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn pause_then_resume_round_trips() {
        let dir = tempdir().unwrap();
        let marker = PauseMarker::new(dir.path().join("schedule.disabled"));
        assert!(!marker.is_paused());
        marker.pause().unwrap();
        assert!(marker.is_paused());
        marker.resume().unwrap();
        assert!(!marker.is_paused());
    }

    #[test]
    fn resume_without_pause_is_noop() {
        let dir = tempdir().unwrap();
        let marker = PauseMarker::new(dir.path().join("schedule.disabled"));
        assert!(marker.resume().is_ok());
    }
}
