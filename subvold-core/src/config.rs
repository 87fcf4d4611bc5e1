//! Configuration surface (C11). Each field is read from the environment, then an
//! optional TOML file, then a hardcoded default (spec.md §6), resolved field-by-field so
//! an *unset* env var truly falls through instead of a present-but-empty one winning.
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub volumes_path: PathBuf,
    pub snapshots_path: PathBuf,
    pub test_remote_path: PathBuf,
    pub schedule_path: PathBuf,
    pub socket_path: PathBuf,
    pub timer_secs: u64,
    pub dtformat: String,
    pub log_level: String,
    pub ssh_port: u16,
}

/// Mirrors the subset of `DriverConfig` that may appear in the environment, via `envy`.
#[derive(Debug, Default, Deserialize)]
struct EnvLayer {
    #[serde(rename = "volumes_path")]
    volumes_path: Option<PathBuf>,
    #[serde(rename = "snapshots_path")]
    snapshots_path: Option<PathBuf>,
    #[serde(rename = "test_remote_path")]
    test_remote_path: Option<PathBuf>,
    #[serde(rename = "schedule")]
    schedule_path: Option<PathBuf>,
    #[serde(rename = "socket")]
    socket_path: Option<PathBuf>,
    #[serde(rename = "timer")]
    timer_secs: Option<u64>,
    #[serde(rename = "dtformat")]
    dtformat: Option<String>,
    #[serde(rename = "loglevel")]
    log_level: Option<String>,
    #[serde(rename = "ssh_port")]
    ssh_port: Option<u16>,
}

/// Same shape for the optional TOML file layer.
#[derive(Debug, Default, Deserialize)]
struct FileLayer {
    volumes_path: Option<PathBuf>,
    snapshots_path: Option<PathBuf>,
    test_remote_path: Option<PathBuf>,
    schedule_path: Option<PathBuf>,
    socket_path: Option<PathBuf>,
    timer_secs: Option<u64>,
    dtformat: Option<String>,
    log_level: Option<String>,
    ssh_port: Option<u16>,
}

impl DriverConfig {
    /// Loads the env layer, then reads `config_file` if present (`CONFIG_FILE` env var,
    /// default `/etc/subvold/subvold.toml`), then falls back to hardcoded defaults.
    pub fn load() -> Self {
        let config_file = std::env::var("CONFIG_FILE")
            .unwrap_or_else(|_| "/etc/subvold/subvold.toml".to_string());
        Self::load_from(Path::new(&config_file))
    }

    pub fn load_from(config_file: &Path) -> Self {
        let env_layer: EnvLayer = envy::from_env().unwrap_or_default();
        let file_layer: FileLayer = std::fs::read_to_string(config_file)
            .ok()
            .and_then(|s| toml::from_str(&s).ok())
            .unwrap_or_default();

        Self {
            volumes_path: env_layer
                .volumes_path
                .or(file_layer.volumes_path)
                .unwrap_or_else(|| PathBuf::from("/var/lib/docker/volumes")),
            snapshots_path: env_layer
                .snapshots_path
                .or(file_layer.snapshots_path)
                .unwrap_or_else(|| PathBuf::from("/var/lib/subvold/snapshots")),
            test_remote_path: env_layer
                .test_remote_path
                .or(file_layer.test_remote_path)
                .unwrap_or_else(|| PathBuf::from("/var/lib/subvold/test-remote")),
            schedule_path: env_layer
                .schedule_path
                .or(file_layer.schedule_path)
                .unwrap_or_else(|| PathBuf::from("/etc/subvold/schedule.csv")),
            socket_path: env_layer
                .socket_path
                .or(file_layer.socket_path)
                .unwrap_or_else(|| PathBuf::from("/run/docker/plugins/subvold.sock")),
            timer_secs: env_layer.timer_secs.or(file_layer.timer_secs).unwrap_or(60),
            dtformat: env_layer
                .dtformat
                .or(file_layer.dtformat)
                .unwrap_or_else(|| "%Y-%m-%dT%H:%M:%S.%f".to_string()),
            log_level: env_layer
                .log_level
                .or(file_layer.log_level)
                .unwrap_or_else(|| "info".to_string()),
            ssh_port: env_layer.ssh_port.or(file_layer.ssh_port).unwrap_or(22),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::path::PathBuf;

    fn clear_env() {
        for key in [
            "VOLUMES_PATH",
            "SNAPSHOTS_PATH",
            "TEST_REMOTE_PATH",
            "SCHEDULE",
            "SOCKET",
            "TIMER",
            "DTFORMAT",
            "LOGLEVEL",
            "SSH_PORT",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial(env)]
    fn defaults_when_nothing_set() {
        clear_env();
        let cfg = DriverConfig::load_from(Path::new("/nonexistent/subvold.toml"));
        assert_eq!(cfg.timer_secs, 60);
        assert_eq!(cfg.ssh_port, 22);
        assert_eq!(cfg.volumes_path, PathBuf::from("/var/lib/docker/volumes"));
    }

    #[test]
    #[serial(env)]
    fn env_overrides_file_and_default() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("subvold.toml");
        std::fs::write(&file_path, "timer_secs = 120\nssh_port = 2222\n").unwrap();

        std::env::set_var("TIMER", "30");
        let cfg = DriverConfig::load_from(&file_path);
        assert_eq!(cfg.timer_secs, 30); // env wins
        assert_eq!(cfg.ssh_port, 2222); // file wins over default
        clear_env();
    }

    #[test]
    #[serial(env)]
    fn file_overrides_default_when_env_unset() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("subvold.toml");
        std::fs::write(&file_path, "log_level = \"debug\"\n").unwrap();
        let cfg = DriverConfig::load_from(&file_path);
        assert_eq!(cfg.log_level, "debug");
    }
}
