//! Job registry (C6): a flat, header-less CSV file of `(Name,Action,Timer,Enabled)` rows,
//! `(Name,Action)` unique. Parsed by hand (see DESIGN.md for why no `csv` crate).
use crate::error::RegistryError;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledJob {
    pub name: String,
    pub action: String,
    pub timer_minutes: u64,
    pub enabled: bool,
}

impl ScheduledJob {
    fn to_row(&self) -> String {
        format!(
            "{},{},{},{}",
            self.name,
            self.action,
            self.timer_minutes,
            if self.enabled { "True" } else { "False" }
        )
    }

    /// `Action` itself can carry commas (`synchronize:<host>[,<host>...]`), so `Name` is
    /// split off the front and `Timer`/`Enabled` are split off the back, with whatever
    /// remains in the middle taken whole as `Action`.
    fn parse_row(path: &Path, line_no: usize, line: &str) -> Result<Self, RegistryError> {
        let malformed = || RegistryError::Malformed {
            path: path.to_path_buf(),
            line_no,
            line: line.to_string(),
        };
        let mut front = line.splitn(2, ',');
        let name = front.next().ok_or_else(malformed)?;
        let rest = front.next().ok_or_else(malformed)?;

        let mut back = rest.rsplitn(3, ',');
        let enabled_field = back.next().ok_or_else(malformed)?;
        let timer_field = back.next().ok_or_else(malformed)?;
        let action = back.next().ok_or_else(malformed)?;

        let timer_minutes: u64 = timer_field.trim().parse().map_err(|_| malformed())?;
        let enabled = match enabled_field.trim() {
            "True" => true,
            "False" => false,
            _ => return Err(malformed()),
        };
        Ok(ScheduledJob {
            name: name.trim().to_string(),
            action: action.trim().to_string(),
            timer_minutes,
            enabled,
        })
    }
}

pub struct Registry {
    path: PathBuf,
}

impl Registry {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Parses every row. A single unparseable row fails the whole call closed
    /// (spec.md §4.6 List()).
    pub fn list(&self) -> Result<Vec<ScheduledJob>, RegistryError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path).map_err(|source| RegistryError::Read {
            path: self.path.clone(),
            source,
        })?;
        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .enumerate()
            .map(|(i, l)| ScheduledJob::parse_row(&self.path, i + 1, l))
            .collect()
    }

    /// Upserts `(name, action)`. `timer == 0` removes the row instead of writing it back
    /// (spec.md §3 ScheduledJob, §4.6). Always rewrites the whole file via a
    /// write-temp-then-rename so a partial write never leaves a truncated file (invariant 4).
    pub fn upsert(&self, name: &str, action: &str, timer_minutes: u64) -> Result<(), RegistryError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| RegistryError::Write {
                path: self.path.clone(),
                source,
            })?;
        }

        let mut rows = self.list().unwrap_or_default();
        rows.retain(|r| !(r.name == name && r.action == action));
        if timer_minutes != 0 {
            rows.push(ScheduledJob {
                name: name.to_string(),
                action: action.to_string(),
                timer_minutes,
                enabled: true,
            });
        }

        self.write_all(&rows)
    }

    fn write_all(&self, rows: &[ScheduledJob]) -> Result<(), RegistryError> {
        let contents = rows.iter().map(ScheduledJob::to_row).collect::<Vec<_>>().join("\n");
        let contents = if contents.is_empty() {
            contents
        } else {
            contents + "\n"
        };

        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, contents).map_err(|source| RegistryError::Write {
            path: self.path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|source| RegistryError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn upsert_creates_and_lists() {
        let dir = tempdir().unwrap();
        let registry = Registry::new(dir.path().join("schedule.csv"));
        registry.upsert("web", "snapshot", 60).unwrap();
        let rows = registry.list().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "web");
        assert_eq!(rows[0].timer_minutes, 60);
        assert!(rows[0].enabled);
    }

    #[test]
    fn upsert_timer_zero_removes_row() {
        let dir = tempdir().unwrap();
        let registry = Registry::new(dir.path().join("schedule.csv"));
        registry.upsert("web", "snapshot", 60).unwrap();
        registry.upsert("web", "snapshot", 0).unwrap();
        assert!(registry.list().unwrap().is_empty());
    }

    #[test]
    fn upsert_replaces_same_name_action_pair() {
        let dir = tempdir().unwrap();
        let registry = Registry::new(dir.path().join("schedule.csv"));
        registry.upsert("web", "snapshot", 60).unwrap();
        registry.upsert("web", "snapshot", 120).unwrap();
        let rows = registry.list().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].timer_minutes, 120);
    }

    #[test]
    fn distinct_actions_for_same_name_coexist() {
        let dir = tempdir().unwrap();
        let registry = Registry::new(dir.path().join("schedule.csv"));
        registry.upsert("web", "snapshot", 60).unwrap();
        registry.upsert("web", "replicate:host1", 120).unwrap();
        assert_eq!(registry.list().unwrap().len(), 2);
    }

    #[test]
    fn malformed_row_fails_list_closed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("schedule.csv");
        fs::write(&path, "web,snapshot,not-a-number,True\n").unwrap();
        let registry = Registry::new(path);
        assert!(registry.list().is_err());
    }

    #[test]
    fn comma_bearing_synchronize_action_round_trips() {
        let dir = tempdir().unwrap();
        let registry = Registry::new(dir.path().join("schedule.csv"));
        registry.upsert("web", "synchronize:host1,host2", 180).unwrap();
        let rows = registry.list().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].action, "synchronize:host1,host2");
        assert_eq!(rows[0].timer_minutes, 180);
    }

    #[test]
    fn comma_bearing_action_does_not_corrupt_other_rows() {
        let dir = tempdir().unwrap();
        let registry = Registry::new(dir.path().join("schedule.csv"));
        registry.upsert("web", "snapshot", 60).unwrap();
        registry.upsert("web", "synchronize:host1,host2", 180).unwrap();
        let rows = registry.list().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().any(|r| r.action == "snapshot" && r.timer_minutes == 60));
        assert!(rows.iter().any(|r| r.action == "synchronize:host1,host2" && r.timer_minutes == 180));
    }

    #[test]
    fn missing_file_lists_empty() {
        let dir = tempdir().unwrap();
        let registry = Registry::new(dir.path().join("schedule.csv"));
        assert_eq!(registry.list().unwrap(), Vec::new());
    }
}
