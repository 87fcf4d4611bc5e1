use crate::error::{DriverError, Result};
use chrono::{DateTime, Local, NaiveDateTime};
use std::path::{Path, PathBuf};

/// Reserved entry under the volumes root that is never a volume.
pub const METADATA_DB: &str = "metadata.db";

/// The `@` character separates `Base`, `Timestamp` and an optional `Host` in a snapshot
/// name. Volume names may never contain it (spec.md §3, invariant 3).
const SEPARATOR: char = '@';

pub fn validate_volume_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(SEPARATOR) {
        return Err(DriverError::InvalidVolumeName);
    }
    Ok(())
}

pub fn volume_path(volumes_root: &Path, name: &str) -> PathBuf {
    volumes_root.join(name)
}

pub fn snapshot_path(snapshots_root: &Path, name: &str) -> PathBuf {
    snapshots_root.join(name)
}

/// Formats `now` with `dtformat` and joins it to `base` with the `@` separator, producing
/// the stamped snapshot name used by `Snapshot`, `Send`, `Synchronize`.
pub fn stamped_snapshot_name(base: &str, now: DateTime<Local>, dtformat: &str) -> String {
    format!("{}{}{}", base, SEPARATOR, now.format(dtformat))
}

/// Splits a snapshot directory name into `(base, timestamp_raw, host)`.
///
/// Two segments (`Base@Timestamp`) is a regular snapshot; three (`Base@Timestamp@Host`)
/// is a send marker (spec.md §3). More than three, or fewer than two, is not a snapshot
/// name at all.
pub fn split_stamp(name: &str) -> Option<SplitStamp<'_>> {
    let mut parts = name.splitn(3, SEPARATOR);
    let base = parts.next()?;
    let timestamp = parts.next()?;
    let rest = parts.next();
    if base.is_empty() || timestamp.is_empty() {
        return None;
    }
    // splitn(3, ..) leaves any further '@' inside `rest`; a genuine marker name has
    // exactly three segments, so reject a fourth.
    if let Some(rest) = rest {
        if rest.contains(SEPARATOR) {
            return None;
        }
    }
    Some(SplitStamp { base, timestamp, host: rest })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitStamp<'a> {
    pub base: &'a str,
    pub timestamp: &'a str,
    pub host: Option<&'a str>,
}

impl<'a> SplitStamp<'a> {
    pub fn is_marker(&self) -> bool {
        self.host.is_some()
    }

    pub fn parse_timestamp(&self, dtformat: &str) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(self.timestamp, dtformat).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_at_sign_in_volume_name() {
        assert!(validate_volume_name("data@1").is_err());
        assert!(validate_volume_name("").is_err());
        assert!(validate_volume_name("data").is_ok());
    }

    #[test]
    fn splits_plain_snapshot() {
        let s = split_stamp("web@2021-01-02T03:04:05.000001").unwrap();
        assert_eq!(s.base, "web");
        assert_eq!(s.timestamp, "2021-01-02T03:04:05.000001");
        assert!(!s.is_marker());
    }

    #[test]
    fn splits_host_tagged_marker() {
        let s = split_stamp("web@2021-01-02T03:04:05.000001@backup-host").unwrap();
        assert_eq!(s.base, "web");
        assert_eq!(s.host, Some("backup-host"));
        assert!(s.is_marker());
    }

    #[test]
    fn rejects_names_without_timestamp_segment() {
        assert!(split_stamp("plainname").is_none());
    }

    #[test]
    fn parses_microsecond_timestamp() {
        let s = split_stamp("web@2021-01-02T03:04:05.123456").unwrap();
        let parsed = s.parse_timestamp("%Y-%m-%dT%H:%M:%S.%f").unwrap();
        assert_eq!(parsed.and_utc().timestamp_subsec_micros(), 123456);
    }
}
