//! Purge engine (C3): a pure function from candidate names + retention pattern + `now`
//! to the set of names to delete. No I/O.
use crate::error::{DriverError, Result};
use chrono::NaiveDateTime;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment {
    hi: i64,
    lo: i64,
}

/// Parses a `m/h/d/w/y` colon-separated retention pattern into ascending minutes.
/// Requires at least two components (spec.md §4.3).
fn parse_pattern(pattern: &str) -> Result<Vec<i64>> {
    let mut minutes = pattern
        .split(':')
        .map(parse_component)
        .collect::<Option<Vec<_>>>()
        .ok_or(DriverError::InvalidPurgePattern)?;
    if minutes.len() < 2 {
        return Err(DriverError::InvalidPurgePattern);
    }
    minutes.sort_unstable();
    Ok(minutes)
}

fn parse_component(component: &str) -> Option<i64> {
    let component = component.trim();
    if component.len() < 2 {
        return None;
    }
    let (digits, unit) = component.split_at(component.len() - 1);
    let value: i64 = digits.parse().ok()?;
    if value <= 0 {
        return None;
    }
    let unit_minutes = match unit {
        "m" => 1,
        "h" => 60,
        "d" => 1440,
        "w" => 10080,
        "y" => 525_600,
        _ => return None,
    };
    Some(value * unit_minutes)
}

/// A candidate's parsed age, kept alongside its original name for the result set.
struct Candidate<'a> {
    name: &'a str,
    age_minutes: i64,
}

/// Computes the set of snapshot names to delete for one volume.
///
/// `candidates` must already exclude host-tagged marker snapshots (spec.md §4.3 edge
/// cases — the caller's responsibility, since this function has no notion of "host").
/// Names whose timestamp segment fails to parse with `dtformat` are skipped (kept, not
/// deleted) and are expected to be logged by the caller.
pub fn evaluate<'a, I>(candidates: I, pattern: &str, now: NaiveDateTime, dtformat: &str) -> Result<HashSet<String>>
where
    I: IntoIterator<Item = &'a str>,
{
    let minutes = parse_pattern(pattern)?;
    let max_age = *minutes.last().expect("validated non-empty");

    let mut parsed: Vec<Candidate<'a>> = Vec::new();
    for name in candidates {
        let split = match crate::paths::split_stamp(name) {
            Some(s) if !s.is_marker() => s,
            _ => continue,
        };
        match split.parse_timestamp(dtformat) {
            Some(t) => {
                let age_minutes = (now - t).num_seconds().div_euclid(60);
                parsed.push(Candidate { name, age_minutes });
            }
            None => continue, // unparseable: kept, not a purge candidate
        }
    }
    // Walk oldest-first (ascending calendar time / descending age): a later duplicate
    // within the same bucket is what gets marked, matching the 20-hourly-snapshot
    // acceptance fixture (spec.md §8 scenario 4 / Open Questions).
    parsed.sort_by_key(|c| std::cmp::Reverse(c.age_minutes));

    let mut to_delete: HashSet<String> = HashSet::new();
    // Segments are pairs of adjacent retention points taken in descending order:
    // S_i = (p_{k-i}, p_{k-i-1}).
    let segments: Vec<Segment> = minutes
        .windows(2)
        .rev()
        .map(|w| Segment { hi: w[1], lo: w[0] })
        .collect();

    for segment in &segments {
        let mut last_frame: i64 = -1;
        for candidate in &parsed {
            let age = candidate.age_minutes;
            if (age > segment.hi && segment.hi < max_age) || age < segment.lo {
                continue;
            }
            let frame = age.div_euclid(segment.lo);
            if frame == last_frame || age > max_age {
                to_delete.insert(candidate.name.to_string());
            }
            last_frame = frame;
        }
    }

    Ok(to_delete)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn name_at(base: &str, now: NaiveDateTime, age_minutes: i64, dtformat: &str) -> String {
        let t = now - Duration::minutes(age_minutes);
        format!("{}@{}", base, t.format(dtformat))
    }

    const FMT: &str = "%Y-%m-%dT%H:%M:%S.%f";

    #[test]
    fn empty_input_is_empty_output() {
        let now = NaiveDateTime::parse_from_str("2021-01-01T00:00:00.000000", FMT).unwrap();
        let result = evaluate(Vec::new(), "1h:1d", now, FMT).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn rejects_single_component_pattern() {
        let now = NaiveDateTime::parse_from_str("2021-01-01T00:00:00.000000", FMT).unwrap();
        assert!(evaluate(Vec::new(), "1h", now, FMT).is_err());
    }

    #[test]
    fn unparseable_names_are_skipped_not_deleted() {
        let now = NaiveDateTime::parse_from_str("2021-01-01T00:00:00.000000", FMT).unwrap();
        let names = vec!["web@not-a-timestamp"];
        let result = evaluate(names, "1h:2h", now, FMT).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn marker_snapshots_are_not_candidates() {
        // this function assumes markers already filtered by the caller; verify that a
        // literal marker-shaped name parses as base="web", timestamp, host -- and
        // split_stamp reports is_marker() true, so it'd be excluded by a correct caller.
        let s = crate::paths::split_stamp("web@2021-01-01T00:00:00.000000@host1").unwrap();
        assert!(s.is_marker());
    }

    #[test]
    fn twenty_hourly_snapshots_pattern_2h_2h() {
        let now = NaiveDateTime::parse_from_str("2021-01-01T00:00:00.000000", FMT).unwrap();
        let names: Vec<String> = (0..20).map(|i| name_at("web", now, i * 60, FMT)).collect();
        let name_refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
        let result = evaluate(name_refs.clone(), "2h:2h", now, FMT).unwrap();
        assert_eq!(result.len(), 18);

        // idempotence: survivors re-run through purge a second time produce no new marks
        let survivors: Vec<&str> = name_refs.iter().copied().filter(|n| !result.contains(*n)).collect();
        let second_pass = evaluate(survivors, "2h:2h", now, FMT).unwrap();
        assert!(second_pass.is_empty());
    }

    #[test]
    fn hourly_snapshots_pattern_1d_1w_4w_1y_bounds_survivors() {
        let now = NaiveDateTime::parse_from_str("2021-06-01T00:00:00.000000", FMT).unwrap();
        let names: Vec<String> = (0..5000).map(|i| name_at("web", now, i * 60, FMT)).collect();
        let name_refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
        let result = evaluate(name_refs.clone(), "1d:1w:4w:1y", now, FMT).unwrap();
        let survivors = name_refs.len() - result.len();
        assert_eq!(survivors, 40);
    }
}
