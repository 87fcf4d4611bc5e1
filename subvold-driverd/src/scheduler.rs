//! Scheduler (C8): a single cooperative worker ticking every `TIMER` seconds, dispatching
//! registry rows through the same `Ops` path the HTTP handlers use (spec.md §4.8).
use crate::ops::Ops;
use chrono::{Duration as ChronoDuration, Local, NaiveDateTime};
use slog::{error, info, warn, Logger};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use subvold_core::error::DriverError;
use subvold_core::registry::ScheduledJob;
use tokio::sync::oneshot;

type ScheduleLog = HashMap<String, HashMap<String, NaiveDateTime>>;

pub struct Scheduler {
    ops: Arc<Ops>,
    log: Logger,
}

impl Scheduler {
    pub fn new(ops: Arc<Ops>, log: Logger) -> Self {
        Self { ops, log }
    }

    /// Ticks on a cancelable sleep until `shutdown` resolves. A shutdown that arrives
    /// mid-tick is honored only once the current tick finishes (spec.md §5 cancellation).
    pub async fn run(self, mut shutdown: oneshot::Receiver<()>) {
        let mut schedule_log: ScheduleLog = HashMap::new();
        let interval = Duration::from_secs(self.ops.config.timer_secs);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(self.log, "scheduler stopping");
                    return;
                }
                _ = tokio::time::sleep(interval) => {
                    self.tick(&mut schedule_log);
                }
            }
        }
    }

    fn tick(&self, schedule_log: &mut ScheduleLog) {
        if self.ops.is_paused() {
            info!(self.log, "scheduler paused, skipping tick");
            return;
        }
        let rows = match self.ops.schedule_list() {
            Ok(rows) => rows,
            Err(e) => {
                warn!(self.log, "registry unreadable, skipping tick"; "err" => %e);
                return;
            }
        };
        let now = Local::now().naive_local();
        for row in rows.iter().filter(|r| r.enabled) {
            self.run_job(schedule_log, row, now);
        }
    }

    fn seen_at(&self, schedule_log: &mut ScheduleLog, row: &ScheduledJob, now: NaiveDateTime) -> NaiveDateTime {
        *schedule_log
            .entry(row.action.clone())
            .or_default()
            .entry(row.name.clone())
            .or_insert_with(|| now - ChronoDuration::days(1))
    }

    fn mark_ran(&self, schedule_log: &mut ScheduleLog, row: &ScheduledJob, now: NaiveDateTime) {
        schedule_log
            .entry(row.action.clone())
            .or_default()
            .insert(row.name.clone(), now);
    }

    fn log_failure(&self, row: &ScheduledJob, e: &DriverError) {
        error!(
            self.log, "scheduled action failed";
            "name" => &row.name, "action" => &row.action, "timer" => row.timer_minutes, "err" => e.wire_message(),
        );
    }

    fn run_job(&self, schedule_log: &mut ScheduleLog, row: &ScheduledJob, now: NaiveDateTime) {
        let last = self.seen_at(schedule_log, row, now);
        if now < last + ChronoDuration::minutes(row.timer_minutes as i64) {
            return;
        }

        if row.action == "snapshot" {
            match self.ops.snapshot(&row.name) {
                Ok(_) => self.mark_ran(schedule_log, row, now),
                Err(e) => self.log_failure(row, &e),
            }
        } else if let Some(host) = row.action.strip_prefix("replicate:") {
            let result = self
                .ops
                .snapshot(&row.name)
                .and_then(|stamped| self.ops.send_snapshot(&stamped, host, false));
            if let Err(e) = &result {
                self.log_failure(row, e);
            }
            self.mark_ran(schedule_log, row, now);
        } else if let Some(pattern) = row.action.strip_prefix("purge:") {
            let result = self.ops.purge(&row.name, pattern, false, false);
            if let Err(e) = &result {
                self.log_failure(row, e);
            }
            self.mark_ran(schedule_log, row, now);
        } else if let Some(hosts) = row.action.strip_prefix("synchronize:") {
            let host_list: Vec<String> = hosts.split(',').map(str::to_string).collect();
            let result = self
                .ops
                .snapshot(&row.name)
                .and_then(|_| self.ops.sync_volumes(&[row.name.clone()], &host_list, false));
            if let Err(e) = &result {
                self.log_failure(row, e);
            }
            self.mark_ran(schedule_log, row, now);
        } else {
            warn!(self.log, "unknown scheduled action, skipping"; "name" => &row.name, "action" => &row.action);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_last_run_one_day_before_now_on_first_observation() {
        let row = ScheduledJob {
            name: "web".into(),
            action: "snapshot".into(),
            timer_minutes: 60,
            enabled: true,
        };
        let now = NaiveDateTime::parse_from_str("2021-01-02T00:00:00", "%Y-%m-%dT%H:%M:%S").unwrap();
        let mut log: ScheduleLog = HashMap::new();
        let seeded = log
            .entry(row.action.clone())
            .or_default()
            .entry(row.name.clone())
            .or_insert_with(|| now - ChronoDuration::days(1));
        assert_eq!(*seeded, now - ChronoDuration::days(1));
    }
}
