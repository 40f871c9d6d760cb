use chrono::{DateTime, Utc};
use std::io::Write;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::conditions::evaluate;
use crate::config::MigrationConfig;
use crate::control::TorrentControl;
use crate::descriptor::Descriptor;
use crate::logger::{sanitize_log_value, Logger};
use crate::report::{MigrationOutcome, MigrationRecord, MigrationSummary};
use crate::retry::{retry, RetryError};
use crate::transfer::{
    metadata_file_stem, resume_file_name, torrent_file_name, FileTransfer, RemoteFile,
};
use crate::types::TorrentId;

pub(crate) const EXIT_INTERRUPTED: i32 = 130;

#[derive(Debug)]
pub(crate) struct Quit {
    pub(crate) code: i32,
    #[allow(dead_code)]
    pub(crate) reason: String,
}

impl Quit {
    pub(crate) fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code as u8)
    }
}

pub(crate) fn quit(logger: &Logger, reason: &str, code: i32) -> Quit {
    let sanitized = if reason.trim().is_empty() {
        "unknown".to_string()
    } else {
        sanitize_log_value(reason)
    };
    logger.log_transition(&format!("quit reason={}", sanitized));
    Quit {
        code,
        reason: reason.to_string(),
    }
}

/// Source/destination paths of one torrent's metadata files.
#[derive(Debug)]
struct TransferPlan {
    torrent_from: RemoteFile,
    torrent_to: RemoteFile,
    resume_from: RemoteFile,
    resume_to: RemoteFile,
}

pub(crate) struct Driver<'a> {
    pub(crate) config: &'a MigrationConfig,
    pub(crate) source: &'a dyn TorrentControl,
    pub(crate) destination: &'a dyn TorrentControl,
    pub(crate) transfer: &'a dyn FileTransfer,
    pub(crate) logger: &'a Logger,
    pub(crate) interrupt: &'a AtomicBool,
    pub(crate) now: DateTime<Utc>,
}

impl Driver<'_> {
    fn check_interrupted(&self) -> Result<(), Quit> {
        if self.interrupt.load(Ordering::SeqCst) {
            return Err(quit(self.logger, "interrupted", EXIT_INTERRUPTED));
        }
        Ok(())
    }

    fn plan(&self, stem: &str) -> TransferPlan {
        let source = &self.config.source;
        let destination = &self.config.destination;
        let torrent = torrent_file_name(stem);
        let resume = resume_file_name(stem);
        TransferPlan {
            torrent_from: RemoteFile::new(&source.ssh_host, source.torrent_path(&torrent)),
            torrent_to: RemoteFile::new(&destination.ssh_host, destination.torrent_path(&torrent)),
            resume_from: RemoteFile::new(&source.ssh_host, source.resume_path(&resume)),
            resume_to: RemoteFile::new(&destination.ssh_host, destination.resume_path(&resume)),
        }
    }

    fn list_source(&self) -> Result<Vec<TorrentId>, Quit> {
        retry(
            &self.config.retry,
            "list",
            self.logger,
            self.interrupt,
            || self.source.list(),
        )
        .map_err(|err| match err {
            RetryError::Interrupted => quit(self.logger, "interrupted", EXIT_INTERRUPTED),
            RetryError::Exhausted { .. } => {
                eprintln!(
                    "Failed to list torrents on {}: {}",
                    self.source.address(),
                    err
                );
                quit(self.logger, &format!("list_failed:{err}"), 1)
            }
        })
    }

    fn describe(&self, id: &TorrentId) -> Result<Result<Descriptor, String>, Quit> {
        let label = format!("describe:{}", id);
        match retry(&self.config.retry, &label, self.logger, self.interrupt, || {
            self.source.describe(id)
        }) {
            Ok(descriptor) => Ok(Ok(descriptor)),
            Err(RetryError::Interrupted) => {
                Err(quit(self.logger, "interrupted", EXIT_INTERRUPTED))
            }
            Err(err) => Ok(Err(format!("describe failed: {}", err))),
        }
    }

    /// Copy both files, then register on the destination. Never retried.
    fn transfer_files(&self, plan: &TransferPlan) -> Result<(), String> {
        self.transfer
            .copy(&plan.torrent_from, &plan.torrent_to)
            .map_err(|err| format!("torrent file: {}", err))?;
        self.transfer
            .copy(&plan.resume_from, &plan.resume_to)
            .map_err(|err| format!("resume file: {}", err))?;
        self.destination
            .add(&plan.torrent_to.path)
            .map_err(|err| format!("register on destination: {}", err))?;
        Ok(())
    }

    fn print_plan(&self, out: &mut dyn Write, id: &TorrentId, plan: &TransferPlan) {
        let _ = writeln!(out, "[dry-run] would copy {} -> {}", plan.torrent_from, plan.torrent_to);
        let _ = writeln!(out, "[dry-run] would copy {} -> {}", plan.resume_from, plan.resume_to);
        let _ = writeln!(
            out,
            "[dry-run] would add {} on {}",
            plan.torrent_to.path,
            self.destination.address()
        );
        if self.config.remove_from_source {
            let _ = writeln!(
                out,
                "[dry-run] would remove torrent {} from {}",
                id,
                self.source.address()
            );
        }
    }

    fn migrate_one(&self, id: &TorrentId, out: &mut dyn Write) -> Result<MigrationRecord, Quit> {
        let record = |name: Option<&str>, outcome: MigrationOutcome, detail: Option<String>| {
            MigrationRecord {
                id: id.clone(),
                name: name.map(|value| value.to_string()),
                outcome,
                detail,
            }
        };

        let descriptor = match self.describe(id)? {
            Ok(descriptor) => descriptor,
            Err(err) => return Ok(record(None, MigrationOutcome::TransferFailed, Some(err))),
        };
        let name = descriptor.name();

        if !evaluate(
            &descriptor,
            &self.config.conditions,
            self.config.age,
            self.now,
        ) {
            self.logger
                .log_transition(&format!("skip torrent={} reason=conditions", id));
            return Ok(record(name, MigrationOutcome::SkippedByCondition, None));
        }

        let stem = match metadata_file_stem(&descriptor, self.config.identifier) {
            Ok(stem) => stem,
            Err(err) => return Ok(record(name, MigrationOutcome::TransferFailed, Some(err))),
        };
        let plan = self.plan(&stem);

        if self.config.dry_run {
            self.print_plan(out, id, &plan);
            return Ok(record(name, MigrationOutcome::Planned, None));
        }

        self.check_interrupted()?;
        self.logger
            .log_transition(&format!("transfer torrent={} stem={}", id, stem));
        if let Err(err) = self.transfer_files(&plan) {
            self.logger.log_transition(&format!(
                "transfer_failed torrent={} err={}",
                id,
                sanitize_log_value(&err)
            ));
            return Ok(record(name, MigrationOutcome::TransferFailed, Some(err)));
        }

        if !self.config.remove_from_source {
            return Ok(record(name, MigrationOutcome::Migrated, None));
        }
        match self.source.remove(id) {
            Ok(()) => {
                self.logger
                    .log_transition(&format!("removed torrent={}", id));
                Ok(record(name, MigrationOutcome::MigratedAndRemoved, None))
            }
            Err(err) => {
                eprintln!(
                    "Warning: torrent {} migrated but not removed from {}: {}",
                    id,
                    self.source.address(),
                    err
                );
                self.logger.log_transition(&format!(
                    "remove_failed torrent={} err={}",
                    id,
                    sanitize_log_value(&err)
                ));
                Ok(record(
                    name,
                    MigrationOutcome::Migrated,
                    Some(format!("remove from source failed: {}", err)),
                ))
            }
        }
    }

    fn print_record(&self, out: &mut dyn Write, record: &MigrationRecord) {
        let name = record.name.as_deref().unwrap_or("?");
        match record.outcome {
            MigrationOutcome::SkippedByCondition => {
                if self.config.verbose {
                    let _ = writeln!(out, "skipped {} {}", record.id, name);
                }
            }
            MigrationOutcome::TransferFailed => {
                let _ = writeln!(
                    out,
                    "FAILED {} {}: {}",
                    record.id,
                    name,
                    record.detail.as_deref().unwrap_or("unknown error")
                );
            }
            outcome => {
                let _ = writeln!(out, "{} {} {}", outcome, record.id, name);
            }
        }
    }

    pub(crate) fn new_summary(&self) -> MigrationSummary {
        MigrationSummary::new(
            self.source.address().to_string(),
            self.destination.address().to_string(),
            self.config.dry_run,
            self.now.to_rfc3339(),
        )
    }

    /// Records land in `summary` as they happen, so a run that quits early
    /// still leaves the torrents it already handled behind.
    pub(crate) fn run(
        &self,
        out: &mut dyn Write,
        summary: &mut MigrationSummary,
    ) -> Result<(), Quit> {
        self.check_interrupted()?;
        self.logger.log_transition(&format!(
            "run start source={} destination={} dry_run={} identifier={}",
            self.source.address(),
            self.destination.address(),
            self.config.dry_run,
            self.config.identifier
        ));

        let ids = self.list_source()?;
        self.logger
            .log_transition(&format!("listed count={}", ids.len()));

        for id in &ids {
            if let Some(limit) = self.config.limit {
                if limit.reached(summary.migrated) {
                    self.logger
                        .log_transition(&format!("limit_reached limit={}", limit));
                    break;
                }
            }
            self.check_interrupted()?;
            let record = self.migrate_one(id, out)?;
            self.logger.log_transition(&format!(
                "outcome torrent={} outcome={}",
                record.id, record.outcome
            ));
            self.print_record(out, &record);
            summary.push(record);
        }

        let _ = writeln!(
            out,
            "Summary: migrated={} skipped={} failed={}{}",
            summary.migrated,
            summary.skipped,
            summary.failed,
            if self.config.dry_run { " (dry-run)" } else { "" }
        );
        self.logger.log_transition(&format!(
            "run end migrated={} skipped={} failed={}",
            summary.migrated, summary.skipped, summary.failed
        ));
        Ok(())
    }
}
