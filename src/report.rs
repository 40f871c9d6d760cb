use serde::Serialize;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::types::TorrentId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum MigrationOutcome {
    SkippedByCondition,
    Migrated,
    MigratedAndRemoved,
    TransferFailed,
    /// Dry run: would have been migrated.
    Planned,
}

impl MigrationOutcome {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::SkippedByCondition => "skipped-by-condition",
            Self::Migrated => "migrated",
            Self::MigratedAndRemoved => "migrated-and-removed",
            Self::TransferFailed => "transfer-failed",
            Self::Planned => "planned",
        }
    }

    /// Counts toward `--limit`.
    pub(crate) fn is_success(&self) -> bool {
        matches!(
            self,
            Self::Migrated | Self::MigratedAndRemoved | Self::Planned
        )
    }
}

impl fmt::Display for MigrationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct MigrationRecord {
    pub(crate) id: TorrentId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) name: Option<String>,
    pub(crate) outcome: MigrationOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) detail: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct MigrationSummary {
    pub(crate) source: String,
    pub(crate) destination: String,
    pub(crate) dry_run: bool,
    pub(crate) started_at: String,
    pub(crate) migrated: u64,
    pub(crate) skipped: u64,
    pub(crate) failed: u64,
    pub(crate) records: Vec<MigrationRecord>,
}

impl MigrationSummary {
    pub(crate) fn new(source: String, destination: String, dry_run: bool, started_at: String) -> Self {
        Self {
            source,
            destination,
            dry_run,
            started_at,
            migrated: 0,
            skipped: 0,
            failed: 0,
            records: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, record: MigrationRecord) {
        if record.outcome.is_success() {
            self.migrated += 1;
        } else if record.outcome == MigrationOutcome::TransferFailed {
            self.failed += 1;
        } else {
            self.skipped += 1;
        }
        self.records.push(record);
    }

    pub(crate) fn write_to(&self, path: &Path) -> Result<(), String> {
        let mut file = fs::File::create(path)
            .map_err(|err| format!("failed to create report {}: {err}", path.display()))?;
        serde_json::to_writer_pretty(&mut file, self)
            .map_err(|err| format!("failed to serialize report {}: {err}", path.display()))?;
        file.write_all(b"\n")
            .map_err(|err| format!("failed to finalize report {}: {err}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(id: &str, outcome: MigrationOutcome) -> MigrationRecord {
        MigrationRecord {
            id: TorrentId::try_from(id).expect("id"),
            name: Some(format!("torrent-{id}")),
            outcome,
            detail: None,
        }
    }

    #[test]
    fn push_updates_counters() {
        let mut summary = MigrationSummary::new("a:1".into(), "b:2".into(), false, "now".into());
        summary.push(record("1", MigrationOutcome::Migrated));
        summary.push(record("2", MigrationOutcome::MigratedAndRemoved));
        summary.push(record("3", MigrationOutcome::SkippedByCondition));
        summary.push(record("4", MigrationOutcome::TransferFailed));
        assert_eq!(
            (summary.migrated, summary.skipped, summary.failed),
            (2, 1, 1)
        );
        assert_eq!(summary.records.len(), 4);
    }

    #[test]
    fn report_serializes_kebab_case_outcomes() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("report.json");
        let mut summary = MigrationSummary::new("a:1".into(), "b:2".into(), true, "now".into());
        summary.push(MigrationRecord {
            detail: Some("copy failed".to_string()),
            ..record("7", MigrationOutcome::TransferFailed)
        });
        summary.push(record("8", MigrationOutcome::Planned));
        summary.write_to(&path).expect("write report");

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read report"))
                .expect("parse report");
        assert_eq!(value["dry_run"], true);
        assert_eq!(value["failed"], 1);
        assert_eq!(value["records"][0]["id"], "7");
        assert_eq!(value["records"][0]["outcome"], "transfer-failed");
        assert_eq!(value["records"][0]["detail"], "copy failed");
        assert_eq!(value["records"][1]["outcome"], "planned");
        assert!(value["records"][1].get("detail").is_none());
    }
}
