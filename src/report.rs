// 📋 Run Report - warnings, conflicts and diff records as JSON Lines
//
// One object per line, tagged by "record":
//   {"record":"warning", ...}
//   {"record":"conflict", ...}
//   {"record":"diff", ...}

use crate::diff::{DiffKind, DiffRecord};
use crate::error::EmitError;
use crate::merge::Reconciliation;
use crate::parser::LoadWarning;
use crate::precedence::{ConflictKind, ConflictRecord};
use serde::Serialize;
use std::fmt;

pub const REPORT_FILE_NAME: &str = "report.jsonl";

#[derive(Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum ReportLine<'a> {
    Warning(&'a LoadWarning),
    Conflict(&'a ConflictRecord),
    Diff(&'a DiffRecord),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub warnings: Vec<LoadWarning>,
    pub conflicts: Vec<ConflictRecord>,
    pub diffs: Vec<DiffRecord>,
}

impl RunReport {
    pub fn from_reconciliation(reconciliation: &Reconciliation) -> Self {
        RunReport {
            warnings: reconciliation.warnings.clone(),
            conflicts: reconciliation.conflicts.clone(),
            diffs: Vec::new(),
        }
    }

    pub fn with_diffs(mut self, diffs: Vec<DiffRecord>) -> Self {
        self.diffs = diffs;
        self
    }

    /// Warnings, then conflicts, then diffs; each group keeps its own order
    pub fn to_jsonl(&self) -> Result<Vec<u8>, EmitError> {
        let lines = self
            .warnings
            .iter()
            .map(ReportLine::Warning)
            .chain(self.conflicts.iter().map(ReportLine::Conflict))
            .chain(self.diffs.iter().map(ReportLine::Diff));

        let mut out = Vec::new();
        for line in lines {
            serde_json::to_writer(&mut out, &line).map_err(|e| EmitError::Encode {
                artifact: REPORT_FILE_NAME.to_string(),
                message: e.to_string(),
            })?;
            out.push(b'\n');
        }
        Ok(out)
    }

    pub fn summary(&self) -> ReportSummary {
        let conflicts_of = |kind: ConflictKind| self.conflicts.iter().filter(|c| c.kind == kind).count();
        let diffs_of = |kind: DiffKind| self.diffs.iter().filter(|d| d.kind == kind).count();

        ReportSummary {
            warnings: self.warnings.len(),
            unresolvable: conflicts_of(ConflictKind::Unresolvable),
            precedence_conflicts: conflicts_of(ConflictKind::EqualRank) + conflicts_of(ConflictKind::HigherRank),
            added: diffs_of(DiffKind::Added),
            removed: diffs_of(DiffKind::Removed),
            changed: diffs_of(DiffKind::Changed),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty() && self.conflicts.is_empty() && self.diffs.is_empty()
    }
}

/// Counts for the end-of-run log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReportSummary {
    pub warnings: usize,
    pub unresolvable: usize,
    pub precedence_conflicts: usize,
    pub added: usize,
    pub removed: usize,
    pub changed: usize,
}

impl fmt::Display for ReportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} warnings, {} unresolved, {} precedence conflicts, diff +{} -{} ~{}",
            self.warnings, self.unresolvable, self.precedence_conflicts, self.added, self.removed, self.changed
        )
    }
}
