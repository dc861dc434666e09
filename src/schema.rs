// 📐 Shape Layer - Column Schemas
// Validates the header row of every tabular source before any row is read

use csv::StringRecord;
use std::collections::BTreeMap;

// ============================================================================
// TABLE SCHEMAS
// ============================================================================

/// Required + optional columns of one tabular source.
///
/// Column names are matched case-insensitively after trimming; unknown
/// columns are ignored.
#[derive(Debug, Clone, Copy)]
pub struct TableSchema {
    pub name: &'static str,
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
}

pub const NOMENCLATURE: TableSchema = TableSchema {
    name: "Nomenclature",
    required: &["HGNC ID", "Approved symbol"],
    optional: &["Alias symbols", "Previous symbols", "Locus group", "Chromosome"],
};

pub const TRANSCRIPT_MAP: TableSchema = TableSchema {
    name: "TranscriptMap",
    required: &["gene", "transcript"],
    optional: &["clinical"],
};

pub const TEST_DIRECTORY: TableSchema = TableSchema {
    name: "TestDirectory",
    required: &["code"],
    // A row targets either a panel version or a single gene
    optional: &["panel_id", "panel_version", "gene", "name", "method"],
};

pub const SAMPLE_MANIFEST: TableSchema = TableSchema {
    name: "SampleManifest",
    required: &["sample", "code"],
    optional: &[],
};

// ============================================================================
// VALIDATION RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub context: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.context, self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Position of every known column found in a header row
#[derive(Debug, Clone)]
pub struct ColumnMap {
    positions: BTreeMap<&'static str, usize>,
    required: &'static [&'static str],
}

impl ColumnMap {
    /// Non-empty, trimmed value of a column in one row
    pub fn get<'r>(&self, record: &'r StringRecord, column: &str) -> Option<&'r str> {
        let index = *self.positions.get(column)?;
        record
            .get(index)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// First required column that is blank in this row
    pub fn first_missing(&self, record: &StringRecord) -> Option<&'static str> {
        self.required
            .iter()
            .copied()
            .find(|column| self.get(record, column).is_none())
    }

    pub fn has(&self, column: &str) -> bool {
        self.positions.contains_key(column)
    }
}

fn normalize_header(header: &str) -> String {
    header.trim_start_matches('\u{feff}').trim().to_lowercase()
}

impl TableSchema {
    /// Check that every required column is present; build the column map
    pub fn validate_headers(&self, headers: &StringRecord) -> Result<ColumnMap, Vec<ValidationError>> {
        let normalized: Vec<String> = headers.iter().map(normalize_header).collect();

        let mut positions = BTreeMap::new();
        for column in self.required.iter().chain(self.optional.iter()) {
            let wanted = column.to_lowercase();
            if let Some(index) = normalized.iter().position(|header| *header == wanted) {
                positions.insert(*column, index);
            }
        }

        let errors: Vec<ValidationError> = self
            .required
            .iter()
            .filter(|column| !positions.contains_key(*column))
            .map(|column| ValidationError {
                field: column.to_string(),
                message: "missing required column".to_string(),
                context: self.name.to_string(),
            })
            .collect();

        if errors.is_empty() {
            Ok(ColumnMap {
                positions,
                required: self.required,
            })
        } else {
            Err(errors)
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
