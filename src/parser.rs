// 🏗️ Source Loaders
// One loader per source format. Loaders enforce shape (columns, keys, enum
// values) and never normalize identifiers.

use crate::entities::panel::{Confidence, PanelKey};
use crate::error::SourceError;
use crate::schema::{self, ColumnMap, TableSchema};
use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

// ============================================================================
// CORE TYPES
// ============================================================================

/// SourceFormat - which kind of dump a file is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    Nomenclature,
    TranscriptMap,
    ProviderPanels,
    BespokePanels,
    TestDirectory,
    SampleManifest,
}

impl SourceFormat {
    /// Human-readable name for display
    pub fn name(&self) -> &str {
        match self {
            SourceFormat::Nomenclature => "Nomenclature reference",
            SourceFormat::TranscriptMap => "Transcript map",
            SourceFormat::ProviderPanels => "Provider panels",
            SourceFormat::BespokePanels => "Bespoke panels",
            SourceFormat::TestDirectory => "Test directory",
            SourceFormat::SampleManifest => "Sample manifest",
        }
    }

    /// Short code, same spelling as the config file
    pub fn code(&self) -> &str {
        match self {
            SourceFormat::Nomenclature => "nomenclature",
            SourceFormat::TranscriptMap => "transcript_map",
            SourceFormat::ProviderPanels => "provider_panels",
            SourceFormat::BespokePanels => "bespoke_panels",
            SourceFormat::TestDirectory => "test_directory",
            SourceFormat::SampleManifest => "sample_manifest",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One panel record from a provider or bespoke dump
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawPanel {
    pub id: String,
    pub version: String,
    pub name: Option<String>,
    pub genes: Vec<RawGeneEntry>,
    pub indications: Vec<String>,
    /// Panel versions a superpanel is made of
    pub subpanels: Vec<PanelKey>,
    pub line: usize, // 1-based position in the panel array
}

/// One gene entry nested in a panel record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawGeneEntry {
    pub symbol: Option<String>,
    pub hgnc_id: Option<String>,
    pub confidence: Confidence,
    pub transcript: Option<String>,
}

/// What a test-directory row points at
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicationTarget {
    Panel(PanelKey),
    /// Raw gene identifier; becomes a single-gene panel once resolved
    Gene(String),
}

/// One test-directory row: code → panel version or single gene
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawIndication {
    pub code: String,
    pub name: Option<String>,
    pub method: Option<String>,
    pub target: IndicationTarget,
    pub line: usize,
}

/// One nomenclature row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawNomenclature {
    pub hgnc_id: String,
    pub symbol: String,
    pub aliases: Vec<String>,
    pub previous_symbols: Vec<String>,
    pub locus_group: Option<String>,
    pub chromosome: Option<String>,
    pub line: usize,
}

/// One transcript-map row: gene → accession
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawTranscriptLink {
    pub gene: String,
    pub accession: String,
    pub clinical: bool,
    pub line: usize,
}

/// One sample-manifest row: sample → clinical indication code
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawSampleLink {
    pub sample: String,
    pub code: String,
    pub line: usize,
}

/// Records of one source, typed by format
#[derive(Debug, Clone, PartialEq)]
pub enum RawRecords {
    Nomenclature(Vec<RawNomenclature>),
    TranscriptMap(Vec<RawTranscriptLink>),
    Panels(Vec<RawPanel>),
    TestDirectory(Vec<RawIndication>),
    SampleManifest(Vec<RawSampleLink>),
}

impl RawRecords {
    pub fn len(&self) -> usize {
        match self {
            RawRecords::Nomenclature(rows) => rows.len(),
            RawRecords::TranscriptMap(rows) => rows.len(),
            RawRecords::Panels(rows) => rows.len(),
            RawRecords::TestDirectory(rows) => rows.len(),
            RawRecords::SampleManifest(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Row-level problem: the row was skipped or downgraded, the load continued
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct LoadWarning {
    pub source: SourceFormat,
    pub origin: String,
    pub line: usize,
    pub message: String,
}

impl LoadWarning {
    pub fn new(source: SourceFormat, origin: &str, line: usize, message: impl Into<String>) -> Self {
        LoadWarning {
            source,
            origin: origin.to_string(),
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.origin, self.line, self.message)
    }
}

/// Output of a loader: records + warnings + where they came from
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedSource {
    pub format: SourceFormat,
    pub origin: String,
    pub records: RawRecords,
    pub warnings: Vec<LoadWarning>,
}

// ============================================================================
// LOADER TRAIT
// ============================================================================

/// SourceLoader - one implementation per source format
///
/// `parse` works on bytes so loaders are testable without touching disk;
/// `load` adds the file read and is what callers normally use.
pub trait SourceLoader: Send + Sync {
    /// Parse raw bytes of one source file
    ///
    /// # Returns
    /// * `Ok(LoadedSource)` - records plus row-level warnings
    /// * `Err(SourceError::MalformedSource)` - structure is unusable
    fn parse(&self, origin: &str, bytes: &[u8]) -> Result<LoadedSource, SourceError>;

    /// Get the format this loader handles
    fn format(&self) -> SourceFormat;

    /// Get loader version (for provenance tracking)
    fn version(&self) -> &str {
        "1.0.0"
    }

    /// Read and parse a file
    fn load(&self, path: &Path) -> Result<LoadedSource, SourceError> {
        let origin = path.display().to_string();
        let bytes = fs::read(path).map_err(|source| SourceError::Unreadable {
            format: self.format(),
            origin: origin.clone(),
            source,
        })?;

        let loaded = self.parse(&origin, &bytes)?;
        info!(
            origin = %origin,
            format = self.format().code(),
            records = loaded.records.len(),
            warnings = loaded.warnings.len(),
            "source loaded"
        );
        Ok(loaded)
    }
}

// ============================================================================
// FACTORY FUNCTIONS
// ============================================================================

/// Detect source format from the file name
///
/// # Examples:
/// ```
/// use panel_reconcile::parser::{detect_format, SourceFormat};
/// use std::path::Path;
///
/// assert_eq!(detect_format(Path::new("hgnc_dump_20240301.txt")).unwrap(), SourceFormat::Nomenclature);
/// assert_eq!(detect_format(Path::new("g2t_clinical.tsv")).unwrap(), SourceFormat::TranscriptMap);
/// assert_eq!(detect_format(Path::new("panelapp_gms.json")).unwrap(), SourceFormat::ProviderPanels);
/// ```
pub fn detect_format(file_path: &Path) -> Result<SourceFormat, SourceError> {
    let filename = file_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    let filename_lower = filename.to_lowercase();

    if filename_lower.contains("hgnc") || filename_lower.contains("nomenclature") {
        return Ok(SourceFormat::Nomenclature);
    }

    if filename_lower.contains("g2t") || filename_lower.contains("transcript") {
        return Ok(SourceFormat::TranscriptMap);
    }

    if filename_lower.contains("directory") {
        return Ok(SourceFormat::TestDirectory);
    }

    if filename_lower.contains("bespoke") || filename_lower.contains("in_house") {
        return Ok(SourceFormat::BespokePanels);
    }

    if filename_lower.contains("sample") || filename_lower.contains("manifest") {
        return Ok(SourceFormat::SampleManifest);
    }

    if filename_lower.ends_with(".json")
        || filename_lower.contains("panelapp")
        || filename_lower.contains("provider")
    {
        return Ok(SourceFormat::ProviderPanels);
    }

    Err(SourceError::UnknownFormat {
        origin: file_path.display().to_string(),
    })
}

/// Get the loader for a source format
pub fn get_loader(format: SourceFormat) -> Box<dyn SourceLoader> {
    match format {
        SourceFormat::Nomenclature => Box::new(NomenclatureLoader::new()),
        SourceFormat::TranscriptMap => Box::new(TranscriptMapLoader::new()),
        SourceFormat::ProviderPanels => Box::new(PanelDumpLoader::provider()),
        SourceFormat::BespokePanels => Box::new(PanelDumpLoader::bespoke()),
        SourceFormat::TestDirectory => Box::new(TestDirectoryLoader::new()),
        SourceFormat::SampleManifest => Box::new(SampleManifestLoader::new()),
    }
}

/// Load one file, using the declared format or detecting it from the name
pub fn load_source(path: &Path, declared: Option<SourceFormat>) -> Result<LoadedSource, SourceError> {
    let format = match declared {
        Some(format) => format,
        None => detect_format(path)?,
    };
    get_loader(format).load(path)
}

// ============================================================================
// TABULAR READING
// ============================================================================

/// Header-validated rows of a delimited file
struct Table {
    columns: ColumnMap,
    rows: Vec<(usize, StringRecord)>,
    warnings: Vec<LoadWarning>,
}

fn read_table(
    format: SourceFormat,
    schema: &TableSchema,
    origin: &str,
    bytes: &[u8],
) -> Result<Table, SourceError> {
    let comma = origin.to_lowercase().ends_with(".csv");

    let mut reader = ReaderBuilder::new()
        .delimiter(if comma { b',' } else { b'\t' })
        .quoting(comma)
        .flexible(true)
        .has_headers(true)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| SourceError::malformed(format, origin, format!("unreadable header row: {}", e)))?
        .clone();

    let columns = schema.validate_headers(&headers).map_err(|errors| {
        let missing: Vec<String> = errors.iter().map(|e| format!("\"{}\"", e.field)).collect();
        SourceError::malformed(
            format,
            origin,
            format!("missing required column {}", missing.join(", ")),
        )
    })?;

    let mut rows = Vec::new();
    let mut warnings = Vec::new();

    for (index, result) in reader.records().enumerate() {
        // Physical line where the record starts; quoted fields may span lines
        let fallback = index + 2;
        let line = match &result {
            Ok(record) => record.position().map(|p| p.line() as usize),
            Err(e) => e.position().map(|p| p.line() as usize),
        }
        .unwrap_or(fallback);
        match result {
            Ok(record) => match columns.first_missing(&record) {
                Some(column) => warnings.push(LoadWarning::new(
                    format,
                    origin,
                    line,
                    format!("missing value for required column \"{}\"; row skipped", column),
                )),
                None => rows.push((line, record)),
            },
            Err(e) => warnings.push(LoadWarning::new(
                format,
                origin,
                line,
                format!("undecodable row ({}); row skipped", e),
            )),
        }
    }

    Ok(Table {
        columns,
        rows,
        warnings,
    })
}

/// "A, B,,C" → ["A", "B", "C"]
fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Abbreviate a test-directory method the way downstream reporting expects:
/// WES → "P", "<X...> panel" → "<X>P", single gene → "G".
pub fn abbreviate_method(method: &str) -> String {
    let method = method.trim();
    let lower = method.to_ascii_lowercase();

    if method.contains("WES") {
        return "P".to_string();
    }

    if let Some(index) = lower.find("panel") {
        let prefix = method[..index].trim();
        return match prefix.chars().next() {
            Some(first) => format!("{}P", first.to_ascii_uppercase()),
            None => "P".to_string(),
        };
    }

    if lower.contains("gene") {
        return "G".to_string();
    }

    method.to_string()
}

/// Parse a clinical-preferred flag; None when the value is not recognized
pub fn parse_clinical_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "y" | "1" | "clinical_transcript" => Some(true),
        "false" | "no" | "n" | "0" | "not_clinical_transcript" => Some(false),
        _ => None,
    }
}

// ============================================================================
// TABULAR LOADERS
// ============================================================================

/// Nomenclature reference dump (HGNC-style columns)
pub struct NomenclatureLoader;

impl NomenclatureLoader {
    pub fn new() -> Self {
        NomenclatureLoader
    }
}

impl SourceLoader for NomenclatureLoader {
    fn parse(&self, origin: &str, bytes: &[u8]) -> Result<LoadedSource, SourceError> {
        let table = read_table(self.format(), &schema::NOMENCLATURE, origin, bytes)?;
        let columns = &table.columns;

        let records = table
            .rows
            .iter()
            .filter_map(|(line, row)| {
                Some(RawNomenclature {
                    hgnc_id: columns.get(row, "HGNC ID")?.to_string(),
                    symbol: columns.get(row, "Approved symbol")?.to_string(),
                    aliases: split_list(columns.get(row, "Alias symbols")),
                    previous_symbols: split_list(columns.get(row, "Previous symbols")),
                    locus_group: columns.get(row, "Locus group").map(str::to_string),
                    chromosome: columns.get(row, "Chromosome").map(str::to_string),
                    line: *line,
                })
            })
            .collect();

        Ok(LoadedSource {
            format: self.format(),
            origin: origin.to_string(),
            records: RawRecords::Nomenclature(records),
            warnings: table.warnings,
        })
    }

    fn format(&self) -> SourceFormat {
        SourceFormat::Nomenclature
    }
}

/// Gene-to-transcript mapping file
pub struct TranscriptMapLoader;

impl TranscriptMapLoader {
    pub fn new() -> Self {
        TranscriptMapLoader
    }
}

impl SourceLoader for TranscriptMapLoader {
    fn parse(&self, origin: &str, bytes: &[u8]) -> Result<LoadedSource, SourceError> {
        let table = read_table(self.format(), &schema::TRANSCRIPT_MAP, origin, bytes)?;
        let columns = &table.columns;
        let mut warnings = table.warnings.clone();
        let mut records = Vec::new();

        for (line, row) in &table.rows {
            let (Some(gene), Some(accession)) = (columns.get(row, "gene"), columns.get(row, "transcript")) else {
                continue;
            };

            let clinical = match columns.get(row, "clinical") {
                None => false,
                Some(value) => parse_clinical_flag(value).unwrap_or_else(|| {
                    warnings.push(LoadWarning::new(
                        self.format(),
                        origin,
                        *line,
                        format!("unrecognized clinical flag \"{}\"; treated as not clinical", value),
                    ));
                    false
                }),
            };

            records.push(RawTranscriptLink {
                gene: gene.to_string(),
                accession: accession.to_string(),
                clinical,
                line: *line,
            });
        }

        Ok(LoadedSource {
            format: self.format(),
            origin: origin.to_string(),
            records: RawRecords::TranscriptMap(records),
            warnings,
        })
    }

    fn format(&self) -> SourceFormat {
        SourceFormat::TranscriptMap
    }
}

/// National test directory: clinical indication code → panel version
pub struct TestDirectoryLoader;

impl TestDirectoryLoader {
    pub fn new() -> Self {
        TestDirectoryLoader
    }
}

impl SourceLoader for TestDirectoryLoader {
    fn parse(&self, origin: &str, bytes: &[u8]) -> Result<LoadedSource, SourceError> {
        let table = read_table(self.format(), &schema::TEST_DIRECTORY, origin, bytes)?;
        let columns = &table.columns;

        let has_panel = columns.has("panel_id") && columns.has("panel_version");
        if !has_panel && !columns.has("gene") {
            return Err(SourceError::malformed(
                self.format(),
                origin,
                "needs \"panel_id\" and \"panel_version\" columns or a \"gene\" column",
            ));
        }

        let mut warnings = table.warnings;
        let mut records = Vec::new();

        for (line, row) in &table.rows {
            let Some(code) = columns.get(row, "code") else {
                continue;
            };

            // A panel version wins over a gene when a row names both
            let panel = columns.get(row, "panel_id").zip(columns.get(row, "panel_version"));
            let target = match (panel, columns.get(row, "gene")) {
                (Some((id, version)), _) => IndicationTarget::Panel(PanelKey::new(id, version)),
                (None, Some(gene)) => IndicationTarget::Gene(gene.to_string()),
                (None, None) => {
                    warnings.push(LoadWarning::new(
                        self.format(),
                        origin,
                        *line,
                        format!("indication {} has no panel version or gene; row skipped", code),
                    ));
                    continue;
                }
            };

            records.push(RawIndication {
                code: code.to_string(),
                name: columns.get(row, "name").map(str::to_string),
                method: columns.get(row, "method").map(abbreviate_method),
                target,
                line: *line,
            });
        }

        Ok(LoadedSource {
            format: self.format(),
            origin: origin.to_string(),
            records: RawRecords::TestDirectory(records),
            warnings,
        })
    }

    fn format(&self) -> SourceFormat {
        SourceFormat::TestDirectory
    }
}

/// Sample manifest: sample → clinical indication code
pub struct SampleManifestLoader;

impl SampleManifestLoader {
    pub fn new() -> Self {
        SampleManifestLoader
    }
}

impl SourceLoader for SampleManifestLoader {
    fn parse(&self, origin: &str, bytes: &[u8]) -> Result<LoadedSource, SourceError> {
        let table = read_table(self.format(), &schema::SAMPLE_MANIFEST, origin, bytes)?;
        let columns = &table.columns;

        let records = table
            .rows
            .iter()
            .filter_map(|(line, row)| {
                Some(RawSampleLink {
                    sample: columns.get(row, "sample")?.to_string(),
                    code: columns.get(row, "code")?.to_string(),
                    line: *line,
                })
            })
            .collect();

        Ok(LoadedSource {
            format: self.format(),
            origin: origin.to_string(),
            records: RawRecords::SampleManifest(records),
            warnings: table.warnings,
        })
    }

    fn format(&self) -> SourceFormat {
        SourceFormat::SampleManifest
    }
}

// ============================================================================
// PANEL DUMP LOADER (JSON)
// ============================================================================

/// Provider or bespoke panel dump. Both share one JSON shape.
pub struct PanelDumpLoader {
    format: SourceFormat,
}

impl PanelDumpLoader {
    pub fn provider() -> Self {
        PanelDumpLoader {
            format: SourceFormat::ProviderPanels,
        }
    }

    pub fn bespoke() -> Self {
        PanelDumpLoader {
            format: SourceFormat::BespokePanels,
        }
    }

    fn parse_gene(&self, item: &Value) -> Result<(RawGeneEntry, Option<String>), String> {
        if !item.is_object() {
            return Err("gene entry is not an object".to_string());
        }

        // Provider dumps sometimes nest identifiers under "gene_data"
        let nested = item.get("gene_data");
        let symbol = scalar_string(item.get("symbol"))
            .or_else(|| scalar_string(item.get("gene_symbol")))
            .or_else(|| scalar_string(nested.and_then(|d| d.get("gene_symbol"))));
        let hgnc_id = scalar_string(item.get("hgnc_id"))
            .or_else(|| scalar_string(nested.and_then(|d| d.get("hgnc_id"))));

        if symbol.is_none() && hgnc_id.is_none() {
            return Err("gene entry has neither symbol nor hgnc_id".to_string());
        }

        let raw_confidence = scalar_string(item.get("confidence"))
            .or_else(|| scalar_string(item.get("confidence_level")));
        let (confidence, note) = match raw_confidence.as_deref().and_then(Confidence::parse) {
            Some(confidence) => (confidence, None),
            None => (
                Confidence::Red,
                Some(format!(
                    "unrecognized confidence {} for gene {}; downgraded to red",
                    raw_confidence
                        .as_deref()
                        .map(|c| format!("\"{}\"", c))
                        .unwrap_or_else(|| "(missing)".to_string()),
                    symbol.as_deref().or(hgnc_id.as_deref()).unwrap_or_default()
                )),
            ),
        };

        let entry = RawGeneEntry {
            symbol,
            hgnc_id,
            confidence,
            transcript: scalar_string(item.get("transcript")),
        };
        Ok((entry, note))
    }
}

/// String or number → trimmed, non-empty string
fn scalar_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl SourceLoader for PanelDumpLoader {
    fn parse(&self, origin: &str, bytes: &[u8]) -> Result<LoadedSource, SourceError> {
        let json: Value = serde_json::from_slice(bytes)
            .map_err(|e| SourceError::malformed(self.format, origin, format!("not valid JSON: {}", e)))?;

        // Either [...] or { "panels": [...] } / { "results": [...] }
        let items = match &json {
            Value::Array(items) => items,
            Value::Object(map) => map
                .get("panels")
                .or_else(|| map.get("results"))
                .and_then(|v| v.as_array())
                .ok_or_else(|| {
                    SourceError::malformed(self.format, origin, "object has no \"panels\" or \"results\" array")
                })?,
            _ => {
                return Err(SourceError::malformed(
                    self.format,
                    origin,
                    "expected a top-level array of panels",
                ))
            }
        };

        let mut panels = Vec::new();
        let mut warnings = Vec::new();

        for (index, item) in items.iter().enumerate() {
            let line = index + 1;
            let mut warn = |message: String| {
                warnings.push(LoadWarning::new(self.format, origin, line, message));
            };

            let id = scalar_string(item.get("id"));
            let version = scalar_string(item.get("version"));
            let genes = item.get("genes").and_then(|g| g.as_array());
            let subpanels = item.get("subpanels").and_then(|s| s.as_array());

            // A superpanel may carry no genes of its own
            let (id, version) = match (id, version) {
                (Some(id), Some(version)) if genes.is_some() || subpanels.is_some() => (id, version),
                (id, version) => {
                    let missing: Vec<&str> = [
                        ("id", id.is_none()),
                        ("version", version.is_none()),
                        ("genes", genes.is_none() && subpanels.is_none()),
                    ]
                    .iter()
                    .filter(|(_, absent)| *absent)
                    .map(|(key, _)| *key)
                    .collect();
                    warn(format!("panel record missing {}; skipped", missing.join(", ")));
                    continue;
                }
            };

            let mut entries = Vec::new();
            for gene in genes.into_iter().flatten() {
                match self.parse_gene(gene) {
                    Ok((entry, note)) => {
                        if let Some(note) = note {
                            warn(format!("panel {} v{}: {}", id, version, note));
                        }
                        entries.push(entry);
                    }
                    Err(message) => warn(format!("panel {} v{}: {}; skipped", id, version, message)),
                }
            }

            let indications = item
                .get("indications")
                .and_then(|v| v.as_array())
                .map(|codes| codes.iter().filter_map(|c| scalar_string(Some(c))).collect())
                .unwrap_or_default();

            let mut members = Vec::new();
            for subpanel in subpanels.into_iter().flatten() {
                match (scalar_string(subpanel.get("id")), scalar_string(subpanel.get("version"))) {
                    (Some(sub_id), Some(sub_version)) => members.push(PanelKey::new(&sub_id, &sub_version)),
                    _ => warn(format!(
                        "panel {} v{}: subpanel entry needs id and version; skipped",
                        id, version
                    )),
                }
            }

            panels.push(RawPanel {
                name: scalar_string(item.get("name")),
                id,
                version,
                genes: entries,
                indications,
                subpanels: members,
                line,
            });
        }

        debug!(origin = %origin, panels = panels.len(), "panel dump parsed");

        Ok(LoadedSource {
            format: self.format,
            origin: origin.to_string(),
            records: RawRecords::Panels(panels),
            warnings,
        })
    }

    fn format(&self) -> SourceFormat {
        self.format
    }
}

// ============================================================================
// TESTS
// ============================================================================
