// 🏭 Artifact Generator
//
// Pure functions of (snapshot, filter policy, run date):
// - Fixture: table-grouped, upsert-keyed, referents before referrers
// - Flat dumps: one row per relation, sorted, RNA + mitochondrial genes
//   ALWAYS removed (clinically-facing only; never the fixture)
//
// Writing the bytes to disk is output.rs's job.

use crate::entities::{Gene, GeneRef, PanelKey};
use crate::error::EmitError;
use crate::snapshot::CanonicalSnapshot;
use chrono::NaiveDate;
use csv::WriterBuilder;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;
use uuid::Uuid;

pub const FIXTURE_FORMAT: &str = "panel-reconcile-fixture/1";

// ============================================================================
// FORMATS & POLICY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArtifactFormat {
    Fixture,
    PanelGenes,
    SampleGenes,
    GeneTranscripts,
    NoClinicalTranscript,
}

impl ArtifactFormat {
    pub const ALL: [ArtifactFormat; 5] = [
        ArtifactFormat::Fixture,
        ArtifactFormat::PanelGenes,
        ArtifactFormat::SampleGenes,
        ArtifactFormat::GeneTranscripts,
        ArtifactFormat::NoClinicalTranscript,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            ArtifactFormat::Fixture => "fixture.json",
            ArtifactFormat::PanelGenes => "genepanels.tsv",
            ArtifactFormat::SampleGenes => "sample2genes.tsv",
            ArtifactFormat::GeneTranscripts => "g2t.tsv",
            ArtifactFormat::NoClinicalTranscript => "no_clinical_transcript.txt",
        }
    }

    /// Flat dumps apply the RNA/mitochondrial exclusion; the fixture does not
    pub fn is_clinical_dump(&self) -> bool {
        !matches!(self, ArtifactFormat::Fixture)
    }
}

/// Optional subset of panels / indications to emit.
///
/// The RNA/mitochondrial exclusion is not part of the policy and cannot be
/// switched off.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterPolicy {
    /// Panel ids to keep (all versions)
    pub panels: Option<BTreeSet<String>>,

    /// Clinical indication codes to keep
    pub indications: Option<BTreeSet<String>>,
}

impl FilterPolicy {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_unrestricted(&self) -> bool {
        self.panels.is_none() && self.indications.is_none()
    }
}

/// Encoded artifact, not yet written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub format: ArtifactFormat,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Gene may appear in clinically-facing dumps
pub fn is_reportable(gene: &Gene) -> bool {
    !gene.is_clinically_excluded()
}

// ============================================================================
// EMIT
// ============================================================================

/// Serialize a (filtered) snapshot into one artifact
pub fn emit(
    snapshot: &CanonicalSnapshot,
    format: ArtifactFormat,
    policy: &FilterPolicy,
    run_date: NaiveDate,
) -> Result<Artifact, EmitError> {
    let view = filtered(snapshot, policy);

    let bytes = match format {
        ArtifactFormat::Fixture => fixture(&view, run_date)?,
        ArtifactFormat::PanelGenes => panel_genes(&view)?,
        ArtifactFormat::SampleGenes => sample_genes(&view)?,
        ArtifactFormat::GeneTranscripts => gene_transcripts(&view)?,
        ArtifactFormat::NoClinicalTranscript => no_clinical_transcript(&view),
    };

    debug!(artifact = format.file_name(), bytes = bytes.len(), "artifact encoded");
    Ok(Artifact {
        format,
        file_name: format.file_name().to_string(),
        bytes,
    })
}

/// Subset of the snapshot selected by the policy, closed over references:
/// kept panels bring their subpanels and genes, kept genes bring their
/// transcripts.
pub fn filtered(snapshot: &CanonicalSnapshot, policy: &FilterPolicy) -> CanonicalSnapshot {
    if policy.is_unrestricted() {
        return snapshot.clone();
    }

    let code_selected = |code: &str| policy.indications.as_ref().map_or(true, |codes| codes.contains(code));
    let panel_selected = |panel_id: &str| policy.panels.as_ref().map_or(true, |ids| ids.contains(panel_id));

    let mut view = CanonicalSnapshot::new();

    view.indications = snapshot
        .indications
        .iter()
        .filter(|(code, indication)| code_selected(code) && panel_selected(&indication.panel.panel_id))
        .map(|(code, indication)| (code.clone(), indication.clone()))
        .collect();

    let bound: BTreeSet<_> = view.indications.values().map(|ci| ci.panel.clone()).collect();
    view.panels = snapshot
        .panels
        .iter()
        .filter(|(key, _)| panel_selected(&key.panel_id))
        .filter(|(key, _)| policy.indications.is_none() || bound.contains(*key))
        .map(|(key, panel)| (key.clone(), panel.clone()))
        .collect();

    // Subpanels of kept superpanels come along whatever the filter says
    let mut pending: Vec<PanelKey> = view.panels.values().flat_map(|p| p.subpanels.iter().cloned()).collect();
    while let Some(key) = pending.pop() {
        if view.panels.contains_key(&key) {
            continue;
        }
        if let Some(panel) = snapshot.panels.get(&key) {
            pending.extend(panel.subpanels.iter().cloned());
            view.panels.insert(key, panel.clone());
        }
    }

    let gene_ids: BTreeSet<&str> = view
        .panels
        .values()
        .flat_map(|panel| panel.genes.keys())
        .filter_map(GeneRef::hgnc_id)
        .collect();

    view.genes = snapshot
        .genes
        .iter()
        .filter(|(id, _)| gene_ids.contains(id.as_str()))
        .map(|(id, gene)| (id.clone(), gene.clone()))
        .collect();

    view.transcripts = snapshot
        .transcripts
        .iter()
        .filter(|(_, tx)| tx.gene.hgnc_id().map_or(false, |id| gene_ids.contains(id)))
        .map(|(accession, tx)| (accession.clone(), tx.clone()))
        .collect();

    view.samples = snapshot
        .samples
        .iter()
        .filter_map(|(sample, codes)| {
            let kept: BTreeSet<String> = codes
                .iter()
                .filter(|code| view.indications.contains_key(*code))
                .cloned()
                .collect();
            (!kept.is_empty()).then(|| (sample.clone(), kept))
        })
        .collect();

    view.provenance = snapshot.provenance.clone();
    view
}

// ============================================================================
// FIXTURE
// ============================================================================

/// Stable across runs: derived from table + natural key only
pub fn record_uid(table: &str, key: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("{}:{}", table, key).as_bytes())
}

fn record(table: &str, key: String, fields: Value) -> Value {
    json!({
        "uid": record_uid(table, &key).to_string(),
        "key": key,
        "fields": fields,
    })
}

fn block(table: &str, records: Vec<Value>) -> Value {
    json!({ "table": table, "records": records })
}

fn fixture(view: &CanonicalSnapshot, run_date: NaiveDate) -> Result<Vec<u8>, EmitError> {
    let genes = view
        .genes
        .values()
        .map(|gene| {
            record(
                "gene",
                gene.hgnc_id.clone(),
                json!({
                    "hgnc_id": gene.hgnc_id,
                    "symbol": gene.symbol,
                    "aliases": gene.aliases,
                    "is_rna": gene.is_rna,
                    "is_mitochondrial": gene.is_mitochondrial,
                }),
            )
        })
        .collect();

    let transcripts = view
        .transcripts
        .values()
        .map(|tx| {
            record(
                "transcript",
                tx.accession.clone(),
                json!({
                    "accession": tx.accession,
                    "gene": tx.gene.to_string(),
                    "clinical": tx.clinical,
                    "flagged": tx.is_flagged(),
                }),
            )
        })
        .collect();

    let panels = view
        .panels
        .values()
        .map(|panel| {
            record(
                "panel",
                panel.key.to_string(),
                json!({
                    "panel_id": panel.key.panel_id,
                    "version": panel.key.version,
                    "name": panel.name,
                    "source": panel.source.as_str(),
                }),
            )
        })
        .collect();

    let panel_genes = view
        .panels
        .values()
        .flat_map(|panel| {
            panel.genes.iter().map(move |(gene, entry)| {
                record(
                    "panel_gene",
                    format!("{}|{}", panel.key, gene),
                    json!({
                        "panel": panel.key.to_string(),
                        "gene": gene.to_string(),
                        "confidence": entry.confidence.as_str(),
                        "raw_symbol": entry.raw_symbol,
                        "flagged": !gene.is_resolved(),
                    }),
                )
            })
        })
        .collect();

    let superpanels = view
        .panels
        .values()
        .flat_map(|panel| {
            panel.subpanels.iter().map(move |subpanel| {
                record(
                    "superpanel",
                    format!("{}|{}", panel.key, subpanel),
                    json!({
                        "superpanel": panel.key.to_string(),
                        "panel": subpanel.to_string(),
                    }),
                )
            })
        })
        .collect();

    let indications = view
        .indications
        .values()
        .map(|ci| {
            record(
                "clinical_indication",
                ci.code.clone(),
                json!({
                    "code": ci.code,
                    "name": ci.name,
                    "method": ci.method,
                    "panel": ci.panel.to_string(),
                    "flagged": ci.flagged,
                }),
            )
        })
        .collect();

    let document = json!({
        "format": FIXTURE_FORMAT,
        "run_date": run_date.format("%Y-%m-%d").to_string(),
        "blocks": [
            block("gene", genes),
            block("transcript", transcripts),
            block("panel", panels),
            block("panel_gene", panel_genes),
            block("superpanel", superpanels),
            block("clinical_indication", indications),
        ],
    });

    let mut bytes = serde_json::to_vec_pretty(&document).map_err(|e| EmitError::Encode {
        artifact: ArtifactFormat::Fixture.file_name().to_string(),
        message: e.to_string(),
    })?;
    bytes.push(b'\n');
    Ok(bytes)
}

// ============================================================================
// FLAT DUMPS
// ============================================================================

fn write_tsv(format: ArtifactFormat, header: &[&str], rows: Vec<Vec<String>>) -> Result<Vec<u8>, EmitError> {
    let encode_error = |message: String| EmitError::Encode {
        artifact: format.file_name().to_string(),
        message,
    };

    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(Vec::new());

    writer.write_record(header).map_err(|e| encode_error(e.to_string()))?;
    for row in rows {
        writer.write_record(&row).map_err(|e| encode_error(e.to_string()))?;
    }

    writer.into_inner().map_err(|e| encode_error(e.to_string()))
}

/// Resolved, reportable gene behind a reference
fn reportable<'s>(view: &'s CanonicalSnapshot, gene: &GeneRef) -> Option<&'s Gene> {
    view.gene(gene).filter(|g| is_reportable(g))
}

/// genepanels.tsv: panel → gene; a superpanel lists its subpanels' genes
fn panel_genes(view: &CanonicalSnapshot) -> Result<Vec<u8>, EmitError> {
    let mut rows = Vec::new();

    for panel in view.panels.values() {
        for (gene_ref, confidence) in view.expanded_genes(&panel.key) {
            let Some(gene) = reportable(view, gene_ref) else {
                continue;
            };
            rows.push(vec![
                panel.key.panel_id.clone(),
                panel.key.version.clone(),
                panel.name.clone().unwrap_or_default(),
                gene.hgnc_id.clone(),
                gene.symbol.clone(),
                confidence.to_string(),
            ]);
        }
    }

    write_tsv(
        ArtifactFormat::PanelGenes,
        &["panel_id", "panel_version", "panel_name", "hgnc_id", "symbol", "confidence"],
        rows,
    )
}

/// sample2genes.tsv: sample → clinical indication → gene
fn sample_genes(view: &CanonicalSnapshot) -> Result<Vec<u8>, EmitError> {
    let mut rows = Vec::new();

    for (sample, codes) in &view.samples {
        for code in codes {
            let Some(indication) = view.indications.get(code).filter(|ci| !ci.flagged) else {
                continue;
            };
            let Some(panel) = view.panel_for_indication(code) else {
                continue;
            };

            for gene_ref in view.expanded_genes(&panel.key).into_keys() {
                if let Some(gene) = reportable(view, gene_ref) {
                    rows.push(vec![
                        sample.clone(),
                        indication.label(),
                        gene.hgnc_id.clone(),
                        gene.symbol.clone(),
                    ]);
                }
            }
        }
    }

    write_tsv(
        ArtifactFormat::SampleGenes,
        &["sample", "clinical_indication", "hgnc_id", "symbol"],
        rows,
    )
}

/// g2t.tsv: gene → transcript, grouped by gene
fn gene_transcripts(view: &CanonicalSnapshot) -> Result<Vec<u8>, EmitError> {
    let mut by_gene: BTreeMap<&str, Vec<(&str, bool)>> = BTreeMap::new();

    for tx in view.transcripts.values() {
        if let Some(gene) = reportable(view, &tx.gene) {
            by_gene
                .entry(gene.hgnc_id.as_str())
                .or_default()
                .push((tx.accession.as_str(), tx.clinical));
        }
    }

    let rows = by_gene
        .into_iter()
        .flat_map(|(hgnc_id, transcripts)| {
            let symbol = view.genes.get(hgnc_id).map(|g| g.symbol.clone()).unwrap_or_default();
            transcripts.into_iter().map(move |(accession, clinical)| {
                vec![
                    hgnc_id.to_string(),
                    symbol.clone(),
                    accession.to_string(),
                    if clinical { "clinical_transcript" } else { "not_clinical_transcript" }.to_string(),
                ]
            })
        })
        .collect();

    write_tsv(
        ArtifactFormat::GeneTranscripts,
        &["hgnc_id", "symbol", "transcript", "clinical"],
        rows,
    )
}

/// no_clinical_transcript.txt: reportable genes lacking a clinical transcript
fn no_clinical_transcript(view: &CanonicalSnapshot) -> Vec<u8> {
    let mut out = String::new();

    for gene in view.genes.values().filter(|g| is_reportable(g)) {
        if view.clinical_transcripts(&gene.hgnc_id).next().is_none() {
            out.push_str(&format!("{}\t{}\n", gene.hgnc_id, gene.symbol));
        }
    }

    out.into_bytes()
}

// ============================================================================
// TESTS
// ============================================================================
