// 🔀 Canonical Model Builder
//
// Merges every loaded source into one CanonicalSnapshot:
// 1. Nomenclature sources build the per-run GeneIndex (first, whatever their position)
// 2. Every other source is turned into claims, in load order
// 3. Claims are settled through the precedence table; each disagreement
//    becomes a ConflictRecord
//
// Same sources in the same order → byte-identical snapshot and conflicts.

use crate::entities::{
    ClinicalIndication, Confidence, GeneRef, Panel, PanelGene, PanelKey, PanelSource, Transcript,
};
use crate::error::ReconcileError;
use crate::normalizer::{GeneIndex, Resolution};
use crate::parser::{
    get_loader, IndicationTarget, LoadWarning, LoadedSource, RawIndication, RawPanel, RawRecords,
    RawSampleLink, RawTranscriptLink, SourceFormat,
};
use crate::precedence::{
    Attribute, Candidate, Claim, ClaimSet, ConflictKind, ConflictRecord, EntityType,
};
use crate::snapshot::{CanonicalSnapshot, SourceProvenance};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

// ============================================================================
// PUBLIC API
// ============================================================================

/// Output of one merge pass
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub snapshot: CanonicalSnapshot,

    /// Sorted by (entity, key, attribute, kind)
    pub conflicts: Vec<ConflictRecord>,

    /// Row-level warnings from the loaders, plus merge-level ones
    pub warnings: Vec<LoadWarning>,
}

/// Merge loaded sources into one canonical snapshot.
///
/// Source order matters: it is the recency order used to break ties
/// between sources of equal rank.
pub fn reconcile(sources: &[LoadedSource]) -> Result<Reconciliation, ReconcileError> {
    let mut builder = Builder::new(sources)?;

    for (position, source) in sources.iter().enumerate() {
        builder.ingest(position, source);
    }

    let reconciliation = builder.build();
    info!(
        genes = reconciliation.snapshot.genes.len(),
        transcripts = reconciliation.snapshot.transcripts.len(),
        panels = reconciliation.snapshot.panels.len(),
        indications = reconciliation.snapshot.indications.len(),
        conflicts = reconciliation.conflicts.len(),
        warnings = reconciliation.warnings.len(),
        "merge complete"
    );
    Ok(reconciliation)
}

// ============================================================================
// PANEL DRAFT
// ============================================================================

/// One source's definition of a panel version, genes already resolved
#[derive(Debug, Clone)]
struct PanelDraft {
    name: Option<String>,
    source: PanelSource,
    genes: BTreeMap<GeneRef, PanelGene>,
    subpanels: BTreeSet<PanelKey>,

    /// (accession, gene) transcript hints; only the winning draft's count
    hints: Vec<(String, GeneRef)>,
}

/// Two drafts agree when name, subpanels and gene → confidence agree. Raw
/// spellings, hints and the source they came from do not matter.
impl PartialEq for PanelDraft {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.subpanels == other.subpanels
            && self.genes.len() == other.genes.len()
            && self
                .genes
                .iter()
                .zip(other.genes.iter())
                .all(|((a, ga), (b, gb))| a == b && ga.confidence == gb.confidence)
    }
}

impl PanelDraft {
    fn label(&self) -> String {
        let genes: Vec<String> = self
            .genes
            .iter()
            .map(|(gene, entry)| format!("{}:{}", gene, entry.confidence))
            .collect();
        let mut label = format!(
            "{} [{}]",
            self.name.as_deref().unwrap_or("(unnamed)"),
            genes.join(", ")
        );
        if !self.subpanels.is_empty() {
            let subpanels: Vec<String> = self.subpanels.iter().map(PanelKey::to_string).collect();
            label.push_str(&format!(" + [{}]", subpanels.join(", ")));
        }
        label
    }
}

/// Raw panel waiting for gene identity to settle
struct PendingPanel<'a> {
    format: SourceFormat,
    origin: &'a str,
    order: (usize, usize),
    raw: &'a RawPanel,
}

// ============================================================================
// BUILDER
// ============================================================================

struct Builder<'a> {
    index: GeneIndex,
    nomenclature_origin: String,
    nomenclature_position: usize,

    identity: ClaimSet<String, GeneRef>,
    clinical: ClaimSet<String, String>,
    owners: ClaimSet<String, GeneRef>,
    compositions: ClaimSet<PanelKey, PanelDraft>,
    bindings: ClaimSet<String, PanelKey>,

    /// HGNC IDs targeted directly by test-directory rows
    single_genes: BTreeSet<String>,

    pending_panels: Vec<PendingPanel<'a>>,
    details: BTreeMap<String, (Option<String>, Option<String>)>,
    samples: Vec<(&'a str, &'a RawSampleLink)>,

    provenance: Vec<SourceProvenance>,
    conflicts: Vec<ConflictRecord>,
    warnings: Vec<LoadWarning>,
}

impl<'a> Builder<'a> {
    /// Build the gene index from every nomenclature source
    fn new(sources: &'a [LoadedSource]) -> Result<Self, ReconcileError> {
        let mut index = GeneIndex::new();
        let mut warnings = Vec::new();
        let mut first_nomenclature = None;

        for (position, source) in sources.iter().enumerate() {
            let RawRecords::Nomenclature(rows) = &source.records else {
                continue;
            };
            first_nomenclature.get_or_insert((position, source.origin.clone()));

            for row in rows {
                if let Err(message) = index.insert(row) {
                    warnings.push(LoadWarning::new(source.format, &source.origin, row.line, message));
                }
            }
        }

        let Some((nomenclature_position, nomenclature_origin)) = first_nomenclature else {
            return Err(ReconcileError::MissingNomenclature(sources.len()));
        };
        debug!(genes = index.len(), "gene index built");

        Ok(Builder {
            index,
            nomenclature_origin,
            nomenclature_position,
            identity: ClaimSet::new(Attribute::GeneIdentity),
            clinical: ClaimSet::new(Attribute::ClinicalTranscript),
            owners: ClaimSet::new(Attribute::TranscriptOwner),
            compositions: ClaimSet::new(Attribute::PanelComposition),
            bindings: ClaimSet::new(Attribute::IndicationBinding),
            single_genes: BTreeSet::new(),
            pending_panels: Vec::new(),
            details: BTreeMap::new(),
            samples: Vec::new(),
            provenance: Vec::new(),
            conflicts: Vec::new(),
            warnings,
        })
    }

    fn ingest(&mut self, position: usize, source: &'a LoadedSource) {
        self.provenance.push(SourceProvenance {
            format: source.format,
            origin: source.origin.clone(),
            loader_version: get_loader(source.format).version().to_string(),
            records: source.records.len(),
            warnings: source.warnings.len(),
        });
        self.warnings.extend(source.warnings.iter().cloned());

        match &source.records {
            RawRecords::Nomenclature(_) => {}
            RawRecords::TranscriptMap(rows) => {
                for row in rows {
                    self.ingest_transcript(position, source, row);
                }
            }
            RawRecords::Panels(panels) => {
                for panel in panels {
                    self.ingest_panel(position, source, panel);
                }
            }
            RawRecords::TestDirectory(rows) => {
                for row in rows {
                    self.ingest_indication(position, source, row);
                }
            }
            RawRecords::SampleManifest(rows) => {
                self.samples.extend(rows.iter().map(|row| (source.origin.as_str(), row)));
            }
        }
    }

    fn claim<V>(value: V, source: &LoadedSource, order: (usize, usize)) -> Claim<V> {
        Claim {
            value,
            source: source.format,
            origin: source.origin.clone(),
            order,
        }
    }

    fn ingest_transcript(&mut self, position: usize, source: &LoadedSource, row: &RawTranscriptLink) {
        let order = (position, row.line);
        let resolution = self.index.resolve(&row.gene);

        if let Resolution::Unresolved { raw, candidates } = &resolution {
            let candidate = Self::candidate(raw, source, Attribute::TranscriptOwner);
            self.conflicts.push(ConflictRecord::unresolvable(
                EntityType::Transcript,
                &row.accession,
                Attribute::TranscriptOwner,
                candidate,
                candidates,
            ));
        }

        if let (true, Some(id)) = (row.clinical, resolution.hgnc_id()) {
            self.clinical
                .push(id.to_string(), Self::claim(row.accession.clone(), source, order));
        }

        self.owners.push(
            row.accession.clone(),
            Self::claim(resolution.gene_ref(), source, order),
        );
    }

    fn ingest_panel(&mut self, position: usize, source: &'a LoadedSource, panel: &'a RawPanel) {
        let order = (position, panel.line);
        let key = PanelKey::new(&panel.id, &panel.version);

        for entry in &panel.genes {
            let symbol_resolution = entry.symbol.as_deref().map(|s| self.index.resolve(s));
            let identity_key = entry.symbol.clone().or_else(|| entry.hgnc_id.clone());
            let Some(identity_key) = identity_key else {
                continue;
            };

            // The nomenclature speaks for any symbol it knows
            if let Some(Resolution::Resolved { hgnc_id, .. }) = &symbol_resolution {
                if !self.identity.contains(&identity_key) {
                    self.identity.push(
                        identity_key.clone(),
                        Claim {
                            value: GeneRef::Resolved(hgnc_id.clone()),
                            source: SourceFormat::Nomenclature,
                            origin: self.nomenclature_origin.clone(),
                            order: (self.nomenclature_position, 0),
                        },
                    );
                }
            }

            // The dump speaks through its own ID, or for a symbol nobody knows
            let dump_value = match &entry.hgnc_id {
                Some(id) => match self.index.resolve(id) {
                    Resolution::Resolved { hgnc_id, .. } => Some(GeneRef::Resolved(hgnc_id)),
                    Resolution::Unresolved { .. } => Some(GeneRef::Unresolved(identity_key.clone())),
                },
                None => match &symbol_resolution {
                    Some(Resolution::Resolved { .. }) => None,
                    _ => Some(GeneRef::Unresolved(identity_key.clone())),
                },
            };
            if let Some(value) = dump_value {
                self.identity
                    .push(identity_key, Self::claim(value, source, order));
            }
        }

        for code in &panel.indications {
            self.bindings
                .push(code.clone(), Self::claim(key.clone(), source, order));
        }

        self.pending_panels.push(PendingPanel {
            format: source.format,
            origin: &source.origin,
            order,
            raw: panel,
        });
    }

    fn ingest_indication(&mut self, position: usize, source: &LoadedSource, row: &RawIndication) {
        let key = match &row.target {
            IndicationTarget::Panel(key) => key.clone(),
            IndicationTarget::Gene(raw) => match self.index.resolve(raw) {
                Resolution::Resolved { hgnc_id, .. } => {
                    let key = PanelKey::new(&hgnc_id, "1");
                    self.single_genes.insert(hgnc_id);
                    key
                }
                Resolution::Unresolved { raw, candidates } => {
                    let candidate = Self::candidate(&raw, source, Attribute::GeneIdentity);
                    self.conflicts.push(ConflictRecord::unresolvable(
                        EntityType::ClinicalIndication,
                        &row.code,
                        Attribute::GeneIdentity,
                        candidate,
                        &candidates,
                    ));
                    // Never becomes a panel, so the binding ends up flagged
                    PanelKey::new(&raw, "1")
                }
            },
        };
        self.bindings
            .push(row.code.clone(), Self::claim(key, source, (position, row.line)));

        // Latest row with a value wins
        let details = self.details.entry(row.code.clone()).or_default();
        if row.name.is_some() {
            details.0 = row.name.clone();
        }
        if row.method.is_some() {
            details.1 = row.method.clone();
        }
    }

    fn candidate(value: &str, source: &LoadedSource, attribute: Attribute) -> Candidate {
        Candidate {
            value: value.to_string(),
            source: source.format,
            origin: source.origin.clone(),
            rank: attribute.rank(source.format),
        }
    }

    // ========================================================================
    // BUILD
    // ========================================================================

    fn build(mut self) -> Reconciliation {
        // 1. Gene identity
        let (identities, conflicts) = self
            .identity
            .resolve(|symbol| symbol.clone(), |gene| gene.to_string());
        self.conflicts.extend(conflicts);
        let identities: BTreeMap<String, GeneRef> = identities
            .into_iter()
            .map(|(symbol, claim)| (symbol, claim.value))
            .collect();

        // 2. Panel drafts with resolved genes
        for pending in std::mem::take(&mut self.pending_panels) {
            let draft = self.materialize(&pending, &identities);
            self.compositions.push(
                PanelKey::new(&pending.raw.id, &pending.raw.version),
                Claim {
                    value: draft,
                    source: pending.format,
                    origin: pending.origin.to_string(),
                    order: pending.order,
                },
            );
        }

        // 3. Panel composition
        let (compositions, conflicts) = self
            .compositions
            .resolve(|key| key.to_string(), PanelDraft::label);
        self.conflicts.extend(conflicts);

        let mut snapshot = CanonicalSnapshot::new();
        let mut defined_by: BTreeMap<PanelKey, (SourceFormat, String)> = BTreeMap::new();
        for (key, claim) in compositions {
            let Claim { value: draft, source, origin, order } = claim;

            // Transcript hints ride with the winning composition only
            for (accession, gene) in draft.hints {
                if let Some(id) = gene.hgnc_id() {
                    self.clinical.push(
                        id.to_string(),
                        Claim { value: accession.clone(), source, origin: origin.clone(), order },
                    );
                }
                self.owners
                    .push(accession, Claim { value: gene, source, origin: origin.clone(), order });
            }

            let mut panel = Panel::new(key.clone(), draft.name, draft.source);
            panel.genes = draft.genes;
            panel.subpanels = draft.subpanels;
            snapshot.panels.insert(key.clone(), panel);
            defined_by.insert(key, (source, origin));
        }

        // Single-gene panels; a dumped panel under the same key is kept
        for id in &self.single_genes {
            if let Some(gene) = self.index.gene(id) {
                let panel = Panel::single_gene(id, &gene.symbol);
                snapshot.panels.entry(panel.key.clone()).or_insert(panel);
            }
        }

        // Superpanels may only point at panels that exist
        let known: BTreeSet<PanelKey> = snapshot.panels.keys().cloned().collect();
        for panel in snapshot.panels.values_mut() {
            let missing: Vec<PanelKey> = panel.subpanels.difference(&known).cloned().collect();
            let Some((source, origin)) = defined_by.get(&panel.key) else {
                continue;
            };
            for subpanel in missing {
                panel.subpanels.remove(&subpanel);
                self.conflicts.push(ConflictRecord {
                    entity: EntityType::Panel,
                    key: panel.key.to_string(),
                    attribute: Attribute::PanelComposition,
                    kind: ConflictKind::Unresolvable,
                    candidates: vec![Candidate {
                        value: subpanel.to_string(),
                        source: *source,
                        origin: origin.clone(),
                        rank: Attribute::PanelComposition.rank(*source),
                    }],
                    chosen: None,
                    detail: Some(format!("subpanel {} is not defined by any source", subpanel)),
                });
            }
        }

        // 4. Transcripts
        let (owners, conflicts) = self
            .owners
            .resolve(|accession| accession.clone(), |gene| gene.to_string());
        self.conflicts.extend(conflicts);

        let (clinical, conflicts) = self
            .clinical
            .resolve(|id| id.clone(), |accession| accession.clone());
        self.conflicts.extend(conflicts);

        for (accession, claim) in owners {
            let gene = claim.value;
            let is_clinical = gene
                .hgnc_id()
                .and_then(|id| clinical.get(id))
                .map(|chosen| chosen.value == accession)
                .unwrap_or(false);
            snapshot
                .transcripts
                .insert(accession.clone(), Transcript::new(&accession, gene, is_clinical));
        }

        // 5. Genes referenced by panels or owning transcripts
        let referenced: BTreeSet<&str> = snapshot
            .panels
            .values()
            .flat_map(|panel| panel.genes.keys())
            .chain(snapshot.transcripts.values().map(|tx| &tx.gene))
            .filter_map(GeneRef::hgnc_id)
            .collect();
        for id in referenced {
            if let Some(gene) = self.index.gene(id) {
                snapshot.genes.insert(id.to_string(), gene.clone());
            }
        }

        // 6. Clinical indications
        let (bindings, conflicts) = self
            .bindings
            .resolve(|code| code.clone(), |key| key.to_string());
        self.conflicts.extend(conflicts);

        for (code, claim) in bindings {
            let mut indication = ClinicalIndication::new(&code, claim.value.clone());
            if let Some((name, method)) = self.details.get(&code) {
                indication.name = name.clone();
                indication.method = method.clone();
            }

            if !snapshot.panels.contains_key(&indication.panel) {
                indication.flagged = true;
                self.conflicts.push(ConflictRecord::unresolvable(
                    EntityType::ClinicalIndication,
                    &code,
                    Attribute::IndicationBinding,
                    Candidate {
                        value: claim.value.to_string(),
                        source: claim.source,
                        origin: claim.origin.clone(),
                        rank: Attribute::IndicationBinding.rank(claim.source),
                    },
                    &[],
                ));
            }
            snapshot.indications.insert(code, indication);
        }

        // 7. Samples
        for (origin, row) in &self.samples {
            if !snapshot.indications.contains_key(&row.code) {
                self.warnings.push(LoadWarning::new(
                    SourceFormat::SampleManifest,
                    origin,
                    row.line,
                    format!("sample {} uses unknown clinical indication {}", row.sample, row.code),
                ));
            }
            snapshot
                .samples
                .entry(row.sample.clone())
                .or_default()
                .insert(row.code.clone());
        }

        snapshot.provenance = self.provenance;

        let mut conflicts = self.conflicts;
        conflicts.sort();
        conflicts.dedup();

        Reconciliation {
            snapshot,
            conflicts,
            warnings: self.warnings,
        }
    }

    /// Resolve the genes of one raw panel, collapsing duplicates
    fn materialize(&mut self, pending: &PendingPanel, identities: &BTreeMap<String, GeneRef>) -> PanelDraft {
        let raw = pending.raw;
        let key = PanelKey::new(&raw.id, &raw.version);
        let source = match pending.format {
            SourceFormat::BespokePanels => PanelSource::Bespoke,
            _ => PanelSource::Provider,
        };

        let mut genes: BTreeMap<GeneRef, PanelGene> = BTreeMap::new();
        let mut duplicates: BTreeMap<GeneRef, Vec<(String, Confidence)>> = BTreeMap::new();
        let mut hints = Vec::new();

        for entry in &raw.genes {
            let Some(identity_key) = entry.symbol.as_ref().or(entry.hgnc_id.as_ref()) else {
                continue;
            };
            let gene = identities
                .get(identity_key)
                .cloned()
                .unwrap_or_else(|| GeneRef::Unresolved(identity_key.clone()));

            if let GeneRef::Unresolved(raw_id) = &gene {
                let ambiguous = match self.index.resolve(raw_id) {
                    Resolution::Unresolved { candidates, .. } => candidates,
                    Resolution::Resolved { .. } => Vec::new(),
                };
                self.conflicts.push(ConflictRecord::unresolvable(
                    EntityType::Panel,
                    &key.to_string(),
                    Attribute::GeneIdentity,
                    Candidate {
                        value: raw_id.clone(),
                        source: pending.format,
                        origin: pending.origin.to_string(),
                        rank: Attribute::GeneIdentity.rank(pending.format),
                    },
                    &ambiguous,
                ));
            }

            // Transcript hints for resolved genes, applied if this draft wins
            if let (Some(accession), true) = (&entry.transcript, gene.is_resolved()) {
                hints.push((accession.clone(), gene.clone()));
            }

            let raw_symbol = identity_key.clone();
            match genes.get_mut(&gene) {
                Some(existing) => {
                    duplicates
                        .entry(gene.clone())
                        .or_insert_with(|| vec![(existing.raw_symbol.clone(), existing.confidence)])
                        .push((raw_symbol, entry.confidence));
                    existing.confidence = existing.confidence.max(entry.confidence);
                }
                None => {
                    genes.insert(
                        gene,
                        PanelGene {
                            confidence: entry.confidence,
                            raw_symbol,
                        },
                    );
                }
            }
        }

        for (gene, listed) in duplicates {
            let mut candidates: Vec<Candidate> = listed
                .iter()
                .map(|(symbol, confidence)| Candidate {
                    value: format!("{}:{}", symbol, confidence),
                    source: pending.format,
                    origin: pending.origin.to_string(),
                    rank: Attribute::PanelMembership.rank(pending.format),
                })
                .collect();
            candidates.sort_by(|a, b| b.value.cmp(&a.value));
            candidates.dedup();

            let kept = genes.get(&gene).map(|entry| entry.confidence).unwrap_or(Confidence::Red);
            self.conflicts.push(ConflictRecord {
                entity: EntityType::Panel,
                key: key.to_string(),
                attribute: Attribute::PanelMembership,
                kind: ConflictKind::EqualRank,
                candidates,
                chosen: Some(format!("{}:{}", gene, kept)),
                detail: Some(format!("{} listed {} times; highest confidence kept", gene, listed.len())),
            });
        }

        PanelDraft {
            name: raw.name.clone(),
            source,
            genes,
            subpanels: raw.subpanels.iter().cloned().collect(),
            hints,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{RawGeneEntry, RawNomenclature};
    use pretty_assertions::assert_eq;

    fn nomenclature(rows: &[(&str, &str, &[&str])]) -> LoadedSource {
        LoadedSource {
            format: SourceFormat::Nomenclature,
            origin: "hgnc.txt".to_string(),
            records: RawRecords::Nomenclature(
                rows.iter()
                    .enumerate()
                    .map(|(i, (id, symbol, aliases))| RawNomenclature {
                        hgnc_id: id.to_string(),
                        symbol: symbol.to_string(),
                        aliases: aliases.iter().map(|a| a.to_string()).collect(),
                        previous_symbols: Vec::new(),
                        locus_group: None,
                        chromosome: None,
                        line: i + 2,
                    })
                    .collect(),
            ),
            warnings: Vec::new(),
        }
    }

    fn reference() -> LoadedSource {
        nomenclature(&[
            ("HGNC:1100", "BRCA1", &["RNF53"]),
            ("HGNC:1101", "BRCA2", &["FANCD1"]),
            ("HGNC:7455", "MT-ND1", &[]),
        ])
    }

    fn gene(symbol: &str, confidence: Confidence) -> RawGeneEntry {
        RawGeneEntry {
            symbol: Some(symbol.to_string()),
            hgnc_id: None,
            confidence,
            transcript: None,
        }
    }

    fn panels(format: SourceFormat, origin: &str, panels: Vec<RawPanel>) -> LoadedSource {
        LoadedSource {
            format,
            origin: origin.to_string(),
            records: RawRecords::Panels(panels),
            warnings: Vec::new(),
        }
    }

    fn panel(id: &str, version: &str, genes: Vec<RawGeneEntry>) -> RawPanel {
        RawPanel {
            id: id.to_string(),
            version: version.to_string(),
            name: Some(format!("Panel {}", id)),
            genes,
            indications: Vec::new(),
            subpanels: Vec::new(),
            line: 1,
        }
    }

    fn directory(rows: &[(&str, &str, &str)]) -> LoadedSource {
        LoadedSource {
            format: SourceFormat::TestDirectory,
            origin: "test_directory.tsv".to_string(),
            records: RawRecords::TestDirectory(
                rows.iter()
                    .enumerate()
                    .map(|(i, (code, id, version))| RawIndication {
                        code: code.to_string(),
                        name: None,
                        method: Some("P".to_string()),
                        target: IndicationTarget::Panel(PanelKey::new(id, version)),
                        line: i + 2,
                    })
                    .collect(),
            ),
            warnings: Vec::new(),
        }
    }

    fn gene_directory(rows: &[(&str, &str)]) -> LoadedSource {
        LoadedSource {
            format: SourceFormat::TestDirectory,
            origin: "test_directory.tsv".to_string(),
            records: RawRecords::TestDirectory(
                rows.iter()
                    .enumerate()
                    .map(|(i, (code, gene))| RawIndication {
                        code: code.to_string(),
                        name: None,
                        method: Some("G".to_string()),
                        target: IndicationTarget::Gene(gene.to_string()),
                        line: i + 2,
                    })
                    .collect(),
            ),
            warnings: Vec::new(),
        }
    }

    fn transcripts(rows: &[(&str, &str, bool)]) -> LoadedSource {
        LoadedSource {
            format: SourceFormat::TranscriptMap,
            origin: "g2t.tsv".to_string(),
            records: RawRecords::TranscriptMap(
                rows.iter()
                    .enumerate()
                    .map(|(i, (gene, accession, clinical))| RawTranscriptLink {
                        gene: gene.to_string(),
                        accession: accession.to_string(),
                        clinical: *clinical,
                        line: i + 2,
                    })
                    .collect(),
            ),
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_reconcile_requires_nomenclature() {
        let sources = vec![directory(&[("R100", "P1", "2")])];
        let err = reconcile(&sources).unwrap_err();
        assert!(matches!(err, ReconcileError::MissingNomenclature(1)));
    }

    #[test]
    fn test_basic_merge_has_no_conflicts() {
        let sources = vec![
            reference(),
            panels(
                SourceFormat::ProviderPanels,
                "panelapp.json",
                vec![panel("P1", "2", vec![gene("BRCA1", Confidence::Green)])],
            ),
            directory(&[("R100", "P1", "2")]),
        ];

        let result = reconcile(&sources).unwrap();

        assert!(result.conflicts.is_empty(), "{:?}", result.conflicts);
        assert_eq!(result.snapshot.genes.len(), 1);
        let panel = &result.snapshot.panels[&PanelKey::new("P1", "2")];
        assert_eq!(
            panel.genes[&GeneRef::Resolved("HGNC:1100".to_string())].confidence,
            Confidence::Green
        );
        let indication = &result.snapshot.indications["R100"];
        assert_eq!(indication.panel, PanelKey::new("P1", "2"));
        assert!(!indication.flagged);
        assert_eq!(result.snapshot.provenance.len(), 3);
    }

    #[test]
    fn test_alias_resolves_panel_gene() {
        let sources = vec![
            reference(),
            panels(
                SourceFormat::ProviderPanels,
                "panelapp.json",
                vec![panel("P1", "1", vec![gene("RNF53", Confidence::Amber)])],
            ),
        ];

        let result = reconcile(&sources).unwrap();
        let panel = &result.snapshot.panels[&PanelKey::new("P1", "1")];

        let entry = &panel.genes[&GeneRef::Resolved("HGNC:1100".to_string())];
        assert_eq!(entry.raw_symbol, "RNF53");
        assert!(result.snapshot.genes.contains_key("HGNC:1100"));
    }

    #[test]
    fn test_mapping_beats_panel_hint_for_clinical_transcript() {
        let mut hinted = gene("BRCA1", Confidence::Green);
        hinted.transcript = Some("NM_007300.4".to_string());

        let sources = vec![
            reference(),
            transcripts(&[("BRCA1", "NM_007294.4", true), ("BRCA1", "NM_007300.4", false)]),
            panels(SourceFormat::ProviderPanels, "panelapp.json", vec![panel("P1", "2", vec![hinted])]),
        ];

        let result = reconcile(&sources).unwrap();

        assert!(result.snapshot.transcripts["NM_007294.4"].clinical);
        assert!(!result.snapshot.transcripts["NM_007300.4"].clinical);

        let gene_conflicts: Vec<&ConflictRecord> = result
            .conflicts
            .iter()
            .filter(|c| c.entity == EntityType::Gene && c.key == "HGNC:1100")
            .collect();
        assert_eq!(gene_conflicts.len(), 1);
        assert_eq!(gene_conflicts[0].attribute, Attribute::ClinicalTranscript);
        assert_eq!(gene_conflicts[0].kind, ConflictKind::HigherRank);
        assert_eq!(gene_conflicts[0].chosen.as_deref(), Some("NM_007294.4"));
        assert_eq!(result.conflicts.len(), 1);
    }

    #[test]
    fn test_unresolved_gene_retained_and_flagged() {
        let sources = vec![
            reference(),
            panels(
                SourceFormat::ProviderPanels,
                "panelapp.json",
                vec![panel("P1", "1", vec![gene("NOTAGENE", Confidence::Green)])],
            ),
        ];

        let result = reconcile(&sources).unwrap();
        let panel = &result.snapshot.panels[&PanelKey::new("P1", "1")];

        assert!(panel.genes.contains_key(&GeneRef::Unresolved("NOTAGENE".to_string())));
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].kind, ConflictKind::Unresolvable);
        assert_eq!(result.conflicts[0].entity, EntityType::Panel);
        assert_eq!(result.conflicts[0].key, "P1 v1");
        assert_eq!(result.snapshot.flagged_count(), 1);
    }

    #[test]
    fn test_unresolved_transcript_owner_flagged() {
        let sources = vec![reference(), transcripts(&[("NOPE", "NM_000001.1", true)])];

        let result = reconcile(&sources).unwrap();
        let tx = &result.snapshot.transcripts["NM_000001.1"];

        assert!(tx.is_flagged());
        assert!(!tx.clinical);
        assert_eq!(result.conflicts[0].entity, EntityType::Transcript);
        assert_eq!(result.conflicts[0].kind, ConflictKind::Unresolvable);
    }

    #[test]
    fn test_duplicate_gene_collapses_to_highest_confidence() {
        let sources = vec![
            reference(),
            panels(
                SourceFormat::ProviderPanels,
                "panelapp.json",
                vec![panel(
                    "P1",
                    "1",
                    vec![gene("BRCA2", Confidence::Red), gene("FANCD1", Confidence::Green)],
                )],
            ),
        ];

        let result = reconcile(&sources).unwrap();
        let panel = &result.snapshot.panels[&PanelKey::new("P1", "1")];

        assert_eq!(panel.genes.len(), 1);
        assert_eq!(
            panel.genes[&GeneRef::Resolved("HGNC:1101".to_string())].confidence,
            Confidence::Green
        );
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].attribute, Attribute::PanelMembership);
    }

    #[test]
    fn test_equal_rank_panels_latest_wins() {
        let sources = vec![
            reference(),
            panels(
                SourceFormat::ProviderPanels,
                "panelapp.json",
                vec![panel("P1", "1", vec![gene("BRCA1", Confidence::Green)])],
            ),
            panels(
                SourceFormat::BespokePanels,
                "bespoke.json",
                vec![panel("P1", "1", vec![gene("BRCA2", Confidence::Green)])],
            ),
        ];

        let result = reconcile(&sources).unwrap();
        let panel = &result.snapshot.panels[&PanelKey::new("P1", "1")];

        assert_eq!(panel.source, PanelSource::Bespoke);
        assert!(panel.genes.contains_key(&GeneRef::Resolved("HGNC:1101".to_string())));
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].kind, ConflictKind::EqualRank);
        assert_eq!(result.conflicts[0].attribute, Attribute::PanelComposition);
    }

    #[test]
    fn test_losing_draft_contributes_no_transcript_hint() {
        let mut hinted = gene("BRCA1", Confidence::Green);
        hinted.transcript = Some("NM_LOSER.1".to_string());

        let sources = vec![
            reference(),
            panels(SourceFormat::ProviderPanels, "panelapp.json", vec![panel("P1", "1", vec![hinted])]),
            panels(
                SourceFormat::BespokePanels,
                "bespoke.json",
                vec![panel(
                    "P1",
                    "1",
                    vec![gene("BRCA1", Confidence::Green), gene("BRCA2", Confidence::Amber)],
                )],
            ),
        ];

        let result = reconcile(&sources).unwrap();

        assert_eq!(result.snapshot.panels[&PanelKey::new("P1", "1")].source, PanelSource::Bespoke);
        assert!(!result.snapshot.transcripts.contains_key("NM_LOSER.1"));
        assert!(result
            .conflicts
            .iter()
            .all(|c| c.attribute != Attribute::ClinicalTranscript && c.attribute != Attribute::TranscriptOwner));
    }

    #[test]
    fn test_winning_draft_transcript_hint_applied() {
        let mut hinted = gene("BRCA1", Confidence::Green);
        hinted.transcript = Some("NM_007294.4".to_string());

        let sources = vec![
            reference(),
            panels(SourceFormat::ProviderPanels, "panelapp.json", vec![panel("P1", "1", vec![hinted])]),
        ];

        let result = reconcile(&sources).unwrap();
        let tx = &result.snapshot.transcripts["NM_007294.4"];

        assert!(tx.clinical);
        assert_eq!(tx.gene, GeneRef::Resolved("HGNC:1100".to_string()));
    }

    #[test]
    fn test_single_gene_indication_builds_panel() {
        let sources = vec![reference(), gene_directory(&[("R67.1", "RNF53")])];

        let result = reconcile(&sources).unwrap();

        let key = PanelKey::new("HGNC:1100", "1");
        let indication = &result.snapshot.indications["R67.1"];
        assert_eq!(indication.panel, key);
        assert!(!indication.flagged);

        let panel = &result.snapshot.panels[&key];
        assert_eq!(panel.source, PanelSource::SingleGene);
        assert_eq!(panel.name.as_deref(), Some("BRCA1_SG"));
        assert!(result.snapshot.genes.contains_key("HGNC:1100"));
        assert!(result.conflicts.is_empty(), "{:?}", result.conflicts);
    }

    #[test]
    fn test_unknown_single_gene_indication_flagged() {
        let sources = vec![reference(), gene_directory(&[("R67.1", "NOTAGENE")])];

        let result = reconcile(&sources).unwrap();

        assert!(result.snapshot.indications["R67.1"].flagged);
        assert!(result.snapshot.panels.is_empty());
        assert!(result.conflicts.iter().any(|c| c.entity == EntityType::ClinicalIndication
            && c.attribute == Attribute::GeneIdentity
            && c.kind == ConflictKind::Unresolvable));
    }

    #[test]
    fn test_superpanel_keeps_known_subpanels() {
        let mut superpanel = panel("P5", "2", Vec::new());
        superpanel.subpanels = vec![PanelKey::new("P1", "1"), PanelKey::new("P9", "1")];

        let sources = vec![
            reference(),
            panels(
                SourceFormat::ProviderPanels,
                "panelapp.json",
                vec![panel("P1", "1", vec![gene("BRCA1", Confidence::Green)]), superpanel],
            ),
        ];

        let result = reconcile(&sources).unwrap();
        let panel = &result.snapshot.panels[&PanelKey::new("P5", "2")];

        assert_eq!(panel.subpanels.iter().collect::<Vec<_>>(), vec![&PanelKey::new("P1", "1")]);
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].key, "P5 v2");
        assert_eq!(result.conflicts[0].kind, ConflictKind::Unresolvable);
        assert_eq!(result.conflicts[0].candidates[0].value, "P9 v1");
    }

    #[test]
    fn test_test_directory_beats_provider_binding() {
        let mut provider_panel = panel("P1", "1", vec![gene("BRCA1", Confidence::Green)]);
        provider_panel.indications = vec!["R100".to_string()];

        let sources = vec![
            reference(),
            directory(&[("R100", "P1", "2")]),
            panels(
                SourceFormat::ProviderPanels,
                "panelapp.json",
                vec![provider_panel, panel("P1", "2", vec![gene("BRCA1", Confidence::Green)])],
            ),
        ];

        let result = reconcile(&sources).unwrap();

        assert_eq!(result.snapshot.indications["R100"].panel, PanelKey::new("P1", "2"));
        assert_eq!(result.snapshot.indications["R100"].method.as_deref(), Some("P"));
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].kind, ConflictKind::HigherRank);
    }

    #[test]
    fn test_binding_to_missing_panel_is_flagged() {
        let sources = vec![reference(), directory(&[("R999", "P9", "1")])];

        let result = reconcile(&sources).unwrap();

        assert!(result.snapshot.indications["R999"].flagged);
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].entity, EntityType::ClinicalIndication);
        assert_eq!(result.conflicts[0].kind, ConflictKind::Unresolvable);
    }

    #[test]
    fn test_duplicate_nomenclature_row_warns() {
        let sources = vec![nomenclature(&[
            ("HGNC:1100", "BRCA1", &[]),
            ("HGNC:1100", "BRCA1X", &[]),
        ])];

        let result = reconcile(&sources).unwrap();

        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].line, 3);
    }

    #[test]
    fn test_reconcile_is_deterministic() {
        let build = || {
            vec![
                reference(),
                transcripts(&[("BRCA1", "NM_007294.4", true)]),
                panels(
                    SourceFormat::ProviderPanels,
                    "panelapp.json",
                    vec![
                        panel("P2", "1", vec![gene("MT-ND1", Confidence::Green), gene("XX", Confidence::Red)]),
                        panel("P1", "2", vec![gene("BRCA1", Confidence::Green)]),
                    ],
                ),
                directory(&[("R100", "P1", "2"), ("R200", "P2", "1")]),
            ]
        };

        let first = reconcile(&build()).unwrap();
        let second = reconcile(&build()).unwrap();

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first.snapshot).unwrap(),
            serde_json::to_string(&second.snapshot).unwrap()
        );
    }
}
