// 🔍 Diff Engine - canonical snapshot vs database snapshot
//
// Set difference per entity type, keyed by natural key:
//   only canonical → Added, only database → Removed,
//   both with differing attributes → Changed (attribute-level sub-diff)
//
// Read-only on both snapshots. diff(S, S) is always empty.

use crate::entities::{ClinicalIndication, Gene, Panel, PanelKey, Transcript};
use crate::precedence::EntityType;
use crate::snapshot::CanonicalSnapshot;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

// ============================================================================
// DIFF RECORDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    Added,
    Removed,
    Changed,
}

impl DiffKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiffKind::Added => "added",
            DiffKind::Removed => "removed",
            DiffKind::Changed => "changed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeChange {
    pub attribute: String,
    pub canonical: Option<String>,
    pub database: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffRecord {
    pub entity: EntityType,
    pub key: String,
    pub kind: DiffKind,
    pub canonical: Option<Value>,
    pub database: Option<Value>,

    /// Only for Changed
    pub changes: Vec<AttributeChange>,
}

impl DiffRecord {
    fn new<T: Serialize>(
        entity: EntityType,
        key: String,
        kind: DiffKind,
        canonical: Option<&T>,
        database: Option<&T>,
        changes: Vec<AttributeChange>,
    ) -> Self {
        DiffRecord {
            entity,
            key,
            kind,
            canonical: canonical.and_then(|v| serde_json::to_value(v).ok()),
            database: database.and_then(|v| serde_json::to_value(v).ok()),
            changes,
        }
    }
}

// ============================================================================
// COMPARED ATTRIBUTES
// ============================================================================

type Attributes = BTreeMap<String, String>;

fn gene_attributes(gene: &Gene) -> Attributes {
    BTreeMap::from([
        ("symbol".to_string(), gene.symbol.clone()),
        ("is_rna".to_string(), gene.is_rna.to_string()),
        ("is_mitochondrial".to_string(), gene.is_mitochondrial.to_string()),
    ])
}

fn transcript_attributes(tx: &Transcript) -> Attributes {
    BTreeMap::from([
        ("gene".to_string(), tx.gene.to_string()),
        ("clinical".to_string(), tx.clinical.to_string()),
    ])
}

/// Name + one "gene <id>" attribute per member (value = confidence) + one
/// "subpanel <key>" attribute per subpanel.
/// Version is compared only when two different versions are paired.
fn panel_attributes(panel: &Panel) -> Attributes {
    let mut attributes = BTreeMap::new();
    if let Some(name) = &panel.name {
        attributes.insert("name".to_string(), name.clone());
    }
    for (gene, entry) in &panel.genes {
        attributes.insert(format!("gene {}", gene), entry.confidence.to_string());
    }
    for subpanel in &panel.subpanels {
        attributes.insert(format!("subpanel {}", subpanel), "member".to_string());
    }
    attributes
}

fn indication_attributes(indication: &ClinicalIndication) -> Attributes {
    let mut attributes = BTreeMap::from([("panel".to_string(), indication.panel.to_string())]);
    if let Some(name) = &indication.name {
        attributes.insert("name".to_string(), name.clone());
    }
    attributes
}

fn compare(canonical: &Attributes, database: &Attributes) -> Vec<AttributeChange> {
    let names: BTreeSet<&String> = canonical.keys().chain(database.keys()).collect();

    names
        .into_iter()
        .filter_map(|name| {
            let left = canonical.get(name);
            let right = database.get(name);
            (left != right).then(|| AttributeChange {
                attribute: name.clone(),
                canonical: left.cloned(),
                database: right.cloned(),
            })
        })
        .collect()
}

// ============================================================================
// DIFF
// ============================================================================

/// Structured, totally ordered difference: by entity type, then natural key
pub fn diff_against_database(canonical: &CanonicalSnapshot, database: &CanonicalSnapshot) -> Vec<DiffRecord> {
    let mut records = Vec::new();

    records.extend(diff_maps(
        EntityType::Gene,
        &canonical.genes,
        &database.genes,
        |id| id.clone(),
        gene_attributes,
    ));
    records.extend(diff_maps(
        EntityType::Transcript,
        &canonical.transcripts,
        &database.transcripts,
        |accession| accession.clone(),
        transcript_attributes,
    ));
    records.extend(diff_panels(&canonical.panels, &database.panels));
    records.extend(diff_maps(
        EntityType::ClinicalIndication,
        &canonical.indications,
        &database.indications,
        |code| code.clone(),
        indication_attributes,
    ));

    info!(
        added = records.iter().filter(|r| r.kind == DiffKind::Added).count(),
        removed = records.iter().filter(|r| r.kind == DiffKind::Removed).count(),
        changed = records.iter().filter(|r| r.kind == DiffKind::Changed).count(),
        "diff complete"
    );
    records
}

fn diff_maps<K: Ord, T: Serialize>(
    entity: EntityType,
    canonical: &BTreeMap<K, T>,
    database: &BTreeMap<K, T>,
    key_label: impl Fn(&K) -> String,
    attributes: impl Fn(&T) -> Attributes,
) -> Vec<DiffRecord> {
    let keys: BTreeSet<&K> = canonical.keys().chain(database.keys()).collect();

    keys.into_iter()
        .filter_map(|key| match (canonical.get(key), database.get(key)) {
            (Some(ours), None) => Some(DiffRecord::new(
                entity,
                key_label(key),
                DiffKind::Added,
                Some(ours),
                None,
                Vec::new(),
            )),
            (None, Some(theirs)) => Some(DiffRecord::new(
                entity,
                key_label(key),
                DiffKind::Removed,
                None,
                Some(theirs),
                Vec::new(),
            )),
            (Some(ours), Some(theirs)) => {
                let changes = compare(&attributes(ours), &attributes(theirs));
                (!changes.is_empty()).then(|| {
                    DiffRecord::new(
                        entity,
                        key_label(key),
                        DiffKind::Changed,
                        Some(ours),
                        Some(theirs),
                        changes,
                    )
                })
            }
            (None, None) => None,
        })
        .collect()
}

/// Panels pair by exact (id, version) first. Unmatched versions of the same
/// id are then paired newest-to-newest and reported as one Changed record
/// keyed by the canonical version.
fn diff_panels(canonical: &BTreeMap<PanelKey, Panel>, database: &BTreeMap<PanelKey, Panel>) -> Vec<DiffRecord> {
    let mut keyed: Vec<(PanelKey, DiffRecord)> = Vec::new();

    let mut ours_left: BTreeMap<&str, Vec<&Panel>> = BTreeMap::new();
    let mut theirs_left: BTreeMap<&str, Vec<&Panel>> = BTreeMap::new();

    for (key, ours) in canonical {
        match database.get(key) {
            Some(theirs) => {
                let changes = compare(&panel_attributes(ours), &panel_attributes(theirs));
                if !changes.is_empty() {
                    keyed.push((
                        key.clone(),
                        DiffRecord::new(EntityType::Panel, key.to_string(), DiffKind::Changed, Some(ours), Some(theirs), changes),
                    ));
                }
            }
            None => ours_left.entry(key.panel_id.as_str()).or_default().push(ours),
        }
    }
    for (key, theirs) in database {
        if !canonical.contains_key(key) {
            theirs_left.entry(key.panel_id.as_str()).or_default().push(theirs);
        }
    }

    for (panel_id, mut ours) in ours_left {
        // Oldest first from the BTreeMap; pair from the newest end
        let mut theirs = theirs_left.remove(panel_id).unwrap_or_default();
        while let (Some(new), Some(old)) = (ours.last().copied(), theirs.last().copied()) {
            ours.pop();
            theirs.pop();

            let mut changes = compare(&panel_attributes(new), &panel_attributes(old));
            changes.push(AttributeChange {
                attribute: "version".to_string(),
                canonical: Some(new.key.version.clone()),
                database: Some(old.key.version.clone()),
            });
            changes.sort_by(|a, b| a.attribute.cmp(&b.attribute));

            keyed.push((
                new.key.clone(),
                DiffRecord::new(EntityType::Panel, new.key.to_string(), DiffKind::Changed, Some(new), Some(old), changes),
            ));
        }

        for panel in ours {
            keyed.push((
                panel.key.clone(),
                DiffRecord::new(EntityType::Panel, panel.key.to_string(), DiffKind::Added, Some(panel), None, Vec::new()),
            ));
        }
        for panel in theirs {
            keyed.push((
                panel.key.clone(),
                DiffRecord::new(EntityType::Panel, panel.key.to_string(), DiffKind::Removed, None, Some(panel), Vec::new()),
            ));
        }
    }

    for panel in theirs_left.into_values().flatten() {
        keyed.push((
            panel.key.clone(),
            DiffRecord::new(EntityType::Panel, panel.key.to_string(), DiffKind::Removed, None, Some(panel), Vec::new()),
        ));
    }

    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed.into_iter().map(|(_, record)| record).collect()
}

// ============================================================================
// TESTS
// ============================================================================
