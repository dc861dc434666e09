// 📋 Panel Entity - versioned set of (gene, confidence) pairs
//
// Identity: (panel id, version). A new version is a new panel record;
// the same id keeps its history across versions.

use super::gene::GeneRef;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ============================================================================
// CONFIDENCE LEVEL
// ============================================================================

/// Review status of a panel-gene association. Ordered Red < Amber < Green.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Red,
    Amber,
    Green,
}

impl Confidence {
    /// Accepts names (any case) or provider numeric levels 3/2/1/0
    pub fn parse(value: &str) -> Option<Confidence> {
        match value.trim().to_lowercase().as_str() {
            "green" | "3" => Some(Confidence::Green),
            "amber" | "2" => Some(Confidence::Amber),
            "red" | "1" | "0" => Some(Confidence::Red),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Red => "red",
            Confidence::Amber => "amber",
            Confidence::Green => "green",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// PANEL KEY
// ============================================================================

/// Natural key of a panel version
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub struct PanelKey {
    pub panel_id: String,
    pub version: String,
}

impl PanelKey {
    pub fn new(panel_id: &str, version: &str) -> Self {
        PanelKey {
            panel_id: panel_id.trim().to_string(),
            version: version.trim().to_string(),
        }
    }
}

impl Ord for PanelKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.panel_id
            .cmp(&other.panel_id)
            .then_with(|| compare_versions(&self.version, &other.version))
            .then_with(|| self.version.cmp(&other.version))
    }
}

impl PartialOrd for PanelKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PanelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.panel_id, self.version)
    }
}

impl From<PanelKey> for String {
    fn from(key: PanelKey) -> Self {
        key.to_string()
    }
}

/// Compare dotted numeric versions numerically ("1.10" > "1.9");
/// anything non-numeric falls back to string order.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let parse = |v: &str| -> Option<Vec<u64>> { v.split('.').map(|part| part.parse().ok()).collect() };

    match (parse(a), parse(b)) {
        (Some(left), Some(right)) => left.cmp(&right),
        _ => a.cmp(b),
    }
}

// ============================================================================
// PANEL ENTITY
// ============================================================================

/// Where a panel definition came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelSource {
    Provider,
    Bespoke,
    /// Built from a test-directory row that targets one gene
    SingleGene,
}

impl PanelSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PanelSource::Provider => "provider",
            PanelSource::Bespoke => "bespoke",
            PanelSource::SingleGene => "single_gene",
        }
    }

    pub fn parse(value: &str) -> Option<PanelSource> {
        match value.trim().to_lowercase().as_str() {
            "provider" => Some(PanelSource::Provider),
            "bespoke" => Some(PanelSource::Bespoke),
            "single_gene" => Some(PanelSource::SingleGene),
            _ => None,
        }
    }
}

/// One gene's membership in a panel version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelGene {
    pub confidence: Confidence,

    /// Identifier exactly as the panel source wrote it
    pub raw_symbol: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Panel {
    pub key: PanelKey,
    pub name: Option<String>,
    pub source: PanelSource,

    /// No duplicate gene within one panel version
    pub genes: BTreeMap<GeneRef, PanelGene>,

    /// Non-empty for a superpanel: the panel versions it is made of
    pub subpanels: BTreeSet<PanelKey>,
}

impl Panel {
    pub fn new(key: PanelKey, name: Option<String>, source: PanelSource) -> Self {
        Panel {
            key,
            name,
            source,
            genes: BTreeMap::new(),
            subpanels: BTreeSet::new(),
        }
    }

    /// Panel holding exactly one gene, keyed by the gene's HGNC ID
    pub fn single_gene(hgnc_id: &str, symbol: &str) -> Self {
        let mut panel = Panel::new(
            PanelKey::new(hgnc_id, "1"),
            Some(format!("{}_SG", symbol)),
            PanelSource::SingleGene,
        );
        panel.genes.insert(
            GeneRef::Resolved(hgnc_id.to_string()),
            PanelGene { confidence: Confidence::Green, raw_symbol: symbol.to_string() },
        );
        panel
    }

    pub fn is_superpanel(&self) -> bool {
        !self.subpanels.is_empty()
    }

    /// Entries whose gene could not be resolved
    pub fn flagged_genes(&self) -> impl Iterator<Item = (&GeneRef, &PanelGene)> {
        self.genes.iter().filter(|(gene, _)| !gene.is_resolved())
    }

    pub fn resolved_genes(&self) -> impl Iterator<Item = (&str, &PanelGene)> {
        self.genes
            .iter()
            .filter_map(|(gene, entry)| gene.hgnc_id().map(|id| (id, entry)))
    }
}

// ============================================================================
// TESTS
// ============================================================================
