// 📸 Canonical Snapshot - the merged model of one run
//
// Built once by the merge (or read from the database), never mutated after.
// Every collection is a BTreeMap so iteration order is the natural-key order.

use crate::entities::{ClinicalIndication, Confidence, Gene, GeneRef, Panel, PanelKey, Transcript};
use crate::parser::SourceFormat;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Which file fed the snapshot, in load order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceProvenance {
    pub format: SourceFormat,
    pub origin: String,
    pub loader_version: String,
    pub records: usize,
    pub warnings: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CanonicalSnapshot {
    /// HGNC ID → gene
    pub genes: BTreeMap<String, Gene>,

    /// accession → transcript
    pub transcripts: BTreeMap<String, Transcript>,

    /// (panel id, version) → panel
    pub panels: BTreeMap<PanelKey, Panel>,

    /// code → indication
    pub indications: BTreeMap<String, ClinicalIndication>,

    /// sample → clinical indication codes
    pub samples: BTreeMap<String, BTreeSet<String>>,

    pub provenance: Vec<SourceProvenance>,
}

impl CanonicalSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gene(&self, gene: &GeneRef) -> Option<&Gene> {
        gene.hgnc_id().and_then(|id| self.genes.get(id))
    }

    /// Clinical transcripts of one gene (at most one after a merge)
    pub fn clinical_transcripts(&self, hgnc_id: &str) -> impl Iterator<Item = &Transcript> + '_ {
        let wanted = hgnc_id.to_string();
        self.transcripts
            .values()
            .filter(move |tx| tx.clinical && tx.gene.hgnc_id() == Some(wanted.as_str()))
    }

    /// Genes of a panel with its subpanels expanded, highest confidence kept
    pub fn expanded_genes(&self, key: &PanelKey) -> BTreeMap<&GeneRef, Confidence> {
        let mut genes: BTreeMap<&GeneRef, Confidence> = BTreeMap::new();
        let mut visited: BTreeSet<&PanelKey> = BTreeSet::new();
        let mut stack = vec![key];

        while let Some(current) = stack.pop() {
            let Some(panel) = self.panels.get(current) else {
                continue;
            };
            if !visited.insert(&panel.key) {
                continue;
            }
            for (gene, entry) in &panel.genes {
                let kept = genes.entry(gene).or_insert(entry.confidence);
                *kept = (*kept).max(entry.confidence);
            }
            stack.extend(panel.subpanels.iter());
        }
        genes
    }

    /// Panel bound to an indication code
    pub fn panel_for_indication(&self, code: &str) -> Option<&Panel> {
        self.indications
            .get(code)
            .and_then(|indication| self.panels.get(&indication.panel))
    }

    /// Number of flagged (unresolved) entries across the snapshot
    pub fn flagged_count(&self) -> usize {
        let panel_genes: usize = self.panels.values().map(|p| p.flagged_genes().count()).sum();
        let transcripts = self.transcripts.values().filter(|tx| tx.is_flagged()).count();
        let indications = self.indications.values().filter(|ci| ci.flagged).count();
        panel_genes + transcripts + indications
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
            && self.transcripts.is_empty()
            && self.panels.is_empty()
            && self.indications.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Confidence, PanelGene, PanelSource};

    fn snapshot() -> CanonicalSnapshot {
        let mut snapshot = CanonicalSnapshot::new();
        snapshot.genes.insert("HGNC:1100".to_string(), Gene::new("HGNC:1100", "BRCA1"));
        snapshot.transcripts.insert(
            "NM_007294.4".to_string(),
            Transcript::new("NM_007294.4", GeneRef::Resolved("HGNC:1100".to_string()), true),
        );

        snapshot.genes.insert("HGNC:1101".to_string(), Gene::new("HGNC:1101", "BRCA2"));

        for version in ["1", "2"] {
            let mut panel = Panel::new(PanelKey::new("P1", version), None, PanelSource::Provider);
            panel.genes.insert(
                GeneRef::Resolved("HGNC:1100".to_string()),
                PanelGene { confidence: Confidence::Green, raw_symbol: "BRCA1".to_string() },
            );
            snapshot.panels.insert(panel.key.clone(), panel);
        }

        // P5 v1 = P1 v2 + BRCA2, and loops back onto itself
        let mut superpanel = Panel::new(PanelKey::new("P5", "1"), None, PanelSource::Provider);
        superpanel.genes.insert(
            GeneRef::Resolved("HGNC:1101".to_string()),
            PanelGene { confidence: Confidence::Amber, raw_symbol: "BRCA2".to_string() },
        );
        superpanel.subpanels.insert(PanelKey::new("P1", "2"));
        superpanel.subpanels.insert(PanelKey::new("P5", "1"));
        snapshot.panels.insert(superpanel.key.clone(), superpanel);

        snapshot.indications.insert(
            "R100".to_string(),
            ClinicalIndication::new("R100", PanelKey::new("P1", "2")),
        );
        snapshot
    }

    #[test]
    fn test_snapshot_queries() {
        let snapshot = snapshot();

        assert_eq!(snapshot.clinical_transcripts("HGNC:1100").count(), 1);
        assert_eq!(
            snapshot.panel_for_indication("R100").map(|p| p.key.version.as_str()),
            Some("2")
        );
        assert_eq!(snapshot.flagged_count(), 0);
        assert!(!snapshot.is_empty());
    }

    #[test]
    fn test_expanded_genes_follow_subpanels() {
        let snapshot = snapshot();

        let genes = snapshot.expanded_genes(&PanelKey::new("P5", "1"));
        let listed: Vec<(String, Confidence)> = genes.iter().map(|(g, c)| (g.to_string(), *c)).collect();
        assert_eq!(
            listed,
            vec![
                ("HGNC:1100".to_string(), Confidence::Green),
                ("HGNC:1101".to_string(), Confidence::Amber),
            ]
        );
        assert!(snapshot.expanded_genes(&PanelKey::new("P9", "1")).is_empty());
    }

    #[test]
    fn test_default_is_empty() {
        assert!(CanonicalSnapshot::default().is_empty());
    }
}
