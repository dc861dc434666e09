// 🔤 Identifier Normalizer - raw symbol/ID → canonical gene
//
// One index per run, built from the nomenclature reference before any other
// source is merged. Resolution is a pure lookup: it never changes identity.
//
// Resolution order:
// 1. exact canonical ID ("HGNC:1100", or a bare "1100")
// 2. exact current symbol
// 3. alias / previous symbol (must point at exactly one gene)
// 4. case-insensitive fallback over the same three

use crate::entities::{Gene, GeneRef};
use crate::parser::RawNomenclature;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// RESOLUTION RESULT
// ============================================================================

/// Which rule matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    CanonicalId,
    CurrentSymbol,
    Alias,
    CaseInsensitive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved { hgnc_id: String, tier: MatchTier },

    /// No match, or an alias shared by several genes (listed in `candidates`)
    Unresolved { raw: String, candidates: Vec<String> },
}

impl Resolution {
    pub fn gene_ref(&self) -> GeneRef {
        match self {
            Resolution::Resolved { hgnc_id, .. } => GeneRef::Resolved(hgnc_id.clone()),
            Resolution::Unresolved { raw, .. } => GeneRef::Unresolved(raw.clone()),
        }
    }

    pub fn hgnc_id(&self) -> Option<&str> {
        match self {
            Resolution::Resolved { hgnc_id, .. } => Some(hgnc_id),
            Resolution::Unresolved { .. } => None,
        }
    }
}

// ============================================================================
// GENE INDEX
// ============================================================================

#[derive(Debug, Default)]
pub struct GeneIndex {
    genes: BTreeMap<String, Gene>,
    by_symbol: BTreeMap<String, String>,
    by_alias: BTreeMap<String, BTreeSet<String>>,
    by_upper_id: BTreeMap<String, String>,
    by_upper_symbol: BTreeMap<String, BTreeSet<String>>,
    by_upper_alias: BTreeMap<String, BTreeSet<String>>,
}

impl GeneIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one nomenclature row.
    ///
    /// The first row for an HGNC ID wins; a symbol already approved for a
    /// different ID is rejected. Errors describe why the row was skipped.
    pub fn insert(&mut self, record: &RawNomenclature) -> Result<(), String> {
        let gene = Gene::from_nomenclature(record);

        if self.genes.contains_key(&gene.hgnc_id) {
            return Err(format!(
                "duplicate HGNC ID {}; first row kept",
                gene.hgnc_id
            ));
        }

        if let Some(owner) = self.by_symbol.get(&gene.symbol) {
            return Err(format!(
                "symbol {} is already approved for {}; row for {} skipped",
                gene.symbol, owner, gene.hgnc_id
            ));
        }

        let id = gene.hgnc_id.clone();
        self.by_symbol.insert(gene.symbol.clone(), id.clone());
        self.by_upper_id.insert(id.to_uppercase(), id.clone());
        self.by_upper_symbol
            .entry(gene.symbol.to_uppercase())
            .or_default()
            .insert(id.clone());

        for alias in &gene.aliases {
            self.by_alias.entry(alias.clone()).or_default().insert(id.clone());
            self.by_upper_alias
                .entry(alias.to_uppercase())
                .or_default()
                .insert(id.clone());
        }

        self.genes.insert(id, gene);
        Ok(())
    }

    /// Resolve a raw symbol or ID to a canonical gene
    pub fn resolve(&self, raw: &str) -> Resolution {
        let raw = raw.trim();

        // 1. Canonical ID
        if let Some(id) = self.canonical_id(raw) {
            return resolved(id, MatchTier::CanonicalId);
        }

        // 2. Current symbol
        if let Some(id) = self.by_symbol.get(raw) {
            return resolved(id, MatchTier::CurrentSymbol);
        }

        // 3. Alias
        if let Some(ids) = self.by_alias.get(raw) {
            return single(raw, ids, MatchTier::Alias);
        }

        // 4. Case-insensitive fallback
        let upper = raw.to_uppercase();
        if let Some(id) = self.by_upper_id.get(&upper) {
            return resolved(id, MatchTier::CaseInsensitive);
        }
        if let Some(ids) = self.by_upper_symbol.get(&upper) {
            return single(raw, ids, MatchTier::CaseInsensitive);
        }
        if let Some(ids) = self.by_upper_alias.get(&upper) {
            return single(raw, ids, MatchTier::CaseInsensitive);
        }

        Resolution::Unresolved {
            raw: raw.to_string(),
            candidates: Vec::new(),
        }
    }

    fn canonical_id(&self, raw: &str) -> Option<&str> {
        if let Some((id, _)) = self.genes.get_key_value(raw) {
            return Some(id);
        }
        if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
            let prefixed = format!("HGNC:{}", raw);
            return self.genes.get_key_value(&prefixed).map(|(id, _)| id.as_str());
        }
        None
    }

    pub fn gene(&self, hgnc_id: &str) -> Option<&Gene> {
        self.genes.get(hgnc_id)
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }
}

fn resolved(id: &str, tier: MatchTier) -> Resolution {
    Resolution::Resolved {
        hgnc_id: id.to_string(),
        tier,
    }
}

/// Resolve only when exactly one gene claims the name
fn single(raw: &str, ids: &BTreeSet<String>, tier: MatchTier) -> Resolution {
    match ids.len() {
        1 => ids
            .iter()
            .next()
            .map(|id| resolved(id, tier))
            .unwrap_or_else(|| unresolved(raw, ids)),
        _ => unresolved(raw, ids),
    }
}

fn unresolved(raw: &str, ids: &BTreeSet<String>) -> Resolution {
    Resolution::Unresolved {
        raw: raw.to_string(),
        candidates: ids.iter().cloned().collect(),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, symbol: &str, aliases: &[&str]) -> RawNomenclature {
        RawNomenclature {
            hgnc_id: id.to_string(),
            symbol: symbol.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            previous_symbols: Vec::new(),
            locus_group: None,
            chromosome: None,
            line: 2,
        }
    }

    fn index() -> GeneIndex {
        let mut index = GeneIndex::new();
        index.insert(&row("HGNC:1", "GENE1", &["ABC1", "ABC2", "SHARED"])).unwrap();
        index.insert(&row("HGNC:2", "GENE2", &["SHARED", "gene1"])).unwrap();
        index
    }

    #[test]
    fn test_aliases_resolve_to_same_gene() {
        let index = index();

        let first = index.resolve("ABC1");
        let second = index.resolve("ABC2");
        assert_eq!(first.hgnc_id(), Some("HGNC:1"));
        assert_eq!(first.gene_ref(), second.gene_ref());
        assert!(matches!(first, Resolution::Resolved { tier: MatchTier::Alias, .. }));
    }

    #[test]
    fn test_resolution_order() {
        let index = index();

        assert_eq!(
            index.resolve("HGNC:2"),
            Resolution::Resolved { hgnc_id: "HGNC:2".to_string(), tier: MatchTier::CanonicalId }
        );
        assert_eq!(
            index.resolve("2"),
            Resolution::Resolved { hgnc_id: "HGNC:2".to_string(), tier: MatchTier::CanonicalId }
        );
        // Current symbol beats another gene's alias with the same spelling
        assert_eq!(
            index.resolve("GENE1"),
            Resolution::Resolved { hgnc_id: "HGNC:1".to_string(), tier: MatchTier::CurrentSymbol }
        );
        assert_eq!(
            index.resolve("gene2"),
            Resolution::Resolved { hgnc_id: "HGNC:2".to_string(), tier: MatchTier::CaseInsensitive }
        );
        assert_eq!(
            index.resolve("hgnc:1"),
            Resolution::Resolved { hgnc_id: "HGNC:1".to_string(), tier: MatchTier::CaseInsensitive }
        );
    }

    #[test]
    fn test_ambiguous_alias_is_unresolved() {
        let index = index();

        match index.resolve("SHARED") {
            Resolution::Unresolved { raw, candidates } => {
                assert_eq!(raw, "SHARED");
                assert_eq!(candidates, vec!["HGNC:1", "HGNC:2"]);
            }
            other => panic!("expected unresolved, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_symbol_is_unresolved() {
        let index = index();
        let resolution = index.resolve("NOPE1");

        assert_eq!(resolution.gene_ref(), GeneRef::Unresolved("NOPE1".to_string()));
        assert_eq!(resolution.hgnc_id(), None);
    }

    #[test]
    fn test_identity_never_reassigned() {
        let mut index = index();

        let duplicate_id = index.insert(&row("HGNC:1", "OTHER", &[]));
        assert!(duplicate_id.unwrap_err().contains("duplicate HGNC ID"));

        let duplicate_symbol = index.insert(&row("HGNC:3", "GENE1", &[]));
        assert!(duplicate_symbol.is_err());

        assert_eq!(index.len(), 2);
        assert_eq!(index.gene("HGNC:1").map(|g| g.symbol.as_str()), Some("GENE1"));
    }
}
