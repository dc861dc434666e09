// 🧬 Gene Entity - Stable nomenclature identity + aliases
//
// "Symbol is a VALUE (can change), HGNC ID is IDENTITY (never changes)"
//
// Problem solved:
// - "BRCA1", "RNF53", "brca1" → All same gene entity
// - A renamed symbol doesn't break panels written against the old one
// - HGNC ID provides the stable key for transcripts and panel bindings

use crate::parser::RawNomenclature;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

// ============================================================================
// GENE ENTITY
// ============================================================================

/// Gene entity - identity/value separation
///
/// Identity: HGNC ID (assigned once per run, never reassigned)
/// Values: approved symbol, aliases, biotype flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Gene {
    /// Stable nomenclature ID, e.g. "HGNC:1100"
    pub hgnc_id: String,

    /// Current approved symbol
    pub symbol: String,

    /// Alias and previous symbols that map to this gene
    pub aliases: BTreeSet<String>,

    /// Non-coding RNA locus
    pub is_rna: bool,

    /// Encoded on the mitochondrial genome
    pub is_mitochondrial: bool,
}

impl Gene {
    pub fn new(hgnc_id: &str, symbol: &str) -> Self {
        Gene {
            hgnc_id: hgnc_id.trim().to_string(),
            symbol: symbol.trim().to_string(),
            aliases: BTreeSet::new(),
            is_rna: false,
            is_mitochondrial: symbol.trim().to_uppercase().starts_with("MT-"),
        }
    }

    /// Build a gene from one nomenclature row, deriving the biotype flags
    pub fn from_nomenclature(record: &RawNomenclature) -> Self {
        let mut gene = Gene::new(&record.hgnc_id, &record.symbol);

        for alias in record.aliases.iter().chain(record.previous_symbols.iter()) {
            gene.add_alias(alias);
        }

        gene.is_rna = record
            .locus_group
            .as_deref()
            .map(|group| group.to_uppercase().contains("RNA"))
            .unwrap_or(false);

        let on_mito_chromosome = record
            .chromosome
            .as_deref()
            .map(|chrom| {
                let chrom = chrom.trim().to_lowercase();
                chrom == "mitochondria" || chrom == "mt" || chrom == "chrm"
            })
            .unwrap_or(false);
        gene.is_mitochondrial = gene.is_mitochondrial || on_mito_chromosome;

        gene
    }

    /// Add an alias to this gene
    pub fn add_alias(&mut self, alias: &str) {
        let alias = alias.trim();
        if !alias.is_empty() && alias != self.symbol {
            self.aliases.insert(alias.to_string());
        }
    }

    /// Genes removed from clinically-facing flat dumps (RNA and mitochondrial).
    /// Never applied to the canonical model or the fixture.
    pub fn is_clinically_excluded(&self) -> bool {
        self.is_rna || self.is_mitochondrial
    }
}

// ============================================================================
// GENE REFERENCE
// ============================================================================

/// Reference from a panel entry or transcript to a gene.
///
/// Unresolved references keep the raw identifier as written in the source so
/// the entry can be retained and flagged instead of dropped.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "String")]
pub enum GeneRef {
    Resolved(String),
    Unresolved(String),
}

impl GeneRef {
    pub fn is_resolved(&self) -> bool {
        matches!(self, GeneRef::Resolved(_))
    }

    pub fn hgnc_id(&self) -> Option<&str> {
        match self {
            GeneRef::Resolved(id) => Some(id),
            GeneRef::Unresolved(_) => None,
        }
    }
}

impl fmt::Display for GeneRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneRef::Resolved(id) => write!(f, "{}", id),
            GeneRef::Unresolved(raw) => write!(f, "unresolved:{}", raw),
        }
    }
}

impl From<GeneRef> for String {
    fn from(gene: GeneRef) -> Self {
        gene.to_string()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn nomenclature(id: &str, symbol: &str) -> RawNomenclature {
        RawNomenclature {
            hgnc_id: id.to_string(),
            symbol: symbol.to_string(),
            aliases: Vec::new(),
            previous_symbols: Vec::new(),
            locus_group: None,
            chromosome: None,
            line: 2,
        }
    }

    #[test]
    fn test_gene_creation() {
        let gene = Gene::new("HGNC:1100", "BRCA1");

        assert_eq!(gene.hgnc_id, "HGNC:1100");
        assert_eq!(gene.symbol, "BRCA1");
        assert!(gene.aliases.is_empty());
        assert!(!gene.is_clinically_excluded());
    }

    #[test]
    fn test_add_alias_skips_symbol_and_blanks() {
        let mut gene = Gene::new("HGNC:1100", "BRCA1");
        gene.add_alias("RNF53");
        gene.add_alias("BRCA1");
        gene.add_alias("  ");
        gene.add_alias("RNF53");

        assert_eq!(gene.aliases.iter().collect::<Vec<_>>(), vec!["RNF53"]);
    }

    #[test]
    fn test_rna_flag_from_locus_group() {
        let mut record = nomenclature("HGNC:10023", "RMRP");
        record.locus_group = Some("non-coding RNA".to_string());

        let gene = Gene::from_nomenclature(&record);
        assert!(gene.is_rna);
        assert!(gene.is_clinically_excluded());
    }

    #[test]
    fn test_mitochondrial_flag_from_symbol_and_chromosome() {
        let by_symbol = Gene::from_nomenclature(&nomenclature("HGNC:7455", "MT-ND1"));
        assert!(by_symbol.is_mitochondrial);

        let mut record = nomenclature("HGNC:7421", "MTATP6P1");
        record.chromosome = Some("mitochondria".to_string());
        assert!(Gene::from_nomenclature(&record).is_mitochondrial);
    }

    #[test]
    fn test_previous_symbols_become_aliases() {
        let mut record = nomenclature("HGNC:1100", "BRCA1");
        record.aliases = vec!["RNF53".to_string()];
        record.previous_symbols = vec!["BRCC1".to_string()];

        let gene = Gene::from_nomenclature(&record);
        assert!(gene.aliases.contains("RNF53"));
        assert!(gene.aliases.contains("BRCC1"));
    }

    #[test]
    fn test_gene_ref_display_and_order() {
        let resolved = GeneRef::Resolved("HGNC:1100".to_string());
        let unresolved = GeneRef::Unresolved("XYZ1".to_string());

        assert_eq!(resolved.to_string(), "HGNC:1100");
        assert_eq!(unresolved.to_string(), "unresolved:XYZ1");
        assert!(resolved < unresolved);
        assert_eq!(resolved.hgnc_id(), Some("HGNC:1100"));
        assert_eq!(unresolved.hgnc_id(), None);
    }
}
