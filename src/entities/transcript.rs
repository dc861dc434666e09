// 📜 Transcript Entity - accession owned by exactly one gene

use super::gene::GeneRef;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transcript {
    /// Versioned accession, e.g. "NM_007294.4"
    pub accession: String,

    /// Owning gene (exactly one)
    pub gene: GeneRef,

    /// Clinical-preferred transcript for its gene
    pub clinical: bool,
}

impl Transcript {
    pub fn new(accession: &str, gene: GeneRef, clinical: bool) -> Self {
        Transcript {
            accession: accession.trim().to_string(),
            gene,
            clinical,
        }
    }

    /// Owner could not be resolved against the nomenclature
    pub fn is_flagged(&self) -> bool {
        !self.gene.is_resolved()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_accession() {
        let tx = Transcript::new(" NM_007294.4 ", GeneRef::Resolved("HGNC:1100".to_string()), true);
        assert_eq!(tx.accession, "NM_007294.4");
    }

    #[test]
    fn test_flagged_when_owner_unresolved() {
        let tx = Transcript::new("NM_000001.1", GeneRef::Unresolved("FOO".to_string()), false);
        assert!(tx.is_flagged());

        let tx = Transcript::new("NM_007294.4", GeneRef::Resolved("HGNC:1100".to_string()), true);
        assert!(!tx.is_flagged());
    }
}
