// Entity Models
// "Identity persists, values change"
//
// Each entity has:
// - A stable natural key (HGNC ID, accession, (panel id, version), code)
// - Values that may differ between sources and are settled by the merge

pub mod gene;
pub mod transcript;
pub mod panel;
pub mod indication;

pub use gene::{Gene, GeneRef};
pub use transcript::Transcript;
pub use panel::{compare_versions, Confidence, Panel, PanelGene, PanelKey, PanelSource};
pub use indication::ClinicalIndication;
