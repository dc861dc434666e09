// 🏷️ Clinical Indication Entity - coded test bound to one panel version

use super::panel::PanelKey;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClinicalIndication {
    /// Test directory code, e.g. "R208"
    pub code: String,
    pub name: Option<String>,

    /// Abbreviated test method ("P", "LP", "G", ...)
    pub method: Option<String>,

    /// Exactly one active panel version per run
    pub panel: PanelKey,

    /// Bound panel version is not in the snapshot
    pub flagged: bool,
}

impl ClinicalIndication {
    pub fn new(code: &str, panel: PanelKey) -> Self {
        ClinicalIndication {
            code: code.trim().to_string(),
            name: None,
            method: None,
            panel,
            flagged: false,
        }
    }

    /// "R208_Inherited breast cancer_P": the label downstream tools key on
    pub fn label(&self) -> String {
        let mut label = self.code.clone();
        if let Some(name) = &self.name {
            label.push('_');
            label.push_str(name);
        }
        if let Some(method) = &self.method {
            label.push('_');
            label.push_str(method);
        }
        label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label() {
        let mut indication = ClinicalIndication::new("R208", PanelKey::new("635", "3.1"));
        assert_eq!(indication.label(), "R208");

        indication.name = Some("Inherited breast cancer".to_string());
        indication.method = Some("P".to_string());
        assert_eq!(indication.label(), "R208_Inherited breast cancer_P");
    }
}
