// ⚖️ Precedence - which source is authoritative for which attribute
//
// Conflict resolution is a table lookup, not per-field branching:
// - higher rank wins (conflict still recorded, for audit)
// - equal rank → most recently loaded wins (conflict recorded)
// - identical values never conflict

use crate::parser::SourceFormat;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// ENTITIES & ATTRIBUTES
// ============================================================================

/// Entity types, in referential order (referents first)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Gene,
    Transcript,
    Panel,
    ClinicalIndication,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Gene => "gene",
            EntityType::Transcript => "transcript",
            EntityType::Panel => "panel",
            EntityType::ClinicalIndication => "clinical_indication",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Attributes the sources can disagree on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    /// raw symbol → HGNC ID
    GeneIdentity,
    /// gene → clinical accession
    ClinicalTranscript,
    /// accession → owning gene
    TranscriptOwner,
    /// (panel id, version) → name + genes
    PanelComposition,
    /// one gene listed more than once in a panel version
    PanelMembership,
    /// code → panel version
    IndicationBinding,
}

impl Attribute {
    pub fn as_str(&self) -> &'static str {
        match self {
            Attribute::GeneIdentity => "gene_identity",
            Attribute::ClinicalTranscript => "clinical_transcript",
            Attribute::TranscriptOwner => "transcript_owner",
            Attribute::PanelComposition => "panel_composition",
            Attribute::PanelMembership => "panel_membership",
            Attribute::IndicationBinding => "indication_binding",
        }
    }

    /// Entity the attribute belongs to
    pub fn entity(&self) -> EntityType {
        match self {
            Attribute::GeneIdentity | Attribute::ClinicalTranscript => EntityType::Gene,
            Attribute::TranscriptOwner => EntityType::Transcript,
            Attribute::PanelComposition | Attribute::PanelMembership => EntityType::Panel,
            Attribute::IndicationBinding => EntityType::ClinicalIndication,
        }
    }

    /// Rank of a source for this attribute; 0 when the source has no say
    pub fn rank(&self, source: SourceFormat) -> u8 {
        PRECEDENCE
            .iter()
            .find(|(attribute, format, _)| attribute == self && *format == source)
            .map(|(_, _, rank)| *rank)
            .unwrap_or(0)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// (attribute, source, rank). Higher rank is more authoritative.
pub const PRECEDENCE: &[(Attribute, SourceFormat, u8)] = &[
    (Attribute::GeneIdentity, SourceFormat::Nomenclature, 2),
    (Attribute::GeneIdentity, SourceFormat::ProviderPanels, 1),
    (Attribute::GeneIdentity, SourceFormat::BespokePanels, 1),
    (Attribute::ClinicalTranscript, SourceFormat::TranscriptMap, 2),
    (Attribute::ClinicalTranscript, SourceFormat::ProviderPanels, 1),
    (Attribute::ClinicalTranscript, SourceFormat::BespokePanels, 1),
    (Attribute::TranscriptOwner, SourceFormat::TranscriptMap, 2),
    (Attribute::TranscriptOwner, SourceFormat::ProviderPanels, 1),
    (Attribute::TranscriptOwner, SourceFormat::BespokePanels, 1),
    (Attribute::PanelComposition, SourceFormat::ProviderPanels, 1),
    (Attribute::PanelComposition, SourceFormat::BespokePanels, 1),
    (Attribute::PanelMembership, SourceFormat::ProviderPanels, 1),
    (Attribute::PanelMembership, SourceFormat::BespokePanels, 1),
    (Attribute::IndicationBinding, SourceFormat::TestDirectory, 2),
    (Attribute::IndicationBinding, SourceFormat::ProviderPanels, 1),
    (Attribute::IndicationBinding, SourceFormat::BespokePanels, 1),
];

// ============================================================================
// CONFLICT RECORD
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Identifier could not be resolved; entry retained and flagged
    Unresolvable,
    /// Sources of equal rank disagreed; most recent won
    EqualRank,
    /// A higher-ranked source overrode a lower one
    HigherRank,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::Unresolvable => "unresolvable",
            ConflictKind::EqualRank => "equal_rank",
            ConflictKind::HigherRank => "higher_rank",
        }
    }
}

/// One competing value and where it came from
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Candidate {
    pub value: String,
    pub source: SourceFormat,
    pub origin: String,
    pub rank: u8,
}

/// Audit record of one disagreement. Never dropped.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ConflictRecord {
    pub entity: EntityType,
    pub key: String,
    pub attribute: Attribute,
    pub kind: ConflictKind,

    /// Winner first
    pub candidates: Vec<Candidate>,
    pub chosen: Option<String>,
    pub detail: Option<String>,
}

impl ConflictRecord {
    /// Identifier that matched nothing (or matched several genes)
    pub fn unresolvable(
        entity: EntityType,
        key: &str,
        attribute: Attribute,
        candidate: Candidate,
        ambiguous: &[String],
    ) -> Self {
        let detail = if ambiguous.is_empty() {
            "no nomenclature match".to_string()
        } else {
            format!("ambiguous between {}", ambiguous.join(", "))
        };

        ConflictRecord {
            entity,
            key: key.to_string(),
            attribute,
            kind: ConflictKind::Unresolvable,
            candidates: vec![candidate],
            chosen: None,
            detail: Some(detail),
        }
    }
}

impl fmt::Display for ConflictRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<String> = self
            .candidates
            .iter()
            .map(|c| format!("{} ({}, rank {})", c.value, c.source.code(), c.rank))
            .collect();

        write!(
            f,
            "[{}] {} {} {}: {}",
            self.entity,
            self.key,
            self.attribute,
            self.kind.as_str(),
            values.join(" vs ")
        )?;

        if let Some(chosen) = &self.chosen {
            write!(f, " → {}", chosen)?;
        }
        if let Some(detail) = &self.detail {
            write!(f, " ({})", detail)?;
        }
        Ok(())
    }
}

// ============================================================================
// CLAIMS
// ============================================================================

/// One source's assertion of a value for one key
#[derive(Debug, Clone)]
pub struct Claim<V> {
    pub value: V,
    pub source: SourceFormat,
    pub origin: String,

    /// (source position, row position): larger is more recent
    pub order: (usize, usize),
}

/// All claims for one attribute, grouped by key
#[derive(Debug, Clone)]
pub struct ClaimSet<K, V> {
    attribute: Attribute,
    claims: BTreeMap<K, Vec<Claim<V>>>,
}

impl<K: Ord + Clone, V: Clone + PartialEq> ClaimSet<K, V> {
    pub fn new(attribute: Attribute) -> Self {
        ClaimSet {
            attribute,
            claims: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, key: K, claim: Claim<V>) {
        self.claims.entry(key).or_default().push(claim);
    }

    pub fn contains(&self, key: &K) -> bool {
        self.claims.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// Pick the winning claim per key and record a conflict wherever values differ
    pub fn resolve(
        &mut self,
        key_label: impl Fn(&K) -> String,
        value_label: impl Fn(&V) -> String,
    ) -> (BTreeMap<K, Claim<V>>, Vec<ConflictRecord>) {
        let attribute = self.attribute;
        let mut winners = BTreeMap::new();
        let mut conflicts = Vec::new();

        for (key, mut claims) in std::mem::take(&mut self.claims) {
            // Strongest last: (rank, recency); stable sort keeps push order on ties
            claims.sort_by_key(|claim| (attribute.rank(claim.source), claim.order));

            // Best claim per distinct value, strongest first
            let mut distinct: Vec<&Claim<V>> = Vec::new();
            for claim in claims.iter().rev() {
                if !distinct.iter().any(|seen| seen.value == claim.value) {
                    distinct.push(claim);
                }
            }

            let Some(winner) = distinct.first().copied() else {
                continue;
            };

            if distinct.len() > 1 {
                let winner_rank = attribute.rank(winner.source);
                let kind = if distinct[1..]
                    .iter()
                    .any(|claim| attribute.rank(claim.source) == winner_rank)
                {
                    ConflictKind::EqualRank
                } else {
                    ConflictKind::HigherRank
                };

                conflicts.push(ConflictRecord {
                    entity: attribute.entity(),
                    key: key_label(&key),
                    attribute,
                    kind,
                    candidates: distinct
                        .iter()
                        .map(|claim| Candidate {
                            value: value_label(&claim.value),
                            source: claim.source,
                            origin: claim.origin.clone(),
                            rank: attribute.rank(claim.source),
                        })
                        .collect(),
                    chosen: Some(value_label(&winner.value)),
                    detail: None,
                });
            }

            winners.insert(key, winner.clone());
        }

        (winners, conflicts)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn claim(value: &str, source: SourceFormat, order: (usize, usize)) -> Claim<String> {
        Claim {
            value: value.to_string(),
            source,
            origin: format!("{}.src", source.code()),
            order,
        }
    }

    fn resolve(mut set: ClaimSet<String, String>) -> (BTreeMap<String, String>, Vec<ConflictRecord>) {
        let (winners, conflicts) = set.resolve(|k| k.clone(), |v| v.clone());
        let values = winners.into_iter().map(|(k, claim)| (k, claim.value)).collect();
        (values, conflicts)
    }

    #[test]
    fn test_precedence_ranks() {
        assert_eq!(Attribute::ClinicalTranscript.rank(SourceFormat::TranscriptMap), 2);
        assert_eq!(Attribute::ClinicalTranscript.rank(SourceFormat::ProviderPanels), 1);
        assert_eq!(Attribute::IndicationBinding.rank(SourceFormat::TestDirectory), 2);
        assert_eq!(
            Attribute::PanelComposition.rank(SourceFormat::ProviderPanels),
            Attribute::PanelComposition.rank(SourceFormat::BespokePanels)
        );
        assert_eq!(Attribute::PanelComposition.rank(SourceFormat::Nomenclature), 0);
    }

    #[test]
    fn test_higher_rank_wins_with_conflict() {
        let mut set = ClaimSet::new(Attribute::ClinicalTranscript);
        // Mapping file loaded first, panel hint later: rank beats recency
        set.push("HGNC:1100".to_string(), claim("NM_007294.4", SourceFormat::TranscriptMap, (1, 2)));
        set.push("HGNC:1100".to_string(), claim("NM_007300.4", SourceFormat::ProviderPanels, (2, 1)));

        let (winners, conflicts) = resolve(set);

        assert_eq!(winners["HGNC:1100"], "NM_007294.4");
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::HigherRank);
        assert_eq!(conflicts[0].entity, EntityType::Gene);
        assert_eq!(conflicts[0].candidates[0].value, "NM_007294.4");
        assert_eq!(conflicts[0].chosen.as_deref(), Some("NM_007294.4"));
    }

    #[test]
    fn test_equal_rank_most_recent_wins() {
        let mut set = ClaimSet::new(Attribute::PanelComposition);
        set.push("P1 v2".to_string(), claim("provider", SourceFormat::ProviderPanels, (0, 1)));
        set.push("P1 v2".to_string(), claim("bespoke", SourceFormat::BespokePanels, (1, 1)));

        let (winners, conflicts) = resolve(set);

        assert_eq!(winners["P1 v2"], "bespoke");
        assert_eq!(conflicts[0].kind, ConflictKind::EqualRank);
        assert_eq!(conflicts[0].candidates.len(), 2);
    }

    #[test]
    fn test_identical_values_do_not_conflict() {
        let mut set = ClaimSet::new(Attribute::IndicationBinding);
        set.push("R100".to_string(), claim("P1 v2", SourceFormat::ProviderPanels, (0, 1)));
        set.push("R100".to_string(), claim("P1 v2", SourceFormat::TestDirectory, (1, 2)));

        let (winners, conflicts) = resolve(set);

        assert_eq!(winners["R100"], "P1 v2");
        assert!(conflicts.is_empty());
    }

    #[test]
    fn test_one_conflict_per_key_with_many_claims() {
        let mut set = ClaimSet::new(Attribute::IndicationBinding);
        set.push("R100".to_string(), claim("P1 v1", SourceFormat::TestDirectory, (0, 2)));
        set.push("R100".to_string(), claim("P1 v2", SourceFormat::TestDirectory, (0, 3)));
        set.push("R100".to_string(), claim("P1 v1", SourceFormat::ProviderPanels, (1, 1)));

        let (winners, conflicts) = resolve(set);

        assert_eq!(winners["R100"], "P1 v2");
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::EqualRank);
        assert_eq!(conflicts[0].candidates.len(), 2);
    }

    #[test]
    fn test_conflict_display() {
        let record = ConflictRecord::unresolvable(
            EntityType::Panel,
            "P1 v2",
            Attribute::GeneIdentity,
            Candidate {
                value: "XYZ1".to_string(),
                source: SourceFormat::ProviderPanels,
                origin: "panels.json".to_string(),
                rank: 1,
            },
            &[],
        );

        assert_eq!(
            record.to_string(),
            "[panel] P1 v2 gene_identity unresolvable: XYZ1 (provider_panels, rank 1) (no nomenclature match)"
        );
    }
}
