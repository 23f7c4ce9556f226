use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Class assigned to a detected chemical mention.
///
/// NER classes come from ChemSpot; `Structure` marks a 2D depiction
/// recognized by OSRA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityClass {
    Systematic,
    Identifier,
    Formula,
    Trivial,
    Abbreviation,
    Family,
    Multiple,
    Structure,
}

impl EntityClass {
    pub const NER_CLASSES: [Self; 7] = [
        Self::Systematic,
        Self::Identifier,
        Self::Formula,
        Self::Trivial,
        Self::Abbreviation,
        Self::Family,
        Self::Multiple,
    ];

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SYSTEMATIC" => Some(Self::Systematic),
            "IDENTIFIER" => Some(Self::Identifier),
            "FORMULA" => Some(Self::Formula),
            "TRIVIAL" => Some(Self::Trivial),
            "ABBREVIATION" => Some(Self::Abbreviation),
            "FAMILY" => Some(Self::Family),
            "MULTIPLE" => Some(Self::Multiple),
            "2D_STRUCTURE" | "STRUCTURE" => Some(Self::Structure),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Systematic => "SYSTEMATIC",
            Self::Identifier => "IDENTIFIER",
            Self::Formula => "FORMULA",
            Self::Trivial => "TRIVIAL",
            Self::Abbreviation => "ABBREVIATION",
            Self::Family => "FAMILY",
            Self::Multiple => "MULTIPLE",
            Self::Structure => "2D_STRUCTURE",
        }
    }
}

impl fmt::Display for EntityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which wrapped tool produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitySource {
    Ocsr,
    Ner,
}

impl EntitySource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ocsr => "osra",
            Self::Ner => "chemspot",
        }
    }
}

impl fmt::Display for EntitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geometry reported by OSRA for a recognized structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub bond_length: Option<f64>,
    pub resolution: Option<f64>,
    pub confidence: Option<f64>,
    pub coordinates: Option<String>,
}

/// Compound-database annotations gathered for a record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotations {
    pub pubchem_cids: Vec<u64>,
    pub pubchem_iupac_name: Option<String>,
    pub pubchem_synonyms: Vec<String>,
    pub chemspider_ids: Vec<u64>,
    pub chemspider_common_name: Option<String>,
}

impl Annotations {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pubchem_cids.is_empty()
            && self.pubchem_iupac_name.is_none()
            && self.pubchem_synonyms.is_empty()
            && self.chemspider_ids.is_empty()
            && self.chemspider_common_name.is_none()
    }
}

/// One detected chemical mention.
///
/// Created when a wrapper parses a tool output line; enriched by the
/// standardization and annotation passes; terminal once written to output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    pub source: EntitySource,
    pub class: EntityClass,
    pub page: u32,
    pub start: Option<usize>,
    pub end: Option<usize>,
    pub abbreviation: Option<String>,
    pub text: Option<String>,
    /// Notation exactly as the tool emitted it.
    pub smiles_raw: Option<String>,
    /// Standardized SMILES, filled only when standardization is enabled.
    pub smiles: Option<String>,
    pub inchi: Option<String>,
    pub inchikey: Option<String>,
    pub conversion_error: Option<String>,
    /// Molblock for SDF output, when the tool produced one.
    pub molblock: Option<String>,
    pub geometry: Option<Geometry>,
    pub annotations: Option<Annotations>,
}

impl EntityRecord {
    #[must_use]
    pub fn new(source: EntitySource, class: EntityClass) -> Self {
        Self {
            source,
            class,
            page: 1,
            start: None,
            end: None,
            abbreviation: None,
            text: None,
            smiles_raw: None,
            smiles: None,
            inchi: None,
            inchikey: None,
            conversion_error: None,
            molblock: None,
            geometry: None,
            annotations: None,
        }
    }

    #[must_use]
    pub fn structure() -> Self {
        Self::new(EntitySource::Ocsr, EntityClass::Structure)
    }

    #[must_use]
    pub const fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    #[must_use]
    pub const fn with_span(mut self, start: usize, end: usize) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    #[must_use]
    pub fn with_smiles_raw(mut self, smiles: impl Into<String>) -> Self {
        self.smiles_raw = Some(smiles.into());
        self
    }

    #[must_use]
    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// Annotations slot, created on demand.
    pub fn annotations_mut(&mut self) -> &mut Annotations {
        self.annotations.get_or_insert_with(Annotations::default)
    }
}

/// Remove records whose entity text was already seen; first occurrence wins.
/// Records without text (structures) are always kept.
#[must_use]
pub fn dedup_by_text(records: Vec<EntityRecord>) -> Vec<EntityRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|rec| match &rec.text {
            Some(text) => seen.insert(text.clone()),
            None => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_parse_round_trip() {
        for class in EntityClass::NER_CLASSES {
            assert_eq!(EntityClass::parse(class.as_str()), Some(class));
        }
        assert_eq!(
            EntityClass::parse("2D_STRUCTURE"),
            Some(EntityClass::Structure)
        );
        assert_eq!(EntityClass::parse("systematic"), Some(EntityClass::Systematic));
        assert_eq!(EntityClass::parse("NOPE"), None);
    }

    #[test]
    fn builder_defaults() {
        let rec = EntityRecord::structure().with_page(3);
        assert_eq!(rec.source, EntitySource::Ocsr);
        assert_eq!(rec.page, 3);
        assert!(rec.smiles.is_none());
        assert!(rec.annotations.is_none());
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let make = |text: &str| {
            EntityRecord::new(EntitySource::Ner, EntityClass::Trivial).with_text(text)
        };
        let records = vec![make("benzene"), make("toluene"), make("benzene")];
        let deduped = dedup_by_text(records);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].text.as_deref(), Some("benzene"));
    }

    #[test]
    fn dedup_keeps_textless_records() {
        let records = vec![
            EntityRecord::structure(),
            EntityRecord::structure(),
        ];
        assert_eq!(dedup_by_text(records).len(), 2);
    }
}
