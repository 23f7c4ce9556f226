//! Compound-database annotation of extracted entities.
//!
//! Each record is looked up in PubChem and, when a token is configured, in
//! ChemSpider. Lookups run once per record with a fixed identifier
//! precedence; a single unambiguous hit backfills identifiers the tools
//! could not produce. Annotation failures never fail the run, the record
//! just stays unannotated.

pub mod chemspider;
pub mod pubchem;

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::entity::{EntityClass, EntityRecord};

pub use chemspider::ChemSpider;
pub use pubchem::{PubChem, Query};

pub const DEFAULT_SLEEP: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum AnnotateError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{service} returned status {status}")]
    Api { service: &'static str, status: u16 },
    #[error("chemspider token is not a valid header value")]
    InvalidToken,
    #[error("chemspider search failed: {0}")]
    Search(String),
}

pub type AnnotateResult<T> = Result<T, AnnotateError>;

#[derive(Debug, Clone)]
pub struct Annotator {
    pubchem: PubChem,
    chemspider: Option<ChemSpider>,
    /// Pause between records, to keep the public APIs happy.
    sleep: Duration,
}

impl Annotator {
    pub fn new(chemspider_token: Option<&str>) -> AnnotateResult<Self> {
        let chemspider = match chemspider_token {
            Some(token) if !token.is_empty() => Some(ChemSpider::new(token)?),
            _ => None,
        };
        if chemspider.is_none() {
            warn!("no chemspider token configured, annotating with pubchem only");
        }
        Ok(Self {
            pubchem: PubChem::new()?,
            chemspider,
            sleep: DEFAULT_SLEEP,
        })
    }

    #[must_use]
    pub const fn with_sleep(mut self, sleep: Duration) -> Self {
        self.sleep = sleep;
        self
    }

    /// Annotate every record in place.
    pub async fn annotate(&self, records: &mut [EntityRecord]) {
        let total = records.len();
        for (i, record) in records.iter_mut().enumerate() {
            debug!(entity = i + 1, total, "annotating");
            if let Err(err) = self.annotate_record(record).await {
                warn!(entity = i + 1, error = %err, "annotation failed");
            }
            if i + 1 < total {
                tokio::time::sleep(self.sleep).await;
            }
        }
    }

    async fn annotate_record(&self, record: &mut EntityRecord) -> AnnotateResult<()> {
        let Some(query) = record_query(record) else {
            return Ok(());
        };

        let cids = self.pubchem.cids(query_ref(&query)).await?;
        if !cids.is_empty() {
            if let [cid] = cids[..] {
                self.backfill_from_pubchem(record, cid).await?;
            }
            record.annotations_mut().pubchem_cids = cids;
        }

        if let Some(chemspider) = &self.chemspider {
            // The RSC API only searches by name-like strings.
            let term = match &query {
                RecordQuery::InchiKey(v) | RecordQuery::Name(v) => v.clone(),
                RecordQuery::Smiles(_) | RecordQuery::Inchi(_) | RecordQuery::Formula(_) => {
                    return Ok(())
                }
            };
            let ids = chemspider.search(&term).await?;
            if !ids.is_empty() {
                if let [id] = ids[..] {
                    self.backfill_from_chemspider(chemspider, record, id).await?;
                }
                record.annotations_mut().chemspider_ids = ids;
            }
        }
        Ok(())
    }

    async fn backfill_from_pubchem(&self, record: &mut EntityRecord, cid: u64) -> AnnotateResult<()> {
        if let Some(props) = self.pubchem.properties(cid).await? {
            if record.smiles.is_none() {
                record.smiles = props.canonical_smiles;
            }
            if record.inchi.is_none() {
                record.inchi = props.inchi;
            }
            if record.inchikey.is_none() {
                record.inchikey = props.inchikey;
            }
            record.annotations_mut().pubchem_iupac_name = props.iupac_name;
        }
        let synonyms = self.pubchem.synonyms(cid).await?;
        record.annotations_mut().pubchem_synonyms = synonyms;
        Ok(())
    }

    async fn backfill_from_chemspider(
        &self,
        chemspider: &ChemSpider,
        record: &mut EntityRecord,
        id: u64,
    ) -> AnnotateResult<()> {
        if let Some(details) = chemspider.details(id).await? {
            if record.smiles.is_none() {
                record.smiles = details.smiles;
            }
            if record.inchi.is_none() {
                record.inchi = details.stdinchi;
            }
            if record.inchikey.is_none() {
                record.inchikey = details.stdinchikey;
            }
            record.annotations_mut().chemspider_common_name = details.common_name;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum RecordQuery {
    InchiKey(String),
    Name(String),
    Formula(String),
    Smiles(String),
    Inchi(String),
}

fn query_ref(query: &RecordQuery) -> Query<'_> {
    match query {
        RecordQuery::InchiKey(v) => Query::InchiKey(v),
        RecordQuery::Name(v) => Query::Name(v),
        RecordQuery::Formula(v) => Query::Formula(v),
        RecordQuery::Smiles(v) => Query::Smiles(v),
        RecordQuery::Inchi(v) => Query::Inchi(v),
    }
}

/// Best search identifier for a record. InChIKey is the least ambiguous;
/// FORMULA entity text searches by formula instead of by name, and a
/// SMILES with a wildcard atom never matches and is skipped.
fn record_query(record: &EntityRecord) -> Option<RecordQuery> {
    if let Some(key) = nonempty(record.inchikey.as_deref()) {
        return Some(RecordQuery::InchiKey(key));
    }
    if let Some(name) = nonempty(record.text.as_deref()).or_else(|| nonempty(record.abbreviation.as_deref())) {
        if record.class == EntityClass::Formula {
            return Some(RecordQuery::Formula(name));
        }
        return Some(RecordQuery::Name(name));
    }
    if let Some(smiles) = nonempty(record.smiles.as_deref().or(record.smiles_raw.as_deref())) {
        if !smiles.contains('*') {
            return Some(RecordQuery::Smiles(smiles));
        }
    }
    nonempty(record.inchi.as_deref()).map(RecordQuery::Inchi)
}

fn nonempty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityClass, EntitySource};

    #[test]
    fn inchikey_takes_precedence() {
        let mut rec = EntityRecord::new(EntitySource::Ner, EntityClass::Trivial).with_text("benzene");
        rec.inchikey = Some("UHOVQNZJYSORNB-UHFFFAOYSA-N".to_owned());
        assert_eq!(
            record_query(&rec),
            Some(RecordQuery::InchiKey("UHOVQNZJYSORNB-UHFFFAOYSA-N".to_owned()))
        );
    }

    #[test]
    fn name_falls_back_to_abbreviation() {
        let mut rec = EntityRecord::new(EntitySource::Ner, EntityClass::Abbreviation);
        rec.abbreviation = Some("THF".to_owned());
        assert_eq!(record_query(&rec), Some(RecordQuery::Name("THF".to_owned())));
    }

    #[test]
    fn formula_entity_queries_by_formula() {
        let rec = EntityRecord::new(EntitySource::Ner, EntityClass::Formula).with_text("C6H6");
        assert_eq!(
            record_query(&rec),
            Some(RecordQuery::Formula("C6H6".to_owned()))
        );
    }

    #[test]
    fn wildcard_smiles_is_skipped() {
        let rec = EntityRecord::structure().with_smiles_raw("C*CC");
        assert_eq!(record_query(&rec), None);
    }

    #[test]
    fn structure_smiles_is_searchable() {
        let rec = EntityRecord::structure().with_smiles_raw("c1ccccc1");
        assert_eq!(
            record_query(&rec),
            Some(RecordQuery::Smiles("c1ccccc1".to_owned()))
        );
    }
}
