//! The combined extraction pipeline.
//!
//! Structures are recognized with OSRA while the document text goes through
//! ChemSpot; entities of the configured classes are then converted with
//! OPSIN, optionally standardized, deduplicated and annotated. Records from
//! both sources are merged in page order.

use tracing::{debug, info};

use crate::annotate::Annotator;
use crate::document::{Document, InputKind};
use crate::entity::{self, EntityClass, EntityRecord, EntitySource};
use crate::error::Result;
use crate::media::{self, OcrOptions, RenderOptions};
use crate::normalize::{self, TextNormalizer};
use crate::standardize;
use crate::tools::chemspot::{self, ChemSpot};
use crate::tools::opsin::{NameConversion, Opsin};
use crate::tools::osra::Osra;
use crate::tools::{ExternalTool, ToolResult};

/// Everything one extraction run produced.
#[derive(Debug, Default)]
pub struct ExtractOutput {
    /// Merged records, sorted by page.
    pub records: Vec<EntityRecord>,
    /// Raw per-page OSRA output.
    pub osra_raw: Vec<String>,
    /// Raw ChemSpot output.
    pub chemspot_raw: String,
    /// Text after normalization, pages separated by form feeds.
    pub normalized_text: String,
    /// Name conversions performed by OPSIN, for separated output.
    pub conversions: Vec<NameConversion>,
}

impl ExtractOutput {
    /// Records of one source, for separated output.
    #[must_use]
    pub fn by_source(&self, source: EntitySource) -> Vec<EntityRecord> {
        self.records
            .iter()
            .filter(|rec| rec.source == source)
            .cloned()
            .collect()
    }
}

pub struct Extractor {
    pub osra: Osra,
    pub chemspot: ChemSpot,
    pub opsin: Opsin,
    pub ocr: OcrOptions,
    /// Entity classes handed to OPSIN; IUPAC names land in `Systematic`.
    pub opsin_classes: Vec<EntityClass>,
    pub convert_ions: bool,
    pub standardize: bool,
    pub dedup: bool,
    pub annotator: Option<Annotator>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self {
            osra: Osra::default(),
            chemspot: ChemSpot::default(),
            opsin: Opsin::default(),
            ocr: OcrOptions::default(),
            opsin_classes: vec![EntityClass::Systematic],
            convert_ions: true,
            standardize: true,
            dedup: false,
            annotator: None,
        }
    }
}

impl Extractor {
    /// Resolve all three binaries before any work starts.
    pub fn preflight(&self) -> ToolResult<()> {
        self.osra.preflight()?;
        self.chemspot.preflight()?;
        self.opsin.preflight()?;
        Ok(())
    }

    pub async fn process(&self, document: &Document) -> Result<ExtractOutput> {
        self.preflight()?;
        let mut output = ExtractOutput::default();

        if document.kind != InputKind::Text {
            info!(input = %document.path.display(), "recognizing structures");
            let osra = self.osra.process(document).await?;
            let mut records = osra.records;
            if self.standardize {
                for rec in &mut records {
                    standardize::apply(rec);
                }
            }
            output.osra_raw = osra.raw;
            output.records = records;
        }

        let text = media::document_text(document, &self.osra.render, &self.ocr).await?;
        let normalized = TextNormalizer::strict().normalize(&text);
        let normalized = normalize::strip_reference_markers(&normalized);
        if normalized.trim().is_empty() {
            debug!("no text to run ner over");
            output.records.sort_by_key(|rec| rec.page);
            return Ok(output);
        }

        info!("running named entity recognition");
        let paged = matches!(document.kind, InputKind::Pdf | InputKind::PdfScan)
            || normalized.contains('\u{c}');
        let ner = self.chemspot.process(&normalized, paged).await?;
        let mut ner_records = ner.records;
        output.conversions = self.enrich(&mut ner_records).await?;
        if self.dedup {
            ner_records = entity::dedup_by_text(ner_records);
        }

        output.chemspot_raw = ner.raw;
        output.normalized_text = normalized;
        output.records.extend(ner_records);

        if let Some(annotator) = &self.annotator {
            info!(records = output.records.len(), "annotating records");
            annotator.annotate(&mut output.records).await;
        }

        output.records.sort_by_key(|rec| rec.page);
        Ok(output)
    }

    /// Fill identifiers of NER records in place.
    ///
    /// Bare ions get a bracket SMILES directly; entities of the configured
    /// classes go through OPSIN once per identifier format.
    pub async fn enrich(&self, records: &mut [EntityRecord]) -> Result<Vec<NameConversion>> {
        let mut names = Vec::new();
        for rec in records.iter() {
            let Some(text) = &rec.text else { continue };
            if self.convert_ions && chemspot::is_ion(text) {
                continue;
            }
            if self.opsin_classes.contains(&rec.class) {
                names.push(text.clone());
            }
        }

        let conversions = if names.is_empty() {
            Vec::new()
        } else {
            self.opsin.convert_identifiers(&names).await?
        };
        let mut pending = conversions.iter().cloned();

        for rec in records.iter_mut() {
            let Some(text) = rec.text.clone() else { continue };
            if self.convert_ions && chemspot::is_ion(&text) {
                rec.smiles_raw = chemspot::ion_smiles(&text);
            } else if self.opsin_classes.contains(&rec.class) {
                if let Some(conversion) = pending.next() {
                    rec.smiles_raw = conversion.smiles;
                    rec.inchi = conversion.inchi;
                    rec.inchikey = conversion.inchikey;
                    rec.conversion_error = conversion.error;
                }
            }
            if self.standardize {
                standardize::apply(rec);
            }
        }
        Ok(conversions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separated_output_splits_by_source() {
        let output = ExtractOutput {
            records: vec![
                EntityRecord::structure().with_page(1),
                EntityRecord::new(EntitySource::Ner, EntityClass::Trivial)
                    .with_page(1)
                    .with_text("benzene"),
            ],
            ..ExtractOutput::default()
        };
        assert_eq!(output.by_source(EntitySource::Ocsr).len(), 1);
        assert_eq!(output.by_source(EntitySource::Ner).len(), 1);
    }

    #[tokio::test]
    async fn ion_entities_bypass_name_conversion() {
        let extractor = Extractor::default();
        let mut records = vec![
            EntityRecord::new(EntitySource::Ner, EntityClass::Trivial)
                .with_page(1)
                .with_text("Cu(II)"),
        ];
        // No OPSIN invocation happens since the only record is an ion.
        extractor.enrich(&mut records).await.unwrap();
        assert_eq!(records[0].smiles_raw.as_deref(), Some("[Cu+2]"));
        assert_eq!(records[0].smiles.as_deref(), Some("[Cu+2]"));
    }
}
