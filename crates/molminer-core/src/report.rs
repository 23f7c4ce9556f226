//! CSV and SDF report output.
//!
//! The CSV dialect is semicolon-delimited by default. Fields containing
//! the delimiter, a quote or a newline are quoted, with embedded quotes
//! doubled. A small reader for the same dialect backs the tests and the
//! separated-output mode.

use std::io::Write;
use std::path::Path;

use thiserror::Error;

use crate::entity::EntityRecord;
use crate::tools::opsin::NameConversion;

pub const DEFAULT_DELIMITER: char = ';';

/// Columns shared by the NER and merged reports.
pub const ENTITY_COLUMNS: [&str; 11] = [
    "source",
    "type",
    "page",
    "start",
    "end",
    "abbreviation",
    "entity",
    "smiles",
    "inchi",
    "inchikey",
    "conversion_error",
];

pub const ANNOTATION_COLUMNS: [&str; 5] = [
    "pubchem_cids",
    "pubchem_iupac_name",
    "pubchem_synonyms",
    "chemspider_ids",
    "chemspider_common_name",
];

/// Columns of the structure-recognition report.
pub const OCSR_COLUMNS: [&str; 6] = [
    "smiles",
    "bond_length",
    "resolution",
    "confidence",
    "page",
    "coordinates",
];

pub const CONVERSION_COLUMNS: [&str; 5] = ["iupac", "smiles", "inchi", "inchikey", "error"];

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unterminated quoted field")]
    UnterminatedQuote,
}

pub type ReportResult<T> = Result<T, ReportError>;

#[derive(Debug, Clone)]
pub struct Report {
    pub delimiter: char,
    pub write_header: bool,
    pub annotations: bool,
}

impl Default for Report {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            write_header: true,
            annotations: false,
        }
    }
}

impl Report {
    #[must_use]
    pub const fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    #[must_use]
    pub const fn with_header(mut self, write_header: bool) -> Self {
        self.write_header = write_header;
        self
    }

    #[must_use]
    pub const fn with_annotations(mut self, annotations: bool) -> Self {
        self.annotations = annotations;
        self
    }

    fn entity_header(&self) -> Vec<&'static str> {
        let mut header: Vec<&'static str> = ENTITY_COLUMNS.to_vec();
        if self.annotations {
            header.extend(ANNOTATION_COLUMNS);
        }
        header
    }

    fn render<S: AsRef<str>>(&self, header: &[&str], rows: &[Vec<S>]) -> String {
        let mut out = String::new();
        if self.write_header {
            out.push_str(&csv_line(header.iter().copied(), self.delimiter));
        }
        for row in rows {
            out.push_str(&csv_line(row.iter().map(AsRef::as_ref), self.delimiter));
        }
        out
    }

    /// NER or merged extraction report.
    #[must_use]
    pub fn entities_csv(&self, records: &[EntityRecord]) -> String {
        let rows: Vec<Vec<String>> = records.iter().map(|rec| self.entity_row(rec)).collect();
        self.render(&self.entity_header(), &rows)
    }

    /// Structure-recognition report.
    #[must_use]
    pub fn ocsr_csv(&self, records: &[EntityRecord]) -> String {
        let mut header: Vec<&'static str> = OCSR_COLUMNS.to_vec();
        if self.annotations {
            header.extend(ANNOTATION_COLUMNS);
        }
        let rows: Vec<Vec<String>> = records
            .iter()
            .map(|rec| {
                let mut row = ocsr_row(rec);
                if self.annotations {
                    row.extend(annotation_fields(rec));
                }
                row
            })
            .collect();
        self.render(&header, &rows)
    }

    /// Name-conversion report.
    #[must_use]
    pub fn conversions_csv(&self, conversions: &[NameConversion]) -> String {
        let rows: Vec<Vec<String>> = conversions
            .iter()
            .map(|c| {
                vec![
                    c.iupac.clone(),
                    c.smiles.clone().unwrap_or_default(),
                    c.inchi.clone().unwrap_or_default(),
                    c.inchikey.clone().unwrap_or_default(),
                    c.error.clone().unwrap_or_default(),
                ]
            })
            .collect();
        self.render(&CONVERSION_COLUMNS, &rows)
    }

    fn entity_row(&self, rec: &EntityRecord) -> Vec<String> {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        let mut row = vec![
            rec.source.to_string(),
            rec.class.to_string(),
            rec.page.to_string(),
            rec.start.map(|v| v.to_string()).unwrap_or_default(),
            rec.end.map(|v| v.to_string()).unwrap_or_default(),
            opt(&rec.abbreviation),
            opt(&rec.text),
            rec.smiles
                .clone()
                .or_else(|| rec.smiles_raw.clone())
                .unwrap_or_default(),
            opt(&rec.inchi),
            opt(&rec.inchikey),
            opt(&rec.conversion_error),
        ];
        if self.annotations {
            row.extend(annotation_fields(rec));
        }
        row
    }

    /// Write a rendered report to a file, or stdout when no path is set.
    pub fn write(&self, path: Option<&Path>, content: &str) -> ReportResult<()> {
        match path {
            Some(path) => std::fs::write(path, content)?,
            None => std::io::stdout().write_all(content.as_bytes())?,
        }
        Ok(())
    }
}

fn ocsr_row(rec: &EntityRecord) -> Vec<String> {
    let geometry = rec.geometry.clone().unwrap_or_default();
    let num = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
    vec![
        rec.smiles
            .clone()
            .or_else(|| rec.smiles_raw.clone())
            .unwrap_or_default(),
        num(geometry.bond_length),
        num(geometry.resolution),
        num(geometry.confidence),
        rec.page.to_string(),
        geometry.coordinates.unwrap_or_default(),
    ]
}

fn annotation_fields(rec: &EntityRecord) -> Vec<String> {
    let annotations = rec.annotations.clone().unwrap_or_default();
    vec![
        join_ids(&annotations.pubchem_cids),
        annotations.pubchem_iupac_name.unwrap_or_default(),
        annotations.pubchem_synonyms.join(","),
        join_ids(&annotations.chemspider_ids),
        annotations.chemspider_common_name.unwrap_or_default(),
    ]
}

fn join_ids(ids: &[u64]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Quote a field when the dialect requires it.
#[must_use]
pub fn csv_escape(field: &str, delimiter: char) -> String {
    if field.contains(delimiter) || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_owned()
    }
}

fn csv_line<'a>(fields: impl Iterator<Item = &'a str>, delimiter: char) -> String {
    let mut line = fields
        .map(|f| csv_escape(f, delimiter))
        .collect::<Vec<_>>()
        .join(&delimiter.to_string());
    line.push('\n');
    line
}

/// Parse text in the report dialect back into rows.
pub fn read_csv(text: &str, delimiter: char) -> ReportResult<Vec<Vec<String>>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut chars = text.chars().peekable();
    let mut quoted = false;
    let mut any = false;

    while let Some(c) = chars.next() {
        if quoted {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => quoted = false,
                _ => field.push(c),
            }
        } else if c == '"' && field.is_empty() {
            quoted = true;
            any = true;
        } else if c == delimiter {
            row.push(std::mem::take(&mut field));
            any = true;
        } else if c == '\n' {
            if any || !field.is_empty() || !row.is_empty() {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            any = false;
        } else if c != '\r' {
            field.push(c);
        }
    }
    if quoted {
        return Err(ReportError::UnterminatedQuote);
    }
    if any || !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    Ok(rows)
}

/// Write molblocks as an SDF file, each terminated with the `$$$$` record
/// separator. With `append` set, existing content is kept.
pub fn write_sdf(path: &Path, molblocks: &[String], append: bool) -> ReportResult<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(append)
        .write(true)
        .truncate(!append)
        .open(path)?;
    for block in molblocks {
        let block = block.trim_end_matches('\n');
        writeln!(file, "{block}\n$$$$")?;
    }
    Ok(())
}

/// Molblocks of records that carry one.
#[must_use]
pub fn molblocks(records: &[EntityRecord]) -> Vec<String> {
    records
        .iter()
        .filter_map(|rec| rec.molblock.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityClass, EntityRecord, EntitySource, Geometry};

    fn sample_record() -> EntityRecord {
        let mut rec = EntityRecord::new(EntitySource::Ner, EntityClass::Systematic)
            .with_page(2)
            .with_span(10, 17)
            .with_text("benzene; pure");
        rec.smiles = Some("c1ccccc1".to_owned());
        rec.inchikey = Some("UHOVQNZJYSORNB-UHFFFAOYSA-N".to_owned());
        rec
    }

    #[test]
    fn fields_with_delimiter_are_quoted() {
        assert_eq!(csv_escape("benzene; pure", ';'), "\"benzene; pure\"");
        assert_eq!(csv_escape("plain", ';'), "plain");
        assert_eq!(csv_escape("say \"hi\"", ';'), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn entity_report_round_trips() {
        let report = Report::default();
        let csv = report.entities_csv(&[sample_record()]);
        let rows = read_csv(&csv, ';').unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], ENTITY_COLUMNS.to_vec());
        let row = &rows[1];
        assert_eq!(row[0], "chemspot");
        assert_eq!(row[1], "SYSTEMATIC");
        assert_eq!(row[2], "2");
        assert_eq!(row[6], "benzene; pure");
        assert_eq!(row[7], "c1ccccc1");
    }

    #[test]
    fn annotation_columns_are_optional() {
        let report = Report::default().with_annotations(true);
        let mut rec = sample_record();
        rec.annotations_mut().pubchem_cids = vec![241, 1234];
        rec.annotations_mut().chemspider_common_name = Some("Benzene".to_owned());
        let csv = report.entities_csv(&[rec]);
        let rows = read_csv(&csv, ';').unwrap();
        assert_eq!(rows[0].len(), ENTITY_COLUMNS.len() + ANNOTATION_COLUMNS.len());
        assert_eq!(rows[1][ENTITY_COLUMNS.len()], "241,1234");
        assert_eq!(*rows[1].last().unwrap(), "Benzene");
    }

    #[test]
    fn headerless_output() {
        let report = Report::default().with_header(false);
        let csv = report.entities_csv(&[sample_record()]);
        assert!(!csv.starts_with("source"));
        assert_eq!(read_csv(&csv, ';').unwrap().len(), 1);
    }

    #[test]
    fn empty_report_is_header_only() {
        let report = Report::default();
        let csv = report.entities_csv(&[]);
        let rows = read_csv(&csv, ';').unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn ocsr_rows_carry_geometry() {
        let mut rec = EntityRecord::structure()
            .with_page(3)
            .with_smiles_raw("CCO")
            .with_geometry(Geometry {
                bond_length: Some(1.5),
                resolution: Some(300.0),
                confidence: Some(0.92),
                coordinates: Some("0x0-64x63".to_owned()),
            });
        rec.smiles = Some("CCO".to_owned());
        let csv = Report::default().ocsr_csv(&[rec]);
        let rows = read_csv(&csv, ';').unwrap();
        assert_eq!(rows[1], vec!["CCO", "1.5", "300", "0.92", "3", "0x0-64x63"]);
    }

    #[test]
    fn sdf_append_keeps_existing_blocks() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out.sdf");
        write_sdf(&path, &["first\nM  END".to_owned()], false).unwrap();
        write_sdf(&path, &["second\nM  END".to_owned()], true).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("$$$$").count(), 2);
        assert!(content.contains("first"));
        assert!(content.contains("second"));
    }
}
