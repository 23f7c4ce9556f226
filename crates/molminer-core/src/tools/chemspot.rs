//! ChemSpot wrapper for chemical named entity recognition.
//!
//! ChemSpot is a Java tool launched through its wrapper script, which takes
//! the heap limit in gigabytes as its first argument. Input and output go
//! through temporary files. The tab-separated output needs repair before
//! parsing because entity names containing a newline get split across rows.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use tempfile::NamedTempFile;

use crate::entity::{EntityClass, EntityRecord, EntitySource};
use crate::exec::{self, ExecError};
use crate::normalize;
use crate::tools::{ExternalTool, ToolError, ToolResult};

const TOOL: &str = "chemspot";

/// Placeholder the wrapper script expects for a disabled model argument.
const DISABLED: &str = "''";

pub const DEFAULT_MAX_MEMORY_GB: u32 = 8;

fn ion_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\s*(?P<ion>[A-Z][a-z]?)\s*\((?P<charge>-?\+?i+\+?-?|-?\+?I+\+?-?|\d+\+|\d+-|\+\d+|-\d+|\++|-+)\)\s*$",
        )
        .unwrap()
    })
}

fn charge_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?P<roman>i+|I+)|(?P<digit>\d+)|(?P<signs>^\++|-+$)").unwrap())
}

fn data_path(name: &str) -> Option<PathBuf> {
    std::env::var_os("CHEMSPOT_DATA_PATH").map(|dir| PathBuf::from(dir).join(name))
}

/// Command-line options of the ChemSpot wrapper script.
///
/// Dictionary and ID lookup are disabled by default since they are very
/// memory hungry; CRF, sentence and multiclass models stay on.
#[derive(Debug, Clone)]
pub struct ChemSpotOptions {
    pub binary_path: Option<PathBuf>,
    /// CRF model file; the tool's bundled model when unset.
    pub crf_model: Option<PathBuf>,
    /// OpenNLP sentence model file; the tool's bundled model when unset.
    pub nlp_model: Option<PathBuf>,
    pub dictionary: Option<PathBuf>,
    pub ids: Option<PathBuf>,
    pub multiclass_model: Option<PathBuf>,
    pub iob_format: bool,
    /// Java heap limit in gigabytes.
    pub max_memory_gb: u32,
}

impl Default for ChemSpotOptions {
    fn default() -> Self {
        Self {
            binary_path: None,
            crf_model: None,
            nlp_model: None,
            dictionary: None,
            ids: None,
            multiclass_model: data_path("multiclass.bin")
                .or_else(|| Some(PathBuf::from("multiclass.bin"))),
            iob_format: false,
            max_memory_gb: DEFAULT_MAX_MEMORY_GB,
        }
    }
}

impl ChemSpotOptions {
    /// Full argument list for one invocation.
    #[must_use]
    pub fn to_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let path_or_disabled = |p: &Option<PathBuf>| {
            p.as_ref()
                .map_or_else(|| DISABLED.to_owned(), |p| p.display().to_string())
        };
        let mut args = vec![self.max_memory_gb.to_string()];
        if let Some(crf) = &self.crf_model {
            args.extend(["-m".to_owned(), crf.display().to_string()]);
        }
        if let Some(nlp) = &self.nlp_model {
            args.extend(["-s".to_owned(), nlp.display().to_string()]);
        }
        args.extend(["-d".to_owned(), path_or_disabled(&self.dictionary)]);
        args.extend(["-i".to_owned(), path_or_disabled(&self.ids)]);
        args.extend(["-M".to_owned(), path_or_disabled(&self.multiclass_model)]);
        if self.iob_format {
            args.push("-I".to_owned());
        }
        args.extend(["-t".to_owned(), input.display().to_string()]);
        args.extend(["-o".to_owned(), output.display().to_string()]);
        args
    }
}

/// One token of IOB-format output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IobToken {
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub tag: String,
}

/// Recognized entities plus the raw tab-separated tool output.
#[derive(Debug, Default)]
pub struct ChemSpotOutput {
    pub records: Vec<EntityRecord>,
    pub raw: String,
}

#[derive(Debug, Clone, Default)]
pub struct ChemSpot {
    pub options: ChemSpotOptions,
}

impl ChemSpot {
    #[must_use]
    pub fn new(options: ChemSpotOptions) -> Self {
        Self { options }
    }

    /// Full command line with placeholder file names, for `--dry-run`.
    #[must_use]
    pub fn command_line(&self) -> String {
        let binary = self
            .options
            .binary_path
            .as_ref()
            .map_or_else(|| TOOL.to_owned(), |p| p.display().to_string());
        let mut parts = vec![binary];
        parts.extend(
            self.options
                .to_args(Path::new("<input>"), Path::new("<output>")),
        );
        parts.join(" ")
    }

    /// Run NER over already normalized text.
    ///
    /// When `paged` is set, entity pages are assigned from the form feed
    /// separators left in the text by the extraction stage.
    pub async fn process(&self, text: &str, paged: bool) -> ToolResult<ChemSpotOutput> {
        let binary = self.preflight()?;

        let mut input = NamedTempFile::new().map_err(ExecError::Io)?;
        input.write_all(text.as_bytes()).map_err(ExecError::Io)?;
        input.flush().map_err(ExecError::Io)?;
        let output_file = NamedTempFile::new().map_err(ExecError::Io)?;

        let args = self.options.to_args(input.path(), output_file.path());
        let output = exec::run(&binary, &args).await?;
        if output.stderr.contains("OutOfMemoryError") {
            return Err(ToolError::OutOfMemory);
        }
        output.ensure_success(TOOL)?;

        let raw = std::fs::read_to_string(output_file.path()).map_err(ExecError::Io)?;
        let mut records = if self.options.iob_format {
            iob_records(&parse_iob(&raw))
        } else {
            parse_entities(&raw)?
        };

        if paged {
            let ends = normalize::page_ends(text);
            for rec in &mut records {
                if let Some(start) = rec.start {
                    rec.page = normalize::page_of(&ends, start);
                }
            }
        }
        Ok(ChemSpotOutput { records, raw })
    }
}

#[async_trait]
impl ExternalTool for ChemSpot {
    fn name(&self) -> &'static str {
        TOOL
    }

    fn binary_path(&self) -> Option<&Path> {
        self.options.binary_path.as_deref()
    }

    async fn version(&self) -> ToolResult<String> {
        // The tool has no version flag; this is the wrapped release.
        Ok("2.0".to_owned())
    }
}

fn span(fields: &[&str]) -> ToolResult<(usize, usize)> {
    let parse = |v: &str| {
        v.trim()
            .parse::<usize>()
            .map_err(|_| ToolError::parse(TOOL, format!("bad offset: {v:?}")))
    };
    Ok((parse(fields[0])?, parse(fields[1])?))
}

/// Parse the tab-separated entity output.
///
/// Rows normally read `start TAB end TAB text TAB TYPE`. A rarer five
/// column variant carries the expanded entity in the fifth column. A row
/// with only three columns means the entity text contained a newline; the
/// remainder of the text and the type follow on the next row.
pub fn parse_entities(output: &str) -> ToolResult<Vec<EntityRecord>> {
    let mut records = Vec::new();
    let mut rows = output
        .lines()
        .map(str::trim_end)
        .filter(|row| !row.trim().is_empty());

    while let Some(row) = rows.next() {
        let fields: Vec<&str> = row.split('\t').collect();
        let (start, end, text, class_name, abbreviation) = match fields.len() {
            4 => {
                let (start, end) = span(&fields)?;
                (start, end, fields[2].to_owned(), fields[3], fields[2])
            }
            5 => {
                let (start, end) = span(&fields)?;
                (start, end, fields[4].to_owned(), fields[3], fields[2])
            }
            3 => {
                // Wrapped row; the continuation holds the rest of the text
                // and the type.
                let next = rows
                    .next()
                    .ok_or_else(|| ToolError::parse(TOOL, "wrapped row without continuation"))?;
                let cont: Vec<&str> = next.split('\t').collect();
                if cont.len() < 2 {
                    return Err(ToolError::parse(TOOL, format!("bad continuation: {next:?}")));
                }
                let (start, end) = span(&fields)?;
                let text = format!("{} {}", fields[2].trim(), cont[0].trim());
                (start, end, text, cont[1], "")
            }
            n => {
                return Err(ToolError::parse(TOOL, format!("row with {n} columns: {row:?}")));
            }
        };

        let class = EntityClass::parse(class_name)
            .ok_or_else(|| ToolError::parse(TOOL, format!("unknown entity class: {class_name:?}")))?;
        let mut rec = EntityRecord::new(EntitySource::Ner, class)
            .with_span(start, end)
            .with_text(text);
        if class == EntityClass::Abbreviation && !abbreviation.is_empty() {
            rec.abbreviation = Some(abbreviation.to_owned());
        }
        records.push(rec);
    }
    Ok(records)
}

/// Parse IOB-format output. The leading `###` marker row is skipped.
pub fn parse_iob(output: &str) -> Vec<IobToken> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let (text, rest) = match fields.len() {
                4 => (fields[0].to_owned(), &fields[1..]),
                3 => (String::new(), &fields[0..]),
                _ => return None,
            };
            Some(IobToken {
                text,
                start: rest[0].parse().ok()?,
                end: rest[1].parse().ok()?,
                tag: rest[2].to_owned(),
            })
        })
        .collect()
}

fn iob_records(tokens: &[IobToken]) -> Vec<EntityRecord> {
    tokens
        .iter()
        .filter_map(|token| {
            let class = EntityClass::parse(token.tag.trim_start_matches("B-").trim_start_matches("I-"))?;
            Some(
                EntityRecord::new(EntitySource::Ner, class)
                    .with_span(token.start, token.end)
                    .with_text(token.text.clone()),
            )
        })
        .collect()
}

/// Bracket SMILES for a bare ion mention such as `Cu(II)` or `Fe(3+)`.
///
/// Roman numeral charges are always positive, matching the oxidation state
/// notation they come from.
#[must_use]
pub fn ion_smiles(entity: &str) -> Option<String> {
    let caps = ion_re().captures(entity)?;
    let ion = caps.name("ion")?.as_str();
    let charge = caps.name("charge")?.as_str();
    let charge_caps = charge_re().captures(charge)?;

    if let Some(roman) = charge_caps.name("roman") {
        return Some(format!("[{ion}+{}]", roman.as_str().len()));
    }
    if let Some(digit) = charge_caps.name("digit") {
        if charge.contains('+') {
            return Some(format!("[{ion}+{}]", digit.as_str()));
        }
        if charge.contains('-') {
            return Some(format!("[{ion}-{}]", digit.as_str()));
        }
        return None;
    }
    if let Some(signs) = charge_caps.name("signs") {
        let signs = signs.as_str();
        let sign = signs.chars().next()?;
        return Some(format!("[{ion}{sign}{}]", signs.len()));
    }
    None
}

/// True when a mention is a bare ion the OPSIN stage should skip.
#[must_use]
pub fn is_ion(entity: &str) -> bool {
    ion_re().is_match(entity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_order_matches_wrapper_contract() {
        let options = ChemSpotOptions {
            multiclass_model: Some(PathBuf::from("multiclass.bin")),
            ..ChemSpotOptions::default()
        };
        let args = options.to_args(Path::new("in.txt"), Path::new("out.tsv"));
        assert_eq!(args[0], "8");
        assert_eq!(
            &args[1..],
            &[
                "-d", "''", "-i", "''", "-M", "multiclass.bin", "-t", "in.txt", "-o", "out.tsv"
            ]
        );
    }

    #[test]
    fn iob_flag_precedes_input() {
        let options = ChemSpotOptions {
            iob_format: true,
            multiclass_model: Some(PathBuf::from("multiclass.bin")),
            ..ChemSpotOptions::default()
        };
        let args = options.to_args(Path::new("in.txt"), Path::new("out.tsv"));
        let iob = args.iter().position(|a| a == "-I").unwrap();
        let input = args.iter().position(|a| a == "-t").unwrap();
        assert!(iob < input);
    }

    #[test]
    fn plain_rows_parse() {
        let output = "12\t19\tbenzene\tTRIVIAL\n30\t33\tTHF\tABBREVIATION\n";
        let records = parse_entities(output).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text.as_deref(), Some("benzene"));
        assert_eq!(records[0].class, EntityClass::Trivial);
        assert_eq!(records[0].start, Some(12));
        assert_eq!(records[1].abbreviation.as_deref(), Some("THF"));
    }

    #[test]
    fn wrapped_row_is_rejoined() {
        let output = "5355\t5396\t3-(cyclohexylamino)-1-propanesulfonic\nacid\tSYSTEMATIC\n";
        let records = parse_entities(output).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].text.as_deref(),
            Some("3-(cyclohexylamino)-1-propanesulfonic acid")
        );
        assert_eq!(records[0].class, EntityClass::Systematic);
    }

    #[test]
    fn five_column_row_takes_last_field() {
        let output = "0\t3\tTHF\tIDENTIFIER\ttetrahydrofuran\n";
        let records = parse_entities(output).unwrap();
        assert_eq!(records[0].text.as_deref(), Some("tetrahydrofuran"));
        assert_eq!(records[0].class, EntityClass::Identifier);
    }

    #[test]
    fn iob_rows_parse() {
        let output = "### doc\nbenzene\t0\t6\tB-TRIVIAL\nwas\t8\t10\tO\n";
        let tokens = parse_iob(output);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].text, "benzene");
        assert_eq!(tokens[0].tag, "B-TRIVIAL");
        assert_eq!(tokens[1].tag, "O");
    }

    #[test]
    fn ion_conversion() {
        assert_eq!(ion_smiles("Cu(II)").as_deref(), Some("[Cu+2]"));
        assert_eq!(ion_smiles("Ni(ii)").as_deref(), Some("[Ni+2]"));
        assert_eq!(ion_smiles("Fe(3+)").as_deref(), Some("[Fe+3]"));
        assert_eq!(ion_smiles("Cl(-)").as_deref(), Some("[Cl-1]"));
        assert_eq!(ion_smiles("Fe(-3)").as_deref(), Some("[Fe-3]"));
        assert_eq!(ion_smiles("benzene"), None);
    }

    #[test]
    fn ion_detection() {
        assert!(is_ion(" Zn (2+) "));
        assert!(!is_ion("acetic acid"));
    }
}
