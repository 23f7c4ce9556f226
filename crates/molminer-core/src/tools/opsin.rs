//! OPSIN wrapper for IUPAC name to structure conversion.
//!
//! OPSIN reads one name per line on stdin and writes one line per name on
//! stdout, blank when the name could not be parsed. Failure details go to
//! stderr after a banner line, one message per failed name in input order.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use crate::exec;
use crate::tools::{ExternalTool, ToolError, ToolResult};

const TOOL: &str = "opsin";

fn plural_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(nitrate|bromide|chloride|iodide|amine|ketoxime|ketone|oxime)s").unwrap()
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpsinFormat {
    #[default]
    Smi,
    ExtendedSmi,
    Inchi,
    StdInchi,
    StdInchiKey,
}

impl OpsinFormat {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Smi => "smi",
            Self::ExtendedSmi => "extendedsmi",
            Self::Inchi => "inchi",
            Self::StdInchi => "stdinchi",
            Self::StdInchiKey => "stdinchikey",
        }
    }
}

impl fmt::Display for OpsinFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct OpsinOptions {
    pub binary_path: Option<PathBuf>,
    pub format: OpsinFormat,
    pub allow_acids_without_acid: bool,
    pub detailed_failure_analysis: bool,
    pub allow_radicals: bool,
    pub allow_uninterpretable_stereo: bool,
    pub wildcard_radicals: bool,
}

impl Default for OpsinOptions {
    fn default() -> Self {
        Self {
            binary_path: None,
            format: OpsinFormat::default(),
            allow_acids_without_acid: true,
            detailed_failure_analysis: true,
            allow_radicals: true,
            allow_uninterpretable_stereo: true,
            wildcard_radicals: false,
        }
    }
}

impl OpsinOptions {
    #[must_use]
    pub fn to_args(&self, format: OpsinFormat) -> Vec<String> {
        let mut args = Vec::new();
        if self.allow_acids_without_acid {
            args.push("--allowAcidsWithoutAcid".to_owned());
        }
        if self.detailed_failure_analysis {
            args.push("--detailedFailureAnalysis".to_owned());
        }
        args.extend(["--output".to_owned(), format.as_str().to_owned()]);
        if self.allow_radicals {
            args.push("--allowRadicals".to_owned());
        }
        if self.allow_uninterpretable_stereo {
            args.push("--allowUninterpretableStereo".to_owned());
        }
        if self.wildcard_radicals {
            args.push("--wildcardRadicals".to_owned());
        }
        args
    }
}

/// Result of converting one name in one output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    pub iupac: String,
    pub output: Option<String>,
    pub error: Option<String>,
}

/// Identifiers gathered for one name across output formats.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameConversion {
    pub iupac: String,
    pub smiles: Option<String>,
    pub inchi: Option<String>,
    pub inchikey: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Opsin {
    pub options: OpsinOptions,
}

impl Opsin {
    #[must_use]
    pub fn new(options: OpsinOptions) -> Self {
        Self { options }
    }

    /// Full command line, for `--dry-run`.
    #[must_use]
    pub fn command_line(&self) -> String {
        let binary = self
            .options
            .binary_path
            .as_ref()
            .map_or_else(|| TOOL.to_owned(), |p| p.display().to_string());
        let mut parts = vec![binary];
        parts.extend(self.options.to_args(self.options.format));
        parts.join(" ")
    }

    /// Convert a batch of names in the configured output format.
    pub async fn convert(&self, names: &[String]) -> ToolResult<Vec<Conversion>> {
        self.convert_as(names, self.options.format).await
    }

    /// Convert a batch of names in an explicit output format.
    pub async fn convert_as(
        &self,
        names: &[String],
        format: OpsinFormat,
    ) -> ToolResult<Vec<Conversion>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let binary = self.preflight()?;
        let normalized: Vec<String> = names.iter().map(|n| normalize_iupac(n)).collect();
        let stdin = normalized.join("\n");
        let output = exec::run_with_stdin(&binary, self.options.to_args(format), &stdin).await?;
        parse_batch(&normalized, &output.stdout, &output.stderr)
    }

    /// Convert a batch of names once per identifier format.
    pub async fn convert_identifiers(&self, names: &[String]) -> ToolResult<Vec<NameConversion>> {
        let smiles = self.convert_as(names, OpsinFormat::Smi).await?;
        let inchi = self.convert_as(names, OpsinFormat::StdInchi).await?;
        let keys = self.convert_as(names, OpsinFormat::StdInchiKey).await?;

        Ok(smiles
            .into_iter()
            .zip(inchi)
            .zip(keys)
            .map(|((smi, inchi), key)| NameConversion {
                iupac: smi.iupac,
                smiles: smi.output,
                inchi: inchi.output,
                inchikey: key.output,
                error: smi.error,
            })
            .collect())
    }
}

#[async_trait]
impl ExternalTool for Opsin {
    fn name(&self) -> &'static str {
        TOOL
    }

    fn binary_path(&self) -> Option<&Path> {
        self.options.binary_path.as_deref()
    }

    async fn version(&self) -> ToolResult<String> {
        let binary = self.preflight()?;
        let output = exec::run_with_stdin(&binary, ["-h"], "").await?;
        // The banner on the first stderr line carries the version.
        Ok(output.stderr.lines().next().unwrap_or_default().to_owned())
    }
}

/// Pair converted lines with their input names.
fn parse_batch(names: &[String], stdout: &str, stderr: &str) -> ToolResult<Vec<Conversion>> {
    let outputs: Vec<&str> = stdout.lines().collect();
    if outputs.len() < names.len() {
        return Err(ToolError::parse(
            TOOL,
            format!("{} names but {} output lines", names.len(), outputs.len()),
        ));
    }
    // First stderr line is the tool banner, then one message per failure.
    let mut errors = stderr.lines().skip(1).filter(|l| !l.trim().is_empty());

    Ok(names
        .iter()
        .zip(outputs)
        .map(|(name, line)| {
            let line = line.trim();
            if line.is_empty() {
                Conversion {
                    iupac: name.clone(),
                    output: None,
                    error: Some(errors.next().unwrap_or_default().trim().to_owned()),
                }
            } else {
                Conversion {
                    iupac: name.clone(),
                    output: Some(line.to_owned()),
                    error: None,
                }
            }
        })
        .collect())
}

/// Normalize a name the way OPSIN expects.
///
/// Common plurals are reduced to their singular form and the first letter
/// of every word is lowercased.
#[must_use]
pub fn normalize_iupac(name: &str) -> String {
    let singular = plural_re().replace_all(name, "$1");
    singular
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_lowercase().collect::<String>() + chars.as_str()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_carry_output_format() {
        let options = OpsinOptions {
            allow_radicals: true,
            ..OpsinOptions::default()
        };
        let args = options.to_args(OpsinFormat::StdInchiKey);
        let pos = args.iter().position(|a| a == "--output").unwrap();
        assert_eq!(args[pos + 1], "stdinchikey");
        assert!(args.contains(&"--allowRadicals".to_owned()));
    }

    #[test]
    fn plurals_and_case_normalize() {
        assert_eq!(normalize_iupac("Ammonium Nitrates"), "ammonium nitrate");
        assert_eq!(normalize_iupac("Sodium CHLORIDES"), "sodium cHLORIDE");
        assert_eq!(normalize_iupac("benzene"), "benzene");
    }

    #[test]
    fn batch_pairs_errors_with_blank_lines() {
        let names = vec!["ethanol".to_owned(), "gibberish".to_owned(), "benzene".to_owned()];
        let stdout = "CCO\n\nc1ccccc1\n";
        let stderr = "OPSIN v2.7.0 (see https://opsin.ch.cam.ac.uk)\ngibberish is not a valid name\n";
        let conversions = parse_batch(&names, stdout, stderr).unwrap();
        assert_eq!(conversions[0].output.as_deref(), Some("CCO"));
        assert!(conversions[0].error.is_none());
        assert!(conversions[1].output.is_none());
        assert_eq!(
            conversions[1].error.as_deref(),
            Some("gibberish is not a valid name")
        );
        assert_eq!(conversions[2].output.as_deref(), Some("c1ccccc1"));
    }

    #[test]
    fn short_output_is_a_parse_error() {
        let names = vec!["a".to_owned(), "b".to_owned()];
        assert!(parse_batch(&names, "CCO\n", "banner\n").is_err());
    }
}
