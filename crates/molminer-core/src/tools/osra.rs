//! OSRA wrapper for optical chemical structure recognition.
//!
//! PDFs are rendered to per-page PNGs first and the pages are recognized in
//! parallel; with `use_gm` off the PDF goes to OSRA in one piece instead and
//! page numbers come from its own page column. Every invocation
//! carries the metadata flags (`--bond --coordinates --page --guess
//! --print`) so that the SMILES output lines can be parsed positionally.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::TempDir;
use tracing::debug;

use crate::dispatch::Dispatcher;
use crate::document::{Document, InputKind};
use crate::entity::{EntityRecord, Geometry};
use crate::exec::{self, ExecError};
use crate::media::{self, RenderOptions};
use crate::tools::{ExternalTool, ToolError, ToolResult};

const TOOL: &str = "osra";

/// Flags appended to every invocation; the SMILES line parser depends on
/// the column order they produce.
const METADATA_FLAGS: [&str; 5] = ["--bond", "--coordinates", "--page", "--guess", "--print"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OsraFormat {
    /// Canonical SMILES.
    #[default]
    Can,
    Smi,
    Sdf,
}

impl OsraFormat {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Can => "can",
            Self::Smi => "smi",
            Self::Sdf => "sdf",
        }
    }

    #[must_use]
    pub const fn is_sdf(self) -> bool {
        matches!(self, Self::Sdf)
    }
}

impl fmt::Display for OsraFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn data_path(name: &str) -> PathBuf {
    std::env::var_os("OSRA_DATA_PATH").map_or_else(|| PathBuf::from(name), |dir| PathBuf::from(dir).join(name))
}

/// Command-line options of the OSRA binary.
#[derive(Debug, Clone)]
pub struct OsraOptions {
    pub binary_path: Option<PathBuf>,
    pub format: OsraFormat,
    /// Format of structures embedded in the source document, `inchi`,
    /// `smi` or `can`.
    pub embedded_format: Option<String>,
    /// Output image resize, e.g. `300x400`.
    pub size: Option<String>,
    pub verbose: bool,
    pub debug: bool,
    pub adaptive: bool,
    pub jaggy: bool,
    /// Rounds of unpaper pre-processing.
    pub unpaper: u32,
    /// Gray level threshold, 0.2-0.8.
    pub gray_threshold: Option<f64>,
    pub resolution: u32,
    pub negate: bool,
    /// Clockwise rotation in degrees.
    pub rotate: u32,
    pub superatom_path: PathBuf,
    pub spelling_path: PathBuf,
}

impl Default for OsraOptions {
    fn default() -> Self {
        Self {
            binary_path: None,
            format: OsraFormat::default(),
            embedded_format: None,
            size: None,
            verbose: false,
            debug: false,
            adaptive: false,
            jaggy: false,
            unpaper: 0,
            gray_threshold: None,
            resolution: 300,
            negate: false,
            rotate: 0,
            superatom_path: data_path("superatom.txt"),
            spelling_path: data_path("spelling.txt"),
        }
    }
}

impl OsraOptions {
    /// Arguments for one invocation, without the input file.
    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(size) = &self.size {
            args.extend(["--size".to_owned(), size.clone()]);
        }
        if self.verbose {
            args.push("--verbose".to_owned());
        }
        if self.debug {
            args.push("--debug".to_owned());
        }
        if let Some(format) = &self.embedded_format {
            args.extend(["--embedded-format".to_owned(), format.clone()]);
        }
        args.extend(["--format".to_owned(), self.format.as_str().to_owned()]);
        if self.adaptive {
            args.push("--adaptive".to_owned());
        }
        if self.jaggy {
            args.push("--jaggy".to_owned());
        }
        if self.unpaper > 0 {
            args.extend(["--unpaper".to_owned(), self.unpaper.to_string()]);
        }
        if let Some(threshold) = self.gray_threshold {
            args.extend(["--threshold".to_owned(), threshold.to_string()]);
        }
        args.extend(["--resolution".to_owned(), self.resolution.to_string()]);
        if self.negate {
            args.push("--negate".to_owned());
        }
        if self.rotate > 0 {
            args.extend(["--rotate".to_owned(), self.rotate.to_string()]);
        }
        args.extend([
            "--superatom".to_owned(),
            self.superatom_path.display().to_string(),
            "--spelling".to_owned(),
            self.spelling_path.display().to_string(),
        ]);
        args.extend(METADATA_FLAGS.iter().map(|&f| f.to_owned()));
        args
    }
}

/// Recognized structures plus the raw per-page tool output.
#[derive(Debug, Default)]
pub struct OsraOutput {
    pub records: Vec<EntityRecord>,
    /// Raw stdout of each successfully recognized page, in page order.
    pub raw: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Osra {
    pub options: OsraOptions,
    pub render: RenderOptions,
    pub dispatcher: Dispatcher,
    /// Render PDFs to page images before recognition. When off, the PDF is
    /// fed to OSRA directly and page numbers come from its page column.
    pub use_gm: bool,
    /// Page number forced onto every record, for callers that already know
    /// which page a lone image came from.
    pub custom_page: Option<u32>,
}

impl Default for Osra {
    fn default() -> Self {
        Self {
            options: OsraOptions::default(),
            render: RenderOptions::default(),
            dispatcher: Dispatcher::default(),
            use_gm: true,
            custom_page: None,
        }
    }
}

impl Osra {
    #[must_use]
    pub fn new(options: OsraOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_render(mut self, render: RenderOptions) -> Self {
        self.render = render;
        self
    }

    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Full command line for one input, for `--dry-run`.
    #[must_use]
    pub fn command_line(&self, input: &Path) -> String {
        let binary = self
            .options
            .binary_path
            .as_ref()
            .map_or_else(|| TOOL.to_owned(), |p| p.display().to_string());
        let mut parts = vec![binary];
        parts.extend(self.options.to_args());
        parts.push(input.display().to_string());
        parts.join(" ")
    }

    /// Recognize all structures in a document.
    pub async fn process(&self, document: &Document) -> ToolResult<OsraOutput> {
        let binary = self.preflight()?;
        match document.kind {
            InputKind::Image => {
                let stdout = run_page(&binary, &self.options.to_args(), &document.path).await?;
                Ok(collect(
                    &[(self.custom_page.unwrap_or(1), stdout)],
                    self.options.format,
                ))
            }
            InputKind::Pdf | InputKind::PdfScan if !self.use_gm => {
                // OSRA reads the whole PDF itself and reports page numbers
                // in its page column.
                let stdout = run_page(&binary, &self.options.to_args(), &document.path).await?;
                Ok(collect_direct(&stdout, self.options.format, self.custom_page))
            }
            InputKind::Pdf | InputKind::PdfScan => {
                let dir = TempDir::new().map_err(ExecError::Io)?;
                let pages = media::pdf_to_images(&document.path, dir.path(), &self.render).await?;
                debug!(pages = pages.len(), "rendered pdf for recognition");
                let args = self.options.to_args();
                let outputs = self
                    .dispatcher
                    .run(pages, move |path, _| {
                        let binary = binary.clone();
                        let args = args.clone();
                        async move { run_page(&binary, &args, &path).await }
                    })
                    .await;
                Ok(collect(&outputs, self.options.format))
            }
            InputKind::Text => Ok(OsraOutput::default()),
        }
    }
}

#[async_trait]
impl ExternalTool for Osra {
    fn name(&self) -> &'static str {
        TOOL
    }

    fn binary_path(&self) -> Option<&Path> {
        self.options.binary_path.as_deref()
    }

    async fn version(&self) -> ToolResult<String> {
        let binary = self.preflight()?;
        let output = exec::run(&binary, ["--version"]).await?;
        // OSRA prints its version banner on stderr.
        if output.stderr.trim().is_empty() {
            Ok(output.stdout.trim().to_owned())
        } else {
            Ok(output.stderr.trim().to_owned())
        }
    }
}

async fn run_page(binary: &Path, args: &[String], input: &Path) -> ToolResult<String> {
    let mut full = args.to_vec();
    full.push(input.display().to_string());
    let output = exec::run(binary, &full)
        .await?
        .ensure_success(TOOL)?;
    Ok(output.stdout)
}

fn collect(outputs: &[(u32, String)], format: OsraFormat) -> OsraOutput {
    let mut result = OsraOutput::default();
    for (page, stdout) in outputs {
        if stdout.trim().is_empty() {
            continue;
        }
        if format.is_sdf() {
            result.records.extend(parse_sdf_output(stdout, *page));
        } else {
            result.records.extend(parse_smiles_output(stdout, Some(*page)));
        }
        result.raw.push(stdout.clone());
    }
    result.records.sort_by_key(|rec| rec.page);
    result
}

/// Collect the output of one direct (unrendered) invocation.
fn collect_direct(stdout: &str, format: OsraFormat, custom_page: Option<u32>) -> OsraOutput {
    let mut result = OsraOutput::default();
    if stdout.trim().is_empty() {
        return result;
    }
    if format.is_sdf() {
        result.records = parse_sdf_output(stdout, custom_page.unwrap_or(1));
    } else {
        result.records = parse_smiles_output(stdout, custom_page);
    }
    result.raw.push(stdout.to_owned());
    result.records.sort_by_key(|rec| rec.page);
    result
}

/// Parse the SMILES-format output of one invocation.
///
/// With the metadata flags each line reads
/// `<smiles> <bond_length> <resolution> <confidence> <page> <coordinates>`.
/// When OSRA saw a rendered single-page image its page column always says 1
/// and `page` carries the real number; `None` keeps OSRA's own column, for
/// direct multi-page input.
pub fn parse_smiles_output(output: &str, page: Option<u32>) -> Vec<EntityRecord> {
    output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let smiles = *fields.first()?;
            if smiles.is_empty() {
                return None;
            }
            let geometry = Geometry {
                bond_length: fields.get(1).and_then(|v| v.parse().ok()),
                resolution: fields.get(2).and_then(|v| v.parse().ok()),
                confidence: fields.get(3).and_then(|v| v.parse().ok()),
                coordinates: fields.get(5).map(|v| (*v).to_owned()),
            };
            let page = page
                .or_else(|| fields.get(4).and_then(|v| v.parse().ok()))
                .unwrap_or(1);
            Some(
                EntityRecord::structure()
                    .with_page(page)
                    .with_smiles_raw(smiles)
                    .with_geometry(geometry),
            )
        })
        .collect()
}

/// Parse the SDF-format output of one page into per-molecule records.
pub fn parse_sdf_output(output: &str, page: u32) -> Vec<EntityRecord> {
    output
        .split("$$$$")
        .filter(|block| !block.trim().is_empty())
        .map(|block| {
            let mut rec = EntityRecord::structure().with_page(page);
            rec.molblock = Some(format!("{}\n", block.trim_matches('\n')));
            rec
        })
        .collect()
}
