pub mod convert;
pub mod extract;
pub mod ner;
pub mod ocsr;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use molminer_core::annotate::Annotator;
use molminer_core::dispatch::Dispatcher;
use molminer_core::entity::EntityClass;
use molminer_core::media::RenderOptions;
use molminer_core::report::Report;
use molminer_core::tools::chemspot::{ChemSpot, ChemSpotOptions};
use molminer_core::tools::opsin::{Opsin, OpsinFormat, OpsinOptions};
use molminer_core::tools::osra::{Osra, OsraFormat, OsraOptions};
use molminer_core::InputKind;

#[derive(Parser)]
#[command(
    name = "molminer",
    about = "Extract chemical compounds from scientific literature",
    version
)]
pub struct Cli {
    /// Increase verbosity (-v: info, -vv: debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract 2D structures from a document with OSRA
    Ocsr(ocsr::OcsrArgs),
    /// Extract chemical entities from document text with ChemSpot
    Ner(ner::NerArgs),
    /// Convert IUPAC names to SMILES, InChI and InChI-key with OPSIN
    Convert(convert::ConvertArgs),
    /// Combine OSRA, ChemSpot and OPSIN to mine a whole document
    Extract(extract::ExtractArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InputTypeArg {
    Pdf,
    PdfScan,
    Image,
    Text,
}

impl From<InputTypeArg> for InputKind {
    fn from(arg: InputTypeArg) -> Self {
        match arg {
            InputTypeArg::Pdf => Self::Pdf,
            InputTypeArg::PdfScan => Self::PdfScan,
            InputTypeArg::Image => Self::Image,
            InputTypeArg::Text => Self::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OsraFormatArg {
    Can,
    Smi,
    Sdf,
}

impl From<OsraFormatArg> for OsraFormat {
    fn from(arg: OsraFormatArg) -> Self {
        match arg {
            OsraFormatArg::Can => Self::Can,
            OsraFormatArg::Smi => Self::Smi,
            OsraFormatArg::Sdf => Self::Sdf,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OpsinFormatArg {
    Smi,
    Extendedsmi,
    Inchi,
    Stdinchi,
    Stdinchikey,
}

impl From<OpsinFormatArg> for OpsinFormat {
    fn from(arg: OpsinFormatArg) -> Self {
        match arg {
            OpsinFormatArg::Smi => Self::Smi,
            OpsinFormatArg::Extendedsmi => Self::ExtendedSmi,
            OpsinFormatArg::Inchi => Self::Inchi,
            OpsinFormatArg::Stdinchi => Self::StdInchi,
            OpsinFormatArg::Stdinchikey => Self::StdInchiKey,
        }
    }
}

/// Report destination and dialect, shared by every subcommand.
#[derive(Args, Debug)]
pub struct OutputArgs {
    /// Write the report to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// CSV delimiter
    #[arg(short, long, default_value_t = ';')]
    pub delimiter: char,
    /// Don't write the CSV header
    #[arg(long)]
    pub no_header: bool,
    /// Print the command line that would run, then exit
    #[arg(long)]
    pub dry_run: bool,
    /// Print the raw tool output instead of a CSV report
    #[arg(long)]
    pub raw_output: bool,
}

impl OutputArgs {
    pub fn report(&self, annotations: bool) -> Report {
        Report::default()
            .with_delimiter(self.delimiter)
            .with_header(!self.no_header)
            .with_annotations(annotations)
    }
}

#[derive(Args, Debug)]
pub struct OsraArgs {
    /// Path to the OSRA binary
    #[arg(long)]
    pub osra_path: Option<PathBuf>,
    /// OSRA output format
    #[arg(long, value_enum, default_value_t = OsraFormatArg::Can)]
    pub osra_format: OsraFormatArg,
    /// Format of structures embedded in the document (inchi/smi/can)
    #[arg(long)]
    pub osra_embedded_format: Option<String>,
    /// Resize images on output, e.g. 300x400
    #[arg(long)]
    pub osra_size: Option<String>,
    /// Adaptive thresholding for low contrast scans
    #[arg(long)]
    pub osra_adaptive: bool,
    /// Additional thinning for low quality documents
    #[arg(long)]
    pub osra_jaggy: bool,
    /// Rounds of unpaper pre-processing
    #[arg(long, default_value_t = 0)]
    pub osra_unpaper: u32,
    /// Gray level threshold, 0.2-0.8
    #[arg(long)]
    pub osra_gray_threshold: Option<f64>,
    /// Input resolution in DPI
    #[arg(long, default_value_t = 300)]
    pub osra_resolution: u32,
    /// Invert colors (white on black)
    #[arg(long)]
    pub osra_negate: bool,
    /// Rotate input clockwise, in degrees
    #[arg(long, default_value_t = 0)]
    pub osra_rotate: u32,
    /// Superatom label map (defaults honor OSRA_DATA_PATH)
    #[arg(long)]
    pub osra_superatom_file: Option<PathBuf>,
    /// Spelling correction dictionary (defaults honor OSRA_DATA_PATH)
    #[arg(long)]
    pub osra_spelling_file: Option<PathBuf>,
    /// Feed PDFs to OSRA directly instead of rendering pages first
    #[arg(long)]
    pub no_gm: bool,
    /// Rendering density for PDF pages
    #[arg(long, default_value_t = 300)]
    pub gm_dpi: u32,
    /// Don't trim whitespace borders off rendered pages
    #[arg(long)]
    pub no_gm_trim: bool,
    /// Pages recognized in parallel (defaults to the CPU count)
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

impl OsraArgs {
    pub fn build(&self) -> Osra {
        let mut options = OsraOptions {
            binary_path: self.osra_path.clone(),
            format: self.osra_format.into(),
            embedded_format: self.osra_embedded_format.clone(),
            size: self.osra_size.clone(),
            adaptive: self.osra_adaptive,
            jaggy: self.osra_jaggy,
            unpaper: self.osra_unpaper,
            gray_threshold: self.osra_gray_threshold,
            resolution: self.osra_resolution,
            negate: self.osra_negate,
            rotate: self.osra_rotate,
            ..OsraOptions::default()
        };
        if let Some(path) = &self.osra_superatom_file {
            options.superatom_path = path.clone();
        }
        if let Some(path) = &self.osra_spelling_file {
            options.spelling_path = path.clone();
        }
        let render = RenderOptions {
            dpi: self.gm_dpi,
            trim: !self.no_gm_trim,
            gm_path: None,
        };
        let dispatcher = self.jobs.map_or_else(Dispatcher::default, Dispatcher::new);
        let mut osra = Osra::new(options).with_render(render).with_dispatcher(dispatcher);
        osra.use_gm = !self.no_gm;
        osra
    }
}

#[derive(Args, Debug)]
pub struct ChemSpotArgs {
    /// Path to the ChemSpot wrapper script
    #[arg(long)]
    pub chemspot_path: Option<PathBuf>,
    /// Java heap limit in gigabytes
    #[arg(long, default_value_t = 8)]
    pub chemspot_memory: u32,
    /// CRF model file
    #[arg(long)]
    pub chemspot_crf: Option<PathBuf>,
    /// OpenNLP sentence model file
    #[arg(long)]
    pub chemspot_nlp: Option<PathBuf>,
    /// Dictionary automata zip (defaults honor CHEMSPOT_DATA_PATH)
    #[arg(long)]
    pub chemspot_dict: Option<PathBuf>,
    /// Term-to-id map zip (defaults honor CHEMSPOT_DATA_PATH)
    #[arg(long)]
    pub chemspot_ids: Option<PathBuf>,
    /// Multi-class model file
    #[arg(long)]
    pub chemspot_multiclass: Option<PathBuf>,
    /// Request IOB output from ChemSpot
    #[arg(long)]
    pub chemspot_iob: bool,
}

impl ChemSpotArgs {
    pub fn build(&self) -> ChemSpot {
        let defaults = ChemSpotOptions::default();
        ChemSpot::new(ChemSpotOptions {
            binary_path: self.chemspot_path.clone(),
            crf_model: self.chemspot_crf.clone(),
            nlp_model: self.chemspot_nlp.clone(),
            dictionary: self.chemspot_dict.clone(),
            ids: self.chemspot_ids.clone(),
            multiclass_model: self.chemspot_multiclass.clone().or(defaults.multiclass_model),
            iob_format: self.chemspot_iob,
            max_memory_gb: self.chemspot_memory,
        })
    }
}

#[derive(Args, Debug)]
pub struct OpsinArgs {
    /// Path to the OPSIN binary
    #[arg(long)]
    pub opsin_path: Option<PathBuf>,
    /// OPSIN output format for raw output
    #[arg(long, value_enum, default_value_t = OpsinFormatArg::Smi)]
    pub opsin_format: OpsinFormatArg,
    /// Require the word "acid" in acid names
    #[arg(long)]
    pub opsin_no_allow_acids_without_acid: bool,
    /// Disable detailed failure analysis on stderr
    #[arg(long)]
    pub opsin_no_detailed_failure_analysis: bool,
    /// Reject radical names
    #[arg(long)]
    pub opsin_no_allow_radicals: bool,
    /// Reject names with uninterpretable stereochemistry
    #[arg(long)]
    pub opsin_no_allow_uninterpretable_stereo: bool,
    /// Output radicals as wildcard atoms
    #[arg(long)]
    pub opsin_wildcard_radicals: bool,
}

impl OpsinArgs {
    pub fn build(&self) -> Opsin {
        Opsin::new(OpsinOptions {
            binary_path: self.opsin_path.clone(),
            format: self.opsin_format.into(),
            allow_acids_without_acid: !self.opsin_no_allow_acids_without_acid,
            detailed_failure_analysis: !self.opsin_no_detailed_failure_analysis,
            allow_radicals: !self.opsin_no_allow_radicals,
            allow_uninterpretable_stereo: !self.opsin_no_allow_uninterpretable_stereo,
            wildcard_radicals: self.opsin_wildcard_radicals,
        })
    }
}

#[derive(Args, Debug)]
pub struct AnnotationArgs {
    /// Don't look entities up in PubChem and ChemSpider
    #[arg(long)]
    pub no_annotation: bool,
    /// ChemSpider API token; without it only PubChem is queried
    #[arg(long)]
    pub chemspider_token: Option<String>,
    /// Seconds to sleep between annotated entities
    #[arg(long, default_value_t = 2)]
    pub annotation_sleep: u64,
}

impl AnnotationArgs {
    pub fn build(&self) -> anyhow::Result<Option<Annotator>> {
        if self.no_annotation {
            return Ok(None);
        }
        let annotator = Annotator::new(self.chemspider_token.as_deref())?
            .with_sleep(Duration::from_secs(self.annotation_sleep));
        Ok(Some(annotator))
    }
}

/// Parse `--opsin-types` values into entity classes. Values may be repeated
/// or comma-separated.
pub fn parse_opsin_types(types: &[String]) -> anyhow::Result<Vec<EntityClass>> {
    types
        .iter()
        .flat_map(|t| t.split(','))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| EntityClass::parse(t).ok_or_else(|| anyhow::anyhow!("unknown entity class: {t}")))
        .collect()
}
