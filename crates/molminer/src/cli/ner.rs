use std::io::{IsTerminal, Read};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use molminer_core::document::{Document, InputKind};
use molminer_core::entity;
use molminer_core::extract::Extractor;
use molminer_core::media::{self, OcrOptions, RenderOptions};
use molminer_core::normalize::{self, TextNormalizer};

use super::{
    parse_opsin_types, AnnotationArgs, ChemSpotArgs, InputTypeArg, OpsinArgs, OutputArgs,
};

#[derive(Args, Debug)]
pub struct NerArgs {
    /// Document to process; text is read from stdin when omitted
    pub input: Option<PathBuf>,
    /// Skip the magic-byte check and treat the input as this type
    #[arg(short, long, value_enum)]
    pub input_type: Option<InputTypeArg>,
    /// OCR language for scanned documents, e.g. eng or eng+deu
    #[arg(long, default_value = "eng")]
    pub lang: String,
    /// Tesseract language data directory (defaults honor TESSDATA_PREFIX)
    #[arg(long)]
    pub tessdata_path: Option<PathBuf>,
    /// Assign pages from form feed separators in plain text input
    #[arg(long)]
    pub paged_text: bool,
    /// Feed the text to ChemSpot as-is, without normalization
    #[arg(long)]
    pub no_normalize_text: bool,
    /// Entity classes converted with OPSIN
    #[arg(long = "opsin-types", default_value = "SYSTEMATIC")]
    pub opsin_types: Vec<String>,
    /// Don't convert bare ion mentions like Cu(II) to SMILES
    #[arg(long)]
    pub no_convert_ions: bool,
    /// Don't standardize converted notation
    #[arg(long)]
    pub no_standardize: bool,
    /// Drop entities whose text was already seen
    #[arg(long)]
    pub remove_duplicates: bool,

    #[command(flatten)]
    pub output: OutputArgs,
    #[command(flatten)]
    pub chemspot: ChemSpotArgs,
    #[command(flatten)]
    pub opsin: OpsinArgs,
    #[command(flatten)]
    pub annotation: AnnotationArgs,
}

pub async fn run(args: NerArgs) -> Result<()> {
    let chemspot = args.chemspot.build();

    if args.output.dry_run {
        println!("{}", chemspot.command_line());
        return Ok(());
    }

    let ocr = OcrOptions {
        lang: args.lang.clone(),
        tessdata_dir: args
            .tessdata_path
            .clone()
            .or_else(|| std::env::var_os("TESSDATA_PREFIX").map(PathBuf::from)),
        tesseract_path: None,
    };

    let (text, paged) = match &args.input {
        Some(path) => {
            let document = Document::open(path, args.input_type.map(Into::into))?;
            let paged = matches!(document.kind, InputKind::Pdf | InputKind::PdfScan)
                || args.paged_text;
            let text = media::document_text(&document, &RenderOptions::default(), &ocr).await?;
            (text, paged)
        }
        None => {
            let mut stdin = std::io::stdin();
            if stdin.is_terminal() {
                bail!("no input file given and stdin is a terminal");
            }
            let mut text = String::new();
            stdin
                .read_to_string(&mut text)
                .context("reading text from stdin")?;
            (text, args.paged_text)
        }
    };

    let normalized = if args.no_normalize_text {
        text
    } else {
        let normalized = TextNormalizer::strict().normalize(&text);
        normalize::strip_reference_markers(&normalized)
    };

    let extractor = Extractor {
        chemspot,
        opsin: args.opsin.build(),
        opsin_classes: parse_opsin_types(&args.opsin_types)?,
        convert_ions: !args.no_convert_ions,
        standardize: !args.no_standardize,
        dedup: args.remove_duplicates,
        ..Extractor::default()
    };

    let mut records = Vec::new();
    let mut raw = String::new();
    if normalized.trim().is_empty() {
        tracing::warn!("input is empty after normalization");
    } else {
        let ner = extractor.chemspot.process(&normalized, paged).await?;
        records = ner.records;
        raw = ner.raw;
        extractor.enrich(&mut records).await?;
        if extractor.dedup {
            records = entity::dedup_by_text(records);
        }
    }

    if args.output.raw_output {
        let report = args.output.report(false);
        report.write(args.output.output.as_deref(), &raw)?;
        return Ok(());
    }

    let annotator = args.annotation.build()?;
    if let Some(annotator) = &annotator {
        annotator.annotate(&mut records).await;
    }

    let report = args.output.report(annotator.is_some());
    report.write(args.output.output.as_deref(), &report.entities_csv(&records))?;
    Ok(())
}
