use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use molminer_core::document::Document;
use molminer_core::entity::EntitySource;
use molminer_core::extract::Extractor;
use molminer_core::media::OcrOptions;
use molminer_core::report;
use molminer_core::tools::osra::OsraFormat;

use super::{
    parse_opsin_types, AnnotationArgs, ChemSpotArgs, InputTypeArg, OpsinArgs, OsraArgs,
    OutputArgs,
};

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Document to process (PDF or image)
    pub input: PathBuf,
    /// Skip the magic-byte check and treat the input as this type
    #[arg(short, long, value_enum)]
    pub input_type: Option<InputTypeArg>,
    /// OCR language for scanned documents, e.g. eng or eng+deu
    #[arg(long, default_value = "eng")]
    pub lang: String,
    /// Tesseract language data directory (defaults honor TESSDATA_PREFIX)
    #[arg(long)]
    pub tessdata_path: Option<PathBuf>,
    /// Entity classes converted with OPSIN
    #[arg(long = "opsin-types", default_value = "SYSTEMATIC")]
    pub opsin_types: Vec<String>,
    /// Don't convert bare ion mentions like Cu(II) to SMILES
    #[arg(long)]
    pub no_convert_ions: bool,
    /// Don't standardize notation
    #[arg(long)]
    pub no_standardize: bool,
    /// Drop entities whose text was already seen
    #[arg(long)]
    pub remove_duplicates: bool,
    /// Also write .ocsr, .ner and .opsin reports next to the output file
    #[arg(long)]
    pub separated_output: bool,
    /// Base path for the structure SDF, written as <base>-osra.sdf
    /// (requires --osra-format sdf)
    #[arg(long)]
    pub sdf_output: Option<PathBuf>,
    /// Append to an existing SDF file instead of replacing it
    #[arg(long)]
    pub sdf_append: bool,

    #[command(flatten)]
    pub output: OutputArgs,
    #[command(flatten)]
    pub osra: OsraArgs,
    #[command(flatten)]
    pub chemspot: ChemSpotArgs,
    #[command(flatten)]
    pub opsin: OpsinArgs,
    #[command(flatten)]
    pub annotation: AnnotationArgs,
}

pub async fn run(args: ExtractArgs) -> Result<()> {
    let osra = args.osra.build();
    let chemspot = args.chemspot.build();
    let opsin = args.opsin.build();

    if args.output.dry_run {
        println!("{}", osra.command_line(&args.input));
        println!("{}", chemspot.command_line());
        println!("{}", opsin.command_line());
        return Ok(());
    }

    let annotator = args.annotation.build()?;
    let annotated = annotator.is_some();
    let extractor = Extractor {
        osra,
        chemspot,
        opsin,
        ocr: OcrOptions {
            lang: args.lang.clone(),
            tessdata_dir: args
                .tessdata_path
                .clone()
                .or_else(|| std::env::var_os("TESSDATA_PREFIX").map(PathBuf::from)),
            tesseract_path: None,
        },
        opsin_classes: parse_opsin_types(&args.opsin_types)?,
        convert_ions: !args.no_convert_ions,
        standardize: !args.no_standardize,
        dedup: args.remove_duplicates,
        annotator,
    };

    let document = Document::open(&args.input, args.input_type.map(Into::into))?;
    let result = extractor.process(&document).await?;

    if args.output.raw_output {
        let mut raw = result.osra_raw.join("\n");
        if !raw.is_empty() && !result.chemspot_raw.is_empty() {
            raw.push('\n');
        }
        raw.push_str(&result.chemspot_raw);
        args.output
            .report(false)
            .write(args.output.output.as_deref(), &raw)?;
        return Ok(());
    }

    let report = args.output.report(annotated);
    report.write(
        args.output.output.as_deref(),
        &report.entities_csv(&result.records),
    )?;

    if args.separated_output {
        if let Some(base) = &args.output.output {
            report.write(
                Some(&suffixed(base, "ocsr")),
                &report.ocsr_csv(&result.by_source(EntitySource::Ocsr)),
            )?;
            report.write(
                Some(&suffixed(base, "ner")),
                &report.entities_csv(&result.by_source(EntitySource::Ner)),
            )?;
            report.write(
                Some(&suffixed(base, "opsin")),
                &report.conversions_csv(&result.conversions),
            )?;
        } else {
            tracing::warn!("--separated-output needs --output, skipping");
        }
    }

    if let Some(sdf_base) = &args.sdf_output {
        if extractor.osra.options.format == OsraFormat::Sdf {
            report::write_sdf(
                &sdf_side_file(sdf_base),
                &report::molblocks(&result.records),
                args.sdf_append,
            )?;
        } else {
            tracing::warn!("--sdf-output needs --osra-format sdf, skipping");
        }
    }
    Ok(())
}

fn suffixed(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// `--sdf-output` names a base; the structure SDF lands next to it.
fn sdf_side_file(base: &Path) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push("-osra.sdf");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sdf_side_file_gets_osra_suffix() {
        assert_eq!(
            sdf_side_file(Path::new("out/report")),
            PathBuf::from("out/report-osra.sdf")
        );
    }

    #[test]
    fn separated_reports_append_source_suffix() {
        assert_eq!(
            suffixed(Path::new("report.csv"), "ocsr"),
            PathBuf::from("report.csv.ocsr")
        );
    }
}
