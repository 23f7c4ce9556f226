use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use molminer_core::document::Document;
use molminer_core::report;
use molminer_core::standardize;
use molminer_core::tools::osra::OsraFormat;

use super::{AnnotationArgs, InputTypeArg, OsraArgs, OutputArgs};

#[derive(Args, Debug)]
pub struct OcsrArgs {
    /// Document to process (PDF or image)
    pub input: PathBuf,
    /// Skip the magic-byte check and treat the input as this type
    #[arg(short, long, value_enum)]
    pub input_type: Option<InputTypeArg>,
    /// Don't standardize recognized SMILES
    #[arg(long)]
    pub no_standardize: bool,
    /// Write an SDF file next to the CSV (requires --osra-format sdf)
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
    pub annotation: AnnotationArgs,
}

pub async fn run(args: OcsrArgs) -> Result<()> {
    let osra = args.osra.build();

    if args.output.dry_run {
        println!("{}", osra.command_line(&args.input));
        return Ok(());
    }

    let document = Document::open(&args.input, args.input_type.map(Into::into))?;
    let result = osra.process(&document).await?;

    if args.output.raw_output {
        let report = args.output.report(false);
        report.write(args.output.output.as_deref(), &result.raw.join("\n"))?;
        return Ok(());
    }

    let mut records = result.records;
    if !args.no_standardize {
        for rec in &mut records {
            standardize::apply(rec);
        }
    }

    let annotator = args.annotation.build()?;
    if let Some(annotator) = &annotator {
        annotator.annotate(&mut records).await;
    }

    let report = args.output.report(annotator.is_some());
    report.write(args.output.output.as_deref(), &report.ocsr_csv(&records))?;

    if let Some(sdf_path) = &args.sdf_output {
        if osra.options.format == OsraFormat::Sdf {
            report::write_sdf(sdf_path, &report::molblocks(&records), args.sdf_append)?;
        } else {
            tracing::warn!("--sdf-output needs --osra-format sdf, skipping");
        }
    }
    Ok(())
}
