use std::io::{IsTerminal, Read};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use molminer_core::standardize;

use super::{OpsinArgs, OutputArgs};

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Names to convert; read one per line from the input file or stdin
    /// when omitted
    pub names: Vec<String>,
    /// File with one IUPAC name per line
    #[arg(short, long)]
    pub input_file: Option<PathBuf>,
    /// Don't standardize converted notation
    #[arg(long)]
    pub no_standardize: bool,

    #[command(flatten)]
    pub output: OutputArgs,
    #[command(flatten)]
    pub opsin: OpsinArgs,
}

pub async fn run(args: ConvertArgs) -> Result<()> {
    let opsin = args.opsin.build();

    if args.output.dry_run {
        println!("{}", opsin.command_line());
        return Ok(());
    }

    let names = gather_names(&args)?;
    if names.is_empty() {
        bail!("no names to convert");
    }

    if args.output.raw_output {
        let conversions = opsin.convert(&names).await?;
        let raw: String = conversions
            .iter()
            .map(|c| format!("{}\n", c.output.clone().unwrap_or_default()))
            .collect();
        args.output
            .report(false)
            .write(args.output.output.as_deref(), &raw)?;
        return Ok(());
    }

    let mut conversions = opsin.convert_identifiers(&names).await?;
    if !args.no_standardize {
        for conversion in &mut conversions {
            if let Some(smiles) = &conversion.smiles {
                conversion.smiles = standardize::standardize_smiles(smiles);
            }
            if let Some(key) = &conversion.inchikey {
                conversion.inchikey = standardize::normalize_inchikey(key);
            }
        }
    }

    let report = args.output.report(false);
    report.write(
        args.output.output.as_deref(),
        &report.conversions_csv(&conversions),
    )?;
    Ok(())
}

fn gather_names(args: &ConvertArgs) -> Result<Vec<String>> {
    if !args.names.is_empty() {
        return Ok(args.names.clone());
    }
    let text = match &args.input_file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading names from {}", path.display()))?,
        None => {
            let mut stdin = std::io::stdin();
            if stdin.is_terminal() {
                bail!("no names given and stdin is a terminal");
            }
            let mut text = String::new();
            stdin.read_to_string(&mut text).context("reading names from stdin")?;
            text
        }
    };
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect())
}
