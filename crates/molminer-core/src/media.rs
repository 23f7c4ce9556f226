//! Raster and text acquisition from input documents.
//!
//! PDFs are rendered to per-page PNGs with GraphicsMagick, born-digital PDF
//! text comes from `pdftotext`, and scanned pages go through Tesseract.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tempfile::TempDir;

use crate::document::{Document, InputKind};
use crate::exec::{self, ExecError, ExecResult};

pub const DEFAULT_DPI: u32 = 300;
pub const DEFAULT_OCR_LANG: &str = "eng";

/// Settings for PDF rasterization.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub dpi: u32,
    pub trim: bool,
    pub gm_path: Option<PathBuf>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            trim: false,
            gm_path: None,
        }
    }
}

/// Settings for Tesseract OCR.
#[derive(Debug, Clone)]
pub struct OcrOptions {
    pub lang: String,
    pub tessdata_dir: Option<PathBuf>,
    pub tesseract_path: Option<PathBuf>,
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self {
            lang: DEFAULT_OCR_LANG.to_owned(),
            tessdata_dir: std::env::var_os("TESSDATA_PREFIX").map(PathBuf::from),
            tesseract_path: None,
        }
    }
}

fn page_index_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\.png$").unwrap())
}

fn program(path: Option<&Path>, default: &str) -> String {
    path.map_or_else(|| default.to_owned(), |p| p.display().to_string())
}

/// Render every page of a PDF into `dir` as `{stem}-{index}.png`.
///
/// GraphicsMagick numbers the output files from zero, so page numbers are
/// the embedded index plus one.
pub async fn pdf_to_images(
    input: &Path,
    dir: &Path,
    options: &RenderOptions,
) -> ExecResult<Vec<(PathBuf, u32)>> {
    let stem = input
        .file_stem()
        .map_or_else(|| "page".to_owned(), |s| s.to_string_lossy().into_owned());
    let pattern = dir.join(format!("{stem}-%d.png"));

    let mut args = vec![
        "convert".to_owned(),
        "-density".to_owned(),
        options.dpi.to_string(),
        input.display().to_string(),
        "+adjoin".to_owned(),
    ];
    if options.trim {
        args.push("-trim".to_owned());
    }
    args.extend([
        "-quality".to_owned(),
        "100".to_owned(),
        pattern.display().to_string(),
    ]);

    let gm = program(options.gm_path.as_deref(), "gm");
    exec::run(&gm, &args).await?.ensure_success(&gm)?;

    page_images(dir)
}

/// List rendered page images in `dir`, sorted by page number.
pub fn page_images(dir: &Path) -> ExecResult<Vec<(PathBuf, u32)>> {
    let mut pages = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let name = path.to_string_lossy().into_owned();
        if let Some(caps) = page_index_re().captures(&name) {
            if let Ok(index) = caps[1].parse::<u32>() {
                pages.push((path, index + 1));
            }
        }
    }
    pages.sort_by_key(|(_, page)| *page);
    Ok(pages)
}

/// Text of a born-digital PDF, pages separated by form feeds.
pub async fn pdf_text(input: &Path) -> ExecResult<String> {
    let output = exec::run("pdftotext", [input.display().to_string(), "-".to_owned()])
        .await?
        .ensure_success("pdftotext")?;
    Ok(output.stdout)
}

/// OCR a single raster image.
pub async fn ocr_image(input: &Path, options: &OcrOptions) -> ExecResult<String> {
    let mut args = vec![
        input.display().to_string(),
        "stdout".to_owned(),
        "-l".to_owned(),
        options.lang.clone(),
    ];
    if let Some(dir) = &options.tessdata_dir {
        args.push("--tessdata-dir".to_owned());
        args.push(dir.display().to_string());
    }
    let tesseract = program(options.tesseract_path.as_deref(), "tesseract");
    let output = exec::run(&tesseract, &args)
        .await?
        .ensure_success(&tesseract)?;
    Ok(output.stdout)
}

/// Full text of a document, dispatched on its kind.
///
/// Scanned PDFs are rendered page by page and OCRed; the per-page results
/// are joined with form feeds so downstream page assignment keeps working.
pub async fn document_text(
    document: &Document,
    render: &RenderOptions,
    ocr: &OcrOptions,
) -> ExecResult<String> {
    match document.kind {
        InputKind::Text => Ok(std::fs::read_to_string(&document.path)?),
        InputKind::Pdf => pdf_text(&document.path).await,
        InputKind::Image => ocr_image(&document.path, ocr).await,
        InputKind::PdfScan => {
            let dir = TempDir::new().map_err(ExecError::Io)?;
            let pages = pdf_to_images(&document.path, dir.path(), render).await?;
            let mut texts = Vec::with_capacity(pages.len());
            for (path, _) in &pages {
                texts.push(ocr_image(path, ocr).await?);
            }
            Ok(texts.join("\u{c}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_listing_sorts_numerically() {
        let dir = TempDir::new().unwrap();
        for idx in [10u32, 0, 2, 1] {
            std::fs::write(dir.path().join(format!("doc-{idx}.png")), b"x").unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let pages = page_images(dir.path()).unwrap();
        let numbers: Vec<u32> = pages.iter().map(|(_, p)| *p).collect();
        assert_eq!(numbers, vec![1, 2, 3, 11]);
        assert!(pages[0].0.to_string_lossy().ends_with("doc-0.png"));
    }

    #[tokio::test]
    async fn text_document_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("input.txt");
        std::fs::write(&path, "aspirin\u{c}benzene").unwrap();

        let document = Document::open(&path, Some(InputKind::Text)).unwrap();
        let text = document_text(
            &document,
            &RenderOptions::default(),
            &OcrOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(text, "aspirin\u{c}benzene");
    }
}
