use std::fmt;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("input file not found: {0}")]
    NotFound(String),
    #[error("unsupported input type: {0}")]
    Unsupported(String),
    #[error("unknown input type '{0}' (expected one of: pdf, pdf_scan, image, text)")]
    UnknownKind(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DocumentResult<T> = Result<T, DocumentError>;

/// Kind of an input unit.
///
/// `PdfScan` looks like a regular PDF on disk (same magic bytes), so it can
/// only be declared, never detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Pdf,
    PdfScan,
    Image,
    Text,
}

impl InputKind {
    pub fn parse(s: &str) -> DocumentResult<Self> {
        match s {
            "pdf" => Ok(Self::Pdf),
            "pdf_scan" => Ok(Self::PdfScan),
            "image" => Ok(Self::Image),
            "text" => Ok(Self::Text),
            other => Err(DocumentError::UnknownKind(other.to_string())),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::PdfScan => "pdf_scan",
            Self::Image => "image",
            Self::Text => "text",
        }
    }

    /// Detect the input kind from magic bytes.
    ///
    /// Empty files are treated as text so they flow through the pipeline and
    /// produce zero records rather than an error.
    pub fn detect(path: &Path) -> DocumentResult<Self> {
        if !path.exists() {
            return Err(DocumentError::NotFound(path.display().to_string()));
        }

        let mut head = [0u8; 512];
        let mut file = std::fs::File::open(path)?;
        let n = file.read(&mut head)?;
        let head = &head[..n];

        Self::from_magic(head)
            .ok_or_else(|| DocumentError::Unsupported(path.display().to_string()))
    }

    fn from_magic(head: &[u8]) -> Option<Self> {
        if head.is_empty() {
            return Some(Self::Text);
        }
        if head.starts_with(b"%PDF-") {
            return Some(Self::Pdf);
        }
        let image_magics: [&[u8]; 6] = [
            b"\x89PNG\r\n\x1a\n",
            b"\xff\xd8\xff",
            b"GIF87a",
            b"GIF89a",
            b"II*\x00",
            b"MM\x00*",
        ];
        if image_magics.iter().any(|m| head.starts_with(m)) || head.starts_with(b"BM") {
            return Some(Self::Image);
        }
        // The head is a fixed-size read, so it may end mid-character.
        match std::str::from_utf8(head) {
            Ok(_) => Some(Self::Text),
            Err(err) if err.error_len().is_none() => Some(Self::Text),
            Err(_) => None,
        }
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An input unit: a path plus its detected or declared kind.
#[derive(Debug, Clone)]
pub struct Document {
    pub path: std::path::PathBuf,
    pub kind: InputKind,
}

impl Document {
    /// Open a document, detecting its kind unless one is declared.
    pub fn open(path: &Path, declared: Option<InputKind>) -> DocumentResult<Self> {
        let kind = match declared {
            Some(kind) => {
                if !path.exists() {
                    return Err(DocumentError::NotFound(path.display().to_string()));
                }
                kind
            }
            None => InputKind::detect(path)?,
        };
        Ok(Self {
            path: path.to_path_buf(),
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn detect_bytes(bytes: &[u8]) -> DocumentResult<InputKind> {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        InputKind::detect(file.path())
    }

    #[test]
    fn detects_pdf() {
        assert_eq!(detect_bytes(b"%PDF-1.5\n...").unwrap(), InputKind::Pdf);
    }

    #[test]
    fn detects_png_and_jpeg() {
        assert_eq!(
            detect_bytes(b"\x89PNG\r\n\x1a\n0000").unwrap(),
            InputKind::Image
        );
        assert_eq!(detect_bytes(b"\xff\xd8\xff\xe0rest").unwrap(), InputKind::Image);
    }

    #[test]
    fn detects_plain_text() {
        assert_eq!(
            detect_bytes(b"acetic acid was added").unwrap(),
            InputKind::Text
        );
    }

    #[test]
    fn text_split_mid_character_at_head_boundary_is_text() {
        // 511 ASCII bytes followed by a two-byte character puts the
        // second byte past the 512-byte head read.
        let mut bytes = vec![b'a'; 511];
        bytes.extend_from_slice("é and more text".as_bytes());
        assert_eq!(detect_bytes(&bytes).unwrap(), InputKind::Text);
    }

    #[test]
    fn empty_file_is_text() {
        assert_eq!(detect_bytes(b"").unwrap(), InputKind::Text);
    }

    #[test]
    fn binary_garbage_is_unsupported() {
        assert!(matches!(
            detect_bytes(&[0x00, 0x01, 0xfe, 0xff, 0x80]),
            Err(DocumentError::Unsupported(_))
        ));
    }

    #[test]
    fn missing_file_is_not_found() {
        assert!(matches!(
            InputKind::detect(Path::new("/no/such/file.pdf")),
            Err(DocumentError::NotFound(_))
        ));
    }

    #[test]
    fn kind_parse_round_trip() {
        for kind in [
            InputKind::Pdf,
            InputKind::PdfScan,
            InputKind::Image,
            InputKind::Text,
        ] {
            assert_eq!(InputKind::parse(kind.as_str()).unwrap(), kind);
        }
        assert!(InputKind::parse("docx").is_err());
    }
}
