use std::sync::OnceLock;

use regex::Regex;

const CONTROLS: [char; 8] = [
    '\u{1}', '\u{2}', '\u{3}', '\u{4}', '\u{5}', '\u{6}', '\u{7}', '\u{8}',
];

const HYPHENS: [char; 8] = [
    '-', '\u{2010}', '\u{2011}', '\u{2043}', '\u{2012}', '\u{2013}', '\u{2014}', '\u{2015}',
];

const MINUSES: [char; 4] = ['-', '\u{2212}', '\u{ff0d}', '\u{207b}'];

const SLASHES: [char; 3] = ['/', '\u{2044}', '\u{2215}'];

const TILDES: [char; 8] = [
    '~', '\u{2dc}', '\u{2053}', '\u{223c}', '\u{223d}', '\u{223f}', '\u{301c}', '\u{ff5e}',
];

const SINGLE_QUOTES: [char; 10] = [
    '\'', '\u{2018}', '\u{2019}', '\u{201a}', '\u{201b}', '\u{55a}', '\u{a78b}', '\u{a78c}',
    '\u{ff07}', '\u{b4}',
];

const DOUBLE_QUOTES: [char; 5] = ['"', '\u{201c}', '\u{201d}', '\u{201e}', '\u{201f}'];

/// Text normalizer for generic English text ahead of NER.
///
/// Unifies line endings, strips control characters, and optionally maps
/// typographic hyphens, quotes, slashes, tildes and ellipses down to their
/// ASCII forms. Whitespace is collapsed per page, preserving form-feed page
/// separators.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    pub strip: bool,
    pub collapse: bool,
    pub hyphens: bool,
    pub quotes: bool,
    pub slashes: bool,
    pub tildes: bool,
    pub ellipsis: bool,
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self {
            strip: true,
            collapse: true,
            hyphens: false,
            quotes: false,
            slashes: false,
            tildes: false,
            ellipsis: false,
        }
    }
}

impl TextNormalizer {
    /// The aggressive profile used before handing text to ChemSpot.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            strip: true,
            collapse: true,
            hyphens: true,
            quotes: true,
            slashes: true,
            tildes: true,
            ellipsis: true,
        }
    }

    #[must_use]
    pub fn normalize(&self, text: &str) -> String {
        let mut text: String = text
            .chars()
            .filter(|c| !CONTROLS.contains(c))
            .collect();

        // Unusual whitespace and line separators first.
        text = text
            .replace(['\u{b}', '\u{85}'], " ")
            .replace(['\u{2028}', '\u{2029}'], "\n")
            .replace("\r\n", "\n")
            .replace('\r', "\n");

        if self.hyphens {
            for c in HYPHENS.iter().chain(MINUSES.iter()) {
                if *c != '-' {
                    text = text.replace(*c, "-");
                }
            }
            text = text.replace('\u{ad}', "");
        }

        if self.quotes {
            for c in DOUBLE_QUOTES {
                if c != '"' {
                    text = text.replace(c, "\"");
                }
            }
            for c in SINGLE_QUOTES {
                if c != '\'' {
                    text = text.replace(c, "'");
                }
            }
            text = text
                .replace('\u{2032}', "'")
                .replace('\u{2035}', "'")
                .replace('\u{2033}', "''")
                .replace('\u{2036}', "''")
                .replace('\u{2034}', "'''")
                .replace('\u{2037}', "'''")
                .replace('\u{2057}', "''''");
        }

        if self.ellipsis {
            text = text.replace('\u{2026}', "...").replace(" . . . ", " ... ");
        }

        if self.slashes {
            for c in SLASHES {
                if c != '/' {
                    text = text.replace(c, "/");
                }
            }
        }

        if self.tildes {
            for c in TILDES {
                if c != '~' {
                    text = text.replace(c, "~");
                }
            }
        }

        if self.strip {
            text = text.trim().to_string();
        }

        if self.collapse {
            // Collapse whitespace within each page, keeping \f separators.
            text = text
                .split('\u{c}')
                .map(|page| page.split_whitespace().collect::<Vec<_>>().join(" "))
                .collect::<Vec<_>>()
                .join("\u{c}");
        }

        text
    }
}

fn marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(?\d+[a-zA-Z]\)?,?").unwrap())
}

/// Remove inline compound markers like "(2b)" and join end-of-line
/// hyphenation. ChemSpot produces unparsable spans without this.
#[must_use]
pub fn strip_reference_markers(text: &str) -> String {
    marker_re().replace_all(text, "").replace("-\n", "")
}

/// Cumulative end offset of each non-empty page (form-feed separated).
#[must_use]
pub fn page_ends(text: &str) -> Vec<usize> {
    let mut ends = Vec::new();
    for page in text.split('\u{c}') {
        if page.trim().is_empty() {
            continue;
        }
        let last = ends.last().copied().unwrap_or(0);
        ends.push(last + page.len().saturating_sub(1).max(1));
    }
    ends
}

/// 1-based page for a character offset, via binary search over `page_ends`.
#[must_use]
pub fn page_of(ends: &[usize], offset: usize) -> u32 {
    let idx = ends.partition_point(|end| *end < offset);
    (idx + 1) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapse_preserves_page_breaks() {
        let normalizer = TextNormalizer::default();
        let text = "one  two\nthree\u{c}four   five";
        assert_eq!(normalizer.normalize(text), "one two three\u{c}four five");
    }

    #[test]
    fn strict_maps_typographic_chars() {
        let normalizer = TextNormalizer::strict();
        let text = "2\u{2013}amino\u{2010}ethanol \u{201c}salt\u{201d} \u{2026}";
        let out = normalizer.normalize(text);
        assert_eq!(out, "2-amino-ethanol \"salt\" ...");
    }

    #[test]
    fn strips_control_chars() {
        let normalizer = TextNormalizer::default();
        assert_eq!(normalizer.normalize("a\u{1}b\u{8}c"), "abc");
    }

    #[test]
    fn marker_stripping() {
        assert_eq!(
            strip_reference_markers("N-octyl- (2b), was added"),
            "N-octyl- , was added"
        );
        assert_eq!(strip_reference_markers("buta-\nnoic acid"), "butanoic acid");
    }

    #[test]
    fn page_lookup() {
        // Two pages of 10 and 20 chars.
        let text = format!("{}\u{c}{}", "a".repeat(10), "b".repeat(20));
        let ends = page_ends(&text);
        assert_eq!(ends.len(), 2);
        assert_eq!(page_of(&ends, 0), 1);
        assert_eq!(page_of(&ends, 5), 1);
        assert_eq!(page_of(&ends, 15), 2);
    }

    #[test]
    fn empty_pages_skipped() {
        let ends = page_ends("first\u{c}\u{c}third");
        assert_eq!(ends.len(), 2);
    }
}
