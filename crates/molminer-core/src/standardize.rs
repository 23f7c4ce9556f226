//! Notation-level cleanup of tool output.
//!
//! SMILES standardization keeps the largest dot-separated fragment, which
//! drops counterions and salts recognized as separate components. InChIKeys
//! are shape-validated and uppercased.

use std::sync::OnceLock;

use regex::Regex;

use crate::entity::EntityRecord;

fn inchikey_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z]{14}-[A-Z]{10}-[A-Z]$").unwrap())
}

/// Largest-fragment SMILES cleanup. Returns `None` for blank input.
#[must_use]
pub fn standardize_smiles(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .split('.')
        .filter(|frag| !frag.is_empty())
        .max_by_key(|frag| frag.len())
        .map(str::to_owned)
}

/// Uppercase and shape-validate an InChIKey.
#[must_use]
pub fn normalize_inchikey(raw: &str) -> Option<String> {
    let key = raw.trim().to_ascii_uppercase();
    inchikey_re().is_match(&key).then_some(key)
}

/// Fill the standardized fields of a record from its raw ones, in place.
pub fn apply(record: &mut EntityRecord) {
    if let Some(raw) = record.smiles_raw.clone() {
        record.smiles = standardize_smiles(&raw);
    }
    if let Some(key) = record.inchikey.clone() {
        record.inchikey = normalize_inchikey(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityRecord;

    #[test]
    fn largest_fragment_wins() {
        assert_eq!(
            standardize_smiles("CCO.[Na+]").as_deref(),
            Some("CCO")
        );
        assert_eq!(
            standardize_smiles("[Cl-].c1ccccc1N").as_deref(),
            Some("c1ccccc1N")
        );
    }

    #[test]
    fn single_fragment_passes_through() {
        assert_eq!(standardize_smiles(" CCO ").as_deref(), Some("CCO"));
        assert_eq!(standardize_smiles(""), None);
        assert_eq!(standardize_smiles("   "), None);
    }

    #[test]
    fn inchikey_shape() {
        assert_eq!(
            normalize_inchikey("lfqscwfljhtthz-uhfffaoysa-n").as_deref(),
            Some("LFQSCWFLJHTTHZ-UHFFFAOYSA-N")
        );
        assert_eq!(normalize_inchikey("not-a-key"), None);
    }

    #[test]
    fn apply_fills_standardized_fields() {
        let mut rec = EntityRecord::structure().with_smiles_raw("CCO.[Na+]");
        rec.inchikey = Some("lfqscwfljhtthz-uhfffaoysa-n".to_owned());
        apply(&mut rec);
        assert_eq!(rec.smiles.as_deref(), Some("CCO"));
        assert_eq!(
            rec.inchikey.as_deref(),
            Some("LFQSCWFLJHTTHZ-UHFFFAOYSA-N")
        );
        assert_eq!(rec.smiles_raw.as_deref(), Some("CCO.[Na+]"));
    }
}
