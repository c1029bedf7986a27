//! Identifier normalization for column names and upload table tags.

use std::sync::OnceLock;

use regex::Regex;

/// Longest identifier produced by [`normalize_column_name`].
pub const MAX_COLUMN_NAME_LEN: usize = 60;

/// Produces a lowercase identifier made only of ASCII letters, digits and `_`.
///
/// Surrounding whitespace is trimmed first, every other character becomes
/// `_`, and the result is cut to [`MAX_COLUMN_NAME_LEN`] characters.
pub fn normalize_column_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' => c.to_ascii_lowercase(),
            _ => '_',
        })
        .take(MAX_COLUMN_NAME_LEN)
        .collect()
}

/// Normalizes a full header row into unique, non-empty storage keys.
///
/// Blank names become `column_<position>`; repeated names get a `_2`, `_3`, ...
/// suffix with the base shortened so the key stays within the length limit.
pub fn storage_keys<S: AsRef<str>>(headers: &[S]) -> Vec<String> {
    let mut keys: Vec<String> = Vec::with_capacity(headers.len());
    for (idx, header) in headers.iter().enumerate() {
        let mut base = normalize_column_name(header.as_ref());
        if base.is_empty() {
            base = format!("column_{}", idx + 1);
        }
        let mut candidate = base.clone();
        let mut ordinal = 2usize;
        while keys.contains(&candidate) {
            let suffix = format!("_{ordinal}");
            let keep = MAX_COLUMN_NAME_LEN.saturating_sub(suffix.len());
            candidate = format!("{}{suffix}", &base[..base.len().min(keep)]);
            ordinal += 1;
        }
        keys.push(candidate);
    }
    keys
}

fn csv_extension() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\.csv$").expect("valid extension pattern"))
}

fn non_alphanumeric() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^a-zA-Z0-9]").expect("valid identifier pattern"))
}

/// Derives the table-name tag for an upload from its original file name.
pub fn table_name_for(filename: &str, stamp_millis: i64) -> String {
    let stem = csv_extension().replace(filename, "");
    let name = non_alphanumeric().replace_all(&stem, "_").to_lowercase();
    let prefix = if name.starts_with(|c: char| c.is_ascii_digit()) {
        "table_"
    } else {
        ""
    };
    format!("{prefix}{name}_{stamp_millis}")
}

/// Bidirectional substring containment used by the record heuristics.
///
/// A blank candidate never matches, since it is contained in every string.
/// This intentionally departs from plain bidirectional containment, under
/// which an empty header would match every field and skew classification.
pub fn loosely_matches(candidate: &str, reference: &str) -> bool {
    if candidate.is_empty() || reference.is_empty() {
        return false;
    }
    candidate.contains(reference) || reference.contains(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn normalize_column_name_replaces_non_alphanumeric() {
        assert_eq!(normalize_column_name("Order ID"), "order_id");
        assert_eq!(normalize_column_name("$Percent%"), "_percent_");
        assert_eq!(normalize_column_name("Peso (kg)"), "peso__kg_");
        assert_eq!(normalize_column_name("  No_Control "), "no_control");
        assert_eq!(normalize_column_name(""), "");
    }

    #[test]
    fn normalize_column_name_maps_non_ascii_to_underscore() {
        assert_eq!(normalize_column_name("Clasificación"), "clasificaci_n");
    }

    #[test]
    fn normalize_column_name_truncates_long_headers() {
        let long = "x".repeat(90);
        assert_eq!(normalize_column_name(&long).len(), MAX_COLUMN_NAME_LEN);
    }

    #[test]
    fn storage_keys_disambiguates_collisions() {
        let keys = storage_keys(&["Peso (kg)", "peso-(kg)", "", "peso__kg_"]);
        assert_eq!(keys, vec!["peso__kg_", "peso__kg__2", "column_3", "peso__kg__3"]);
    }

    #[test]
    fn storage_keys_respects_length_limit_with_suffix() {
        let long = "a".repeat(70);
        let keys = storage_keys(&[long.as_str(), long.as_str()]);
        assert_eq!(keys[0].len(), MAX_COLUMN_NAME_LEN);
        assert_eq!(keys[1].len(), MAX_COLUMN_NAME_LEN);
        assert!(keys[1].ends_with("_2"));
        assert_ne!(keys[0], keys[1]);
    }

    #[test]
    fn table_name_for_strips_extension_and_prefixes_digits() {
        assert_eq!(table_name_for("Sales Q1.CSV", 42), "sales_q1_42");
        assert_eq!(table_name_for("2024-report.csv", 7), "table_2024_report_7");
        assert_eq!(table_name_for("notes.csv.bak", 1), "notes_csv_bak_1");
    }

    #[test]
    fn loosely_matches_is_bidirectional() {
        assert!(loosely_matches("peso__kg_", "peso"));
        assert!(loosely_matches("sat", "saturacion"));
        assert!(!loosely_matches("amount", "peso"));
        assert!(!loosely_matches("", "peso"));
        assert!(!loosely_matches("peso", ""));
    }

    proptest! {
        #[test]
        fn normalized_names_are_safe_and_idempotent(raw in "\\PC{0,120}") {
            let once = normalize_column_name(&raw);
            prop_assert!(once.len() <= MAX_COLUMN_NAME_LEN);
            prop_assert!(once.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
            prop_assert_eq!(normalize_column_name(&once), once.clone());
        }
    }
}
