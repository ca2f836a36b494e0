//! Output unit naming.
//!
//! Query names are free text. Before they can name a worksheet or a staging
//! file they are mapped, together with the entry's 1-based position, onto a
//! constrained identifier. Both functions are pure: the index unit and the
//! data unit recompute the same name independently and must agree.

use std::sync::OnceLock;

use chrono::NaiveDateTime;
use regex::Regex;

/// Maximum length of a worksheet name, in characters.
pub const MAX_SHEET_NAME_LEN: usize = 31;

/// Name of the index unit (worksheet and staging file stem).
pub const INDEX_UNIT_NAME: &str = "executed_queries";

/// Header row of the index unit.
pub const INDEX_HEADER: [&str; 3] = ["Sr.No", "Query", "Query Notes"];

/// Extension of staging files.
pub const STAGING_EXTENSION: &str = "csv";

/// Characters a worksheet name may not contain.
const FORBIDDEN_SHEET_CHARS: [char; 7] = ['\\', '/', '?', '*', '[', ']', ':'];

fn file_name_filter() -> &'static Regex {
    static FILTER: OnceLock<Regex> = OnceLock::new();
    FILTER.get_or_init(|| Regex::new(r"[^A-Za-z0-9_]+").expect("static pattern is valid"))
}

/// Worksheet name for the query at `position`.
///
/// Spaces become `_`, everything outside `[A-Za-z0-9_]` is dropped (which
/// also removes the characters Excel forbids), and the result is
/// `"<position>_<name>"` capped at 31 characters by truncating the name part.
/// Re-applying to its own output with the same position returns the same name.
pub fn sheet_name(position: usize, raw_name: &str) -> String {
    let prefix = format!("{position}_");
    // A usize prints in at most 20 digits, so the prefix always fits.
    let prefix_len = prefix.len();

    let cleaned: String = file_name_filter()
        .replace_all(&raw_name.replace(' ', "_"), "")
        .chars()
        .filter(|c| !FORBIDDEN_SHEET_CHARS.contains(c))
        .collect();
    let cleaned = cleaned.strip_prefix(prefix.as_str()).unwrap_or(&cleaned);

    let remainder: String = cleaned
        .chars()
        .take(MAX_SHEET_NAME_LEN - prefix_len)
        .collect();

    format!("{prefix}{remainder}")
}

/// Staging file name for the query at `position`.
///
/// Keeps only `[A-Za-z0-9_]` after replacing spaces, no length cap.
pub fn staging_file_name(position: usize, raw_name: &str) -> String {
    let underscored = raw_name.replace(' ', "_");
    let cleaned = file_name_filter().replace_all(&underscored, "");
    format!("{position}_{cleaned}.{STAGING_EXTENSION}")
}

/// Staging file name of the index unit.
pub fn index_staging_file_name() -> String {
    format!("{INDEX_UNIT_NAME}.{STAGING_EXTENSION}")
}

/// Splits a staging file stem such as `12_Wait_Stats` into `(12, "Wait_Stats")`.
///
/// Returns `None` when the stem has no numeric prefix.
pub fn parse_numbered_stem(stem: &str) -> Option<(usize, &str)> {
    let (number, rest) = stem.split_once('_')?;
    let position = number.parse().ok()?;
    Some((position, rest))
}

/// File name of the workbook for a run started at `timestamp`.
///
/// Pattern: `sql_diagnostics_<DDMMYYYY>_<HHMMSS>.xlsx`.
pub fn artifact_file_name(timestamp: NaiveDateTime) -> String {
    format!("sql_diagnostics_{}.xlsx", timestamp.format("%d%m%Y_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn assert_valid_sheet_name(name: &str) {
        assert!(name.chars().count() <= MAX_SHEET_NAME_LEN, "too long: {name}");
        assert!(
            !name.chars().any(|c| FORBIDDEN_SHEET_CHARS.contains(&c)),
            "forbidden char in {name}"
        );
    }

    #[test]
    fn test_sheet_name_sample() {
        assert_eq!(sheet_name(1, "Sample Query Name!"), "1_Sample_Query_Name");
    }

    #[test]
    fn test_staging_file_name_sample() {
        assert_eq!(
            staging_file_name(1, "Sample Query Name!"),
            "1_Sample_Query_Name.csv"
        );
    }

    #[test]
    fn test_sheet_name_strips_forbidden_characters() {
        let name = sheet_name(3, r"a\b/c?d*e[f]g:h");
        assert_eq!(name, "3_abcdefgh");
        assert_valid_sheet_name(&name);
    }

    #[test]
    fn test_sheet_name_truncates_to_31() {
        let name = sheet_name(7, "Top Waits By Average Wait Time Over The Last Hour");
        assert_eq!(name.chars().count(), MAX_SHEET_NAME_LEN);
        assert!(name.starts_with("7_Top_Waits"));
        assert_valid_sheet_name(&name);
    }

    #[test]
    fn test_sheet_name_keeps_prefix_when_truncating() {
        let name = sheet_name(123, &"x".repeat(100));
        assert_eq!(name, format!("123_{}", "x".repeat(27)));
    }

    #[test]
    fn test_sheet_name_drops_non_ascii() {
        assert_eq!(sheet_name(1, "Café Stats"), "1_Caf_Stats");
    }

    #[test]
    fn test_sheet_name_huge_position_keeps_some_name() {
        let name = sheet_name(usize::MAX, "whatever");
        assert_eq!(name, format!("{}_whatever", usize::MAX));
        assert_valid_sheet_name(&name);
    }

    #[test]
    fn test_sheet_name_drops_apostrophes() {
        assert_eq!(sheet_name(2, "Owner's Objects'"), "2_Owners_Objects");
    }

    #[test]
    fn test_sheet_name_matches_staging_stem() {
        let raw = "Drive Level Latency (ms)";
        let stem = staging_file_name(8, raw);
        let stem = stem.trim_end_matches(".csv");
        let (position, rest) = parse_numbered_stem(stem).unwrap();
        assert_eq!(sheet_name(position, rest), sheet_name(8, raw));
    }

    #[test]
    fn test_sheet_name_empty_name() {
        assert_eq!(sheet_name(4, ""), "4_");
    }

    #[test]
    fn test_sheet_name_is_idempotent() {
        let inputs = [
            "Sample Query Name!",
            "Top Waits By Average Wait Time Over The Last Hour",
            r"weird [name]: with/slashes",
            "",
        ];
        for (i, raw) in inputs.iter().enumerate() {
            let position = i + 1;
            let once = sheet_name(position, raw);
            assert_eq!(sheet_name(position, &once), once, "input {raw:?}");
        }
    }

    #[test]
    fn test_sheet_name_does_not_repeat_own_position_prefix() {
        assert_eq!(sheet_name(1, "1 Version"), "1_Version");
        assert_eq!(sheet_name(2, "1 Version"), "2_1_Version");
        assert_eq!(staging_file_name(1, "1 Version"), "1_1_Version.csv");
    }

    #[test]
    fn test_sheet_name_is_deterministic() {
        assert_eq!(sheet_name(5, "Memory Clerks"), sheet_name(5, "Memory Clerks"));
    }

    #[test]
    fn test_staging_file_name_has_no_cap() {
        let name = staging_file_name(9, &"y".repeat(60));
        assert_eq!(name, format!("9_{}.csv", "y".repeat(60)));
    }

    #[test]
    fn test_staging_file_name_drops_non_word_characters() {
        assert_eq!(staging_file_name(2, "I/O Stats (per file)"), "2_IO_Stats_per_file.csv");
    }

    #[test]
    fn test_parse_numbered_stem() {
        assert_eq!(parse_numbered_stem("12_Wait_Stats"), Some((12, "Wait_Stats")));
        assert_eq!(parse_numbered_stem("3_"), Some((3, "")));
        assert_eq!(parse_numbered_stem("executed_queries"), None);
        assert_eq!(parse_numbered_stem("nounderscore"), None);
    }

    #[test]
    fn test_artifact_file_name() {
        let ts = NaiveDate::from_ymd_opt(2025, 11, 27)
            .unwrap()
            .and_hms_opt(14, 30, 45)
            .unwrap();
        assert_eq!(artifact_file_name(ts), "sql_diagnostics_27112025_143045.xlsx");
    }
}
