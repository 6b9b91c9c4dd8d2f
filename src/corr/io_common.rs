use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The headers of the usual election exports and their column names.
pub const DEFAULT_ALIASES: [(&str, &str); 15] = [
    ("Constituency ID", "constituency_id"),
    ("Riding Name", "riding_name"),
    ("Riding Code", "riding_code"),
    ("Province", "province"),
    ("Region", "region"),
    ("Subregion", "subregion"),
    ("CPC % Change (2021→2025)", "cpc_change_21_25"),
    ("CPC % Change (2021->2025)", "cpc_change_21_25"),
    ("CPC % Change (2019→2025)", "cpc_change_19_25"),
    ("CPC % Change (2019->2025)", "cpc_change_19_25"),
    ("CPC % 2019", "cpc_pct_2019"),
    ("CPC % 2021", "cpc_pct_2021"),
    ("CPC % 2025", "cpc_pct_2025"),
    ("Characteristic ID", "characteristics_id"),
    ("Rate", "rate"),
];

/// Turns a header into a column name: the built-in aliases first,
/// then lowercase with every run of non-alphanumeric characters replaced by `_`.
pub fn normalize_column_name(header: &str) -> String {
    normalize_header(header, None)
}

pub fn normalize_header(header: &str, aliases: Option<&BTreeMap<String, String>>) -> String {
    let h = header.trim();
    if let Some(name) = aliases.and_then(|m| m.get(h)) {
        return name.clone();
    }
    if let Some((_, name)) = DEFAULT_ALIASES.iter().find(|(k, _)| k.eq_ignore_ascii_case(h)) {
        return name.to_string();
    }
    let mut res = String::with_capacity(h.len());
    let mut pending_sep = false;
    for c in h.chars() {
        if c.is_alphanumeric() {
            if pending_sep && !res.is_empty() {
                res.push('_');
            }
            pending_sep = false;
            res.extend(c.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    res
}

/// Reads a number written by a person or a spreadsheet: surrounding spaces,
/// a trailing `%` and thousands separators are accepted.
pub fn parse_number(s: &str) -> Option<f64> {
    let t = s.trim();
    let t = t.strip_suffix('%').unwrap_or(t).trim();
    if t.is_empty() {
        return None;
    }
    let cleaned: String = t.chars().filter(|c| *c != ',').collect();
    match cleaned.parse::<f64>() {
        Ok(x) if x.is_finite() => Some(x),
        _ => None,
    }
}

pub fn resolve_path(root: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        root.join(p)
    }
}

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

/// A file name prefix derived from the analysis name.
pub fn sanitize_file_stem(name: &str) -> String {
    let res = normalize_column_name(name);
    if res.is_empty() {
        "analysis".to_string()
    } else {
        res
    }
}
