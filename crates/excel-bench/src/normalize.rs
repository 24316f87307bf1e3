//! Pure string normalizers applied to both expected and actual values before comparison.
//!
//! Libraries serialize the same formula, range or number format in different but equivalent
//! ways (leading `=`, quoted sheet names, `$` anchors, escaped literals). None of these
//! functions mutate fixture data; they return a normalized copy.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

fn unquoted_sheet_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(^|[^A-Za-z0-9_.'!])([A-Za-z_][A-Za-z0-9_.]*)!").expect("valid regex")
    })
}

fn quoted_sheet_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"'((?:[^']|'')+)'!").expect("valid regex"))
}

fn single_char_literal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""(.)""#).expect("valid regex"))
}

/// Strip `$` anchors and upper-case.
pub fn normalize_range(range: &str) -> String {
    range.trim().replace('$', "").to_ascii_uppercase()
}

/// Trim, drop a leading `=`, then drop one pair of surrounding double quotes.
pub fn normalize_formula_str(formula: &str) -> String {
    let trimmed = formula.trim();
    let body = trimmed.strip_prefix('=').unwrap_or(trimmed).trim();
    match body
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        Some(inner) => inner.to_string(),
        None => body.to_string(),
    }
}

/// [`normalize_formula_str`] for JSON values; non-strings pass through unchanged.
pub fn normalize_formula(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(normalize_formula_str(s)),
        other => other.clone(),
    }
}

/// Quote every unquoted sheet reference: `=Data!B2` becomes `='Data'!B2`.
pub fn normalize_sheet_quotes(formula: &str) -> String {
    unquoted_sheet_ref_re()
        .replace_all(formula, "${1}'${2}'!")
        .into_owned()
}

/// Drop backslash escapes and unquote single-character literals (`"$"0.00` -> `$0.00`).
pub fn normalize_number_format(format: &str) -> String {
    let mut unescaped = String::with_capacity(format.len());
    let mut chars = format.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                unescaped.push(next);
            }
        } else {
            unescaped.push(ch);
        }
    }
    single_char_literal_re()
        .replace_all(&unescaped, "${1}")
        .into_owned()
}

/// Sheet names referenced by a formula, in order of first appearance.
pub fn extract_formula_sheet_names(formula: &str) -> Vec<String> {
    let mut found: Vec<(usize, String)> = Vec::new();
    for cap in quoted_sheet_ref_re().captures_iter(formula) {
        if let Some(m) = cap.get(1) {
            found.push((m.start(), m.as_str().replace("''", "'")));
        }
    }
    for cap in unquoted_sheet_ref_re().captures_iter(formula) {
        if let Some(m) = cap.get(2) {
            found.push((m.start(), m.as_str().to_string()));
        }
    }
    found.sort_by_key(|(pos, _)| *pos);

    let mut names: Vec<String> = Vec::new();
    for (_, name) in found {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn normalize_range_strips_anchors_and_uppercases() {
        assert_eq!(normalize_range("$A$1:$B$2"), "A1:B2");
        assert_eq!(normalize_range("a1:b2"), "A1:B2");
        assert_eq!(normalize_range("C3"), "C3");
    }

    #[test]
    fn normalize_formula_variants() {
        assert_eq!(normalize_formula_str("=SUM(A1:A3)"), "SUM(A1:A3)");
        assert_eq!(normalize_formula_str("SUM(A1:A3)"), "SUM(A1:A3)");
        assert_eq!(normalize_formula_str("\"hello\""), "hello");
        assert_eq!(normalize_formula_str("=\"hello\""), "hello");
        assert_eq!(normalize_formula_str("  =A1  "), "A1");
    }

    #[test]
    fn normalize_formula_passes_non_strings_through() {
        assert_eq!(normalize_formula(&json!(42)), json!(42));
        assert_eq!(normalize_formula(&Value::Null), Value::Null);
        assert_eq!(normalize_formula(&json!("=A1")), json!("A1"));
    }

    #[test]
    fn sheet_quotes_are_added_only_where_missing() {
        assert_eq!(normalize_sheet_quotes("=References!B2"), "='References'!B2");
        assert_eq!(
            normalize_sheet_quotes("='Already Quoted'!B2"),
            "='Already Quoted'!B2"
        );
        assert_eq!(normalize_sheet_quotes("=SUM(A1:A3)"), "=SUM(A1:A3)");
        assert_eq!(normalize_sheet_quotes("=Sheet1!$A$1"), "='Sheet1'!$A$1");
        assert_eq!(
            normalize_sheet_quotes("=SUM(Data!A1:A3)+Other!B1"),
            "=SUM('Data'!A1:A3)+'Other'!B1"
        );
    }

    #[test]
    fn number_format_escapes_and_literals() {
        assert_eq!(normalize_number_format(r"yyyy\-mm\-dd"), "yyyy-mm-dd");
        assert_eq!(normalize_number_format("\"$\"#,##0.00"), "$#,##0.00");
        assert_eq!(normalize_number_format("\"USD\" 0.00"), "\"USD\" 0.00");
        assert_eq!(normalize_number_format("0.00%"), "0.00%");
        assert_eq!(normalize_number_format(r"h\:mm\:ss"), "h:mm:ss");
        assert_eq!(normalize_number_format(r"mm\/dd\/yyyy"), "mm/dd/yyyy");
    }

    #[test]
    fn extracts_quoted_and_unquoted_sheet_names() {
        assert_eq!(extract_formula_sheet_names("='Sheet A'!B1"), vec!["Sheet A"]);
        assert_eq!(
            extract_formula_sheet_names("=Sheet1!A1+Sheet2!B1+Sheet1!C1"),
            vec!["Sheet1", "Sheet2"]
        );
        assert_eq!(
            extract_formula_sheet_names("='It''s'!A1"),
            vec!["It's"]
        );
        assert!(extract_formula_sheet_names("").is_empty());
        assert!(extract_formula_sheet_names("=SUM(A1:A3)").is_empty());
    }
}
