//! Builders that turn a fixture's `expected` dict into typed values for the write path,
//! plus the expected-side normalizers applied before comparison.

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::adapter::{AdapterError, AdapterResult};
use crate::model::{
    BorderEdge, BorderInfo, BorderStyle, CellFormat, CellValue, JsonMap, Underline,
    DEFAULT_BORDER_COLOR,
};
use crate::normalize::{normalize_number_format, normalize_sheet_quotes};

const DATE_INPUT_FORMATS: &[&str] = &["%Y-%m-%d"];
const DATETIME_INPUT_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// The typed cell value a fixture expects. `type` defaults to `string`.
pub fn cell_value_from_expected(expected: &JsonMap) -> AdapterResult<CellValue> {
    let kind = expected
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("string");
    let value = expected.get("value").unwrap_or(&Value::Null);

    match kind {
        "blank" => Ok(CellValue::Blank),
        "string" => Ok(CellValue::String(match value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        })),
        "number" => value
            .as_f64()
            .map(CellValue::Number)
            .ok_or_else(|| invalid("number", value)),
        "boolean" => value
            .as_bool()
            .map(CellValue::Boolean)
            .ok_or_else(|| invalid("boolean", value)),
        "date" => value
            .as_str()
            .and_then(parse_date)
            .map(CellValue::Date)
            .ok_or_else(|| invalid("date", value)),
        "datetime" => value
            .as_str()
            .and_then(parse_datetime)
            .map(CellValue::DateTime)
            .ok_or_else(|| invalid("datetime", value)),
        "error" => value
            .as_str()
            .map(|s| CellValue::Error(s.to_string()))
            .ok_or_else(|| invalid("error", value)),
        "formula" => {
            let formula = expected
                .get("formula")
                .and_then(Value::as_str)
                .ok_or_else(|| AdapterError::InvalidInput("formula case without `formula`".into()))?;
            let cached = (!value.is_null()).then(|| value.clone());
            Ok(CellValue::formula(formula, cached))
        }
        other => Err(AdapterError::InvalidInput(format!("unknown cell type '{other}'"))),
    }
}

fn invalid(kind: &str, value: &Value) -> AdapterError {
    AdapterError::InvalidInput(format!("{value} is not a valid {kind} value"))
}

/// Best-effort typing of a bare JSON scalar.
pub fn cell_value_from_raw(value: &Value) -> CellValue {
    match value {
        Value::Null => CellValue::Blank,
        Value::Bool(b) => CellValue::Boolean(*b),
        Value::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or(CellValue::Blank),
        Value::String(s) => CellValue::String(s.clone()),
        other => CellValue::String(other.to_string()),
    }
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_INPUT_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .or_else(|| parse_datetime(raw).map(|dt| dt.date()))
}

pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    DATETIME_INPUT_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}

/// Every formatting key the expected dict sets, and nothing else.
pub fn cell_format_from_expected(expected: &JsonMap) -> CellFormat {
    let bool_of = |key: &str| expected.get(key).and_then(Value::as_bool);
    let string_of = |key: &str| expected.get(key).and_then(Value::as_str).map(str::to_string);

    CellFormat {
        bold: bool_of("bold"),
        italic: bool_of("italic"),
        underline: expected
            .get("underline")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<Underline>().ok()),
        strikethrough: bool_of("strikethrough"),
        font_name: string_of("font_name"),
        font_size: expected.get("font_size").and_then(Value::as_f64),
        font_color: string_of("font_color"),
        bg_color: string_of("bg_color"),
        number_format: string_of("number_format"),
        h_align: string_of("h_align"),
        v_align: string_of("v_align"),
        wrap: bool_of("wrap"),
        rotation: expected
            .get("rotation")
            .and_then(Value::as_i64)
            .and_then(|r| i32::try_from(r).ok()),
        indent: expected
            .get("indent")
            .and_then(Value::as_u64)
            .and_then(|i| u32::try_from(i).ok()),
    }
}

/// Border settings from `border_style`/`border_color` (all four edges) and per-edge
/// `border_<edge>`/`border_<edge>_color` keys. A color without a style means `thin`.
pub fn border_from_expected(expected: &JsonMap) -> AdapterResult<BorderInfo> {
    let uniform_style = style_of(expected, "border_style")?;
    let uniform_color = color_of(expected, "border_color");

    let uniform = if uniform_style.is_some() || uniform_color.is_some() {
        Some(BorderEdge::new(
            uniform_style.unwrap_or(BorderStyle::Thin),
            uniform_color.clone().unwrap_or_else(default_color),
        ))
    } else {
        None
    };

    let edge = |name: &str| -> AdapterResult<Option<BorderEdge>> {
        let style = style_of(expected, &format!("border_{name}"))?;
        let color = color_of(expected, &format!("border_{name}_color"));
        if style.is_none() && color.is_none() {
            return Ok(uniform.clone());
        }
        Ok(Some(BorderEdge::new(
            style.unwrap_or(BorderStyle::Thin),
            color
                .or_else(|| uniform_color.clone())
                .unwrap_or_else(default_color),
        )))
    };

    let diagonal = |name: &str| -> AdapterResult<Option<BorderEdge>> {
        let style = style_of(expected, &format!("border_{name}"))?;
        Ok(style.map(|style| {
            BorderEdge::new(
                style,
                color_of(expected, &format!("border_{name}_color")).unwrap_or_else(default_color),
            )
        }))
    };

    Ok(BorderInfo {
        top: edge("top")?,
        bottom: edge("bottom")?,
        left: edge("left")?,
        right: edge("right")?,
        diagonal_up: diagonal("diagonal_up")?,
        diagonal_down: diagonal("diagonal_down")?,
    })
}

fn default_color() -> String {
    DEFAULT_BORDER_COLOR.to_string()
}

fn style_of(expected: &JsonMap, key: &str) -> AdapterResult<Option<BorderStyle>> {
    match expected.get(key).and_then(Value::as_str) {
        Some(raw) => raw
            .parse::<BorderStyle>()
            .map(Some)
            .map_err(AdapterError::InvalidInput),
        None => Ok(None),
    }
}

fn color_of(expected: &JsonMap, key: &str) -> Option<String> {
    expected.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Drop `cf_rule.priority`; write oracles renumber rules.
///
/// Returns the input unchanged when there is no `cf_rule` object.
pub fn strip_cf_priority(expected: &JsonMap) -> JsonMap {
    let mut out = expected.clone();
    if let Some(Value::Object(rule)) = out.get_mut("cf_rule") {
        rule.remove("priority");
    }
    out
}

/// Quote sheet references in `formula` so `=Data!B2` and `='Data'!B2` compare equal.
pub fn normalize_expected_formula(expected: &JsonMap) -> JsonMap {
    let mut out = expected.clone();
    if let Some(Value::String(formula)) = out.get_mut("formula") {
        *formula = normalize_sheet_quotes(formula);
    }
    out
}

pub fn normalize_expected_number_format(expected: &JsonMap) -> JsonMap {
    let mut out = expected.clone();
    if let Some(Value::String(format)) = out.get_mut("number_format") {
        *format = normalize_number_format(format);
    }
    out
}

/// Internal link targets (`#Sheet2!A1`, `'My Sheet'!A1`) lose the `#` and sheet quotes.
pub fn normalize_link_target(target: &str, internal: bool) -> String {
    if internal || target.starts_with('#') {
        target.trim_start_matches('#').replace('\'', "")
    } else {
        target.to_string()
    }
}

pub fn normalize_expected_hyperlink(expected: &JsonMap) -> JsonMap {
    let mut out = expected.clone();
    let link = match out.get_mut("hyperlink") {
        Some(Value::Object(link)) => link,
        _ => return out,
    };
    let internal = link
        .get("internal")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if let Some(Value::String(target)) = link.get_mut("target") {
        *target = normalize_link_target(target, internal);
    }
    out
}

/// `='My Sheet'!$B$2` -> `My Sheet!B2`.
pub fn normalize_refers_to(raw: &str) -> String {
    let raw = raw.trim().trim_start_matches('=');
    match raw.rsplit_once('!') {
        Some((sheet, address)) => {
            let sheet = sheet
                .trim_start_matches('\'')
                .trim_end_matches('\'')
                .replace("''", "'");
            format!("{sheet}!{}", address.replace('$', ""))
        }
        None => raw.replace('$', ""),
    }
}

pub fn normalize_expected_named_range(expected: &JsonMap) -> JsonMap {
    let mut out = expected.clone();
    if let Some(Value::String(refers_to)) = out.get_mut("refers_to") {
        *refers_to = normalize_refers_to(refers_to);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn obj(value: Value) -> JsonMap {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn cell_values_from_expected_dicts() {
        assert_eq!(
            cell_value_from_expected(&obj(json!({"type": "string", "value": "hello"}))).unwrap(),
            CellValue::String("hello".to_string())
        );
        assert_eq!(
            cell_value_from_expected(&obj(json!({"type": "blank"}))).unwrap(),
            CellValue::Blank
        );
        assert_eq!(
            cell_value_from_expected(&obj(json!({"type": "number", "value": 42.5}))).unwrap(),
            CellValue::Number(42.5)
        );
        assert_eq!(
            cell_value_from_expected(&obj(json!({"type": "date", "value": "2026-01-15"})))
                .unwrap(),
            CellValue::Date(NaiveDate::from_ymd_opt(2026, 1, 15).unwrap())
        );
        assert_eq!(
            cell_value_from_expected(&obj(
                json!({"type": "datetime", "value": "2026-01-15T10:30:00"})
            ))
            .unwrap(),
            CellValue::DateTime(
                NaiveDate::from_ymd_opt(2026, 1, 15)
                    .unwrap()
                    .and_hms_opt(10, 30, 0)
                    .unwrap()
            )
        );
        assert_eq!(
            cell_value_from_expected(&obj(json!({"type": "error", "value": "#DIV/0!"}))).unwrap(),
            CellValue::Error("#DIV/0!".to_string())
        );
        assert_eq!(
            cell_value_from_expected(&obj(json!({"value": "test"}))).unwrap(),
            CellValue::String("test".to_string())
        );
    }

    #[test]
    fn formula_from_expected_keeps_cached_value() {
        let value = cell_value_from_expected(&obj(
            json!({"type": "formula", "value": 10, "formula": "=SUM(A1:A3)"}),
        ))
        .unwrap();
        assert_eq!(value, CellValue::formula("=SUM(A1:A3)", Some(json!(10))));
    }

    #[test]
    fn bad_expected_values_are_invalid_input() {
        let err =
            cell_value_from_expected(&obj(json!({"type": "number", "value": "x"}))).unwrap_err();
        assert_eq!(err.kind(), "InvalidInput");
        let err = cell_value_from_expected(&obj(json!({"type": "sparkline"}))).unwrap_err();
        assert_eq!(err.kind(), "InvalidInput");
    }

    #[test]
    fn raw_values_are_typed_by_shape() {
        assert_eq!(cell_value_from_raw(&Value::Null), CellValue::Blank);
        assert_eq!(cell_value_from_raw(&json!(true)), CellValue::Boolean(true));
        assert_eq!(cell_value_from_raw(&json!(42)), CellValue::Number(42.0));
        assert_eq!(
            cell_value_from_raw(&json!("hello")),
            CellValue::String("hello".to_string())
        );
    }

    #[test]
    fn format_from_expected_reads_every_key() {
        let format = cell_format_from_expected(&obj(json!({
            "bold": true,
            "italic": false,
            "underline": "single",
            "strikethrough": true,
            "font_name": "Arial",
            "font_size": 12.0,
            "font_color": "#FF0000",
            "bg_color": "#00FF00",
            "number_format": "0.00",
            "h_align": "center",
            "v_align": "top",
            "wrap": true,
            "rotation": 45,
            "indent": 2
        })));
        assert_eq!(format.bold, Some(true));
        assert_eq!(format.italic, Some(false));
        assert_eq!(format.underline, Some(Underline::Single));
        assert_eq!(format.font_size, Some(12.0));
        assert_eq!(format.rotation, Some(45));
        assert_eq!(format.indent, Some(2));
        assert!(cell_format_from_expected(&JsonMap::new()).is_empty());
    }

    #[test]
    fn uniform_border_fills_all_edges() {
        let border =
            border_from_expected(&obj(json!({"border_style": "thin", "border_color": "#FF0000"})))
                .unwrap();
        for (_, edge) in border.perimeter() {
            assert_eq!(edge, Some(&BorderEdge::new(BorderStyle::Thin, "#FF0000")));
        }
        assert_eq!(border.diagonal_up, None);
    }

    #[test]
    fn per_edge_borders_and_defaults() {
        let border =
            border_from_expected(&obj(json!({"border_top": "thick", "border_bottom": "thin"})))
                .unwrap();
        assert_eq!(border.top, Some(BorderEdge::new(BorderStyle::Thick, "#000000")));
        assert_eq!(border.bottom, Some(BorderEdge::new(BorderStyle::Thin, "#000000")));
        assert_eq!(border.left, None);

        let border = border_from_expected(&obj(json!({"border_color": "#0000FF"}))).unwrap();
        assert_eq!(border.top, Some(BorderEdge::new(BorderStyle::Thin, "#0000FF")));

        let border = border_from_expected(&obj(json!({"border_top_color": "#FF0000"}))).unwrap();
        assert_eq!(border.top, Some(BorderEdge::new(BorderStyle::Thin, "#FF0000")));

        assert_eq!(border_from_expected(&JsonMap::new()).unwrap(), BorderInfo::default());
    }

    #[test]
    fn diagonal_borders() {
        let border = border_from_expected(&obj(
            json!({"border_diagonal_up": "thin", "border_diagonal_down": "double"}),
        ))
        .unwrap();
        assert_eq!(border.diagonal_up.map(|e| e.style), Some(BorderStyle::Thin));
        assert_eq!(border.diagonal_down.map(|e| e.style), Some(BorderStyle::Double));
        assert!(border_from_expected(&obj(json!({"border_style": "wavy"}))).is_err());
    }

    #[test]
    fn strip_cf_priority_only_touches_rule_objects() {
        let stripped = strip_cf_priority(&obj(
            json!({"cf_rule": {"range": "B2:B6", "priority": 1}}),
        ));
        assert_eq!(stripped, obj(json!({"cf_rule": {"range": "B2:B6"}})));

        let untouched = obj(json!({"value": 1}));
        assert_eq!(strip_cf_priority(&untouched), untouched);
        let non_object = obj(json!({"cf_rule": "x"}));
        assert_eq!(strip_cf_priority(&non_object), non_object);
    }

    #[test]
    fn link_targets_and_refers_to_normalize() {
        assert_eq!(normalize_link_target("#Sheet2!A1", false), "Sheet2!A1");
        assert_eq!(normalize_link_target("'My Sheet'!A1", true), "My Sheet!A1");
        assert_eq!(
            normalize_link_target("https://example.com/it's", false),
            "https://example.com/it's"
        );
        assert_eq!(normalize_refers_to("named_ranges!$B$2"), "named_ranges!B2");
        assert_eq!(normalize_refers_to("='My Sheet'!$A$1:$A$3"), "My Sheet!A1:A3");
    }
}
