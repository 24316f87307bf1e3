//! Read projections: each reduces what an adapter reports to a dict comparable with the
//! fixture's `expected`.
//!
//! Tier 2/3 projections keep only the keys the expected payload names (see
//! [`project_rule`]) and return `{}` when nothing matches.

use serde_json::Value;

use crate::a1::{cell_to_coord, cells_in_range, extract_column, first_non_top_left_cell, split_range};
use crate::adapter::{unwrap_payload, AdapterResult, ExcelReader, WorkbookHandle};
use crate::feature::expected::{normalize_link_target, normalize_refers_to};
use crate::model::{number_to_json, CellValue, JsonMap, TestCase};
use crate::normalize::{
    normalize_formula, normalize_number_format, normalize_range, normalize_sheet_quotes,
};

fn single(key: &str, value: impl Into<Value>) -> JsonMap {
    let mut map = JsonMap::new();
    map.insert(key.to_string(), value.into());
    map
}

fn error_actual(message: String) -> JsonMap {
    single("error", message)
}

/// The JSON scalar of a cell, `None` when blank.
pub fn read_cell_scalar(
    adapter: &dyn ExcelReader,
    workbook: &WorkbookHandle,
    sheet: &str,
    cell: &str,
) -> AdapterResult<Option<Value>> {
    Ok(adapter.read_cell_value(workbook, sheet, cell)?.to_json())
}

pub fn read_cell_value_actual(
    adapter: &dyn ExcelReader,
    workbook: &WorkbookHandle,
    sheet: &str,
    cell: &str,
) -> AdapterResult<JsonMap> {
    let value = adapter.read_cell_value(workbook, sheet, cell)?;
    let mut result = single("type", value.cell_type().as_str());
    match &value {
        CellValue::Blank => {}
        CellValue::Formula { formula, cached } => {
            result.insert("formula".to_string(), Value::String(formula.clone()));
            if let Some(cached) = cached {
                result.insert("value".to_string(), cached.clone());
            }
        }
        other => {
            if let Some(json) = other.to_json() {
                result.insert("value".to_string(), json);
            }
        }
    }
    Ok(result)
}

/// Formula text with sheet references quoted; non-formula cells produce an error actual.
pub fn read_formula_actual(
    adapter: &dyn ExcelReader,
    workbook: &WorkbookHandle,
    sheet: &str,
    cell: &str,
) -> AdapterResult<JsonMap> {
    let value = adapter.read_cell_value(workbook, sheet, cell)?;
    let CellValue::Formula { formula, cached } = &value else {
        return Ok(error_actual(format!(
            "Cell {cell} does not contain a formula (type={})",
            value.cell_type()
        )));
    };

    let mut result = single("type", "formula");
    result.insert(
        "formula".to_string(),
        Value::String(normalize_sheet_quotes(formula)),
    );
    if let Some(cached) = cached {
        result.insert("value".to_string(), cached.clone());
    }
    Ok(result)
}

pub fn read_text_format_actual(
    adapter: &dyn ExcelReader,
    workbook: &WorkbookHandle,
    sheet: &str,
    cell: &str,
) -> AdapterResult<JsonMap> {
    let format = adapter.read_cell_format(workbook, sheet, cell)?;
    let mut result = JsonMap::new();
    if format.bold == Some(true) {
        result.insert("bold".to_string(), Value::Bool(true));
    }
    if format.italic == Some(true) {
        result.insert("italic".to_string(), Value::Bool(true));
    }
    if let Some(underline) = format.underline {
        result.insert("underline".to_string(), underline.as_str().into());
    }
    if format.strikethrough == Some(true) {
        result.insert("strikethrough".to_string(), Value::Bool(true));
    }
    if let Some(name) = format.font_name.filter(|name| !name.is_empty()) {
        result.insert("font_name".to_string(), Value::String(name));
    }
    if let Some(size) = format.font_size.filter(|size| *size != 0.0) {
        result.insert("font_size".to_string(), number_to_json(size));
    }
    if let Some(color) = format.font_color {
        result.insert(
            "font_color".to_string(),
            Value::String(color.to_ascii_uppercase()),
        );
    }
    Ok(result)
}

pub fn read_background_color_actual(
    adapter: &dyn ExcelReader,
    workbook: &WorkbookHandle,
    sheet: &str,
    cell: &str,
) -> AdapterResult<JsonMap> {
    let format = adapter.read_cell_format(workbook, sheet, cell)?;
    Ok(match format.bg_color {
        Some(color) => single("bg_color", color.to_ascii_uppercase()),
        None => JsonMap::new(),
    })
}

pub fn read_number_format_actual(
    adapter: &dyn ExcelReader,
    workbook: &WorkbookHandle,
    sheet: &str,
    cell: &str,
) -> AdapterResult<JsonMap> {
    let format = adapter.read_cell_format(workbook, sheet, cell)?;
    let raw = format.number_format.unwrap_or_else(|| "General".to_string());
    Ok(single("number_format", normalize_number_format(&raw)))
}

pub fn read_alignment_actual(
    adapter: &dyn ExcelReader,
    workbook: &WorkbookHandle,
    sheet: &str,
    cell: &str,
) -> AdapterResult<JsonMap> {
    let format = adapter.read_cell_format(workbook, sheet, cell)?;
    let mut result = single(
        "h_align",
        format.h_align.unwrap_or_else(|| "general".to_string()),
    );
    result.insert(
        "v_align".to_string(),
        Value::String(format.v_align.unwrap_or_else(|| "bottom".to_string())),
    );
    if format.wrap == Some(true) {
        result.insert("wrap".to_string(), Value::Bool(true));
    }
    if let Some(rotation) = format.rotation.filter(|r| *r != 0) {
        result.insert("rotation".to_string(), rotation.into());
    }
    if let Some(indent) = format.indent.filter(|i| *i != 0) {
        result.insert("indent".to_string(), indent.into());
    }
    Ok(result)
}

/// Collapses to `border_style`/`border_color` only when all four perimeter edges are set and
/// identical; otherwise reports each set edge.
pub fn read_border_actual(
    adapter: &dyn ExcelReader,
    workbook: &WorkbookHandle,
    sheet: &str,
    cell: &str,
) -> AdapterResult<JsonMap> {
    let border = adapter.read_cell_border(workbook, sheet, cell)?;
    let mut result = JsonMap::new();

    let perimeter = border.perimeter();
    let present: Vec<_> = perimeter
        .iter()
        .filter_map(|(name, edge)| edge.filter(|e| !e.is_none()).map(|e| (*name, e)))
        .collect();

    let uniform = present.len() == 4
        && present.iter().all(|(_, edge)| {
            edge.style == present[0].1.style
                && edge.color.eq_ignore_ascii_case(&present[0].1.color)
        });

    if uniform {
        let edge = present[0].1;
        result.insert("border_style".to_string(), edge.style.as_str().into());
        result.insert(
            "border_color".to_string(),
            Value::String(edge.color.to_ascii_uppercase()),
        );
    } else {
        for (name, edge) in &present {
            result.insert(format!("border_{name}"), edge.style.as_str().into());
            result.insert(
                format!("border_{name}_color"),
                Value::String(edge.color.to_ascii_uppercase()),
            );
        }
    }

    for (key, edge) in [
        ("border_diagonal_up", &border.diagonal_up),
        ("border_diagonal_down", &border.diagonal_down),
    ] {
        if let Some(edge) = edge.as_ref().filter(|e| !e.is_none()) {
            result.insert(key.to_string(), edge.style.as_str().into());
        }
    }

    Ok(result)
}

/// Row height and/or column width of the case's cell, each only when expected asks.
pub fn read_dimensions_actual(
    adapter: &dyn ExcelReader,
    workbook: &WorkbookHandle,
    sheet: &str,
    case: &TestCase,
) -> AdapterResult<JsonMap> {
    let cell = case.cell_ref();
    let mut result = JsonMap::new();
    if case.expected.contains_key("row_height") {
        let (row, _) = cell_to_coord(&cell);
        if let Some(height) = adapter.read_row_height(workbook, sheet, row)? {
            result.insert("row_height".to_string(), number_to_json(height));
        }
    }
    if case.expected.contains_key("column_width") {
        let column = extract_column(&cell);
        if let Some(width) = adapter.read_column_width(workbook, sheet, &column)? {
            result.insert("column_width".to_string(), number_to_json(width));
        }
    }
    Ok(result)
}

pub fn read_sheet_names_actual(
    adapter: &dyn ExcelReader,
    workbook: &WorkbookHandle,
) -> AdapterResult<JsonMap> {
    let names = adapter.get_sheet_names(workbook)?;
    Ok(single(
        "sheet_names",
        Value::Array(names.into_iter().map(Value::String).collect()),
    ))
}

pub fn read_merged_cells_actual(
    adapter: &dyn ExcelReader,
    workbook: &WorkbookHandle,
    sheet: &str,
    case: &TestCase,
) -> AdapterResult<JsonMap> {
    let expected = &case.expected;
    let mut result = JsonMap::new();
    let Some(expected_range) = expected.get("merged_range").and_then(Value::as_str) else {
        return Ok(result);
    };

    let ranges = adapter.read_merged_ranges(workbook, sheet)?;
    let found = find_range(&ranges, expected_range);
    result.insert(
        "merged_range".to_string(),
        found.map_or(Value::Null, |range| Value::String(range.clone())),
    );

    let (start, end) = split_range(found.map_or(expected_range, String::as_str));

    if expected.contains_key("top_left_value") {
        let value = read_cell_scalar(adapter, workbook, sheet, &start)?;
        result.insert("top_left_value".to_string(), value.unwrap_or(Value::Null));
    }

    if expected.contains_key("non_top_left_nonempty") {
        let mut count = 0_u64;
        for cell in cells_in_range(&start, &end).iter().skip(1) {
            if !adapter.read_cell_value(workbook, sheet, cell)?.is_blank() {
                count += 1;
            }
        }
        result.insert("non_top_left_nonempty".to_string(), count.into());
    }

    if expected.contains_key("top_left_bg_color") {
        let format = adapter.read_cell_format(workbook, sheet, &start)?;
        result.insert("top_left_bg_color".to_string(), upper_or_null(format.bg_color));
    }

    if expected
        .get("non_top_left_bg_color")
        .is_some_and(|value| !value.is_null())
    {
        let color = match first_non_top_left_cell(&start, &end) {
            Some(cell) => adapter.read_cell_format(workbook, sheet, &cell)?.bg_color,
            None => None,
        };
        result.insert("non_top_left_bg_color".to_string(), upper_or_null(color));
    }

    Ok(result)
}

fn upper_or_null(color: Option<String>) -> Value {
    color.map_or(Value::Null, |c| Value::String(c.to_ascii_uppercase()))
}

pub fn read_conditional_format_actual(
    adapter: &dyn ExcelReader,
    workbook: &WorkbookHandle,
    sheet: &str,
    expected: &JsonMap,
) -> AdapterResult<JsonMap> {
    let expected_rule = unwrap_payload(expected, "cf_rule");
    let rules = adapter.read_conditional_formats(workbook, sheet)?;
    let Some(rule) = find_rule(&rules, expected_rule) else {
        return Ok(JsonMap::new());
    };
    let mut projected = project_rule(rule, expected_rule);
    adopt_if_equivalent(&mut projected, expected_rule, "range", range_key);
    adopt_if_equivalent(&mut projected, expected_rule, "formula", formula_key);
    Ok(single("cf_rule", projected))
}

pub fn read_data_validation_actual(
    adapter: &dyn ExcelReader,
    workbook: &WorkbookHandle,
    sheet: &str,
    expected: &JsonMap,
) -> AdapterResult<JsonMap> {
    let expected_validation = unwrap_payload(expected, "validation");
    let validations = adapter.read_data_validations(workbook, sheet)?;
    let Some(validation) = find_validation(&validations, expected_validation) else {
        return Ok(JsonMap::new());
    };
    let mut projected = project_rule(validation, expected_validation);
    adopt_if_equivalent(&mut projected, expected_validation, "range", range_key);
    for key in ["formula1", "formula2"] {
        adopt_if_equivalent(&mut projected, expected_validation, key, formula_key);
    }
    Ok(single("validation", projected))
}

pub fn read_hyperlink_actual(
    adapter: &dyn ExcelReader,
    workbook: &WorkbookHandle,
    sheet: &str,
    expected: &JsonMap,
) -> AdapterResult<JsonMap> {
    let expected_link = unwrap_payload(expected, "hyperlink");
    let links = adapter.read_hyperlinks(workbook, sheet)?;
    let Some(link) = find_by_cell(&links, expected_link) else {
        return Ok(JsonMap::new());
    };

    let mut projected = project_rule(link, expected_link);
    let internal = [link, expected_link]
        .iter()
        .any(|m| m.get("internal").and_then(Value::as_bool) == Some(true));
    if let Some(Value::String(target)) = projected.get_mut("target") {
        *target = normalize_link_target(target, internal);
    }
    Ok(single("hyperlink", projected))
}

pub fn read_image_actual(
    adapter: &dyn ExcelReader,
    workbook: &WorkbookHandle,
    sheet: &str,
    expected: &JsonMap,
) -> AdapterResult<JsonMap> {
    let expected_image = unwrap_payload(expected, "image");
    let images = adapter.read_images(workbook, sheet)?;
    Ok(match find_by_cell(&images, expected_image) {
        Some(image) => single("image", project_rule(image, expected_image)),
        None => JsonMap::new(),
    })
}

pub fn read_pivot_actual(
    adapter: &dyn ExcelReader,
    workbook: &WorkbookHandle,
    sheet: &str,
    expected: &JsonMap,
) -> AdapterResult<JsonMap> {
    let expected_pivot = unwrap_payload(expected, "pivot");
    let pivots = adapter.read_pivot_tables(workbook, sheet)?;

    let by_name = expected_pivot
        .get("name")
        .and_then(|name| find_by_key(&pivots, "name", name));
    let found = by_name.or_else(|| {
        let target = expected_pivot.get("target_cell").and_then(Value::as_str)?;
        let target = normalize_pivot_target(target, sheet);
        pivots.iter().find(|pivot| {
            pivot
                .get("target_cell")
                .and_then(Value::as_str)
                .is_some_and(|t| normalize_pivot_target(t, sheet) == target)
        })
    });
    let Some(pivot) = found else {
        return Ok(JsonMap::new());
    };

    let mut projected = project_rule(pivot, expected_pivot);
    if let Some(Value::String(target)) = projected.get_mut("target_cell") {
        *target = normalize_pivot_target(target, sheet);
    }
    Ok(single("pivot", projected))
}

/// `$A$1:$B$2` on sheet `S1` -> `S1!A1`; sheet-qualified targets keep their sheet.
pub fn normalize_pivot_target(target: &str, sheet: &str) -> String {
    let cleaned = target.replace('$', "");
    let anchor = cleaned.split(':').next().unwrap_or_default().trim();
    if anchor.contains('!') {
        anchor.replace('\'', "")
    } else {
        format!("{sheet}!{anchor}")
    }
}

pub fn read_comment_actual(
    adapter: &dyn ExcelReader,
    workbook: &WorkbookHandle,
    sheet: &str,
    expected: &JsonMap,
) -> AdapterResult<JsonMap> {
    let expected_comment = unwrap_payload(expected, "comment");
    let comments = adapter.read_comments(workbook, sheet)?;
    Ok(match find_by_cell(&comments, expected_comment) {
        Some(comment) => single("comment", project_rule(comment, expected_comment)),
        None => JsonMap::new(),
    })
}

pub fn read_freeze_panes_actual(
    adapter: &dyn ExcelReader,
    workbook: &WorkbookHandle,
    sheet: &str,
    expected: &JsonMap,
) -> AdapterResult<JsonMap> {
    let expected_freeze = unwrap_payload(expected, "freeze");
    let settings = adapter.read_freeze_panes(workbook, sheet)?;
    if settings.is_empty() {
        return Ok(JsonMap::new());
    }
    Ok(single("freeze", project_rule(&settings, expected_freeze)))
}

/// Flat named-range dict; `value` is resolved through `refers_to` when expected asks.
pub fn read_named_range_actual(
    adapter: &dyn ExcelReader,
    workbook: &WorkbookHandle,
    sheet: &str,
    expected: &JsonMap,
) -> AdapterResult<JsonMap> {
    let expected = unwrap_payload(expected, "named_range");
    let Some(name) = expected.get("name") else {
        return Ok(JsonMap::new());
    };
    let names = adapter.read_named_ranges(workbook, sheet)?;
    let expected_scope = expected.get("scope");
    let found = names.iter().find(|entry| {
        entry.get("name") == Some(name)
            && match (expected_scope, entry.get("scope")) {
                (Some(want), Some(have)) => want == have,
                _ => true,
            }
    });
    let Some(entry) = found else {
        return Ok(JsonMap::new());
    };

    let mut projected = project_rule(entry, expected);
    if let Some(Value::String(refers_to)) = projected.get_mut("refers_to") {
        *refers_to = normalize_refers_to(refers_to);
    }

    if expected.contains_key("value") {
        let refers_to = entry
            .get("refers_to")
            .or_else(|| expected.get("refers_to"))
            .and_then(Value::as_str)
            .map(normalize_refers_to);
        if let Some((target_sheet, address)) = refers_to.as_deref().and_then(|r| r.rsplit_once('!'))
        {
            let (first, _) = split_range(address);
            let value = read_cell_scalar(adapter, workbook, target_sheet, &first)?;
            projected.insert("value".to_string(), value.unwrap_or(Value::Null));
        }
    }

    Ok(projected)
}

pub fn read_table_actual(
    adapter: &dyn ExcelReader,
    workbook: &WorkbookHandle,
    sheet: &str,
    expected: &JsonMap,
) -> AdapterResult<JsonMap> {
    let expected_table = unwrap_payload(expected, "table");
    let tables = adapter.read_tables(workbook, sheet)?;

    let by_name = expected_table
        .get("name")
        .and_then(|name| find_by_key(&tables, "name", name));
    let found = by_name.or_else(|| {
        let target = expected_table.get("ref").and_then(Value::as_str)?;
        let target = normalize_range(target);
        tables.iter().find(|table| {
            table
                .get("ref")
                .and_then(Value::as_str)
                .is_some_and(|r| normalize_range(r) == target)
        })
    });
    let Some(table) = found else {
        return Ok(JsonMap::new());
    };

    let mut projected = project_rule(table, expected_table);
    adopt_if_equivalent(&mut projected, expected_table, "ref", range_key);
    Ok(single("table", projected))
}

/// The original spelling of the range equal to `target` once both are normalized.
pub fn find_range<'a>(ranges: &'a [String], target: &str) -> Option<&'a String> {
    let target = normalize_range(target);
    ranges.iter().find(|range| normalize_range(range) == target)
}

pub fn find_by_key<'a>(items: &'a [JsonMap], key: &str, value: &Value) -> Option<&'a JsonMap> {
    items.iter().find(|item| item.get(key) == Some(value))
}

/// Match on the `cell` key, ignoring `$` anchors and case.
fn find_by_cell<'a>(items: &'a [JsonMap], expected: &JsonMap) -> Option<&'a JsonMap> {
    let cell = expected.get("cell").and_then(Value::as_str)?;
    let cell = normalize_range(cell);
    items.iter().find(|item| {
        item.get("cell")
            .and_then(Value::as_str)
            .is_some_and(|c| normalize_range(c) == cell)
    })
}

fn range_key(value: &Value) -> Option<String> {
    value.as_str().map(normalize_range)
}

fn formula_key(value: &Value) -> Option<String> {
    match normalize_formula(value) {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Does `actual[key]` match `expected[key]` under `normalize`? Absent in `expected` matches.
fn key_matches(
    actual: &JsonMap,
    expected: &JsonMap,
    key: &str,
    normalize: fn(&Value) -> Option<String>,
) -> bool {
    match expected.get(key) {
        None => true,
        Some(want) => actual
            .get(key)
            .is_some_and(|have| normalize(have).is_some() && normalize(have) == normalize(want)),
    }
}

/// First rule matching the expected range, rule type and formula (those present).
pub fn find_rule<'a>(rules: &'a [JsonMap], expected: &JsonMap) -> Option<&'a JsonMap> {
    rules.iter().find(|rule| {
        key_matches(rule, expected, "range", range_key)
            && key_matches(rule, expected, "rule_type", plain_key)
            && key_matches(rule, expected, "formula", formula_key)
    })
}

/// First validation matching the expected range, type and formulas (those present).
pub fn find_validation<'a>(validations: &'a [JsonMap], expected: &JsonMap) -> Option<&'a JsonMap> {
    validations.iter().find(|validation| {
        key_matches(validation, expected, "range", range_key)
            && key_matches(validation, expected, "validation_type", plain_key)
            && key_matches(validation, expected, "formula1", formula_key)
            && key_matches(validation, expected, "formula2", formula_key)
    })
}

fn plain_key(value: &Value) -> Option<String> {
    Some(value.to_string())
}

/// Keep only the keys `expected` names. A missing `path` falls back to the expected one,
/// since most libraries do not retain image source paths.
pub fn project_rule(actual: &JsonMap, expected: &JsonMap) -> JsonMap {
    let mut projected = JsonMap::new();
    for (key, expected_value) in expected {
        if let Some(value) = actual.get(key) {
            projected.insert(key.clone(), value.clone());
        } else if key == "path" {
            projected.insert(key.clone(), expected_value.clone());
        }
    }
    projected
}

/// Replace `projected[key]` with the expected spelling when the two are equivalent.
fn adopt_if_equivalent(
    projected: &mut JsonMap,
    expected: &JsonMap,
    key: &str,
    normalize: fn(&Value) -> Option<String>,
) {
    if let (Some(have), Some(want)) = (projected.get(key), expected.get(key)) {
        if normalize(have).is_some() && normalize(have) == normalize(want) {
            projected.insert(key.to_string(), want.clone());
        }
    }
}
