//! Write mutators: each turns one test case into calls on an [`ExcelWriter`].
//!
//! The mutators only stage content; the runner creates the sheets up front and saves the
//! workbook once every case of the file has been applied.

use serde_json::Value;

use crate::a1::{cell_to_coord, coord_to_cell, extract_column, first_non_top_left_cell, split_range};
use crate::adapter::{unwrap_payload, AdapterError, AdapterResult, ExcelWriter, WorkbookHandle};
use crate::feature::expected::{
    border_from_expected, cell_format_from_expected, cell_value_from_expected,
    cell_value_from_raw, normalize_refers_to, parse_date, parse_datetime,
};
use crate::model::{CellFormat, CellValue, JsonMap, TestCase};

pub const DEFAULT_DATE_FORMAT: &str = "yyyy-mm-dd";
pub const DEFAULT_DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

const SAMPLE_NUMBER: f64 = 1234.5678;

fn sample_label(case: &TestCase) -> CellValue {
    if case.label.is_empty() {
        CellValue::String("Text".to_string())
    } else {
        CellValue::String(case.label.clone())
    }
}

fn required_str<'a>(map: &'a JsonMap, key: &str) -> AdapterResult<&'a str> {
    map.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| AdapterError::InvalidInput(format!("expected `{key}` in test case")))
}

pub fn write_cell_value_case(
    adapter: &dyn ExcelWriter,
    workbook: &mut WorkbookHandle,
    sheet: &str,
    cell: &str,
    case: &TestCase,
) -> AdapterResult<()> {
    let value = cell_value_from_expected(&case.expected)?;
    adapter.write_cell_value(workbook, sheet, cell, &value)?;

    let explicit = case
        .expected
        .get("number_format")
        .and_then(Value::as_str)
        .map(str::to_string);
    let number_format = explicit.or_else(|| match value {
        CellValue::Date(_) => Some(DEFAULT_DATE_FORMAT.to_string()),
        CellValue::DateTime(_) => Some(DEFAULT_DATETIME_FORMAT.to_string()),
        _ => None,
    });
    if let Some(number_format) = number_format {
        let format = CellFormat {
            number_format: Some(number_format),
            ..CellFormat::default()
        };
        adapter.write_cell_format(workbook, sheet, cell, &format)?;
    }
    Ok(())
}

pub fn write_formula_case(
    adapter: &dyn ExcelWriter,
    workbook: &mut WorkbookHandle,
    sheet: &str,
    cell: &str,
    case: &TestCase,
) -> AdapterResult<()> {
    let formula = required_str(&case.expected, "formula")?;
    let cached = case.expected.get("value").filter(|v| !v.is_null()).cloned();
    adapter.write_cell_value(workbook, sheet, cell, &CellValue::formula(formula, cached))
}

pub fn write_text_format_case(
    adapter: &dyn ExcelWriter,
    workbook: &mut WorkbookHandle,
    sheet: &str,
    cell: &str,
    case: &TestCase,
) -> AdapterResult<()> {
    adapter.write_cell_value(workbook, sheet, cell, &sample_label(case))?;
    adapter.write_cell_format(workbook, sheet, cell, &cell_format_from_expected(&case.expected))
}

/// Shared by background colors and alignment: a label carrying the expected format.
pub fn write_formatted_label_case(
    adapter: &dyn ExcelWriter,
    workbook: &mut WorkbookHandle,
    sheet: &str,
    cell: &str,
    case: &TestCase,
) -> AdapterResult<()> {
    write_text_format_case(adapter, workbook, sheet, cell, case)
}

pub fn write_number_format_case(
    adapter: &dyn ExcelWriter,
    workbook: &mut WorkbookHandle,
    sheet: &str,
    cell: &str,
    case: &TestCase,
) -> AdapterResult<()> {
    let number_format = required_str(&case.expected, "number_format")?;
    let value = number_format_sample(case.expected.get("value"), number_format);
    adapter.write_cell_value(workbook, sheet, cell, &value)?;
    let format = CellFormat {
        number_format: Some(number_format.to_string()),
        ..CellFormat::default()
    };
    adapter.write_cell_format(workbook, sheet, cell, &format)
}

/// The value a number format is demonstrated on.
pub fn number_format_sample(value: Option<&Value>, number_format: &str) -> CellValue {
    if let Some(value) = value.filter(|v| !v.is_null()) {
        if let Some(raw) = value.as_str() {
            if let Some(dt) = parse_datetime(raw) {
                return CellValue::DateTime(dt);
            }
            if let Some(date) = parse_date(raw) {
                return CellValue::Date(date);
            }
        }
        return cell_value_from_raw(value);
    }
    if is_date_format(number_format) {
        if let Some(date) = parse_date("2024-01-15") {
            return CellValue::Date(date);
        }
    }
    CellValue::Number(SAMPLE_NUMBER)
}

/// Date codes use `y`/`d`/`h`/`s` (or `m` without digit placeholders) outside quoted literals.
pub fn is_date_format(number_format: &str) -> bool {
    let mut in_quotes = false;
    let mut in_brackets = false;
    let mut has_date_token = false;
    let mut has_month_token = false;
    let mut has_digit_placeholder = false;
    let mut chars = number_format.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '\\' => {
                chars.next();
            }
            '[' if !in_quotes => in_brackets = true,
            ']' if !in_quotes => in_brackets = false,
            _ if in_quotes || in_brackets => {}
            'y' | 'Y' | 'd' | 'D' | 'h' | 'H' | 's' | 'S' => has_date_token = true,
            'm' | 'M' => has_month_token = true,
            '0' | '#' | '?' => has_digit_placeholder = true,
            _ => {}
        }
    }
    has_date_token || (has_month_token && !has_digit_placeholder)
}

pub fn write_border_case(
    adapter: &dyn ExcelWriter,
    workbook: &mut WorkbookHandle,
    sheet: &str,
    cell: &str,
    case: &TestCase,
) -> AdapterResult<()> {
    let border = border_from_expected(&case.expected)?;
    adapter.write_cell_value(workbook, sheet, cell, &sample_label(case))?;
    adapter.write_cell_border(workbook, sheet, cell, &border)
}

pub fn write_dimensions_case(
    adapter: &dyn ExcelWriter,
    workbook: &mut WorkbookHandle,
    sheet: &str,
    cell: &str,
    case: &TestCase,
) -> AdapterResult<()> {
    if let Some(height) = case.expected.get("row_height").and_then(Value::as_f64) {
        let (row, _) = cell_to_coord(cell);
        adapter.set_row_height(workbook, sheet, row, height)?;
    }
    if let Some(width) = case.expected.get("column_width").and_then(Value::as_f64) {
        adapter.set_column_width(workbook, sheet, &extract_column(cell), width)?;
    }
    Ok(())
}

pub fn write_merged_cells_case(
    adapter: &dyn ExcelWriter,
    workbook: &mut WorkbookHandle,
    sheet: &str,
    _cell: &str,
    case: &TestCase,
) -> AdapterResult<()> {
    let expected = &case.expected;
    let range = required_str(expected, "merged_range")?;
    let (start, end) = split_range(range);

    let top_left = expected
        .get("top_left_value")
        .map(cell_value_from_raw)
        .unwrap_or_else(|| sample_label(case));
    adapter.write_cell_value(workbook, sheet, &start, &top_left)?;

    if let Some(color) = expected.get("top_left_bg_color").and_then(Value::as_str) {
        adapter.write_cell_format(workbook, sheet, &start, &background(color))?;
    }

    if let Some(other) = first_non_top_left_cell(&start, &end) {
        if let Some(color) = expected.get("non_top_left_bg_color").and_then(Value::as_str) {
            adapter.write_cell_format(workbook, sheet, &other, &background(color))?;
        }
        // A value hidden under the merge; most writers drop it.
        let hidden = expected
            .get("non_top_left_nonempty")
            .and_then(Value::as_u64)
            .is_some_and(|count| count > 0);
        if hidden {
            adapter.write_cell_value(workbook, sheet, &other, &CellValue::String("hidden".into()))?;
        }
    }

    adapter.merge_cells(workbook, sheet, range)
}

fn background(color: &str) -> CellFormat {
    CellFormat {
        bg_color: Some(color.to_string()),
        ..CellFormat::default()
    }
}

pub fn write_conditional_format_case(
    adapter: &dyn ExcelWriter,
    workbook: &mut WorkbookHandle,
    sheet: &str,
    _cell: &str,
    case: &TestCase,
) -> AdapterResult<()> {
    adapter.add_conditional_format(workbook, sheet, &case.expected)
}

pub fn write_data_validation_case(
    adapter: &dyn ExcelWriter,
    workbook: &mut WorkbookHandle,
    sheet: &str,
    _cell: &str,
    case: &TestCase,
) -> AdapterResult<()> {
    adapter.add_data_validation(workbook, sheet, &case.expected)
}

pub fn write_hyperlink_case(
    adapter: &dyn ExcelWriter,
    workbook: &mut WorkbookHandle,
    sheet: &str,
    _cell: &str,
    case: &TestCase,
) -> AdapterResult<()> {
    adapter.add_hyperlink(workbook, sheet, &case.expected)
}

pub fn write_image_case(
    adapter: &dyn ExcelWriter,
    workbook: &mut WorkbookHandle,
    sheet: &str,
    _cell: &str,
    case: &TestCase,
) -> AdapterResult<()> {
    adapter.add_image(workbook, sheet, &case.expected)
}

pub fn write_comment_case(
    adapter: &dyn ExcelWriter,
    workbook: &mut WorkbookHandle,
    sheet: &str,
    _cell: &str,
    case: &TestCase,
) -> AdapterResult<()> {
    adapter.add_comment(workbook, sheet, &case.expected)
}

pub fn write_freeze_panes_case(
    adapter: &dyn ExcelWriter,
    workbook: &mut WorkbookHandle,
    sheet: &str,
    _cell: &str,
    case: &TestCase,
) -> AdapterResult<()> {
    adapter.set_freeze_panes(workbook, sheet, &case.expected)
}

/// Pivot tables are never written; the failure is scored like any other unsupported write.
pub fn write_pivot_case(
    _adapter: &dyn ExcelWriter,
    _workbook: &mut WorkbookHandle,
    _sheet: &str,
    _cell: &str,
    _case: &TestCase,
) -> AdapterResult<()> {
    Err(AdapterError::NotImplemented("pivot table writing".to_string()))
}

/// Writes the referenced cell's value (when expected has one) before the definition so
/// read-back can resolve `value` through `refers_to`.
pub fn write_named_range_case(
    adapter: &dyn ExcelWriter,
    workbook: &mut WorkbookHandle,
    sheet: &str,
    _cell: &str,
    case: &TestCase,
) -> AdapterResult<()> {
    let mut definition = unwrap_payload(&case.expected, "named_range").clone();
    let value = definition.remove("value");

    if let Some(value) = value.filter(|v| !v.is_null()) {
        let refers_to = required_str(&definition, "refers_to")?;
        let refers_to = normalize_refers_to(refers_to);
        let (target_sheet, address) = refers_to
            .rsplit_once('!')
            .unwrap_or((sheet, refers_to.as_str()));
        let (first, _) = split_range(address);
        adapter.write_cell_value(workbook, target_sheet, &first, &cell_value_from_raw(&value))?;
    }

    adapter.add_named_range(workbook, sheet, &definition)
}

/// Header cells from `columns` along the first row of `ref`, then the table itself.
pub fn write_table_case(
    adapter: &dyn ExcelWriter,
    workbook: &mut WorkbookHandle,
    sheet: &str,
    _cell: &str,
    case: &TestCase,
) -> AdapterResult<()> {
    let table = unwrap_payload(&case.expected, "table");
    let reference = required_str(table, "ref")?;
    let (start, _) = split_range(reference);
    let (row, col) = cell_to_coord(&start);

    if let Some(columns) = table.get("columns").and_then(Value::as_array) {
        for (offset, header) in (0_u32..).zip(columns) {
            let header = match header {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            adapter.write_cell_value(
                workbook,
                sheet,
                &coord_to_cell(row, col + offset),
                &CellValue::String(header),
            )?;
        }
    }

    adapter.add_table(workbook, sheet, table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{ExcelReader, JsonWorkbookAdapter};
    use crate::model::BorderStyle;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn obj(value: Value) -> JsonMap {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn book() -> (JsonWorkbookAdapter, WorkbookHandle) {
        let adapter = JsonWorkbookAdapter::new();
        let mut wb = adapter.create_workbook().unwrap();
        adapter.add_sheet(&mut wb, "S1").unwrap();
        (adapter, wb)
    }

    #[test]
    fn dates_get_a_default_number_format() {
        let (adapter, mut wb) = book();
        let case = TestCase::new("d", 2, obj(json!({"type": "date", "value": "2024-01-15"})));
        write_cell_value_case(&adapter, &mut wb, "S1", "B2", &case).unwrap();

        let format = adapter.read_cell_format(&wb, "S1", "B2").unwrap();
        assert_eq!(format.number_format.as_deref(), Some(DEFAULT_DATE_FORMAT));

        let case = TestCase::new(
            "dt",
            3,
            obj(json!({"type": "datetime", "value": "2024-01-15T10:30:00"})),
        );
        write_cell_value_case(&adapter, &mut wb, "S1", "B3", &case).unwrap();
        let format = adapter.read_cell_format(&wb, "S1", "B3").unwrap();
        assert_eq!(format.number_format.as_deref(), Some(DEFAULT_DATETIME_FORMAT));

        let case = TestCase::new("s", 4, obj(json!({"type": "string", "value": "x"})));
        write_cell_value_case(&adapter, &mut wb, "S1", "B4", &case).unwrap();
        assert!(adapter.read_cell_format(&wb, "S1", "B4").unwrap().is_empty());
    }

    #[test]
    fn formula_requires_text_and_keeps_cached_value() {
        let (adapter, mut wb) = book();
        let case = TestCase::new("f", 2, obj(json!({"formula": "SUM(1,2)", "value": 3})));
        write_formula_case(&adapter, &mut wb, "S1", "B2", &case).unwrap();
        assert_eq!(
            adapter.read_cell_value(&wb, "S1", "B2").unwrap(),
            CellValue::formula("=SUM(1,2)", Some(json!(3)))
        );

        let bad = TestCase::new("g", 3, obj(json!({"value": 3})));
        let err = write_formula_case(&adapter, &mut wb, "S1", "B3", &bad).unwrap_err();
        assert_eq!(err.kind(), "InvalidInput");
    }

    #[test]
    fn text_format_writes_label_then_format() {
        let (adapter, mut wb) = book();
        let case = TestCase::new("bold", 2, obj(json!({"bold": true})));
        write_text_format_case(&adapter, &mut wb, "S1", "B2", &case).unwrap();
        assert_eq!(
            adapter.read_cell_value(&wb, "S1", "B2").unwrap(),
            CellValue::String("bold".into())
        );
        assert_eq!(
            adapter.read_cell_format(&wb, "S1", "B2").unwrap().bold,
            Some(true)
        );
    }

    #[test]
    fn number_format_samples() {
        assert_eq!(
            number_format_sample(None, "0.00"),
            CellValue::Number(SAMPLE_NUMBER)
        );
        assert!(matches!(
            number_format_sample(None, "yyyy-mm-dd"),
            CellValue::Date(_)
        ));
        assert_eq!(
            number_format_sample(Some(&json!(0.25)), "0%"),
            CellValue::Number(0.25)
        );
        assert!(matches!(
            number_format_sample(Some(&json!("2024-01-15 10:30:00")), "General"),
            CellValue::DateTime(_)
        ));
    }

    #[test]
    fn date_format_detection_ignores_literals_and_colors() {
        assert!(is_date_format("yyyy-mm-dd"));
        assert!(is_date_format("h:mm AM/PM"));
        assert!(is_date_format("mmm"));
        assert!(!is_date_format("#,##0.00"));
        assert!(!is_date_format("0.00\"d\""));
        assert!(!is_date_format("[Red]0.00"));
        assert!(!is_date_format("General"));
    }

    #[test]
    fn border_case_applies_uniform_edges() {
        let (adapter, mut wb) = book();
        let case = TestCase::new("b", 2, obj(json!({"border_style": "medium"})));
        write_border_case(&adapter, &mut wb, "S1", "B2", &case).unwrap();
        let border = adapter.read_cell_border(&wb, "S1", "B2").unwrap();
        assert_eq!(border.left.map(|e| e.style), Some(BorderStyle::Medium));
    }

    #[test]
    fn dimensions_target_the_cell_row_and_column() {
        let (adapter, mut wb) = book();
        let case = TestCase::new(
            "dim",
            5,
            obj(json!({"row_height": 30.0, "column_width": 20.5})),
        );
        write_dimensions_case(&adapter, &mut wb, "S1", "C5", &case).unwrap();
        assert_eq!(adapter.read_row_height(&wb, "S1", 5).unwrap(), Some(30.0));
        assert_eq!(adapter.read_column_width(&wb, "S1", "C").unwrap(), Some(20.5));
    }

    #[test]
    fn merged_cells_write_values_colors_and_merge() {
        let (adapter, mut wb) = book();
        let case = TestCase::new(
            "m",
            2,
            obj(json!({
                "merged_range": "A1:B2",
                "top_left_value": "Merged",
                "top_left_bg_color": "#FF0000",
                "non_top_left_nonempty": 1
            })),
        );
        write_merged_cells_case(&adapter, &mut wb, "S1", "B2", &case).unwrap();
        assert_eq!(
            adapter.read_merged_ranges(&wb, "S1").unwrap(),
            vec!["A1:B2".to_string()]
        );
        assert_eq!(
            adapter.read_cell_value(&wb, "S1", "A1").unwrap(),
            CellValue::String("Merged".into())
        );
        assert!(!adapter.read_cell_value(&wb, "S1", "B1").unwrap().is_blank());
    }

    #[test]
    fn pivot_writes_are_not_implemented() {
        let (adapter, mut wb) = book();
        let case = TestCase::new("p", 2, obj(json!({"pivot": {"name": "P"}})));
        let err = write_pivot_case(&adapter, &mut wb, "S1", "B2", &case).unwrap_err();
        assert_eq!(err.kind(), "NotImplemented");
    }

    #[test]
    fn named_range_writes_referenced_value() {
        let (adapter, mut wb) = book();
        let case = TestCase::new(
            "n",
            2,
            obj(json!({"name": "Single", "scope": "workbook", "refers_to": "S1!$B$2", "value": 42})),
        );
        write_named_range_case(&adapter, &mut wb, "S1", "B2", &case).unwrap();
        assert_eq!(
            adapter.read_cell_value(&wb, "S1", "B2").unwrap(),
            CellValue::Number(42.0)
        );
        let names = adapter.read_named_ranges(&wb, "S1").unwrap();
        assert_eq!(
            names,
            vec![obj(json!({"name": "Single", "scope": "workbook", "refers_to": "S1!$B$2"}))]
        );
    }

    #[test]
    fn table_headers_follow_the_ref() {
        let (adapter, mut wb) = book();
        let case = TestCase::new(
            "t",
            2,
            obj(json!({"table": {"name": "Sales", "ref": "B3:D6", "columns": ["Region", "Q1", "Q2"]}})),
        );
        write_table_case(&adapter, &mut wb, "S1", "B2", &case).unwrap();
        assert_eq!(
            adapter.read_cell_value(&wb, "S1", "D3").unwrap(),
            CellValue::String("Q2".into())
        );
        assert_eq!(adapter.read_tables(&wb, "S1").unwrap().len(), 1);
    }
}
