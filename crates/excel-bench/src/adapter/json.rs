//! Full-fidelity reference adapter backed by a serde JSON document.
//!
//! Every read and write operation of the contract (including Tier 2 and Tier 3) round-trips
//! exactly, which makes this adapter the default write oracle in tests and a baseline for
//! comparing real bindings.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    unwrap_payload, AdapterError, AdapterMeta, AdapterResult, ExcelReader, ExcelWriter,
    WorkbookHandle,
};
use crate::a1::{extract_column, format_a1, parse_a1, parse_range};
use crate::model::{BorderInfo, Capability, CellFormat, CellValue, JsonMap, LibraryInfo};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct Book {
    sheets: Vec<Sheet>,
    named_ranges: Vec<NamedRangeEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NamedRangeEntry {
    /// Sheet the definition was added through; only relevant for sheet-scoped names.
    sheet: String,
    definition: JsonMap,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct Sheet {
    name: String,
    cells: BTreeMap<String, StoredCell>,
    row_heights: BTreeMap<u32, f64>,
    column_widths: BTreeMap<String, f64>,
    merged_ranges: Vec<String>,
    conditional_formats: Vec<JsonMap>,
    data_validations: Vec<JsonMap>,
    hyperlinks: Vec<JsonMap>,
    images: Vec<JsonMap>,
    pivot_tables: Vec<JsonMap>,
    comments: Vec<JsonMap>,
    freeze_panes: JsonMap,
    tables: Vec<JsonMap>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredCell {
    #[serde(default = "blank")]
    value: CellValue,
    #[serde(default, skip_serializing_if = "CellFormat::is_empty")]
    format: CellFormat,
    #[serde(default, skip_serializing_if = "is_default_border")]
    border: BorderInfo,
}

fn blank() -> CellValue {
    CellValue::Blank
}

fn is_default_border(border: &BorderInfo) -> bool {
    *border == BorderInfo::default()
}

impl Default for StoredCell {
    fn default() -> Self {
        Self {
            value: CellValue::Blank,
            format: CellFormat::default(),
            border: BorderInfo::default(),
        }
    }
}

impl Book {
    fn sheet(&self, name: &str) -> AdapterResult<&Sheet> {
        self.sheets
            .iter()
            .find(|sheet| sheet.name == name)
            .ok_or_else(|| AdapterError::MissingSheet(name.to_string()))
    }

    fn sheet_mut(&mut self, name: &str) -> AdapterResult<&mut Sheet> {
        self.sheets
            .iter_mut()
            .find(|sheet| sheet.name == name)
            .ok_or_else(|| AdapterError::MissingSheet(name.to_string()))
    }
}

impl Sheet {
    fn cell(&self, cell: &str) -> AdapterResult<Option<&StoredCell>> {
        Ok(self.cells.get(&cell_key(cell)?))
    }

    fn cell_mut(&mut self, cell: &str) -> AdapterResult<&mut StoredCell> {
        Ok(self.cells.entry(cell_key(cell)?).or_default())
    }
}

/// Canonical `A1` key: upper-case, no anchors.
fn cell_key(cell: &str) -> AdapterResult<String> {
    parse_a1(cell)
        .map(format_a1)
        .ok_or_else(|| AdapterError::InvalidAddress(cell.to_string()))
}

fn overlay_border(target: &mut BorderInfo, source: &BorderInfo) {
    let pairs = [
        (&mut target.top, &source.top),
        (&mut target.bottom, &source.bottom),
        (&mut target.left, &source.left),
        (&mut target.right, &source.right),
        (&mut target.diagonal_up, &source.diagonal_up),
        (&mut target.diagonal_down, &source.diagonal_down),
    ];
    for (slot, edge) in pairs {
        if edge.is_some() {
            *slot = edge.clone();
        }
    }
}

/// Reference adapter persisting workbooks as JSON (`.json`).
#[derive(Debug, Clone)]
pub struct JsonWorkbookAdapter {
    name: String,
}

impl JsonWorkbookAdapter {
    pub const DEFAULT_NAME: &'static str = "json-workbook";

    pub fn new() -> Self {
        Self::named(Self::DEFAULT_NAME)
    }

    /// Same backend under another name, e.g. to register it as a separate oracle.
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for JsonWorkbookAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterMeta for JsonWorkbookAdapter {
    fn info(&self) -> LibraryInfo {
        LibraryInfo::new(
            self.name.clone(),
            env!("CARGO_PKG_VERSION"),
            "rust",
            [Capability::Read, Capability::Write],
        )
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn output_extension(&self) -> &'static str {
        ".json"
    }

    fn supported_read_extensions(&self) -> &'static [&'static str] {
        &[".json"]
    }
}

impl ExcelReader for JsonWorkbookAdapter {
    fn open_workbook(&self, path: &Path) -> AdapterResult<WorkbookHandle> {
        let text = fs::read_to_string(path)?;
        let book: Book = serde_json::from_str(&text)?;
        Ok(WorkbookHandle::new(book))
    }

    fn close_workbook(&self, workbook: WorkbookHandle) -> AdapterResult<()> {
        workbook.into_inner::<Book>().map(drop)
    }

    fn get_sheet_names(&self, workbook: &WorkbookHandle) -> AdapterResult<Vec<String>> {
        let book = workbook.downcast_ref::<Book>()?;
        Ok(book.sheets.iter().map(|sheet| sheet.name.clone()).collect())
    }

    fn read_cell_value(
        &self,
        workbook: &WorkbookHandle,
        sheet: &str,
        cell: &str,
    ) -> AdapterResult<CellValue> {
        let sheet = workbook.downcast_ref::<Book>()?.sheet(sheet)?;
        Ok(sheet
            .cell(cell)?
            .map(|stored| stored.value.clone())
            .unwrap_or(CellValue::Blank))
    }

    fn read_cell_format(
        &self,
        workbook: &WorkbookHandle,
        sheet: &str,
        cell: &str,
    ) -> AdapterResult<CellFormat> {
        let sheet = workbook.downcast_ref::<Book>()?.sheet(sheet)?;
        Ok(sheet
            .cell(cell)?
            .map(|stored| stored.format.clone())
            .unwrap_or_default())
    }

    fn read_cell_border(
        &self,
        workbook: &WorkbookHandle,
        sheet: &str,
        cell: &str,
    ) -> AdapterResult<BorderInfo> {
        let sheet = workbook.downcast_ref::<Book>()?.sheet(sheet)?;
        Ok(sheet
            .cell(cell)?
            .map(|stored| stored.border.clone())
            .unwrap_or_default())
    }

    fn read_row_height(
        &self,
        workbook: &WorkbookHandle,
        sheet: &str,
        row: u32,
    ) -> AdapterResult<Option<f64>> {
        let sheet = workbook.downcast_ref::<Book>()?.sheet(sheet)?;
        Ok(sheet.row_heights.get(&row).copied())
    }

    fn read_column_width(
        &self,
        workbook: &WorkbookHandle,
        sheet: &str,
        column: &str,
    ) -> AdapterResult<Option<f64>> {
        let sheet = workbook.downcast_ref::<Book>()?.sheet(sheet)?;
        Ok(sheet.column_widths.get(&extract_column(column)).copied())
    }

    fn read_merged_ranges(
        &self,
        workbook: &WorkbookHandle,
        sheet: &str,
    ) -> AdapterResult<Vec<String>> {
        let sheet = workbook.downcast_ref::<Book>()?.sheet(sheet)?;
        Ok(sheet.merged_ranges.clone())
    }

    fn read_conditional_formats(
        &self,
        workbook: &WorkbookHandle,
        sheet: &str,
    ) -> AdapterResult<Vec<JsonMap>> {
        let sheet = workbook.downcast_ref::<Book>()?.sheet(sheet)?;
        Ok(sheet.conditional_formats.clone())
    }

    fn read_data_validations(
        &self,
        workbook: &WorkbookHandle,
        sheet: &str,
    ) -> AdapterResult<Vec<JsonMap>> {
        let sheet = workbook.downcast_ref::<Book>()?.sheet(sheet)?;
        Ok(sheet.data_validations.clone())
    }

    fn read_hyperlinks(
        &self,
        workbook: &WorkbookHandle,
        sheet: &str,
    ) -> AdapterResult<Vec<JsonMap>> {
        let sheet = workbook.downcast_ref::<Book>()?.sheet(sheet)?;
        Ok(sheet.hyperlinks.clone())
    }

    fn read_images(&self, workbook: &WorkbookHandle, sheet: &str) -> AdapterResult<Vec<JsonMap>> {
        let sheet = workbook.downcast_ref::<Book>()?.sheet(sheet)?;
        Ok(sheet.images.clone())
    }

    fn read_pivot_tables(
        &self,
        workbook: &WorkbookHandle,
        sheet: &str,
    ) -> AdapterResult<Vec<JsonMap>> {
        let sheet = workbook.downcast_ref::<Book>()?.sheet(sheet)?;
        Ok(sheet.pivot_tables.clone())
    }

    fn read_comments(&self, workbook: &WorkbookHandle, sheet: &str) -> AdapterResult<Vec<JsonMap>> {
        let sheet = workbook.downcast_ref::<Book>()?.sheet(sheet)?;
        Ok(sheet.comments.clone())
    }

    fn read_freeze_panes(&self, workbook: &WorkbookHandle, sheet: &str) -> AdapterResult<JsonMap> {
        let sheet = workbook.downcast_ref::<Book>()?.sheet(sheet)?;
        Ok(sheet.freeze_panes.clone())
    }

    fn read_named_ranges(
        &self,
        workbook: &WorkbookHandle,
        sheet: &str,
    ) -> AdapterResult<Vec<JsonMap>> {
        let book = workbook.downcast_ref::<Book>()?;
        Ok(book
            .named_ranges
            .iter()
            .filter(|entry| {
                let scope = entry.definition.get("scope").and_then(Value::as_str);
                scope != Some("sheet") || entry.sheet == sheet
            })
            .map(|entry| entry.definition.clone())
            .collect())
    }

    fn read_tables(&self, workbook: &WorkbookHandle, sheet: &str) -> AdapterResult<Vec<JsonMap>> {
        let sheet = workbook.downcast_ref::<Book>()?.sheet(sheet)?;
        Ok(sheet.tables.clone())
    }
}

impl ExcelWriter for JsonWorkbookAdapter {
    fn create_workbook(&self) -> AdapterResult<WorkbookHandle> {
        Ok(WorkbookHandle::new(Book::default()))
    }

    fn add_sheet(&self, workbook: &mut WorkbookHandle, name: &str) -> AdapterResult<()> {
        let book = workbook.downcast_mut::<Book>()?;
        if book.sheets.iter().any(|sheet| sheet.name == name) {
            return Err(AdapterError::InvalidInput(format!(
                "sheet '{name}' already exists"
            )));
        }
        book.sheets.push(Sheet {
            name: name.to_string(),
            ..Sheet::default()
        });
        Ok(())
    }

    fn write_cell_value(
        &self,
        workbook: &mut WorkbookHandle,
        sheet: &str,
        cell: &str,
        value: &CellValue,
    ) -> AdapterResult<()> {
        let sheet = workbook.downcast_mut::<Book>()?.sheet_mut(sheet)?;
        sheet.cell_mut(cell)?.value = value.clone();
        Ok(())
    }

    fn write_cell_format(
        &self,
        workbook: &mut WorkbookHandle,
        sheet: &str,
        cell: &str,
        format: &CellFormat,
    ) -> AdapterResult<()> {
        let sheet = workbook.downcast_mut::<Book>()?.sheet_mut(sheet)?;
        sheet.cell_mut(cell)?.format.merge(format);
        Ok(())
    }

    fn write_cell_border(
        &self,
        workbook: &mut WorkbookHandle,
        sheet: &str,
        cell: &str,
        border: &BorderInfo,
    ) -> AdapterResult<()> {
        let sheet = workbook.downcast_mut::<Book>()?.sheet_mut(sheet)?;
        overlay_border(&mut sheet.cell_mut(cell)?.border, border);
        Ok(())
    }

    fn set_row_height(
        &self,
        workbook: &mut WorkbookHandle,
        sheet: &str,
        row: u32,
        height: f64,
    ) -> AdapterResult<()> {
        if row == 0 {
            return Err(AdapterError::InvalidInput("row numbers start at 1".to_string()));
        }
        let sheet = workbook.downcast_mut::<Book>()?.sheet_mut(sheet)?;
        sheet.row_heights.insert(row, height);
        Ok(())
    }

    fn set_column_width(
        &self,
        workbook: &mut WorkbookHandle,
        sheet: &str,
        column: &str,
        width: f64,
    ) -> AdapterResult<()> {
        let sheet = workbook.downcast_mut::<Book>()?.sheet_mut(sheet)?;
        sheet.column_widths.insert(extract_column(column), width);
        Ok(())
    }

    fn merge_cells(
        &self,
        workbook: &mut WorkbookHandle,
        sheet: &str,
        range: &str,
    ) -> AdapterResult<()> {
        let (top_left, bottom_right) =
            parse_range(range).ok_or_else(|| AdapterError::InvalidAddress(range.to_string()))?;
        let sheet = workbook.downcast_mut::<Book>()?.sheet_mut(sheet)?;
        sheet
            .merged_ranges
            .push(format!("{}:{}", format_a1(top_left), format_a1(bottom_right)));
        Ok(())
    }

    fn add_conditional_format(
        &self,
        workbook: &mut WorkbookHandle,
        sheet: &str,
        rule: &JsonMap,
    ) -> AdapterResult<()> {
        let sheet = workbook.downcast_mut::<Book>()?.sheet_mut(sheet)?;
        let mut rule = unwrap_payload(rule, "cf_rule").clone();
        // Real libraries report evaluation order; mirror that so priority stripping is exercised.
        if !rule.contains_key("priority") {
            let priority = sheet.conditional_formats.len() + 1;
            rule.insert("priority".to_string(), Value::from(priority));
        }
        sheet.conditional_formats.push(rule);
        Ok(())
    }

    fn add_data_validation(
        &self,
        workbook: &mut WorkbookHandle,
        sheet: &str,
        validation: &JsonMap,
    ) -> AdapterResult<()> {
        let sheet = workbook.downcast_mut::<Book>()?.sheet_mut(sheet)?;
        sheet
            .data_validations
            .push(unwrap_payload(validation, "validation").clone());
        Ok(())
    }

    fn add_hyperlink(
        &self,
        workbook: &mut WorkbookHandle,
        sheet: &str,
        link: &JsonMap,
    ) -> AdapterResult<()> {
        let link = unwrap_payload(link, "hyperlink");
        require_key(link, "cell")?;
        let sheet = workbook.downcast_mut::<Book>()?.sheet_mut(sheet)?;
        sheet.hyperlinks.push(link.clone());
        Ok(())
    }

    fn add_image(
        &self,
        workbook: &mut WorkbookHandle,
        sheet: &str,
        image: &JsonMap,
    ) -> AdapterResult<()> {
        let image = unwrap_payload(image, "image");
        require_key(image, "cell")?;
        let sheet = workbook.downcast_mut::<Book>()?.sheet_mut(sheet)?;
        sheet.images.push(image.clone());
        Ok(())
    }

    fn add_pivot_table(
        &self,
        workbook: &mut WorkbookHandle,
        sheet: &str,
        pivot: &JsonMap,
    ) -> AdapterResult<()> {
        let sheet = workbook.downcast_mut::<Book>()?.sheet_mut(sheet)?;
        sheet.pivot_tables.push(unwrap_payload(pivot, "pivot").clone());
        Ok(())
    }

    fn add_comment(
        &self,
        workbook: &mut WorkbookHandle,
        sheet: &str,
        comment: &JsonMap,
    ) -> AdapterResult<()> {
        let comment = unwrap_payload(comment, "comment");
        require_key(comment, "cell")?;
        let sheet = workbook.downcast_mut::<Book>()?.sheet_mut(sheet)?;
        sheet.comments.push(comment.clone());
        Ok(())
    }

    fn set_freeze_panes(
        &self,
        workbook: &mut WorkbookHandle,
        sheet: &str,
        settings: &JsonMap,
    ) -> AdapterResult<()> {
        let sheet = workbook.downcast_mut::<Book>()?.sheet_mut(sheet)?;
        sheet.freeze_panes = unwrap_payload(settings, "freeze").clone();
        Ok(())
    }

    fn save_workbook(&self, workbook: &mut WorkbookHandle, path: &Path) -> AdapterResult<()> {
        let book = workbook.downcast_ref::<Book>()?;
        let bytes = serde_json::to_vec_pretty(book)?;
        fs::write(path, bytes)?;
        Ok(())
    }

    fn add_named_range(
        &self,
        workbook: &mut WorkbookHandle,
        sheet: &str,
        named_range: &JsonMap,
    ) -> AdapterResult<()> {
        let definition = unwrap_payload(named_range, "named_range");
        require_key(definition, "name")?;
        let book = workbook.downcast_mut::<Book>()?;
        book.sheet(sheet)?;
        book.named_ranges.push(NamedRangeEntry {
            sheet: sheet.to_string(),
            definition: definition.clone(),
        });
        Ok(())
    }

    fn add_table(
        &self,
        workbook: &mut WorkbookHandle,
        sheet: &str,
        table: &JsonMap,
    ) -> AdapterResult<()> {
        let table = unwrap_payload(table, "table");
        require_key(table, "name")?;
        let sheet = workbook.downcast_mut::<Book>()?.sheet_mut(sheet)?;
        sheet.tables.push(table.clone());
        Ok(())
    }
}

fn require_key(payload: &JsonMap, key: &str) -> AdapterResult<()> {
    if payload.contains_key(key) {
        Ok(())
    } else {
        Err(AdapterError::InvalidInput(format!("payload is missing '{key}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BorderEdge, BorderStyle};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn obj(value: Value) -> JsonMap {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn values_formats_and_borders_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.json");
        let adapter = JsonWorkbookAdapter::new();

        let mut wb = adapter.create_workbook().unwrap();
        adapter.add_sheet(&mut wb, "S1").unwrap();
        adapter
            .write_cell_value(&mut wb, "S1", "$b$2", &CellValue::String("Hello".to_string()))
            .unwrap();
        adapter
            .write_cell_format(
                &mut wb,
                "S1",
                "B2",
                &CellFormat {
                    bold: Some(true),
                    ..CellFormat::default()
                },
            )
            .unwrap();
        adapter
            .write_cell_format(
                &mut wb,
                "S1",
                "B2",
                &CellFormat {
                    font_size: Some(14.0),
                    ..CellFormat::default()
                },
            )
            .unwrap();
        adapter
            .write_cell_border(
                &mut wb,
                "S1",
                "B2",
                &BorderInfo {
                    top: Some(BorderEdge::new(BorderStyle::Thick, "#FF0000")),
                    ..BorderInfo::default()
                },
            )
            .unwrap();
        adapter.set_row_height(&mut wb, "S1", 2, 30.0).unwrap();
        adapter.set_column_width(&mut wb, "S1", "c", 18.5).unwrap();
        adapter.save_workbook(&mut wb, &path).unwrap();

        let wb = adapter.open_workbook(&path).unwrap();
        assert_eq!(adapter.get_sheet_names(&wb).unwrap(), vec!["S1"]);
        assert_eq!(
            adapter.read_cell_value(&wb, "S1", "B2").unwrap(),
            CellValue::String("Hello".to_string())
        );
        assert_eq!(adapter.read_cell_value(&wb, "S1", "Z9").unwrap(), CellValue::Blank);
        let format = adapter.read_cell_format(&wb, "S1", "B2").unwrap();
        assert_eq!(format.bold, Some(true));
        assert_eq!(format.font_size, Some(14.0));
        let border = adapter.read_cell_border(&wb, "S1", "B2").unwrap();
        assert_eq!(border.top, Some(BorderEdge::new(BorderStyle::Thick, "#FF0000")));
        assert_eq!(border.bottom, None);
        assert_eq!(adapter.read_row_height(&wb, "S1", 2).unwrap(), Some(30.0));
        assert_eq!(adapter.read_column_width(&wb, "S1", "C").unwrap(), Some(18.5));
        adapter.close_workbook(wb).unwrap();
    }

    #[test]
    fn tier_two_payloads_are_unwrapped() {
        let adapter = JsonWorkbookAdapter::new();
        let mut wb = adapter.create_workbook().unwrap();
        adapter.add_sheet(&mut wb, "S1").unwrap();
        adapter
            .add_conditional_format(
                &mut wb,
                "S1",
                &obj(json!({"cf_rule": {"range": "B2:B6", "rule_type": "cellIs"}})),
            )
            .unwrap();
        adapter
            .add_hyperlink(
                &mut wb,
                "S1",
                &obj(json!({"hyperlink": {"cell": "A1", "target": "https://example.com"}})),
            )
            .unwrap();
        adapter
            .set_freeze_panes(&mut wb, "S1", &obj(json!({"mode": "freeze", "top_left_cell": "B2"})))
            .unwrap();
        adapter.merge_cells(&mut wb, "S1", "$C$1:$A$1").unwrap();

        assert_eq!(
            adapter.read_conditional_formats(&wb, "S1").unwrap(),
            vec![obj(json!({"range": "B2:B6", "rule_type": "cellIs", "priority": 1}))]
        );
        assert_eq!(
            adapter.read_hyperlinks(&wb, "S1").unwrap(),
            vec![obj(json!({"cell": "A1", "target": "https://example.com"}))]
        );
        assert_eq!(
            adapter.read_freeze_panes(&wb, "S1").unwrap(),
            obj(json!({"mode": "freeze", "top_left_cell": "B2"}))
        );
        assert_eq!(adapter.read_merged_ranges(&wb, "S1").unwrap(), vec!["A1:C1"]);
    }

    #[test]
    fn sheet_scoped_names_are_only_visible_from_their_sheet() {
        let adapter = JsonWorkbookAdapter::new();
        let mut wb = adapter.create_workbook().unwrap();
        adapter.add_sheet(&mut wb, "named_ranges").unwrap();
        adapter.add_sheet(&mut wb, "Other").unwrap();
        adapter
            .add_named_range(
                &mut wb,
                "named_ranges",
                &obj(json!({"name": "SingleCell", "scope": "workbook", "refers_to": "named_ranges!$B$2"})),
            )
            .unwrap();
        adapter
            .add_named_range(
                &mut wb,
                "named_ranges",
                &obj(json!({"name": "LocalName", "scope": "sheet", "refers_to": "named_ranges!$B$2"})),
            )
            .unwrap();

        let visible = adapter.read_named_ranges(&wb, "named_ranges").unwrap();
        assert_eq!(visible.len(), 2);
        let other = adapter.read_named_ranges(&wb, "Other").unwrap();
        assert_eq!(other.len(), 1);
        assert_eq!(other[0].get("name"), Some(&json!("SingleCell")));
    }

    #[test]
    fn errors_for_unknown_sheets_and_bad_addresses() {
        let adapter = JsonWorkbookAdapter::new();
        let mut wb = adapter.create_workbook().unwrap();
        adapter.add_sheet(&mut wb, "S1").unwrap();
        assert!(matches!(
            adapter.read_cell_value(&wb, "Nope", "A1"),
            Err(AdapterError::MissingSheet(_))
        ));
        assert!(matches!(
            adapter.write_cell_value(&mut wb, "S1", "1A", &CellValue::Blank),
            Err(AdapterError::InvalidAddress(_))
        ));
        assert!(matches!(
            adapter.add_sheet(&mut wb, "S1"),
            Err(AdapterError::InvalidInput(_))
        ));
        assert!(matches!(
            adapter.get_sheet_names(&WorkbookHandle::new(1_u8)),
            Err(AdapterError::InvalidHandle)
        ));
    }

    #[test]
    fn open_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = JsonWorkbookAdapter::new()
            .open_workbook(&dir.path().join("missing.json"))
            .unwrap_err();
        assert_eq!(err.kind(), "Io");
    }
}
