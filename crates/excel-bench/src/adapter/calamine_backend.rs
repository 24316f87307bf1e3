//! Read-only binding over [`calamine`].
//!
//! calamine exposes values, formulas, merged regions and defined names but no styling, so
//! format/border reads report nothing and Tier 2 structures are unsupported.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use calamine::{open_workbook_auto, CellErrorType, Data, Reader, Sheets};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde_json::Value;

use super::{
    AdapterError, AdapterMeta, AdapterResult, ExcelReader, ReadOnlyAdapter, WorkbookHandle,
};
use crate::a1::{coord_to_cell, parse_a1};
use crate::model::{BorderInfo, Capability, CellFormat, CellValue, JsonMap, LibraryInfo};

/// calamine does not export its own version; keep in sync with `Cargo.toml`.
const CALAMINE_VERSION: &str = "0.32";

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Default)]
struct LoadedSheet {
    name: String,
    /// Keyed by 0-based `(row, col)`.
    cells: BTreeMap<(u32, u32), CellValue>,
    merged_ranges: Vec<String>,
}

#[derive(Debug, Default)]
struct LoadedBook {
    sheets: Vec<LoadedSheet>,
    defined_names: Vec<(String, String)>,
}

impl LoadedBook {
    fn sheet(&self, name: &str) -> AdapterResult<&LoadedSheet> {
        self.sheets
            .iter()
            .find(|sheet| sheet.name == name)
            .ok_or_else(|| AdapterError::MissingSheet(name.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CalamineAdapter;

impl CalamineAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl AdapterMeta for CalamineAdapter {
    fn info(&self) -> LibraryInfo {
        LibraryInfo::new("calamine", CALAMINE_VERSION, "rust", [Capability::Read])
    }

    fn supported_read_extensions(&self) -> &'static [&'static str] {
        &[".xlsx", ".xlsm", ".xls", ".xlsb", ".ods"]
    }
}

impl ReadOnlyAdapter for CalamineAdapter {}

impl ExcelReader for CalamineAdapter {
    fn open_workbook(&self, path: &Path) -> AdapterResult<WorkbookHandle> {
        if !path.exists() {
            return Err(AdapterError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )));
        }
        let mut workbook =
            open_workbook_auto(path).map_err(|err| AdapterError::Parse(err.to_string()))?;
        Ok(WorkbookHandle::new(load(&mut workbook)?))
    }

    fn close_workbook(&self, workbook: WorkbookHandle) -> AdapterResult<()> {
        workbook.into_inner::<LoadedBook>().map(drop)
    }

    fn get_sheet_names(&self, workbook: &WorkbookHandle) -> AdapterResult<Vec<String>> {
        let book = workbook.downcast_ref::<LoadedBook>()?;
        Ok(book.sheets.iter().map(|sheet| sheet.name.clone()).collect())
    }

    fn read_cell_value(
        &self,
        workbook: &WorkbookHandle,
        sheet: &str,
        cell: &str,
    ) -> AdapterResult<CellValue> {
        let sheet = workbook.downcast_ref::<LoadedBook>()?.sheet(sheet)?;
        let coord = parse_a1(cell).ok_or_else(|| AdapterError::InvalidAddress(cell.to_string()))?;
        Ok(sheet
            .cells
            .get(&(coord.row - 1, coord.col - 1))
            .cloned()
            .unwrap_or(CellValue::Blank))
    }

    fn read_cell_format(
        &self,
        workbook: &WorkbookHandle,
        sheet: &str,
        _cell: &str,
    ) -> AdapterResult<CellFormat> {
        workbook.downcast_ref::<LoadedBook>()?.sheet(sheet)?;
        Ok(CellFormat::default())
    }

    fn read_cell_border(
        &self,
        workbook: &WorkbookHandle,
        sheet: &str,
        _cell: &str,
    ) -> AdapterResult<BorderInfo> {
        workbook.downcast_ref::<LoadedBook>()?.sheet(sheet)?;
        Ok(BorderInfo::default())
    }

    fn read_row_height(&self, _: &WorkbookHandle, _: &str, _: u32) -> AdapterResult<Option<f64>> {
        Ok(None)
    }

    fn read_column_width(
        &self,
        _: &WorkbookHandle,
        _: &str,
        _: &str,
    ) -> AdapterResult<Option<f64>> {
        Ok(None)
    }

    fn read_merged_ranges(
        &self,
        workbook: &WorkbookHandle,
        sheet: &str,
    ) -> AdapterResult<Vec<String>> {
        let sheet = workbook.downcast_ref::<LoadedBook>()?.sheet(sheet)?;
        Ok(sheet.merged_ranges.clone())
    }

    fn read_conditional_formats(&self, _: &WorkbookHandle, _: &str) -> AdapterResult<Vec<JsonMap>> {
        Err(AdapterError::Unsupported("conditional formatting".to_string()))
    }

    fn read_data_validations(&self, _: &WorkbookHandle, _: &str) -> AdapterResult<Vec<JsonMap>> {
        Err(AdapterError::Unsupported("data validation".to_string()))
    }

    fn read_hyperlinks(&self, _: &WorkbookHandle, _: &str) -> AdapterResult<Vec<JsonMap>> {
        Err(AdapterError::Unsupported("hyperlinks".to_string()))
    }

    fn read_images(&self, _: &WorkbookHandle, _: &str) -> AdapterResult<Vec<JsonMap>> {
        Err(AdapterError::Unsupported("images".to_string()))
    }

    fn read_pivot_tables(&self, _: &WorkbookHandle, _: &str) -> AdapterResult<Vec<JsonMap>> {
        Err(AdapterError::Unsupported("pivot tables".to_string()))
    }

    fn read_comments(&self, _: &WorkbookHandle, _: &str) -> AdapterResult<Vec<JsonMap>> {
        Err(AdapterError::Unsupported("comments".to_string()))
    }

    fn read_freeze_panes(&self, _: &WorkbookHandle, _: &str) -> AdapterResult<JsonMap> {
        Err(AdapterError::Unsupported("freeze panes".to_string()))
    }

    fn read_named_ranges(
        &self,
        workbook: &WorkbookHandle,
        _sheet: &str,
    ) -> AdapterResult<Vec<JsonMap>> {
        let book = workbook.downcast_ref::<LoadedBook>()?;
        Ok(book
            .defined_names
            .iter()
            .map(|(name, formula)| {
                let mut entry = JsonMap::new();
                entry.insert("name".to_string(), Value::String(name.clone()));
                entry.insert("scope".to_string(), Value::String("workbook".to_string()));
                entry.insert(
                    "refers_to".to_string(),
                    Value::String(normalize_defined_name_address(formula)),
                );
                entry
            })
            .collect())
    }
}

fn load(workbook: &mut Sheets<BufReader<File>>) -> AdapterResult<LoadedBook> {
    let names = workbook.sheet_names().to_owned();
    let mut book = LoadedBook {
        sheets: Vec::with_capacity(names.len()),
        defined_names: workbook.defined_names().to_vec(),
    };

    for name in names {
        let mut sheet = LoadedSheet {
            name: name.clone(),
            ..LoadedSheet::default()
        };

        let range = workbook
            .worksheet_range(&name)
            .map_err(|err| AdapterError::Parse(format!("sheet `{name}`: {err}")))?;
        let start = range.start().unwrap_or((0, 0));
        for (row, col, data) in range.used_cells() {
            let Some(key) = absolute(start, row, col) else {
                continue;
            };
            let value = convert_value(data);
            if !value.is_blank() {
                sheet.cells.insert(key, value);
            }
        }

        match workbook.worksheet_formula(&name) {
            Ok(formulas) => {
                let start = formulas.start().unwrap_or((0, 0));
                for (row, col, formula) in formulas.used_cells() {
                    let Some(key) = absolute(start, row, col) else {
                        continue;
                    };
                    if formula.trim().is_empty() {
                        continue;
                    }
                    let cached = sheet.cells.get(&key).and_then(CellValue::to_json);
                    sheet
                        .cells
                        .insert(key, CellValue::formula(formula.trim(), cached));
                }
            }
            Err(err) => log::warn!("failed to read formulas for sheet `{name}`: {err}"),
        }

        sheet.merged_ranges = merged_ranges(workbook, &name);
        book.sheets.push(sheet);
    }

    Ok(book)
}

fn merged_ranges(workbook: &mut Sheets<BufReader<File>>, sheet: &str) -> Vec<String> {
    let dimensions = match workbook {
        Sheets::Xls(xls) => xls.worksheet_merge_cells(sheet),
        Sheets::Xlsx(xlsx) => match xlsx.worksheet_merge_cells(sheet) {
            Some(Ok(dims)) => Some(dims),
            Some(Err(err)) => {
                log::warn!("failed to read merged cells for sheet `{sheet}`: {err}");
                None
            }
            None => None,
        },
        _ => None,
    };
    dimensions
        .unwrap_or_default()
        .into_iter()
        .map(|dim| {
            format!(
                "{}:{}",
                coord_to_cell(dim.start.0 + 1, dim.start.1 + 1),
                coord_to_cell(dim.end.0 + 1, dim.end.1 + 1)
            )
        })
        .collect()
}

fn absolute(start: (u32, u32), row: usize, col: usize) -> Option<(u32, u32)> {
    // `used_cells` yields coordinates relative to `range.start()`.
    let row: u32 = row.try_into().ok()?;
    let col: u32 = col.try_into().ok()?;
    Some((start.0.checked_add(row)?, start.1.checked_add(col)?))
}

fn convert_value(value: &Data) -> CellValue {
    match value {
        Data::Empty => CellValue::Blank,
        Data::Bool(v) => CellValue::Boolean(*v),
        Data::Int(v) => CellValue::Number(*v as f64),
        Data::Float(v) => CellValue::Number(*v),
        Data::String(v) => CellValue::String(v.clone()),
        Data::Error(e) => CellValue::Error(error_literal(e).to_string()),
        Data::DateTime(v) => {
            serial_to_value(v.as_f64()).unwrap_or_else(|| CellValue::Number(v.as_f64()))
        }
        Data::DateTimeIso(v) => iso_to_value(v),
        Data::DurationIso(v) => CellValue::String(v.clone()),
    }
}

fn error_literal(err: &CellErrorType) -> &'static str {
    match err {
        CellErrorType::Div0 => "#DIV/0!",
        CellErrorType::NA => "#N/A",
        CellErrorType::Name => "#NAME?",
        CellErrorType::Null => "#NULL!",
        CellErrorType::Num => "#NUM!",
        CellErrorType::Ref => "#REF!",
        CellErrorType::Value => "#VALUE!",
        CellErrorType::GettingData => "#GETTING_DATA",
    }
}

fn excel_epoch() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)
}

/// Excel serial (1900 date system) to a date, or a datetime when it has a time part.
fn serial_to_value(serial: f64) -> Option<CellValue> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let seconds = (serial * SECONDS_PER_DAY).round() as i64;
    let datetime = excel_epoch()?.checked_add_signed(Duration::seconds(seconds))?;
    Some(date_or_datetime(datetime))
}

fn iso_to_value(raw: &str) -> CellValue {
    let trimmed = raw.trim_end_matches('Z');
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return CellValue::Date(date);
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(date_or_datetime)
        .unwrap_or_else(|| CellValue::String(raw.to_string()))
}

fn date_or_datetime(datetime: NaiveDateTime) -> CellValue {
    if datetime.time() == chrono::NaiveTime::MIN {
        CellValue::Date(datetime.date())
    } else {
        CellValue::DateTime(datetime)
    }
}

/// `='My Sheet'!$B$2` -> `My Sheet!B2`.
fn normalize_defined_name_address(raw: &str) -> String {
    let raw = raw.trim().trim_start_matches('=');
    match raw.split_once('!') {
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

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn serial_dates_split_on_midnight() {
        assert_eq!(
            serial_to_value(46057.0),
            Some(CellValue::Date(NaiveDate::from_ymd_opt(2026, 2, 4).unwrap()))
        );
        assert_eq!(
            serial_to_value(46057.4375),
            Some(CellValue::DateTime(
                NaiveDate::from_ymd_opt(2026, 2, 4)
                    .unwrap()
                    .and_hms_opt(10, 30, 0)
                    .unwrap()
            ))
        );
        assert_eq!(serial_to_value(-1.0), None);
    }

    #[test]
    fn iso_strings_parse_when_possible() {
        assert_eq!(
            iso_to_value("2026-02-04T00:00:00"),
            CellValue::Date(NaiveDate::from_ymd_opt(2026, 2, 4).unwrap())
        );
        assert_eq!(
            iso_to_value("2026-02-04T10:30:45Z").cell_type().as_str(),
            "datetime"
        );
        assert_eq!(
            iso_to_value("2026-02-04T10:30:45+02:00"),
            CellValue::String("2026-02-04T10:30:45+02:00".to_string())
        );
    }

    #[test]
    fn error_values_render_as_excel_literals() {
        assert_eq!(
            convert_value(&Data::Error(CellErrorType::Div0)),
            CellValue::Error("#DIV/0!".to_string())
        );
        assert_eq!(convert_value(&Data::Int(3)), CellValue::Number(3.0));
        assert_eq!(convert_value(&Data::Empty), CellValue::Blank);
    }

    #[test]
    fn defined_name_addresses_are_normalized() {
        assert_eq!(
            normalize_defined_name_address("='My Sheet'!$B$2:$B$4"),
            "My Sheet!B2:B4"
        );
        assert_eq!(normalize_defined_name_address("Data!$A$1"), "Data!A1");
        assert_eq!(normalize_defined_name_address("$C$3"), "C3");
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = CalamineAdapter::new()
            .open_workbook(&dir.path().join("missing.xlsx"))
            .unwrap_err();
        match err {
            AdapterError::Io(io) => assert_eq!(io.kind(), io::ErrorKind::NotFound),
            other => panic!("expected io error, got {other:?}"),
        }
    }

    #[test]
    fn write_half_reports_read_only() {
        use crate::adapter::ExcelWriter;

        let err = CalamineAdapter::new().create_workbook().unwrap_err();
        assert!(err.is_contract_violation());
        assert_eq!(err.to_string(), "calamine is read-only");
    }
}
