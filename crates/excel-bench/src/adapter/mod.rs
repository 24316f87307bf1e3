//! The adapter contract every spreadsheet-library binding implements.
//!
//! The surface is split by capability:
//!
//! - [`AdapterMeta`]: identity, capability flags and file-format restrictions;
//! - [`ExcelReader`]: open a workbook and read cells, formats and Tier 2/3 structures;
//! - [`ExcelWriter`]: build a workbook and save it.
//!
//! [`ExcelAdapter`] is blanket-implemented for anything with both halves. Bindings that only
//! implement one half opt into [`ReadOnlyAdapter`] or [`WriteOnlyAdapter`], which provide the
//! other half with methods that fail loudly with a contract-violation error. The runner checks
//! [`AdapterMeta::can_read`] / [`AdapterMeta::can_write`] before dispatch, so those errors only
//! surface when the harness itself is wrong.

mod calamine_backend;
mod json;

use std::any::Any;
use std::fmt;
use std::path::Path;

use serde_json::Value;
use thiserror::Error;

use crate::model::{
    BorderInfo, Capability, CellFormat, CellValue, Diagnostic, DiagnosticCategory,
    DiagnosticLocation, DiagnosticSeverity, JsonMap, LibraryInfo,
};

pub use self::calamine_backend::CalamineAdapter;
pub use self::json::JsonWorkbookAdapter;

/// Errors raised by adapters.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("{name} is read-only")]
    ReadOnly { name: String },
    #[error("{name} is write-only")]
    WriteOnly { name: String },
    #[error("not implemented: {0}")]
    NotImplemented(String),
    #[error("{0} is not supported")]
    Unsupported(String),
    #[error("workbook handle does not belong to this adapter")]
    InvalidHandle,
    #[error("invalid cell address '{0}'")]
    InvalidAddress(String),
    #[error("sheet '{0}' not found")]
    MissingSheet(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("failed to parse workbook: {0}")]
    Parse(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Library(String),
}

impl AdapterError {
    /// Stable variant name, used for `Exception: {kind}` notes.
    pub fn kind(&self) -> &'static str {
        match self {
            AdapterError::ReadOnly { .. } => "ReadOnly",
            AdapterError::WriteOnly { .. } => "WriteOnly",
            AdapterError::NotImplemented(_) => "NotImplemented",
            AdapterError::Unsupported(_) => "Unsupported",
            AdapterError::InvalidHandle => "InvalidHandle",
            AdapterError::InvalidAddress(_) => "InvalidAddress",
            AdapterError::MissingSheet(_) => "MissingSheet",
            AdapterError::InvalidInput(_) => "InvalidInput",
            AdapterError::Parse(_) => "Parse",
            AdapterError::Io(_) => "Io",
            AdapterError::Json(_) => "Json",
            AdapterError::Library(_) => "Library",
        }
    }

    /// A call into the half of the contract the adapter does not implement.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            AdapterError::ReadOnly { .. } | AdapterError::WriteOnly { .. }
        )
    }

    /// `"{kind}: {message}"`, the form recorded in `actual["error"]`.
    pub fn describe(&self) -> String {
        format!("{}: {}", self.kind(), self)
    }
}

/// Opaque workbook state owned by exactly one test unit.
pub struct WorkbookHandle {
    inner: Box<dyn Any>,
}

impl WorkbookHandle {
    pub fn new<T: Any>(state: T) -> Self {
        Self {
            inner: Box::new(state),
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Result<&T, AdapterError> {
        self.inner
            .downcast_ref::<T>()
            .ok_or(AdapterError::InvalidHandle)
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Result<&mut T, AdapterError> {
        self.inner
            .downcast_mut::<T>()
            .ok_or(AdapterError::InvalidHandle)
    }

    pub fn into_inner<T: Any>(self) -> Result<T, AdapterError> {
        self.inner
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| AdapterError::InvalidHandle)
    }
}

impl fmt::Debug for WorkbookHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkbookHandle").finish_non_exhaustive()
    }
}

pub type AdapterResult<T> = Result<T, AdapterError>;

/// Identity, capabilities and diagnostics shared by both halves of the contract.
pub trait AdapterMeta {
    fn info(&self) -> LibraryInfo;

    fn name(&self) -> String {
        self.info().name
    }

    fn can_read(&self) -> bool {
        self.info().capabilities.contains(&Capability::Read)
    }

    fn can_write(&self) -> bool {
        self.info().capabilities.contains(&Capability::Write)
    }

    /// Extension (with leading dot) of files produced by `save_workbook`.
    fn output_extension(&self) -> &'static str {
        ".xlsx"
    }

    /// Extensions (lower-case, with leading dot) `open_workbook` understands.
    fn supported_read_extensions(&self) -> &'static [&'static str] {
        &[".xlsx"]
    }

    /// Whether `open_workbook` understands `format` (`xlsx`, `.XLS`, ...).
    fn supports_read_format(&self, format: &str) -> bool {
        let format = format.trim_start_matches('.');
        self.supported_read_extensions()
            .iter()
            .any(|supported| supported.trim_start_matches('.').eq_ignore_ascii_case(format))
    }

    /// Convert an adapter error into a structured diagnostic.
    fn map_error_to_diagnostic(
        &self,
        error: &AdapterError,
        location: DiagnosticLocation,
        probable_cause: Option<String>,
    ) -> Diagnostic {
        let category = infer_diagnostic_category(error);
        let severity = if category == DiagnosticCategory::UnsupportedFeature {
            DiagnosticSeverity::Warning
        } else {
            DiagnosticSeverity::Error
        };
        Diagnostic {
            category,
            severity,
            location,
            adapter_message: error.describe(),
            probable_cause,
        }
    }

    fn build_mismatch_diagnostic(
        &self,
        location: DiagnosticLocation,
        expected: &JsonMap,
        actual: &JsonMap,
    ) -> Diagnostic {
        Diagnostic {
            category: DiagnosticCategory::DataMismatch,
            severity: DiagnosticSeverity::Error,
            location,
            adapter_message: format!(
                "Expected values did not match actual values: expected={}, actual={}",
                Value::Object(expected.clone()),
                Value::Object(actual.clone())
            ),
            probable_cause: Some(
                "Adapter returned a value that differs from benchmark expectations.".to_string(),
            ),
        }
    }
}

/// Lower-cased extension with its leading dot, or `""`.
pub fn path_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_ascii_lowercase()))
        .unwrap_or_default()
}

fn infer_diagnostic_category(error: &AdapterError) -> DiagnosticCategory {
    let message = error.to_string().to_ascii_lowercase();
    match error {
        AdapterError::NotImplemented(_) | AdapterError::Unsupported(_) => {
            DiagnosticCategory::UnsupportedFeature
        }
        AdapterError::ReadOnly { .. } | AdapterError::WriteOnly { .. } => {
            DiagnosticCategory::UnsupportedFeature
        }
        AdapterError::InvalidAddress(_)
        | AdapterError::MissingSheet(_)
        | AdapterError::InvalidInput(_) => DiagnosticCategory::InvalidInput,
        AdapterError::Parse(_) | AdapterError::Json(_) => DiagnosticCategory::Parse,
        AdapterError::Io(_) => {
            if ["zip", "format", "corrupt"]
                .iter()
                .any(|needle| message.contains(needle))
            {
                DiagnosticCategory::Parse
            } else {
                DiagnosticCategory::FileIo
            }
        }
        AdapterError::InvalidHandle | AdapterError::Library(_) => {
            if message.contains("not supported") || message.contains("unsupported") {
                DiagnosticCategory::UnsupportedFeature
            } else if message.contains("parse") {
                DiagnosticCategory::Parse
            } else {
                DiagnosticCategory::Internal
            }
        }
    }
}

/// The read half of the contract.
pub trait ExcelReader: AdapterMeta {
    fn open_workbook(&self, path: &Path) -> AdapterResult<WorkbookHandle>;

    /// Release everything `open_workbook` allocated.
    fn close_workbook(&self, workbook: WorkbookHandle) -> AdapterResult<()>;

    fn get_sheet_names(&self, workbook: &WorkbookHandle) -> AdapterResult<Vec<String>>;

    fn read_cell_value(
        &self,
        workbook: &WorkbookHandle,
        sheet: &str,
        cell: &str,
    ) -> AdapterResult<CellValue>;

    fn read_cell_format(
        &self,
        workbook: &WorkbookHandle,
        sheet: &str,
        cell: &str,
    ) -> AdapterResult<CellFormat>;

    fn read_cell_border(
        &self,
        workbook: &WorkbookHandle,
        sheet: &str,
        cell: &str,
    ) -> AdapterResult<BorderInfo>;

    fn read_row_height(
        &self,
        workbook: &WorkbookHandle,
        sheet: &str,
        row: u32,
    ) -> AdapterResult<Option<f64>>;

    fn read_column_width(
        &self,
        workbook: &WorkbookHandle,
        sheet: &str,
        column: &str,
    ) -> AdapterResult<Option<f64>>;

    fn read_merged_ranges(&self, workbook: &WorkbookHandle, sheet: &str)
        -> AdapterResult<Vec<String>>;

    fn read_conditional_formats(
        &self,
        workbook: &WorkbookHandle,
        sheet: &str,
    ) -> AdapterResult<Vec<JsonMap>>;

    fn read_data_validations(
        &self,
        workbook: &WorkbookHandle,
        sheet: &str,
    ) -> AdapterResult<Vec<JsonMap>>;

    fn read_hyperlinks(&self, workbook: &WorkbookHandle, sheet: &str)
        -> AdapterResult<Vec<JsonMap>>;

    fn read_images(&self, workbook: &WorkbookHandle, sheet: &str) -> AdapterResult<Vec<JsonMap>>;

    fn read_pivot_tables(
        &self,
        workbook: &WorkbookHandle,
        sheet: &str,
    ) -> AdapterResult<Vec<JsonMap>>;

    fn read_comments(&self, workbook: &WorkbookHandle, sheet: &str) -> AdapterResult<Vec<JsonMap>>;

    fn read_freeze_panes(&self, workbook: &WorkbookHandle, sheet: &str) -> AdapterResult<JsonMap>;

    /// Tier 3. Adapters opt in by overriding.
    fn read_named_ranges(
        &self,
        _workbook: &WorkbookHandle,
        _sheet: &str,
    ) -> AdapterResult<Vec<JsonMap>> {
        Ok(Vec::new())
    }

    /// Tier 3. Adapters opt in by overriding.
    fn read_tables(&self, _workbook: &WorkbookHandle, _sheet: &str) -> AdapterResult<Vec<JsonMap>> {
        Ok(Vec::new())
    }
}

/// The write half of the contract.
///
/// Tier 2 payloads are passed as the fixture's expected dict (e.g. `{"cf_rule": {...}}`);
/// adapters unwrap them with [`unwrap_payload`].
pub trait ExcelWriter: AdapterMeta {
    fn create_workbook(&self) -> AdapterResult<WorkbookHandle>;

    fn add_sheet(&self, workbook: &mut WorkbookHandle, name: &str) -> AdapterResult<()>;

    fn write_cell_value(
        &self,
        workbook: &mut WorkbookHandle,
        sheet: &str,
        cell: &str,
        value: &CellValue,
    ) -> AdapterResult<()>;

    fn write_cell_format(
        &self,
        workbook: &mut WorkbookHandle,
        sheet: &str,
        cell: &str,
        format: &CellFormat,
    ) -> AdapterResult<()>;

    fn write_cell_border(
        &self,
        workbook: &mut WorkbookHandle,
        sheet: &str,
        cell: &str,
        border: &BorderInfo,
    ) -> AdapterResult<()>;

    fn set_row_height(
        &self,
        workbook: &mut WorkbookHandle,
        sheet: &str,
        row: u32,
        height: f64,
    ) -> AdapterResult<()>;

    fn set_column_width(
        &self,
        workbook: &mut WorkbookHandle,
        sheet: &str,
        column: &str,
        width: f64,
    ) -> AdapterResult<()>;

    fn merge_cells(&self, workbook: &mut WorkbookHandle, sheet: &str, range: &str)
        -> AdapterResult<()>;

    fn add_conditional_format(
        &self,
        workbook: &mut WorkbookHandle,
        sheet: &str,
        rule: &JsonMap,
    ) -> AdapterResult<()>;

    fn add_data_validation(
        &self,
        workbook: &mut WorkbookHandle,
        sheet: &str,
        validation: &JsonMap,
    ) -> AdapterResult<()>;

    fn add_hyperlink(
        &self,
        workbook: &mut WorkbookHandle,
        sheet: &str,
        link: &JsonMap,
    ) -> AdapterResult<()>;

    fn add_image(&self, workbook: &mut WorkbookHandle, sheet: &str, image: &JsonMap)
        -> AdapterResult<()>;

    fn add_pivot_table(
        &self,
        workbook: &mut WorkbookHandle,
        sheet: &str,
        pivot: &JsonMap,
    ) -> AdapterResult<()>;

    fn add_comment(
        &self,
        workbook: &mut WorkbookHandle,
        sheet: &str,
        comment: &JsonMap,
    ) -> AdapterResult<()>;

    fn set_freeze_panes(
        &self,
        workbook: &mut WorkbookHandle,
        sheet: &str,
        settings: &JsonMap,
    ) -> AdapterResult<()>;

    fn save_workbook(&self, workbook: &mut WorkbookHandle, path: &Path) -> AdapterResult<()>;

    /// Tier 3. No-op unless overridden.
    fn add_named_range(
        &self,
        _workbook: &mut WorkbookHandle,
        _sheet: &str,
        _named_range: &JsonMap,
    ) -> AdapterResult<()> {
        Ok(())
    }

    /// Tier 3. No-op unless overridden.
    fn add_table(
        &self,
        _workbook: &mut WorkbookHandle,
        _sheet: &str,
        _table: &JsonMap,
    ) -> AdapterResult<()> {
        Ok(())
    }
}

/// A binding with both halves of the contract.
pub trait ExcelAdapter: ExcelReader + ExcelWriter {
    fn as_reader(&self) -> &dyn ExcelReader;
    fn as_writer(&self) -> &dyn ExcelWriter;
}

impl<T: ExcelReader + ExcelWriter> ExcelAdapter for T {
    fn as_reader(&self) -> &dyn ExcelReader {
        self
    }

    fn as_writer(&self) -> &dyn ExcelWriter {
        self
    }
}

/// `payload[key]` when it is an object, else `payload` itself.
///
/// Fixtures nest Tier 2 payloads under a feature key (`{"hyperlink": {...}}`) while some
/// callers pass the flat object.
pub fn unwrap_payload<'a>(payload: &'a JsonMap, key: &str) -> &'a JsonMap {
    match payload.get(key) {
        Some(Value::Object(inner)) => inner,
        _ => payload,
    }
}

/// Marker for read-only bindings. The write half is provided and always fails with
/// [`AdapterError::ReadOnly`].
pub trait ReadOnlyAdapter: ExcelReader {}

/// Marker for write-only bindings. The read half is provided and always fails with
/// [`AdapterError::WriteOnly`], except `close_workbook`, which is a no-op.
pub trait WriteOnlyAdapter: ExcelWriter {}

impl<T: ReadOnlyAdapter> ExcelWriter for T {
    fn create_workbook(&self) -> AdapterResult<WorkbookHandle> {
        Err(read_only(self))
    }

    fn add_sheet(&self, _: &mut WorkbookHandle, _: &str) -> AdapterResult<()> {
        Err(read_only(self))
    }

    fn write_cell_value(
        &self,
        _: &mut WorkbookHandle,
        _: &str,
        _: &str,
        _: &CellValue,
    ) -> AdapterResult<()> {
        Err(read_only(self))
    }

    fn write_cell_format(
        &self,
        _: &mut WorkbookHandle,
        _: &str,
        _: &str,
        _: &CellFormat,
    ) -> AdapterResult<()> {
        Err(read_only(self))
    }

    fn write_cell_border(
        &self,
        _: &mut WorkbookHandle,
        _: &str,
        _: &str,
        _: &BorderInfo,
    ) -> AdapterResult<()> {
        Err(read_only(self))
    }

    fn set_row_height(&self, _: &mut WorkbookHandle, _: &str, _: u32, _: f64) -> AdapterResult<()> {
        Err(read_only(self))
    }

    fn set_column_width(
        &self,
        _: &mut WorkbookHandle,
        _: &str,
        _: &str,
        _: f64,
    ) -> AdapterResult<()> {
        Err(read_only(self))
    }

    fn merge_cells(&self, _: &mut WorkbookHandle, _: &str, _: &str) -> AdapterResult<()> {
        Err(read_only(self))
    }

    fn add_conditional_format(
        &self,
        _: &mut WorkbookHandle,
        _: &str,
        _: &JsonMap,
    ) -> AdapterResult<()> {
        Err(read_only(self))
    }

    fn add_data_validation(
        &self,
        _: &mut WorkbookHandle,
        _: &str,
        _: &JsonMap,
    ) -> AdapterResult<()> {
        Err(read_only(self))
    }

    fn add_hyperlink(&self, _: &mut WorkbookHandle, _: &str, _: &JsonMap) -> AdapterResult<()> {
        Err(read_only(self))
    }

    fn add_image(&self, _: &mut WorkbookHandle, _: &str, _: &JsonMap) -> AdapterResult<()> {
        Err(read_only(self))
    }

    fn add_pivot_table(&self, _: &mut WorkbookHandle, _: &str, _: &JsonMap) -> AdapterResult<()> {
        Err(read_only(self))
    }

    fn add_comment(&self, _: &mut WorkbookHandle, _: &str, _: &JsonMap) -> AdapterResult<()> {
        Err(read_only(self))
    }

    fn set_freeze_panes(&self, _: &mut WorkbookHandle, _: &str, _: &JsonMap) -> AdapterResult<()> {
        Err(read_only(self))
    }

    fn save_workbook(&self, _: &mut WorkbookHandle, _: &Path) -> AdapterResult<()> {
        Err(read_only(self))
    }

    fn add_named_range(&self, _: &mut WorkbookHandle, _: &str, _: &JsonMap) -> AdapterResult<()> {
        Err(read_only(self))
    }

    fn add_table(&self, _: &mut WorkbookHandle, _: &str, _: &JsonMap) -> AdapterResult<()> {
        Err(read_only(self))
    }
}

impl<T: WriteOnlyAdapter> ExcelReader for T {
    fn open_workbook(&self, _: &Path) -> AdapterResult<WorkbookHandle> {
        Err(write_only(self))
    }

    fn close_workbook(&self, _: WorkbookHandle) -> AdapterResult<()> {
        Ok(())
    }

    fn get_sheet_names(&self, _: &WorkbookHandle) -> AdapterResult<Vec<String>> {
        Err(write_only(self))
    }

    fn read_cell_value(&self, _: &WorkbookHandle, _: &str, _: &str) -> AdapterResult<CellValue> {
        Err(write_only(self))
    }

    fn read_cell_format(&self, _: &WorkbookHandle, _: &str, _: &str) -> AdapterResult<CellFormat> {
        Err(write_only(self))
    }

    fn read_cell_border(&self, _: &WorkbookHandle, _: &str, _: &str) -> AdapterResult<BorderInfo> {
        Err(write_only(self))
    }

    fn read_row_height(&self, _: &WorkbookHandle, _: &str, _: u32) -> AdapterResult<Option<f64>> {
        Err(write_only(self))
    }

    fn read_column_width(
        &self,
        _: &WorkbookHandle,
        _: &str,
        _: &str,
    ) -> AdapterResult<Option<f64>> {
        Err(write_only(self))
    }

    fn read_merged_ranges(&self, _: &WorkbookHandle, _: &str) -> AdapterResult<Vec<String>> {
        Err(write_only(self))
    }

    fn read_conditional_formats(&self, _: &WorkbookHandle, _: &str) -> AdapterResult<Vec<JsonMap>> {
        Err(write_only(self))
    }

    fn read_data_validations(&self, _: &WorkbookHandle, _: &str) -> AdapterResult<Vec<JsonMap>> {
        Err(write_only(self))
    }

    fn read_hyperlinks(&self, _: &WorkbookHandle, _: &str) -> AdapterResult<Vec<JsonMap>> {
        Err(write_only(self))
    }

    fn read_images(&self, _: &WorkbookHandle, _: &str) -> AdapterResult<Vec<JsonMap>> {
        Err(write_only(self))
    }

    fn read_pivot_tables(&self, _: &WorkbookHandle, _: &str) -> AdapterResult<Vec<JsonMap>> {
        Err(write_only(self))
    }

    fn read_comments(&self, _: &WorkbookHandle, _: &str) -> AdapterResult<Vec<JsonMap>> {
        Err(write_only(self))
    }

    fn read_freeze_panes(&self, _: &WorkbookHandle, _: &str) -> AdapterResult<JsonMap> {
        Err(write_only(self))
    }

    fn read_named_ranges(&self, _: &WorkbookHandle, _: &str) -> AdapterResult<Vec<JsonMap>> {
        Err(write_only(self))
    }

    fn read_tables(&self, _: &WorkbookHandle, _: &str) -> AdapterResult<Vec<JsonMap>> {
        Err(write_only(self))
    }
}

fn read_only<T: AdapterMeta + ?Sized>(adapter: &T) -> AdapterError {
    AdapterError::ReadOnly {
        name: adapter.name(),
    }
}

fn write_only<T: AdapterMeta + ?Sized>(adapter: &T) -> AdapterError {
    AdapterError::WriteOnly {
        name: adapter.name(),
    }
}
