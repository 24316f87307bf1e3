//! Library-agnostic data model shared by adapters, the feature tables and the runner.
//!
//! Every optional field distinguishes "not reported" (`None`) from an explicit value. The
//! comparator relies on that distinction, so adapters should only fill the fields they
//! actually read.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A JSON object, the shape of every `expected`/`actual` payload.
pub type JsonMap = serde_json::Map<String, Value>;

/// Format string for [`CellValue::Date`] payloads.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Format string for [`CellValue::DateTime`] payloads.
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    Blank,
    String,
    Number,
    Boolean,
    Date,
    DateTime,
    Error,
    Formula,
}

impl CellType {
    pub fn as_str(self) -> &'static str {
        match self {
            CellType::Blank => "blank",
            CellType::String => "string",
            CellType::Number => "number",
            CellType::Boolean => "boolean",
            CellType::Date => "date",
            CellType::DateTime => "datetime",
            CellType::Error => "error",
            CellType::Formula => "formula",
        }
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cell's semantic value.
///
/// Constructed fresh on every read and every write preparation; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CellValue {
    Blank,
    String(String),
    Number(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// Error literal such as `#DIV/0!`.
    Error(String),
    /// Formula text (always `=`-prefixed) plus the cached result, if the source had one.
    Formula {
        formula: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cached: Option<Value>,
    },
}

impl CellValue {
    /// Build a formula value, adding the leading `=` when the caller omitted it.
    pub fn formula(text: impl Into<String>, cached: Option<Value>) -> Self {
        let text = text.into();
        let formula = if text.starts_with('=') {
            text
        } else {
            format!("={text}")
        };
        CellValue::Formula { formula, cached }
    }

    pub fn cell_type(&self) -> CellType {
        match self {
            CellValue::Blank => CellType::Blank,
            CellValue::String(_) => CellType::String,
            CellValue::Number(_) => CellType::Number,
            CellValue::Boolean(_) => CellType::Boolean,
            CellValue::Date(_) => CellType::Date,
            CellValue::DateTime(_) => CellType::DateTime,
            CellValue::Error(_) => CellType::Error,
            CellValue::Formula { .. } => CellType::Formula,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, CellValue::Blank)
    }

    /// The formula text for formula cells.
    pub fn formula_text(&self) -> Option<&str> {
        match self {
            CellValue::Formula { formula, .. } => Some(formula),
            _ => None,
        }
    }

    /// JSON rendering of the payload: dates as ISO strings, formulas as their cached
    /// result (or the formula text when nothing was cached), blanks as `None`.
    pub fn to_json(&self) -> Option<Value> {
        match self {
            CellValue::Blank => None,
            CellValue::String(s) | CellValue::Error(s) => Some(Value::String(s.clone())),
            CellValue::Number(n) => Some(number_to_json(*n)),
            CellValue::Boolean(b) => Some(Value::Bool(*b)),
            CellValue::Date(d) => Some(Value::String(d.format(DATE_FORMAT).to_string())),
            CellValue::DateTime(dt) => Some(Value::String(dt.format(DATETIME_FORMAT).to_string())),
            CellValue::Formula { formula, cached } => Some(
                cached
                    .clone()
                    .unwrap_or_else(|| Value::String(formula.clone())),
            ),
        }
    }
}

/// Integral floats are rendered as JSON integers so `42.0` compares and prints as `42`.
pub(crate) fn number_to_json(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Underline {
    Single,
    Double,
    SingleAccounting,
    DoubleAccounting,
}

impl Underline {
    pub fn as_str(self) -> &'static str {
        match self {
            Underline::Single => "single",
            Underline::Double => "double",
            Underline::SingleAccounting => "singleAccounting",
            Underline::DoubleAccounting => "doubleAccounting",
        }
    }
}

impl FromStr for Underline {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(Underline::Single),
            "double" => Ok(Underline::Double),
            "singleAccounting" => Ok(Underline::SingleAccounting),
            "doubleAccounting" => Ok(Underline::DoubleAccounting),
            other => Err(format!("unknown underline style '{other}'")),
        }
    }
}

/// Flat bag of optional style attributes.
///
/// `None` means "not specified by this read", not "unset in the file".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellFormat {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub underline: Option<Underline>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strikethrough: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bg_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h_align: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v_align: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrap: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indent: Option<u32>,
}

impl CellFormat {
    pub fn is_empty(&self) -> bool {
        *self == CellFormat::default()
    }

    /// Overlay every field `other` specifies onto `self`.
    pub fn merge(&mut self, other: &CellFormat) {
        macro_rules! overlay {
            ($($field:ident),*) => {
                $(if other.$field.is_some() {
                    self.$field = other.$field.clone();
                })*
            };
        }
        overlay!(
            bold,
            italic,
            underline,
            strikethrough,
            font_name,
            font_size,
            font_color,
            bg_color,
            number_format,
            h_align,
            v_align,
            wrap,
            rotation,
            indent
        );
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BorderStyle {
    #[default]
    None,
    Thin,
    Medium,
    Thick,
    Double,
    Dashed,
    Dotted,
    Hair,
    MediumDashed,
    DashDot,
    MediumDashDot,
    DashDotDot,
    MediumDashDotDot,
    SlantDashDot,
}

impl BorderStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            BorderStyle::None => "none",
            BorderStyle::Thin => "thin",
            BorderStyle::Medium => "medium",
            BorderStyle::Thick => "thick",
            BorderStyle::Double => "double",
            BorderStyle::Dashed => "dashed",
            BorderStyle::Dotted => "dotted",
            BorderStyle::Hair => "hair",
            BorderStyle::MediumDashed => "mediumDashed",
            BorderStyle::DashDot => "dashDot",
            BorderStyle::MediumDashDot => "mediumDashDot",
            BorderStyle::DashDotDot => "dashDotDot",
            BorderStyle::MediumDashDotDot => "mediumDashDotDot",
            BorderStyle::SlantDashDot => "slantDashDot",
        }
    }
}

impl FromStr for BorderStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "none" => BorderStyle::None,
            "thin" => BorderStyle::Thin,
            "medium" => BorderStyle::Medium,
            "thick" => BorderStyle::Thick,
            "double" => BorderStyle::Double,
            "dashed" => BorderStyle::Dashed,
            "dotted" => BorderStyle::Dotted,
            "hair" => BorderStyle::Hair,
            "mediumDashed" => BorderStyle::MediumDashed,
            "dashDot" => BorderStyle::DashDot,
            "mediumDashDot" => BorderStyle::MediumDashDot,
            "dashDotDot" => BorderStyle::DashDotDot,
            "mediumDashDotDot" => BorderStyle::MediumDashDotDot,
            "slantDashDot" => BorderStyle::SlantDashDot,
            other => return Err(format!("unknown border style '{other}'")),
        })
    }
}

impl fmt::Display for BorderStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const DEFAULT_BORDER_COLOR: &str = "#000000";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorderEdge {
    #[serde(default)]
    pub style: BorderStyle,
    #[serde(default = "default_border_color")]
    pub color: String,
}

fn default_border_color() -> String {
    DEFAULT_BORDER_COLOR.to_string()
}

impl BorderEdge {
    pub fn new(style: BorderStyle, color: impl Into<String>) -> Self {
        Self {
            style,
            color: color.into(),
        }
    }

    pub fn is_none(&self) -> bool {
        self.style == BorderStyle::None
    }
}

impl Default for BorderEdge {
    fn default() -> Self {
        Self::new(BorderStyle::None, DEFAULT_BORDER_COLOR)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BorderInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<BorderEdge>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bottom: Option<BorderEdge>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left: Option<BorderEdge>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<BorderEdge>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagonal_up: Option<BorderEdge>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagonal_down: Option<BorderEdge>,
}

impl BorderInfo {
    /// The four perimeter edges in `top, bottom, left, right` order.
    pub fn perimeter(&self) -> [(&'static str, Option<&BorderEdge>); 4] {
        [
            ("top", self.top.as_ref()),
            ("bottom", self.bottom.as_ref()),
            ("left", self.left.as_ref()),
            ("right", self.right.as_ref()),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Read,
    Write,
}

/// Identity and capability declaration of an adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryInfo {
    pub name: String,
    pub version: String,
    pub language: String,
    pub capabilities: BTreeSet<Capability>,
}

impl LibraryInfo {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        language: impl Into<String>,
        capabilities: impl IntoIterator<Item = Capability>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            language: language.into(),
            capabilities: capabilities.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    #[default]
    Basic,
    Edge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Read,
    Write,
}

impl OperationType {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationType::Read => "read",
            OperationType::Write => "write",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fixture expectation. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub label: String,
    pub row: u32,
    pub expected: JsonMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell: Option<String>,
    #[serde(default)]
    pub importance: Importance,
}

impl TestCase {
    pub fn new(id: impl Into<String>, row: u32, expected: JsonMap) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            row,
            expected,
            sheet: None,
            cell: None,
            importance: Importance::Basic,
        }
    }

    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    pub fn with_cell(mut self, cell: impl Into<String>) -> Self {
        self.cell = Some(cell.into());
        self
    }

    pub fn with_importance(mut self, importance: Importance) -> Self {
        self.importance = importance;
        self
    }

    /// Target cell: the explicit override, else column `B` of the case's row.
    pub fn cell_ref(&self) -> String {
        match &self.cell {
            Some(cell) => cell.clone(),
            None => format!("B{}", self.row),
        }
    }
}

/// A fixture file and the cases it carries, in manifest order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestFile {
    pub path: String,
    pub feature: String,
    pub tier: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_format: Option<String>,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCategory {
    FileIo,
    Parse,
    InvalidInput,
    UnsupportedFeature,
    DataMismatch,
    Internal,
}

impl DiagnosticCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticCategory::FileIo => "FILE_IO",
            DiagnosticCategory::Parse => "PARSE",
            DiagnosticCategory::InvalidInput => "INVALID_INPUT",
            DiagnosticCategory::UnsupportedFeature => "UNSUPPORTED_FEATURE",
            DiagnosticCategory::DataMismatch => "DATA_MISMATCH",
            DiagnosticCategory::Internal => "INTERNAL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Info,
}

/// Where in the run a diagnostic was raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticLocation {
    pub feature: String,
    pub operation: OperationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_case_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell: Option<String>,
}

impl DiagnosticLocation {
    pub fn new(feature: impl Into<String>, operation: OperationType) -> Self {
        Self {
            feature: feature.into(),
            operation,
            test_case_id: None,
            sheet: None,
            cell: None,
        }
    }

    pub fn for_case(mut self, case: &TestCase, sheet: &str) -> Self {
        self.test_case_id = Some(case.id.clone());
        self.sheet = Some(sheet.to_string());
        self.cell = Some(case.cell_ref());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub category: DiagnosticCategory,
    pub severity: DiagnosticSeverity,
    pub location: DiagnosticLocation,
    pub adapter_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probable_cause: Option<String>,
}

/// Verdict for one (test case, operation, adapter).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub test_case_id: String,
    pub operation: OperationType,
    pub passed: bool,
    pub expected: JsonMap,
    pub actual: JsonMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub importance: Importance,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl TestResult {
    /// A failed result with `actual = {"error": message}`.
    pub fn failed(
        case: &TestCase,
        operation: OperationType,
        message: impl Into<String>,
        notes: impl Into<String>,
    ) -> Self {
        let mut actual = JsonMap::new();
        actual.insert("error".to_string(), Value::String(message.into()));
        Self {
            test_case_id: case.id.clone(),
            operation,
            passed: false,
            expected: case.expected.clone(),
            actual,
            notes: Some(notes.into()),
            importance: case.importance,
            diagnostics: Vec::new(),
        }
    }

    pub fn with_diagnostic(mut self, diagnostic: Diagnostic) -> Self {
        self.diagnostics.push(diagnostic);
        self
    }
}

/// All results for one (feature, adapter) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScore {
    pub feature: String,
    pub library: String,
    pub read_score: Option<u8>,
    pub write_score: Option<u8>,
    pub test_results: Vec<TestResult>,
    pub notes: Option<String>,
}

impl FeatureScore {
    pub fn results_for(&self, operation: OperationType) -> impl Iterator<Item = &TestResult> {
        self.test_results
            .iter()
            .filter(move |result| result.operation == operation)
    }
}

pub const BENCHMARK_VERSION: &str = "0.1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkMetadata {
    pub benchmark_version: String,
    pub run_date: DateTime<Utc>,
    pub excel_version: String,
    pub platform: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResults {
    pub metadata: BenchmarkMetadata,
    pub libraries: std::collections::BTreeMap<String, LibraryInfo>,
    pub scores: Vec<FeatureScore>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn formula_constructor_adds_equals_prefix() {
        assert_eq!(
            CellValue::formula("SUM(A1:A3)", None).formula_text(),
            Some("=SUM(A1:A3)")
        );
        assert_eq!(
            CellValue::formula("=1+1", Some(json!(2))).formula_text(),
            Some("=1+1")
        );
    }

    #[test]
    fn blank_has_no_json_payload() {
        assert_eq!(CellValue::Blank.to_json(), None);
        assert_eq!(CellValue::Blank.cell_type().as_str(), "blank");
    }

    #[test]
    fn json_rendering_of_dates_and_numbers() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 4).unwrap();
        let datetime = date.and_hms_opt(10, 30, 45).unwrap();
        assert_eq!(CellValue::Date(date).to_json(), Some(json!("2026-02-04")));
        assert_eq!(
            CellValue::DateTime(datetime).to_json(),
            Some(json!("2026-02-04T10:30:45"))
        );
        assert_eq!(CellValue::Number(42.0).to_json(), Some(json!(42)));
        assert_eq!(CellValue::Number(3.5).to_json(), Some(json!(3.5)));
    }

    #[test]
    fn cell_value_serde_is_tagged_by_type() {
        let value = CellValue::String("Hello".to_string());
        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            json!({"type": "string", "value": "Hello"})
        );
        let blank: CellValue = serde_json::from_value(json!({"type": "blank"})).unwrap();
        assert_eq!(blank, CellValue::Blank);
    }

    #[test]
    fn cell_ref_defaults_to_column_b() {
        let case = TestCase::new("t1", 7, JsonMap::new());
        assert_eq!(case.cell_ref(), "B7");
        assert_eq!(case.with_cell("D3").cell_ref(), "D3");
    }

    #[test]
    fn test_case_deserializes_with_defaults() {
        let case: TestCase = serde_json::from_value(json!({
            "id": "string_simple",
            "label": "String - simple",
            "row": 2,
            "expected": {"type": "string", "value": "Hello"}
        }))
        .unwrap();
        assert_eq!(case.importance, Importance::Basic);
        assert_eq!(case.sheet, None);
        assert_eq!(case.cell, None);
    }

    #[test]
    fn border_style_names_round_trip_through_from_str() {
        for style in [
            BorderStyle::None,
            BorderStyle::MediumDashDotDot,
            BorderStyle::SlantDashDot,
        ] {
            assert_eq!(style.as_str().parse::<BorderStyle>(), Ok(style));
        }
        assert!("wavy".parse::<BorderStyle>().is_err());
    }

    #[test]
    fn format_merge_only_overlays_specified_fields() {
        let mut base = CellFormat {
            bold: Some(true),
            font_name: Some("Arial".to_string()),
            ..CellFormat::default()
        };
        base.merge(&CellFormat {
            font_name: Some("Calibri".to_string()),
            bg_color: Some("#FF0000".to_string()),
            ..CellFormat::default()
        });
        assert_eq!(base.bold, Some(true));
        assert_eq!(base.font_name.as_deref(), Some("Calibri"));
        assert_eq!(base.bg_color.as_deref(), Some("#FF0000"));
    }
}
