//! The closed set of benchmarked features and their read/write/normalize strategies.
//!
//! Every [`Feature`] resolves to one static [`FeatureSpec`] row. The runner never matches on
//! feature names itself; it asks the strategy to read, write or normalize.

pub mod expected;
pub mod read;
pub mod write;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adapter::{AdapterResult, ExcelReader, ExcelWriter, WorkbookHandle};
use crate::model::{JsonMap, OperationType, TestCase};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown feature: {0}")]
pub struct UnknownFeature(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    CellValues,
    Formulas,
    TextFormatting,
    BackgroundColors,
    NumberFormats,
    Alignment,
    Borders,
    Dimensions,
    MultipleSheets,
    MergedCells,
    ConditionalFormatting,
    DataValidation,
    Hyperlinks,
    Images,
    PivotTables,
    Comments,
    FreezePanes,
    NamedRanges,
    Tables,
}

impl Feature {
    pub const ALL: [Feature; 19] = [
        Feature::CellValues,
        Feature::Formulas,
        Feature::TextFormatting,
        Feature::BackgroundColors,
        Feature::NumberFormats,
        Feature::Alignment,
        Feature::Borders,
        Feature::Dimensions,
        Feature::MultipleSheets,
        Feature::MergedCells,
        Feature::ConditionalFormatting,
        Feature::DataValidation,
        Feature::Hyperlinks,
        Feature::Images,
        Feature::PivotTables,
        Feature::Comments,
        Feature::FreezePanes,
        Feature::NamedRanges,
        Feature::Tables,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Feature::CellValues => "cell_values",
            Feature::Formulas => "formulas",
            Feature::TextFormatting => "text_formatting",
            Feature::BackgroundColors => "background_colors",
            Feature::NumberFormats => "number_formats",
            Feature::Alignment => "alignment",
            Feature::Borders => "borders",
            Feature::Dimensions => "dimensions",
            Feature::MultipleSheets => "multiple_sheets",
            Feature::MergedCells => "merged_cells",
            Feature::ConditionalFormatting => "conditional_formatting",
            Feature::DataValidation => "data_validation",
            Feature::Hyperlinks => "hyperlinks",
            Feature::Images => "images",
            Feature::PivotTables => "pivot_tables",
            Feature::Comments => "comments",
            Feature::FreezePanes => "freeze_panes",
            Feature::NamedRanges => "named_ranges",
            Feature::Tables => "tables",
        }
    }

    /// Complexity grouping; manifest entries must agree with it.
    pub fn tier(self) -> u8 {
        match self {
            Feature::CellValues
            | Feature::Formulas
            | Feature::TextFormatting
            | Feature::BackgroundColors
            | Feature::NumberFormats
            | Feature::Alignment
            | Feature::Borders
            | Feature::Dimensions
            | Feature::MultipleSheets => 1,
            Feature::MergedCells
            | Feature::ConditionalFormatting
            | Feature::DataValidation
            | Feature::Hyperlinks
            | Feature::Images
            | Feature::PivotTables
            | Feature::Comments
            | Feature::FreezePanes => 2,
            Feature::NamedRanges | Feature::Tables => 3,
        }
    }

    pub fn strategy(self) -> &'static dyn FeatureStrategy {
        // FEATURE_SPECS rows follow declaration order.
        &FEATURE_SPECS[self as usize]
    }
}

impl FromStr for Feature {
    type Err = UnknownFeature;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .into_iter()
            .find(|feature| feature.as_str() == s)
            .ok_or_else(|| UnknownFeature(s.to_string()))
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type ReadFn =
    fn(&dyn ExcelReader, &WorkbookHandle, &str, &TestCase) -> AdapterResult<JsonMap>;
pub type WriteFn =
    fn(&dyn ExcelWriter, &mut WorkbookHandle, &str, &str, &TestCase) -> AdapterResult<()>;
pub type ExpectedFn = fn(OperationType, &JsonMap) -> JsonMap;

/// How one feature is exercised.
pub trait FeatureStrategy: Sync {
    fn feature(&self) -> Feature;

    /// Project what the adapter reports for `case` into a dict comparable with `expected`.
    fn read(
        &self,
        adapter: &dyn ExcelReader,
        workbook: &WorkbookHandle,
        sheet: &str,
        case: &TestCase,
    ) -> AdapterResult<JsonMap>;

    /// Stage `case` into a workbook under construction.
    fn write(
        &self,
        adapter: &dyn ExcelWriter,
        workbook: &mut WorkbookHandle,
        sheet: &str,
        cell: &str,
        case: &TestCase,
    ) -> AdapterResult<()>;

    /// The expected dict as compared for `operation`.
    fn expected_for(&self, operation: OperationType, case: &TestCase) -> JsonMap;
}

pub struct FeatureSpec {
    pub feature: Feature,
    pub read: ReadFn,
    pub write: WriteFn,
    pub expected: ExpectedFn,
}

impl FeatureStrategy for FeatureSpec {
    fn feature(&self) -> Feature {
        self.feature
    }

    fn read(
        &self,
        adapter: &dyn ExcelReader,
        workbook: &WorkbookHandle,
        sheet: &str,
        case: &TestCase,
    ) -> AdapterResult<JsonMap> {
        (self.read)(adapter, workbook, sheet, case)
    }

    fn write(
        &self,
        adapter: &dyn ExcelWriter,
        workbook: &mut WorkbookHandle,
        sheet: &str,
        cell: &str,
        case: &TestCase,
    ) -> AdapterResult<()> {
        (self.write)(adapter, workbook, sheet, cell, case)
    }

    fn expected_for(&self, operation: OperationType, case: &TestCase) -> JsonMap {
        (self.expected)(operation, &case.expected)
    }
}

fn as_is(_: OperationType, expected: &JsonMap) -> JsonMap {
    expected.clone()
}

fn formula_expected(_: OperationType, expected: &JsonMap) -> JsonMap {
    expected::normalize_expected_formula(expected)
}

fn number_format_expected(_: OperationType, expected: &JsonMap) -> JsonMap {
    expected::normalize_expected_number_format(expected)
}

fn hyperlink_expected(_: OperationType, expected: &JsonMap) -> JsonMap {
    expected::normalize_expected_hyperlink(expected)
}

fn named_range_expected(_: OperationType, expected: &JsonMap) -> JsonMap {
    expected::normalize_expected_named_range(expected)
}

fn conditional_format_expected(operation: OperationType, expected: &JsonMap) -> JsonMap {
    match operation {
        OperationType::Read => expected.clone(),
        OperationType::Write => expected::strip_cf_priority(expected),
    }
}

fn read_cell_values(
    adapter: &dyn ExcelReader,
    workbook: &WorkbookHandle,
    sheet: &str,
    case: &TestCase,
) -> AdapterResult<JsonMap> {
    read::read_cell_value_actual(adapter, workbook, sheet, &case.cell_ref())
}

fn read_formulas(
    adapter: &dyn ExcelReader,
    workbook: &WorkbookHandle,
    sheet: &str,
    case: &TestCase,
) -> AdapterResult<JsonMap> {
    read::read_formula_actual(adapter, workbook, sheet, &case.cell_ref())
}

fn read_text_formatting(
    adapter: &dyn ExcelReader,
    workbook: &WorkbookHandle,
    sheet: &str,
    case: &TestCase,
) -> AdapterResult<JsonMap> {
    read::read_text_format_actual(adapter, workbook, sheet, &case.cell_ref())
}

fn read_background_colors(
    adapter: &dyn ExcelReader,
    workbook: &WorkbookHandle,
    sheet: &str,
    case: &TestCase,
) -> AdapterResult<JsonMap> {
    read::read_background_color_actual(adapter, workbook, sheet, &case.cell_ref())
}

fn read_number_formats(
    adapter: &dyn ExcelReader,
    workbook: &WorkbookHandle,
    sheet: &str,
    case: &TestCase,
) -> AdapterResult<JsonMap> {
    read::read_number_format_actual(adapter, workbook, sheet, &case.cell_ref())
}

fn read_alignment(
    adapter: &dyn ExcelReader,
    workbook: &WorkbookHandle,
    sheet: &str,
    case: &TestCase,
) -> AdapterResult<JsonMap> {
    read::read_alignment_actual(adapter, workbook, sheet, &case.cell_ref())
}

fn read_borders(
    adapter: &dyn ExcelReader,
    workbook: &WorkbookHandle,
    sheet: &str,
    case: &TestCase,
) -> AdapterResult<JsonMap> {
    read::read_border_actual(adapter, workbook, sheet, &case.cell_ref())
}

fn read_multiple_sheets(
    adapter: &dyn ExcelReader,
    workbook: &WorkbookHandle,
    sheet: &str,
    case: &TestCase,
) -> AdapterResult<JsonMap> {
    if case.expected.contains_key("sheet_names") {
        read::read_sheet_names_actual(adapter, workbook)
    } else {
        read::read_cell_value_actual(adapter, workbook, sheet, &case.cell_ref())
    }
}

macro_rules! expected_reader {
    ($name:ident => $projection:path) => {
        fn $name(
            adapter: &dyn ExcelReader,
            workbook: &WorkbookHandle,
            sheet: &str,
            case: &TestCase,
        ) -> AdapterResult<JsonMap> {
            $projection(adapter, workbook, sheet, &case.expected)
        }
    };
}

expected_reader!(read_conditional_formatting => read::read_conditional_format_actual);
expected_reader!(read_data_validation => read::read_data_validation_actual);
expected_reader!(read_hyperlinks => read::read_hyperlink_actual);
expected_reader!(read_images => read::read_image_actual);
expected_reader!(read_pivot_tables => read::read_pivot_actual);
expected_reader!(read_comments => read::read_comment_actual);
expected_reader!(read_freeze_panes => read::read_freeze_panes_actual);
expected_reader!(read_named_ranges => read::read_named_range_actual);
expected_reader!(read_tables => read::read_table_actual);

pub static FEATURE_SPECS: [FeatureSpec; 19] = [
    FeatureSpec {
        feature: Feature::CellValues,
        read: read_cell_values,
        write: write::write_cell_value_case,
        expected: as_is,
    },
    FeatureSpec {
        feature: Feature::Formulas,
        read: read_formulas,
        write: write::write_formula_case,
        expected: formula_expected,
    },
    FeatureSpec {
        feature: Feature::TextFormatting,
        read: read_text_formatting,
        write: write::write_text_format_case,
        expected: as_is,
    },
    FeatureSpec {
        feature: Feature::BackgroundColors,
        read: read_background_colors,
        write: write::write_formatted_label_case,
        expected: as_is,
    },
    FeatureSpec {
        feature: Feature::NumberFormats,
        read: read_number_formats,
        write: write::write_number_format_case,
        expected: number_format_expected,
    },
    FeatureSpec {
        feature: Feature::Alignment,
        read: read_alignment,
        write: write::write_formatted_label_case,
        expected: as_is,
    },
    FeatureSpec {
        feature: Feature::Borders,
        read: read_borders,
        write: write::write_border_case,
        expected: as_is,
    },
    FeatureSpec {
        feature: Feature::Dimensions,
        read: read::read_dimensions_actual,
        write: write::write_dimensions_case,
        expected: as_is,
    },
    FeatureSpec {
        feature: Feature::MultipleSheets,
        read: read_multiple_sheets,
        write: write::write_cell_value_case,
        expected: as_is,
    },
    FeatureSpec {
        feature: Feature::MergedCells,
        read: read::read_merged_cells_actual,
        write: write::write_merged_cells_case,
        expected: as_is,
    },
    FeatureSpec {
        feature: Feature::ConditionalFormatting,
        read: read_conditional_formatting,
        write: write::write_conditional_format_case,
        expected: conditional_format_expected,
    },
    FeatureSpec {
        feature: Feature::DataValidation,
        read: read_data_validation,
        write: write::write_data_validation_case,
        expected: as_is,
    },
    FeatureSpec {
        feature: Feature::Hyperlinks,
        read: read_hyperlinks,
        write: write::write_hyperlink_case,
        expected: hyperlink_expected,
    },
    FeatureSpec {
        feature: Feature::Images,
        read: read_images,
        write: write::write_image_case,
        expected: as_is,
    },
    FeatureSpec {
        feature: Feature::PivotTables,
        read: read_pivot_tables,
        write: write::write_pivot_case,
        expected: as_is,
    },
    FeatureSpec {
        feature: Feature::Comments,
        read: read_comments,
        write: write::write_comment_case,
        expected: as_is,
    },
    FeatureSpec {
        feature: Feature::FreezePanes,
        read: read_freeze_panes,
        write: write::write_freeze_panes_case,
        expected: as_is,
    },
    FeatureSpec {
        feature: Feature::NamedRanges,
        read: read_named_ranges,
        write: write::write_named_range_case,
        expected: named_range_expected,
    },
    FeatureSpec {
        feature: Feature::Tables,
        read: read_tables,
        write: write::write_table_case,
        expected: as_is,
    },
];
