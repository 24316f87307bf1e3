//! The execution engine: read and write-then-verify exercises per (adapter, fixture file).
//!
//! Failures are contained at two levels. A file-level failure (open, create or save) fails
//! every case of that file for that adapter and operation; a case-level failure fails only
//! that case. Neither ever crosses into another file or adapter. Contract violations are the
//! exception: they mean the engine dispatched to a capability the adapter does not have, and
//! abort the run with [`BenchError::ContractViolation`].

use std::collections::BTreeMap;
use std::io;
use std::mem;
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::adapter::{
    AdapterError, AdapterResult, ExcelAdapter, ExcelReader, ExcelWriter,
    WorkbookHandle,
};
use crate::compare::compare_results;
use crate::feature::expected::normalize_refers_to;
use crate::feature::Feature;
use crate::manifest::{load_manifest, ManifestError, MANIFEST_FILE};
use crate::model::{
    BenchmarkMetadata, BenchmarkResults, DiagnosticLocation, FeatureScore, JsonMap,
    OperationType, TestCase, TestFile, TestResult, BENCHMARK_VERSION,
};
use crate::normalize::extract_formula_sheet_names;
use crate::oracle::{get_write_verifier_for_adapter, MissingOracle, OracleSet, WriteOracle};
use crate::score::calculate_score;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("No matching features: {}", .0.join(", "))]
    NoMatchingFeatures(Vec<String>),
    #[error("contract violation by {adapter}: {source}")]
    ContractViolation {
        adapter: String,
        #[source]
        source: AdapterError,
    },
    #[error(transparent)]
    MissingOracle(#[from] MissingOracle),
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

/// Which output format a run benchmarks writers on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Modern writers (anything but legacy BIFF).
    #[default]
    Xlsx,
    /// Legacy BIFF writers only.
    Xls,
}

impl Profile {
    pub fn accepts_output(self, extension: &str) -> bool {
        let legacy = extension.eq_ignore_ascii_case(".xls");
        match self {
            Profile::Xlsx => !legacy,
            Profile::Xls => legacy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Feature names to run; empty means every feature in the manifest.
    pub features: Vec<String>,
    pub profile: Profile,
    pub write_oracle: WriteOracle,
    /// Host platform as reported by `std::env::consts::OS`.
    pub platform: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            features: Vec::new(),
            profile: Profile::default(),
            write_oracle: WriteOracle::default(),
            platform: std::env::consts::OS.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkRun {
    pub results: BenchmarkResults,
    /// Skipped fixtures and similar non-fatal problems, in the order they occurred.
    pub warnings: Vec<String>,
}

/// An open workbook that is closed when dropped.
struct OpenWorkbook<'a> {
    adapter: &'a dyn ExcelReader,
    handle: WorkbookHandle,
}

impl<'a> OpenWorkbook<'a> {
    fn open(adapter: &'a dyn ExcelReader, path: &Path) -> AdapterResult<Self> {
        let handle = adapter.open_workbook(path)?;
        Ok(Self { adapter, handle })
    }
}

impl Drop for OpenWorkbook<'_> {
    fn drop(&mut self) {
        let handle = mem::replace(&mut self.handle, WorkbookHandle::new(()));
        if let Err(err) = self.adapter.close_workbook(handle) {
            log::warn!("{}: failed to close workbook: {err}", self.adapter.name());
        }
    }
}

fn contract_violation(adapter: &str, source: AdapterError) -> BenchError {
    BenchError::ContractViolation {
        adapter: adapter.to_string(),
        source,
    }
}

fn location(
    feature: &str,
    operation: OperationType,
    case: &TestCase,
    sheet: &str,
) -> DiagnosticLocation {
    DiagnosticLocation::new(feature, operation).for_case(case, sheet)
}

/// Every case of `file` failed for the same file-level reason.
fn fail_all(
    adapter: &dyn ExcelReader,
    file: &TestFile,
    operation: OperationType,
    error: &AdapterError,
    notes: &str,
    probable_cause: &str,
) -> Vec<TestResult> {
    let sheet = file.feature.as_str();
    file.test_cases
        .iter()
        .map(|case| {
            let sheet = case.sheet.as_deref().unwrap_or(sheet);
            let diagnostic = adapter.map_error_to_diagnostic(
                error,
                location(&file.feature, operation, case, sheet),
                Some(probable_cause.to_string()),
            );
            TestResult::failed(case, operation, error.describe(), notes).with_diagnostic(diagnostic)
        })
        .collect()
}

/// The feature's own sheet when present, else the first sheet.
fn default_sheet<'s>(feature: &str, sheets: &'s [String]) -> Option<&'s str> {
    sheets
        .iter()
        .find(|name| name.as_str() == feature)
        .or_else(|| sheets.first())
        .map(String::as_str)
}

/// Read every case of `file` from the workbook at `path`.
pub fn test_read(
    adapter: &dyn ExcelReader,
    file: &TestFile,
    path: &Path,
) -> Result<Vec<TestResult>, BenchError> {
    read_cases(adapter, file, path, OperationType::Read)
}

fn read_cases(
    adapter: &dyn ExcelReader,
    file: &TestFile,
    path: &Path,
    operation: OperationType,
) -> Result<Vec<TestResult>, BenchError> {
    let workbook = match OpenWorkbook::open(adapter, path) {
        Ok(workbook) => workbook,
        Err(err) if err.is_contract_violation() => {
            return Err(contract_violation(&adapter.name(), err))
        }
        Err(err) => {
            log::debug!("{}: cannot open {}: {err}", adapter.name(), path.display());
            return Ok(fail_all(
                adapter,
                file,
                operation,
                &err,
                "Failed to open workbook",
                "The adapter could not open the workbook.",
            ));
        }
    };

    let sheets = match adapter.get_sheet_names(&workbook.handle) {
        Ok(sheets) if sheets.is_empty() => Err(AdapterError::Library(
            "No sheets found in workbook".to_string(),
        )),
        other => other,
    };
    let sheets = match sheets {
        Ok(sheets) => sheets,
        Err(err) if err.is_contract_violation() => {
            return Err(contract_violation(&adapter.name(), err))
        }
        Err(err) => {
            let notes = format!("Exception: {}", err.kind());
            return Ok(fail_all(
                adapter,
                file,
                operation,
                &err,
                &notes,
                "The adapter could not list the workbook's sheets.",
            ));
        }
    };

    let fallback = default_sheet(&file.feature, &sheets).unwrap_or_default();
    file.test_cases
        .iter()
        .map(|case| {
            let sheet = case.sheet.as_deref().unwrap_or(fallback);
            test_read_case(adapter, &workbook.handle, sheet, case, &file.feature, operation)
        })
        .collect()
}

/// Read one case and judge it against the (normalized) expected dict.
pub fn test_read_case(
    adapter: &dyn ExcelReader,
    workbook: &WorkbookHandle,
    sheet: &str,
    case: &TestCase,
    feature: &str,
    operation: OperationType,
) -> Result<TestResult, BenchError> {
    let location = location(feature, operation, case, sheet);

    let (expected, outcome) = match feature.parse::<Feature>() {
        Ok(parsed) => {
            let strategy = parsed.strategy();
            (
                strategy.expected_for(operation, case),
                strategy.read(adapter, workbook, sheet, case),
            )
        }
        Err(unknown) => {
            let mut actual = JsonMap::new();
            actual.insert("error".to_string(), Value::String(unknown.to_string()));
            (case.expected.clone(), Ok(actual))
        }
    };

    let mut result = TestResult {
        test_case_id: case.id.clone(),
        operation,
        passed: false,
        expected,
        actual: JsonMap::new(),
        notes: None,
        importance: case.importance,
        diagnostics: Vec::new(),
    };

    match outcome {
        Ok(actual) => {
            result.passed = compare_results(&result.expected, &actual);
            if !result.passed {
                result.diagnostics.push(adapter.build_mismatch_diagnostic(
                    location,
                    &result.expected,
                    &actual,
                ));
            }
            result.actual = actual;
        }
        Err(err) if err.is_contract_violation() => {
            return Err(contract_violation(&adapter.name(), err));
        }
        Err(err) => {
            result
                .actual
                .insert("error".to_string(), Value::String(err.describe()));
            result.notes = Some(format!("Exception: {}", err.kind()));
            result.diagnostics.push(adapter.map_error_to_diagnostic(
                &err,
                location,
                Some("The adapter raised while reading this case.".to_string()),
            ));
        }
    }
    Ok(result)
}

/// Sheets a write test must create, in first-seen order.
///
/// Explicit `sheet_names` lists win (case sheets are appended); otherwise the feature's own
/// sheet, case sheets and every sheet referenced by formulas, rule formulas and named
/// ranges.
pub fn collect_sheet_names(file: &TestFile) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut push = |name: &str| {
        if !name.is_empty() && !names.iter().any(|existing| existing == name) {
            names.push(name.to_string());
        }
    };

    let explicit: Vec<&Value> = file
        .test_cases
        .iter()
        .filter_map(|case| case.expected.get("sheet_names"))
        .collect();
    if !explicit.is_empty() {
        for list in explicit {
            for name in list.as_array().into_iter().flatten().filter_map(Value::as_str) {
                push(name);
            }
        }
        for case in &file.test_cases {
            if let Some(sheet) = &case.sheet {
                push(sheet);
            }
        }
        return names;
    }

    push(&file.feature);
    for case in &file.test_cases {
        if let Some(sheet) = &case.sheet {
            push(sheet);
        }
    }
    for case in &file.test_cases {
        for formula in referenced_formulas(&case.expected) {
            for sheet in extract_formula_sheet_names(formula) {
                push(&sheet);
            }
        }
        if let Some(refers_to) = case.expected.get("refers_to").and_then(Value::as_str) {
            if let Some((sheet, _)) = normalize_refers_to(refers_to).rsplit_once('!') {
                push(sheet);
            }
        }
    }
    names
}

fn referenced_formulas(expected: &JsonMap) -> Vec<&str> {
    let nested = |outer: &str, inner: &str| {
        expected
            .get(outer)
            .and_then(|v| v.get(inner))
            .and_then(Value::as_str)
    };
    [
        expected.get("formula").and_then(Value::as_str),
        nested("cf_rule", "formula"),
        nested("validation", "formula1"),
        nested("validation", "formula2"),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Write every case of `file` with `adapter`, save it, then verify it with `verifier`.
pub fn test_write(
    adapter: &dyn ExcelWriter,
    file: &TestFile,
    verifier: &dyn ExcelReader,
) -> Result<Vec<TestResult>, BenchError> {
    let feature = match file.feature.parse::<Feature>() {
        Ok(feature) => feature,
        Err(unknown) => {
            let error = AdapterError::InvalidInput(unknown.to_string());
            return Ok(file
                .test_cases
                .iter()
                .map(|case| {
                    TestResult::failed(case, OperationType::Write, unknown.to_string(), "Write failed")
                        .with_diagnostic(adapter.map_error_to_diagnostic(
                            &error,
                            location(&file.feature, OperationType::Write, case, &file.feature),
                            None,
                        ))
                })
                .collect());
        }
    };

    let dir = tempfile::Builder::new()
        .prefix(&format!("excelbench-{}-{}-", file_safe(&adapter.name()), feature))
        .tempdir()
        .map_err(|source| BenchError::Io {
            context: "failed to create a temporary directory".to_string(),
            source,
        })?;
    let path = dir
        .path()
        .join(format!("{}{}", feature, adapter.output_extension()));

    if let Err(err) = write_workbook(adapter, file, feature, &path) {
        if err.is_contract_violation() {
            return Err(contract_violation(&adapter.name(), err));
        }
        log::debug!("{}: write phase failed for {feature}: {err}", adapter.name());
        let notes = format!("Write failed: {}", err.kind());
        return Ok(file
            .test_cases
            .iter()
            .map(|case| {
                let sheet = case.sheet.as_deref().unwrap_or(feature.as_str());
                TestResult::failed(case, OperationType::Write, err.describe(), notes.clone())
                    .with_diagnostic(adapter.map_error_to_diagnostic(
                        &err,
                        location(&file.feature, OperationType::Write, case, sheet),
                        Some("The adapter failed while producing the workbook.".to_string()),
                    ))
            })
            .collect());
    }

    read_cases(verifier, file, &path, OperationType::Write)
}

/// Build the workbook described by `file` with `adapter` and save it to `path`.
///
/// Creates every sheet [`collect_sheet_names`] finds, then stages each case on its sheet
/// (default: the feature's own sheet). Cases expecting a `sheet_names` list are satisfied by
/// the sheets themselves and are not staged.
pub fn write_workbook(
    adapter: &dyn ExcelWriter,
    file: &TestFile,
    feature: Feature,
    path: &Path,
) -> AdapterResult<()> {
    let strategy = feature.strategy();
    let mut workbook = adapter.create_workbook()?;
    let sheets = collect_sheet_names(file);
    for name in &sheets {
        adapter.add_sheet(&mut workbook, name)?;
    }
    let fallback = default_sheet(feature.as_str(), &sheets).unwrap_or(feature.as_str());
    for case in file
        .test_cases
        .iter()
        .filter(|case| !case.expected.contains_key("sheet_names"))
    {
        let sheet = case.sheet.as_deref().unwrap_or(fallback);
        strategy.write(adapter, &mut workbook, sheet, &case.cell_ref(), case)?;
    }
    adapter.save_workbook(&mut workbook, path)
}

fn file_safe(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect()
}

/// Run every applicable operation of `adapter` on `file`, whose fixture at `fixture_path` is
/// in `input_format` (see [`Manifest::file_format_of`](crate::manifest::Manifest::file_format_of)).
pub fn test_feature(
    adapter: &dyn ExcelAdapter,
    file: &TestFile,
    fixture_path: &Path,
    input_format: &str,
    config: &RunConfig,
    oracles: &OracleSet,
) -> Result<FeatureScore, BenchError> {
    let mut score = FeatureScore {
        feature: file.feature.clone(),
        library: adapter.name(),
        read_score: None,
        write_score: None,
        test_results: Vec::new(),
        notes: None,
    };

    if adapter.can_read() && !adapter.supports_read_format(input_format) {
        score.notes = Some(format!(
            "Not applicable: {} does not support .{} input",
            adapter.name(),
            input_format.trim_start_matches('.')
        ));
        return Ok(score);
    }

    if adapter.can_read() {
        let results = test_read(adapter.as_reader(), file, fixture_path)?;
        score.read_score = Some(calculate_score(&results));
        score.test_results.extend(results);
    }

    if adapter.can_write() && config.profile.accepts_output(adapter.output_extension()) {
        let verifier = match file.feature.parse::<Feature>() {
            Ok(feature) => get_write_verifier_for_adapter(
                adapter,
                feature,
                config.write_oracle,
                oracles,
                &config.platform,
            )?,
            Err(_) => oracles.library(),
        };
        let results = test_write(adapter.as_writer(), file, verifier)?;
        score.write_score = Some(calculate_score(&results));
        score.test_results.extend(results);
    }

    Ok(annotate_known_limitations(score))
}

/// Documented shortcomings of specific libraries, keyed by (library, feature).
const READ_LIMITATIONS: &[(&str, &str, &str)] = &[
    ("calamine", "text_formatting", "calamine exposes cell values only; font styling is not read."),
    ("calamine", "background_colors", "calamine exposes cell values only; fills are not read."),
    ("calamine", "number_formats", "calamine does not report number format codes."),
    ("calamine", "alignment", "calamine exposes cell values only; alignment is not read."),
    ("calamine", "borders", "calamine exposes cell values only; borders are not read."),
    ("calamine", "dimensions", "calamine does not report row heights or column widths."),
    ("calamine", "conditional_formatting", "calamine does not read conditional formatting."),
    ("calamine", "data_validation", "calamine does not read data validation rules."),
    ("calamine", "hyperlinks", "calamine does not read hyperlinks."),
    ("calamine", "images", "calamine does not read embedded images."),
    ("calamine", "pivot_tables", "calamine does not read pivot tables."),
    ("calamine", "comments", "calamine does not read cell comments."),
    ("calamine", "freeze_panes", "calamine does not read pane settings."),
    ("calamine", "tables", "calamine table metadata is not wired into the adapter."),
];

const WRITE_LIMITATIONS: &[(&str, &str, &str)] = &[(
    "json-workbook",
    "pivot_tables",
    "Pivot table writing is not exercised by the harness.",
)];

fn lookup(
    table: &[(&str, &str, &'static str)],
    library: &str,
    feature: &str,
) -> Option<&'static str> {
    table
        .iter()
        .find(|(lib, feat, _)| *lib == library && *feat == feature)
        .map(|(_, _, note)| *note)
}

/// Attach a known-limitation note when a present score is below 3 and no note is set.
pub fn annotate_known_limitations(mut score: FeatureScore) -> FeatureScore {
    if score.notes.is_some() {
        return score;
    }
    let below_three = |s: Option<u8>| s.is_some_and(|s| s < 3);

    let mut notes = Vec::new();
    if below_three(score.read_score) {
        notes.extend(lookup(READ_LIMITATIONS, &score.library, &score.feature));
    }
    if below_three(score.write_score) {
        notes.extend(lookup(WRITE_LIMITATIONS, &score.library, &score.feature));
    }
    if !notes.is_empty() {
        score.notes = Some(notes.join(" "));
    }
    score
}

/// Run every (feature file × adapter) pair of the manifest under `test_dir`.
pub fn run_benchmark(
    test_dir: &Path,
    adapters: &[&dyn ExcelAdapter],
    oracles: &OracleSet,
    config: &RunConfig,
) -> Result<BenchmarkRun, BenchError> {
    let manifest = load_manifest(&test_dir.join(MANIFEST_FILE))?;

    let present = manifest.feature_names();
    let unmatched: Vec<String> = config
        .features
        .iter()
        .filter(|name| !present.contains(&name.as_str()))
        .cloned()
        .collect();
    if !unmatched.is_empty() {
        return Err(BenchError::NoMatchingFeatures(unmatched));
    }

    let mut warnings = Vec::new();
    let mut scores = Vec::new();
    for file in &manifest.files {
        if !config.features.is_empty() && !config.features.contains(&file.feature) {
            continue;
        }
        let fixture_path: PathBuf = test_dir.join(&file.path);
        if !fixture_path.exists() {
            let warning = format!("Test file not found: {}", fixture_path.display());
            log::warn!("{warning}");
            warnings.push(warning);
            continue;
        }
        let input_format = manifest.file_format_of(file);
        for adapter in adapters {
            log::debug!("{} / {} ({input_format})", file.feature, adapter.name());
            scores.push(test_feature(
                *adapter,
                file,
                &fixture_path,
                &input_format,
                config,
                oracles,
            )?);
        }
    }

    let libraries: BTreeMap<_, _> = adapters
        .iter()
        .map(|adapter| (adapter.name(), adapter.info()))
        .collect();

    Ok(BenchmarkRun {
        results: BenchmarkResults {
            metadata: BenchmarkMetadata {
                benchmark_version: BENCHMARK_VERSION.to_string(),
                run_date: Utc::now(),
                excel_version: manifest.excel_version.clone(),
                platform: config.platform.clone(),
            },
            libraries,
            scores,
        },
        warnings,
    })
}
