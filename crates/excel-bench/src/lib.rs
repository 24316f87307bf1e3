//! `excel-bench` measures how faithfully spreadsheet libraries read and write Excel features.
//!
//! A fixture directory holds workbooks plus a `manifest.json` describing, per feature, the
//! cells under test and what an ideal library reports for each. Every library is wrapped in
//! an adapter ([`adapter::ExcelReader`] / [`adapter::ExcelWriter`]); the [`runner`] reads each
//! fixture through every adapter, rebuilds it through every writer and verifies the result
//! with an independent reader, and [`score`] condenses the verdicts into 0–3 fidelity scores.

pub mod a1;
pub mod adapter;
pub mod cli;
pub mod compare;
pub mod feature;
pub mod manifest;
pub mod model;
pub mod normalize;
pub mod oracle;
pub mod report;
pub mod runner;
pub mod score;

pub use adapter::{
    AdapterError, AdapterMeta, AdapterResult, CalamineAdapter, ExcelAdapter, ExcelReader,
    ExcelWriter, JsonWorkbookAdapter, ReadOnlyAdapter, WorkbookHandle, WriteOnlyAdapter,
};
pub use compare::{compare_results, deep_compare};
pub use feature::{Feature, FeatureStrategy};
pub use manifest::{load_manifest, write_manifest, Manifest, ManifestError};
pub use model::*;
pub use oracle::{OracleSet, WriteOracle};
pub use runner::{
    run_benchmark, test_feature, test_read, test_read_case, test_write, write_workbook, BenchError,
    BenchmarkRun, Profile, RunConfig,
};
pub use score::calculate_score;
