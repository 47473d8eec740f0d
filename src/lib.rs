//! Tabular report rendering with per-cell mismatch highlighting.
//!
//! A [`Grid`] resolves a formatter for every column, renders each cell's
//! baseline text through it and lets the [`Highlighter`] wrap the cells a
//! row's [`MismatchFlags`] name. Sources, exports and the overtime
//! reconciliation report sit around that core.

pub mod cell;
pub mod cli;
pub mod error;
pub mod export;
pub mod formatting;
pub mod grid;
pub mod highlight;
pub mod progress;
pub mod reconcile;
pub mod report;
pub mod source;
pub mod summary;

pub use cell::{CellValue, Column, FieldType, MismatchFlags, MismatchSet, Row};
pub use error::{CellError, ConfigError, SourceError};
pub use formatting::format_decimal;
pub use grid::{CellFormatter, FormatterRegistry, Grid, RenderOptions};
pub use highlight::{HighlightStyle, Highlighter};
pub use source::{ReportDocument, load_report};
