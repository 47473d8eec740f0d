use thiserror::Error;

/// Failures that can occur while rendering a single cell.
///
/// None of these ever escape the highlighter; they are logged and the cell
/// degrades to the best display string available.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CellError {
    #[error("baseline render failed for field `{field}`: {reason}")]
    RenderFailure { field: String, reason: String },

    #[error("mismatch set is malformed: {0}")]
    MalformedMismatchSet(String),

    #[error("cannot parse `{0}` as a number")]
    ParseFailure(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid highlight colour `{0}`: expected #rgb, #rrggbb or a CSS colour name")]
    InvalidColor(String),
}

/// Errors raised while loading a report document.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source path must not be empty")]
    EmptyPath,

    #[error("unsupported source format `{0}` (expected .json, .csv or .csv.gz)")]
    UnsupportedFormat(String),

    #[error("report document has no columns")]
    NoColumns,

    #[error("missing required column `{0}`")]
    MissingColumn(String),

    #[error("invalid report document: {0}")]
    InvalidDocument(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),
}
