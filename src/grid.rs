//! Composition of the per-cell formatters with the mismatch highlighter.
//!
//! Formatters are registered statically per field when a [`Grid`] is built,
//! then every cell render looks its formatter up by field name.

use crate::cell::{CellValue, Column, Row};
use crate::error::{CellError, ConfigError};
use crate::formatting::{DEFAULT_PRECISION, format_decimal};
use crate::highlight::{HighlightStyle, Highlighter, escape_text};
use rustc_hash::FxHashMap;

static NULL_CELL: CellValue = CellValue::Null;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub style: HighlightStyle,
    pub color: Option<String>,
    pub precision: usize,
    pub decimal_fields: Vec<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            style: HighlightStyle::default(),
            color: None,
            precision: DEFAULT_PRECISION,
            decimal_fields: Vec::new(),
        }
    }
}

impl RenderOptions {
    pub fn highlighter(&self) -> Result<Highlighter, ConfigError> {
        match self.color.as_deref() {
            Some(color) => Highlighter::with_color(self.style, color),
            None => Ok(Highlighter::new(self.style)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CellFormatter {
    #[default]
    Plain,
    Decimal {
        precision: usize,
    },
}

impl CellFormatter {
    /// Baseline text without markup.
    pub fn render_text(self, value: &CellValue, column: &Column) -> Result<String, CellError> {
        match self {
            Self::Plain => Ok(value.to_string()),
            Self::Decimal { precision } => format_decimal(value, precision)
                .map(|formatted| formatted.to_string())
                .map_err(|err| CellError::RenderFailure {
                    field: column.fieldname().to_string(),
                    reason: err.to_string(),
                }),
        }
    }

    /// Baseline display markup: the text form, HTML-escaped.
    pub fn render(self, value: &CellValue, column: &Column) -> Result<String, CellError> {
        self.render_text(value, column)
            .map(|text| escape_text(&text))
    }
}

/// Field name to formatter mapping, resolved once per grid.
#[derive(Debug, Clone, Default)]
pub struct FormatterRegistry {
    by_field: FxHashMap<String, CellFormatter>,
}

impl FormatterRegistry {
    pub fn for_columns(columns: &[Column], options: &RenderOptions) -> Self {
        let decimal = CellFormatter::Decimal {
            precision: options.precision,
        };
        let mut registry = Self::default();
        for column in columns.iter().filter(|column| column.fieldtype.is_decimal()) {
            registry.register(column.fieldname(), decimal);
        }
        for field in &options.decimal_fields {
            registry.register(field.as_str(), decimal);
        }
        registry
    }

    pub fn register(&mut self, field: impl Into<String>, formatter: CellFormatter) {
        self.by_field.insert(field.into(), formatter);
    }

    pub fn formatter(&self, field: &str) -> CellFormatter {
        self.by_field.get(field).copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedRow {
    pub cells: Vec<String>,
    /// Cells whose field is named in the row's mismatch set.
    pub flagged: usize,
}

pub struct Grid<'a> {
    columns: &'a [Column],
    registry: FormatterRegistry,
    highlighter: Highlighter,
}

impl<'a> Grid<'a> {
    pub fn new(columns: &'a [Column], options: &RenderOptions) -> Result<Self, ConfigError> {
        Ok(Self::with_parts(
            columns,
            FormatterRegistry::for_columns(columns, options),
            options.highlighter()?,
        ))
    }

    pub const fn with_parts(
        columns: &'a [Column],
        registry: FormatterRegistry,
        highlighter: Highlighter,
    ) -> Self {
        Self {
            columns,
            registry,
            highlighter,
        }
    }

    pub const fn columns(&self) -> &'a [Column] {
        self.columns
    }

    pub const fn highlighter(&self) -> &Highlighter {
        &self.highlighter
    }

    pub fn is_numeric(&self, column: &Column) -> bool {
        self.registry.formatter(column.fieldname()) != CellFormatter::Plain
    }

    pub fn render_cell(&self, row: &Row, column: &Column) -> String {
        let value = row.get(column.fieldname()).unwrap_or(&NULL_CELL);
        let formatter = self.registry.formatter(column.fieldname());
        self.highlighter
            .render(value, Some(row), column, |value, _row, column| {
                formatter.render(value, column)
            })
    }

    /// Plain baseline text for exports; unparseable values keep their raw text.
    pub fn cell_text(&self, row: &Row, column: &Column) -> String {
        let value = row.get(column.fieldname()).unwrap_or(&NULL_CELL);
        self.registry
            .formatter(column.fieldname())
            .render_text(value, column)
            .unwrap_or_else(|_| value.to_string())
    }

    pub fn render_rows(&self, rows: &[Row]) -> Vec<RenderedRow> {
        rows.iter()
            .map(|row| RenderedRow {
                cells: self
                    .columns
                    .iter()
                    .map(|column| self.render_cell(row, column))
                    .collect(),
                flagged: self
                    .columns
                    .iter()
                    .filter(|column| row.is_flagged(column.fieldname()))
                    .count(),
            })
            .collect()
    }
}
