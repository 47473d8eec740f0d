use crate::cell::{CellValue, Column, Row};
use crate::error::{CellError, ConfigError};
use clap::ValueEnum;
use maud::{PreEscaped, html};

pub const DEFAULT_BACKGROUND_COLOR: &str = "#ffd6d6";
pub const DEFAULT_TEXT_COLOR: &str = "#c62828";

/// How a flagged cell is emphasised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum HighlightStyle {
    /// Tint the whole cell background.
    #[default]
    Background,
    /// Colour and embolden the cell text.
    Text,
}

impl HighlightStyle {
    pub const fn default_color(self) -> &'static str {
        match self {
            Self::Background => DEFAULT_BACKGROUND_COLOR,
            Self::Text => DEFAULT_TEXT_COLOR,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Background => "background",
            Self::Text => "text",
        }
    }

    pub const fn css_class(self) -> &'static str {
        match self {
            Self::Background => "mismatch mismatch-bg",
            Self::Text => "mismatch mismatch-text",
        }
    }

    fn declaration(self, color: &str) -> String {
        match self {
            Self::Background => format!("background-color:{color};"),
            Self::Text => format!("color:{color};font-weight:bold;"),
        }
    }
}

/// Wraps flagged cells in highlight markup.
///
/// The baseline text is always produced by the caller's render callback and
/// is never altered; highlighting only adds a surrounding block element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlighter {
    style: HighlightStyle,
    color: String,
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new(HighlightStyle::default())
    }
}

impl Highlighter {
    pub fn new(style: HighlightStyle) -> Self {
        Self {
            style,
            color: style.default_color().to_string(),
        }
    }

    pub fn with_color(style: HighlightStyle, color: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            style,
            color: validate_color(color)?,
        })
    }

    pub const fn style(&self) -> HighlightStyle {
        self.style
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    /// Render one cell.
    ///
    /// `base_render` is always called first. Its output is returned wrapped
    /// when the row's mismatch set names the column, and bare otherwise. A
    /// failing callback degrades to the escaped raw value; a malformed set
    /// degrades to the bare baseline. Neither failure is propagated.
    pub fn render<F>(
        &self,
        value: &CellValue,
        row: Option<&Row>,
        column: &Column,
        base_render: F,
    ) -> String
    where
        F: FnOnce(&CellValue, Option<&Row>, &Column) -> Result<String, CellError>,
    {
        let formatted = match base_render(value, row, column) {
            Ok(formatted) => formatted,
            Err(err) => {
                tracing::debug!(
                    field = column.fieldname(),
                    error = %err,
                    "baseline render failed, showing raw value"
                );
                return escape_text(&value.to_string());
            }
        };

        let Some(row) = row else {
            return formatted;
        };

        match row.mismatch().contains(column.fieldname()) {
            Ok(true) => self.wrap(&formatted),
            Ok(false) => formatted,
            Err(err) => {
                tracing::debug!(
                    field = column.fieldname(),
                    error = %err,
                    "ignoring mismatch set"
                );
                formatted
            }
        }
    }

    /// Wrap already-rendered cell markup in the highlight block.
    pub fn wrap(&self, formatted: &str) -> String {
        let style = self.style.declaration(&self.color);
        html! {
            div class=(self.style.css_class()) style=(style) { (PreEscaped(formatted)) }
        }
        .into_string()
    }
}

/// HTML-escape plain text for display inside a cell.
pub fn escape_text(text: &str) -> String {
    html! { (text) }.into_string()
}

fn validate_color(color: &str) -> Result<String, ConfigError> {
    let trimmed = color.trim();
    let valid = trimmed.strip_prefix('#').map_or_else(
        || !trimmed.is_empty() && trimmed.chars().all(|ch| ch.is_ascii_alphabetic()),
        |hex| matches!(hex.len(), 3 | 6) && hex.chars().all(|ch| ch.is_ascii_hexdigit()),
    );
    if valid {
        Ok(trimmed.to_ascii_lowercase())
    } else {
        Err(ConfigError::InvalidColor(color.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baseline(
        value: &CellValue,
        _row: Option<&Row>,
        _column: &Column,
    ) -> Result<String, CellError> {
        Ok(format!("[{value}]"))
    }

    fn failing(
        _value: &CellValue,
        _row: Option<&Row>,
        column: &Column,
    ) -> Result<String, CellError> {
        Err(CellError::RenderFailure {
            field: column.fieldname().to_string(),
            reason: "boom".to_string(),
        })
    }

    #[test]
    fn test_row_without_set_is_unchanged() {
        let highlighter = Highlighter::default();
        let row = Row::new().with_value("ot", "5.5");
        let value = CellValue::from("5.5");
        let column = Column::data("ot");
        assert_eq!(highlighter.render(&value, Some(&row), &column, baseline), "[5.5]");
        assert_eq!(highlighter.render(&value, None, &column, baseline), "[5.5]");
    }

    #[test]
    fn test_flagged_cell_is_wrapped() {
        let highlighter = Highlighter::default();
        let row = Row::new().with_value("ot", "5.5").with_mismatches(["ot"]);
        let rendered =
            highlighter.render(&CellValue::from("5.5"), Some(&row), &Column::data("ot"), baseline);
        assert!(rendered.contains("[5.5]"));
        assert!(rendered.starts_with("<div"));
        assert!(rendered.contains("background-color:#ffd6d6;"));
        assert_ne!(rendered, "[5.5]");
    }

    #[test]
    fn test_set_without_column_is_unchanged() {
        let highlighter = Highlighter::default();
        let row = Row::new()
            .with_value("ot", "5.5")
            .with_value("shift", "A")
            .with_mismatches(["shift"]);
        let rendered =
            highlighter.render(&CellValue::from("5.5"), Some(&row), &Column::data("ot"), baseline);
        assert_eq!(rendered, "[5.5]");
    }

    #[test]
    fn test_malformed_set_renders_unflagged() {
        let highlighter = Highlighter::default();
        let mut row = Row::new().with_value("ot", "5.5");
        row.mark_malformed("not a list");
        let rendered =
            highlighter.render(&CellValue::from("5.5"), Some(&row), &Column::data("ot"), baseline);
        assert_eq!(rendered, "[5.5]");
    }

    #[test]
    fn test_failed_baseline_falls_back_to_escaped_value() {
        let highlighter = Highlighter::default();
        let row = Row::new().with_value("ot", "<b>").with_mismatches(["ot"]);
        let rendered =
            highlighter.render(&CellValue::from("<b>"), Some(&row), &Column::data("ot"), failing);
        assert_eq!(rendered, "&lt;b&gt;");
    }

    #[test]
    fn test_text_style_uses_text_colour() {
        let highlighter = Highlighter::new(HighlightStyle::Text);
        let wrapped = highlighter.wrap("5.50");
        assert!(wrapped.contains("color:#c62828;"));
        assert!(!wrapped.contains("background-color"));
        assert!(wrapped.contains("mismatch-text"));
        assert!(wrapped.contains("5.50"));
    }

    #[test]
    fn test_custom_colour_validation() {
        let highlighter = Highlighter::with_color(HighlightStyle::Background, "#FFEE00").unwrap();
        assert_eq!(highlighter.color(), "#ffee00");
        assert!(Highlighter::with_color(HighlightStyle::Text, "Orange").is_ok());
        assert!(Highlighter::with_color(HighlightStyle::Text, "#12").is_err());
        assert!(Highlighter::with_color(HighlightStyle::Text, "red;position:fixed").is_err());
        assert!(Highlighter::with_color(HighlightStyle::Text, "").is_err());
    }
}
