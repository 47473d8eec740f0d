//! Typed report cells: values, columns, rows and the per-row mismatch set.

use crate::error::CellError;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Key under which report sources attach the mismatch set to a row.
pub const MISMATCH_FIELDS_KEY: &str = "_mismatch_fields";

/// Raw value of a single cell as supplied by the report source.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(flag) => Self::Text(flag.to_string()),
            Value::Number(number) => number
                .as_f64()
                .map_or_else(|| Self::Text(number.to_string()), Self::Number),
            Value::String(text) => Self::Text(text.clone()),
            other => Self::Text(other.to_string()),
        }
    }

    /// CSV cells carry no type information; an empty field means "no value".
    pub fn from_csv_field(raw: &str) -> Self {
        if raw.is_empty() {
            Self::Null
        } else {
            Self::Text(raw.to_string())
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    #[default]
    Data,
    Date,
    Int,
    Float,
    Currency,
    Percent,
    Check,
    #[serde(other)]
    Other,
}

impl FieldType {
    /// Field types that are displayed with a fixed number of decimals.
    pub const fn is_decimal(self) -> bool {
        matches!(self, Self::Float | Self::Currency | Self::Percent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub fieldname: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub fieldtype: FieldType,
}

impl Column {
    pub fn new(
        fieldname: impl Into<String>,
        label: impl Into<String>,
        fieldtype: FieldType,
    ) -> Self {
        Self {
            fieldname: fieldname.into(),
            label: label.into(),
            fieldtype,
        }
    }

    pub fn data(fieldname: impl Into<String>) -> Self {
        let fieldname = fieldname.into();
        Self {
            label: fieldname.clone(),
            fieldname,
            fieldtype: FieldType::Data,
        }
    }

    pub fn fieldname(&self) -> &str {
        &self.fieldname
    }

    pub fn label(&self) -> &str {
        if self.label.is_empty() {
            &self.fieldname
        } else {
            &self.label
        }
    }
}

/// Field names on one row that disagree with an external reference dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MismatchSet(FxHashSet<String>);

impl MismatchSet {
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Field names in lexical order, for stable output.
    pub fn sorted_fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = self.0.iter().map(String::as_str).collect();
        fields.sort_unstable();
        fields
    }
}

impl<S: Into<String>> FromIterator<S> for MismatchSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// What the report source attached to a row under [`MISMATCH_FIELDS_KEY`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MismatchFlags {
    #[default]
    Absent,
    Fields(MismatchSet),
    Malformed(String),
}

impl MismatchFlags {
    pub fn contains(&self, field: &str) -> Result<bool, CellError> {
        match self {
            Self::Absent => Ok(false),
            Self::Fields(set) => Ok(set.contains(field)),
            Self::Malformed(reason) => Err(CellError::MalformedMismatchSet(reason.clone())),
        }
    }

    pub const fn fields(&self) -> Option<&MismatchSet> {
        match self {
            Self::Fields(set) => Some(set),
            Self::Absent | Self::Malformed(_) => None,
        }
    }
}

/// One report line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: FxHashMap<String, CellValue>,
    mismatch: MismatchFlags,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_value(mut self, field: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.insert(field, value);
        self
    }

    /// Builder form of [`Row::flag_mismatches`]; values must be set first.
    #[must_use]
    pub fn with_mismatches<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flag_mismatches(fields);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<CellValue>) {
        self.values.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&CellValue> {
        self.values.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.values
            .iter()
            .map(|(field, value)| (field.as_str(), value))
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    pub const fn mismatch(&self) -> &MismatchFlags {
        &self.mismatch
    }

    /// Attach a mismatch set. Names that are not fields of this row are dropped.
    pub fn flag_mismatches<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set = fields
            .into_iter()
            .map(Into::<String>::into)
            .filter(|field| {
                let known = self.values.contains_key(field);
                if !known {
                    tracing::warn!(field = %field, "dropping mismatch flag for unknown field");
                }
                known
            })
            .collect();
        self.mismatch = MismatchFlags::Fields(set);
    }

    pub fn mark_malformed(&mut self, reason: impl Into<String>) {
        self.mismatch = MismatchFlags::Malformed(reason.into());
    }

    /// Whether `field` is flagged; malformed sets count as unflagged.
    pub fn is_flagged(&self, field: &str) -> bool {
        self.mismatch.contains(field).unwrap_or(false)
    }
}
