use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

use crate::error::{EtlError, Result};

/// One cell of a loaded table.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Date(NaiveDate),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// Column type as inferred by the loader or fixed by a later stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Double,
    Date,
    String,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Integer => "integer",
            ColumnType::Double => "double",
            ColumnType::Date => "date",
            ColumnType::String => "string",
        };
        f.write_str(name)
    }
}

/// An in-memory table. Stages never mutate a table they were handed; they
/// build a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub types: Vec<ColumnType>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.headers.len())
    }

    /// Exact match first, then a unique case-insensitive match.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        if let Some(idx) = self.headers.iter().position(|h| h == name) {
            return Ok(idx);
        }
        let matches: Vec<usize> = self
            .headers
            .iter()
            .enumerate()
            .filter(|(_, h)| h.eq_ignore_ascii_case(name))
            .map(|(i, _)| i)
            .collect();
        match matches.as_slice() {
            [idx] => Ok(*idx),
            [] => Err(EtlError::Schema(format!(
                "required column {:?} not found (have: {})",
                name,
                self.headers.join(", ")
            ))),
            _ => Err(EtlError::Schema(format!(
                "column {:?} is ambiguous: matches {} headers case-insensitively",
                name,
                matches.len()
            ))),
        }
    }
}

/// Indices of the columns the reports read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SalesColumns {
    pub country: usize,
    pub category: usize,
    pub date: usize,
    pub sales_rep: usize,
    pub sales_manager: usize,
    pub order_value: usize,
    pub cost: usize,
}

impl SalesColumns {
    pub const COUNTRY: &'static str = "country";
    pub const CATEGORY: &'static str = "category";
    pub const DATE: &'static str = "date";
    pub const SALES_REP: &'static str = "sales_rep";
    pub const SALES_MANAGER: &'static str = "sales_manager";
    pub const ORDER_VALUE: &'static str = "order_value_EUR";
    pub const COST: &'static str = "cost";

    pub fn resolve(table: &Table) -> Result<Self> {
        Ok(SalesColumns {
            country: table.column_index(Self::COUNTRY)?,
            category: table.column_index(Self::CATEGORY)?,
            date: table.column_index(Self::DATE)?,
            sales_rep: table.column_index(Self::SALES_REP)?,
            sales_manager: table.column_index(Self::SALES_MANAGER)?,
            order_value: table.column_index(Self::ORDER_VALUE)?,
            cost: table.column_index(Self::COST)?,
        })
    }
}

/// Output of the normalizer: a table whose money and date columns are typed.
#[derive(Debug, Clone)]
pub struct NormalizedTable {
    pub table: Table,
    pub columns: SalesColumns,
    pub degraded: DegradedFields,
}

/// How many fields the normalizer had to turn into missing values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DegradedFields {
    pub order_value_eur: usize,
    pub cost: usize,
    pub date: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleanRecord {
    pub country: String,
    pub category: String,
    pub date: NaiveDate,
    pub sales_rep: String,
    pub sales_manager: String,
    pub order_value_eur: f64,
    pub cost: f64,
}

/// The table after null-row removal and the non-negativity filter, plus a
/// typed view of the columns the reports need.
#[derive(Debug, Clone)]
pub struct CleanedTable {
    pub table: Table,
    pub records: Vec<CleanRecord>,
    pub dropped_null_rows: usize,
    pub dropped_negative_rows: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub keys: Vec<String>,
    pub total: f64,
    pub formatted: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub name: &'static str,
    pub key_columns: Vec<&'static str>,
    pub sum_column: &'static str,
    pub formatted_column: &'static str,
    pub rows: Vec<ReportRow>,
}

impl Report {
    /// Header in output order: keys, raw sum, display string.
    pub fn header(&self) -> Vec<&'static str> {
        let mut h = self.key_columns.clone();
        h.push(self.sum_column);
        h.push(self.formatted_column);
        h
    }

    pub fn record(row: &ReportRow) -> Vec<String> {
        let mut rec = row.keys.clone();
        rec.push(row.total.to_string());
        rec.push(row.formatted.clone());
        rec
    }
}

#[derive(Debug, Serialize)]
pub struct ReportSummary {
    pub name: String,
    pub rows: usize,
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub input: String,
    pub loaded_rows: usize,
    pub loaded_columns: usize,
    pub degraded_fields: DegradedFields,
    pub dropped_null_rows: usize,
    pub dropped_negative_rows: usize,
    pub cleaned_rows: usize,
    pub total_order_value_eur: f64,
    pub total_cost: f64,
    pub reports: Vec<ReportSummary>,
}
