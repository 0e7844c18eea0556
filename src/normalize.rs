use std::collections::HashSet;

use tracing::{debug, warn};

use crate::error::{EtlError, ParseError, Result};
use crate::types::{ColumnType, DegradedFields, NormalizedTable, SalesColumns, Table, Value};
use crate::util::{parse_amount, parse_us_date};

/// Trim, resolve the report columns, repair both money columns and parse the
/// date column.
pub fn normalize(table: &Table) -> Result<NormalizedTable> {
    let trimmed = trim_headers(table)?;
    let columns = SalesColumns::resolve(&trimmed)?;

    let (with_value, value_degraded) = repair_amount(&trimmed, columns.order_value);
    let (with_cost, cost_degraded) = repair_amount(&with_value, columns.cost);
    let (with_date, date_degraded) = parse_dates(&with_cost, columns.date);

    let degraded = DegradedFields {
        order_value_eur: value_degraded,
        cost: cost_degraded,
        date: date_degraded,
    };
    if degraded != DegradedFields::default() {
        warn!(
            order_value_eur = degraded.order_value_eur,
            cost = degraded.cost,
            date = degraded.date,
            "unparsable fields replaced by missing values"
        );
    }

    Ok(NormalizedTable {
        table: with_date,
        columns,
        degraded,
    })
}

/// Strip surrounding whitespace from every column name.
pub fn trim_headers(table: &Table) -> Result<Table> {
    let headers: Vec<String> = table.headers.iter().map(|h| h.trim().to_string()).collect();
    let mut seen = HashSet::new();
    for h in &headers {
        if !seen.insert(h.as_str()) {
            return Err(EtlError::Schema(format!(
                "column name {:?} occurs more than once after trimming",
                h
            )));
        }
    }
    Ok(Table {
        headers,
        types: table.types.clone(),
        rows: table.rows.clone(),
    })
}

/// Remove thousands separators from one column and cast it to double. Cells
/// that do not parse become `Null`. Returns the new table and the number of
/// present cells that were lost.
pub fn repair_amount(table: &Table, idx: usize) -> (Table, usize) {
    let name = &table.headers[idx];
    map_column(table, idx, ColumnType::Double, |value| match value {
        Value::Null => Ok(Value::Null),
        Value::Int(i) => Ok(Value::Float(*i as f64)),
        Value::Float(f) => Ok(Value::Float(*f)),
        Value::Text(s) => parse_amount(s).map(Value::Float),
        Value::Date(d) => Err(ParseError::Number(d.to_string())),
    })
    .inspect_degraded(name)
}

/// Parse a `MM/DD/YYYY` column into dates; non-matching cells become `Null`.
pub fn parse_dates(table: &Table, idx: usize) -> (Table, usize) {
    let name = &table.headers[idx];
    map_column(table, idx, ColumnType::Date, |value| match value {
        Value::Null => Ok(Value::Null),
        Value::Date(d) => Ok(Value::Date(*d)),
        Value::Text(s) => parse_us_date(s).map(Value::Date),
        other => Err(ParseError::Date(other.to_string())),
    })
    .inspect_degraded(name)
}

struct Mapped {
    table: Table,
    failures: Vec<(usize, ParseError)>,
}

impl Mapped {
    fn inspect_degraded(self, column: &str) -> (Table, usize) {
        for (row, err) in &self.failures {
            debug!(column, row, error = %err, "field degraded to missing");
        }
        (self.table, self.failures.len())
    }
}

fn map_column<F>(table: &Table, idx: usize, ty: ColumnType, f: F) -> Mapped
where
    F: Fn(&Value) -> std::result::Result<Value, ParseError>,
{
    let mut failures = Vec::new();
    let rows = table
        .rows
        .iter()
        .enumerate()
        .map(|(row_no, row)| {
            let mut out = row.clone();
            out[idx] = match f(&row[idx]) {
                Ok(v) => v,
                Err(err) => {
                    failures.push((row_no, err));
                    Value::Null
                }
            };
            out
        })
        .collect();
    let mut types = table.types.clone();
    types[idx] = ty;
    Mapped {
        table: Table {
            headers: table.headers.clone(),
            types,
            rows,
        },
        failures,
    }
}
