use tracing::info;

use crate::error::{EtlError, Result};
use crate::types::{CleanRecord, CleanedTable, NormalizedTable, SalesColumns, Table, Value};
use crate::util::format_int;

/// Null-row drop first, then the non-negativity filter. The order matters: a
/// missing amount cannot be compared against zero.
pub fn clean(normalized: &NormalizedTable) -> Result<CleanedTable> {
    let cols = normalized.columns;
    let before = normalized.table.rows.len();

    let non_null = drop_nulls(&normalized.table);
    let dropped_null_rows = before - non_null.rows.len();

    let valid = drop_negative(&non_null, cols);
    let dropped_negative_rows = non_null.rows.len() - valid.rows.len();

    let records = valid
        .rows
        .iter()
        .map(|row| to_record(row, cols))
        .collect::<Result<Vec<_>>>()?;

    info!(
        "Cleaned table: {} rows kept, {} dropped for missing values, {} dropped for negative amounts",
        format_int(records.len()),
        format_int(dropped_null_rows),
        format_int(dropped_negative_rows)
    );

    Ok(CleanedTable {
        table: valid,
        records,
        dropped_null_rows,
        dropped_negative_rows,
    })
}

/// Keep only rows with a value in every column, report columns or not.
pub fn drop_nulls(table: &Table) -> Table {
    filter_rows(table, |row| !row.iter().any(Value::is_null))
}

/// Keep rows where both `cost` and `order_value_EUR` are non-negative.
pub fn drop_negative(table: &Table, cols: SalesColumns) -> Table {
    let non_negative = |v: &Value| matches!(v.as_f64(), Some(x) if x >= 0.0);
    filter_rows(table, |row| {
        non_negative(&row[cols.cost]) && non_negative(&row[cols.order_value])
    })
}

fn filter_rows<F>(table: &Table, keep: F) -> Table
where
    F: Fn(&[Value]) -> bool,
{
    Table {
        headers: table.headers.clone(),
        types: table.types.clone(),
        rows: table
            .rows
            .iter()
            .filter(|row| keep(row.as_slice()))
            .cloned()
            .collect(),
    }
}

fn to_record(row: &[Value], cols: SalesColumns) -> Result<CleanRecord> {
    let number = |idx: usize, name: &str| {
        row[idx].as_f64().ok_or_else(|| {
            EtlError::Schema(format!("column {:?} is not numeric after normalization", name))
        })
    };
    let date = row[cols.date].as_date().ok_or_else(|| {
        EtlError::Schema(format!(
            "column {:?} is not a date after normalization",
            SalesColumns::DATE
        ))
    })?;
    Ok(CleanRecord {
        country: row[cols.country].to_string(),
        category: row[cols.category].to_string(),
        date,
        sales_rep: row[cols.sales_rep].to_string(),
        sales_manager: row[cols.sales_manager].to_string(),
        order_value_eur: number(cols.order_value, SalesColumns::ORDER_VALUE)?,
        cost: number(cols.cost, SalesColumns::COST)?,
    })
}
