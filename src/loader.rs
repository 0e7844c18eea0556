use crate::error::{EtlError, Result};
use crate::types::{ColumnType, Table, Value};
use crate::util::looks_numeric;
use csv::{ErrorKind, ReaderBuilder, StringRecord};
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    /// Infer integer/double columns from content. When off every column is
    /// kept as text.
    pub infer_schema: bool,
}

pub fn load_table(path: &Path, opts: LoadOptions) -> Result<Table> {
    let file = File::open(path).map_err(|e| EtlError::io(path, e))?;
    let rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(file);
    let table = read_table(rdr, opts)?;
    let (rows, cols) = table.shape();
    info!(path = %path.display(), rows, cols, "loaded input");
    Ok(table)
}

pub fn read_table<R: std::io::Read>(mut rdr: csv::Reader<R>, opts: LoadOptions) -> Result<Table> {
    let headers: Vec<String> = rdr
        .headers()
        .map_err(map_csv_error)?
        .iter()
        .map(|h| h.to_string())
        .collect();
    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err(EtlError::Format {
            line: 1,
            message: "missing header row".to_string(),
        });
    }

    let mut raw: Vec<StringRecord> = Vec::new();
    for result in rdr.records() {
        raw.push(result.map_err(map_csv_error)?);
    }

    let types: Vec<ColumnType> = (0..headers.len())
        .map(|idx| {
            if opts.infer_schema {
                infer_column(raw.iter().map(|r| r.get(idx).unwrap_or("")))
            } else {
                ColumnType::String
            }
        })
        .collect();
    for (name, ty) in headers.iter().zip(&types) {
        debug!(column = %name, ty = %ty, "inferred column type");
    }

    let rows = raw
        .iter()
        .map(|rec| {
            rec.iter()
                .zip(&types)
                .map(|(field, ty)| to_value(field, *ty))
                .collect()
        })
        .collect();

    Ok(Table {
        headers,
        types,
        rows,
    })
}

fn map_csv_error(err: csv::Error) -> EtlError {
    match err.kind() {
        ErrorKind::UnequalLengths {
            pos,
            expected_len,
            len,
        } => EtlError::Format {
            line: pos.as_ref().map(|p| p.line()).unwrap_or(0),
            message: format!("expected {} fields, found {}", expected_len, len),
        },
        ErrorKind::Utf8 { pos, err: utf8 } => EtlError::Format {
            line: pos.as_ref().map(|p| p.line()).unwrap_or(0),
            message: format!("invalid UTF-8: {}", utf8),
        },
        _ => EtlError::Csv(err),
    }
}

/// Integer if every non-empty value parses as `i64`, double if every one
/// parses as `f64`, text otherwise. An all-empty column stays text.
fn infer_column<'a>(values: impl Iterator<Item = &'a str>) -> ColumnType {
    let mut ty = ColumnType::Integer;
    let mut seen = false;
    for v in values.filter(|v| !v.is_empty()) {
        seen = true;
        if !looks_numeric(v) {
            return ColumnType::String;
        }
        if ty == ColumnType::Integer && v.parse::<i64>().is_err() {
            ty = ColumnType::Double;
        }
        if ty == ColumnType::Double && v.parse::<f64>().is_err() {
            return ColumnType::String;
        }
    }
    if seen {
        ty
    } else {
        ColumnType::String
    }
}

fn to_value(field: &str, ty: ColumnType) -> Value {
    if field.is_empty() {
        return Value::Null;
    }
    match ty {
        ColumnType::Integer => field.parse().map(Value::Int).unwrap_or(Value::Null),
        ColumnType::Double => field.parse().map(Value::Float).unwrap_or(Value::Null),
        _ => Value::Text(field.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const INFER: LoadOptions = LoadOptions { infer_schema: true };

    fn reader(data: &str) -> csv::Reader<&[u8]> {
        ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(data.as_bytes())
    }

    #[test]
    fn infers_numeric_columns_and_keeps_text() {
        let data = "id, country ,order_value_EUR,price\n1,DE,\"1,200.50\",2.5\n2,FR,300,3\n";
        let t = read_table(reader(data), INFER).unwrap();
        assert_eq!(t.headers, vec!["id", " country ", "order_value_EUR", "price"]);
        assert_eq!(
            t.types,
            vec![
                ColumnType::Integer,
                ColumnType::String,
                ColumnType::String,
                ColumnType::Double
            ]
        );
        assert_eq!(t.rows[0][0], Value::Int(1));
        assert_eq!(t.rows[0][2], Value::Text("1,200.50".into()));
        assert_eq!(t.rows[1][3], Value::Float(3.0));
    }

    #[test]
    fn scientific_notation_is_numeric() {
        let data = "a,b\n1e3,x1\n2,e\n";
        let t = read_table(reader(data), INFER).unwrap();
        assert_eq!(t.types, vec![ColumnType::Double, ColumnType::String]);
        assert_eq!(t.rows[0][0], Value::Float(1000.0));
    }

    #[test]
    fn empty_fields_load_as_null() {
        let data = "a,b\n1,\n,x\n";
        let t = read_table(reader(data), INFER).unwrap();
        assert_eq!(t.rows[0][1], Value::Null);
        assert_eq!(t.rows[1][0], Value::Null);
        assert_eq!(t.types[0], ColumnType::Integer);
    }

    #[test]
    fn fixed_text_schema_when_inference_is_off() {
        let data = "a,b\n1,2\n";
        let t = read_table(reader(data), LoadOptions { infer_schema: false }).unwrap();
        assert_eq!(t.types, vec![ColumnType::String, ColumnType::String]);
        assert_eq!(t.rows[0][0], Value::Text("1".into()));
    }

    #[test]
    fn ragged_rows_are_a_format_error() {
        let data = "a,b\n1,2\n3\n";
        let err = read_table(reader(data), INFER).unwrap_err();
        match err {
            EtlError::Format { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_input_has_no_header() {
        let err = read_table(reader(""), INFER).unwrap_err();
        assert!(matches!(err, EtlError::Format { line: 1, .. }));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_table(Path::new("/definitely/not/here.csv"), INFER)
            .unwrap_err();
        assert!(matches!(err, EtlError::Io { .. }));
    }

    #[test]
    fn loads_from_disk() -> anyhow::Result<()> {
        let mut tmp = NamedTempFile::new()?;
        write!(tmp, "country,cost\nDE,5\n")?;
        let t = load_table(tmp.path(), INFER)?;
        assert_eq!(t.shape(), (1, 2));
        Ok(())
    }
}
