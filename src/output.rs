use crate::error::{EtlError, Result};
use crate::types::{Report, Table};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tabled::{builder::Builder, settings::Style};
use tempfile::TempDir;
use tracing::{debug, info, warn};

pub const PART_FILE: &str = "part-00000.csv";
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// A report fully written to a hidden staging directory under the output
/// root, waiting to be swapped into place.
pub struct StagedReport {
    name: &'static str,
    staging: TempDir,
    target: PathBuf,
}

impl StagedReport {
    pub fn path(&self) -> &Path {
        self.staging.path()
    }

    /// Replace whatever lives at the target with the staged directory.
    ///
    /// The previous content is renamed aside first and only deleted once the
    /// new directory is in place; if the final rename fails it is restored.
    pub fn commit(self) -> Result<PathBuf> {
        let parent = self.target.parent().unwrap_or_else(|| Path::new("."));
        let backup = parent.join(format!(".{}.old-{}", self.name, std::process::id()));

        let had_previous = fs::symlink_metadata(&self.target).is_ok();
        if had_previous {
            if fs::symlink_metadata(&backup).is_ok() {
                remove_path(&backup)?;
            }
            fs::rename(&self.target, &backup).map_err(|e| EtlError::io(&self.target, e))?;
        }

        let staged = self.staging.keep();
        if let Err(e) = fs::rename(&staged, &self.target) {
            if had_previous {
                if let Err(restore) = fs::rename(&backup, &self.target) {
                    warn!(path = %backup.display(), error = %restore, "could not restore previous output");
                }
            }
            let _ = fs::remove_dir_all(&staged);
            return Err(EtlError::io(&self.target, e));
        }

        if had_previous {
            remove_path(&backup)?;
            info!("Removed existing output: {}", self.target.display());
        }
        Ok(self.target)
    }
}

fn remove_path(path: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(path).map_err(|e| EtlError::io(path, e))?;
    let removed = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    removed.map_err(|e| EtlError::io(path, e))
}

/// Write one report as `part-00000.csv` plus a `_SUCCESS` marker into a fresh
/// staging directory under `root`.
pub fn stage_report(root: &Path, report: &Report) -> Result<StagedReport> {
    let staging = tempfile::Builder::new()
        .prefix(&format!(".{}.staging-", report.name))
        .tempdir_in(root)
        .map_err(|e| EtlError::io(root, e))?;
    write_csv(&staging.path().join(PART_FILE), report)?;
    let marker = staging.path().join(SUCCESS_MARKER);
    fs::File::create(&marker).map_err(|e| EtlError::io(&marker, e))?;
    let staged = StagedReport {
        name: report.name,
        staging,
        target: root.join(report.name),
    };
    debug!(report = report.name, path = %staged.path().display(), "staged report");
    Ok(staged)
}

pub fn write_csv(path: &Path, report: &Report) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(report.header())?;
    for row in &report.rows {
        wtr.write_record(Report::record(row))?;
    }
    wtr.flush().map_err(|e| EtlError::io(path, e))?;
    Ok(())
}

/// Stage every report, then swap them into place in order. Nothing live is
/// touched unless all reports staged cleanly; dropped staging directories
/// clean up after themselves.
pub fn write_reports(root: &Path, reports: &[Report]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(root).map_err(|e| EtlError::io(root, e))?;
    let staged = reports
        .iter()
        .map(|r| stage_report(root, r))
        .collect::<Result<Vec<_>>>()?;
    staged
        .into_iter()
        .map(|s| {
            let path = s.commit()?;
            info!("Saved report to {}", path.display());
            Ok(path)
        })
        .collect()
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    fs::write(path, s).map_err(|e| EtlError::io(path, e))?;
    Ok(())
}

/// Print the first `max_rows` rows of a report as a markdown table.
pub fn preview_report(report: &Report, max_rows: usize) {
    println!("\n{}\n", report.name);
    if report.rows.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let mut builder = Builder::default();
    builder.push_record(report.header().into_iter().map(String::from));
    for row in report.rows.iter().take(max_rows) {
        builder.push_record(Report::record(row));
    }
    let mut table = builder.build();
    table.with(Style::markdown());
    println!("{}\n", table);
    if report.rows.len() > max_rows {
        println!("only showing top {} rows\n", max_rows);
    }
}

/// Print a sample of a loaded table, values rendered as text.
pub fn preview_table(table: &Table, max_rows: usize) {
    if table.rows.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let mut builder = Builder::default();
    builder.push_record(table.headers.iter().cloned());
    for row in table.rows.iter().take(max_rows) {
        builder.push_record(row.iter().map(|v| {
            if v.is_null() {
                "null".to_string()
            } else {
                v.to_string()
            }
        }));
    }
    let mut rendered = builder.build();
    rendered.with(Style::markdown());
    println!("{}\n", rendered);
}
