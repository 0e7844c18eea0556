// The whole run: load, normalize, clean, aggregate, write. Each stage gets the
// previous stage's output by reference and returns a new value.
use std::time::Instant;

use tracing::span::EnteredSpan;
use tracing::{info, info_span, warn};

use crate::clean::clean;
use crate::config::Config;
use crate::error::Result;
use crate::loader::{load_table, LoadOptions};
use crate::normalize::normalize;
use crate::output::{preview_report, preview_table, write_json, write_reports};
use crate::reports::generate_all;
use crate::types::{ReportSummary, RunSummary};
use crate::util::format_int;

const SAMPLE_ROWS: usize = 5;

/// Scoped run context. Opens a span for the run and reports how it ended
/// when dropped, whether the run finished or bailed out with `?`.
pub struct Session {
    app_name: &'static str,
    started: Instant,
    finished: bool,
    _span: EnteredSpan,
}

impl Session {
    pub fn start(app_name: &'static str) -> Self {
        let span = info_span!("session", app = app_name).entered();
        info!("Starting {}", app_name);
        Session {
            app_name,
            started: Instant::now(),
            finished: false,
            _span: span,
        }
    }

    pub fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        if self.finished {
            info!(elapsed_ms, "{} finished", self.app_name);
        } else {
            warn!(elapsed_ms, "{} aborted", self.app_name);
        }
    }
}

pub fn run(config: &Config) -> Result<RunSummary> {
    let session = Session::start("SalesETL");
    let show = config.preview_rows > 0;

    let table = load_table(
        &config.input,
        LoadOptions {
            infer_schema: !config.no_infer_schema,
        },
    )?;
    let (loaded_rows, loaded_columns) = table.shape();
    info!("Shape: ({},{})", loaded_rows, loaded_columns);
    for (name, ty) in table.headers.iter().zip(&table.types) {
        info!(column = %name, ty = %ty, "schema");
    }
    if show {
        preview_table(&table, SAMPLE_ROWS);
    }

    let normalized = normalize(&table)?;
    if show {
        preview_table(&normalized.table, SAMPLE_ROWS);
    }

    let cleaned = clean(&normalized)?;
    let (cleaned_rows, _) = cleaned.table.shape();
    info!("Cleaned shape: ({},{})", cleaned_rows, loaded_columns);

    let reports = generate_all(&cleaned.records);
    if show {
        for report in &reports {
            preview_report(report, config.preview_rows);
        }
    }

    let paths = write_reports(&config.output_root, &reports)?;
    info!(
        "Wrote {} reports under {}",
        format_int(paths.len()),
        config.output_root.display()
    );

    let summary = RunSummary {
        input: config.input.display().to_string(),
        loaded_rows,
        loaded_columns,
        degraded_fields: normalized.degraded,
        dropped_null_rows: cleaned.dropped_null_rows,
        dropped_negative_rows: cleaned.dropped_negative_rows,
        cleaned_rows,
        total_order_value_eur: cleaned.records.iter().map(|r| r.order_value_eur).sum(),
        total_cost: cleaned.records.iter().map(|r| r.cost).sum(),
        reports: reports
            .iter()
            .zip(&paths)
            .map(|(r, p)| ReportSummary {
                name: r.name.to_string(),
                rows: r.rows.len(),
                path: p.display().to_string(),
            })
            .collect(),
    };
    if let Some(path) = &config.summary {
        write_json(path, &summary)?;
        info!("Run summary written to {}", path.display());
    }

    session.finish();
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EtlError;
    use crate::output::PART_FILE;
    use std::fs;
    use std::io;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use tempfile::{tempdir, TempDir};
    use tracing_subscriber::EnvFilter;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    /// Run with a thread-local subscriber and return what it logged.
    fn run_logged(cfg: &Config) -> (Result<RunSummary>, String) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let result = tracing::subscriber::with_default(subscriber, || run(cfg));
        (result, logs.contents())
    }

    fn init_test_logging() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_test_writer()
            .try_init();
    }

    const EXPORT: &str = "\
 country ,category,date,sales_rep,sales_manager,order_value_EUR, cost ,order_id
DE,Tools,01/15/2019,Ann,Max,\"1,000.00\",\"1,200\",1
DE,Garden,01/20/2019,Bob,Max,500.50,20,2
FR,Tools,02/03/2019,Ann,Max,250,10,3
FR,Garden,13/40/2020,Cid,Eva,999,10,4
IT,Tools,03/01/2020,Cid,Eva,300,-5,5
IT,Tools,03/09/2020,Dan,Eva,700,5,
ES,Garden,03/10/2020,Dan,Eva,700,5,7
";

    fn config(dir: &TempDir, input: &Path) -> Config {
        Config {
            input: input.to_path_buf(),
            output_root: dir.path().join("out"),
            no_infer_schema: false,
            preview_rows: 0,
            summary: Some(dir.path().join("summary.json")),
        }
    }

    fn read_report(root: &Path, name: &str) -> String {
        fs::read_to_string(root.join(name).join(PART_FILE)).unwrap()
    }

    #[test]
    fn end_to_end_run_writes_all_reports() -> anyhow::Result<()> {
        init_test_logging();
        let dir = tempdir()?;
        let input = dir.path().join("sales.csv");
        fs::write(&input, EXPORT)?;
        let cfg = config(&dir, &input);

        let summary = run(&cfg)?;
        assert_eq!(summary.loaded_rows, 7);
        assert_eq!(summary.dropped_null_rows, 2);
        assert_eq!(summary.dropped_negative_rows, 1);
        assert_eq!(summary.cleaned_rows, 4);
        assert_eq!(summary.degraded_fields.date, 1);
        assert_eq!(summary.total_order_value_eur, 2450.5);
        assert_eq!(summary.total_cost, 1235.0);
        assert_eq!(summary.reports.len(), 6);

        let root = &cfg.output_root;
        assert_eq!(
            read_report(root, "country_sales"),
            "country,total_sales,total_sales_formatted\n\
             DE,1500.5,\"1,500.50\"\n\
             FR,250,250.00\n\
             ES,700,700.00\n"
        );
        assert_eq!(
            read_report(root, "monthly_sales"),
            "year,month,monthly_sales,monthly_sales_formatted\n\
             2019,1,1500.5,\"1,500.50\"\n\
             2019,2,250,250.00\n\
             2020,3,700,700.00\n"
        );
        assert_eq!(
            read_report(root, "top_salesman"),
            "sales_rep,top_salesman,top_salesman_formatted\n\
             Ann,1250,\"1,250.00\"\n\
             Dan,700,700.00\n\
             Bob,500.5,500.50\n"
        );
        assert_eq!(
            read_report(root, "top_sales"),
            "sales_manager,sales_rep,total_sales,total_sales_formatted\n\
             Max,Ann,1250,\"1,250.00\"\n\
             Eva,Dan,700,700.00\n\
             Max,Bob,500.5,500.50\n"
        );
        assert!(cfg.summary.as_ref().unwrap().exists());
        Ok(())
    }

    #[test]
    fn second_run_is_byte_identical() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let input = dir.path().join("sales.csv");
        fs::write(&input, EXPORT)?;
        let cfg = config(&dir, &input);

        run(&cfg)?;
        let first: Vec<String> = crate::reports::REPORTS
            .iter()
            .map(|s| read_report(&cfg.output_root, s.name))
            .collect();
        run(&cfg)?;
        let second: Vec<String> = crate::reports::REPORTS
            .iter()
            .map(|s| read_report(&cfg.output_root, s.name))
            .collect();
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn missing_column_aborts_without_touching_output() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let input = dir.path().join("sales.csv");
        fs::write(&input, "country,category,date\nDE,Tools,01/01/2020\n")?;
        let cfg = config(&dir, &input);

        let err = run(&cfg).unwrap_err();
        assert!(matches!(err, EtlError::Schema(_)));
        assert!(!cfg.output_root.exists());
        Ok(())
    }

    #[test]
    fn session_reports_finish_and_abort() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let input = dir.path().join("sales.csv");
        fs::write(&input, EXPORT)?;
        let cfg = config(&dir, &input);

        let (ok, logs) = run_logged(&cfg);
        assert!(ok.is_ok());
        assert!(logs.contains("SalesETL finished"), "{logs}");
        assert!(!logs.contains("SalesETL aborted"), "{logs}");

        fs::write(&input, "country\nDE\n")?;
        let (failed, logs) = run_logged(&cfg);
        assert!(matches!(failed, Err(EtlError::Schema(_))));
        assert!(logs.contains("SalesETL aborted"), "{logs}");
        assert!(!logs.contains("SalesETL finished"), "{logs}");
        Ok(())
    }

    #[test]
    fn missing_input_is_io_error() {
        let dir = tempdir().unwrap();
        let cfg = config(&dir, &dir.path().join("nope.csv"));
        assert!(matches!(run(&cfg), Err(EtlError::Io { .. })));
    }
}
