use clap::Parser;
use std::path::PathBuf;

/// Clean a sales export and write the six aggregate sales reports.
#[derive(Parser, Debug, Clone)]
#[command(name = "sales_etl", version, about, long_about = None)]
pub struct Config {
    /// Input CSV file (header row required)
    #[arg(
        short,
        long,
        env = "SALES_ETL_INPUT",
        default_value = "./data/Sales-Export_2019-2020.csv"
    )]
    pub input: PathBuf,

    /// Directory the report folders are written under
    #[arg(short, long, env = "SALES_ETL_OUTPUT_ROOT", default_value = "./data/")]
    pub output_root: PathBuf,

    /// Keep every input column as text instead of inferring numeric types
    #[arg(long, default_value_t = false)]
    pub no_infer_schema: bool,

    /// Rows shown per report preview on stdout (0 disables previews)
    #[arg(long, env = "SALES_ETL_PREVIEW_ROWS", default_value_t = 20)]
    pub preview_rows: usize,

    /// Also write a JSON run summary to this path
    #[arg(long)]
    pub summary: Option<PathBuf>,
}
