use crate::types::{CleanRecord, Report, ReportRow};
use crate::util::format_number;
use chrono::Datelike;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Groups in the order their first row appeared.
    FirstSeen,
    /// Descending by sum; ties keep first-seen order.
    TotalDesc,
}

/// Static description of one report.
pub struct ReportSpec {
    pub name: &'static str,
    pub key_columns: &'static [&'static str],
    pub sum_column: &'static str,
    pub formatted_column: &'static str,
    pub key: fn(&CleanRecord) -> Vec<String>,
    pub sort: SortOrder,
}

fn by_country(r: &CleanRecord) -> Vec<String> {
    vec![r.country.clone()]
}

fn by_category(r: &CleanRecord) -> Vec<String> {
    vec![r.category.clone()]
}

fn by_year_month(r: &CleanRecord) -> Vec<String> {
    vec![r.date.year().to_string(), r.date.month().to_string()]
}

fn by_rep(r: &CleanRecord) -> Vec<String> {
    vec![r.sales_rep.clone()]
}

fn by_manager(r: &CleanRecord) -> Vec<String> {
    vec![r.sales_manager.clone()]
}

fn by_manager_rep(r: &CleanRecord) -> Vec<String> {
    vec![r.sales_manager.clone(), r.sales_rep.clone()]
}

/// The six reports, in the order they are written.
pub static REPORTS: [ReportSpec; 6] = [
    ReportSpec {
        name: "country_sales",
        key_columns: &["country"],
        sum_column: "total_sales",
        formatted_column: "total_sales_formatted",
        key: by_country,
        sort: SortOrder::FirstSeen,
    },
    ReportSpec {
        name: "category_sales",
        key_columns: &["category"],
        sum_column: "total_category_wise_sales",
        formatted_column: "category_sales_formatted",
        key: by_category,
        sort: SortOrder::FirstSeen,
    },
    ReportSpec {
        name: "monthly_sales",
        key_columns: &["year", "month"],
        sum_column: "monthly_sales",
        formatted_column: "monthly_sales_formatted",
        key: by_year_month,
        sort: SortOrder::FirstSeen,
    },
    ReportSpec {
        name: "top_salesman",
        key_columns: &["sales_rep"],
        sum_column: "top_salesman",
        formatted_column: "top_salesman_formatted",
        key: by_rep,
        sort: SortOrder::TotalDesc,
    },
    ReportSpec {
        name: "top_salesmanager",
        key_columns: &["sales_manager"],
        sum_column: "top_salesmanager",
        formatted_column: "top_salesmanager_formatted",
        key: by_manager,
        sort: SortOrder::TotalDesc,
    },
    ReportSpec {
        name: "top_sales",
        key_columns: &["sales_manager", "sales_rep"],
        sum_column: "total_sales",
        formatted_column: "total_sales_formatted",
        key: by_manager_rep,
        sort: SortOrder::TotalDesc,
    },
];

/// Sum `order_value_EUR` per key. Groups come back in first-seen order.
pub fn group_sum<F>(data: &[CleanRecord], key: F) -> Vec<(Vec<String>, f64)>
where
    F: Fn(&CleanRecord) -> Vec<String>,
{
    let mut index: HashMap<Vec<String>, usize> = HashMap::new();
    let mut groups: Vec<(Vec<String>, f64)> = Vec::new();
    for r in data {
        let k = key(r);
        match index.get(&k) {
            Some(&i) => groups[i].1 += r.order_value_eur,
            None => {
                index.insert(k.clone(), groups.len());
                groups.push((k, r.order_value_eur));
            }
        }
    }
    groups
}

pub fn generate_report(spec: &ReportSpec, data: &[CleanRecord]) -> Report {
    let mut groups = group_sum(data, spec.key);
    if spec.sort == SortOrder::TotalDesc {
        // `sort_by` is stable, so equal totals stay in first-seen order.
        groups.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    }
    let rows: Vec<ReportRow> = groups
        .into_iter()
        .map(|(keys, total)| ReportRow {
            keys,
            total,
            formatted: format_number(total, 2),
        })
        .collect();
    debug!(report = spec.name, groups = rows.len(), "aggregated report");
    Report {
        name: spec.name,
        key_columns: spec.key_columns.to_vec(),
        sum_column: spec.sum_column,
        formatted_column: spec.formatted_column,
        rows,
    }
}

/// Build every report. The passes share nothing mutable, so they run on the
/// rayon pool; the result keeps the order of [`REPORTS`].
pub fn generate_all(data: &[CleanRecord]) -> Vec<Report> {
    REPORTS
        .par_iter()
        .map(|spec| generate_report(spec, data))
        .collect()
}
