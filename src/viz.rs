//! Exploratory summary and charts of a churn table using Plotters

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use plotters::prelude::*;
use polars::prelude::*;
use tracing::info;

use crate::data::{clean_table, target_values};
use crate::error::ChurnError;
use crate::features::TARGET_COLUMN;

/// Bar colors for retained vs churned customers
const STAY_COLOR: RGBColor = RGBColor(68, 1, 84);
const CHURN_COLOR: RGBColor = RGBColor(53, 183, 121);

/// Retained / churned counts for one category value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryChurn {
    pub category: String,
    pub stayed: usize,
    pub churned: usize,
}

/// Churn flag per row, from the numeric target.
pub fn churn_flags(df: &DataFrame) -> crate::Result<Vec<bool>> {
    let target = df.column(TARGET_COLUMN)?;
    Ok(target_values(target)?.into_iter().map(|v| v > 0.5).collect())
}

/// (stayed, churned) totals.
pub fn churn_counts(df: &DataFrame) -> crate::Result<(usize, usize)> {
    let flags = churn_flags(df)?;
    let churned = flags.iter().filter(|&&c| c).count();
    Ok((flags.len() - churned, churned))
}

/// Retained / churned counts per value of a text column, sorted by value.
pub fn churn_by_category(df: &DataFrame, column: &str) -> crate::Result<Vec<CategoryChurn>> {
    let flags = churn_flags(df)?;
    let values = df.column(column)?.str()?;

    let mut counts: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for (value, churned) in values.into_iter().zip(flags) {
        let entry = counts
            .entry(value.unwrap_or("Unknown").to_string())
            .or_insert((0, 0));
        if churned {
            entry.1 += 1;
        } else {
            entry.0 += 1;
        }
    }

    Ok(counts
        .into_iter()
        .map(|(category, (stayed, churned))| CategoryChurn {
            category,
            stayed,
            churned,
        })
        .collect())
}

/// Equal-width histogram bins as (lower edge, upper edge, count).
pub fn histogram(values: &[f64], bins: usize) -> Vec<(f64, f64, usize)> {
    let bins = bins.max(1);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !min.is_finite() || !max.is_finite() {
        return Vec::new();
    }
    let width = if max > min { (max - min) / bins as f64 } else { 1.0 };

    let mut counts = vec![0usize; bins];
    for &value in values {
        let index = (((value - min) / width) as usize).min(bins - 1);
        counts[index] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| {
            let lower = min + i as f64 * width;
            (lower, lower + width, count)
        })
        .collect()
}

fn numeric_column(df: &DataFrame, name: &str) -> crate::Result<Vec<f64>> {
    Ok(df
        .column(name)?
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .flatten()
        .collect())
}

/// Bar chart of retained vs churned customers.
pub fn create_churn_distribution_chart(
    counts: (usize, usize),
    output_path: &Path,
) -> crate::Result<()> {
    let (stayed, churned) = counts;
    let max_count = stayed.max(churned).max(1) as f64;

    let root = BitMapBackend::new(output_path, (600, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let labels = ["No", "Yes"];
    let mut chart = ChartBuilder::on(&root)
        .caption("Churn Distribution", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..1.5f64, 0f64..(max_count * 1.1))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(2)
        .x_label_formatter(&|x| category_label(&labels, *x))
        .x_desc("Churn Status")
        .y_desc("Count")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for (i, (&count, color)) in [stayed, churned]
        .iter()
        .zip([STAY_COLOR, CHURN_COLOR])
        .enumerate()
    {
        let x = i as f64;
        chart.draw_series(std::iter::once(Rectangle::new(
            [(x - 0.35, 0.0), (x + 0.35, count as f64)],
            color.filled(),
        )))?;
    }

    root.present()?;
    info!(path = %output_path.display(), "churn distribution chart saved");
    Ok(())
}

/// Grouped bars of retained vs churned customers per category.
pub fn create_churn_by_category_chart(
    rows: &[CategoryChurn],
    column: &str,
    output_path: &Path,
) -> crate::Result<()> {
    let max_count = rows
        .iter()
        .map(|r| r.stayed.max(r.churned))
        .max()
        .unwrap_or(1)
        .max(1) as f64;
    let labels: Vec<&str> = rows.iter().map(|r| r.category.as_str()).collect();
    let title = format!("Churn by {column}");

    let root = BitMapBackend::new(output_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(&title, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..(rows.len() as f64 - 0.5), 0f64..(max_count * 1.1))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(rows.len().max(1))
        .x_label_formatter(&|x| category_label(&labels, *x))
        .x_desc(column)
        .y_desc("Count")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    chart
        .draw_series(rows.iter().enumerate().map(|(i, row)| {
            let x = i as f64;
            Rectangle::new([(x - 0.4, 0.0), (x, row.stayed as f64)], STAY_COLOR.filled())
        }))?
        .label("Stayed")
        .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], STAY_COLOR.filled()));

    chart
        .draw_series(rows.iter().enumerate().map(|(i, row)| {
            let x = i as f64;
            Rectangle::new([(x, 0.0), (x + 0.4, row.churned as f64)], CHURN_COLOR.filled())
        }))?
        .label("Churned")
        .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], CHURN_COLOR.filled()));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    info!(path = %output_path.display(), "category churn chart saved");
    Ok(())
}

/// Histogram of a numeric column.
pub fn create_histogram_chart(
    values: &[f64],
    title: &str,
    x_desc: &str,
    output_path: &Path,
) -> crate::Result<()> {
    let bins = histogram(values, 30);
    let (x_min, x_max) = match (bins.first(), bins.last()) {
        (Some(first), Some(last)) => (first.0, last.1),
        _ => (0.0, 1.0),
    };
    let max_count = bins.iter().map(|b| b.2).max().unwrap_or(1).max(1) as f64;

    let root = BitMapBackend::new(output_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, 0f64..(max_count * 1.1))?;

    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc("Frequency")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    chart.draw_series(bins.iter().map(|&(lower, upper, count)| {
        Rectangle::new([(lower, 0.0), (upper, count as f64)], STAY_COLOR.filled())
    }))?;

    root.present()?;
    info!(path = %output_path.display(), "histogram saved");
    Ok(())
}

/// Scatter of monthly vs total charges colored by churn.
pub fn create_charges_scatter_chart(
    monthly: &[f64],
    total: &[f64],
    churned: &[bool],
    output_path: &Path,
) -> crate::Result<()> {
    let bound = |values: &[f64]| {
        let max = values.iter().copied().fold(0.0, f64::max);
        if max > 0.0 {
            max * 1.05
        } else {
            1.0
        }
    };

    let root = BitMapBackend::new(output_path, (1000, 700)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Monthly Charges vs. Total Charges by Churn Status", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(0f64..bound(monthly), 0f64..bound(total))?;

    chart
        .configure_mesh()
        .x_desc("Monthly Charges ($)")
        .y_desc("Total Charges ($)")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for (label, flag, color) in [("Stayed", false, STAY_COLOR), ("Churned", true, CHURN_COLOR)] {
        let points = monthly
            .iter()
            .zip(total)
            .zip(churned)
            .filter(|&(_, &c)| c == flag)
            .map(|((&m, &t), _)| Circle::new((m, t), 3, color.filled()));
        chart
            .draw_series(points)?
            .label(label)
            .legend(move |(x, y)| Circle::new((x + 5, y), 4, color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    info!(path = %output_path.display(), "charges scatter saved");
    Ok(())
}

fn category_label(labels: &[&str], x: f64) -> String {
    let nearest = x.round();
    if (x - nearest).abs() > 1e-6 || nearest < 0.0 {
        return String::new();
    }
    labels
        .get(nearest as usize)
        .map(|label| label.to_string())
        .unwrap_or_default()
}

/// Label used for null keys in value counts.
const MISSING_KEY: &str = "<missing>";

/// Distribution statistics of one numeric column, over its present values.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericStats {
    pub column: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub median: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

/// What the EDA report prints about a table before imputation.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSummary {
    pub rows: usize,
    pub columns: usize,
    /// Null cells per column, in table order.
    pub missing: Vec<(String, usize)>,
    pub duplicate_rows: usize,
    pub numeric: Vec<NumericStats>,
    /// Per text column: (value, count), most frequent first.
    pub value_counts: Vec<(String, Vec<(String, usize)>)>,
    /// (stayed, churned) when the target column is present.
    pub churn: Option<(usize, usize)>,
}

fn numeric_stats(column: &Series) -> crate::Result<NumericStats> {
    let values = column.cast(&DataType::Float64)?;
    let values = values.f64()?;
    let quantile = |q: f64| values.quantile(q, QuantileInterpolOptions::Linear);
    Ok(NumericStats {
        column: column.name().to_string(),
        count: values.len() - values.null_count(),
        mean: values.mean(),
        std: values.std(1),
        min: values.min(),
        q25: quantile(0.25)?,
        median: quantile(0.5)?,
        q75: quantile(0.75)?,
        max: values.max(),
    })
}

fn value_counts(df: &DataFrame, name: &str) -> crate::Result<Vec<(String, usize)>> {
    let grouped = df
        .clone()
        .lazy()
        .group_by([col(name)])
        .agg([len().alias("count")])
        .collect()?;
    let keys = grouped.column(name)?.str()?;
    let counts = grouped.column("count")?.cast(&DataType::UInt64)?;

    let mut rows: Vec<(String, usize)> = keys
        .into_iter()
        .zip(counts.u64()?)
        .map(|(key, count)| {
            (
                key.unwrap_or(MISSING_KEY).to_string(),
                count.unwrap_or(0) as usize,
            )
        })
        .collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    Ok(rows)
}

/// Shape, missing cells, duplicates, numeric statistics, category counts and
/// churn balance of a table. Run it before imputation.
pub fn summarize(df: &DataFrame) -> crate::Result<DatasetSummary> {
    let unique_rows = df
        .clone()
        .lazy()
        .unique(None, UniqueKeepStrategy::Any)
        .collect()?
        .height();

    let mut numeric = Vec::new();
    let mut counts = Vec::new();
    for column in df.get_columns() {
        if column.dtype() == &DataType::String {
            counts.push((column.name().to_string(), value_counts(df, column.name())?));
        } else if column.dtype().is_numeric() {
            numeric.push(numeric_stats(column)?);
        }
    }

    let has_target = df.get_columns().iter().any(|c| c.name() == TARGET_COLUMN);
    Ok(DatasetSummary {
        rows: df.height(),
        columns: df.width(),
        missing: df
            .get_columns()
            .iter()
            .map(|c| (c.name().to_string(), c.null_count()))
            .collect(),
        duplicate_rows: df.height() - unique_rows,
        numeric,
        value_counts: counts,
        churn: if has_target { Some(churn_counts(df)?) } else { None },
    })
}

fn format_stat(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

/// Print a summary the way the report shows it.
pub fn print_dataset_summary(summary: &DatasetSummary) {
    println!("\n=== Dataset Summary ===");
    println!("Rows: {}", summary.rows);
    println!("Columns: {}", summary.columns);
    println!("Duplicate rows: {}", summary.duplicate_rows);

    println!("\nMissing values per column:");
    for (name, missing) in &summary.missing {
        println!("  {:20} {}", name, missing);
    }

    println!("\nNumeric columns:");
    println!(
        "  {:20} {:>6} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "", "count", "mean", "std", "min", "25%", "50%", "75%", "max"
    );
    for stats in &summary.numeric {
        println!(
            "  {:20} {:>6} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10}",
            stats.column,
            stats.count,
            format_stat(stats.mean),
            format_stat(stats.std),
            format_stat(stats.min),
            format_stat(stats.q25),
            format_stat(stats.median),
            format_stat(stats.q75),
            format_stat(stats.max)
        );
    }

    for (name, counts) in &summary.value_counts {
        println!("\n{name}:");
        for (value, count) in counts {
            println!("  {:28} {}", value, count);
        }
    }

    if let Some((stayed, churned)) = summary.churn {
        let total = (stayed + churned).max(1) as f64;
        println!("\nChurn balance:");
        println!("  Stayed:  {} ({:.1}%)", stayed, stayed as f64 / total * 100.0);
        println!("  Churned: {} ({:.1}%)", churned, churned as f64 / total * 100.0);
    }
}

/// Print the summary of `raw` and write the EDA charts into `output_dir`.
///
/// # Arguments
/// * `raw` - Table with unused columns dropped and numeric features coerced,
///   but not yet imputed (see `data::load_raw_table`)
/// * `output_dir` - Directory receiving the PNG files
///
/// # Returns
/// * Paths of the generated PNG files
pub fn generate_eda_report(raw: &DataFrame, output_dir: &Path) -> crate::Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)?;
    print_dataset_summary(&summarize(raw)?);

    let df = clean_table(raw.clone())?;
    let mut written = Vec::new();

    let path = output_dir.join("churn_distribution.png");
    create_churn_distribution_chart(churn_counts(&df)?, &path)?;
    written.push(path);

    let path = output_dir.join("churn_by_internet_service.png");
    let rows = churn_by_category(&df, "Internet Service")?;
    create_churn_by_category_chart(&rows, "Internet Service", &path)?;
    written.push(path);

    let path = output_dir.join("tenure_distribution.png");
    let tenure = numeric_column(&df, "Tenure Months")?;
    create_histogram_chart(&tenure, "Distribution of Customer Tenure", "Tenure (Months)", &path)?;
    written.push(path);

    let path = output_dir.join("monthly_vs_total_charges.png");
    let flags = churn_flags(&df)?;
    let monthly = numeric_column(&df, "Monthly Charges")?;
    let total = numeric_column(&df, "Total Charges")?;
    if monthly.len() != flags.len() || total.len() != flags.len() {
        return Err(ChurnError::FeatureMismatch(
            "charges columns contain missing values".to_string(),
        ));
    }
    create_charges_scatter_chart(&monthly, &total, &flags, &path)?;
    written.push(path);

    for path in &written {
        println!("Saved: {}", path.display());
    }
    Ok(written)
}
