//! Column-wise preprocessing: impute + standardize numeric columns, impute +
//! one-hot encode categorical columns
//!
//! The fitted transformer is plain data (`serde`) so it travels inside the
//! model artifact together with the classifier. Output column order is fixed
//! at fit time: the numeric group first, then the categorical group, each in
//! declared column order.

use std::collections::{BTreeMap, BTreeSet};

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::ChurnError;
use crate::features::FeatureKind;

/// Fill value for a categorical column that had no values at all.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Values of one column, possibly missing.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Numeric(Vec<Option<f64>>),
    Categorical(Vec<Option<String>>),
}

impl ColumnValues {
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Numeric(values) => values.len(),
            ColumnValues::Categorical(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> FeatureKind {
        match self {
            ColumnValues::Numeric(_) => FeatureKind::Numeric,
            ColumnValues::Categorical(_) => FeatureKind::Categorical,
        }
    }
}

/// Column-oriented table handed to the transformer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnFrame {
    columns: Vec<(String, ColumnValues)>,
}

impl ColumnFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column, replacing any column of the same name.
    pub fn push(&mut self, name: impl Into<String>, values: ColumnValues) {
        let name = name.into();
        match self.columns.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = values,
            None => self.columns.push((name, values)),
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnValues> {
        self.columns
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, values)| values)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// Names of the columns of one kind, in frame order.
    pub fn names_of_kind(&self, kind: FeatureKind) -> Vec<String> {
        self.columns
            .iter()
            .filter(|(_, values)| values.kind() == kind)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map(|(_, values)| values.len()).unwrap_or(0)
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }
}

/// Median of the present values, `None` when there are none.
pub fn median(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let mut sorted: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n % 2 == 0 {
        Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0)
    } else {
        Some(sorted[n / 2])
    }
}

/// Most frequent value; ties go to the smallest value so the result does not
/// depend on row order.
pub fn mode<'a>(values: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }
    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value.to_string())
}

/// One fitted numeric column: median imputation followed by standardization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericColumn {
    pub name: String,
    pub median: f64,
    pub mean: f64,
    pub scale: f64,
}

impl NumericColumn {
    fn fit(name: &str, values: &[Option<f64>]) -> Self {
        let present = values.iter().flatten().copied();
        // An all-missing column imputes to zero.
        let median = median(present).unwrap_or(0.0);

        let filled: Vec<f64> = values
            .iter()
            .map(|v| v.filter(|x| x.is_finite()).unwrap_or(median))
            .collect();
        let n = filled.len().max(1) as f64;
        let mean = filled.iter().sum::<f64>() / n;
        let variance = filled.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();
        let scale = if std > f64::EPSILON { std } else { 1.0 };

        NumericColumn {
            name: name.to_string(),
            median,
            mean,
            scale,
        }
    }

    fn transform_value(&self, value: Option<f64>) -> f64 {
        let value = value.filter(|x| x.is_finite()).unwrap_or(self.median);
        (value - self.mean) / self.scale
    }
}

/// One fitted categorical column: mode imputation followed by one-hot
/// encoding over the sorted categories seen at fit time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalColumn {
    pub name: String,
    pub mode: String,
    pub categories: Vec<String>,
}

impl CategoricalColumn {
    fn fit(name: &str, values: &[Option<String>]) -> Self {
        let mode = mode(values.iter().flatten().map(String::as_str))
            .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string());

        let mut categories: BTreeSet<String> = values.iter().flatten().cloned().collect();
        // Imputed cells become the mode, which must be encodable.
        categories.insert(mode.clone());

        CategoricalColumn {
            name: name.to_string(),
            mode,
            categories: categories.into_iter().collect(),
        }
    }

    /// Index of the hot indicator; `None` for a category unseen at fit time.
    fn hot_index(&self, value: Option<&str>) -> Option<usize> {
        let value = value.unwrap_or(self.mode.as_str());
        self.categories
            .binary_search_by(|category| category.as_str().cmp(value))
            .ok()
    }
}

/// A fitted group of columns sharing one treatment, in output order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureGroup {
    Numeric { columns: Vec<NumericColumn> },
    Categorical { columns: Vec<CategoricalColumn> },
}

impl FeatureGroup {
    fn width(&self) -> usize {
        match self {
            FeatureGroup::Numeric { columns } => columns.len(),
            FeatureGroup::Categorical { columns } => {
                columns.iter().map(|c| c.categories.len()).sum()
            }
        }
    }
}

/// Unfitted column transformer: which columns get which treatment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnTransformer {
    numeric_columns: Vec<String>,
    categorical_columns: Vec<String>,
}

impl ColumnTransformer {
    pub fn new(numeric_columns: Vec<String>, categorical_columns: Vec<String>) -> Self {
        Self {
            numeric_columns,
            categorical_columns,
        }
    }

    /// Builder partitioned by the kinds of the frame's own columns.
    pub fn for_frame(frame: &ColumnFrame) -> Self {
        Self::new(
            frame.names_of_kind(FeatureKind::Numeric),
            frame.names_of_kind(FeatureKind::Categorical),
        )
    }

    pub fn numeric_columns(&self) -> &[String] {
        &self.numeric_columns
    }

    pub fn categorical_columns(&self) -> &[String] {
        &self.categorical_columns
    }

    /// Learn imputation statistics, scaling parameters and category lists.
    pub fn fit(&self, frame: &ColumnFrame) -> crate::Result<FittedColumnTransformer> {
        if frame.n_rows() == 0 {
            return Err(ChurnError::Training(
                "cannot fit preprocessing on an empty table".to_string(),
            ));
        }
        if self.numeric_columns.is_empty() && self.categorical_columns.is_empty() {
            return Err(ChurnError::Training(
                "no numeric or categorical feature columns to fit".to_string(),
            ));
        }

        let numeric = self
            .numeric_columns
            .iter()
            .map(|name| match frame.column(name) {
                Some(ColumnValues::Numeric(values)) => Ok(NumericColumn::fit(name, values)),
                other => Err(column_mismatch(name, FeatureKind::Numeric, other)),
            })
            .collect::<crate::Result<Vec<_>>>()?;

        let categorical = self
            .categorical_columns
            .iter()
            .map(|name| match frame.column(name) {
                Some(ColumnValues::Categorical(values)) => {
                    Ok(CategoricalColumn::fit(name, values))
                }
                other => Err(column_mismatch(name, FeatureKind::Categorical, other)),
            })
            .collect::<crate::Result<Vec<_>>>()?;

        let mut groups = Vec::with_capacity(2);
        if !numeric.is_empty() {
            groups.push(FeatureGroup::Numeric { columns: numeric });
        }
        if !categorical.is_empty() {
            groups.push(FeatureGroup::Categorical {
                columns: categorical,
            });
        }

        Ok(FittedColumnTransformer { groups })
    }
}

fn column_mismatch(name: &str, expected: FeatureKind, got: Option<&ColumnValues>) -> ChurnError {
    match got {
        None => ChurnError::FeatureMismatch(format!("column '{name}' is missing")),
        Some(values) => ChurnError::FeatureMismatch(format!(
            "column '{name}' should be {expected:?} but is {:?}",
            values.kind()
        )),
    }
}

/// Fitted column transformer; immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedColumnTransformer {
    groups: Vec<FeatureGroup>,
}

impl FittedColumnTransformer {
    pub fn groups(&self) -> &[FeatureGroup] {
        &self.groups
    }

    /// Input columns with their kinds, in output order.
    pub fn input_columns(&self) -> Vec<(String, FeatureKind)> {
        self.groups
            .iter()
            .flat_map(|group| match group {
                FeatureGroup::Numeric { columns } => columns
                    .iter()
                    .map(|c| (c.name.clone(), FeatureKind::Numeric))
                    .collect::<Vec<_>>(),
                FeatureGroup::Categorical { columns } => columns
                    .iter()
                    .map(|c| (c.name.clone(), FeatureKind::Categorical))
                    .collect(),
            })
            .collect()
    }

    /// Width of the transformed feature vector.
    pub fn n_features_out(&self) -> usize {
        self.groups.iter().map(FeatureGroup::width).sum()
    }

    /// Names of the output columns, e.g. `Tenure Months` or `Contract=Two year`.
    pub fn output_feature_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.n_features_out());
        for group in &self.groups {
            match group {
                FeatureGroup::Numeric { columns } => {
                    names.extend(columns.iter().map(|c| c.name.clone()));
                }
                FeatureGroup::Categorical { columns } => {
                    for column in columns {
                        names.extend(
                            column
                                .categories
                                .iter()
                                .map(|category| format!("{}={}", column.name, category)),
                        );
                    }
                }
            }
        }
        names
    }

    /// Transform a frame into the dense feature matrix. Columns are looked up
    /// by name; unseen categories encode as an all-zero block.
    pub fn transform(&self, frame: &ColumnFrame) -> crate::Result<Array2<f64>> {
        let n_rows = frame.n_rows();
        let mut out = Array2::<f64>::zeros((n_rows, self.n_features_out()));
        let mut offset = 0;

        for group in &self.groups {
            match group {
                FeatureGroup::Numeric { columns } => {
                    for column in columns {
                        let values = match frame.column(&column.name) {
                            Some(ColumnValues::Numeric(values)) => values,
                            other => {
                                return Err(column_mismatch(
                                    &column.name,
                                    FeatureKind::Numeric,
                                    other,
                                ))
                            }
                        };
                        check_rows(&column.name, values.len(), n_rows)?;
                        for (row, value) in values.iter().enumerate() {
                            out[[row, offset]] = column.transform_value(*value);
                        }
                        offset += 1;
                    }
                }
                FeatureGroup::Categorical { columns } => {
                    for column in columns {
                        let values = match frame.column(&column.name) {
                            Some(ColumnValues::Categorical(values)) => values,
                            other => {
                                return Err(column_mismatch(
                                    &column.name,
                                    FeatureKind::Categorical,
                                    other,
                                ))
                            }
                        };
                        check_rows(&column.name, values.len(), n_rows)?;
                        for (row, value) in values.iter().enumerate() {
                            if let Some(index) = column.hot_index(value.as_deref()) {
                                out[[row, offset + index]] = 1.0;
                            }
                        }
                        offset += column.categories.len();
                    }
                }
            }
        }

        Ok(out)
    }
}

fn check_rows(name: &str, got: usize, expected: usize) -> crate::Result<()> {
    if got != expected {
        return Err(ChurnError::FeatureMismatch(format!(
            "column '{name}' has {got} rows, expected {expected}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn text(values: &[Option<&str>]) -> ColumnValues {
        ColumnValues::Categorical(values.iter().map(|v| v.map(str::to_string)).collect())
    }

    fn sample_frame() -> ColumnFrame {
        let mut frame = ColumnFrame::new();
        frame.push(
            "Tenure Months",
            ColumnValues::Numeric(vec![Some(1.0), Some(3.0), None, Some(5.0)]),
        );
        frame.push(
            "Contract",
            text(&[
                Some("Month-to-month"),
                Some("Two year"),
                Some("Month-to-month"),
                None,
            ]),
        );
        frame
    }

    #[test]
    fn test_median_and_mode() {
        assert_eq!(median(vec![3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(vec![4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(Vec::<f64>::new()), None);
        assert_eq!(median(vec![f64::NAN]), None);

        assert_eq!(mode(vec!["b", "a", "b"]), Some("b".to_string()));
        // tie resolves to the smallest value
        assert_eq!(mode(vec!["b", "a"]), Some("a".to_string()));
        assert_eq!(mode(Vec::<&str>::new()), None);
    }

    #[test]
    fn test_fit_learns_statistics() {
        let frame = sample_frame();
        let fitted = ColumnTransformer::for_frame(&frame).fit(&frame).unwrap();

        match &fitted.groups()[0] {
            FeatureGroup::Numeric { columns } => {
                let tenure = &columns[0];
                assert_eq!(tenure.median, 3.0);
                // imputed column: [1, 3, 3, 5]
                assert_abs_diff_eq!(tenure.mean, 3.0);
                assert_abs_diff_eq!(tenure.scale, 2.0_f64.sqrt());
            }
            other => panic!("unexpected first group {other:?}"),
        }
        match &fitted.groups()[1] {
            FeatureGroup::Categorical { columns } => {
                assert_eq!(columns[0].mode, "Month-to-month");
                assert_eq!(columns[0].categories, vec!["Month-to-month", "Two year"]);
            }
            other => panic!("unexpected second group {other:?}"),
        }
    }

    #[test]
    fn test_transform_layout_and_imputation() {
        let frame = sample_frame();
        let fitted = ColumnTransformer::for_frame(&frame).fit(&frame).unwrap();
        let out = fitted.transform(&frame).unwrap();

        assert_eq!(out.shape(), &[4, 3]);
        assert_eq!(
            fitted.output_feature_names(),
            vec![
                "Tenure Months",
                "Contract=Month-to-month",
                "Contract=Two year"
            ]
        );
        // missing tenure imputes to the median, which is the mean here
        assert_abs_diff_eq!(out[[2, 0]], 0.0);
        // missing contract imputes to the mode
        assert_eq!(&out.row(3).to_vec()[1..], &[1.0, 0.0]);

        let column_mean = out.column(0).sum() / 4.0;
        assert_abs_diff_eq!(column_mean, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_non_finite_values_are_imputed() {
        let mut frame = ColumnFrame::new();
        frame.push(
            "Monthly Charges",
            ColumnValues::Numeric(vec![Some(20.0), Some(f64::INFINITY), Some(40.0)]),
        );
        let fitted = ColumnTransformer::for_frame(&frame).fit(&frame).unwrap();
        let FeatureGroup::Numeric { columns } = &fitted.groups()[0] else {
            panic!("expected a numeric group");
        };
        assert_eq!(columns[0].median, 30.0);

        let mut scoring = ColumnFrame::new();
        scoring.push(
            "Monthly Charges",
            ColumnValues::Numeric(vec![Some(f64::NEG_INFINITY), Some(f64::NAN)]),
        );
        let out = fitted.transform(&scoring).unwrap();
        assert!(out.iter().all(|v| v.is_finite()));
        assert_eq!(out[[0, 0]], out[[1, 0]]);
    }

    #[test]
    fn test_unseen_category_encodes_as_zeros() {
        let frame = sample_frame();
        let fitted = ColumnTransformer::for_frame(&frame).fit(&frame).unwrap();

        let mut scoring = ColumnFrame::new();
        scoring.push("Contract", text(&[Some("Three year")]));
        scoring.push("Tenure Months", ColumnValues::Numeric(vec![Some(3.0)]));
        let out = fitted.transform(&scoring).unwrap();

        assert_eq!(out.row(0).to_vec(), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_transform_rejects_missing_or_mistyped_columns() {
        let frame = sample_frame();
        let fitted = ColumnTransformer::for_frame(&frame).fit(&frame).unwrap();

        let mut missing = ColumnFrame::new();
        missing.push("Tenure Months", ColumnValues::Numeric(vec![Some(1.0)]));
        assert!(matches!(
            fitted.transform(&missing),
            Err(ChurnError::FeatureMismatch(_))
        ));

        let mut mistyped = ColumnFrame::new();
        mistyped.push("Tenure Months", text(&[Some("1")]));
        mistyped.push("Contract", text(&[Some("Two year")]));
        assert!(matches!(
            fitted.transform(&mistyped),
            Err(ChurnError::FeatureMismatch(_))
        ));
    }

    #[test]
    fn test_constant_and_empty_columns() {
        let mut frame = ColumnFrame::new();
        frame.push("Flat", ColumnValues::Numeric(vec![Some(7.0), Some(7.0)]));
        frame.push("Gone", ColumnValues::Numeric(vec![None, None]));
        frame.push("Blank", text(&[None, None]));
        let fitted = ColumnTransformer::for_frame(&frame).fit(&frame).unwrap();
        let out = fitted.transform(&frame).unwrap();

        assert!(out.iter().all(|v| v.is_finite()));
        assert_eq!(out.column(0).to_vec(), vec![0.0, 0.0]);
        assert_eq!(out.column(1).to_vec(), vec![0.0, 0.0]);
        assert_eq!(
            fitted.output_feature_names().last().map(String::as_str),
            Some("Blank=Unknown")
        );
        assert_eq!(out.column(2).to_vec(), vec![1.0, 1.0]);
    }

    #[test]
    fn test_empty_frame_is_rejected() {
        let frame = ColumnFrame::new();
        assert!(ColumnTransformer::new(vec![], vec![]).fit(&frame).is_err());
    }

    #[test]
    fn test_fitted_transformer_serde_keeps_order() {
        let frame = sample_frame();
        let fitted = ColumnTransformer::for_frame(&frame).fit(&frame).unwrap();
        let json = serde_json::to_string(&fitted).unwrap();
        let restored: FittedColumnTransformer = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, fitted);
        assert_eq!(
            restored.transform(&frame).unwrap(),
            fitted.transform(&frame).unwrap()
        );
    }
}
