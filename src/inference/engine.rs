//! Trained detector
//!
//! Training runs once: feature preparation, scaler fit and forest fit. The
//! result is immutable, so scoring an upload borrows it read-only and can
//! never change the fitted state.

use super::DetectorConfig;
use crate::anomaly::{AnomalyDetector, IsolationForest, OUTLIER};
use crate::error::{DetectError, Result};
use crate::preprocessing::{
    ensure_required_columns, prepare_training, FeatureSchema, PreparedFeatures, StandardScaler,
};
use crate::utils::DataLoader;
use crate::visualization::{Pca, PcaResult};
use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// One row of the uploaded table projected onto the first two components
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectedPoint {
    pub pca1: f64,
    pub pca2: f64,
    /// `1` inlier, `-1` outlier
    pub label: i32,
}

/// An uploaded row labelled as an outlier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlaggedRow {
    /// Zero-based position in the uploaded table
    pub row: usize,
    /// Original cell text for every uploaded column, in upload order
    pub values: Vec<String>,
    pub score: f64,
    pub pca1: f64,
    pub pca2: f64,
}

/// Outcome of scoring one uploaded table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreReport {
    pub run_id: String,
    pub scored_at: DateTime<Utc>,
    /// Rows in the uploaded table
    pub rows: usize,
    pub flagged_count: usize,
    /// Fingerprint of the feature schema the rows were scored with
    pub schema_fingerprint: String,
    pub threshold: f64,
    /// Every uploaded column, in upload order
    pub columns: Vec<String>,
    /// Per-row labels, aligned with the uploaded rows
    pub labels: Vec<i32>,
    /// Per-row anomaly scores, aligned with the uploaded rows
    pub scores: Vec<f64>,
    pub points: Vec<ProjectedPoint>,
    pub explained_variance_ratio: Vec<f64>,
    pub flagged: Vec<FlaggedRow>,
}

/// Fitted parameters of one feature column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnScaling {
    pub name: String,
    pub center: f64,
    pub scale: f64,
}

/// Description of the trained detector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorSummary {
    pub schema: FeatureSchema,
    pub scaling: Vec<ColumnScaling>,
    pub training_rows: usize,
    pub threshold: f64,
    pub trained_at: DateTime<Utc>,
    pub config: DetectorConfig,
}

/// Feature schema, scaler and isolation forest fitted on the training table
#[derive(Debug, Clone)]
pub struct TrainedDetector {
    config: DetectorConfig,
    schema: FeatureSchema,
    scaler: StandardScaler,
    forest: IsolationForest,
    threshold: f64,
    training_rows: usize,
    trained_at: DateTime<Utc>,
}

impl TrainedDetector {
    /// Fit the detector on a training table
    pub fn train(df: &DataFrame, config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        let start = Instant::now();

        let PreparedFeatures { schema, matrix } = prepare_training(df, &config.label_column)?;
        let (scaler, scaled) = StandardScaler::fit_transform(&matrix, schema.columns())?;

        let mut forest = IsolationForest::new()
            .with_n_estimators(config.n_estimators)
            .with_max_samples(config.max_samples)
            .with_contamination(config.contamination)
            .with_seed(config.seed);
        forest.fit(&scaled)?;
        let threshold = forest.threshold().ok_or(DetectError::ModelNotFitted)?;

        info!(
            rows = matrix.nrows(),
            features = schema.n_features(),
            contamination = config.contamination,
            seed = config.seed,
            threshold,
            fingerprint = %schema.fingerprint(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Detector trained"
        );

        Ok(Self {
            training_rows: matrix.nrows(),
            config,
            schema,
            scaler,
            forest,
            threshold,
            trained_at: Utc::now(),
        })
    }

    /// Load the training table from disk and fit the detector on it
    pub fn from_path(path: impl AsRef<Path>, config: DetectorConfig) -> Result<Self> {
        let df = DataLoader::new().load_path(path)?;
        Self::train(&df, config)
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn training_rows(&self) -> usize {
        self.training_rows
    }

    pub fn summary(&self) -> DetectorSummary {
        DetectorSummary {
            schema: self.schema.clone(),
            scaling: self
                .scaler
                .iter()
                .map(|(name, p)| ColumnScaling {
                    name: name.to_string(),
                    center: p.center,
                    scale: p.scale,
                })
                .collect(),
            training_rows: self.training_rows,
            threshold: self.threshold,
            trained_at: self.trained_at,
            config: self.config.clone(),
        }
    }

    /// Score an uploaded table with the training-time schema, scaler and forest
    pub fn score(&self, df: &DataFrame) -> Result<ScoreReport> {
        let start = Instant::now();
        let run_id = Uuid::new_v4().to_string();

        ensure_required_columns(df, &self.config.required_columns)?;
        let features = self.schema.extract(df)?;
        let scaled = self.scaler.transform(&features)?;

        let scores = self.forest.score_samples(&scaled)?;
        let labels = self.forest.label_scores(&scores)?;
        let projection = project(&scaled)?;

        let points: Vec<ProjectedPoint> = projection
            .embedding
            .iter()
            .zip(labels.iter())
            .map(|(p, &label)| ProjectedPoint {
                pca1: p[0],
                pca2: p[1],
                label,
            })
            .collect();

        let flagged = labels
            .iter()
            .enumerate()
            .filter(|(_, &label)| label == OUTLIER)
            .map(|(row, _)| {
                Ok(FlaggedRow {
                    row,
                    values: row_text(df, row)?,
                    score: scores[row],
                    pca1: points[row].pca1,
                    pca2: points[row].pca2,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            %run_id,
            rows = df.height(),
            flagged = flagged.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Scored upload"
        );

        Ok(ScoreReport {
            run_id,
            scored_at: Utc::now(),
            rows: df.height(),
            flagged_count: flagged.len(),
            schema_fingerprint: self.schema.fingerprint().to_string(),
            threshold: self.threshold,
            columns: df
                .get_column_names()
                .iter()
                .map(|name| name.to_string())
                .collect(),
            labels: labels.to_vec(),
            scores: scores.to_vec(),
            points,
            explained_variance_ratio: projection.explained_variance_ratio,
            flagged,
        })
    }
}

/// Project the scaled rows; a single row sits at the origin
fn project(scaled: &ndarray::Array2<f64>) -> Result<PcaResult> {
    if scaled.nrows() < 2 {
        debug!(rows = scaled.nrows(), "Too few rows to project, placing at origin");
        return Ok(PcaResult {
            embedding: vec![[0.0, 0.0]; scaled.nrows()],
            explained_variance_ratio: Vec::new(),
            eigenvalues: Vec::new(),
        });
    }
    Pca::default().fit_transform(scaled)
}

fn row_text(df: &DataFrame, row: usize) -> Result<Vec<String>> {
    df.get_columns()
        .iter()
        .map(|col| Ok(cell_text(&col.get(row)?)))
        .collect()
}

fn cell_text(value: &AnyValue) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::Float64(v) => v.to_string(),
        AnyValue::Float32(v) => v.to_string(),
        AnyValue::Int64(v) => v.to_string(),
        AnyValue::Int32(v) => v.to_string(),
        other => other
            .get_str()
            .map(str::to_string)
            .unwrap_or_else(|| other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn transactions(n: usize, outliers: &[usize]) -> DataFrame {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut time = Vec::with_capacity(n);
        let mut v1 = Vec::with_capacity(n);
        let mut v2 = Vec::with_capacity(n);
        let mut amount = Vec::with_capacity(n);
        let mut class = Vec::with_capacity(n);
        let mut merchant = Vec::with_capacity(n);

        for i in 0..n {
            time.push(i as f64);
            if outliers.contains(&i) {
                v1.push(25.0 + i as f64 / 100.0);
                v2.push(-25.0);
                amount.push(9_000.0);
                class.push(1i64);
            } else {
                v1.push(rng.gen_range(-1.0..1.0));
                v2.push(rng.gen_range(-1.0..1.0));
                amount.push(rng.gen_range(1.0..100.0));
                class.push(0i64);
            }
            merchant.push(format!("m{}", i % 5));
        }

        DataFrame::new(vec![
            Column::new("Time".into(), time),
            Column::new("V1".into(), v1),
            Column::new("V2".into(), v2),
            Column::new("Amount".into(), amount),
            Column::new("Class".into(), class),
            Column::new("Merchant".into(), merchant),
        ])
        .unwrap()
    }

    #[test]
    fn test_train_learns_schema() {
        let df = transactions(300, &[]);
        let detector = TrainedDetector::train(&df, DetectorConfig::default()).unwrap();

        assert_eq!(detector.schema().columns(), &["Time", "V1", "V2", "Amount"]);
        assert_eq!(detector.schema().dropped(), &["Merchant"]);
        assert_eq!(detector.schema().label(), Some("Class"));
        assert_eq!(detector.training_rows(), 300);

        let summary = detector.summary();
        assert_eq!(summary.scaling.len(), 4);
        assert_eq!(summary.threshold, detector.threshold());
    }

    #[test]
    fn test_score_flags_outliers() {
        let df = transactions(1000, &[100, 400]);
        let detector = TrainedDetector::train(&df, DetectorConfig::default()).unwrap();
        let report = detector.score(&df).unwrap();

        assert_eq!(report.rows, 1000);
        assert_eq!(report.labels.len(), 1000);
        assert_eq!(report.points.len(), 1000);
        assert!(report.flagged_count <= 5);
        let rows: Vec<usize> = report.flagged.iter().map(|f| f.row).collect();
        assert!(rows.contains(&100));
        assert!(rows.contains(&400));
        assert_eq!(report.flagged_count, report.flagged.len());
        assert_eq!(report.columns.len(), 6);
        assert!(report.flagged.iter().all(|f| f.values.len() == 6));
    }

    #[test]
    fn test_flagged_rows_keep_original_values() {
        let df = transactions(1000, &[250]);
        let detector = TrainedDetector::train(&df, DetectorConfig::default()).unwrap();
        let report = detector.score(&df).unwrap();

        let row = report.flagged.iter().find(|f| f.row == 250).unwrap();
        assert_eq!(row.values[3].parse::<f64>().unwrap(), 9000.0);
        assert_eq!(row.values[5], "m0");
    }

    #[test]
    fn test_score_is_repeatable() {
        let df = transactions(400, &[10]);
        let detector = TrainedDetector::train(&df, DetectorConfig::default()).unwrap();
        let a = detector.score(&df).unwrap();
        let b = detector.score(&df).unwrap();
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.points, b.points);
        assert_ne!(a.run_id, b.run_id);
    }

    #[test]
    fn test_missing_required_column() {
        let train = transactions(200, &[]);
        let detector = TrainedDetector::train(&train, DetectorConfig::default()).unwrap();

        let upload = train.drop("Time").unwrap();
        match detector.score(&upload) {
            Err(DetectError::MissingColumns(cols)) => assert_eq!(cols, vec!["Time"]),
            other => panic!("expected MissingColumns, got {:?}", other.map(|r| r.rows)),
        }
    }

    #[test]
    fn test_missing_schema_column() {
        let train = transactions(200, &[]);
        let detector = TrainedDetector::train(&train, DetectorConfig::default()).unwrap();

        let upload = train.drop("V2").unwrap();
        assert!(matches!(
            detector.score(&upload),
            Err(DetectError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_extra_upload_columns_are_ignored_for_scoring() {
        let train = transactions(300, &[]);
        let detector = TrainedDetector::train(&train, DetectorConfig::default()).unwrap();

        let mut upload = train.clone();
        upload
            .with_column(Column::new("Extra".into(), vec![1.0f64; 300]))
            .unwrap();

        let base = detector.score(&train).unwrap();
        let widened = detector.score(&upload).unwrap();
        assert_eq!(base.labels, widened.labels);
        assert_eq!(widened.columns.len(), 7);
    }

    #[test]
    fn test_single_row_upload() {
        let train = transactions(300, &[]);
        let detector = TrainedDetector::train(&train, DetectorConfig::default()).unwrap();

        let upload = train.slice(0, 1);
        let report = detector.score(&upload).unwrap();
        assert_eq!(report.rows, 1);
        assert_eq!(report.points[0].pca1, 0.0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let df = transactions(50, &[]);
        let config = DetectorConfig::default().with_contamination(0.0);
        assert!(TrainedDetector::train(&df, config).is_err());
    }
}
