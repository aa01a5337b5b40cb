//! Integration tests: training and scoring transaction tables end to end

use fraudscope::anomaly::{INLIER, OUTLIER};
use fraudscope::error::DetectError;
use fraudscope::inference::{DetectorConfig, TrainedDetector};
use fraudscope::preprocessing::FeatureSchema;
use fraudscope::utils::DataLoader;
use polars::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_xlsxwriter::Workbook;
use std::io::Write;

const OUTLIER_ROWS: [usize; 2] = [137, 802];

/// 1000 transactions, two of them far outside the normal cluster
fn transactions_csv() -> String {
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    let mut csv = String::from("Time,V1,V2,V3,V4,Amount,Class,Merchant\n");

    for i in 0..1000 {
        let (v, amount, class) = if OUTLIER_ROWS.contains(&i) {
            let k = i as f64 / 100.0;
            ([30.0 + k, -30.0 - k, 28.0, -29.0], 25_000.0 + k, 1)
        } else {
            (
                [
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                ],
                rng.gen_range(1.0..200.0),
                0,
            )
        };
        csv.push_str(&format!(
            "{}.0,{},{},{},{},{},{},shop{}\n",
            i * 10,
            v[0],
            v[1],
            v[2],
            v[3],
            amount,
            class,
            i % 3
        ));
    }
    csv
}

fn transactions() -> DataFrame {
    DataLoader::new()
        .load_bytes("transactions.csv", transactions_csv().as_bytes())
        .unwrap()
}

fn write_csv(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

/// Workbook with three numeric columns, a free-text column and one outlier row
fn transactions_xlsx(n: u32, outlier: u32) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, name) in ["Time", "V1", "Amount", "Note"].into_iter().enumerate() {
        sheet.write_string(0, col as u16, name).unwrap();
    }
    for i in 0..n {
        let row = i + 1;
        let (v1, amount) = if i == outlier {
            (40.0, 50_000.0)
        } else {
            (((i * 37) % 101) as f64 / 50.0 - 1.0, ((i * 29) % 89) as f64 + 1.0)
        };
        sheet.write_number(row, 0, i as f64).unwrap();
        sheet.write_number(row, 1, v1).unwrap();
        sheet.write_number(row, 2, amount).unwrap();
        sheet.write_string(row, 3, format!("memo {}", i % 4)).unwrap();
    }
    workbook.save_to_buffer().unwrap()
}

#[test]
fn test_end_to_end_flags_both_outliers() {
    let df = transactions();
    let detector = TrainedDetector::train(&df, DetectorConfig::default()).unwrap();
    let report = detector.score(&df).unwrap();

    assert_eq!(report.rows, 1000);
    for row in OUTLIER_ROWS {
        assert_eq!(report.labels[row], OUTLIER, "row {} should be flagged", row);
        assert!(report.flagged.iter().any(|f| f.row == row));
    }
    assert!(report.flagged_count >= 2);
    assert!(report.flagged_count <= 5, "flagged {}", report.flagged_count);
    assert_eq!(
        report.labels.iter().filter(|&&l| l == OUTLIER).count(),
        report.flagged_count
    );
    assert!(report.labels.iter().all(|&l| l == INLIER || l == OUTLIER));
}

#[test]
fn test_training_from_path() {
    let file = write_csv(&transactions_csv());
    let detector = TrainedDetector::from_path(file.path(), DetectorConfig::default()).unwrap();

    assert_eq!(detector.training_rows(), 1000);
    assert_eq!(
        detector.schema().columns(),
        &["Time", "V1", "V2", "V3", "V4", "Amount"]
    );
    assert_eq!(detector.schema().dropped(), &["Merchant"]);
}

#[test]
fn test_missing_training_file() {
    let result = TrainedDetector::from_path("/nonexistent/train.csv", DetectorConfig::default());
    assert!(matches!(result, Err(DetectError::ReadError(_))));
}

#[test]
fn test_same_seed_same_predictions() {
    let df = transactions();
    let a = TrainedDetector::train(&df, DetectorConfig::default()).unwrap();
    let b = TrainedDetector::train(&df, DetectorConfig::default()).unwrap();

    assert_eq!(a.threshold(), b.threshold());
    assert_eq!(a.score(&df).unwrap().labels, b.score(&df).unwrap().labels);
}

#[test]
fn test_scoring_does_not_change_the_detector() {
    let df = transactions();
    let detector = TrainedDetector::train(&df, DetectorConfig::default()).unwrap();
    let threshold = detector.threshold();

    let first = detector.score(&df).unwrap();
    let other = df.slice(0, 200);
    detector.score(&other).unwrap();
    let second = detector.score(&df).unwrap();

    assert_eq!(detector.threshold(), threshold);
    assert_eq!(first.labels, second.labels);
    assert_eq!(first.scores, second.scores);
}

#[test]
fn test_upload_without_time_is_rejected() {
    let df = transactions();
    let detector = TrainedDetector::train(&df, DetectorConfig::default()).unwrap();

    let upload = df.drop("Time").unwrap();
    let err = detector.score(&upload).unwrap_err();
    assert!(matches!(err, DetectError::MissingColumns(ref cols) if cols == &["Time"]));
    assert!(err.to_string().contains("required columns"));
}

#[test]
fn test_upload_with_text_feature_column_is_rejected() {
    let df = transactions();
    let detector = TrainedDetector::train(&df, DetectorConfig::default()).unwrap();

    let mut upload = df.drop("V3").unwrap();
    upload
        .with_column(Column::new(
            "V3".into(),
            (0..1000).map(|i| format!("x{}", i)).collect::<Vec<_>>(),
        ))
        .unwrap();

    match detector.score(&upload) {
        Err(DetectError::SchemaMismatch { missing, non_numeric }) => {
            assert!(missing.is_empty());
            assert_eq!(non_numeric, vec!["V3"]);
        }
        other => panic!("expected SchemaMismatch, got {:?}", other.map(|r| r.rows)),
    }
}

#[test]
fn test_report_preserves_rows_and_columns() {
    let df = transactions();
    let detector = TrainedDetector::train(&df, DetectorConfig::default()).unwrap();

    let upload = df.slice(0, 300);
    let report = detector.score(&upload).unwrap();

    assert_eq!(report.rows, 300);
    assert_eq!(report.scores.len(), 300);
    assert_eq!(report.points.len(), 300);
    let columns: Vec<String> = upload
        .get_column_names()
        .iter()
        .map(|c| c.to_string())
        .collect();
    assert_eq!(report.columns, columns);
    assert_eq!(report.schema_fingerprint, detector.schema().fingerprint());
}

#[test]
fn test_reordered_upload_uses_training_order() {
    let df = transactions();
    let detector = TrainedDetector::train(&df, DetectorConfig::default()).unwrap();

    let reordered = df
        .select(["Amount", "V4", "V3", "V2", "V1", "Time", "Class", "Merchant"])
        .unwrap();

    assert_eq!(
        detector.score(&df).unwrap().labels,
        detector.score(&reordered).unwrap().labels
    );
}

#[test]
fn test_custom_label_column() {
    let df = transactions();
    let config = DetectorConfig::default().with_label_column("V4");
    let detector = TrainedDetector::train(&df, config).unwrap();

    let schema: &FeatureSchema = detector.schema();
    assert!(!schema.columns().iter().any(|c| c == "V4"));
    assert!(schema.columns().iter().any(|c| c == "Class"));
}

#[test]
fn test_tsv_upload() {
    let df = transactions();
    let detector = TrainedDetector::train(&df, DetectorConfig::default()).unwrap();

    let tsv = transactions_csv().replace(',', "\t");
    let upload = DataLoader::new().load_bytes("upload.tsv", tsv.as_bytes()).unwrap();
    let report = detector.score(&upload).unwrap();
    assert_eq!(report.labels, detector.score(&df).unwrap().labels);
}

#[test]
fn test_xlsx_training_and_scoring() {
    let bytes = transactions_xlsx(300, 150);
    let df = DataLoader::new().load_bytes("train.xlsx", &bytes).unwrap();

    assert_eq!(df.height(), 300);
    for name in ["Time", "V1", "Amount"] {
        assert_eq!(df.column(name).unwrap().dtype(), &DataType::Float64, "{}", name);
    }
    assert_eq!(df.column("Note").unwrap().dtype(), &DataType::String);

    let detector = TrainedDetector::train(&df, DetectorConfig::default()).unwrap();
    assert_eq!(detector.schema().columns(), &["Time", "V1", "Amount"]);
    assert_eq!(detector.schema().dropped(), &["Note"]);
    assert_eq!(detector.schema().label(), None);

    let report = detector.score(&df).unwrap();
    assert_eq!(report.rows, 300);
    assert_eq!(report.labels[150], OUTLIER);
    let flagged = report.flagged.iter().find(|f| f.row == 150).unwrap();
    assert_eq!(flagged.values[3], "memo 2");
}

#[test]
fn test_xlsx_training_from_path() {
    let mut file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
    file.write_all(&transactions_xlsx(120, 7)).unwrap();

    let detector = TrainedDetector::from_path(file.path(), DetectorConfig::default()).unwrap();
    assert_eq!(detector.training_rows(), 120);
    assert_eq!(detector.schema().n_features(), 3);
}
