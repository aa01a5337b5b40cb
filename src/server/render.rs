//! Server-side rendering of the upload page
//!
//! The page has two states. Idle shows the upload form (and an error banner
//! when the last upload failed). Scored adds the flagged count, the flagged
//! rows and a PCA scatter plot rendered as inline SVG. Templates are
//! compiled into the binary and autoescaped, so uploaded cell values and
//! column names are never emitted as markup.

use serde::Serialize;
use tera::{Context, Tera};

use crate::anomaly::OUTLIER;
use crate::inference::{DetectorSummary, FlaggedRow, ProjectedPoint, ScoreReport};

use super::error::Result;

const PLOT_WIDTH: f64 = 720.0;
const PLOT_HEIGHT: f64 = 440.0;
const PLOT_MARGIN: f64 = 48.0;

const INLIER_FILL: &str = "#3b4cc0";
const OUTLIER_FILL: &str = "#b40426";

/// Flagged rows shown in the table; the count above it is always complete
const MAX_TABLE_ROWS: usize = 500;

/// Model facts shown under the upload form
#[derive(Debug, Serialize)]
struct ModelView<'a> {
    training_rows: usize,
    n_features: usize,
    required_columns: &'a [String],
    fingerprint: &'a str,
}

impl<'a> From<&'a DetectorSummary> for ModelView<'a> {
    fn from(summary: &'a DetectorSummary) -> Self {
        Self {
            training_rows: summary.training_rows,
            n_features: summary.schema.n_features(),
            required_columns: &summary.config.required_columns,
            fingerprint: summary.schema.fingerprint(),
        }
    }
}

/// One row of the flagged table, numbers already formatted
#[derive(Debug, Serialize)]
struct FlaggedView<'a> {
    values: &'a [String],
    score: String,
    pca1: String,
    pca2: String,
}

impl<'a> From<&'a FlaggedRow> for FlaggedView<'a> {
    fn from(row: &'a FlaggedRow) -> Self {
        Self {
            values: &row.values,
            score: format!("{:.4}", row.score),
            pca1: format!("{:.4}", row.pca1),
            pca2: format!("{:.4}", row.pca2),
        }
    }
}

#[derive(Debug, Serialize)]
struct PlotPoint {
    x: String,
    y: String,
    radius: f64,
    fill: &'static str,
    label: i32,
}

/// Scatter plot geometry in SVG user units
#[derive(Debug, Serialize)]
struct ScatterPlot {
    width: f64,
    height: f64,
    left: f64,
    right: f64,
    top: f64,
    bottom: f64,
    center_x: f64,
    center_y: f64,
    points: Vec<PlotPoint>,
}

impl ScatterPlot {
    fn new(points: &[ProjectedPoint]) -> Self {
        let (x_lo, x_hi) = bounds(points.iter().map(|p| p.pca1));
        let (y_lo, y_hi) = bounds(points.iter().map(|p| p.pca2));

        let left = PLOT_MARGIN;
        let right = PLOT_WIDTH - PLOT_MARGIN / 2.0;
        let top = PLOT_MARGIN / 2.0;
        let bottom = PLOT_HEIGHT - PLOT_MARGIN;

        // Inliers first so flagged points stay visible
        let (outliers, inliers): (Vec<&ProjectedPoint>, Vec<&ProjectedPoint>) =
            points.iter().partition(|p| p.label == OUTLIER);

        let points = inliers
            .into_iter()
            .map(|p| (p, INLIER_FILL, 2.5))
            .chain(outliers.into_iter().map(|p| (p, OUTLIER_FILL, 4.5)))
            .map(|(p, fill, radius)| PlotPoint {
                x: format!("{:.2}", rescale(p.pca1, x_lo, x_hi, left + 6.0, right - 6.0)),
                // SVG y grows downwards
                y: format!("{:.2}", rescale(p.pca2, y_lo, y_hi, bottom - 6.0, top + 6.0)),
                radius,
                fill,
                label: p.label,
            })
            .collect();

        Self {
            width: PLOT_WIDTH,
            height: PLOT_HEIGHT,
            left,
            right,
            top,
            bottom,
            center_x: (left + right) / 2.0,
            center_y: (top + bottom) / 2.0,
            points,
        }
    }
}

/// Map `value` from `[lo, hi]` onto `[out_lo, out_hi]`
fn rescale(value: f64, lo: f64, hi: f64, out_lo: f64, out_hi: f64) -> f64 {
    let span = hi - lo;
    if span.abs() < f64::EPSILON {
        return (out_lo + out_hi) / 2.0;
    }
    out_lo + (value - lo) / span * (out_hi - out_lo)
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

/// Compiled page templates
pub struct PageRenderer {
    tera: Tera,
}

impl PageRenderer {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            ("layout.html", include_str!("templates/layout.html")),
            ("upload_form.html", include_str!("templates/upload_form.html")),
            ("idle.html", include_str!("templates/idle.html")),
            ("scored.html", include_str!("templates/scored.html")),
        ])?;
        Ok(Self { tera })
    }

    fn base_context(summary: &DetectorSummary) -> Context {
        let mut context = Context::new();
        context.insert("version", env!("CARGO_PKG_VERSION"));
        context.insert("model", &ModelView::from(summary));
        context
    }

    /// Idle state: upload form, optional error banner, no results
    pub fn idle_page(&self, summary: &DetectorSummary, error: Option<&str>) -> Result<String> {
        let mut context = Self::base_context(summary);
        context.insert("error", &error);
        Ok(self.tera.render("idle.html", &context)?)
    }

    /// Scored state: flagged count, flagged-rows table and scatter plot
    pub fn scored_page(
        &self,
        summary: &DetectorSummary,
        report: &ScoreReport,
        file_name: &str,
    ) -> Result<String> {
        let flagged: Vec<FlaggedView> = report
            .flagged
            .iter()
            .take(MAX_TABLE_ROWS)
            .map(FlaggedView::from)
            .collect();

        let mut context = Self::base_context(summary);
        context.insert("file_name", file_name);
        context.insert("rows", &report.rows);
        context.insert("run_id", &report.run_id);
        context.insert("flagged_count", &report.flagged_count);
        context.insert("columns", &report.columns);
        context.insert("flagged", &flagged);
        context.insert("flagged_total", &report.flagged.len());
        context.insert("outlier_label", &OUTLIER);
        context.insert("plot", &ScatterPlot::new(&report.points));

        Ok(self.tera.render("scored.html", &context)?)
    }
}
