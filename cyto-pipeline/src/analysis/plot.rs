//! SVG boxplot of cohort percentages, responders vs non-responders

use super::comparison::PopulationComparison;
use super::frequency::RelativeFrequency;
use cyto_common::db::{PopulationVocabulary, Response};
use svg::node::element::{Circle, Line, Rectangle, Text};
use svg::Document;

const SVG_WIDTH: f32 = 960.0;
const SVG_HEIGHT: f32 = 560.0;
const PLOT_LEFT: f32 = 80.0;
const PLOT_RIGHT: f32 = 930.0;
const PLOT_TOP: f32 = 80.0;
const PLOT_BOTTOM: f32 = 470.0;
const BOX_WIDTH: f32 = 36.0;
const Y_TICKS: usize = 5;

const RESPONDER_FILL: &str = "#4c72b0";
const NON_RESPONDER_FILL: &str = "#dd8452";

/// Five-number summary with Tukey whiskers
#[derive(Debug, Clone, PartialEq)]
pub struct BoxStats {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    /// Most extreme values within 1.5 × IQR of the quartiles
    pub whisker_low: f64,
    pub whisker_high: f64,
    pub outliers: Vec<f64>,
}

/// Quantile of sorted data with linear interpolation between ranks
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    sorted[lower] + (position - lower as f64) * (sorted[upper] - sorted[lower])
}

pub fn box_stats(values: &[f64]) -> Option<BoxStats> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let q1 = quantile(&sorted, 0.25);
    let median = quantile(&sorted, 0.5);
    let q3 = quantile(&sorted, 0.75);
    let iqr = q3 - q1;
    let (low_fence, high_fence) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);

    let inside = || sorted.iter().copied().filter(|v| *v >= low_fence && *v <= high_fence);
    Some(BoxStats {
        q1,
        median,
        q3,
        whisker_low: inside().fold(f64::INFINITY, f64::min),
        whisker_high: inside().fold(f64::NEG_INFINITY, f64::max),
        outliers: sorted
            .iter()
            .copied()
            .filter(|v| *v < low_fence || *v > high_fence)
            .collect(),
    })
}

/// Upper bound of the y axis: the data maximum padded and rounded up to 10
fn axis_max(cohort: &[RelativeFrequency]) -> f64 {
    let max = cohort.iter().map(|r| r.percentage).fold(0.0, f64::max);
    ((max * 1.1 / 10.0).ceil() * 10.0).max(10.0)
}

fn text(content: impl Into<String>, x: f32, y: f32, size: u32) -> Text {
    Text::new(content.into())
        .set("x", x)
        .set("y", y)
        .set("font-family", "sans-serif")
        .set("font-size", size)
        .set("fill", "#111827")
}

/// Render the responder/non-responder boxplot
///
/// One slot per vocabulary population; populations whose comparison is
/// significant get a `*` above their slot.
pub fn render_boxplot(
    cohort: &[RelativeFrequency],
    comparisons: &[PopulationComparison],
    vocabulary: &PopulationVocabulary,
    title: &str,
) -> Document {
    let plot_height = PLOT_BOTTOM - PLOT_TOP;
    let y_max = axis_max(cohort);
    let y_for = |value: f64| PLOT_BOTTOM - (value / y_max) as f32 * plot_height;

    let mut doc = Document::new()
        .set("viewBox", (0, 0, SVG_WIDTH, SVG_HEIGHT))
        .set("width", SVG_WIDTH)
        .set("height", SVG_HEIGHT)
        .add(
            Rectangle::new()
                .set("x", 0)
                .set("y", 0)
                .set("width", SVG_WIDTH)
                .set("height", SVG_HEIGHT)
                .set("fill", "#ffffff"),
        )
        .add(text(title, PLOT_LEFT, 36.0, 18))
        .add(
            text("Percentage (%)", 22.0, (PLOT_TOP + PLOT_BOTTOM) / 2.0, 13)
                .set("text-anchor", "middle")
                .set(
                    "transform",
                    format!("rotate(-90 22 {})", (PLOT_TOP + PLOT_BOTTOM) / 2.0),
                ),
        );

    for tick in 0..=Y_TICKS {
        let value = y_max * tick as f64 / Y_TICKS as f64;
        let y = y_for(value);
        doc = doc
            .add(
                Line::new()
                    .set("x1", PLOT_LEFT)
                    .set("y1", y)
                    .set("x2", PLOT_RIGHT)
                    .set("y2", y)
                    .set("stroke", "#e5e7eb")
                    .set("stroke-width", 1),
            )
            .add(
                text(format!("{:.0}", value), PLOT_LEFT - 10.0, y + 4.0, 12)
                    .set("text-anchor", "end"),
            );
    }

    if cohort.is_empty() {
        return doc.add(
            text(
                "No cohort data",
                (PLOT_LEFT + PLOT_RIGHT) / 2.0,
                (PLOT_TOP + PLOT_BOTTOM) / 2.0,
                16,
            )
            .set("text-anchor", "middle"),
        );
    }

    let slot_width = (PLOT_RIGHT - PLOT_LEFT) / vocabulary.len().max(1) as f32;
    for (slot, population) in vocabulary.populations().iter().enumerate() {
        let center = PLOT_LEFT + slot_width * (slot as f32 + 0.5);

        for (label, fill, offset) in [
            (Response::Yes, RESPONDER_FILL, -BOX_WIDTH * 0.6),
            (Response::No, NON_RESPONDER_FILL, BOX_WIDTH * 0.6),
        ] {
            let values: Vec<f64> = cohort
                .iter()
                .filter(|r| r.population == population.population_id && r.response == Some(label))
                .map(|r| r.percentage)
                .collect();
            let Some(stats) = box_stats(&values) else {
                continue;
            };

            let x = center + offset;
            let whisker = |from: f64, to: f64| {
                Line::new()
                    .set("x1", x)
                    .set("y1", y_for(from))
                    .set("x2", x)
                    .set("y2", y_for(to))
                    .set("stroke", "#374151")
                    .set("stroke-width", 1.5)
            };
            let cap = |value: f64| {
                Line::new()
                    .set("x1", x - BOX_WIDTH * 0.25)
                    .set("y1", y_for(value))
                    .set("x2", x + BOX_WIDTH * 0.25)
                    .set("y2", y_for(value))
                    .set("stroke", "#374151")
                    .set("stroke-width", 1.5)
            };

            doc = doc
                .add(whisker(stats.whisker_low, stats.q1))
                .add(whisker(stats.q3, stats.whisker_high))
                .add(cap(stats.whisker_low))
                .add(cap(stats.whisker_high))
                .add(
                    Rectangle::new()
                        .set("x", x - BOX_WIDTH / 2.0)
                        .set("y", y_for(stats.q3))
                        .set("width", BOX_WIDTH)
                        .set("height", (y_for(stats.q1) - y_for(stats.q3)).max(1.0))
                        .set("fill", fill)
                        .set("stroke", "#374151")
                        .set("stroke-width", 1.5),
                )
                .add(
                    Line::new()
                        .set("x1", x - BOX_WIDTH / 2.0)
                        .set("y1", y_for(stats.median))
                        .set("x2", x + BOX_WIDTH / 2.0)
                        .set("y2", y_for(stats.median))
                        .set("stroke", "#111827")
                        .set("stroke-width", 2),
                );
            for outlier in &stats.outliers {
                doc = doc.add(
                    Circle::new()
                        .set("cx", x)
                        .set("cy", y_for(*outlier))
                        .set("r", 3)
                        .set("fill", "none")
                        .set("stroke", "#374151"),
                );
            }
        }

        doc = doc.add(
            text(population.population_name.clone(), center, PLOT_BOTTOM + 24.0, 13)
                .set("text-anchor", "middle"),
        );

        let significant = comparisons
            .iter()
            .any(|c| c.population == population.population_id && c.significant);
        if significant {
            doc = doc.add(
                text("*", center, PLOT_TOP - 6.0, 22)
                    .set("text-anchor", "middle")
                    .set("fill", "#dc2626"),
            );
        }
    }

    doc = doc.add(
        text("Cell Population", (PLOT_LEFT + PLOT_RIGHT) / 2.0, PLOT_BOTTOM + 56.0, 13)
            .set("text-anchor", "middle"),
    );

    let legend = [
        ("Responder", RESPONDER_FILL),
        ("Non-Responder", NON_RESPONDER_FILL),
    ];
    for (row, (name, fill)) in legend.into_iter().enumerate() {
        let y = 50.0 + row as f32 * 18.0;
        doc = doc
            .add(
                Rectangle::new()
                    .set("x", PLOT_RIGHT - 140.0)
                    .set("y", y - 10.0)
                    .set("width", 12)
                    .set("height", 12)
                    .set("fill", fill),
            )
            .add(text(name, PLOT_RIGHT - 122.0, y, 12));
    }

    doc
}
