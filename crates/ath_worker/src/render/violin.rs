//! Violin plots of one time column per team.
//!
//! Each body is a gaussian kernel density estimate (Scott's bandwidth) drawn
//! over the observed range only, with a quartile box and median marker inside.

use svg::node::element::path::Data;
use svg::node::element::{Circle, Line, Path, Rectangle};
use svg::Document;

use super::chart::{self, Scale, PLOT_AREA};
use crate::dataset::{Row, Table};

const GRID_POINTS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimeColumn {
    Review,
    Merge,
}

impl TimeColumn {
    fn value(self, row: &Row) -> f64 {
        match self {
            TimeColumn::Review => row.review_time as f64,
            TimeColumn::Merge => row.merge_time as f64,
        }
    }
}

pub(crate) fn distribution_by_team(table: &Table, column: TimeColumn, title: &str) -> String {
    let doc = chart::title(chart::canvas(), title);
    let groups: Vec<(&str, Vec<f64>)> = chart::group_by_team(table)
        .into_iter()
        .map(|(team, rows)| {
            let mut values: Vec<f64> = rows.iter().map(|r| column.value(r)).collect();
            values.sort_by(f64::total_cmp);
            (team, values)
        })
        .collect();
    if groups.is_empty() {
        return chart::no_data(doc, PLOT_AREA).to_string();
    }

    let min = groups.iter().map(|(_, v)| v[0]).fold(f64::INFINITY, f64::min);
    let max = groups
        .iter()
        .map(|(_, v)| v[v.len() - 1])
        .fold(f64::NEG_INFINITY, f64::max);
    let scale = Scale::covering(min, max);

    let area = PLOT_AREA;
    let mut doc = chart::y_axis(doc, area, scale, "time (s)");
    let slot = area.width() / groups.len() as f32;
    let half_width = slot * 0.4;

    for (idx, (_, values)) in groups.iter().enumerate() {
        let center = area.left + slot * (idx as f32 + 0.5);
        doc = violin(doc, scale, center, half_width, values, chart::color(idx));
    }

    let labels: Vec<&str> = groups.iter().map(|(team, _)| *team).collect();
    chart::x_labels(doc, area, &labels).to_string()
}

fn violin(
    doc: Document,
    scale: Scale,
    center: f32,
    half_width: f32,
    sorted: &[f64],
    fill: &str,
) -> Document {
    let doc = match density(sorted) {
        Some(curve) => {
            let peak = curve.iter().map(|(_, d)| *d).fold(0.0, f64::max);
            let x_at = |d: f64, side: f32| center + side * half_width * (d / peak) as f32;

            let (first_y, first_d) = curve[0];
            let mut data = Data::new().move_to((x_at(first_d, 1.0), scale.y(PLOT_AREA, first_y)));
            for &(y, d) in &curve[1..] {
                data = data.line_to((x_at(d, 1.0), scale.y(PLOT_AREA, y)));
            }
            for &(y, d) in curve.iter().rev() {
                data = data.line_to((x_at(d, -1.0), scale.y(PLOT_AREA, y)));
            }
            doc.add(
                Path::new()
                    .set("d", data.close())
                    .set("fill", fill)
                    .set("fill-opacity", 0.8)
                    .set("stroke", "#444444")
                    .set("stroke-width", 1),
            )
        }
        // A single distinct value has no spread to estimate.
        None => {
            let y = scale.y(PLOT_AREA, sorted[0]);
            doc.add(
                Line::new()
                    .set("x1", center - half_width)
                    .set("y1", y)
                    .set("x2", center + half_width)
                    .set("y2", y)
                    .set("stroke", fill)
                    .set("stroke-width", 2),
            )
        }
    };

    let q1 = quantile(sorted, 0.25);
    let q3 = quantile(sorted, 0.75);
    let med = quantile(sorted, 0.5);
    let (y_q1, y_q3) = (scale.y(PLOT_AREA, q1), scale.y(PLOT_AREA, q3));

    doc.add(
        Line::new()
            .set("x1", center)
            .set("y1", scale.y(PLOT_AREA, sorted[0]))
            .set("x2", center)
            .set("y2", scale.y(PLOT_AREA, sorted[sorted.len() - 1]))
            .set("stroke", "#333333")
            .set("stroke-width", 1),
    )
    .add(
        Rectangle::new()
            .set("x", center - 4.0)
            .set("y", y_q3)
            .set("width", 8)
            .set("height", (y_q1 - y_q3).max(1.0))
            .set("fill", "#333333"),
    )
    .add(
        Circle::new()
            .set("cx", center)
            .set("cy", scale.y(PLOT_AREA, med))
            .set("r", 3)
            .set("fill", "#ffffff"),
    )
}

/// `(value, density)` pairs from min to max; `None` without variance.
pub(crate) fn density(sorted: &[f64]) -> Option<Vec<(f64, f64)>> {
    let n = sorted.len();
    if n < 2 {
        return None;
    }
    let mean = sorted.iter().sum::<f64>() / n as f64;
    let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    if variance <= 0.0 {
        return None;
    }

    let bandwidth = variance.sqrt() * (n as f64).powf(-0.2);
    let (lo, hi) = (sorted[0], sorted[n - 1]);
    let norm = 1.0 / (n as f64 * bandwidth * (2.0 * std::f64::consts::PI).sqrt());

    let curve = (0..GRID_POINTS)
        .map(|i| {
            let y = lo + (hi - lo) * i as f64 / (GRID_POINTS - 1) as f64;
            let d = sorted
                .iter()
                .map(|v| (-0.5 * ((y - v) / bandwidth).powi(2)).exp())
                .sum::<f64>()
                * norm;
            (y, d)
        })
        .collect();
    Some(curve)
}

/// Linear-interpolated quantile of sorted, non-empty data.
pub(crate) fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let below = pos.floor() as usize;
    let above = pos.ceil() as usize;
    sorted[below] + (sorted[above] - sorted[below]) * (pos - below as f64)
}
