//! Shared SVG chart scaffolding: canvas, titles, axes and team grouping.

use std::collections::BTreeMap;

use svg::node::element::{Line, Rectangle, Text};
use svg::Document;

use crate::dataset::{Row, Table};

pub(crate) const W: f32 = 640.0;
pub(crate) const H: f32 = 480.0;

const FONT: &str = "DejaVu Sans, Arial, sans-serif";

/// matplotlib's default cycle, so charts keep their familiar colors.
const PALETTE: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

pub(crate) fn color(idx: usize) -> &'static str {
    PALETTE[idx % PALETTE.len()]
}

/// Drawing area inside the margins.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Area {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl Area {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }
}

pub(crate) const PLOT_AREA: Area = Area {
    left: 80.0,
    right: W - 30.0,
    top: 70.0,
    bottom: H - 90.0,
};

pub(crate) fn canvas() -> Document {
    Document::new()
        .set("viewBox", (0, 0, W, H))
        .set("width", W)
        .set("height", H)
        .add(
            Rectangle::new()
                .set("x", 0)
                .set("y", 0)
                .set("width", W)
                .set("height", H)
                .set("fill", "#ffffff"),
        )
}

pub(crate) fn text(content: impl Into<String>, x: f32, y: f32, size: f32) -> Text {
    Text::new(content.into())
        .set("x", x)
        .set("y", y)
        .set("font-family", FONT)
        .set("font-size", size)
        .set("fill", "#222222")
}

/// Centered title; `\n` starts a new line.
pub(crate) fn title(mut doc: Document, title: &str) -> Document {
    for (idx, line) in title.lines().enumerate() {
        doc = doc.add(
            text(line, W / 2.0, 28.0 + idx as f32 * 18.0, 14.0).set("text-anchor", "middle"),
        );
    }
    doc
}

pub(crate) fn no_data(doc: Document, area: Area) -> Document {
    doc.add(
        text(
            "No data",
            area.left + area.width() / 2.0,
            area.top + area.height() / 2.0,
            14.0,
        )
        .set("text-anchor", "middle")
        .set("fill", "#777777"),
    )
}

// ============================================================================
// Value axis
// ============================================================================

/// Linear mapping of `[lo, hi]` onto the vertical extent of an area.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Scale {
    pub lo: f64,
    pub hi: f64,
    pub step: f64,
}

impl Scale {
    /// Round `[min, max]` out to tick multiples. Always includes zero.
    pub fn covering(min: f64, max: f64) -> Self {
        let lo = min.min(0.0);
        let hi = max.max(0.0);
        let span = if hi - lo > 0.0 { hi - lo } else { 1.0 };
        let step = nice_step(span / 5.0);
        Scale {
            lo: (lo / step).floor() * step,
            hi: ((hi / step).ceil() * step).max(step),
            step,
        }
    }

    pub fn ticks(&self) -> Vec<f64> {
        let count = ((self.hi - self.lo) / self.step).round() as usize;
        (0..=count).map(|i| self.lo + i as f64 * self.step).collect()
    }

    pub fn y(&self, area: Area, value: f64) -> f32 {
        let frac = (value - self.lo) / (self.hi - self.lo);
        area.bottom - (frac as f32) * area.height()
    }
}

/// 1, 2 or 5 times a power of ten, at least `raw`.
fn nice_step(raw: f64) -> f64 {
    let magnitude = 10f64.powf(raw.log10().floor());
    let residual = raw / magnitude;
    let nice = if residual <= 1.0 {
        1.0
    } else if residual <= 2.0 {
        2.0
    } else if residual <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * magnitude
}

fn tick_label(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

pub(crate) fn y_axis(mut doc: Document, area: Area, scale: Scale, label: &str) -> Document {
    for tick in scale.ticks() {
        let y = scale.y(area, tick);
        doc = doc
            .add(
                Line::new()
                    .set("x1", area.left)
                    .set("y1", y)
                    .set("x2", area.right)
                    .set("y2", y)
                    .set("stroke", if tick == 0.0 { "#333333" } else { "#e5e7eb" })
                    .set("stroke-width", 1),
            )
            .add(
                text(tick_label(tick), area.left - 8.0, y + 4.0, 11.0).set("text-anchor", "end"),
            );
    }

    let mid = area.top + area.height() / 2.0;
    doc.add(
        Line::new()
            .set("x1", area.left)
            .set("y1", area.top)
            .set("x2", area.left)
            .set("y2", area.bottom)
            .set("stroke", "#333333")
            .set("stroke-width", 1),
    )
    .add(
        text(label, area.left - 55.0, mid, 12.0)
            .set("text-anchor", "middle")
            .set("transform", format!("rotate(-90 {} {})", area.left - 55.0, mid)),
    )
}

/// Category labels under the x axis, rotated like long team names need.
pub(crate) fn x_labels(mut doc: Document, area: Area, labels: &[&str]) -> Document {
    let slot = area.width() / labels.len().max(1) as f32;
    for (idx, label) in labels.iter().enumerate() {
        let x = area.left + slot * (idx as f32 + 0.5);
        let y = area.bottom + 16.0;
        doc = doc.add(
            text(*label, x, y, 11.0)
                .set("text-anchor", "end")
                .set("transform", format!("rotate(-35 {} {})", x, y)),
        );
    }
    doc
}

pub(crate) fn legend(mut doc: Document, area: Area, entries: &[(&str, &str)]) -> Document {
    let x = area.right - 110.0;
    for (idx, (label, fill)) in entries.iter().enumerate() {
        let y = area.top + 8.0 + idx as f32 * 18.0;
        doc = doc
            .add(
                Rectangle::new()
                    .set("x", x)
                    .set("y", y)
                    .set("width", 14)
                    .set("height", 10)
                    .set("fill", *fill),
            )
            .add(text(*label, x + 20.0, y + 9.0, 11.0));
    }
    doc
}

// ============================================================================
// Data helpers
// ============================================================================

/// Rows grouped by team, teams sorted. Rows without a team are dropped.
pub(crate) fn group_by_team(table: &Table) -> BTreeMap<&str, Vec<&Row>> {
    let mut groups: BTreeMap<&str, Vec<&Row>> = BTreeMap::new();
    for row in table.rows() {
        if let Some(team) = row.team.as_deref() {
            groups.entry(team).or_default().push(row);
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nice_steps() {
        assert_eq!(nice_step(0.9), 1.0);
        assert_eq!(nice_step(13.0), 20.0);
        assert_eq!(nice_step(45.0), 50.0);
        assert_eq!(nice_step(700.0), 1000.0);
    }

    #[test]
    fn scale_covers_data_and_zero() {
        let scale = Scale::covering(3.0, 97.0);
        assert_eq!(scale.lo, 0.0);
        assert_eq!(scale.hi, 100.0);
        assert_eq!(scale.ticks().len(), 6);

        let flat = Scale::covering(0.0, 0.0);
        assert!(flat.hi > flat.lo);
    }

    #[test]
    fn scale_maps_bounds_to_area_edges() {
        let scale = Scale::covering(0.0, 100.0);
        assert_eq!(scale.y(PLOT_AREA, 0.0), PLOT_AREA.bottom);
        assert_eq!(scale.y(PLOT_AREA, 100.0), PLOT_AREA.top);
    }
}
