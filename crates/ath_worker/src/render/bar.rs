//! Stacked bar chart of mean review and merge time per team.

use svg::node::element::Rectangle;
use svg::Document;

use super::chart::{self, Scale, PLOT_AREA};
use crate::dataset::Table;

const REVIEW_COLOR: usize = 0;
const MERGE_COLOR: usize = 1;

pub(crate) fn mean_time_by_team(table: &Table, title: &str) -> String {
    let doc = chart::title(chart::canvas(), title);
    let groups = chart::group_by_team(table);
    if groups.is_empty() {
        return chart::no_data(doc, PLOT_AREA).to_string();
    }

    let bars: Vec<(&str, f64, f64)> = groups
        .iter()
        .map(|(team, rows)| {
            let n = rows.len() as f64;
            let review = rows.iter().map(|r| r.review_time as f64).sum::<f64>() / n;
            let merge = rows.iter().map(|r| r.merge_time as f64).sum::<f64>() / n;
            (*team, review, merge)
        })
        .collect();

    let max = bars.iter().map(|(_, r, m)| r + m).fold(0.0, f64::max);
    let min = bars.iter().map(|(_, r, m)| r.min(0.0) + m.min(0.0)).fold(0.0, f64::min);
    let scale = Scale::covering(min, max);

    let area = PLOT_AREA;
    let mut doc = chart::y_axis(doc, area, scale, "time (s)");
    let slot = area.width() / bars.len() as f32;
    let bar_width = slot * 0.6;

    for (idx, (_, review, merge)) in bars.iter().enumerate() {
        let x = area.left + slot * idx as f32 + (slot - bar_width) / 2.0;
        doc = doc
            .add(segment(scale, x, bar_width, 0.0, *review, chart::color(REVIEW_COLOR)))
            .add(segment(scale, x, bar_width, *review, review + merge, chart::color(MERGE_COLOR)));
    }

    let labels: Vec<&str> = bars.iter().map(|(team, _, _)| *team).collect();
    let doc = chart::x_labels(doc, area, &labels);
    chart::legend(
        doc,
        area,
        &[
            ("review_time", chart::color(REVIEW_COLOR)),
            ("merge_time", chart::color(MERGE_COLOR)),
        ],
    )
    .to_string()
}

/// Vertical bar piece spanning `from..to` in data units.
fn segment(scale: Scale, x: f32, width: f32, from: f64, to: f64, fill: &str) -> Rectangle {
    let y_from = scale.y(PLOT_AREA, from);
    let y_to = scale.y(PLOT_AREA, to);
    Rectangle::new()
        .set("x", x)
        .set("y", y_from.min(y_to))
        .set("width", width)
        .set("height", (y_from - y_to).abs())
        .set("fill", fill)
        .set("stroke", "#ffffff")
        .set("stroke-width", 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Row;

    fn row(team: &str, review: i64, merge: i64) -> Row {
        Row {
            review_time: review,
            merge_time: merge,
            team: Some(team.to_string()),
            date: None,
        }
    }

    #[test]
    fn draws_two_segments_per_team_sorted() {
        let table = Table::new(vec![
            row("beta-team", 30, 0),
            row("alpha-team", 0, 100),
            row("alpha-team", 50, 50),
        ]);
        let svg = mean_time_by_team(&table, "Mean review and merge time by team");

        assert!(svg.contains("Mean review and merge time by team"));
        assert!(svg.contains("time (s)"));
        let a = svg.find("alpha-team").unwrap();
        let b = svg.find("beta-team").unwrap();
        assert!(a < b);
        // background + two segments per team + two legend swatches
        assert_eq!(svg.matches("<rect").count(), 1 + 4 + 2);
    }

    #[test]
    fn empty_table_says_no_data() {
        let svg = mean_time_by_team(&Table::default(), "t");
        assert!(svg.contains("No data"));
    }
}
