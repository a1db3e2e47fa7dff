//! Pie chart of PR counts per team.

use std::f32::consts::TAU;

use svg::node::element::path::Data;
use svg::node::element::{Circle, Path};
use svg::Document;

use super::chart::{self, H, W};
use crate::dataset::Table;

const SEGMENTS_PER_TURN: f32 = 64.0;
const RADIUS: f32 = 150.0;

pub(crate) fn prs_by_team(table: &Table, title: &str) -> String {
    let doc = chart::title(chart::canvas(), title);
    let groups = chart::group_by_team(table);
    let total: usize = groups.values().map(Vec::len).sum();
    if total == 0 {
        return chart::no_data(doc, chart::PLOT_AREA).to_string();
    }

    let (cx, cy) = (W / 2.0, H / 2.0 + 20.0);
    let mut doc = doc;
    let mut start = 0.0f32;

    for (idx, (team, rows)) in groups.iter().enumerate() {
        let share = rows.len() as f32 / total as f32;
        let sweep = share * TAU;
        let fill = chart::color(idx);

        doc = if rows.len() == total {
            doc.add(
                Circle::new()
                    .set("cx", cx)
                    .set("cy", cy)
                    .set("r", RADIUS)
                    .set("fill", fill),
            )
        } else {
            doc.add(wedge(cx, cy, start, sweep, fill))
        };

        // Angles run counter-clockwise from three o'clock; SVG y points down.
        let mid = start + sweep / 2.0;
        let (dx, dy) = (mid.cos(), -mid.sin());
        let anchor = if dx < -0.1 {
            "end"
        } else if dx > 0.1 {
            "start"
        } else {
            "middle"
        };
        doc = doc.add(
            chart::text(*team, cx + dx * RADIUS * 1.1, cy + dy * RADIUS * 1.1 + 4.0, 12.0)
                .set("text-anchor", anchor),
        );

        let (lx, ly) = (cx + dx * RADIUS * 0.6, cy + dy * RADIUS * 0.6);
        for (line_idx, line) in share_label(rows.len(), total).lines().enumerate() {
            doc = doc.add(
                chart::text(line, lx, ly + line_idx as f32 * 14.0, 11.0)
                    .set("text-anchor", "middle")
                    .set("fill", "#ffffff"),
            );
        }

        start += sweep;
    }

    doc.to_string()
}

/// `"x.x%\n(n PRs)"`
pub(crate) fn share_label(count: usize, total: usize) -> String {
    let pct = count as f64 * 100.0 / total as f64;
    format!("{:.1}%\n({} PRs)", pct, count)
}

/// Filled circular sector, arc approximated by straight segments.
fn wedge(cx: f32, cy: f32, start: f32, sweep: f32, fill: &str) -> Path {
    let steps = ((sweep / TAU) * SEGMENTS_PER_TURN).ceil().max(1.0) as usize;
    let point = |angle: f32| (cx + RADIUS * angle.cos(), cy - RADIUS * angle.sin());

    let mut data = Data::new().move_to((cx, cy)).line_to(point(start));
    for step in 1..=steps {
        data = data.line_to(point(start + sweep * step as f32 / steps as f32));
    }

    Path::new()
        .set("d", data.close())
        .set("fill", fill)
        .set("stroke", "#ffffff")
        .set("stroke-width", 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Row;

    fn rows(team: &str, n: usize) -> Vec<Row> {
        (0..n)
            .map(|_| Row {
                review_time: 1,
                merge_time: 1,
                team: Some(team.to_string()),
                date: None,
            })
            .collect()
    }

    #[test]
    fn share_labels() {
        assert_eq!(share_label(1, 3), "33.3%\n(1 PRs)");
        assert_eq!(share_label(2, 2), "100.0%\n(2 PRs)");
    }

    #[test]
    fn one_wedge_per_team() {
        let mut all = rows("alpha", 3);
        all.extend(rows("beta", 1));
        all.push(Row {
            review_time: 1,
            merge_time: 1,
            team: None,
            date: None,
        });
        let svg = prs_by_team(&Table::new(all), "Number of PRs by team");

        assert_eq!(svg.matches("<path").count(), 2);
        assert!(svg.contains("75.0%"));
        assert!(svg.contains("(1 PRs)"));
    }

    #[test]
    fn single_team_is_a_full_disc() {
        let svg = prs_by_team(&Table::new(rows("solo", 2)), "t");
        assert_eq!(svg.matches("<circle").count(), 1);
        assert!(svg.contains("100.0%"));
    }

    #[test]
    fn no_teams_says_no_data() {
        let svg = prs_by_team(&Table::default(), "t");
        assert!(svg.contains("No data"));
    }
}
