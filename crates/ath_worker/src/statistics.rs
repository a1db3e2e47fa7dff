//! Statistics engine: [`compute`] turns a [`Table`] into a [`Report`].
//!
//! Pure and deterministic. Aggregation runs on exact integers; every scalar is
//! rounded half-to-even to one decimal only when the `Report` is assembled.

use std::collections::BTreeMap;

use ath_protocol::{DateInterval, GroupStats, NumMissingValues, Report, TimesScalar};

use crate::dataset::{Row, Table};
use crate::error::StatisticsError;

pub fn compute(table: &Table) -> Result<Report, StatisticsError> {
    let rows = table.rows();
    if rows.is_empty() {
        return Err(StatisticsError::EmptyDataset);
    }

    let mut dates = rows.iter().filter_map(|r| r.date);
    let first = dates.next().ok_or(StatisticsError::NoDates)?;
    let (begin, end) = dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));

    let mut teams: Vec<String> = Vec::new();
    let mut partitions: BTreeMap<&str, Vec<&Row>> = BTreeMap::new();
    for row in rows {
        if let Some(team) = row.team.as_deref() {
            if !partitions.contains_key(team) {
                teams.push(team.to_string());
            }
            partitions.entry(team).or_default().push(row);
        }
    }

    let all: Vec<&Row> = rows.iter().collect();
    let per_team = partitions
        .iter()
        .map(|(team, group)| (team.to_string(), group_stats(group)))
        .collect();

    Ok(Report {
        total_num_observations: rows.len() as u64,
        teams,
        date_interval: DateInterval { begin, end },
        stats: group_stats(&all),
        per_team,
        num_prs_without_review: rows.iter().filter(|r| r.review_time == 0).count() as u64,
        num_prs_without_ci: rows.iter().filter(|r| r.merge_time == 0).count() as u64,
        num_missing_values: NumMissingValues {
            // Required integer columns are rejected at parse time when empty.
            review_time: 0,
            merge_time: 0,
            date: rows.iter().filter(|r| r.date.is_none()).count() as u64,
            team: rows.iter().filter(|r| r.team.is_none()).count() as u64,
        },
    })
}

fn group_stats(rows: &[&Row]) -> GroupStats {
    let review: Vec<i64> = rows.iter().map(|r| r.review_time).collect();
    let merge: Vec<i64> = rows.iter().map(|r| r.merge_time).collect();
    let total: Vec<i64> = rows.iter().map(|r| r.total_time()).collect();

    let scalar = |f: fn(&[i64]) -> Exact| TimesScalar {
        review_time: f(&review).round(),
        merge_time: f(&merge).round(),
        total_time: f(&total).round(),
    };

    GroupStats {
        mean: scalar(mean),
        mode: scalar(mode),
        median: scalar(median),
        count: rows.len() as u64,
    }
}

/// An exact rational `num / den`. `den == 0` only for an empty group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Exact {
    num: i128,
    den: i128,
}

impl Exact {
    fn int(v: i64) -> Self {
        Exact {
            num: v as i128,
            den: 1,
        }
    }

    /// Round half-to-even to one decimal.
    fn round(self) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        let scaled = self.num * 10;
        let q = scaled.div_euclid(self.den);
        let r = scaled.rem_euclid(self.den);
        let tenths = match (2 * r).cmp(&self.den) {
            std::cmp::Ordering::Less => q,
            std::cmp::Ordering::Greater => q + 1,
            std::cmp::Ordering::Equal if q % 2 == 0 => q,
            std::cmp::Ordering::Equal => q + 1,
        };
        tenths as f64 / 10.0
    }
}

fn mean(values: &[i64]) -> Exact {
    Exact {
        num: values.iter().map(|&v| v as i128).sum(),
        den: values.len() as i128,
    }
}

/// Most frequent value; ties go to the smallest value.
fn mode(values: &[i64]) -> Exact {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for &v in values {
        *counts.entry(v).or_default() += 1;
    }
    let mut best: Option<(i64, usize)> = None;
    for (value, count) in counts {
        // Ascending keys: only a strictly higher count replaces the current best.
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((value, count));
        }
    }
    best.map(|(v, _)| Exact::int(v)).unwrap_or(Exact { num: 0, den: 0 })
}

fn median(values: &[i64]) -> Exact {
    if values.is_empty() {
        return Exact { num: 0, den: 0 };
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Exact::int(sorted[mid])
    } else {
        Exact {
            num: sorted[mid - 1] as i128 + sorted[mid] as i128,
            den: 2,
        }
    }
}
