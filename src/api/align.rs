//! Alignment of the portal's offset-padded raw arrays onto calendar labels.
//!
//! Every granularity comes back as a fixed-size array whose first `decalage`
//! slots are padding. The calendar cursor starts at the request's start
//! boundary and advances one unit per surviving slot, so dropping a padded
//! or out-of-window slot never shifts the labels of the slots that remain.

use chrono::{Datelike, Days, Months, NaiveDate};
use tracing::warn;

use super::{Graph, Measurement, RawPoint, ENERGY_METRIC};

/// Turn a surviving raw point into a measurement.
///
/// A sentinel `valeur` (-1 missing, -2 not yet available) becomes `None`
/// whatever the completed flag says: a slot can lie fully in the past and
/// still never have been recorded.
pub(crate) fn normalize(point: &RawPoint, completed: bool) -> Measurement {
    Measurement {
        completed,
        metric: ENERGY_METRIC,
        value: if point.is_sentinel() {
            None
        } else {
            Some(point.valeur)
        },
    }
}

/// Shared alignment walk.
///
/// Indices below `decalage` are skipped unconditionally; `keep` applies the
/// granularity's tail policy on top. `label` receives the count of slots
/// emitted so far, which is exactly how far the calendar cursor has moved.
/// A `decalage` at or past the end of the array is a valid "nothing
/// available yet" answer, not an error.
fn align<K, C, L>(graph: &Graph, keep: K, completed: C, label: L) -> Vec<(String, Measurement)>
where
    K: Fn(usize, &RawPoint) -> bool,
    C: Fn(&RawPoint) -> bool,
    L: Fn(usize) -> String,
{
    let decalage = graph.decalage.max(0) as usize;
    if decalage >= graph.data.len() {
        warn!(
            "no usable slots: decalage {} covers the whole array of {}",
            graph.decalage,
            graph.data.len()
        );
        return Vec::new();
    }

    let mut out = Vec::new();
    for (idx, point) in graph.data.iter().enumerate() {
        if idx < decalage || !keep(idx, point) {
            continue;
        }
        let measurement = normalize(point, completed(point));
        out.push((label(out.len()), measurement));
    }
    out
}

/// Annual: one slot per year, window ending at the current year. No tail
/// cap; a year is complete once it carries a recorded value.
pub(crate) fn per_year(graph: &Graph, today: NaiveDate) -> Vec<(String, Measurement)> {
    if graph.data.is_empty() {
        return Vec::new();
    }
    let first_year = today.year() - (graph.data.len() as i32 - 1);
    align(
        graph,
        |_, _| true,
        RawPoint::is_recorded,
        |step| format!("{}", first_year + step as i32),
    )
}

/// Monthly: labels `MM/YYYY` walking from the requested start month.
///
/// Slots whose offset-corrected `ordre` lies past the requested end month,
/// or whose index lies past the current month number, are placeholders the
/// portal pads the year with. A month counts as completed only once the
/// current month has moved past it.
pub(crate) fn per_month(
    graph: &Graph,
    start: NaiveDate,
    end: NaiveDate,
    today: NaiveDate,
) -> Vec<(String, Measurement)> {
    let end_month = i64::from(end.month());
    let current_month = i64::from(today.month());
    align(
        graph,
        |idx, point| {
            point.ordre - graph.decalage <= end_month && idx as i64 <= current_month
        },
        |point| point.ordre < current_month,
        |step| match start.checked_add_months(Months::new(step as u32)) {
            Some(month) => month.format("%m/%Y").to_string(),
            None => String::new(),
        },
    )
}

/// Daily: labels `DD/MM/YYYY` walking from the first of the month.
///
/// Raw indices above 29 are dropped, matching the portal's historical
/// behavior of never serving more than 30 meaningful day slots. That cap
/// silently loses the 31st of long months; it is kept as-is because the
/// portal's own graphs do the same.
pub(crate) fn per_day(graph: &Graph, start: NaiveDate) -> Vec<(String, Measurement)> {
    const LAST_DAY_INDEX: usize = 29;
    align(
        graph,
        |idx, _| idx <= LAST_DAY_INDEX,
        RawPoint::is_recorded,
        |step| match start.checked_add_days(Days::new(step as u64)) {
            Some(day) => day.format("%d/%m/%Y").to_string(),
            None => String::new(),
        },
    )
}

/// Hourly: 48 half-hour slots labeled `HH:MM`, starting at `00:00` on the
/// first surviving slot.
pub(crate) fn per_hour(graph: &Graph) -> Vec<(String, Measurement)> {
    align(
        graph,
        |_, _| true,
        RawPoint::is_recorded,
        |step| {
            let minutes = 30 * step;
            format!("{:02}:{:02}", (minutes / 60) % 24, minutes % 60)
        },
    )
}
