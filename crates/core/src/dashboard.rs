//! Activity summary shown on the dashboard.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone};
use serde::Serialize;

use crate::model::{
    AppState, CategoryFilter, Task, DEFAULT_CATEGORY_COLOR, UNCATEGORIZED, UNCATEGORIZED_LABEL,
};
use crate::views::{newest_first, percent};

const RECENT_LIMIT: usize = 5;
const URGENT_LIMIT: usize = 3;
const WEEKDAY_LABELS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStat {
    pub id: String,
    pub name: String,
    pub color: String,
    pub total: usize,
    pub completed: usize,
    pub percentage: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WeekdayStat {
    pub day: &'static str,
    pub count: usize,
    pub rate: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard<'a> {
    pub added_today: usize,
    pub completed_today: usize,
    pub recent: Vec<&'a Task>,
    pub urgent: Vec<&'a Task>,
    pub categories: Vec<CategoryStat>,
    pub weekdays: Vec<WeekdayStat>,
}

impl<'a> Dashboard<'a> {
    /// Summarise `state` as of `now`. Calendar days and weekdays are taken in
    /// `now`'s time zone.
    ///
    /// `selection` narrows every figure except the per-category breakdown,
    /// which always covers all tasks.
    pub fn compute<Tz: TimeZone>(
        state: &'a AppState,
        selection: &CategoryFilter,
        now: &DateTime<Tz>,
    ) -> Self {
        let zone = now.timezone();
        let today = now.date_naive();
        let local_day =
            |task: &Task| -> NaiveDate { task.created_at.with_timezone(&zone).date_naive() };

        let selected: Vec<&Task> = state
            .tasks
            .iter()
            .filter(|task| selection.admits(task))
            .collect();

        let created_today: Vec<&Task> = selected
            .iter()
            .copied()
            .filter(|task| local_day(task) == today)
            .collect();
        let completed_today = created_today.iter().filter(|task| task.completed).count();

        let mut recent = newest_first(selected.clone());
        recent.truncate(RECENT_LIMIT);

        let urgent = selected
            .iter()
            .copied()
            .filter(|task| !task.completed)
            .take(URGENT_LIMIT)
            .collect();

        let mut counts = [0usize; 7];
        let mut done = [0usize; 7];
        for task in &selected {
            let index = task
                .created_at
                .with_timezone(&zone)
                .weekday()
                .num_days_from_sunday() as usize;
            counts[index] += 1;
            if task.completed {
                done[index] += 1;
            }
        }
        let weekdays = WEEKDAY_LABELS
            .into_iter()
            .enumerate()
            .map(|(index, day)| WeekdayStat {
                day,
                count: counts[index],
                rate: percent(done[index], counts[index]),
            })
            .collect();

        Self {
            added_today: created_today.len(),
            completed_today,
            recent,
            urgent,
            categories: category_breakdown(state),
            weekdays,
        }
    }
}

fn category_breakdown(state: &AppState) -> Vec<CategoryStat> {
    let mut stats: Vec<CategoryStat> = state
        .categories
        .iter()
        .map(|category| CategoryStat {
            id: category.id.clone(),
            name: category.name.clone(),
            color: category.color.clone(),
            total: 0,
            completed: 0,
            percentage: 0,
        })
        .chain(std::iter::once(CategoryStat {
            id: UNCATEGORIZED.to_string(),
            name: UNCATEGORIZED_LABEL.to_string(),
            color: DEFAULT_CATEGORY_COLOR.to_string(),
            total: 0,
            completed: 0,
            percentage: 0,
        }))
        .collect();

    for task in state.tasks.iter() {
        if let Some(stat) = stats.iter_mut().find(|stat| stat.id == task.category_id) {
            stat.total += 1;
            if task.completed {
                stat.completed += 1;
            }
        }
    }

    for stat in &mut stats {
        stat.percentage = percent(stat.completed, stat.total);
    }
    stats.sort_by(|a, b| b.total.cmp(&a.total));
    stats
}
