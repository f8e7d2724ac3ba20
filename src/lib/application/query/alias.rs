//! Static alias table: upstream hints, local predicate and sort order per view.

use crate::domain::{Motivation, Task, TaskStatus};
use crate::infrastructure::http::ApiError;
use chrono::{DateTime, Days, Duration, NaiveDate, Utc};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Stand-in priority for records without one; below every real level.
const MISSING_PRIORITY: i8 = -10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Alias {
    Now,
    Today,
    Overdue,
    Next7Days,
    HighPriority,
    RecentCompletions,
}

impl Alias {
    pub const ALL: [Alias; 6] = [
        Alias::Now,
        Alias::Today,
        Alias::Overdue,
        Alias::Next7Days,
        Alias::HighPriority,
        Alias::RecentCompletions,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Alias::Now => "now",
            Alias::Today => "today",
            Alias::Overdue => "overdue",
            Alias::Next7Days => "next_7_days",
            Alias::HighPriority => "high_priority",
            Alias::RecentCompletions => "recent_completions",
        }
    }

    pub fn criteria(self) -> &'static AliasCriteria {
        match self {
            Alias::Now => &CRITERIA[0],
            Alias::Today => &CRITERIA[1],
            Alias::Overdue => &CRITERIA[2],
            Alias::Next7Days => &CRITERIA[3],
            Alias::HighPriority => &CRITERIA[4],
            Alias::RecentCompletions => &CRITERIA[5],
        }
    }
}

impl FromStr for Alias {
    type Err = ApiError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Alias::ALL
            .into_iter()
            .find(|alias| alias.as_str() == value)
            .ok_or_else(|| ApiError::unknown_alias(value))
    }
}

impl fmt::Display for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    /// Anything not completed.
    Open,
    Completed,
}

impl StatusFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusFilter::Open => "open",
            StatusFilter::Completed => "completed",
        }
    }

    pub fn matches(self, task: &Task) -> bool {
        match self {
            StatusFilter::Open => !task.is_completed(),
            StatusFilter::Completed => task.is_completed(),
        }
    }
}

/// Instants the local predicates are evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct FilterContext {
    pub today: NaiveDate,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalFilter {
    /// Undated and urgent by at least one signal.
    Now,
    Today,
    /// Scheduled strictly before today.
    Overdue,
    /// Scheduled after today, up to and including today + 7.
    NextDays(u64),
    MinPriority(i8),
    CompletedWithinHours(i64),
}

impl LocalFilter {
    pub fn matches(self, task: &Task, ctx: &FilterContext) -> bool {
        match self {
            LocalFilter::Now => {
                task.scheduled_on.is_none()
                    && (task.status == TaskStatus::Started
                        || task.priority == Some(2)
                        || task.motivation == Some(Motivation::Must)
                        || task.eisenhower == Some(1))
            }
            LocalFilter::Today => task.scheduled_on == Some(ctx.today),
            LocalFilter::Overdue => task.scheduled_on.is_some_and(|day| day < ctx.today),
            LocalFilter::NextDays(days) => {
                let horizon = ctx.today.checked_add_days(Days::new(days));
                task.scheduled_on
                    .is_some_and(|day| day > ctx.today && horizon.is_some_and(|end| day <= end))
            }
            LocalFilter::MinPriority(min) => task.priority.is_some_and(|p| p >= min),
            LocalFilter::CompletedWithinHours(hours) => {
                let cutoff = ctx.now - Duration::hours(hours);
                task.completed_at.is_some_and(|at| at >= cutoff)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// priority desc, scheduled asc (undated last), id asc
    PriorityFirst,
    /// scheduled asc (undated last), priority desc, id asc
    ScheduleFirst,
    /// completed desc (missing last), id asc
    CompletionFirst,
}

impl SortOrder {
    pub fn descriptor(self) -> &'static str {
        match self {
            SortOrder::PriorityFirst => "priority.desc,scheduled_on.asc,id.asc",
            SortOrder::ScheduleFirst => "scheduled_on.asc,priority.desc,id.asc",
            SortOrder::CompletionFirst => "completed_at.desc,id.asc",
        }
    }

    pub fn compare(self, a: &Task, b: &Task) -> Ordering {
        let primary = match self {
            SortOrder::PriorityFirst => priority_desc(a, b).then_with(|| scheduled_asc(a, b)),
            SortOrder::ScheduleFirst => scheduled_asc(a, b).then_with(|| priority_desc(a, b)),
            SortOrder::CompletionFirst => completed_desc(a, b),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

fn priority_desc(a: &Task, b: &Task) -> Ordering {
    let a = a.priority.unwrap_or(MISSING_PRIORITY);
    let b = b.priority.unwrap_or(MISSING_PRIORITY);
    b.cmp(&a)
}

fn scheduled_asc(a: &Task, b: &Task) -> Ordering {
    match (a.scheduled_on, b.scheduled_on) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn completed_desc(a: &Task, b: &Task) -> Ordering {
    match (a.completed_at, b.completed_at) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Everything one alias expands to. Built once, never mutated.
#[derive(Debug)]
pub struct AliasCriteria {
    pub status: StatusFilter,
    pub limit: u32,
    pub window: Option<&'static str>,
    pub min_priority: Option<&'static str>,
    pub completed_since: Option<&'static str>,
    pub sort_hint: Option<&'static str>,
    pub filter: LocalFilter,
    pub sort: SortOrder,
}

impl AliasCriteria {
    pub fn matches(&self, task: &Task, ctx: &FilterContext) -> bool {
        self.status.matches(task) && self.filter.matches(task, ctx)
    }
}

static CRITERIA: [AliasCriteria; 6] = [
    AliasCriteria {
        status: StatusFilter::Open,
        limit: 25,
        window: None,
        min_priority: None,
        completed_since: None,
        sort_hint: None,
        filter: LocalFilter::Now,
        sort: SortOrder::PriorityFirst,
    },
    AliasCriteria {
        status: StatusFilter::Open,
        limit: 50,
        window: Some("today"),
        min_priority: None,
        completed_since: None,
        sort_hint: None,
        filter: LocalFilter::Today,
        sort: SortOrder::PriorityFirst,
    },
    AliasCriteria {
        status: StatusFilter::Open,
        limit: 50,
        window: Some("overdue"),
        min_priority: None,
        completed_since: None,
        sort_hint: Some("scheduled_on.asc,priority.desc,id.asc"),
        filter: LocalFilter::Overdue,
        sort: SortOrder::ScheduleFirst,
    },
    AliasCriteria {
        status: StatusFilter::Open,
        limit: 50,
        window: Some("next_7_days"),
        min_priority: None,
        completed_since: None,
        sort_hint: None,
        filter: LocalFilter::NextDays(7),
        sort: SortOrder::ScheduleFirst,
    },
    AliasCriteria {
        status: StatusFilter::Open,
        limit: 50,
        window: None,
        min_priority: Some("high"),
        completed_since: None,
        sort_hint: None,
        filter: LocalFilter::MinPriority(1),
        sort: SortOrder::PriorityFirst,
    },
    AliasCriteria {
        status: StatusFilter::Completed,
        limit: 50,
        window: None,
        min_priority: None,
        completed_since: Some("-72h"),
        sort_hint: None,
        filter: LocalFilter::CompletedWithinHours(72),
        sort: SortOrder::CompletionFirst,
    },
];
