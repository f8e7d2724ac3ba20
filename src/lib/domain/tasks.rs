use super::Source;
use crate::infrastructure::http::ApiError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const MIN_PRIORITY: i8 = -2;
pub const MAX_PRIORITY: i8 = 2;
pub const MAX_EISENHOWER: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Later,
    Next,
    Started,
    Waiting,
    Completed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Later => "later",
            TaskStatus::Next => "next",
            TaskStatus::Started => "started",
            TaskStatus::Waiting => "waiting",
            TaskStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Motivation {
    Must,
    Should,
    Want,
    #[default]
    Unknown,
}

/// Task as returned by the API.
///
/// Older responses carry a single `source`/`source_id` pair instead of a
/// `sources` list; both shapes are folded into `sources`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTask")]
pub struct Task {
    pub id: String,
    pub area_id: Option<String>,
    pub goal_id: Option<String>,
    pub status: TaskStatus,
    pub previous_status: Option<TaskStatus>,
    pub estimate: Option<i64>,
    pub priority: Option<i8>,
    pub progress: Option<i64>,
    pub motivation: Option<Motivation>,
    pub eisenhower: Option<u8>,
    pub scheduled_on: Option<NaiveDate>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub sources: Vec<Source>,
}

impl Task {
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSources {
    Many(Vec<Source>),
    One(Source),
}

#[derive(Debug, Deserialize)]
struct RawTask {
    id: String,
    #[serde(default)]
    area_id: Option<String>,
    #[serde(default)]
    goal_id: Option<String>,
    #[serde(default)]
    status: Option<TaskStatus>,
    #[serde(default)]
    previous_status: Option<TaskStatus>,
    #[serde(default)]
    estimate: Option<i64>,
    #[serde(default)]
    priority: Option<i8>,
    #[serde(default)]
    progress: Option<i64>,
    #[serde(default)]
    motivation: Option<Motivation>,
    #[serde(default)]
    eisenhower: Option<u8>,
    #[serde(default)]
    scheduled_on: Option<NaiveDate>,
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    sources: Option<RawSources>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    source_id: Option<String>,
}

impl TryFrom<RawTask> for Task {
    type Error = String;

    fn try_from(raw: RawTask) -> Result<Self, Self::Error> {
        if let Some(priority) = raw.priority {
            if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
                return Err(format!("task {} has priority {priority} outside -2..=2", raw.id));
            }
        }
        if let Some(eisenhower) = raw.eisenhower {
            if eisenhower > MAX_EISENHOWER {
                return Err(format!(
                    "task {} has eisenhower {eisenhower} outside 0..=4",
                    raw.id
                ));
            }
        }

        let sources = match raw.sources {
            Some(RawSources::Many(list)) => list,
            Some(RawSources::One(single)) => vec![single],
            None if raw.source.is_some() || raw.source_id.is_some() => vec![Source {
                source: raw.source,
                source_id: raw.source_id,
            }],
            None => Vec::new(),
        };

        Ok(Task {
            id: raw.id,
            area_id: raw.area_id,
            goal_id: raw.goal_id,
            status: raw.status.unwrap_or_default(),
            previous_status: raw.previous_status,
            estimate: raw.estimate,
            priority: raw.priority,
            progress: raw.progress,
            motivation: raw.motivation,
            eisenhower: raw.eisenhower,
            scheduled_on: raw.scheduled_on,
            completed_at: raw.completed_at,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
            sources,
        })
    }
}

fn check_ranges(priority: Option<i8>, eisenhower: Option<u8>) -> Result<(), ApiError> {
    if let Some(priority) = priority {
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
            return Err(ApiError::bad_request(format!(
                "priority {priority} must be between -2 and 2"
            )));
        }
    }
    if let Some(eisenhower) = eisenhower {
        if eisenhower > MAX_EISENHOWER {
            return Err(ApiError::bad_request(format!(
                "eisenhower {eisenhower} must be between 0 and 4"
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskCreate {
    pub area_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motivation: Option<Motivation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eisenhower: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_on: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
}

impl TaskCreate {
    pub fn new(area_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            area_id: area_id.into(),
            name: Some(name.into()),
            note: None,
            goal_id: None,
            status: None,
            estimate: None,
            priority: None,
            progress: None,
            motivation: None,
            eisenhower: None,
            scheduled_on: None,
            source: None,
            source_id: None,
        }
    }

    pub fn with_priority(mut self, priority: i8) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_scheduled_on(mut self, date: NaiveDate) -> Self {
        self.scheduled_on = Some(date);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>, source_id: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self.source_id = Some(source_id.into());
        self
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if self.area_id.trim().is_empty() {
            return Err(ApiError::bad_request("area_id must not be empty"));
        }
        check_ranges(self.priority, self.eisenhower)
    }
}

/// Partial update; unset fields are left out of the PATCH body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motivation: Option<Motivation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eisenhower: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_on: Option<NaiveDate>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        *self == TaskUpdate::default()
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if self.is_empty() {
            return Err(ApiError::bad_request("task update must change at least one field"));
        }
        check_ranges(self.priority, self.eisenhower)
    }
}
