//! Alias query engine.
//!
//! Resolves a named view into upstream parameters, fetches candidates and then
//! re-applies the view locally, because the upstream is free to ignore filters.

pub mod alias;
pub mod params;

pub use alias::{Alias, AliasCriteria, FilterContext, LocalFilter, SortOrder, StatusFilter};
pub use params::{ListParams, PreparedQuery, prepare};

use super::client::LunaTaskClient;
use crate::constants::TASK_URI_PREFIX;
use crate::domain::Task;
use crate::infrastructure::http::{ApiError, Executor};
use serde_json::{Value, json};
use std::fmt;
use tracing::{debug, info};

const OVERDUE_FALLBACK_SORT: &str = "scheduled_on.asc,id.asc";

/// Which slice of tasks an alias applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Global,
    Area(String),
}

impl Scope {
    /// Area scope; a blank id is rejected before anything is sent.
    pub fn area(area_id: impl Into<String>) -> Result<Self, ApiError> {
        let area_id = area_id.into();
        if area_id.trim().is_empty() {
            return Err(ApiError::missing_scope_id());
        }
        Ok(Scope::Area(area_id))
    }

    fn admits(&self, task: &Task) -> bool {
        match self {
            Scope::Global => true,
            Scope::Area(id) => task.area_id.as_deref() == Some(id.as_str()),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => f.write_str("global"),
            Scope::Area(id) => write!(f, "area:{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AliasListing {
    pub alias: Alias,
    pub items: Vec<Task>,
    pub limit: u32,
    pub sort: &'static str,
}

impl AliasListing {
    /// `{items, limit, sort}` with a `detail_uri` on every item.
    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        let items = self
            .items
            .iter()
            .map(|task| {
                let mut value = serde_json::to_value(task)?;
                if let Value::Object(map) = &mut value {
                    map.insert("detail_uri".to_string(), Value::String(detail_uri(&task.id)));
                }
                Ok(value)
            })
            .collect::<Result<Vec<Value>, serde_json::Error>>()?;
        Ok(json!({
            "items": items,
            "limit": self.limit,
            "sort": self.sort,
        }))
    }
}

pub fn detail_uri(task_id: &str) -> String {
    format!("{TASK_URI_PREFIX}{task_id}")
}

fn upstream_params(criteria: &AliasCriteria, scope: &Scope) -> ListParams {
    let mut params = ListParams::new()
        .with_limit(criteria.limit)
        .with_status(criteria.status.as_str());
    params = match scope {
        Scope::Global => params.with("scope", "global"),
        Scope::Area(id) => params.with_area(id),
    };
    if let Some(window) = criteria.window {
        params = params.with("window", window);
    }
    if let Some(min_priority) = criteria.min_priority {
        params = params.with("min_priority", min_priority);
    }
    if let Some(since) = criteria.completed_since {
        params = params.with("completed_since", since);
    }
    if let Some(sort) = criteria.sort_hint {
        params = params.with("sort", sort);
    }
    params
}

impl<E: Executor> LunaTaskClient<E> {
    /// List tasks for a named view.
    ///
    /// Unknown aliases and blank scope ids fail before any request is made.
    pub async fn list_alias(&self, alias: &str, scope: Scope) -> Result<AliasListing, ApiError> {
        if let Scope::Area(id) = &scope {
            if id.trim().is_empty() {
                return Err(ApiError::missing_scope_id());
            }
        }
        let alias: Alias = alias.parse()?;
        let criteria = alias.criteria();
        info!(alias = %alias, scope = %scope, "Listing tasks for alias");

        let ctx = FilterContext {
            today: self.today(),
            now: self.now(),
        };
        let fetched = self.list_tasks(&upstream_params(criteria, &scope)).await?;
        let fetched_count = fetched.len();
        let mut selected = select(fetched, criteria, &scope, &ctx);

        if alias == Alias::Overdue && scope == Scope::Global && selected.is_empty() {
            info!("No overdue tasks after filtering; retrying with plain global query");
            let fallback = ListParams::new()
                .with("scope", "global")
                .with_limit(criteria.limit)
                .with_status(StatusFilter::Open.as_str())
                .with("sort", OVERDUE_FALLBACK_SORT);
            selected = select(self.list_tasks(&fallback).await?, criteria, &scope, &ctx);
        }

        selected.sort_by(|a, b| criteria.sort.compare(a, b));
        selected.truncate(criteria.limit as usize);
        debug!(
            alias = %alias,
            fetched = fetched_count,
            returned = selected.len(),
            "Alias filtering complete"
        );

        Ok(AliasListing {
            alias,
            items: selected,
            limit: criteria.limit,
            sort: criteria.sort.descriptor(),
        })
    }
}

fn select(tasks: Vec<Task>, criteria: &AliasCriteria, scope: &Scope, ctx: &FilterContext) -> Vec<Task> {
    tasks
        .into_iter()
        .filter(|task| scope.admits(task) && criteria.matches(task, ctx))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_params_carry_alias_hints() {
        let params = upstream_params(Alias::Overdue.criteria(), &Scope::Area("a1".into()));
        assert_eq!(params.get("area_id"), Some("a1"));
        assert_eq!(params.get("window"), Some("overdue"));
        assert_eq!(params.get("sort"), Some("scheduled_on.asc,priority.desc,id.asc"));
        assert_eq!(params.get("status"), Some("open"));
        assert_eq!(params.get("scope"), None);

        let params = upstream_params(Alias::RecentCompletions.criteria(), &Scope::Global);
        assert_eq!(params.get("scope"), Some("global"));
        assert_eq!(params.get("status"), Some("completed"));
        assert_eq!(params.get("completed_since"), Some("-72h"));

        let params = upstream_params(Alias::Now.criteria(), &Scope::Global);
        assert_eq!(params.get("limit"), Some("25"));
        assert_eq!(params.get("window"), None);
    }

    #[test]
    fn blank_area_is_missing_scope() {
        let err = Scope::area("  ").unwrap_err();
        assert!(err.to_string().contains("area_id"));
    }

    #[test]
    fn listing_json_adds_detail_uri() {
        let task: Task = serde_json::from_value(json!({"id": "t-9"})).unwrap();
        let listing = AliasListing {
            alias: Alias::Today,
            items: vec![task],
            limit: 50,
            sort: SortOrder::PriorityFirst.descriptor(),
        };
        let value = listing.to_json().expect("listing serializes");
        assert_eq!(value["items"][0]["detail_uri"], "lunatask://tasks/t-9");
        assert_eq!(value["limit"], 50);
        assert_eq!(value["sort"], "priority.desc,scheduled_on.asc,id.asc");
    }

    #[test]
    fn listing_json_keeps_every_task_field() {
        let task: Task = serde_json::from_value(json!({
            "id": "t-1",
            "area_id": "a1",
            "status": "started",
            "priority": 2,
            "scheduled_on": "2026-10-19"
        }))
        .unwrap();
        let listing = AliasListing {
            alias: Alias::Now,
            items: vec![task],
            limit: 25,
            sort: SortOrder::PriorityFirst.descriptor(),
        };
        let item = &listing.to_json().expect("listing serializes")["items"][0];
        assert_eq!(item["id"], "t-1");
        assert_eq!(item["area_id"], "a1");
        assert_eq!(item["status"], "started");
        assert_eq!(item["priority"], 2);
        assert_eq!(item["scheduled_on"], "2026-10-19");
        assert_eq!(item["detail_uri"], "lunatask://tasks/t-1");
    }
}
