use super::clock::{Clock, SystemClock};
use super::query::params::{ListParams, prepare};
use crate::config::ServerConfig;
use crate::domain::{
    JournalEntry, JournalEntryCreate, Note, NoteCreate, Person, PersonCreate, PersonTimelineNote,
    PersonTimelineNoteCreate, Task, TaskCreate, TaskUpdate,
};
use crate::infrastructure::http::{ApiError, Executor, JsonMap, RequestExecutor};
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// LunaTask API client: entity operations over a rate-limited executor.
///
/// Each instance owns its executor, and with it its token bucket and
/// connection pool.
pub struct LunaTaskClient<E: Executor = RequestExecutor> {
    executor: E,
    clock: Arc<dyn Clock>,
    timezone: FixedOffset,
}

impl LunaTaskClient<RequestExecutor> {
    pub fn from_config(config: &ServerConfig) -> Result<Self, ApiError> {
        let executor = RequestExecutor::from_config(config)?;
        Ok(Self::new(executor).with_timezone(config.timezone))
    }
}

impl<E: Executor> LunaTaskClient<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            clock: Arc::new(SystemClock),
            timezone: Utc.fix(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_timezone(mut self, timezone: FixedOffset) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn timezone(&self) -> FixedOffset {
        self.timezone
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Current calendar day in the configured offset.
    pub fn today(&self) -> NaiveDate {
        self.now().with_timezone(&self.timezone).date_naive()
    }

    /// Probe `GET ping`. Every failure, classified or not, becomes `false`.
    pub async fn test_connectivity(&self) -> bool {
        match self.executor.execute(Method::GET, "ping", None, None).await {
            Ok(body) if body.get("message").and_then(Value::as_str) == Some("pong") => {
                info!("LunaTask API connectivity test successful");
                true
            }
            Ok(_) => {
                warn!("LunaTask API connectivity test failed: unexpected response");
                false
            }
            Err(err) => {
                warn!(kind = %err.kind(), error = %err, "LunaTask API connectivity test failed");
                false
            }
        }
    }

    pub async fn list_tasks(&self, params: &ListParams) -> Result<Vec<Task>, ApiError> {
        let prepared = prepare(params)?;
        let query = (!prepared.query.is_empty()).then_some(&prepared.query);
        let body = self.executor.execute(Method::GET, "tasks", None, query).await?;
        let mut tasks: Vec<Task> = unwrap_entity(body, "tasks", "tasks")?;
        if prepared.open_only {
            tasks.retain(|task| !task.is_completed());
        }
        debug!(count = tasks.len(), "Retrieved tasks");
        Ok(tasks)
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Task, ApiError> {
        let endpoint = entity_endpoint("tasks", "task", task_id)?;
        let body = self.executor.execute(Method::GET, &endpoint, None, None).await?;
        unwrap_entity(body, "task", &endpoint)
    }

    pub async fn create_task(&self, task: &TaskCreate) -> Result<Task, ApiError> {
        task.validate()?;
        let body = self
            .executor
            .execute(Method::POST, "tasks", Some(to_body(task)?), None)
            .await?;
        let created: Task = unwrap_entity(body, "task", "tasks")?;
        info!(task_id = %created.id, "Created task");
        Ok(created)
    }

    pub async fn update_task(&self, task_id: &str, update: &TaskUpdate) -> Result<Task, ApiError> {
        let endpoint = entity_endpoint("tasks", "task", task_id)?;
        update.validate()?;
        let body = self
            .executor
            .execute(Method::PATCH, &endpoint, Some(to_body(update)?), None)
            .await?;
        unwrap_entity(body, "task", &endpoint)
    }

    /// Success is any 2xx, with or without a body.
    pub async fn delete_task(&self, task_id: &str) -> Result<(), ApiError> {
        let endpoint = entity_endpoint("tasks", "task", task_id)?;
        self.executor
            .execute(Method::DELETE, &endpoint, None, None)
            .await?;
        info!(task_id, "Deleted task");
        Ok(())
    }

    /// `None` when the API answers 204, meaning the source/source_id pair
    /// already exists.
    pub async fn create_note(&self, note: &NoteCreate) -> Result<Option<Note>, ApiError> {
        let body = self
            .executor
            .execute(Method::POST, "notes", Some(to_body(note)?), None)
            .await?;
        if body.is_empty() {
            info!("Note creation returned no content; treating as duplicate");
            return Ok(None);
        }
        unwrap_entity(body, "note", "notes").map(Some)
    }

    pub async fn create_journal_entry(
        &self,
        entry: &JournalEntryCreate,
    ) -> Result<JournalEntry, ApiError> {
        let body = self
            .executor
            .execute(Method::POST, "journal_entries", Some(to_body(entry)?), None)
            .await?;
        unwrap_entity(body, "journal_entry", "journal_entries")
    }

    pub async fn create_person(&self, person: &PersonCreate) -> Result<Option<Person>, ApiError> {
        let body = self
            .executor
            .execute(Method::POST, "people", Some(to_body(person)?), None)
            .await?;
        if body.is_empty() {
            info!("Person creation returned no content; treating as duplicate");
            return Ok(None);
        }
        unwrap_entity(body, "person", "people").map(Some)
    }

    pub async fn delete_person(&self, person_id: &str) -> Result<Person, ApiError> {
        let endpoint = entity_endpoint("people", "person", person_id)?;
        let body = self
            .executor
            .execute(Method::DELETE, &endpoint, None, None)
            .await?;
        unwrap_entity(body, "person", &endpoint)
    }

    pub async fn create_person_timeline_note(
        &self,
        note: &PersonTimelineNoteCreate,
    ) -> Result<PersonTimelineNote, ApiError> {
        if note.person_id.trim().is_empty() {
            return Err(ApiError::empty_id("person"));
        }
        let body = self
            .executor
            .execute(Method::POST, "person_timeline_notes", Some(to_body(note)?), None)
            .await?;
        unwrap_entity(body, "person_timeline_note", "person_timeline_notes")
    }

    pub async fn track_habit(&self, habit_id: &str, performed_on: NaiveDate) -> Result<(), ApiError> {
        let endpoint = format!("{}/track", entity_endpoint("habits", "habit", habit_id)?);
        let payload = json!({ "performed_on": performed_on.format("%Y-%m-%d").to_string() });
        self.executor
            .execute(Method::POST, &endpoint, Some(payload), None)
            .await?;
        info!(habit_id, %performed_on, "Tracked habit");
        Ok(())
    }
}

fn entity_endpoint(collection: &str, entity: &str, id: &str) -> Result<String, ApiError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ApiError::empty_id(entity));
    }
    Ok(format!("{collection}/{id}"))
}

fn to_body<T: Serialize>(payload: &T) -> Result<Value, ApiError> {
    serde_json::to_value(payload)
        .map_err(|err| ApiError::bad_request(format!("payload could not be encoded: {err}")))
}

/// Pull the wrapped entity out of a response. A missing wrapper key is a
/// parse failure, never an empty default.
pub(crate) fn unwrap_entity<T: DeserializeOwned>(
    mut body: JsonMap,
    key: &str,
    endpoint: &str,
) -> Result<T, ApiError> {
    let value = body
        .remove(key)
        .ok_or_else(|| ApiError::parse(endpoint, format!("missing '{key}' key")))?;
    serde_json::from_value(value).map_err(|err| ApiError::parse(endpoint, err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::http::{ErrorKind, QueryParams};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    struct Call {
        method: Method,
        endpoint: String,
        body: Option<Value>,
        query: Option<QueryParams>,
    }

    #[derive(Default)]
    struct ScriptedExecutor {
        responses: Mutex<VecDeque<Result<JsonMap, ApiError>>>,
        calls: Mutex<Vec<Call>>,
    }

    impl ScriptedExecutor {
        fn with(responses: Vec<Result<Value, ApiError>>) -> Self {
            let responses = responses
                .into_iter()
                .map(|r| {
                    r.map(|value| match value {
                        Value::Object(map) => map,
                        _ => JsonMap::new(),
                    })
                })
                .collect();
            Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Executor for ScriptedExecutor {
        async fn execute(
            &self,
            method: Method,
            endpoint: &str,
            body: Option<Value>,
            query: Option<&QueryParams>,
        ) -> Result<JsonMap, ApiError> {
            self.calls.lock().unwrap().push(Call {
                method,
                endpoint: endpoint.to_string(),
                body,
                query: query.cloned(),
            });
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(JsonMap::new()))
        }
    }

    #[tokio::test]
    async fn connectivity_requires_pong() {
        let client = LunaTaskClient::new(ScriptedExecutor::with(vec![
            Ok(json!({"message": "pong"})),
            Ok(json!({"message": "nope"})),
            Err(ApiError::Auth { status: 401 }),
        ]));
        assert!(client.test_connectivity().await);
        assert!(!client.test_connectivity().await);
        assert!(!client.test_connectivity().await);
    }

    #[tokio::test]
    async fn list_tasks_filters_completed_when_open_requested() {
        let client = LunaTaskClient::new(ScriptedExecutor::with(vec![Ok(json!({
            "tasks": [
                {"id": "a", "status": "later"},
                {"id": "b", "status": "completed"}
            ]
        }))]));
        let tasks = client
            .list_tasks(&ListParams::new().with_status("open"))
            .await
            .expect("tasks");
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "a");
        let calls = client.executor().calls();
        assert!(calls[0].query.is_none());
    }

    #[tokio::test]
    async fn missing_wrapper_key_is_a_parse_failure() {
        let client = LunaTaskClient::new(ScriptedExecutor::with(vec![Ok(json!({"items": []}))]));
        let err = client.list_tasks(&ListParams::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownApi);
        assert!(err.to_string().contains("missing 'tasks' key"));
    }

    #[tokio::test]
    async fn empty_ids_fail_before_any_call() {
        let client = LunaTaskClient::new(ScriptedExecutor::default());
        assert_eq!(
            client.get_task("  ").await.unwrap_err().kind(),
            ErrorKind::BadRequest
        );
        assert_eq!(
            client.delete_person("").await.unwrap_err().kind(),
            ErrorKind::BadRequest
        );
        assert!(client.executor().calls().is_empty());
    }

    #[tokio::test]
    async fn duplicate_note_returns_none() {
        let client = LunaTaskClient::new(ScriptedExecutor::with(vec![Ok(json!({}))]));
        let note = NoteCreate {
            notebook_id: Some("nb".into()),
            name: Some("Standup".into()),
            content: None,
            date_on: None,
            source: Some("calendar".into()),
            source_id: Some("evt-1".into()),
        };
        assert_eq!(client.create_note(&note).await.expect("ok"), None);
    }

    #[tokio::test]
    async fn track_habit_posts_iso_date() {
        let client = LunaTaskClient::new(ScriptedExecutor::default());
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        client.track_habit("h1", date).await.expect("tracked");
        let calls = client.executor().calls();
        assert_eq!(calls[0].method, Method::POST);
        assert_eq!(calls[0].endpoint, "habits/h1/track");
        assert_eq!(calls[0].body, Some(json!({"performed_on": "2026-10-19"})));
    }

    #[tokio::test]
    async fn update_task_sends_patch_with_partial_body() {
        let client = LunaTaskClient::new(ScriptedExecutor::with(vec![Ok(json!({
            "task": {"id": "t1", "status": "completed"}
        }))]));
        let update = TaskUpdate {
            status: Some(crate::domain::TaskStatus::Completed),
            ..TaskUpdate::default()
        };
        let task = client.update_task("t1", &update).await.expect("updated");
        assert!(task.is_completed());
        let calls = client.executor().calls();
        assert_eq!(calls[0].method, Method::PATCH);
        assert_eq!(calls[0].endpoint, "tasks/t1");
        assert_eq!(calls[0].body, Some(json!({"status": "completed"})));
    }

    #[test]
    fn today_uses_configured_offset() {
        use super::super::clock::FixedClock;
        use chrono::TimeZone;
        let instant = Utc.with_ymd_and_hms(2026, 10, 19, 23, 30, 0).unwrap();
        let client = LunaTaskClient::new(ScriptedExecutor::default())
            .with_clock(Arc::new(FixedClock(instant)));
        assert_eq!(client.today(), NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());

        let east = client.with_timezone(FixedOffset::east_opt(2 * 3600).unwrap());
        assert_eq!(east.today(), NaiveDate::from_ymd_opt(2026, 10, 20).unwrap());
    }
}
