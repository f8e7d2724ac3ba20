//! Payload and response types for LunaTask entities.

pub mod notes;
pub mod people;
pub mod tasks;

use serde::{Deserialize, Serialize};

pub use notes::{JournalEntry, JournalEntryCreate, Note, NoteCreate};
pub use people::{
    Person, PersonCreate, PersonTimelineNote, PersonTimelineNoteCreate, RelationshipStrength,
};
pub use tasks::{Motivation, Task, TaskCreate, TaskStatus, TaskUpdate};

/// External system an entity was imported from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Source {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub source_id: Option<String>,
}
