use super::Source;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationshipStrength {
    Family,
    IntimateFriends,
    CloseFriends,
    #[default]
    CasualFriends,
    Acquaintances,
    BusinessContacts,
    AlmostStrangers,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonCreate {
    pub first_name: String,
    pub last_name: String,
    pub relationship_strength: RelationshipStrength,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthday: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl PersonCreate {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            relationship_strength: RelationshipStrength::default(),
            source: None,
            source_id: None,
            email: None,
            birthday: None,
            phone: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    #[serde(default)]
    pub relationship_strength: RelationshipStrength,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub birthday: Option<NaiveDate>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonTimelineNoteCreate {
    pub person_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonTimelineNote {
    pub id: String,
    #[serde(default)]
    pub date_on: Option<NaiveDate>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn relationship_strength_uses_kebab_case() {
        let create = PersonCreate {
            relationship_strength: RelationshipStrength::BusinessContacts,
            ..PersonCreate::new("Ada", "Lovelace")
        };
        let value = serde_json::to_value(&create).expect("serialize");
        assert_eq!(
            value,
            json!({
                "first_name": "Ada",
                "last_name": "Lovelace",
                "relationship_strength": "business-contacts"
            })
        );
    }
}
