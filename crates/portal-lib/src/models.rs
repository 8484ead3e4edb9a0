//! Entity records served by the portal API
//!
//! Every entity arrives in the same envelope, `{data: {...}, links: {...}}`.
//! The `data` record is typed per entity kind; `links` maps relation names to
//! resource paths.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Server-assigned entity identifier
pub type EntityId = i64;

/// Relation name to resource path, e.g. `cogs_marker -> /api/users/5`
pub type Links = BTreeMap<String, String>;

/// Access to the identifier carried inside a data record
pub trait EntityData {
    fn id(&self) -> EntityId;
}

/// One server-described record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity<D> {
    pub data: D,
    #[serde(default, deserialize_with = "deserialize_links")]
    pub links: Links,
}

impl<D: EntityData> Entity<D> {
    pub fn id(&self) -> EntityId {
        self.data.id()
    }

    /// Resource path for a relation, if the server supplied one
    pub fn link(&self, relation: &str) -> Option<&str> {
        self.links.get(relation).map(String::as_str)
    }
}

/// Null links (e.g. an unassigned marker) are dropped instead of stored.
fn deserialize_links<'de, De>(deserializer: De) -> Result<Links, De::Error>
where
    De: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Option<String>>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(relation, path)| path.map(|p| (relation, p)))
        .collect())
}

/// Research project offered within a rotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectData {
    pub id: EntityId,
    pub title: String,
    pub series: i32,
    pub part: i32,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub small_info: Option<String>,
    #[serde(default)]
    pub authors: Option<String>,
    #[serde(default)]
    pub programmes: Vec<String>,
    #[serde(default)]
    pub is_wetlab: bool,
    #[serde(default)]
    pub is_computational: bool,
    #[serde(default)]
    pub supervisor_id: Option<EntityId>,
    #[serde(default)]
    pub student_id: Option<EntityId>,
    #[serde(default)]
    pub cogs_marker_id: Option<EntityId>,
    #[serde(default)]
    pub group_id: Option<EntityId>,
    #[serde(default)]
    pub student_uploaded: bool,
    #[serde(default)]
    pub grace_passed: bool,
}

impl EntityData for ProjectData {
    fn id(&self) -> EntityId {
        self.id
    }
}

/// Named permissions granted to a user; unknown permissions are ignored
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Permissions {
    pub create_projects: bool,
    pub review_other_projects: bool,
    pub join_projects: bool,
    pub view_projects_predeadline: bool,
    pub view_all_submitted_projects: bool,
    pub modify_permissions: bool,
    pub create_project_groups: bool,
    pub set_readonly: bool,
}

/// Portal account: student, supervisor, marker or administrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserData {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub first_option_id: Option<EntityId>,
    #[serde(default)]
    pub second_option_id: Option<EntityId>,
    #[serde(default)]
    pub third_option_id: Option<EntityId>,
    #[serde(default)]
    pub current_student_project: Option<EntityId>,
    #[serde(default)]
    pub permissions: Permissions,
}

impl EntityData for UserData {
    fn id(&self) -> EntityId {
        self.id
    }
}

/// One rotation (series/part) and its deadlines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationData {
    pub id: EntityId,
    pub series: i32,
    pub part: i32,
    #[serde(default)]
    pub supervisor_submit: Option<String>,
    #[serde(default)]
    pub student_invite: Option<String>,
    #[serde(default)]
    pub student_choice: Option<String>,
    #[serde(default)]
    pub student_complete: Option<String>,
    #[serde(default)]
    pub marking_complete: Option<String>,
    #[serde(default)]
    pub can_finalise: bool,
    #[serde(default)]
    pub frozen: bool,
    #[serde(default)]
    pub student_viewable: bool,
}

impl EntityData for RotationData {
    fn id(&self) -> EntityId {
        self.id
    }
}

/// Editable notification email template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailData {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub content: String,
}

impl EntityData for EmailData {
    fn id(&self) -> EntityId {
        self.id
    }
}

pub type ProjectEntity = Entity<ProjectData>;
pub type UserEntity = Entity<UserData>;
pub type RotationEntity = Entity<RotationData>;
pub type EmailEntity = Entity<EmailData>;

/// Collection-describing resource: `{links: {<relation>: [path, ...]}}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListEnvelope {
    #[serde(default)]
    pub links: BTreeMap<String, serde_json::Value>,
}

impl ListEnvelope {
    /// Resource paths listed under `relation`; a missing relation lists nothing
    pub fn paths(&self, relation: &str) -> Vec<String> {
        match self.links.get(relation) {
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            Some(serde_json::Value::String(single)) => vec![single.clone()],
            _ => Vec::new(),
        }
    }
}

/// Uniform `{status_message}` body used by both success and error responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusMessage {
    pub status_message: String,
}

/// Marking submission for a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    pub mark: i32,
    #[serde(default)]
    pub good_feedback: String,
    #[serde(default)]
    pub bad_feedback: String,
    #[serde(default)]
    pub general_feedback: String,
}
