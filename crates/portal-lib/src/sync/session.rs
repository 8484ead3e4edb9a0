//! Session-level state: who is logged in and which rotation is current

use super::{Hooks, SyncClient};
use crate::error::SyncError;
use crate::models::{EmailEntity, EntityId, RotationEntity, StatusMessage, UserEntity};
use crate::pipeline::ApiRequest;
use crate::store::{Email, Resource, Rotation, Singleton, User};
use serde_json::json;

impl SyncClient {
    /// Load the logged-in user and remember them as such
    pub async fn fetch_me(&self) -> Result<UserEntity, SyncError> {
        let user = self
            .fetch_path::<User>(&format!("{}/me", User::COLLECTION_PATH))
            .await?;
        self.store
            .set_singleton(Singleton::LoggedInUser, Some(user.id()));
        Ok(user)
    }

    /// Load the most recent rotation and remember it as current
    pub async fn fetch_latest_rotation(&self) -> Result<RotationEntity, SyncError> {
        let rotation = self.fetch_path::<Rotation>("/api/series/latest").await?;
        self.store
            .set_singleton(Singleton::LatestRotation, Some(rotation.id()));
        Ok(rotation)
    }

    /// Ask the server to email the reminders due for a rotation
    pub async fn send_reminder(&self, rotation_id: EntityId) -> Result<String, SyncError> {
        let path = format!("{}/{}/remind", Rotation::COLLECTION_PATH, rotation_id);
        let response = self.pipeline.call(ApiRequest::post(path, json!({}))).await?;
        let body: StatusMessage = response.parse()?;
        Ok(body.status_message)
    }

    /// Rewrite an email template's subject and body
    pub async fn set_email(
        &self,
        id: EntityId,
        subject: &str,
        content: &str,
        hooks: Hooks<EmailEntity>,
    ) -> Result<EmailEntity, SyncError> {
        self.edit::<Email>(id, &json!({"subject": subject, "content": content}), hooks)
            .await
    }

    /// Logged-in user, if loaded
    pub fn logged_in_user(&self) -> Option<UserEntity> {
        let id = self.store.singleton(Singleton::LoggedInUser)?;
        self.store.get::<User>(id)
    }

    /// Current rotation, if loaded
    pub fn latest_rotation(&self) -> Option<RotationEntity> {
        let id = self.store.singleton(Singleton::LatestRotation)?;
        self.store.get::<Rotation>(id)
    }
}
