//! Project operations: listings, file transfer, marking and marker assignment

use super::{encode, Hooks, ListOutcome, SyncClient};
use crate::error::{ApiError, SyncError};
use crate::models::{EntityId, Mark, ProjectData, ProjectEntity, StatusMessage};
use crate::optimistic::{with_flag, ProjectFlag};
use crate::pipeline::{ApiRequest, RequestBody};
use crate::store::{Project, ProjectPatch, Resource};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

const UPLOAD_FIELD: &str = "file";
const UPLOADED_MESSAGE: &str = "Project uploaded";
const COGS_MARKER_RELATION: &str = "cogs_marker";

/// Per-user project listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserProjects {
    Supervisor,
    Cogs,
    Student,
}

impl UserProjects {
    pub fn path(self, user_id: EntityId) -> String {
        let listing = match self {
            UserProjects::Supervisor => "supervisor_projects",
            UserProjects::Cogs => "cogs_projects",
            UserProjects::Student => "student_projects",
        };
        format!("/api/users/{}/{}", user_id, listing)
    }
}

/// Local file name for a downloaded project: `{series}_{part}_{title}[.ext]`
///
/// The extension is taken from the server's offered file name when it has one.
pub fn download_file_name(project: &ProjectData, offered: Option<&str>) -> String {
    let title: String = project
        .title
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    let stem = format!("{}_{}_{}", project.series, project.part, title);

    let extension = offered
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));

    match extension {
        Some(ext) => format!("{}.{}", stem, ext.to_ascii_lowercase()),
        None => stem,
    }
}

fn project_path(id: EntityId) -> String {
    format!("{}/{}", Project::COLLECTION_PATH, id)
}

impl SyncClient {
    /// Fetch every project of one rotation
    pub async fn fetch_series_projects(&self, series: i32, part: i32) -> Result<ListOutcome, SyncError> {
        self.fetch_list::<Project>(&format!("/api/series/{}/{}", series, part))
            .await
    }

    /// Fetch the projects a user supervises, marks or is the student on
    pub async fn fetch_user_projects(
        &self,
        user_id: EntityId,
        listing: UserProjects,
    ) -> Result<ListOutcome, SyncError> {
        self.fetch_list::<Project>(&listing.path(user_id)).await
    }

    /// Upload the student's file for a loaded project
    ///
    /// The stored project only changes once the server accepts the file, and
    /// then becomes the copy prepared before sending with `student_uploaded`
    /// set. A failed upload leaves the stored project as it was.
    pub async fn upload_project(
        &self,
        id: EntityId,
        file_name: &str,
        bytes: impl Into<Bytes>,
    ) -> Result<String, SyncError> {
        let current = self.store.get::<Project>(id).ok_or(SyncError::NotInStore {
            kind: Project::KIND,
            id,
        })?;
        let uploaded = with_flag(&current, ProjectFlag::StudentUploaded, true);

        self.store.request_many::<Project>(1);
        let request = ApiRequest::new(reqwest::Method::PUT, format!("{}/file", project_path(id)))
            .with_body(RequestBody::Multipart {
                field: UPLOAD_FIELD.to_string(),
                file_name: file_name.to_string(),
                bytes: bytes.into(),
            });

        match self.pipeline.call(request).await {
            Ok(response) => {
                self.store.receive_one::<Project>(uploaded);
                self.logger.log_upload(id, true);
                Ok(response
                    .parse::<StatusMessage>()
                    .map(|body| body.status_message)
                    .unwrap_or_else(|_| UPLOADED_MESSAGE.to_string()))
            }
            Err(err) => {
                self.store.settle_one::<Project>();
                self.logger.log_upload(id, false);
                Err(err.into())
            }
        }
    }

    /// Download a project's file into the configured download directory
    ///
    /// Returns `"Saved to <path>"`. A project with no file rejects with
    /// [`SyncError::NotUploaded`].
    pub async fn download_project(&self, id: EntityId) -> Result<String, SyncError> {
        let project = match self.store.get::<Project>(id) {
            Some(project) => project,
            None => self.fetch_one::<Project>(id).await?,
        };

        let request = ApiRequest::get(format!("{}/file", project_path(id))).binary();
        let response = self.pipeline.call(request).await.map_err(|err| match err {
            ApiError::NotFound { .. } => SyncError::NotUploaded,
            other => SyncError::from(other),
        })?;

        let name = download_file_name(&project.data, response.attachment_name().as_deref());
        let target: PathBuf = self.config.download_dir.join(name);
        tokio::fs::create_dir_all(&self.config.download_dir).await?;
        tokio::fs::write(&target, &response.body).await?;

        info!(id, path = %target.display(), bytes = response.body.len(), "Project downloaded");
        Ok(format!("Saved to {}", target.display()))
    }

    /// Server-side state of a project's file, passed through unchanged
    pub async fn file_status(&self, id: EntityId) -> Result<serde_json::Value, SyncError> {
        let path = format!("{}/file/status", project_path(id));
        Ok(self.pipeline.call(ApiRequest::get(path)).await?.parse()?)
    }

    pub async fn fetch_mark(&self, id: EntityId) -> Result<Mark, SyncError> {
        let path = format!("{}/mark", project_path(id));
        Ok(self.pipeline.call(ApiRequest::get(path)).await?.parse()?)
    }

    /// Submit a mark, then reload the project so the store reflects it
    pub async fn submit_mark(&self, id: EntityId, mark: &Mark) -> Result<ProjectEntity, SyncError> {
        let path = format!("{}/mark", project_path(id));
        self.pipeline.call(ApiRequest::post(path, encode(mark)?)).await?;
        debug!(id, mark = mark.mark, "Mark submitted");
        self.fetch_one::<Project>(id).await
    }

    /// Assign CoGS markers to many projects in one call
    ///
    /// `mapping` goes to the server whole. Once accepted, each loaded project
    /// it names gets `cogs_marker_id` and its `cogs_marker` link patched; a
    /// `None` assignee clears both. Returns the number of projects patched.
    pub async fn set_cogs_markers(
        &self,
        mapping: &BTreeMap<EntityId, Option<EntityId>>,
        hooks: Hooks<usize>,
    ) -> Result<usize, SyncError> {
        let body = match encode(mapping) {
            Ok(body) => body,
            Err(err) => {
                self.logger
                    .log_operation_failed("set cogs markers", &err.status_message());
                hooks.fail(&err);
                return Err(err);
            }
        };
        let snapshot = self.store.ids::<Project>();
        self.store.request_many::<Project>(snapshot.len());

        let path = format!("{}/set_cogs", Project::COLLECTION_PATH);
        if let Err(err) = self.pipeline.call(ApiRequest::put(path, body)).await {
            for _ in &snapshot {
                self.store.settle_one::<Project>();
            }
            let err = SyncError::from(err);
            self.logger
                .log_operation_failed("set cogs markers", &err.status_message());
            hooks.fail(&err);
            return Err(err);
        }

        let mut patched = 0;
        for id in &snapshot {
            if let Some(marker) = mapping.get(id) {
                if self.store.receive_patch::<Project>(*id, &cogs_patch(*marker)) {
                    patched += 1;
                }
            }
            self.store.settle_one::<Project>();
        }

        self.logger.log_bulk_patch(Project::KIND, patched);
        hooks.succeed(&patched);
        Ok(patched)
    }
}

fn cogs_patch(marker: Option<EntityId>) -> ProjectPatch {
    let mut links = BTreeMap::new();
    links.insert(
        COGS_MARKER_RELATION.to_string(),
        marker.map(|user| format!("/api/users/{}", user)),
    );
    ProjectPatch {
        cogs_marker_id: Some(marker),
        links,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(title: &str) -> ProjectData {
        serde_json::from_value(serde_json::json!({
            "id": 3, "title": title, "series": 2018, "part": 2
        }))
        .unwrap()
    }

    #[test]
    fn test_download_file_name_uses_offered_extension() {
        let name = download_file_name(&project("Protein folding"), Some("upload.PDF"));
        assert_eq!(name, "2018_2_Protein_folding.pdf");
    }

    #[test]
    fn test_download_file_name_without_extension() {
        assert_eq!(download_file_name(&project("a/b"), None), "2018_2_a_b");
        assert_eq!(download_file_name(&project("x"), Some("noext")), "2018_2_x");
    }

    #[test]
    fn test_user_projects_paths() {
        assert_eq!(UserProjects::Cogs.path(4), "/api/users/4/cogs_projects");
        assert_eq!(
            UserProjects::Supervisor.path(4),
            "/api/users/4/supervisor_projects"
        );
    }

    #[test]
    fn test_cogs_patch_clears_link_for_unassigned() {
        let patch = cogs_patch(None);
        assert_eq!(patch.cogs_marker_id, Some(None));
        assert_eq!(patch.links.get("cogs_marker"), Some(&None));

        let patch = cogs_patch(Some(5));
        assert_eq!(
            patch.links.get("cogs_marker"),
            Some(&Some("/api/users/5".to_string()))
        );
    }
}
