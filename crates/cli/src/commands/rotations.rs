//! Rotation CLI commands

use anyhow::{Context, Result};
use portal_lib::{Rotation, RotationEntity, SyncClient};
use tabled::Tabled;

use crate::output::{print_json, print_records, print_success, report_partial, yes_no, OutputFormat};

/// Row for rotations table
#[derive(Tabled)]
struct RotationRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Rotation")]
    rotation: String,
    #[tabled(rename = "Supervisor submit")]
    supervisor_submit: String,
    #[tabled(rename = "Student choice")]
    student_choice: String,
    #[tabled(rename = "Student complete")]
    student_complete: String,
    #[tabled(rename = "Marking complete")]
    marking_complete: String,
    #[tabled(rename = "Frozen")]
    frozen: String,
}

impl From<&RotationEntity> for RotationRow {
    fn from(rotation: &RotationEntity) -> Self {
        let data = &rotation.data;
        let deadline = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
        Self {
            id: data.id,
            rotation: format!("{}/{}", data.series, data.part),
            supervisor_submit: deadline(&data.supervisor_submit),
            student_choice: deadline(&data.student_choice),
            student_complete: deadline(&data.student_complete),
            marking_complete: deadline(&data.marking_complete),
            frozen: yes_no(data.frozen),
        }
    }
}

/// List every rotation
pub async fn list(client: &SyncClient, format: OutputFormat) -> Result<()> {
    let outcome = client
        .fetch_all::<Rotation>()
        .await
        .context("Failed to fetch rotations")?;
    report_partial(&outcome);

    let rotations: Vec<RotationEntity> = client
        .store()
        .snapshot::<Rotation>()
        .iter()
        .cloned()
        .collect();
    let rows = rotations.iter().map(RotationRow::from).collect();
    print_records(rows, &rotations, format, "No rotations found")
}

/// Show the current rotation
pub async fn latest(client: &SyncClient, format: OutputFormat) -> Result<()> {
    let rotation = client
        .fetch_latest_rotation()
        .await
        .context("Failed to fetch latest rotation")?;

    match format {
        OutputFormat::Json => print_json(&rotation),
        OutputFormat::Table => {
            let rows = vec![RotationRow::from(&rotation)];
            print_records(rows, &[rotation], format, "No rotation found")
        }
    }
}

/// Send the reminder emails due for a rotation
pub async fn remind(client: &SyncClient, id: i64) -> Result<()> {
    let message = client.send_reminder(id).await?;
    print_success(&message);
    Ok(())
}
