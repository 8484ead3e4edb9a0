//! Email template CLI commands

use anyhow::{Context, Result};
use portal_lib::{Email, EmailEntity, Hooks, SyncClient};
use tabled::Tabled;

use crate::output::{print_records, print_success, report_partial, truncate, OutputFormat};

/// Row for email templates table
#[derive(Tabled)]
struct EmailRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Subject")]
    subject: String,
}

/// List email templates
pub async fn list(client: &SyncClient, format: OutputFormat) -> Result<()> {
    let outcome = client
        .fetch_all::<Email>()
        .await
        .context("Failed to fetch email templates")?;
    report_partial(&outcome);

    let emails: Vec<EmailEntity> = client.store().snapshot::<Email>().iter().cloned().collect();
    let rows = emails
        .iter()
        .map(|email| EmailRow {
            id: email.data.id,
            name: email.data.name.clone(),
            subject: truncate(&email.data.subject, 60),
        })
        .collect();
    print_records(rows, &emails, format, "No email templates found")
}

/// Replace a template's subject and content
pub async fn set(client: &SyncClient, id: i64, subject: &str, content: &str) -> Result<()> {
    let email = client.set_email(id, subject, content, Hooks::new()).await?;
    print_success(&format!("Updated email template '{}'", email.data.name));
    Ok(())
}
