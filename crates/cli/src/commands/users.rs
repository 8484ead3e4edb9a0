//! User and session CLI commands

use anyhow::{Context, Result};
use portal_lib::{SyncClient, User, UserEntity};
use tabled::Tabled;

use crate::output::{optional_id, print_json, print_records, report_partial, yes_no, OutputFormat};

/// Row for users table
#[derive(Tabled)]
struct UserRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Email")]
    email: String,
    #[tabled(rename = "Priority")]
    priority: String,
    #[tabled(rename = "Choices")]
    choices: String,
    #[tabled(rename = "Project")]
    project: String,
}

impl From<&UserEntity> for UserRow {
    fn from(user: &UserEntity) -> Self {
        let data = &user.data;
        Self {
            id: data.id,
            name: data.name.clone(),
            email: data.email.clone().unwrap_or_default(),
            priority: data
                .priority
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string()),
            choices: format!(
                "{} / {} / {}",
                optional_id(data.first_option_id),
                optional_id(data.second_option_id),
                optional_id(data.third_option_id)
            ),
            project: optional_id(data.current_student_project),
        }
    }
}

/// List every user
pub async fn list(client: &SyncClient, format: OutputFormat) -> Result<()> {
    let outcome = client
        .fetch_all::<User>()
        .await
        .context("Failed to fetch users")?;
    report_partial(&outcome);

    let users: Vec<UserEntity> = client.store().snapshot::<User>().iter().cloned().collect();
    let rows = users.iter().map(UserRow::from).collect();
    print_records(rows, &users, format, "No users found")
}

/// Show the logged-in user and their permissions
pub async fn me(client: &SyncClient, format: OutputFormat) -> Result<()> {
    let me = client.fetch_me().await.context("Failed to fetch current user")?;

    match format {
        OutputFormat::Json => print_json(&me)?,
        OutputFormat::Table => {
            let data = &me.data;
            println!("{} (id {})", data.name, data.id);
            if let Some(email) = &data.email {
                println!("  Email: {}", email);
            }
            let permissions = &data.permissions;
            for (name, granted) in [
                ("create projects", permissions.create_projects),
                ("review other projects", permissions.review_other_projects),
                ("join projects", permissions.join_projects),
                ("view projects before deadline", permissions.view_projects_predeadline),
                ("view all submitted projects", permissions.view_all_submitted_projects),
                ("modify permissions", permissions.modify_permissions),
                ("create project groups", permissions.create_project_groups),
                ("set read-only", permissions.set_readonly),
            ] {
                println!("  {:<32} {}", name, yes_no(granted));
            }
        }
    }
    Ok(())
}
