//! Project-related CLI commands

use anyhow::{bail, Context, Result};
use portal_lib::{Hooks, Mark, Project, ProjectEntity, SyncClient, UserProjects};
use std::collections::BTreeMap;
use std::path::Path;
use tabled::Tabled;

use crate::output::{
    optional_id, print_info, print_json, print_records, print_success, report_partial, truncate,
    yes_no, OutputFormat,
};

/// Row for projects table
#[derive(Tabled)]
struct ProjectRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Rotation")]
    rotation: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Supervisor")]
    supervisor: String,
    #[tabled(rename = "Student")]
    student: String,
    #[tabled(rename = "CoGS")]
    cogs: String,
    #[tabled(rename = "Uploaded")]
    uploaded: String,
}

impl From<&ProjectEntity> for ProjectRow {
    fn from(project: &ProjectEntity) -> Self {
        let data = &project.data;
        Self {
            id: data.id,
            rotation: format!("{}/{}", data.series, data.part),
            title: truncate(&data.title, 40),
            supervisor: optional_id(data.supervisor_id),
            student: optional_id(data.student_id),
            cogs: optional_id(data.cogs_marker_id),
            uploaded: yes_no(data.student_uploaded),
        }
    }
}

fn print_projects(client: &SyncClient, ids: &[i64], format: OutputFormat) -> Result<()> {
    let projects: Vec<ProjectEntity> = ids
        .iter()
        .filter_map(|id| client.store().get::<Project>(*id))
        .collect();
    let rows = projects.iter().map(ProjectRow::from).collect();
    print_records(rows, &projects, format, "No projects found")
}

/// List the projects of one rotation
pub async fn list_series(client: &SyncClient, series: i32, part: i32, format: OutputFormat) -> Result<()> {
    let outcome = client
        .fetch_series_projects(series, part)
        .await
        .context("Failed to fetch rotation projects")?;
    report_partial(&outcome);

    let mut ids = outcome.received.clone();
    ids.sort_unstable();
    print_projects(client, &ids, format)
}

/// List the logged-in user's projects in one role
pub async fn list_mine(client: &SyncClient, listing: UserProjects, format: OutputFormat) -> Result<()> {
    let me = client.fetch_me().await.context("Failed to fetch current user")?;
    let outcome = client
        .fetch_user_projects(me.id(), listing)
        .await
        .context("Failed to fetch your projects")?;
    report_partial(&outcome);

    let mut ids = outcome.received.clone();
    ids.sort_unstable();
    print_projects(client, &ids, format)
}

/// Show one project
pub async fn show(client: &SyncClient, id: i64, format: OutputFormat) -> Result<()> {
    let project = client.fetch_one::<Project>(id).await?;

    match format {
        OutputFormat::Json => print_json(&project)?,
        OutputFormat::Table => {
            let data = &project.data;
            println!("Project {}: {}", data.id, data.title);
            println!("  Rotation:      {}/{}", data.series, data.part);
            if let Some(authors) = &data.authors {
                println!("  Authors:       {}", authors);
            }
            if !data.programmes.is_empty() {
                println!("  Programmes:    {}", data.programmes.join(", "));
            }
            println!(
                "  Type:          {}{}",
                if data.is_wetlab { "wetlab " } else { "" },
                if data.is_computational { "computational" } else { "" }
            );
            println!("  Supervisor:    {}", optional_id(data.supervisor_id));
            println!("  Student:       {}", optional_id(data.student_id));
            println!("  CoGS marker:   {}", optional_id(data.cogs_marker_id));
            println!("  Uploaded:      {}", yes_no(data.student_uploaded));
            println!("  Grace passed:  {}", yes_no(data.grace_passed));
            if let Some(text) = &data.abstract_text {
                println!("\n{}", text);
            }
        }
    }
    Ok(())
}

/// Upload a local file as the student's submission
pub async fn upload(client: &SyncClient, id: i64, file: &Path) -> Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let file_name = file
        .file_name()
        .and_then(|name| name.to_str())
        .context("File path has no usable file name")?;

    client.fetch_one::<Project>(id).await?;
    print_info(&format!("Uploading {} ({} bytes)", file_name, bytes.len()));
    let message = client.upload_project(id, file_name, bytes).await?;
    print_success(&message);
    Ok(())
}

/// Download a project's submission
pub async fn download(client: &SyncClient, id: i64) -> Result<()> {
    let message = client.download_project(id).await?;
    print_success(&message);
    Ok(())
}

/// Show the server's view of a project's file
pub async fn file_status(client: &SyncClient, id: i64) -> Result<()> {
    let status = client.file_status(id).await?;
    print_json(&status)
}

/// Show the mark given to a project
pub async fn show_mark(client: &SyncClient, id: i64, format: OutputFormat) -> Result<()> {
    let mark = client.fetch_mark(id).await?;

    match format {
        OutputFormat::Json => print_json(&mark)?,
        OutputFormat::Table => {
            println!("Mark: {}", mark.mark);
            for (label, text) in [
                ("Good", &mark.good_feedback),
                ("To improve", &mark.bad_feedback),
                ("General", &mark.general_feedback),
            ] {
                if !text.is_empty() {
                    println!("\n{}:\n{}", label, text);
                }
            }
        }
    }
    Ok(())
}

/// Submit a mark with feedback
pub async fn submit_mark(client: &SyncClient, id: i64, mark: Mark) -> Result<()> {
    let project = client.submit_mark(id, &mark).await?;
    print_success(&format!("Marked project {} ({})", id, project.data.title));
    Ok(())
}

/// Delete a project
pub async fn delete(client: &SyncClient, id: i64) -> Result<()> {
    client.delete::<Project>(id).await?;
    print_success(&format!("Deleted project {}", id));
    Ok(())
}

/// Parse `PROJECT=USER` or `PROJECT=none` assignments
pub fn parse_assignments(raw: &[String]) -> Result<BTreeMap<i64, Option<i64>>> {
    let mut mapping = BTreeMap::new();
    for item in raw {
        let Some((project, user)) = item.split_once('=') else {
            bail!("Invalid assignment '{}', expected PROJECT=USER", item);
        };
        let project: i64 = project
            .trim()
            .parse()
            .with_context(|| format!("Invalid project id in '{}'", item))?;
        let user = match user.trim() {
            "none" | "null" | "" => None,
            id => Some(
                id.parse::<i64>()
                    .with_context(|| format!("Invalid user id in '{}'", item))?,
            ),
        };
        mapping.insert(project, user);
    }
    Ok(mapping)
}

/// Assign CoGS markers to projects of a rotation
pub async fn set_cogs(client: &SyncClient, series: i32, part: i32, assignments: &[String]) -> Result<()> {
    let mapping = parse_assignments(assignments)?;
    if mapping.is_empty() {
        bail!("No assignments given");
    }

    let outcome = client.fetch_series_projects(series, part).await?;
    report_partial(&outcome);

    let patched = client.set_cogs_markers(&mapping, Hooks::new()).await?;
    print_success(&format!("Assigned CoGS markers on {} projects", patched));
    Ok(())
}
