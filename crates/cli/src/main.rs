//! Rotation portal CLI
//!
//! A command-line front end for the portal sync core: list and inspect
//! projects, users, rotations and email templates, transfer project files,
//! and run marker assignments.

mod commands;
mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use commands::{emails, projects, rotations, users};
use portal_lib::{Mark, SyncClient, UserProjects};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Rotation portal CLI
#[derive(Parser)]
#[command(name = "portal")]
#[command(author, version, about = "CLI for the PhD rotation portal", long_about = None)]
pub struct Cli {
    /// API root URL (overrides the config file)
    #[arg(long, env = "PORTAL_API_URL")]
    pub api_url: Option<String>,

    /// Configuration file (defaults to ~/.config/portal/config.toml)
    #[arg(long, env = "PORTAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory downloads are saved to (overrides the config file)
    #[arg(long)]
    pub download_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Project listings, files and marking
    #[command(subcommand)]
    Projects(ProjectCommands),

    /// Portal users
    #[command(subcommand)]
    Users(UserCommands),

    /// Rotations and their deadlines
    #[command(subcommand)]
    Rotations(RotationCommands),

    /// Notification email templates
    #[command(subcommand)]
    Emails(EmailCommands),
}

/// Role the logged-in user has on a project
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Role {
    Supervisor,
    Cogs,
    Student,
}

impl From<Role> for UserProjects {
    fn from(role: Role) -> Self {
        match role {
            Role::Supervisor => UserProjects::Supervisor,
            Role::Cogs => UserProjects::Cogs,
            Role::Student => UserProjects::Student,
        }
    }
}

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// List the projects of a rotation
    List {
        /// Rotation year
        series: i32,
        /// Rotation number within the year
        part: i32,
    },

    /// List your own projects
    Mine {
        /// Role to list projects for
        #[arg(long, value_enum, default_value = "supervisor")]
        role: Role,
    },

    /// Show one project
    Get {
        /// Project ID
        id: i64,
    },

    /// Upload the student's submission for a project
    Upload {
        /// Project ID
        id: i64,
        /// File to upload
        file: PathBuf,
    },

    /// Download a project's submission
    Download {
        /// Project ID
        id: i64,
    },

    /// Show the server's view of a project's file
    FileStatus {
        /// Project ID
        id: i64,
    },

    /// Show a project's mark
    Mark {
        /// Project ID
        id: i64,
    },

    /// Submit a mark for a project
    SubmitMark {
        /// Project ID
        id: i64,
        /// Mark awarded
        mark: i32,
        #[arg(long, default_value = "")]
        good_feedback: String,
        #[arg(long, default_value = "")]
        bad_feedback: String,
        #[arg(long, default_value = "")]
        general_feedback: String,
    },

    /// Assign CoGS markers to projects of a rotation
    SetCogs {
        /// Rotation year
        series: i32,
        /// Rotation number within the year
        part: i32,
        /// Assignments as PROJECT=USER, or PROJECT=none to unassign
        #[arg(required = true)]
        assignments: Vec<String>,
    },

    /// Delete a project
    Delete {
        /// Project ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// List every user
    List,
    /// Show the logged-in user
    Me,
}

#[derive(Subcommand)]
pub enum RotationCommands {
    /// List every rotation
    List,
    /// Show the current rotation
    Latest,
    /// Send the reminder emails due for a rotation
    Remind {
        /// Rotation ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum EmailCommands {
    /// List email templates
    List,
    /// Replace a template's subject and content
    Set {
        /// Template ID
        id: i64,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        content: String,
    },
}

fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

fn build_client(cli: &Cli) -> Result<SyncClient> {
    let mut settings = config::CliConfig::load(cli.config.as_deref())?;
    if let Some(url) = &cli.api_url {
        settings.api_url = url.clone();
    }
    if let Some(dir) = &cli.download_dir {
        settings.download_dir = dir.clone();
    }

    debug!(
        api_url = %settings.api_url,
        download_dir = %settings.download_dir.display(),
        "Resolved CLI configuration"
    );
    SyncClient::new(settings.to_sync_config())
        .with_context(|| format!("Failed to create client for {}", settings.api_url))
}

async fn run(cli: Cli) -> Result<()> {
    let client = build_client(&cli)?;
    let format = cli.format;

    match cli.command {
        Commands::Projects(cmd) => match cmd {
            ProjectCommands::List { series, part } => {
                projects::list_series(&client, series, part, format).await?;
            }
            ProjectCommands::Mine { role } => {
                projects::list_mine(&client, role.into(), format).await?;
            }
            ProjectCommands::Get { id } => projects::show(&client, id, format).await?,
            ProjectCommands::Upload { id, file } => projects::upload(&client, id, &file).await?,
            ProjectCommands::Download { id } => projects::download(&client, id).await?,
            ProjectCommands::FileStatus { id } => projects::file_status(&client, id).await?,
            ProjectCommands::Mark { id } => projects::show_mark(&client, id, format).await?,
            ProjectCommands::SubmitMark {
                id,
                mark,
                good_feedback,
                bad_feedback,
                general_feedback,
            } => {
                let mark = Mark {
                    mark,
                    good_feedback,
                    bad_feedback,
                    general_feedback,
                };
                projects::submit_mark(&client, id, mark).await?;
            }
            ProjectCommands::SetCogs {
                series,
                part,
                assignments,
            } => {
                projects::set_cogs(&client, series, part, &assignments).await?;
            }
            ProjectCommands::Delete { id } => projects::delete(&client, id).await?,
        },
        Commands::Users(cmd) => match cmd {
            UserCommands::List => users::list(&client, format).await?,
            UserCommands::Me => users::me(&client, format).await?,
        },
        Commands::Rotations(cmd) => match cmd {
            RotationCommands::List => rotations::list(&client, format).await?,
            RotationCommands::Latest => rotations::latest(&client, format).await?,
            RotationCommands::Remind { id } => rotations::remind(&client, id).await?,
        },
        Commands::Emails(cmd) => match cmd {
            EmailCommands::List => emails::list(&client, format).await?,
            EmailCommands::Set {
                id,
                subject,
                content,
            } => emails::set(&client, id, &subject, &content).await?,
        },
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    if let Err(err) = run(cli).await {
        output::print_error(&format!("{:#}", err));
        std::process::exit(1);
    }
}
