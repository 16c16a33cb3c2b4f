//! Course Roster operator CLI
//!
//! Applies mutations through the same request pipeline a hosting server would
//! use, so every command runs the reconciliation hooks.
//!
//! ## Usage
//!
//! ```bash
//! # Create users and a broadcast course
//! course-roster user add --id alice
//! course-roster course create --name "Onboarding" --everyone
//!
//! # Reassign a course
//! course-roster course update <course-id> --assignee alice --assignee bob
//!
//! # Progress records
//! course-roster progress create --course <course-id> --assignee carol
//! course-roster progress update <progress-id> --status "In Progress"
//! course-roster progress delete <progress-id>
//!
//! # Check course/progress consistency
//! course-roster verify
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use course_roster::services::events::{join_listener, spawn_logging_listener};
use course_roster::{
    Config, CreateCourseInput, CreateProgressInput, ProgressStatus, RequestPipeline, RosterDb,
    UpdateCourseInput, UpdateProgressInput,
};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "course-roster")]
#[command(about = "Course assignment and progress reconciliation")]
struct Args {
    /// Path to config file
    #[arg(short, long, env = "COURSE_ROSTER_CONFIG")]
    config: Option<PathBuf>,

    /// Storage directory
    #[arg(long, env = "COURSE_ROSTER_DIR")]
    storage_dir: Option<PathBuf>,

    /// Run each request and its reconciliation in a single transaction
    #[arg(long)]
    atomic: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// User operations
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Course operations
    Course {
        #[command(subcommand)]
        action: CourseAction,
    },
    /// Progress record operations
    Progress {
        #[command(subcommand)]
        action: ProgressAction,
    },
    /// Report course/progress consistency violations
    Verify,
}

#[derive(Subcommand, Debug)]
enum UserAction {
    /// Create a user
    Add {
        #[arg(long)]
        id: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum CourseAction {
    /// Create a course
    Create {
        #[arg(long)]
        id: Option<String>,
        #[arg(long, default_value = "")]
        name: String,
        /// Assignee user id (repeatable)
        #[arg(long = "assignee")]
        assignees: Vec<String>,
        /// Assign to every user, now and in future
        #[arg(long)]
        everyone: bool,
    },
    /// Update a course
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        /// Replacement assignee list (repeatable)
        #[arg(long = "assignee")]
        assignees: Vec<String>,
        /// Clear the assignee list
        #[arg(long, conflicts_with = "assignees")]
        clear_assignees: bool,
        #[arg(long)]
        everyone: Option<bool>,
    },
}

#[derive(Subcommand, Debug)]
enum ProgressAction {
    /// Create a progress record
    Create {
        #[arg(long, default_value = "")]
        course: String,
        #[arg(long, default_value = "")]
        assignee: String,
        #[arg(long)]
        status: Option<String>,
    },
    /// Update a progress record
    Update {
        id: String,
        #[arg(long)]
        course: Option<String>,
        #[arg(long)]
        assignee: Option<String>,
        #[arg(long)]
        status: Option<String>,
    },
    /// Delete a progress record
    Delete { id: String },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_status(status: Option<String>) -> anyhow::Result<Option<ProgressStatus>> {
    status
        .map(|s| s.parse::<ProgressStatus>())
        .transpose()
        .context("invalid --status")
}

fn run(pipeline: &RequestPipeline<RosterDb>, command: Command) -> anyhow::Result<()> {
    match command {
        Command::User {
            action: UserAction::Add { id },
        } => print_json(&pipeline.create_user(id)?),

        Command::Course { action } => match action {
            CourseAction::Create {
                id,
                name,
                assignees,
                everyone,
            } => print_json(&pipeline.create_course(CreateCourseInput {
                id,
                name,
                assignees,
                assign_to_everyone: everyone,
            })?),
            CourseAction::Update {
                id,
                name,
                assignees,
                clear_assignees,
                everyone,
            } => {
                let assignees = if clear_assignees {
                    Some(Vec::new())
                } else if assignees.is_empty() {
                    None
                } else {
                    Some(assignees)
                };
                print_json(&pipeline.update_course(
                    &id,
                    UpdateCourseInput {
                        name,
                        assignees,
                        assign_to_everyone: everyone,
                    },
                )?)
            }
        },

        Command::Progress { action } => match action {
            ProgressAction::Create {
                course,
                assignee,
                status,
            } => print_json(&pipeline.create_progress(CreateProgressInput {
                id: None,
                course,
                assignee,
                status: parse_status(status)?.unwrap_or_default(),
            })?),
            ProgressAction::Update {
                id,
                course,
                assignee,
                status,
            } => print_json(&pipeline.update_progress(
                &id,
                UpdateProgressInput {
                    course,
                    assignee,
                    status: parse_status(status)?,
                },
            )?),
            ProgressAction::Delete { id } => print_json(&pipeline.delete_progress(&id)?),
        },

        Command::Verify => {
            let report = pipeline.verify()?;
            print_json(&report)?;
            if !report.is_consistent() {
                bail!("{} consistency violation(s)", report.violations.len());
            }
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("course_roster=info".parse()?),
        )
        .init();

    let args = Args::parse();

    // Load config
    let mut config = if let Some(config_path) = &args.config {
        Config::load(config_path)
            .with_context(|| format!("failed to load config {}", config_path.display()))?
    } else {
        Config::default()
    };

    // Apply CLI overrides
    if let Some(dir) = args.storage_dir {
        config.storage_dir = dir;
    }
    if args.atomic {
        config.atomic_requests = true;
    }

    std::fs::create_dir_all(&config.storage_dir).with_context(|| {
        format!("failed to create storage dir {}", config.storage_dir.display())
    })?;

    // Save default config if it doesn't exist
    let config_path = config.config_path();
    if !config_path.exists() {
        config.save(&config_path)?;
        info!(path = %config_path.display(), "Created default config");
    }

    let db = RosterDb::open(&config.db_path())
        .with_context(|| format!("failed to open {}", config.db_path().display()))?;
    let pipeline = RequestPipeline::new(Arc::new(db), &config);
    let listener = spawn_logging_listener(pipeline.events());

    let result = run(&pipeline, args.command);

    // Dropping the pipeline closes the event bus and lets the listener drain
    drop(pipeline);
    join_listener(listener).await;

    result
}
