use clap::{Parser, Subcommand};
use color_eyre::eyre::{WrapErr as _, bail};
use std::path::PathBuf;

use tasklock_agent::Config;
use tasklock_agent::ipc::IpcClient;
use tasklock_core::{Request, Response, TaskSummary, UpdateRestrictions};

#[derive(Parser)]
#[command(name = "tasklock")]
#[command(about = "Control the tasklock restriction agent", long_about = None)]
struct Cli {
    /// Agent socket (defaults to the configured one)
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show agent status
    Status,

    /// Replace the agent's restrictions
    Update {
        /// Restrict an app until its tasks are done (repeatable)
        #[arg(long = "app")]
        apps: Vec<String>,

        /// Restrict a website until tasks are done (repeatable)
        #[arg(long = "website")]
        websites: Vec<String>,

        /// Always block an app (repeatable)
        #[arg(long = "always-app")]
        permanent_apps: Vec<String>,

        /// Always block a website (repeatable)
        #[arg(long = "always-website")]
        permanent_websites: Vec<String>,

        /// Turn restrictions on
        #[arg(long)]
        active: bool,

        /// JSON file with the pending task list
        #[arg(long)]
        tasks: Option<PathBuf>,
    },

    /// Check if the agent may draw overlays
    OverlayPermission,
}

fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let socket = match cli.socket {
        Some(path) => path,
        None => Config::load().unwrap_or_default().socket_path,
    };
    let client = IpcClient::new(socket);

    let request = match cli.command {
        Commands::Status => Request::Status,
        Commands::OverlayPermission => Request::CheckOverlayPermission,
        Commands::Update {
            apps,
            websites,
            permanent_apps,
            permanent_websites,
            active,
            tasks,
        } => Request::UpdateRestrictions(UpdateRestrictions {
            apps,
            websites,
            active,
            pending_tasks: load_tasks(tasks)?,
            permanently_blocked_apps: permanent_apps,
            permanently_blocked_websites: permanent_websites,
        }),
    };

    let response = client
        .request(&request)
        .wrap_err("failed to reach tasklock-agent")?;

    match response {
        Response::Updated => println!("Restrictions updated."),
        Response::OverlayPermission { granted } => {
            println!("Overlay: {}", if granted { "GRANTED" } else { "NOT GRANTED" });
        }
        Response::Status(status) => {
            println!("=== Tasklock Status ===\n");
            println!(
                "Agent:        {}",
                if status.monitoring { "RUNNING" } else { "STOPPED" }
            );
            println!(
                "Restrictions: {}",
                if status.restrictions_active { "ACTIVE" } else { "INACTIVE" }
            );
            println!("\nRestricted apps:     {}", status.restricted_apps);
            println!("Restricted sites:    {}", status.restricted_websites);
            println!("Always-blocked apps: {}", status.permanently_blocked_apps);
            println!("Always-blocked sites: {}", status.permanently_blocked_websites);
            println!("Pending tasks:       {}", status.pending_tasks);
        }
        Response::Error { kind, message } => bail!("agent refused request ({kind:?}): {message}"),
    }

    Ok(())
}

fn load_tasks(path: Option<PathBuf>) -> color_eyre::eyre::Result<Vec<TaskSummary>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };

    let content = std::fs::read_to_string(&path)
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .wrap_err_with(|| format!("malformed task list in {}", path.display()))
}
