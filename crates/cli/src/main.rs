// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! adminq - Admin Queue CLI

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

use adminq_core::store::RequestFilter;
use adminq_core::{EntityId, Op, RequestId};

use crate::client::DaemonClient;

#[derive(Parser)]
#[command(
    name = "adminq",
    version,
    about = "Admin Queue - deferred job scheduling and request queue"
)]
struct Cli {
    /// Override the IPC timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show daemon status: jobs, running work, pending requests
    Status,
    /// Check that the daemon is answering
    Ping,
    /// Ask the daemon to shut down
    Stop,
    /// Pause dispatch; queued work stays put
    Pause,
    /// Resume dispatch after a pause
    Resume,
    /// Job inspection and forced runs
    Job(JobArgs),
    /// Request queue management
    Queue(QueueArgs),
}

#[derive(Args)]
struct JobArgs {
    #[command(subcommand)]
    command: JobCommand,
}

#[derive(Subcommand)]
enum JobCommand {
    /// Show a job's dependencies, locks, and last run
    Show { name: String },
    /// Force a job to run now, skipping its frequency limit
    Run {
        name: String,
        /// Also run the job's dependency chain
        #[arg(long)]
        with_deps: bool,
    },
}

#[derive(Args)]
struct QueueArgs {
    #[command(subcommand)]
    command: QueueCommand,
}

#[derive(Subcommand)]
enum QueueCommand {
    /// Queue a request (defaults to the nightly batch slot)
    Add {
        /// Entity id of the requester
        #[arg(long)]
        requester: u64,
        /// Operation to perform
        #[arg(long)]
        op: Op,
        /// Entity the operation acts on; give-away requests may omit it
        #[arg(long)]
        target: Option<u64>,
        /// Destination entity, for operations that need one
        #[arg(long)]
        dest: Option<u64>,
        /// Explicit run time (RFC 3339); omitted means the batch slot
        #[arg(long)]
        at: Option<DateTime<Utc>>,
        /// Opaque state payload passed to the handler
        #[arg(long)]
        state: Option<String>,
    },
    /// List queued requests, optionally filtered
    List {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Push a request back by some minutes
    Delay { id: u64, minutes: i64 },
    /// Remove queued requests matching a filter
    Remove {
        #[command(flatten)]
        filter: FilterArgs,
    },
}

#[derive(Args)]
struct FilterArgs {
    /// Match a single request id
    #[arg(long)]
    id: Option<u64>,
    /// Match by requester entity id
    #[arg(long)]
    requester: Option<u64>,
    /// Match by target entity id
    #[arg(long)]
    target: Option<u64>,
    /// Match by operation
    #[arg(long)]
    op: Option<Op>,
    /// Match by destination entity id
    #[arg(long)]
    dest: Option<u64>,
}

impl FilterArgs {
    fn into_filter(self) -> RequestFilter {
        RequestFilter {
            id: self.id.map(RequestId),
            requester_id: self.requester.map(EntityId),
            target_id: self.target.map(EntityId),
            operation: self.op,
            destination_id: self.dest.map(EntityId),
        }
    }

    fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.requester.is_none()
            && self.target.is_none()
            && self.op.is_none()
            && self.dest.is_none()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let timeout = cli.timeout_ms.map(std::time::Duration::from_millis);
    let client = DaemonClient::connect(timeout)?;

    match cli.command {
        Commands::Status => {
            print!("{}", client.status().await?);
        }

        Commands::Ping => {
            client.ping().await?;
            println!("pong");
        }

        Commands::Stop => {
            client.shutdown().await?;
            println!("shutdown requested");
        }

        Commands::Pause => {
            client.pause().await?;
            println!("dispatch paused");
        }

        Commands::Resume => {
            client.resume().await?;
            println!("dispatch resumed");
        }

        Commands::Job(args) => match args.command {
            JobCommand::Show { name } => {
                print!("{}", client.show_job(&name).await?);
            }
            JobCommand::Run { name, with_deps } => {
                println!("{}", client.run_job(&name, with_deps).await?);
            }
        },

        Commands::Queue(args) => match args.command {
            QueueCommand::Add {
                requester,
                op,
                target,
                dest,
                at,
                state,
            } => {
                let id = client
                    .queue_add(
                        EntityId(requester),
                        op,
                        target.map(EntityId),
                        dest.map(EntityId),
                        at,
                        state,
                    )
                    .await?;
                println!("queued request {}", id);
            }

            QueueCommand::List { filter } => {
                let requests = client.queue_list(filter.into_filter()).await?;
                if requests.is_empty() {
                    println!("no pending requests");
                } else {
                    println!(
                        "{:<6} {:<16} {:<10} {:<10} {:<10} RUN AT",
                        "ID", "OPERATION", "REQUESTER", "TARGET", "DEST"
                    );
                    for r in requests {
                        println!(
                            "{:<6} {:<16} {:<10} {:<10} {:<10} {}",
                            r.id,
                            r.operation,
                            r.requester_id,
                            r.target_id
                                .map_or_else(|| "-".to_string(), |t| t.to_string()),
                            r.destination_id
                                .map_or_else(|| "-".to_string(), |d| d.to_string()),
                            r.run_at
                        );
                    }
                }
            }

            QueueCommand::Delay { id, minutes } => {
                println!("{}", client.queue_delay(RequestId(id), minutes).await?);
            }

            QueueCommand::Remove { filter } => {
                if filter.is_empty() {
                    anyhow::bail!("refusing to remove without a filter; pass --id, --target, ...");
                }
                println!("{}", client.queue_remove(filter.into_filter()).await?);
            }
        },
    }

    Ok(())
}
