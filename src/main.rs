use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use maintenance_coordinator::{
    models::{MaintenanceRequest, PhotoUpload, Priority, ProblemType, SubmissionDraft},
    services::{image_service::content_type_for, technician_view, AuthService, RequestFilter},
    utils::datetime::parse_flexible,
    ApiClient, ClientError, Config, LifecycleService, Session,
};

#[derive(Parser)]
#[command(name = "maintenance")]
#[command(about = "Maintenance requests for tenants and technicians", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List your requests (tenant) or your assigned work (--technician)
    List {
        #[arg(long)]
        technician: bool,

        /// Status, "Active" or "All"
        #[arg(long, default_value = "All")]
        status: String,

        #[arg(long)]
        priority: Option<Priority>,

        #[arg(long)]
        problem_type: Option<String>,

        /// Matches description, problem type and apartment number
        #[arg(long, default_value = "")]
        search: String,
    },

    /// Show one request as JSON
    Show { id: i64 },

    /// Submit a new request
    Submit {
        description: String,

        #[arg(long, value_name = "PATH")]
        photo: Option<PathBuf>,

        #[arg(long)]
        technician_id: Option<i64>,

        #[arg(long)]
        apartment_id: Option<i64>,

        #[arg(long)]
        problem_type: Option<String>,
    },

    /// Propose cost and duration for a request
    Propose {
        id: i64,

        #[arg(long)]
        cost: Option<Decimal>,

        #[arg(long, default_value = "")]
        duration: String,
    },

    /// Accept the technician's proposal
    Confirm {
        id: i64,

        /// Defaults to the current schedule, or now
        #[arg(long, value_name = "DATE")]
        scheduled_date: Option<String>,
    },

    /// Reject the technician's proposal
    Reject {
        id: i64,

        #[arg(long, default_value = "")]
        reason: String,
    },

    /// Start confirmed work
    Start { id: i64 },

    /// Mark work in progress as completed
    Complete { id: i64 },

    /// Take a freshly assigned request without proposing
    Accept { id: i64 },

    /// Decline a freshly assigned request
    Decline { id: i64 },

    /// Technician dashboard counters
    Stats,

    /// Assigned requests waiting for accept or decline
    Pending,
}

fn print_request(request: &MaintenanceRequest) {
    let proposal = match (&request.proposed_cost, &request.proposed_duration) {
        (Some(cost), Some(duration)) => format!("  {} / {}", cost, duration),
        _ => String::new(),
    };
    println!(
        "#{:<5} {:<22} {:<11} apt {:<6} {}{}",
        request.id,
        request.status.as_str(),
        request.problem_type.as_str(),
        request.apartment_number(),
        request.description,
        proposal
    );
}

fn read_photo(path: &PathBuf) -> anyhow::Result<PhotoUpload> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .context("Photo path has no file name")?
        .to_string();
    let content_type = content_type_for(&file_name)
        .context("Photo must be a png, jpg, jpeg, gif or webp file")?
        .to_string();
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read photo {}", path.display()))?;
    Ok(PhotoUpload {
        file_name,
        content_type,
        bytes,
    })
}

async fn run(
    command: Commands,
    service: &LifecycleService<ApiClient>,
    session: &Session,
) -> anyhow::Result<Result<(), ClientError>> {
    let result = match command {
        Commands::List {
            technician,
            status,
            priority,
            problem_type,
            search,
        } => {
            let filter = RequestFilter {
                status: status
                    .parse()
                    .map_err(|e| anyhow::anyhow!("Invalid status filter: {}", e))?,
                priority,
                problem_type: problem_type.as_deref().map(ProblemType::parse),
                search,
                ..Default::default()
            };
            if technician {
                service.refresh_technician(session).await.map(|records| {
                    technician_view(&records, &filter)
                        .into_iter()
                        .for_each(print_request)
                })
            } else {
                service.refresh_tenant(session).await.map(|records| {
                    filter.apply(&records).into_iter().for_each(print_request)
                })
            }
        }
        Commands::Show { id } => match service.request(session, id).await {
            Ok(request) => {
                println!("{}", serde_json::to_string_pretty(&request)?);
                Ok(())
            }
            Err(e) => Err(e),
        },
        Commands::Submit {
            description,
            photo,
            technician_id,
            apartment_id,
            problem_type,
        } => {
            let mut draft = SubmissionDraft {
                photo: photo.as_ref().map(read_photo).transpose()?,
                technician_id,
                apartment_id,
                problem_type: problem_type.as_deref().map(ProblemType::parse),
                ..SubmissionDraft::new(description)
            };
            service.submit(session, &mut draft).await.map(|created| {
                match created {
                    Some(request) => print_request(&request),
                    None => println!("Maintenance request submitted"),
                }
            })
        }
        Commands::Propose { id, cost, duration } => service
            .propose(session, id, cost, &duration)
            .await
            .map(|r| print_request(&r)),
        Commands::Confirm { id, scheduled_date } => {
            let scheduled_date = match scheduled_date.as_deref() {
                Some(raw) => Some(
                    parse_flexible(raw).with_context(|| format!("Invalid date: {}", raw))?,
                ),
                None => None,
            };
            service
                .confirm(session, id, scheduled_date)
                .await
                .map(|r| print_request(&r))
        }
        Commands::Reject { id, reason } => service
            .reject_proposal(session, id, &reason)
            .await
            .map(|r| print_request(&r)),
        Commands::Start { id } => service.start(session, id).await.map(|r| print_request(&r)),
        Commands::Complete { id } => service
            .complete(session, id)
            .await
            .map(|r| print_request(&r)),
        Commands::Accept { id } => service
            .accept_direct(session, id)
            .await
            .map(|r| print_request(&r)),
        Commands::Decline { id } => service
            .decline_direct(session, id)
            .await
            .map(|r| print_request(&r)),
        Commands::Stats => service.technician_stats(session).await.map(|stats| {
            println!(
                "total: {}  pending: {}  completed: {}",
                stats.total, stats.pending, stats.completed
            )
        }),
        Commands::Pending => service
            .pending_assignments(session)
            .await
            .map(|records| records.iter().for_each(print_request)),
    };
    Ok(result)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env
    dotenvy::dotenv().ok();

    // Logging goes to stderr so command output stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "maintenance_coordinator=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::debug!(api = %config.api_base_url, "Using backend");

    // Session from the stored token
    let mut session = match AuthService::session_from_config(&config) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("{}. Set SESSION_TOKEN to log in.", e.user_message());
            process::exit(1);
        }
    };

    // Client and coordinator
    let service = LifecycleService::new(ApiClient::new(&config));

    // Run the command
    if let Err(e) = run(cli.command, &service, &session).await? {
        tracing::debug!(code = e.code(), local = e.is_local(), "Command failed: {}", e);
        if session.clear_on(&e) {
            eprintln!("{}. Set SESSION_TOKEN to log in.", e.user_message());
        } else {
            eprintln!("{}", e.user_message());
        }
        process::exit(1);
    }

    Ok(())
}
