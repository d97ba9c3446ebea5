use std::net::SocketAddr;
use std::path::PathBuf;

use agentwatch_compliance::{ComplianceEvaluator, EvaluatorConfig};
use agentwatch_protocol::{ExecutionEvent, Session, SessionId, SessionStatus, SessionStorePort};
use agentwatch_store::FileStore;
use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;

#[derive(Debug, Parser)]
#[command(name = "agentwatchd")]
#[command(about = "Compliance evaluation for agent execution sessions")]
struct Cli {
    /// Data directory holding sessions/, events/ and reports/.
    #[arg(long, env = "AGENTWATCH_ROOT", default_value = ".agentwatch")]
    root: PathBuf,
    /// Sessions evaluated at once when listing flagged sessions.
    #[arg(long, env = "AGENTWATCH_CONCURRENCY", default_value_t = EvaluatorConfig::DEFAULT_LIST_CONCURRENCY)]
    concurrency: usize,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the compliance assessment of one session as JSON.
    Evaluate { session_id: String },
    /// Print every non-compliant session as JSON.
    Flagged,
    /// Write a few demo sessions into the data directory.
    Seed,
    /// Serve the compliance API over HTTP.
    Serve {
        #[arg(long, env = "AGENTWATCH_LISTEN", default_value = "127.0.0.1:8788")]
        listen: SocketAddr,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(matches!(cli.command, Command::Serve { .. }));

    let store = FileStore::open(&cli.root);
    let evaluator = ComplianceEvaluator::new(
        store.sessions.clone(),
        store.reports.clone(),
        store.events.clone(),
    )
    .with_config(EvaluatorConfig::default().with_list_concurrency(cli.concurrency));

    match cli.command {
        Command::Evaluate { session_id } => {
            let assessment = evaluator
                .evaluate(&SessionId::from(session_id.as_str()))
                .await
                .with_context(|| format!("failed to evaluate session {session_id}"))?;
            println!("{}", serde_json::to_string_pretty(&assessment)?);
        }
        Command::Flagged => {
            let flagged = evaluator
                .flagged_sessions()
                .await
                .context("failed to list flagged sessions")?;
            println!("{}", serde_json::to_string_pretty(&flagged)?);
        }
        Command::Seed => {
            seed_demo(&store).await?;
            info!(root = %cli.root.display(), "demo sessions written");
        }
        Command::Serve { listen } => {
            info!(root = %cli.root.display(), "starting api");
            api::serve(listen, api::AppState::new(evaluator, store.sessions.clone())).await?;
        }
    }

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

async fn seed_demo(store: &FileStore) -> Result<()> {
    let now = Utc::now();
    let demo: [(&str, &str, SessionStatus, Vec<(&str, Vec<&str>)>); 3] = [
        (
            "1",
            "research-agent",
            SessionStatus::Completed,
            vec![
                ("call_api", vec!["external_api"]),
                ("query", vec![]),
                ("store", vec!["sensitive_data", "high_cost"]),
            ],
        ),
        (
            "2",
            "summary-agent",
            SessionStatus::Completed,
            vec![("read", vec![]), ("summarize", vec![])],
        ),
        (
            "3",
            "ops-agent",
            SessionStatus::Running,
            vec![
                ("shell", vec!["security_violation"]),
                ("upload", vec!["external_api", "sensitive_data"]),
                ("retry", vec!["high_cost"]),
            ],
        ),
    ];

    for (session_id, agent_name, status, events) in demo {
        let id = SessionId::from(session_id);
        if store.sessions.get_session(&id).await.is_ok() {
            info!(session_id, "demo session already present");
            continue;
        }
        store
            .sessions
            .save(
                &Session::new(session_id, status)
                    .with_agent_name(agent_name)
                    .with_started_at(now),
            )
            .await?;
        store.events.touch(&id).await?;
        for (event_type, flags) in events {
            store
                .events
                .append(&ExecutionEvent::new(session_id, event_type, flags))
                .await?;
        }
    }
    Ok(())
}
