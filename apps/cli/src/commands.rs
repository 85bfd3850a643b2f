//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use qnasync_client::{
    AnswerRequest, CreateKnowledgeBaseRequest, FeedbackRecord, KnowledgeBaseClient, TrainRequest,
};
use qnasync_core::{ContentEvent, EventOutcome, PublishDecision, ReconciliationEngine};
use qnasync_shared::{
    AppConfig, ClientConfig, ContentFixture, ContentId, ContentRepository, init_config,
    load_config, load_config_from,
};
use qnasync_storage::Storage;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// QnaSync keeps remote QnA knowledge bases in step with CMS content.
#[derive(Parser)]
#[command(
    name = "qnasync",
    version,
    about = "Synchronize CMS question/answer content with remote knowledge bases.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.qnasync/qnasync.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Direct knowledge-base operations.
    Kb {
        #[command(subcommand)]
        action: KbAction,
    },

    /// Ask a knowledge base a question.
    Ask {
        /// Knowledge-base id.
        #[arg(long)]
        kb: String,

        /// Maximum number of answers.
        #[arg(long)]
        top: Option<u32>,

        /// The question.
        question: String,
    },

    /// Send one feedback record to retrain ranking.
    Train {
        /// Knowledge-base id.
        #[arg(long)]
        kb: String,

        #[arg(long)]
        user_id: String,

        /// The question as the user asked it.
        #[arg(long)]
        question: String,

        /// The stored question that answered it.
        #[arg(long)]
        kb_question: String,

        /// The stored answer.
        #[arg(long)]
        kb_answer: String,
    },

    /// Load a JSON content fixture into a repository database.
    Import {
        /// Repository database path.
        #[arg(long)]
        db: PathBuf,

        /// Fixture document.
        fixture: PathBuf,
    },

    /// Run one lifecycle event against a repository database.
    Replay {
        /// Repository database path.
        #[arg(long)]
        db: PathBuf,

        /// Event to raise.
        event: EventKind,

        /// Content item the event is about.
        content_id: i64,

        /// Move target (defaults to the trash container).
        #[arg(long)]
        target: Option<i64>,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

/// Knowledge-base subcommands.
#[derive(Subcommand)]
pub(crate) enum KbAction {
    /// Create an empty knowledge base and print its id.
    Create {
        #[arg(long)]
        name: String,

        /// Source URL to extract pairs from.
        #[arg(long)]
        url: Vec<String>,
    },
    /// Delete a knowledge base.
    Delete { id: String },
    /// Publish a knowledge base's staged edits.
    Publish { id: String },
}

/// Replayable lifecycle events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum EventKind {
    Publishing,
    Published,
    Moving,
    Deleted,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "qnasync=info",
        1 => "qnasync=debug",
        _ => "qnasync=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
        Command::Kb { action } => {
            let client = build_client(config_path)?;
            match action {
                KbAction::Create { name, url } => cmd_kb_create(&client, &name, url).await,
                KbAction::Delete { id } => cmd_kb_delete(&client, &id).await,
                KbAction::Publish { id } => cmd_kb_publish(&client, &id).await,
            }
        }
        Command::Ask { kb, top, question } => {
            let client = build_client(config_path)?;
            cmd_ask(&client, &kb, top, question).await
        }
        Command::Train {
            kb,
            user_id,
            question,
            kb_question,
            kb_answer,
        } => {
            let client = build_client(config_path)?;
            let record = FeedbackRecord {
                user_id,
                user_question: question,
                kb_question,
                kb_answer,
            };
            cmd_train(&client, &kb, record).await
        }
        Command::Import { db, fixture } => cmd_import(&db, &fixture).await,
        Command::Replay {
            db,
            event,
            content_id,
            target,
        } => cmd_replay(config_path, &db, event, ContentId(content_id), target.map(ContentId)).await,
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

fn build_client(path: Option<&Path>) -> Result<KnowledgeBaseClient> {
    let config = resolve_config(path)?;
    let client = KnowledgeBaseClient::new(&ClientConfig::resolve(&config)?)?;
    Ok(client)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

async fn cmd_kb_create(client: &KnowledgeBaseClient, name: &str, urls: Vec<String>) -> Result<()> {
    let mut request = CreateKnowledgeBaseRequest::empty(name);
    request.urls = urls;

    let id = client.create(&request).await?;
    if id.is_empty() {
        return Err(eyre!("service accepted the request but returned no id"));
    }
    println!("{id}");
    Ok(())
}

async fn cmd_kb_delete(client: &KnowledgeBaseClient, id: &str) -> Result<()> {
    if !client.delete(id).await? {
        return Err(eyre!("knowledge base id is empty"));
    }
    println!("Deleted knowledge base {id}");
    Ok(())
}

async fn cmd_kb_publish(client: &KnowledgeBaseClient, id: &str) -> Result<()> {
    if !client.publish(id).await? {
        return Err(eyre!("knowledge base id is empty"));
    }
    println!("Published knowledge base {id}");
    Ok(())
}

async fn cmd_ask(
    client: &KnowledgeBaseClient,
    kb: &str,
    top: Option<u32>,
    question: String,
) -> Result<()> {
    let generated = client
        .generate_answer(kb, &AnswerRequest { question, top })
        .await?;

    if generated.answers.is_empty() {
        println!("No answer found.");
        return Ok(());
    }
    for answer in &generated.answers {
        println!("[{:>5.1}] {}", answer.score, answer.answer);
        for q in &answer.questions {
            println!("        Q: {q}");
        }
    }
    Ok(())
}

async fn cmd_train(client: &KnowledgeBaseClient, kb: &str, record: FeedbackRecord) -> Result<()> {
    client
        .train(
            kb,
            &TrainRequest {
                feedback_records: vec![record],
            },
        )
        .await?;
    println!("Feedback sent to {kb}");
    Ok(())
}

async fn cmd_import(db: &Path, fixture_path: &Path) -> Result<()> {
    let json = std::fs::read_to_string(fixture_path)
        .wrap_err_with(|| format!("cannot read fixture {}", fixture_path.display()))?;
    let fixture = ContentFixture::from_json(&json)?;

    let storage = Storage::open(db).await?;
    let stats = storage.import_fixture(&fixture).await?;

    println!(
        "Imported {} items, {} versions, {} links into {}",
        stats.content,
        stats.versions,
        stats.links,
        db.display()
    );
    Ok(())
}

async fn cmd_replay(
    config_path: Option<&Path>,
    db: &Path,
    kind: EventKind,
    content_id: ContentId,
    target: Option<ContentId>,
) -> Result<()> {
    let config = resolve_config(config_path)?;
    let storage = Storage::open(db).await?;

    let content = storage
        .get(content_id)
        .await?
        .ok_or_else(|| eyre!("content {content_id} not found in {}", db.display()))?;

    let event = match kind {
        EventKind::Publishing => ContentEvent::Publishing(content),
        EventKind::Published => ContentEvent::Published(content),
        EventKind::Moving => ContentEvent::Moving {
            content,
            target: target.unwrap_or(config.content.trash_container_id),
        },
        EventKind::Deleted => {
            storage.delete_content(content_id).await?;
            ContentEvent::Deleted(content)
        }
    };

    let engine = ReconciliationEngine::from_config(storage, &config)?;
    info!(%content_id, event = ?kind, "replaying event");
    let outcome = engine.handle(&event).await?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    if let EventOutcome::Decision(PublishDecision::Cancel { reason }) = &outcome {
        return Err(eyre!("publish cancelled: {reason}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_replay_arguments() {
        let cli = Cli::try_parse_from([
            "qnasync", "replay", "--db", "repo.db", "moving", "10", "--target", "7",
        ])
        .expect("parse");

        match cli.command {
            Command::Replay {
                db,
                event,
                content_id,
                target,
            } => {
                assert_eq!(db, PathBuf::from("repo.db"));
                assert_eq!(event, EventKind::Moving);
                assert_eq!(content_id, 10);
                assert_eq!(target, Some(7));
            }
            _ => panic!("expected replay"),
        }
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "qnasync", "kb", "publish", "kb1", "-vv", "--config", "alt.toml",
        ])
        .expect("parse");
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("alt.toml")));
    }
}
