//! CLI command definitions and dispatch for the `mnemo` binary.
//!
//! Uses clap derive macros for argument parsing. Commands are grouped by the
//! memory service they drive (e.g., `mnemo decay run`, `mnemo graph path`).
//! `mnemo decay run` is the single-pass entry point an external scheduler
//! invokes.

pub mod conversation;
pub mod decay;
pub mod entity;
pub mod graph;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use uuid::Uuid;

use mnemo_observe::attrs;

/// Long-term memory maintenance and queries.
#[derive(Parser)]
#[command(name = "mnemo", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Write log records to stderr as JSON lines.
    #[arg(long, global = true, env = "MNEMO_LOG_JSON")]
    pub log_json: bool,

    /// Export spans to stdout through OpenTelemetry.
    #[arg(long, global = true, env = "MNEMO_OTEL")]
    pub otel: bool,

    /// Embedding backend used for similarity and relevance scoring.
    #[arg(long, global = true, value_enum, default_value_t = EmbedderKind::Hashing, env = "MNEMO_EMBEDDER")]
    pub embedder: EmbedderKind,

    #[command(subcommand)]
    pub command: Commands,
}

/// Embedding backends selectable at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmbedderKind {
    /// Deterministic feature hashing. No model download.
    Hashing,
    /// Local ONNX model (requires the `local-embeddings` build feature).
    Local,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Retention: archive old conversations, decay confidence, prune orphans.
    Decay {
        #[command(subcommand)]
        action: decay::DecayCommand,
    },

    /// Entity resolution, duplicates, merging, and normalization.
    Entity {
        #[command(subcommand)]
        action: entity::EntityCommand,
    },

    /// Knowledge graph queries and relationship edits.
    Graph {
        #[command(subcommand)]
        action: graph::GraphCommand,
    },

    /// Conversations, messages, summaries, and pruned context windows.
    #[command(alias = "conv")]
    Conversation {
        #[command(subcommand)]
        action: conversation::ConversationCommand,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

impl Commands {
    /// Operation name and workspace recorded on the root span.
    pub fn operation(&self) -> (&'static str, Option<Uuid>) {
        use conversation::ConversationCommand as Conv;
        use entity::EntityCommand as Ent;

        match self {
            Commands::Decay { action } => match action {
                decay::DecayCommand::Stats => (attrs::OP_DECAY_STATS, None),
                _ => (attrs::OP_DECAY_RUN, None),
            },
            Commands::Entity { action } => {
                let op = match action {
                    Ent::List { .. } | Ent::Show { .. } => attrs::OP_ENTITY_QUERY,
                    Ent::Resolve { .. } => attrs::OP_RESOLVE,
                    Ent::Mention { .. } => attrs::OP_RECORD_MENTION,
                    Ent::Duplicates { .. } => attrs::OP_FIND_DUPLICATES,
                    Ent::Merge { .. } | Ent::AutoMerge { .. } => attrs::OP_MERGE,
                    Ent::Normalize { .. } => attrs::OP_NORMALIZE,
                    Ent::Embed { .. } => attrs::OP_EMBED,
                };
                (op, action.workspace())
            }
            Commands::Graph { action } => {
                let op = match action {
                    graph::GraphCommand::Relate { .. } => attrs::OP_ADD_RELATIONSHIP,
                    _ => attrs::OP_GRAPH_QUERY,
                };
                (op, Some(action.workspace()))
            }
            Commands::Conversation { action } => match action {
                Conv::New { workspace, .. } => (attrs::OP_CONVERSATION, Some(*workspace)),
                Conv::Add { .. } | Conv::Messages { .. } => (attrs::OP_CONVERSATION, None),
                Conv::Summarize { .. } => (attrs::OP_SUMMARIZE, None),
                Conv::Context { .. } => (attrs::OP_PRUNE_CONTEXT, None),
            },
            Commands::Completions { .. } => ("completions", None),
        }
    }

    /// Whether the command was asked not to write.
    pub fn dry_run(&self) -> bool {
        match self {
            Commands::Decay { action } => action.dry_run(),
            Commands::Entity {
                action: entity::EntityCommand::AutoMerge { dry_run, .. },
            } => *dry_run,
            _ => false,
        }
    }
}

/// A table with the condensed preset and dynamic wrapping used by every listing.
pub(crate) fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(
        headers
            .iter()
            .map(|h| Cell::new(h).fg(Color::White))
            .collect::<Vec<_>>(),
    );
    table
}

/// Short form of an id for tables.
pub(crate) fn short_id(id: &Uuid) -> String {
    id.to_string().chars().take(8).collect()
}

/// Truncate to `max` characters, appending an ellipsis.
pub(crate) fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max.saturating_sub(3)) {
        Some((idx, _)) if text.chars().count() > max => format!("{}...", &text[..idx]),
        _ => text.to_string(),
    }
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
