//! Conversation commands: create, append messages, summarize, and build
//! token-bounded context windows.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Subcommand, ValueEnum};
use comfy_table::{Cell, Color};
use console::style;
use uuid::Uuid;

use mnemo_core::context::pruning::{format_for_prompt, to_chat_history};
use mnemo_core::repository::conversation::ConversationRepository;
use mnemo_core::summarizer::Summarizer;
use mnemo_types::conversation::{Conversation, ConversationMessage, MessageRole};

use super::{new_table, print_json, short_id, truncate};
use crate::state::AppState;

#[derive(Subcommand)]
pub enum ConversationCommand {
    /// Start a new conversation in a workspace.
    New {
        workspace: Uuid,

        #[arg(long)]
        title: Option<String>,
    },

    /// Append a message to a conversation.
    Add {
        conversation: Uuid,
        role: MessageRole,
        content: String,
    },

    /// Show the most recent messages.
    Messages {
        conversation: Uuid,

        #[arg(long, default_value = "20")]
        limit: u32,
    },

    /// Summarize a conversation and point it at the new summary.
    Summarize {
        conversation: Uuid,
    },

    /// Build a pruned context window for a query.
    Context {
        conversation: Uuid,
        query: String,

        /// Token cap (defaults to the configured `max_total_tokens`).
        #[arg(long)]
        max_tokens: Option<u32>,

        #[arg(long, value_enum, default_value_t = ContextFormat::Prompt)]
        format: ContextFormat,
    },
}

/// Text rendering of a pruned context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ContextFormat {
    /// Sectioned prompt text.
    Prompt,
    /// One `role: content` line per entry, in chat order.
    History,
}

/// Dispatch a conversation subcommand.
pub async fn handle(state: &AppState, action: ConversationCommand, json: bool) -> Result<()> {
    match action {
        ConversationCommand::New { workspace, title } => {
            let now = Utc::now();
            let conversation = Conversation {
                id: Uuid::now_v7(),
                workspace_id: workspace,
                title,
                created_at: now,
                updated_at: now,
                summary_id: None,
            };
            state.conversations.save_conversation(&conversation).await?;
            if json {
                return print_json(&conversation);
            }
            println!();
            println!(
                "  {} Conversation {}",
                style("✓").green().bold(),
                style(conversation.id).cyan()
            );
            println!();
            Ok(())
        }

        ConversationCommand::Add {
            conversation,
            role,
            content,
        } => {
            let mut conv = load_conversation(state, &conversation).await?;
            let message = ConversationMessage {
                id: Uuid::now_v7(),
                conversation_id: conversation,
                role,
                content,
                created_at: Utc::now(),
            };
            state.conversations.save_message(&message).await?;
            conv.updated_at = message.created_at;
            state.conversations.save_conversation(&conv).await?;
            if json {
                return print_json(&message);
            }
            println!(
                "  {} [{}] {}",
                style("+").green().bold(),
                message.role,
                style(short_id(&message.id)).dim()
            );
            Ok(())
        }

        ConversationCommand::Messages {
            conversation,
            limit,
        } => {
            load_conversation(state, &conversation).await?;
            let mut messages = state
                .conversations
                .recent_messages(&conversation, limit)
                .await?;
            messages.reverse();
            if json {
                return print_json(&messages);
            }
            let mut table = new_table(&["When", "Role", "Message"]);
            for m in &messages {
                table.add_row(vec![
                    Cell::new(m.created_at.format("%Y-%m-%d %H:%M").to_string()).fg(Color::DarkGrey),
                    Cell::new(m.role.to_string()).fg(Color::Cyan),
                    Cell::new(truncate(&m.content, 80)),
                ]);
            }
            println!("{table}");
            Ok(())
        }

        ConversationCommand::Summarize { conversation } => {
            let summary = state.summarizer.summarize(&conversation).await?;
            state
                .conversations
                .set_summary_pointer(&conversation, &summary.id)
                .await
                .context("summary saved but the conversation pointer was not updated")?;
            if json {
                return print_json(&summary);
            }
            println!();
            println!(
                "  {} Summary v{} ({} messages)",
                style("✓").green().bold(),
                summary.version,
                summary.messages_covered.total
            );
            println!();
            println!("  {}", summary.summary);
            if !summary.key_insights.is_empty() {
                println!();
                println!("  {}", style("── Key insights ──").dim());
                for insight in &summary.key_insights {
                    println!("  - {insight}");
                }
            }
            println!();
            Ok(())
        }

        ConversationCommand::Context {
            conversation,
            query,
            max_tokens,
            format,
        } => {
            let context = match max_tokens {
                Some(max) => {
                    state
                        .pruning
                        .prune_to_token_limit(&conversation, &query, max)
                        .await?
                }
                None => state.pruning.build_pruned_context(&conversation, &query).await?,
            };
            if json {
                return print_json(&context);
            }

            match format {
                ContextFormat::Prompt => println!("{}", format_for_prompt(&context)),
                ContextFormat::History => {
                    for entry in to_chat_history(&context) {
                        println!("{}: {}", entry.role, entry.content);
                    }
                }
            }

            let stats = &context.stats;
            eprintln!(
                "{}",
                style(format!(
                    "{} tokens of {} | episodic {} / semantic {} / summary {} | pruned {}",
                    context.total_tokens,
                    stats.effective_budget,
                    stats.episodic_count,
                    stats.semantic_count,
                    stats.summary_tokens,
                    stats.pruned_count
                ))
                .dim()
            );
            Ok(())
        }
    }
}

async fn load_conversation(state: &AppState, id: &Uuid) -> Result<Conversation> {
    state
        .conversations
        .get_conversation(id)
        .await?
        .with_context(|| format!("Conversation '{id}' not found"))
}
