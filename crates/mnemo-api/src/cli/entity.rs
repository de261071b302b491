//! Entity commands: listing, resolution, mentions, duplicates, merging,
//! terminology normalization, and embedding generation.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{Cell, Color};
use console::style;
use uuid::Uuid;

use mnemo_core::repository::entity::EntityRepository;
use mnemo_types::entity::{Entity, EntityType};
use mnemo_types::resolution::{EntityMention, MatchKind, MentionSource};

use super::{new_table, print_json, short_id, truncate};
use crate::state::AppState;

#[derive(Subcommand)]
pub enum EntityCommand {
    /// List a workspace's entities by mention count.
    #[command(alias = "ls")]
    List {
        workspace: Uuid,

        /// Maximum entities to show.
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Show one entity with its aliases, sources, and relationships.
    Show {
        id: Uuid,
    },

    /// Resolve a name against existing entities (read-only).
    Resolve {
        workspace: Uuid,
        name: String,

        #[arg(long = "type")]
        entity_type: Option<EntityType>,

        #[arg(long)]
        description: Option<String>,
    },

    /// Record a mention: update the matching entity or create a new one.
    Mention {
        workspace: Uuid,
        name: String,

        #[arg(long = "type", default_value = "other")]
        entity_type: EntityType,

        #[arg(long)]
        description: Option<String>,

        /// Document the mention came from.
        #[arg(long, requires = "source_title")]
        source_id: Option<String>,

        #[arg(long, requires = "source_id")]
        source_title: Option<String>,

        /// Surrounding text of the mention.
        #[arg(long, requires = "source_id")]
        context: Option<String>,
    },

    /// List groups of likely duplicate entities.
    #[command(alias = "dupes")]
    Duplicates {
        workspace: Uuid,

        /// Minimum similarity (defaults to the configured duplicate threshold).
        #[arg(long)]
        threshold: Option<f32>,
    },

    /// Merge duplicates into a primary entity.
    Merge {
        workspace: Uuid,
        primary: Uuid,

        #[arg(required = true)]
        duplicates: Vec<Uuid>,
    },

    /// Find duplicates and merge every group that clears the auto-merge threshold.
    AutoMerge {
        workspace: Uuid,

        /// Minimum similarity every duplicate in a group must meet.
        #[arg(long)]
        threshold: Option<f32>,

        /// Show qualifying groups without merging.
        #[arg(long)]
        dry_run: bool,
    },

    /// Rename entities to canonical terms, keeping the old name as an alias.
    Normalize {
        workspace: Uuid,

        /// Mapping in `variant=Canonical` form. Repeatable.
        #[arg(long = "map", value_parser = parse_mapping)]
        mappings: Vec<(String, String)>,

        /// JSON object of `{"variant": "Canonical"}` pairs.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Generate embeddings for entities that have none.
    Embed {
        workspace: Uuid,

        #[arg(long, default_value = "100")]
        limit: usize,

        #[arg(long, default_value = "16")]
        batch_size: usize,
    },
}

impl EntityCommand {
    pub fn workspace(&self) -> Option<Uuid> {
        match self {
            EntityCommand::Show { .. } => None,
            EntityCommand::List { workspace, .. }
            | EntityCommand::Resolve { workspace, .. }
            | EntityCommand::Mention { workspace, .. }
            | EntityCommand::Duplicates { workspace, .. }
            | EntityCommand::Merge { workspace, .. }
            | EntityCommand::AutoMerge { workspace, .. }
            | EntityCommand::Normalize { workspace, .. }
            | EntityCommand::Embed { workspace, .. } => Some(*workspace),
        }
    }
}

fn parse_mapping(raw: &str) -> Result<(String, String), String> {
    let (from, to) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected `variant=Canonical`, got '{raw}'"))?;
    let (from, to) = (from.trim(), to.trim());
    if from.is_empty() || to.is_empty() {
        return Err(format!("empty side in mapping '{raw}'"));
    }
    Ok((from.to_string(), to.to_string()))
}

/// Dispatch an entity subcommand.
pub async fn handle(state: &AppState, action: EntityCommand, json: bool) -> Result<()> {
    match action {
        EntityCommand::List { workspace, limit } => list(state, &workspace, limit, json).await,
        EntityCommand::Show { id } => show(state, &id, json).await,
        EntityCommand::Resolve {
            workspace,
            name,
            entity_type,
            description,
        } => resolve(state, &workspace, &name, entity_type, description.as_deref(), json).await,
        EntityCommand::Mention {
            workspace,
            name,
            entity_type,
            description,
            source_id,
            source_title,
            context,
        } => {
            let source = source_id.zip(source_title).map(|(source_id, title)| MentionSource {
                source_id,
                title,
                context,
            });
            let mention = EntityMention {
                name,
                entity_type,
                description,
                source,
            };
            mention_cmd(state, &workspace, &mention, json).await
        }
        EntityCommand::Duplicates {
            workspace,
            threshold,
        } => duplicates(state, &workspace, threshold, json).await,
        EntityCommand::Merge {
            workspace,
            primary,
            duplicates,
        } => merge(state, &workspace, &primary, &duplicates, json).await,
        EntityCommand::AutoMerge {
            workspace,
            threshold,
            dry_run,
        } => auto_merge(state, &workspace, threshold, dry_run, json).await,
        EntityCommand::Normalize {
            workspace,
            mappings,
            file,
        } => normalize(state, &workspace, mappings, file, json).await,
        EntityCommand::Embed {
            workspace,
            limit,
            batch_size,
        } => embed(state, &workspace, limit, batch_size, json).await,
    }
}

async fn list(state: &AppState, workspace: &Uuid, limit: usize, json: bool) -> Result<()> {
    let entities = state.entities.list_by_mentions(workspace, Some(limit)).await?;

    if json {
        return print_json(&entities);
    }

    if entities.is_empty() {
        println!();
        println!(
            "  {} No entities in workspace {}.",
            style("i").blue().bold(),
            style(workspace).cyan()
        );
        println!();
        return Ok(());
    }

    let mut table = new_table(&["ID", "Name", "Type", "Mentions", "Docs", "Links", "Confidence"]);
    for e in &entities {
        table.add_row(vec![
            Cell::new(short_id(&e.id)).fg(Color::DarkGrey),
            Cell::new(truncate(&e.name, 40)),
            Cell::new(e.entity_type.to_string()).fg(Color::Cyan),
            Cell::new(e.stats.total_mentions),
            Cell::new(e.stats.document_count),
            Cell::new(e.relationships.len()),
            confidence_cell(e.confidence),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn confidence_cell(confidence: f32) -> Cell {
    let color = if confidence >= 0.7 {
        Color::Green
    } else if confidence >= 0.3 {
        Color::Yellow
    } else {
        Color::Red
    };
    Cell::new(format!("{confidence:.2}")).fg(color)
}

async fn show(state: &AppState, id: &Uuid, json: bool) -> Result<()> {
    let entity = state
        .entities
        .get(id)
        .await?
        .with_context(|| format!("Entity '{id}' not found"))?;

    if json {
        return print_json(&entity);
    }

    print_entity(state, &entity).await
}

async fn print_entity(state: &AppState, entity: &Entity) -> Result<()> {
    println!();
    println!(
        "  {} ({})",
        style(&entity.name).cyan().bold(),
        entity.entity_type
    );
    println!("  {}", style(entity.id).dim());
    if !entity.description.is_empty() {
        println!("  {}", entity.description);
    }
    println!();
    println!("  Mentions:   {}", entity.stats.total_mentions);
    println!("  Documents:  {}", entity.stats.document_count);
    println!("  Confidence: {:.2}", entity.confidence);
    println!(
        "  Embedding:  {}",
        if entity.embedding.is_empty() {
            style("none".to_string()).dim()
        } else {
            style(format!("{} dims", entity.embedding.len())).green()
        }
    );
    if !entity.aliases.is_empty() {
        println!("  Aliases:    {}", entity.aliases.join(", "));
    }

    if !entity.relationships.is_empty() {
        let targets: Vec<Uuid> = entity
            .relationships
            .iter()
            .map(|r| r.target_entity_id)
            .collect();
        let names: HashMap<Uuid, String> = state
            .entities
            .get_many(&targets)
            .await?
            .into_iter()
            .map(|e| (e.id, e.name))
            .collect();

        println!();
        println!("  {}", style("── Relationships ──").dim());
        for r in &entity.relationships {
            let target = names
                .get(&r.target_entity_id)
                .cloned()
                .unwrap_or_else(|| format!("{} (removed)", short_id(&r.target_entity_id)));
            println!(
                "  {} -> {} {}",
                style(&r.relationship_type).yellow(),
                target,
                style(format!("({:.2})", r.strength)).dim()
            );
        }
    }

    if !entity.sources.is_empty() {
        println!();
        println!("  {}", style("── Sources ──").dim());
        for s in &entity.sources {
            println!("  {} ×{}", s.title, s.mention_count);
            for c in &s.contexts {
                println!("    {}", style(truncate(c, 80)).dim());
            }
        }
    }
    println!();
    Ok(())
}

async fn resolve(
    state: &AppState,
    workspace: &Uuid,
    name: &str,
    entity_type: Option<EntityType>,
    description: Option<&str>,
    json: bool,
) -> Result<()> {
    let resolution = state
        .resolver
        .resolve_entity(workspace, name, entity_type, description)
        .await;

    if json {
        return print_json(&resolution);
    }

    println!();
    match &resolution.entity {
        Some(entity) => println!(
            "  {} '{}' resolves to {} {}",
            style("✓").green().bold(),
            name,
            style(&entity.name).cyan(),
            style(format!("(confidence {:.2})", resolution.confidence)).dim()
        ),
        None => println!(
            "  {} '{}' is a new entity {}",
            style("+").yellow().bold(),
            name,
            style(format!("(confidence {:.2})", resolution.confidence)).dim()
        ),
    }

    if !resolution.candidates.is_empty() {
        println!();
        let mut table = new_table(&["Candidate", "Type", "Similarity", "Match"]);
        for c in &resolution.candidates {
            let kind = match c.match_kind {
                MatchKind::Exact => Cell::new("exact").fg(Color::Green),
                MatchKind::Fuzzy => Cell::new("fuzzy").fg(Color::Yellow),
                MatchKind::AliasPrefix => Cell::new("alias prefix").fg(Color::Magenta),
            };
            table.add_row(vec![
                Cell::new(&c.entity.name),
                Cell::new(c.entity.entity_type.to_string()),
                Cell::new(format!("{:.3}", c.similarity)),
                kind,
            ]);
        }
        println!("{table}");
    }
    println!();
    Ok(())
}

async fn mention_cmd(
    state: &AppState,
    workspace: &Uuid,
    mention: &EntityMention,
    json: bool,
) -> Result<()> {
    let entity = state.resolver.record_mention(workspace, mention).await?;

    if json {
        return print_json(&entity);
    }

    println!();
    println!(
        "  {} Recorded mention of {} ({} total)",
        style("✓").green().bold(),
        style(&entity.name).cyan(),
        entity.stats.total_mentions
    );
    println!("  {}", style(entity.id).dim());
    println!();
    Ok(())
}

async fn duplicates(
    state: &AppState,
    workspace: &Uuid,
    threshold: Option<f32>,
    json: bool,
) -> Result<()> {
    let groups = state.resolver.find_duplicates(workspace, threshold).await?;

    if json {
        return print_json(&groups);
    }

    if groups.is_empty() {
        println!();
        println!("  {} No duplicate groups found.", style("✓").green().bold());
        println!();
        return Ok(());
    }

    let auto_threshold = state.config.merge.auto_merge_threshold;
    let mut table = new_table(&["Primary", "Duplicate", "Similarity", "Auto-merge"]);
    for group in &groups {
        let auto = group.min_similarity() >= auto_threshold;
        for (i, dup) in group.duplicates.iter().enumerate() {
            let primary = if i == 0 {
                format!("{} ({})", group.primary_name, short_id(&group.primary_id))
            } else {
                String::new()
            };
            let auto_cell = match (i, auto) {
                (0, true) => Cell::new("yes").fg(Color::Green),
                (0, false) => Cell::new("no").fg(Color::DarkGrey),
                _ => Cell::new(""),
            };
            table.add_row(vec![
                Cell::new(primary),
                Cell::new(format!("{} ({})", dup.name, short_id(&dup.entity_id))),
                Cell::new(format!("{:.3}", dup.similarity)),
                auto_cell,
            ]);
        }
    }
    println!("{table}");
    Ok(())
}

async fn merge(
    state: &AppState,
    workspace: &Uuid,
    primary: &Uuid,
    duplicates: &[Uuid],
    json: bool,
) -> Result<()> {
    let merged = state
        .merger
        .merge_entities(workspace, primary, duplicates)
        .await
        .context("merge failed")?;

    if json {
        return print_json(&merged);
    }

    println!();
    println!(
        "  {} Merged {} entit{} into {}",
        style("✓").green().bold(),
        duplicates.len(),
        if duplicates.len() == 1 { "y" } else { "ies" },
        style(&merged.name).cyan()
    );
    println!(
        "  Mentions: {}  Aliases: {}  Relationships: {}",
        merged.stats.total_mentions,
        merged.aliases.len(),
        merged.relationships.len()
    );
    println!();
    Ok(())
}

async fn auto_merge(
    state: &AppState,
    workspace: &Uuid,
    threshold: Option<f32>,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let groups = state.resolver.find_duplicates(workspace, None).await?;
    let effective = threshold.unwrap_or(state.config.merge.auto_merge_threshold);

    if dry_run {
        let qualifying: Vec<_> = groups
            .iter()
            .filter(|g| !g.duplicates.is_empty() && g.min_similarity() >= effective)
            .collect();
        if json {
            return print_json(&qualifying);
        }
        println!();
        println!(
            "  {} {} of {} group(s) would merge at threshold {:.2} {}",
            style("~").yellow().bold(),
            qualifying.len(),
            groups.len(),
            effective,
            style("(dry run)").dim()
        );
        for g in qualifying {
            let names: Vec<&str> = g.duplicates.iter().map(|d| d.name.as_str()).collect();
            println!("  {} <- {}", style(&g.primary_name).cyan(), names.join(", "));
        }
        println!();
        return Ok(());
    }

    let report = state
        .merger
        .auto_merge_duplicates(workspace, &groups, threshold)
        .await;

    if json {
        return print_json(&report);
    }

    println!();
    println!(
        "  {} Auto-merge at threshold {:.2}",
        style("✓").green().bold(),
        effective
    );
    println!("  Groups merged:   {}", style(report.groups_merged).green());
    println!("  Entities merged: {}", report.entities_merged);
    println!("  Groups skipped:  {}", report.groups_skipped);
    if report.errors > 0 {
        println!("  Errors:          {}", style(report.errors).red());
    }
    println!();
    Ok(())
}

async fn normalize(
    state: &AppState,
    workspace: &Uuid,
    pairs: Vec<(String, String)>,
    file: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let mut mappings: HashMap<String, String> = HashMap::new();
    if let Some(path) = file {
        let raw = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let parsed: HashMap<String, String> = serde_json::from_str(&raw)
            .with_context(|| format!("{} is not a JSON object of strings", path.display()))?;
        mappings.extend(parsed);
    }
    mappings.extend(pairs);

    if mappings.is_empty() {
        anyhow::bail!("no mappings given; use --map variant=Canonical or --file");
    }

    let report = state.merger.normalize_terminology(workspace, &mappings).await;

    if json {
        return print_json(&report);
    }

    println!();
    println!(
        "  {} Normalized terminology ({} mapping{})",
        style("✓").green().bold(),
        mappings.len(),
        if mappings.len() == 1 { "" } else { "s" }
    );
    println!("  Renamed:           {}", style(report.renamed).green());
    println!("  Already canonical: {}", report.already_canonical);
    if report.errors > 0 {
        println!("  Errors:            {}", style(report.errors).red());
    }
    println!();
    Ok(())
}

async fn embed(
    state: &AppState,
    workspace: &Uuid,
    limit: usize,
    batch_size: usize,
    json: bool,
) -> Result<()> {
    let report = state
        .merger
        .generate_embeddings_batch(workspace, limit, batch_size)
        .await?;

    if json {
        return print_json(&report);
    }

    println!();
    println!(
        "  {} Embedded {} entit{}",
        style("✓").green().bold(),
        report.processed,
        if report.processed == 1 { "y" } else { "ies" }
    );
    if report.skipped > 0 {
        println!("  Skipped: {}", report.skipped);
    }
    if report.errors > 0 {
        println!("  Errors:  {}", style(report.errors).red());
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mapping() {
        assert_eq!(
            parse_mapping(" js = JavaScript ").unwrap(),
            ("js".to_string(), "JavaScript".to_string())
        );
        assert!(parse_mapping("no-equals").is_err());
        assert!(parse_mapping("=JavaScript").is_err());
    }
}
