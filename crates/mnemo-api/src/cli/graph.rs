//! Knowledge graph commands.

use std::collections::HashMap;

use anyhow::Result;
use clap::Subcommand;
use comfy_table::{Cell, Color};
use console::style;
use uuid::Uuid;

use super::{new_table, print_json, short_id, truncate};
use crate::state::AppState;

#[derive(Subcommand)]
pub enum GraphCommand {
    /// Bounded neighbourhood around an entity.
    Subgraph {
        workspace: Uuid,
        entity: Uuid,

        #[arg(long)]
        depth: Option<u32>,

        #[arg(long)]
        max_nodes: Option<usize>,
    },

    /// Shortest relationship path between two entities.
    Path {
        workspace: Uuid,
        from: Uuid,
        to: Uuid,

        #[arg(long)]
        max_depth: Option<u32>,
    },

    /// Entities linked from a seed set, ranked by summed strength.
    Related {
        workspace: Uuid,

        #[arg(required = true)]
        seeds: Vec<Uuid>,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        min_strength: Option<f32>,
    },

    /// Connected groups of entities.
    Clusters {
        workspace: Uuid,

        #[arg(long)]
        min_size: Option<usize>,

        #[arg(long)]
        max: Option<usize>,
    },

    /// Graph shape summary for a workspace.
    Stats {
        workspace: Uuid,
    },

    /// Prompt-ready text block describing seed entities and their neighbours.
    Context {
        workspace: Uuid,

        #[arg(required = true)]
        seeds: Vec<Uuid>,

        #[arg(long, default_value = "5")]
        max_related: usize,
    },

    /// Add or reinforce a relationship between two entities.
    Relate {
        workspace: Uuid,
        source: Uuid,
        target: Uuid,
        relationship_type: String,

        #[arg(long, default_value = "0.5")]
        strength: f32,

        #[arg(long)]
        evidence: Option<String>,
    },
}

impl GraphCommand {
    pub fn workspace(&self) -> Uuid {
        match self {
            GraphCommand::Subgraph { workspace, .. }
            | GraphCommand::Path { workspace, .. }
            | GraphCommand::Related { workspace, .. }
            | GraphCommand::Clusters { workspace, .. }
            | GraphCommand::Stats { workspace }
            | GraphCommand::Context { workspace, .. }
            | GraphCommand::Relate { workspace, .. } => *workspace,
        }
    }
}

/// Dispatch a graph subcommand. Unset limits fall back to the `[graph]`
/// section of `config.toml`.
pub async fn handle(state: &AppState, action: GraphCommand, json: bool) -> Result<()> {
    let defaults = state.graph.config().clone();

    match action {
        GraphCommand::Subgraph {
            workspace,
            entity,
            depth,
            max_nodes,
        } => {
            let subgraph = state
                .graph
                .get_subgraph(
                    &workspace,
                    &entity,
                    depth.unwrap_or(defaults.default_depth),
                    max_nodes.unwrap_or(defaults.default_max_nodes),
                )
                .await?;
            if json {
                return print_json(&subgraph);
            }

            let names: HashMap<Uuid, &str> = subgraph
                .nodes
                .iter()
                .map(|n| (n.entity_id, n.name.as_str()))
                .collect();

            let mut nodes = new_table(&["Depth", "Entity", "Type", "Importance"]);
            for n in &subgraph.nodes {
                nodes.add_row(vec![
                    Cell::new(n.depth),
                    Cell::new(format!("{} ({})", truncate(&n.name, 40), short_id(&n.entity_id))),
                    Cell::new(n.entity_type.to_string()).fg(Color::Cyan),
                    Cell::new(format!("{:.2}", n.importance)),
                ]);
            }
            println!("{nodes}");

            if !subgraph.edges.is_empty() {
                let mut edges = new_table(&["Source", "Relationship", "Target", "Strength"]);
                for e in &subgraph.edges {
                    edges.add_row(vec![
                        Cell::new(names.get(&e.source).copied().unwrap_or("?")),
                        Cell::new(&e.relationship_type).fg(Color::Yellow),
                        Cell::new(names.get(&e.target).copied().unwrap_or("?")),
                        Cell::new(format!("{:.2}", e.strength)),
                    ]);
                }
                println!("{edges}");
            }
            Ok(())
        }

        GraphCommand::Path {
            workspace,
            from,
            to,
            max_depth,
        } => {
            let path = state
                .graph
                .find_path(
                    &workspace,
                    &from,
                    &to,
                    max_depth.unwrap_or(defaults.default_max_path_depth),
                )
                .await?;
            if json {
                return print_json(&path);
            }

            println!();
            match path {
                Some(path) if path.is_empty() => {
                    println!("  {} Source and target are the same entity.", style("i").blue().bold());
                }
                Some(path) => {
                    let mut line = style(&path.entity_names[0]).cyan().to_string();
                    for (i, rel) in path.relationship_types.iter().enumerate() {
                        line.push_str(&format!(
                            " -[{}]-> {}",
                            style(rel).yellow(),
                            style(&path.entity_names[i + 1]).cyan()
                        ));
                    }
                    println!("  {line}");
                    println!("  {}", style(format!("{} hop(s)", path.len())).dim());
                }
                None => {
                    println!("  {} No path within the depth limit.", style("✗").red());
                }
            }
            println!();
            Ok(())
        }

        GraphCommand::Related {
            workspace,
            seeds,
            limit,
            min_strength,
        } => {
            let related = state
                .graph
                .get_related_entities(
                    &workspace,
                    &seeds,
                    limit.unwrap_or(defaults.related_max_results),
                    min_strength.unwrap_or(defaults.related_min_strength),
                )
                .await?;
            if json {
                return print_json(&related);
            }
            if related.is_empty() {
                println!();
                println!("  {} No related entities above the strength floor.", style("i").blue().bold());
                println!();
                return Ok(());
            }

            let mut table = new_table(&["Entity", "Type", "Score", "Via"]);
            for r in &related {
                table.add_row(vec![
                    Cell::new(format!("{} ({})", truncate(&r.name, 40), short_id(&r.entity_id))),
                    Cell::new(r.entity_type.to_string()).fg(Color::Cyan),
                    Cell::new(format!("{:.2}", r.score)),
                    Cell::new(r.relationship_types.join(", ")).fg(Color::Yellow),
                ]);
            }
            println!("{table}");
            Ok(())
        }

        GraphCommand::Clusters {
            workspace,
            min_size,
            max,
        } => {
            let clusters = state
                .graph
                .find_clusters(
                    &workspace,
                    min_size.unwrap_or(defaults.min_cluster_size),
                    max.unwrap_or(defaults.max_clusters),
                )
                .await?;
            if json {
                return print_json(&clusters);
            }
            if clusters.is_empty() {
                println!();
                println!("  {} No clusters of the minimum size.", style("i").blue().bold());
                println!();
                return Ok(());
            }

            let mut table = new_table(&["Label", "Size"]);
            for c in &clusters {
                table.add_row(vec![
                    Cell::new(format!("{} ({})", c.label, short_id(&c.label_entity_id))).fg(Color::Cyan),
                    Cell::new(c.size),
                ]);
            }
            println!("{table}");
            Ok(())
        }

        GraphCommand::Stats { workspace } => {
            let stats = state.graph.graph_stats(&workspace).await?;
            if json {
                return print_json(&stats);
            }
            println!();
            println!("  {}", style("── Graph ──").dim());
            println!("  Entities:         {}", style(stats.entity_count).bold());
            println!("  Relationships:    {}", stats.relationship_count);
            println!("  Isolated:         {}", stats.isolated_entities);
            println!("  Avg out-degree:   {:.2}", stats.average_out_degree);
            if stats.dangling_relationships > 0 {
                println!(
                    "  Dangling edges:   {}",
                    style(stats.dangling_relationships).yellow()
                );
            }
            println!();
            Ok(())
        }

        GraphCommand::Context {
            workspace,
            seeds,
            max_related,
        } => {
            let text = state
                .graph
                .build_knowledge_context(&workspace, &seeds, max_related)
                .await?;
            if json {
                return print_json(&serde_json::json!({ "context": text }));
            }
            println!("{text}");
            Ok(())
        }

        GraphCommand::Relate {
            workspace,
            source,
            target,
            relationship_type,
            strength,
            evidence,
        } => {
            let updated = state
                .graph
                .add_relationship(&workspace, &source, &target, &relationship_type, strength, evidence)
                .await?;
            if json {
                return print_json(&updated);
            }
            let edge = updated
                .relationships
                .iter()
                .find(|r| r.target_entity_id == target && r.relationship_type == relationship_type);
            println!();
            println!(
                "  {} {} -[{}]-> {} {}",
                style("✓").green().bold(),
                style(&updated.name).cyan(),
                style(&relationship_type).yellow(),
                short_id(&target),
                style(format!("({:.2})", edge.map(|e| e.strength).unwrap_or(strength))).dim()
            );
            println!();
            Ok(())
        }
    }
}
