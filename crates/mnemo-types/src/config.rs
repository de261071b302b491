//! Configuration types for mnemo.
//!
//! `MemoryConfig` represents the top-level `config.toml`. Every section and
//! field has a default, so an empty file (or no file) yields a working setup.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the memory layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// SQLite URL. `None` means "derive from the data directory".
    pub database_url: Option<String>,
    pub resolution: ResolutionConfig,
    pub merge: MergeConfig,
    pub graph: GraphConfig,
    pub decay: DecayConfig,
    pub pruning: PruningConfig,
}

/// Thresholds for entity resolution and duplicate detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Minimum combined string similarity for fuzzy candidates and for accepting a match.
    pub fuzzy_threshold: f32,
    /// Stricter floor used by `find_duplicates`.
    pub duplicate_threshold: f32,
    /// An exact candidate at or above this score short-circuits resolution.
    pub exact_match_threshold: f32,
    pub max_candidates: usize,
    pub string_weight: f32,
    pub embedding_weight: f32,
    /// Confidence reported when resolution fails and the name is treated as new.
    pub failure_confidence: f32,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.7,
            duplicate_threshold: 0.8,
            exact_match_threshold: 0.99,
            max_candidates: 10,
            string_weight: 0.6,
            embedding_weight: 0.4,
            failure_confidence: 0.5,
        }
    }
}

/// Merge behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Every duplicate in a group must meet this similarity for auto-merge.
    pub auto_merge_threshold: f32,
    /// New contexts taken from a duplicate's matching source per merge.
    pub contexts_per_merge: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            auto_merge_threshold: 0.95,
            contexts_per_merge: 2,
        }
    }
}

/// Defaults for knowledge graph queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub default_depth: u32,
    pub default_max_nodes: usize,
    pub default_max_path_depth: u32,
    pub min_cluster_size: usize,
    pub max_clusters: usize,
    pub related_min_strength: f32,
    pub related_max_results: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            default_depth: 2,
            default_max_nodes: 50,
            default_max_path_depth: 4,
            min_cluster_size: 3,
            max_clusters: 10,
            related_min_strength: 0.3,
            related_max_results: 10,
        }
    }
}

/// Retention policy for conversations and entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecayConfig {
    pub max_age_days: i64,
    pub message_retention_days: i64,
    pub min_messages_for_summary: u32,
    /// Fractional confidence loss per day.
    pub decay_rate: f64,
    /// Entities touched within this many days are exempt from decay.
    pub grace_period_days: i64,
    /// Confidence changes smaller than this are skipped.
    pub min_change: f32,
    /// Entities with fewer mentions than this (and no relationships) may be pruned.
    pub prune_max_mentions: u32,
    /// ...if their confidence is also below this.
    pub prune_max_confidence: f32,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            max_age_days: 90,
            message_retention_days: 30,
            min_messages_for_summary: 5,
            decay_rate: 0.01,
            grace_period_days: 7,
            min_change: 0.01,
            prune_max_mentions: 2,
            prune_max_confidence: 0.3,
        }
    }
}

/// Token budget knobs for context pruning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PruningConfig {
    pub max_total_tokens: u32,
    pub episodic_fraction: f32,
    pub semantic_fraction: f32,
    pub summary_fraction: f32,
    /// How many recent messages are scanned as candidates.
    pub scan_limit: u32,
    /// Minimum relevance for an older message to qualify as semantic memory.
    pub min_relevance: f32,
    /// The N most recent messages are always episodic.
    pub episodic_count: usize,
    /// Messages older than this have zero recency.
    pub recency_window_hours: i64,
    pub embedding_cache_capacity: usize,
}

impl Default for PruningConfig {
    fn default() -> Self {
        Self {
            max_total_tokens: 4000,
            episodic_fraction: 0.4,
            semantic_fraction: 0.4,
            summary_fraction: 0.2,
            scan_limit: 50,
            min_relevance: 0.3,
            episodic_count: 5,
            recency_window_hours: 24,
            embedding_cache_capacity: 500,
        }
    }
}
