//! Span field names and operation values for mnemo instrumentation.
//!
//! Used as field names in `tracing::info_span!` so every root span carries
//! the same keys regardless of which command opened it. Exported spans keep
//! these names as OpenTelemetry attributes.

/// Workspace the operation is scoped to. Empty for global passes.
pub const MNEMO_WORKSPACE_ID: &str = "mnemo.workspace.id";

/// The operation being performed (one of the `OP_*` values below).
pub const MNEMO_OPERATION_NAME: &str = "mnemo.operation.name";

/// Whether the operation ran without writing.
pub const MNEMO_DRY_RUN: &str = "mnemo.dry_run";

/// Embedding model in use.
pub const MNEMO_EMBEDDING_MODEL: &str = "mnemo.embedding.model";

// --- Operation name values ---

pub const OP_DECAY_RUN: &str = "decay_run";
pub const OP_DECAY_STATS: &str = "decay_stats";
pub const OP_FIND_DUPLICATES: &str = "find_duplicates";
pub const OP_MERGE: &str = "merge";
pub const OP_NORMALIZE: &str = "normalize";
pub const OP_RESOLVE: &str = "resolve";
pub const OP_RECORD_MENTION: &str = "record_mention";
pub const OP_GRAPH_QUERY: &str = "graph_query";
pub const OP_ADD_RELATIONSHIP: &str = "add_relationship";
pub const OP_PRUNE_CONTEXT: &str = "prune_context";
pub const OP_EMBED: &str = "embed";
pub const OP_ENTITY_QUERY: &str = "entity_query";
pub const OP_CONVERSATION: &str = "conversation";
pub const OP_SUMMARIZE: &str = "summarize";
