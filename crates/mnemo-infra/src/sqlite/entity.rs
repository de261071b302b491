//! SQLite entity repository implementation.
//!
//! Nested collections (aliases, embedding, sources, relationships) are stored
//! as JSON columns. Normalized aliases are mirrored into `entity_aliases` on
//! every save so exact and prefix alias lookups stay indexed.

use chrono::{DateTime, Utc};
use mnemo_core::entity::merge_strategy::repoint;
use mnemo_core::repository::entity::EntityRepository;
use mnemo_types::entity::{Entity, EntityStats, EntityType, normalize_name};
use mnemo_types::error::RepositoryError;
use sqlx::Row;
use sqlx::sqlite::SqliteConnection;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, parse_uuid, placeholders, query_err};

/// SQLite-backed implementation of `EntityRepository`.
#[derive(Clone)]
pub struct SqliteEntityRepository {
    pool: DatabasePool,
}

impl SqliteEntityRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn fetch_entities(
        &self,
        sql: &str,
        binds: Vec<String>,
    ) -> Result<Vec<Entity>, RepositoryError> {
        let mut query = sqlx::query(sql);
        for value in binds {
            query = query.bind(value);
        }
        let rows = query.fetch_all(&self.pool.reader).await.map_err(query_err)?;

        let mut entities = Vec::with_capacity(rows.len());
        for row in &rows {
            let entity_row = EntityRow::from_row(row).map_err(query_err)?;
            entities.push(entity_row.into_entity()?);
        }
        Ok(entities)
    }
}

// ---------------------------------------------------------------------------
// Private Row type for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct EntityRow {
    id: String,
    workspace_id: String,
    name: String,
    normalized_name: String,
    entity_type: String,
    description: String,
    aliases: String,
    embedding: String,
    sources: String,
    relationships: String,
    total_mentions: i64,
    document_count: i64,
    conversation_mentions: i64,
    confidence: f64,
    created_at: String,
    updated_at: String,
    last_decayed_at: Option<String>,
}

impl EntityRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            workspace_id: row.try_get("workspace_id")?,
            name: row.try_get("name")?,
            normalized_name: row.try_get("normalized_name")?,
            entity_type: row.try_get("entity_type")?,
            description: row.try_get("description")?,
            aliases: row.try_get("aliases")?,
            embedding: row.try_get("embedding")?,
            sources: row.try_get("sources")?,
            relationships: row.try_get("relationships")?,
            total_mentions: row.try_get("total_mentions")?,
            document_count: row.try_get("document_count")?,
            conversation_mentions: row.try_get("conversation_mentions")?,
            confidence: row.try_get("confidence")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            last_decayed_at: row.try_get("last_decayed_at")?,
        })
    }

    fn into_entity(self) -> Result<Entity, RepositoryError> {
        let entity_type: EntityType = self
            .entity_type
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(Entity {
            id: parse_uuid(&self.id, "entity id")?,
            workspace_id: parse_uuid(&self.workspace_id, "workspace_id")?,
            name: self.name,
            normalized_name: self.normalized_name,
            entity_type,
            description: self.description,
            aliases: from_json(&self.aliases, "aliases")?,
            embedding: from_json(&self.embedding, "embedding")?,
            sources: from_json(&self.sources, "sources")?,
            relationships: from_json(&self.relationships, "relationships")?,
            stats: EntityStats {
                total_mentions: self.total_mentions as u32,
                document_count: self.document_count as u32,
                conversation_mentions: self.conversation_mentions as u32,
            },
            confidence: self.confidence as f32,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
            last_decayed_at: self
                .last_decayed_at
                .as_deref()
                .map(parse_datetime)
                .transpose()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn from_json<T: serde::de::DeserializeOwned>(s: &str, column: &str) -> Result<T, RepositoryError> {
    serde_json::from_str(s).map_err(|e| RepositoryError::Query(format!("invalid {column}: {e}")))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(query_err)
}

/// Escape `%`, `_`, and `\` for a `LIKE ... ESCAPE '\'` pattern.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// `%tok1%tok2%...%`: all tokens, in order.
fn ordered_token_pattern(tokens: &[String]) -> String {
    let mut pattern = String::from("%");
    for token in tokens {
        pattern.push_str(&escape_like(token));
        pattern.push('%');
    }
    pattern
}

fn type_filter(entity_type: Option<EntityType>, column: &str, binds: &mut Vec<String>) -> String {
    match entity_type {
        Some(t) => {
            binds.push(t.to_string());
            format!(" AND {column} = ?")
        }
        None => String::new(),
    }
}

/// Upsert one entity and rewrite its alias index on `conn`.
async fn upsert_entity(conn: &mut SqliteConnection, entity: &Entity) -> Result<(), RepositoryError> {
    sqlx::query(
        r#"INSERT INTO entities (id, workspace_id, name, normalized_name, entity_type, description,
               aliases, embedding, sources, relationships, relationship_count, has_embedding,
               total_mentions, document_count, conversation_mentions, confidence,
               created_at, updated_at, last_decayed_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
           ON CONFLICT(id) DO UPDATE SET
               workspace_id = excluded.workspace_id,
               name = excluded.name,
               normalized_name = excluded.normalized_name,
               entity_type = excluded.entity_type,
               description = excluded.description,
               aliases = excluded.aliases,
               embedding = excluded.embedding,
               sources = excluded.sources,
               relationships = excluded.relationships,
               relationship_count = excluded.relationship_count,
               has_embedding = excluded.has_embedding,
               total_mentions = excluded.total_mentions,
               document_count = excluded.document_count,
               conversation_mentions = excluded.conversation_mentions,
               confidence = excluded.confidence,
               updated_at = excluded.updated_at,
               last_decayed_at = excluded.last_decayed_at"#,
    )
    .bind(entity.id.to_string())
    .bind(entity.workspace_id.to_string())
    .bind(&entity.name)
    .bind(&entity.normalized_name)
    .bind(entity.entity_type.to_string())
    .bind(&entity.description)
    .bind(to_json(&entity.aliases)?)
    .bind(to_json(&entity.embedding)?)
    .bind(to_json(&entity.sources)?)
    .bind(to_json(&entity.relationships)?)
    .bind(entity.relationships.len() as i64)
    .bind(i64::from(!entity.embedding.is_empty()))
    .bind(i64::from(entity.stats.total_mentions))
    .bind(i64::from(entity.stats.document_count))
    .bind(i64::from(entity.stats.conversation_mentions))
    .bind(f64::from(entity.confidence))
    .bind(format_datetime(&entity.created_at))
    .bind(format_datetime(&entity.updated_at))
    .bind(entity.last_decayed_at.as_ref().map(format_datetime))
    .execute(&mut *conn)
    .await
    .map_err(query_err)?;

    sqlx::query("DELETE FROM entity_aliases WHERE entity_id = ?")
        .bind(entity.id.to_string())
        .execute(&mut *conn)
        .await
        .map_err(query_err)?;

    for alias in &entity.aliases {
        let normalized = normalize_name(alias);
        if normalized.is_empty() {
            continue;
        }
        sqlx::query(
            "INSERT OR IGNORE INTO entity_aliases (entity_id, workspace_id, normalized_alias) VALUES (?, ?, ?)",
        )
        .bind(entity.id.to_string())
        .bind(entity.workspace_id.to_string())
        .bind(normalized)
        .execute(&mut *conn)
        .await
        .map_err(query_err)?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// EntityRepository implementation
// ---------------------------------------------------------------------------

impl EntityRepository for SqliteEntityRepository {
    async fn get(&self, id: &Uuid) -> Result<Option<Entity>, RepositoryError> {
        let mut entities = self
            .fetch_entities("SELECT * FROM entities WHERE id = ?", vec![id.to_string()])
            .await?;
        Ok(entities.pop())
    }

    async fn get_many(&self, ids: &[Uuid]) -> Result<Vec<Entity>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT * FROM entities WHERE id IN ({})",
            placeholders(ids.len())
        );
        self.fetch_entities(&sql, ids.iter().map(Uuid::to_string).collect())
            .await
    }

    async fn save(&self, entity: &Entity) -> Result<(), RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;
        upsert_entity(&mut tx, entity).await?;
        tx.commit().await.map_err(query_err)?;
        Ok(())
    }

    async fn delete_many(&self, ids: &[Uuid]) -> Result<u64, RepositoryError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "DELETE FROM entities WHERE id IN ({})",
            placeholders(ids.len())
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id.to_string());
        }
        let result = query.execute(&self.pool.writer).await.map_err(query_err)?;
        Ok(result.rows_affected())
    }

    async fn find_exact(
        &self,
        workspace_id: &Uuid,
        normalized_name: &str,
        entity_type: Option<EntityType>,
    ) -> Result<Vec<Entity>, RepositoryError> {
        let mut binds = vec![
            workspace_id.to_string(),
            normalized_name.to_string(),
            workspace_id.to_string(),
            normalized_name.to_string(),
        ];
        let filter = type_filter(entity_type, "e.entity_type", &mut binds);
        let sql = format!(
            r#"SELECT e.* FROM entities e
               WHERE ((e.workspace_id = ? AND e.normalized_name = ?)
                  OR e.id IN (SELECT entity_id FROM entity_aliases
                              WHERE workspace_id = ? AND normalized_alias = ?)){filter}
               ORDER BY e.total_mentions DESC"#
        );
        self.fetch_entities(&sql, binds).await
    }

    async fn find_by_name_pattern(
        &self,
        workspace_id: &Uuid,
        tokens: &[String],
        entity_type: Option<EntityType>,
        limit: usize,
    ) -> Result<Vec<Entity>, RepositoryError> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        let mut binds = vec![workspace_id.to_string(), ordered_token_pattern(tokens)];
        let filter = type_filter(entity_type, "entity_type", &mut binds);
        let sql = format!(
            r#"SELECT * FROM entities
               WHERE workspace_id = ? AND normalized_name LIKE ? ESCAPE '\'{filter}
               ORDER BY total_mentions DESC LIMIT {limit}"#
        );
        self.fetch_entities(&sql, binds).await
    }

    async fn find_by_alias_prefix(
        &self,
        workspace_id: &Uuid,
        prefix: &str,
        entity_type: Option<EntityType>,
        limit: usize,
    ) -> Result<Vec<Entity>, RepositoryError> {
        if prefix.is_empty() {
            return Ok(Vec::new());
        }
        let mut binds = vec![
            workspace_id.to_string(),
            format!("{}%", escape_like(prefix)),
        ];
        let filter = type_filter(entity_type, "e.entity_type", &mut binds);
        let sql = format!(
            r#"SELECT e.* FROM entities e
               WHERE e.id IN (SELECT entity_id FROM entity_aliases
                              WHERE workspace_id = ? AND normalized_alias LIKE ? ESCAPE '\'){filter}
               ORDER BY e.total_mentions DESC LIMIT {limit}"#
        );
        self.fetch_entities(&sql, binds).await
    }

    async fn list_by_mentions(
        &self,
        workspace_id: &Uuid,
        limit: Option<usize>,
    ) -> Result<Vec<Entity>, RepositoryError> {
        let mut sql = String::from(
            "SELECT * FROM entities WHERE workspace_id = ? ORDER BY total_mentions DESC, normalized_name ASC",
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        self.fetch_entities(&sql, vec![workspace_id.to_string()])
            .await
    }

    async fn list_missing_embeddings(
        &self,
        workspace_id: &Uuid,
        limit: usize,
    ) -> Result<Vec<Entity>, RepositoryError> {
        let sql = format!(
            "SELECT * FROM entities WHERE workspace_id = ? AND has_embedding = 0 ORDER BY total_mentions DESC LIMIT {limit}"
        );
        self.fetch_entities(&sql, vec![workspace_id.to_string()])
            .await
    }

    async fn list_stale(&self, updated_before: DateTime<Utc>) -> Result<Vec<Entity>, RepositoryError> {
        self.fetch_entities(
            "SELECT * FROM entities WHERE updated_at < ? ORDER BY updated_at ASC",
            vec![format_datetime(&updated_before)],
        )
        .await
    }

    async fn list_prune_candidates(
        &self,
        max_mentions: u32,
        max_confidence: f32,
    ) -> Result<Vec<Entity>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM entities
               WHERE total_mentions < ? AND relationship_count = 0 AND confidence < ?
               ORDER BY confidence ASC"#,
        )
        .bind(i64::from(max_mentions))
        .bind(f64::from(max_confidence))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        let mut entities = Vec::with_capacity(rows.len());
        for row in &rows {
            let entity_row = EntityRow::from_row(row).map_err(query_err)?;
            entities.push(entity_row.into_entity()?);
        }
        Ok(entities)
    }

    async fn update_confidence(
        &self,
        id: &Uuid,
        confidence: f32,
        decayed_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE entities SET confidence = ?, last_decayed_at = ? WHERE id = ?")
                .bind(f64::from(confidence))
                .bind(format_datetime(&decayed_at))
                .bind(id.to_string())
                .execute(&self.pool.writer)
                .await
                .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn repoint_relationships(
        &self,
        workspace_id: &Uuid,
        from_ids: &[Uuid],
        to_id: &Uuid,
    ) -> Result<u64, RepositoryError> {
        if from_ids.is_empty() {
            return Ok(0);
        }

        let mut binds = vec![workspace_id.to_string()];
        binds.extend(from_ids.iter().map(Uuid::to_string));
        let sql = format!(
            r#"SELECT DISTINCT e.* FROM entities e, json_each(e.relationships) r
               WHERE e.workspace_id = ?
                 AND json_extract(r.value, '$.target_entity_id') IN ({})"#,
            placeholders(from_ids.len())
        );
        let affected = self.fetch_entities(&sql, binds).await?;

        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;
        let mut rewritten = 0;
        for mut entity in affected {
            if from_ids.contains(&entity.id) {
                // about to be deleted by the merge
                continue;
            }
            let owner = entity.id;
            if repoint(&owner, &mut entity.relationships, from_ids, to_id) {
                upsert_entity(&mut tx, &entity).await?;
                rewritten += 1;
            }
        }
        tx.commit().await.map_err(query_err)?;

        Ok(rewritten)
    }

    async fn count(&self, workspace_id: Option<&Uuid>) -> Result<u64, RepositoryError> {
        let row: (i64,) = match workspace_id {
            Some(ws) => sqlx::query_as("SELECT COUNT(*) FROM entities WHERE workspace_id = ?")
                .bind(ws.to_string())
                .fetch_one(&self.pool.reader)
                .await,
            None => {
                sqlx::query_as("SELECT COUNT(*) FROM entities")
                    .fetch_one(&self.pool.reader)
                    .await
            }
        }
        .map_err(query_err)?;
        Ok(row.0 as u64)
    }

    async fn count_below_confidence(&self, threshold: f32) -> Result<u64, RepositoryError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM entities WHERE confidence < ?")
            .bind(f64::from(threshold))
            .fetch_one(&self.pool.reader)
            .await
            .map_err(query_err)?;
        Ok(row.0 as u64)
    }

    async fn average_confidence(&self) -> Result<f64, RepositoryError> {
        let row: (Option<f64>,) = sqlx::query_as("SELECT AVG(confidence) FROM entities")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(query_err)?;
        Ok(row.0.unwrap_or(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_types::entity::{DocumentSource, Relationship};

    async fn test_repo() -> SqliteEntityRepository {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        // Leak tempdir so it lives for the test
        std::mem::forget(dir);
        SqliteEntityRepository::new(DatabasePool::new(&url).await.unwrap())
    }

    fn entity(ws: Uuid, name: &str, mentions: u32) -> Entity {
        let mut e = Entity::new(ws, name, EntityType::Organization);
        e.stats.total_mentions = mentions;
        e
    }

    #[tokio::test]
    async fn test_save_and_get_roundtrip() {
        let repo = test_repo().await;
        let ws = Uuid::now_v7();
        let mut e = entity(ws, "Acme Corp", 5);
        e.description = "Widget maker".to_string();
        e.aliases = vec!["ACME".to_string()];
        e.embedding = vec![0.5, -0.25];
        e.sources = vec![DocumentSource {
            source_id: "doc-1".to_string(),
            title: "Q3 report".to_string(),
            mention_count: 5,
            contexts: vec!["Acme Corp grew".to_string()],
        }];
        e.recompute_document_count();
        repo.save(&e).await.unwrap();

        let loaded = repo.get(&e.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Acme Corp");
        assert_eq!(loaded.normalized_name, "acme corp");
        assert_eq!(loaded.aliases, vec!["ACME"]);
        assert_eq!(loaded.embedding, vec![0.5, -0.25]);
        assert_eq!(loaded.sources, e.sources);
        assert_eq!(loaded.stats, e.stats);
        assert!(loaded.last_decayed_at.is_none());

        assert!(repo.get(&Uuid::now_v7()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_upserts() {
        let repo = test_repo().await;
        let ws = Uuid::now_v7();
        let mut e = entity(ws, "Acme Corp", 1);
        repo.save(&e).await.unwrap();
        e.stats.total_mentions = 9;
        e.aliases = vec!["Acme Inc".to_string()];
        repo.save(&e).await.unwrap();

        assert_eq!(repo.count(Some(&ws)).await.unwrap(), 1);
        let loaded = repo.get(&e.id).await.unwrap().unwrap();
        assert_eq!(loaded.stats.total_mentions, 9);
        // alias index rewritten
        let by_alias = repo.find_exact(&ws, "acme inc", None).await.unwrap();
        assert_eq!(by_alias.len(), 1);
    }

    #[tokio::test]
    async fn test_find_exact_is_workspace_scoped() {
        let repo = test_repo().await;
        let ws = Uuid::now_v7();
        let other_ws = Uuid::now_v7();
        repo.save(&entity(ws, "Acme Corp", 1)).await.unwrap();
        repo.save(&entity(other_ws, "Acme Corp", 1)).await.unwrap();

        let found = repo.find_exact(&ws, "acme corp", None).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].workspace_id, ws);

        let typed = repo
            .find_exact(&ws, "acme corp", Some(EntityType::Person))
            .await
            .unwrap();
        assert!(typed.is_empty());
    }

    #[tokio::test]
    async fn test_find_by_name_pattern_ordered_tokens() {
        let repo = test_repo().await;
        let ws = Uuid::now_v7();
        repo.save(&entity(ws, "Acme Widget Corp", 1)).await.unwrap();
        repo.save(&entity(ws, "Corp of Acme", 1)).await.unwrap();
        repo.save(&entity(ws, "100% Acme", 1)).await.unwrap();

        let tokens = vec!["acme".to_string(), "corp".to_string()];
        let found = repo.find_by_name_pattern(&ws, &tokens, None, 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Acme Widget Corp");

        // '%' in a token is literal
        let literal = repo
            .find_by_name_pattern(&ws, &["100%".to_string()], None, 10)
            .await
            .unwrap();
        assert_eq!(literal.len(), 1);
    }

    #[tokio::test]
    async fn test_find_by_alias_prefix() {
        let repo = test_repo().await;
        let ws = Uuid::now_v7();
        let mut e = entity(ws, "Kubernetes", 3);
        e.aliases = vec!["k8s".to_string(), "kube".to_string()];
        repo.save(&e).await.unwrap();

        let found = repo.find_by_alias_prefix(&ws, "ku", None, 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(repo.find_by_alias_prefix(&ws, "x", None, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_confidence_keeps_updated_at() {
        let repo = test_repo().await;
        let ws = Uuid::now_v7();
        let mut e = entity(ws, "Old Thing", 1);
        e.updated_at = Utc::now() - chrono::Duration::days(30);
        repo.save(&e).await.unwrap();

        let now = Utc::now();
        repo.update_confidence(&e.id, 0.4, now).await.unwrap();
        let loaded = repo.get(&e.id).await.unwrap().unwrap();
        assert!((loaded.confidence - 0.4).abs() < 1e-6);
        assert!(loaded.last_decayed_at.is_some());
        assert!(loaded.updated_at < now - chrono::Duration::days(29));

        let stale = repo.list_stale(now - chrono::Duration::days(7)).await.unwrap();
        assert_eq!(stale.len(), 1);

        assert!(matches!(
            repo.update_confidence(&Uuid::now_v7(), 0.5, now).await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_repoint_relationships() {
        let repo = test_repo().await;
        let ws = Uuid::now_v7();
        let primary = entity(ws, "Acme Corp", 5);
        let dup = entity(ws, "Acme Corporation", 2);
        let mut fan = entity(ws, "Alice", 1);
        fan.relationships = vec![
            Relationship {
                target_entity_id: dup.id,
                relationship_type: "works_at".to_string(),
                strength: 0.8,
                evidence: None,
            },
            Relationship {
                target_entity_id: primary.id,
                relationship_type: "works_at".to_string(),
                strength: 0.5,
                evidence: None,
            },
        ];
        repo.save(&primary).await.unwrap();
        repo.save(&dup).await.unwrap();
        repo.save(&fan).await.unwrap();

        let rewritten = repo
            .repoint_relationships(&ws, &[dup.id], &primary.id)
            .await
            .unwrap();
        assert_eq!(rewritten, 1);

        let loaded = repo.get(&fan.id).await.unwrap().unwrap();
        assert_eq!(loaded.relationships.len(), 1);
        assert_eq!(loaded.relationships[0].target_entity_id, primary.id);
        assert!((loaded.relationships[0].strength - 0.8).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_prune_candidates_and_stats() {
        let repo = test_repo().await;
        let ws = Uuid::now_v7();
        let mut weak = entity(ws, "Weak", 1);
        weak.confidence = 0.2;
        let mut linked = entity(ws, "Linked", 1);
        linked.confidence = 0.2;
        linked.relationships.push(Relationship {
            target_entity_id: weak.id,
            relationship_type: "mentions".to_string(),
            strength: 0.5,
            evidence: None,
        });
        let strong = entity(ws, "Strong", 10);
        for e in [&weak, &linked, &strong] {
            repo.save(e).await.unwrap();
        }

        let candidates = repo.list_prune_candidates(2, 0.3).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, weak.id);

        assert_eq!(repo.count(None).await.unwrap(), 3);
        assert_eq!(repo.count_below_confidence(0.3).await.unwrap(), 2);
        let avg = repo.average_confidence().await.unwrap();
        assert!((avg - (0.2 + 0.2 + 1.0) / 3.0).abs() < 1e-6);

        assert_eq!(repo.delete_many(&[weak.id, Uuid::now_v7()]).await.unwrap(), 1);
    }
}
