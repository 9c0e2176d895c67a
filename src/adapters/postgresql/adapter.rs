//! PostgreSQL adapter implementing the storage traits
//!
//! Card batches are written in one transaction each. Run creation relies on
//! the `idx_sync_runs_single_active` partial unique index for the
//! single-flight guard.

use crate::adapters::database::traits::{page_offset, CardStore, KeyIndex, RunStore};
use crate::adapters::postgresql::client::{map_db_error, PostgreSQLClient};
use crate::adapters::postgresql::models::{
    from_db_count, key_index_entry, sync_error_from_row, to_db_count, PostgreSQLCard,
    PostgreSQLSyncRun,
};
use crate::core::state::run::{
    truncate_message, RunStats, SyncErrorEntry, SyncRun, MAX_ERROR_MESSAGE_LENGTH,
};
use crate::domain::ids::RunId;
use crate::domain::{CardRecord, CardSyncError, CardUpdate, NewCard, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_postgres::types::{Json, ToSql};
use tokio_postgres::Statement;
use uuid::Uuid;

const INSERT_CARD: &str = "INSERT INTO cards (
    id, scryfall_id, oracle_id, name, lang, layout, mana_cost, cmc, type_line, oracle_text,
    power, toughness, loyalty, defense, colors, color_identity, keywords, produced_mana,
    reserved, edhrec_rank, penny_rank, rarity, set_code, set_name, released_at, artist,
    uri, scryfall_uri, image_uris, prices, legalities, last_updated_on, imported_on
) VALUES (
    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18,
    $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30, $31, $32, $33
)";

// A blank incoming type line keeps the stored one
const UPDATE_CARD: &str = "UPDATE cards SET
    scryfall_id = $2, oracle_id = $3, name = $4, lang = $5, layout = $6, mana_cost = $7,
    cmc = $8,
    type_line = CASE WHEN $9::TEXT IS NULL OR BTRIM($9::TEXT) = '' THEN cards.type_line ELSE $9::TEXT END,
    oracle_text = $10, power = $11, toughness = $12, loyalty = $13, defense = $14,
    colors = $15, color_identity = $16, keywords = $17, produced_mana = $18, reserved = $19,
    edhrec_rank = $20, penny_rank = $21, rarity = $22, set_code = $23, set_name = $24,
    released_at = $25, artist = $26, uri = $27, scryfall_uri = $28, image_uris = $29,
    prices = $30, legalities = $31, last_updated_on = $32
WHERE id = $1";

const INSERT_FACE: &str = "INSERT INTO card_faces (
    card_id, face_index, name, mana_cost, type_line, oracle_text, colors, power, toughness,
    loyalty, defense, flavor_text, image_uris, cmc, oracle_id, artist
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)";

const INSERT_PART: &str = "INSERT INTO related_cards (
    card_id, part_index, scryfall_id, component, name, type_line, uri
) VALUES ($1, $2, $3, $4, $5, $6, $7)";

const RUN_COLUMNS: &str = "id, started_at, completed_at, status, dataset_id, download_uri,
    source_updated_at, size_bytes, total_in_source, processed, added, updated, skipped,
    failed, error_message";

const INSERT_RUN: &str = "INSERT INTO sync_runs (
    id, started_at, completed_at, status, dataset_id, download_uri, source_updated_at,
    size_bytes, total_in_source, processed, added, updated, skipped, failed, error_message
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)";

const UPDATE_RUN: &str = "UPDATE sync_runs SET
    started_at = $2, completed_at = $3, status = $4, dataset_id = $5, download_uri = $6,
    source_updated_at = $7, size_bytes = $8, total_in_source = $9, processed = $10,
    added = $11, updated = $12, skipped = $13, failed = $14, error_message = $15
WHERE id = $1";

const INSERT_ERROR: &str = "INSERT INTO sync_errors (
    sync_run_id, oracle_id, card_name, error_message, occurred_at
) VALUES ($1, $2, $3, $4, $5)";

// Column length of `sync_errors.oracle_id`
const MAX_ERROR_KEY_LENGTH: usize = 100;

const ACTIVE_STATUSES: &str = "('Pending', 'Downloading', 'Processing')";

fn card_params(card: &PostgreSQLCard) -> [&(dyn ToSql + Sync); 33] {
    [
        &card.id,
        &card.scryfall_id,
        &card.oracle_id,
        &card.name,
        &card.lang,
        &card.layout,
        &card.mana_cost,
        &card.cmc,
        &card.type_line,
        &card.oracle_text,
        &card.power,
        &card.toughness,
        &card.loyalty,
        &card.defense,
        &card.colors,
        &card.color_identity,
        &card.keywords,
        &card.produced_mana,
        &card.reserved,
        &card.edhrec_rank,
        &card.penny_rank,
        &card.rarity,
        &card.set_code,
        &card.set_name,
        &card.released_at,
        &card.artist,
        &card.uri,
        &card.scryfall_uri,
        &card.image_uris,
        &card.prices,
        &card.legalities,
        &card.last_updated_on,
        &card.imported_on,
    ]
}

fn run_params(run: &PostgreSQLSyncRun) -> [&(dyn ToSql + Sync); 15] {
    [
        &run.id,
        &run.started_at,
        &run.completed_at,
        &run.status,
        &run.dataset_id,
        &run.download_uri,
        &run.source_updated_at,
        &run.size_bytes,
        &run.total_in_source,
        &run.processed,
        &run.added,
        &run.updated,
        &run.skipped,
        &run.failed,
        &run.error_message,
    ]
}

fn position(index: usize) -> i32 {
    i32::try_from(index).unwrap_or(i32::MAX)
}

/// Child statements prepared once per batch
struct ChildStatements {
    face: Statement,
    part: Statement,
}

impl ChildStatements {
    async fn prepare(tx: &deadpool_postgres::Transaction<'_>) -> Result<Self> {
        Ok(Self {
            face: tx
                .prepare_cached(INSERT_FACE)
                .await
                .map_err(|e| map_db_error("Failed to prepare face insert", e))?,
            part: tx
                .prepare_cached(INSERT_PART)
                .await
                .map_err(|e| map_db_error("Failed to prepare part insert", e))?,
        })
    }

    /// Recreates faces and related parts of one card
    async fn insert(
        &self,
        tx: &deadpool_postgres::Transaction<'_>,
        card_id: &Uuid,
        record: &CardRecord,
    ) -> Result<()> {
        for (index, face) in record.card_faces.iter().enumerate() {
            let face_index = position(index);
            let image_uris = face.image_uris.as_ref().map(Json);
            let oracle_id = face.oracle_id.map(|k| *k.as_uuid());
            tx.execute(
                &self.face,
                &[
                    card_id,
                    &face_index,
                    &face.name,
                    &face.mana_cost,
                    &face.type_line,
                    &face.oracle_text,
                    &face.colors,
                    &face.power,
                    &face.toughness,
                    &face.loyalty,
                    &face.defense,
                    &face.flavor_text,
                    &image_uris,
                    &face.cmc,
                    &oracle_id,
                    &face.artist,
                ],
            )
            .await
            .map_err(|e| map_db_error("Failed to insert card face", e))?;
        }

        for (index, part) in record.all_parts.iter().enumerate() {
            let part_index = position(index);
            tx.execute(
                &self.part,
                &[
                    card_id,
                    &part_index,
                    &part.scryfall_id,
                    &part.component,
                    &part.name,
                    &part.type_line,
                    &part.uri,
                ],
            )
            .await
            .map_err(|e| map_db_error("Failed to insert related card", e))?;
        }

        Ok(())
    }
}

/// PostgreSQL implementation of the storage traits
pub struct PostgreSQLAdapter {
    client: Arc<PostgreSQLClient>,
}

impl PostgreSQLAdapter {
    /// Create a new PostgreSQL adapter
    pub fn new(client: PostgreSQLClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Create a new PostgreSQL adapter with an Arc-wrapped client
    pub fn new_with_arc(client: Arc<PostgreSQLClient>) -> Self {
        Self { client }
    }

    /// Get a reference to the underlying client
    pub fn client(&self) -> &Arc<PostgreSQLClient> {
        &self.client
    }

    async fn insert_errors(
        tx: &deadpool_postgres::Transaction<'_>,
        errors: &[SyncErrorEntry],
    ) -> Result<()> {
        if errors.is_empty() {
            return Ok(());
        }

        let stmt = tx
            .prepare_cached(INSERT_ERROR)
            .await
            .map_err(|e| map_db_error("Failed to prepare error insert", e))?;

        for entry in errors {
            let run_id = *entry.run_id.as_uuid();
            let oracle_id = entry
                .oracle_id
                .as_deref()
                .map(|key| truncate_message(key, MAX_ERROR_KEY_LENGTH));
            tx.execute(
                &stmt,
                &[
                    &run_id,
                    &oracle_id,
                    &entry.card_name,
                    &entry.message,
                    &entry.occurred_at,
                ],
            )
            .await
            .map_err(|e| map_db_error("Failed to insert sync error", e))?;
        }
        Ok(())
    }

    async fn update_run(tx: &deadpool_postgres::Transaction<'_>, run: &SyncRun) -> Result<()> {
        let row = PostgreSQLSyncRun::from_domain(run);
        let updated = tx
            .execute(UPDATE_RUN, &run_params(&row))
            .await
            .map_err(|e| map_db_error("Failed to save sync run", e))?;

        if updated == 0 {
            return Err(CardSyncError::Database(format!(
                "sync run {} not found",
                run.id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl CardStore for PostgreSQLAdapter {
    async fn test_connection(&self) -> Result<()> {
        self.client.test_connection().await
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.client.ensure_schema().await
    }

    async fn schema_exists(&self) -> Result<bool> {
        let row = self
            .client
            .query_one("SELECT to_regclass('cards') IS NOT NULL", &[])
            .await?;
        row.try_get(0)
            .map_err(|e| map_db_error("Failed to read schema state", e))
    }

    async fn load_key_index(&self) -> Result<KeyIndex> {
        let rows = self
            .client
            .query(
                "SELECT id, oracle_id, last_updated_on FROM cards WHERE oracle_id IS NOT NULL",
                &[],
            )
            .await?;

        rows.iter().map(key_index_entry).collect()
    }

    async fn insert_cards(&self, cards: &[NewCard]) -> Result<usize> {
        if cards.is_empty() {
            return Ok(0);
        }

        let mut conn = self.client.get_connection().await?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| map_db_error("Failed to begin transaction", e))?;

        let card_stmt = tx
            .prepare_cached(INSERT_CARD)
            .await
            .map_err(|e| map_db_error("Failed to prepare card insert", e))?;
        let children = ChildStatements::prepare(&tx).await?;

        for card in cards {
            let row =
                PostgreSQLCard::from_domain(card.id, &card.record, card.imported_on, card.imported_on);
            tx.execute(&card_stmt, &card_params(&row))
                .await
                .map_err(|e| map_db_error("Failed to insert card", e))?;
            children.insert(&tx, &row.id, &card.record).await?;
        }

        tx.commit()
            .await
            .map_err(|e| map_db_error("Failed to commit card inserts", e))?;

        Ok(cards.len())
    }

    async fn replace_cards(&self, updates: &[CardUpdate]) -> Result<usize> {
        if updates.is_empty() {
            return Ok(0);
        }

        let ids: Vec<Uuid> = updates.iter().map(|u| *u.id.as_uuid()).collect();

        let mut conn = self.client.get_connection().await?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| map_db_error("Failed to begin transaction", e))?;

        // Children go first so nothing stale survives the batch
        tx.execute("DELETE FROM card_faces WHERE card_id = ANY($1)", &[&ids])
            .await
            .map_err(|e| map_db_error("Failed to delete card faces", e))?;
        tx.execute("DELETE FROM related_cards WHERE card_id = ANY($1)", &[&ids])
            .await
            .map_err(|e| map_db_error("Failed to delete related cards", e))?;

        let present: HashSet<Uuid> = tx
            .query("SELECT id FROM cards WHERE id = ANY($1) FOR UPDATE", &[&ids])
            .await
            .map_err(|e| map_db_error("Failed to reload cards", e))?
            .iter()
            .map(|row| row.get::<_, Uuid>("id"))
            .collect();

        let card_stmt = tx
            .prepare_cached(UPDATE_CARD)
            .await
            .map_err(|e| map_db_error("Failed to prepare card update", e))?;
        let children = ChildStatements::prepare(&tx).await?;

        let mut applied = 0;
        for update in updates {
            if !present.contains(update.id.as_uuid()) {
                tracing::warn!(card_id = %update.id, "Card disappeared before update, skipping");
                continue;
            }

            let row =
                PostgreSQLCard::from_domain(update.id, &update.record, update.updated_on, update.updated_on);
            let params = card_params(&row);
            tx.execute(&card_stmt, &params[..32])
                .await
                .map_err(|e| map_db_error("Failed to update card", e))?;
            children.insert(&tx, &row.id, &update.record).await?;
            applied += 1;
        }

        tx.commit()
            .await
            .map_err(|e| map_db_error("Failed to commit card updates", e))?;

        Ok(applied)
    }

    async fn count_cards(&self) -> Result<u64> {
        let row = self
            .client
            .query_one("SELECT COUNT(*) AS count FROM cards", &[])
            .await?;
        Ok(from_db_count(row.get("count")))
    }
}

#[async_trait]
impl RunStore for PostgreSQLAdapter {
    async fn has_active_run(&self) -> Result<bool> {
        let row = self
            .client
            .query_one(
                &format!(
                    "SELECT EXISTS (SELECT 1 FROM sync_runs WHERE status IN {ACTIVE_STATUSES}) AS active"
                ),
                &[],
            )
            .await?;
        Ok(row.get("active"))
    }

    async fn create_run(&self, run: &SyncRun) -> Result<()> {
        let row = PostgreSQLSyncRun::from_domain(run);
        self.client.execute(INSERT_RUN, &run_params(&row)).await?;
        Ok(())
    }

    async fn save_run(&self, run: &SyncRun) -> Result<()> {
        let mut conn = self.client.get_connection().await?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| map_db_error("Failed to begin transaction", e))?;
        Self::update_run(&tx, run).await?;
        tx.commit()
            .await
            .map_err(|e| map_db_error("Failed to commit sync run", e))
    }

    async fn append_errors(&self, errors: &[SyncErrorEntry]) -> Result<()> {
        let mut conn = self.client.get_connection().await?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| map_db_error("Failed to begin transaction", e))?;
        Self::insert_errors(&tx, errors).await?;
        tx.commit()
            .await
            .map_err(|e| map_db_error("Failed to commit sync errors", e))
    }

    async fn checkpoint(&self, run: &SyncRun, errors: &[SyncErrorEntry]) -> Result<()> {
        let mut conn = self.client.get_connection().await?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| map_db_error("Failed to begin transaction", e))?;
        Self::insert_errors(&tx, errors).await?;
        Self::update_run(&tx, run).await?;
        tx.commit()
            .await
            .map_err(|e| map_db_error("Failed to commit checkpoint", e))
    }

    async fn latest_run(&self) -> Result<Option<SyncRun>> {
        let rows = self
            .client
            .query(
                &format!("SELECT {RUN_COLUMNS} FROM sync_runs ORDER BY started_at DESC LIMIT 1"),
                &[],
            )
            .await?;

        rows.first()
            .map(|row| PostgreSQLSyncRun::from_row(row).and_then(PostgreSQLSyncRun::to_domain))
            .transpose()
    }

    async fn get_run(&self, id: RunId) -> Result<Option<SyncRun>> {
        let rows = self
            .client
            .query(
                &format!("SELECT {RUN_COLUMNS} FROM sync_runs WHERE id = $1"),
                &[id.as_uuid()],
            )
            .await?;

        rows.first()
            .map(|row| PostgreSQLSyncRun::from_row(row).and_then(PostgreSQLSyncRun::to_domain))
            .transpose()
    }

    async fn run_history(&self, page: u32, page_size: u32) -> Result<Vec<SyncRun>> {
        let limit = i64::from(page_size);
        let offset = to_db_count(page_offset(page, page_size));
        let rows = self
            .client
            .query(
                &format!(
                    "SELECT {RUN_COLUMNS} FROM sync_runs ORDER BY started_at DESC LIMIT $1 OFFSET $2"
                ),
                &[&limit, &offset],
            )
            .await?;

        rows.iter()
            .map(|row| PostgreSQLSyncRun::from_row(row).and_then(PostgreSQLSyncRun::to_domain))
            .collect()
    }

    async fn count_runs(&self) -> Result<u64> {
        let row = self
            .client
            .query_one("SELECT COUNT(*) AS count FROM sync_runs", &[])
            .await?;
        Ok(from_db_count(row.get("count")))
    }

    async fn run_errors(&self, run_id: RunId, limit: u32) -> Result<Vec<SyncErrorEntry>> {
        let limit = i64::from(limit);
        let rows = self
            .client
            .query(
                "SELECT sync_run_id, oracle_id, card_name, error_message, occurred_at
                 FROM sync_errors WHERE sync_run_id = $1 ORDER BY id LIMIT $2",
                &[run_id.as_uuid(), &limit],
            )
            .await?;

        rows.iter().map(sync_error_from_row).collect()
    }

    async fn run_stats(&self) -> Result<RunStats> {
        let row = self
            .client
            .query_one(
                "SELECT
                    COUNT(*) AS total_runs,
                    COUNT(*) FILTER (WHERE status = 'Completed') AS completed_runs,
                    COUNT(*) FILTER (WHERE status = 'Failed') AS failed_runs,
                    COUNT(*) FILTER (WHERE status = 'Cancelled') AS cancelled_runs,
                    CAST(COALESCE(SUM(added), 0) AS BIGINT) AS total_added,
                    CAST(COALESCE(SUM(updated), 0) AS BIGINT) AS total_updated,
                    CAST(AVG(EXTRACT(EPOCH FROM (completed_at - started_at)))
                        FILTER (WHERE status = 'Completed') AS DOUBLE PRECISION) AS average_duration_secs,
                    MAX(completed_at) FILTER (WHERE status = 'Completed') AS last_completed_at
                 FROM sync_runs",
                &[],
            )
            .await?;

        Ok(RunStats {
            total_runs: from_db_count(row.get("total_runs")),
            completed_runs: from_db_count(row.get("completed_runs")),
            failed_runs: from_db_count(row.get("failed_runs")),
            cancelled_runs: from_db_count(row.get("cancelled_runs")),
            total_added: from_db_count(row.get("total_added")),
            total_updated: from_db_count(row.get("total_updated")),
            average_duration_secs: row.get("average_duration_secs"),
            last_completed_at: row.get("last_completed_at"),
        })
    }

    async fn fail_stale_runs(&self, cutoff: DateTime<Utc>, message: &str) -> Result<u64> {
        let message = truncate_message(message, MAX_ERROR_MESSAGE_LENGTH);
        self.client
            .execute(
                &format!(
                    "UPDATE sync_runs SET status = 'Failed', completed_at = NOW(), error_message = $2
                     WHERE status IN {ACTIVE_STATUSES} AND started_at < $1"
                ),
                &[&cutoff, &message],
            )
            .await
    }
}
