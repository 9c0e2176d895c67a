//! PostgreSQL row models
//!
//! Row shapes of the `cards`, `sync_runs` and `sync_errors` tables and their
//! conversions to and from the domain types.

use crate::core::state::run::{RunCounters, RunStatus, SyncErrorEntry, SyncRun};
use crate::domain::ids::{CardId, OracleId, RunId};
use crate::domain::{
    CardFace, CardRecord, CardSyncError, ExistingCard, ImageUris, Legalities, Prices, RelatedCard,
    Result, StoredCard,
};
use chrono::{DateTime, NaiveDate, Utc};
use tokio_postgres::types::Json;
use tokio_postgres::Row;
use uuid::Uuid;

/// Column length of `sync_runs.dataset_id`
pub const MAX_DATASET_ID_LENGTH: usize = 100;
/// Column length of `sync_runs.download_uri`
pub const MAX_DOWNLOAD_URI_LENGTH: usize = 500;

/// Counter value as stored in a BIGINT column
pub fn to_db_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// BIGINT column value as a counter
pub fn from_db_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// Card row mapping to the `cards` table
///
/// Faces and related parts are stored in their own tables and are not part
/// of this row.
#[derive(Debug, Clone)]
pub struct PostgreSQLCard {
    pub id: Uuid,
    pub scryfall_id: Uuid,
    pub oracle_id: Option<Uuid>,
    pub name: String,
    pub lang: String,
    pub layout: String,
    pub mana_cost: Option<String>,
    pub cmc: f64,
    pub type_line: Option<String>,
    pub oracle_text: Option<String>,
    pub power: Option<String>,
    pub toughness: Option<String>,
    pub loyalty: Option<String>,
    pub defense: Option<String>,
    pub colors: Vec<String>,
    pub color_identity: Vec<String>,
    pub keywords: Vec<String>,
    pub produced_mana: Option<Vec<String>>,
    pub reserved: bool,
    pub edhrec_rank: Option<i32>,
    pub penny_rank: Option<i32>,
    pub rarity: String,
    pub set_code: String,
    pub set_name: String,
    pub released_at: Option<NaiveDate>,
    pub artist: Option<String>,
    pub uri: Option<String>,
    pub scryfall_uri: Option<String>,
    pub image_uris: Option<Json<ImageUris>>,
    pub prices: Json<Prices>,
    pub legalities: Json<Legalities>,
    pub imported_on: DateTime<Utc>,
    pub last_updated_on: DateTime<Utc>,
}

impl PostgreSQLCard {
    /// Scalar columns of a domain card
    pub fn from_domain(
        id: CardId,
        record: &CardRecord,
        imported_on: DateTime<Utc>,
        last_updated_on: DateTime<Utc>,
    ) -> Self {
        Self {
            id: *id.as_uuid(),
            scryfall_id: record.scryfall_id,
            oracle_id: record.oracle_id.map(|k| *k.as_uuid()),
            name: record.name.clone(),
            lang: record.lang.clone(),
            layout: record.layout.clone(),
            mana_cost: record.mana_cost.clone(),
            cmc: record.cmc,
            type_line: record.type_line.clone(),
            oracle_text: record.oracle_text.clone(),
            power: record.power.clone(),
            toughness: record.toughness.clone(),
            loyalty: record.loyalty.clone(),
            defense: record.defense.clone(),
            colors: record.colors.clone(),
            color_identity: record.color_identity.clone(),
            keywords: record.keywords.clone(),
            produced_mana: record.produced_mana.clone(),
            reserved: record.reserved,
            edhrec_rank: record.edhrec_rank,
            penny_rank: record.penny_rank,
            rarity: record.rarity.clone(),
            set_code: record.set_code.clone(),
            set_name: record.set_name.clone(),
            released_at: record.released_at,
            artist: record.artist.clone(),
            uri: record.uri.clone(),
            scryfall_uri: record.scryfall_uri.clone(),
            image_uris: record.image_uris.clone().map(Json),
            prices: Json(record.prices.clone()),
            legalities: Json(record.legalities.clone()),
            imported_on,
            last_updated_on,
        }
    }

    /// Reads a `cards` row
    ///
    /// # Errors
    ///
    /// Returns an error if a column is missing or has an unexpected type.
    pub fn from_row(row: &Row) -> Result<Self> {
        let get_err =
            |e: tokio_postgres::Error| CardSyncError::Database(format!("Invalid card row: {e}"));
        Ok(Self {
            id: row.try_get("id").map_err(get_err)?,
            scryfall_id: row.try_get("scryfall_id").map_err(get_err)?,
            oracle_id: row.try_get("oracle_id").map_err(get_err)?,
            name: row.try_get("name").map_err(get_err)?,
            lang: row.try_get("lang").map_err(get_err)?,
            layout: row.try_get("layout").map_err(get_err)?,
            mana_cost: row.try_get("mana_cost").map_err(get_err)?,
            cmc: row.try_get("cmc").map_err(get_err)?,
            type_line: row.try_get("type_line").map_err(get_err)?,
            oracle_text: row.try_get("oracle_text").map_err(get_err)?,
            power: row.try_get("power").map_err(get_err)?,
            toughness: row.try_get("toughness").map_err(get_err)?,
            loyalty: row.try_get("loyalty").map_err(get_err)?,
            defense: row.try_get("defense").map_err(get_err)?,
            colors: row.try_get("colors").map_err(get_err)?,
            color_identity: row.try_get("color_identity").map_err(get_err)?,
            keywords: row.try_get("keywords").map_err(get_err)?,
            produced_mana: row.try_get("produced_mana").map_err(get_err)?,
            reserved: row.try_get("reserved").map_err(get_err)?,
            edhrec_rank: row.try_get("edhrec_rank").map_err(get_err)?,
            penny_rank: row.try_get("penny_rank").map_err(get_err)?,
            rarity: row.try_get("rarity").map_err(get_err)?,
            set_code: row.try_get("set_code").map_err(get_err)?,
            set_name: row.try_get("set_name").map_err(get_err)?,
            released_at: row.try_get("released_at").map_err(get_err)?,
            artist: row.try_get("artist").map_err(get_err)?,
            uri: row.try_get("uri").map_err(get_err)?,
            scryfall_uri: row.try_get("scryfall_uri").map_err(get_err)?,
            image_uris: row.try_get("image_uris").map_err(get_err)?,
            prices: row.try_get("prices").map_err(get_err)?,
            legalities: row.try_get("legalities").map_err(get_err)?,
            imported_on: row.try_get("imported_on").map_err(get_err)?,
            last_updated_on: row.try_get("last_updated_on").map_err(get_err)?,
        })
    }

    /// Converts back to a domain card with the given children
    pub fn to_domain(self, card_faces: Vec<CardFace>, all_parts: Vec<RelatedCard>) -> StoredCard {
        StoredCard {
            id: CardId::from_uuid(self.id),
            imported_on: self.imported_on,
            last_updated_on: self.last_updated_on,
            record: CardRecord {
                scryfall_id: self.scryfall_id,
                oracle_id: self.oracle_id.map(OracleId::from_uuid),
                name: self.name,
                lang: self.lang,
                layout: self.layout,
                mana_cost: self.mana_cost,
                cmc: self.cmc,
                type_line: self.type_line,
                oracle_text: self.oracle_text,
                power: self.power,
                toughness: self.toughness,
                loyalty: self.loyalty,
                defense: self.defense,
                colors: self.colors,
                color_identity: self.color_identity,
                keywords: self.keywords,
                produced_mana: self.produced_mana,
                reserved: self.reserved,
                edhrec_rank: self.edhrec_rank,
                penny_rank: self.penny_rank,
                rarity: self.rarity,
                set_code: self.set_code,
                set_name: self.set_name,
                released_at: self.released_at,
                artist: self.artist,
                uri: self.uri,
                scryfall_uri: self.scryfall_uri,
                image_uris: self.image_uris.map(|j| j.0),
                prices: self.prices.0,
                legalities: self.legalities.0,
                card_faces,
                all_parts,
            },
        }
    }
}

/// Reads a key index row (`id`, `oracle_id`, `last_updated_on`)
///
/// # Errors
///
/// Returns an error if a column is missing or has an unexpected type.
pub fn key_index_entry(row: &Row) -> Result<(OracleId, ExistingCard)> {
    let get_err =
        |e: tokio_postgres::Error| CardSyncError::Database(format!("Invalid key index row: {e}"));
    let id: Uuid = row.try_get("id").map_err(get_err)?;
    let oracle_id: Uuid = row.try_get("oracle_id").map_err(get_err)?;
    let last_updated_on: DateTime<Utc> = row.try_get("last_updated_on").map_err(get_err)?;

    Ok((
        OracleId::from_uuid(oracle_id),
        ExistingCard {
            id: CardId::from_uuid(id),
            last_updated_on,
        },
    ))
}

/// Run row mapping to the `sync_runs` table
#[derive(Debug, Clone)]
pub struct PostgreSQLSyncRun {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: String,
    pub dataset_id: Option<String>,
    pub download_uri: Option<String>,
    pub source_updated_at: Option<DateTime<Utc>>,
    pub size_bytes: Option<i64>,
    pub total_in_source: i64,
    pub processed: i64,
    pub added: i64,
    pub updated: i64,
    pub skipped: i64,
    pub failed: i64,
    pub error_message: Option<String>,
}

impl PostgreSQLSyncRun {
    /// Converts a domain run, clipping text to the column lengths
    pub fn from_domain(run: &SyncRun) -> Self {
        use crate::core::state::run::truncate_message;

        Self {
            id: *run.id.as_uuid(),
            started_at: run.started_at,
            completed_at: run.completed_at,
            status: run.status.as_str().to_string(),
            dataset_id: run
                .dataset_id
                .as_deref()
                .map(|s| truncate_message(s, MAX_DATASET_ID_LENGTH)),
            download_uri: run
                .download_uri
                .as_deref()
                .map(|s| truncate_message(s, MAX_DOWNLOAD_URI_LENGTH)),
            source_updated_at: run.source_updated_at,
            size_bytes: run.size_bytes.map(to_db_count),
            total_in_source: to_db_count(run.counters.total_in_source),
            processed: to_db_count(run.counters.processed),
            added: to_db_count(run.counters.added),
            updated: to_db_count(run.counters.updated),
            skipped: to_db_count(run.counters.skipped),
            failed: to_db_count(run.counters.failed),
            error_message: run.error_message.clone(),
        }
    }

    /// Reads a `sync_runs` row
    ///
    /// # Errors
    ///
    /// Returns an error if a column is missing or has an unexpected type.
    pub fn from_row(row: &Row) -> Result<Self> {
        let get_err =
            |e: tokio_postgres::Error| CardSyncError::Database(format!("Invalid run row: {e}"));
        Ok(Self {
            id: row.try_get("id").map_err(get_err)?,
            started_at: row.try_get("started_at").map_err(get_err)?,
            completed_at: row.try_get("completed_at").map_err(get_err)?,
            status: row.try_get("status").map_err(get_err)?,
            dataset_id: row.try_get("dataset_id").map_err(get_err)?,
            download_uri: row.try_get("download_uri").map_err(get_err)?,
            source_updated_at: row.try_get("source_updated_at").map_err(get_err)?,
            size_bytes: row.try_get("size_bytes").map_err(get_err)?,
            total_in_source: row.try_get("total_in_source").map_err(get_err)?,
            processed: row.try_get("processed").map_err(get_err)?,
            added: row.try_get("added").map_err(get_err)?,
            updated: row.try_get("updated").map_err(get_err)?,
            skipped: row.try_get("skipped").map_err(get_err)?,
            failed: row.try_get("failed").map_err(get_err)?,
            error_message: row.try_get("error_message").map_err(get_err)?,
        })
    }

    /// Converts to the domain run
    ///
    /// # Errors
    ///
    /// Returns an error if the stored status is unknown.
    pub fn to_domain(self) -> Result<SyncRun> {
        let status: RunStatus = self
            .status
            .parse()
            .map_err(|e: String| CardSyncError::Database(e))?;

        Ok(SyncRun {
            id: RunId::from_uuid(self.id),
            started_at: self.started_at,
            completed_at: self.completed_at,
            status,
            dataset_id: self.dataset_id,
            download_uri: self.download_uri,
            source_updated_at: self.source_updated_at,
            size_bytes: self.size_bytes.map(from_db_count),
            counters: RunCounters {
                total_in_source: from_db_count(self.total_in_source),
                processed: from_db_count(self.processed),
                added: from_db_count(self.added),
                updated: from_db_count(self.updated),
                skipped: from_db_count(self.skipped),
                failed: from_db_count(self.failed),
            },
            error_message: self.error_message,
        })
    }
}

/// Reads a `sync_errors` row
///
/// # Errors
///
/// Returns an error if a column is missing or has an unexpected type.
pub fn sync_error_from_row(row: &Row) -> Result<SyncErrorEntry> {
    let get_err =
        |e: tokio_postgres::Error| CardSyncError::Database(format!("Invalid sync error row: {e}"));
    let run_id: Uuid = row.try_get("sync_run_id").map_err(get_err)?;

    Ok(SyncErrorEntry {
        run_id: RunId::from_uuid(run_id),
        oracle_id: row.try_get("oracle_id").map_err(get_err)?,
        card_name: row.try_get("card_name").map_err(get_err)?,
        message: row.try_get("error_message").map_err(get_err)?,
        occurred_at: row.try_get("occurred_at").map_err(get_err)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::card::fixtures::card;

    #[test]
    fn test_card_conversion_keeps_scalars() {
        let record = card(Some(Uuid::new_v4()), "Llanowar Elves");
        let id = CardId::new();
        let now = Utc::now();

        let row = PostgreSQLCard::from_domain(id, &record, now, now);
        assert_eq!(row.id, *id.as_uuid());
        assert_eq!(row.oracle_id, record.oracle_id.map(|k| *k.as_uuid()));

        let stored = row.to_domain(vec![], vec![]);
        assert_eq!(stored.id, id);
        assert_eq!(stored.record, record);
    }

    #[test]
    fn test_run_conversion_round_trips_status_and_counters() {
        let mut run = SyncRun::new();
        run.mark_downloading().unwrap();
        run.counters.total_in_source = 12;
        run.counters.processed = 10;
        run.counters.added = 7;
        run.counters.failed = 3;
        run.dataset_id = Some("x".repeat(150));

        let row = PostgreSQLSyncRun::from_domain(&run);
        assert_eq!(row.status, "Downloading");
        assert_eq!(row.dataset_id.as_ref().map(|s| s.len()), Some(100));

        let restored = row.to_domain().unwrap();
        assert_eq!(restored.status, RunStatus::Downloading);
        assert_eq!(restored.counters, run.counters);
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let mut row = PostgreSQLSyncRun::from_domain(&SyncRun::new());
        row.status = "Paused".to_string();
        assert!(row.to_domain().is_err());
    }

    #[test]
    fn test_count_conversion_saturates() {
        assert_eq!(to_db_count(u64::MAX), i64::MAX);
        assert_eq!(from_db_count(-1), 0);
        assert_eq!(from_db_count(42), 42);
    }
}
