//! Card domain model
//!
//! [`CardRecord`] is one element of the Scryfall bulk `oracle_cards` array as
//! it arrives on the wire. The storage-facing types wrap it with the internal
//! identity and bookkeeping timestamps.

use crate::domain::ids::{CardId, OracleId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A source record decoded from the bulk dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardRecord {
    /// Scryfall's id for the specific printing in the dataset
    #[serde(rename = "id")]
    pub scryfall_id: Uuid,

    /// External key; absent for a few token-like objects
    #[serde(default)]
    pub oracle_id: Option<OracleId>,

    #[serde(default)]
    pub name: String,

    #[serde(default = "default_lang")]
    pub lang: String,

    #[serde(default)]
    pub layout: String,

    #[serde(default)]
    pub mana_cost: Option<String>,

    /// Mana value
    #[serde(default)]
    pub cmc: f64,

    #[serde(default)]
    pub type_line: Option<String>,

    #[serde(default)]
    pub oracle_text: Option<String>,

    #[serde(default)]
    pub power: Option<String>,

    #[serde(default)]
    pub toughness: Option<String>,

    #[serde(default)]
    pub loyalty: Option<String>,

    #[serde(default)]
    pub defense: Option<String>,

    #[serde(default)]
    pub colors: Vec<String>,

    #[serde(default)]
    pub color_identity: Vec<String>,

    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default)]
    pub produced_mana: Option<Vec<String>>,

    #[serde(default)]
    pub reserved: bool,

    #[serde(default)]
    pub edhrec_rank: Option<i32>,

    #[serde(default)]
    pub penny_rank: Option<i32>,

    #[serde(default)]
    pub rarity: String,

    #[serde(rename = "set", default)]
    pub set_code: String,

    #[serde(default)]
    pub set_name: String,

    #[serde(default)]
    pub released_at: Option<NaiveDate>,

    #[serde(default)]
    pub artist: Option<String>,

    #[serde(default)]
    pub uri: Option<String>,

    #[serde(default)]
    pub scryfall_uri: Option<String>,

    #[serde(default)]
    pub image_uris: Option<ImageUris>,

    #[serde(default)]
    pub prices: Prices,

    #[serde(default)]
    pub legalities: Legalities,

    /// Alternate faces, replaced wholesale on update
    #[serde(default)]
    pub card_faces: Vec<CardFace>,

    /// Related entries (tokens, meld parts, combo pieces), replaced wholesale on update
    #[serde(default)]
    pub all_parts: Vec<RelatedCard>,
}

impl CardRecord {
    /// Checks the record-level rules that decoding alone cannot express
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err(format!("card {} has no name", self.scryfall_id));
        }

        if !self.cmc.is_finite() || self.cmc < 0.0 {
            return Err(format!(
                "card '{}' has an invalid mana value: {}",
                self.name, self.cmc
            ));
        }

        if let Some(face) = self
            .card_faces
            .iter()
            .find(|f| f.cmc.is_some_and(|cmc| !cmc.is_finite() || cmc < 0.0))
        {
            return Err(format!(
                "face '{}' of card '{}' has an invalid mana value",
                face.name, self.name
            ));
        }

        self.check_storage_limits()
    }

    /// Checks that the record fits the card tables: bounded columns within
    /// their width and no NUL character in any text value
    pub fn check_storage_limits(&self) -> Result<(), String> {
        let bounded = [
            ("lang", Some(self.lang.as_str()), limits::LANG),
            ("layout", Some(self.layout.as_str()), limits::LAYOUT),
            ("power", self.power.as_deref(), limits::STAT),
            ("toughness", self.toughness.as_deref(), limits::STAT),
            ("loyalty", self.loyalty.as_deref(), limits::STAT),
            ("defense", self.defense.as_deref(), limits::STAT),
            ("rarity", Some(self.rarity.as_str()), limits::RARITY),
            ("set", Some(self.set_code.as_str()), limits::SET_CODE),
        ];
        for (field, value, max) in bounded {
            check_width(&self.name, field, value, max)?;
        }

        for face in &self.card_faces {
            let bounded = [
                ("face power", face.power.as_deref()),
                ("face toughness", face.toughness.as_deref()),
                ("face loyalty", face.loyalty.as_deref()),
                ("face defense", face.defense.as_deref()),
            ];
            for (field, value) in bounded {
                check_width(&self.name, field, value, limits::STAT)?;
            }
        }

        for part in &self.all_parts {
            check_width(
                &self.name,
                "related component",
                Some(part.component.as_str()),
                limits::COMPONENT,
            )?;
        }

        let value = serde_json::to_value(self)
            .map_err(|e| format!("card '{}' cannot be encoded: {e}", self.name))?;
        if contains_nul(&value) {
            return Err(format!("card '{}' contains a NUL character", self.name));
        }

        Ok(())
    }
}

/// Widths, in characters, of the bounded card columns
pub mod limits {
    pub const LANG: usize = 10;
    pub const LAYOUT: usize = 50;
    /// power, toughness, loyalty and defense, on cards and faces
    pub const STAT: usize = 20;
    pub const RARITY: usize = 20;
    pub const SET_CODE: usize = 10;
    pub const COMPONENT: usize = 50;
}

fn check_width(card: &str, field: &str, value: Option<&str>, max: usize) -> Result<(), String> {
    match value.map(|v| v.chars().count()) {
        Some(len) if len > max => Err(format!(
            "card '{card}': {field} is {len} characters, the column holds {max}"
        )),
        _ => Ok(()),
    }
}

fn contains_nul(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::String(s) => s.contains('\0'),
        serde_json::Value::Array(items) => items.iter().any(contains_nul),
        serde_json::Value::Object(map) => map
            .iter()
            .any(|(key, v)| key.contains('\0') || contains_nul(v)),
        _ => false,
    }
}

fn default_lang() -> String {
    "en".to_string()
}

/// Image locations for a card or face
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUris {
    #[serde(default)]
    pub small: Option<String>,
    #[serde(default)]
    pub normal: Option<String>,
    #[serde(default)]
    pub large: Option<String>,
    #[serde(default)]
    pub png: Option<String>,
    #[serde(default)]
    pub art_crop: Option<String>,
    #[serde(default)]
    pub border_crop: Option<String>,
}

/// Price figures as published (decimal strings, absent when unknown)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prices {
    #[serde(default)]
    pub usd: Option<String>,
    #[serde(default)]
    pub usd_foil: Option<String>,
    #[serde(default)]
    pub usd_etched: Option<String>,
    #[serde(default)]
    pub eur: Option<String>,
    #[serde(default)]
    pub eur_foil: Option<String>,
    #[serde(default)]
    pub eur_etched: Option<String>,
    #[serde(default)]
    pub tix: Option<String>,
}

/// Legality of a card in one play format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Legality {
    Legal,
    NotLegal,
    Restricted,
    Banned,
    #[serde(other)]
    Unknown,
}

/// Per-format legality flags keyed by format name (`standard`, `commander`, ...)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Legalities(pub BTreeMap<String, Legality>);

impl Legalities {
    /// Legality in a format; formats missing from the source are not legal
    pub fn get(&self, format: &str) -> Legality {
        self.0.get(format).copied().unwrap_or(Legality::NotLegal)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One face of a multi-faced card
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardFace {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mana_cost: Option<String>,
    #[serde(default)]
    pub type_line: Option<String>,
    #[serde(default)]
    pub oracle_text: Option<String>,
    #[serde(default)]
    pub colors: Option<Vec<String>>,
    #[serde(default)]
    pub power: Option<String>,
    #[serde(default)]
    pub toughness: Option<String>,
    #[serde(default)]
    pub loyalty: Option<String>,
    #[serde(default)]
    pub defense: Option<String>,
    #[serde(default)]
    pub flavor_text: Option<String>,
    #[serde(default)]
    pub image_uris: Option<ImageUris>,
    #[serde(default)]
    pub cmc: Option<f64>,
    #[serde(default)]
    pub oracle_id: Option<OracleId>,
    #[serde(default)]
    pub artist: Option<String>,
}

/// Reference to a related entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedCard {
    #[serde(rename = "id")]
    pub scryfall_id: Uuid,
    #[serde(default)]
    pub component: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub type_line: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
}

/// What the diff index holds for a card already in storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExistingCard {
    pub id: CardId,
    pub last_updated_on: DateTime<Utc>,
}

/// A record classified as new, with its freshly assigned identity
#[derive(Debug, Clone, PartialEq)]
pub struct NewCard {
    pub id: CardId,
    pub imported_on: DateTime<Utc>,
    pub record: CardRecord,
}

impl NewCard {
    pub fn from_record(record: CardRecord) -> Self {
        Self {
            id: CardId::new(),
            imported_on: Utc::now(),
            record,
        }
    }
}

/// A record classified as changed, targeting an existing identity
#[derive(Debug, Clone, PartialEq)]
pub struct CardUpdate {
    pub id: CardId,
    pub updated_on: DateTime<Utc>,
    pub record: CardRecord,
}

impl CardUpdate {
    pub fn new(id: CardId, record: CardRecord) -> Self {
        Self {
            id,
            updated_on: Utc::now(),
            record,
        }
    }
}

/// A card as held in storage
#[derive(Debug, Clone, PartialEq)]
pub struct StoredCard {
    pub id: CardId,
    pub imported_on: DateTime<Utc>,
    pub last_updated_on: DateTime<Utc>,
    pub record: CardRecord,
}

impl StoredCard {
    pub fn from_new(card: NewCard) -> Self {
        Self {
            id: card.id,
            imported_on: card.imported_on,
            last_updated_on: card.imported_on,
            record: card.record,
        }
    }

    /// Applies scalar updates and replaces the child collections.
    ///
    /// A blank incoming type line keeps the stored one; the internal identity
    /// and `imported_on` never change.
    pub fn apply_update(&mut self, update: &CardUpdate) {
        let previous_type_line = self.record.type_line.take();
        self.record = update.record.clone();
        if self
            .record
            .type_line
            .as_deref()
            .map_or(true, |t| t.trim().is_empty())
        {
            self.record.type_line = previous_type_line;
        }
        self.last_updated_on = update.updated_on;
    }

    pub fn existing(&self) -> ExistingCard {
        ExistingCard {
            id: self.id,
            last_updated_on: self.last_updated_on,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::card;
    use super::*;

    const SAMPLE: &str = r#"{
        "object": "card",
        "id": "86bf43b1-8d4e-4759-bb2d-0b2e03ba7012",
        "oracle_id": "0004ebd0-dfd6-4276-b4a6-de0003e94237",
        "name": "Static Orb",
        "lang": "en",
        "layout": "normal",
        "mana_cost": "{3}",
        "cmc": 3.0,
        "type_line": "Artifact",
        "oracle_text": "As long as Static Orb is untapped, players can't untap more than two permanents during their untap steps.",
        "colors": [],
        "color_identity": [],
        "keywords": [],
        "legalities": {"vintage": "legal", "commander": "banned", "future": "something_new"},
        "reserved": true,
        "set": "7ed",
        "set_name": "Seventh Edition",
        "released_at": "2001-04-11",
        "rarity": "rare",
        "prices": {"usd": "15.93", "eur": null, "tix": "0.23"},
        "image_uris": {"small": "https://cards.scryfall.io/small/front/8/6/86bf.jpg"},
        "all_parts": [{"object": "related_card", "id": "2d6c6b5e-5f0e-4b0c-9d1e-1a2b3c4d5e6f", "component": "combo_piece", "name": "Static Orb", "type_line": "Artifact", "uri": "https://api.scryfall.com/cards/2d6c"}]
    }"#;

    #[test]
    fn test_decode_full_record() {
        let record: CardRecord = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(record.name, "Static Orb");
        assert_eq!(record.set_code, "7ed");
        assert!(record.reserved);
        assert_eq!(record.prices.usd.as_deref(), Some("15.93"));
        assert_eq!(record.prices.eur, None);
        assert_eq!(record.legalities.get("vintage"), Legality::Legal);
        assert_eq!(record.legalities.get("commander"), Legality::Banned);
        assert_eq!(record.legalities.get("future"), Legality::Unknown);
        assert_eq!(record.legalities.get("pauper"), Legality::NotLegal);
        assert_eq!(record.all_parts.len(), 1);
        assert_eq!(
            record.released_at,
            NaiveDate::from_ymd_opt(2001, 4, 11)
        );
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_decode_requires_source_id() {
        let result = serde_json::from_str::<CardRecord>(r#"{"name": "No Id"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_rejects_wrong_types() {
        let json = r#"{"id": "86bf43b1-8d4e-4759-bb2d-0b2e03ba7012", "name": "X", "cmc": "three"}"#;
        assert!(serde_json::from_str::<CardRecord>(json).is_err());
    }

    #[test]
    fn test_validate_blank_name() {
        let record = card(None, "   ");
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_validate_negative_cmc() {
        let mut record = card(None, "Broken");
        record.cmc = -1.0;
        assert!(record.validate().is_err());

        record.cmc = f64::NAN;
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_values_wider_than_their_column() {
        let mut record = card(None, "Oversized");
        record.set_code = "abcdefghijklmno".to_string();
        let err = record.validate().unwrap_err();
        assert!(err.contains("set is 15 characters"));

        let mut record = card(None, "Oversized");
        record.lang = "x".repeat(limits::LANG + 1);
        assert!(record.validate().is_err());

        let mut record = card(None, "Oversized");
        record.card_faces = vec![CardFace {
            name: "Front".to_string(),
            toughness: Some("9".repeat(limits::STAT + 1)),
            ..Default::default()
        }];
        assert!(record.validate().is_err());

        let mut record = card(None, "Oversized");
        record.all_parts = vec![RelatedCard {
            scryfall_id: Uuid::new_v4(),
            component: "c".repeat(limits::COMPONENT + 1),
            name: "Token".to_string(),
            type_line: None,
            uri: None,
        }];
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_validate_counts_characters_not_bytes() {
        let mut record = card(None, "Wide Glyphs");
        record.set_code = "\u{00e9}".repeat(limits::SET_CODE);
        assert!(record.set_code.len() > limits::SET_CODE);
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_nul_anywhere() {
        let mut record = card(None, "Null Rod");
        record.oracle_text = Some("Artifacts\0 abilities can't be activated.".to_string());
        assert!(record.validate().unwrap_err().contains("NUL"));

        let mut record = card(None, "Null Rod");
        record.card_faces = vec![CardFace {
            name: "Front".to_string(),
            flavor_text: Some("\0".to_string()),
            ..Default::default()
        }];
        assert!(record.validate().is_err());

        let mut record = card(None, "Null Rod");
        record.prices.usd = Some("1.00\0".to_string());
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_apply_update_replaces_children_and_keeps_identity() {
        let oracle = Uuid::new_v4();
        let mut original = card(Some(oracle), "Delver of Secrets");
        original.card_faces = vec![
            CardFace {
                name: "Delver of Secrets".to_string(),
                ..Default::default()
            },
            CardFace {
                name: "Insectile Aberration".to_string(),
                ..Default::default()
            },
        ];
        let mut stored = StoredCard::from_new(NewCard::from_record(original));
        let id = stored.id;
        let imported_on = stored.imported_on;

        let mut incoming = card(Some(oracle), "Delver of Secrets");
        incoming.type_line = Some(String::new());
        incoming.oracle_text = Some("Updated text".to_string());
        let update = CardUpdate::new(id, incoming);

        stored.apply_update(&update);

        assert_eq!(stored.id, id);
        assert_eq!(stored.imported_on, imported_on);
        assert!(stored.record.card_faces.is_empty());
        assert_eq!(stored.record.oracle_text.as_deref(), Some("Updated text"));
        assert_eq!(stored.record.type_line.as_deref(), Some("Creature - Elf"));
        assert_eq!(stored.last_updated_on, update.updated_on);
    }
}
