use std::{
    fmt,
    path::{Path, PathBuf},
};

use rusqlite::{params, Connection, OpenFlags};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CardDbError {
    #[error("failed to open card database `{path}`: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error("card database query failed: {0}")]
    Query(#[from] rusqlite::Error),
    #[error("unknown card id {0}")]
    UnknownCard(u32),
    #[error("card {mtga_id} has rarity index {index}, but only {known} rarities are known")]
    UnknownRarity {
        mtga_id: u32,
        index: i64,
        known: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Card {
    pub mtga_id: u32,
    pub name: String,
    pub rarity: String,
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.rarity)
    }
}

/// Resolves client card ids.
pub trait CardLookup: Send {
    fn lookup_card(&self, mtga_id: u32) -> Result<Card, CardDbError>;
}

/// Read-only view of the card database.
///
/// Expects `cards(mtga_id, name, card_rarity)`, where `card_rarity` indexes
/// the rows of `rarity(rarity_name)`, and `types(type_name)`. Both
/// vocabularies are loaded once when the database is opened.
pub struct CardDatabase {
    conn: Connection,
    rarities: Vec<String>,
    types: Vec<String>,
}

impl CardDatabase {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CardDbError> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|source| CardDbError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        let db = Self::from_connection(conn)?;
        debug!(
            path = %path.display(),
            rarities = db.rarities.len(),
            types = db.types.len(),
            "opened card database"
        );
        Ok(db)
    }

    pub fn from_connection(conn: Connection) -> Result<Self, CardDbError> {
        let rarities = column(&conn, "SELECT rarity_name FROM rarity ORDER BY rowid")?;
        let types = column(&conn, "SELECT type_name FROM types ORDER BY rowid")?;
        Ok(Self {
            conn,
            rarities,
            types,
        })
    }

    pub fn rarities(&self) -> &[String] {
        &self.rarities
    }

    pub fn types(&self) -> &[String] {
        &self.types
    }
}

impl CardLookup for CardDatabase {
    fn lookup_card(&self, mtga_id: u32) -> Result<Card, CardDbError> {
        let result = self.conn.query_row(
            "SELECT name, card_rarity FROM cards WHERE mtga_id = ?1",
            params![mtga_id],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        );
        let (name, index) = match result {
            Ok(row) => row,
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                return Err(CardDbError::UnknownCard(mtga_id))
            }
            Err(err) => return Err(err.into()),
        };

        let rarity = usize::try_from(index)
            .ok()
            .and_then(|index| self.rarities.get(index))
            .ok_or(CardDbError::UnknownRarity {
                mtga_id,
                index,
                known: self.rarities.len(),
            })?;

        Ok(Card {
            mtga_id,
            name,
            rarity: rarity.clone(),
        })
    }
}

fn column(conn: &Connection, sql: &str) -> Result<Vec<String>, CardDbError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut values = Vec::new();
    for row in rows {
        values.push(row?);
    }
    Ok(values)
}
