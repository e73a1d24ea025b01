//! Record, digest and plaintext secret types shared by client and server.

use crate::crypto::content_hash;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed set of secret kinds, each with its own plaintext schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Credential,
    Card,
    Text,
    Binary,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Credential => "credential",
            Self::Card => "card",
            Self::Text => "text",
            Self::Binary => "binary",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "credential" => Some(Self::Credential),
            "card" => Some(Self::Card),
            "text" => Some(Self::Text),
            "binary" => Some(Self::Binary),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for RecordKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for RecordKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        Self::parse(s).ok_or_else(|| FromSqlError::Other(format!("unknown record kind: {}", s).into()))
    }
}

/// A secret item as stored and exchanged. `content` is always ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: Uuid,
    /// Cleared on deletion so the name can be reused.
    pub name: Option<String>,
    pub kind: RecordKind,
    #[serde(with = "base64_opt", default)]
    pub content: Option<Vec<u8>>,
    /// Unix milliseconds of the last mutation.
    pub updated_at: i64,
    #[serde(default)]
    pub deleted: bool,
}

/// Column list understood by [`Record::from_row`].
pub const RECORD_COLUMNS: &str = "id, name, kind, content, updated_at, deleted";

impl Record {
    /// Build a record from a row selected with [`RECORD_COLUMNS`].
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let id: String = row.get(0)?;
        let id = Uuid::parse_str(&id).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(Self {
            id,
            name: row.get(1)?,
            kind: row.get(2)?,
            content: row.get(3)?,
            updated_at: row.get(4)?,
            deleted: row.get(5)?,
        })
    }

    pub fn digest(&self) -> SyncDigest {
        SyncDigest {
            id: self.id,
            content_hash: content_hash(self.content.as_deref()),
            updated_at: self.updated_at,
            deleted: self.deleted,
        }
    }
}

/// Cheap projection of a record used during reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncDigest {
    pub id: Uuid,
    pub content_hash: String,
    pub updated_at: i64,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSummary {
    pub name: String,
    pub kind: RecordKind,
}

/// Login/password pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSecret {
    pub login: String,
    pub password: String,
    #[serde(default)]
    pub meta: String,
}

/// Bank card details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSecret {
    pub number: String,
    pub expires: String,
    pub name: String,
    pub surname: String,
    pub cvv: String,
    #[serde(default)]
    pub meta: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSecret {
    pub text: String,
    #[serde(default)]
    pub meta: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinarySecret {
    #[serde(with = "base64_bytes")]
    pub blob: Vec<u8>,
    #[serde(default)]
    pub meta: String,
}

/// Decrypted secret payload, tagged by its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Secret {
    Credential(CredentialSecret),
    Card(CardSecret),
    Text(TextSecret),
    Binary(BinarySecret),
}

impl Secret {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Credential(_) => RecordKind::Credential,
            Self::Card(_) => RecordKind::Card,
            Self::Text(_) => RecordKind::Text,
            Self::Binary(_) => RecordKind::Binary,
        }
    }

    /// Serialize the plaintext schema for encryption.
    pub fn to_plaintext(&self) -> serde_json::Result<Vec<u8>> {
        match self {
            Self::Credential(s) => serde_json::to_vec(s),
            Self::Card(s) => serde_json::to_vec(s),
            Self::Text(s) => serde_json::to_vec(s),
            Self::Binary(s) => serde_json::to_vec(s),
        }
    }

    pub fn from_plaintext(kind: RecordKind, plaintext: &[u8]) -> serde_json::Result<Self> {
        Ok(match kind {
            RecordKind::Credential => Self::Credential(serde_json::from_slice(plaintext)?),
            RecordKind::Card => Self::Card(serde_json::from_slice(plaintext)?),
            RecordKind::Text => Self::Text(serde_json::from_slice(plaintext)?),
            RecordKind::Binary => Self::Binary(serde_json::from_slice(plaintext)?),
        })
    }
}

/// Current wall-clock time in unix milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

pub(crate) mod base64_opt {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => s.serialize_some(&STANDARD.encode(b)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|s| STANDARD.decode(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
