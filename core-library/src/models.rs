//! Domain models for the local collection mirror
//!
//! Rows read back from storage derive `FromRow`; the `*Entry` and credit
//! types are the write-side shapes handed to the collection writers.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// =============================================================================
// User & Folders
// =============================================================================

/// The single local user whose collection is mirrored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub username: String,
    /// Personal access token, sent as the `token` query parameter upstream
    #[serde(skip_serializing)]
    pub token: String,
}

impl User {
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            token: token.into(),
        }
    }

    /// Validate user data
    pub fn validate(&self) -> Result<(), String> {
        if self.username.trim().is_empty() {
            return Err("Username cannot be empty".to_string());
        }

        if self.token.trim().is_empty() {
            return Err("Token cannot be empty".to_string());
        }

        Ok(())
    }
}

/// User-defined grouping of releases
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Folder {
    /// Upstream folder id (0 is the implicit "All" folder)
    pub id: i64,
    pub name: String,
    /// Item count as reported upstream
    pub item_count: i64,
    pub resource_url: String,
    /// Unix timestamp of the last sync that listed this folder
    pub last_synced: Option<i64>,
}

impl Folder {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            item_count: 0,
            resource_url: String::new(),
            last_synced: None,
        }
    }

    /// Validate folder data
    pub fn validate(&self) -> Result<(), String> {
        if self.id < 0 {
            return Err(format!("Folder id {} cannot be negative", self.id));
        }

        if self.name.trim().is_empty() {
            return Err("Folder name cannot be empty".to_string());
        }

        Ok(())
    }
}

// =============================================================================
// Releases
// =============================================================================

/// Release as stored locally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Release {
    /// Upstream release id (natural key)
    pub id: i64,
    pub instance_id: i64,
    pub folder_id: i64,
    pub rating: i64,
    pub title: String,
    pub year: Option<i32>,
    pub resource_url: String,
    pub thumb: String,
    pub cover_image: String,
    /// Total playback time in seconds, unset until backfilled
    pub play_duration: Option<i64>,
    /// True when `play_duration` was estimated from format metadata
    pub play_duration_estimated: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Mutable release fields supplied by a collection page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseEntry {
    pub id: i64,
    pub instance_id: i64,
    pub folder_id: i64,
    pub rating: i64,
    pub title: String,
    /// Upstream reports an unknown year as 0; store it as unset
    pub year: Option<i32>,
    pub resource_url: String,
    pub thumb: String,
    pub cover_image: String,
}

impl ReleaseEntry {
    /// Validate release data
    pub fn validate(&self) -> Result<(), String> {
        if self.id <= 0 {
            return Err(format!("Release id {} must be positive", self.id));
        }

        if self.folder_id < 0 {
            return Err(format!("Folder id {} cannot be negative", self.folder_id));
        }

        Ok(())
    }
}

/// Artist credited on a release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistCredit {
    pub artist_id: i64,
    pub name: String,
    pub resource_url: String,
    pub join_relation: String,
    pub anv: String,
    pub tracks: String,
    pub role: String,
}

/// Label credited on a release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelCredit {
    pub label_id: i64,
    pub name: String,
    pub resource_url: String,
    pub entity_type: String,
    pub catno: String,
}

/// Physical format of a release, e.g. `2 x Vinyl, LP, 12"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Format {
    pub name: String,
    pub qty: i64,
    pub descriptions: Vec<String>,
}

impl Format {
    pub fn new(name: impl Into<String>, qty: i64) -> Self {
        Self {
            name: name.into(),
            qty,
            descriptions: Vec::new(),
        }
    }

    pub fn with_descriptions<I, S>(mut self, descriptions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.descriptions = descriptions.into_iter().map(Into::into).collect();
        self
    }
}

/// Free-form collection note attached to a release instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Note {
    pub field_id: i64,
    pub value: String,
}

/// Single tracklist entry of a release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Track {
    pub release_id: i64,
    /// Side/position label such as `A1`; unique per release
    pub position: String,
    pub title: String,
    /// Duration as published upstream (`3:45`, `1:02:03`, or empty)
    pub duration_text: String,
    /// Parsed duration, 0 when the text was missing or unusable
    pub duration_seconds: i64,
}
