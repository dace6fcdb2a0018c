//! Discogs API response types
//!
//! Optional or occasionally omitted fields default instead of failing the
//! whole page.

use serde::{Deserialize, Serialize};

/// `GET /users/{user}/collection/folders`
#[derive(Debug, Clone, Deserialize)]
pub struct FoldersResponse {
    #[serde(default)]
    pub folders: Vec<FolderResource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderResource {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub count: i64,
    #[serde(default)]
    pub resource_url: String,
}

/// `GET /users/{user}/collection/folders/{id}/releases`
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionPage {
    pub pagination: Pagination,
    #[serde(default)]
    pub releases: Vec<CollectionRelease>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub pages: u32,
    #[serde(default)]
    pub per_page: u32,
    /// Total items across all pages
    #[serde(default)]
    pub items: u32,
}

/// One collection instance of a release
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionRelease {
    pub id: i64,
    #[serde(default)]
    pub instance_id: i64,
    #[serde(default)]
    pub folder_id: i64,
    #[serde(default)]
    pub rating: i64,
    pub basic_information: BasicInformation,
    #[serde(default)]
    pub notes: Vec<NoteResource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BasicInformation {
    #[serde(default)]
    pub title: String,
    /// 0 when unknown
    #[serde(default)]
    pub year: i32,
    #[serde(default)]
    pub resource_url: String,
    #[serde(default)]
    pub thumb: String,
    #[serde(default)]
    pub cover_image: String,
    #[serde(default)]
    pub formats: Vec<FormatResource>,
    #[serde(default)]
    pub labels: Vec<LabelResource>,
    #[serde(default)]
    pub artists: Vec<ArtistResource>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub styles: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormatResource {
    pub name: String,
    /// Quantity as a decimal string, e.g. `"2"`
    #[serde(default)]
    pub qty: String,
    #[serde(default)]
    pub descriptions: Vec<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabelResource {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub catno: String,
    #[serde(default)]
    pub resource_url: String,
    #[serde(default)]
    pub entity_type: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArtistResource {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub anv: String,
    #[serde(default)]
    pub join: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub tracks: String,
    #[serde(default)]
    pub resource_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NoteResource {
    pub field_id: i64,
    #[serde(default)]
    pub value: String,
}

/// `GET {release.resource_url}`, reduced to what the duration backfill reads
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseDetails {
    pub id: i64,
    #[serde(default)]
    pub tracklist: Vec<TracklistEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TracklistEntry {
    /// `track`, `heading` or `index`
    #[serde(rename = "type_", alias = "type", default)]
    pub entry_type: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub duration: String,
}

impl TracklistEntry {
    /// Headings and index entries carry no playable audio
    pub fn is_track(&self) -> bool {
        self.entry_type.is_empty() || self.entry_type.eq_ignore_ascii_case("track")
    }
}

/// `GET /oauth/identity`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub resource_url: String,
}
