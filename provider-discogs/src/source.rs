//! The seam between the sync engine and the upstream catalog

use crate::error::Result;
use crate::types::{CollectionPage, FolderResource, Identity, ReleaseDetails};
use async_trait::async_trait;
use std::fmt;

/// Who the requests are made for
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub token: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            token: token.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Read-only access to a user's upstream collection
///
/// Implementations perform one logical fetch per call; pagination is walked
/// by the caller.
#[async_trait]
pub trait CollectionSource: Send + Sync {
    /// Resolve the username that owns `token`
    async fn fetch_identity(&self, token: &str) -> Result<Identity>;

    async fn fetch_folders(&self, credentials: &Credentials) -> Result<Vec<FolderResource>>;

    /// Fetch one page (1-based) of a folder's releases
    async fn fetch_page(
        &self,
        credentials: &Credentials,
        folder_id: i64,
        page: u32,
        per_page: u32,
    ) -> Result<CollectionPage>;

    /// Fetch the detail resource of a release, including its tracklist
    async fn fetch_release_details(
        &self,
        credentials: &Credentials,
        resource_url: &str,
    ) -> Result<ReleaseDetails>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_hides_token() {
        let credentials = Credentials::new("crate_digger", "s3cret");
        let debug = format!("{:?}", credentials);
        assert!(debug.contains("crate_digger"));
        assert!(!debug.contains("s3cret"));
    }
}
