//! Collection mirror workspace crate.
//!
//! Re-exports the pieces a host needs to run the mirror without wiring each
//! workspace crate individually. The service façade is available with the
//! default `desktop-shims` feature, which brings in the reqwest HTTP client.

pub use core_runtime::config::{CoreConfig, DiscogsApiConfig, SyncSettings};
pub use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};

#[cfg(feature = "desktop-shims")]
pub use core_service::{
    CollectionView, CoreError, CoreService, Page, PageRequest, ReqwestHttpClient, SyncStatusView,
};
