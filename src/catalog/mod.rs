mod models;
mod spotify;
mod trait_def;

pub use models::{AudioFeatures, CatalogArtist, CatalogTrack, ExternalUrls};
pub use spotify::{track_id, CatalogError, SpotifyClient};
pub use trait_def::CatalogClient;
#[cfg(feature = "mock")]
pub use trait_def::MockCatalogClient;
