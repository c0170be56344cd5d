// Catalogue store: the read-only creature catalogue every connection serves.
//
// Loaded once at startup from a JSON document (`pokedex.json` by default).
// When the document is missing, a `CatalogueFetcher` may supply the data; the
// result is written back pretty-printed to the same path so the next start
// reads it from disk. Fetching from the upstream API is not part of this
// crate. `BundledSample` is the only fetcher shipped here and serves the small
// catalogue embedded from `data/sample_pokedex.json`.
//
// After loading, the catalogue is validated (unique type ids) and encoded to
// JSON once. `CatalogueStore` is immutable and is shared across connection
// threads behind an `Arc` with no locking; every client receives the same
// encoded bytes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pokeparty_protocol::Catalogue;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum CatalogueError {
    #[error("catalogue document {0} does not exist and no fetcher is configured")]
    Missing(PathBuf),

    #[error("failed to read catalogue document {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse catalogue document {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to write fetched catalogue to {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("catalogue fetch failed: {0}")]
    Fetch(String),

    #[error("type id {0} appears on more than one group")]
    DuplicateId(u32),

    #[error("failed to encode catalogue: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Source of catalogue data for when the local document is missing.
pub trait CatalogueFetcher {
    fn fetch(&self) -> Result<Catalogue, CatalogueError>;
}

/// Serves the sample catalogue compiled into the binary.
pub struct BundledSample;

const SAMPLE_JSON: &str = include_str!("../../data/sample_pokedex.json");

impl CatalogueFetcher for BundledSample {
    fn fetch(&self) -> Result<Catalogue, CatalogueError> {
        serde_json::from_str(SAMPLE_JSON).map_err(|source| CatalogueError::Parse {
            path: PathBuf::from("<bundled sample>"),
            source,
        })
    }
}

/// Immutable catalogue plus its wire encoding.
#[derive(Debug)]
pub struct CatalogueStore {
    catalogue: Catalogue,
    encoded: Arc<[u8]>,
}

impl CatalogueStore {
    /// Validate `catalogue` and encode it for delivery.
    pub fn new(catalogue: Catalogue) -> Result<Self, CatalogueError> {
        if let Some(id) = catalogue.first_duplicate_id() {
            return Err(CatalogueError::DuplicateId(id));
        }
        if catalogue.is_empty() {
            warn!("catalogue has no type groups; clients will have nothing to pick");
        }
        let encoded = serde_json::to_vec(&catalogue)?.into();
        Ok(Self { catalogue, encoded })
    }

    /// Load the document at `path`. A missing file is `CatalogueError::Missing`.
    pub fn load(path: &Path) -> Result<Self, CatalogueError> {
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CatalogueError::Missing(path.to_path_buf()));
            }
            Err(source) => {
                return Err(CatalogueError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let catalogue: Catalogue =
            serde_json::from_str(&data).map_err(|source| CatalogueError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        info!(
            path = %path.display(),
            types = catalogue.type_count(),
            "catalogue loaded"
        );
        Self::new(catalogue)
    }

    /// Load `path`, or, if it does not exist and `fetcher` is given, fetch the
    /// catalogue, write it to `path`, and serve the fetched data.
    pub fn load_or_fetch(
        path: &Path,
        fetcher: Option<&dyn CatalogueFetcher>,
    ) -> Result<Self, CatalogueError> {
        match (Self::load(path), fetcher) {
            (Err(CatalogueError::Missing(_)), Some(fetcher)) => {
                info!(path = %path.display(), "catalogue document missing, fetching");
                let catalogue = fetcher.fetch()?;
                let pretty = serde_json::to_string_pretty(&catalogue)?;
                std::fs::write(path, pretty).map_err(|source| CatalogueError::Write {
                    path: path.to_path_buf(),
                    source,
                })?;
                info!(path = %path.display(), types = catalogue.type_count(), "catalogue saved");
                Self::new(catalogue)
            }
            (result, _) => result,
        }
    }

    pub fn catalogue(&self) -> &Catalogue {
        &self.catalogue
    }

    /// The catalogue as the JSON bytes sent in the catalogue frame.
    pub fn encoded(&self) -> &[u8] {
        &self.encoded
    }
}
