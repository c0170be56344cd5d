// Roster persistence: where a connection's final selection ends up.
//
// `RosterSink` is the seam between the connection handler and storage.
// `FileRosterStore` is the production sink: one `<key>.json` document per
// user in a configured directory, where the key is the display name with
// every `\r` and `\n` removed. A resubmission for the same key replaces the
// previous document.
//
// Each write goes to a temporary file in the target directory that is then
// renamed over `<key>.json`. Concurrent writers for one key therefore end
// with one complete document (last rename wins), never an interleaving.
//
// Keys that would escape the directory or name nothing (`""`, `.`, `..`, or
// anything containing a path separator) are refused.

use std::io::Write;
use std::path::{Path, PathBuf};

use pokeparty_protocol::RosterSelection;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("display name {0:?} cannot be used as a roster file name")]
    InvalidKey(String),

    #[error("failed to encode roster: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to write roster file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Destination for validated roster selections.
pub trait RosterSink: Send + Sync {
    /// Persist `selection`, returning where it was stored.
    fn persist(&self, selection: &RosterSelection) -> Result<PathBuf, PersistenceError>;
}

/// Strip carriage returns and line feeds from a display name.
pub fn sanitize_user_key(name: &str) -> String {
    name.chars().filter(|c| !matches!(c, '\r' | '\n')).collect()
}

/// Writes each roster to `<dir>/<sanitized name>.json`.
#[derive(Debug, Clone)]
pub struct FileRosterStore {
    dir: PathBuf,
}

impl FileRosterStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The file a roster for `name` is written to.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, PersistenceError> {
        let key = sanitize_user_key(name);
        let unusable = key.is_empty()
            || key == "."
            || key == ".."
            || key.contains(['/', '\\'])
            || key.contains('\0');
        if unusable {
            return Err(PersistenceError::InvalidKey(name.to_owned()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    /// Read back the roster stored for `name`, if any.
    pub fn load(&self, name: &str) -> Result<Option<RosterSelection>, PersistenceError> {
        let path = self.path_for(name)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(PersistenceError::Io { path, source }),
        }
    }
}

impl RosterSink for FileRosterStore {
    fn persist(&self, selection: &RosterSelection) -> Result<PathBuf, PersistenceError> {
        let path = self.path_for(&selection.name)?;
        let json = serde_json::to_vec(selection)?;

        let io_err = |source| PersistenceError::Io {
            path: path.clone(),
            source,
        };
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        tmp.write_all(&json).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&path).map_err(|e| io_err(e.error))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use pokeparty_protocol::CreatureDetail;
    use tempfile::TempDir;

    use super::*;

    fn selection(name: &str, picks: &[&str]) -> RosterSelection {
        RosterSelection {
            name: name.into(),
            type_name: "fire".into(),
            selected: picks
                .iter()
                .map(|p| CreatureDetail {
                    name: (*p).into(),
                    url: String::new(),
                    stats: vec![],
                    types: vec![],
                })
                .collect(),
        }
    }

    #[test]
    fn sanitize_strips_line_breaks_anywhere() {
        assert_eq!(sanitize_user_key("Alice\r\n"), "Alice");
        assert_eq!(sanitize_user_key("Al\nice"), "Alice");
        assert_eq!(sanitize_user_key("Bob"), "Bob");
    }

    #[test]
    fn name_with_crlf_maps_to_clean_file() {
        let dir = TempDir::new().unwrap();
        let store = FileRosterStore::new(dir.path());

        let path = store
            .persist(&selection("Alice\r\n", &["vulpix", "vulpix", "growlithe"]))
            .unwrap();
        assert_eq!(path, dir.path().join("Alice.json"));
        assert!(path.exists());

        // The stored document is the selection as received.
        let stored = store.load("Alice").unwrap().unwrap();
        assert_eq!(stored.name, "Alice\r\n");
        assert_eq!(stored.selected.len(), 3);
    }

    #[test]
    fn resubmission_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = FileRosterStore::new(dir.path());

        store
            .persist(&selection("Ash", &["charmander", "charmander", "charmander"]))
            .unwrap();
        store
            .persist(&selection("Ash", &["vulpix", "growlithe", "vulpix"]))
            .unwrap();

        let stored = store.load("Ash").unwrap().unwrap();
        let names: Vec<_> = stored.selected.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["vulpix", "growlithe", "vulpix"]);

        // No temporary files left behind.
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn concurrent_writers_leave_one_whole_document() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileRosterStore::new(dir.path()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let pick = format!("mon-{i}");
                    let pick = pick.as_str();
                    store.persist(&selection("Ash", &[pick, pick, pick])).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let stored = store.load("Ash").unwrap().unwrap();
        let first = &stored.selected[0].name;
        assert!(stored.selected.iter().all(|c| &c.name == first));
    }

    #[test]
    fn unusable_keys_are_refused() {
        let store = FileRosterStore::new("/tmp/rosters");
        for name in ["", "\r\n", ".", "..", "../etc/passwd", "a/b", "a\\b"] {
            assert!(
                matches!(store.path_for(name), Err(PersistenceError::InvalidKey(_))),
                "{name:?} should be refused"
            );
        }
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        let store = FileRosterStore::new(dir.path().join("does-not-exist"));
        let err = store
            .persist(&selection("Ash", &["a", "b", "c"]))
            .unwrap_err();
        assert!(matches!(err, PersistenceError::Io { .. }));
    }

    #[test]
    fn load_of_unknown_user_is_none() {
        let dir = TempDir::new().unwrap();
        let store = FileRosterStore::new(dir.path());
        assert!(store.load("Nobody").unwrap().is_none());
    }
}
