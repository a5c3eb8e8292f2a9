use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::parser::FileRecord;

/// Current cache format version. Bump when the FileRecord layout changes —
/// bincode discriminant layout is part of the on-disk contract.
pub const CACHE_VERSION: u32 = 1;

/// Cache directory name (created in the project root).
pub const CACHE_DIR: &str = ".archgraph";
/// Cache file name within CACHE_DIR.
pub const CACHE_FILE: &str = "records.bin";

/// One cached per-file parse result, keyed by the file's content hash.
/// Identical key ⇒ identical value: the record is a pure function of the
/// file contents and the configuration fingerprint on the envelope.
#[derive(serde::Serialize, serde::Deserialize)]
pub struct CacheEntry {
    pub content_hash: String,
    pub record: FileRecord,
}

/// Envelope wrapping all cached records with version and fingerprint gates.
#[derive(serde::Serialize, serde::Deserialize)]
struct CacheEnvelope {
    version: u32,
    config_fingerprint: String,
    entries: HashMap<PathBuf, CacheEntry>,
}

/// Content-addressed store of per-file parse records.
///
/// Keys are project-relative paths; an entry is valid only while the file's
/// content hash matches. A configuration fingerprint change discards the
/// whole store: rule changes alter derived edges in ways not localized to
/// single files. Corruption is never fatal — it degrades to a full miss.
///
/// Concurrent runs against the same project are safe: loads tolerate a
/// concurrent writer (a torn read is a miss) and saves are whole-file atomic
/// replaces, making writes last-writer-wins.
pub struct CacheStore {
    project_root: PathBuf,
    config_fingerprint: String,
    entries: HashMap<PathBuf, CacheEntry>,
    dirty: bool,
}

impl CacheStore {
    /// Load the cache for a project, starting empty when the file is
    /// missing, a different version, written under a different configuration
    /// fingerprint, or unreadable.
    pub fn open(project_root: &Path, config_fingerprint: &str) -> Self {
        let entries = match load_envelope(project_root) {
            Some(envelope)
                if envelope.version == CACHE_VERSION
                    && envelope.config_fingerprint == config_fingerprint =>
            {
                tracing::debug!("cache loaded: {} entries", envelope.entries.len());
                envelope.entries
            }
            Some(_) => {
                tracing::info!("cache fingerprint or version changed; discarding all entries");
                HashMap::new()
            }
            None => HashMap::new(),
        };

        Self {
            project_root: project_root.to_path_buf(),
            config_fingerprint: config_fingerprint.to_string(),
            entries,
            dirty: false,
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up the cached record for a file, validated against the file's
    /// current content hash. A stale or missing entry is a miss.
    pub fn get(&self, path: &Path, current_hash: &str) -> Option<&FileRecord> {
        let rel = self.relative(path)?;
        let entry = self.entries.get(&rel)?;
        if entry.content_hash != current_hash {
            return None;
        }
        Some(&entry.record)
    }

    /// Insert or overwrite the record for a file.
    pub fn put(&mut self, path: &Path, record: FileRecord) {
        let Some(rel) = self.relative(path) else {
            return;
        };
        self.entries.insert(
            rel,
            CacheEntry {
                content_hash: record.content_hash.clone(),
                record,
            },
        );
        self.dirty = true;
    }

    /// Drop entries for files no longer present in the project.
    pub fn prune(&mut self, live_paths: &[PathBuf]) {
        let live: std::collections::HashSet<PathBuf> = live_paths
            .iter()
            .filter_map(|p| self.relative(p))
            .collect();
        let before = self.entries.len();
        self.entries.retain(|rel, _| live.contains(rel));
        if self.entries.len() != before {
            self.dirty = true;
            tracing::debug!("pruned {} stale cache entries", before - self.entries.len());
        }
    }

    /// Persist the store atomically: bincode to a temp file in the cache
    /// directory, then rename over the final path.
    pub fn save(&mut self) -> anyhow::Result<()> {
        if !self.dirty {
            return Ok(());
        }

        let cache_dir = self.project_root.join(CACHE_DIR);
        std::fs::create_dir_all(&cache_dir)?;

        let envelope = CacheEnvelope {
            version: CACHE_VERSION,
            config_fingerprint: self.config_fingerprint.clone(),
            entries: std::mem::take(&mut self.entries),
        };

        let target = cache_path(&self.project_root);
        let mut tmp = tempfile::NamedTempFile::new_in(&cache_dir)?;
        bincode::serde::encode_into_std_write(&envelope, &mut tmp, bincode::config::standard())?;
        tmp.as_file().flush()?;
        tmp.persist(&target)?;

        self.entries = envelope.entries;
        self.dirty = false;
        Ok(())
    }

    fn relative(&self, path: &Path) -> Option<PathBuf> {
        path.strip_prefix(&self.project_root).ok().map(Path::to_path_buf)
    }
}

/// Build the cache file path for a project: `<root>/.archgraph/records.bin`.
pub fn cache_path(project_root: &Path) -> PathBuf {
    project_root.join(CACHE_DIR).join(CACHE_FILE)
}

/// Read and decode the envelope. `None` for missing, truncated, or corrupt
/// files — the caller rebuilds from scratch.
fn load_envelope(project_root: &Path) -> Option<CacheEnvelope> {
    let bytes = std::fs::read(cache_path(project_root)).ok()?;
    match bincode::serde::decode_from_slice::<CacheEnvelope, _>(&bytes, bincode::config::standard())
    {
        Ok((envelope, _)) => Some(envelope),
        Err(err) => {
            tracing::warn!("cache file corrupt ({err}); rebuilding from scratch");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{LayoutKind, ResolutionContext};
    use crate::parser::parse_file;

    fn record_for(root: &Path, rel: &str, source: &[u8]) -> FileRecord {
        let ctx = ResolutionContext {
            project_root: root.to_path_buf(),
            source_root: root.to_path_buf(),
            layout: LayoutKind::Flat,
            root_packages: vec!["app".to_string()],
        };
        parse_file(&root.join(rel), source, &ctx).unwrap()
    }

    #[test]
    fn test_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let record = record_for(dir.path(), "app/a.py", b"x = 1\n");
        let hash = record.content_hash.clone();
        let path = dir.path().join("app/a.py");

        let mut store = CacheStore::open(dir.path(), "fp-1");
        store.put(&path, record);
        store.save().unwrap();

        let reloaded = CacheStore::open(dir.path(), "fp-1");
        assert_eq!(reloaded.len(), 1);
        let hit = reloaded.get(&path, &hash).expect("cache should hit");
        assert_eq!(hit.module, "app.a");
    }

    #[test]
    fn test_content_change_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let record = record_for(dir.path(), "app/a.py", b"x = 1\n");
        let path = dir.path().join("app/a.py");

        let mut store = CacheStore::open(dir.path(), "fp-1");
        store.put(&path, record);
        assert!(store.get(&path, "different-hash").is_none());
    }

    #[test]
    fn test_fingerprint_change_discards_everything() {
        let dir = tempfile::tempdir().unwrap();
        let record = record_for(dir.path(), "app/a.py", b"x = 1\n");
        let path = dir.path().join("app/a.py");

        let mut store = CacheStore::open(dir.path(), "fp-1");
        store.put(&path, record);
        store.save().unwrap();

        let reloaded = CacheStore::open(dir.path(), "fp-2");
        assert!(reloaded.is_empty(), "fingerprint change must invalidate the whole cache");
    }

    #[test]
    fn test_corrupt_cache_is_a_full_miss() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(CACHE_DIR)).unwrap();
        std::fs::write(cache_path(dir.path()), b"not bincode at all").unwrap();

        let store = CacheStore::open(dir.path(), "fp-1");
        assert!(store.is_empty());
    }

    #[test]
    fn test_prune_drops_deleted_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = record_for(dir.path(), "app/a.py", b"x = 1\n");
        let b = record_for(dir.path(), "app/b.py", b"y = 2\n");
        let a_path = dir.path().join("app/a.py");
        let b_path = dir.path().join("app/b.py");

        let mut store = CacheStore::open(dir.path(), "fp-1");
        store.put(&a_path, a);
        store.put(&b_path, b);
        store.prune(std::slice::from_ref(&a_path));
        assert_eq!(store.len(), 1);
        assert!(store.get(&b_path, "whatever").is_none());
    }
}
