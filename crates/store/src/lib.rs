//! Share-snapshot store: keyed, TTL-bound blobs of finished analysis runs.
//!
//! Each share is one gzipped JSON file named by an 8-character id drawn from
//! an unambiguous lowercase alphabet. Expired shares read as absent and are
//! deleted lazily on access or via [`ShareStore::prune`].

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chrono::Utc;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use tracelens_core::error::{Result, TracelensError};

/// Lowercase alphanumerics minus the ambiguous 0/o/1/l. Exactly 32 symbols,
/// so indexing by `byte % 32` stays uniform.
const ID_ALPHABET: &[u8] = b"abcdefghijkmnpqrstuvwxyz23456789";
const ID_LENGTH: usize = 8;

/// Supported retention windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TtlLabel {
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
}

impl TtlLabel {
    pub fn parse(label: &str) -> Result<Self> {
        match label {
            "24h" => Ok(Self::Day),
            "7d" => Ok(Self::Week),
            "30d" => Ok(Self::Month),
            other => Err(TracelensError::InvalidArgument(format!(
                "invalid share ttl {other:?}, expected one of: 24h, 7d, 30d"
            ))),
        }
    }

    pub fn seconds(self) -> i64 {
        match self {
            Self::Day => 86_400,
            Self::Week => 7 * 86_400,
            Self::Month => 30 * 86_400,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Day => "24h",
            Self::Week => "7d",
            Self::Month => "30d",
        }
    }
}

/// Listing entry: everything but the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareMeta {
    pub share_id: String,
    pub created_at: i64,
    pub expires_at: i64,
    pub ttl: TtlLabel,
    pub filename: String,
}

impl ShareMeta {
    pub fn is_expired_at(&self, now: i64) -> bool {
        now > self.expires_at
    }
}

/// One stored share: metadata plus the full analysis payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareRecord {
    #[serde(flatten)]
    pub meta: ShareMeta,
    pub payload: serde_json::Value,
}

pub struct ShareStore {
    dir: PathBuf,
}

impl ShareStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            TracelensError::Store(format!("creating share dir {}: {e}", dir.display()))
        })?;
        Ok(Self { dir })
    }

    /// Persist a payload under a fresh id; returns the share metadata.
    pub fn save(
        &self,
        payload: serde_json::Value,
        filename: &str,
        ttl: TtlLabel,
    ) -> Result<ShareMeta> {
        let share_id = self.fresh_id();
        let created_at = Utc::now().timestamp();
        let record = ShareRecord {
            meta: ShareMeta {
                share_id,
                created_at,
                expires_at: created_at + ttl.seconds(),
                ttl,
                filename: filename.to_string(),
            },
            payload,
        };
        self.write_record(&record)?;
        debug!(share_id = %record.meta.share_id, ttl = ttl.label(), "share saved");
        Ok(record.meta)
    }

    /// Load a share; expired or corrupted shares are deleted and read as
    /// absent.
    pub fn load(&self, share_id: &str) -> Result<Option<ShareRecord>> {
        let path = self.share_path(share_id);
        if !path.exists() {
            return Ok(None);
        }
        let record = match self.read_record(&path) {
            Ok(record) => record,
            Err(error) => {
                warn!(share_id, %error, "deleting unreadable share");
                let _ = fs::remove_file(&path);
                return Ok(None);
            }
        };
        if record.meta.is_expired_at(Utc::now().timestamp()) {
            let _ = fs::remove_file(&path);
            return Ok(None);
        }
        Ok(Some(record))
    }

    /// All live shares, newest first.
    pub fn list(&self) -> Result<Vec<ShareMeta>> {
        let now = Utc::now().timestamp();
        let mut shares = Vec::new();
        for entry in self.entries()? {
            match self.read_record(&entry) {
                Ok(record) if !record.meta.is_expired_at(now) => shares.push(record.meta),
                Ok(_) => {}
                Err(error) => warn!(path = %entry.display(), %error, "skipping unreadable share"),
            }
        }
        shares.sort_by_key(|m| std::cmp::Reverse(m.created_at));
        Ok(shares)
    }

    /// Delete every expired or unreadable share; returns how many were
    /// removed.
    pub fn prune(&self) -> Result<usize> {
        let now = Utc::now().timestamp();
        let mut deleted = 0;
        for entry in self.entries()? {
            let stale = match self.read_record(&entry) {
                Ok(record) => record.meta.is_expired_at(now),
                Err(_) => true,
            };
            if stale && fs::remove_file(&entry).is_ok() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    fn entries(&self) -> Result<Vec<PathBuf>> {
        let read = fs::read_dir(&self.dir).map_err(|e| {
            TracelensError::Store(format!("reading share dir {}: {e}", self.dir.display()))
        })?;
        let mut paths: Vec<PathBuf> = read
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "gz"))
            .collect();
        paths.sort();
        Ok(paths)
    }

    fn share_path(&self, share_id: &str) -> PathBuf {
        self.dir.join(format!("{share_id}.json.gz"))
    }

    fn fresh_id(&self) -> String {
        loop {
            let id = generate_id();
            if !self.share_path(&id).exists() {
                return id;
            }
        }
    }

    fn write_record(&self, record: &ShareRecord) -> Result<()> {
        let path = self.share_path(&record.meta.share_id);
        let file = File::create(&path)
            .map_err(|e| TracelensError::Store(format!("creating {}: {e}", path.display())))?;
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        serde_json::to_writer(&mut encoder, record)
            .map_err(|e| TracelensError::Store(format!("writing {}: {e}", path.display())))?;
        let writer = encoder
            .finish()
            .map_err(|e| TracelensError::Store(format!("writing {}: {e}", path.display())))?;
        writer
            .into_inner()
            .map_err(|e| TracelensError::Store(format!("flushing {}: {e}", path.display())))?;
        Ok(())
    }

    fn read_record(&self, path: &Path) -> Result<ShareRecord> {
        let file = File::open(path)
            .map_err(|e| TracelensError::Store(format!("opening {}: {e}", path.display())))?;
        let decoder = GzDecoder::new(BufReader::new(file));
        serde_json::from_reader(decoder)
            .map_err(|e| TracelensError::Store(format!("reading {}: {e}", path.display())))
    }
}

fn generate_id() -> String {
    Uuid::new_v4()
        .as_bytes()
        .iter()
        .take(ID_LENGTH)
        .map(|b| ID_ALPHABET[(b % ID_ALPHABET.len() as u8) as usize] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, ShareStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ShareStore::open(dir.path().join("shares")).unwrap();
        (dir, store)
    }

    #[test]
    fn ids_use_the_unambiguous_alphabet() {
        for _ in 0..64 {
            let id = generate_id();
            assert_eq!(id.len(), ID_LENGTH);
            assert!(id.bytes().all(|b| ID_ALPHABET.contains(&b)));
            for banned in ['0', 'o', '1', 'l'] {
                assert!(!id.contains(banned));
            }
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let (_dir, store) = store();
        let payload = serde_json::json!({"traces": 3});
        let meta = store.save(payload.clone(), "run.json", TtlLabel::Week).unwrap();

        let loaded = store.load(&meta.share_id).unwrap().unwrap();
        assert_eq!(loaded.payload, payload);
        assert_eq!(loaded.meta.filename, "run.json");
        assert_eq!(loaded.meta.expires_at - loaded.meta.created_at, 7 * 86_400);
    }

    #[test]
    fn missing_and_expired_shares_read_as_absent() {
        let (_dir, store) = store();
        assert!(store.load("zzzzzzzz").unwrap().is_none());

        let mut record = ShareRecord {
            meta: ShareMeta {
                share_id: "abcdefgh".to_string(),
                created_at: 0,
                expires_at: 0,
                ttl: TtlLabel::Day,
                filename: "old.json".to_string(),
            },
            payload: serde_json::json!({}),
        };
        record.meta.expires_at = Utc::now().timestamp() - 10;
        store.write_record(&record).unwrap();

        assert!(store.load("abcdefgh").unwrap().is_none());
        // Lazy deletion removed the file too.
        assert!(!store.share_path("abcdefgh").exists());
    }

    #[test]
    fn prune_removes_only_expired_shares() {
        let (_dir, store) = store();
        let live = store
            .save(serde_json::json!({}), "live.json", TtlLabel::Day)
            .unwrap();
        let stale = ShareRecord {
            meta: ShareMeta {
                share_id: "stalesta".to_string(),
                created_at: 0,
                expires_at: 1,
                ttl: TtlLabel::Day,
                filename: "stale.json".to_string(),
            },
            payload: serde_json::json!({}),
        };
        store.write_record(&stale).unwrap();

        assert_eq!(store.prune().unwrap(), 1);
        assert!(store.load(&live.share_id).unwrap().is_some());
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn list_is_newest_first_and_skips_expired() {
        let (_dir, store) = store();
        for (id, created) in [("aaaaaaaa", 100), ("bbbbbbbb", 200)] {
            let record = ShareRecord {
                meta: ShareMeta {
                    share_id: id.to_string(),
                    created_at: created,
                    expires_at: Utc::now().timestamp() + 1000,
                    ttl: TtlLabel::Day,
                    filename: format!("{id}.json"),
                },
                payload: serde_json::json!({}),
            };
            store.write_record(&record).unwrap();
        }
        let shares = store.list().unwrap();
        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0].share_id, "bbbbbbbb");
    }

    #[test]
    fn ttl_labels_parse_and_render() {
        assert_eq!(TtlLabel::parse("24h").unwrap(), TtlLabel::Day);
        assert_eq!(TtlLabel::parse("7d").unwrap(), TtlLabel::Week);
        assert_eq!(TtlLabel::parse("30d").unwrap(), TtlLabel::Month);
        assert!(TtlLabel::parse("1y").is_err());
        assert_eq!(TtlLabel::Month.seconds(), 2_592_000);
    }
}
