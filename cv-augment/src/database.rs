use crate::errors::{Error, Result};
use crate::Entry;
use log::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Incremented whenever the snapshot layout changes.
const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    entries: Vec<Entry>,
}

/// A named collection of entries persisted as a single snapshot file.
///
/// Entries keep their insertion order, which is the order recognition scans them in.
/// Every successful mutation rewrites the whole snapshot before returning.
#[derive(Debug)]
pub struct Database {
    path: PathBuf,
    entries: Vec<Entry>,
}

impl Database {
    /// Loads the snapshot at `path`, or creates and persists an empty database if
    /// there is no file there yet.
    pub fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_owned();
        if path.exists() {
            info!("Loading database: {}", path.display());
            let file = BufReader::new(File::open(&path)?);
            let snapshot: Snapshot = bincode::deserialize_from(file)?;
            if snapshot.version != SNAPSHOT_VERSION {
                warn!(
                    "database {} has snapshot version {}, expected {}",
                    path.display(),
                    snapshot.version,
                    SNAPSHOT_VERSION
                );
            }
            info!("Loaded {} entries", snapshot.entries.len());
            Ok(Self {
                path,
                entries: snapshot.entries,
            })
        } else {
            info!("Creating empty database: {}", path.display());
            let database = Self {
                path,
                entries: Vec::new(),
            };
            database.save()?;
            Ok(database)
        }
    }

    /// Atomically rewrites the whole snapshot.
    ///
    /// The snapshot goes to a sibling temporary file first and is renamed over the
    /// target only once it is fully on disk, so a failure leaves the previous
    /// snapshot intact.
    pub fn save(&self) -> Result<()> {
        info!(
            "Saving database: {} ({} entries)",
            self.path.display(),
            self.entries.len()
        );
        let temporary = self.temporary_path();
        let result = self.write_snapshot(&temporary).and_then(|()| {
            fs::rename(&temporary, &self.path)?;
            Ok(())
        });
        if let Err(e) = &result {
            error!("unable to save database {}: {}", self.path.display(), e);
            // Best effort, the temporary may never have been created.
            let _ = fs::remove_file(&temporary);
        }
        result
    }

    fn write_snapshot(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(
            &mut writer,
            &SnapshotRef {
                version: SNAPSHOT_VERSION,
                entries: &self.entries,
            },
        )?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    fn temporary_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Inserts a new entry and persists the database.
    ///
    /// Fails with [`Error::DuplicateEntryName`] without touching anything if the name is
    /// taken; use [`Database::upsert_entry`] to replace an entry on purpose. If only the
    /// save fails, the entry stays in memory and the I/O error is returned.
    pub fn add_entry(&mut self, entry: Entry) -> Result<()> {
        if self.entry(entry.name()).is_some() {
            return Err(Error::DuplicateEntryName(entry.name().to_owned()));
        }
        debug!("Adding entry {:?}", entry.name());
        self.entries.push(entry);
        self.save()
    }

    /// Inserts or replaces the entry with the same name and persists the database.
    ///
    /// A replaced entry keeps its position in the scan order. Returns the entry that
    /// was replaced, if any.
    pub fn upsert_entry(&mut self, entry: Entry) -> Result<Option<Entry>> {
        let previous = match self.position(entry.name()) {
            Some(ix) => {
                debug!("Replacing entry {:?}", entry.name());
                Some(std::mem::replace(&mut self.entries[ix], entry))
            }
            None => {
                debug!("Adding entry {:?}", entry.name());
                self.entries.push(entry);
                None
            }
        };
        self.save()?;
        Ok(previous)
    }

    pub fn entry(&self, name: &str) -> Option<&Entry> {
        self.position(name).map(|ix| &self.entries[ix])
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.name() == name)
    }
}

/// Borrowing twin of [`Snapshot`] so saving does not clone every entry.
#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    entries: &'a [Entry],
}
