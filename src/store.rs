use std::fs;
use std::io;
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use thiserror::Error;

use crate::models::{Entry, Outcome};

const FIELDS_PER_RECORD: usize = 3;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid CSV in {}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{}: line {line} has {fields} fields, expected 3", .path.display())]
    Malformed {
        path: PathBuf,
        line: u64,
        fields: usize,
    },
}

/// The password book: an ordered table of entries mirrored to a CSV file.
///
/// Rows are sorted by website when loaded; afterwards new rows are appended
/// and every mutation rewrites the whole file in table order.
pub struct EntryStore {
    data_path: PathBuf,
    entries: Vec<Entry>,
}

impl EntryStore {
    /// Binds a store to `path` and loads it. A missing file is an empty book.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let mut store = Self {
            data_path: path.into(),
            entries: Vec::new(),
        };
        store.load()?;
        Ok(store)
    }

    pub fn exists(&self) -> bool {
        self.data_path.exists()
    }

    pub fn path(&self) -> &Path {
        &self.data_path
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&Entry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replaces the table with the file contents, sorted by website.
    pub fn load(&mut self) -> Result<(), StoreError> {
        let file = match fs::File::open(&self.data_path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("{} not found, starting empty", self.data_path.display());
                self.entries.clear();
                return Ok(());
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);

        let mut entries = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| self.csv_error(e))?;
            if record.len() != FIELDS_PER_RECORD {
                return Err(StoreError::Malformed {
                    path: self.data_path.clone(),
                    line: record.position().map(|p| p.line()).unwrap_or_default(),
                    fields: record.len(),
                });
            }
            entries.push(Entry::new(&record[0], &record[1], &record[2]));
        }
        entries.sort_by(|a, b| a.website.cmp(&b.website));

        debug!("loaded {} entries from {}", entries.len(), self.data_path.display());
        self.entries = entries;
        Ok(())
    }

    /// Overwrites the file with the current table, in table order.
    pub fn save(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.data_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }

        let mut options = fs::OpenOptions::new();
        options.create(true).write(true);
        #[cfg(unix)]
        {
            options.mode(0o600);
        }
        let file = options.open(&self.data_path).map_err(|e| self.io_error(e))?;

        // A refused chmod (file owned by another user) must not cost the rows.
        #[cfg(unix)]
        {
            if let Err(e) = restrict_permissions(&file) {
                warn!("could not set mode 0600 on {}: {}", self.data_path.display(), e);
            }
        }

        // Truncate only once nothing else can fail before the write.
        file.set_len(0).map_err(|e| self.io_error(e))?;

        // Quote only when a field needs it, CRLF between records.
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .quote_style(csv::QuoteStyle::Necessary)
            .terminator(csv::Terminator::CRLF)
            .from_writer(file);

        for entry in &self.entries {
            writer
                .write_record(entry.fields())
                .map_err(|e| self.csv_error(e))?;
        }
        writer.flush().map_err(|e| self.io_error(e))?;

        debug!("saved {} entries to {}", self.entries.len(), self.data_path.display());
        Ok(())
    }

    pub fn add(&mut self, entry: Entry) -> Result<Outcome, StoreError> {
        if !entry.is_complete() {
            info!("add dropped: empty field");
            return Ok(Outcome::Incomplete);
        }

        self.entries.push(entry);
        self.save()?;
        Ok(Outcome::Saved)
    }

    /// Overwrites the selected row. A selection past the end counts as none.
    pub fn edit(&mut self, selected: Option<usize>, entry: Entry) -> Result<Outcome, StoreError> {
        let Some(index) = self.resolve(selected) else {
            info!("edit aborted: no row selected");
            return Ok(Outcome::NoSelection);
        };
        if !entry.is_complete() {
            info!("edit of row {} dropped: empty field", index);
            return Ok(Outcome::Incomplete);
        }

        self.entries[index] = entry;
        self.save()?;
        Ok(Outcome::Saved)
    }

    pub fn delete(&mut self, selected: Option<usize>) -> Result<Outcome, StoreError> {
        let Some(index) = self.resolve(selected) else {
            info!("delete aborted: no row selected");
            return Ok(Outcome::NoSelection);
        };

        self.entries.remove(index);
        self.save()?;
        Ok(Outcome::Saved)
    }

    /// Row indices whose website or username contains `query`, ignoring case.
    pub fn search(&self, query: &str) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.matches(query))
            .map(|(i, _)| i)
            .collect()
    }

    fn resolve(&self, selected: Option<usize>) -> Option<usize> {
        selected.filter(|&i| i < self.entries.len())
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.data_path.clone(),
            source,
        }
    }

    fn csv_error(&self, source: csv::Error) -> StoreError {
        StoreError::Csv {
            path: self.data_path.clone(),
            source,
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(file: &fs::File) -> io::Result<()> {
    let mut perms = file.metadata()?.permissions();
    if perms.mode() & 0o777 != 0o600 {
        perms.set_mode(0o600);
        file.set_permissions(perms)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_quoted_fields_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("book.csv");

        let mut store = EntryStore::open(&path).unwrap();
        let tricky = Entry::new("a,b.example", "say \"hi\"", "p,w");
        assert_eq!(store.add(tricky.clone()).unwrap(), Outcome::Saved);

        let raw = fs::read_to_string(&path).unwrap();
        assert_eq!(raw, "\"a,b.example\",\"say \"\"hi\"\"\",\"p,w\"\r\n");

        let reloaded = EntryStore::open(&path).unwrap();
        assert_eq!(reloaded.entries(), &[tricky]);
    }

    #[test]
    fn test_wrong_field_count_reports_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("book.csv");
        fs::write(&path, "a.com,u1,p1\nb.com,u2\n").unwrap();

        match EntryStore::open(&path) {
            Err(StoreError::Malformed { line, fields, .. }) => {
                assert_eq!(line, 2);
                assert_eq!(fields, 2);
            }
            other => panic!("expected malformed error, got {:?}", other.map(|s| s.len())),
        }
    }

    #[test]
    fn test_selection_past_end_is_no_selection() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("book.csv");
        let mut store = EntryStore::open(&path).unwrap();
        store.add(Entry::new("a.com", "u", "p")).unwrap();

        assert_eq!(store.delete(Some(1)).unwrap(), Outcome::NoSelection);
        assert_eq!(
            store.edit(Some(7), Entry::new("b.com", "u", "p")).unwrap(),
            Outcome::NoSelection
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_save_creates_parent_dir() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("book.csv");
        let mut store = EntryStore::open(&path).unwrap();
        assert!(!store.exists());

        store.add(Entry::new("a.com", "u", "p")).unwrap();
        assert!(store.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_file_is_owner_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("book.csv");
        let mut store = EntryStore::open(&path).unwrap();
        store.add(Entry::new("a.com", "u", "p")).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_existing_file_keeps_rows_when_mode_changes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("book.csv");
        fs::write(&path, "a.com,u1,p1\r\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let mut store = EntryStore::open(&path).unwrap();
        store.add(Entry::new("b.com", "u2", "p2")).unwrap();

        assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o600);
        assert_eq!(fs::read_to_string(&path).unwrap(), "a.com,u1,p1\r\nb.com,u2,p2\r\n");
    }

    #[test]
    fn test_failed_save_reports_io_and_keeps_row() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("sub");
        let mut store = EntryStore::open(blocker.join("book.csv")).unwrap();
        // the parent turns into a regular file after the book was opened
        fs::write(&blocker, "not a directory").unwrap();

        let result = store.add(Entry::new("a.com", "u", "p"));
        assert!(matches!(result, Err(StoreError::Io { .. })), "{:?}", result);
        assert_eq!(store.entries(), &[Entry::new("a.com", "u", "p")]);
        assert_eq!(fs::read_to_string(&blocker).unwrap(), "not a directory");
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("book.csv");
        fs::write(&path, "mail.example,Bob,x\nbank.example,alice,y\nshop.example,bobby,z\n").unwrap();
        let store = EntryStore::open(&path).unwrap();

        // sorted: bank, mail, shop
        assert_eq!(store.search("BOB"), vec![1, 2]);
        assert!(store.search("nothing").is_empty());
    }
}
