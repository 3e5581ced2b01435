use std::collections::{BTreeSet, HashSet};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::record::SaleRecord;
use crate::search_api::query_from_search_url;

/// Tabular persistence for fetched records.
///
/// A query counts as processed once any stored record's `search_url` names
/// it, or once it completed with no results.
pub trait RecordStore {
    fn records(&self) -> &[SaleRecord];

    /// Queries already present in the store.
    fn processed_queries(&self) -> HashSet<String>;

    /// Adds the records fetched for `query`. Not durable until `save`.
    ///
    /// `complete` is false when a failed page cut pagination short; an
    /// incomplete query with no records must stay pending.
    fn append(&mut self, query: &str, records: Vec<SaleRecord>, complete: bool);

    /// Persists the full table. All-or-nothing.
    fn save(&mut self) -> Result<(), StoreError>;
}

/// Queries that finished without a single record.
#[derive(Serialize, Deserialize, Default)]
struct EmptyQueryLedger {
    queries: BTreeSet<String>,
}

/// CSV-backed store, rewritten wholesale on every save.
pub struct CsvRecordStore {
    path: PathBuf,
    ledger_path: PathBuf,
    records: Vec<SaleRecord>,
    empty_queries: EmptyQueryLedger,
    ledger_dirty: bool,
}

impl CsvRecordStore {
    /// Opens `path`, loading any records a previous run left there.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let ledger_path = ledger_path_for(&path);

        let records = if path.exists() {
            let records = load_records(&path)?;
            info!("Loaded {} existing records from {:?}", records.len(), path);
            records
        } else {
            info!("No existing output at {:?}. Starting fresh.", path);
            Vec::new()
        };

        let empty_queries = if ledger_path.exists() {
            let content = fs::read_to_string(&ledger_path)?;
            serde_json::from_str(&content).map_err(|source| StoreError::Ledger {
                path: ledger_path.clone(),
                source,
            })?
        } else {
            EmptyQueryLedger::default()
        };

        Ok(CsvRecordStore {
            path,
            ledger_path,
            records,
            empty_queries,
            ledger_dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save_ledger(&self) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&self.empty_queries).map_err(|source| StoreError::Ledger {
            path: self.ledger_path.clone(),
            source,
        })?;
        write_atomically(&self.ledger_path, |file| file.write_all(json.as_bytes()).map_err(StoreError::from))
    }
}

impl RecordStore for CsvRecordStore {
    fn records(&self) -> &[SaleRecord] {
        &self.records
    }

    fn processed_queries(&self) -> HashSet<String> {
        let mut processed: HashSet<String> = HashSet::new();
        let mut unparseable = 0usize;

        for record in &self.records {
            match query_from_search_url(&record.search_url) {
                Some(query) => {
                    processed.insert(query);
                }
                None => unparseable += 1,
            }
        }
        if unparseable > 0 {
            warn!("{} stored records have no usable search_url", unparseable);
        }

        processed.extend(self.empty_queries.queries.iter().cloned());
        processed
    }

    fn append(&mut self, query: &str, records: Vec<SaleRecord>, complete: bool) {
        if records.is_empty() && complete {
            self.ledger_dirty |= self.empty_queries.queries.insert(query.to_string());
        }
        self.records.extend(records);
    }

    fn save(&mut self) -> Result<(), StoreError> {
        let path = self.path.clone();
        write_atomically(&self.path, |file| {
            let mut writer = csv::Writer::from_writer(file);
            let csv_err = |source| StoreError::Csv { path: path.clone(), source };
            if self.records.is_empty() {
                writer.write_record(crate::record::COLUMNS).map_err(csv_err)?;
            }
            for record in &self.records {
                writer.serialize(record).map_err(csv_err)?;
            }
            writer.flush()?;
            Ok(())
        })?;

        // Written after the table: losing it only re-fetches an empty query.
        if self.ledger_dirty {
            self.save_ledger()?;
            self.ledger_dirty = false;
        }
        Ok(())
    }
}

fn load_records(path: &Path) -> Result<Vec<SaleRecord>, StoreError> {
    let csv_err = |source| StoreError::Csv { path: path.to_path_buf(), source };
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;

    rdr.deserialize()
        .collect::<Result<Vec<SaleRecord>, csv::Error>>()
        .map_err(csv_err)
}

fn ledger_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".empty-queries.json");
    path.with_file_name(name)
}

/// Writes to a sibling temp file, then renames it over `path`.
fn write_atomically<F>(path: &Path, write: F) -> Result<(), StoreError>
where
    F: FnOnce(&mut File) -> Result<(), StoreError>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let result = File::create(&tmp_path)
        .map_err(StoreError::from)
        .and_then(|mut file| {
            write(&mut file)?;
            file.sync_all()?;
            Ok(())
        });

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}
