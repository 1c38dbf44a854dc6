use crate::storage::{RecordSink, StorageResult};
use std::collections::HashSet;

/// Normalises a company name into its de-duplication key
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Tracks which entities have already been captured
///
/// `historical` holds normalised names from earlier runs plus everything
/// captured so far in this one. `in_run` holds the identifiers dispatched in
/// this run; neither set ever shrinks while the run lives.
#[derive(Debug, Clone, Default)]
pub struct DedupLedger {
    historical: HashSet<String>,
    in_run: HashSet<String>,
}

impl DedupLedger {
    /// Creates an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Populates `historical` from previously persisted records
    ///
    /// A missing destination yields no names and is not an error.
    ///
    /// # Arguments
    ///
    /// * `source` - The sink whose existing rows are read
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Number of distinct names added to the ledger
    /// * `Err(StorageError)` - The destination exists but could not be read
    pub fn load(&mut self, source: &dyn RecordSink) -> StorageResult<usize> {
        let before = self.historical.len();

        for name in source.load_names()? {
            let key = normalize_name(&name);
            if !key.is_empty() {
                self.historical.insert(key);
            }
        }

        Ok(self.historical.len() - before)
    }

    /// Returns true if `name` was captured before (case-insensitive, trimmed)
    pub fn is_known(&self, name: &str) -> bool {
        self.historical.contains(&normalize_name(name))
    }

    /// Records `name` as captured; blank names are ignored
    pub fn mark(&mut self, name: &str) {
        let key = normalize_name(name);
        if !key.is_empty() {
            self.historical.insert(key);
        }
    }

    /// Claims `identifier` for dispatch in this run
    ///
    /// Returns false if the identifier was already claimed.
    pub fn claim_identifier(&mut self, identifier: &str) -> bool {
        self.in_run.insert(identifier.to_string())
    }

    /// Number of known names
    pub fn known_count(&self) -> usize {
        self.historical.len()
    }
}
