//! Retriever
use crate::listing::ListingHeuristic;
use crate::oracle::Oracle;
use crate::store::{local_path, LocalStore};

use anyhow::Result;
use log::{error, info};

/// What came of retrieving one entry of a listing.
#[derive(Debug)]
pub enum Branch {
    /// The entry yielded content
    Found,
    /// The oracle had nothing for the entry
    Missing,
    /// Saving the entry, or something below it, failed
    Failed(anyhow::Error),
}

impl Branch {
    pub fn is_found(&self) -> bool {
        matches!(self, Branch::Found)
    }
}

/// Struct for managing the recursive retrieval
///
/// The Retriever walks the remote tree depth-first through its [Oracle], one request at a
/// time. Content where every line looks like a file name is treated as a directory listing
/// and each line is retrieved as `path + line + "/"`. Whenever none of those entries yields
/// content the node is taken to be a file and is saved to the [LocalStore].
///
/// There is no cycle detection. A symlink loop on the target makes the walk run until the
/// stack gives out.
pub struct Retriever<O> {
    oracle: O,
    heuristic: ListingHeuristic,
    store: LocalStore,
}

impl<O: Oracle> Retriever<O> {
    pub fn new(oracle: O, heuristic: ListingHeuristic, store: LocalStore) -> Self {
        Self {
            oracle,
            heuristic,
            store,
        }
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Recursively retrieve path
    ///
    /// Returns the content the oracle gave for path, or [None] if it had nothing or the
    /// exchange failed; the failure is logged. The only error is a failure to save path
    /// itself. Errors further down are logged and only count as entries that were not found.
    pub fn retrieve(&self, path: &str) -> Result<Option<String>> {
        info!("retrieving {}", path);
        let content = match self.oracle.fetch(path) {
            Ok(Some(content)) => content,
            Ok(None) => return Ok(None),
            Err(err) => {
                error!("could not retrieve {}: {}", path, err);
                return Ok(None);
            }
        };
        info!("content: {}", content);

        let mut found = false;
        if let Some(entries) = self.heuristic.entries(&content) {
            for entry in entries {
                let entry_path = format!("{}{}/", path, entry);
                match self.branch(&entry_path) {
                    Branch::Found => found = true,
                    Branch::Missing => {}
                    Branch::Failed(err) => error!("could not retrieve {}: {:#}", entry_path, err),
                }
            }
        }

        if !found {
            info!("looks like a file: {}", path);
            self.store.save(local_path(path), &content)?;
        }
        Ok(Some(content))
    }

    /// Retrieve path, folding the result into a [Branch].
    pub fn branch(&self, path: &str) -> Branch {
        match self.retrieve(path) {
            Ok(Some(_)) => Branch::Found,
            Ok(None) => Branch::Missing,
            Err(err) => Branch::Failed(err),
        }
    }
}
