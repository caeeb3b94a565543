//! Attribute exchange store.
//!
//! Each process publishes write-once attributes (typically transport contact
//! addresses) and later fetches the attributes of its peers. Publication is
//! local until [`ExchangeStore::distribute`] pushes pending entries, together
//! with a JSON-encoded index of every key the process has published, through
//! the registry session. Peers consult that index to know when a process's
//! records are complete.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use cohort_config::WaitPolicy;
use cohort_types::ProcessIdentity;
use thiserror::Error;
use tracing::debug;

use crate::progress::ProgressEngine;
use crate::registry::{RegistryClient, RegistryError, RegistryOp, RegistrySession};

const TARGET: &str = "cohort_runtime::exchange";
const ENTRY_PREFIX: &str = "exchange:";
const INDEX_KEY: &str = "exchange-index";

/// Name of an exchanged attribute.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExchangeKey(String);

impl ExchangeKey {
    /// Wraps a key name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Key name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn registry_key(&self) -> String {
        format!("{ENTRY_PREFIX}{}", self.0)
    }
}

impl fmt::Display for ExchangeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExchangeKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Attributes published by one process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeRecord {
    entries: BTreeMap<ExchangeKey, Vec<u8>>,
}

impl ExchangeRecord {
    /// Value published under `key`.
    #[must_use]
    pub fn get(&self, key: &ExchangeKey) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the record holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates attributes in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&ExchangeKey, &[u8])> {
        self.entries
            .iter()
            .map(|(key, value)| (key, value.as_slice()))
    }
}

/// Errors raised by the exchange store.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// The key was already published by this process.
    #[error("{identity} already published exchange key '{key}'")]
    DuplicateKey {
        /// Publishing process.
        identity: ProcessIdentity,
        /// Offending key.
        key: ExchangeKey,
    },
    /// The key cannot be represented in the registry.
    #[error("exchange key '{key}' is invalid: {reason}")]
    InvalidKey {
        /// Offending key.
        key: ExchangeKey,
        /// Why it was rejected.
        reason: &'static str,
    },
    /// Registry access failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// The key index could not be encoded.
    #[error("failed to encode exchange key index: {0}")]
    Index(#[from] serde_json::Error),
    /// Some peers never completed publication within the wait policy.
    #[error("exchange incomplete after {waited:?}; still waiting on {}", format_peers(.missing))]
    Incomplete {
        /// Peers whose records never became complete.
        missing: Vec<ProcessIdentity>,
        /// Time spent waiting.
        waited: Duration,
    },
}

fn format_peers(peers: &[ProcessIdentity]) -> String {
    peers
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Local side of the attribute exchange for one process.
#[derive(Debug)]
pub struct ExchangeStore {
    identity: ProcessIdentity,
    published: BTreeMap<ExchangeKey, Vec<u8>>,
    pending: BTreeSet<ExchangeKey>,
    indexed: bool,
}

impl ExchangeStore {
    /// Creates an empty store for `identity`.
    #[must_use]
    pub const fn new(identity: ProcessIdentity) -> Self {
        Self {
            identity,
            published: BTreeMap::new(),
            pending: BTreeSet::new(),
            indexed: false,
        }
    }

    /// Owning process.
    #[must_use]
    pub const fn identity(&self) -> ProcessIdentity {
        self.identity
    }

    /// Records `blob` under `key` and marks it pending distribution.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::DuplicateKey`] when `key` was already
    /// published (the first value is kept), or
    /// [`ExchangeError::InvalidKey`] for an empty key.
    pub fn publish(
        &mut self,
        key: impl Into<ExchangeKey>,
        blob: impl Into<Vec<u8>>,
    ) -> Result<(), ExchangeError> {
        let key = key.into();
        if key.as_str().is_empty() {
            return Err(ExchangeError::InvalidKey {
                key,
                reason: "key must not be empty",
            });
        }
        if self.published.contains_key(&key) {
            return Err(ExchangeError::DuplicateKey {
                identity: self.identity,
                key,
            });
        }
        debug!(target: TARGET, identity = %self.identity, %key, "attribute published");
        self.pending.insert(key.clone());
        self.published.insert(key, blob.into());
        Ok(())
    }

    /// Locally published value for `key`.
    #[must_use]
    pub fn local(&self, key: &ExchangeKey) -> Option<&[u8]> {
        self.published.get(key).map(Vec::as_slice)
    }

    /// Number of entries awaiting distribution.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Pushes pending entries and the key index through `session`.
    ///
    /// Returns the number of entries distributed.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Registry`] when a direct write fails.
    pub fn distribute(&mut self, session: &mut RegistrySession) -> Result<usize, ExchangeError> {
        let ops = self.pending_ops()?;
        let distributed = self.pending.len();
        for op in ops {
            session.put(op)?;
        }
        self.pending.clear();
        self.indexed = true;
        Ok(distributed)
    }

    /// Distributes anything still pending, then waits until every peer's
    /// published records for `keys` are readable.
    ///
    /// An empty `keys` slice fetches everything each peer published. Peers
    /// that have not finished publishing are polled again after
    /// `policy.poll_interval()`, with a progress pass in between.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Registry`] on registry failure and
    /// [`ExchangeError::Incomplete`] once the policy's deadline passes.
    pub fn fetch_all(
        &mut self,
        registry: &dyn RegistryClient,
        peers: &[ProcessIdentity],
        keys: &[ExchangeKey],
        policy: WaitPolicy,
        progress: &dyn ProgressEngine,
    ) -> Result<BTreeMap<ProcessIdentity, ExchangeRecord>, ExchangeError> {
        if !self.pending.is_empty() || !self.indexed {
            for op in self.pending_ops()? {
                registry.write(op.identity(), op.key(), op.value())?;
            }
            self.pending.clear();
            self.indexed = true;
        }

        let started = Instant::now();
        let mut records = BTreeMap::new();
        let mut outstanding: Vec<ProcessIdentity> = peers.to_vec();
        loop {
            let mut waiting = Vec::new();
            for peer in outstanding {
                let fetched = if peer == self.identity {
                    Some(self.local_record(keys))
                } else {
                    fetch_peer(registry, peer, keys)?
                };
                match fetched {
                    Some(record) => {
                        records.insert(peer, record);
                    }
                    None => waiting.push(peer),
                }
            }
            outstanding = waiting;

            if outstanding.is_empty() {
                debug!(target: TARGET, peers = records.len(), "exchange complete");
                return Ok(records);
            }
            if policy.expired(started) {
                return Err(ExchangeError::Incomplete {
                    missing: outstanding,
                    waited: started.elapsed(),
                });
            }
            progress.poll();
            thread::sleep(policy.poll_interval());
        }
    }

    fn pending_ops(&self) -> Result<Vec<RegistryOp>, ExchangeError> {
        let mut ops: Vec<RegistryOp> = self
            .pending
            .iter()
            .filter_map(|key| {
                self.published
                    .get(key)
                    .map(|blob| RegistryOp::put(self.identity, key.registry_key(), blob.clone()))
            })
            .collect();
        let names: Vec<&str> = self.published.keys().map(ExchangeKey::as_str).collect();
        let index = serde_json::to_vec(&names)?;
        ops.push(RegistryOp::put(self.identity, INDEX_KEY, index));
        Ok(ops)
    }

    fn local_record(&self, keys: &[ExchangeKey]) -> ExchangeRecord {
        let entries = self
            .published
            .iter()
            .filter(|(key, _)| keys.is_empty() || keys.contains(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        ExchangeRecord { entries }
    }
}

fn fetch_peer(
    registry: &dyn RegistryClient,
    peer: ProcessIdentity,
    keys: &[ExchangeKey],
) -> Result<Option<ExchangeRecord>, RegistryError> {
    let Some(raw_index) = registry.read(peer, INDEX_KEY)? else {
        return Ok(None);
    };
    let index: Vec<String> =
        serde_json::from_slice(&raw_index).map_err(|error| RegistryError::Malformed {
            identity: peer,
            key: String::from(INDEX_KEY),
            message: error.to_string(),
        })?;

    let mut entries = BTreeMap::new();
    for name in index {
        let key = ExchangeKey::new(name);
        if !keys.is_empty() && !keys.contains(&key) {
            continue;
        }
        match registry.read(peer, &key.registry_key())? {
            Some(value) => {
                entries.insert(key, value);
            }
            None => return Ok(None),
        }
    }
    Ok(Some(ExchangeRecord { entries }))
}
