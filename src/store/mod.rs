//! Experience persistence: full records plus a bounded, newest-first history index.
//!
//! Layout in the backend:
//! - `ar_<id>`: the full JSON record of one experience
//! - `ar_experiences`: JSON array of `{id, title, timestamp}` summaries
//!
//! A backend write failure never aborts a put. The record stays in the session cache and the
//! outcome carries a `StorageWriteFailed` warning.

pub mod backend;

use std::collections::HashMap;

pub use backend::{FileBackend, KvBackend, MemoryBackend};

use crate::{
    foundation::error::{ArcraftError, ArcraftResult},
    model::{Experience, ExperienceId, ExperienceSummary, decode_record},
};

pub const INDEX_KEY: &str = "ar_experiences";
pub const DEFAULT_INDEX_CAP: usize = 10;

pub fn record_key(id: &ExperienceId) -> String {
    format!("ar_{id}")
}

/// What happens to a full record once its summary falls off the end of the index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrphanPolicy {
    /// Delete the record together with its index entry.
    #[default]
    Evict,
    /// Leave the record reachable by id only.
    Keep,
}

#[derive(Debug)]
pub struct PutOutcome {
    /// Both record and index reached the backend.
    pub persisted: bool,
    /// Ids whose summaries were dropped from the index by this put.
    pub evicted: Vec<ExperienceId>,
    /// Degraded persistence, to be surfaced as a non-blocking warning.
    pub warning: Option<ArcraftError>,
}

pub struct ExperienceStore<B: KvBackend> {
    backend: B,
    cap: usize,
    orphan_policy: OrphanPolicy,
    index: Vec<ExperienceSummary>,
    cache: HashMap<ExperienceId, Experience>,
}

impl<B: KvBackend> ExperienceStore<B> {
    /// Open a store over `backend`, reading the current index. A corrupt index reads as empty.
    pub fn open(backend: B, cap: usize, orphan_policy: OrphanPolicy) -> ArcraftResult<Self> {
        if cap == 0 {
            return Err(ArcraftError::validation("index cap must be > 0"));
        }
        let mut store = Self {
            backend,
            cap,
            orphan_policy,
            index: Vec::new(),
            cache: HashMap::new(),
        };
        store.index = store.read_index();
        Ok(store)
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn orphan_policy(&self) -> OrphanPolicy {
        self.orphan_policy
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    fn read_index(&self) -> Vec<ExperienceSummary> {
        let raw = match self.backend.get(INDEX_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "experience index unreadable; treating as empty");
                return Vec::new();
            }
        };
        match serde_json::from_str::<Vec<ExperienceSummary>>(&raw) {
            Ok(mut entries) => {
                entries.truncate(self.cap);
                entries
            }
            Err(e) => {
                tracing::warn!(error = %e, "experience index is corrupt; treating as empty");
                Vec::new()
            }
        }
    }

    /// Persist `exp` and push its summary to the front of the index.
    ///
    /// Only serialization problems are returned as `Err`; backend failures degrade into
    /// `PutOutcome::warning`. On such a failure the index and the other records are left as
    /// they were and `exp` is only reachable through this session's cache.
    #[tracing::instrument(skip(self, exp), fields(id = %exp.id()))]
    pub fn put(&mut self, exp: &Experience) -> ArcraftResult<PutOutcome> {
        let record = serde_json::to_string(exp)
            .map_err(|e| ArcraftError::serde(format!("serialize experience: {e}")))?;

        let mut next_index = Vec::with_capacity(self.cap + 1);
        next_index.push(exp.summary());
        next_index.extend(
            self.index
                .iter()
                .filter(|s| s.id != *exp.id())
                .cloned(),
        );
        let dropped: Vec<ExperienceSummary> = if next_index.len() > self.cap {
            next_index.split_off(self.cap)
        } else {
            Vec::new()
        };
        let index_json = serde_json::to_string(&next_index)
            .map_err(|e| ArcraftError::serde(format!("serialize experience index: {e}")))?;

        // Session-only until both writes land; the index never names an unsaved record.
        self.cache.insert(exp.id().clone(), exp.clone());

        let key = record_key(exp.id());
        if let Err(e) = self.backend.set(&key, &record) {
            tracing::warn!(error = %e, "record write failed; experience kept for this session only");
            return Ok(PutOutcome {
                persisted: false,
                evicted: Vec::new(),
                warning: Some(as_write_failure(e)),
            });
        }
        if let Err(e) = self.backend.set(INDEX_KEY, &index_json) {
            tracing::warn!(error = %e, "index write failed; rolling back record");
            if let Err(rollback) = self.backend.remove(&key) {
                tracing::warn!(error = %rollback, "record rollback failed");
            }
            return Ok(PutOutcome {
                persisted: false,
                evicted: Vec::new(),
                warning: Some(as_write_failure(e)),
            });
        }

        self.index = next_index;
        let evicted: Vec<ExperienceId> = dropped.into_iter().map(|s| s.id).collect();
        if self.orphan_policy == OrphanPolicy::Evict {
            for id in &evicted {
                self.cache.remove(id);
                if let Err(e) = self.backend.remove(&record_key(id)) {
                    tracing::warn!(error = %e, %id, "failed to evict orphaned record");
                }
            }
        }
        tracing::info!(
            evicted = evicted.len(),
            index_len = self.index.len(),
            "experience stored"
        );
        Ok(PutOutcome {
            persisted: true,
            evicted,
            warning: None,
        })
    }

    /// Fetch a record: session cache first, then the backend. The index is not consulted.
    #[tracing::instrument(skip(self))]
    pub fn get(&mut self, id: &ExperienceId) -> ArcraftResult<Option<Experience>> {
        if let Some(exp) = self.cache.get(id) {
            return Ok(Some(exp.clone()));
        }
        let Some(raw) = self.backend.get(&record_key(id))? else {
            return Ok(None);
        };
        let exp = decode_record(&raw)?;
        if exp.id() != id {
            return Err(ArcraftError::serde(format!(
                "record under '{}' carries id '{}'",
                record_key(id),
                exp.id()
            )));
        }
        self.cache.insert(id.clone(), exp.clone());
        Ok(Some(exp))
    }

    /// The index, newest first.
    pub fn list(&self) -> &[ExperienceSummary] {
        &self.index
    }

    /// Remove every indexed or cached record, the index and the session cache.
    pub fn clear(&mut self) -> ArcraftResult<usize> {
        let mut ids: Vec<ExperienceId> = self.index.iter().map(|s| s.id.clone()).collect();
        for id in self.cache.keys() {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        for id in &ids {
            self.backend.remove(&record_key(id))?;
        }
        self.backend.remove(INDEX_KEY)?;
        self.index.clear();
        self.cache.clear();
        tracing::info!(removed = ids.len(), "experience store cleared");
        Ok(ids.len())
    }

    /// Warm the session cache with every indexed record. Unreadable records are skipped.
    pub fn load_recent(&mut self) -> usize {
        let ids: Vec<ExperienceId> = self.index.iter().map(|s| s.id.clone()).collect();
        let mut loaded = 0;
        for id in ids {
            match self.get(&id) {
                Ok(Some(_)) => loaded += 1,
                Ok(None) => tracing::debug!(%id, "indexed record is missing"),
                Err(e) => tracing::warn!(error = %e, %id, "skipping unreadable record"),
            }
        }
        loaded
    }
}

fn as_write_failure(e: ArcraftError) -> ArcraftError {
    match e {
        ArcraftError::StorageWriteFailed(_) => e,
        other => ArcraftError::storage_write_failed(other.to_string()),
    }
}
