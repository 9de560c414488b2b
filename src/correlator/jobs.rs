//! Pending-job table.
//!
//! Every correlated call owns one entry keyed by its [`JobId`]. The table
//! also remembers ids that were handed out for calls still waiting behind
//! the readiness gate, so those ids stay unique and can be cancelled before
//! they are sent.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::codec::{Payload, parse_json};
use crate::identifiers::{IdGenerator, JobId};

// ============================================================================
// Types
// ============================================================================

/// Handler of a streaming subscription, invoked once per delivery.
pub type StreamHandler = Arc<dyn Fn(Option<Value>) + Send + Sync>;

/// How a delivered payload is decoded before reaching a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoding {
    /// Text as-is, structured values re-serialized to text.
    Raw,
    /// Text parsed as JSON, structured values as-is.
    Json,
}

impl Decoding {
    /// Applies the policy to a payload.
    ///
    /// Raw decoding always yields `Some(Value::String(..))`. JSON decoding
    /// yields `None` for malformed text.
    #[must_use]
    pub fn apply(self, payload: Payload) -> Option<Value> {
        match self {
            Self::Raw => Some(Value::String(payload.into_text())),
            Self::Json => parse_json(payload),
        }
    }
}

/// Shape of a pending job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// Answered once, result handed over as text.
    OnceRaw,
    /// Answered once, result decoded as JSON.
    OnceJson,
    /// Answered any number of times until unsubscribed.
    Streaming,
}

impl JobKind {
    /// Returns `true` for kinds removed by their first delivery.
    #[inline]
    #[must_use]
    pub fn is_once(self) -> bool {
        !matches!(self, Self::Streaming)
    }
}

// ============================================================================
// Job
// ============================================================================

/// One outstanding unit of correlation.
pub(crate) enum Job {
    OnceRaw(oneshot::Sender<String>),
    OnceJson(oneshot::Sender<Option<Value>>),
    Streaming {
        decoding: Decoding,
        handler: StreamHandler,
    },
}

impl Job {
    pub(crate) fn kind(&self) -> JobKind {
        match self {
            Self::OnceRaw(_) => JobKind::OnceRaw,
            Self::OnceJson(_) => JobKind::OnceJson,
            Self::Streaming { .. } => JobKind::Streaming,
        }
    }
}

/// What `dequeue` does with a delivery, decided under the table lock and
/// carried out after it is released.
pub(crate) enum Route {
    OnceRaw(oneshot::Sender<String>),
    OnceJson(oneshot::Sender<Option<Value>>),
    Stream(Decoding, StreamHandler),
}

impl Route {
    /// Decodes `payload` and hands it to the job's callback.
    ///
    /// A dropped receiver means the caller lost interest, which is fine.
    pub(crate) fn deliver(self, payload: Payload) {
        match self {
            Self::OnceRaw(reply) => {
                let _ = reply.send(payload.into_text());
            }
            Self::OnceJson(reply) => {
                let _ = reply.send(parse_json(payload));
            }
            Self::Stream(decoding, handler) => handler(decoding.apply(payload)),
        }
    }
}

// ============================================================================
// JobTable
// ============================================================================

/// Map of job ids to pending jobs, plus reserved ids.
pub(crate) struct JobTable {
    jobs: FxHashMap<JobId, Job>,
    reserved: FxHashSet<JobId>,
    ids: IdGenerator,
}

impl JobTable {
    pub(crate) fn new(ids: IdGenerator) -> Self {
        Self {
            jobs: FxHashMap::default(),
            reserved: FxHashSet::default(),
            ids,
        }
    }

    /// Generates an id unique among pending and reserved jobs and reserves it.
    pub(crate) fn reserve(&mut self) -> JobId {
        let id = self.ids.next_unique(|candidate| {
            self.jobs.contains_key(candidate) || self.reserved.contains(candidate)
        });
        self.reserved.insert(id.clone());
        id
    }

    /// Turns a reservation into a pending job.
    ///
    /// Returns `false` (and drops `job`) if the reservation was cancelled.
    pub(crate) fn activate(&mut self, id: &JobId, job: Job) -> bool {
        if !self.reserved.remove(id) {
            return false;
        }
        self.jobs.insert(id.clone(), job);
        true
    }

    /// Decides how to route a delivery for `id`.
    ///
    /// Once-jobs are removed, streaming jobs stay.
    pub(crate) fn route(&mut self, id: &str) -> Option<Route> {
        if let Some(Job::Streaming { decoding, handler }) = self.jobs.get(id) {
            return Some(Route::Stream(*decoding, Arc::clone(handler)));
        }
        match self.jobs.remove(id)? {
            Job::OnceRaw(reply) => Some(Route::OnceRaw(reply)),
            Job::OnceJson(reply) => Some(Route::OnceJson(reply)),
            Job::Streaming { .. } => None,
        }
    }

    /// Removes a pending job or cancels a reservation.
    pub(crate) fn remove(&mut self, id: &str) -> Option<Job> {
        self.reserved.remove(id);
        self.jobs.remove(id)
    }

    pub(crate) fn kind(&self, id: &str) -> Option<JobKind> {
        self.jobs.get(id).map(Job::kind)
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.jobs.contains_key(id)
    }

    #[cfg(test)]
    pub(crate) fn is_reserved(&self, id: &str) -> bool {
        self.reserved.contains(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Empties the table, returning the dropped jobs.
    pub(crate) fn clear(&mut self) -> Vec<Job> {
        self.reserved.clear();
        self.jobs.drain().map(|(_, job)| job).collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
