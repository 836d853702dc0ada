// src/controller/mod.rs

//! Reconcilers and the host scheduler that drives them
//!
//! A reconcile never sleeps: it looks at the current state of one record,
//! does the work, and returns an [`Action`] telling the scheduler when to
//! come back.

pub mod ownership;
pub mod queue;
pub mod release;
pub mod runtime;
pub mod source;

pub use ownership::{count_owned, owned_applications};
pub use queue::WorkQueue;
pub use release::{ReleaseReconciler, decode_release};
pub use runtime::{Controller, ControllerOptions};
pub use source::{SourceReconciler, op};

use crate::model::ObjectKey;
use std::fmt;
use std::time::Duration;

/// Why a reconcile is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// The record appeared or its generation moved
    Changed,
    /// A previous reconcile asked to run again immediately
    Requeued,
    /// A delay requested by a previous reconcile elapsed
    Scheduled,
}

impl Trigger {
    /// Combine two pending triggers for the same key; a change always wins
    pub fn merge(self, other: Trigger) -> Trigger {
        match (self, other) {
            (Trigger::Changed, _) | (_, Trigger::Changed) => Trigger::Changed,
            (Trigger::Requeued, _) | (_, Trigger::Requeued) => Trigger::Requeued,
            _ => Trigger::Scheduled,
        }
    }
}

/// Scheduling instruction returned by a reconcile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Run again right away
    Requeue,
    /// Run again once the delay has elapsed
    RequeueAfter(Duration),
    /// Nothing to do until the record changes
    AwaitChange,
}

/// A unit of work for the scheduler
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Request {
    /// Synchronize the named Source
    Source(String),
    /// Materialize the Release held by the Secret at this key
    Release(ObjectKey),
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Source(name) => write!(f, "source {name}"),
            Request::Release(key) => write!(f, "secret {key}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_merge() {
        assert_eq!(Trigger::Scheduled.merge(Trigger::Changed), Trigger::Changed);
        assert_eq!(Trigger::Requeued.merge(Trigger::Scheduled), Trigger::Requeued);
        assert_eq!(Trigger::Scheduled.merge(Trigger::Scheduled), Trigger::Scheduled);
    }

    #[test]
    fn test_request_display() {
        assert_eq!(Request::Source("stable".into()).to_string(), "source stable");
        assert_eq!(
            Request::Release(ObjectKey::namespaced("default", "s")).to_string(),
            "secret default/s"
        );
    }
}
