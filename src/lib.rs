// src/lib.rs

//! Marketplace catalog controller
//!
//! Keeps a catalog of Helm charts in sync with the chart repositories
//! registered as Sources, and mirrors deployed Helm releases into Release
//! records.
//!
//! # Architecture
//!
//! - Store-first: every record lives in a resource store (SQLite or memory)
//!   with optimistic concurrency and owner-based garbage collection
//! - Reconcilers: level-triggered, never sleep, return a scheduling action
//! - Additive catalog: versions are only ever appended to Applications
//! - Host scheduler: a deduplicating work queue drained by worker threads

pub mod catalog;
pub mod compression;
pub mod config;
pub mod controller;
pub mod duration;
mod error;
pub mod events;
pub mod model;
pub mod repository;
pub mod store;

pub use config::{ControllerConfig, LogFormat};
pub use controller::{Controller, ControllerOptions, ReleaseReconciler, SourceReconciler};
pub use error::{Error, Result};
pub use events::{EventRecorder, MemoryRecorder, TracingRecorder};
pub use store::{LabelSelector, OpResult, Store};
