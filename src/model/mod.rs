// src/model/mod.rs

//! Record types persisted in the resource store
//!
//! - [`Source`]: a registered chart repository and its sync status
//! - [`Application`]: one package of a Source with its accumulated versions
//! - [`Release`]: a decoded deployment snapshot
//! - [`Secret`] / [`ConfigMap`]: inputs owned by other tooling

mod application;
mod chart;
pub mod labels;
mod meta;
mod release;
mod secret;
mod source;

pub use application::Application;
pub use chart::{ChartMetadata, ChartVersion, Dependency, Maintainer};
pub use meta::{ObjectKey, ObjectMeta, OwnerReference, set_controller_reference, set_owner_reference};
pub use release::{
    Chart, Hook, HookDeletePolicy, HookEvent, HookExecution, HookPhase, Info, Lock, Release,
    ReleaseSpec, ReleaseStatus, TemplateFile,
};
pub use secret::{ConfigMap, HELM_RELEASE_SECRET_TYPE, RELEASE_DATA_KEY, Secret};
pub use source::{Source, SourceSpec, SourceStatus, SyncState};

use serde::Serialize;
use serde::de::DeserializeOwned;

/// A record kind the store knows how to persist
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Kind name used as the storage discriminator and in owner references
    const KIND: &'static str;

    fn metadata(&self) -> &ObjectMeta;
    fn metadata_mut(&mut self) -> &mut ObjectMeta;

    fn key(&self) -> ObjectKey {
        self.metadata().key()
    }
}

/// A record with a status subresource, written separately from its spec
pub trait HasStatus: Resource {
    type Status: Serialize + DeserializeOwned + Clone;

    fn status(&self) -> &Self::Status;
    fn status_mut(&mut self) -> &mut Self::Status;
}
