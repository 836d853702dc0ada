// src/controller/ownership.rs

//! Applications owned by a Source

use crate::error::Result;
use crate::model::{Application, Resource, Source, labels};
use crate::store::{LabelSelector, Store};

/// Applications labelled with `source_name` whose controller is that Source
///
/// The label alone is not proof of ownership: a record left behind by a
/// same-named Source that was deleted and recreated, or one created by hand,
/// may carry it.
pub fn owned_applications(store: &Store, source_name: &str) -> Result<Vec<Application>> {
    let selector = LabelSelector::everything().eq(labels::SOURCE_NAME, source_name);
    let apps: Vec<Application> = store.list(&selector)?;

    Ok(apps
        .into_iter()
        .filter(|app| {
            app.metadata
                .controller()
                .is_some_and(|owner| owner.kind == Source::KIND && owner.name == source_name)
        })
        .collect())
}

pub fn count_owned(store: &Store, source_name: &str) -> Result<usize> {
    Ok(owned_applications(store, source_name)?.len())
}
