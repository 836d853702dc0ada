// src/model/application.rs

//! Application: one package of one Source

use serde::{Deserialize, Serialize};

use super::{ChartVersion, ObjectMeta, Resource, labels};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub metadata: ObjectMeta,
    /// Package name as it appears in the repository index
    #[serde(default)]
    pub app_name: String,
    /// Every version ever seen, in the order it was first recorded
    #[serde(default)]
    pub versions: Vec<ChartVersion>,
}

impl Application {
    /// Record identity for `package` synchronized from `source`
    pub fn identity(source: &str, package: &str) -> String {
        format!("{source}.{package}")
    }

    /// A fresh, empty Application seeded with its identity labels
    pub fn for_package(source: &str, package: &str) -> Self {
        let mut metadata = ObjectMeta::named(Self::identity(source, package));
        metadata
            .labels
            .insert(labels::SOURCE_NAME.to_string(), source.to_string());
        metadata
            .labels
            .insert(labels::APPLICATION_NAME.to_string(), package.to_string());

        Self {
            metadata,
            app_name: package.to_string(),
            versions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn source_name(&self) -> Option<&str> {
        self.metadata.labels.get(labels::SOURCE_NAME).map(String::as_str)
    }

    pub fn has_version(&self, version: &str) -> bool {
        self.versions.iter().any(|v| v.version() == version)
    }

    pub fn categories(&self) -> Vec<&str> {
        self.metadata
            .labels
            .keys()
            .filter_map(|k| labels::category_of(k))
            .collect()
    }

    pub fn is_deprecated(&self) -> bool {
        self.metadata
            .labels
            .get(labels::DEPRECATED)
            .is_some_and(|v| v == "true")
    }
}

impl Resource for Application {
    const KIND: &'static str = "Application";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
