// src/model/release.rs

//! Release records decoded from Helm release payloads
//!
//! Field names follow the Helm v3 release JSON encoding so a decoded payload
//! deserializes straight into [`ReleaseSpec`].

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ChartMetadata, Dependency, ObjectMeta, Resource};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReleaseStatus {
    Deployed,
    Uninstalled,
    /// A newer release object exists; superseded releases are never stored
    Superseded,
    Failed,
    Uninstalling,
    PendingInstall,
    PendingUpgrade,
    PendingRollback,
    #[default]
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReleaseStatus::Unknown => "unknown",
            ReleaseStatus::Deployed => "deployed",
            ReleaseStatus::Uninstalled => "uninstalled",
            ReleaseStatus::Superseded => "superseded",
            ReleaseStatus::Failed => "failed",
            ReleaseStatus::Uninstalling => "uninstalling",
            ReleaseStatus::PendingInstall => "pending-install",
            ReleaseStatus::PendingUpgrade => "pending-upgrade",
            ReleaseStatus::PendingRollback => "pending-rollback",
        };
        write!(f, "{s}")
    }
}

/// Point-in-time information about a release
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Info {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub first_deployed: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_deployed: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub deleted: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub status: ReleaseStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
}

/// Dependency lock recorded with a chart
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lock {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub generated: String,
    #[serde(default)]
    pub digest: String,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

/// A chart template; `data` stays base64 encoded as Helm wrote it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateFile {
    pub name: String,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ChartMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock: Option<Lock>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<TemplateFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookEvent {
    PreInstall,
    PostInstall,
    PreDelete,
    PostDelete,
    PreUpgrade,
    PostUpgrade,
    PreRollback,
    PostRollback,
    Test,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HookPhase {
    Running,
    Succeeded,
    Failed,
    /// Also covers the empty phase Helm writes for hooks that never ran
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookDeletePolicy {
    HookSucceeded,
    HookFailed,
    BeforeHookCreation,
}

/// Result of the last execution of a hook
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HookExecution {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub started_at: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub completed_at: String,
    #[serde(default)]
    pub phase: HookPhase,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hook {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub manifest: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<HookEvent>,
    #[serde(default)]
    pub last_run: HookExecution,
    #[serde(default)]
    pub weight: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delete_policies: Vec<HookDeletePolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReleaseSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<Info>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart: Option<Chart>,
    /// User-supplied values overriding the chart defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub manifest: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hooks: Vec<Hook>,
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub namespace: String,
}

impl ReleaseSpec {
    pub fn status(&self) -> ReleaseStatus {
        self.info.as_ref().map(|i| i.status).unwrap_or_default()
    }

    pub fn is_superseded(&self) -> bool {
        self.status() == ReleaseStatus::Superseded
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub metadata: ObjectMeta,
    pub spec: ReleaseSpec,
}

impl Resource for Release {
    const KIND: &'static str = "Release";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_spec_from_helm_json() {
        let json = r#"{
            "name": "wordpress",
            "info": {
                "first_deployed": "2020-06-01T10:00:00Z",
                "last_deployed": "2020-06-02T10:00:00Z",
                "status": "pending-upgrade",
                "notes": "visit http://localhost"
            },
            "chart": {
                "metadata": {"name": "wordpress", "version": "9.0.3", "apiVersion": "v1"},
                "templates": [{"name": "templates/svc.yaml", "data": "YXBpVmVyc2lvbjogdjE="}],
                "values": {"ignored": true}
            },
            "config": {"replicas": 2},
            "hooks": [{
                "name": "wordpress-test",
                "kind": "Pod",
                "events": ["test"],
                "last_run": {"started_at": "", "completed_at": "", "phase": "Succeeded"},
                "delete_policies": ["before-hook-creation"]
            }],
            "version": 3,
            "namespace": "default"
        }"#;

        let spec: ReleaseSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.version, 3);
        assert_eq!(spec.status(), ReleaseStatus::PendingUpgrade);
        assert!(!spec.is_superseded());
        let chart = spec.chart.as_ref().unwrap();
        assert_eq!(chart.metadata.as_ref().unwrap().version, "9.0.3");
        assert_eq!(spec.hooks[0].events, vec![HookEvent::Test]);
        assert_eq!(spec.hooks[0].last_run.phase, HookPhase::Succeeded);
        assert_eq!(
            spec.hooks[0].delete_policies,
            vec![HookDeletePolicy::BeforeHookCreation]
        );
    }

    #[test]
    fn test_unrecognised_status_is_unknown() {
        let spec: ReleaseSpec =
            serde_json::from_str(r#"{"name": "x", "info": {"status": "exploded"}}"#).unwrap();
        assert_eq!(spec.status(), ReleaseStatus::Unknown);
    }

    #[test]
    fn test_missing_info_is_unknown() {
        let spec: ReleaseSpec = serde_json::from_str(r#"{"name": "x", "version": 1}"#).unwrap();
        assert_eq!(spec.status(), ReleaseStatus::Unknown);
    }

    #[test]
    fn test_unknown_variants_survive_storage() {
        let phase: HookExecution = serde_json::from_str(r#"{"phase": ""}"#).unwrap();
        assert_eq!(phase.phase, HookPhase::Unknown);

        let stored = serde_json::to_string(&ReleaseStatus::Unknown).unwrap();
        assert_eq!(stored, r#""unknown""#);
        let back: ReleaseStatus = serde_json::from_str(&stored).unwrap();
        assert_eq!(back, ReleaseStatus::Unknown);
        assert_eq!(
            serde_json::from_str::<ReleaseStatus>(r#""pending-install""#).unwrap(),
            ReleaseStatus::PendingInstall
        );
    }
}
