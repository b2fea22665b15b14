//! Typed view of the HyperShift `HostedCluster` resource
//!
//! Only the parts of the schema the mutator touches are modeled. Every level
//! keeps the fields it does not model in a flattened map so that decoding and
//! re-encoding an object leaves it unchanged.

use std::collections::BTreeMap;

use kube::CustomResource;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fields of an object that are carried through without being interpreted
pub type Unmodeled = BTreeMap<String, Value>;

/// Desired state of a hosted control plane
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[kube(
    group = "hypershift.openshift.io",
    version = "v1beta1",
    kind = "HostedCluster",
    namespaced,
    status = "HostedClusterStatus",
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct HostedClusterSpec {
    /// Etcd configuration of the control plane
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etcd: Option<EtcdSpec>,

    #[serde(flatten)]
    pub rest: Unmodeled,
}

/// Observed state, carried opaquely
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct HostedClusterStatus {
    #[serde(flatten)]
    pub fields: Unmodeled,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EtcdSpec {
    /// `Managed` or `Unmanaged`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management_type: Option<String>,

    /// Present when the control plane runs its own etcd
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed: Option<ManagedEtcdSpec>,

    #[serde(flatten)]
    pub rest: Unmodeled,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManagedEtcdSpec {
    #[serde(default)]
    pub storage: ManagedEtcdStorageSpec,

    #[serde(flatten)]
    pub rest: Unmodeled,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManagedEtcdStorageSpec {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<String>,

    /// Snapshot URLs etcd is restored from on first start.
    ///
    /// The upstream schema requires this key to be present, yet an unset list
    /// is dropped on encode. The mutator fills it in before the object is
    /// stored.
    #[serde(
        rename = "restoreSnapshotURL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub restore_snapshot_url: Option<Vec<String>>,

    #[serde(flatten)]
    pub rest: Unmodeled,
}

impl HostedCluster {
    /// Storage settings of the managed etcd, if the cluster has one
    pub fn managed_etcd_storage_mut(&mut self) -> Option<&mut ManagedEtcdStorageSpec> {
        self.spec
            .etcd
            .as_mut()
            .and_then(|etcd| etcd.managed.as_mut())
            .map(|managed| &mut managed.storage)
    }
}
