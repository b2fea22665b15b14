//! Mutation policy applied to every admitted HostedCluster
//!
//! Two fixed rules, touching disjoint parts of the object:
//! - the requester annotation is written once and never overwritten
//! - `spec.etcd.managed.storage.restoreSnapshotURL` is never left unset
//!
//! Both rules are total and idempotent, so re-running them on a retried or
//! already mutated object is harmless.

use std::collections::BTreeMap;

use kube::ResourceExt;
use tracing::{debug, info};

use crate::hosted_cluster::HostedCluster;

/// Annotation recording the identity that first admitted the object
pub const REQUESTER_ANNOTATION: &str = "requester";

/// JSON pointer of the field normalized by [`normalize_restore_snapshot_urls`]
pub const RESTORE_SNAPSHOT_URL_PATH: &str = "/spec/etcd/managed/storage/restoreSnapshotURL";

/// Sets `key` to `requester` unless the key is already present.
///
/// An absent map is initialized first. An existing value is kept even when it
/// is empty. Returns whether the annotation was added.
pub fn stamp_requester(
    annotations: &mut Option<BTreeMap<String, String>>,
    key: &str,
    requester: &str,
) -> bool {
    let annotations = annotations.get_or_insert_with(BTreeMap::new);
    if annotations.contains_key(key) {
        return false;
    }

    annotations.insert(key.to_owned(), requester.to_owned());
    true
}

/// Turns an unset snapshot list into an empty one, leaving set lists untouched
pub fn normalize_restore_snapshot_urls(urls: Option<Vec<String>>) -> Vec<String> {
    urls.unwrap_or_default()
}

/// Settings of a [`Mutator`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MutatorConfig {
    /// Annotation key the requester is written to
    pub requester_annotation: String,
}

impl Default for MutatorConfig {
    fn default() -> Self {
        Self {
            requester_annotation: REQUESTER_ANNOTATION.to_owned(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Mutator {
    config: MutatorConfig,
}

impl Mutator {
    pub fn new(config: MutatorConfig) -> Self {
        Self { config }
    }

    /// Applies the mutation policy to `hc` in place
    pub fn apply(&self, hc: &mut HostedCluster, requester: &str) {
        let name = hc.name_any();
        let namespace = hc.namespace().unwrap_or_default();

        let annotations = &mut hc.metadata.annotations;
        if stamp_requester(annotations, &self.config.requester_annotation, requester) {
            info!(
                name = %name,
                namespace = %namespace,
                annotation = %self.config.requester_annotation,
                requester = %requester,
                "HostedCluster is missing requester annotation; adding"
            );
        }

        // Unmanaged etcd has no storage to normalize.
        if let Some(storage) = hc.managed_etcd_storage_mut() {
            if storage.restore_snapshot_url.is_none() {
                debug!(
                    name = %name,
                    namespace = %namespace,
                    path = RESTORE_SNAPSHOT_URL_PATH,
                    "defaulting unset field to an empty list"
                );
            }
            let urls = storage.restore_snapshot_url.take();
            storage.restore_snapshot_url = Some(normalize_restore_snapshot_urls(urls));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosted_cluster::{
        EtcdSpec, HostedClusterSpec, ManagedEtcdSpec, ManagedEtcdStorageSpec,
    };

    fn hosted_cluster(name: &str, urls: Option<Vec<String>>) -> HostedCluster {
        let spec = HostedClusterSpec {
            etcd: Some(EtcdSpec {
                management_type: Some("Managed".into()),
                managed: Some(ManagedEtcdSpec {
                    storage: ManagedEtcdStorageSpec {
                        storage_type: Some("PersistentVolume".into()),
                        restore_snapshot_url: urls,
                        ..Default::default()
                    },
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut hc = HostedCluster::new(name, spec);
        hc.metadata.namespace = Some("clusters".into());
        hc
    }

    fn with_requester(mut hc: HostedCluster, value: &str) -> HostedCluster {
        hc.metadata.annotations = Some(BTreeMap::from([(
            REQUESTER_ANNOTATION.to_owned(),
            value.to_owned(),
        )]));
        hc
    }

    fn urls(hc: &mut HostedCluster) -> Option<Vec<String>> {
        hc.managed_etcd_storage_mut()
            .and_then(|s| s.restore_snapshot_url.clone())
    }

    #[test]
    fn stamp_initializes_missing_map() {
        let mut annotations = None;
        assert!(stamp_requester(&mut annotations, "requester", "alice"));
        assert_eq!(
            annotations,
            Some(BTreeMap::from([("requester".into(), "alice".into())]))
        );
    }

    #[test]
    fn stamp_keeps_existing_value() {
        let mut annotations = Some(BTreeMap::from([("requester".into(), "bob".into())]));
        assert!(!stamp_requester(&mut annotations, "requester", "alice"));
        assert_eq!(annotations.unwrap()["requester"], "bob");
    }

    #[test]
    fn stamp_keeps_empty_value() {
        let mut annotations = Some(BTreeMap::from([("requester".into(), String::new())]));
        assert!(!stamp_requester(&mut annotations, "requester", "alice"));
        assert_eq!(annotations.unwrap()["requester"], "");
    }

    #[test]
    fn stamp_leaves_other_annotations() {
        let mut annotations = Some(BTreeMap::from([("owner".into(), "team-a".into())]));
        stamp_requester(&mut annotations, "requester", "alice");

        let annotations = annotations.unwrap();
        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations["owner"], "team-a");
        assert_eq!(annotations["requester"], "alice");
    }

    #[test]
    fn normalize_unset_is_empty() {
        assert_eq!(normalize_restore_snapshot_urls(None), Vec::<String>::new());
    }

    #[test]
    fn normalize_preserves_order_and_duplicates() {
        let set = vec![
            "s3://b/2".to_string(),
            "s3://a/1".to_string(),
            "s3://b/2".to_string(),
        ];
        assert_eq!(normalize_restore_snapshot_urls(Some(set.clone())), set);
    }

    #[test]
    fn apply_stamps_unannotated_object() {
        for requester in ["requester-1", "system:admin", ""] {
            let mut hc = hosted_cluster("hc", None);
            Mutator::default().apply(&mut hc, requester);
            assert_eq!(hc.annotations()[REQUESTER_ANNOTATION], requester);
        }
    }

    #[test]
    fn apply_keeps_existing_requester() {
        let mut hc = with_requester(hosted_cluster("hc", None), "original");
        Mutator::default().apply(&mut hc, "someone-else");
        assert_eq!(hc.annotations()[REQUESTER_ANNOTATION], "original");
    }

    #[test]
    fn apply_is_idempotent() {
        let mutator = Mutator::default();

        let mut once = hosted_cluster("hc", None);
        mutator.apply(&mut once, "requester-1");

        let mut twice = once.clone();
        mutator.apply(&mut twice, "requester-1");
        assert_eq!(twice, once);

        mutator.apply(&mut twice, "requester-2");
        assert_eq!(twice, once);
    }

    #[test]
    fn apply_defaults_unset_urls() {
        let mut hc = hosted_cluster("hc", None);
        Mutator::default().apply(&mut hc, "requester-1");
        assert_eq!(urls(&mut hc), Some(vec![]));
    }

    #[test]
    fn apply_preserves_set_urls() {
        let set = vec!["s3://bucket/snap-2".to_string(), "s3://bucket/snap-1".to_string()];
        let mut hc = hosted_cluster("hc", Some(set.clone()));
        Mutator::default().apply(&mut hc, "requester-1");
        assert_eq!(urls(&mut hc), Some(set));
    }

    #[test]
    fn apply_skips_unmanaged_etcd() {
        let spec = HostedClusterSpec {
            etcd: Some(EtcdSpec {
                management_type: Some("Unmanaged".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut hc = HostedCluster::new("hc-ext", spec.clone());
        Mutator::default().apply(&mut hc, "requester-1");

        assert_eq!(hc.spec, spec);
        assert_eq!(hc.annotations()[REQUESTER_ANNOTATION], "requester-1");
    }

    #[test]
    fn apply_uses_configured_annotation() {
        let mutator = Mutator::new(MutatorConfig {
            requester_annotation: "example.com/requester".into(),
        });
        let mut hc = hosted_cluster("hc", None);
        mutator.apply(&mut hc, "requester-1");

        assert_eq!(hc.annotations()["example.com/requester"], "requester-1");
        assert!(!hc.annotations().contains_key(REQUESTER_ANNOTATION));
    }

    #[test]
    fn scenario_new_cluster() {
        let mut hc = hosted_cluster("hc-1", None);
        Mutator::default().apply(&mut hc, "requester-1");

        assert_eq!(
            hc.metadata.annotations,
            Some(BTreeMap::from([("requester".into(), "requester-1".into())]))
        );
        assert_eq!(urls(&mut hc), Some(vec![]));
    }

    #[test]
    fn scenario_already_annotated_cluster() {
        let mut hc = with_requester(hosted_cluster("hc-2", Some(vec![])), "requester-x");
        let before = hc.clone();
        Mutator::default().apply(&mut hc, "requester-2");

        assert_eq!(
            hc.metadata.annotations,
            Some(BTreeMap::from([("requester".into(), "requester-x".into())]))
        );
        assert_eq!(urls(&mut hc), Some(vec![]));
        assert_eq!(hc, before);
    }
}
