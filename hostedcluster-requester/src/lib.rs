//! Mutating admission webhook for HyperShift `HostedCluster` resources
//!
//! On every create and update the webhook
//! - records the identity that first requested the cluster in the
//!   [`REQUESTER_ANNOTATION`] annotation, never overwriting it afterwards
//! - fills in `spec.etcd.managed.storage.restoreSnapshotURL` with an empty list
//!   when it is unset, since the upstream schema requires the key
//!
//! The changes are returned to the API server as a JSON patch computed from
//! the admitted object and its mutated copy.

pub mod admission;
pub mod config;
pub mod error;
pub mod hosted_cluster;
pub mod mutator;
pub mod server;

pub use admission::{HOSTED_CLUSTER_WEBHOOK_PATH, HostedClusterAnnotator, MutatingAdmissionHandler};
pub use config::Config;
pub use error::{Error, Result};
pub use hosted_cluster::HostedCluster;
pub use mutator::{Mutator, MutatorConfig, REQUESTER_ANNOTATION};
pub use server::WebhookServer;
