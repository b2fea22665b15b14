use std::error::Error as StdError;

use async_trait::async_trait;
use kube::ResourceExt;
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::hosted_cluster::HostedCluster;
use crate::mutator::Mutator;
use crate::{Error, Result};

/// Path the HostedCluster mutator is served on
pub const HOSTED_CLUSTER_WEBHOOK_PATH: &str = "/mutate-v1beta1-hostedcluster";

/// Status code reported when a handler fails and the request is denied
const INTERNAL_ERROR: u16 = 500;

/// A mutation served by [`WebhookServer`](crate::WebhookServer) on one path
///
/// An error makes [`review`] deny the request with status 500, so the API
/// server never stores an object the handler failed to process.
#[async_trait]
pub trait MutatingAdmissionHandler: Send + Sync {
    type Err: StdError + Send + Sync + 'static;

    /// Name used as the `handler` log field and as the prefix of denial messages
    fn name(&self) -> &'static str;

    /// Returns an allowing response for `req`, carrying a JSON patch when the
    /// object had to change
    async fn mutate(
        &self,
        req: &AdmissionRequest<DynamicObject>,
    ) -> Result<AdmissionResponse, Self::Err>;
}

/// Records the requester of HostedCluster objects and normalizes their etcd storage
#[derive(Clone, Debug, Default)]
pub struct HostedClusterAnnotator {
    mutator: Mutator,
}

impl HostedClusterAnnotator {
    pub fn new(mutator: Mutator) -> Self {
        Self { mutator }
    }
}

#[async_trait]
impl MutatingAdmissionHandler for HostedClusterAnnotator {
    type Err = Error;

    fn name(&self) -> &'static str {
        "HostedClusterAnnotator"
    }

    async fn mutate(&self, req: &AdmissionRequest<DynamicObject>) -> Result<AdmissionResponse> {
        let Some(obj) = &req.object else {
            debug!(uid = %req.uid, "no object in request, allowing unchanged");
            return Ok(AdmissionResponse::from(req));
        };

        let raw = serde_json::to_value(obj).map_err(Error::DecodeError)?;
        let mut hosted_cluster: HostedCluster =
            serde_json::from_value(raw).map_err(Error::DecodeError)?;

        // Diff against the decoded object rather than the raw one, so that
        // explicit nulls dropped by decoding do not turn into removals.
        let original = serde_json::to_value(&hosted_cluster).map_err(Error::SerializationError)?;

        let requester = req.user_info.username.as_deref().unwrap_or_default();
        self.mutator.apply(&mut hosted_cluster, requester);

        patch_response(req, &original, &hosted_cluster)
    }
}

/// Builds an allowing response carrying the JSON patch from `original` to `mutated`
///
/// Only the differences between the two documents end up in the patch. When
/// there are none the response has no patch at all.
pub fn patch_response<T>(
    req: &AdmissionRequest<DynamicObject>,
    original: &Value,
    mutated: &T,
) -> Result<AdmissionResponse>
where
    T: Serialize,
{
    let mutated = serde_json::to_value(mutated).map_err(Error::SerializationError)?;
    let patch = json_patch::diff(original, &mutated);

    let res = AdmissionResponse::from(req);
    if patch.0.is_empty() {
        return Ok(res);
    }

    Ok(res.with_patch(patch)?)
}

/// Runs `handler` against an admission review and wraps the outcome in a review
///
/// Handler failures deny the request.
pub async fn review<H>(
    handler: &H,
    body: AdmissionReview<DynamicObject>,
) -> AdmissionReview<DynamicObject>
where
    H: MutatingAdmissionHandler + ?Sized,
{
    let req: AdmissionRequest<_> = match body.try_into() {
        Ok(req) => req,
        Err(err) => {
            error!("invalid admission request: {}", err);
            return AdmissionResponse::invalid(err.to_string()).into_review();
        }
    };

    let (name, namespace) = req
        .object
        .as_ref()
        .map(|obj| (obj.name_any(), obj.namespace().unwrap_or_default()))
        .unwrap_or_else(|| (req.name.clone(), req.namespace.clone().unwrap_or_default()));

    let res = match handler.mutate(&req).await {
        Ok(res) => {
            info!(
                handler = handler.name(),
                uid = %req.uid,
                operation = ?req.operation,
                name = %name,
                namespace = %namespace,
                patched = res.patch.is_some(),
                "mutated resource"
            );
            res
        }
        Err(err) => {
            error!(
                handler = handler.name(),
                uid = %req.uid,
                operation = ?req.operation,
                name = %name,
                namespace = %namespace,
                error = %err,
                "mutation failed"
            );
            errored(&req, format!("{}: {}", handler.name(), err))
        }
    };

    res.into_review()
}

fn errored(req: &AdmissionRequest<DynamicObject>, message: String) -> AdmissionResponse {
    let mut res = AdmissionResponse::from(req).deny(message);
    res.result.code = INTERNAL_ERROR;
    res
}
