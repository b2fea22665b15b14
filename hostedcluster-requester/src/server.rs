use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use kube::core::DynamicObject;
use kube::core::admission::AdmissionReview;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::Instrument;
use warp::path::FullPath;
use warp::{Filter, Rejection, Reply};

use crate::admission::{MutatingAdmissionHandler, review};
use crate::config::Config;
use crate::{Error, Result};

/// Largest admission review body accepted, in bytes
const MAX_REVIEW_BYTES: u64 = 3 * 1024 * 1024;

/// Handler shared between the routes of a running server
pub type SharedHandler<E> = Arc<dyn MutatingAdmissionHandler<Err = E>>;

/// HTTPS server dispatching admission reviews to mutating handlers by path
///
/// Alongside the webhook a plain HTTP listener answers `/healthz` and
/// `/readyz`. Both stop on SIGINT or SIGTERM.
pub struct WebhookServer<E> {
    config: Config,
    handlers: BTreeMap<String, SharedHandler<E>>,
}

impl<E> WebhookServer<E>
where
    E: StdError + Send + Sync + 'static,
{
    pub fn new(config: Config) -> Self {
        Self {
            config,
            handlers: Default::default(),
        }
    }

    /// Serves `handler` on `path`
    ///
    /// Registering a second handler on the same path replaces the first.
    #[must_use]
    pub fn mutator<H>(mut self, path: impl Into<String>, handler: H) -> Self
    where
        H: MutatingAdmissionHandler<Err = E> + 'static,
    {
        self.handlers.insert(path.into(), Arc::new(handler));
        self
    }

    /// Checks what warp's TLS listener would otherwise panic on
    ///
    /// The webhook address is bound and released again, so a port taken
    /// between this check and the real bind still panics.
    fn preflight(&self) -> Result<()> {
        ensure_pem(&self.config.cert_path(), "CERTIFICATE")?;
        ensure_pem(&self.config.key_path(), "PRIVATE KEY")?;
        drop(std::net::TcpListener::bind(self.config.webhook_addr)?);
        Ok(())
    }

    /// Runs the webhook and probe servers until a shutdown signal arrives
    pub async fn run(self) -> Result<()> {
        self.preflight()?;
        let cert_path = self.config.cert_path();
        let key_path = self.config.key_path();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let (probe_addr, probes) = warp::serve(probe_routes()).try_bind_with_graceful_shutdown(
            self.config.probe_addr,
            stopped(shutdown_rx.clone()),
        )?;

        let (webhook_addr, webhook) = warp::serve(mutating_routes(self.handlers.clone()))
            .tls()
            .cert_path(&cert_path)
            .key_path(&key_path)
            .bind_with_graceful_shutdown(self.config.webhook_addr, stopped(shutdown_rx));

        tracing::info!(
            webhook = %webhook_addr,
            probes = %probe_addr,
            handlers = ?self.handlers.keys().collect::<Vec<_>>(),
            "starting webhook server"
        );

        let mut set = JoinSet::new();
        set.spawn(webhook.instrument(tracing::info_span!("server", name = "webhook")));
        set.spawn(probes.instrument(tracing::info_span!("server", name = "probes")));
        set.spawn(async move {
            shutdown_signal().await;
            tracing::info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        });

        set.join_all().await;
        tracing::info!("webhook server stopped");

        Ok(())
    }
}

/// Dispatches admission reviews posted to a registered path to its handler
pub fn mutating_routes<E>(
    handlers: BTreeMap<String, SharedHandler<E>>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone + Send + Sync + 'static
where
    E: StdError + Send + Sync + 'static,
{
    let handlers = Arc::new(handlers);
    let handler = warp::path::full().and_then(move |path: FullPath| {
        let handlers = handlers.clone();
        async move {
            handlers
                .get(path.as_str())
                .cloned()
                .ok_or_else(warp::reject::not_found)
        }
    });

    warp::post()
        .and(handler)
        .and(warp::body::content_length_limit(MAX_REVIEW_BYTES))
        .and(warp::body::json())
        .then(
            |handler: SharedHandler<E>, body: AdmissionReview<DynamicObject>| async move {
                warp::reply::json(&review(handler.as_ref(), body).await)
            },
        )
}

/// Fails unless `path` holds a PEM block whose label ends in `label`
fn ensure_pem(path: &Path, label: &str) -> Result<()> {
    let contents = fs::read_to_string(path).map_err(|err| {
        Error::Io(io::Error::new(err.kind(), format!("{}: {err}", path.display())))
    })?;

    let trailer = format!("{label}-----");
    let found = contents
        .lines()
        .map(str::trim_end)
        .any(|line| line.starts_with("-----BEGIN ") && line.ends_with(&trailer));
    if !found {
        return Err(Error::Tls(format!(
            "{} has no PEM encoded {}",
            path.display(),
            label.to_lowercase()
        )));
    }

    Ok(())
}

/// Liveness and readiness endpoints
pub fn probe_routes() -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let healthz = warp::path("healthz").and(warp::path::end()).map(|| "ok");
    let readyz = warp::path("readyz").and(warp::path::end()).map(|| "ok");

    warp::get().and(healthz.or(readyz).unify())
}

async fn stopped(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stopped| *stopped).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!({ err = &err as &dyn StdError }, "unable to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!({ err = &err as &dyn StdError }, "unable to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
