use clap::Parser;
use hostedcluster_requester::config::LogFormat;
use hostedcluster_requester::{
    Config, HOSTED_CLUSTER_WEBHOOK_PATH, HostedClusterAnnotator, Mutator, MutatorConfig,
    WebhookServer,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> Result<(), hostedcluster_requester::Error> {
    let config = Config::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Text => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }

    let annotator = HostedClusterAnnotator::new(Mutator::new(MutatorConfig::default()));

    WebhookServer::new(config)
        .mutator(HOSTED_CLUSTER_WEBHOOK_PATH, annotator)
        .run()
        .await
}
