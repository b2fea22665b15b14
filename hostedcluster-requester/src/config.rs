use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Default directory the serving certificate is mounted into
pub const DEFAULT_CERT_DIR: &str = "/tmp/k8s-webhook-server/serving-certs";

/// Mutating admission webhook recording who requested each HostedCluster
#[derive(Parser, Debug, Clone)]
#[command(name = "hostedcluster-requester", version, about, long_about = None)]
pub struct Config {
    /// Address the HTTPS webhook server listens on
    #[arg(long, env = "WEBHOOK_ADDR", default_value = "0.0.0.0:9443")]
    pub webhook_addr: SocketAddr,

    /// Address the health and readiness probes listen on
    #[arg(long, env = "PROBE_ADDR", default_value = "0.0.0.0:8081")]
    pub probe_addr: SocketAddr,

    /// Directory containing the serving certificate and key
    #[arg(long, env = "CERT_DIR", default_value = DEFAULT_CERT_DIR)]
    pub cert_dir: PathBuf,

    /// File name of the serving certificate inside the cert directory
    #[arg(long, env = "CERT_NAME", default_value = "tls.crt")]
    pub cert_name: String,

    /// File name of the serving key inside the cert directory
    #[arg(long, env = "KEY_NAME", default_value = "tls.key")]
    pub key_name: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl Config {
    pub fn cert_path(&self) -> PathBuf {
        self.cert_dir.join(&self.cert_name)
    }

    pub fn key_path(&self) -> PathBuf {
        self.cert_dir.join(&self.key_name)
    }
}
