//! Command line configuration

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use turtles_import::ImportConfig;

/// rancher-turtles - imports CAPI clusters into Rancher
#[derive(Parser, Debug)]
#[command(name = "turtles-operator", version, about, long_about = None)]
pub struct Cli {
    /// Print the CRD manifests this controller reads and exit
    #[arg(long)]
    pub crd: bool,

    /// Path to a kubeconfig for the management cluster (in-cluster config if unset)
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Only handle clusters labelled cluster.x-k8s.io/watch-filter=<value>
    #[arg(long, env = "TURTLES_WATCH_FILTER")]
    pub watch_filter: Option<String>,

    /// Maximum number of clusters reconciled in parallel
    #[arg(long, env = "TURTLES_CONCURRENCY", default_value_t = 4)]
    pub concurrency: u16,

    /// Seconds to wait before re-checking a cluster whose control plane is not ready
    #[arg(long, default_value_t = 60)]
    pub control_plane_requeue_secs: u64,

    /// Seconds to wait on short "not ready yet" states and retryable errors
    #[arg(long, default_value_t = 5)]
    pub requeue_secs: u64,

    /// Timeout in seconds for downloading an import manifest
    #[arg(long, default_value_t = 30)]
    pub manifest_timeout_secs: u64,

    /// Skip TLS verification when downloading import manifests
    #[arg(long, env = "TURTLES_INSECURE_SKIP_TLS_VERIFY")]
    pub insecure_skip_tls_verify: bool,

    /// Emit logs as JSON
    #[arg(long, env = "TURTLES_LOG_JSON")]
    pub log_json: bool,
}

impl Cli {
    /// Controller tunables derived from the flags
    pub fn import_config(&self) -> ImportConfig {
        ImportConfig {
            control_plane_requeue: Duration::from_secs(self.control_plane_requeue_secs),
            requeue: Duration::from_secs(self.requeue_secs),
            manifest_timeout: Duration::from_secs(self.manifest_timeout_secs),
            insecure_skip_tls_verify: self.insecure_skip_tls_verify,
            watch_filter: self.watch_filter.clone().filter(|f| !f.is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_controller_defaults() {
        let cli = Cli::try_parse_from(["turtles-operator"]).unwrap();
        let config = cli.import_config();
        assert_eq!(config.control_plane_requeue, Duration::from_secs(60));
        assert_eq!(config.requeue, Duration::from_secs(5));
        assert_eq!(config.manifest_timeout, Duration::from_secs(30));
        assert!(!config.insecure_skip_tls_verify);
        assert!(!cli.crd);
    }

    #[test]
    fn flags_flow_into_import_config() {
        let cli = Cli::try_parse_from([
            "turtles-operator",
            "--watch-filter",
            "shard-a",
            "--concurrency",
            "8",
            "--control-plane-requeue-secs",
            "120",
            "--requeue-secs",
            "2",
            "--insecure-skip-tls-verify",
        ])
        .unwrap();
        let config = cli.import_config();
        assert_eq!(cli.concurrency, 8);
        assert_eq!(config.watch_filter.as_deref(), Some("shard-a"));
        assert_eq!(config.control_plane_requeue, Duration::from_secs(120));
        assert_eq!(config.requeue, Duration::from_secs(2));
        assert!(config.insecure_skip_tls_verify);
    }

    #[test]
    fn empty_watch_filter_means_no_filter() {
        let cli = Cli::try_parse_from(["turtles-operator", "--watch-filter", ""]).unwrap();
        assert_eq!(cli.import_config().watch_filter, None);
    }

    #[test]
    fn invalid_concurrency_is_rejected() {
        assert!(Cli::try_parse_from(["turtles-operator", "--concurrency", "lots"]).is_err());
    }
}
