//! Process configuration, parsed from CLI args with environment-variable
//! fallbacks — mirrors the teacher's `ServerConfig::parse()` entry point.

use clap::Parser;

/// Configuration for a single overlay node process.
#[derive(Debug, Clone, Parser)]
#[command(name = "overlay-node", about = "Overlay ring network node")]
pub struct NodeConfig {
    /// This node's own reachable address (host:port), advertised to peers.
    #[arg(long, env = "LISTEN_ADDR")]
    pub listen_addr: String,

    /// Boot node address. Unset means this process *is* the boot node.
    #[arg(long, env = "BOOT_NODE")]
    pub boot_node: Option<String>,

    /// Base interval, in seconds, between sync ticks (before jitter).
    #[arg(long, env = "NETWORK_SYNC_INTERVAL", default_value_t = 60)]
    pub network_sync_interval: u64,

    /// Upper bound, in seconds, of the random jitter added to each interval.
    #[arg(long, env = "NETWORK_SYNC_JITTER", default_value_t = 30)]
    pub network_sync_jitter: u64,

    /// Directory for log files. Logging itself goes to stdout/stderr via
    /// `tracing`; this is reserved for any file-based sink a deployment adds.
    #[arg(long, env = "LOG_DIR")]
    pub log_dir: Option<String>,

    /// Directory holding the node's SQLite database. `:memory:` for tests.
    #[arg(long, env = "STORAGE_DIR", default_value = "./data")]
    pub storage_dir: String,

    /// Upper bound on concurrent outbound broadcast deliveries.
    #[arg(long, env = "DISPATCH_CONCURRENCY", default_value_t = 16)]
    pub dispatch_concurrency: usize,
}

impl NodeConfig {
    pub fn is_boot_node(&self) -> bool {
        self.boot_node.is_none()
    }

    pub fn storage_path(&self) -> String {
        if self.storage_dir == ":memory:" {
            self.storage_dir.clone()
        } else {
            format!("{}/node.sqlite3", self.storage_dir.trim_end_matches('/'))
        }
    }
}
