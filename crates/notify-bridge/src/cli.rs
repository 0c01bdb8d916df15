use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use notify_bridge_core::ListenerConfig;

/// notify-bridge: turn Bitcoin Core notify-hook pings into JSON events.
///
/// Point `-walletnotify` / `-blocknotify` at `notify-bridge relay %s` and run
/// one of the listener subcommands alongside the daemon.
#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Listen for hook notifications and print the raw tokens.
    Raw(ListenArgs),

    /// Listen for `-walletnotify` txids and print the resolved wallet transactions.
    Wallet {
        #[command(flatten)]
        listen: ListenArgs,
        #[command(flatten)]
        rpc: RpcArgs,
    },

    /// Listen for `-blocknotify` hashes and print the resolved block headers.
    Block {
        #[command(flatten)]
        listen: ListenArgs,
        #[command(flatten)]
        rpc: RpcArgs,
    },

    /// Send one token to a running bridge (use this as the daemon's notify hook).
    Relay(RelayArgs),
}

#[derive(Args)]
pub struct ListenArgs {
    /// Address to bind the notification socket to.
    #[arg(long, default_value = "127.0.0.1", env = "NOTIFY_BRIDGE_BIND")]
    pub bind: IpAddr,

    /// Port to listen on.
    #[arg(long, default_value = "5158", env = "NOTIFY_BRIDGE_PORT")]
    pub port: u16,

    /// Seconds to wait for the worker on shutdown before abandoning it.
    #[arg(long, default_value = "5")]
    pub stop_timeout_secs: u64,

    /// Drop hook connections idle for this many seconds.
    #[arg(long)]
    pub connection_timeout_secs: Option<u64>,
}

impl ListenArgs {
    pub fn config(&self) -> ListenerConfig {
        ListenerConfig {
            bind: self.bind,
            port: self.port,
            stop_timeout: Duration::from_secs(self.stop_timeout_secs),
            connection_timeout: self.connection_timeout_secs.map(Duration::from_secs),
        }
    }
}

#[derive(Args)]
pub struct RpcArgs {
    /// Bitcoin Core RPC URL.
    #[arg(long, default_value = "http://127.0.0.1:8332", env = "NOTIFY_BRIDGE_RPC_URL")]
    pub rpc_url: String,

    /// RPC username (optional; not needed for token-in-URL providers).
    #[arg(long, env = "NOTIFY_BRIDGE_RPC_USER")]
    pub rpc_user: Option<String>,

    /// RPC password (optional; not needed for token-in-URL providers).
    #[arg(long, env = "NOTIFY_BRIDGE_RPC_PASS")]
    pub rpc_pass: Option<String>,

    /// Path to the daemon's `.cookie` file, used when no user/pass is given.
    #[arg(long, env = "NOTIFY_BRIDGE_RPC_COOKIE_FILE")]
    pub rpc_cookie_file: Option<PathBuf>,

    /// Wallet to query when the daemon has several loaded.
    #[arg(long, env = "NOTIFY_BRIDGE_RPC_WALLET")]
    pub rpc_wallet: Option<String>,

    /// Maximum outbound RPC requests per second.
    #[arg(long)]
    pub rpc_requests_per_second: Option<u32>,

    /// Publish a stub event if a lookup takes longer than this many seconds.
    #[arg(long)]
    pub lookup_timeout_secs: Option<u64>,
}

impl RpcArgs {
    pub fn lookup_timeout(&self) -> Option<Duration> {
        self.lookup_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Args)]
pub struct RelayArgs {
    /// Host the bridge listens on.
    #[arg(long, default_value = "127.0.0.1", env = "NOTIFY_BRIDGE_HOST")]
    pub host: String,

    /// Port the bridge listens on.
    #[arg(long, default_value = "5158", env = "NOTIFY_BRIDGE_PORT")]
    pub port: u16,

    /// Seconds to wait for the connection and write.
    #[arg(long, default_value = "5")]
    pub timeout_secs: u64,

    /// Identifier to relay, e.g. the `%s` txid or block hash.
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wallet_command_parses_listen_and_rpc_flags() {
        let cli = Cli::try_parse_from([
            "notify-bridge",
            "wallet",
            "--port",
            "6000",
            "--rpc-wallet",
            "hot",
            "--lookup-timeout-secs",
            "2",
        ])
        .expect("valid arguments");

        let Command::Wallet { listen, rpc } = cli.command else {
            panic!("expected wallet subcommand");
        };
        let config = listen.config();
        assert_eq!(config.port, 6000);
        assert_eq!(config.stop_timeout, Duration::from_secs(5));
        assert!(config.connection_timeout.is_none());
        assert_eq!(rpc.rpc_wallet.as_deref(), Some("hot"));
        assert_eq!(rpc.lookup_timeout(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn relay_requires_token() {
        assert!(Cli::try_parse_from(["notify-bridge", "relay"]).is_err());

        let cli = Cli::try_parse_from(["notify-bridge", "relay", "abc123"]).expect("valid");
        let Command::Relay(relay) = cli.command else {
            panic!("expected relay subcommand");
        };
        assert_eq!(relay.token, "abc123");
        assert_eq!(relay.host, "127.0.0.1");
    }
}
