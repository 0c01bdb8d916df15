mod cli;
mod output;
mod relay;

use std::sync::Arc;

use clap::Parser;
use eyre::{eyre, WrapErr};
use serde::Serialize;
use tokio::sync::watch;

use notify_bridge_core::notify::{BlockEnricher, RawTokens, Transform, WalletEnricher};
use notify_bridge_core::rpc::{DaemonRpc, HttpRpcClient};
use notify_bridge_core::{ListenerState, NotificationListener};

use cli::{Command, RpcArgs};
use output::JsonLinesObserver;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = cli::Cli::parse();

    // Events go to stdout; keep logs on stderr so the two can be piped apart.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .init();

    match args.command {
        Command::Raw(listen) => {
            run_listener(NotificationListener::new(listen.config(), RawTokens)).await
        }
        Command::Wallet { listen, rpc } => {
            let lookup_timeout = rpc.lookup_timeout();
            let mut enricher = WalletEnricher::new(connect_rpc(&rpc).await?);
            if let Some(timeout) = lookup_timeout {
                enricher = enricher.with_lookup_timeout(timeout);
            }
            run_listener(NotificationListener::new(listen.config(), enricher)).await
        }
        Command::Block { listen, rpc } => {
            let lookup_timeout = rpc.lookup_timeout();
            let mut enricher = BlockEnricher::new(connect_rpc(&rpc).await?);
            if let Some(timeout) = lookup_timeout {
                enricher = enricher.with_lookup_timeout(timeout);
            }
            run_listener(NotificationListener::new(listen.config(), enricher)).await
        }
        Command::Relay(relay) => relay::send(&relay).await,
    }
}

/// Run `listener` until Ctrl-C, or until its socket fails.
async fn run_listener<T>(listener: NotificationListener<T>) -> eyre::Result<()>
where
    T: Transform,
    T::Event: Serialize,
{
    listener.subscribe(Arc::new(JsonLinesObserver::stdout()));
    let addr = listener
        .start()
        .await
        .context("start notification listener")?;

    if addr.ip().is_unspecified() {
        tracing::warn!(%addr, "notification socket is accessible from the network");
    }
    tracing::info!(%addr, "waiting for notify hook connections");

    let failed = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("listen for shutdown signal")?;
            tracing::info!("shutdown signal received");
            false
        }
        () = terminated(listener.watch_state()) => true,
    };

    listener.stop().await;
    if failed {
        return Err(eyre!("notification socket on {addr} failed; listener terminated"));
    }
    Ok(())
}

async fn terminated(mut states: watch::Receiver<ListenerState>) {
    let _ = states
        .wait_for(|state| *state == ListenerState::Terminated)
        .await;
}

/// Build the RPC client and verify the connection succeeds before the
/// listener starts.
async fn connect_rpc(args: &RpcArgs) -> eyre::Result<Arc<dyn DaemonRpc>> {
    let rpc: Arc<dyn DaemonRpc> = Arc::new(
        HttpRpcClient::new(
            &args.rpc_url,
            args.rpc_user.as_deref(),
            args.rpc_pass.as_deref(),
            args.rpc_cookie_file.as_deref(),
            args.rpc_wallet.as_deref(),
            args.rpc_requests_per_second,
        )
        .context("configure Bitcoin Core RPC client")?,
    );

    let chain_info = rpc.get_blockchain_info().await.map_err(|err| {
        let message = format_rpc_connect_error(&args.rpc_url, &err.to_string());
        eyre!(message).wrap_err("while attempting to connect to Bitcoin Core RPC")
    })?;

    tracing::info!(
        chain = %chain_info.chain,
        blocks = chain_info.blocks,
        "connected to Bitcoin Core"
    );
    if chain_info.pruned {
        tracing::warn!("node is pruned; lookups of old blocks will fall back to stubs");
    }
    Ok(rpc)
}

fn format_rpc_connect_error(rpc_url: &str, source_error: &str) -> String {
    let mut lines = vec![
        format!("could not connect to RPC endpoint `{rpc_url}`"),
        format!("RPC error: {source_error}"),
    ];

    if source_error.contains("Could not resolve host") || source_error.contains("dns error") {
        lines.push(
            "hint: hostname resolution failed; verify the endpoint hostname and your DNS/network"
                .into(),
        );
    } else if source_error.contains("401") || source_error.contains("403") {
        lines.push(
            "hint: authentication failed; verify --rpc-user/--rpc-pass or --rpc-cookie-file".into(),
        );
    } else if source_error.contains("Requested wallet does not exist") {
        lines.push("hint: the --rpc-wallet name is not loaded on the node".into());
    } else if source_error.contains("error sending request for url") {
        lines.push(
            "hint: request could not be sent; verify the URL and that bitcoind runs with -server"
                .into(),
        );
    }

    lines.join("\n")
}
