// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `listen` command.
//!
//! Binds the reverse connect listener and prints the server URI and
//! endpoint URL from every ReverseHello. Connections are closed after
//! printing; no session is opened.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;
use ua_client::reverse::{
    wait_for_connection, RendezvousRequest, ReverseConnectHub, ReverseConnectListener, ReverseConnection,
    WaiterRegistry,
};
use ua_client::{Telemetry, UaError, WaitOutcome};

use super::connect::load_config;
use crate::cli::{Cli, ListenArgs, OutputFormat};
use crate::error::{ConsoleError, ConsoleResult};

/// Wait budget of one round when no idle timeout is given.
const WAIT_ROUND: Duration = Duration::from_secs(3600);

/// Runs the listener until `cancel` fires, the count is reached or the
/// idle timeout elapses.
pub async fn listen(cli: &Cli, args: &ListenArgs, cancel: &CancellationToken) -> ConsoleResult<()> {
    let config = load_config(cli)?;
    let url = args
        .url
        .clone()
        .or_else(|| config.reverse_connect.client_endpoint_url.clone())
        .ok_or_else(|| {
            ConsoleError::config("no client endpoint URL; pass --url or set reverse_connect.client_endpoint_url")
        })?;

    let hub = Arc::new(if config.reverse_connect.strict_server_uri {
        ReverseConnectHub::strict()
    } else {
        ReverseConnectHub::new()
    });
    let listener =
        ReverseConnectListener::bind(&url, config.reverse_connect.listen_backlog, hub.clone()).await?;
    let stop = cancel.child_token();
    let task = tokio::spawn(listener.run(stop.clone()));

    let telemetry = Telemetry::new(&config.application_name);
    let result = accept_loop(hub.as_ref(), &url, args, cancel, &telemetry, &mut std::io::stdout()).await;

    stop.cancel();
    match task.await {
        Ok(run) => run?,
        Err(e) => return Err(ConsoleError::io(format!("listener task failed: {}", e))),
    }

    let accepted = result?;
    info!(accepted, url = %url, "Listener closed");
    Ok(())
}

async fn accept_loop<W: Write>(
    registry: &dyn WaiterRegistry,
    url: &str,
    args: &ListenArgs,
    cancel: &CancellationToken,
    telemetry: &Telemetry,
    out: &mut W,
) -> ConsoleResult<usize> {
    let mut accepted = 0;

    while args.count.map_or(true, |count| accepted < count) {
        let request = RendezvousRequest {
            endpoint_url: url.to_string(),
            server_uri: None,
            timeout: args.idle_timeout.unwrap_or(WAIT_ROUND),
        };
        match wait_for_connection(registry, request, cancel, telemetry).await {
            Ok(connection) => {
                accepted += 1;
                print_connection(out, &connection, args.format)?;
            }
            Err(UaError::Timeout { outcome: WaitOutcome::Elapsed, .. }) if args.idle_timeout.is_none() => {}
            Err(UaError::Timeout { outcome, .. }) => {
                info!(accepted, %outcome, "Stopped listening");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(accepted)
}

fn print_connection<W: Write>(
    out: &mut W,
    connection: &ReverseConnection,
    format: OutputFormat,
) -> ConsoleResult<()> {
    let peer = connection
        .peer()
        .map(|peer| peer.to_string())
        .unwrap_or_else(|| "-".to_string());
    let server_uri = connection.server_uri().unwrap_or("<null>");
    let endpoint_url = connection.endpoint_url().unwrap_or("<null>");

    match format {
        OutputFormat::Text => writeln!(out, "{} {} {}", peer, server_uri, endpoint_url)?,
        OutputFormat::Json => {
            let line = serde_json::json!({
                "peer": peer,
                "listener_url": connection.listener_url(),
                "server_uri": connection.server_uri(),
                "endpoint_url": connection.endpoint_url(),
            });
            writeln!(out, "{}", line)?;
        }
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ua_client::reverse::ReverseHello;

    const URL: &str = "opc.tcp://0.0.0.0:4850";

    fn args(count: Option<usize>, idle_timeout: Option<Duration>, format: OutputFormat) -> ListenArgs {
        ListenArgs {
            url: Some(URL.to_string()),
            count,
            idle_timeout,
            format,
        }
    }

    async fn dial_in(hub: Arc<ReverseConnectHub>, servers: &[&str]) {
        for server in servers {
            while hub.pending() == 0 {
                tokio::task::yield_now().await;
            }
            let hello = ReverseHello::new(*server, format!("opc.tcp://{}:4840", server));
            assert!(hub.offer(ReverseConnection::new(URL, hello)).is_ok());
        }
    }

    #[tokio::test]
    async fn test_prints_each_connection_until_count() {
        let hub = Arc::new(ReverseConnectHub::new());
        let telemetry = Telemetry::new("test");
        let cancel = CancellationToken::new();
        let args = args(Some(2), None, OutputFormat::Text);
        let mut out = Vec::new();

        let (accepted, ()) = tokio::join!(
            accept_loop(hub.as_ref(), URL, &args, &cancel, &telemetry, &mut out),
            dial_in(hub.clone(), &["press-1", "press-2"]),
        );

        assert_eq!(accepted.unwrap(), 2);
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, ["- press-1 opc.tcp://press-1:4840", "- press-2 opc.tcp://press-2:4840"]);
        assert_eq!(hub.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_stops_listening() {
        let hub = ReverseConnectHub::new();
        let telemetry = Telemetry::new("test");
        let cancel = CancellationToken::new();
        let args = args(None, Some(Duration::from_secs(5)), OutputFormat::Text);

        let accepted = accept_loop(&hub, URL, &args, &cancel, &telemetry, &mut Vec::new())
            .await
            .unwrap();
        assert_eq!(accepted, 0);
        assert_eq!(telemetry.snapshot().rendezvous_timeouts, 1);
    }

    #[tokio::test]
    async fn test_cancel_stops_listening() {
        let hub = ReverseConnectHub::new();
        let telemetry = Telemetry::new("test");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let accepted = accept_loop(&hub, URL, &args(None, None, OutputFormat::Text), &cancel, &telemetry, &mut Vec::new())
            .await
            .unwrap();
        assert_eq!(accepted, 0);
        assert_eq!(hub.pending(), 0);
    }

    #[test]
    fn test_json_line() {
        let connection = ReverseConnection::new(URL, ReverseHello::new("urn:press", "opc.tcp://press:4840"));
        let mut out = Vec::new();
        print_connection(&mut out, &connection, OutputFormat::Json).unwrap();

        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed["server_uri"], "urn:press");
        assert_eq!(parsed["listener_url"], URL);
        assert_eq!(parsed["peer"], "-");
    }
}
