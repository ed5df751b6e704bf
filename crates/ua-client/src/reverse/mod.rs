// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Reverse connect: the server dials the client.
//!
//! ```text
//!  server ──TCP──▶ ReverseConnectListener ──ReverseHello──▶ ReverseConnectHub
//!                                                              │ offer
//!                                                              ▼
//!                        wait_for_connection ◀── first waiter for the listening URL
//! ```
//!
//! A waiter is registered per wait and always unregistered when the wait
//! ends, whether it was fulfilled, elapsed or cancelled.

pub mod hello;
mod listener;
mod rendezvous;

pub use hello::{HelloError, ReverseHello};
pub use listener::ReverseConnectListener;
pub use rendezvous::{
    wait_for_connection, RendezvousRequest, ReverseConnectHub, WaiterId, WaiterRegistration,
    WaiterRegistry,
};

use std::fmt;
use std::net::SocketAddr;

use tokio::net::TcpStream;

/// A connection a server opened to this client.
///
/// Consumed by the first operation that uses it.
pub struct ReverseConnection {
    listener_url: String,
    hello: ReverseHello,
    peer: Option<SocketAddr>,
    stream: Option<TcpStream>,
}

impl ReverseConnection {
    /// Creates a connection without a socket.
    pub fn new(listener_url: impl Into<String>, hello: ReverseHello) -> Self {
        Self {
            listener_url: listener_url.into(),
            hello,
            peer: None,
            stream: None,
        }
    }

    /// Creates a connection around an accepted socket.
    pub fn with_stream(
        listener_url: impl Into<String>,
        hello: ReverseHello,
        peer: SocketAddr,
        stream: TcpStream,
    ) -> Self {
        Self {
            listener_url: listener_url.into(),
            hello,
            peer: Some(peer),
            stream: Some(stream),
        }
    }

    /// Returns the client URL the connection arrived on.
    pub fn listener_url(&self) -> &str {
        &self.listener_url
    }

    /// Returns the hello sent by the server.
    pub fn hello(&self) -> &ReverseHello {
        &self.hello
    }

    /// Returns the server's application URI.
    pub fn server_uri(&self) -> Option<&str> {
        self.hello.server_uri.as_deref()
    }

    /// Returns the endpoint URL the server reported.
    pub fn endpoint_url(&self) -> Option<&str> {
        self.hello.endpoint_url.as_deref()
    }

    /// Returns the remote address.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Takes the socket out of the connection.
    pub fn into_stream(self) -> Option<TcpStream> {
        self.stream
    }
}

impl fmt::Debug for ReverseConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReverseConnection")
            .field("listener_url", &self.listener_url)
            .field("hello", &self.hello)
            .field("peer", &self.peer)
            .field("has_stream", &self.stream.is_some())
            .finish()
    }
}
