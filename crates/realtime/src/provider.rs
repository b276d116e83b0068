//! # Provider
//!
//! Provider defines external data interfaces for the crate. The host
//! application implements these; the tracking crates only ever talk to the
//! outside world through them.

use std::any::Any;
use std::error::Error;
use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use futures::Stream;
use http::{Request, Response};
use http_body::Body;
use serde_json::Value;

/// The `HttpRequest` trait defines the behavior for fetching data from a source.
pub trait HttpRequest: Send + Sync {
    /// Make outbound HTTP request.
    fn fetch<T>(&self, request: Request<T>) -> impl Future<Output = Result<Response<Bytes>>> + Send
    where
        T: Body + Any + Send,
        T::Data: Into<Vec<u8>>,
        T::Error: Into<Box<dyn Error + Send + Sync + 'static>>;
}

/// The `Config` trait is used by implementers to provide configuration
/// settings (base URLs and the like) to dependent crates.
pub trait Config: Send + Sync {
    /// Request configuration setting.
    fn get(&self, key: &str) -> impl Future<Output = Result<String>> + Send;
}

/// Signals raised by a server-push (event stream) channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    /// The channel is established.
    Open,

    /// A text-encoded message.
    Message(String),

    /// The channel reported an error. The transport may keep retrying on its
    /// own, so this does not imply the stream has ended.
    Error(String),
}

/// The `EventSource` trait opens server-to-client push channels.
///
/// The returned stream *is* the channel: dropping it closes the connection.
/// A stream that ends means the transport has given up.
pub trait EventSource: Send + Sync {
    /// Channel handle.
    type Stream: Stream<Item = PushEvent> + Send + Unpin + 'static;

    /// Open a push channel to `url`.
    fn open(&self, url: &str) -> impl Future<Output = Result<Self::Stream>> + Send;
}

/// Events raised by a bidirectional socket channel.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    /// Transport-level connect.
    Connect,

    /// A named application event with its JSON payload.
    Event { name: String, payload: Value },

    /// Transport-level disconnect, with the reason given by the transport.
    Disconnect(String),
}

/// A connected socket. Inbound events are read from the stream; outbound
/// events are sent with [`Socket::emit`].
pub trait Socket: Stream<Item = SocketEvent> + Send + Unpin + 'static {
    /// Send a named event to the server.
    fn emit(&mut self, event: &str, payload: Value) -> impl Future<Output = Result<()>> + Send;

    /// Close the connection. Events still buffered are discarded.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// The `SocketChannel` trait opens bidirectional socket connections.
pub trait SocketChannel: Send + Sync {
    /// Connected socket handle.
    type Socket: Socket;

    /// Connect to `url`, passing `query` as connection parameters.
    fn connect(
        &self, url: &str, query: &[(&str, &str)],
    ) -> impl Future<Output = Result<Self::Socket>> + Send;
}

/// Reconnect policy applied when a live channel ends or cannot be opened.
pub trait RetryPolicy: Send + Sync {
    /// Delay before reconnect `attempt` (starting at 1), or `None` to stop
    /// retrying.
    fn next_delay(&self, attempt: u32) -> Option<Duration>;
}
