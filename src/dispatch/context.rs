use std::sync::Arc;

use axum::http::HeaderMap;

use crate::serializer::{ChannelSource, RecordSerializer};

/// Header carrying the Pusher socket id of the client that made the change.
pub const SOCKET_ID_HEADER: &str = "x-pusher-socket-id";

/// The mutation-owning context a backend is bound to (typically a request handler).
///
/// Every capability is optional; a backend asks for what it needs and
/// falls back when the context does not provide it.
pub trait DispatchContext: Send + Sync {
    /// Socket id of the originating connection, if known.
    fn origin_socket(&self) -> Option<String> {
        None
    }

    /// Context-level channels.
    fn channel_source(&self) -> Option<&dyn ChannelSource> {
        None
    }

    /// Serializer to use when the backend does not carry one.
    fn serializer(&self) -> Option<Arc<dyn RecordSerializer>> {
        None
    }

    /// Attach the origin socket to packets so the transport skips that connection.
    fn exclude_origin(&self) -> bool {
        false
    }
}

/// Read the origin socket id from request headers.
pub fn origin_socket_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SOCKET_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Per-mutation context built by the integrating application.
#[derive(Clone, Default)]
pub struct MutationContext {
    origin_socket: Option<String>,
    channels: Vec<String>,
    serializer: Option<Arc<dyn RecordSerializer>>,
    exclude_origin: bool,
}

impl MutationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for an inbound request; picks up the origin socket header.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            origin_socket: origin_socket_from_headers(headers),
            ..Self::default()
        }
    }

    pub fn with_origin_socket(mut self, socket_id: impl Into<String>) -> Self {
        self.origin_socket = Some(socket_id.into());
        self
    }

    pub fn with_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels = channels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_serializer(mut self, serializer: Arc<dyn RecordSerializer>) -> Self {
        self.serializer = Some(serializer);
        self
    }

    pub fn excluding_origin(mut self, exclude: bool) -> Self {
        self.exclude_origin = exclude;
        self
    }
}

impl ChannelSource for MutationContext {
    fn channels(&self) -> Vec<String> {
        self.channels.clone()
    }
}

impl DispatchContext for MutationContext {
    fn origin_socket(&self) -> Option<String> {
        self.origin_socket.clone()
    }

    fn channel_source(&self) -> Option<&dyn ChannelSource> {
        if self.channels.is_empty() {
            None
        } else {
            Some(self)
        }
    }

    fn serializer(&self) -> Option<Arc<dyn RecordSerializer>> {
        self.serializer.clone()
    }

    fn exclude_origin(&self) -> bool {
        self.exclude_origin
    }
}
