/// Cyclic containers.
pub mod container;

/// Shared server context.
pub mod context;

/// HTTP/1.x message head codec.
pub mod http;

/// Networking primitives for WebSocket communication.
pub mod net;

/// WebSocket tcp services.
pub mod tcp;

/// WebSocket protocol implementation.
pub mod ws;
