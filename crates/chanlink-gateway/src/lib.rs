// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP/WebSocket gateway for the chanlink delivery system.
//!
//! The server side exposes a [`ChannelHub`](chanlink_sync::ChannelHub) over
//! JSON endpoints and a WebSocket push stream. The client side,
//! [`RemoteTransport`], implements the transport seams against that surface.

pub mod client;
pub mod handlers;
pub mod server;
pub mod ws;

pub use client::{RemoteTransport, WsPushStream};
pub use handlers::{ApiError, ErrorResponse, HealthResponse, PublishResponse};
pub use server::{GatewayState, ServerConfig, router, serve, start_server};
