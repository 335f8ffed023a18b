//! HTTP and WebSocket surface of the relay broker.
//!
//! - [`health`] – the `/health` endpoint.
//! - [`entities`] – the `/entity/*` REST surface, each a thin dispatcher call.
//! - [`ws`] – the world-facing WebSocket endpoint and its session lifecycle.
//! - [`extract`] – extractors that translate rejections into [`crate::errors::ApiError`].

pub(crate) mod entities;
pub(crate) mod extract;
pub(crate) mod health;
pub(crate) mod ws;
