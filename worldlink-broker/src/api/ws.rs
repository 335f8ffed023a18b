//! The world-facing WebSocket endpoint and its session lifecycle: handshake
//! validation, the ping scheduler, the inbound-frame pump, and close-path
//! cleanup.
//!
//! Restructured from the teacher's `api::oprf::ws`/`partial_oprf` shape
//! (`on_failed_upgrade` + `on_upgrade` wrapping a fallible connection body,
//! whose `Result` is translated into a `CloseFrame`) onto this system's
//! session semantics: instead of a single two-step cryptographic exchange,
//! the connection lives indefinitely, pumping replies to the dispatcher and
//! pinging on an interval until it closes or is superseded.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::any;
use axum::Router;
use futures::{SinkExt as _, StreamExt as _};
use serde::Deserialize;
use tracing::Instrument as _;
use worldlink_types::Envelope;

use crate::errors::Error;
use crate::services::credential_store::CredentialStoreService;
use crate::services::pending::{Outcome, PendingTable};
use crate::services::registry::Registry;
use crate::services::world_events::WorldEventSinkService;
use crate::session::Session;

/// Everything the WebSocket endpoint needs, shared across connections.
#[derive(Clone)]
pub struct WsState {
    pub registry: Arc<Registry>,
    pub pending: Arc<PendingTable>,
    pub credential_store: CredentialStoreService,
    pub world_event_sink: WorldEventSinkService,
    pub ws_max_message_size: usize,
    pub ping_interval: Duration,
}

#[derive(Debug, Deserialize)]
struct HandshakeParams {
    id: Option<String>,
    token: Option<String>,
}

/// Creates a `Router` with the single world-facing websocket route.
pub(crate) fn routes(state: WsState) -> Router {
    Router::new().route("/", any(handler)).with_state(state)
}

async fn handler(
    ws: WebSocketUpgrade,
    State(state): State<WsState>,
    Query(params): Query<HandshakeParams>,
) -> axum::response::Response {
    let parent_span = tracing::Span::current();
    ws.max_message_size(state.ws_max_message_size)
        .on_failed_upgrade(|err| {
            tracing::warn!("could not establish websocket connection: {err:?}");
        })
        .on_upgrade(move |socket| {
            async move {
                if let Err(err) = run_session(socket, params, state).await {
                    tracing::debug!("session ended: {err}");
                }
            }
            .instrument(parent_span)
        })
}

/// The whole life-cycle of a single world connection.
///
/// 1. Validate the `id`/`token` handshake params against the credential store.
/// 2. Register the session, superseding and closing any prior connection for the same id.
/// 3. Pump inbound frames (replies to the correlator, pushes to the event sink) while pinging on an interval.
/// 4. On any exit path, deregister the session and fail its own in-flight requests immediately.
#[tracing::instrument(level = "debug", skip_all, fields(client_id = tracing::field::Empty))]
async fn run_session(
    socket: WebSocket,
    params: HandshakeParams,
    state: WsState,
) -> Result<(), Error> {
    let (Some(client_id), Some(token)) = (params.id, params.token) else {
        return Err(Error::MissingHandshakeParams);
    };
    tracing::Span::current().record("client_id", &client_id);

    if !state
        .credential_store
        .validate_headless_session(&client_id, &token)
        .await
    {
        return Err(Error::InvalidCredentials);
    }

    let (sink, mut stream) = socket.split();
    let session = Arc::new(Session::new(client_id.clone(), sink));

    if let Some(previous) = state.registry.add(client_id.clone(), Arc::clone(&session)) {
        let in_flight = state.registry.take_in_flight(&client_id);
        state.pending.fail_all(&in_flight, Outcome::SessionLost);
        tokio::spawn(async move {
            previous
                .close(Some(CloseFrame {
                    code: close_code::POLICY,
                    reason: "superseded by a newer connection".into(),
                }))
                .await;
        });
    }

    let _cleanup = SessionCleanupGuard {
        registry: &state.registry,
        pending: &state.pending,
        client_id: client_id.clone(),
        session: Arc::clone(&session),
    };

    let mut ping_timer = tokio::time::interval(state.ping_interval);
    ping_timer.tick().await; // first tick fires instantly; skip it

    let result = loop {
        tokio::select! {
            _ = ping_timer.tick() => {
                if session.ping().await.is_err() {
                    break Err(Error::ConnectionClosed);
                }
            }
            frame = stream.next() => {
                match frame {
                    None => break Ok(()),
                    Some(Ok(Message::Text(text))) => {
                        session.touch();
                        match Envelope::from_json(&text) {
                            Ok(envelope) => handle_inbound_envelope(&state, &client_id, envelope).await,
                            Err(err) => tracing::warn!(client_id, "dropping malformed frame: {err}"),
                        }
                    }
                    Some(Ok(Message::Pong(_))) => session.touch(),
                    Some(Ok(Message::Ping(_))) => session.touch(),
                    Some(Ok(Message::Close(_))) => break Ok(()),
                    Some(Ok(Message::Binary(_))) => break Err(Error::UnexpectedMessage),
                    Some(Err(err)) => break Err(Error::Axum(err)),
                }
            }
        }
    };

    let close_frame = match &result {
        Ok(()) => Some(CloseFrame {
            code: close_code::NORMAL,
            reason: "closed".into(),
        }),
        Err(err) => err.into_close_frame(),
    };
    session.close(close_frame).await;
    result
}

/// Routes one decoded inbound frame: a reply with a `requestId` completes its
/// waiter, anything else is an unsolicited push handed to the event sink.
async fn handle_inbound_envelope(state: &WsState, client_id: &str, envelope: Envelope) {
    match envelope.request_id {
        Some(request_id) => {
            state.registry.untrack_request(client_id, &request_id);
            state.pending.complete(request_id, envelope);
        }
        None => {
            state.world_event_sink.on_world_event(client_id, envelope).await;
        }
    }
}

/// Deregisters the session and fails its own in-flight requests on drop,
/// regardless of which path `run_session` exits through.
struct SessionCleanupGuard<'a> {
    registry: &'a Registry,
    pending: &'a PendingTable,
    client_id: String,
    session: Arc<Session>,
}

impl Drop for SessionCleanupGuard<'_> {
    fn drop(&mut self) {
        self.registry.remove(&self.client_id, &self.session);
        let in_flight = self.registry.take_in_flight(&self.client_id);
        self.pending.fail_all(&in_flight, Outcome::SessionLost);
    }
}
