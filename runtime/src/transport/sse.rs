//! JSON-RPC over HTTP + Server-Sent Events (spec §4.6). A client opens an
//! SSE stream and gets back a session id; every subsequent `POST` carrying
//! a JSON-RPC frame is answered asynchronously on that session's SSE
//! channel, tagged with the frame's request id. A dropped SSE connection
//! cancels every tool call still running for that session.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use dashmap::DashMap;
use futures::stream::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::dispatcher::{Dispatched, Dispatcher};
use crate::jsonrpc::{ProtocolError, Response};

struct Session {
    tx: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

#[derive(Clone)]
struct AppState {
    dispatcher: Arc<Dispatcher>,
    sessions: Arc<DashMap<String, Session>>,
}

pub async fn run(dispatcher: Arc<Dispatcher>, host: String, port: u16) -> std::io::Result<()> {
    let state = AppState {
        dispatcher,
        sessions: Arc::new(DashMap::new()),
    };
    let app = Router::new()
        .route("/sse", get(open_sse))
        .route("/rpc/:session_id", post(post_rpc))
        .with_state(state);

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], port)));
    tracing::info!(%addr, "SSE transport listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

async fn open_sse(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session_id = uuid::Uuid::new_v4().to_string();
    let (tx, rx) = mpsc::unbounded_channel::<String>();
    // A child of the dispatcher's shutdown token: disconnecting this
    // session cancels only its own in-flight call, but a server-wide
    // shutdown cancels every session along with it.
    let cancel = state.dispatcher.shutdown_token().child_token();
    state.sessions.insert(
        session_id.clone(),
        Session {
            tx: tx.clone(),
            cancel: cancel.clone(),
        },
    );

    let greeting = serde_json::json!({ "sessionId": session_id }).to_string();
    let _ = tx.send(greeting);

    let sessions = state.sessions.clone();
    let cleanup_session_id = session_id.clone();
    let stream = UnboundedReceiverStream::new(rx).map_with_cleanup(move || {
        sessions.remove(&cleanup_session_id);
        cancel.cancel();
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn post_rpc(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    body: String,
) -> impl IntoResponse {
    let Some(session) = state.sessions.get(&session_id).map(|s| (s.tx.clone(), s.cancel.clone())) else {
        let response = Response::err(
            serde_json::Value::Null,
            ProtocolError::InvalidRequest(format!("unknown session `{session_id}`")),
        );
        return (axum::http::StatusCode::NOT_FOUND, Json(response));
    };
    let (tx, cancel) = session;

    let dispatcher = state.dispatcher.clone();
    tokio::spawn(async move {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("SSE session disconnected; tool call cancelled");
            }
            dispatched = dispatcher.handle_raw(&body, &cancel) => {
                match dispatched {
                    Dispatched::Response(response) | Dispatched::Shutdown(response) => {
                        if let Ok(text) = serde_json::to_string(&response) {
                            let _ = tx.send(text);
                        }
                    }
                    Dispatched::NoResponse => {}
                }
            }
        }
    });

    (
        axum::http::StatusCode::ACCEPTED,
        Json(Response::ok(serde_json::Value::Null, serde_json::json!({"accepted": true}))),
    )
}

/// A tiny adapter so the SSE stream runs a cleanup closure once, when the
/// underlying receiver stream ends — which happens either because the
/// sender was dropped or, for a genuinely disconnected client, because
/// axum drops the response stream. `UnboundedReceiverStream` is `Unpin`,
/// so this can skip pin-projection entirely.
trait MapWithCleanup: Stream<Item = String> + Unpin + Sized {
    fn map_with_cleanup<F>(self, cleanup: F) -> CleanupStream<Self, F>
    where
        F: FnMut(),
    {
        CleanupStream {
            inner: self,
            cleanup: Some(cleanup),
        }
    }
}

impl<S: Stream<Item = String> + Unpin> MapWithCleanup for S {}

struct CleanupStream<S, F>
where
    F: FnMut(),
{
    inner: S,
    cleanup: Option<F>,
}

impl<S, F> Stream for CleanupStream<S, F>
where
    S: Stream<Item = String> + Unpin,
    F: FnMut() + Unpin,
{
    type Item = Result<Event, Infallible>;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        match std::pin::Pin::new(&mut self.inner).poll_next(cx) {
            std::task::Poll::Ready(Some(text)) => {
                std::task::Poll::Ready(Some(Ok(Event::default().data(text))))
            }
            std::task::Poll::Ready(None) => std::task::Poll::Ready(None),
            std::task::Poll::Pending => std::task::Poll::Pending,
        }
    }
}

impl<S, F> Drop for CleanupStream<S, F>
where
    F: FnMut(),
{
    fn drop(&mut self) {
        if let Some(mut cleanup) = self.cleanup.take() {
            cleanup();
        }
    }
}
