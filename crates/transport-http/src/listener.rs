//! Shared HTTP listener.
//!
//! Every consumer bound to the same `host:port` shares one TCP listener:
//!
//! ```text
//! 0.0.0.0:8080
//! ├── POST /orders                      → consumer A
//! ├── POST /events  [X-Source = east]   → consumer B
//! └── POST /events  [X-Source = west]   → consumer C
//! ```
//!
//! 1. `LISTENER_REGISTRY` maps each bind address to a [`ListenerSlot`]
//!    holding the live [`ListenerEntry`] and the task serving its socket.
//! 2. The socket is bound once per address; a single axum router dispatches
//!    each request by path and, when routes carry one, by header filter.
//!    Routes match on the request path alone unless registered with an
//!    authority, in which case `Host` must equal it.
//! 3. Each [`RouteRegistration`] holds the entry alive. When the last one is
//!    dropped the entry is dropped and the listener shuts down. A later bind
//!    on the same address waits for the old socket to close.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, LazyLock, Weak};

use axum::{
    body::Bytes,
    extract::State,
    http::{header::HOST, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use eventing::{EventingError, HeaderFilter, Headers, Message, Processor, TransportError};
use parking_lot::{Mutex, RwLock};
use tokio::net::TcpListener;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

// ---------------------------------------------------------------------------
// Route table
// ---------------------------------------------------------------------------

struct Route {
    filter: Option<HeaderFilter>,
    // `host[:port]` the request must be addressed to; any when unset.
    authority: Option<String>,
    processor: Arc<dyn Processor>,
    // Live registrations for this path + filter.
    registrations: usize,
}

impl Route {
    fn matches(&self, headers: &HeaderMap) -> bool {
        let authority_ok = self.authority.as_deref().is_none_or(|authority| {
            headers
                .get(HOST)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.eq_ignore_ascii_case(authority))
        });
        let filter_ok = self.filter.as_ref().is_none_or(|filter| {
            headers
                .get(filter.name.as_str())
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v == filter.value)
        });
        authority_ok && filter_ok
    }
}

#[derive(Default)]
struct SharedState {
    // path -> routes on that path
    routes: RwLock<HashMap<String, Vec<Route>>>,
}

impl SharedState {
    /// Returns `false` when the path + filter pair was already registered.
    fn add(
        &self,
        path: &str,
        filter: Option<HeaderFilter>,
        authority: Option<String>,
        processor: Arc<dyn Processor>,
    ) -> bool {
        let mut routes = self.routes.write();
        let on_path = routes.entry(path.to_string()).or_default();
        if let Some(existing) = on_path.iter_mut().find(|r| r.filter == filter) {
            existing.registrations += 1;
            return false;
        }
        on_path.push(Route {
            filter,
            authority,
            processor,
            registrations: 1,
        });
        true
    }

    fn release(&self, path: &str, filter: &Option<HeaderFilter>) {
        let mut routes = self.routes.write();
        let Some(on_path) = routes.get_mut(path) else {
            return;
        };
        if let Some(index) = on_path.iter().position(|r| &r.filter == filter) {
            on_path[index].registrations -= 1;
            if on_path[index].registrations == 0 {
                on_path.remove(index);
            }
        }
        if on_path.is_empty() {
            routes.remove(path);
        }
    }

    /// Picks the processor for a request: a matching filtered route first,
    /// then an unfiltered one.
    fn select(&self, path: &str, headers: &HeaderMap) -> Option<Arc<dyn Processor>> {
        let routes = self.routes.read();
        let on_path = routes.get(path)?;
        on_path
            .iter()
            .filter(|r| r.filter.is_some())
            .find(|r| r.matches(headers))
            .or_else(|| {
                on_path
                    .iter()
                    .filter(|r| r.filter.is_none())
                    .find(|r| r.matches(headers))
            })
            .map(|r| r.processor.clone())
    }
}

// ---------------------------------------------------------------------------
// Listener lifecycle
// ---------------------------------------------------------------------------

/// A bound listener. Dropping the last reference shuts it down.
struct ListenerEntry {
    local_addr: SocketAddr,
    state: Arc<SharedState>,
    shutdown: CancellationToken,
}

impl Drop for ListenerEntry {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Per-address state in `LISTENER_REGISTRY`.
///
/// `serving` is the task owning the socket. It outlives the entry until the
/// socket is closed, so a rebind waits for it first.
#[derive(Default)]
struct ListenerSlot {
    entry: Weak<ListenerEntry>,
    serving: Option<JoinHandle<()>>,
}

static LISTENER_REGISTRY: LazyLock<Mutex<HashMap<String, Arc<AsyncMutex<ListenerSlot>>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn slot_for(addr: &str) -> Arc<AsyncMutex<ListenerSlot>> {
    LISTENER_REGISTRY
        .lock()
        .entry(addr.to_string())
        .or_default()
        .clone()
}

/// Returns the listener for `addr`, binding it on first use.
///
/// Binds for one address are serialised by the slot lock.
async fn get_or_create_listener(addr: &str) -> Result<Arc<ListenerEntry>, TransportError> {
    let slot = slot_for(addr);
    let mut slot = slot.lock().await;
    if let Some(entry) = slot.entry.upgrade() {
        return Ok(entry);
    }

    if let Some(previous) = slot.serving.take() {
        // The socket is released once the previous serve task has finished.
        if let Err(e) = previous.await {
            warn!(addr = %addr, error = %e, "Previous listener task ended abnormally");
        }
    }

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| TransportError::Bind {
            addr: addr.to_string(),
            message: e.to_string(),
        })?;
    let local_addr = listener.local_addr().map_err(|e| TransportError::Io(e.to_string()))?;

    let state = Arc::new(SharedState::default());
    let shutdown = CancellationToken::new();
    let entry = Arc::new(ListenerEntry {
        local_addr,
        state: state.clone(),
        shutdown: shutdown.clone(),
    });

    let router = Router::new()
        .route("/", post(dispatch))
        .route("/{*path}", post(dispatch))
        .with_state(state);

    let serving = tokio::spawn(async move {
        tokio::select! {
            result = axum::serve(listener, router) => {
                if let Err(e) = result {
                    error!(addr = %local_addr, error = %e, "Listener failed");
                }
            }
            () = shutdown.cancelled() => {
                info!(addr = %local_addr, "Listener shutting down");
            }
        }
    });

    slot.entry = Arc::downgrade(&entry);
    slot.serving = Some(serving);
    info!(addr = %local_addr, "Listener started");
    Ok(entry)
}

/// Keeps one route registered. Dropping it removes the route.
pub struct RouteRegistration {
    entry: Arc<ListenerEntry>,
    path: String,
    filter: Option<HeaderFilter>,
}

impl Drop for RouteRegistration {
    fn drop(&mut self) {
        self.entry.state.release(&self.path, &self.filter);
        debug!(path = %self.path, filter = ?self.filter, "Route removed");
    }
}

/// Registers `processor` for POSTs to `path` on `addr`.
///
/// Registering the same path and filter twice is a no-op apart from bumping
/// the route's registration count; the first processor keeps serving.
///
/// With an `authority`, only requests whose `Host` equals it are accepted;
/// without one the route matches on path (and filter) alone.
pub async fn register_route(
    addr: &str,
    path: &str,
    filter: Option<HeaderFilter>,
    authority: Option<String>,
    processor: Arc<dyn Processor>,
) -> Result<RouteRegistration, TransportError> {
    let entry = get_or_create_listener(addr).await?;
    if entry.state.add(path, filter.clone(), authority, processor) {
        info!(addr = %entry.local_addr, path = %path, filter = ?filter, "Route registered");
    } else {
        debug!(path = %path, filter = ?filter, "Route already registered");
    }
    Ok(RouteRegistration {
        entry,
        path: path.to_string(),
        filter,
    })
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

async fn dispatch(
    State(state): State<Arc<SharedState>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // Matching uses the path alone; the request authority may have been rewritten.
    let path = uri.path();
    let Some(processor) = state.select(path, &headers) else {
        debug!(path = %path, "No route for request");
        return (StatusCode::NOT_FOUND, format!("No consumer for path: {path}")).into_response();
    };

    let mut message = Message::new(body.to_vec());
    message.headers = to_headers(&headers);

    match processor.process(message).await {
        Ok(()) => (StatusCode::OK, "ok").into_response(),
        Err(EventingError::MalformedEvent { reason }) => {
            warn!(path = %path, reason = %reason, "Rejected malformed event");
            (StatusCode::BAD_REQUEST, reason).into_response()
        }
        Err(e) => {
            error!(path = %path, error = %e, "Consumer failed to process message");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Copies request headers into a message header map.
///
/// Values that are not valid text are skipped.
pub(crate) fn to_headers(headers: &HeaderMap) -> Headers {
    let mut out = Headers::new();
    for (name, value) in headers {
        match value.to_str() {
            Ok(v) => out.insert(name.as_str(), v),
            Err(_) => warn!(header = %name, "Skipping non-text header value"),
        }
    }
    out
}
