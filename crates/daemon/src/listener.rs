// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for the request socket.
//!
//! Accepts connections and handles them without blocking the scheduler
//! loop. A connection may carry any number of newline-terminated
//! requests; every one gets exactly one response line.

use crate::protocol::{self, OperatorRequest, Request, DEFAULT_TIMEOUT};
use ken_core::{AgentResponse, Clock, IdGen, KenPath, RequestParseError, SessionId};
use ken_engine::{ops, RequestHandler};
use ken_storage::Store;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Notify;
use tracing::{debug, error, warn};

/// Shared context for all connections.
pub struct ListenCtx<C: Clock, G: IdGen> {
    pub handler: RequestHandler<C, G>,
    pub store: Store,
    pub clock: C,
    pub idgen: G,
    pub shutdown: Arc<Notify>,
}

/// The accept loop.
pub struct Listener<C: Clock, G: IdGen> {
    socket: UnixListener,
    ctx: Arc<ListenCtx<C, G>>,
}

impl<C: Clock, G: IdGen> Listener<C, G> {
    pub fn new(socket: UnixListener, ctx: Arc<ListenCtx<C, G>>) -> Self {
        Self { socket, ctx }
    }

    pub async fn run(self) {
        loop {
            match self.socket.accept().await {
                Ok((stream, _)) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, &ctx).await {
                            match e {
                                protocol::ProtocolError::Timeout => debug!("connection idle, closing"),
                                _ => warn!("connection error: {e}"),
                            }
                        }
                    });
                }
                Err(e) => error!("accept error: {e}"),
            }
        }
    }
}

async fn handle_connection<C: Clock, G: IdGen>(
    stream: UnixStream,
    ctx: &ListenCtx<C, G>,
) -> Result<(), protocol::ProtocolError> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    while let Some(line) = protocol::read_line(&mut reader, DEFAULT_TIMEOUT).await? {
        if line.is_empty() {
            continue;
        }
        let response = dispatch(&line, ctx);
        protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT).await?;
    }
    Ok(())
}

/// Route one request line to the right executor.
pub fn dispatch<C: Clock, G: IdGen>(line: &str, ctx: &ListenCtx<C, G>) -> AgentResponse {
    match Request::parse(line) {
        Ok(Request::Agent(request)) => ctx.handler.handle(&request),
        Ok(Request::Operator(request)) => dispatch_operator(request, ctx),
        Err(RequestParseError::UnknownType) => AgentResponse::err("unknown request type"),
        Err(e) => AgentResponse::err(e.to_string()),
    }
}

fn dispatch_operator<C: Clock, G: IdGen>(
    request: OperatorRequest,
    ctx: &ListenCtx<C, G>,
) -> AgentResponse {
    match request {
        OperatorRequest::Wake {
            ken_path,
            task,
            done_when,
        } => {
            let ken_path = match KenPath::new(&ken_path) {
                Ok(ken_path) => ken_path,
                Err(e) => return AgentResponse::err(format!("invalid ken path: {e}")),
            };
            match ops::wake_root(&ctx.store, &ctx.clock, &ctx.idgen, ken_path, task, done_when) {
                Ok(id) => AgentResponse::with_data(serde_json::json!({ "session_id": id })),
                Err(e) => AgentResponse::err(e.to_string()),
            }
        }

        OperatorRequest::Recover { id } => match resolve_id(ctx, &id) {
            Some(id) => match ops::recover(&ctx.store, &ctx.clock, &id) {
                Ok(()) => AgentResponse::with_data(serde_json::json!({ "session_id": id })),
                Err(e) => AgentResponse::err(e.to_string()),
            },
            None => AgentResponse::err(format!("unknown session: {id}")),
        },

        OperatorRequest::Abandon { id, reason } => match resolve_id(ctx, &id) {
            Some(id) => match ops::abandon(&ctx.store, &ctx.clock, &id, &reason) {
                Ok(()) => AgentResponse::with_data(serde_json::json!({ "session_id": id })),
                Err(e) => AgentResponse::err(e.to_string()),
            },
            None => AgentResponse::err(format!("unknown session: {id}")),
        },

        OperatorRequest::Ping => AgentResponse::with_data(serde_json::json!({ "pong": true })),

        OperatorRequest::Shutdown => {
            ctx.shutdown.notify_one();
            AgentResponse::ok()
        }
    }
}

/// Exact or unique-prefix session id lookup.
fn resolve_id<C: Clock, G: IdGen>(ctx: &ListenCtx<C, G>, id: &str) -> Option<SessionId> {
    ctx.store
        .read(|state| state.get_session(id).map(|s| s.id.clone()))
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
