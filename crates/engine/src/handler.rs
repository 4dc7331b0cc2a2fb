// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The request handler: the only way agents mutate workflow state.
//!
//! Each verb is a single store transaction; a response is either
//! `{ok:true, data?}` with the full effect committed, or `{ok:false,
//! error}` with nothing changed. The handler itself never fails; every
//! error becomes an error response.

use ken_core::{
    AgentRequest, AgentResponse, ChildSpec, Clock, Event, IdGen, KenPath, RequestParseError,
    SessionId, SessionStatus, TriggerSpec,
};
use ken_storage::{Store, StoreError};
use tracing::{debug, info};

/// Validates and executes agent requests against the store.
#[derive(Clone)]
pub struct RequestHandler<C: Clock, G: IdGen> {
    store: Store,
    clock: C,
    idgen: G,
}

impl<C: Clock, G: IdGen> RequestHandler<C, G> {
    pub fn new(store: Store, clock: C, idgen: G) -> Self {
        Self {
            store,
            clock,
            idgen,
        }
    }

    /// Handle one raw request line: parse errors and unknown types become
    /// error responses, exactly like guard violations.
    pub fn handle_line(&self, line: &str) -> AgentResponse {
        match AgentRequest::parse(line) {
            Ok(request) => self.handle(&request),
            Err(RequestParseError::UnknownType) => AgentResponse::err("unknown request type"),
            Err(e) => AgentResponse::err(e.to_string()),
        }
    }

    pub fn handle(&self, request: &AgentRequest) -> AgentResponse {
        debug!(request = request.type_name(), session = %request.session_id(), "handling request");
        match request {
            AgentRequest::Complete { session_id, result } => self.complete(session_id, result),
            AgentRequest::Fail { session_id, reason } => self.fail(session_id, reason),
            AgentRequest::Sleep {
                session_id,
                trigger,
                checkpoint,
            } => self.sleep(session_id, trigger, checkpoint.as_deref()),
            AgentRequest::SpawnAndSleep {
                session_id,
                children,
                trigger,
                checkpoint,
            } => self.spawn_and_sleep(session_id, children, trigger, checkpoint.as_deref()),
            AgentRequest::Checkpoint {
                session_id,
                checkpoint,
            } => self.checkpoint(session_id, checkpoint),
        }
    }

    fn complete(&self, id: &SessionId, result: &str) -> AgentResponse {
        let at = self.clock.now();
        let outcome = self.store.transaction(|tx| {
            require_active(tx.state(), id)?;
            tx.stage(Event::Complete {
                id: id.clone(),
                result: result.to_string(),
                at,
            })
        });
        match outcome {
            Ok(()) => {
                info!(session = %id, "session complete");
                AgentResponse::ok()
            }
            Err(e) => AgentResponse::err(e.to_string()),
        }
    }

    fn fail(&self, id: &SessionId, reason: &str) -> AgentResponse {
        let at = self.clock.now();
        let outcome = self.store.transaction(|tx| {
            require_active(tx.state(), id)?;
            tx.stage(Event::Failed {
                id: id.clone(),
                reason: reason.to_string(),
                at,
            })
        });
        match outcome {
            Ok(()) => {
                info!(session = %id, "session failed by request");
                AgentResponse::ok()
            }
            Err(e) => AgentResponse::err(e.to_string()),
        }
    }

    fn sleep(
        &self,
        id: &SessionId,
        trigger: &TriggerSpec,
        checkpoint: Option<&str>,
    ) -> AgentResponse {
        let at = self.clock.now();
        // Resolution happens with no children in scope: the sentinel is a
        // spawn_and_sleep feature and fails loudly here.
        let trigger = match trigger.resolve(at, &[]) {
            Ok(trigger) => trigger,
            Err(e) => return AgentResponse::err(e.to_string()),
        };

        let outcome = self.store.transaction(|tx| {
            require_active(tx.state(), id)?;
            tx.stage(Event::Sleep {
                id: id.clone(),
                trigger,
                checkpoint: checkpoint.map(str::to_string),
                at,
            })
        });
        match outcome {
            Ok(()) => AgentResponse::ok(),
            Err(e) => AgentResponse::err(e.to_string()),
        }
    }

    fn spawn_and_sleep(
        &self,
        id: &SessionId,
        children: &[ChildSpec],
        trigger: &TriggerSpec,
        checkpoint: Option<&str>,
    ) -> AgentResponse {
        let at = self.clock.now();

        if children.is_empty() {
            return AgentResponse::err("spawn_and_sleep requires at least one child");
        }

        let mut parsed: Vec<(KenPath, &ChildSpec)> = Vec::with_capacity(children.len());
        for child in children {
            match KenPath::new(&child.ken_path) {
                Ok(ken_path) => parsed.push((ken_path, child)),
                Err(e) => {
                    return AgentResponse::err(format!(
                        "invalid child ken path {:?}: {e}",
                        child.ken_path
                    ))
                }
            }
        }

        // Ids are minted by the engine, never by agents, so duplicates
        // within one spawn cannot exist.
        let minted: Vec<SessionId> = children.iter().map(|_| self.idgen.next()).collect();

        let trigger = match trigger.resolve(at, &minted) {
            Ok(trigger) => trigger,
            Err(e) => return AgentResponse::err(e.to_string()),
        };

        let outcome = self.store.transaction(|tx| {
            require_active(tx.state(), id)?;
            tx.stage(Event::Spawn {
                id: id.clone(),
                children: minted.clone(),
                at,
            })?;
            for (child_id, (ken_path, spec)) in minted.iter().zip(&parsed) {
                tx.stage(Event::SessionCreated {
                    id: child_id.clone(),
                    ken_path: ken_path.clone(),
                    task: spec.task.clone(),
                    done_when: spec.done_when.clone(),
                    parent_id: Some(id.clone()),
                    at,
                })?;
            }
            tx.stage(Event::Sleep {
                id: id.clone(),
                trigger,
                checkpoint: checkpoint.map(str::to_string),
                at,
            })
        });

        match outcome {
            Ok(()) => {
                info!(session = %id, children = minted.len(), "spawn_and_sleep committed");
                AgentResponse::with_data(serde_json::json!({ "children": minted }))
            }
            Err(e) => AgentResponse::err(e.to_string()),
        }
    }

    fn checkpoint(&self, id: &SessionId, checkpoint: &str) -> AgentResponse {
        let at = self.clock.now();
        let outcome = self.store.transaction(|tx| {
            tx.stage(Event::Checkpoint {
                id: id.clone(),
                checkpoint: checkpoint.to_string(),
                at,
            })
        });
        match outcome {
            Ok(()) => AgentResponse::ok(),
            Err(e) => AgentResponse::err(e.to_string()),
        }
    }
}

/// The shared guard: requests are only accepted from active sessions.
fn require_active(
    state: &ken_storage::MaterializedState,
    id: &SessionId,
) -> Result<(), StoreError> {
    let session = state
        .session(id)
        .ok_or_else(|| StoreError::NotFound(id.as_str().to_string()))?;
    if session.status != SessionStatus::Active {
        return Err(StoreError::WrongStatus {
            id: id.as_str().to_string(),
            status: session.status,
            expected: SessionStatus::Active,
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
