#![forbid(unsafe_code)]

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::events::{SessionEvent, SessionListener};
use crate::expansion::ExpansionState;
use crate::propagation::PropagationEngine;
use crate::selection::SelectionState;
use crate::serializer::AssignmentSerializer;
use crate::source::{PersistenceService, RoleDirectory, RoleSummary, TreeLoader};
use crate::tree::{MenuTree, NodeData, NodeId, TreeLimits};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Loading,
    Ready,
    Saving,
}

impl SessionPhase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Saving => "saving",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identifies one tree fetch. Only the ticket of the most recent role
/// selection is accepted by [`RoleSession::complete_load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    role_code: String,
    generation: u64,
}

impl LoadTicket {
    pub fn role_code(&self) -> &str {
        &self.role_code
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied,
    /// A newer role selection superseded this fetch; its result was dropped.
    Stale,
}

/// Copy of everything the session holds for the current role.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub role_code: String,
    pub tree: MenuTree,
    pub selection: SelectionState,
    pub expansion: ExpansionState,
}

struct Loaded {
    tree: MenuTree,
    selection: SelectionState,
    expansion: ExpansionState,
}

struct Inner {
    phase: SessionPhase,
    roles: Vec<RoleSummary>,
    role: Option<String>,
    generation: u64,
    loaded: Option<Loaded>,
}

/// Drives one operator's role assignment: pick a role, load its tree,
/// toggle grants, save.
///
/// Engine work happens under a short-lived lock that is never held across
/// an await; tree fetches and saves run without it and reconcile on return.
pub struct RoleSession {
    directory: Arc<dyn RoleDirectory>,
    loader: Arc<dyn TreeLoader>,
    persistence: Arc<dyn PersistenceService>,
    serializer: AssignmentSerializer,
    limits: TreeLimits,
    listeners: Vec<Arc<dyn SessionListener>>,
    inner: Mutex<Inner>,
}

impl RoleSession {
    pub fn new(
        directory: Arc<dyn RoleDirectory>,
        loader: Arc<dyn TreeLoader>,
        persistence: Arc<dyn PersistenceService>,
    ) -> Self {
        Self {
            directory,
            loader,
            persistence,
            serializer: AssignmentSerializer::default(),
            limits: TreeLimits::default(),
            listeners: Vec::new(),
            inner: Mutex::new(Inner {
                phase: SessionPhase::Idle,
                roles: Vec::new(),
                role: None,
                generation: 0,
                loaded: None,
            }),
        }
    }

    pub fn with_engine_config(mut self, config: &EngineConfig) -> Self {
        self.serializer = config.serializer();
        self.limits = config.limits();
        self
    }

    pub fn with_serializer(mut self, serializer: AssignmentSerializer) -> Self {
        self.serializer = serializer;
        self
    }

    pub fn with_limits(mut self, limits: TreeLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn SessionListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    fn emit(&self, event: SessionEvent) {
        for listener in &self.listeners {
            listener.on_event(&event);
        }
    }

    /// Fetches the assignable roles from the directory.
    pub async fn start(&self) -> Result<Vec<RoleSummary>> {
        match self.directory.list_roles().await {
            Ok(roles) => {
                self.inner.lock().roles = roles.clone();
                self.emit(SessionEvent::RolesLoaded { count: roles.len() });
                Ok(roles)
            }
            Err(e) => {
                self.emit(SessionEvent::RolesFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    pub fn roles(&self) -> Vec<RoleSummary> {
        self.inner.lock().roles.clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.lock().phase
    }

    pub fn role(&self) -> Option<String> {
        self.inner.lock().role.clone()
    }

    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        let inner = self.inner.lock();
        let role_code = inner.role.clone()?;
        inner.loaded.as_ref().map(|loaded| SessionSnapshot {
            role_code,
            tree: loaded.tree.clone(),
            selection: loaded.selection.clone(),
            expansion: loaded.expansion.clone(),
        })
    }

    pub fn selection(&self) -> Option<SelectionState> {
        self.inner
            .lock()
            .loaded
            .as_ref()
            .map(|loaded| loaded.selection.clone())
    }

    /// Loads `role_code`, replacing whatever role was active.
    pub async fn select_role(&self, role_code: &str) -> Result<LoadOutcome> {
        let ticket = self.begin_load(role_code)?;
        let result = self.loader.load_tree(role_code).await;
        self.complete_load(ticket, result)
    }

    /// Switches to `role_code` and discards the previous role's tree,
    /// selection and expansion. Any fetch still in flight becomes stale.
    pub fn begin_load(&self, role_code: &str) -> Result<LoadTicket> {
        let mut inner = self.inner.lock();
        if !inner.roles.is_empty() && !inner.roles.iter().any(|r| r.role_code == role_code) {
            return Err(Error::UnknownRole(role_code.to_string()));
        }

        inner.generation += 1;
        inner.role = Some(role_code.to_string());
        inner.loaded = None;
        inner.phase = SessionPhase::Loading;

        info!(role = %role_code, generation = inner.generation, "Loading menu tree");
        Ok(LoadTicket {
            role_code: role_code.to_string(),
            generation: inner.generation,
        })
    }

    /// Applies the result of the fetch identified by `ticket`. A superseded
    /// ticket is dropped with [`LoadOutcome::Stale`] whatever its result.
    /// A failed or malformed load leaves the session [`SessionPhase::Idle`].
    pub fn complete_load(
        &self,
        ticket: LoadTicket,
        result: Result<Vec<NodeData>>,
    ) -> Result<LoadOutcome> {
        let (event, outcome) = {
            let mut inner = self.inner.lock();
            let current = inner.generation == ticket.generation
                && inner.role.as_deref() == Some(ticket.role_code.as_str());

            if !current {
                warn!(
                    role = %ticket.role_code,
                    generation = ticket.generation,
                    current_generation = inner.generation,
                    "Discarding stale menu tree"
                );
                (
                    SessionEvent::LoadDiscarded {
                        role_code: ticket.role_code,
                    },
                    Ok(LoadOutcome::Stale),
                )
            } else {
                match self.hydrate(result) {
                    Ok(loaded) => {
                        let event = SessionEvent::TreeLoaded {
                            role_code: ticket.role_code,
                            nodes: loaded.tree.len(),
                            granted: loaded.selection.granted_count(),
                        };
                        inner.loaded = Some(loaded);
                        inner.phase = SessionPhase::Ready;
                        (event, Ok(LoadOutcome::Applied))
                    }
                    Err(e) => {
                        inner.loaded = None;
                        inner.role = None;
                        inner.phase = SessionPhase::Idle;
                        (
                            SessionEvent::LoadFailed {
                                role_code: ticket.role_code,
                                error: e.to_string(),
                            },
                            Err(e),
                        )
                    }
                }
            }
        };

        self.emit(event);
        outcome
    }

    fn hydrate(&self, result: Result<Vec<NodeData>>) -> Result<Loaded> {
        let forest = result?;
        let tree = MenuTree::build_with_limits(&forest, self.limits)?;
        let selection = self.serializer.hydrate_tree(&tree, &forest);
        Ok(Loaded {
            tree,
            selection,
            expansion: ExpansionState::new(),
        })
    }

    /// Flips one node through the propagation engine. Returns the new
    /// selection.
    pub fn toggle(&self, id: NodeId) -> Result<SelectionState> {
        self.update_selection(id, |engine, state| engine.toggle(state, id))
    }

    pub fn set_granted(&self, id: NodeId, value: bool) -> Result<SelectionState> {
        self.update_selection(id, |engine, state| engine.set(state, id, value))
    }

    fn update_selection<F>(&self, id: NodeId, apply: F) -> Result<SelectionState>
    where
        F: FnOnce(&PropagationEngine<'_>, &SelectionState) -> Result<SelectionState>,
    {
        let mut inner = self.inner.lock();
        if inner.phase != SessionPhase::Ready {
            return Err(Error::InvalidPhase {
                expected: SessionPhase::Ready.name(),
                actual: inner.phase.name(),
            });
        }
        let loaded = inner.loaded.as_mut().ok_or(Error::InvalidPhase {
            expected: SessionPhase::Ready.name(),
            actual: SessionPhase::Idle.name(),
        })?;

        let engine = PropagationEngine::new(&loaded.tree);
        let next = apply(&engine, &loaded.selection)?;
        debug!(
            node = %id,
            granted = next.is_granted(id),
            changed = next.diff(&loaded.selection).len(),
            "Selection updated"
        );
        loaded.selection = next.clone();
        Ok(next)
    }

    /// Flips whether `id` shows its children. Returns the new value.
    pub fn toggle_expanded(&self, id: NodeId) -> Result<bool> {
        let mut inner = self.inner.lock();
        let loaded = inner.loaded.as_mut().ok_or(Error::InvalidPhase {
            expected: SessionPhase::Ready.name(),
            actual: SessionPhase::Idle.name(),
        })?;
        if !loaded.tree.contains(id) {
            return Err(Error::UnknownNode(id));
        }
        Ok(loaded.expansion.toggle(id))
    }

    pub fn expand_all(&self) {
        let mut inner = self.inner.lock();
        if let Some(loaded) = inner.loaded.as_mut() {
            loaded.expansion.expand_all(&loaded.tree);
        }
    }

    pub fn collapse_all(&self) {
        let mut inner = self.inner.lock();
        if let Some(loaded) = inner.loaded.as_mut() {
            loaded.expansion.collapse_all();
        }
    }

    /// Ids that [`save`](Self::save) would submit right now.
    pub fn payload(&self) -> Result<Vec<NodeId>> {
        let inner = self.inner.lock();
        let loaded = inner.loaded.as_ref().ok_or(Error::InvalidPhase {
            expected: SessionPhase::Ready.name(),
            actual: inner.phase.name(),
        })?;
        Ok(self.serializer.payload_for(&loaded.tree, &loaded.selection))
    }

    /// Submits the current selection. Validation failures never reach the
    /// persistence service; any failure keeps the selection and returns the
    /// session to [`SessionPhase::Ready`].
    pub async fn save(&self) -> Result<()> {
        let prepared = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            match (inner.role.as_deref(), inner.loaded.as_ref()) {
                (None, _) => Err(Error::Validation("no role selected".into())),
                (Some(_), _) if inner.phase != SessionPhase::Ready => Err(Error::InvalidPhase {
                    expected: SessionPhase::Ready.name(),
                    actual: inner.phase.name(),
                }),
                (Some(_), None) => Err(Error::Validation("no menu tree loaded".into())),
                (Some(role), Some(loaded)) => {
                    let request = self.serializer.request(role, &loaded.tree, &loaded.selection);
                    if request.is_empty() {
                        Err(Error::Validation(format!(
                            "no menus selected for role {}",
                            role
                        )))
                    } else {
                        inner.phase = SessionPhase::Saving;
                        Ok((request, inner.generation))
                    }
                }
            }
        };

        let (request, generation) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                if matches!(e, Error::Validation(_)) {
                    self.emit(SessionEvent::SaveRejected {
                        reason: e.to_string(),
                    });
                }
                return Err(e);
            }
        };

        info!(
            role = %request.role_code,
            count = request.menu_ids.len(),
            "Saving role assignment"
        );
        let result = match self.persistence.save_assignment(&request).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(Error::Transport(format!(
                "persistence service refused assignment for role {}",
                request.role_code
            ))),
            Err(e) => Err(e),
        };

        {
            let mut inner = self.inner.lock();
            if inner.generation == generation && inner.phase == SessionPhase::Saving {
                inner.phase = SessionPhase::Ready;
            }
        }

        match result {
            Ok(()) => {
                self.emit(SessionEvent::Saved {
                    role_code: request.role_code,
                    count: request.menu_ids.len(),
                });
                Ok(())
            }
            Err(e) => {
                self.emit(SessionEvent::SaveFailed {
                    role_code: request.role_code,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Drops the current role and invalidates any fetch in flight.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        inner.role = None;
        inner.loaded = None;
        inner.phase = SessionPhase::Idle;
    }
}
