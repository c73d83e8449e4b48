#![forbid(unsafe_code)]

pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod expansion;
pub mod propagation;
pub mod selection;
pub mod serializer;
pub mod session;
pub mod source;
pub mod store;
pub mod tree;

pub use catalog::{Catalog, CatalogTreeLoader};
pub use config::{Config, EngineConfig};
pub use error::{Error, Result};
pub use events::{LoggingListener, SessionEvent, SessionListener};
pub use expansion::ExpansionState;
pub use propagation::PropagationEngine;
pub use selection::SelectionState;
pub use serializer::{AssignmentRequest, AssignmentSerializer, HydrationPolicy, PayloadMode};
pub use session::{LoadOutcome, LoadTicket, RoleSession, SessionPhase, SessionSnapshot};
pub use source::{PersistenceService, RoleDirectory, RoleSummary, TreeLoader};
pub use store::{
    AssignmentRecord, AssignmentStore, InMemoryAssignmentStore, InMemoryRoleDirectory,
    InMemoryTreeLoader, RedbAssignmentStore, RedbStorage,
};
pub use tree::{
    Ancestors, Descendants, MalformedTreeError, MenuRow, MenuTree, Node, NodeData, NodeId,
    TreeLimits, ORGANIZATIONAL_URL,
};
