//! Identifier & Artifact model (C1)
//!
//! Pure value types: process identifiers, artifacts (the subject/object of an
//! actor relation), and the stable string keys derived from them. Equality is
//! structural; every key is computed once at construction so callers never
//! recompute it.

use crate::error::CorrelatorError;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// The kind of entity an [`Artifact`] names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    File,
    Registry,
    Network,
    Process,
    Module,
    /// Sentinel "invalid" value. Any operation receiving it fails `InvalidArgument`.
    Undefined,
}

impl ArtifactKind {
    fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::File => "File",
            ArtifactKind::Registry => "Registry",
            ArtifactKind::Network => "Network",
            ArtifactKind::Process => "Process",
            ArtifactKind::Module => "Module",
            ArtifactKind::Undefined => "Undefined",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An immutable (kind, name) pair identifying a file, registry key, network
/// endpoint, module, or process target. `name` is the canonical path,
/// address, or image string as provided by the event source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Artifact {
    kind: ArtifactKind,
    name: String,
}

impl Artifact {
    /// Construct an artifact. Fails `InvalidArgument` if `kind` is
    /// `Undefined` or `name` is empty.
    pub fn new(kind: ArtifactKind, name: impl Into<String>) -> Result<Self, CorrelatorError> {
        let name = name.into();
        if kind == ArtifactKind::Undefined {
            return Err(CorrelatorError::InvalidArgument(
                "artifact kind must not be Undefined".to_string(),
            ));
        }
        if name.is_empty() {
            return Err(CorrelatorError::InvalidArgument(
                "artifact name must not be empty".to_string(),
            ));
        }
        Ok(Self { kind, name })
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A closed enumeration of the actions an actor span can represent.
///
/// Partitioned into three bands: `NotActor` (the process entity itself),
/// the read/receive direction, and the write/send direction. The mapping
/// to [`ActorDirection`] is total and fixed at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActorType {
    /// Not an actor — used for the process entity itself.
    NotActor,

    // Read/receive direction.
    RemoteThread,
    Tampering,
    Accept,
    CreateStreamHash,

    // Write/send direction.
    Connect,
    Create,
    Delete,
    Modify,
    RegAdd,
    RegDelete,
    RegSet,
    RegRename,

    /// Sentinel "invalid" value. Any operation receiving it fails `InvalidArgument`.
    Undefined,
}

impl ActorType {
    fn as_str(self) -> &'static str {
        match self {
            ActorType::NotActor => "NOT_ACTOR",
            ActorType::RemoteThread => "REMOTE_THREAD",
            ActorType::Tampering => "TAMPERING",
            ActorType::Accept => "ACCEPT",
            ActorType::CreateStreamHash => "CREATE_STREAM_HASH",
            ActorType::Connect => "CONNECT",
            ActorType::Create => "CREATE",
            ActorType::Delete => "DELETE",
            ActorType::Modify => "MODIFY",
            ActorType::RegAdd => "REG_ADD",
            ActorType::RegDelete => "REG_DELETE",
            ActorType::RegSet => "REG_SET",
            ActorType::RegRename => "REG_RENAME",
            ActorType::Undefined => "UNDEFINED",
        }
    }

    /// Total, fixed-at-build-time mapping from actor type to direction.
    pub fn direction(self) -> ActorDirection {
        match self {
            ActorType::NotActor => ActorDirection::NotActor,
            ActorType::RemoteThread
            | ActorType::Tampering
            | ActorType::Accept
            | ActorType::CreateStreamHash => ActorDirection::ReadRecv,
            ActorType::Connect
            | ActorType::Create
            | ActorType::Delete
            | ActorType::Modify
            | ActorType::RegAdd
            | ActorType::RegDelete
            | ActorType::RegSet
            | ActorType::RegRename => ActorDirection::WriteSend,
            ActorType::Undefined => ActorDirection::NotActor,
        }
    }
}

impl fmt::Display for ActorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coarse partition used to choose which actor map holds a given actor type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActorDirection {
    ReadRecv,
    WriteSend,
    NotActor,
}

/// A process identifier as carried by the raw event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProcessId(pub i64);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compute the stable `actor:<type>:<kind>:<name>` key for an actor.
///
/// Two events producing the same key within the same process and direction
/// MUST coalesce onto the same span.
pub fn actor_key(actor_type: ActorType, artifact: &Artifact) -> String {
    format!("actor:{}:{}:{}", actor_type, artifact.kind(), artifact.name())
}

/// Compute the stable `proc:<image-path>:<process-id>` key for a process.
pub fn process_key(image_path: &str, pid: ProcessId) -> String {
    format!("proc:{}:{}", image_path, pid)
}

/// A polymorphic handle over "anything with a log counter". Both
/// [`ProcessContext`] and [`ActorContext`] satisfy it, so `upsert_activity`
/// (C4) can return either uniformly to its callers. Implementations
/// are cheap, reference-counted clones (mirroring [`crate::span_context::Span`]):
/// every clone of a context mutates the same shared counter, which is what
/// lets the registry hand a context out to a caller, have that caller
/// increment the counter, and still see the update reflected in the entry
/// stored inside the owning actor map or process activity context.
pub trait SystemContext {
    /// The stable string key identifying this context.
    fn context_key(&self) -> String;

    /// Number of log records attached so far.
    fn log_count(&self) -> u64;

    /// Atomically increments and returns the new count.
    fn increment_log_count(&self) -> u64;
}

struct ProcessContextInner {
    pid: ProcessId,
    artifact: Artifact,
    key: String,
    log_count: u64,
}

/// (process-id, artifact{kind=Process, name=image-path}, log-counter).
#[derive(Clone)]
pub struct ProcessContext {
    inner: Rc<RefCell<ProcessContextInner>>,
}

impl ProcessContext {
    pub fn new(pid: ProcessId, artifact: Artifact) -> Self {
        let key = process_key(artifact.name(), pid);
        Self {
            inner: Rc::new(RefCell::new(ProcessContextInner {
                pid,
                artifact,
                key,
                log_count: 0,
            })),
        }
    }

    pub fn pid(&self) -> ProcessId {
        self.inner.borrow().pid
    }

    pub fn artifact(&self) -> Artifact {
        self.inner.borrow().artifact.clone()
    }
}

impl SystemContext for ProcessContext {
    fn context_key(&self) -> String {
        self.inner.borrow().key.clone()
    }

    fn log_count(&self) -> u64 {
        self.inner.borrow().log_count
    }

    fn increment_log_count(&self) -> u64 {
        let mut inner = self.inner.borrow_mut();
        inner.log_count += 1;
        inner.log_count
    }
}

struct ActorContextInner {
    artifact: Artifact,
    actor_type: ActorType,
    key: String,
    log_count: u64,
}

/// (artifact, actor-type, log-counter).
#[derive(Clone)]
pub struct ActorContext {
    inner: Rc<RefCell<ActorContextInner>>,
}

impl ActorContext {
    pub fn new(artifact: Artifact, actor_type: ActorType) -> Self {
        let key = actor_key(actor_type, &artifact);
        Self {
            inner: Rc::new(RefCell::new(ActorContextInner {
                artifact,
                actor_type,
                key,
                log_count: 0,
            })),
        }
    }

    pub fn artifact(&self) -> Artifact {
        self.inner.borrow().artifact.clone()
    }

    pub fn actor_type(&self) -> ActorType {
        self.inner.borrow().actor_type
    }
}

impl SystemContext for ActorContext {
    fn context_key(&self) -> String {
        self.inner.borrow().key.clone()
    }

    fn log_count(&self) -> u64 {
        self.inner.borrow().log_count
    }

    fn increment_log_count(&self) -> u64 {
        let mut inner = self.inner.borrow_mut();
        inner.log_count += 1;
        inner.log_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_rejects_undefined_kind() {
        let err = Artifact::new(ArtifactKind::Undefined, "x").unwrap_err();
        assert!(matches!(err, CorrelatorError::InvalidArgument(_)));
    }

    #[test]
    fn artifact_rejects_empty_name() {
        let err = Artifact::new(ArtifactKind::File, "").unwrap_err();
        assert!(matches!(err, CorrelatorError::InvalidArgument(_)));
    }

    #[test]
    fn artifact_equality_is_structural() {
        let a = Artifact::new(ArtifactKind::File, "C:/a.txt").unwrap();
        let b = Artifact::new(ArtifactKind::File, "C:/a.txt").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn direction_mapping_is_total_and_fixed() {
        assert_eq!(ActorType::RemoteThread.direction(), ActorDirection::ReadRecv);
        assert_eq!(ActorType::Tampering.direction(), ActorDirection::ReadRecv);
        assert_eq!(ActorType::Accept.direction(), ActorDirection::ReadRecv);
        assert_eq!(
            ActorType::CreateStreamHash.direction(),
            ActorDirection::ReadRecv
        );
        assert_eq!(ActorType::Connect.direction(), ActorDirection::WriteSend);
        assert_eq!(ActorType::Create.direction(), ActorDirection::WriteSend);
        assert_eq!(ActorType::Delete.direction(), ActorDirection::WriteSend);
        assert_eq!(ActorType::Modify.direction(), ActorDirection::WriteSend);
        assert_eq!(ActorType::RegAdd.direction(), ActorDirection::WriteSend);
        assert_eq!(ActorType::RegDelete.direction(), ActorDirection::WriteSend);
        assert_eq!(ActorType::RegSet.direction(), ActorDirection::WriteSend);
        assert_eq!(ActorType::RegRename.direction(), ActorDirection::WriteSend);
        assert_eq!(ActorType::NotActor.direction(), ActorDirection::NotActor);
    }

    #[test]
    fn actor_key_format() {
        let artifact = Artifact::new(ArtifactKind::File, "C:/a.txt").unwrap();
        assert_eq!(
            actor_key(ActorType::Create, &artifact),
            "actor:CREATE:File:C:/a.txt"
        );
    }

    #[test]
    fn process_key_format() {
        assert_eq!(
            process_key("parent.exe", ProcessId(100)),
            "proc:parent.exe:100"
        );
    }

    #[test]
    fn process_context_counts_logs() {
        let artifact = Artifact::new(ArtifactKind::Process, "parent.exe").unwrap();
        let ctx = ProcessContext::new(ProcessId(100), artifact);
        assert_eq!(ctx.log_count(), 0);
        assert_eq!(ctx.increment_log_count(), 1);
        assert_eq!(ctx.increment_log_count(), 2);
        assert_eq!(ctx.context_key(), "proc:parent.exe:100");
    }

    #[test]
    fn actor_context_counts_logs() {
        let artifact = Artifact::new(ArtifactKind::File, "C:/a.txt").unwrap();
        let ctx = ActorContext::new(artifact, ActorType::Create);
        assert_eq!(ctx.increment_log_count(), 1);
        assert_eq!(ctx.context_key(), "actor:CREATE:File:C:/a.txt");
    }
}
