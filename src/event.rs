//! Raw event / event-code model
//!
//! The ETW/Sysmon session plumbing that produces raw events is treated as
//! an external collaborator; this module only models its inbound
//! interface. [`RawEvent`] models the three shapes a real session hands to
//! the decoder before it reaches the recorder facade.

use crate::identifier::ProcessId;
use crate::registry::EventCode;
use serde::{Deserialize, Serialize};

/// One undecoded event as it arrives from an event session, before the
/// pre-filter/decoder/post-filter pipeline runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RawEvent {
    Launch(RawLaunch),
    Terminate(RawTerminate),
    Action(RawAction),
}

impl RawEvent {
    /// The pid the pre-filter chain checks against the agent's own pid and
    /// pid 4.
    pub fn pid(&self) -> ProcessId {
        match self {
            RawEvent::Launch(e) => e.pid,
            RawEvent::Terminate(e) => e.pid,
            RawEvent::Action(e) => e.pid,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLaunch {
    pub pid: ProcessId,
    pub parent_pid: Option<ProcessId>,
    pub image: String,
    pub user: Option<String>,
    pub timestamp_ns: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTerminate {
    pub pid: ProcessId,
    pub image: String,
    pub user: Option<String>,
    pub timestamp_ns: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAction {
    pub pid: ProcessId,
    pub source_image: String,
    pub source_user: Option<String>,
    pub target: String,
    pub event_code: RawEventCode,
    pub timestamp_ns: u64,
}

/// The wire-level event code a Sysmon/kernel session reports, before it is
/// mapped to an [`EventCode`] via the registry's lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RawEventCode {
    Sysmon2,
    Sysmon3,
    Sysmon8,
    Sysmon11,
    Sysmon12Add,
    Sysmon12Del,
    Sysmon13,
    Sysmon14,
    Sysmon15,
    Sysmon23,
    Sysmon25,
    Sysmon29,
    Other(i32),
}

impl From<RawEventCode> for EventCode {
    fn from(raw: RawEventCode) -> Self {
        match raw {
            RawEventCode::Sysmon2 => EventCode::Sysmon2,
            RawEventCode::Sysmon3 => EventCode::Sysmon3,
            RawEventCode::Sysmon8 => EventCode::Sysmon8,
            RawEventCode::Sysmon11 => EventCode::Sysmon11,
            RawEventCode::Sysmon12Add => EventCode::Sysmon12Add,
            RawEventCode::Sysmon12Del => EventCode::Sysmon12Del,
            RawEventCode::Sysmon13 => EventCode::Sysmon13,
            RawEventCode::Sysmon14 => EventCode::Sysmon14,
            RawEventCode::Sysmon15 => EventCode::Sysmon15,
            RawEventCode::Sysmon23 => EventCode::Sysmon23,
            RawEventCode::Sysmon25 => EventCode::Sysmon25,
            RawEventCode::Sysmon29 => EventCode::Sysmon29,
            RawEventCode::Other(code) => EventCode::Unknown(code),
        }
    }
}
