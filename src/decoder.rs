//! Event decoders (C6)
//!
//! Projects a [`RawEvent`] into a decoded JSON log record, running it
//! through the pre-filter chain before decoding and the post-filter chain
//! after. Returns `None` when either chain vetoes the event — the recorder
//! then drops it without calling into the registry.

use crate::event::{RawAction, RawEvent, RawLaunch, RawTerminate};
use crate::filter::{PostFilterChain, PreFilterChain};
use crate::identifier::ProcessId;
use crate::registry::EventCode;

/// One decoded event, ready for the recorder facade to dispatch to the
/// registry's matching `on_*` operation.
#[derive(Debug, Clone)]
pub enum DecodedEvent {
    Launch {
        pid: ProcessId,
        parent_pid: Option<ProcessId>,
        image: String,
        log: serde_json::Value,
    },
    Terminate {
        pid: ProcessId,
        log: serde_json::Value,
    },
    Action {
        pid: ProcessId,
        target: String,
        event_code: EventCode,
        log: serde_json::Value,
    },
}

/// Bundles the pre/post filter chains for one event session.
pub struct Decoder {
    pre_filters: PreFilterChain,
    post_filters: PostFilterChain,
}

impl Decoder {
    pub fn new(pre_filters: PreFilterChain, post_filters: PostFilterChain) -> Self {
        Self {
            pre_filters,
            post_filters,
        }
    }

    /// `raw_event → decoded_log?`. Returns `None` when any filter vetoes the
    /// event.
    pub fn decode(&self, raw: RawEvent) -> Option<DecodedEvent> {
        if !self.pre_filters.passes(&raw) {
            return None;
        }

        let (log, decoded) = match &raw {
            RawEvent::Launch(RawLaunch {
                pid,
                parent_pid,
                image,
                user,
                timestamp_ns,
            }) => {
                let log = serde_json::json!({
                    "EventType": "launch",
                    "ProcessId": pid.0,
                    "ParentProcessId": parent_pid.map(|p| p.0),
                    "Image": image,
                    "User": user,
                    "UtcTime": timestamp_ns,
                });
                (
                    log.clone(),
                    DecodedEvent::Launch {
                        pid: *pid,
                        parent_pid: *parent_pid,
                        image: image.clone(),
                        log,
                    },
                )
            }
            RawEvent::Terminate(RawTerminate {
                pid,
                image,
                user,
                timestamp_ns,
            }) => {
                let log = serde_json::json!({
                    "EventType": "terminate",
                    "ProcessId": pid.0,
                    "Image": image,
                    "User": user,
                    "UtcTime": timestamp_ns,
                });
                (
                    log.clone(),
                    DecodedEvent::Terminate { pid: *pid, log },
                )
            }
            RawEvent::Action(RawAction {
                pid,
                source_image,
                source_user,
                target,
                event_code,
                timestamp_ns,
            }) => {
                let log = serde_json::json!({
                    "EventType": "action",
                    "ProcessId": pid.0,
                    "SourceImage": source_image,
                    "SourceUser": source_user,
                    "TargetObject": target,
                    "UtcTime": timestamp_ns,
                });
                (
                    log.clone(),
                    DecodedEvent::Action {
                        pid: *pid,
                        target: target.clone(),
                        event_code: EventCode::from(*event_code),
                        log,
                    },
                )
            }
        };

        if !self.post_filters.passes(&log) {
            return None;
        }

        Some(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RawEventCode;
    use crate::filter::{default_agent_self_regex, default_system_user_regex};

    fn decoder(self_pid: ProcessId) -> Decoder {
        Decoder::new(
            PreFilterChain::default_chain(self_pid),
            PostFilterChain::default_chain(
                default_system_user_regex(),
                default_agent_self_regex("agent.exe"),
            ),
        )
    }

    #[test]
    fn decodes_launch_event() {
        let d = decoder(ProcessId(999));
        let raw = RawEvent::Launch(RawLaunch {
            pid: ProcessId(1),
            parent_pid: Some(ProcessId(0)),
            image: "a.exe".into(),
            user: Some("alice".into()),
            timestamp_ns: 100,
        });
        let decoded = d.decode(raw).unwrap();
        match decoded {
            DecodedEvent::Launch { pid, image, .. } => {
                assert_eq!(pid, ProcessId(1));
                assert_eq!(image, "a.exe");
            }
            _ => panic!("expected Launch"),
        }
    }

    #[test]
    fn drops_event_from_self_pid() {
        let d = decoder(ProcessId(1));
        let raw = RawEvent::Launch(RawLaunch {
            pid: ProcessId(1),
            parent_pid: None,
            image: "a.exe".into(),
            user: None,
            timestamp_ns: 0,
        });
        assert!(d.decode(raw).is_none());
    }

    #[test]
    fn drops_event_from_system_user() {
        let d = decoder(ProcessId(999));
        let raw = RawEvent::Launch(RawLaunch {
            pid: ProcessId(1),
            parent_pid: None,
            image: "a.exe".into(),
            user: Some("NT AUTHORITY\\SYSTEM".into()),
            timestamp_ns: 0,
        });
        assert!(d.decode(raw).is_none());
    }

    #[test]
    fn drops_action_from_agent_self_image() {
        let d = decoder(ProcessId(999));
        let raw = RawEvent::Action(RawAction {
            pid: ProcessId(1),
            source_image: "C:/agent.exe".into(),
            source_user: None,
            target: "x".into(),
            event_code: RawEventCode::Sysmon11,
            timestamp_ns: 0,
        });
        assert!(d.decode(raw).is_none());
    }
}
