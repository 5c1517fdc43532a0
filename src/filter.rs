//! Event decoders & filters (C6) — filter chains
//!
//! Each raw event class carries a chain of pre-filters (`raw_event → bool`)
//! and a chain of post-filters (`decoded_log → bool`). Chains are combined
//! with logical AND, evaluated short-circuit. Composition is by list
//! concatenation — an ordered `Vec` of predicate functions rather than a
//! multicast delegate.

use crate::event::RawEvent;
use crate::identifier::ProcessId;
use regex::Regex;

/// Reserved pid used by the Windows/Linux kernel for the system-idle
/// process; events attributed to it are noise, dropped by the default
/// pre-filter chain.
pub const SYSTEM_IDLE_PID: ProcessId = ProcessId(4);

type PreFilter = Box<dyn Fn(&RawEvent) -> bool + Send + Sync>;
type PostFilter = Box<dyn Fn(&serde_json::Value) -> bool + Send + Sync>;

/// An ordered, AND-combined chain of predicates. `true` means "keep the
/// event"; any predicate returning `false` vetoes it and short-circuits
/// the rest of the chain.
pub struct PreFilterChain {
    filters: Vec<PreFilter>,
}

impl PreFilterChain {
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    pub fn push(mut self, filter: PreFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Default chain: drops events from the agent's own pid and from
    /// pid 4 (system idle).
    pub fn default_chain(self_pid: ProcessId) -> Self {
        Self::new()
            .push(Box::new(move |event: &RawEvent| event.pid() != self_pid))
            .push(Box::new(|event: &RawEvent| event.pid() != SYSTEM_IDLE_PID))
    }

    pub fn passes(&self, event: &RawEvent) -> bool {
        self.filters.iter().all(|f| f(event))
    }
}

impl Default for PreFilterChain {
    fn default() -> Self {
        Self::new()
    }
}

/// An ordered, AND-combined chain of predicates over the decoded log
/// record.
pub struct PostFilterChain {
    filters: Vec<PostFilter>,
}

impl PostFilterChain {
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    pub fn push(mut self, filter: PostFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Default chain: drops events whose `User`/`SourceUser` fields match
    /// the system-user regex, and events whose `Image`/`SourceImage`
    /// fields match the agent-self regex.
    pub fn default_chain(system_user_regex: Regex, agent_self_regex: Regex) -> Self {
        let user_re = system_user_regex;
        let image_re = agent_self_regex;
        Self::new()
            .push(Box::new(move |log: &serde_json::Value| {
                !field_matches(log, &["User", "SourceUser"], &user_re)
            }))
            .push(Box::new(move |log: &serde_json::Value| {
                !field_matches(log, &["Image", "SourceImage"], &image_re)
            }))
    }

    pub fn passes(&self, log: &serde_json::Value) -> bool {
        self.filters.iter().all(|f| f(log))
    }
}

impl Default for PostFilterChain {
    fn default() -> Self {
        Self::new()
    }
}

fn field_matches(log: &serde_json::Value, field_names: &[&str], re: &Regex) -> bool {
    field_names.iter().any(|name| {
        log.get(name)
            .and_then(|v| v.as_str())
            .is_some_and(|s| re.is_match(s))
    })
}

/// The regex that flags built-in Windows system accounts, matched against
/// `User`/`SourceUser` fields by the default post-filter chain.
pub fn default_system_user_regex() -> Regex {
    Regex::new(r"(?i)^NT AUTHORITY\\(SYSTEM|LOCAL SERVICE|NETWORK SERVICE)$").unwrap()
}

/// The regex that flags the agent's own binary name, matched against
/// `Image`/`SourceImage` fields by the default post-filter chain.
pub fn default_agent_self_regex(agent_image_name: &str) -> Regex {
    Regex::new(&format!(r"(?i){}$", regex::escape(agent_image_name))).unwrap()
}
