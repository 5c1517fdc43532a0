//! Single-writer dispatch
//!
//! Funnels [`RawEvent`]s from any number of producer threads onto one
//! worker thread via a bounded multi-producer channel, decodes/filters
//! each event, and calls the single [`Recorder`] instance — never touching
//! the registry from more than one thread. The `Recorder` (and the `Span`
//! handles it creates) is constructed *inside* the worker closure rather
//! than moved in from the caller: `Span` is reference-counted and
//! intentionally not `Send` — there's no pretending span identity is safe
//! to hand across threads — so the only sound place to build one is the
//! thread that will exclusively own it for its whole lifetime.

use crate::decoder::Decoder;
use crate::event::RawEvent;
use crate::recorder::Recorder;
use crate::span_context::ActivitySource;
use crossbeam::channel::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default per-iteration poll interval while waiting for either an event
/// or a shutdown deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct Dispatcher {
    sender: Sender<RawEvent>,
    deadline: Arc<Mutex<Option<Instant>>>,
    handle: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Spawns the dispatcher's single worker thread. `capacity` bounds the
    /// channel so a burst of producers applies backpressure rather than
    /// growing memory unboundedly.
    pub fn spawn(decoder: Decoder, backend: Arc<dyn ActivitySource>, capacity: usize) -> Self {
        let (sender, receiver) = channel::bounded::<RawEvent>(capacity);
        let deadline: Arc<Mutex<Option<Instant>>> = Arc::new(Mutex::new(None));

        let worker_deadline = Arc::clone(&deadline);
        let handle = thread::spawn(move || {
            let mut recorder = Recorder::new(backend);
            loop {
                match receiver.recv_timeout(POLL_INTERVAL) {
                    Ok(raw) => {
                        if let Some(decoded) = decoder.decode(raw) {
                            recorder.record(decoded);
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        if let Some(d) = *worker_deadline.lock().unwrap() {
                            if Instant::now() >= d {
                                break;
                            }
                        }
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            recorder.flush();
        });

        Self {
            sender,
            deadline,
            handle: Some(handle),
        }
    }

    /// A cloneable handle producer threads use to submit events.
    pub fn sender(&self) -> Sender<RawEvent> {
        self.sender.clone()
    }

    /// Stops accepting new submissions from this handle, lets the worker
    /// drain whatever is already queued (bounded by `drain_timeout`), and
    /// blocks until the worker has called `flush` and exited — flush is
    /// guaranteed to complete before this call returns, and therefore before
    /// process exit.
    pub fn shutdown(mut self, drain_timeout: Duration) {
        *self.deadline.lock().unwrap() = Some(Instant::now() + drain_timeout);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{RawEventCode, RawLaunch};
    use crate::filter::{default_agent_self_regex, default_system_user_regex, PostFilterChain, PreFilterChain};
    use crate::error::CorrelatorResult;
    use crate::identifier::ProcessId;
    use crate::span_context::ExportedSpan;
    use std::sync::Mutex as StdMutex;

    struct RecordingBackend {
        exported: StdMutex<Vec<ExportedSpan>>,
    }
    impl ActivitySource for RecordingBackend {
        fn export(&self, record: ExportedSpan) -> CorrelatorResult<()> {
            self.exported.lock().unwrap().push(record);
            Ok(())
        }
    }

    fn test_decoder() -> Decoder {
        Decoder::new(
            PreFilterChain::default_chain(ProcessId(-1)),
            PostFilterChain::default_chain(
                default_system_user_regex(),
                default_agent_self_regex("agent.exe"),
            ),
        )
    }

    #[test]
    fn dispatcher_processes_events_and_flushes_on_shutdown() {
        let backend = Arc::new(RecordingBackend {
            exported: StdMutex::new(Vec::new()),
        });
        let dispatcher = Dispatcher::spawn(test_decoder(), backend.clone(), 16);
        let sender = dispatcher.sender();

        sender
            .send(RawEvent::Launch(RawLaunch {
                pid: ProcessId(1),
                parent_pid: None,
                image: "a.exe".into(),
                user: None,
                timestamp_ns: 0,
            }))
            .unwrap();

        dispatcher.shutdown(Duration::from_secs(2));
        assert_eq!(backend.exported.lock().unwrap().len(), 1);
    }

    #[test]
    fn multiple_producers_can_submit_concurrently() {
        let backend = Arc::new(RecordingBackend {
            exported: StdMutex::new(Vec::new()),
        });
        let dispatcher = Dispatcher::spawn(test_decoder(), backend.clone(), 64);

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let sender = dispatcher.sender();
                thread::spawn(move || {
                    sender
                        .send(RawEvent::Launch(RawLaunch {
                            pid: ProcessId(i),
                            parent_pid: None,
                            image: format!("p{i}.exe"),
                            user: None,
                            timestamp_ns: 0,
                        }))
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        dispatcher.shutdown(Duration::from_secs(2));
        assert_eq!(backend.exported.lock().unwrap().len(), 4);
    }
}
