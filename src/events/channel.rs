//! Event channel over crossbeam-channel.

use super::{Event, RunEvent, RunPhase};
use crossbeam_channel::{unbounded, Receiver, Sender};

/// Sending half handed to the organizer and verifier.
///
/// Sending never blocks and never fails; with no receiver left the
/// event is dropped.
#[derive(Clone)]
pub struct EventSender {
    inner: Sender<Event>,
}

impl EventSender {
    pub fn send(&self, event: Event) {
        let _ = self.inner.send(event);
    }

    /// Announce the start of a run phase
    pub fn phase(&self, phase: RunPhase) {
        self.send(Event::Run(RunEvent::PhaseChanged { phase }));
    }
}

/// Receiving half, usually drained on a rendering thread
pub struct EventReceiver {
    inner: Receiver<Event>,
}

impl EventReceiver {
    /// Next event, or `None` once every sender is gone
    pub fn recv(&self) -> Option<Event> {
        self.inner.recv().ok()
    }

    /// Events until every sender is gone
    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.inner.iter()
    }
}

pub struct EventChannel;

impl EventChannel {
    /// Create an unbounded channel
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (EventSender, EventReceiver) {
        let (sender, receiver) = unbounded();
        (
            EventSender { inner: sender },
            EventReceiver { inner: receiver },
        )
    }
}

/// A sender whose events go nowhere
pub fn null_sender() -> EventSender {
    let (sender, _receiver) = EventChannel::new();
    sender
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{FileProgress, OrganizeEvent};
    use std::path::PathBuf;
    use std::thread;

    #[test]
    fn progress_crosses_threads() {
        let (sender, receiver) = EventChannel::new();

        let handle = thread::spawn(move || {
            sender.send(Event::Organize(OrganizeEvent::Progress(FileProgress {
                completed: 3,
                total: 7,
                current_path: PathBuf::from("/card/IMG_0003.jpg"),
            })));
        });
        handle.join().unwrap();

        match receiver.recv() {
            Some(Event::Organize(OrganizeEvent::Progress(p))) => {
                assert_eq!((p.completed, p.total), (3, 7));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn iteration_ends_when_senders_drop() {
        let (sender, receiver) = EventChannel::new();
        sender.phase(RunPhase::Scanning);
        sender.phase(RunPhase::Transferring);
        drop(sender);

        let phases: Vec<RunPhase> = receiver
            .iter()
            .filter_map(|event| match event {
                Event::Run(RunEvent::PhaseChanged { phase }) => Some(phase),
                _ => None,
            })
            .collect();
        assert_eq!(phases, vec![RunPhase::Scanning, RunPhase::Transferring]);
    }

    #[test]
    fn null_sender_swallows_events() {
        let sender = null_sender();
        sender.send(Event::Run(RunEvent::Cancelled));
        sender.phase(RunPhase::Verifying);
    }
}
