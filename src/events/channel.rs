//! Event channel built on crossbeam-channel.
//!
//! Lets the core report progress to the CLI renderer without
//! depending on it.

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::{Event, PipelineEvent, PipelinePhase};

/// Sending half handed to the pipeline, loader, trainer and matcher.
#[derive(Clone)]
pub struct EventSender {
    inner: Sender<Event>,
}

impl EventSender {
    /// Send an event.
    ///
    /// A dropped receiver is ignored: progress reporting is optional and
    /// must never fail a training run.
    pub fn send(&self, event: Event) {
        let _ = self.inner.send(event);
    }

    /// Announce a new pipeline phase
    pub fn phase(&self, phase: PipelinePhase) {
        self.send(Event::Pipeline(PipelineEvent::PhaseChanged { phase }));
    }
}

/// Receiving half, owned by whatever renders progress.
pub struct EventReceiver {
    inner: Receiver<Event>,
}

impl EventReceiver {
    /// Block until the next event is received
    pub fn recv(&self) -> Option<Event> {
        self.inner.recv().ok()
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&self) -> Option<Event> {
        self.inner.try_recv().ok()
    }

    /// Iterate until every sender is dropped
    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.inner.iter()
    }
}

/// Factory for connected sender/receiver pairs.
pub struct EventChannel;

impl EventChannel {
    /// Create an unbounded channel. Events are small and a run emits at
    /// most a few per image or epoch.
    pub fn new() -> (EventSender, EventReceiver) {
        let (sender, receiver) = unbounded();
        (
            EventSender { inner: sender },
            EventReceiver { inner: receiver },
        )
    }
}

/// A sender whose receiver is already gone, for runs without a UI.
pub fn null_sender() -> EventSender {
    let (sender, _receiver) = EventChannel::new();
    sender
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EpochProgress, TrainEvent};
    use std::thread;

    #[test]
    fn events_can_be_sent_across_threads() {
        let (sender, receiver) = EventChannel::new();

        let handle = thread::spawn(move || {
            sender.send(Event::Train(TrainEvent::EpochCompleted(EpochProgress {
                epoch: 5,
                total_epochs: 25,
                loss: 0.5,
                learning_rate: 1e-4,
            })));
        });

        handle.join().unwrap();

        match receiver.recv().unwrap() {
            Event::Train(TrainEvent::EpochCompleted(p)) => {
                assert_eq!(p.total_epochs, 25);
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn null_sender_does_not_panic() {
        let sender = null_sender();
        sender.phase(PipelinePhase::Loading);
    }

    #[test]
    fn phase_helper_sends_phase_changed() {
        let (sender, receiver) = EventChannel::new();
        sender.phase(PipelinePhase::Matching);

        match receiver.try_recv() {
            Some(Event::Pipeline(PipelineEvent::PhaseChanged { phase })) => {
                assert_eq!(phase, PipelinePhase::Matching);
            }
            _ => panic!("Wrong event type"),
        }
        assert!(receiver.try_recv().is_none());
    }
}
