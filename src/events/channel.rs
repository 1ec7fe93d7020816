//! Progress channel between the pipeline and whoever renders it.
//!
//! The pipeline owner and the rayon extraction workers share one
//! [`EventSender`]; a front end drains the matching [`EventReceiver`] on its
//! own thread. The channel is unbounded so extraction never waits on a slow
//! progress bar.

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::Event;

/// Sending half, cloneable across worker threads
#[derive(Clone)]
pub struct EventSender {
    inner: Sender<Event>,
}

impl EventSender {
    /// Publish an event.
    ///
    /// Nobody is required to listen: once the receiver is gone events are
    /// dropped and the run carries on.
    pub fn send(&self, event: Event) {
        let _ = self.inner.send(event);
    }
}

/// Receiving half held by the front end
pub struct EventReceiver {
    inner: Receiver<Event>,
}

impl EventReceiver {
    /// Events in emission order; ends once every sender is dropped
    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.inner.iter()
    }
}

pub struct EventChannel;

impl EventChannel {
    pub fn new() -> (EventSender, EventReceiver) {
        let (inner, receiver) = unbounded();
        (EventSender { inner }, EventReceiver { inner: receiver })
    }
}

/// Sender for runs nobody watches
pub fn null_sender() -> EventSender {
    EventChannel::new().0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{CheckpointEvent, ExtractEvent, ExtractProgress, PipelineEvent};
    use std::path::PathBuf;
    use std::thread;

    #[test]
    fn worker_events_reach_the_receiver_in_order() {
        let (sender, receiver) = EventChannel::new();

        let worker = sender.clone();
        thread::spawn(move || {
            worker.send(Event::Extract(ExtractEvent::Progress(ExtractProgress {
                completed: 5,
                total: 25,
                resumed: 3,
                failures: 1,
                current_path: PathBuf::from("/photos/a.jpg"),
            })));
        })
        .join()
        .unwrap();
        sender.send(Event::Checkpoint(CheckpointEvent::Saved {
            path: PathBuf::from("/photos/.dedup_checkpoint.json"),
            records: 4,
        }));
        drop(sender);

        let events: Vec<Event> = receiver.iter().collect();
        assert_eq!(events.len(), 2);
        match &events[0] {
            Event::Extract(ExtractEvent::Progress(p)) => {
                assert_eq!(p.total, 25);
                assert_eq!(p.resumed, 3);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(matches!(
            events[1],
            Event::Checkpoint(CheckpointEvent::Saved { records: 4, .. })
        ));
    }

    #[test]
    fn sending_without_a_listener_is_harmless() {
        let sender = null_sender();
        sender.send(Event::Pipeline(PipelineEvent::Started));
        sender.send(Event::Pipeline(PipelineEvent::Cancelled));
    }
}
