use crate::{FileId, SessionId};
use futures::Stream;
use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use std::pin::Pin;
use std::task::{Context, Poll};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    SessionOpened {
        session_id: SessionId,
        total_chunks: usize,
        /// Chunks the server already held (non-zero only on resume)
        acknowledged: usize,
    },
    ChunkUploaded {
        index: usize,
        length: u64,
        acknowledged: usize,
        total_chunks: usize,
    },
    ChunkRetrying {
        index: usize,
        attempt: u32,
        reason: String,
    },
    Finalized {
        session_id: SessionId,
        file_id: FileId,
    },
}

/// Sending half of the progress channel. Events are dropped when nobody listens.
#[derive(Clone, Default)]
pub struct Emitter(Option<UnboundedSender<Event>>);

impl Emitter {
    pub fn emit(&self, event: Event) {
        if let Some(sender) = &self.0 {
            if sender.unbounded_send(event).is_err() {
                trace!("progress receiver dropped");
            }
        }
    }
}

pub struct Progress(UnboundedReceiver<Event>);

impl Stream for Progress {
    type Item = Event;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().0).poll_next(cx)
    }
}

pub(crate) fn progress_channel() -> (Emitter, Progress) {
    let (sender, receiver) = unbounded();
    (Emitter(Some(sender)), Progress(receiver))
}
