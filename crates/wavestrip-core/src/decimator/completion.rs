//! Where finished requests are delivered
//!
//! Completion callbacks never run on the reduction pool or on reader threads.
//! A [`CompletionContext`] decides where they run: the default
//! [`CompletionThread`] runs them one after another on a dedicated thread,
//! hosts with an event loop can implement the trait to post callbacks to it.

use std::sync::mpsc::{channel, Sender};
use std::thread::{self, JoinHandle};

use crate::error::{DecimateError, DecimateResult};

/// A boxed completion callback
pub type Completion = Box<dyn FnOnce() + Send + 'static>;

/// Runs completion callbacks on behalf of a decimator
pub trait CompletionContext: Send + Sync {
    fn deliver(&self, completion: Completion);
}

/// Runs callbacks serially on one named thread
pub struct CompletionThread {
    tx: Sender<Completion>,
    /// Thread handle; the thread exits once `tx` is dropped
    _handle: JoinHandle<()>,
}

impl CompletionThread {
    pub const THREAD_NAME: &'static str = "decimator-completion";

    /// Spawn the completion thread
    pub fn spawn() -> DecimateResult<Self> {
        let (tx, rx) = channel::<Completion>();

        let handle = thread::Builder::new()
            .name(Self::THREAD_NAME.to_string())
            .spawn(move || {
                log::debug!("CompletionThread: started");
                for completion in rx {
                    completion();
                }
                log::debug!("CompletionThread: channel closed, exiting");
            })
            .map_err(|e| DecimateError::Spawn {
                name: Self::THREAD_NAME.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self { tx, _handle: handle })
    }
}

impl CompletionContext for CompletionThread {
    fn deliver(&self, completion: Completion) {
        if self.tx.send(completion).is_err() {
            log::error!("CompletionThread: thread is gone, dropping completion");
        }
    }
}

/// Runs callbacks immediately on the decimator's request thread
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineCompletion;

impl CompletionContext for InlineCompletion {
    fn deliver(&self, completion: Completion) {
        completion();
    }
}
