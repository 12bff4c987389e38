//! Human confirmation channel.
//!
//! The engine never blocks on a modal. It hands a [`Prompt`] to whichever
//! front-end owns the receiving end of a [`PromptChannel`] and suspends
//! until the prompt is answered.

use async_trait::async_trait;
use log::debug;
use mp_protocol::Event;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::{oneshot, Mutex};

/// Yes/no question asked before a destructive rerun.
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn ask(&self, title: &str, message: &str) -> bool;
}

/// Answers every prompt the same way without asking anyone.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

#[async_trait]
impl Confirmer for AutoConfirm {
    async fn ask(&self, title: &str, _message: &str) -> bool {
        debug!("auto-answering '{title}' with {}", self.0);
        self.0
    }
}

/// An outstanding question together with its one-shot resolver.
#[derive(Debug)]
pub struct Prompt {
    pub title: String,
    pub message: String,
    responder: oneshot::Sender<bool>,
}

impl Prompt {
    /// Resolve the prompt. Dropping a prompt unanswered counts as "no".
    pub fn answer(self, yes: bool) {
        let _ = self.responder.send(yes);
    }
}

/// Confirmer backed by a message-passing handshake.
///
/// At most one prompt is outstanding at a time; concurrent callers queue
/// behind the first.
pub struct PromptChannel {
    prompts_tx: mpsc::Sender<Prompt>,
    outstanding: Mutex<()>,
    events_tx: Option<UnboundedSender<Event>>,
}

/// Create a prompt channel and the receiver a front-end answers from.
pub fn prompt_channel(events_tx: Option<UnboundedSender<Event>>) -> (PromptChannel, mpsc::Receiver<Prompt>) {
    let (prompts_tx, prompts_rx) = mpsc::channel(1);
    (
        PromptChannel {
            prompts_tx,
            outstanding: Mutex::new(()),
            events_tx,
        },
        prompts_rx,
    )
}

#[async_trait]
impl Confirmer for PromptChannel {
    async fn ask(&self, title: &str, message: &str) -> bool {
        let _outstanding = self.outstanding.lock().await;

        if let Some(tx) = &self.events_tx {
            let _ = tx.send(Event::ConfirmationRequested {
                title: title.to_string(),
                message: message.to_string(),
            });
        }

        let (responder, answer) = oneshot::channel();
        let prompt = Prompt {
            title: title.to_string(),
            message: message.to_string(),
            responder,
        };
        if self.prompts_tx.send(prompt).await.is_err() {
            debug!("nobody is answering prompts; treating '{title}' as declined");
            return false;
        }

        answer.await.unwrap_or(false)
    }
}
