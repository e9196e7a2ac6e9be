//! A scripted submit collaborator.
//!
//! [`ScriptedSubmitHandler`] answers submissions from a queue of scripted
//! replies (accepting once the queue runs dry) and records every payload.
//! A held handler parks each submission until [`release`] is called, which
//! lets tests observe the form while a submission is in flight.
//!
//! [`release`]: ScriptedSubmitHandler::release

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use formflow_core::{FormflowError, FormflowResult};
use formflow_forms::{FormValues, SubmitHandler};

#[derive(Debug, Clone)]
enum Reply {
    Accept,
    Reject(String),
}

/// A submit handler driven by a script of replies.
///
/// # Examples
///
/// ```
/// use formflow_test::submit::ScriptedSubmitHandler;
///
/// let handler = ScriptedSubmitHandler::new()
///     .reject("Network error")
///     .accept();
/// assert_eq!(handler.call_count(), 0);
/// ```
#[derive(Debug, Default)]
pub struct ScriptedSubmitHandler {
    script: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<FormValues>>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedSubmitHandler {
    /// Creates a handler that accepts every submission.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an accepting reply.
    #[must_use]
    pub fn accept(self) -> Self {
        self.push(Reply::Accept)
    }

    /// Queues a rejecting reply with `message`.
    #[must_use]
    pub fn reject(self, message: impl Into<String>) -> Self {
        self.push(Reply::Reject(message.into()))
    }

    /// Parks every submission until [`release`](Self::release) is called.
    #[must_use]
    pub fn held(mut self) -> Self {
        self.gate = Some(Arc::new(Notify::new()));
        self
    }

    /// Lets one parked (or the next) submission continue.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    /// Returns every payload received, in order.
    pub fn calls(&self) -> Vec<FormValues> {
        self.calls
            .lock()
            .expect("ScriptedSubmitHandler lock poisoned")
            .clone()
    }

    /// Returns how many submissions were received.
    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .expect("ScriptedSubmitHandler lock poisoned")
            .len()
    }

    /// Returns the most recent payload.
    pub fn last_payload(&self) -> Option<FormValues> {
        self.calls
            .lock()
            .expect("ScriptedSubmitHandler lock poisoned")
            .last()
            .cloned()
    }

    /// Asserts that exactly `expected` submissions were received.
    ///
    /// # Panics
    ///
    /// Panics if the count does not match.
    pub fn assert_call_count(&self, expected: usize) {
        let actual = self.call_count();
        assert_eq!(
            actual, expected,
            "Expected {expected} submission(s), but {actual} were received"
        );
    }

    fn push(self, reply: Reply) -> Self {
        self.script
            .lock()
            .expect("ScriptedSubmitHandler lock poisoned")
            .push_back(reply);
        self
    }
}

#[async_trait]
impl SubmitHandler for ScriptedSubmitHandler {
    async fn submit(&self, values: &FormValues) -> FormflowResult<()> {
        self.calls
            .lock()
            .expect("ScriptedSubmitHandler lock poisoned")
            .push(values.clone());

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let reply = self
            .script
            .lock()
            .expect("ScriptedSubmitHandler lock poisoned")
            .pop_front()
            .unwrap_or(Reply::Accept);
        match reply {
            Reply::Accept => Ok(()),
            Reply::Reject(message) => Err(FormflowError::SubmitError(message)),
        }
    }
}
