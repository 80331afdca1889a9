//! Async driver for a [`FormEngine`].
//!
//! Every option request the engine queues is spawned on the tokio runtime
//! against the session's [`OptionSource`]; completions come back over an
//! unbounded channel and are applied one at a time, so the engine itself is
//! only ever touched from the task that owns the session.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::engine::{FormEngine, SubmissionOutcome};
use crate::error::{FormError, OptionFetchError};
use crate::options::OptionResponse;
use crate::transport::{OptionSource, SubmissionTransport};
use crate::value::{AnswerValue, FieldPath};

pub struct FormSession {
    engine: FormEngine,
    options: Arc<dyn OptionSource>,
    transport: Arc<dyn SubmissionTransport>,
    tx: mpsc::UnboundedSender<OptionResponse>,
    rx: mpsc::UnboundedReceiver<OptionResponse>,
    outstanding: usize,
}

impl FormSession {
    pub fn new(
        engine: FormEngine,
        options: Arc<dyn OptionSource>,
        transport: Arc<dyn SubmissionTransport>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut session = FormSession {
            engine,
            options,
            transport,
            tx,
            rx,
            outstanding: 0,
        };
        session.dispatch();
        session
    }

    pub fn engine(&self) -> &FormEngine {
        &self.engine
    }

    pub fn into_engine(self) -> FormEngine {
        self.engine
    }

    /// Fetches spawned and not yet applied.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn set_answer(&mut self, path: &FieldPath, value: AnswerValue) -> Result<(), FormError> {
        self.pump();
        self.engine.set_answer(path, value)?;
        self.dispatch();
        Ok(())
    }

    pub fn clear_answer(&mut self, path: &FieldPath) -> Result<(), FormError> {
        self.pump();
        self.engine.clear_answer(path)?;
        self.dispatch();
        Ok(())
    }

    pub fn retry_options(&mut self, path: &FieldPath) -> Result<(), FormError> {
        self.engine.retry_options(path)?;
        self.dispatch();
        Ok(())
    }

    /// Apply every completion that has already arrived, without waiting.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(response) = self.rx.try_recv() {
            self.apply(response);
            applied += 1;
        }
        applied
    }

    /// Wait for the next completion and apply it. Returns false when there
    /// is nothing outstanding.
    pub async fn next_completion(&mut self) -> bool {
        if self.outstanding == 0 {
            return false;
        }
        match self.rx.recv().await {
            Some(response) => {
                self.apply(response);
                true
            }
            None => false,
        }
    }

    /// Wait until every spawned fetch has been applied.
    pub async fn settle(&mut self) {
        while self.next_completion().await {}
    }

    /// Validate, send the payload once, and record the outcome.
    ///
    /// A transport failure is not an error here: it becomes a
    /// [`SubmissionOutcome::Failure`] and the session can be dismissed and
    /// resubmitted.
    pub async fn submit(&mut self) -> Result<SubmissionOutcome, FormError> {
        self.pump();
        let payload = self.engine.begin_submit()?;
        let result = self.transport.submit(&payload).await;
        self.engine.finish_submit(result, payload).cloned()
    }

    pub fn dismiss_result(&mut self) -> Result<(), FormError> {
        self.engine.dismiss_result()?;
        self.dispatch();
        Ok(())
    }

    fn apply(&mut self, response: OptionResponse) {
        self.outstanding = self.outstanding.saturating_sub(1);
        self.engine.complete_fetch(response);
    }

    fn dispatch(&mut self) {
        for request in self.engine.take_requests() {
            let source = Arc::clone(&self.options);
            let tx = self.tx.clone();
            self.outstanding += 1;
            tokio::spawn(async move {
                // The fetch runs in its own task so a panicking source still
                // yields a completion and `outstanding` drains.
                let key = request.key.clone();
                let fetch = tokio::spawn(async move { source.fetch_options(&key).await });
                let endpoint = &request.key.endpoint;
                let result = match fetch.await {
                    Ok(result) => {
                        result.map_err(|e| OptionFetchError::from_transport(endpoint, &e))
                    }
                    Err(join) => {
                        tracing::warn!(endpoint = %endpoint, error = %join, "option fetch aborted");
                        Err(OptionFetchError {
                            endpoint: endpoint.clone(),
                            message: format!("option fetch aborted: {}", join),
                        })
                    }
                };
                // The session may have been dropped; nothing to deliver to.
                let _ = tx.send(OptionResponse {
                    id: request.id,
                    result,
                });
            });
        }
    }
}
