//! Conversation controller: owns the message log, turns user input into one
//! inference request at a time, and folds the outcome back into the log.
//!
//! At most one request is in flight. A submission made while one is pending is
//! ignored rather than replacing it; callers cancel explicitly first.

use std::sync::Arc;

use shared::{
    domain::Message,
    error::InferenceError,
    protocol::{InferenceReply, InferenceRequest, RequestShape},
};
use tokio::{runtime::Handle, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub mod config;
pub mod transport;

pub use config::{load_config, load_layered, ChatConfig};
pub use transport::{HttpTransport, InferenceTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    EmptyInput,
    RequestInFlight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Started(RequestId),
    Ignored(IgnoreReason),
}

/// How a request ended, as seen by the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// An assistant reply was appended.
    Replied(RequestId),
    /// An assistant-role error message was appended.
    Failed(RequestId),
    /// Nothing was appended.
    Cancelled(RequestId),
}

impl Resolution {
    pub fn request_id(&self) -> RequestId {
        match self {
            Resolution::Replied(id) | Resolution::Failed(id) | Resolution::Cancelled(id) => *id,
        }
    }
}

/// Aborts the in-flight request it was issued for.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    request_id: RequestId,
    token: CancellationToken,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

struct PendingRequest {
    id: RequestId,
    payload: InferenceRequest,
    cancel: CancellationToken,
}

enum CallOutcome {
    Finished(Result<InferenceReply, InferenceError>),
    Aborted,
}

struct Completion {
    request_id: RequestId,
    outcome: CallOutcome,
}

pub struct ConversationController {
    transport: Arc<dyn InferenceTransport>,
    model: String,
    shape: RequestShape,
    history: Vec<Message>,
    pending: Option<PendingRequest>,
    next_request_id: u64,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
}

impl ConversationController {
    pub fn new(config: &ChatConfig, transport: Arc<dyn InferenceTransport>) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            transport,
            model: config.model.clone(),
            shape: config.request_shape(),
            history: vec![Message::greeting(config.greeting.clone())],
            pending: None,
            next_request_id: 1,
            completions_tx,
            completions_rx,
        }
    }

    /// Controller talking to `config.endpoint` over HTTP.
    pub fn connect(config: &ChatConfig) -> Self {
        Self::new(config, Arc::new(HttpTransport::from_config(config)))
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn request_shape(&self) -> RequestShape {
        self.shape
    }

    pub fn is_in_flight(&self) -> bool {
        self.live_pending().is_some()
    }

    /// Body sent for the in-flight request.
    pub fn pending_payload(&self) -> Option<&InferenceRequest> {
        self.live_pending().map(|pending| &pending.payload)
    }

    /// Only available while a request is in flight.
    pub fn cancel_handle(&self) -> Option<CancelHandle> {
        self.live_pending().map(|pending| CancelHandle {
            request_id: pending.id,
            token: pending.cancel.clone(),
        })
    }

    /// Appends a user turn and starts one request carrying the whole history.
    ///
    /// Outside a tokio runtime the request fails immediately as a transport error.
    pub fn submit(&mut self, text: &str) -> SubmitOutcome {
        if text.trim().is_empty() {
            debug!("ignoring empty submission");
            return SubmitOutcome::Ignored(IgnoreReason::EmptyInput);
        }

        // A request aborted through a CancelHandle no longer blocks submissions.
        if self.pending.as_ref().is_some_and(|p| p.cancel.is_cancelled()) {
            self.pending = None;
        }
        if let Some(pending) = &self.pending {
            debug!(request_id = pending.id.0, "ignoring submission while a request is in flight");
            return SubmitOutcome::Ignored(IgnoreReason::RequestInFlight);
        }

        self.history.push(Message::user(text));

        let request_id = RequestId(self.next_request_id);
        self.next_request_id += 1;
        let payload = InferenceRequest::build(self.shape, &self.model, &self.history);
        let cancel = CancellationToken::new();

        self.spawn_call(request_id, payload.clone(), cancel.clone());
        self.pending = Some(PendingRequest {
            id: request_id,
            payload,
            cancel,
        });

        info!(
            request_id = request_id.0,
            model = %self.model,
            shape = self.shape.as_str(),
            messages = self.history.len(),
            "submitted conversation turn"
        );
        SubmitOutcome::Started(request_id)
    }

    /// Aborts the in-flight request. Returns false when nothing was pending.
    pub fn cancel(&mut self) -> bool {
        let Some(pending) = self.pending.take() else {
            return false;
        };
        pending.cancel.cancel();
        info!(request_id = pending.id.0, "cancelled in-flight request");
        true
    }

    /// Waits for the in-flight request to resolve and applies it to the history.
    ///
    /// Returns `None` immediately when nothing is in flight. Outcomes of requests
    /// that were cancelled earlier are discarded on the way.
    pub async fn next_resolution(&mut self) -> Option<Resolution> {
        loop {
            let current = self.pending.as_ref()?.id;
            let completion = self.completions_rx.recv().await?;
            let resolution = self.apply(completion);
            if resolution.request_id() == current {
                return Some(resolution);
            }
        }
    }

    /// Applies every outcome that has already arrived, without waiting.
    pub fn poll_resolutions(&mut self) -> Vec<Resolution> {
        let mut resolutions = Vec::new();
        while let Ok(completion) = self.completions_rx.try_recv() {
            resolutions.push(self.apply(completion));
        }
        resolutions
    }

    /// Submits `text` and waits for its resolution.
    pub async fn submit_and_wait(&mut self, text: &str) -> Result<Resolution, IgnoreReason> {
        match self.submit(text) {
            SubmitOutcome::Started(request_id) => Ok(self
                .next_resolution()
                .await
                .unwrap_or(Resolution::Cancelled(request_id))),
            SubmitOutcome::Ignored(reason) => Err(reason),
        }
    }

    fn live_pending(&self) -> Option<&PendingRequest> {
        self.pending
            .as_ref()
            .filter(|pending| !pending.cancel.is_cancelled())
    }

    fn spawn_call(&self, request_id: RequestId, payload: InferenceRequest, cancel: CancellationToken) {
        let transport = Arc::clone(&self.transport);
        let completions_tx = self.completions_tx.clone();
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(err) => {
                warn!(request_id = request_id.0, error = %err, "no async runtime to run the request");
                let _ = completions_tx.send(Completion {
                    request_id,
                    outcome: CallOutcome::Finished(Err(InferenceError::Transport(format!(
                        "no async runtime available: {err}"
                    )))),
                });
                return;
            }
        };
        runtime.spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => CallOutcome::Aborted,
                result = transport.send(&payload) => CallOutcome::Finished(result),
            };
            let _ = completions_tx.send(Completion {
                request_id,
                outcome,
            });
        });
    }

    fn apply(&mut self, completion: Completion) -> Resolution {
        let Completion {
            request_id,
            outcome,
        } = completion;

        let current = self.pending.as_ref().filter(|pending| pending.id == request_id);
        let Some(pending) = current else {
            debug!(request_id = request_id.0, "discarding outcome of abandoned request");
            return Resolution::Cancelled(request_id);
        };
        let aborted = pending.cancel.is_cancelled();
        self.pending = None;

        if aborted {
            info!(request_id = request_id.0, "request aborted before completion");
            return Resolution::Cancelled(request_id);
        }

        match outcome {
            CallOutcome::Aborted => Resolution::Cancelled(request_id),
            CallOutcome::Finished(Ok(reply)) => {
                if reply == InferenceReply::Empty {
                    warn!(request_id = request_id.0, "endpoint returned no reply content");
                }
                self.history.push(Message::reply(reply.into_text()));
                info!(request_id = request_id.0, "appended assistant reply");
                Resolution::Replied(request_id)
            }
            CallOutcome::Finished(Err(err)) => {
                match &err {
                    InferenceError::Status { status, detail } => warn!(
                        request_id = request_id.0,
                        status,
                        detail = detail.as_deref().unwrap_or(""),
                        "inference endpoint returned an error status"
                    ),
                    other => warn!(
                        request_id = request_id.0,
                        error = %other,
                        "inference request failed"
                    ),
                }
                self.history.push(Message::error(err.conversation_text()));
                Resolution::Failed(request_id)
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
