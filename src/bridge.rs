//! One-way messaging to the backend.
//!
//! Callers post a [`BridgeMessage`] and move on. A worker thread turns each
//! message into a backend request; results are only logged, and failures are
//! never retried or reported back.

use reqwest::blocking::Client;
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

use crate::api::{MessageResponse, SaveUserRequest};
use crate::error::{Result, WalkError};
use crate::identity::UserInfo;

/// The account service the bridge reports logins to
pub trait Backend: Send + 'static {
    fn save_user(&self, req: &SaveUserRequest) -> Result<MessageResponse>;
}

/// JSON-over-HTTP client for the walkr server
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
    client: Client,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    fn post<T: serde::Serialize>(&self, route: &str, body: &T) -> Result<MessageResponse> {
        let response = self
            .client
            .post(format!("{}{route}", self.base_url))
            .json(body)
            .send()?;

        let status = response.status();
        let text = response.text()?;
        let message = serde_json::from_str::<MessageResponse>(&text)
            .map(|m| m.message)
            .unwrap_or(text);

        if status.is_success() {
            Ok(MessageResponse { message })
        } else {
            Err(WalkError::Rejected {
                status: status.as_u16(),
                message,
            })
        }
    }
}

impl Backend for HttpBackend {
    fn save_user(&self, req: &SaveUserRequest) -> Result<MessageResponse> {
        self.post("/api/saveUser", req)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeMessage {
    UserLoggedIn(UserInfo),
}

pub struct BackendBridge {
    tx: Option<Sender<BridgeMessage>>,
    worker: Option<JoinHandle<()>>,
}

impl BackendBridge {
    pub fn spawn<B: Backend>(backend: B) -> Self {
        let (tx, rx) = mpsc::channel::<BridgeMessage>();
        let worker = thread::spawn(move || {
            for message in rx {
                deliver(&backend, message);
            }
            debug!("bridge worker finished");
        });

        Self {
            tx: Some(tx),
            worker: Some(worker),
        }
    }

    /// Queue `message` for the worker; never blocks on the backend
    pub fn post(&self, message: BridgeMessage) {
        let sent = self.tx.as_ref().map(|tx| tx.send(message));
        if !matches!(sent, Some(Ok(()))) {
            error!("bridge worker is gone, dropping message");
        }
    }

    /// Deliver everything already posted, then stop the worker
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("bridge worker panicked");
            }
        }
    }
}

impl Drop for BackendBridge {
    fn drop(&mut self) {
        self.close();
    }
}

fn deliver<B: Backend>(backend: &B, message: BridgeMessage) {
    match message {
        BridgeMessage::UserLoggedIn(user) => {
            match backend.save_user(&SaveUserRequest::from(&user)) {
                Ok(response) => info!(id = user.id, "backend: {}", response.message),
                Err(e) => error!(id = user.id, "failed to save user: {e}"),
            }
        }
    }
}
