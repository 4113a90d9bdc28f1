// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Session setup orchestration.
//!
//! Starting a session is optimistic: the client mints a pending token,
//! navigates to the coding environment right away and only then asks the
//! platform to provision the container. On success the server token replaces
//! the pending one. On failure the user gets a notification and stays where
//! they are; nothing is rolled back.

use std::sync::Arc;
use std::time::Duration;

use codedeck_protocol::{SetupCodebaseRequest, SetupCodebaseResponse};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::backend::LifecycleBackend;
use crate::error::{Result, SdkError};
use crate::heartbeat::DEFAULT_LANGUAGE;
use crate::storage::{ClientStorage, store_token};
use crate::token::SessionToken;

/// Delay between navigation and the provisioning request.
pub const DEFAULT_PROVISION_DELAY: Duration = Duration::from_millis(100);

/// Route of the coding environment.
pub const CODE_ENVIRONMENT_ROUTE: &str = "/code-environment";

/// What the user asked to work on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupRequest {
    pub problem_id: String,
    /// Required by the platform; a missing value fails provisioning.
    pub question_id: Option<String>,
    pub language: String,
}

impl SetupRequest {
    pub fn new(problem_id: impl Into<String>) -> Self {
        Self {
            problem_id: problem_id.into(),
            question_id: None,
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }

    pub fn with_question_id(mut self, question_id: impl Into<String>) -> Self {
        self.question_id = Some(question_id.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}

/// Where the client goes once a session is started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub problem_id: String,
    pub language: String,
    pub token: SessionToken,
    pub question_id: Option<String>,
}

impl Destination {
    /// Route with percent-encoded query parameters.
    pub fn path(&self) -> String {
        let mut path = format!(
            "{}?problemId={}&language={}&token={}",
            CODE_ENVIRONMENT_ROUTE,
            urlencoding::encode(&self.problem_id),
            urlencoding::encode(&self.language),
            urlencoding::encode(self.token.as_str()),
        );
        if let Some(question_id) = &self.question_id {
            path.push_str("&questionId=");
            path.push_str(&urlencoding::encode(question_id));
        }
        path
    }
}

/// Moves the client to a destination. Called synchronously.
pub trait Navigator: Send + Sync {
    fn navigate(&self, destination: &Destination);
}

/// Logs the destination instead of moving anywhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn navigate(&self, destination: &Destination) {
        info!(path = %destination.path(), "Navigating to coding environment");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

/// User-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
    pub dismissible: bool,
}

impl Notification {
    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            title: title.into(),
            message: message.into(),
            dismissible: true,
        }
    }
}

/// Shows notifications to the user.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Info => {
                info!(title = %notification.title, "{}", notification.message)
            }
            NotificationLevel::Error => {
                error!(title = %notification.title, "{}", notification.message)
            }
        }
    }
}

/// How a provisioning attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutcome {
    /// The platform issued a token; it is now the current token.
    Provisioned {
        token: SessionToken,
        container_url: Option<String>,
    },
    /// The platform accepted the request without a token; the pending one stays.
    Unconfirmed { container_url: Option<String> },
    /// Provisioning failed and the user was notified.
    Failed(String),
}

/// A started session.
pub struct SetupHandle {
    pending_token: SessionToken,
    task: JoinHandle<SetupOutcome>,
}

impl SetupHandle {
    /// Token the client navigated with.
    pub fn pending_token(&self) -> &SessionToken {
        &self.pending_token
    }

    /// Wait for provisioning to finish.
    pub async fn outcome(self) -> Result<SetupOutcome> {
        self.task
            .await
            .map_err(|e| SdkError::Runtime(format!("provisioning task failed: {}", e)))
    }
}

/// Starts sessions: token, navigation, provisioning.
pub struct SetupOrchestrator {
    backend: Arc<dyn LifecycleBackend>,
    storage: Arc<dyn ClientStorage>,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
    provision_delay: Duration,
    token_tx: Arc<watch::Sender<Option<SessionToken>>>,
}

impl SetupOrchestrator {
    pub fn new(
        backend: Arc<dyn LifecycleBackend>,
        storage: Arc<dyn ClientStorage>,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (token_tx, _) = watch::channel(None);
        Self {
            backend,
            storage,
            navigator,
            notifier,
            provision_delay: DEFAULT_PROVISION_DELAY,
            token_tx: Arc::new(token_tx),
        }
    }

    pub fn with_provision_delay(mut self, delay: Duration) -> Self {
        self.provision_delay = delay;
        self
    }

    /// Publish tokens on an existing channel instead of a private one.
    pub fn with_token_sender(mut self, token_tx: Arc<watch::Sender<Option<SessionToken>>>) -> Self {
        self.token_tx = token_tx;
        self
    }

    /// Current session token as it changes.
    pub fn tokens(&self) -> watch::Receiver<Option<SessionToken>> {
        self.token_tx.subscribe()
    }

    /// Start a coding session.
    ///
    /// Navigation happens before this returns; provisioning runs in the
    /// background. Concurrent calls are not deduplicated: each one mints its
    /// own token and the last write to storage wins.
    #[instrument(skip(self, request), fields(problem_id = %request.problem_id, language = %request.language))]
    pub fn setup_codebase(&self, request: SetupRequest) -> Result<SetupHandle> {
        let runtime = Handle::try_current().map_err(|e| SdkError::Runtime(e.to_string()))?;

        let pending = SessionToken::pending();
        if let Err(e) = store_token(self.storage.as_ref(), &pending) {
            warn!(error = %e, "Failed to store pending token");
        }
        self.token_tx.send_replace(Some(pending.clone()));

        let destination = Destination {
            problem_id: request.problem_id.clone(),
            language: request.language.clone(),
            token: pending.clone(),
            question_id: request.question_id.clone(),
        };
        self.navigator.navigate(&destination);
        debug!(token = %pending, "Navigated with pending token");

        let task = runtime.spawn(provision(
            self.backend.clone(),
            self.storage.clone(),
            self.notifier.clone(),
            self.token_tx.clone(),
            self.provision_delay,
            request,
        ));

        Ok(SetupHandle {
            pending_token: pending,
            task,
        })
    }
}

async fn provision(
    backend: Arc<dyn LifecycleBackend>,
    storage: Arc<dyn ClientStorage>,
    notifier: Arc<dyn Notifier>,
    token_tx: Arc<watch::Sender<Option<SessionToken>>>,
    delay: Duration,
    request: SetupRequest,
) -> SetupOutcome {
    tokio::time::sleep(delay).await;

    let result = match request.question_id.as_deref().filter(|id| !id.is_empty()) {
        Some(question_id) => {
            backend
                .setup_codebase(&SetupCodebaseRequest {
                    question_id: question_id.to_string(),
                    language: request.language.clone(),
                })
                .await
        }
        None => Err(SdkError::InvalidInput("question id is required".to_string())),
    };

    match result {
        Ok(SetupCodebaseResponse {
            container_token: Some(raw),
            container_url,
        }) if !raw.is_empty() => {
            let token = SessionToken::Confirmed(raw);
            if let Err(e) = store_token(storage.as_ref(), &token) {
                warn!(error = %e, "Failed to store confirmed token");
            }
            token_tx.send_replace(Some(token.clone()));
            info!(token = %token, "Container provisioning requested");
            SetupOutcome::Provisioned {
                token,
                container_url,
            }
        }
        Ok(response) => {
            info!("Provisioning accepted without a token, keeping pending token");
            SetupOutcome::Unconfirmed {
                container_url: response.container_url,
            }
        }
        Err(e) => {
            error!(error = %e, problem_id = %request.problem_id, "Failed to set up codebase");
            notifier.notify(Notification::error(
                "Setup failed",
                format!("Could not set up your coding environment: {}", e),
            ));
            SetupOutcome::Failed(e.to_string())
        }
    }
}
