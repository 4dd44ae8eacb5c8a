//! Outbound mail.
//!
//! Handlers never wait on delivery: [`MailDispatcher::dispatch`] hands the
//! message to a blocking task tracked by the server's [`TaskTracker`], so
//! graceful shutdown can drain pending sends. Failures are logged and dropped.

use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MailTemplate {
    UserWelcome,
    TokenActivation,
    TokenPasswordReset,
}

impl MailTemplate {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UserWelcome => "user_welcome",
            Self::TokenActivation => "token_activation",
            Self::TokenPasswordReset => "token_password_reset",
        }
    }
}

#[derive(Clone, Debug)]
pub struct MailMessage {
    pub to: String,
    pub template: MailTemplate,
    pub data: Value,
}

/// Mail delivery abstraction.
pub trait Mailer: Send + Sync {
    /// Deliver a message or return an error; the caller only logs it.
    fn send(&self, message: &MailMessage) -> Result<()>;
}

/// Local sender that records the send instead of delivering it.
///
/// Template data is not logged because it carries token plaintexts.
#[derive(Clone, Debug, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, message: &MailMessage) -> Result<()> {
        info!(
            to = %message.to,
            template = message.template.as_str(),
            "mail send stub"
        );
        Ok(())
    }
}

#[derive(Clone)]
pub struct MailDispatcher {
    mailer: Arc<dyn Mailer>,
    tracker: TaskTracker,
}

impl MailDispatcher {
    #[must_use]
    pub fn new(mailer: Arc<dyn Mailer>, tracker: TaskTracker) -> Self {
        Self { mailer, tracker }
    }

    pub fn dispatch(&self, message: MailMessage) {
        let mailer = self.mailer.clone();
        self.tracker.spawn_blocking(move || {
            if let Err(err) = mailer.send(&message) {
                error!(
                    to = %message.to,
                    template = message.template.as_str(),
                    "failed to send mail: {err:#}"
                );
            }
        });
    }

    #[must_use]
    pub const fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }
}
