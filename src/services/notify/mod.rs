pub mod mailgun;
pub mod sendgrid;

use async_trait::async_trait;

use crate::errors::AppError;

#[derive(Debug, Clone)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// One delivery channel, single attempt per call. Retry belongs to the
/// pipeline, not here.
#[async_trait]
pub trait MailTransport: Send + Sync {
    fn name(&self) -> &'static str;
    async fn send(&self, message: &Notification) -> anyhow::Result<()>;
}

/// Ordered chain of transports: try each once, first success wins. Appending
/// another fallback never touches call sites.
pub struct NotificationGateway {
    transports: Vec<Box<dyn MailTransport>>,
}

impl NotificationGateway {
    pub fn new(transports: Vec<Box<dyn MailTransport>>) -> Self {
        Self { transports }
    }

    pub async fn send(&self, message: &Notification) -> Result<(), AppError> {
        for transport in &self.transports {
            match transport.send(message).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        transport = transport.name(),
                        to = %message.to,
                        error = %e,
                        "transport failed, trying next"
                    );
                }
            }
        }
        Err(AppError::Gateway(format!(
            "no transport could deliver to {}",
            message.to
        )))
    }
}
