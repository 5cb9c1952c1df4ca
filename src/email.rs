use async_trait::async_trait;
use tracing::info;

/// Outbound mail boundary. The real SMTP transport lives outside this
/// service; handlers only depend on this trait.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Logs outgoing mail instead of delivering it. Used in development and
/// as the default when no transport is wired up.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        info!(%to, %subject, %body, "mail dispatched (log transport)");
        Ok(())
    }
}
