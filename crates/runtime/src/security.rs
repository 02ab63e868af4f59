use sb_domain::error::Result;

/// Gate consulted once per exchange, before anything is appended.
///
/// Rejections should be reported as [`sb_domain::Error::Security`].
#[async_trait::async_trait]
pub trait SecurityGate: Send + Sync {
    async fn check(&self, user_id: Option<&str>, session_id: &str, text: &str) -> Result<()>;
}

/// Accepts everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

#[async_trait::async_trait]
impl SecurityGate for AllowAll {
    async fn check(&self, _user_id: Option<&str>, _session_id: &str, _text: &str) -> Result<()> {
        Ok(())
    }
}
