use crate::domain::model::AuthStateEvent;
use crate::utils::error::Result;
use async_trait::async_trait;

/// Supplies the identity token attached to outgoing requests.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn id_token(&self) -> Result<String>;
}

/// A fixed token, e.g. one passed on the command line.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn id_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

pub trait AuthStateListener: Send + Sync {
    fn on_auth_state_changed(&self, event: &AuthStateEvent);
}

impl<F> AuthStateListener for F
where
    F: Fn(&AuthStateEvent) + Send + Sync,
{
    fn on_auth_state_changed(&self, event: &AuthStateEvent) {
        self(event)
    }
}
