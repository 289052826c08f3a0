use crate::domain::model::{AuthStateEvent, AuthUser};
use crate::domain::ports::{AuthStateListener, TokenProvider};
use crate::utils::error::{ClientError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::mpsc;
use uuid::Uuid;

/// 登入後建立、登出時清除的工作階段
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct SessionContext {
    pub session_id: Uuid,
    pub user: AuthUser,
    #[serde(skip)]
    id_token: String,
    pub signed_in_at: DateTime<Utc>,
}

impl SessionContext {
    pub fn new(user: AuthUser, id_token: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            user,
            id_token: id_token.into(),
            signed_in_at: Utc::now(),
        }
    }

    pub fn id_token(&self) -> &str {
        &self.id_token
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("session_id", &self.session_id)
            .field("user", &self.user)
            .field("id_token", &"<redacted>")
            .field("signed_in_at", &self.signed_in_at)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type ListenerEntry = (SubscriptionId, Arc<dyn AuthStateListener>);

/// Ordered list of auth-state subscribers.
///
/// Events are delivered in subscription order. A listener that panics is
/// logged and skipped; the remaining listeners still run.
#[derive(Default)]
pub struct AuthStateNotifier {
    listeners: Mutex<Vec<ListenerEntry>>,
    next_id: AtomicU64,
}

impl AuthStateNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<L>(&self, listener: L) -> SubscriptionId
    where
        L: AuthStateListener + 'static,
    {
        self.subscribe_arc(Arc::new(listener))
    }

    pub fn subscribe_arc(&self, listener: Arc<dyn AuthStateListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock_listeners().push((id, listener));
        id
    }

    /// Events as a stream instead of callbacks.
    pub fn subscribe_channel(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<AuthStateEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.subscribe(ChannelListener(tx));
        (id, rx)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.lock_listeners();
        let before = listeners.len();
        listeners.retain(|(entry_id, _)| *entry_id != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.lock_listeners().len()
    }

    /// Returns how many listeners handled the event without panicking.
    pub fn notify(&self, event: &AuthStateEvent) -> usize {
        // 先複製清單再呼叫，listener 內可以重新訂閱或取消訂閱
        let snapshot: Vec<ListenerEntry> = self.lock_listeners().clone();

        let mut delivered = 0;
        for (id, listener) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener.on_auth_state_changed(event))) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    tracing::error!("❌ Auth state listener {:?} panicked on {:?}", id, event);
                }
            }
        }
        delivered
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Vec<ListenerEntry>> {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

struct ChannelListener(mpsc::UnboundedSender<AuthStateEvent>);

impl AuthStateListener for ChannelListener {
    fn on_auth_state_changed(&self, event: &AuthStateEvent) {
        // 接收端已關閉時直接丟棄
        let _ = self.0.send(event.clone());
    }
}

/// Holds the signed-in session for whoever owns it. Inject it (usually as
/// `Arc<AuthSession>`) into request-issuing components.
#[derive(Default)]
pub struct AuthSession {
    current: RwLock<Option<SessionContext>>,
    notifier: AuthStateNotifier,
}

impl AuthSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, user: AuthUser, id_token: impl Into<String>) -> SessionContext {
        let context = SessionContext::new(user.clone(), id_token);
        let previous = self.write_current().replace(context.clone());

        if let Some(previous) = previous {
            tracing::debug!("Replacing session {} on sign-in", previous.session_id);
            self.notifier.notify(&AuthStateEvent::SignedOut {
                uid: previous.user.uid,
            });
        }

        tracing::info!("🔐 Signed in as {}", user.uid);
        self.notifier.notify(&AuthStateEvent::SignedIn(user));
        context
    }

    pub fn sign_out(&self) -> Option<SessionContext> {
        let previous = self.write_current().take();

        if let Some(context) = &previous {
            tracing::info!("👋 Signed out {}", context.user.uid);
            self.notifier.notify(&AuthStateEvent::SignedOut {
                uid: context.user.uid.clone(),
            });
        }
        previous
    }

    pub fn refresh_token(&self, id_token: impl Into<String>) -> Result<()> {
        let user = {
            let mut current = self.write_current();
            let context = current.as_mut().ok_or(ClientError::AuthenticationRequired)?;
            context.id_token = id_token.into();
            context.user.clone()
        };

        tracing::debug!("🔑 Refreshed identity token for {}", user.uid);
        self.notifier.notify(&AuthStateEvent::TokenRefreshed(user));
        Ok(())
    }

    pub fn current(&self) -> Option<SessionContext> {
        self.read_current().clone()
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.read_current().as_ref().map(|c| c.user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.read_current().is_some()
    }

    pub fn subscribe<L>(&self, listener: L) -> SubscriptionId
    where
        L: AuthStateListener + 'static,
    {
        self.notifier.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    pub fn notifier(&self) -> &AuthStateNotifier {
        &self.notifier
    }

    fn read_current(&self) -> std::sync::RwLockReadGuard<'_, Option<SessionContext>> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_current(&self) -> std::sync::RwLockWriteGuard<'_, Option<SessionContext>> {
        self.current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl TokenProvider for AuthSession {
    async fn id_token(&self) -> Result<String> {
        self.read_current()
            .as_ref()
            .map(|c| c.id_token.clone())
            .ok_or(ClientError::AuthenticationRequired)
    }
}
