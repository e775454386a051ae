//! Explicit session context with a defined lifecycle: created empty at app
//! start, replaced atomically on login, cleared on logout or any 401. The
//! HTTP client reads it per request; nothing reads ambient storage.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use sokoni_core::guards::{Role, Viewer};
use sokoni_core::models::UserId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionContext {
    pub token: String,
    pub user_id: UserId,
    pub role: Role,
}

impl SessionContext {
    pub fn viewer(&self) -> Viewer {
        Viewer {
            user_id: self.user_id,
            role: self.role,
        }
    }
}

#[derive(Clone, Default)]
pub struct SessionHandle {
    inner: Arc<RwLock<Option<SessionContext>>>,
}

impl SessionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn replace(&self, ctx: SessionContext) {
        let mut guard = self.inner.write().await;
        *guard = Some(ctx);
    }

    pub async fn clear(&self) {
        let mut guard = self.inner.write().await;
        *guard = None;
    }

    pub async fn current(&self) -> Option<SessionContext> {
        self.inner.read().await.clone()
    }

    pub async fn token(&self) -> Option<String> {
        self.inner.read().await.as_ref().map(|c| c.token.clone())
    }

    pub async fn viewer(&self) -> Option<Viewer> {
        self.inner.read().await.as_ref().map(|c| c.viewer())
    }
}
