use anyhow::anyhow;
use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{apply_token, NewToken, NewUser, User, UserFuture, UserSession, UserStore};

/// In-process user store. Changes are staged on a copy and committed under
/// one lock scope, so a failed save leaves nothing behind.
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<String, User>>,
    fail_saves: AtomicBool,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent save fail, for exercising rollback paths.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub async fn find_by_email(&self, email: &str) -> Option<User> {
        self.users.lock().await.get(email).cloned()
    }

    pub async fn count(&self) -> usize {
        self.users.lock().await.len()
    }
}

impl UserStore for MemoryUserStore {
    fn find_or_create_with_token<'a>(
        &'a self,
        new_user: &'a NewUser,
        token: &'a NewToken,
    ) -> UserFuture<'a, UserSession> {
        Box::pin(async move {
            let mut users = self.users.lock().await;

            let (mut user, created) = match users.get(&new_user.email) {
                Some(existing) => (existing.clone(), false),
                None => (
                    User {
                        id: Uuid::new_v4(),
                        email: new_user.email.clone(),
                        uid: new_user.uid.clone(),
                        provider: new_user.provider.clone(),
                        confirmed: true,
                        tokens: HashMap::new(),
                    },
                    true,
                ),
            };

            apply_token(&mut user.tokens, token);

            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(anyhow!("failed to save user"));
            }

            users.insert(user.email.clone(), user.clone());

            Ok(UserSession { user, created })
        })
    }
}
