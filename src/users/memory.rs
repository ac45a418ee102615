//! In-process `UserDirectory` used by the handler and access-control tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::roles::RoleSet;
use crate::users::repo::{EmailTaken, UserDirectory};
use crate::users::repo_types::User;

#[derive(Default)]
pub struct MemoryUserDirectory {
    users: Mutex<HashMap<String, User>>,
    fail: Mutex<bool>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a user directly, bypassing registration.
    pub fn seed(&self, email: &str, password_hash: &str, roles: RoleSet) -> User {
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            roles,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        self.users.lock().unwrap().insert(email.to_string(), user.clone());
        user
    }

    /// Makes every subsequent call fail like a broken connection.
    pub fn fail_with_storage_errors(&self) {
        *self.fail.lock().unwrap() = true;
    }

    /// Case-insensitive, like the Postgres lookups.
    pub fn get(&self, email: &str) -> Option<User> {
        self.users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned()
    }

    fn check(&self) -> anyhow::Result<()> {
        if *self.fail.lock().unwrap() {
            anyhow::bail!("connection refused");
        }
        Ok(())
    }

    fn mutate(&self, email: &str, f: impl FnOnce(&mut User)) -> u64 {
        match self.users.lock().unwrap().get_mut(email) {
            Some(user) => {
                f(user);
                user.updated_at = OffsetDateTime::now_utc();
                1
            }
            None => 0,
        }
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_one_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        self.check()?;
        Ok(self.get(email).filter(|u| !u.is_banned()))
    }

    async fn find_any_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        self.check()?;
        Ok(self.get(email))
    }

    async fn create(&self, email: &str, password_hash: &str, roles: &RoleSet) -> anyhow::Result<u64> {
        self.check()?;
        let mut users = self.users.lock().unwrap();
        if users.contains_key(email) {
            return Err(EmailTaken(email.to_string()).into());
        }
        let now = OffsetDateTime::now_utc();
        users.insert(
            email.to_string(),
            User {
                id: Uuid::new_v4(),
                email: email.to_string(),
                password_hash: password_hash.to_string(),
                roles: roles.clone(),
                deleted_at: None,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(1)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<u64> {
        self.check()?;
        let email = self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.id == id)
            .map(|u| u.email.clone());
        Ok(match email {
            Some(email) => self.mutate(&email, |u| u.password_hash = password_hash.to_string()),
            None => 0,
        })
    }

    async fn update_email(&self, old_email: &str, new_email: &str) -> anyhow::Result<u64> {
        self.check()?;
        let mut users = self.users.lock().unwrap();
        if users.contains_key(new_email) {
            return Err(EmailTaken(new_email.to_string()).into());
        }
        match users.remove(old_email) {
            Some(mut user) => {
                user.email = new_email.to_string();
                user.updated_at = OffsetDateTime::now_utc();
                users.insert(new_email.to_string(), user);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn soft_delete(&self, email: &str) -> anyhow::Result<u64> {
        self.check()?;
        Ok(self.mutate(email, |u| u.deleted_at = Some(OffsetDateTime::now_utc())))
    }

    async fn remove_soft_delete(&self, email: &str) -> anyhow::Result<u64> {
        self.check()?;
        Ok(self.mutate(email, |u| u.deleted_at = None))
    }

    async fn hard_delete(&self, id: Uuid) -> anyhow::Result<u64> {
        self.check()?;
        let mut users = self.users.lock().unwrap();
        let before = users.len();
        users.retain(|_, u| u.id != id);
        Ok((before - users.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::roles::Role;

    #[tokio::test]
    async fn duplicate_writes_report_email_taken() {
        let dir = MemoryUserDirectory::new();
        dir.seed("a@b.com", "h", RoleSet::from([Role::User]));
        dir.seed("c@b.com", "h", RoleSet::from([Role::User]));

        let err = dir.create("a@b.com", "h", &RoleSet::new()).await.unwrap_err();
        assert!(err.is::<EmailTaken>(), "{err:#}");

        let err = dir.update_email("c@b.com", "a@b.com").await.unwrap_err();
        assert!(err.is::<EmailTaken>(), "{err:#}");
    }

    #[tokio::test]
    async fn lookups_ignore_case() {
        let dir = MemoryUserDirectory::new();
        dir.seed("Mixed@B.com", "h", RoleSet::new());
        assert!(dir.find_one_by_email("mixed@b.com").await.unwrap().is_some());
        assert!(dir.find_any_by_email("MIXED@B.COM").await.unwrap().is_some());
    }
}
