use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::auth::access::AccessControl;
use crate::auth::jwt::{CredentialIssuer, JwtService};
use crate::auth::password::{PasswordHasher, PasswordService};
use crate::config::AppConfig;
use crate::users::repo::{PgUserDirectory, UserDirectory};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserDirectory>,
    pub passwords: Arc<dyn PasswordHasher>,
    pub tokens: Arc<dyn CredentialIssuer>,
    pub access: AccessControl,
}

impl AppState {
    pub async fn init(config: &AppConfig) -> anyhow::Result<Self> {
        let passwords = PasswordService::new(config.password.salt.as_bytes())
            .context("configure password hashing")?;
        let tokens = JwtService::new(&config.jwt.secret).context("configure token signing")?;

        let db = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        if config.run_migrations {
            sqlx::migrate!("./migrations")
                .run(&db)
                .await
                .context("run migrations")?;
            tracing::info!("migrations applied");
        }

        Ok(Self::from_parts(
            Arc::new(PgUserDirectory::new(db)),
            Arc::new(passwords),
            Arc::new(tokens),
        ))
    }

    pub fn from_parts(
        users: Arc<dyn UserDirectory>,
        passwords: Arc<dyn PasswordHasher>,
        tokens: Arc<dyn CredentialIssuer>,
    ) -> Self {
        let access = AccessControl::new(tokens.clone(), users.clone());
        Self {
            users,
            passwords,
            tokens,
            access,
        }
    }

    /// In-memory state with a real JWT signer and a cheap password hasher.
    #[cfg(test)]
    pub fn fake() -> (Self, Arc<crate::users::memory::MemoryUserDirectory>) {
        use crate::auth::fakes::PlainHasher;
        use crate::users::memory::MemoryUserDirectory;

        let users = Arc::new(MemoryUserDirectory::new());
        let tokens = JwtService::new(crate::testing::TEST_SECRET).expect("test secret is valid");
        let state = Self::from_parts(users.clone(), Arc::new(PlainHasher), Arc::new(tokens));
        (state, users)
    }
}
