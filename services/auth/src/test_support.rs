//! Fixtures shared by the unit tests

use argon2::Params;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::{DatabaseError, DatabaseResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::{
    AppState,
    jwt::{JwtConfig, JwtService},
    models::{CredentialRecord, Role},
    password::PasswordService,
    repositories::CredentialRepository,
    revocation::RevocationStore,
    session::SessionManager,
};

pub const SECRET: &str = "unit-test-secret-that-is-long-enough-for-hs256";
pub const PASSWORD: &str = "Court-Booking-2024!";

pub fn jwt_service() -> JwtService {
    JwtService::new(JwtConfig {
        secret: SECRET.to_string(),
        token_lifetime: 2_592_000,
    })
    .unwrap()
}

/// Cheap Argon2 parameters so tests do not spend seconds per hash
pub fn password_service() -> PasswordService {
    PasswordService::with_params(Params::new(1024, 1, 1, None).unwrap())
}

pub fn session_manager(
    revocations: Arc<dyn RevocationStore>,
) -> (SessionManager, Arc<MemoryCredentialRepository>) {
    let credentials = Arc::new(MemoryCredentialRepository::default());
    let sessions = SessionManager::new(
        jwt_service(),
        revocations,
        credentials.clone(),
        password_service(),
    );
    (sessions, credentials)
}

pub fn app_state(revocations: Arc<dyn RevocationStore>) -> (AppState, Arc<MemoryCredentialRepository>) {
    let (sessions, credentials) = session_manager(revocations);
    (AppState { sessions }, credentials)
}

/// In-memory users and vendors
#[derive(Default)]
pub struct MemoryCredentialRepository {
    next_id: AtomicI64,
    rows: Mutex<HashMap<(Role, i64), (String, String)>>,
}

impl MemoryCredentialRepository {
    /// Store a principal with a hashed password, returning its id
    pub fn insert(&self, role: Role, email: &str, password: &str) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let hash = password_service().hash(password).unwrap();
        self.rows
            .lock()
            .unwrap()
            .insert((role, id), (email.to_string(), hash));
        id
    }
}

#[async_trait]
impl CredentialRepository for MemoryCredentialRepository {
    async fn find_by_email(
        &self,
        role: Role,
        email: &str,
    ) -> DatabaseResult<Option<CredentialRecord>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|((row_role, _), (row_email, _))| *row_role == role && row_email == email)
            .map(|((_, id), (_, hash))| CredentialRecord {
                id: *id,
                password_hash: hash.clone(),
            }))
    }

    async fn find_by_id(&self, role: Role, id: i64) -> DatabaseResult<Option<CredentialRecord>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.get(&(role, id)).map(|(_, hash)| CredentialRecord {
            id,
            password_hash: hash.clone(),
        }))
    }

    async fn update_password_hash(
        &self,
        role: Role,
        id: i64,
        password_hash: &str,
    ) -> DatabaseResult<()> {
        if let Some(row) = self.rows.lock().unwrap().get_mut(&(role, id)) {
            row.1 = password_hash.to_string();
        }
        Ok(())
    }
}

/// Revocation store whose every call fails, as if the database were down
#[derive(Default)]
pub struct FailingRevocationStore {
    pub prune_calls: AtomicUsize,
}

fn unavailable() -> DatabaseError {
    DatabaseError::Query(sqlx::Error::PoolTimedOut)
}

#[async_trait]
impl RevocationStore for FailingRevocationStore {
    async fn record(&self, _token_key: &str, _expires_at: DateTime<Utc>) -> DatabaseResult<()> {
        Err(unavailable())
    }

    async fn is_revoked(&self, _token_key: &str) -> DatabaseResult<bool> {
        Err(unavailable())
    }

    async fn prune(&self, _now: DateTime<Utc>) -> DatabaseResult<u64> {
        self.prune_calls.fetch_add(1, Ordering::SeqCst);
        Err(unavailable())
    }

    async fn count(&self) -> DatabaseResult<u64> {
        Err(unavailable())
    }
}

/// Revocation store whose calls never complete
pub struct StalledRevocationStore;

#[async_trait]
impl RevocationStore for StalledRevocationStore {
    async fn record(&self, _token_key: &str, _expires_at: DateTime<Utc>) -> DatabaseResult<()> {
        std::future::pending().await
    }

    async fn is_revoked(&self, _token_key: &str) -> DatabaseResult<bool> {
        std::future::pending().await
    }

    async fn prune(&self, _now: DateTime<Utc>) -> DatabaseResult<u64> {
        std::future::pending().await
    }

    async fn count(&self) -> DatabaseResult<u64> {
        std::future::pending().await
    }
}
