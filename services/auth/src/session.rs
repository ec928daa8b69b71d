//! Session lifecycle: login, per-request authentication, logout

use std::sync::Arc;
use tracing::info;

use crate::{
    error::AuthError,
    jwt::{Identity, IssuedToken, JwtService},
    models::Role,
    password::PasswordService,
    repositories::CredentialRepository,
    revocation::{RevocationStore, token_key},
    validation,
};

/// Composes the JWT service, the revocation store and credential lookups
/// into the operations the HTTP layer exposes.
#[derive(Clone)]
pub struct SessionManager {
    jwt_service: JwtService,
    revocations: Arc<dyn RevocationStore>,
    credentials: Arc<dyn CredentialRepository>,
    passwords: PasswordService,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(
        jwt_service: JwtService,
        revocations: Arc<dyn RevocationStore>,
        credentials: Arc<dyn CredentialRepository>,
        passwords: PasswordService,
    ) -> Self {
        Self {
            jwt_service,
            revocations,
            credentials,
            passwords,
        }
    }

    /// Check a principal's password and issue a session token.
    ///
    /// An unknown e-mail and a wrong password fail the same way.
    pub async fn login(
        &self,
        role: Role,
        email: &str,
        password: &str,
    ) -> Result<IssuedToken, AuthError> {
        let record = self
            .credentials
            .find_by_email(role, email)
            .await
            .map_err(AuthError::store("find_by_email"))?;

        let Some(record) = record else {
            self.verify_decoy(password).await?;
            return Err(AuthError::InvalidCredentials);
        };

        if !self.verify_password(password, &record.password_hash).await? {
            return Err(AuthError::InvalidCredentials);
        }

        let issued = self
            .jwt_service
            .issue(record.id, role)
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        info!(subject_id = record.id, role = %role, "Session issued");
        Ok(issued)
    }

    /// Verify a bearer token and make sure it has not been logged out.
    ///
    /// A revocation store failure rejects the request.
    pub async fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
        let identity = self.jwt_service.verify(token)?;

        let revoked = self
            .revocations
            .is_revoked(&token_key(identity.token()))
            .await
            .map_err(AuthError::store("is_revoked"))?;

        if revoked {
            return Err(AuthError::Revoked);
        }

        Ok(identity)
    }

    /// Revoke the token this identity was verified from until it expires
    pub async fn logout(&self, identity: &Identity) -> Result<(), AuthError> {
        self.revocations
            .record(&token_key(identity.token()), identity.expires_at)
            .await
            .map_err(AuthError::store("record"))?;

        info!(
            subject_id = identity.subject_id,
            role = %identity.role,
            "Session revoked"
        );
        Ok(())
    }

    /// Replace the principal's password and revoke the presenting token.
    ///
    /// The token is revoked before the new hash is written. If the write
    /// fails the old password still works and the client logs in again.
    pub async fn change_password(
        &self,
        identity: &Identity,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        validation::validate_password(new_password).map_err(AuthError::BadRequest)?;

        let record = self
            .credentials
            .find_by_id(identity.role, identity.subject_id)
            .await
            .map_err(AuthError::store("find_by_id"))?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self
            .verify_password(current_password, &record.password_hash)
            .await?
        {
            return Err(AuthError::InvalidCredentials);
        }

        let new_hash = self.hash_password(new_password).await?;
        self.logout(identity).await?;

        self.credentials
            .update_password_hash(identity.role, identity.subject_id, &new_hash)
            .await
            .map_err(AuthError::store("update_password_hash"))?;

        info!(
            subject_id = identity.subject_id,
            role = %identity.role,
            "Password changed"
        );
        Ok(())
    }

    /// Token lifetime in seconds
    pub fn token_lifetime(&self) -> u64 {
        self.jwt_service.token_lifetime()
    }

    async fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let passwords = self.passwords.clone();
        let password = password.to_owned();
        let hash = hash.to_owned();

        tokio::task::spawn_blocking(move || passwords.verify(&password, &hash))
            .await
            .map_err(|e| AuthError::Internal(format!("password verification task failed: {}", e)))
    }

    async fn verify_decoy(&self, password: &str) -> Result<(), AuthError> {
        let passwords = self.passwords.clone();
        let password = password.to_owned();

        tokio::task::spawn_blocking(move || passwords.verify_decoy(&password))
            .await
            .map_err(|e| AuthError::Internal(format!("password verification task failed: {}", e)))?;

        Ok(())
    }

    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let passwords = self.passwords.clone();
        let password = password.to_owned();

        let hash = tokio::task::spawn_blocking(move || passwords.hash(&password))
            .await
            .map_err(|e| AuthError::Internal(format!("password hashing task failed: {}", e)))??;

        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::TokenError;
    use crate::revocation::MemoryRevocationStore;
    use crate::test_support::{
        FailingRevocationStore, MemoryCredentialRepository, PASSWORD, jwt_service,
        session_manager,
    };
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_vendor_session_scenario() {
        let store = Arc::new(MemoryRevocationStore::new());
        let (sessions, _) = session_manager(store.clone());
        let jwt = jwt_service();

        let first = jwt.issue(42, Role::Vendor).unwrap();
        let identity = sessions.authenticate(&first.token).await.unwrap();
        assert_eq!(identity.subject_id, 42);
        assert_eq!(identity.role, Role::Vendor);

        sessions.logout(&identity).await.unwrap();

        let result = sessions.authenticate(&first.token).await;
        assert!(matches!(result, Err(AuthError::Revoked)));
        // Revocation overrides a token that still verifies on its own.
        assert!(jwt.verify(&first.token).is_ok());

        let second = jwt.issue(42, Role::Vendor).unwrap();
        let identity = sessions.authenticate(&second.token).await.unwrap();
        assert_eq!(identity.subject_id, 42);
    }

    #[tokio::test]
    async fn test_logout_twice_is_a_no_op() {
        let store = Arc::new(MemoryRevocationStore::new());
        let (sessions, _) = session_manager(store.clone());
        let issued = jwt_service().issue(7, Role::User).unwrap();
        let identity = sessions.authenticate(&issued.token).await.unwrap();

        sessions.logout(&identity).await.unwrap();
        sessions.logout(&identity).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_revocation_entry_keeps_token_expiry() {
        let store = Arc::new(MemoryRevocationStore::new());
        let (sessions, _) = session_manager(store.clone());
        let issued = jwt_service().issue(7, Role::User).unwrap();
        let identity = sessions.authenticate(&issued.token).await.unwrap();

        sessions.logout(&identity).await.unwrap();

        assert_eq!(store.prune(issued.expires_at - chrono::Duration::seconds(1)).await.unwrap(), 0);
        assert_eq!(store.prune(issued.expires_at).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_fails_closed() {
        let (sessions, _) = session_manager(Arc::new(FailingRevocationStore::default()));
        let issued = jwt_service().issue(1, Role::User).unwrap();

        let result = sessions.authenticate(&issued.token).await;
        assert!(matches!(
            result,
            Err(AuthError::Store {
                operation: "is_revoked",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_invalid_token_skips_store() {
        let (sessions, _) = session_manager(Arc::new(FailingRevocationStore::default()));

        let result = sessions.authenticate("not-a-token").await;
        assert!(matches!(
            result,
            Err(AuthError::InvalidToken(TokenError::Rejected(_)))
        ));
    }

    #[tokio::test]
    async fn test_login_issues_token_for_valid_credentials() {
        let (sessions, credentials) = session_manager(Arc::new(MemoryRevocationStore::new()));
        let id = credentials.insert(Role::Vendor, "owner@courts.test", PASSWORD);

        let issued = sessions
            .login(Role::Vendor, "owner@courts.test", PASSWORD)
            .await
            .unwrap();
        let identity = sessions.authenticate(&issued.token).await.unwrap();

        assert_eq!(identity.subject_id, id);
        assert_eq!(identity.role, Role::Vendor);
    }

    #[tokio::test]
    async fn test_login_rejects_wrong_password_and_unknown_email_alike() {
        let (sessions, credentials) = session_manager(Arc::new(MemoryRevocationStore::new()));
        credentials.insert(Role::User, "player@courts.test", PASSWORD);

        let wrong_password = sessions
            .login(Role::User, "player@courts.test", "Wrong-Password-1!")
            .await;
        let unknown_email = sessions
            .login(Role::User, "nobody@courts.test", PASSWORD)
            .await;
        let wrong_kind = sessions
            .login(Role::Vendor, "player@courts.test", PASSWORD)
            .await;

        assert!(matches!(wrong_password, Err(AuthError::InvalidCredentials)));
        assert!(matches!(unknown_email, Err(AuthError::InvalidCredentials)));
        assert!(matches!(wrong_kind, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_unknown_email_costs_a_password_check() {
        let (sessions, credentials) = session_manager(Arc::new(MemoryRevocationStore::new()));
        credentials.insert(Role::User, "player@courts.test", PASSWORD);
        let verifications = sessions.passwords.verifications.clone();

        let wrong_password = sessions
            .login(Role::User, "player@courts.test", "Wrong-Password-1!")
            .await;
        assert!(matches!(wrong_password, Err(AuthError::InvalidCredentials)));
        assert_eq!(verifications.load(Ordering::SeqCst), 1);

        let unknown_email = sessions
            .login(Role::User, "nobody@courts.test", PASSWORD)
            .await;
        assert!(matches!(unknown_email, Err(AuthError::InvalidCredentials)));
        assert_eq!(verifications.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_change_password_rotates_hash_and_revokes_token() {
        let store = Arc::new(MemoryRevocationStore::new());
        let (sessions, credentials) = session_manager(store.clone());
        credentials.insert(Role::User, "player@courts.test", PASSWORD);

        let issued = sessions
            .login(Role::User, "player@courts.test", PASSWORD)
            .await
            .unwrap();
        let identity = sessions.authenticate(&issued.token).await.unwrap();

        sessions
            .change_password(&identity, PASSWORD, "N3w-Secret-Pass!")
            .await
            .unwrap();

        assert!(matches!(
            sessions.authenticate(&issued.token).await,
            Err(AuthError::Revoked)
        ));
        assert!(matches!(
            sessions.login(Role::User, "player@courts.test", PASSWORD).await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(sessions
            .login(Role::User, "player@courts.test", "N3w-Secret-Pass!")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_change_password_requires_current_password() {
        let store = Arc::new(MemoryRevocationStore::new());
        let (sessions, credentials) = session_manager(store.clone());
        credentials.insert(Role::Vendor, "owner@courts.test", PASSWORD);
        let issued = sessions
            .login(Role::Vendor, "owner@courts.test", PASSWORD)
            .await
            .unwrap();
        let identity = sessions.authenticate(&issued.token).await.unwrap();

        let wrong_current = sessions
            .change_password(&identity, "Not-The-Password-1", "N3w-Secret-Pass!")
            .await;
        let weak_new = sessions.change_password(&identity, PASSWORD, "weak").await;

        assert!(matches!(wrong_current, Err(AuthError::InvalidCredentials)));
        assert!(matches!(weak_new, Err(AuthError::BadRequest(_))));
        assert!(sessions.authenticate(&issued.token).await.is_ok());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_change_password_keeps_old_hash_when_revocation_fails() {
        let (sessions, credentials) = session_manager(Arc::new(FailingRevocationStore::default()));
        credentials.insert(Role::User, "player@courts.test", PASSWORD);
        let issued = sessions
            .login(Role::User, "player@courts.test", PASSWORD)
            .await
            .unwrap();
        let identity = jwt_service().verify(&issued.token).unwrap();

        let result = sessions
            .change_password(&identity, PASSWORD, "N3w-Secret-Pass!")
            .await;

        assert!(matches!(
            result,
            Err(AuthError::Store {
                operation: "record",
                ..
            })
        ));
        assert!(sessions
            .login(Role::User, "player@courts.test", PASSWORD)
            .await
            .is_ok());
        assert!(matches!(
            sessions
                .login(Role::User, "player@courts.test", "N3w-Secret-Pass!")
                .await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_memory_credentials_are_scoped_by_role() {
        let credentials = MemoryCredentialRepository::default();
        let user = credentials.insert(Role::User, "same@courts.test", PASSWORD);
        let vendor = credentials.insert(Role::Vendor, "same@courts.test", PASSWORD);

        assert_ne!(user, vendor);
    }
}
