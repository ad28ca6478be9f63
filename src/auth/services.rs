use lazy_static::lazy_static;
use tracing::{error, info, warn};

use crate::api::ApiError;
use crate::auth::{
    dto::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse},
    jwt::JwtKeys,
    password::{hash_password, verify_password},
    repo::{StoreError, UserStore},
    repo_types::NewUser,
    validation::{check_password_policy, is_strict_email, validate_login, validate_register},
};

/// Same message for unknown email and wrong password.
pub const INVALID_CREDENTIALS: &str = "Invalid email or password";

const USERNAME_TAKEN: &str = "Username is already taken";
const EMAIL_TAKEN: &str = "Email is already registered";

lazy_static! {
    /// Verified against when the email is unknown so both login failures cost
    /// one Argon2 run.
    static ref DUMMY_HASH: String =
        hash_password("unknown-account-placeholder").unwrap_or_default();
}

async fn verify_in_background(password: String, hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| {
            error!(error = %e, "password verification task failed");
            ApiError::Server("Error verifying credentials".into())
        })
}

pub async fn register(
    store: &dyn UserStore,
    mut req: RegisterRequest,
) -> Result<RegisterResponse, ApiError> {
    let errors = validate_register(&req);
    if !errors.is_empty() {
        warn!(count = errors.len(), "registration failed validation");
        return Err(ApiError::from_fields(errors));
    }

    req.username = req.username.trim().to_string();
    req.email = req.email.trim().to_string();

    if !is_strict_email(&req.email) {
        warn!(email = %req.email, "invalid email");
        return Err(ApiError::validation("Invalid email format"));
    }

    if let Err(message) = check_password_policy(&req.password) {
        warn!(reason = message, "password rejected by policy");
        return Err(ApiError::validation(message));
    }

    match store.username_exists(&req.username).await {
        Ok(false) => {}
        Ok(true) => {
            warn!(username = %req.username, "username already taken");
            return Err(ApiError::Conflict(USERNAME_TAKEN.into()));
        }
        Err(e) => {
            error!(error = %e, "username_exists failed");
            return Err(ApiError::Server("Error checking username availability".into()));
        }
    }

    match store.email_exists(&req.email).await {
        Ok(false) => {}
        Ok(true) => {
            warn!(email = %req.email, "email already registered");
            return Err(ApiError::Conflict(EMAIL_TAKEN.into()));
        }
        Err(e) => {
            error!(error = %e, "email_exists failed");
            return Err(ApiError::Server("Error checking email availability".into()));
        }
    }

    let password = req.password;
    let hash = match tokio::task::spawn_blocking(move || hash_password(&password)).await {
        Ok(Ok(h)) => h,
        Ok(Err(e)) => {
            error!(error = %e, "hash_password failed");
            return Err(ApiError::Server("Error hashing password".into()));
        }
        Err(e) => {
            error!(error = %e, "hashing task failed");
            return Err(ApiError::Server("Error hashing password".into()));
        }
    };

    let new_user = NewUser {
        username: req.username,
        email: req.email,
        password_hash: hash,
    };

    // The existence checks above can race; the store's unique constraints decide.
    let user = match store.create(&new_user).await {
        Ok(u) => u,
        Err(StoreError::DuplicateUsername) => {
            warn!(username = %new_user.username, "username taken at insert");
            return Err(ApiError::Conflict(USERNAME_TAKEN.into()));
        }
        Err(StoreError::DuplicateEmail) => {
            warn!(email = %new_user.email, "email taken at insert");
            return Err(ApiError::Conflict(EMAIL_TAKEN.into()));
        }
        Err(e) => {
            error!(error = %e, "create user failed");
            return Err(ApiError::Server("Error creating user".into()));
        }
    };

    info!(user_id = user.id, username = %user.username, "user registered");
    Ok(RegisterResponse {
        username: user.username,
        email: user.email,
    })
}

pub async fn login(
    store: &dyn UserStore,
    keys: &JwtKeys,
    req: LoginRequest,
) -> Result<LoginResponse, ApiError> {
    let errors = validate_login(&req);
    if !errors.is_empty() {
        warn!(count = errors.len(), "login failed validation");
        return Err(ApiError::from_fields(errors));
    }

    let user = match store.find_by_email(&req.email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(email = %req.email, "login unknown email");
            verify_in_background(req.password, DUMMY_HASH.clone()).await?;
            return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.into()));
        }
        Err(e) => {
            error!(error = %e, "find_by_email failed");
            return Err(ApiError::Server("Error looking up user".into()));
        }
    };

    let ok = verify_in_background(req.password, user.password_hash.clone()).await?;

    if !ok {
        warn!(email = %req.email, user_id = user.id, "login invalid password");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.into()));
    }

    let issued = match keys.issue(user.id, &user.email) {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "jwt sign failed");
            return Err(ApiError::Server("Error generating token".into()));
        }
    };

    info!(user_id = user.id, email = %user.email, "user logged in");
    Ok(LoginResponse {
        token: issued.token,
        user,
        expires_at: issued.expires_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo::memory::MemoryUserStore;
    use crate::auth::repo_types::User;
    use axum::async_trait;

    /// Store whose every call fails as if the database were unreachable.
    struct BrokenStore;

    #[async_trait]
    impl UserStore for BrokenStore {
        async fn create(&self, _new_user: &NewUser) -> Result<User, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }
        async fn find_by_email(&self, _email: &str) -> Result<Option<User>, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }
        async fn username_exists(&self, _username: &str) -> Result<bool, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }
        async fn email_exists(&self, _email: &str) -> Result<bool, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }
    }

    /// Store whose pre-checks always say "free" but whose insert loses a race.
    struct RacingStore(StoreError);

    #[async_trait]
    impl UserStore for RacingStore {
        async fn create(&self, _new_user: &NewUser) -> Result<User, StoreError> {
            Err(match self.0 {
                StoreError::DuplicateUsername => StoreError::DuplicateUsername,
                _ => StoreError::DuplicateEmail,
            })
        }
        async fn find_by_email(&self, _email: &str) -> Result<Option<User>, StoreError> {
            Ok(None)
        }
        async fn username_exists(&self, _username: &str) -> Result<bool, StoreError> {
            Ok(false)
        }
        async fn email_exists(&self, _email: &str) -> Result<bool, StoreError> {
            Ok(false)
        }
    }

    fn register_req(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    fn login_req(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn register_trims_and_returns_only_public_fields() {
        let store = MemoryUserStore::default();
        let out = register(
            &store,
            register_req("  player1  ", "p1@example.com", "Valid1Pass!"),
        )
        .await
        .expect("register");
        assert_eq!(out.username, "player1");
        assert_eq!(out.email, "p1@example.com");

        let json = serde_json::to_value(&out).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert!(!json.to_string().contains("Valid1Pass!"));
        assert!(!json.to_string().contains("argon2"));

        let stored = store.find_by_email("p1@example.com").await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "Valid1Pass!");
        assert!(verify_password("Valid1Pass!", &stored.password_hash));
    }

    #[tokio::test]
    async fn register_same_username_twice_conflicts() {
        let store = MemoryUserStore::default();
        register(&store, register_req("player1", "a@example.com", "Valid1Pass!"))
            .await
            .unwrap();
        let err = register(&store, register_req("player1", "b@example.com", "Valid1Pass!"))
            .await
            .unwrap_err();
        assert!(matches!(&err, ApiError::Conflict(m) if m == USERNAME_TAKEN));
    }

    #[tokio::test]
    async fn register_same_email_twice_conflicts() {
        let store = MemoryUserStore::default();
        register(&store, register_req("player1", "a@example.com", "Valid1Pass!"))
            .await
            .unwrap();
        let err = register(&store, register_req("player2", "a@example.com", "Valid1Pass!"))
            .await
            .unwrap_err();
        assert!(matches!(&err, ApiError::Conflict(m) if m == EMAIL_TAKEN));
    }

    #[tokio::test]
    async fn register_applies_password_policy_after_structure() {
        let store = MemoryUserStore::default();
        let err = register(
            &store,
            register_req("player1", "a@example.com", "alllettersnodigit!"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Password must contain at least one number");

        let err = register(
            &store,
            register_req("player1", "a@example.com", "alllettersnodigit1"),
        )
        .await
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Password must contain at least one special character"
        );

        let err = register(&store, register_req("player1", "a@example.com", "short1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation { .. }));
        assert!(err.to_string().contains("at least 8 characters"));
    }

    #[tokio::test]
    async fn register_rejects_email_failing_strict_pattern() {
        let store = MemoryUserStore::default();
        let err = register(&store, register_req("player1", "us!er@example.com", "Valid1Pass!"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid email format");
    }

    #[tokio::test]
    async fn register_store_failure_is_generic_server_error() {
        let err = register(&BrokenStore, register_req("player1", "a@example.com", "Valid1Pass!"))
            .await
            .unwrap_err();
        match err {
            ApiError::Server(msg) => {
                assert_eq!(msg, "Error checking username availability");
                assert!(!msg.contains("pool"));
            }
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn register_insert_race_maps_to_conflict() {
        let err = register(
            &RacingStore(StoreError::DuplicateEmail),
            register_req("player1", "a@example.com", "Valid1Pass!"),
        )
        .await
        .unwrap_err();
        assert!(matches!(&err, ApiError::Conflict(m) if m == EMAIL_TAKEN));

        let err = register(
            &RacingStore(StoreError::DuplicateUsername),
            register_req("player1", "a@example.com", "Valid1Pass!"),
        )
        .await
        .unwrap_err();
        assert!(matches!(&err, ApiError::Conflict(m) if m == USERNAME_TAKEN));
    }

    #[tokio::test]
    async fn login_issues_token_for_registered_user() {
        let store = MemoryUserStore::default();
        let keys = JwtKeys::from_secret("test-secret");
        register(&store, register_req("player1", "a@example.com", "Valid1Pass!"))
            .await
            .unwrap();

        let out = login(&store, &keys, login_req("a@example.com", "Valid1Pass!"))
            .await
            .expect("login");
        let claims = keys.verify(&out.token).unwrap();
        assert_eq!(claims.user_id(), Some(out.user.id));
        assert_eq!(claims.email, "a@example.com");
        assert_eq!(claims.exp as i64, out.expires_at.unix_timestamp());

        let json = serde_json::to_value(&out).unwrap();
        assert!(json["user"].get("password_hash").is_none());
        assert_eq!(json["user"]["username"], "player1");
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let store = MemoryUserStore::default();
        let keys = JwtKeys::from_secret("test-secret");
        register(&store, register_req("player1", "a@example.com", "Valid1Pass!"))
            .await
            .unwrap();

        let wrong_password = login(&store, &keys, login_req("a@example.com", "Wrong1Pass!"))
            .await
            .unwrap_err();
        let unknown_email = login(&store, &keys, login_req("b@example.com", "Valid1Pass!"))
            .await
            .unwrap_err();

        assert_eq!(wrong_password.status(), unknown_email.status());
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
        assert_eq!(wrong_password.to_string(), INVALID_CREDENTIALS);
    }

    #[test]
    fn unknown_email_path_verifies_against_a_real_hash() {
        assert!(DUMMY_HASH.starts_with("$argon2"));
        assert!(!verify_password("Valid1Pass!", &DUMMY_HASH));
    }

    #[tokio::test]
    async fn login_unknown_email_still_pays_for_verification() {
        let store = MemoryUserStore::default();
        let keys = JwtKeys::from_secret("test-secret");
        let err = login(&store, &keys, login_req("ghost@example.com", "unknown-account-placeholder"))
            .await
            .unwrap_err();
        assert!(matches!(&err, ApiError::Unauthorized(m) if m == INVALID_CREDENTIALS));
    }

    #[tokio::test]
    async fn login_store_failure_is_server_error_not_unauthorized() {
        let keys = JwtKeys::from_secret("test-secret");
        let err = login(&BrokenStore, &keys, login_req("a@example.com", "Valid1Pass!"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Server(_)));
    }

    #[tokio::test]
    async fn login_validates_input_shape() {
        let store = MemoryUserStore::default();
        let keys = JwtKeys::from_secret("test-secret");
        let err = login(&store, &keys, login_req("not-an-email", ""))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid email format; password is required");
    }
}
