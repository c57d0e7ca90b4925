use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, QueryFilter, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, User, sessions, users, util::normalize_username};

use super::{Engine, with_tx};

const MIN_PASSWORD_LEN: usize = 6;

/// A freshly opened session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthSession {
    pub token: String,
    pub user: User,
    pub expires_at: DateTime<Utc>,
}

pub(super) fn hash_password(password: &str) -> ResultEngine<String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(EngineError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| EngineError::Validation(format!("cannot hash password: {err}")))
}

fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

fn invalid_credentials() -> EngineError {
    EngineError::Unauthenticated("invalid username or password".to_string())
}

impl Engine {
    /// Opens a session for an active staff user.
    ///
    /// Unknown users, wrong passwords, customers and deactivated accounts all
    /// fail the same way.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> ResultEngine<AuthSession> {
        let username = normalize_username(username).map_err(|_| invalid_credentials())?;
        with_tx!(self, |db_tx| {
            let model = users::Entity::find()
                .filter(users::Column::Username.eq(username.as_str()))
                .one(&db_tx)
                .await?
                .ok_or_else(invalid_credentials)?;
            let staff = model.role()?.is_staff();
            let matches = model
                .password_hash
                .as_deref()
                .is_some_and(|hash| verify_password(password, hash));
            if !staff || !model.is_active || !matches {
                tracing::warn!(username = %username, "login refused");
                return Err(invalid_credentials());
            }

            sessions::Entity::delete_many()
                .filter(sessions::Column::ExpiresAt.lte(now))
                .exec(&db_tx)
                .await?;

            let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
            let expires_at = now + self.session_ttl;
            sessions::ActiveModel {
                token: ActiveValue::Set(token.clone()),
                user_id: ActiveValue::Set(model.id),
                created_at: ActiveValue::Set(now),
                expires_at: ActiveValue::Set(expires_at),
            }
            .insert(&db_tx)
            .await?;

            tracing::info!(user_id = model.id, "session opened");
            Ok(AuthSession {
                token,
                user: User::try_from(model)?,
                expires_at,
            })
        })
    }

    /// Resolves a bearer token to its user.
    pub async fn authenticate(&self, token: &str, now: DateTime<Utc>) -> ResultEngine<User> {
        with_tx!(self, |db_tx| {
            let session = sessions::Entity::find_by_id(token.to_string())
                .one(&db_tx)
                .await?
                .filter(|s| s.expires_at > now)
                .ok_or_else(|| EngineError::Unauthenticated("invalid session".to_string()))?;
            let actor = self.require_actor(&db_tx, session.user_id).await?;
            User::try_from(actor)
        })
    }

    /// Revokes a session. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            sessions::Entity::delete_by_id(token.to_string())
                .exec(&db_tx)
                .await?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_passwords_verify() {
        let hash = hash_password("secret-pass").unwrap();
        assert!(verify_password("secret-pass", &hash));
        assert!(!verify_password("other-pass", &hash));
        assert!(!verify_password("secret-pass", "not-a-hash"));
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert!(hash_password("12345").is_err());
    }
}
