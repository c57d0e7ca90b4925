use chrono::Duration;
use chrono_tz::Tz;
use sea_orm::DatabaseConnection;

use crate::ResultEngine;

mod access;
mod balances;
mod checks;
mod customers;
mod messages;
mod sessions;
mod stations;
mod stats;
mod users;

pub use balances::BalanceDrift;
pub use sessions::AuthSession;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Asia::Tashkent;
pub const DEFAULT_CHECK_VALIDITY_DAYS: i64 = 30;
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    /// Used for day/month boundaries in reports and exports.
    timezone: Tz,
    check_validity: Duration,
    session_ttl: Duration,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }
}

/// The builder for `Engine`
pub struct EngineBuilder {
    database: DatabaseConnection,
    timezone: Tz,
    check_validity: Duration,
    session_ttl: Duration,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            database: DatabaseConnection::default(),
            timezone: DEFAULT_TIMEZONE,
            check_validity: Duration::days(DEFAULT_CHECK_VALIDITY_DAYS),
            session_ttl: Duration::hours(DEFAULT_SESSION_TTL_HOURS),
        }
    }
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    pub fn timezone(mut self, timezone: Tz) -> EngineBuilder {
        self.timezone = timezone;
        self
    }

    /// How long a new check stays redeemable.
    pub fn check_validity(mut self, validity: Duration) -> EngineBuilder {
        self.check_validity = validity;
        self
    }

    pub fn session_ttl(mut self, ttl: Duration) -> EngineBuilder {
        self.session_ttl = ttl;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        if self.check_validity <= Duration::zero() {
            return Err(crate::EngineError::Validation(
                "check validity must be positive".to_string(),
            ));
        }
        if self.session_ttl <= Duration::zero() {
            return Err(crate::EngineError::Validation(
                "session ttl must be positive".to_string(),
            ));
        }
        Ok(Engine {
            database: self.database,
            timezone: self.timezone,
            check_validity: self.check_validity,
            session_ttl: self.session_ttl,
        })
    }
}
