#![allow(dead_code)]

use chrono::{DateTime, Utc};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{Check, CreateCheckCmd, Engine, Liters, NewUser, User};
use migration::MigratorTrait;

pub struct Fixture {
    pub engine: Engine,
    pub db: DatabaseConnection,
    pub moderator: i64,
    pub station: i64,
    pub operator: i64,
    pub other_station: i64,
    pub other_operator: i64,
}

/// Single-connection in-memory database, so concurrent transactions queue
/// on the pool instead of failing with lock errors.
pub async fn connect() -> DatabaseConnection {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(opts).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    db
}

pub async fn insert_station(db: &DatabaseConnection, name: &str) -> i64 {
    let backend = db.get_database_backend();
    let res = db
        .execute(Statement::from_sql_and_values(
            backend,
            "INSERT INTO stations (name, is_active, created_at) VALUES (?, ?, ?)",
            vec![name.into(), true.into(), Utc::now().into()],
        ))
        .await
        .unwrap();
    res.last_insert_id() as i64
}

/// Staff account without a password (login is tested separately).
pub async fn insert_staff(
    db: &DatabaseConnection,
    role: &str,
    username: &str,
    station_id: Option<i64>,
) -> i64 {
    let backend = db.get_database_backend();
    let res = db
        .execute(Statement::from_sql_and_values(
            backend,
            "INSERT INTO users (role, username, balance_minor, station_id, is_active, created_at) \
             VALUES (?, ?, 0, ?, ?, ?)",
            vec![
                role.into(),
                username.into(),
                station_id.into(),
                true.into(),
                Utc::now().into(),
            ],
        ))
        .await
        .unwrap();
    res.last_insert_id() as i64
}

pub async fn fixture() -> Fixture {
    let db = connect().await;
    let moderator = insert_staff(&db, "moderator", "boss", None).await;
    let station = insert_station(&db, "Chilonzor").await;
    let other_station = insert_station(&db, "Yunusobod").await;
    let operator = insert_staff(&db, "operator", "ali", Some(station)).await;
    let other_operator = insert_staff(&db, "operator", "vali", Some(other_station)).await;
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    Fixture {
        engine,
        db,
        moderator,
        station,
        operator,
        other_station,
        other_operator,
    }
}

pub fn liters(whole: i64) -> Liters {
    Liters::whole(whole)
}

impl Fixture {
    pub async fn customer(&self, phone: &str) -> User {
        self.engine
            .create_user(
                NewUser::customer().phone(phone).full_name("Customer"),
                self.moderator,
                Utc::now(),
            )
            .await
            .unwrap()
    }

    pub async fn balance(&self, customer_id: i64) -> Liters {
        self.engine
            .user(customer_id, self.moderator)
            .await
            .unwrap()
            .balance
    }

    pub async fn issue(&self, amount: i64, phone: Option<&str>) -> Check {
        self.issue_at(amount, phone, Utc::now()).await
    }

    pub async fn issue_at(&self, amount: i64, phone: Option<&str>, at: DateTime<Utc>) -> Check {
        let mut cmd = CreateCheckCmd::new(liters(amount), self.operator, self.station);
        if let Some(phone) = phone {
            cmd = cmd.customer_phone(phone);
        }
        self.engine.create_check(cmd, self.operator, at).await.unwrap()
    }
}
