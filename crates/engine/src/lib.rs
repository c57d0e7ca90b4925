pub use balance_entries::{BalanceEntry, EntryKind};
pub use checks::{Check, CheckStatus, QrPayload};
pub use commands::{
    CheckListFilter, CreateCheckCmd, CustomerInfo, NewStation, NewUser, StationUpdate,
    UserListFilter, UserUpdate,
};
pub use error::EngineError;
pub use liters::Liters;
pub use messages::{Broadcast, Message, Recipient};
pub use ops::{AuthSession, BalanceDrift, Engine, EngineBuilder};
pub use pagination::{Page, PageRequest};
pub use stations::{Station, StationSummary};
pub use stats::{CustomerRank, GlobalStats, OperatorStats, PeriodStats, RankOrder};
pub use users::{Capability, Role, User};

mod balance_entries;
mod checks;
mod commands;
mod error;
mod liters;
mod message_recipients;
mod messages;
mod ops;
mod pagination;
mod sessions;
mod stations;
mod stats;
mod users;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
