//! Engine → wire type conversions.

use api_types::{
    Paginated, Pagination,
    check::{CheckStatus as ApiStatus, CheckView},
    message::MessageView,
    station::StationView,
    stats::{GlobalStatsView, OperatorStatsView, PeriodStatsView},
    user::{CustomerRankView, LedgerEntryView, Role as ApiRole, UserView},
};
use engine::{
    BalanceEntry, Check, CheckStatus, CustomerRank, GlobalStats, Message, OperatorStats, Page,
    PeriodStats, Role, Station, User,
};

pub(crate) fn map_status(status: CheckStatus) -> ApiStatus {
    match status {
        CheckStatus::Pending => ApiStatus::Pending,
        CheckStatus::Printed => ApiStatus::Printed,
        CheckStatus::Used => ApiStatus::Used,
        CheckStatus::Cancelled => ApiStatus::Cancelled,
        CheckStatus::Expired => ApiStatus::Expired,
    }
}

pub(crate) fn parse_status(status: ApiStatus) -> CheckStatus {
    match status {
        ApiStatus::Pending => CheckStatus::Pending,
        ApiStatus::Printed => CheckStatus::Printed,
        ApiStatus::Used => CheckStatus::Used,
        ApiStatus::Cancelled => CheckStatus::Cancelled,
        ApiStatus::Expired => CheckStatus::Expired,
    }
}

pub(crate) fn map_role(role: Role) -> ApiRole {
    match role {
        Role::Moderator => ApiRole::Moderator,
        Role::Operator => ApiRole::Operator,
        Role::Customer => ApiRole::Customer,
    }
}

pub(crate) fn parse_role(role: ApiRole) -> Role {
    match role {
        ApiRole::Moderator => Role::Moderator,
        ApiRole::Operator => Role::Operator,
        ApiRole::Customer => Role::Customer,
    }
}

pub(crate) fn page<T, U>(page: Page<T>, f: impl FnMut(T) -> U) -> Paginated<U> {
    Paginated {
        pagination: Pagination {
            page: page.page,
            limit: page.limit,
            total: page.total,
            total_pages: page.total_pages,
        },
        data: page.items.into_iter().map(f).collect(),
    }
}

pub(crate) fn check(check: Check) -> CheckView {
    CheckView {
        id: check.id,
        code: check.code,
        qr_code: check.qr_code,
        amount_liters: check.amount.to_string(),
        status: map_status(check.status),
        is_printed: check.is_printed,
        operator_id: check.operator_id,
        station_id: check.station_id,
        customer_id: check.customer_id,
        customer_name: check.customer_name,
        customer_phone: check.customer_phone,
        customer_address: check.customer_address,
        created_at: check.created_at,
        used_at: check.used_at,
        expires_at: check.expires_at,
    }
}

pub(crate) fn user(user: User) -> UserView {
    UserView {
        id: user.id,
        role: map_role(user.role),
        username: user.username,
        full_name: user.full_name,
        phone: user.phone,
        telegram_id: user.telegram_id,
        telegram_username: user.telegram_username,
        balance_liters: user.balance.to_string(),
        station_id: user.station_id,
        is_active: user.is_active,
        created_at: user.created_at,
    }
}

pub(crate) fn customer_rank(rank: CustomerRank) -> CustomerRankView {
    CustomerRankView {
        customer: user(rank.customer),
        used_checks: rank.used_checks,
    }
}

pub(crate) fn ledger_entry(entry: BalanceEntry) -> LedgerEntryView {
    LedgerEntryView {
        id: entry.id,
        customer_id: entry.customer_id,
        check_id: entry.check_id,
        kind: entry.kind.as_str().to_string(),
        amount_liters: entry.amount.to_string(),
        balance_after_liters: entry.balance_after.to_string(),
        created_by: entry.created_by,
        created_at: entry.created_at,
    }
}

pub(crate) fn station(station: Station, counts: Option<(u64, u64)>) -> StationView {
    StationView {
        id: station.id,
        name: station.name,
        address: station.address,
        phone: station.phone,
        is_active: station.is_active,
        created_at: station.created_at,
        operators_count: counts.map(|(operators, _)| operators),
        checks_count: counts.map(|(_, checks)| checks),
    }
}

pub(crate) fn message(message: Message) -> MessageView {
    MessageView {
        id: message.id,
        title: message.title,
        content: message.content,
        sender_id: message.sender_id,
        is_global: message.is_global,
        created_at: message.created_at,
        recipients_count: message.recipients,
    }
}

pub(crate) fn global_stats(stats: GlobalStats) -> GlobalStatsView {
    GlobalStatsView {
        total_customers: stats.total_customers,
        total_operators: stats.total_operators,
        total_stations: stats.total_stations,
        total_checks: stats.total_checks,
        used_checks: stats.used_checks,
        pending_checks: stats.pending_checks,
        used_liters: stats.used_liters.to_string(),
        pending_liters: stats.pending_liters.to_string(),
        total_liters: stats.total_liters.to_string(),
    }
}

fn period(stats: PeriodStats) -> PeriodStatsView {
    PeriodStatsView {
        checks: stats.checks,
        liters: stats.liters.to_string(),
    }
}

pub(crate) fn operator_stats(stats: OperatorStats) -> OperatorStatsView {
    OperatorStatsView {
        today: period(stats.today),
        month: period(stats.month),
        total: period(stats.total),
    }
}
