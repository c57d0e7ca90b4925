mod common;

use chrono::{Duration, Utc};

use engine::{
    CheckListFilter, CheckStatus, CreateCheckCmd, EngineError, EntryKind, Liters, PageRequest,
    QrPayload,
};

use common::{fixture, liters};

#[tokio::test]
async fn create_check_is_pending_and_unprinted() {
    let fx = fixture().await;
    let check = fx.issue(50, None).await;

    assert_eq!(check.status, CheckStatus::Pending);
    assert!(!check.is_printed);
    assert_eq!(check.amount, liters(50));
    assert_eq!(check.amount.to_string(), "50.00");
    assert_eq!(check.code.len(), 8);
    assert!(check.used_at.is_none());
    assert!(check.expires_at > check.created_at);

    let payload = QrPayload::decode(&check.qr_code).unwrap();
    assert_eq!(payload.code, check.code);
    assert_eq!(payload.station_id, fx.station);
}

#[tokio::test]
async fn create_check_rejects_non_positive_amounts() {
    let fx = fixture().await;
    for amount in [Liters::ZERO, Liters::new(-100)] {
        let err = fx
            .engine
            .create_check(
                CreateCheckCmd::new(amount, fx.operator, fx.station),
                fx.operator,
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }
}

#[tokio::test]
async fn create_check_requires_known_station_and_assigned_operator() {
    let fx = fixture().await;

    let err = fx
        .engine
        .create_check(
            CreateCheckCmd::new(liters(10), fx.operator, 9_999),
            fx.moderator,
            Utc::now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    // Operator of another station.
    let err = fx
        .engine
        .create_check(
            CreateCheckCmd::new(liters(10), fx.other_operator, fx.station),
            fx.moderator,
            Utc::now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    // Operators cannot issue at a foreign station or on behalf of others.
    let err = fx
        .engine
        .create_check(
            CreateCheckCmd::new(liters(10), fx.operator, fx.other_station),
            fx.operator,
            Utc::now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
    let err = fx
        .engine
        .create_check(
            CreateCheckCmd::new(liters(10), fx.other_operator, fx.other_station),
            fx.operator,
            Utc::now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
}

#[tokio::test]
async fn codes_are_unique() {
    let fx = fixture().await;
    let mut codes = std::collections::HashSet::new();
    for _ in 0..25 {
        let check = fx.issue(1, None).await;
        assert!(codes.insert(check.code));
    }
}

#[tokio::test]
async fn confirm_credits_the_customer_once() {
    let fx = fixture().await;
    let customer = fx.customer("+998 90 111 22 33").await;
    let check = fx.issue(50, Some("+998901112233")).await;
    assert_eq!(check.customer_id, Some(customer.id));
    assert_eq!(fx.balance(customer.id).await, Liters::ZERO);

    let confirmed = fx
        .engine
        .confirm_check(check.id, fx.operator, Utc::now())
        .await
        .unwrap();
    assert_eq!(confirmed.status, CheckStatus::Used);
    assert!(confirmed.is_printed);
    assert!(confirmed.used_at.is_some());
    assert_eq!(fx.balance(customer.id).await, liters(50));

    let customer = fx.engine.user(customer.id, fx.moderator).await.unwrap();
    assert_eq!(customer.station_id, Some(fx.station));

    let err = fx
        .engine
        .confirm_check(check.id, fx.operator, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
    assert_eq!(fx.balance(customer.id).await, liters(50));
}

#[tokio::test]
async fn confirm_creates_customer_from_typed_phone() {
    let fx = fixture().await;
    let check = fx
        .engine
        .create_check(
            CreateCheckCmd::new(liters(12), fx.operator, fx.station)
                .customer_name("Aziz")
                .customer_phone("90-555-44-33"),
            fx.operator,
            Utc::now(),
        )
        .await
        .unwrap();
    let customer_id = check.customer_id.unwrap();

    fx.engine
        .confirm_check(check.id, fx.operator, Utc::now())
        .await
        .unwrap();
    let customer = fx.engine.user(customer_id, fx.operator).await.unwrap();
    assert_eq!(customer.phone.as_deref(), Some("905554433"));
    assert_eq!(customer.full_name.as_deref(), Some("Aziz"));
    assert_eq!(customer.balance, liters(12));

    // Same phone in another format resolves to the same customer.
    let again = fx.issue(3, Some("90 555 44 33")).await;
    assert_eq!(again.customer_id, Some(customer_id));
}

#[tokio::test]
async fn confirm_without_customer_closes_check_without_credit() {
    let fx = fixture().await;
    let check = fx.issue(20, None).await;
    let confirmed = fx
        .engine
        .confirm_check(check.id, fx.operator, Utc::now())
        .await
        .unwrap();
    assert_eq!(confirmed.status, CheckStatus::Used);
    assert_eq!(confirmed.customer_id, None);

    fx.engine
        .delete_check(check.id, fx.moderator, Utc::now())
        .await
        .unwrap();
}

#[tokio::test]
async fn concurrent_confirms_credit_once() {
    let fx = fixture().await;
    let customer = fx.customer("+998901234567").await;
    let check = fx.issue(40, Some("+998901234567")).await;
    let now = Utc::now();

    let (a, b) = tokio::join!(
        fx.engine.confirm_check(check.id, fx.operator, now),
        fx.engine.confirm_check(check.id, fx.moderator, now),
    );
    let results = [a, b];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .any(|r| matches!(r, Err(EngineError::Conflict(_))))
    );
    assert_eq!(fx.balance(customer.id).await, liters(40));

    let ledger = fx
        .engine
        .customer_ledger(customer.id, fx.moderator)
        .await
        .unwrap();
    assert_eq!(ledger.len(), 1);
}

#[tokio::test]
async fn cancel_only_from_pending() {
    let fx = fixture().await;
    let pending = fx.issue(10, None).await;
    let cancelled = fx
        .engine
        .cancel_check(pending.id, fx.operator)
        .await
        .unwrap();
    assert_eq!(cancelled.status, CheckStatus::Cancelled);

    let err = fx
        .engine
        .cancel_check(pending.id, fx.operator)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
    let err = fx
        .engine
        .confirm_check(pending.id, fx.operator, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));

    let used = fx.issue(10, None).await;
    fx.engine
        .confirm_check(used.id, fx.operator, Utc::now())
        .await
        .unwrap();
    let err = fx.engine.cancel_check(used.id, fx.operator).await.unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
    let still = fx.engine.check(used.id, fx.operator).await.unwrap();
    assert_eq!(still.status, CheckStatus::Used);
}

#[tokio::test]
async fn mark_printed_keeps_status() {
    let fx = fixture().await;
    let check = fx.issue(5, None).await;
    let printed = fx.engine.mark_printed(check.id, fx.operator).await.unwrap();
    assert!(printed.is_printed);
    assert_eq!(printed.status, CheckStatus::Pending);
    // Idempotent.
    fx.engine.mark_printed(check.id, fx.operator).await.unwrap();

    fx.engine.cancel_check(check.id, fx.operator).await.unwrap();
    let err = fx
        .engine
        .mark_printed(check.id, fx.operator)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
}

#[tokio::test]
async fn closed_checks_are_never_flagged_printed() {
    let fx = fixture().await;
    let cancelled = fx.issue(5, None).await;
    let expired = fx.issue(6, None).await;
    fx.engine.cancel_check(cancelled.id, fx.operator).await.unwrap();
    let swept = fx
        .engine
        .expire_overdue(Utc::now() + Duration::days(365))
        .await
        .unwrap();
    assert_eq!(swept, 1);

    for id in [cancelled.id, expired.id] {
        let err = fx.engine.mark_printed(id, fx.operator).await.unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
        let stored = fx.engine.check(id, fx.moderator).await.unwrap();
        assert!(!stored.is_printed);
    }
}

#[tokio::test]
async fn delete_of_used_check_reverses_credit() {
    let fx = fixture().await;
    let customer = fx.customer("+998907770011").await;
    let before = fx.balance(customer.id).await;

    let check = fx.issue(30, Some("+998907770011")).await;
    fx.engine
        .confirm_check(check.id, fx.operator, Utc::now())
        .await
        .unwrap();
    assert_eq!(fx.balance(customer.id).await, before + liters(30));

    let err = fx
        .engine
        .delete_check(check.id, fx.operator, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    fx.engine
        .delete_check(check.id, fx.moderator, Utc::now())
        .await
        .unwrap();
    assert_eq!(fx.balance(customer.id).await, before);

    let err = fx.engine.check(check.id, fx.moderator).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    let ledger = fx
        .engine
        .customer_ledger(customer.id, fx.moderator)
        .await
        .unwrap();
    let kinds: Vec<EntryKind> = ledger.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![EntryKind::ConfirmCredit, EntryKind::DeleteReversal]);
    assert_eq!(ledger[1].amount, -liters(30));
    assert_eq!(ledger[1].check_id, Some(check.id));
}

#[tokio::test]
async fn delete_of_pending_check_has_no_balance_effect() {
    let fx = fixture().await;
    let customer = fx.customer("+998907770022").await;
    let check = fx.issue(30, Some("+998907770022")).await;
    fx.engine
        .delete_check(check.id, fx.moderator, Utc::now())
        .await
        .unwrap();
    assert_eq!(fx.balance(customer.id).await, Liters::ZERO);
}

#[tokio::test]
async fn reactivate_adds_to_balance_and_keeps_check() {
    let fx = fixture().await;
    let customer = fx.customer("+998935550000").await;
    let check = fx.issue(50, Some("+998935550000")).await;
    fx.engine
        .confirm_check(check.id, fx.operator, Utc::now())
        .await
        .unwrap();
    assert_eq!(fx.balance(customer.id).await, liters(50));

    let after = fx
        .engine
        .reactivate_check(check.id, liters(20), fx.operator, fx.operator, Utc::now())
        .await
        .unwrap();
    assert_eq!(fx.balance(customer.id).await, liters(70));
    assert_eq!(after.amount, liters(50));
    assert_eq!(after.status, CheckStatus::Used);

    let err = fx
        .engine
        .reactivate_check(check.id, Liters::ZERO, fx.operator, fx.operator, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn reactivate_links_customer_and_needs_one() {
    let fx = fixture().await;
    let anonymous = fx.issue(10, None).await;
    let err = fx
        .engine
        .reactivate_check(anonymous.id, liters(5), fx.operator, fx.operator, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let cancelled = fx.issue(10, Some("+998971112233")).await;
    fx.engine
        .cancel_check(cancelled.id, fx.operator)
        .await
        .unwrap();
    let after = fx
        .engine
        .reactivate_check(cancelled.id, liters(5), fx.operator, fx.moderator, Utc::now())
        .await
        .unwrap();
    assert_eq!(after.status, CheckStatus::Cancelled);
    let customer_id = after.customer_id.unwrap();
    assert_eq!(fx.balance(customer_id).await, liters(5));
}

#[tokio::test]
async fn balance_matches_ledger_after_mixed_sequence() {
    let fx = fixture().await;
    let customer = fx.customer("+998991234567").await;
    let phone = Some("+998991234567");

    let a = fx.issue(50, phone).await;
    let b = fx.issue(30, phone).await;
    let c = fx.issue(15, phone).await;
    for id in [a.id, b.id, c.id] {
        fx.engine
            .confirm_check(id, fx.operator, Utc::now())
            .await
            .unwrap();
    }
    fx.engine
        .delete_check(b.id, fx.moderator, Utc::now())
        .await
        .unwrap();
    fx.engine
        .reactivate_check(a.id, Liters::new(7_25), fx.operator, fx.operator, Utc::now())
        .await
        .unwrap();

    let expected = liters(50) + liters(15) + Liters::new(7_25);
    assert_eq!(fx.balance(customer.id).await, expected);

    let ledger = fx
        .engine
        .customer_ledger(customer.id, fx.moderator)
        .await
        .unwrap();
    let sum: Liters = ledger.iter().map(|e| e.amount).sum();
    assert_eq!(sum, expected);
    assert_eq!(ledger.last().unwrap().balance_after, expected);

    assert!(fx.engine.recompute_balances().await.unwrap().is_empty());
}

#[tokio::test]
async fn operators_are_confined_to_their_station() {
    let fx = fixture().await;
    let check = fx.issue(10, None).await;

    let err = fx
        .engine
        .confirm_check(check.id, fx.other_operator, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
    let err = fx
        .engine
        .check(check.id, fx.other_operator)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let filter = CheckListFilter {
        station_id: Some(fx.station),
        ..Default::default()
    };
    let err = fx
        .engine
        .list_checks(&filter, PageRequest::default(), fx.other_operator)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let own = fx
        .engine
        .list_checks(
            &CheckListFilter::default(),
            PageRequest::default(),
            fx.other_operator,
        )
        .await
        .unwrap();
    assert_eq!(own.total, 0);
}

#[tokio::test]
async fn list_filters_unprinted_regardless_of_status() {
    let fx = fixture().await;
    let a = fx.issue(1, None).await;
    let b = fx.issue(2, None).await;
    let c = fx.issue(3, None).await;
    fx.engine.mark_printed(a.id, fx.operator).await.unwrap();
    fx.engine.cancel_check(c.id, fx.operator).await.unwrap();

    let filter = CheckListFilter {
        is_printed: Some(false),
        ..Default::default()
    };
    let page = fx
        .engine
        .list_checks(&filter, PageRequest::default(), fx.operator)
        .await
        .unwrap();
    let ids: Vec<i64> = page.items.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![c.id, b.id]);

    let filter = CheckListFilter {
        status: Some(CheckStatus::Cancelled),
        ..Default::default()
    };
    let page = fx
        .engine
        .list_checks(&filter, PageRequest::default(), fx.moderator)
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].id, c.id);
}

#[tokio::test]
async fn pages_cover_every_check_exactly_once() {
    let limit = 4;
    for total in [0, 1, limit, limit + 1, 3 * limit] {
        let fx = fixture().await;
        let now = Utc::now();
        for i in 0..total {
            // Every other pair shares a timestamp to exercise the id tiebreak.
            let at = now + Duration::seconds((i / 2) as i64);
            fx.issue_at(1, None, at).await;
        }

        let mut seen = Vec::new();
        let mut page_no = 1;
        loop {
            let page = fx
                .engine
                .list_checks(
                    &CheckListFilter::default(),
                    PageRequest::new(Some(page_no), Some(limit)).unwrap(),
                    fx.moderator,
                )
                .await
                .unwrap();
            assert_eq!(page.total, total);
            assert_eq!(page.total_pages, total.div_ceil(limit));
            if page.items.is_empty() {
                break;
            }
            seen.extend(page.items.into_iter().map(|c| c.id));
            page_no += 1;
        }
        let unique: std::collections::HashSet<i64> = seen.iter().copied().collect();
        assert_eq!(seen.len() as u64, total);
        assert_eq!(unique.len() as u64, total);
    }
}

#[tokio::test]
async fn expire_overdue_only_touches_pending() {
    let fx = fixture().await;
    let old = Utc::now() - Duration::days(60);
    let stale = fx.issue_at(5, None, old).await;
    let stale_used = fx.issue_at(5, None, old).await;
    fx.engine
        .confirm_check(stale_used.id, fx.operator, Utc::now())
        .await
        .unwrap();
    let fresh = fx.issue(5, None).await;

    let expired = fx.engine.expire_overdue(Utc::now()).await.unwrap();
    assert_eq!(expired, 1);
    let stale = fx.engine.check(stale.id, fx.moderator).await.unwrap();
    assert_eq!(stale.status, CheckStatus::Expired);
    let fresh = fx.engine.check(fresh.id, fx.moderator).await.unwrap();
    assert_eq!(fresh.status, CheckStatus::Pending);

    let err = fx
        .engine
        .confirm_check(stale.id, fx.operator, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
}
