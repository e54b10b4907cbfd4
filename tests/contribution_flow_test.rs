mod common;

use common::{Kotiz, Script, ScriptedGateway, request};
use chrono::Utc;
use kotiz::application::orchestrator::{CheckoutSettings, ProviderCheck};
use kotiz::application::reconciler::WebhookEffect;
use kotiz::domain::contribution::{
    Contribution, ContributionId, PaymentMethod, PaymentReference, PaymentStatus,
};
use kotiz::domain::transaction::Transaction;
use kotiz::domain::{Caller, UserId};
use kotiz::domain::gateway::ProviderStatus;
use kotiz::domain::money::{Amount, Balance, Currency};
use kotiz::domain::ports::LedgerStore;
use kotiz::error::KotizError;
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_pool_to_settled_contribution() {
    let kotiz = Kotiz::with_sandbox();
    let pool = kotiz.active_pool(None).await;

    let receipt = kotiz
        .orchestrator
        .create_contribution(request(pool.id, dec!(25000)), Some(&Caller::user(2)))
        .await
        .unwrap();
    assert_eq!(receipt.contribution.status, PaymentStatus::Pending);
    assert!(receipt.payment.payment_url.is_some());
    assert_eq!(kotiz.pool(pool.id).await.current_amount, Balance::ZERO);

    let tx_id = receipt.payment.transaction_id.clone().unwrap();
    let delivery = kotiz
        .sandbox
        .finish(&tx_id, ProviderStatus::Success)
        .await
        .unwrap();
    let ack = kotiz.reconciler.handle_webhook(&delivery).await.unwrap();
    assert_eq!(ack.effect, WebhookEffect::Credited);
    assert_eq!(ack.contribution_id, receipt.contribution.id);

    assert_eq!(
        kotiz.pool(pool.id).await.current_amount,
        Balance::new(dec!(25000))
    );
    let status = kotiz
        .orchestrator
        .check_contribution_status(receipt.contribution.id, &Caller::user(2))
        .await
        .unwrap();
    assert_eq!(status.contribution.status, PaymentStatus::Completed);

    let listed = kotiz.pools.public_contributions(pool.id, None).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, receipt.contribution.id);
}

#[tokio::test]
async fn test_duplicate_webhook_credits_once() {
    let kotiz = Kotiz::with_sandbox();
    let pool = kotiz.active_pool(None).await;
    let receipt = kotiz
        .orchestrator
        .create_contribution(request(pool.id, dec!(5000)), None)
        .await
        .unwrap();
    let delivery = kotiz
        .sandbox
        .finish(
            receipt.payment.transaction_id.as_deref().unwrap(),
            ProviderStatus::Completed,
        )
        .await
        .unwrap();

    for _ in 0..3 {
        kotiz.reconciler.handle_webhook(&delivery).await.unwrap();
    }
    assert_eq!(
        kotiz.pool(pool.id).await.current_amount,
        Balance::new(dec!(5000))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_webhooks_credit_once() {
    let kotiz = Arc::new(Kotiz::with_sandbox());
    let pool = kotiz.active_pool(None).await;
    let receipt = kotiz
        .orchestrator
        .create_contribution(request(pool.id, dec!(7500)), Some(&Caller::user(3)))
        .await
        .unwrap();
    let delivery = kotiz
        .sandbox
        .finish(
            receipt.payment.transaction_id.as_deref().unwrap(),
            ProviderStatus::Success,
        )
        .await
        .unwrap();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let kotiz = kotiz.clone();
            let delivery = delivery.clone();
            tokio::spawn(async move { kotiz.reconciler.handle_webhook(&delivery).await })
        })
        .collect();

    let mut credited = 0;
    for handle in handles {
        let ack = handle.await.unwrap().unwrap();
        assert!(ack.accepted);
        if ack.effect == WebhookEffect::Credited {
            credited += 1;
        } else {
            assert_eq!(ack.effect, WebhookEffect::AlreadySettled);
        }
    }
    assert_eq!(credited, 1);
    assert_eq!(
        kotiz.pool(pool.id).await.current_amount,
        Balance::new(dec!(7500))
    );
}

#[tokio::test]
async fn test_failed_payment_is_recorded_without_credit() {
    let kotiz = Kotiz::with_sandbox();
    let pool = kotiz.active_pool(None).await;
    let receipt = kotiz
        .orchestrator
        .create_contribution(request(pool.id, dec!(3000)), Some(&Caller::user(2)))
        .await
        .unwrap();
    let delivery = kotiz
        .sandbox
        .finish(
            receipt.payment.transaction_id.as_deref().unwrap(),
            ProviderStatus::Failed,
        )
        .await
        .unwrap();

    let ack = kotiz.reconciler.handle_webhook(&delivery).await.unwrap();
    assert_eq!(ack.effect, WebhookEffect::MarkedFailed);
    assert_eq!(kotiz.pool(pool.id).await.current_amount, Balance::ZERO);

    let tx = kotiz
        .store
        .transaction_for(receipt.contribution.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tx.status, PaymentStatus::Failed);
    assert!(tx.settled_at.is_some());
}

#[tokio::test]
async fn test_balance_matches_completed_contributions() {
    let kotiz = Kotiz::with_sandbox();
    let pool = kotiz.active_pool(None).await;
    let mut rng = rand::thread_rng();
    let mut expected = Decimal::ZERO;

    for user in 2..42u64 {
        let amount = Decimal::from(rng.gen_range(100..50_000u32));
        let receipt = kotiz
            .orchestrator
            .create_contribution(request(pool.id, amount), Some(&Caller::user(user)))
            .await
            .unwrap();
        let tx_id = receipt.payment.transaction_id.unwrap();

        let outcome = match rng.gen_range(0..3) {
            0 => Some(ProviderStatus::Success),
            1 => Some(ProviderStatus::Failed),
            _ => None,
        };
        if let Some(status) = outcome {
            let delivery = kotiz.sandbox.finish(&tx_id, status).await.unwrap();
            kotiz.reconciler.handle_webhook(&delivery).await.unwrap();
            // Replays must not move the balance
            kotiz.reconciler.handle_webhook(&delivery).await.unwrap();
            if status == ProviderStatus::Success {
                expected += amount;
            }
        }
    }

    let audit = kotiz
        .pools
        .audit_pool(&Caller::admin(99), pool.id)
        .await
        .unwrap();
    assert!(audit.is_consistent());
    assert_eq!(audit.current_amount, Balance::new(expected));
    assert_eq!(audit.completed + audit.failed + audit.pending, 40);
}

#[tokio::test]
async fn test_declined_payment_leaves_no_rows() {
    let gateway = Arc::new(ScriptedGateway::new(Script::Decline));
    let kotiz = Kotiz::with_gateway(gateway.clone(), CheckoutSettings::default());
    let pool = kotiz.active_pool(None).await;

    let err = kotiz
        .orchestrator
        .create_contribution(request(pool.id, dec!(1000)), Some(&Caller::user(2)))
        .await
        .unwrap_err();
    match err {
        KotizError::PaymentInitiation { code, message } => {
            assert_eq!(code, "INSUFFICIENT_FUNDS");
            assert_eq!(message, "Insufficient balance");
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(gateway.call_count(), 1);
    assert!(kotiz.store.contributions_for_pool(pool.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unreachable_or_slow_provider_leaves_no_rows() {
    for script in [Script::Unreachable, Script::Stall(Duration::from_secs(10))] {
        let gateway = Arc::new(ScriptedGateway::new(script));
        let kotiz = Kotiz::with_gateway(
            gateway,
            CheckoutSettings {
                timeout: Duration::from_millis(100),
                ..Default::default()
            },
        );
        let pool = kotiz.active_pool(None).await;

        let result = kotiz
            .orchestrator
            .create_contribution(request(pool.id, dec!(1000)), None)
            .await;
        assert!(matches!(result, Err(KotizError::PaymentInitiation { .. })));
        assert!(kotiz.store.contributions_for_pool(pool.id).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_inactive_pool_rejects_without_calling_provider() {
    let gateway = Arc::new(ScriptedGateway::new(Script::Decline));
    let kotiz = Kotiz::with_gateway(gateway.clone(), CheckoutSettings::default());

    let pending = kotiz
        .pools
        .create_pool(&Caller::user(1), common::new_pool(None))
        .await
        .unwrap();
    let result = kotiz
        .orchestrator
        .create_contribution(request(pending.id, dec!(1000)), Some(&Caller::user(2)))
        .await;
    assert!(matches!(result, Err(KotizError::InvalidState(_))));

    let closed = kotiz.active_pool(None).await;
    kotiz.pools.close_pool(&Caller::user(1), closed.id).await.unwrap();
    let result = kotiz
        .orchestrator
        .create_contribution(request(closed.id, dec!(1000)), Some(&Caller::user(2)))
        .await;
    assert!(matches!(result, Err(KotizError::InvalidState(_))));

    let result = kotiz
        .orchestrator
        .create_contribution(
            request(kotiz::domain::pool::PoolId::new(), dec!(1000)),
            None,
        )
        .await;
    assert!(matches!(result, Err(KotizError::NotFound(_))));

    assert_eq!(gateway.call_count(), 0);
    assert!(kotiz.store.contributions_for_pool(pending.id).await.unwrap().is_empty());
    assert!(kotiz.store.contributions_for_pool(closed.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_status_of_another_users_contribution_is_forbidden() {
    let kotiz = Kotiz::with_sandbox();
    let pool = kotiz.active_pool(None).await;
    let receipt = kotiz
        .orchestrator
        .create_contribution(request(pool.id, dec!(1000)), Some(&Caller::user(2)))
        .await
        .unwrap();

    let result = kotiz
        .orchestrator
        .check_contribution_status(receipt.contribution.id, &Caller::user(3))
        .await;
    assert!(matches!(result, Err(KotizError::Forbidden(_))));

    // Guest contributions are visible to admins only
    let guest = kotiz
        .orchestrator
        .create_contribution(request(pool.id, dec!(1000)), None)
        .await
        .unwrap();
    assert!(
        kotiz
            .orchestrator
            .check_contribution_status(guest.contribution.id, &Caller::user(2))
            .await
            .is_err()
    );
    assert!(
        kotiz
            .orchestrator
            .check_contribution_status(guest.contribution.id, &Caller::admin(99))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_status_check_tolerates_provider_outage() {
    let gateway = Arc::new(ScriptedGateway::new(Script::Unreachable));
    let kotiz = Kotiz::with_gateway(gateway, CheckoutSettings::default());
    let pool = kotiz.active_pool(None).await;

    let now = Utc::now();
    let contribution = Contribution {
        id: ContributionId::new(),
        pool_id: pool.id,
        contributor: Some(UserId(2)),
        amount: Amount::new(dec!(1000)).unwrap(),
        message: None,
        anonymous: false,
        payment_reference: PaymentReference::generate(now),
        status: PaymentStatus::Pending,
        phone_number: common::PHONE.to_string(),
        payment_method: PaymentMethod::MtnMoney,
        created_at: now,
        settled_at: None,
    };
    let tx = Transaction::pending_for(
        &contribution,
        pool.currency,
        Some("PRV-404".to_string()),
        None,
    );
    kotiz
        .store
        .record_pending(contribution.clone(), tx)
        .await
        .unwrap();

    let status = kotiz
        .orchestrator
        .check_contribution_status(contribution.id, &Caller::user(2))
        .await
        .unwrap();
    assert_eq!(status.provider, ProviderCheck::Unavailable);
    assert_eq!(status.contribution.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_oversized_amount_is_a_validation_error() {
    let gateway = Arc::new(ScriptedGateway::new(Script::Approve(Duration::ZERO)));
    let kotiz = Kotiz::with_gateway(gateway.clone(), CheckoutSettings::default());
    let mut euros = common::new_pool(None);
    euros.currency = Currency::Eur;
    let pool = kotiz.pools.create_pool(&Caller::user(1), euros).await.unwrap();
    kotiz
        .pools
        .approve_pool(&Caller::admin(99), pool.id)
        .await
        .unwrap();

    let result = kotiz
        .orchestrator
        .create_contribution(request(pool.id, Decimal::MAX), Some(&Caller::user(2)))
        .await;
    assert!(matches!(result, Err(KotizError::Validation(_))));
    assert_eq!(gateway.call_count(), 0);
    assert!(kotiz.store.contributions_for_pool(pool.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_participant_limit_holds_for_concurrent_requests() {
    let gateway = Arc::new(ScriptedGateway::new(Script::Approve(Duration::from_millis(50))));
    let kotiz = Kotiz::with_gateway(gateway.clone(), CheckoutSettings::default());
    let pool = kotiz.active_pool(Some(1)).await;

    // Both pass the early check before either payment is recorded
    let caller2 = Caller::user(2);
    let caller3 = Caller::user(3);
    let (first, second) = tokio::join!(
        kotiz
            .orchestrator
            .create_contribution(request(pool.id, dec!(1000)), Some(&caller2)),
        kotiz
            .orchestrator
            .create_contribution(request(pool.id, dec!(1000)), Some(&caller3)),
    );
    assert_eq!(gateway.call_count(), 2);
    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        outcomes
            .iter()
            .any(|r| matches!(r, Err(KotizError::InvalidState(_))))
    );
    assert_eq!(kotiz.store.contributions_for_pool(pool.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_pool_closed_during_initiation_gets_no_contribution() {
    let gateway = Arc::new(ScriptedGateway::new(Script::Approve(Duration::from_millis(100))));
    let kotiz = Kotiz::with_gateway(gateway.clone(), CheckoutSettings::default());
    let pool = kotiz.active_pool(None).await;

    let caller2 = Caller::user(2);
    let (created, closed) = tokio::join!(
        kotiz
            .orchestrator
            .create_contribution(request(pool.id, dec!(1000)), Some(&caller2)),
        async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            kotiz.pools.close_pool(&Caller::user(1), pool.id).await
        },
    );
    closed.unwrap();
    assert!(matches!(created, Err(KotizError::InvalidState(_))));
    assert_eq!(gateway.call_count(), 1);
    assert!(kotiz.store.contributions_for_pool(pool.id).await.unwrap().is_empty());
}
