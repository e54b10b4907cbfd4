#![allow(dead_code)]

use async_trait::async_trait;
use kotiz::application::orchestrator::{
    CheckoutSettings, ContributionOrchestrator, ContributionRequest,
};
use kotiz::application::pools::PoolService;
use kotiz::application::reconciler::WebhookReconciler;
use kotiz::domain::Caller;
use kotiz::domain::gateway::{
    InitiatedPayment, PaymentInitiation, PaymentRequest, PaymentStatusReport, ProviderStatus,
    RefundReceipt, WebhookDelivery, WebhookNotice,
};
use kotiz::domain::money::{Amount, Currency};
use kotiz::domain::pool::{NewPool, Pool, PoolId, Visibility};
use kotiz::domain::ports::{LedgerStore, PaymentGateway, PaymentGatewayBox};
use kotiz::error::{KotizError, Result};
use kotiz::infrastructure::in_memory::InMemoryLedgerStore;
use kotiz::infrastructure::sandbox::SandboxGateway;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const SECRET: &str = "test-webhook-secret";
pub const PHONE: &str = "+22890000000";

/// Everything a scenario needs, wired on one in-memory ledger.
pub struct Kotiz {
    pub store: InMemoryLedgerStore,
    pub sandbox: Arc<SandboxGateway>,
    pub orchestrator: ContributionOrchestrator,
    pub reconciler: WebhookReconciler,
    pub pools: PoolService,
}

impl Kotiz {
    pub fn with_sandbox() -> Self {
        let sandbox = Arc::new(SandboxGateway::new(SECRET).unwrap());
        Self::build(sandbox.clone(), sandbox, CheckoutSettings::default())
    }

    /// Uses `gateway` for payments; webhooks are still verified by the sandbox.
    pub fn with_gateway(gateway: PaymentGatewayBox, settings: CheckoutSettings) -> Self {
        let sandbox = Arc::new(SandboxGateway::new(SECRET).unwrap());
        Self::build(gateway, sandbox, settings)
    }

    fn build(
        payments: PaymentGatewayBox,
        sandbox: Arc<SandboxGateway>,
        settings: CheckoutSettings,
    ) -> Self {
        let store = InMemoryLedgerStore::new();
        Self {
            orchestrator: ContributionOrchestrator::new(Arc::new(store.clone()), payments, settings),
            reconciler: WebhookReconciler::new(Arc::new(store.clone()), sandbox.clone()),
            pools: PoolService::new(Arc::new(store.clone())),
            store,
            sandbox,
        }
    }

    /// Creates a pool owned by user 1 and has admin 99 approve it.
    pub async fn active_pool(&self, participant_limit: Option<u32>) -> Pool {
        let pool = self
            .pools
            .create_pool(&Caller::user(1), new_pool(participant_limit))
            .await
            .unwrap();
        self.pools
            .approve_pool(&Caller::admin(99), pool.id)
            .await
            .unwrap()
    }

    pub async fn pool(&self, id: PoolId) -> Pool {
        self.store.get_pool(id).await.unwrap().unwrap()
    }
}

pub fn new_pool(participant_limit: Option<u32>) -> NewPool {
    NewPool {
        title: "Cotisation mariage".to_string(),
        description: None,
        goal_amount: Amount::new(Decimal::new(1_000_000, 0)).unwrap(),
        currency: Currency::Xof,
        deadline: None,
        visibility: Visibility::Public,
        participant_limit,
    }
}

pub fn request(pool: PoolId, amount: Decimal) -> ContributionRequest {
    ContributionRequest {
        pool_id: Some(pool),
        amount: Some(amount),
        phone_number: Some(PHONE.to_string()),
        ..Default::default()
    }
}

/// How a [`ScriptedGateway`] answers `initiate_payment`.
#[derive(Clone)]
pub enum Script {
    Decline,
    Unreachable,
    Stall(Duration),
    /// Accepts after the delay.
    Approve(Duration),
}

/// Gateway with a fixed answer that counts initiation attempts.
pub struct ScriptedGateway {
    script: Script,
    pub calls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn initiate_payment(&self, request: &PaymentRequest) -> Result<PaymentInitiation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Decline => Ok(PaymentInitiation::Declined {
                error: "Insufficient balance".to_string(),
                code: "INSUFFICIENT_FUNDS".to_string(),
            }),
            Script::Unreachable => Err(KotizError::Gateway("connection refused".to_string())),
            Script::Stall(delay) => {
                tokio::time::sleep(*delay).await;
                Err(KotizError::Gateway("stalled".to_string()))
            }
            Script::Approve(delay) => {
                tokio::time::sleep(*delay).await;
                let n = self.calls.load(Ordering::SeqCst);
                Ok(PaymentInitiation::Accepted(InitiatedPayment {
                    transaction_id: Some(format!("PRV-{}", n)),
                    payment_url: None,
                    status: ProviderStatus::Pending,
                    reference: Some(request.reference.to_string()),
                    provider_response: serde_json::json!({ "status": "pending" }),
                }))
            }
        }
    }

    async fn check_payment_status(&self, _transaction_id: &str) -> Result<PaymentStatusReport> {
        Err(KotizError::Gateway("unavailable".to_string()))
    }

    async fn refund_payment(
        &self,
        _transaction_id: &str,
        _amount_minor: Option<i64>,
        _reason: &str,
    ) -> Result<RefundReceipt> {
        Err(KotizError::Gateway("unavailable".to_string()))
    }

    async fn process_webhook(&self, _delivery: &WebhookDelivery) -> Result<WebhookNotice> {
        Err(KotizError::InvalidWebhook("not supported".to_string()))
    }
}
