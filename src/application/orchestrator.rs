use crate::config::PaymentConfig;
use crate::domain::contribution::{
    Contribution, ContributionId, PaymentMethod, PaymentReference, PaymentStatus,
};
use crate::domain::gateway::{PaymentInitiation, PaymentMethodInfo, PaymentRequest, ProviderStatus};
use crate::domain::money::{Amount, Currency};
use crate::domain::pool::PoolId;
use crate::domain::ports::{LedgerStoreBox, PaymentGatewayBox};
use crate::domain::transaction::Transaction;
use crate::domain::Caller;
use crate::error::{KotizError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// What a client submits to start paying into a pool.
///
/// Required fields are optional here so that a missing one surfaces as a
/// validation error rather than a decoding failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionRequest {
    pub pool_id: Option<PoolId>,
    pub amount: Option<Decimal>,
    pub phone_number: Option<String>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, alias = "isAnonymous")]
    pub anonymous: bool,
}

/// Provider-facing settings applied to every initiation.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub callback_url: Option<String>,
    pub return_url: Option<String>,
    pub timeout: Duration,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self::from(&PaymentConfig::default())
    }
}

impl From<&PaymentConfig> for CheckoutSettings {
    fn from(config: &PaymentConfig) -> Self {
        Self {
            callback_url: config.callback_url.clone(),
            return_url: config.return_url.clone(),
            timeout: config.timeout,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionSummary {
    pub id: ContributionId,
    pub pool_id: PoolId,
    pub amount: Amount,
    pub currency: Currency,
    pub status: PaymentStatus,
    pub payment_reference: PaymentReference,
    pub created_at: DateTime<Utc>,
}

impl ContributionSummary {
    fn of(contribution: &Contribution, currency: Currency) -> Self {
        Self {
            id: contribution.id,
            pool_id: contribution.pool_id,
            amount: contribution.amount,
            currency,
            status: contribution.status,
            payment_reference: contribution.payment_reference.clone(),
            created_at: contribution.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSummary {
    pub transaction_id: Option<String>,
    pub payment_url: Option<String>,
    pub status: ProviderStatus,
    pub reference: PaymentReference,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContributionReceipt {
    pub contribution: ContributionSummary,
    pub payment: PaymentSummary,
}

/// Result of asking the provider about a pending payment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ProviderCheck {
    /// Not asked: the contribution is settled or has no provider id.
    Skipped,
    Reported { status: ProviderStatus },
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContributionStatus {
    pub contribution: ContributionSummary,
    pub provider: ProviderCheck,
}

/// Payment methods offered in a country.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentMethods {
    pub country: String,
    pub methods: Vec<PaymentMethodInfo>,
    /// The provider could not be asked and the default list was served.
    pub fallback: bool,
}

const DEFAULT_COUNTRY: &str = "SN";

fn fallback_methods() -> Vec<PaymentMethodInfo> {
    [PaymentMethod::OrangeMoney, PaymentMethod::MtnMoney]
        .into_iter()
        .map(Into::into)
        .collect()
}

/// Starts payments for contributions and answers status queries.
///
/// The orchestrator never writes a terminal status: that belongs to
/// [`crate::application::reconciler::WebhookReconciler`]. It persists nothing
/// unless the provider has accepted the payment.
pub struct ContributionOrchestrator {
    store: LedgerStoreBox,
    gateway: PaymentGatewayBox,
    settings: CheckoutSettings,
}

impl ContributionOrchestrator {
    pub fn new(store: LedgerStoreBox, gateway: PaymentGatewayBox, settings: CheckoutSettings) -> Self {
        Self {
            store,
            gateway,
            settings,
        }
    }

    pub async fn create_contribution(
        &self,
        request: ContributionRequest,
        caller: Option<&Caller>,
    ) -> Result<ContributionReceipt> {
        let pool_id = request
            .pool_id
            .ok_or_else(|| KotizError::Validation("poolId is required".to_string()))?;
        let amount = Amount::new(
            request
                .amount
                .ok_or_else(|| KotizError::Validation("amount is required".to_string()))?,
        )?;
        let phone_number = request
            .phone_number
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| KotizError::Validation("phoneNumber is required".to_string()))?
            .to_string();
        let contributor = caller.map(|c| c.user_id);

        let now = Utc::now();
        let pool = self
            .store
            .get_pool(pool_id)
            .await?
            .ok_or_else(|| KotizError::NotFound(format!("Pool {} not found", pool_id)))?;
        let existing = match pool.participant_limit {
            Some(_) => self.store.contributions_for_pool(pool_id).await?,
            None => Vec::new(),
        };
        pool.admit(contributor, &phone_number, &existing, now)?;

        let amount_minor = pool.currency.to_minor_units(amount)?;
        let reference = PaymentReference::generate(now);
        let payment_request = PaymentRequest {
            amount_minor,
            currency: pool.currency,
            phone_number: phone_number.clone(),
            payment_method: request.payment_method,
            reference: reference.clone(),
            description: format!("Contribution to {}", pool.title),
            callback_url: self.settings.callback_url.clone(),
            return_url: self.settings.return_url.clone(),
        };

        let payment = match timeout(
            self.settings.timeout,
            self.gateway.initiate_payment(&payment_request),
        )
        .await
        {
            Ok(Ok(PaymentInitiation::Accepted(payment))) => payment,
            Ok(Ok(PaymentInitiation::Declined { error, code })) => {
                warn!(%reference, %code, "payment declined by provider");
                return Err(KotizError::PaymentInitiation {
                    code,
                    message: error,
                });
            }
            Ok(Err(e)) => {
                warn!(%reference, error = %e, "payment provider unreachable");
                return Err(KotizError::PaymentInitiation {
                    code: "provider_unavailable".to_string(),
                    message: "The payment provider could not be reached".to_string(),
                });
            }
            Err(_) => {
                warn!(%reference, timeout = ?self.settings.timeout, "payment initiation timed out");
                return Err(KotizError::PaymentInitiation {
                    code: "timeout".to_string(),
                    message: "The payment provider did not respond in time".to_string(),
                });
            }
        };

        let contribution = Contribution {
            id: ContributionId::new(),
            pool_id,
            contributor,
            amount,
            message: request
                .message
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty()),
            anonymous: request.anonymous,
            payment_reference: reference.clone(),
            status: PaymentStatus::Pending,
            phone_number,
            payment_method: request.payment_method,
            created_at: now,
            settled_at: None,
        };
        let transaction = Transaction::pending_for(
            &contribution,
            pool.currency,
            payment.transaction_id.clone(),
            Some(payment.provider_response.to_string()),
        );

        if let Err(e) = self
            .store
            .record_pending(contribution.clone(), transaction)
            .await
        {
            error!(%reference, error = %e, "payment accepted but contribution not recorded");
            return Err(e);
        }
        info!(
            contribution = %contribution.id,
            pool = %pool_id,
            %reference,
            amount_minor,
            "contribution pending payment"
        );

        Ok(ContributionReceipt {
            contribution: ContributionSummary::of(&contribution, pool.currency),
            payment: PaymentSummary {
                transaction_id: payment.transaction_id,
                payment_url: payment.payment_url,
                status: payment.status,
                reference,
            },
        })
    }

    /// Reports a contribution's status to its contributor or an admin.
    ///
    /// A pending contribution with a provider id is looked up at the provider
    /// for information only. The ledger is not changed.
    pub async fn check_contribution_status(
        &self,
        id: ContributionId,
        caller: &Caller,
    ) -> Result<ContributionStatus> {
        let contribution = self
            .store
            .get_contribution(id)
            .await?
            .ok_or_else(|| KotizError::NotFound(format!("Contribution {} not found", id)))?;
        if !caller.is_admin() && !contribution.belongs_to(caller.user_id) {
            return Err(KotizError::Forbidden(format!(
                "Contribution {} belongs to another user",
                id
            )));
        }

        let transaction = self.store.transaction_for(id).await?;
        let currency = match &transaction {
            Some(tx) => tx.currency,
            None => self
                .store
                .get_pool(contribution.pool_id)
                .await?
                .map(|p| p.currency)
                .unwrap_or_default(),
        };

        let provider_id = transaction.and_then(|tx| tx.provider_transaction_id);
        let provider = match provider_id {
            Some(tx_id) if contribution.status == PaymentStatus::Pending => {
                match timeout(
                    self.settings.timeout,
                    self.gateway.check_payment_status(&tx_id),
                )
                .await
                {
                    Ok(Ok(report)) => ProviderCheck::Reported {
                        status: report.status,
                    },
                    Ok(Err(e)) => {
                        warn!(contribution = %id, error = %e, "provider status check failed");
                        ProviderCheck::Unavailable
                    }
                    Err(_) => {
                        warn!(contribution = %id, "provider status check timed out");
                        ProviderCheck::Unavailable
                    }
                }
            }
            _ => ProviderCheck::Skipped,
        };

        Ok(ContributionStatus {
            contribution: ContributionSummary::of(&contribution, currency),
            provider,
        })
    }

    /// Lists the payment methods available in `country` (Senegal by default).
    ///
    /// Never fails on provider trouble: the default list is served instead.
    pub async fn payment_methods(&self, country: Option<&str>) -> Result<PaymentMethods> {
        let country = match country.map(str::trim).filter(|c| !c.is_empty()) {
            None => DEFAULT_COUNTRY.to_string(),
            Some(code) if code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()) => {
                code.to_ascii_uppercase()
            }
            Some(code) => {
                return Err(KotizError::Validation(format!(
                    "Invalid country code: {}",
                    code
                )));
            }
        };

        let listed = timeout(
            self.settings.timeout,
            self.gateway.available_methods(&country),
        )
        .await;
        let (methods, fallback) = match listed {
            Ok(Ok(methods)) => (methods, false),
            Ok(Err(e)) => {
                warn!(%country, error = %e, "payment method listing failed");
                (fallback_methods(), true)
            }
            Err(_) => {
                warn!(%country, "payment method listing timed out");
                (fallback_methods(), true)
            }
        };
        Ok(PaymentMethods {
            country,
            methods,
            fallback,
        })
    }
}
