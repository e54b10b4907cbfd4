use crate::error::{KotizError, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 signer for provider webhooks.
///
/// The provider signs the raw request body with the shared secret and sends the
/// hex digest in the `X-Webhook-Signature` header, optionally prefixed with
/// `sha256=`.
#[derive(Clone)]
pub struct WebhookSigner {
    mac: HmacSha256,
}

impl WebhookSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self> {
        let mac = HmacSha256::new_from_slice(secret.as_ref())
            .map_err(|e| KotizError::Config(format!("Invalid webhook secret: {}", e)))?;
        Ok(Self { mac })
    }

    pub fn sign(&self, body: &[u8]) -> String {
        let mut mac = self.mac.clone();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    /// Checks `signature` against `body` in constant time.
    pub fn verify(&self, body: &[u8], signature: Option<&str>) -> Result<()> {
        let signature = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| KotizError::InvalidWebhook("Missing signature".to_string()))?;
        let hex_digest = signature.strip_prefix("sha256=").unwrap_or(signature);
        let expected = hex::decode(hex_digest)
            .map_err(|_| KotizError::InvalidWebhook("Malformed signature".to_string()))?;

        let mut mac = self.mac.clone();
        mac.update(body);
        mac.verify_slice(&expected)
            .map_err(|_| KotizError::InvalidWebhook("Signature mismatch".to_string()))
    }
}
