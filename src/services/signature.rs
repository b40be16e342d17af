// src/services/signature.rs

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::error::AppError;

type HmacSha256 = Hmac<Sha256>;

// Validade do QR Code: 24 horas, medida sobre o timestamp do payload.
pub const QR_CODE_TTL_MS: i64 = 24 * 60 * 60 * 1_000;

// O conteúdo do QR Code: JSON assinado, codificado em base64.
// Timestamps em milissegundos Unix (paridade com os apps).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QrPayload {
    pub order_id: Uuid,
    pub tracking_code: Option<String>,
    #[schema(example = 1770000000000i64)]
    pub timestamp: i64,
    pub signature: String,
}

impl QrPayload {
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms - self.timestamp
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.age_ms(now_ms) > QR_CODE_TTL_MS
    }
}

// Assina e verifica payloads de QR Code com HMAC-SHA256.
// O segredo é carregado da configuração no startup; nunca sai do processo.
//
// Esquema canônico único: HMAC sobre "orderId:timestamp" e assinatura em
// base64url sem padding, nos dois sentidos (sign e verify).
#[derive(Clone)]
pub struct SignatureService {
    secret: String,
}

impl SignatureService {
    pub fn new(secret: String) -> Self {
        Self { secret }
    }

    fn canonical(order_id: Uuid, timestamp_ms: i64) -> String {
        format!("{}:{}", order_id, timestamp_ms)
    }

    pub fn sign(&self, order_id: Uuid, timestamp_ms: i64) -> Result<String, AppError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| AppError::Configuration(format!("Segredo HMAC inválido: {}", e)))?;
        mac.update(Self::canonical(order_id, timestamp_ms).as_bytes());
        let tag = mac.finalize().into_bytes();
        Ok(URL_SAFE_NO_PAD.encode(tag))
    }

    // Verificação em tempo constante via Mac::verify_slice.
    pub fn verify(&self, order_id: Uuid, timestamp_ms: i64, signature: &str) -> bool {
        let Ok(mut mac) = HmacSha256::new_from_slice(self.secret.as_bytes()) else {
            return false;
        };
        mac.update(Self::canonical(order_id, timestamp_ms).as_bytes());

        let Ok(expected) = URL_SAFE_NO_PAD.decode(signature) else {
            return false;
        };
        mac.verify_slice(&expected).is_ok()
    }

    // Monta o conteúdo do QR Code: assina, serializa e codifica em base64.
    pub fn encode_payload(
        &self,
        order_id: Uuid,
        tracking_code: &str,
        timestamp_ms: i64,
    ) -> Result<(String, String), AppError> {
        let signature = self.sign(order_id, timestamp_ms)?;
        let payload = QrPayload {
            order_id,
            tracking_code: Some(tracking_code.to_string()),
            timestamp: timestamp_ms,
            signature: signature.clone(),
        };
        let json = serde_json::to_vec(&payload)
            .map_err(|e| AppError::BadRequest(format!("Payload de QR inválido: {}", e)))?;
        Ok((STANDARD.encode(json), signature))
    }

    // Caminho inverso do encode_payload. Não valida assinatura nem validade,
    // só decodifica; as checagens ficam no motor de ciclo de vida.
    pub fn decode_payload(qr_data: &str) -> Result<QrPayload, AppError> {
        let bytes = STANDARD
            .decode(qr_data.trim())
            .map_err(|_| AppError::BadRequest("QR Code ilegível (base64 inválido).".to_string()))?;
        serde_json::from_slice(&bytes)
            .map_err(|_| AppError::BadRequest("QR Code ilegível (JSON inválido).".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> SignatureService {
        SignatureService::new("segredo-de-teste-nao-usar-em-prod".to_string())
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let svc = service();
        let order_id = Uuid::new_v4();
        let ts = 1_770_000_000_000i64;

        let signature = svc.sign(order_id, ts).unwrap();
        assert!(svc.verify(order_id, ts, &signature));
    }

    #[test]
    fn any_tampered_byte_fails_verification() {
        let svc = service();
        let order_id = Uuid::new_v4();
        let ts = 1_770_000_000_000i64;
        let signature = svc.sign(order_id, ts).unwrap();

        let raw = URL_SAFE_NO_PAD.decode(&signature).unwrap();
        for i in 0..raw.len() {
            let mut tampered = raw.clone();
            tampered[i] ^= 0x01;
            let tampered = URL_SAFE_NO_PAD.encode(tampered);
            assert!(
                !svc.verify(order_id, ts, &tampered),
                "byte {} adulterado deveria invalidar a assinatura",
                i
            );
        }
    }

    #[test]
    fn different_order_or_timestamp_fails_verification() {
        let svc = service();
        let order_id = Uuid::new_v4();
        let ts = 1_770_000_000_000i64;
        let signature = svc.sign(order_id, ts).unwrap();

        assert!(!svc.verify(Uuid::new_v4(), ts, &signature));
        assert!(!svc.verify(order_id, ts + 1, &signature));
    }

    #[test]
    fn different_secret_fails_verification() {
        let svc = service();
        let other = SignatureService::new("outro-segredo".to_string());
        let order_id = Uuid::new_v4();
        let ts = 1_770_000_000_000i64;

        let signature = svc.sign(order_id, ts).unwrap();
        assert!(!other.verify(order_id, ts, &signature));
    }

    #[test]
    fn payload_encode_decode_round_trips() {
        let svc = service();
        let order_id = Uuid::new_v4();
        let ts = 1_770_000_000_000i64;

        let (data, signature) = svc.encode_payload(order_id, "abc123", ts).unwrap();
        let payload = SignatureService::decode_payload(&data).unwrap();

        assert_eq!(payload.order_id, order_id);
        assert_eq!(payload.tracking_code.as_deref(), Some("abc123"));
        assert_eq!(payload.timestamp, ts);
        assert_eq!(payload.signature, signature);
        assert!(svc.verify(payload.order_id, payload.timestamp, &payload.signature));
    }

    #[test]
    fn expiry_is_measured_against_the_ttl() {
        let now_ms = 1_770_000_000_000i64;
        let fresh = QrPayload {
            order_id: Uuid::new_v4(),
            tracking_code: None,
            timestamp: now_ms - QR_CODE_TTL_MS + 1,
            signature: String::new(),
        };
        let stale = QrPayload {
            timestamp: now_ms - QR_CODE_TTL_MS - 1,
            ..fresh.clone()
        };

        assert!(!fresh.is_expired(now_ms));
        assert!(stale.is_expired(now_ms));
    }

    #[test]
    fn garbage_qr_data_is_rejected() {
        assert!(SignatureService::decode_payload("não-é-base64!!").is_err());
        let not_json = STANDARD.encode(b"apenas texto");
        assert!(SignatureService::decode_payload(&not_json).is_err());
    }
}
