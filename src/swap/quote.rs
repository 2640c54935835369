//! Quoting service client
//!
//! Talks to a Jupiter-compatible HTTP API: `GET /quote` for routing and
//! pricing, `POST /swap` for a ready-to-sign transaction. The raw quote
//! response is carried through [`Quote::route`] and handed back verbatim
//! when building the swap, as the service requires.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::VersionedTransaction;
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::swap::types::Quote;

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Quote a swap of `amount` base units of `input_mint`
    async fn get_quote(
        &self,
        input_mint: &Pubkey,
        output_mint: &Pubkey,
        amount: u64,
        slippage_bps: u16,
    ) -> Result<Quote>;

    /// Build an unsigned swap transaction for a previously fetched quote
    async fn build_swap_transaction(
        &self,
        quote: &Quote,
        user_public_key: &Pubkey,
        slippage_bps: u16,
    ) -> Result<VersionedTransaction>;
}

pub struct HttpQuoteProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpQuoteProvider {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl QuoteProvider for HttpQuoteProvider {
    async fn get_quote(
        &self,
        input_mint: &Pubkey,
        output_mint: &Pubkey,
        amount: u64,
        slippage_bps: u16,
    ) -> Result<Quote> {
        let url = format!("{}/quote", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("inputMint", input_mint.to_string()),
                ("outputMint", output_mint.to_string()),
                ("amount", amount.to_string()),
                ("slippageBps", slippage_bps.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Network(format!(
                "quote request failed with {}: {}",
                status, body
            )));
        }

        let value: Value = response.json().await?;
        let quote = parse_quote(value, slippage_bps)?;
        debug!(
            in_amount = quote.in_amount,
            out_amount = quote.out_amount,
            price_impact_pct = quote.price_impact_pct,
            "quote received"
        );
        Ok(quote)
    }

    async fn build_swap_transaction(
        &self,
        quote: &Quote,
        user_public_key: &Pubkey,
        slippage_bps: u16,
    ) -> Result<VersionedTransaction> {
        let url = format!("{}/swap", self.base_url);
        let body = swap_request_body(quote, user_public_key, slippage_bps);
        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Network(format!(
                "swap request failed with {}: {}",
                status, body
            )));
        }

        let value: Value = response.json().await?;
        let encoded = value
            .get("swapTransaction")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Codec("swap response missing swapTransaction".to_string()))?;
        decode_swap_transaction(encoded)
    }
}

fn swap_request_body(quote: &Quote, user_public_key: &Pubkey, slippage_bps: u16) -> Value {
    json!({
        "quoteResponse": quote.route,
        "userPublicKey": user_public_key.to_string(),
        "slippageBps": slippage_bps,
        "wrapAndUnwrapSol": true,
    })
}

/// Parse the service's quote response into a [`Quote`].
///
/// Numeric amounts arrive as JSON strings; priceImpactPct is sent as a
/// string by some deployments and a number by others.
fn parse_quote(value: Value, slippage_bps: u16) -> Result<Quote> {
    let input_mint = field_pubkey(&value, "inputMint")?;
    let output_mint = field_pubkey(&value, "outputMint")?;
    let in_amount = field_u64(&value, "inAmount")?;
    let out_amount = field_u64(&value, "outAmount")?;
    let min_out_amount = field_u64(&value, "otherAmountThreshold")?;
    let price_impact_pct = field_f64(&value, "priceImpactPct")?;

    Ok(Quote {
        input_mint,
        output_mint,
        in_amount,
        out_amount,
        min_out_amount,
        price_impact_pct,
        slippage_bps,
        route: value,
    })
}

fn decode_swap_transaction(encoded: &str) -> Result<VersionedTransaction> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| Error::Codec(format!("swap transaction is not valid base64: {}", e)))?;
    bincode::deserialize(&bytes)
        .map_err(|e| Error::Codec(format!("swap transaction failed to deserialize: {}", e)))
}

fn field_str<'a>(value: &'a Value, key: &str) -> Result<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Codec(format!("quote response missing '{}'", key)))
}

fn field_pubkey(value: &Value, key: &str) -> Result<Pubkey> {
    field_str(value, key)?
        .parse()
        .map_err(|_| Error::Codec(format!("quote response has invalid pubkey in '{}'", key)))
}

fn field_u64(value: &Value, key: &str) -> Result<u64> {
    let field = value
        .get(key)
        .ok_or_else(|| Error::Codec(format!("quote response missing '{}'", key)))?;
    match field {
        Value::String(s) => s
            .parse()
            .map_err(|_| Error::Codec(format!("quote response has invalid amount in '{}'", key))),
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| Error::Codec(format!("quote response has invalid amount in '{}'", key))),
        _ => Err(Error::Codec(format!(
            "quote response has invalid amount in '{}'",
            key
        ))),
    }
}

fn field_f64(value: &Value, key: &str) -> Result<f64> {
    let field = value
        .get(key)
        .ok_or_else(|| Error::Codec(format!("quote response missing '{}'", key)))?;
    match field {
        Value::String(s) => s
            .parse()
            .map_err(|_| Error::Codec(format!("quote response has invalid number in '{}'", key))),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| Error::Codec(format!("quote response has invalid number in '{}'", key))),
        _ => Err(Error::Codec(format!(
            "quote response has invalid number in '{}'",
            key
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::message::{Message, VersionedMessage};
    use solana_sdk::signature::{Keypair, Signer};
    use solana_sdk::system_instruction;

    fn sample_quote_json() -> Value {
        json!({
            "inputMint": "So11111111111111111111111111111111111111112",
            "outputMint": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
            "inAmount": "1000000000",
            "outAmount": "142500000",
            "otherAmountThreshold": "141075000",
            "priceImpactPct": "0.42",
            "routePlan": []
        })
    }

    #[test]
    fn test_parse_quote_string_amounts() {
        let quote = parse_quote(sample_quote_json(), 100).unwrap();
        assert_eq!(quote.in_amount, 1_000_000_000);
        assert_eq!(quote.out_amount, 142_500_000);
        assert_eq!(quote.min_out_amount, 141_075_000);
        assert_eq!(quote.price_impact_pct, 0.42);
        assert_eq!(quote.slippage_bps, 100);
        // The raw response rides along for the swap request
        assert!(quote.route.get("routePlan").is_some());
    }

    #[test]
    fn test_parse_quote_numeric_price_impact() {
        let mut value = sample_quote_json();
        value["priceImpactPct"] = json!(1.75);
        let quote = parse_quote(value, 50).unwrap();
        assert_eq!(quote.price_impact_pct, 1.75);
    }

    #[test]
    fn test_parse_quote_missing_field() {
        let mut value = sample_quote_json();
        value.as_object_mut().unwrap().remove("outAmount");
        assert!(matches!(
            parse_quote(value, 50).unwrap_err(),
            Error::Codec(_)
        ));
    }

    #[test]
    fn test_swap_request_body_shape() {
        let quote = parse_quote(sample_quote_json(), 100).unwrap();
        let user = Pubkey::new_unique();
        let body = swap_request_body(&quote, &user, 300);

        assert_eq!(body["userPublicKey"], user.to_string());
        assert_eq!(body["slippageBps"], 300);
        assert_eq!(body["wrapAndUnwrapSol"], true);
        assert_eq!(body["quoteResponse"]["inAmount"], "1000000000");
    }

    #[test]
    fn test_decode_swap_transaction_round_trip() {
        let payer = Keypair::new();
        let instruction =
            system_instruction::transfer(&payer.pubkey(), &Pubkey::new_unique(), 1);
        let message = Message::new(&[instruction], Some(&payer.pubkey()));
        let transaction = VersionedTransaction {
            signatures: vec![Default::default()],
            message: VersionedMessage::Legacy(message),
        };

        let encoded = STANDARD.encode(bincode::serialize(&transaction).unwrap());
        let decoded = decode_swap_transaction(&encoded).unwrap();
        assert_eq!(decoded.message, transaction.message);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_swap_transaction("not base64!!").is_err());
        let encoded = STANDARD.encode(b"valid base64, invalid transaction");
        assert!(matches!(
            decode_swap_transaction(&encoded).unwrap_err(),
            Error::Codec(_)
        ));
    }
}
