//! NATS message consumer for incoming orders

use crate::types::order::OrderRecord;
use anyhow::{Context, Result};
use async_nats::{Client, Message, Subscriber};
use tracing::info;

/// Consumer for receiving orders to score from NATS
pub struct OrderConsumer {
    client: Client,
    subject: String,
}

impl OrderConsumer {
    /// Create a new order consumer
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Subscribe to the order subject
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = self
            .client
            .subscribe(self.subject.clone())
            .await
            .with_context(|| format!("Failed to subscribe to {}", self.subject))?;
        info!(subject = %self.subject, "Subscribed to order subject");
        Ok(subscriber)
    }

    /// Get the subject name
    pub fn subject(&self) -> &str {
        &self.subject
    }
}

/// Decode an order from a message payload.
pub fn decode_order(message: &Message) -> Result<OrderRecord> {
    parse_order(&message.payload)
}

/// Decode an order from raw JSON bytes.
pub fn parse_order(payload: &[u8]) -> Result<OrderRecord> {
    serde_json::from_slice(payload).context("Malformed order payload")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_order_with_training_names() {
        let payload = br#"{
            "Product_Category": "Shirts",
            "Product_Size": "M",
            "Customer_Region": "South",
            "Customer_Age_Group": "26-35",
            "Past_Return_Count": 2,
            "Product_Rating": 4.2,
            "Delivery_Time_Days": 3
        }"#;

        let order = parse_order(payload).unwrap();
        assert_eq!(order.product_category, "Shirts");
        assert_eq!(order.past_return_count, 2);
        assert_eq!(order.order_id, None);
    }

    #[test]
    fn test_parse_order_missing_field() {
        let payload = br#"{"product_category": "Shirts"}"#;
        let err = parse_order(payload).err().unwrap();
        assert!(format!("{:#}", err).contains("Malformed order payload"));
    }
}
