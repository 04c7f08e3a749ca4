//! Order data structures for return risk scoring

use crate::error::InputError;
use crate::schema::{
    AGE_GROUP_FIELD, CATEGORY_FIELD, DELIVERY_DAYS_FIELD, PAST_RETURNS_FIELD, RATING_FIELD,
    REGION_FIELD, SIZE_FIELD,
};
use serde::{Deserialize, Serialize};

/// Lowest accepted product rating.
pub const MIN_RATING: f64 = 1.0;
/// Highest accepted product rating.
pub const MAX_RATING: f64 = 5.0;

/// A retail order to be scored for return risk.
///
/// Field aliases accept the column names used by the training data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// Caller-supplied order identifier
    #[serde(default, alias = "Order_ID", alias = "Product_ID")]
    pub order_id: Option<String>,

    /// Product category (e.g. Shirts, Shoes, Laptops)
    #[serde(alias = "Product_Category")]
    pub product_category: String,

    /// Product size (S, M, L)
    #[serde(alias = "Product_Size")]
    pub product_size: String,

    /// Customer region (North, South, East, West)
    #[serde(alias = "Customer_Region")]
    pub customer_region: String,

    /// Customer age bucket (e.g. 26-35)
    #[serde(alias = "Customer_Age_Group")]
    pub customer_age_group: String,

    /// Number of items this customer returned before
    #[serde(alias = "Past_Return_Count")]
    pub past_return_count: i64,

    /// Product rating on a 1-5 scale
    #[serde(alias = "Product_Rating")]
    pub product_rating: f64,

    /// Delivery time in days
    #[serde(alias = "Delivery_Time_Days")]
    pub delivery_time_days: i64,
}

impl OrderRecord {
    /// Create an order with the given categorical attributes and neutral numerics.
    pub fn new(
        product_category: &str,
        product_size: &str,
        customer_region: &str,
        customer_age_group: &str,
    ) -> Self {
        Self {
            order_id: None,
            product_category: product_category.to_string(),
            product_size: product_size.to_string(),
            customer_region: customer_region.to_string(),
            customer_age_group: customer_age_group.to_string(),
            past_return_count: 0,
            product_rating: 4.0,
            delivery_time_days: 3,
        }
    }

    /// Set the numeric attributes.
    pub fn with_history(
        mut self,
        past_return_count: i64,
        product_rating: f64,
        delivery_time_days: i64,
    ) -> Self {
        self.past_return_count = past_return_count;
        self.product_rating = product_rating;
        self.delivery_time_days = delivery_time_days;
        self
    }

    /// Attach an order identifier.
    pub fn with_order_id(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }

    /// Check every field against its declared domain.
    ///
    /// Rating bounds are inclusive; a rating of exactly 5.0 or a one-day
    /// delivery is valid.
    pub fn validate(&self) -> Result<(), InputError> {
        for (field, value) in self.categorical_values() {
            if value.trim().is_empty() {
                return Err(InputError::MissingField(field));
            }
        }
        if !self.product_rating.is_finite()
            || self.product_rating < MIN_RATING
            || self.product_rating > MAX_RATING
        {
            return Err(InputError::InvalidRating(self.product_rating));
        }
        if self.past_return_count < 0 {
            return Err(InputError::NegativeReturnCount(self.past_return_count));
        }
        if self.delivery_time_days < 1 {
            return Err(InputError::InvalidDeliveryTime(self.delivery_time_days));
        }
        Ok(())
    }

    /// Categorical fields keyed by their training column prefix.
    pub fn categorical_values(&self) -> [(&'static str, &str); 4] {
        [
            (CATEGORY_FIELD, self.product_category.as_str()),
            (SIZE_FIELD, self.product_size.as_str()),
            (REGION_FIELD, self.customer_region.as_str()),
            (AGE_GROUP_FIELD, self.customer_age_group.as_str()),
        ]
    }

    /// Numeric fields keyed by their training column name.
    pub fn numeric_values(&self) -> [(&'static str, f64); 3] {
        [
            (PAST_RETURNS_FIELD, self.past_return_count as f64),
            (RATING_FIELD, self.product_rating),
            (DELIVERY_DAYS_FIELD, self.delivery_time_days as f64),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_deserializes_training_names() {
        let json = r#"{
            "Product_Category": "Shirts",
            "Product_Size": "M",
            "Customer_Region": "South",
            "Customer_Age_Group": "26-35",
            "Past_Return_Count": 2,
            "Product_Rating": 4.2,
            "Delivery_Time_Days": 3
        }"#;

        let order: OrderRecord = serde_json::from_str(json).unwrap();

        assert_eq!(order.product_category, "Shirts");
        assert_eq!(order.customer_age_group, "26-35");
        assert_eq!(order.past_return_count, 2);
        assert_eq!(order.order_id, None);
    }

    #[test]
    fn test_order_serialization() {
        let order = OrderRecord::new("Shoes", "L", "East", "18-25")
            .with_history(1, 2.5, 7)
            .with_order_id("ord_1");

        let json = serde_json::to_string(&order).unwrap();
        let deserialized: OrderRecord = serde_json::from_str(&json).unwrap();

        assert_eq!(order, deserialized);
    }

    #[test]
    fn test_boundary_values_are_valid() {
        let order = OrderRecord::new("Shirts", "M", "South", "26-35").with_history(0, 5.0, 1);
        assert!(order.validate().is_ok());

        let order = order.with_history(0, 1.0, 1);
        assert!(order.validate().is_ok());
    }

    #[test]
    fn test_out_of_domain_values_rejected() {
        let base = OrderRecord::new("Shirts", "M", "South", "26-35");

        assert_eq!(
            base.clone().with_history(0, 5.1, 3).validate(),
            Err(InputError::InvalidRating(5.1))
        );
        assert_eq!(
            base.clone().with_history(-1, 4.0, 3).validate(),
            Err(InputError::NegativeReturnCount(-1))
        );
        assert_eq!(
            base.clone().with_history(0, 4.0, 0).validate(),
            Err(InputError::InvalidDeliveryTime(0))
        );
        assert!(base.with_history(0, f64::NAN, 3).validate().is_err());
    }

    #[test]
    fn test_empty_category_rejected() {
        let order = OrderRecord::new("Shirts", "", "South", "26-35");
        assert_eq!(
            order.validate(),
            Err(InputError::MissingField("Product_Size"))
        );
    }
}
