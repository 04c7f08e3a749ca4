//! Test Order Producer
//!
//! Generates and publishes test orders to NATS for pipeline testing.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Order structure matching the pipeline's expected format
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Order {
    order_id: String,
    product_category: String,
    product_size: String,
    customer_region: String,
    customer_age_group: String,
    past_return_count: i64,
    product_rating: f64,
    delivery_time_days: i64,
}

const CATEGORIES: &[&str] = &["Shirts", "Shoes", "Laptops"];
const SIZES: &[&str] = &["S", "M", "L"];
const REGIONS: &[&str] = &["North", "South", "East", "West"];
const AGE_GROUPS: &[&str] = &["18-25", "26-35", "36-45", "46-60"];

/// Order generator for testing
struct OrderGenerator {
    rng: rand::rngs::ThreadRng,
    order_counter: u64,
}

impl OrderGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            order_counter: 0,
        }
    }

    fn next_id(&mut self) -> String {
        self.order_counter += 1;
        format!("ord_{:010}", self.order_counter)
    }

    /// Generate an ordinary order
    fn generate_typical(&mut self) -> Order {
        Order {
            order_id: self.next_id(),
            product_category: self.random_choice(CATEGORIES).to_string(),
            product_size: self.random_choice(SIZES).to_string(),
            customer_region: self.random_choice(REGIONS).to_string(),
            customer_age_group: self.random_choice(AGE_GROUPS).to_string(),
            past_return_count: self.rng.gen_range(0..3),
            product_rating: round_rating(self.rng.gen_range(3.5..=5.0)),
            delivery_time_days: self.rng.gen_range(1..5),
        }
    }

    /// Generate an order with a heavy return history and poor rating
    fn generate_risky(&mut self) -> Order {
        Order {
            order_id: self.next_id(),
            product_category: self.random_choice(&["Shoes", "Shirts"]).to_string(), // Size sensitive
            product_size: self.random_choice(&["S", "L"]).to_string(),
            customer_region: self.random_choice(REGIONS).to_string(),
            customer_age_group: self.random_choice(&["18-25", "26-35"]).to_string(),
            past_return_count: self.rng.gen_range(3..10),
            product_rating: round_rating(self.rng.gen_range(1.0..3.0)),
            delivery_time_days: self.rng.gen_range(6..15), // Slow delivery
        }
    }

    /// Occasionally replace the region with one the model has never seen
    fn maybe_unseen_region(&mut self, mut order: Order, rate: f64) -> Order {
        if self.rng.gen_bool(rate) {
            order.customer_region = "Central".to_string();
        }
        order
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

fn round_rating(rating: f64) -> f64 {
    (rating * 10.0).round() / 10.0
}

/// Share of risky orders, defaulting to 0.3. Must lie in [0, 1].
fn parse_rate(arg: Option<&str>) -> anyhow::Result<f64> {
    let Some(arg) = arg else {
        return Ok(0.3);
    };
    let rate: f64 = arg
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid risky rate {:?}: {}", arg, e))?;
    if !(0.0..=1.0).contains(&rate) {
        anyhow::bail!("risky rate must be between 0 and 1, got {}", rate);
    }
    Ok(rate)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_producer=info".parse()?),
        )
        .init();

    info!("Starting Test Order Producer");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("orders.returns");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
    let risky_rate = parse_rate(args.get(4).map(|s| s.as_str()))?;
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(100);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        risky_rate = risky_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    // Connect to NATS
    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(count, risky_rate, delay_ms).await;
        }
    };

    let mut generator = OrderGenerator::new();
    let mut rng = rand::thread_rng();

    info!("Starting to publish {} orders...", count);

    let mut typical_count = 0;
    let mut risky_count = 0;

    for i in 0..count {
        let order = if rng.gen_bool(risky_rate) {
            risky_count += 1;
            generator.generate_risky()
        } else {
            typical_count += 1;
            generator.generate_typical()
        };
        let order = generator.maybe_unseen_region(order, 0.02);

        let payload = serde_json::to_vec(&order)?;

        client.publish(subject.to_string(), payload.into()).await?;

        if (i + 1) % 10 == 0 {
            info!(
                "Published {}/{} orders ({} typical, {} risky)",
                i + 1,
                count,
                typical_count,
                risky_count
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!(
        "Completed! Published {} orders ({} typical, {} risky)",
        count, typical_count, risky_count
    );

    Ok(())
}

async fn run_dry_mode(count: u64, risky_rate: f64, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = OrderGenerator::new();
    let mut rng = rand::thread_rng();

    for i in 0..count {
        let order = if rng.gen_bool(risky_rate) {
            generator.generate_risky()
        } else {
            generator.generate_typical()
        };

        let json = serde_json::to_string_pretty(&order)?;

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample order {}:\n{}", i + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
