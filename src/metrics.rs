//! Performance and reporting metrics for the return risk pipeline.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Bucket for categories outside the training vocabulary.
pub const UNKNOWN_CATEGORY: &str = "unknown";

/// Metrics collector for pipeline performance and return statistics
pub struct PipelineMetrics {
    /// Total orders scored
    pub orders_processed: AtomicU64,
    /// Orders predicted to be returned
    pub predicted_returns: AtomicU64,
    /// Explanations answered with the fallback reasons
    pub explanation_fallbacks: AtomicU64,
    /// Orders rejected before scoring
    pub rejected_orders: AtomicU64,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Return probability distribution buckets
    probability_buckets: RwLock<[u64; 10]>,
    /// Per product category statistics
    categories: RwLock<BTreeMap<String, CategoryStats>>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl PipelineMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            orders_processed: AtomicU64::new(0),
            predicted_returns: AtomicU64::new(0),
            explanation_fallbacks: AtomicU64::new(0),
            rejected_orders: AtomicU64::new(0),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            probability_buckets: RwLock::new([0; 10]),
            categories: RwLock::new(BTreeMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Record a scored order.
    ///
    /// `category` is `None` for categories the model was not trained on;
    /// those share the [`UNKNOWN_CATEGORY`] bucket so the table stays bounded.
    pub fn record_assessment(
        &self,
        processing_time: Duration,
        category: Option<&str>,
        return_probability: f64,
        predicted_return: bool,
        explanation_degraded: bool,
    ) {
        self.orders_processed.fetch_add(1, Ordering::Relaxed);
        if predicted_return {
            self.predicted_returns.fetch_add(1, Ordering::Relaxed);
        }
        if explanation_degraded {
            self.explanation_fallbacks.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only last 10000 for memory efficiency
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }

        let bucket = (return_probability.clamp(0.0, 1.0) * 10.0).min(9.0) as usize;
        if let Ok(mut buckets) = self.probability_buckets.write() {
            buckets[bucket] += 1;
        }

        if let Ok(mut categories) = self.categories.write() {
            let key = category.unwrap_or(UNKNOWN_CATEGORY);
            let stats = categories.entry(key.to_string()).or_default();
            stats.orders += 1;
            stats.probability_sum += return_probability;
            if predicted_return {
                stats.predicted_returns += 1;
            }
        }
    }

    /// Record an order rejected before scoring
    pub fn record_rejection(&self) {
        self.rejected_orders.fetch_add(1, Ordering::Relaxed);
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let mut sorted: Vec<u64> = match self.processing_times.read() {
            Ok(times) if !times.is_empty() => times.clone(),
            _ => return ProcessingStats::default(),
        };
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: sorted[count - 1],
        }
    }

    /// Get current throughput (orders per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.orders_processed.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get return probability distribution
    pub fn get_probability_distribution(&self) -> [u64; 10] {
        self.probability_buckets
            .read()
            .map(|buckets| *buckets)
            .unwrap_or([0; 10])
    }

    /// Get per category statistics
    pub fn get_category_stats(&self) -> BTreeMap<String, CategoryStats> {
        self.categories
            .read()
            .map(|categories| categories.clone())
            .unwrap_or_default()
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let order_count = self.orders_processed.load(Ordering::Relaxed);
        let return_count = self.predicted_returns.load(Ordering::Relaxed);
        let fallback_count = self.explanation_fallbacks.load(Ordering::Relaxed);
        let rejected_count = self.rejected_orders.load(Ordering::Relaxed);
        let return_rate = percentage(return_count, order_count);

        let processing = self.get_processing_stats();
        let throughput = self.get_throughput();
        let distribution = self.get_probability_distribution();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║             RETURN RISK PIPELINE - METRICS SUMMARY           ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Orders Scored:     {:>8}  │  Throughput: {:>6.1} orders/s  ║",
            order_count, throughput
        );
        info!(
            "║ Predicted Returns: {:>8}  │  Return Rate: {:>6.1}%         ║",
            return_count, return_rate
        );
        info!(
            "║ Explanation Fallbacks: {:>6}  │  Rejected Orders: {:>6}    ║",
            fallback_count, rejected_count
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Processing Time (μs): mean={:>5} p50={:>5} p95={:>5} p99={:>5} ║",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Returns by Product Category:                                 ║");
        for (category, stats) in &self.get_category_stats() {
            info!(
                "║   {:10}: {:>6} orders, {:>6} returns, avg prob {:>5.1}%     ║",
                category,
                stats.orders,
                stats.predicted_returns,
                stats.mean_probability() * 100.0
            );
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Return Probability Distribution:                             ║");
        let total: u64 = distribution.iter().sum();
        for (i, &count) in distribution.iter().enumerate() {
            let pct = percentage(count, total);
            let bar_len = (pct / 2.0) as usize;
            let bar: String = "█".repeat(bar_len.min(20));
            info!(
                "║   {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

fn percentage(part: u64, whole: u64) -> f64 {
    if whole > 0 {
        (part as f64 / whole as f64) * 100.0
    } else {
        0.0
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Return statistics for one product category
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryStats {
    pub orders: u64,
    pub predicted_returns: u64,
    pub probability_sum: f64,
}

impl CategoryStats {
    /// Average return probability across the category's orders
    pub fn mean_probability(&self) -> f64 {
        if self.orders == 0 {
            0.0
        } else {
            self.probability_sum / self.orders as f64
        }
    }
}

/// Periodic metrics reporter
pub struct MetricsReporter {
    metrics: Arc<PipelineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // The first tick completes immediately; skip the empty summary.
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
