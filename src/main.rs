//! Return Risk Pipeline - Main Entry Point
//!
//! Consumes orders from NATS, scores and explains their return risk, and
//! answers with an assessment. Orders are processed in parallel.

use anyhow::Result;
use futures::StreamExt;
use return_risk_pipeline::{
    config::{AppConfig, LoggingConfig},
    consumer::{decode_order, OrderConsumer},
    metrics::{MetricsReporter, PipelineMetrics},
    producer::AssessmentProducer,
    schema::CATEGORY_FIELD,
    service::ReturnRiskService,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(format!("return_risk_pipeline={}", logging.level))
    })?;

    if logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };

    init_logging(&config.logging)?;

    info!("Starting Return Risk Pipeline");
    info!(
        "Discount tiers: >{:.0}% -> {}%, >{:.0}% -> {}%",
        config.mitigation.high_risk_percent,
        config.mitigation.high_risk_discount,
        config.mitigation.very_high_risk_percent,
        config.mitigation.very_high_risk_discount
    );

    // Initialize metrics
    let metrics = Arc::new(PipelineMetrics::new());

    // Nothing is served until every artifact has loaded
    let service = Arc::new(ReturnRiskService::load(&config)?);
    info!(
        "Return risk service initialized ({} features, baseline {:.3})",
        service.encoder().feature_count(),
        service.expected_value()
    );

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    // Initialize consumer and producer
    let consumer = OrderConsumer::new(client.clone(), &config.nats.order_subject);
    let producer = Arc::new(AssessmentProducer::new(
        client.clone(),
        &config.nats.assessment_subject,
    ));

    // Parallel processing configuration
    let num_workers = config.pipeline.workers.max(1);
    info!(
        "Starting order processing loop with {} parallel workers",
        num_workers
    );
    info!("Listening on subject: {}", consumer.subject());
    info!("Publishing assessments to: {}", producer.subject());

    // Semaphore to limit concurrent processing
    let semaphore = Arc::new(Semaphore::new(num_workers));
    let processed_count = Arc::new(AtomicU64::new(0));

    // Start metrics reporter
    let reporter = MetricsReporter::new(metrics.clone(), config.pipeline.metrics_interval_secs);
    tokio::spawn(reporter.start());

    // Process orders in parallel
    let mut subscription = consumer.subscribe().await?;

    while let Some(message) = subscription.next().await {
        // Acquire permit (limits concurrent tasks)
        let permit = semaphore.clone().acquire_owned().await?;

        let service = service.clone();
        let producer = producer.clone();
        let metrics = metrics.clone();
        let processed_count = processed_count.clone();

        tokio::spawn(async move {
            let start_time = Instant::now();
            let reply_to = message.reply.clone();

            let scored = decode_order(&message)
                .and_then(|order| service.assess(&order).map_err(anyhow::Error::from));

            match scored {
                Ok(assessment) => {
                    let processing_time = start_time.elapsed();
                    let known_category = service
                        .encoder()
                        .schema()
                        .is_known(CATEGORY_FIELD, &assessment.product_category);
                    metrics.record_assessment(
                        processing_time,
                        known_category.then_some(assessment.product_category.as_str()),
                        assessment.return_probability,
                        assessment.is_predicted_return(),
                        assessment.explanation_degraded,
                    );

                    if producer.deliver(reply_to, &assessment).await.is_ok() {
                        debug!(
                            order_id = ?assessment.order_id,
                            return_probability = assessment.return_probability,
                            prediction = assessment.prediction.as_str(),
                            processing_time_us = processing_time.as_micros(),
                            "Order assessed"
                        );
                    }

                    let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;

                    // Log progress every 100 orders
                    if count % 100 == 0 {
                        let throughput = metrics.get_throughput();
                        let processing_stats = metrics.get_processing_stats();
                        info!(
                            processed = count,
                            throughput = format!("{:.1} orders/s", throughput),
                            avg_latency_us = processing_stats.mean_us,
                            "Processing milestone"
                        );
                    }
                }
                Err(e) => {
                    metrics.record_rejection();
                    warn!(error = %format!("{:#}", e), "Order rejected");

                    if let Some(reply_to) = reply_to {
                        if let Err(e) = producer.reply_error(reply_to, &format!("{:#}", e)).await {
                            warn!(error = %e, "Failed to send error reply");
                        }
                    }
                }
            }

            // Release permit when done
            drop(permit);
        });
    }

    // Print final summary
    info!("Pipeline shutting down...");
    metrics.print_summary();

    Ok(())
}
