use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use idempotent_consumer::PgDedupStore;
use inbound_event_service::config::Config;
use inbound_event_service::consumers::{create_consumer, DeliveryHandler, ExhaustedDeliveryLog};
use inbound_event_service::services::publisher::create_producer;
use inbound_event_service::{
    metrics, EventProcessor, HttpDownstreamGateway, InboundEventsConsumer, KafkaOutboundPublisher,
};
use resilience::RetryExecutor;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,inbound_event_service=debug".into());
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("🔧 Starting inbound-event-service");

    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        "✅ Configuration loaded: inbound_topic={}, outbound_topic={}, http_port={}",
        config.kafka.inbound_topic, config.kafka.outbound_topic, config.app.http_port
    );

    let pg_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    let store = PgDedupStore::new(pg_pool);
    store
        .migrate()
        .await
        .context("Failed to run dedup store migrations")?;
    info!("✅ Dedup store ready");

    let gateway = HttpDownstreamGateway::from_config(&config.thirdparty)?;

    let producer = create_producer(&config.kafka).context("Failed to create Kafka producer")?;
    let publisher = KafkaOutboundPublisher::new(
        producer,
        config.kafka.outbound_topic.clone(),
        config.kafka.delivery_timeout,
    );

    let processor = EventProcessor::new(Arc::new(store), Arc::new(gateway), Arc::new(publisher));
    let retry = RetryExecutor::new(config.retry.to_retry_config(), ExhaustedDeliveryLog);
    let handler = DeliveryHandler::new(processor, retry);

    let kafka_consumer = create_consumer(&config.kafka).context("Failed to create Kafka consumer")?;
    let consumer =
        InboundEventsConsumer::new(kafka_consumer, handler, config.kafka.event_id_header.clone());

    let http_addr = format!("0.0.0.0:{}", config.app.http_port);
    let http_server = HttpServer::new(|| {
        App::new()
            .route("/health", web::get().to(|| async { "OK" }))
            .route("/metrics", web::get().to(metrics::serve_metrics))
    })
    .bind(&http_addr)
    .context("Failed to bind HTTP server")?
    .run();

    let mut join_set = JoinSet::new();

    join_set.spawn(async move {
        http_server
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))
    });
    info!("✅ HTTP server started on http://{}", http_addr);

    join_set.spawn(async move {
        consumer.run().await;
        Ok(())
    });
    info!("✅ Inbound events consumer started");

    join_set.spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        Ok(())
    });

    // The first task to finish ends the service
    let result = match join_set.join_next().await {
        Some(Ok(Ok(()))) | None => Ok(()),
        Some(Ok(Err(e))) => {
            tracing::error!("Task failed: {:#}", e);
            Err(e)
        }
        Some(Err(e)) => {
            tracing::error!("Task panicked: {:#}", e);
            Err(anyhow::anyhow!("Task panicked: {}", e))
        }
    };

    join_set.shutdown().await;
    info!("🛑 inbound-event-service shutting down");
    result
}
