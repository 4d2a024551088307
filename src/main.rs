use captain_client::CaptainClient;
use captain_client::ClientConfig;
use captain_client::Result;
use captain_client::ServiceEvent;
use tracing::error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let settings = ClientConfig::load(None)?;

    // Initializing Logs
    let _guard = init_observability();

    let client = CaptainClient::from_config(settings)?;
    client.observe(|c: &CaptainClient, event: &ServiceEvent| match event {
        ServiceEvent::Online(name) | ServiceEvent::Offline(name) => {
            info!(%event, healthy = c.healthy(name), "service state changed")
        }
        ServiceEvent::AllOnline => info!("all watched services online"),
        ServiceEvent::KvUpdated(key) => match c.get_kv(key) {
            Ok(value) => info!(%key, %value, "kv updated"),
            Err(e) => error!(%key, "kv updated but unreadable: {:?}", e),
        },
    });

    client.start().await?;
    info!("Agent started. Waiting for CTRL+C signal...");

    if let Err(e) = client.stop_on_signal().await {
        error!("Failed to wait for shutdown signal: {:?}", e);
        client.stop().await;
    }

    info!("Exiting program.");
    Ok(())
}

pub fn init_observability() -> WorkerGuard {
    let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stdout());
    let base_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(base_subscriber).init();

    guard
}
