use agent_memory_context::{api::start_server, ManagerSettings, MemoryContextManager};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let api_port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    info!("🚀 Memory Context Manager - API Server");
    info!("📍 Port: {}", api_port);

    let settings = ManagerSettings::from_env();
    info!("📄 Config: {}", settings.config_path.display());

    let manager = match MemoryContextManager::from_settings(settings) {
        Ok(manager) => Arc::new(manager),
        Err(e) => {
            error!("Failed to initialize memory manager: {}", e);
            eprintln!("📌 Set MEMORY_CONFIG_PATH to a JSON file containing {{\"memory_id\": \"...\"}}");
            return Err(e.into());
        }
    };

    info!("✅ Memory manager initialized (memory_id: {})", manager.memory_id());
    info!("📡 Starting API server...");

    start_server(manager, api_port).await?;

    Ok(())
}
