use agent_memory_context::{
    config, memory::build_remote_store, CanonicalMessage, ManagerSettings, MemoryStoreClient,
};
use tracing::info;

const SAMPLE_MEMORY: &str = "I like apples but not bananas";

/// Seeds one sample USER message into the configured remote store.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let settings = ManagerSettings::from_env();
    let memory_id = config::load(&settings.config_path)?;

    // An in-process store would drop the sample on exit
    let store = build_remote_store(&settings)?;

    let actor_id = settings.default_actor_id.as_str();
    let session_id = settings.default_session_id.as_str();

    info!(
        memory_id = %memory_id,
        actor_id,
        session_id,
        "Seeding sample memory"
    );

    store
        .create_event(
            &memory_id,
            actor_id,
            session_id,
            &[CanonicalMessage::user(SAMPLE_MEMORY)],
        )
        .await?;

    println!("Stored sample memory: \"{}\"", SAMPLE_MEMORY);
    println!("  memory_id:  {}", memory_id);
    println!("  actor_id:   {}", actor_id);
    println!("  session_id: {}", session_id);

    Ok(())
}
