use dotenv::dotenv;
use vault_indexer::{Engine, IndexerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::init();

    let mut config = IndexerConfig::from_env();
    if let Some(vault_dir) = std::env::args().nth(1) {
        config.vault_dir = vault_dir.into();
    }
    log::info!("vault-indexer v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Config: {:?}", config);

    let engine = Engine::start(config)?;
    let mut states = engine.subscribe();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("Shutdown requested");
                break;
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *states.borrow_and_update();
                log::debug!("[INDEX] State: {:?}", state);
                if state == vault_indexer::IndexState::Stopped {
                    break;
                }
            }
        }
    }

    if let Ok(counts) = engine.reader().counts() {
        log::info!(
            "[INDEX] {} files, {} links, {} blocks, {} block instances",
            counts.files,
            counts.links,
            counts.blocks,
            counts.block_instances
        );
    }
    engine.shutdown().await?;
    Ok(())
}
