mod cli;
mod recipe;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = cli::parse();
    initialise_tracing();

    let chain = match &cli.chain {
        Some(path) => recipe::ChainRecipe::load(path)
            .and_then(recipe::ChainRecipe::into_chain)
            .with_context(|| format!("failed to load chain recipe at {}", path.display()))?,
        None => cli::chain_from_specs(&cli.effects),
    };

    tracing::debug!(
        image = %cli.image.display(),
        effects = chain.len(),
        "starting viewer"
    );

    let config = renderer::ViewerConfig {
        image_path: cli.image,
        chain,
        window_size: cli.size.unwrap_or((1280, 720)),
        target_fps: cli.fps,
    };
    renderer::run(config)
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
