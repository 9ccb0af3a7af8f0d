//! Replace the stored control catalogue with the built-in ISO 27001:2022
//! Annex A list.

use anyhow::{Context, Result};

use api::AppConfig;
use controls::ControlStore;

fn main() -> Result<()> {
    let config = AppConfig::from_env().context("Invalid configuration")?;
    api::init_tracing(&config.logging);

    let store = ControlStore::new(&config.server.data_dir);
    let report = store
        .seed(&controls::annex_a())
        .with_context(|| format!("Failed to seed controls into {}", store.path().display()))?;

    println!(
        "Removed {} old controls, inserted {} controls into {}",
        report.removed,
        report.inserted,
        store.path().display()
    );
    Ok(())
}
