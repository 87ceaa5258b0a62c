mod bootstrap;
mod scenario;

use anyhow::{Context, Result};
use guard_core::settings::Settings;
use guard_ui::boundary::BoundaryConfig;

use crate::scenario::{Replayer, Scenario};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("learnhub-guard v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Check interval: {}s, sign-in: {}, dev mode: {}",
        settings.check_interval_secs,
        settings.sign_in_path,
        settings.dev_mode
    );

    let monitor_config = settings.monitor_config()?;
    for pattern in monitor_config.guard.patterns() {
        tracing::debug!(%pattern, "protected route");
    }

    let scenario = Scenario::load(&settings.scenario)
        .with_context(|| format!("loading scenario {}", settings.scenario.display()))?;
    tracing::info!(
        name = scenario.name.as_deref().unwrap_or("<unnamed>"),
        steps = scenario.steps.len(),
        "replaying scenario"
    );

    let mut replayer = Replayer::new(
        monitor_config,
        BoundaryConfig {
            dev_mode: settings.dev_mode,
        },
    )?;

    // Waits inside a scenario can be long; Ctrl+C stops the replay and still
    // prints what happened so far.
    let summary = tokio::select! {
        summary = replayer.run(&scenario) => summary,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C received; stopping replay");
            replayer.summary(scenario.name.clone())
        }
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
