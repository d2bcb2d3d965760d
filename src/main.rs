use color_peripheral::domain::settings::SettingsService;
use color_peripheral::infrastructure::logging;
use color_peripheral::presentation::console;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings_service = SettingsService::new()?;
    let settings = settings_service.get();

    let _logging_guard = logging::init_logger(&settings.log_settings)
        .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
        .ok();

    tracing::info!("Starting Color Peripheral");
    if let Some(path) = settings_service.path() {
        tracing::debug!("Settings path: {}", path.display());
    }

    console::run(settings).await
}
