use toolbridge::{
    AppResult,
    cli::{Cli, Commands},
    config::Config,
    init_logging,
    session::SessionManager,
};

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse_args();

    // Load configuration
    let config = Config::load_or_default(&cli.config_file);

    // Initialize logging
    let _log_guard = init_logging(&cli.effective_log_level(&config), &config.log.file_path)?;

    tracing::info!("Toolbridge starting...");
    tracing::debug!("CLI arguments: {:?}", cli);

    if let Commands::Config { action } = cli.command() {
        Config::handle_command(&action, &cli.config_file)?;
        return Ok(());
    }

    // Create session manager
    let mut session_manager = SessionManager::new(&cli, config)?;
    session_manager.display_welcome(&cli)?;

    if cli.is_dry_run_mode() {
        tracing::info!("Dry-run mode completed");
        return Ok(());
    }

    // Run console session
    session_manager.run().await?;

    Ok(())
}
