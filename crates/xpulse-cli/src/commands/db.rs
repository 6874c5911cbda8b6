use clap::Subcommand;
use xpulse_core::AppConfig;

#[derive(Debug, Subcommand)]
pub(crate) enum DbCommands {
    /// Apply pending migrations
    Migrate,
    /// Check that the database answers
    Ping,
}

pub(crate) async fn run_db_migrate(config: &AppConfig) -> anyhow::Result<()> {
    let pool = xpulse_db::connect_pool_from_config(config).await?;
    let applied = xpulse_db::run_migrations(&pool).await?;
    println!("migrations applied: {applied}");
    Ok(())
}

pub(crate) async fn run_db_ping(config: &AppConfig) -> anyhow::Result<()> {
    let pool = xpulse_db::connect_pool_from_config(config).await?;
    xpulse_db::ping(&pool).await?;
    println!("database ok");
    Ok(())
}
