use anyhow::Context;
use clap::Parser;
use sales_xcheck::config::DEFAULT_DB_PATH;
use sales_xcheck::seed::seed_sample_database;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "seed_db")]
#[command(about = "Create the sample SQLite data source")]
struct Args {
    /// Where to create the database
    #[arg(long, env = "SALES_DB", default_value = DEFAULT_DB_PATH)]
    db: PathBuf,

    /// Replace an existing file
    #[arg(long)]
    force: bool,
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    if args.db.exists() {
        if !args.force {
            anyhow::bail!("{} already exists (use --force to replace it)", args.db.display());
        }
        std::fs::remove_file(&args.db)
            .with_context(|| format!("Failed to remove {}", args.db.display()))?;
    }

    seed_sample_database(&args.db)
        .map_err(|e| anyhow::anyhow!("Failed to seed {}: {}", args.db.display(), e))?;
    println!("Created sample database: {}", args.db.display());
    Ok(())
}
