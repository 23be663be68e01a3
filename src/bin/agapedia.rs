use agapedia::cli;
use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; the environment and flags still apply.
    let _ = dotenvy::dotenv();

    let action = cli::start()?;

    action.execute().await?;

    Ok(())
}
