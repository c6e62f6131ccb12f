// olivia-assistant/src/main.rs

#[cfg(feature = "cli")]
use olivia_assistant::{config::Config, run_server};
#[cfg(feature = "cli")]
use dotenvy::dotenv;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let cfg = Config::from_env()?;
    run_server(cfg).await
}

#[cfg(not(feature = "cli"))]
fn main() {
    println!("CLI feature not enabled. Enable with --features cli");
}
