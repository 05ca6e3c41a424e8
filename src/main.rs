/// Campus Report portal server
use campus_report::{config::PortalConfig, context::AppContext, error::PortalResult, server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> PortalResult<()> {
    // Load configuration first so the log format can be chosen
    let config = PortalConfig::from_env()?;

    let filter = tracing_subscriber::EnvFilter::try_new(&config.logging.level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    print_banner();

    let ctx = AppContext::new(config).await?;

    server::serve(ctx).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
   ______                                 ____                        __
  / ____/___ _____ ___  ____  __  _______/ __ \___  ____  ____  _____/ /_
 / /   / __ `/ __ `__ \/ __ \/ / / / ___/ /_/ / _ \/ __ \/ __ \/ ___/ __/
/ /___/ /_/ / / / / / / /_/ / /_/ (__  ) _, _/  __/ /_/ / /_/ / /  / /_
\____/\__,_/_/ /_/ /_/ .___/\__,_/____/_/ |_|\___/ .___/\____/_/   \__/
                    /_/                         /_/

        University Issue Reporting Portal v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
