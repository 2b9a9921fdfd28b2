use anyhow::Context;
use clap::{Parser, Subcommand};
use stalk::server::ServiceServer;
use stalk::{credentials, service};
use stalk_engine::auth::Authenticator;
use stalk_engine::config::{ConfigLoader, StalkConfig};
use stalk_engine::deadline::CancelHandle;
use stalk_engine::fetcher::Fetcher;
use stalk_engine::protocol::{ServiceOperation, ServiceRequest};
use stalk_engine::session::BrowserSession;
use stalk_engine::site::SiteProfile;
use stalk_h::{HeadlessSession, LaunchOptions};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "stalk",
    version,
    about = "Fetch accepted submissions and contest history of a LeetCode user"
)]
struct Args {
    #[command(subcommand)]
    mode: Mode,

    /// Configuration file (defaults to ./stalk.yaml, then ~/.stalk/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Launch browser in visible mode (not headless)
    #[arg(long, global = true)]
    visible: bool,
}

#[derive(Subcommand)]
enum Mode {
    /// Serve get_user_submissions requests over WebSocket
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,
        /// WebSocket port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Fetch one user's data and print the response as JSON
    Fetch {
        /// Profile handle
        handle: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the JSON output of `fetch`.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ConfigLoader::load_from(path).await,
        None => ConfigLoader::load_default().await,
    }
    .context("Failed to load configuration")?;
    if args.visible {
        config.browser.visible = true;
    }

    let fetcher = build_fetcher(&config).await?;

    let result = match args.mode {
        Mode::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            serve(fetcher.clone(), host, port).await
        }
        Mode::Fetch { handle } => {
            let cancel = CancelHandle::new();
            let response = service::handle_request(
                &fetcher,
                ServiceRequest {
                    id: None,
                    operation: ServiceOperation::GetUserSubmissions {
                        user_handle: handle,
                    },
                },
                &cancel,
            )
            .await;
            println!("{}", serde_json::to_string_pretty(&response)?);
            if response.is_ok() {
                Ok(())
            } else {
                Err(anyhow::anyhow!("Fetch failed"))
            }
        }
    };

    if let Err(e) = fetcher.shutdown().await {
        warn!("Failed to close browser: {}", e);
    }
    result
}

async fn build_fetcher(config: &StalkConfig) -> anyhow::Result<Fetcher> {
    let credentials = credentials::from_env()?;
    let site = SiteProfile::new(&config.site.base_url)?;

    let mut session = HeadlessSession::new(LaunchOptions {
        visible: config.browser.visible,
        executable: config.browser.executable.as_ref().map(PathBuf::from),
    });
    session
        .launch()
        .await
        .context("Failed to launch browser")?;

    Ok(Fetcher::new(
        Box::new(session),
        Authenticator::new(credentials, config.auth_config()),
        site,
        config.fetch_config(),
    ))
}

async fn serve(fetcher: Fetcher, host: String, port: u16) -> anyhow::Result<()> {
    let server = ServiceServer::new(host, port, Arc::new(fetcher));
    let handle = server
        .start()
        .await
        .context("Failed to start WebSocket server")?;
    info!("Ready on ws://{}", handle.local_addr);

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    handle.shutdown();
    Ok(())
}
