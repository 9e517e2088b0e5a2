use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use gpt402::config::Config;
use gpt402::payment::{FacilitatorClient, Paygate, PriceTable, ReplayGuard};
use gpt402::{create_router, llm, tui, utils, AppState};

#[derive(Parser)]
#[command(name = "gpt402", version, about = "Pay-per-message AI chat over spl402")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the paid chat server
    Serve {
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        host: Option<String>,
    },
    /// Chat with a server from the terminal, paying per message
    Chat {
        #[arg(long)]
        api_url: Option<String>,
        #[arg(long)]
        wallet_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::from_env()?;

    match cli.command {
        Command::Serve { port, host } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(host) = host {
                config.server.host = host;
            }
            utils::init_logger()?;
            serve(config).await
        }
        Command::Chat { api_url, wallet_url } => {
            if let Some(api_url) = api_url {
                config.client.api_url = api_url;
            }
            if let Some(wallet_url) = wallet_url {
                config.client.wallet_url = wallet_url;
            }
            let _guard = utils::init_file_logger(Path::new(&config.client.log_file))?;
            tui::run(&config).await
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    info!("Configuration loaded: {:?}", config.server);

    let terms = config.payment.terms()?;
    let facilitator_url = config
        .payment
        .facilitator_url
        .as_deref()
        .context("FACILITATOR_URL must be set")?;
    let verifier = FacilitatorClient::try_from(facilitator_url)?;
    info!("Verifying payments via {}", verifier.verify_url());

    let pricing = Arc::new(PriceTable::with_defaults(config.payment.price_per_message));
    for (method, path, price) in pricing.entries() {
        info!("{} {} costs {} SPL402", method, path, price);
    }

    let llm = llm::from_config(&config.llm);
    if llm.is_none() {
        warn!("OPENAI_API_KEY is not set; /api/chat will answer with a configuration error");
    }

    let paygate = Arc::new(Paygate::new(
        Arc::clone(&pricing),
        terms,
        Arc::new(ReplayGuard::new(verifier)),
    ));

    let state = AppState {
        config: config.clone(),
        llm,
        pricing,
        terms,
    };
    let app = create_router(state, paygate);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(
        "Server listening on {}, payments to {} on {}",
        addr, terms.recipient, terms.network
    );

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
