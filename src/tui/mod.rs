//! Terminal User Interface Module
//!
//! Chat client for a gpt402 server. Every message is paid from the
//! configured wallet before the reply comes back.
//!
//! # Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │ [GPT402] Powered by spl402 • 1000 SPL402 / message • Spent: 0   │
//! ├─ Chat ──────────────────────────────────────────────────────────┤
//! │  [Scrollable history, replies rendered from markdown]           │
//! ├─ Message ───────────────────────────────────────────────────────┤
//! │ Ask anything...                                                 │
//! └─────────────────────────────────────────────────────────────────┘
//!  Ready │ [Enter] Send [Ctrl+Q] Quit [F1] Help
//! ```

pub mod app;
pub mod event;
pub mod theme;
pub mod ui;

pub use app::{App, AppEvent, View};
pub use event::{AppAction, EventHandler};

use crate::config::Config;
use crate::payment::{PaymentClient, RemoteWallet, RpcLedger};
use crate::session::ChatClient;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Type alias for our terminal backend
pub type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Initialize the terminal for TUI mode
pub fn init_terminal() -> anyhow::Result<Tui> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore the terminal to its original state
pub fn restore_terminal(terminal: &mut Tui) -> anyhow::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Connect the wallet, then run the chat TUI until the user quits
pub async fn run(config: &Config) -> anyhow::Result<()> {
    let wallet = RemoteWallet::connect(&config.client.wallet_url).await?;
    let ledger = RpcLedger::new(&config.payment.rpc_url);
    let payments = PaymentClient::new(
        &config.client.api_url,
        Arc::new(wallet),
        Arc::new(ledger),
        config.payment.token()?,
    );
    let payer = payments.payer();
    info!("Paying from {} against {}", payer, config.client.api_url);

    let chat = ChatClient::new(Arc::new(payments));

    let mut app = App::new(
        Arc::new(chat),
        config.payment.price_per_message,
        payer.to_string(),
    );

    let mut terminal = init_terminal()?;
    let mut events = EventHandler::new(Duration::from_millis(100));

    let result = run_app(&mut terminal, &mut app, &mut events).await;

    if let Err(e) = restore_terminal(&mut terminal) {
        error!("Failed to restore terminal: {}", e);
    }

    info!("Session spent {} SPL402", app.session.total_spent());
    result
}

/// Main application loop
async fn run_app(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> anyhow::Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(frame, app))?;

        // Replies from background deliveries
        app.poll_events();

        // Ticks arrive every 100ms, so this never blocks for long
        match events.next().await {
            Some(AppAction::Quit) => {
                if app.confirm_quit() {
                    break;
                }
            }
            Some(AppAction::ForceQuit) | None => break,
            Some(action) => app.handle_action(action),
        }
    }

    info!("TUI exited normally");
    Ok(())
}
