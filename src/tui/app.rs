//! Application State
//!
//! Contains the main application state and logic for the chat TUI.

use crate::models::ChatResponse;
use crate::payment::{Paid, PaymentResult};
use crate::session::{ChatSession, ChatTransport, SessionError};
use crate::tui::event::AppAction;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};
use tui_textarea::TextArea;

const PLACEHOLDER: &str = "Ask anything. Each message is paid in SPL402...";

/// Current view/screen
#[derive(Debug, Clone, PartialEq, Default)]
pub enum View {
    #[default]
    Chat,
    Help,
}

/// Events from background deliveries
#[derive(Debug)]
pub enum AppEvent {
    /// The pending message finished, paid or not
    Delivered(PaymentResult<Paid<ChatResponse>>),
}

/// Main application state
pub struct App {
    // UI State
    pub view: View,
    pub should_quit: bool,
    pub notice: Option<String>,
    pub tick: u64,

    // Chat State
    pub session: ChatSession,
    pub input: TextArea<'static>,
    pub scroll_offset: u16,
    pub max_scroll: u16,
    /// Keep the newest message in view
    pub follow: bool,

    // Payment display
    pub price_per_message: u64,
    pub wallet: String,

    transport: Arc<dyn ChatTransport>,

    // Async communication
    event_rx: mpsc::Receiver<AppEvent>,
    event_tx: mpsc::Sender<AppEvent>,

    quit_requested: bool,
}

impl App {
    pub fn new(transport: Arc<dyn ChatTransport>, price_per_message: u64, wallet: String) -> Self {
        let (event_tx, event_rx) = mpsc::channel(16);

        Self {
            view: View::Chat,
            should_quit: false,
            notice: None,
            tick: 0,
            session: ChatSession::new(),
            input: Self::empty_input(),
            scroll_offset: 0,
            max_scroll: 0,
            follow: true,
            price_per_message,
            wallet,
            transport,
            event_rx,
            event_tx,
            quit_requested: false,
        }
    }

    fn empty_input() -> TextArea<'static> {
        let mut input = TextArea::default();
        input.set_cursor_line_style(ratatui::style::Style::default());
        input.set_placeholder_text(PLACEHOLDER);
        input
    }

    /// Quitting with a payment in flight needs a second Ctrl+Q
    pub fn confirm_quit(&mut self) -> bool {
        if !self.session.is_sending() || self.quit_requested {
            return true;
        }
        self.quit_requested = true;
        self.notice = Some("A paid message is still in flight. Press Ctrl+Q again to quit.".into());
        false
    }

    /// Poll for async events
    pub fn poll_events(&mut self) {
        while let Ok(event) = self.event_rx.try_recv() {
            self.handle_event(event);
        }
    }

    fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Delivered(result) => {
                if let Ok(paid) = &result {
                    match &paid.receipt {
                        Some(receipt) => info!("Paid {} SPL402 ({})", receipt.amount, receipt.signature),
                        None => debug!("Reply arrived without payment"),
                    }
                }
                self.session.complete(result);
                self.quit_requested = false;
                self.scroll_to_bottom();
            }
        }
    }

    /// Handle a user action
    pub fn handle_action(&mut self, action: AppAction) {
        match action {
            AppAction::Quit | AppAction::ForceQuit => {
                self.should_quit = true;
            }
            AppAction::Submit => {
                if self.view == View::Chat {
                    self.submit_message();
                }
            }
            AppAction::ToggleHelp => {
                self.view = match self.view {
                    View::Help => View::Chat,
                    View::Chat => View::Help,
                };
            }
            AppAction::Escape => {
                self.view = View::Chat;
                self.notice = None;
            }
            AppAction::ScrollUp => {
                self.follow = false;
                self.scroll_offset = self.scroll_offset.saturating_sub(1);
            }
            AppAction::ScrollDown => {
                self.scroll_offset = (self.scroll_offset + 1).min(self.max_scroll);
                self.follow = self.scroll_offset == self.max_scroll;
            }
            AppAction::ScrollPageUp => {
                self.follow = false;
                self.scroll_offset = self.scroll_offset.saturating_sub(10);
            }
            AppAction::ScrollPageDown => {
                self.scroll_offset = (self.scroll_offset + 10).min(self.max_scroll);
                self.follow = self.scroll_offset == self.max_scroll;
            }
            AppAction::Input(key) => {
                if self.view == View::Chat {
                    self.input.input(key);
                }
            }
            AppAction::Tick => {
                self.tick = self.tick.wrapping_add(1);
            }
        }
    }

    /// Submit the current message
    fn submit_message(&mut self) {
        let content = self.input.lines().join("\n");

        let pending = match self.session.begin(&content) {
            Ok(pending) => pending,
            Err(SessionError::Empty) => return,
            Err(SessionError::Busy) => {
                self.notice = Some("Wait for the current reply before sending again.".into());
                return;
            }
        };

        self.input = Self::empty_input();
        self.notice = None;

        let transport = Arc::clone(&self.transport);
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = pending.deliver(transport.as_ref()).await;
            tx.send(AppEvent::Delivered(result)).await.ok();
        });

        self.scroll_to_bottom();
    }

    fn scroll_to_bottom(&mut self) {
        self.follow = true;
        self.scroll_offset = self.max_scroll;
    }

    /// Update max scroll based on content
    pub fn update_scroll_bounds(&mut self, content_height: u16, viewport_height: u16) {
        self.max_scroll = content_height.saturating_sub(viewport_height);
        if self.follow || self.scroll_offset > self.max_scroll {
            self.scroll_offset = self.max_scroll;
        }
    }
}
