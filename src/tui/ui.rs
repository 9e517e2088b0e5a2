//! UI Rendering
//!
//! Main UI layout and rendering logic for the TUI.

use crate::markdown::{self, MarkdownElement};
use crate::tui::app::{App, View};
use crate::tui::theme::{Icons, Theme};
use crate::types::Role;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::Modifier,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

/// Render the main UI
pub fn render(frame: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(10),   // Messages
            Constraint::Length(4), // Input
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    render_header(frame, chunks[0], app);
    render_messages(frame, chunks[1], app);
    render_input(frame, chunks[2], app);
    render_status_bar(frame, chunks[3], app);

    if app.view == View::Help {
        render_help(frame);
    }
}

/// Brand, price and running spend
fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let title = Line::from(vec![
        Span::styled("[GPT402]", Theme::title()),
        Span::styled(" Powered by spl402", Theme::text_secondary()),
        Span::styled(format!("  {}  ", Icons::DOT), Theme::text_dim()),
        Span::styled(
            format!("{} SPL402 / message", app.price_per_message),
            Theme::text(),
        ),
        Span::styled(format!("  {}  ", Icons::DOT), Theme::text_dim()),
        Span::styled(
            format!("Spent: {} SPL402", app.session.total_spent()),
            Theme::spend(),
        ),
        Span::styled(format!("  {}  ", Icons::DOT), Theme::text_dim()),
        Span::styled(short_address(&app.wallet), Theme::text_secondary()),
    ]);

    let header = Paragraph::new(title).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Theme::border()),
    );

    frame.render_widget(header, area);
}

fn short_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 12 {
        return address.to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}…{}", head, tail)
}

/// Render the message history
fn render_messages(frame: &mut Frame, area: Rect, app: &mut App) {
    let block = Block::default()
        .title(" Chat ")
        .borders(Borders::ALL)
        .border_style(if app.view == View::Chat {
            Theme::border_focused()
        } else {
            Theme::border()
        });

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let lines = message_lines(app);
    app.update_scroll_bounds(wrapped_height(&lines, inner.width), inner.height);

    let paragraph = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((app.scroll_offset, 0));
    frame.render_widget(paragraph, inner);
}

fn message_lines(app: &App) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    if app.session.messages().is_empty() && !app.session.is_sending() {
        lines.push(Line::from(Span::styled(
            format!(
                "Each message costs {} SPL402, paid from your wallet when you press Enter.",
                app.price_per_message
            ),
            Theme::text_dim(),
        )));
        return lines;
    }

    for msg in app.session.messages() {
        let (label, style) = match msg.role {
            Role::User => ("You", Theme::user_message()),
            Role::Assistant => ("GPT402", Theme::assistant_message()),
            Role::System => ("System", Theme::system_message()),
        };
        lines.push(Line::from(Span::styled(format!("{}:", label), style)));

        let body = match msg.role {
            Role::Assistant => markdown_lines(&msg.content),
            Role::User => plain_lines(&msg.content, Theme::text()),
            Role::System => plain_lines(&msg.content, Theme::error()),
        };
        lines.extend(body.into_iter().map(indent));
        lines.push(Line::from(""));
    }

    if app.session.is_sending() {
        lines.push(Line::from(vec![
            Span::styled("GPT402: ", Theme::assistant_message()),
            Span::styled(Icons::spinner(app.tick), Theme::active()),
            Span::styled(" paying and thinking", Theme::text_dim()),
        ]));
    }

    lines
}

fn indent(line: Line<'static>) -> Line<'static> {
    let mut spans = vec![Span::raw("  ")];
    spans.extend(line.spans);
    Line::from(spans)
}

fn plain_lines(text: &str, style: ratatui::style::Style) -> Vec<Line<'static>> {
    text.lines()
        .map(|l| Line::from(Span::styled(l.to_string(), style)))
        .collect()
}

/// Assistant replies as styled terminal lines
pub fn markdown_lines(text: &str) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();

    for element in markdown::render(text) {
        match element {
            MarkdownElement::Text(t) => current.push(Span::styled(t, Theme::text())),
            MarkdownElement::LineBreak => lines.push(Line::from(std::mem::take(&mut current))),
            MarkdownElement::Heading { level, text } => {
                if !current.is_empty() {
                    lines.push(Line::from(std::mem::take(&mut current)));
                }
                let style = if level == 1 {
                    Theme::heading().add_modifier(Modifier::UNDERLINED)
                } else {
                    Theme::heading()
                };
                current.push(Span::styled(text, style));
            }
            MarkdownElement::Bold(t) => {
                current.push(Span::styled(t, Theme::text().add_modifier(Modifier::BOLD)))
            }
            MarkdownElement::Link { text, href } => {
                current.push(Span::styled(text, Theme::link()));
                current.push(Span::styled(format!(" ({})", href), Theme::text_dim()));
            }
            MarkdownElement::InlineCode(code) => current.push(Span::styled(code, Theme::code())),
            MarkdownElement::CodeBlock { language, code } => {
                if !current.is_empty() {
                    lines.push(Line::from(std::mem::take(&mut current)));
                }
                if let Some(language) = language {
                    lines.push(Line::from(Span::styled(format!("[{}]", language), Theme::text_dim())));
                }
                for code_line in code.lines() {
                    lines.push(Line::from(Span::styled(format!("  {}", code_line), Theme::code())));
                }
            }
        }
    }

    if !current.is_empty() {
        lines.push(Line::from(current));
    }
    lines
}

/// Rows the lines take once wrapped to `width`
fn wrapped_height(lines: &[Line<'_>], width: u16) -> u16 {
    let width = width.max(1) as usize;
    let rows: usize = lines.iter().map(|l| l.width().max(1).div_ceil(width)).sum();
    u16::try_from(rows).unwrap_or(u16::MAX)
}

/// Render the input area
fn render_input(frame: &mut Frame, area: Rect, app: &App) {
    let is_focused = app.view == View::Chat && !app.session.is_sending();

    let block = Block::default()
        .title(" Message ")
        .borders(Borders::ALL)
        .border_style(if is_focused {
            Theme::border_focused()
        } else {
            Theme::border()
        });

    let inner = block.inner(area);
    frame.render_widget(block, area);
    frame.render_widget(&app.input, inner);
}

/// Render the status bar
fn render_status_bar(frame: &mut Frame, area: Rect, app: &App) {
    let status = if let Some(notice) = &app.notice {
        Span::styled(notice.clone(), Theme::warning())
    } else if app.session.is_sending() {
        Span::styled(
            format!("{} Sending payment...", Icons::spinner(app.tick)),
            Theme::active(),
        )
    } else {
        Span::styled("Ready", Theme::text_secondary())
    };

    let shortcuts = vec![
        Span::styled(" [Enter]", Theme::shortcut_key()),
        Span::styled(" Send ", Theme::shortcut_desc()),
        Span::styled("[Ctrl+Q]", Theme::shortcut_key()),
        Span::styled(" Quit ", Theme::shortcut_desc()),
        Span::styled("[F1]", Theme::shortcut_key()),
        Span::styled(" Help", Theme::shortcut_desc()),
    ];

    let line = Line::from(
        std::iter::once(status)
            .chain(std::iter::once(Span::raw(" │ ")))
            .chain(shortcuts)
            .collect::<Vec<_>>(),
    );

    frame.render_widget(Paragraph::new(line), area);
}

/// Render the help modal
fn render_help(frame: &mut Frame) {
    let area = centered_rect(60, 60, frame.area());
    frame.render_widget(Clear, area);

    let shortcut = |key: &'static str, desc: &'static str| {
        Line::from(vec![
            Span::styled(key, Theme::shortcut_key()),
            Span::styled(desc, Theme::text()),
        ])
    };

    let help_lines = vec![
        Line::from(Span::styled("Keyboard Shortcuts", Theme::heading())),
        Line::from(""),
        shortcut("Enter        ", "Pay and send message"),
        shortcut("Alt+Enter    ", "New line"),
        shortcut("Ctrl+Q       ", "Quit application"),
        shortcut("Ctrl+C       ", "Force quit"),
        shortcut("↑/↓          ", "Scroll messages"),
        shortcut("PageUp/Down  ", "Scroll page"),
        shortcut("Esc          ", "Close modal / clear notice"),
        shortcut("F1 / Ctrl+H  ", "Toggle this help"),
        Line::from(""),
        Line::from(Span::styled(
            "Every sent message transfers the listed price in SPL402.",
            Theme::text_dim(),
        )),
    ];

    let paragraph = Paragraph::new(help_lines).block(
        Block::default()
            .title(" Help ")
            .borders(Borders::ALL)
            .border_style(Theme::border_focused()),
    );

    frame.render_widget(paragraph, area);
}

/// Helper to create a centered rect
pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatRequest, ChatResponse};
    use crate::payment::{Paid, PaymentResult};
    use crate::session::ChatTransport;
    use async_trait::async_trait;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;
    use std::sync::Arc;

    struct Unused;

    #[async_trait]
    impl ChatTransport for Unused {
        async fn send_chat(&self, _: &ChatRequest) -> PaymentResult<Paid<ChatResponse>> {
            unreachable!("no message is sent while rendering")
        }
    }

    fn line_text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_markdown_lines_layout() {
        let lines = markdown_lines("# Title\nsome **bold** and `code`\n```sh\nls\npwd\n```");
        let text: Vec<String> = lines.iter().map(line_text).collect();
        assert_eq!(text, vec!["Title", "some bold and code", "[sh]", "  ls", "  pwd"]);

        let bold = &lines[1].spans[1];
        assert!(bold.style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_markdown_link_keeps_target() {
        let lines = markdown_lines("read [docs](https://spl402.org)");
        assert_eq!(line_text(&lines[0]), "read docs (https://spl402.org)");
    }

    #[test]
    fn test_wrapped_height() {
        let lines = vec![Line::from("x".repeat(25)), Line::from("")];
        assert_eq!(wrapped_height(&lines, 10), 4);
    }

    #[test]
    fn test_short_address() {
        assert_eq!(short_address("abc"), "abc");
        assert_eq!(
            short_address("5xot9PVkphiX2adznghwrAuxGs2zeWisNSxMW6hU6Hkj"),
            "5xot…6Hkj"
        );
    }

    #[test]
    fn test_render_header_shows_price_and_spend() {
        let mut app = App::new(Arc::new(Unused), 1000, "Wa11et".into());
        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
        terminal.draw(|frame| render(frame, &mut app)).unwrap();

        let screen: String = terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(screen.contains("[GPT402]"));
        assert!(screen.contains("1000 SPL402 / message"));
        assert!(screen.contains("Spent: 0 SPL402"));
    }
}
