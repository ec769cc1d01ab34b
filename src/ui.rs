use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use cv_chat_core::{ChatRole, FeedItem, NoticeKind};
use crate::app::{App, FocusPane};

const MAX_INPUT_LINES: u16 = 5;

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            chars.next();

            // Push any accumulated plain text
            if !current_text.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_text)));
            }

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;

            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                spans.push(Span::styled(
                    bold_text,
                    Style::default().add_modifier(Modifier::BOLD),
                ));
            } else {
                // No closing **, treat as literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    if app.panel_open {
        render_chat_panel(app, frame, body_area);
    } else {
        app.chat_area = None;
        render_closed_panel(frame, body_area);
    }

    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let header = Line::from(vec![
        Span::styled(
            " 💬 Ask about Lars ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" {} ", app.conversation.settings().model),
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    frame.render_widget(Paragraph::new(header), area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let hints = if !app.panel_open {
        "Enter/Ctrl+O: open chat | Ctrl+C: quit"
    } else if app.focus == FocusPane::Credential {
        "Enter: save key | Esc/Tab: back to chat | Ctrl+C: quit"
    } else if app.suggestions_visible {
        "Enter: send | Shift+Enter: newline | F1-F3: suggestions | Ctrl+K: API key | Ctrl+O: hide | Ctrl+C: quit"
    } else {
        "Enter: send | Shift+Enter: newline | ↑↓: scroll | Ctrl+K: API key | Ctrl+O: hide | Ctrl+C: quit"
    };

    let footer = Paragraph::new(hints).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(footer, area);
}

fn render_closed_panel(frame: &mut Frame, area: Rect) {
    let text = Text::from(vec![
        Line::default(),
        Line::from(Span::styled(
            "Lars — Full-Stack Software Engineer",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::default(),
        Line::from(Span::styled(
            "Press Enter to chat with an AI assistant about Lars's CV",
            Style::default().fg(Color::DarkGray),
        )),
    ]);

    let landing = Paragraph::new(text)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(landing, area);
}

fn render_chat_panel(app: &mut App, frame: &mut Frame, area: Rect) {
    let input_lines = (app.input.split('\n').count() as u16).clamp(1, MAX_INPUT_LINES);
    let suggestions_height = if app.suggestions_visible { 3 } else { 0 };
    let credential_height = if app.show_credential_input { 3 } else { 0 };

    let [chat_area, suggestions_area, credential_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(suggestions_height),
        Constraint::Length(credential_height),
        Constraint::Length(input_lines + 2),
    ])
    .areas(area);

    // Store chat area for mouse hit-testing and its inner size for scroll calculations
    app.chat_area = Some(chat_area);
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    app.sync_follow();
    if app.follow_latest {
        app.scroll_chat_to_bottom();
    }

    render_messages(app, frame, chat_area);

    if app.suggestions_visible {
        render_suggestions(app, frame, suggestions_area);
    }
    if app.show_credential_input {
        render_credential_input(app, frame, credential_area);
    }
    render_input(app, frame, input_area);
}

fn render_messages(app: &App, frame: &mut Frame, area: Rect) {
    let busy = app.conversation.is_busy();
    let feed = app.conversation.feed();

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Chat ");

    let chat_text = if feed.is_empty() && !busy {
        Text::from(Span::styled(
            "Hi! Ask me anything about Lars's experience, skills, or education.",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for item in feed {
            match item {
                FeedItem::Message(msg) => match msg.role {
                    ChatRole::User => {
                        lines.push(Line::from(Span::styled(
                            "You:",
                            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                        )));
                        for line in msg.content.lines() {
                            lines.push(Line::from(line.to_string()));
                        }
                    }
                    ChatRole::Assistant => {
                        lines.push(Line::from(Span::styled(
                            "AI:",
                            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                        )));
                        // Split response into lines and parse markdown
                        for line in msg.content.lines() {
                            lines.push(parse_markdown_line(line));
                        }
                    }
                    // The biography prompt is never shown
                    ChatRole::System => continue,
                },
                FeedItem::Notice(notice) => {
                    let color = match notice.kind {
                        NoticeKind::Info => Color::Green,
                        NoticeKind::Warning => Color::Yellow,
                        NoticeKind::Error => Color::Red,
                    };
                    for line in notice.text.lines() {
                        lines.push(Line::from(Span::styled(
                            line.to_string(),
                            Style::default().fg(color).add_modifier(Modifier::ITALIC),
                        )));
                    }
                }
            }
            lines.push(Line::default());
        }

        if busy {
            lines.push(Line::from(Span::styled(
                "AI:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_suggestions(app: &App, frame: &mut Frame, area: Rect) {
    let mut spans: Vec<Span> = Vec::new();
    for (i, suggestion) in app.suggestions.iter().enumerate() {
        spans.push(Span::styled(
            format!(" F{} ", i + 1),
            Style::default().fg(Color::Black).bg(Color::Magenta),
        ));
        spans.push(Span::raw(format!(" {}  ", suggestion)));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta))
        .title(" Try asking ");

    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_credential_input(app: &App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Credential;
    let border_color = if focused { Color::Yellow } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" OpenAI API key (Enter to save) ");

    // Mask the key with asterisks, keeping the last four characters visible
    let char_count = app.credential_input.chars().count();
    let display_text = if char_count <= 4 {
        "*".repeat(char_count)
    } else {
        let last_four: String = app.credential_input.chars().skip(char_count - 4).collect();
        format!("{}{}", "*".repeat(char_count - 4), last_four)
    };

    let inner_width = area.width.saturating_sub(2) as usize;
    let scroll_offset = if inner_width > 0 && app.credential_cursor >= inner_width {
        app.credential_cursor - inner_width + 1
    } else {
        0
    };
    let visible: String = display_text.chars().skip(scroll_offset).take(inner_width).collect();

    let input = Paragraph::new(visible)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(input, area);

    if focused {
        let cursor_x = (app.credential_cursor - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Input;
    let can_send = app.can_send();

    let border_color = if !can_send {
        Color::DarkGray
    } else if focused {
        Color::Yellow
    } else {
        Color::Gray
    };
    let title = if can_send {
        " Ask (Enter to send) "
    } else {
        " Waiting for reply... "
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Locate the cursor as (row, column) within the possibly multi-line input
    let before_cursor: String = app.input.chars().take(app.input_cursor).collect();
    let cursor_row = before_cursor.matches('\n').count();
    let cursor_col = before_cursor
        .rsplit('\n')
        .next()
        .map(|line| line.chars().count())
        .unwrap_or(0);

    let inner_width = area.width.saturating_sub(2) as usize;
    let inner_height = area.height.saturating_sub(2) as usize;

    // Scroll offsets to keep the cursor visible
    let col_offset = if inner_width > 0 && cursor_col >= inner_width {
        cursor_col - inner_width + 1
    } else {
        0
    };
    let row_offset = if inner_height > 0 && cursor_row >= inner_height {
        cursor_row - inner_height + 1
    } else {
        0
    };

    let visible_lines: Vec<Line> = app
        .input
        .split('\n')
        .skip(row_offset)
        .take(inner_height)
        .map(|line| Line::from(line.chars().skip(col_offset).take(inner_width).collect::<String>()))
        .collect();

    // Use cyan text to match the "You:" style - visible in both light and dark terminals
    let input = Paragraph::new(Text::from(visible_lines))
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, area);

    if focused {
        let cursor_x = (cursor_col - col_offset) as u16;
        let cursor_y = (cursor_row - row_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + cursor_y + 1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::test_app;
    use ratatui::{backend::TestBackend, Terminal};

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let width = buffer.area.width as usize;
        let mut out = String::new();
        for (i, cell) in buffer.content.iter().enumerate() {
            out.push_str(cell.symbol());
            if (i + 1) % width == 0 {
                out.push('\n');
            }
        }
        out
    }

    #[test]
    fn test_markdown_bold() {
        let line = parse_markdown_line("Worked at **TechCorp GmbH** since 2022");
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[1].content, "TechCorp GmbH");
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_markdown_unclosed_bold_is_literal() {
        let line = parse_markdown_line("a **b");
        assert_eq!(line.spans.len(), 1);
        assert_eq!(line.spans[0].content, "a **b");
    }

    #[test]
    fn test_render_typing_indicator_and_reply() {
        let (_dir, mut app) = test_app(Some("sk-test"));
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();

        app.input = "What companies has Lars worked at?".to_string();
        app.submit_input();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();
        let screen = screen_text(&terminal);
        assert!(screen.contains("Thinking."));
        assert!(screen.contains("Waiting for reply..."));

        app.on_reply(Ok(Some("TechCorp GmbH, StartupXYZ, WebAgency Berlin".to_string())));
        terminal.draw(|frame| render(&mut app, frame)).unwrap();
        let screen = screen_text(&terminal);
        assert!(!screen.contains("Thinking"));
        assert!(screen.contains("TechCorp GmbH, StartupXYZ, WebAgency Berlin"));
        assert!(screen.contains("Ask (Enter to send)"));
    }

    #[test]
    fn test_render_masks_api_key() {
        let (_dir, mut app) = test_app(None);
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();

        app.open_credential_input();
        app.credential_input = "sk-secret-1234".to_string();
        app.credential_cursor = 14;
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let screen = screen_text(&terminal);
        assert!(!screen.contains("sk-secret"));
        assert!(screen.contains("**********1234"));
    }

    #[test]
    fn test_render_closed_panel() {
        let (_dir, mut app) = test_app(Some("sk-test"));
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();

        app.toggle_panel();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        assert!(screen_text(&terminal).contains("Press Enter to chat"));
        assert!(app.chat_area.is_none());
    }
}
