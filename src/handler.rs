use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use tokio::sync::mpsc::UnboundedSender;
use crate::app::{App, FocusPane};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent, tx: &UnboundedSender<AppEvent>) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key, tx),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
        AppEvent::Reply(result) => app.on_reply(result),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent, tx: &UnboundedSender<AppEvent>) {
    // Global keys that work in any mode
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') | KeyCode::Char('q') => {
                app.should_quit = true;
                return;
            }
            KeyCode::Char('o') => {
                app.toggle_panel();
                return;
            }
            KeyCode::Char('k') if app.panel_open => {
                app.open_credential_input();
                return;
            }
            _ => {}
        }
    }

    if !app.panel_open {
        if key.code == KeyCode::Enter {
            app.toggle_panel();
        }
        return;
    }

    match app.focus {
        FocusPane::Input => handle_input_key(app, key, tx),
        FocusPane::Credential => handle_credential_key(app, key),
    }
}

fn handle_input_key(app: &mut App, key: KeyEvent, tx: &UnboundedSender<AppEvent>) {
    match key.code {
        KeyCode::Esc => {
            app.toggle_panel();
        }
        KeyCode::Tab if app.show_credential_input => {
            app.focus = FocusPane::Credential;
        }
        // Shift+Enter (or Alt+Enter where the terminal can't report Shift) adds a newline
        KeyCode::Enter if key.modifiers.intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) => {
            insert_char(&mut app.input, &mut app.input_cursor, '\n');
        }
        KeyCode::Enter => {
            if let Some(request) = app.submit_input() {
                app.dispatch(request, tx.clone());
            }
        }
        KeyCode::F(n @ 1..=9) => {
            if let Some(request) = app.use_suggestion(usize::from(n - 1)) {
                app.dispatch(request, tx.clone());
            }
        }
        KeyCode::Backspace => {
            if app.input_cursor > 0 {
                app.input_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.input.chars().count();
            if app.input_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.input_cursor = app.input_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.input_cursor = (app.input_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.input_cursor = 0;
        }
        KeyCode::End => {
            app.input_cursor = app.input.chars().count();
        }
        KeyCode::Up => app.scroll_chat_up(1),
        KeyCode::Down => app.scroll_chat_down(1),
        KeyCode::PageUp => app.scroll_chat_up(app.chat_height.max(2) / 2),
        KeyCode::PageDown => app.scroll_chat_down(app.chat_height.max(2) / 2),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            insert_char(&mut app.input, &mut app.input_cursor, c);
        }
        _ => {}
    }
}

fn handle_credential_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Tab => {
            app.close_credential_input();
        }
        KeyCode::Enter => {
            app.save_credential();
        }
        KeyCode::Backspace => {
            if app.credential_cursor > 0 {
                app.credential_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.credential_input, app.credential_cursor);
                app.credential_input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.credential_cursor = app.credential_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.credential_input.chars().count();
            app.credential_cursor = (app.credential_cursor + 1).min(char_count);
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            insert_char(&mut app.credential_input, &mut app.credential_cursor, c);
        }
        _ => {}
    }
}

fn insert_char(buffer: &mut String, cursor: &mut usize, c: char) {
    let byte_pos = char_to_byte_index(buffer, *cursor);
    buffer.insert(byte_pos, c);
    *cursor += 1;
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_chat = app
        .chat_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);
    if !in_chat {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_chat_down(3),
        MouseEventKind::ScrollUp => app.scroll_chat_up(3),
        _ => {}
    }
}
