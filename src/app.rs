use ratatui::layout::Rect;
use tokio::sync::mpsc::UnboundedSender;
use cv_chat_core::{
    CompletionError, CompletionRequest, Conversation, CredentialStore, FeedItem, NoticeKind,
    OpenAIClient, SendOutcome,
};

use crate::tui::AppEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Input,
    Credential,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub panel_open: bool,
    pub focus: FocusPane,

    // Message input (may contain newlines)
    pub input: String,
    pub input_cursor: usize, // cursor position in input, in chars

    // Suggestion shortcuts, hidden for good once anything is sent
    pub suggestions: Vec<String>,
    pub suggestions_visible: bool,

    // API key entry
    pub show_credential_input: bool,
    pub credential_input: String,
    pub credential_cursor: usize,

    // Chat scroll state
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub follow_latest: bool,
    pub chat_area: Option<Rect>,
    seen_feed_len: usize,
    seen_busy: bool,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Data
    pub conversation: Conversation,
    pub credentials: CredentialStore,
    pub client: OpenAIClient,
}

impl App {
    pub fn new(
        conversation: Conversation,
        credentials: CredentialStore,
        client: OpenAIClient,
        suggestions: Vec<String>,
    ) -> Self {
        let show_credential_input = !conversation.has_credential();

        Self {
            should_quit: false,
            panel_open: true,
            focus: FocusPane::Input,

            input: String::new(),
            input_cursor: 0,

            suggestions_visible: !suggestions.is_empty(),
            suggestions,

            show_credential_input,
            credential_input: String::new(),
            credential_cursor: 0,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            follow_latest: true,
            chat_area: None,
            seen_feed_len: 0,
            seen_busy: false,

            animation_frame: 0,

            conversation,
            credentials,
            client,
        }
    }

    pub fn toggle_panel(&mut self) {
        self.panel_open = !self.panel_open;
        if self.panel_open {
            self.focus = FocusPane::Input;
        }
    }

    /// Send whatever is in the input box. Returns the request to dispatch
    /// when a turn actually started.
    pub fn submit_input(&mut self) -> Option<CompletionRequest> {
        match self.conversation.request_send(&self.input) {
            SendOutcome::Ignored => None,
            SendOutcome::NeedsCredential => {
                self.clear_input();
                self.suggestions_visible = false;
                self.open_credential_input();
                None
            }
            SendOutcome::Dispatched(request) => {
                self.clear_input();
                self.suggestions_visible = false;
                Some(request)
            }
        }
    }

    /// Fill the input with a canned question and send it.
    pub fn use_suggestion(&mut self, index: usize) -> Option<CompletionRequest> {
        if !self.suggestions_visible {
            return None;
        }
        let question = self.suggestions.get(index)?.clone();

        self.input_cursor = question.chars().count();
        self.input = question;
        let request = self.submit_input();
        self.suggestions_visible = false;
        request
    }

    /// Run the request in the background; the result comes back as `AppEvent::Reply`.
    pub fn dispatch(&self, request: CompletionRequest, tx: UnboundedSender<AppEvent>) {
        let client = self.client.clone();
        tokio::spawn(async move {
            let result = client.complete(&request).await;
            let _ = tx.send(AppEvent::Reply(result));
        });
    }

    pub fn on_reply(&mut self, result: Result<Option<String>, CompletionError>) {
        self.conversation.finish(result);
        if self.panel_open && !self.show_credential_input {
            self.focus = FocusPane::Input;
        }
    }

    pub fn open_credential_input(&mut self) {
        self.show_credential_input = true;
        self.focus = FocusPane::Credential;
    }

    /// Hide the key entry. It stays up while no key is configured.
    pub fn close_credential_input(&mut self) {
        if self.conversation.has_credential() {
            self.show_credential_input = false;
        }
        self.credential_input.clear();
        self.credential_cursor = 0;
        self.focus = FocusPane::Input;
    }

    pub fn save_credential(&mut self) {
        match self.conversation.save_credential(&self.credentials, &self.credential_input) {
            Ok(true) => {
                self.show_credential_input = false;
                self.credential_input.clear();
                self.credential_cursor = 0;
                self.focus = FocusPane::Input;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::error!(error = %e, "failed to save API key");
                self.conversation.notify(NoticeKind::Error, format!("❌ Could not save API key: {}", e));
            }
        }
    }

    pub fn can_send(&self) -> bool {
        !self.conversation.is_busy()
    }

    fn clear_input(&mut self) {
        self.input.clear();
        self.input_cursor = 0;
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.conversation.is_busy() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Re-follow the newest entry whenever the feed or the typing indicator changed
    pub fn sync_follow(&mut self) {
        let feed_len = self.conversation.feed().len();
        let busy = self.conversation.is_busy();
        if feed_len != self.seen_feed_len || busy != self.seen_busy {
            self.follow_latest = true;
            self.seen_feed_len = feed_len;
            self.seen_busy = busy;
        }
    }

    pub fn scroll_chat_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow_latest = false;
    }

    pub fn scroll_chat_down(&mut self, lines: u16) {
        let max_scroll = self.chat_total_lines().saturating_sub(self.visible_chat_height());
        self.chat_scroll = (self.chat_scroll.saturating_add(lines)).min(max_scroll);
        self.follow_latest = self.chat_scroll >= max_scroll;
    }

    /// Scroll chat to bottom so the newest entry (or "Thinking...") is visible
    pub fn scroll_chat_to_bottom(&mut self) {
        let total_lines = self.chat_total_lines();
        let visible_height = self.visible_chat_height();

        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }

    fn visible_chat_height(&self) -> u16 {
        if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        }
    }

    fn chat_total_lines(&self) -> u16 {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for item in self.conversation.feed() {
            let content = match item {
                FeedItem::Message(msg) => {
                    total_lines += 1; // Role line ("You:" or "AI:")
                    msg.content.as_str()
                }
                FeedItem::Notice(notice) => notice.text.as_str(),
            };
            for line in content.lines() {
                // Use character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                total_lines = total_lines.saturating_add((char_count / wrap_width + 1) as u16);
            }
            total_lines = total_lines.saturating_add(1); // Blank line after entry
        }

        if self.conversation.is_busy() {
            total_lines = total_lines.saturating_add(2); // "AI:" + "Thinking..."
        }

        total_lines
    }
}
