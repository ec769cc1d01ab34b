//! The conversation controller.
//!
//! A `Conversation` owns the transcript and the session state (credential and
//! busy flag) and drives one request cycle at a time:
//!
//! 1. [`Conversation::request_send`] checks preconditions, records the user turn
//!    and hands back the [`CompletionRequest`] to dispatch.
//! 2. The caller runs the request however it likes (inline `await`, spawned task).
//! 3. [`Conversation::finish`] takes the result and turns it into either an
//!    assistant turn or a notice.
//!
//! While a request is outstanding every further send is dropped.

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::ai::{CompletionError, CompletionRequest, OpenAIClient};
use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::state::{ChatMessage, ChatRole, Transcript};

pub const MISSING_CREDENTIAL_NOTICE: &str =
    "⚠️ Please enter your OpenAI API key to enable the AI assistant.";
pub const CREDENTIAL_SAVED_NOTICE: &str = "API key saved! Ask me anything about Lars's CV 🎉";
pub const NETWORK_ERROR_NOTICE: &str =
    "❌ Network error. Please check your connection and try again.";
pub const NO_REPLY_NOTICE: &str = "🤔 No reply received. Try rephrasing your question.";

/// Model parameters sent with every request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub max_history: Option<usize>,
}

impl CompletionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.model().to_string(),
            max_tokens: config.max_tokens(),
            temperature: config.temperature(),
            max_history: config.max_history,
        }
    }
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self::from_config(&Config::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    /// Passed through by a send refused for lack of a credential. The
    /// controller is back in `Idle` as soon as `request_send` returns.
    AwaitingCredential,
    InFlight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Warning,
    Error,
}

/// Feedback shown in the message list that is not part of the transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

impl Notice {
    fn new(kind: NoticeKind, text: impl Into<String>) -> Self {
        Self { kind, text: text.into() }
    }
}

/// One visible line of the conversation, in display order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedItem {
    Message(ChatMessage),
    Notice(Notice),
}

#[derive(Debug, Clone)]
pub enum SendOutcome {
    /// Blank input, or a request is already in flight. Nothing changed.
    Ignored,
    /// No credential is configured; a warning was shown instead of sending.
    NeedsCredential,
    /// The user turn was recorded and this request should be dispatched.
    Dispatched(CompletionRequest),
}

impl SendOutcome {
    /// The state the controller entered to produce this outcome
    pub fn state(&self) -> ControllerState {
        match self {
            SendOutcome::Ignored => ControllerState::Idle,
            SendOutcome::NeedsCredential => ControllerState::AwaitingCredential,
            SendOutcome::Dispatched(_) => ControllerState::InFlight,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Session {
    credential: Option<String>,
    busy: bool,
}

pub struct Conversation {
    transcript: Transcript,
    session: Session,
    feed: Vec<FeedItem>,
    settings: CompletionSettings,
}

impl Conversation {
    pub fn new(
        system_prompt: impl Into<String>,
        credential: Option<String>,
        settings: CompletionSettings,
    ) -> Self {
        Self {
            transcript: Transcript::new(system_prompt),
            session: Session {
                credential: credential.filter(|c| !c.trim().is_empty()),
                ..Session::default()
            },
            feed: Vec::new(),
            settings,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn feed(&self) -> &[FeedItem] {
        &self.feed
    }

    pub fn settings(&self) -> &CompletionSettings {
        &self.settings
    }

    pub fn is_busy(&self) -> bool {
        self.session.busy
    }

    pub fn has_credential(&self) -> bool {
        self.session.credential.is_some()
    }

    pub fn state(&self) -> ControllerState {
        if self.session.busy {
            ControllerState::InFlight
        } else {
            ControllerState::Idle
        }
    }

    /// Start a turn. See [`SendOutcome`] for what each result means.
    pub fn request_send(&mut self, input: &str) -> SendOutcome {
        let text = input.trim();
        if text.is_empty() || self.session.busy {
            debug!(busy = self.session.busy, "send ignored");
            return SendOutcome::Ignored;
        }

        let Some(api_key) = self.session.credential.clone() else {
            info!("send attempted without a credential");
            self.notify(NoticeKind::Warning, MISSING_CREDENTIAL_NOTICE);
            return SendOutcome::NeedsCredential;
        };

        self.transcript.append(ChatRole::User, text);
        self.feed.push(FeedItem::Message(ChatMessage::new(ChatRole::User, text)));
        self.session.busy = true;

        let request = CompletionRequest {
            api_key,
            model: self.settings.model.clone(),
            messages: self.transcript.window(self.settings.max_history),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };
        debug!(turns = self.transcript.len(), "request dispatched");

        SendOutcome::Dispatched(request)
    }

    /// Complete the outstanding turn with the result of the request.
    pub fn finish(&mut self, result: Result<Option<String>, CompletionError>) {
        if !self.session.busy {
            warn!("completion result arrived with no request in flight, dropping it");
            return;
        }
        self.session.busy = false;

        match result {
            Ok(Some(reply)) => {
                self.transcript.append(ChatRole::Assistant, reply.as_str());
                self.feed.push(FeedItem::Message(ChatMessage::new(ChatRole::Assistant, reply)));
            }
            Ok(None) => {
                warn!("completion succeeded without reply text");
                self.notify(NoticeKind::Info, NO_REPLY_NOTICE);
            }
            Err(CompletionError::Malformed(reason)) => {
                warn!(%reason, "could not parse completion response");
                self.notify(NoticeKind::Info, NO_REPLY_NOTICE);
            }
            Err(err @ CompletionError::Rejected { .. }) => {
                self.notify(NoticeKind::Error, format!("❌ {}", err));
            }
            Err(CompletionError::Transport(reason)) => {
                warn!(%reason, "completion request failed");
                self.notify(NoticeKind::Error, NETWORK_ERROR_NOTICE);
            }
        }
    }

    /// Run a whole turn inline, awaiting the request.
    pub async fn send(&mut self, input: &str, client: &OpenAIClient) -> SendOutcome {
        let outcome = self.request_send(input);
        if let SendOutcome::Dispatched(request) = &outcome {
            let result = client.complete(request).await;
            self.finish(result);
        }
        outcome
    }

    /// Persist a new credential and start using it. Returns `false` when the
    /// input was blank and nothing changed.
    pub fn save_credential(&mut self, store: &CredentialStore, raw: &str) -> Result<bool> {
        match store.set(raw)? {
            Some(key) => {
                self.session.credential = Some(key);
                self.notify(NoticeKind::Info, CREDENTIAL_SAVED_NOTICE);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Show a notice without touching the transcript
    pub fn notify(&mut self, kind: NoticeKind, text: impl Into<String>) {
        self.feed.push(FeedItem::Notice(Notice::new(kind, text)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUESTION: &str = "What companies has Lars worked at?";
    const ANSWER: &str = "TechCorp GmbH, StartupXYZ, WebAgency Berlin";

    fn conversation(credential: Option<&str>) -> Conversation {
        Conversation::new("bio", credential.map(String::from), CompletionSettings::default())
    }

    fn notices(conversation: &Conversation) -> Vec<&Notice> {
        conversation
            .feed()
            .iter()
            .filter_map(|item| match item {
                FeedItem::Notice(n) => Some(n),
                FeedItem::Message(_) => None,
            })
            .collect()
    }

    fn assistant_turns(conversation: &Conversation) -> usize {
        conversation
            .transcript()
            .messages()
            .iter()
            .filter(|m| m.role == ChatRole::Assistant)
            .count()
    }

    #[test]
    fn test_missing_credential_warns_every_attempt() {
        let mut convo = conversation(None);

        for attempt in 1..=3 {
            let outcome = convo.request_send(QUESTION);
            assert!(matches!(outcome, SendOutcome::NeedsCredential));
            assert_eq!(outcome.state(), ControllerState::AwaitingCredential);
            assert_eq!(convo.transcript().len(), 1);
            assert_eq!(notices(&convo).len(), attempt);
            assert_eq!(convo.state(), ControllerState::Idle);
            assert!(!convo.is_busy());
        }

        assert!(notices(&convo)
            .iter()
            .all(|n| n.kind == NoticeKind::Warning && n.text == MISSING_CREDENTIAL_NOTICE));
    }

    #[test]
    fn test_blank_input_is_ignored() {
        let mut convo = conversation(Some("sk-test"));
        assert!(matches!(convo.request_send("   \n"), SendOutcome::Ignored));
        assert_eq!(convo.transcript().len(), 1);
        assert!(convo.feed().is_empty());
    }

    #[test]
    fn test_successful_turn() {
        let mut convo = conversation(Some("sk-test"));

        let SendOutcome::Dispatched(request) = convo.request_send(QUESTION) else {
            panic!("expected a dispatched request");
        };
        assert!(convo.is_busy());
        assert_eq!(convo.state(), ControllerState::InFlight);
        assert_eq!(convo.transcript().len(), 2);
        assert_eq!(request.api_key, "sk-test");
        assert_eq!(request.model, "gpt-4o-mini");
        assert_eq!(request.max_tokens, 300);
        assert_eq!(request.messages, convo.transcript().to_sendable());

        convo.finish(Ok(Some(ANSWER.to_string())));

        assert!(!convo.is_busy());
        assert_eq!(convo.state(), ControllerState::Idle);
        assert_eq!(
            convo.transcript().messages()[1..],
            [
                ChatMessage::new(ChatRole::User, QUESTION),
                ChatMessage::new(ChatRole::Assistant, ANSWER),
            ]
        );
        assert!(notices(&convo).is_empty());
    }

    #[test]
    fn test_send_while_in_flight_is_dropped() {
        let mut convo = conversation(Some("sk-test"));
        assert!(matches!(convo.request_send(QUESTION), SendOutcome::Dispatched(_)));

        let feed_before = convo.feed().to_vec();
        assert!(matches!(convo.request_send("Another question"), SendOutcome::Ignored));
        assert!(matches!(convo.request_send(QUESTION), SendOutcome::Ignored));

        assert_eq!(convo.transcript().len(), 2);
        assert_eq!(convo.feed(), feed_before.as_slice());
        assert!(convo.is_busy());
    }

    #[test]
    fn test_remote_rejection_shows_remote_message() {
        let mut convo = conversation(Some("sk-bad"));
        convo.request_send(QUESTION);

        convo.finish(Err(CompletionError::Rejected {
            status: 401,
            message: Some("Invalid API key".to_string()),
        }));

        let shown = notices(&convo);
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].text, "❌ Invalid API key");
        assert_eq!(shown[0].kind, NoticeKind::Error);
        assert_eq!(assistant_turns(&convo), 0);
        // The user turn is kept
        assert_eq!(convo.transcript().last().map(|m| m.role), Some(ChatRole::User));
        assert!(!convo.is_busy());
    }

    #[test]
    fn test_remote_rejection_without_message_uses_status() {
        let mut convo = conversation(Some("sk-test"));
        convo.request_send(QUESTION);
        convo.finish(Err(CompletionError::Rejected { status: 500, message: None }));

        assert_eq!(notices(&convo)[0].text, "❌ Error 500");
    }

    #[test]
    fn test_transport_failure_shows_connectivity_notice() {
        let mut convo = conversation(Some("sk-test"));
        convo.request_send(QUESTION);
        convo.finish(Err(CompletionError::Transport("connection refused".to_string())));

        let shown = notices(&convo);
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].text, NETWORK_ERROR_NOTICE);
        assert_eq!(assistant_turns(&convo), 0);
        assert_eq!(convo.state(), ControllerState::Idle);
    }

    #[test]
    fn test_empty_or_malformed_reply_is_flagged_not_appended() {
        let mut convo = conversation(Some("sk-test"));
        convo.request_send(QUESTION);
        convo.finish(Ok(None));

        convo.request_send("Where did Lars study?");
        convo.finish(Err(CompletionError::Malformed("expected value".to_string())));

        let shown = notices(&convo);
        assert_eq!(shown.len(), 2);
        assert!(shown.iter().all(|n| n.text == NO_REPLY_NOTICE && n.kind == NoticeKind::Info));
        assert_eq!(assistant_turns(&convo), 0);
        assert_eq!(convo.transcript().len(), 3);
    }

    #[test]
    fn test_stray_result_is_ignored() {
        let mut convo = conversation(Some("sk-test"));
        convo.finish(Ok(Some(ANSWER.to_string())));

        assert_eq!(convo.transcript().len(), 1);
        assert!(convo.feed().is_empty());
    }

    #[test]
    fn test_transcript_only_grows() {
        let mut convo = conversation(Some("sk-test"));
        let mut snapshot = convo.transcript().to_sendable();

        let results = vec![
            Ok(Some("one".to_string())),
            Err(CompletionError::Transport("down".to_string())),
            Ok(None),
            Err(CompletionError::Rejected { status: 429, message: None }),
            Ok(Some("two".to_string())),
        ];

        for (i, result) in results.into_iter().enumerate() {
            convo.request_send(&format!("question {}", i));
            convo.request_send("dropped while busy");
            convo.finish(result);

            let current = convo.transcript().to_sendable();
            assert!(current.len() >= snapshot.len());
            assert_eq!(current[..snapshot.len()], snapshot[..]);
            snapshot = current;
        }

        assert_eq!(convo.transcript().len(), 1 + 5 + 2);
    }

    #[test]
    fn test_history_window_applies_to_request_only() {
        let settings = CompletionSettings { max_history: Some(1), ..CompletionSettings::default() };
        let mut convo = Conversation::new("bio", Some("sk-test".to_string()), settings);

        convo.request_send("first");
        convo.finish(Ok(Some("reply".to_string())));

        let SendOutcome::Dispatched(request) = convo.request_send("second") else {
            panic!("expected a dispatched request");
        };
        let sent: Vec<&str> = request.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(sent, vec!["bio", "second"]);
        assert_eq!(convo.transcript().len(), 4);
    }

    #[test]
    fn test_zero_history_window_still_sends_question() {
        let settings = CompletionSettings { max_history: Some(0), ..CompletionSettings::default() };
        let mut convo = Conversation::new("bio", Some("sk-test".to_string()), settings);

        let SendOutcome::Dispatched(request) = convo.request_send("What companies?") else {
            panic!("expected a dispatched request");
        };
        let sent: Vec<&str> = request.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(sent, vec!["bio", "What companies?"]);
    }

    #[test]
    fn test_save_credential_enables_sending() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::at(dir.path().join("config.json"));
        let mut convo = conversation(None);

        assert!(matches!(convo.request_send(QUESTION), SendOutcome::NeedsCredential));
        assert_eq!(convo.state(), ControllerState::Idle);

        assert!(convo.save_credential(&store, "  sk-live  ").unwrap());
        assert_eq!(convo.state(), ControllerState::Idle);
        assert_eq!(store.get().as_deref(), Some("sk-live"));
        assert_eq!(notices(&convo).last().map(|n| n.text.as_str()), Some(CREDENTIAL_SAVED_NOTICE));

        let SendOutcome::Dispatched(request) = convo.request_send(QUESTION) else {
            panic!("expected a dispatched request");
        };
        assert_eq!(request.api_key, "sk-live");
    }

    #[test]
    fn test_blank_credential_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::at(dir.path().join("config.json"));
        store.set("sk-existing").unwrap();
        let mut convo = conversation(store.get().as_deref());

        assert!(!convo.save_credential(&store, "   ").unwrap());
        assert_eq!(store.get().as_deref(), Some("sk-existing"));
        assert!(convo.feed().is_empty());
    }

    #[tokio::test]
    async fn test_inline_send_reports_transport_failure() {
        let client = OpenAIClient::with_endpoint("http://127.0.0.1:9/v1/chat/completions");
        let mut convo = conversation(Some("sk-test"));

        let outcome = convo.send(QUESTION, &client).await;

        assert!(matches!(outcome, SendOutcome::Dispatched(_)));
        assert!(!convo.is_busy());
        assert_eq!(notices(&convo).len(), 1);
        assert_eq!(notices(&convo)[0].text, NETWORK_ERROR_NOTICE);
    }
}
