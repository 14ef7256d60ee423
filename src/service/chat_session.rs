use std::cell::{Cell, RefCell};

use futures_util::future::{AbortHandle, Abortable};
use futures_util::stream::{LocalBoxStream, StreamExt};
use tracing::{debug, error, info, warn};

use crate::errors::ChatError;
use crate::models::{ChatRequest, Conversation, Message};
use crate::protocol::FrameDecoder;
use crate::service::turn::Turn;

/// Response body of the chat endpoint as raw byte chunks.
pub type ByteStream = LocalBoxStream<'static, Result<Vec<u8>, ChatError>>;

/// Issues `POST /api/chat/message`. Implementations map a non-success status
/// to [`ChatError::HttpStatus`] before any body is read.
#[allow(async_fn_in_trait)]
pub trait ChatTransport {
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, ChatError>;
}

/// Runs chat turns for one view, one at a time.
///
/// `send` publishes the whole transcript through its callback after the
/// placeholders are added, after every stream event, and after a rollback.
/// The callback is the only way results leave the session.
pub struct ChatSession<T> {
    transport: T,
    loading: Cell<bool>,
    in_flight: RefCell<Option<AbortHandle>>,
}

impl<T: ChatTransport> ChatSession<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            loading: Cell::new(false),
            in_flight: RefCell::new(None),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn is_loading(&self) -> bool {
        self.loading.get()
    }

    /// Cancels the send in flight, if any. Its pending read is dropped and it
    /// publishes nothing further; the send resolves to
    /// [`ChatError::Cancelled`] naming the placeholder to discard.
    pub fn cancel(&self) {
        if let Some(handle) = self.in_flight.borrow_mut().take() {
            info!("Cancelling in-flight chat send");
            handle.abort();
        }
    }

    /// Sends `user_text` in `conversation`. `Ok` means the stream ended
    /// normally and the caller may clear its input.
    pub async fn send<F>(
        &self,
        conversation: &Conversation,
        user_text: &str,
        mut publish: F,
    ) -> Result<(), ChatError>
    where
        F: FnMut(&[Message]),
    {
        if user_text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if self.loading.get() {
            debug!("Ignoring send while another is in flight");
            return Err(ChatError::Busy);
        }

        let _loading = LoadingGuard::acquire(self);
        let (handle, registration) = AbortHandle::new_pair();
        *self.in_flight.borrow_mut() = Some(handle.clone());

        let mut turn = Turn::begin(conversation, user_text);
        publish(turn.messages());

        let request = turn.request(conversation, user_text);
        info!(
            "Sending chat message in conversation {} ({} -> {}, {} history entries)",
            conversation.id,
            request.input_language,
            request.output_language,
            request.conversation_history.len()
        );

        let mut checkpoint = |turn: &Turn| {
            if !handle.is_aborted() {
                publish(turn.messages());
            }
        };

        let outcome = Abortable::new(
            self.stream_turn(&request, &mut turn, &mut checkpoint),
            registration,
        )
        .await;

        match outcome {
            Err(_aborted) => {
                debug!("Chat send for conversation {} was cancelled", conversation.id);
                Err(ChatError::Cancelled { assistant_id: turn.assistant_id().to_string() })
            }
            Ok(Ok(())) => {
                info!("Chat stream for conversation {} completed", conversation.id);
                Ok(())
            }
            Ok(Err(e)) => {
                error!("Chat send failed for conversation {}: {e}", conversation.id);
                if e.is_certificate_problem() {
                    error!(
                        "SSL certificate error - you may need to accept the certificate or use HTTP instead"
                    );
                }
                turn.roll_back();
                checkpoint(&turn);
                Err(e)
            }
        }
    }

    async fn stream_turn<C>(
        &self,
        request: &ChatRequest,
        turn: &mut Turn,
        checkpoint: &mut C,
    ) -> Result<(), ChatError>
    where
        C: FnMut(&Turn),
    {
        let mut body = self.transport.open_stream(request).await?;
        let mut decoder = FrameDecoder::new();

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            for event in decoder.push(&chunk)? {
                debug!("Received {} event", event.kind());
                turn.apply(event);
                checkpoint(turn);
            }
        }

        if let Some(event) = decoder.finish()? {
            warn!("Stream ended without a frame terminator; applying trailing {} event", event.kind());
            turn.apply(event);
            checkpoint(turn);
        }
        Ok(())
    }
}

/// Holds the loading flag for the duration of one send.
struct LoadingGuard<'a, T> {
    session: &'a ChatSession<T>,
}

impl<'a, T> LoadingGuard<'a, T> {
    fn acquire(session: &'a ChatSession<T>) -> Self {
        session.loading.set(true);
        Self { session }
    }
}

impl<T> Drop for LoadingGuard<'_, T> {
    fn drop(&mut self) {
        self.session.loading.set(false);
        self.session.in_flight.borrow_mut().take();
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use futures_util::stream;
    use tokio::sync::mpsc;

    use super::*;
    use crate::models::{MessageRole, PENDING_TRANSLATION};
    use crate::protocol::StreamEvent;

    /// Replays a fixed list of chunks, then optionally fails.
    #[derive(Clone, Default)]
    struct ScriptedTransport {
        chunks: Vec<Result<Vec<u8>, String>>,
        status: Option<u16>,
        seen: Rc<RefCell<Vec<ChatRequest>>>,
    }

    impl ScriptedTransport {
        fn frames(events: &[StreamEvent]) -> Self {
            let chunks = events
                .iter()
                .map(|e| Ok(e.to_frame().unwrap().into_bytes()))
                .collect();
            Self { chunks, ..Self::default() }
        }

        fn then_fail(mut self) -> Self {
            self.chunks.push(Err("connection reset".into()));
            self
        }
    }

    impl ChatTransport for ScriptedTransport {
        async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, ChatError> {
            self.seen.borrow_mut().push(request.clone());
            if let Some(status) = self.status {
                return Err(ChatError::HttpStatus { status });
            }
            let chunks: Vec<_> = self
                .chunks
                .iter()
                .cloned()
                .map(|c| c.map_err(ChatError::transport))
                .collect();
            Ok(stream::iter(chunks).boxed_local())
        }
    }

    /// Hands out chunks as the test pushes them.
    struct ChannelTransport {
        rx: RefCell<Option<mpsc::UnboundedReceiver<Result<Vec<u8>, ChatError>>>>,
    }

    impl ChatTransport for ChannelTransport {
        async fn open_stream(&self, _request: &ChatRequest) -> Result<ByteStream, ChatError> {
            let mut rx = self.rx.borrow_mut().take().expect("stream opened once");
            Ok(stream::poll_fn(move |cx| rx.poll_recv(cx)).boxed_local())
        }
    }

    fn conversation(target: &str) -> Conversation {
        let mut conv = Conversation::new("Conversation 1");
        conv.target_language = target.into();
        conv
    }

    fn partial(text: &str) -> StreamEvent {
        StreamEvent::PartialResponse { partial_response: text.into() }
    }

    #[tokio::test]
    async fn scripted_round_trip_reaches_final_state() {
        let conv = conversation("fr");
        let transport = ScriptedTransport::frames(&[
            StreamEvent::Translation {
                original_message: Some("Bonjour".into()),
                translated_message: Some("Hello".into()),
                detected_language: Some("fr".into()),
            },
            partial("Hi"),
            partial(" there"),
            StreamEvent::FinalResponse {
                original_response: Some("Hi there".into()),
                translated_response: Some("Hola".into()),
            },
        ]);
        let session = ChatSession::new(transport);

        let mut published: Vec<Vec<Message>> = Vec::new();
        session
            .send(&conv, "Bonjour", |messages| published.push(messages.to_vec()))
            .await
            .unwrap();

        // Placeholders, then one checkpoint per event.
        assert_eq!(published.len(), 5);
        let last = published.last().unwrap();
        assert_eq!(last.len(), 2);
        assert_eq!(last[0].role, MessageRole::User);
        assert_eq!(last[0].original_text, "Hello");
        assert_eq!(last[0].translated_text, "Bonjour");
        assert_eq!(last[1].original_text, "Hi there");
        assert_eq!(last[1].translated_text, "Hola");
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn first_publish_adds_exactly_the_pair() {
        let mut conv = conversation("es");
        conv.messages.push(Message::user_pending("earlier"));
        let session = ChatSession::new(ScriptedTransport::frames(&[]));

        let mut published: Vec<Vec<Message>> = Vec::new();
        session
            .send(&conv, "hello", |messages| published.push(messages.to_vec()))
            .await
            .unwrap();

        let first = &published[0];
        assert_eq!(first.len(), 3);
        assert_eq!(first[0], conv.messages[0]);
        assert_eq!(first[1].role, MessageRole::User);
        assert_eq!(first[2].role, MessageRole::Assistant);
        assert_eq!(first[2].translated_text, PENDING_TRANSLATION);

        let seen = session.transport().seen.borrow();
        assert_eq!(seen[0].conversation_history.len(), 2);
    }

    #[tokio::test]
    async fn failure_after_partials_rolls_back_assistant() {
        let conv = conversation("es");
        let session = ChatSession::new(
            ScriptedTransport::frames(&[partial("Hi"), partial(" the")]).then_fail(),
        );

        let mut published: Vec<Vec<Message>> = Vec::new();
        let err = session
            .send(&conv, "hello", |messages| published.push(messages.to_vec()))
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::Transport { .. }));
        let first_user = published[0][0].clone();
        let last = published.last().unwrap();
        assert_eq!(last, &vec![first_user]);
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn http_error_status_rolls_back() {
        let conv = conversation("es");
        let transport = ScriptedTransport { status: Some(502), ..ScriptedTransport::default() };
        let session = ChatSession::new(transport);

        let mut published: Vec<Vec<Message>> = Vec::new();
        let err = session
            .send(&conv, "hello", |messages| published.push(messages.to_vec()))
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::HttpStatus { status: 502 }));
        assert_eq!(published.len(), 2);
        assert_eq!(published[1].len(), 1);
        assert_eq!(published[1][0].role, MessageRole::User);
    }

    #[tokio::test]
    async fn malformed_frame_aborts_the_send() {
        let conv = conversation("es");
        let mut transport = ScriptedTransport::frames(&[partial("Hi")]);
        transport.chunks.push(Ok(b"data: {\"type\":\n\n".to_vec()));
        transport.chunks.push(Ok(partial(" never").to_frame().unwrap().into_bytes()));
        let session = ChatSession::new(transport);

        let mut published: Vec<Vec<Message>> = Vec::new();
        let err = session
            .send(&conv, "hello", |messages| published.push(messages.to_vec()))
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::MalformedFrame { .. }));
        assert_eq!(published.last().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejects_blank_input_without_publishing() {
        let session = ChatSession::new(ScriptedTransport::default());
        let mut calls = 0;
        let err = session
            .send(&conversation("es"), "   ", |_| calls += 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::EmptyMessage));
        assert_eq!(calls, 0);
        assert!(session.transport().seen.borrow().is_empty());
    }

    #[tokio::test]
    async fn second_send_while_loading_is_rejected() {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = ChatSession::new(ChannelTransport { rx: RefCell::new(Some(rx)) });
        let conv = conversation("es");

        let first_calls = Cell::new(0);
        let second_calls = Cell::new(0);
        let first = session.send(&conv, "first", |_| first_calls.set(first_calls.get() + 1));
        let (session, conv, second_calls_ref) = (&session, &conv, &second_calls);
        let second = async move {
            let second_calls = second_calls_ref;
            tokio::task::yield_now().await;
            assert!(session.is_loading());
            let result = session
                .send(conv, "second", |_| second_calls.set(second_calls.get() + 1))
                .await;
            tx.send(Ok(partial("done").to_frame().unwrap().into_bytes())).unwrap();
            drop(tx);
            result
        };

        let (first, second) = tokio::join!(first, second);
        assert!(first.is_ok());
        assert!(matches!(second, Err(ChatError::Busy)));
        assert_eq!(second_calls.get(), 0);
        assert_eq!(first_calls.get(), 2);
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn cancel_stops_further_publishing() {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = ChatSession::new(ChannelTransport { rx: RefCell::new(Some(rx)) });
        let conv = conversation("es");

        let published: RefCell<Vec<Vec<Message>>> = RefCell::new(Vec::new());
        let send = session.send(&conv, "hello", |m| published.borrow_mut().push(m.to_vec()));
        let driver = async {
            tx.send(Ok(partial("Hi").to_frame().unwrap().into_bytes())).unwrap();
            while published.borrow().len() < 2 {
                tokio::task::yield_now().await;
            }
            session.cancel();
            tx.send(Ok(partial(" late").to_frame().unwrap().into_bytes())).ok();
        };

        let (result, ()) = tokio::join!(send, driver);
        let published = published.into_inner();
        let err = result.unwrap_err();
        assert_eq!(err.cancelled_placeholder(), Some(published[0][1].id.as_str()));
        assert_eq!(published.len(), 2);
        assert_eq!(published[1][1].original_text, "Hi");
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn cancelled_placeholder_is_discarded_from_the_store() {
        use crate::db::MemoryStore;
        use crate::service::ConversationController;

        let (tx, rx) = mpsc::unbounded_channel();
        let session = ChatSession::new(ChannelTransport { rx: RefCell::new(Some(rx)) });
        let store = MemoryStore::new();
        let mut ctrl = ConversationController::load(store.clone()).unwrap();
        let conv = ctrl.create().unwrap().clone();

        let publishes = Cell::new(0);
        let send = session.send(&conv, "hello", |messages| {
            ctrl.update_messages(&conv.id, messages).unwrap();
            publishes.set(publishes.get() + 1);
        });
        let driver = async {
            tx.send(Ok(partial("Hi").to_frame().unwrap().into_bytes())).unwrap();
            while publishes.get() < 2 {
                tokio::task::yield_now().await;
            }
            session.cancel();
        };
        let (result, ()) = tokio::join!(send, driver);

        // The partial reply is stored until the caller discards it.
        assert_eq!(store.snapshot()[0].messages.len(), 2);
        let assistant_id = result.unwrap_err().cancelled_placeholder().unwrap().to_string();
        ctrl.discard_message(&conv.id, &assistant_id).unwrap();

        let stored = &store.snapshot()[0].messages;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].role, MessageRole::User);
        assert_eq!(stored[0].original_text, "hello");
    }
}
