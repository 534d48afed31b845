//! Chat session usecase.
//!
//! One session per process. It owns the link, the room registry, the message
//! view, the summary list and the matchmaking controller, and routes every
//! connection event to the components that listen for it.

use std::sync::Arc;

use yapper_shared::time::Clock;

use crate::{
    config::ClientConfig,
    domain::{
        aggregator::ChatSummaryAggregator,
        entity::{ChatMessage, ChatSummaryEntry, IncomingMessage, MatchFound, SearchRequest},
        error::SessionError,
        event::{ConnectionEvent, InboundEvent},
        listener::{InboundListener, SessionNotice},
        matchmaking::MatchmakingController,
        port::ConnectionPort,
        reconciler::{ActiveRoom, MessageReconciler},
        room_registry::RoomRegistry,
        value_object::{Mood, RoleChoice, RoomId, Timestamp, UserId},
    },
};

pub struct ChatSession<C: ConnectionPort> {
    user_id: UserId,
    link: C,
    clock: Arc<dyn Clock>,
    rejoin_on_reconnect: bool,
    rooms: RoomRegistry,
    view: MessageReconciler,
    summaries: ChatSummaryAggregator,
    search: MatchmakingController,
    closed: bool,
}

impl<C: ConnectionPort> ChatSession<C> {
    pub fn new(user_id: UserId, link: C, config: &ClientConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            view: MessageReconciler::new(user_id.clone(), config.echo_policy),
            summaries: ChatSummaryAggregator::new(user_id.clone()),
            search: MatchmakingController::new(user_id.clone(), config.local_search_deadline()),
            rooms: RoomRegistry::new(),
            rejoin_on_reconnect: config.rejoin_on_reconnect,
            user_id,
            link,
            clock,
            closed: false,
        }
    }

    /// Open the link. Presence is announced by the link itself once up.
    pub fn connect(&mut self) {
        self.closed = false;
        self.link.open(&self.user_id);
    }

    /// Apply one connection event, returning what the surface should show.
    pub fn handle_event(&mut self, event: ConnectionEvent) -> Vec<SessionNotice> {
        match event {
            ConnectionEvent::Established { reconnected } => {
                if reconnected && self.rejoin_on_reconnect {
                    let rejoined = self.rooms.rejoin_all(&self.user_id, &self.link);
                    if rejoined > 0 {
                        tracing::info!("Rejoined {} rooms after reconnect", rejoined);
                    }
                }
                vec![SessionNotice::Connected { reconnected }]
            }
            // Local state survives a drop; the link retries on its own.
            ConnectionEvent::Lost { reason } => vec![SessionNotice::ConnectionLost { reason }],
            ConnectionEvent::Error { detail } => {
                tracing::debug!("Transient connection error: {}", detail);
                Vec::new()
            }
            ConnectionEvent::Failed { attempts } => {
                self.rooms.clear();
                vec![SessionNotice::ConnectionFailed { attempts }]
            }
            ConnectionEvent::Unauthorized => {
                self.close();
                vec![SessionNotice::Unauthenticated]
            }
            ConnectionEvent::Closed => vec![SessionNotice::Disconnected],
            ConnectionEvent::Inbound(event) => self.dispatch(&event),
        }
    }

    /// Offer an inbound event to every subscribed listener.
    fn dispatch(&mut self, event: &InboundEvent) -> Vec<SessionNotice> {
        let listeners: [&mut dyn InboundListener; 3] =
            [&mut self.view, &mut self.summaries, &mut self.search];
        listeners
            .into_iter()
            .filter(|listener| listener.is_subscribed())
            .filter_map(|listener| listener.on_inbound(event))
            .collect()
    }

    /// Display `room_id`, leaving the previously displayed room first.
    ///
    /// The counterpart comes from `counterpart` or, failing that, from the
    /// room's summary entry.
    pub fn enter_room(
        &mut self,
        room_id: RoomId,
        counterpart: Option<(UserId, Option<String>)>,
    ) -> Result<(), SessionError> {
        if self
            .view
            .active_room()
            .is_some_and(|active| active.room_id == room_id)
        {
            return Ok(());
        }
        self.exit_room();

        let counterpart = counterpart.or_else(|| {
            self.summaries.get(&room_id).map(|entry| {
                (
                    entry.counterpart_id.clone(),
                    Some(entry.counterpart_nickname.clone()),
                )
            })
        });
        let mut room = ActiveRoom::new(room_id.clone());
        if let Some((counterpart_id, nickname)) = counterpart {
            room = room.with_counterpart(counterpart_id, nickname);
        }

        self.rooms.join(&room_id, &self.user_id, &self.link)?;
        self.view.activate(room);
        tracing::info!("Entered room '{}'", room_id);
        Ok(())
    }

    /// Enter the room a match points at.
    pub fn enter_matched_room(&mut self, found: &MatchFound) -> Result<(), SessionError> {
        self.enter_room(
            found.room_id.clone(),
            Some((
                found.counterpart_id.clone(),
                Some(found.counterpart_nickname.clone()),
            )),
        )
    }

    /// Stop displaying the active room and leave it. `false` if none was open.
    pub fn exit_room(&mut self) -> bool {
        let Some(room) = self.view.deactivate() else {
            return false;
        };
        self.rooms.leave(&room.room_id, &self.user_id, &self.link);
        tracing::info!("Left room '{}'", room.room_id);
        true
    }

    /// Send `text` to the active room's counterpart.
    pub fn send_message(&mut self, text: String) -> Result<ChatMessage, SessionError> {
        let now = self.now();
        let message = self.view.send(text, now, &self.link)?;

        let counterpart_nickname = self
            .view
            .active_room()
            .and_then(|room| room.counterpart_nickname.clone());
        self.summaries.apply_message(&IncomingMessage {
            room_id: message.room_id.clone(),
            sender_id: message.sender_id.clone(),
            receiver_id: message.receiver_id.clone(),
            text: message.text.clone(),
            timestamp: message.timestamp,
            sender_nickname: None,
            receiver_nickname: counterpart_nickname,
            client_tag: None,
        });

        Ok(message)
    }

    /// Request the all-chats list once per session.
    pub fn load_summaries(&mut self) -> Result<bool, SessionError> {
        self.summaries.load_all(&self.link)
    }

    pub fn refresh_summaries(&mut self) -> Result<bool, SessionError> {
        self.summaries.refresh(&self.link)
    }

    pub fn start_search(
        &mut self,
        role: Option<RoleChoice>,
        mood: Option<Mood>,
    ) -> Result<SearchRequest, SessionError> {
        let now = self.now();
        self.search
            .start(role, mood, now, &self.link)
            .map(SearchRequest::clone)
    }

    pub fn stop_search(&mut self) -> Option<SearchRequest> {
        self.search.stop(&self.link)
    }

    /// Give up on a search the server never answered.
    pub fn check_search_deadline(&mut self) -> Option<SessionNotice> {
        let now = self.now();
        self.search
            .check_deadline(now, &self.link)
            .map(SessionNotice::SearchTimedOut)
    }

    /// Leave the active room, cancel any search and close the link.
    ///
    /// Safe to call repeatedly; teardown happens once.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        self.exit_room();
        if self.search.request().is_some() {
            self.search.stop(&self.link);
        }
        self.rooms.clear();
        self.link.close();
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn link(&self) -> &C {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut C {
        &mut self.link
    }

    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    pub fn view(&self) -> &MessageReconciler {
        &self.view
    }

    pub fn summaries(&self) -> &[ChatSummaryEntry] {
        self.summaries.entries()
    }

    pub fn search(&self) -> &MatchmakingController {
        &self.search
    }

    fn now(&self) -> Timestamp {
        Timestamp::new(self.clock.now_millis())
    }
}

impl<C: ConnectionPort> Drop for ChatSession<C> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::Cell,
        rc::Rc,
        time::Duration,
    };

    use yapper_shared::time::FixedClock;

    use super::*;
    use crate::domain::{
        entity::{HistoryEntry, SearchStatus},
        event::OutboundEvent,
        port::EventSink,
        testing::{RecordingSink, room, ts, user},
    };

    /// Link double whose traffic stays observable after the session is gone.
    #[derive(Clone)]
    struct FakeLink {
        sink: Rc<RecordingSink>,
        opens: Rc<Cell<u32>>,
        closes: Rc<Cell<u32>>,
    }

    impl FakeLink {
        fn new() -> Self {
            Self {
                sink: Rc::new(RecordingSink::disconnected()),
                opens: Rc::new(Cell::new(0)),
                closes: Rc::new(Cell::new(0)),
            }
        }
    }

    impl EventSink for FakeLink {
        fn is_connected(&self) -> bool {
            self.sink.is_connected()
        }

        fn emit(&self, event: OutboundEvent) -> bool {
            self.sink.emit(event)
        }
    }

    impl ConnectionPort for FakeLink {
        fn open(&mut self, _user_id: &UserId) {
            self.opens.set(self.opens.get() + 1);
            self.sink.set_connected(true);
        }

        fn close(&mut self) {
            self.closes.set(self.closes.get() + 1);
            self.sink.set_connected(false);
        }
    }

    const NOW: i64 = 1_700_000_000_000;

    fn session_for(local: &str, link: &FakeLink, config: &ClientConfig) -> ChatSession<FakeLink> {
        let mut session = ChatSession::new(
            user(local),
            link.clone(),
            config,
            Arc::new(FixedClock::new(NOW)),
        );
        session.connect();
        session.handle_event(ConnectionEvent::Established { reconnected: false });
        link.sink.take();
        session
    }

    fn incoming(room_id: &str, sender: &str, receiver: &str, text: &str, at: i64) -> IncomingMessage {
        IncomingMessage {
            room_id: room(room_id),
            sender_id: user(sender),
            receiver_id: Some(user(receiver)),
            text: text.to_string(),
            timestamp: ts(at),
            sender_nickname: Some(sender.to_uppercase()),
            receiver_nickname: Some(receiver.to_uppercase()),
            client_tag: None,
        }
    }

    fn leave_count(events: &[OutboundEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, OutboundEvent::LeaveRoom { .. }))
            .count()
    }

    #[test]
    fn test_enter_room_joins_and_requests_history() {
        // テスト項目: 部屋に入ると joinRoom と履歴要求がこの順で送られる
        // given (前提条件):
        let link = FakeLink::new();
        let mut session = session_for("alice", &link, &ClientConfig::default());

        // when (操作):
        session
            .enter_room(room("r1"), Some((user("bob"), Some("Bob".to_string()))))
            .unwrap();

        // then (期待する結果):
        assert_eq!(
            link.sink.take(),
            vec![
                OutboundEvent::JoinRoom {
                    room_id: room("r1"),
                    user_id: user("alice"),
                },
                OutboundEvent::RequestHistory { room_id: room("r1") },
            ]
        );
        assert!(session.rooms().is_member(&room("r1")));
        assert_eq!(session.view().active_room().unwrap().room_id, room("r1"));
    }

    #[test]
    fn test_enter_room_while_disconnected_is_rejected() {
        // テスト項目: 未接続で部屋に入ろうとするとエラーになり、表示中の部屋も変わらない
        // given (前提条件):
        let link = FakeLink::new();
        let mut session = ChatSession::new(
            user("alice"),
            link.clone(),
            &ClientConfig::default(),
            Arc::new(FixedClock::new(NOW)),
        );

        // when (操作):
        let result = session.enter_room(room("r1"), None);

        // then (期待する結果):
        assert_eq!(result, Err(SessionError::NotConnected));
        assert!(session.view().active_room().is_none());
        assert!(session.rooms().is_empty());
    }

    #[test]
    fn test_switching_rooms_leaves_previous_room() {
        // テスト項目: 別の部屋に移ると前の部屋から退出してから新しい部屋に参加する
        // given (前提条件):
        let link = FakeLink::new();
        let mut session = session_for("alice", &link, &ClientConfig::default());
        session.enter_room(room("r1"), None).unwrap();
        link.sink.take();

        // when (操作):
        session.enter_room(room("r2"), None).unwrap();

        // then (期待する結果):
        let events = link.sink.take();
        assert_eq!(
            events[0],
            OutboundEvent::LeaveRoom {
                room_id: room("r1"),
                user_id: user("alice"),
            }
        );
        assert!(matches!(&events[1], OutboundEvent::JoinRoom { room_id, .. } if *room_id == room("r2")));
        assert!(!session.rooms().is_member(&room("r1")));
        assert!(session.rooms().is_member(&room("r2")));
    }

    #[test]
    fn test_counterpart_falls_back_to_summary_entry() {
        // テスト項目: 相手が指定されない場合はサマリー一覧の相手が使われる
        // given (前提条件):
        let link = FakeLink::new();
        let mut session = session_for("alice", &link, &ClientConfig::default());
        session.handle_event(ConnectionEvent::Inbound(InboundEvent::AllSummariesLoaded(vec![
            ChatSummaryEntry {
                room_id: room("r1"),
                counterpart_id: user("bob"),
                counterpart_nickname: "Bob".to_string(),
                last_message: "yo".to_string(),
                last_message_time: ts(1000),
            },
        ])));

        // when (操作):
        session.enter_room(room("r1"), None).unwrap();

        // then (期待する結果):
        let active = session.view().active_room().unwrap();
        assert_eq!(active.counterpart_id, Some(user("bob")));
        assert_eq!(active.counterpart_nickname.as_deref(), Some("Bob"));
    }

    #[test]
    fn test_receiver_sees_message_once_and_summary_moves_to_top() {
        // テスト項目: 受信側では表示中の部屋にメッセージが1件追加され、サマリーの先頭に来る
        // given (前提条件):
        let link = FakeLink::new();
        let mut session = session_for("bob", &link, &ClientConfig::default());
        session.handle_event(ConnectionEvent::Inbound(InboundEvent::AllSummariesLoaded(vec![
            ChatSummaryEntry {
                room_id: room("r0"),
                counterpart_id: user("carol"),
                counterpart_nickname: "Carol".to_string(),
                last_message: "old".to_string(),
                last_message_time: ts(500),
            },
        ])));
        session
            .enter_room(room("r1"), Some((user("alice"), Some("Alice".to_string()))))
            .unwrap();
        session.handle_event(ConnectionEvent::Inbound(InboundEvent::HistoryLoaded {
            room_id: Some(room("r1")),
            messages: vec![],
        }));

        // when (操作):
        let notices = session.handle_event(ConnectionEvent::Inbound(
            InboundEvent::MessageReceived(incoming("r1", "alice", "bob", "hi", 1000)),
        ));

        // then (期待する結果):
        assert_eq!(notices.len(), 2);
        assert!(matches!(&notices[0], SessionNotice::MessageAppended(m) if m.text == "hi"));
        assert_eq!(notices[1], SessionNotice::SummariesChanged);
        assert_eq!(session.view().messages().len(), 1);
        let top = &session.summaries()[0];
        assert_eq!(top.room_id, room("r1"));
        assert_eq!(top.last_message, "hi");
        assert_eq!(top.counterpart_nickname, "ALICE");
    }

    #[test]
    fn test_sender_shows_message_once_despite_echo() {
        // テスト項目: 送信側では楽観的に1件表示され、サーバーからのエコーで重複しない
        // given (前提条件):
        let link = FakeLink::new();
        let mut session = session_for("alice", &link, &ClientConfig::default());
        session
            .enter_room(room("r1"), Some((user("bob"), Some("Bob".to_string()))))
            .unwrap();
        link.sink.take();

        // when (操作):
        let sent = session.send_message("hi".to_string()).unwrap();
        let notices = session.handle_event(ConnectionEvent::Inbound(
            InboundEvent::MessageReceived(incoming("r1", "alice", "bob", "hi", NOW)),
        ));

        // then (期待する結果):
        assert_eq!(sent.timestamp, ts(NOW));
        assert_eq!(session.view().messages().len(), 1);
        assert!(
            !notices
                .iter()
                .any(|n| matches!(n, SessionNotice::MessageAppended(_)))
        );
        let events = link.sink.take();
        assert!(matches!(
            &events[..],
            [OutboundEvent::SendMessage { receiver_id, .. }] if *receiver_id == user("bob")
        ));
        assert_eq!(session.summaries()[0].last_message, "hi");
        assert_eq!(session.summaries()[0].counterpart_nickname, "Bob");
    }

    #[test]
    fn test_send_while_disconnected_is_rejected() {
        // テスト項目: 切断中の送信はエラーになり、画面にも追加されない
        // given (前提条件):
        let link = FakeLink::new();
        let mut session = session_for("alice", &link, &ClientConfig::default());
        session
            .enter_room(room("r1"), Some((user("bob"), None)))
            .unwrap();
        link.sink.set_connected(false);
        session.handle_event(ConnectionEvent::Lost {
            reason: "reset".to_string(),
        });

        // when (操作):
        let result = session.send_message("hi".to_string());

        // then (期待する結果):
        assert_eq!(result, Err(SessionError::NotConnected));
        assert!(session.view().messages().is_empty());
    }

    #[test]
    fn test_reconnect_keeps_state_and_rejoins_rooms() {
        // テスト項目: 再接続しても部屋・表示・サマリーの状態は保たれ、部屋に再参加する
        // given (前提条件):
        let link = FakeLink::new();
        let mut session = session_for("alice", &link, &ClientConfig::default());
        session
            .enter_room(room("r1"), Some((user("bob"), None)))
            .unwrap();
        session.handle_event(ConnectionEvent::Inbound(InboundEvent::HistoryLoaded {
            room_id: Some(room("r1")),
            messages: vec![HistoryEntry {
                sender_id: user("bob"),
                receiver_id: Some(user("alice")),
                text: "hey".to_string(),
                timestamp: ts(100),
            }],
        }));
        link.sink.take();

        // when (操作):
        link.sink.set_connected(false);
        let lost = session.handle_event(ConnectionEvent::Lost {
            reason: "reset".to_string(),
        });
        link.sink.set_connected(true);
        let back = session.handle_event(ConnectionEvent::Established { reconnected: true });

        // then (期待する結果):
        assert!(matches!(&lost[..], [SessionNotice::ConnectionLost { .. }]));
        assert_eq!(back, vec![SessionNotice::Connected { reconnected: true }]);
        assert!(session.rooms().is_member(&room("r1")));
        assert_eq!(session.view().messages().len(), 1);
        assert_eq!(
            link.sink.take(),
            vec![
                OutboundEvent::JoinRoom {
                    room_id: room("r1"),
                    user_id: user("alice"),
                },
                OutboundEvent::RequestHistory { room_id: room("r1") },
            ]
        );
    }

    #[test]
    fn test_reconnect_without_rejoin() {
        // テスト項目: 再参加を無効にすると再接続時に何も送らない
        // given (前提条件):
        let link = FakeLink::new();
        let config = ClientConfig::default().with_rejoin_on_reconnect(false);
        let mut session = session_for("alice", &link, &config);
        session.enter_room(room("r1"), None).unwrap();
        link.sink.take();

        // when (操作):
        session.handle_event(ConnectionEvent::Established { reconnected: true });

        // then (期待する結果):
        assert!(link.sink.take().is_empty());
        assert!(session.rooms().is_member(&room("r1")));
    }

    #[test]
    fn test_failed_connection_releases_memberships() {
        // テスト項目: 再接続を諦めると部屋のメンバーシップが解放される
        // given (前提条件):
        let link = FakeLink::new();
        let mut session = session_for("alice", &link, &ClientConfig::default());
        session.enter_room(room("r1"), None).unwrap();

        // when (操作):
        let notices = session.handle_event(ConnectionEvent::Failed { attempts: 10 });

        // then (期待する結果):
        assert_eq!(notices, vec![SessionNotice::ConnectionFailed { attempts: 10 }]);
        assert!(session.rooms().is_empty());
    }

    #[test]
    fn test_unauthorized_tears_down_session() {
        // テスト項目: 認証拒否でセッションが閉じられ Unauthenticated が通知される
        // given (前提条件):
        let link = FakeLink::new();
        let mut session = session_for("alice", &link, &ClientConfig::default());

        // when (操作):
        let notices = session.handle_event(ConnectionEvent::Unauthorized);

        // then (期待する結果):
        assert_eq!(notices, vec![SessionNotice::Unauthenticated]);
        assert_eq!(link.closes.get(), 1);
    }

    #[test]
    fn test_match_found_notice_and_enter_matched_room() {
        // テスト項目: マッチ成立が通知され、その部屋に相手付きで入れる
        // given (前提条件):
        let link = FakeLink::new();
        let mut session = session_for("bob", &link, &ClientConfig::default());
        session
            .start_search(Some(RoleChoice::Shawty), Some(Mood::Happy))
            .unwrap();
        let found = MatchFound {
            room_id: room("r9"),
            counterpart_id: user("alice"),
            counterpart_nickname: "Alice".to_string(),
        };

        // when (操作):
        let notices =
            session.handle_event(ConnectionEvent::Inbound(InboundEvent::Matched(found.clone())));
        session.enter_matched_room(&found).unwrap();

        // then (期待する結果):
        assert_eq!(notices, vec![SessionNotice::MatchFound(found)]);
        assert_eq!(session.search().status(), SearchStatus::Idle);
        let active = session.view().active_room().unwrap();
        assert_eq!(active.room_id, room("r9"));
        assert_eq!(active.counterpart_nickname.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_server_timeout_ends_search() {
        // テスト項目: サーバーのタイムアウトで検索が終了し、再検索はされない
        // given (前提条件):
        let link = FakeLink::new();
        let mut session = session_for("bob", &link, &ClientConfig::default());
        session
            .start_search(Some(RoleChoice::Rizzler), Some(Mood::Sad))
            .unwrap();
        link.sink.take();

        // when (操作):
        let notices = session.handle_event(ConnectionEvent::Inbound(InboundEvent::SearchTimedOut));

        // then (期待する結果):
        assert!(matches!(
            &notices[..],
            [SessionNotice::SearchTimedOut(request)] if request.status == SearchStatus::TimedOut
        ));
        assert_eq!(session.search().status(), SearchStatus::Idle);
        assert!(link.sink.take().is_empty());
    }

    #[test]
    fn test_local_deadline_stops_unanswered_search() {
        // テスト項目: ローカル期限を過ぎた検索は stopSearching を送って終了する
        // given (前提条件):
        let link = FakeLink::new();
        let config = ClientConfig::default().with_search_timeout(Duration::ZERO, Some(Duration::ZERO));
        let mut session = session_for("bob", &link, &config);
        session
            .start_search(Some(RoleChoice::Rizzler), Some(Mood::Lazy))
            .unwrap();
        link.sink.take();

        // when (操作):
        let notice = session.check_search_deadline();

        // then (期待する結果):
        assert!(matches!(notice, Some(SessionNotice::SearchTimedOut(_))));
        assert_eq!(
            link.sink.take(),
            vec![OutboundEvent::StopSearch { user_id: user("bob") }]
        );
    }

    #[test]
    fn test_drop_leaves_active_room_exactly_once() {
        // テスト項目: セッションを破棄すると表示中の部屋から一度だけ退出し、接続を閉じる
        // given (前提条件):
        let link = FakeLink::new();
        let mut session = session_for("alice", &link, &ClientConfig::default());
        session.enter_room(room("r1"), None).unwrap();
        session
            .start_search(Some(RoleChoice::Rizzler), Some(Mood::Happy))
            .unwrap();
        link.sink.take();

        // when (操作):
        session.close();
        drop(session);

        // then (期待する結果):
        let events = link.sink.events();
        assert_eq!(leave_count(&events), 1);
        assert!(
            events
                .iter()
                .any(|e| matches!(e, OutboundEvent::StopSearch { .. }))
        );
        assert_eq!(link.closes.get(), 1);
    }

    #[test]
    fn test_drop_without_room_only_closes_link() {
        // テスト項目: 部屋を開いていない場合は何も送らずに接続だけを閉じる
        // given (前提条件):
        let link = FakeLink::new();
        let session = session_for("alice", &link, &ClientConfig::default());

        // when (操作):
        drop(session);

        // then (期待する結果):
        assert!(link.sink.events().is_empty());
        assert_eq!(link.closes.get(), 1);
        assert_eq!(link.opens.get(), 1);
    }
}
