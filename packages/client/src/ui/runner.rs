//! Interactive console loop.

use std::{sync::Arc, time::Duration};

use rustyline::{DefaultEditor, error::ReadlineError};
use tokio::{sync::mpsc, time::MissedTickBehavior};
use yapper_shared::time::SystemClock;

use super::{
    command::{Command, parse_command},
    formatter::MessageFormatter,
    prompt::{prompt_for, redisplay_prompt},
};
use crate::{
    config::ClientConfig,
    domain::{
        entity::ChatMessage,
        listener::SessionNotice,
        port::ConnectionPort,
        value_object::{RoomId, UserId},
    },
    error::ClientError,
    infrastructure::{
        auth::AuthGateway, connection::ConnectionManager, transport::WebSocketConnector,
    },
    usecase::ChatSession,
};

const SEARCH_TICK: Duration = Duration::from_secs(1);

enum Flow {
    Continue,
    Quit,
}

/// Resolve the user, connect and run until the user quits or the link fails.
pub async fn run_client(config: ClientConfig, auth: &dyn AuthGateway) -> Result<(), ClientError> {
    let user_id = auth.current_user().await?;

    let connector = Arc::new(WebSocketConnector::new(config.server_url.clone()));
    let (connection, mut events) = ConnectionManager::new(connector, &config);
    let mut session = ChatSession::new(user_id.clone(), connection, &config, Arc::new(SystemClock));
    let mut console = Console::new(&user_id);

    tracing::info!("Connecting to {} as '{}'", config.server_url, user_id);
    session.connect();
    println!("{}", MessageFormatter::format_welcome(&user_id));

    let mut input_rx = spawn_input_thread(prompt_for(user_id.as_str()));
    let mut ticker = tokio::time::interval(SEARCH_TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let outcome = loop {
        tokio::select! {
            line = input_rx.recv() => {
                let Some(line) = line else {
                    break Ok(());
                };
                if let Flow::Quit = console.handle_line(&mut session, &line) {
                    break Ok(());
                }
            }
            event = events.recv() => {
                let Some(event) = event else {
                    break Ok(());
                };
                let notices = session.handle_event(event);
                if let Err(e) = console.handle_notices(&mut session, notices) {
                    break Err(e);
                }
            }
            _ = ticker.tick() => {
                if let Some(notice) = session.check_search_deadline()
                    && let Err(e) = console.handle_notices(&mut session, vec![notice])
                {
                    break Err(e);
                }
            }
        }
    };

    session.close();
    session.link_mut().shutdown().await;
    tracing::info!("Client session ended");

    outcome
}

/// Read lines on a blocking thread and forward them to the async loop.
fn spawn_input_thread(prompt: String) -> mpsc::UnboundedReceiver<String> {
    let (input_tx, input_rx) = mpsc::unbounded_channel::<String>();

    std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                tracing::error!("Failed to initialize readline: {}", e);
                return;
            }
        };

        loop {
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    input_rx
}

/// Console state that is not part of the session.
struct Console {
    user_id: String,
    /// Print the list on the next summary change (after `/chats` or connect).
    show_summaries: bool,
}

impl Console {
    fn new(user_id: &UserId) -> Self {
        Self {
            user_id: user_id.to_string(),
            show_summaries: false,
        }
    }

    fn show(&self, text: &str) {
        print!("{}", text);
        redisplay_prompt(&self.user_id);
    }

    fn handle_line<C: ConnectionPort>(&mut self, session: &mut ChatSession<C>, line: &str) -> Flow {
        let command = match parse_command(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Flow::Continue,
            Err(e) => {
                self.show(&MessageFormatter::format_error(&e));
                return Flow::Continue;
            }
        };

        match command {
            Command::Say(text) => match session.send_message(text) {
                Ok(message) => {
                    self.show(&MessageFormatter::format_sent_confirmation(message.timestamp))
                }
                Err(e) => self.show(&MessageFormatter::format_error(&e)),
            },
            Command::Chats => {
                self.show(&MessageFormatter::format_summaries(session.summaries()));
                match session.refresh_summaries() {
                    Ok(_) => self.show_summaries = true,
                    Err(e) => self.show(&MessageFormatter::format_error(&e)),
                }
            }
            Command::Open(target) => self.open_room(session, &target),
            Command::Search { mood, role } => match session.start_search(role, mood) {
                Ok(request) => self.show(&MessageFormatter::format_search_started(&request)),
                Err(e) => self.show(&MessageFormatter::format_error(&e)),
            },
            Command::Stop => {
                if session.stop_search().is_some() {
                    self.show(&MessageFormatter::format_search_cancelled());
                }
            }
            Command::Leave => {
                let room_id = session
                    .view()
                    .active_room()
                    .map(|room| room.room_id.clone());
                if let Some(room_id) = room_id
                    && session.exit_room()
                {
                    self.show(&MessageFormatter::format_room_left(&room_id));
                }
            }
            Command::Help => self.show(&MessageFormatter::format_help()),
            Command::Quit => return Flow::Quit,
            Command::Unknown(reason) => self.show(&MessageFormatter::format_error(&reason)),
        }

        Flow::Continue
    }

    /// `target` is a 1-based position in the chat list or a room id.
    fn open_room<C: ConnectionPort>(&mut self, session: &mut ChatSession<C>, target: &str) {
        let room_id = match target.parse::<usize>() {
            Ok(position) => match position
                .checked_sub(1)
                .and_then(|index| session.summaries().get(index))
            {
                Some(entry) => entry.room_id.clone(),
                None => {
                    self.show(&MessageFormatter::format_error(&format!(
                        "No chat number {}",
                        position
                    )));
                    return;
                }
            },
            Err(_) => match RoomId::new(target.to_string()) {
                Ok(room_id) => room_id,
                Err(e) => {
                    self.show(&MessageFormatter::format_error(&e));
                    return;
                }
            },
        };

        match session.enter_room(room_id, None) {
            Ok(()) => self.show(&MessageFormatter::format_room_entered(&counterpart_label(session))),
            Err(e) => self.show(&MessageFormatter::format_error(&e)),
        }
    }

    fn handle_notices<C: ConnectionPort>(
        &mut self,
        session: &mut ChatSession<C>,
        notices: Vec<SessionNotice>,
    ) -> Result<(), ClientError> {
        for notice in notices {
            match notice {
                SessionNotice::MessageAppended(message) => {
                    let label = sender_label(session, &message);
                    self.show(&MessageFormatter::format_chat_message(&label, &message));
                }
                SessionNotice::HistoryReplaced { room_id, .. } => {
                    self.show(&MessageFormatter::format_history(
                        &room_id,
                        &counterpart_label(session),
                        session.view().messages(),
                        session.user_id(),
                    ));
                }
                SessionNotice::SummariesChanged => {
                    if std::mem::take(&mut self.show_summaries) {
                        self.show(&MessageFormatter::format_summaries(session.summaries()));
                    }
                }
                SessionNotice::MatchFound(found) => {
                    self.show(&MessageFormatter::format_match_found(&found));
                    match session.enter_matched_room(&found) {
                        Ok(()) => self.show(&MessageFormatter::format_room_entered(
                            &found.counterpart_nickname,
                        )),
                        Err(e) => self.show(&MessageFormatter::format_error(&e)),
                    }
                }
                SessionNotice::SearchTimedOut(_) => {
                    self.show(&MessageFormatter::format_search_timed_out());
                }
                SessionNotice::Connected { reconnected } => {
                    self.show(&MessageFormatter::format_connected(reconnected));
                    if !reconnected {
                        match session.load_summaries() {
                            Ok(true) => self.show_summaries = true,
                            Ok(false) => {}
                            Err(e) => self.show(&MessageFormatter::format_error(&e)),
                        }
                    }
                }
                SessionNotice::ConnectionLost { reason } => {
                    self.show(&MessageFormatter::format_connection_lost(&reason));
                }
                SessionNotice::ConnectionFailed { attempts } => {
                    return Err(ClientError::ConnectionFailed { attempts });
                }
                SessionNotice::Unauthenticated => return Err(ClientError::Unauthenticated),
                SessionNotice::Disconnected => {
                    self.show(&MessageFormatter::format_disconnected());
                }
            }
        }
        Ok(())
    }
}

fn counterpart_label<C: ConnectionPort>(session: &ChatSession<C>) -> String {
    session
        .view()
        .active_room()
        .map(|room| {
            room.counterpart_nickname
                .clone()
                .or_else(|| room.counterpart_id.as_ref().map(ToString::to_string))
                .unwrap_or_else(|| room.room_id.to_string())
        })
        .unwrap_or_default()
}

fn sender_label<C: ConnectionPort>(session: &ChatSession<C>, message: &ChatMessage) -> String {
    if &message.sender_id == session.user_id() {
        return "me".to_string();
    }
    session
        .view()
        .active_room()
        .filter(|room| room.counterpart_id.as_ref() == Some(&message.sender_id))
        .and_then(|room| room.counterpart_nickname.clone())
        .unwrap_or_else(|| message.sender_id.to_string())
}
