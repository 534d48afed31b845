//! Partner search state machine: `idle → searching → {matched, timed_out} → idle`.
//!
//! The search timeout is enforced by the server and only observed here. A
//! client-side deadline (configurable, normally the server timeout plus some
//! grace) covers a server that never answers.

use std::time::Duration;

use super::{
    entity::{MatchFound, SearchRequest, SearchStatus},
    error::SessionError,
    event::{InboundEvent, OutboundEvent},
    listener::{InboundListener, SessionNotice},
    port::EventSink,
    value_object::{Mood, RoleChoice, Timestamp, UserId},
};

pub struct MatchmakingController {
    local_user: UserId,
    local_deadline: Option<Duration>,
    request: Option<SearchRequest>,
}

impl MatchmakingController {
    pub fn new(local_user: UserId, local_deadline: Option<Duration>) -> Self {
        Self {
            local_user,
            local_deadline,
            request: None,
        }
    }

    /// Start searching for a partner.
    ///
    /// A second `start` while a search is outstanding is rejected without
    /// emitting anything.
    pub fn start(
        &mut self,
        role: Option<RoleChoice>,
        mood: Option<Mood>,
        now: Timestamp,
        sink: &dyn EventSink,
    ) -> Result<&SearchRequest, SessionError> {
        if self.request.is_some() {
            return Err(SessionError::AlreadySearching);
        }
        let mood = mood.ok_or(SessionError::MoodNotSelected)?;
        let role = role.ok_or(SessionError::RoleNotSelected)?;
        if !sink.is_connected() {
            return Err(SessionError::NotConnected);
        }

        sink.emit(OutboundEvent::StartSearch {
            user_id: self.local_user.clone(),
            role,
            mood,
        });
        tracing::info!("Searching for a partner (mood: {}, role: {})", mood, role);

        Ok(&*self.request.insert(SearchRequest {
            user_id: self.local_user.clone(),
            role,
            mood,
            status: SearchStatus::Searching,
            started_at: now,
        }))
    }

    /// Cancel the search. Valid from any state; the local state returns to
    /// idle without waiting for the server.
    pub fn stop(&mut self, sink: &dyn EventSink) -> Option<SearchRequest> {
        sink.emit(OutboundEvent::StopSearch {
            user_id: self.local_user.clone(),
        });
        let cancelled = self.request.take();
        if cancelled.is_some() {
            tracing::info!("Search cancelled");
        }
        cancelled
    }

    /// The server paired us with someone.
    pub fn on_matched(&mut self, found: &MatchFound) -> Option<SearchRequest> {
        let finished = self.finish(SearchStatus::Matched);
        if finished.is_none() {
            tracing::warn!(
                "Match for room '{}' arrived without an outstanding search",
                found.room_id
            );
        }
        finished
    }

    /// The server gave up on the search.
    pub fn on_timed_out(&mut self) -> Option<SearchRequest> {
        self.finish(SearchStatus::TimedOut)
    }

    /// Time out locally once the deadline has passed without any answer from
    /// the server. Cancels the search on the server; never restarts it.
    pub fn check_deadline(&mut self, now: Timestamp, sink: &dyn EventSink) -> Option<SearchRequest> {
        let deadline = self.local_deadline?;
        let started_at = self.request.as_ref()?.started_at;
        let limit = i64::try_from(deadline.as_millis()).unwrap_or(i64::MAX);
        if now.value().saturating_sub(started_at.value()) < limit {
            return None;
        }

        tracing::warn!("No answer from the server within {:?}, cancelling search", deadline);
        sink.emit(OutboundEvent::StopSearch {
            user_id: self.local_user.clone(),
        });
        self.finish(SearchStatus::TimedOut)
    }

    /// `Searching` while a request is outstanding, `Idle` otherwise.
    pub fn status(&self) -> SearchStatus {
        self.request
            .as_ref()
            .map_or(SearchStatus::Idle, |request| request.status)
    }

    pub fn request(&self) -> Option<&SearchRequest> {
        self.request.as_ref()
    }

    /// Move the outstanding request to its terminal status and drop it.
    fn finish(&mut self, status: SearchStatus) -> Option<SearchRequest> {
        let mut request = self.request.take()?;
        tracing::info!("Search {:?} -> {:?}", request.status, status);
        request.status = status;
        Some(request)
    }
}

impl InboundListener for MatchmakingController {
    fn on_inbound(&mut self, event: &InboundEvent) -> Option<SessionNotice> {
        match event {
            InboundEvent::Matched(found) => {
                self.on_matched(found);
                Some(SessionNotice::MatchFound(found.clone()))
            }
            InboundEvent::SearchTimedOut => {
                self.on_timed_out().map(SessionNotice::SearchTimedOut)
            }
            _ => None,
        }
    }
}
