//! Client configuration.

use std::time::Duration;

use crate::domain::EchoPolicy;

pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:8080/ws";
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8080/api";
pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;
pub const RECONNECT_INTERVAL_MILLIS: u64 = 1000;
/// Server-side matchmaking timeout.
pub const SEARCH_TIMEOUT_SECS: u64 = 60;
pub const SEARCH_GRACE_SECS: u64 = 5;
pub const SHUTDOWN_TIMEOUT_MILLIS: u64 = 2000;

/// How often and how long to retry a lost link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Consecutive failed attempts before giving up.
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RECONNECT_ATTEMPTS,
            interval: Duration::from_millis(RECONNECT_INTERVAL_MILLIS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub server_url: String,
    pub api_url: String,
    pub reconnect: ReconnectPolicy,
    pub search_timeout: Duration,
    /// Extra wait past `search_timeout` before the client gives up on its own.
    /// `None` disables the local deadline.
    pub search_grace: Option<Duration>,
    pub echo_policy: EchoPolicy,
    pub rejoin_on_reconnect: bool,
    pub shutdown_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            reconnect: ReconnectPolicy::default(),
            search_timeout: Duration::from_secs(SEARCH_TIMEOUT_SECS),
            search_grace: Some(Duration::from_secs(SEARCH_GRACE_SECS)),
            echo_policy: EchoPolicy::default(),
            rejoin_on_reconnect: true,
            shutdown_timeout: Duration::from_millis(SHUTDOWN_TIMEOUT_MILLIS),
        }
    }
}

impl ClientConfig {
    pub fn new(server_url: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            api_url: api_url.into(),
            ..Self::default()
        }
    }

    pub fn with_reconnect(mut self, max_attempts: u32, interval: Duration) -> Self {
        self.reconnect = ReconnectPolicy {
            max_attempts,
            interval,
        };
        self
    }

    pub fn with_search_timeout(mut self, timeout: Duration, grace: Option<Duration>) -> Self {
        self.search_timeout = timeout;
        self.search_grace = grace;
        self
    }

    pub fn with_echo_policy(mut self, echo_policy: EchoPolicy) -> Self {
        self.echo_policy = echo_policy;
        self
    }

    pub fn with_rejoin_on_reconnect(mut self, rejoin: bool) -> Self {
        self.rejoin_on_reconnect = rejoin;
        self
    }

    /// When the client stops an unanswered search by itself.
    pub fn local_search_deadline(&self) -> Option<Duration> {
        self.search_grace.map(|grace| self.search_timeout + grace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        // テスト項目: デフォルト設定が既定値を持つ
        // given (前提条件):
        let config = ClientConfig::default();

        // when (操作):
        let deadline = config.local_search_deadline();

        // then (期待する結果):
        assert_eq!(config.reconnect.max_attempts, 10);
        assert_eq!(config.reconnect.interval, Duration::from_secs(1));
        assert_eq!(config.echo_policy, EchoPolicy::SuppressSelf);
        assert!(config.rejoin_on_reconnect);
        assert_eq!(deadline, Some(Duration::from_secs(65)));
    }

    #[test]
    fn test_local_deadline_can_be_disabled() {
        // テスト項目: 猶予を None にするとローカルの検索期限が無効になる
        // given (前提条件):
        let config = ClientConfig::default().with_search_timeout(Duration::from_secs(30), None);

        // when (操作):
        let deadline = config.local_search_deadline();

        // then (期待する結果):
        assert_eq!(config.search_timeout, Duration::from_secs(30));
        assert_eq!(deadline, None);
    }

    #[test]
    fn test_builder_overrides() {
        // テスト項目: ビルダーで各設定を上書きできる
        // given (前提条件):
        let config = ClientConfig::new("ws://chat.example/ws", "https://chat.example/api")
            .with_reconnect(3, Duration::from_millis(50))
            .with_echo_policy(EchoPolicy::MatchPending)
            .with_rejoin_on_reconnect(false);

        // when (操作):
        let reconnect = config.reconnect;

        // then (期待する結果):
        assert_eq!(config.server_url, "ws://chat.example/ws");
        assert_eq!(config.api_url, "https://chat.example/api");
        assert_eq!(reconnect.max_attempts, 3);
        assert_eq!(reconnect.interval, Duration::from_millis(50));
        assert_eq!(config.echo_policy, EchoPolicy::MatchPending);
        assert!(!config.rejoin_on_reconnect);
    }
}
