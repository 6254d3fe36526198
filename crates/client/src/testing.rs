//! Test doubles for code built on the client layer
//!
//! Enabled by the `test-utils` feature.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sessionlink_domain::TokenGrant;

use crate::refresh::{RefreshClient, RefreshError};

#[derive(Default)]
struct MockState {
    script: VecDeque<Result<TokenGrant, RefreshError>>,
    tokens_seen: Vec<String>,
}

/// Scripted [`RefreshClient`]
///
/// Responses are returned in the order they were added; the last one keeps
/// being returned once the script runs out. With no script at all every call
/// is rejected with 401. Clones share the script and the call log.
#[derive(Clone, Default)]
pub struct MockRefreshClient {
    state: Arc<Mutex<MockState>>,
    delay: Option<Duration>,
}

impl MockRefreshClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a response to the script.
    #[must_use]
    pub fn respond_with(self, response: Result<TokenGrant, RefreshError>) -> Self {
        self.state.lock().script.push_back(response);
        self
    }

    /// Hold every call for `delay` before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of refresh calls made
    pub fn calls(&self) -> usize {
        self.state.lock().tokens_seen.len()
    }

    /// Refresh tokens received, in call order
    pub fn tokens_seen(&self) -> Vec<String> {
        self.state.lock().tokens_seen.clone()
    }
}

#[async_trait]
impl RefreshClient for MockRefreshClient {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, RefreshError> {
        let response = {
            let mut state = self.state.lock();
            state.tokens_seen.push(refresh_token.to_string());
            if state.script.len() > 1 {
                state.script.pop_front()
            } else {
                state.script.front().cloned()
            }
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        response.unwrap_or(Err(RefreshError::Rejected { status: 401 }))
    }
}
