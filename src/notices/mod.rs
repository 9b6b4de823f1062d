//! Dismissible user notices with a time-to-live.

use std::time::Duration;

use tokio::time::Instant;

use crate::errors::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub level: NoticeLevel,
    pub code: Option<&'static str>,
    pub message: String,
    pub created_at: Instant,
}

/// Notices shown to the user; each expires after the configured TTL.
#[derive(Debug)]
pub struct NoticeBoard {
    ttl: Duration,
    next_id: u64,
    notices: Vec<Notice>,
}

impl NoticeBoard {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            next_id: 1,
            notices: Vec::new(),
        }
    }

    fn push(&mut self, level: NoticeLevel, code: Option<&'static str>, message: String) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.notices.push(Notice {
            id,
            level,
            code,
            message,
            created_at: Instant::now(),
        });
        id
    }

    pub fn push_error(&mut self, err: &ClientError) -> u64 {
        self.push(NoticeLevel::Error, Some(err.error_code()), err.message())
    }

    pub fn push_info(&mut self, message: impl Into<String>) -> u64 {
        self.push(NoticeLevel::Info, None, message.into())
    }

    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.notices.len();
        self.notices.retain(|n| n.id != id);
        self.notices.len() != before
    }

    /// Notices still visible at `now`.
    pub fn active_at(&self, now: Instant) -> Vec<&Notice> {
        self.notices
            .iter()
            .filter(|n| now.saturating_duration_since(n.created_at) < self.ttl)
            .collect()
    }

    pub fn active(&self) -> Vec<&Notice> {
        self.active_at(Instant::now())
    }

    /// Drop expired notices.
    pub fn prune(&mut self) {
        let now = Instant::now();
        let ttl = self.ttl;
        self.notices
            .retain(|n| now.saturating_duration_since(n.created_at) < ttl);
    }
}
