use std::collections::VecDeque;

use tokio::time::Instant;

const KEPT_NOTICES: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NoticeId(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Loading,
    Success,
    Info,
    Error,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Notice {
    pub id: NoticeId,
    pub level: NoticeLevel,
    pub message: String,
    pub updated_at: Instant,
}

/// Toast-style notices. One slot per action, updated in place as the action
/// moves from loading to its outcome.
#[derive(Clone, Debug, Default)]
pub struct NoticeBoard {
    next_id: u64,
    notices: VecDeque<Notice>,
}

impl NoticeBoard {
    pub fn open(&mut self, level: NoticeLevel, message: impl Into<String>) -> NoticeId {
        let id = NoticeId(self.next_id);
        self.next_id += 1;
        self.push(Notice {
            id,
            level,
            message: message.into(),
            updated_at: Instant::now(),
        });
        id
    }

    /// Replaces the content of `id`. A notice that already scrolled away is
    /// brought back.
    pub fn update(&mut self, id: NoticeId, level: NoticeLevel, message: impl Into<String>) {
        let message = message.into();
        let now = Instant::now();
        match self.notices.iter_mut().find(|notice| notice.id == id) {
            Some(notice) => {
                notice.level = level;
                notice.message = message;
                notice.updated_at = now;
            }
            None => self.push(Notice {
                id,
                level,
                message,
                updated_at: now,
            }),
        }
    }

    pub fn get(&self, id: NoticeId) -> Option<&Notice> {
        self.notices.iter().find(|notice| notice.id == id)
    }

    /// Most recently opened notice.
    pub fn latest(&self) -> Option<&Notice> {
        self.notices.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter()
    }

    pub fn clear(&mut self) {
        self.notices.clear();
    }

    fn push(&mut self, notice: Notice) {
        if self.notices.len() == KEPT_NOTICES {
            self.notices.pop_front();
        }
        self.notices.push_back(notice);
    }
}
