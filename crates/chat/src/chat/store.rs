use super::message::{ChatMessage, MessageId, Role};

/// How a batch of messages enters the buffer. Every load is tagged with one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadMode {
    Reset,
    Prepend,
    Append,
}

/// Ordered message buffer for one (project, stage) pair.
///
/// The store only concatenates at the requested position; deduplication of
/// optimistic entries is the send path's job and paginated loads are disjoint
/// by page arithmetic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageStore {
    messages: Vec<ChatMessage>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn apply(&mut self, mode: LoadMode, items: Vec<ChatMessage>) {
        match mode {
            LoadMode::Reset => self.reset(items),
            LoadMode::Prepend => self.prepend(items),
            LoadMode::Append => self.append(items),
        }
    }

    pub fn reset(&mut self, items: Vec<ChatMessage>) {
        self.messages = items;
    }

    pub fn prepend(&mut self, items: Vec<ChatMessage>) {
        self.messages.splice(0..0, items);
    }

    pub fn append(&mut self, items: Vec<ChatMessage>) {
        self.messages.extend(items);
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.messages.iter().any(|message| message.id == id)
    }

    pub fn has_user_message(&self) -> bool {
        self.messages.iter().any(|message| message.role == Role::User)
    }

    /// Index of the newest entry matching `predicate`, scanning from the tail.
    pub fn rposition(&self, predicate: impl Fn(&ChatMessage) -> bool) -> Option<usize> {
        self.messages.iter().rposition(predicate)
    }

    /// Replaces the newest entry matching `predicate` in place.
    /// Returns whether a replacement happened.
    pub fn replace_last_matching(
        &mut self,
        predicate: impl Fn(&ChatMessage) -> bool,
        replacement: ChatMessage,
    ) -> bool {
        match self.rposition(predicate) {
            Some(index) => {
                self.messages[index] = replacement;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, index: usize) -> Option<ChatMessage> {
        (index < self.messages.len()).then(|| self.messages.remove(index))
    }
}
