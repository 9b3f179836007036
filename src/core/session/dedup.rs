use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

/// Suppresses repeated transcript text from the model.
///
/// A (role, text) pair is suppressed when the same pair was emitted less than
/// `cooldown` ago. Whitespace differences do not make text distinct.
#[derive(Debug)]
pub struct TextDedupCache {
    cooldown: Duration,
    last_emitted: HashMap<String, Instant>,
}

impl TextDedupCache {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_emitted: HashMap::new(),
        }
    }

    pub fn should_emit(&mut self, role: &str, text: &str) -> bool {
        self.should_emit_at(role, text, Instant::now())
    }

    /// Record and admit the pair unless it was emitted within the cooldown.
    pub fn should_emit_at(&mut self, role: &str, text: &str, now: Instant) -> bool {
        let key = cache_key(role, text);
        if let Some(last) = self.last_emitted.get(&key)
            && now.saturating_duration_since(*last) < self.cooldown
        {
            return false;
        }
        self.last_emitted.insert(key, now);

        let horizon = self.cooldown * 2;
        self.last_emitted
            .retain(|_, at| now.saturating_duration_since(*at) < horizon);
        true
    }

    pub fn clear(&mut self) {
        self.last_emitted.clear();
    }

    pub fn len(&self) -> usize {
        self.last_emitted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_emitted.is_empty()
    }
}

fn cache_key(role: &str, text: &str) -> String {
    let mut key = String::with_capacity(role.len() + text.len() + 1);
    key.push_str(role);
    key.push(':');
    for (i, word) in text.split_whitespace().enumerate() {
        if i > 0 {
            key.push(' ');
        }
        key.push_str(word);
    }
    key
}
