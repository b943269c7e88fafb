use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message. Serializes as `{"role": ..., "content": ...}`,
/// the shape both chat-style APIs accept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Running conversation owned by a single provider.
///
/// The optional system seed is kept apart from the exchanged turns: `len`
/// and `turns` only cover user/assistant traffic, while `replay` yields the
/// seed first followed by every turn in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    seed: Option<Turn>,
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn seeded(system: impl Into<String>) -> Self {
        Self {
            seed: Some(Turn::system(system)),
            turns: Vec::new(),
        }
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn system(&self) -> Option<&str> {
        self.seed.as_ref().map(|turn| turn.content.as_str())
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn replay(&self) -> impl Iterator<Item = &Turn> {
        self.seed.iter().chain(self.turns.iter())
    }

    /// Drops every turn, the system seed included.
    pub fn clear(&mut self) {
        self.seed = None;
        self.turns.clear();
    }

    pub fn reseed(&mut self, system: impl Into<String>) {
        self.turns.clear();
        self.seed = Some(Turn::system(system));
    }
}
