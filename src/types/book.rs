//! Book, outline and chapter entities as the core sees them.

use serde::{Deserialize, Serialize};

/// A book owned by one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub topic: String,
    pub audience: String,
    pub expertise_level: String,
}

/// Editable outline for a book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outline {
    pub id: String,
    pub book_id: String,
    pub title: String,
    pub sections: Vec<OutlineSection>,
}

/// One planned chapter in an outline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineSection {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub order_index: usize,
}

impl OutlineSection {
    pub fn new(title: impl Into<String>, order_index: usize) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            description: String::new(),
            order_index,
        }
    }
}

/// A drafted chapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: String,
    pub book_id: String,
    #[serde(default)]
    pub section_id: Option<String>,
    pub title: String,
    pub content: String,
    pub word_count: usize,
    pub order_index: usize,
}

/// Writing tone requested for chapter drafting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Professional,
    Conversational,
    Academic,
    Friendly,
}

impl std::fmt::Display for Tone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tone::Professional => write!(f, "professional"),
            Tone::Conversational => write!(f, "conversational"),
            Tone::Academic => write!(f, "academic"),
            Tone::Friendly => write!(f, "friendly"),
        }
    }
}

/// Reader expertise the chapter is pitched at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Expertise {
    Beginner,
    #[default]
    Intermediate,
    Expert,
}

impl std::fmt::Display for Expertise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expertise::Beginner => write!(f, "beginner"),
            Expertise::Intermediate => write!(f, "intermediate"),
            Expertise::Expert => write!(f, "expert"),
        }
    }
}
