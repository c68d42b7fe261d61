use indexmap::IndexMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// One entry in a `.bib` file
///
/// Field names are case-insensitive: `entry.value("TITLE")` finds a field
/// inserted as “Title”. The name is stored with the casing it was last
/// inserted with, and fields keep their insertion order for writing.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Entry {
    /// entry type, e.g. “article”
    pub kind: String,
    /// entry name, e.g. “DBLP:books/lib/Knuth97”
    pub id: String,
    /// lower-cased field name mapped to (original name, value)
    fields: IndexMap<String, (String, Value)>,
}

impl Entry {
    pub fn new(kind: &str, id: &str) -> Entry {
        Entry {
            kind: kind.to_string(),
            id: id.to_string(),
            fields: IndexMap::new(),
        }
    }

    /// Insert or replace a field. A replaced field keeps its position but
    /// takes the casing of `name`. Returns the previous value.
    pub fn insert(&mut self, name: &str, value: Value) -> Option<Value> {
        let key = name.to_lowercase();
        match self.fields.get_mut(&key) {
            Some(slot) => {
                let (_, previous) = std::mem::replace(slot, (name.to_string(), value));
                Some(previous)
            }
            None => {
                self.fields.insert(key, (name.to_string(), value));
                None
            }
        }
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.fields.get(&name.to_lowercase()).map(|(_, value)| value)
    }

    pub fn value_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields.get_mut(&name.to_lowercase()).map(|(_, value)| value)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.shift_remove(&name.to_lowercase()).map(|(_, value)| value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(&name.to_lowercase())
    }

    /// Field names with their original casing and values, in insertion order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.values().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Given the name of a field, return its content as plain text with
    /// Teχ grouping removed, e.g. for display or sorting.
    pub fn plain_text(&self, name: &str) -> Option<String> {
        self.value(name).map(Value::text)
    }
}

/// A named value defined with `@string{key = value}`
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Macro {
    pub key: String,
    pub value: Value,
}

impl Macro {
    pub fn new(key: &str, value: Value) -> Macro {
        Macro {
            key: key.to_string(),
            value,
        }
    }
}

/// Content of a `@preamble{…}`, kept as verbatim text and macro keys
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Preamble {
    pub value: Value,
}

/// How a comment was written in the source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CommentContext {
    /// `@comment{…}`
    #[default]
    Command,
    /// every line starts with the given prefix, e.g. “% ”
    Prefix(String),
    /// stray text outside of any `@` construct
    Verbatim,
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Comment {
    pub text: String,
    pub context: CommentContext,
}

impl Comment {
    pub fn new(text: &str, context: CommentContext) -> Comment {
        Comment {
            text: text.to_string(),
            context,
        }
    }
}

/// Anything a `.bib` file consists of
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Element {
    Entry(Entry),
    Macro(Macro),
    Preamble(Preamble),
    Comment(Comment),
}

impl Element {
    pub fn as_entry(&self) -> Option<&Entry> {
        match self {
            Element::Entry(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn as_entry_mut(&mut self) -> Option<&mut Entry> {
        match self {
            Element::Entry(entry) => Some(entry),
            _ => None,
        }
    }
}

impl From<Entry> for Element {
    fn from(entry: Entry) -> Self {
        Element::Entry(entry)
    }
}

impl From<Macro> for Element {
    fn from(m: Macro) -> Self {
        Element::Macro(m)
    }
}

impl From<Preamble> for Element {
    fn from(preamble: Preamble) -> Self {
        Element::Preamble(preamble)
    }
}

impl From<Comment> for Element {
    fn from(comment: Comment) -> Self {
        Element::Comment(comment)
    }
}
