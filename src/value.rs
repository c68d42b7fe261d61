use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::ops::Deref;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::latex;

/// How names are rendered as text
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NameFormat {
    /// “Doe, Jane”
    #[default]
    LastFirst,
    /// “Jane Doe”
    FirstLast,
}

/// A person's name, as occurring in author or editor fields.
/// Two persons are equal if first and last name match; the suffix is ignored.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Person {
    pub first_name: String,
    pub last_name: String,
    pub suffix: String,
}

impl Person {
    pub fn new(first_name: &str, last_name: &str, suffix: &str) -> Person {
        Person {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            suffix: suffix.to_string(),
        }
    }

    /// Render the name in the requested order, keeping Teχ markup
    pub fn format(&self, format: NameFormat) -> String {
        let mut result = String::new();
        match format {
            NameFormat::LastFirst => {
                result.push_str(&self.last_name);
                if !self.first_name.is_empty() {
                    result.push_str(", ");
                    result.push_str(&self.first_name);
                }
                if !self.suffix.is_empty() {
                    if self.first_name.is_empty() {
                        // “Last, , Suffix” keeps the suffix from becoming a first name
                        result.push_str(", ");
                    }
                    result.push_str(", ");
                    result.push_str(&self.suffix);
                }
            }
            NameFormat::FirstLast => {
                for part in [&self.first_name, &self.last_name, &self.suffix] {
                    if part.is_empty() {
                        continue;
                    }
                    if !result.is_empty() {
                        result.push(' ');
                    }
                    result.push_str(part);
                }
            }
        }
        result
    }

    /// Plain text for display and search, e.g. “Jane Doe Jr.”
    pub fn text(&self) -> String {
        latex::to_plain(&self.format(NameFormat::FirstLast))
    }
}

impl PartialEq for Person {
    fn eq(&self, other: &Self) -> bool {
        self.first_name == other.first_name && self.last_name == other.last_name
    }
}

impl Eq for Person {}

impl Hash for Person {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.first_name.hash(state);
        self.last_name.hash(state);
    }
}

/// Whether a replacement must match a whole item or any substring of it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplaceMode {
    CompleteMatch,
    AnySubstring,
}

/// One typed fragment of a field value
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ValueItem {
    /// regular text, already LaTeX-decoded
    PlainText(String),
    /// text that must not be (un)escaped, e.g. URLs or file names
    VerbatimText(String),
    Person(Person),
    Keyword(String),
    /// reference to a macro defined by `@string`
    MacroKey(String),
}

fn replace_text(text: &mut String, before: &str, after: &str, mode: ReplaceMode) -> bool {
    match mode {
        ReplaceMode::CompleteMatch if text == before => {
            *text = after.to_string();
            true
        }
        ReplaceMode::AnySubstring if !before.is_empty() && text.contains(before) => {
            *text = text.replace(before, after);
            true
        }
        _ => false,
    }
}

fn contains(haystack: &str, pattern: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        haystack.contains(pattern)
    } else {
        haystack.to_lowercase().contains(&pattern.to_lowercase())
    }
}

impl ValueItem {
    /// Plain text rendering used for display, search and duplicate detection
    pub fn text(&self) -> String {
        match self {
            Self::PlainText(text) | Self::Keyword(text) => latex::to_plain(text),
            Self::VerbatimText(text) | Self::MacroKey(text) => text.clone(),
            Self::Person(person) => person.text(),
        }
    }

    /// Does this item contain `pattern`? Persons are matched against each
    /// name part as well as against their rendered text.
    pub fn contains_pattern(&self, pattern: &str, case_sensitive: bool) -> bool {
        match self {
            Self::PlainText(text) | Self::Keyword(text) => {
                contains(text, pattern, case_sensitive)
                    || contains(&latex::to_plain(text), pattern, case_sensitive)
            }
            Self::VerbatimText(text) | Self::MacroKey(text) => contains(text, pattern, case_sensitive),
            Self::Person(person) => {
                [&person.first_name, &person.last_name, &person.suffix]
                    .iter()
                    .any(|part| contains(part, pattern, case_sensitive))
                    || contains(&person.text(), pattern, case_sensitive)
            }
        }
    }

    /// Replace `before` by `after` within this item. Returns true if
    /// anything was changed.
    pub fn replace(&mut self, before: &str, after: &str, mode: ReplaceMode) -> bool {
        match self {
            Self::PlainText(text)
            | Self::VerbatimText(text)
            | Self::Keyword(text)
            | Self::MacroKey(text) => replace_text(text, before, after, mode),
            Self::Person(person) => {
                let first = replace_text(&mut person.first_name, before, after, mode);
                let last = replace_text(&mut person.last_name, before, after, mode);
                let suffix = replace_text(&mut person.suffix, before, after, mode);
                first || last || suffix
            }
        }
    }
}

/// The ordered sequence of items a field's content consists of
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Value(Vec<ValueItem>);

impl Value {
    pub fn new() -> Value {
        Value(Vec::new())
    }

    pub fn push(&mut self, item: ValueItem) {
        self.0.push(item);
    }

    pub fn items(&self) -> &[ValueItem] {
        &self.0
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Plain text of all items. Consecutive persons are joined by “and”,
    /// consecutive keywords and verbatim items by “; ”, everything
    /// else is concatenated as `#` would do.
    pub fn text(&self) -> String {
        let mut result = String::new();
        let mut previous: Option<&ValueItem> = None;
        for item in self.0.iter() {
            let text = item.text();
            if text.is_empty() {
                continue;
            }
            match (previous, item) {
                (Some(ValueItem::Person(_)), ValueItem::Person(_))
                | (Some(ValueItem::Person(_)), ValueItem::PlainText(_)) => result.push_str(" and "),
                (Some(ValueItem::Keyword(_)), ValueItem::Keyword(_))
                | (Some(ValueItem::VerbatimText(_)), ValueItem::VerbatimText(_)) => {
                    result.push_str("; ")
                }
                _ => {}
            }
            result.push_str(&text);
            previous = Some(item);
        }
        result
    }

    pub fn contains_pattern(&self, pattern: &str, case_sensitive: bool) -> bool {
        self.0.iter().any(|item| item.contains_pattern(pattern, case_sensitive))
            || contains(&self.text(), pattern, case_sensitive)
    }

    pub fn contains(&self, item: &ValueItem) -> bool {
        self.0.contains(item)
    }

    /// Replace text in every item. An item whose text becomes identical to
    /// the text of an earlier item is removed.
    pub fn replace(&mut self, before: &str, after: &str, mode: ReplaceMode) {
        for item in self.0.iter_mut() {
            item.replace(before, after, mode);
        }
        self.dedup_by_text();
    }

    /// Replace every item rendering as `before` by `after`, or the whole
    /// value if its complete text equals `before`. Duplicates created this
    /// way are dropped.
    pub fn replace_with_item(&mut self, before: &str, after: ValueItem) {
        if self.text() == before {
            self.0.clear();
            self.0.push(after);
            return;
        }
        for item in self.0.iter_mut() {
            if item.text() == before {
                *item = after.clone();
            }
        }
        self.dedup_by_text();
    }

    fn dedup_by_text(&mut self) {
        let mut seen = HashSet::new();
        self.0.retain(|item| seen.insert(item.text()));
    }
}

impl Deref for Value {
    type Target = [ValueItem];

    fn deref(&self) -> &[ValueItem] {
        &self.0
    }
}

impl From<Vec<ValueItem>> for Value {
    fn from(items: Vec<ValueItem>) -> Self {
        Value(items)
    }
}

impl From<ValueItem> for Value {
    fn from(item: ValueItem) -> Self {
        Value(vec![item])
    }
}

impl FromIterator<ValueItem> for Value {
    fn from_iter<I: IntoIterator<Item = ValueItem>>(iter: I) -> Self {
        Value(iter.into_iter().collect())
    }
}

impl Extend<ValueItem> for Value {
    fn extend<I: IntoIterator<Item = ValueItem>>(&mut self, iter: I) {
        self.0.extend(iter)
    }
}

impl IntoIterator for Value {
    type Item = ValueItem;
    type IntoIter = std::vec::IntoIter<ValueItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'v> IntoIterator for &'v Value {
    type Item = &'v ValueItem;
    type IntoIter = std::slice::Iter<'v, ValueItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
