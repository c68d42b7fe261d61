use log::warn;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::entry::{CommentContext, Element, Entry};
use crate::value::{NameFormat, Value};

/// Preferred delimiter for string values
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StringDelimiter {
    #[default]
    Braces,
    Quotes,
}

/// Whether titles get their casing protected with an extra pair of braces
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CasingProtection {
    Always,
    Never,
    /// write titles as they are
    #[default]
    Keep,
}

/// Stylistic properties of a file, determined while parsing and honored
/// when writing the file again
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FileProperties {
    /// codec name, `None` meaning plain ASCII with LaTeX escapes
    pub encoding: Option<String>,
    pub string_delimiter: StringDelimiter,
    /// write numbers like `2020` without delimiters
    pub bare_numbers: bool,
    pub name_format: NameFormat,
    pub protect_casing: CasingProtection,
    /// style for comments created later on
    pub comment_context: CommentContext,
    /// separator written between keywords
    pub list_separator: String,
}

impl Default for FileProperties {
    fn default() -> Self {
        FileProperties {
            encoding: None,
            string_delimiter: StringDelimiter::default(),
            bare_numbers: true,
            name_format: NameFormat::default(),
            protect_casing: CasingProtection::default(),
            comment_context: CommentContext::default(),
            list_separator: "; ".to_string(),
        }
    }
}

/// Handle of an element within the [`File`] that created it. A handle
/// of a removed element never resolves again, even if its slot is reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ElementId {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone, Default)]
struct Slot {
    generation: u32,
    element: Option<Element>,
}

/// A bibliography: ordered elements plus file-wide properties
#[derive(Debug, Clone, Default)]
pub struct File {
    slots: Vec<Slot>,
    free: Vec<u32>,
    order: Vec<ElementId>,
    pub properties: FileProperties,
}

/// Derive an id not yet known from `id` by appending “-2”, “-3”, …
pub(crate) fn unique_id(id: &str, exists: impl Fn(&str) -> bool) -> String {
    if !exists(id) {
        return id.to_string();
    }
    let mut counter = 2;
    loop {
        let candidate = format!("{id}-{counter}");
        if !exists(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

impl File {
    pub fn new() -> File {
        File::default()
    }

    fn allocate(&mut self, mut element: Element) -> ElementId {
        if let Element::Entry(entry) = &mut element {
            if self.contains_id(&entry.id) {
                let renamed = unique_id(&entry.id, |id| self.contains_id(id));
                warn!("duplicate id '{}' renamed to '{}'", entry.id, renamed);
                entry.id = renamed;
            }
        }
        self.allocate_slot(element)
    }

    fn allocate_slot(&mut self, element: Element) -> ElementId {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.element = Some(element);
                ElementId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    element: Some(element),
                });
                ElementId {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        }
    }

    /// Append an element. An entry whose id is already in use gets a
    /// numeric suffix.
    pub fn push(&mut self, element: impl Into<Element>) -> ElementId {
        let id = self.allocate(element.into());
        self.order.push(id);
        id
    }

    /// Append an element whose id the caller already made unique
    pub(crate) fn push_unique(&mut self, element: Element) -> ElementId {
        let id = self.allocate_slot(element);
        self.order.push(id);
        id
    }

    /// Insert an element at `position` in the element order
    pub fn insert(&mut self, position: usize, element: impl Into<Element>) -> ElementId {
        let id = self.allocate(element.into());
        self.order.insert(position.min(self.order.len()), id);
        id
    }

    pub fn remove(&mut self, id: ElementId) -> Option<Element> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let element = slot.element.take()?;
        slot.generation += 1;
        self.free.push(id.index);
        self.order.retain(|other| *other != id);
        Some(element)
    }

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.element.as_ref()
    }

    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.element.as_mut()
    }

    /// Elements with their handles, in file order
    pub fn iter(&self) -> impl Iterator<Item = (ElementId, &Element)> {
        self.order
            .iter()
            .filter_map(move |id| self.get(*id).map(|element| (*id, element)))
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.iter().map(|(_, element)| element)
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.elements().filter_map(Element::as_entry)
    }

    /// Find the handle of the first entry with the given id
    pub fn find(&self, id: &str) -> Option<ElementId> {
        self.iter()
            .find(|(_, element)| matches!(element, Element::Entry(entry) if entry.id == id))
            .map(|(handle, _)| handle)
    }

    /// The first entry with the given id
    pub fn entry(&self, id: &str) -> Option<&Entry> {
        self.entries().find(|entry| entry.id == id)
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.entry(id).is_some()
    }

    /// Value of the `@string` macro with the given key (case-insensitive)
    pub fn macro_value(&self, key: &str) -> Option<&Value> {
        self.elements().find_map(|element| match element {
            Element::Macro(m) if m.key.eq_ignore_ascii_case(key) => Some(&m.value),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{Comment, Macro};
    use crate::value::ValueItem;

    #[test]
    fn test_duplicate_ids_renamed() {
        let mut file = File::new();
        file.push(Entry::new("article", "k1"));
        let second = file.push(Entry::new("article", "k1"));
        file.push(Entry::new("article", "k1"));
        let ids: Vec<&str> = file.entries().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["k1", "k1-2", "k1-3"]);
        assert_eq!(file.find("k1-2"), Some(second));
    }

    #[test]
    fn test_stale_handles() {
        let mut file = File::new();
        let a = file.push(Comment::new("a", CommentContext::Verbatim));
        let b = file.push(Entry::new("misc", "b"));
        assert!(file.remove(a).is_some());
        assert!(file.get(a).is_none());
        assert!(file.remove(a).is_none());

        let c = file.insert(0, Entry::new("misc", "c"));
        assert_ne!(a, c);
        assert!(file.get(a).is_none());
        let ids: Vec<&str> = file.entries().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b"]);
        assert!(file.get(b).is_some());
        assert_eq!(file.len(), 2);
    }

    #[test]
    fn test_macro_lookup() {
        let mut file = File::new();
        file.push(Macro::new("TUG", Value::from(ValueItem::PlainText("TeX Users Group".to_string()))));
        assert_eq!(file.macro_value("tug").map(Value::text), Some("TeX Users Group".to_string()));
        assert!(file.macro_value("ams").is_none());
    }
}
