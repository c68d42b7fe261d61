//! Heuristic splitting of free-form person lists such as
//! “Doe, Jane and Ludwig van Beethoven and others”.

use crate::value::{Person, ValueItem};

/// Footnote markers copied along with author lists from papers
const FOOTNOTE_MARKERS: &[char] = &['*', '†', '‡', '•', '∗', '⋆', '§', '¶'];

/// Name suffixes, matched as a prefix followed by punctuation only
const SUFFIXES: &[&str] = &["jr", "sr", "ii", "iii", "iv"];

/// Result of splitting one field's text into persons
#[derive(Debug, Default)]
pub struct PersonList {
    /// persons in order, plus `PlainText("others")` for truncated lists
    pub items: Vec<ValueItem>,
    /// true if there was at least one person and every person was written
    /// as “Last, First”
    pub comma_ordered: bool,
    /// names that could only be read by falling back to a single last name
    pub ambiguous: Vec<String>,
}

/// Replace footnote markers (and digits glued to a name) by an “and”
/// separator. A comma following a marker belongs to the marker.
fn strip_footnote_markers(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut result = String::with_capacity(text.len());
    let mut level = 0usize;
    let mut i = 0;
    while i < chars.len() {
        let chr = chars[i];
        match chr {
            '{' => level += 1,
            '}' => level = level.saturating_sub(1),
            _ => {}
        }
        let glued_digit = chr.is_ascii_digit() && i > 0 && chars[i - 1].is_alphabetic();
        if level > 0 || !(FOOTNOTE_MARKERS.contains(&chr) || glued_digit) {
            result.push(chr);
            i += 1;
            continue;
        }
        while i < chars.len() && (FOOTNOTE_MARKERS.contains(&chars[i]) || chars[i].is_ascii_digit()) {
            i += 1;
        }
        let mut lookahead = i;
        while lookahead < chars.len() && chars[lookahead].is_whitespace() {
            lookahead += 1;
        }
        if chars.get(lookahead) == Some(&',') {
            i = lookahead + 1;
        }
        result.push_str(" and ");
    }
    result
}

/// Split on whitespace outside of curly braces
fn split_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut level = 0usize;
    for chr in text.chars() {
        match chr {
            '{' => level += 1,
            '}' => level = level.saturating_sub(1),
            _ => {}
        }
        if chr.is_whitespace() && level == 0 {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        } else {
            current.push(chr);
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Split on commas outside of curly braces; parts are trimmed but kept
/// even if empty
fn split_commas(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut level = 0usize;
    for chr in text.chars() {
        match chr {
            '{' => level += 1,
            '}' => level = level.saturating_sub(1),
            ',' if level == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(chr);
    }
    parts.push(current.trim().to_string());
    parts
}

/// “Jr.”, “Sr”, “III,” but not “Srinivasan” or “Ivanov”
fn is_suffix(token: &str) -> bool {
    let token = token.to_lowercase();
    SUFFIXES.iter().any(|suffix| {
        token
            .strip_prefix(suffix)
            .map_or(false, |rest| !rest.chars().any(char::is_alphanumeric))
    })
}

/// Number of tokens starting upper case, i.e. ignoring “von” parts
fn capitalized_tokens(text: &str) -> usize {
    split_tokens(text).iter().filter(|t| !starts_lowercase(t)).count()
}

/// PubMed writes initials without periods after the last name: “Tuckwell HC”
fn is_initials(token: &str) -> bool {
    let count = token.chars().count();
    (1..=2).contains(&count) && token.chars().all(char::is_uppercase) && !is_suffix(token)
}

fn starts_lowercase(token: &str) -> bool {
    token.chars().next().map_or(false, char::is_lowercase)
}

/// Read one name written without commas. Returns the person and whether
/// the split was a guess.
fn person_from_natural(tokens: &[String]) -> (Person, bool) {
    if tokens.len() == 1 {
        return (Person::new("", &tokens[0], ""), false);
    }

    let initials = tokens.iter().rev().take_while(|t| is_initials(t)).count();
    if initials > 0 && initials < tokens.len() {
        let split = tokens.len() - initials;
        let last = tokens[..split].join(" ");
        let first = tokens[split..].join(" ");
        return (Person::new(&first, &last, ""), false);
    }

    let mut tokens = tokens;
    let mut suffix = "";
    if tokens.len() > 1 && is_suffix(&tokens[tokens.len() - 1]) {
        suffix = tokens[tokens.len() - 1].as_str();
        tokens = &tokens[..tokens.len() - 1];
    }

    // “von” parts start lower case and belong to the last name; the final
    // token is always part of the last name
    let split = tokens[..tokens.len() - 1]
        .iter()
        .position(|t| starts_lowercase(t))
        .unwrap_or(tokens.len() - 1);
    let first = tokens[..split].join(" ");
    let last = tokens[split..].join(" ");
    let guessed = split == 0 && tokens.len() > 1;
    (Person::new(&first, &last, suffix), guessed)
}

/// Read one name. Returns the person, whether it was written with a comma
/// and whether the split was a guess.
fn person_from_tokens(tokens: &[String]) -> (Person, bool, bool) {
    let joined = tokens.join(" ");
    let parts = split_commas(&joined);
    if parts.len() == 1 {
        let (person, guessed) = person_from_natural(tokens);
        return (person, false, guessed);
    }
    let last = &parts[0];
    let first = &parts[1];
    let suffix = parts[2..].join(", ");
    if last.is_empty() {
        // “, Jane”: keep everything as last name rather than inventing structure
        let text = parts.iter().filter(|p| !p.is_empty()).cloned().collect::<Vec<_>>().join(" ");
        return (Person::new("", &text, ""), true, true);
    }
    // “John Doe, Jane Roe, …” is a list of natural names rather than one
    // “Last, First” name
    let guessed = capitalized_tokens(last) > 1 && capitalized_tokens(first) > 1;
    (Person::new(first, last, &suffix), true, guessed)
}

/// Split a person list field into persons. Names are separated by “and”
/// (or “und”) outside of curly braces, each name is read in the
/// “Last, First”, “Last, First, Suffix” or “First von Last Suffix” form.
pub fn parse_person_list(text: &str) -> PersonList {
    let text = if text.contains(FOOTNOTE_MARKERS) || text.contains(|c: char| c.is_ascii_digit()) {
        strip_footnote_markers(text)
    } else {
        text.to_string()
    };

    let tokens = split_tokens(&text);
    let mut result = PersonList::default();
    let mut all_comma = true;
    for group in tokens.split(|t| t == "and" || t == "und") {
        if group.is_empty() {
            continue;
        }
        if group.len() == 1 && group[0] == "others" {
            result.items.push(ValueItem::PlainText("others".to_string()));
            continue;
        }
        let (person, comma, guessed) = person_from_tokens(group);
        all_comma &= comma;
        if guessed {
            result.ambiguous.push(group.join(" "));
        }
        result.items.push(ValueItem::Person(person));
    }
    result.comma_ordered =
        all_comma && result.items.iter().any(|item| matches!(item, ValueItem::Person(_)));
    result
}

/// Read a single name like “Ludwig van Beethoven” or “Doe, Jane”
pub fn parse_person(text: &str) -> Option<Person> {
    let tokens = split_tokens(text);
    if tokens.is_empty() {
        return None;
    }
    Some(person_from_tokens(&tokens).0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persons(text: &str) -> Vec<Person> {
        parse_person_list(text)
            .items
            .into_iter()
            .filter_map(|item| match item {
                ValueItem::Person(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    fn names(text: &str) -> Vec<(String, String, String)> {
        persons(text)
            .into_iter()
            .map(|p| (p.first_name, p.last_name, p.suffix))
            .collect()
    }

    fn n(first: &str, last: &str, suffix: &str) -> (String, String, String) {
        (first.to_string(), last.to_string(), suffix.to_string())
    }

    #[test]
    fn test_comma_order() {
        let list = parse_person_list("Doe, Jane and Roe, Richard");
        assert!(list.comma_ordered);
        assert_eq!(names("Doe, Jane and Roe, Richard"), vec![n("Jane", "Doe", ""), n("Richard", "Roe", "")]);
        assert_eq!(names("Doe, Jane, Jr."), vec![n("Jane", "Doe", "Jr.")]);
        assert_eq!(names("van Beethoven, Ludwig"), vec![n("Ludwig", "van Beethoven", "")]);
    }

    #[test]
    fn test_natural_order() {
        let list = parse_person_list("Jane Doe and Doe, John");
        assert!(!list.comma_ordered);
        assert_eq!(names("J. R. R. Tolkien"), vec![n("J. R. R.", "Tolkien", "")]);
        assert_eq!(names("Ludwig van Beethoven"), vec![n("Ludwig", "van Beethoven", "")]);
        assert_eq!(names("Jean de la Fontaine"), vec![n("Jean", "de la Fontaine", "")]);
        assert_eq!(names("Henry Ford Jr."), vec![n("Henry", "Ford", "Jr.")]);
        assert_eq!(names("Henry Ford II"), vec![n("Henry", "Ford", "II")]);
        assert_eq!(names("Plato"), vec![n("", "Plato", "")]);
    }

    #[test]
    fn test_pubmed_initials() {
        assert_eq!(names("Tuckwell HC and Knuth D E"), vec![n("HC", "Tuckwell", ""), n("D E", "Knuth", "")]);
    }

    #[test]
    fn test_braces_protect() {
        assert_eq!(
            names("{Barnes and Noble} and {Doe, Inc.}"),
            vec![n("", "{Barnes and Noble}", ""), n("", "{Doe, Inc.}", "")]
        );
    }

    #[test]
    fn test_others() {
        let list = parse_person_list("Doe, Jane and others");
        assert_eq!(list.items.len(), 2);
        assert_eq!(list.items[1], ValueItem::PlainText("others".to_string()));
        assert!(list.comma_ordered);
    }

    #[test]
    fn test_footnote_markers() {
        assert_eq!(
            names("John Doe*, Jane Roe†, and Rich Poe‡"),
            vec![n("John", "Doe", ""), n("Jane", "Roe", ""), n("Rich", "Poe", "")]
        );
        assert_eq!(names("A. Smith1, B. Jones2"), vec![n("A.", "Smith", ""), n("B.", "Jones", "")]);
    }

    #[test]
    fn test_und() {
        assert_eq!(names("Hans Müller und Eva Schmidt"), vec![n("Hans", "Müller", ""), n("Eva", "Schmidt", "")]);
    }

    #[test]
    fn test_ambiguous() {
        let list = parse_person_list("john smith");
        assert_eq!(list.ambiguous, vec!["john smith".to_string()]);
        assert_eq!(names("john smith"), vec![n("", "john smith", "")]);
    }

    #[test]
    fn test_suffix_prefix_match() {
        assert!(is_suffix("Jr."));
        assert!(is_suffix("Sr"));
        assert!(is_suffix("III,"));
        assert!(!is_suffix("Srinivasan"));
        assert!(!is_suffix("Ivanov"));
        assert!(!is_suffix("Jr2"));
        assert_eq!(names("Henry Ford III."), vec![n("Henry", "Ford", "III.")]);
        assert_eq!(names("Ravi Srinivasan"), vec![n("Ravi", "Srinivasan", "")]);
    }

    #[test]
    fn test_comma_separated_natural_names() {
        let list = parse_person_list("John Doe, Jane Roe, and Rich Poe");
        assert_eq!(list.ambiguous, vec!["John Doe, Jane Roe,".to_string()]);
        assert_eq!(list.items.len(), 2);
        assert!(parse_person_list("van Beethoven, Ludwig Maria").ambiguous.is_empty());
        assert!(parse_person_list("de la Fontaine, Jean Pierre").ambiguous.is_empty());
    }

    #[test]
    fn test_single_person() {
        assert_eq!(parse_person("Doe, Jane"), Some(Person::new("Jane", "Doe", "")));
        assert_eq!(parse_person("   "), None);
    }
}
