/// Delimiters in the order they are tried. Only the first one occurring in
/// the text is used; they are never combined.
const DELIMITERS: [char; 3] = ['\n', ';', ','];

/// Keywords found in a field plus the delimiter that separated them
#[derive(Debug, Default, PartialEq)]
pub struct KeywordSplit {
    pub keywords: Vec<String>,
    pub delimiter: Option<char>,
}

impl KeywordSplit {
    /// The list separator to use when writing keywords back, if the
    /// delimiter found is worth remembering
    pub fn list_separator(&self) -> Option<&'static str> {
        match self.delimiter {
            Some(';') => Some("; "),
            Some(',') => Some(", "),
            _ => None,
        }
    }
}

fn simplify(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split the text of a keywords field. Without any delimiter the whole
/// text is a single keyword.
pub fn split_keywords(text: &str) -> KeywordSplit {
    let Some(delimiter) = DELIMITERS.into_iter().find(|d| text.contains(*d)) else {
        let keyword = simplify(text);
        return KeywordSplit {
            keywords: if keyword.is_empty() { Vec::new() } else { vec![keyword] },
            delimiter: None,
        };
    };
    let keywords = text
        .split(delimiter)
        .map(simplify)
        .filter(|k| !k.is_empty())
        .collect();
    KeywordSplit {
        keywords,
        delimiter: Some(delimiter),
    }
}
