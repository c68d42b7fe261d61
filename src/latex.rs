//! Conversion between LaTeX-escaped text as found in `.bib` files and Unicode.
//!
//! [`decode`] is applied to field text while parsing, [`encode`] is its
//! inverse and used by the writer. Both leave math mode (`$…$`) alone.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// (character, accent command, argument letter, ASCII transliteration)
const ACCENTS: &[(char, &str, char, &str)] = &[
    ('ä', "\"", 'a', "a"), ('ë', "\"", 'e', "e"), ('ï', "\"", 'i', "i"),
    ('ö', "\"", 'o', "o"), ('ü', "\"", 'u', "u"), ('ÿ', "\"", 'y', "y"),
    ('Ä', "\"", 'A', "A"), ('Ë', "\"", 'E', "E"), ('Ï', "\"", 'I', "I"),
    ('Ö', "\"", 'O', "O"), ('Ü', "\"", 'U', "U"), ('Ÿ', "\"", 'Y', "Y"),
    ('á', "'", 'a', "a"), ('é', "'", 'e', "e"), ('í', "'", 'i', "i"),
    ('ó', "'", 'o', "o"), ('ú', "'", 'u', "u"), ('ý', "'", 'y', "y"),
    ('Á', "'", 'A', "A"), ('É', "'", 'E', "E"), ('Í', "'", 'I', "I"),
    ('Ó', "'", 'O', "O"), ('Ú', "'", 'U', "U"), ('Ý', "'", 'Y', "Y"),
    ('ć', "'", 'c', "c"), ('ń', "'", 'n', "n"), ('ś', "'", 's', "s"),
    ('ź', "'", 'z', "z"), ('Ć', "'", 'C', "C"), ('Ń', "'", 'N', "N"),
    ('Ś', "'", 'S', "S"), ('Ź', "'", 'Z', "Z"),
    ('à', "`", 'a', "a"), ('è', "`", 'e', "e"), ('ì', "`", 'i', "i"),
    ('ò', "`", 'o', "o"), ('ù', "`", 'u', "u"), ('À', "`", 'A', "A"),
    ('È', "`", 'E', "E"), ('Ì', "`", 'I', "I"), ('Ò', "`", 'O', "O"),
    ('Ù', "`", 'U', "U"),
    ('â', "^", 'a', "a"), ('ê', "^", 'e', "e"), ('î', "^", 'i', "i"),
    ('ô', "^", 'o', "o"), ('û', "^", 'u', "u"), ('Â', "^", 'A', "A"),
    ('Ê', "^", 'E', "E"), ('Î', "^", 'I', "I"), ('Ô', "^", 'O', "O"),
    ('Û', "^", 'U', "U"),
    ('ã', "~", 'a', "a"), ('ñ', "~", 'n', "n"), ('õ', "~", 'o', "o"),
    ('Ã', "~", 'A', "A"), ('Ñ', "~", 'N', "N"), ('Õ', "~", 'O', "O"),
    ('ā', "=", 'a', "a"), ('ē', "=", 'e', "e"), ('ī', "=", 'i', "i"),
    ('ō', "=", 'o', "o"), ('ū', "=", 'u', "u"),
    ('ż', ".", 'z', "z"), ('Ż', ".", 'Z', "Z"), ('ė', ".", 'e', "e"),
    ('ç', "c", 'c', "c"), ('Ç', "c", 'C', "C"), ('ş', "c", 's', "s"),
    ('Ş', "c", 'S', "S"),
    ('č', "v", 'c', "c"), ('š', "v", 's', "s"), ('ž', "v", 'z', "z"),
    ('ř', "v", 'r', "r"), ('ě', "v", 'e', "e"), ('Č', "v", 'C', "C"),
    ('Š', "v", 'S', "S"), ('Ž', "v", 'Z', "Z"), ('Ř', "v", 'R', "R"),
    ('Ě', "v", 'E', "E"),
    ('ő', "H", 'o', "o"), ('ű', "H", 'u', "u"), ('Ő', "H", 'O', "O"),
    ('Ű', "H", 'U', "U"),
    ('ą', "k", 'a', "a"), ('ę', "k", 'e', "e"), ('Ą', "k", 'A', "A"),
    ('Ę', "k", 'E', "E"),
    ('ă', "u", 'a', "a"), ('ğ', "u", 'g', "g"), ('Ă', "u", 'A', "A"),
    ('ů', "r", 'u', "u"),
];

/// (character, standalone command, ASCII transliteration)
const LETTERS: &[(char, &str, &str)] = &[
    ('ß', "ss", "ss"), ('ø', "o", "o"), ('Ø', "O", "O"),
    ('æ', "ae", "ae"), ('Æ', "AE", "AE"), ('œ', "oe", "oe"),
    ('Œ', "OE", "OE"), ('å', "aa", "a"), ('Å', "AA", "A"),
    ('ł', "l", "l"), ('Ł', "L", "L"), ('ı', "i", "i"),
];

/// Accent commands spelled with a single non-letter
const SYMBOL_ACCENTS: &[&str] = &["\"", "'", "`", "^", "~", "=", "."];

/// Accent commands spelled with letters, which need an argument
const LETTER_ACCENTS: &[&str] = &["c", "v", "H", "k", "u", "r"];

/// Characters that have to be escaped with a backslash
const SPECIALS: &[char] = &['&', '%', '#'];

static DECODE_ACCENTS: Lazy<HashMap<(&'static str, char), char>> = Lazy::new(|| {
    ACCENTS
        .iter()
        .map(|&(chr, cmd, arg, _)| ((cmd, arg), chr))
        .collect()
});

static DECODE_LETTERS: Lazy<HashMap<&'static str, char>> =
    Lazy::new(|| LETTERS.iter().map(|&(chr, cmd, _)| (cmd, chr)).collect());

static ENCODE: Lazy<HashMap<char, String>> = Lazy::new(|| {
    let mut table = HashMap::new();
    for &(chr, cmd, arg, _) in ACCENTS {
        let encoded = if LETTER_ACCENTS.contains(&cmd) {
            format!("{{\\{cmd}{{{arg}}}}}")
        } else if arg == 'i' && cmd != "\"" {
            format!("{{\\{cmd}\\i}}")
        } else {
            format!("{{\\{cmd}{arg}}}")
        };
        table.insert(chr, encoded);
    }
    for &(chr, cmd, _) in LETTERS {
        table.entry(chr).or_insert_with(|| format!("{{\\{cmd}}}"));
    }
    table.insert('\u{2013}', "--".to_string());
    table.insert('\u{2014}', "---".to_string());
    table
});

static ASCII: Lazy<HashMap<char, &'static str>> = Lazy::new(|| {
    let mut table: HashMap<char, &'static str> = HashMap::new();
    for &(chr, _, _, ascii) in ACCENTS {
        table.insert(chr, ascii);
    }
    for &(chr, _, ascii) in LETTERS {
        table.insert(chr, ascii);
    }
    table.insert('\u{2013}', "-");
    table.insert('\u{2014}', "-");
    table
});

/// Try to read one command starting at the backslash at `chars[start]`.
/// Returns the decoded character and the number of chars consumed.
fn parse_command(chars: &[char], start: usize) -> Option<(char, usize)> {
    let next = *chars.get(start + 1)?;
    if SPECIALS.contains(&next) {
        return Some((next, 2));
    }
    if let Some(&cmd) = SYMBOL_ACCENTS.iter().find(|c| c.starts_with(next)) {
        let (arg, len) = parse_argument(chars, start + 2)?;
        let chr = *DECODE_ACCENTS.get(&(cmd, arg))?;
        return Some((chr, 2 + len));
    }
    if !next.is_ascii_alphabetic() {
        return None;
    }
    let mut end = start + 1;
    while end < chars.len() && chars[end].is_ascii_alphabetic() {
        end += 1;
    }
    let name: String = chars[start + 1..end].iter().collect();
    if let Some(&chr) = DECODE_LETTERS.get(name.as_str()) {
        // an empty group terminating the command belongs to it
        if chars.get(end) == Some(&'{') && chars.get(end + 1) == Some(&'}') {
            end += 2;
        }
        return Some((chr, end - start));
    }
    let cmd = *LETTER_ACCENTS.iter().find(|c| **c == name)?;
    let mut pos = end;
    while chars.get(pos) == Some(&' ') {
        pos += 1;
    }
    if pos == end && chars.get(pos) != Some(&'{') {
        return None;
    }
    let (arg, len) = parse_argument(chars, pos)?;
    let chr = *DECODE_ACCENTS.get(&(cmd, arg))?;
    Some((chr, pos + len - start))
}

/// Read the argument of an accent command: `a`, `{a}`, `\i` or `{\i}`
fn parse_argument(chars: &[char], pos: usize) -> Option<(char, usize)> {
    match chars.get(pos)? {
        '{' => match (chars.get(pos + 1)?, chars.get(pos + 2)?) {
            ('\\', 'i') if chars.get(pos + 3) == Some(&'}') => Some(('i', 4)),
            (&arg, '}') if arg.is_alphabetic() => Some((arg, 3)),
            _ => None,
        },
        '\\' if chars.get(pos + 1) == Some(&'i') => Some(('i', 2)),
        &arg if arg.is_ascii_alphabetic() => Some((arg, 1)),
        _ => None,
    }
}

/// Replace LaTeX accent commands and escaped special characters by their
/// Unicode counterparts. Unknown commands are kept as they are.
pub fn decode(text: &str) -> String {
    if !text.contains('\\') {
        return text.to_string();
    }
    let chars: Vec<char> = text.chars().collect();
    let mut result = String::with_capacity(text.len());
    let mut math = false;
    let mut i = 0;
    while i < chars.len() {
        let chr = chars[i];
        if chr == '$' && (i == 0 || chars[i - 1] != '\\') {
            math = !math;
        } else if !math && chr == '{' && chars.get(i + 1) == Some(&'\\') {
            // “{\"a}” as a whole
            if let Some((decoded, len)) = parse_command(&chars, i + 1) {
                if chars.get(i + 1 + len) == Some(&'}') {
                    result.push(decoded);
                    i += len + 2;
                    continue;
                }
            }
        } else if !math && chr == '\\' {
            if let Some((decoded, len)) = parse_command(&chars, i) {
                result.push(decoded);
                i += len;
                continue;
            }
            // keep unknown commands including their backslash verbatim
            if let Some(&next) = chars.get(i + 1) {
                result.push(chr);
                result.push(next);
                i += 2;
                continue;
            }
        }
        result.push(chr);
        i += 1;
    }
    result
}

/// Inverse of [`decode`]. Special characters are always escaped, non-ASCII
/// characters only if `ascii_only` is set (i.e. there is no other encoding
/// than LaTeX itself).
pub fn encode(text: &str, ascii_only: bool) -> String {
    let mut result = String::with_capacity(text.len());
    let mut math = false;
    let mut escape = false;
    for chr in text.chars() {
        if chr == '$' && !escape {
            math = !math;
            result.push(chr);
        } else if math {
            result.push(chr);
        } else if SPECIALS.contains(&chr) && !escape {
            result.push('\\');
            result.push(chr);
        } else if ascii_only && !chr.is_ascii() {
            match ENCODE.get(&chr) {
                Some(encoded) => result.push_str(encoded),
                None => result.push(chr),
            }
        } else {
            result.push(chr);
        }
        escape = chr == '\\' && !escape;
    }
    result
}

/// Transliterate to plain ASCII as required for ids and field names.
/// Characters without a known transliteration are dropped.
pub fn to_ascii(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for chr in text.chars() {
        if chr.is_ascii() {
            result.push(chr);
        } else if let Some(ascii) = ASCII.get(&chr) {
            result.push_str(ascii);
        }
    }
    result
}

/// Removes Teχ's groups from a string. For example,
/// given a string like “Written by {{Lukas} and {tajpulo}}”
/// returns “Written by Lukas and tajpulo”. Unbalanced input is returned
/// unchanged.
pub fn degroup(src: &str) -> String {
    let mut result = String::new();
    let mut level = 0i32;
    let mut escape = false;
    for chr in src.chars() {
        if chr == '{' && !escape {
            level += 1;
        } else if chr == '}' && !escape {
            level -= 1;
            if level < 0 {
                return src.to_string();
            }
        } else if chr == '\\' && !escape {
            escape = true;
            continue;
        } else {
            if escape {
                result.push('\\');
            }
            result.push(chr);
        }
        escape = false;
    }
    if escape {
        result.push('\\');
    }
    if level == 0 {
        result
    } else {
        src.to_string()
    }
}

/// Reduce the whitespace according to free form semantics
/// common in markup languages. Multiple whitespace sequences
/// are merged into one space. For example, “a message.  \nBest  regards”
/// becomes “a message. Best regards”.
pub fn reduce_whitespace(src: &str) -> String {
    let mut result = String::new();
    let mut was_whitespace = false;
    for chr in src.chars() {
        if chr.is_whitespace() && chr != '\u{00A0}' {
            if !was_whitespace {
                result.push(' ');
            }
            was_whitespace = true;
        } else {
            result.push(chr);
            was_whitespace = false;
        }
    }
    result
}

/// Render already decoded field text for display and search: drop
/// hyphenation hints, replace the “LaTeX” control sequence and “~”, remove
/// groups and reduce whitespace.
pub fn to_plain(src: &str) -> String {
    let replacements = [
        ("\\-", ""),
        ("\\LaTeX{}", "LaTeχ"),
        ("{\\LaTeX}", "LaTeχ"),
        ("\\LaTeX", "LaTeχ"),
        ("\\TeX{}", "Teχ"),
        ("\\TeX", "Teχ"),
        ("~", "\u{00A0}"),
    ];
    let mut result = src.to_string();
    for (pattern, replacement) in replacements.iter() {
        result = result.replace(pattern, replacement);
    }
    result = degroup(&result);
    reduce_whitespace(&result)
}

/// Is the whole text enclosed in one pair of curly braces, like “{DNA} {RNA}”
/// is not but “{DNA and RNA}” is?
pub(crate) fn is_brace_protected(raw: &str) -> bool {
    let raw = raw.trim();
    if !raw.starts_with('{') || !raw.ends_with('}') {
        return false;
    }
    let mut level = 0usize;
    let mut escape = false;
    let last = raw.chars().count() - 1;
    for (i, chr) in raw.chars().enumerate() {
        if !escape {
            match chr {
                '{' => level += 1,
                '}' => {
                    level = level.saturating_sub(1);
                    if level == 0 && i != last {
                        return false;
                    }
                }
                _ => {}
            }
        }
        escape = chr == '\\' && !escape;
    }
    level == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_accents() {
        assert_eq!(decode(r#"M{\"u}ller"#), "Müller");
        assert_eq!(decode(r#"M\"{u}ller"#), "Müller");
        assert_eq!(decode(r#"M\"uller"#), "Müller");
        assert_eq!(decode(r"Fran\c{c}ois"), "François");
        assert_eq!(decode(r"{\c c}a"), "ça");
        assert_eq!(decode(r"Stra{\ss}e"), "Straße");
        assert_eq!(decode(r"Stra\ss{}e"), "Straße");
        assert_eq!(decode(r"Mart{\'\i}n"), "Martín");
        assert_eq!(decode(r"Mart\'{\i}n"), "Martín");
        assert_eq!(decode(r"Ho{\v{s}}ek"), "Hošek");
    }

    #[test]
    fn test_decode_keeps_unknown_and_math() {
        assert_eq!(decode(r"\emph{x} \& y"), r"\emph{x} & y");
        assert_eq!(decode(r#"$\"a$ and \"a"#), r#"$\"a$ and ä"#);
        assert_eq!(decode(r"50\% of \#1"), "50% of #1");
    }

    #[test]
    fn test_encode_inverse() {
        for text in ["Müller", "François", "Straße", "Martín", "Hošek", "A & B"] {
            assert_eq!(decode(&encode(text, true)), text, "round trip of {text}");
        }
        assert_eq!(encode("Müller & Co", true), r#"M{\"u}ller \& Co"#);
        assert_eq!(encode("Müller & Co", false), r"Müller \& Co");
        assert_eq!(encode("pages 1–10", true), "pages 1--10");
        assert_eq!(encode(r"$a & b$ \& c", true), r"$a & b$ \& c");
    }

    #[test]
    fn test_to_ascii() {
        assert_eq!(to_ascii("Müller2020"), "Muller2020");
        assert_eq!(to_ascii("Straße:Łódź"), "Strasse:Lodz");
        assert_eq!(to_ascii("日本"), "");
    }

    #[test]
    fn test_degroup() {
        assert_eq!(degroup("Written by {{Lukas} and {tajpulo}}"), "Written by Lukas and tajpulo");
        assert_eq!(degroup("{unbalanced"), "{unbalanced");
        assert_eq!(degroup(r"a \{ b"), r"a \{ b");
    }

    #[test]
    fn test_to_plain() {
        assert_eq!(to_plain("The {DNA} of\n  hyph\\-en\\-ation"), "The DNA of hyphenation");
        assert_eq!(to_plain("{\\LaTeX} for~all"), "LaTeχ for\u{00A0}all");
    }

    #[test]
    fn test_brace_protected() {
        assert!(is_brace_protected("{A Study}"));
        assert!(!is_brace_protected("{DNA} and {RNA}"));
        assert!(!is_brace_protected("A Study"));
        assert!(is_brace_protected("{The {DNA}}"));
    }
}
