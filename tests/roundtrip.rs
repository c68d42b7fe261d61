use std::error;
use std::str::FromStr;

use bibkit::{CasingProtection, Config, DiagnosticKind, Element, File, NameFormat, Parser, StringDelimiter, Writer};

fn squeeze(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

fn parse(src: &str) -> Result<File, Box<dyn error::Error>> {
    let mut p = Parser::from_str(src)?;
    let file = p.parse_file()?;
    assert!(p.diagnostics().is_empty(), "unexpected diagnostics: {:?}", p.diagnostics());
    Ok(file)
}

fn assert_roundtrip(src: &str) -> Result<File, Box<dyn error::Error>> {
    let file = parse(src)?;
    let written = Writer::new().to_string(&file);
    assert_eq!(squeeze(&written), squeeze(src), "written:\n{written}");
    Ok(file)
}

/// A small bibliography using the given delimiters, author list and
/// keyword list
fn bibliography(open: char, close: char, authors: &str, keywords: &str) -> String {
    format!(
        r#"% Exported by hand

@string{{acm = {open}ACM Press{close}}}

@article{{doe2020,
  author = {open}{authors}{close},
  title = {open}A Study of {{DNA}} Things{close},
  journal = acm # {open} Letters{close},
  keywords = {open}{keywords}{close},
  pages = {open}1--10{close},
  note = {open}Caf{{\'e}} \& Bar{close},
  year = 2020
}}

@inproceedings{{roe2021,
  editor = {open}{authors}{close},
  booktitle = {open}Proceedings{close},
  url = {open}https://example.org/a; https://example.org/b{close},
  month = jan
}}
"#
    )
}

#[test]
fn test_braces_comma() -> Result<(), Box<dyn error::Error>> {
    let src = bibliography('{', '}', "Doe, Jane and van Beethoven, Ludwig", "graphs; trees");
    let file = assert_roundtrip(&src)?;
    assert_eq!(file.properties.string_delimiter, StringDelimiter::Braces);
    assert_eq!(file.properties.name_format, NameFormat::LastFirst);
    assert_eq!(file.properties.list_separator, "; ");
    Ok(())
}

#[test]
fn test_braces_natural() -> Result<(), Box<dyn error::Error>> {
    let src = bibliography('{', '}', "Jane Doe and Ludwig van Beethoven", "graphs, trees");
    let file = assert_roundtrip(&src)?;
    assert_eq!(file.properties.string_delimiter, StringDelimiter::Braces);
    assert_eq!(file.properties.name_format, NameFormat::FirstLast);
    assert_eq!(file.properties.list_separator, ", ");
    Ok(())
}

#[test]
fn test_quotes_comma() -> Result<(), Box<dyn error::Error>> {
    let src = bibliography('"', '"', "Doe, Jane and van Beethoven, Ludwig", "graphs; trees");
    let file = assert_roundtrip(&src)?;
    assert_eq!(file.properties.string_delimiter, StringDelimiter::Quotes);
    assert_eq!(file.properties.name_format, NameFormat::LastFirst);
    Ok(())
}

#[test]
fn test_quotes_natural() -> Result<(), Box<dyn error::Error>> {
    let src = bibliography('"', '"', "Jane Doe and Ludwig van Beethoven", "graphs, trees");
    let file = assert_roundtrip(&src)?;
    assert_eq!(file.properties.string_delimiter, StringDelimiter::Quotes);
    assert_eq!(file.properties.name_format, NameFormat::FirstLast);
    Ok(())
}

#[test]
fn test_protected_titles() -> Result<(), Box<dyn error::Error>> {
    let src = "@book{a,\n  title = {{The TeXbook}}\n}\n\n@book{b,\n  title = {{Concrete Mathematics}}\n}\n";
    let file = assert_roundtrip(src)?;
    assert_eq!(file.properties.protect_casing, CasingProtection::Always);
    Ok(())
}

#[test]
fn test_comment_styles() -> Result<(), Box<dyn error::Error>> {
    let src = "%% generated\n%% do not edit\n\n@comment{jabref-meta: databaseType:bibtex;}\n\nSome stray text\nspanning two lines\n\n@misc{m,\n  note = {x}\n}\n";
    assert_roundtrip(src)?;
    Ok(())
}

#[test]
fn test_encoding_roundtrip() -> Result<(), Box<dyn error::Error>> {
    let src = "@comment{x-kbibtex-encoding=iso-8859-1}\n\n@misc{m,\n\ttitle = {Café Ørsted}\n}\n";
    let (bytes, _, _) = encoding_rs::WINDOWS_1252.encode(src);
    let mut p = Parser::from_bytes(&bytes);
    let file = p.parse_file()?;
    assert_eq!(file.properties.encoding.as_deref(), Some("iso-8859-1"));
    assert_eq!(file.entries().next().and_then(|e| e.plain_text("title")), Some("Café Ørsted".to_string()));
    assert_eq!(Writer::new().to_bytes(&file), bytes.into_owned());
    Ok(())
}

#[test]
fn test_reparse_is_stable() -> Result<(), Box<dyn error::Error>> {
    let src = bibliography('{', '}', "Doe, Jane, Jr. and others", "a\nb");
    let first = parse(&src)?;
    let second = parse(&Writer::new().to_string(&first))?;
    let left: Vec<&Element> = first.elements().collect();
    let right: Vec<&Element> = second.elements().collect();
    assert_eq!(left, right);
    Ok(())
}

#[test]
fn test_crossref_after_parse() -> Result<(), Box<dyn error::Error>> {
    let src = r#"@inbook{chapter, title = {Chapter One}, crossref = {whole}, xdata = {pub}}
@book{whole, title = {The Whole Book}, author = {Doe, Jane}, year = 1999}
@xdata{pub, publisher = {ACME}, location = {Springfield}}"#;
    let file = parse(src)?;
    let chapter = file.entry("chapter").ok_or("entry missing")?;
    let resolved = chapter.resolve_crossref(&file, Config::global());
    assert_eq!(resolved.plain_text("title"), Some("Chapter One".to_string()));
    assert_eq!(resolved.plain_text("booktitle"), Some("The Whole Book".to_string()));
    assert_eq!(resolved.plain_text("bookauthor"), Some("Jane Doe".to_string()));
    assert_eq!(resolved.plain_text("year"), Some("1999".to_string()));
    assert_eq!(resolved.plain_text("publisher"), Some("ACME".to_string()));
    assert!(!resolved.contains("crossref") && !resolved.contains("xdata"));
    assert_eq!(resolved.resolve_crossref(&file, Config::global()), resolved);
    Ok(())
}

#[test]
fn test_broken_file_keeps_good_entries() -> Result<(), Box<dyn error::Error>> {
    let src = "@article{a, title = {ok}}\n@article{b, title = {missing comma} year = 2000}\n@article{a, title = {dup}}";
    let mut p = Parser::from_str(src)?;
    let file = p.parse_file()?;
    let ids: Vec<&str> = file.entries().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "a-2"]);
    let kinds: Vec<DiagnosticKind> = p.diagnostics().iter().map(|d| d.kind).collect();
    assert_eq!(kinds, vec![DiagnosticKind::Syntax, DiagnosticKind::Structural]);
    Ok(())
}

#[test]
fn test_concatenated_preamble() -> Result<(), Box<dyn error::Error>> {
    let src = "@preamble{\"\\newcommand{\\a}{A}\" # \"\\newcommand{\\b}{B}\"}\n";
    let file = parse(src)?;
    assert_eq!(Writer::new().to_string(&file), src);
    let again = parse(&Writer::new().to_string(&file))?;
    match again.elements().next() {
        Some(Element::Preamble(preamble)) => assert_eq!(preamble.value.len(), 2),
        other => panic!("expected preamble, got {:?}", other),
    }
    Ok(())
}

#[test]
fn test_delimited_numbers_stay_delimited() -> Result<(), Box<dyn error::Error>> {
    let src = "@book{b,\n\tyear = {1997},\n\tvolume = {2}\n}\n";
    let file = parse(src)?;
    assert!(!file.properties.bare_numbers);
    assert_eq!(Writer::new().to_string(&file), src);

    let src = "@book{b,\n\tyear = 1997\n}\n";
    let file = parse(src)?;
    assert!(file.properties.bare_numbers);
    assert_eq!(Writer::new().to_string(&file), src);
    Ok(())
}
