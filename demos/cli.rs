use std::error;
use std::fs;

use bibkit::{Config, Entry, File, Parser, Writer};

use clap::Parser as CLIParser;

#[cfg(not(feature = "json"))]
#[derive(clap::Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Settings {
    /// Filepath to file to parse
    #[clap(short, long)]
    input: String,

    /// Return only entries with this ID
    #[clap(short, long)]
    query_id: Option<String>,

    /// Fill in fields inherited through crossref and xdata
    #[clap(short, long)]
    resolve: bool,

    /// Print the file as BibTeX again instead of listing entries
    #[clap(short, long)]
    export: bool,
}

#[cfg(feature = "json")]
#[derive(clap::Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Settings {
    /// Filepath to file to parse
    #[clap(short, long)]
    input: String,

    /// Return only entries with this ID
    #[clap(short, long)]
    query_id: Option<String>,

    /// Fill in fields inherited through crossref and xdata
    #[clap(short, long)]
    resolve: bool,

    /// Print the file as BibTeX again instead of listing entries
    #[clap(short, long)]
    export: bool,

    #[clap(long)]
    json: bool,
}

fn selected_entries(s: &Settings, file: &File) -> Vec<Entry> {
    file.entries()
        .filter(|entry| s.query_id.as_ref().map_or(true, |query| query == &entry.id))
        .map(|entry| {
            if s.resolve {
                entry.resolve_crossref(file, Config::global())
            } else {
                entry.clone()
            }
        })
        .collect()
}

fn print_human_readable(entries: &[Entry]) {
    for entry in entries.iter() {
        println!("type = {}", entry.kind);
        println!("id = {}", entry.id);
        for (name, value) in entry.fields() {
            println!("\t{}\t= {}", name, value.text());
        }
    }
}

#[cfg(feature = "json")]
fn print_json(entries: &[Entry]) -> Result<(), Box<dyn error::Error>> {
    println!("{}", serde_json::to_string(entries)?);
    Ok(())
}

fn main() -> Result<(), Box<dyn error::Error>> {
    let settings = Settings::parse();

    let data = fs::read(&settings.input)?;
    let mut parser = Parser::from_bytes(&data);
    let file = parser.parse_file()?;
    for diagnostic in parser.diagnostics() {
        eprintln!("{}: {}", settings.input, diagnostic);
    }

    if settings.export {
        print!("{}", Writer::new().to_string(&file));
        return Ok(());
    }

    let entries = selected_entries(&settings, &file);

    #[cfg(feature = "json")]
    {
        if settings.json {
            return print_json(&entries);
        }
    }
    print_human_readable(&entries);

    Ok(())
}
