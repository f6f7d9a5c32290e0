use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use inquire::{Password, Select, Text};
use std::path::{Path, PathBuf};

use crate::models::{Action, Entry, Outcome, COLUMNS};
use crate::store::EntryStore;

#[derive(Parser)]
#[command(name = "account-book")]
#[command(about = "Local password book kept in a CSV file")]
#[command(version)]
pub struct Cli {
    /// CSV file holding the entries [default: accountBook.csv]
    #[arg(short, long, global = true)]
    pub file: Option<PathBuf>,

    /// Log at debug level
    #[arg(long, global = true)]
    pub debug: bool,

    /// Append logs to this file (the only log sink while the table view runs)
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Args, Default, Debug, Clone)]
pub struct EntryArgs {
    #[arg(long)]
    pub website: Option<String>,

    #[arg(long)]
    pub username: Option<String>,

    #[arg(long)]
    pub password: Option<String>,
}

impl EntryArgs {
    fn is_empty(&self) -> bool {
        self.website.is_none() && self.username.is_none() && self.password.is_none()
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// List all entries
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Add an entry; missing fields are prompted for
    Add(EntryArgs),

    /// Edit an entry
    Edit {
        /// Row number as shown by `list`; picked interactively when omitted
        row: Option<usize>,

        #[command(flatten)]
        fields: EntryArgs,
    },

    /// Remove an entry (no confirmation)
    Remove {
        /// Row number as shown by `list`; picked interactively when omitted
        row: Option<usize>,
    },

    /// Search websites and usernames
    Search { query: String },

    /// Show diagnostics for the data file
    Debug,
}

pub struct CliHandler {
    store: EntryStore,
}

impl CliHandler {
    /// Runs one subcommand against the book at `data_file`. `debug` never
    /// opens the store, so it still reports on a file that does not parse.
    pub fn run(data_file: &Path, command: Commands) -> Result<()> {
        let open = || EntryStore::open(data_file).map(|store| Self { store });

        match command {
            Commands::List { json } => open()?.handle_list(json)?,
            Commands::Add(fields) => open()?.handle_add(fields)?,
            Commands::Edit { row, fields } => open()?.handle_edit(row, fields)?,
            Commands::Remove { row } => open()?.handle_remove(row)?,
            Commands::Search { query } => open()?.handle_search(&query),
            Commands::Debug => crate::debug::debug_store(data_file),
        }

        Ok(())
    }

    fn handle_list(&self, json: bool) -> Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(self.store.entries())?);
            return Ok(());
        }

        if self.store.is_empty() {
            println!("No entries.");
            return Ok(());
        }
        print!("{}", render_rows(self.store.entries().iter().enumerate()));
        Ok(())
    }

    fn handle_add(&mut self, fields: EntryArgs) -> Result<()> {
        let entry = prompt_entry(fields, None)?;
        let outcome = self.store.add(entry)?;
        report(Action::Add, outcome);
        Ok(())
    }

    fn handle_edit(&mut self, row: Option<usize>, fields: EntryArgs) -> Result<()> {
        let selected = match row {
            Some(row) => row.checked_sub(1),
            None => self.pick_row("Select entry to edit:")?,
        };

        let entry = match selected.and_then(|i| self.store.get(i)) {
            // keep the current value of any field not given on the command line
            Some(current) if !fields.is_empty() => Entry::new(
                fields.website.unwrap_or_else(|| current.website.clone()),
                fields.username.unwrap_or_else(|| current.username.clone()),
                fields.password.unwrap_or_else(|| current.password.clone()),
            ),
            Some(current) => prompt_entry(fields, Some(current))?,
            None => Entry::default(),
        };

        let outcome = self.store.edit(selected, entry)?;
        report(Action::Edit, outcome);
        Ok(())
    }

    fn handle_remove(&mut self, row: Option<usize>) -> Result<()> {
        let selected = match row {
            Some(row) => row.checked_sub(1),
            None => self.pick_row("Select entry to remove:")?,
        };

        let outcome = self.store.delete(selected)?;
        report(Action::Delete, outcome);
        Ok(())
    }

    fn handle_search(&self, query: &str) {
        let matches = self.store.search(query);
        if matches.is_empty() {
            println!("No entries match your search.");
            return;
        }
        let entries = self.store.entries();
        print!("{}", render_rows(matches.into_iter().map(|i| (i, &entries[i]))));
    }

    /// Interactive row choice; Esc means no selection.
    fn pick_row(&self, message: &str) -> Result<Option<usize>> {
        if self.store.is_empty() {
            return Ok(None);
        }

        let options: Vec<String> = self
            .store
            .entries()
            .iter()
            .enumerate()
            .map(|(i, e)| format!("{}. {} ({})", i + 1, e.website, e.username))
            .collect();

        let Some(selection) = Select::new(message, options.clone()).prompt_skippable()? else {
            return Ok(None);
        };
        Ok(options.iter().position(|o| *o == selection))
    }
}

/// Collects the three fields, prompting for those not given. Cancelling any
/// prompt yields an empty entry, which the store drops.
fn prompt_entry(fields: EntryArgs, current: Option<&Entry>) -> Result<Entry> {
    let website = match fields.website {
        Some(v) => Some(v),
        None => text_prompt("Website:", current.map(|e| e.website.as_str()))?,
    };
    let username = match fields.username {
        Some(v) => Some(v),
        None => text_prompt("Username:", current.map(|e| e.username.as_str()))?,
    };
    let password = match (fields.password, current) {
        (Some(v), _) => Some(v),
        (None, Some(e)) => text_prompt("Password:", Some(&e.password))?,
        (None, None) => Password::new("Password:")
            .with_display_toggle_enabled()
            .prompt_skippable()?,
    };

    match (website, username, password) {
        (Some(w), Some(u), Some(p)) => Ok(Entry::new(w, u, p)),
        _ => Ok(Entry::default()),
    }
}

fn text_prompt(message: &str, default: Option<&str>) -> Result<Option<String>> {
    let mut prompt = Text::new(message);
    if let Some(default) = default {
        prompt = prompt.with_default(default);
    }
    Ok(prompt.prompt_skippable()?)
}

fn report(action: Action, outcome: Outcome) {
    match outcome {
        Outcome::Saved => println!("{}.", action.done_message()),
        Outcome::Incomplete => println!("Nothing saved: website, username and password are all required."),
        Outcome::NoSelection => {
            if let Some(warning) = action.no_selection_warning() {
                eprintln!("{}", warning);
            }
        }
    }
}

/// Aligned table with 1-based row numbers.
pub fn render_rows<'a>(rows: impl Iterator<Item = (usize, &'a Entry)> + Clone) -> String {
    let width = |col: usize| {
        rows.clone()
            .map(|(_, e)| e.fields()[col].chars().count())
            .chain(std::iter::once(COLUMNS[col].len()))
            .max()
            .unwrap_or_default()
    };
    let (w0, w1) = (width(0), width(1));

    let mut out = format!(
        "{:>4}  {:<w0$}  {:<w1$}  {}\n",
        "#", COLUMNS[0], COLUMNS[1], COLUMNS[2]
    );
    for (i, e) in rows {
        out.push_str(&format!(
            "{:>4}  {:<w0$}  {:<w1$}  {}\n",
            i + 1,
            e.website,
            e.username,
            e.password
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_rows_aligns_columns() {
        let entries = [
            Entry::new("a.com", "u1", "p1"),
            Entry::new("longer-site.org", "someone", "p2"),
        ];
        let out = render_rows(entries.iter().enumerate());
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "   #  Website          Username  Password");
        assert_eq!(lines[1], "   1  a.com            u1        p1");
        assert_eq!(lines[2], "   2  longer-site.org  someone   p2");
    }

    #[test]
    fn test_parse_edit_with_flags() {
        let cli = Cli::try_parse_from([
            "account-book",
            "--file",
            "book.csv",
            "edit",
            "2",
            "--password",
            "new",
        ])
        .unwrap();

        assert_eq!(cli.file, Some(PathBuf::from("book.csv")));
        match cli.command {
            Some(Commands::Edit { row, fields }) => {
                assert_eq!(row, Some(2));
                assert_eq!(fields.password.as_deref(), Some("new"));
                assert!(fields.website.is_none());
            }
            _ => panic!("expected edit"),
        }
    }

    #[test]
    fn test_edit_flags_keep_other_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.csv");
        std::fs::write(&path, "a.com,u1,p1\nb.com,u2,p2\n").unwrap();

        CliHandler::run(
            &path,
            Commands::Edit {
                row: Some(2),
                fields: EntryArgs {
                    password: Some("rotated".to_string()),
                    ..Default::default()
                },
            },
        )
        .unwrap();
        CliHandler::run(&path, Commands::Remove { row: Some(1) }).unwrap();

        let reloaded = EntryStore::open(&path).unwrap();
        assert_eq!(reloaded.entries(), &[Entry::new("b.com", "u2", "rotated")]);
    }

    #[test]
    fn test_row_zero_is_no_selection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.csv");
        std::fs::write(&path, "a.com,u1,p1\n").unwrap();

        CliHandler::run(&path, Commands::Remove { row: Some(0) }).unwrap();
        CliHandler::run(&path, Commands::Remove { row: Some(5) }).unwrap();

        assert_eq!(EntryStore::open(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_debug_runs_on_unparsable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.csv");
        std::fs::write(&path, "only,two\n").unwrap();

        assert!(CliHandler::run(&path, Commands::List { json: false }).is_err());
        assert!(CliHandler::run(&path, Commands::Debug).is_ok());
    }

    #[test]
    fn test_unusable_data_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("sub");
        std::fs::write(&blocker, "not a directory").unwrap();
        let path = blocker.join("book.csv");

        let result = CliHandler::run(
            &path,
            Commands::Add(EntryArgs {
                website: Some("a.com".to_string()),
                username: Some("u".to_string()),
                password: Some("p".to_string()),
            }),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_failed_save_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("sub");
        let store = EntryStore::open(blocker.join("book.csv")).unwrap();
        std::fs::write(&blocker, "not a directory").unwrap();

        let mut handler = CliHandler { store };
        let result = handler.handle_add(EntryArgs {
            website: Some("a.com".to_string()),
            username: Some("u".to_string()),
            password: Some("p".to_string()),
        });
        assert!(result.is_err());
        assert_eq!(handler.store.len(), 1);
    }
}
