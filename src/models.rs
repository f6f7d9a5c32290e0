use serde::Serialize;

/// Column titles, in file and table order.
pub const COLUMNS: [&str; 3] = ["Website", "Username", "Password"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub website: String,
    pub username: String,
    pub password: String,
}

impl Entry {
    pub fn new(
        website: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            website: website.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Only complete entries are ever written to the book.
    pub fn is_complete(&self) -> bool {
        !self.website.is_empty() && !self.username.is_empty() && !self.password.is_empty()
    }

    pub fn fields(&self) -> [&str; 3] {
        [&self.website, &self.username, &self.password]
    }

    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.website.to_lowercase().contains(&needle)
            || self.username.to_lowercase().contains(&needle)
    }
}

/// What a mutating store call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The table changed and the file was rewritten.
    Saved,
    /// At least one field was empty; nothing changed.
    Incomplete,
    /// Edit or delete was requested without a selected row.
    NoSelection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Add,
    Edit,
    Delete,
}

impl Action {
    /// Warning for edit/delete without a selected row. Add needs no row.
    pub fn no_selection_warning(self) -> Option<&'static str> {
        match self {
            Action::Add => None,
            Action::Edit => Some("Please select an entry to edit."),
            Action::Delete => Some("Please select an entry to delete."),
        }
    }

    pub fn done_message(self) -> &'static str {
        match self {
            Action::Add => "Entry added",
            Action::Edit => "Entry updated",
            Action::Delete => "Entry deleted",
        }
    }
}
