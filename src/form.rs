use crate::models::{Entry, COLUMNS};

/// Modal three-field form used for both add and edit.
#[derive(Debug, Default, Clone)]
pub struct EntryForm {
    fields: [String; 3],
    step: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Confirmed,
}

impl EntryForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// A form pre-filled with an existing row, for edit.
    pub fn prefilled(entry: &Entry) -> Self {
        Self {
            fields: [
                entry.website.clone(),
                entry.username.clone(),
                entry.password.clone(),
            ],
            step: 0,
        }
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn label(&self) -> &'static str {
        COLUMNS[self.step]
    }

    pub fn value(&self, index: usize) -> &str {
        &self.fields[index]
    }

    pub fn push(&mut self, c: char) {
        self.fields[self.step].push(c);
    }

    pub fn pop(&mut self) {
        self.fields[self.step].pop();
    }

    pub fn clear_field(&mut self) {
        self.fields[self.step].clear();
    }

    pub fn next_field(&mut self) {
        self.step = (self.step + 1).min(self.fields.len() - 1);
    }

    pub fn prev_field(&mut self) {
        self.step = self.step.saturating_sub(1);
    }

    /// Enter: move to the next field, or confirm on the last one.
    pub fn advance(&mut self) -> Step {
        if self.step + 1 >= self.fields.len() {
            Step::Confirmed
        } else {
            self.step += 1;
            Step::Continue
        }
    }

    /// The typed values on confirm, three empty strings on cancel.
    pub fn finish(self, confirmed: bool) -> Entry {
        if !confirmed {
            return Entry::default();
        }
        let [website, username, password] = self.fields;
        Entry {
            website,
            username,
            password,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_str(form: &mut EntryForm, s: &str) {
        s.chars().for_each(|c| form.push(c));
    }

    #[test]
    fn test_fill_and_confirm() {
        let mut form = EntryForm::new();
        type_str(&mut form, "example.com");
        assert_eq!(form.advance(), Step::Continue);
        type_str(&mut form, "alice");
        assert_eq!(form.advance(), Step::Continue);
        assert_eq!(form.label(), "Password");
        type_str(&mut form, "pw");
        assert_eq!(form.advance(), Step::Confirmed);

        assert_eq!(form.finish(true), Entry::new("example.com", "alice", "pw"));
    }

    #[test]
    fn test_cancel_yields_empty_strings() {
        let form = EntryForm::prefilled(&Entry::new("a.com", "u", "p"));
        assert_eq!(form.finish(false), Entry::new("", "", ""));
    }

    #[test]
    fn test_prefill_and_field_editing() {
        let mut form = EntryForm::prefilled(&Entry::new("a.com", "user", "pass"));
        assert_eq!(form.value(0), "a.com");

        form.next_field();
        form.pop();
        form.next_field();
        form.clear_field();
        form.next_field();
        assert_eq!(form.step(), 2);
        form.prev_field();
        form.prev_field();
        form.prev_field();
        assert_eq!(form.step(), 0);

        let entry = form.finish(true);
        assert_eq!(entry, Entry::new("a.com", "use", ""));
        assert!(!entry.is_complete());
    }
}
