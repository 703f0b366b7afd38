//! Interactive console commands.

/// A line typed at the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Save,
    Quit,
    Empty,
    Unknown,
}

impl Command {
    /// Only the first character counts, case-insensitively.
    pub fn parse(line: &str) -> Self {
        match line.trim().chars().next().map(|c| c.to_ascii_lowercase()) {
            None => Command::Empty,
            Some('s') => Command::Save,
            Some('q') => Command::Quit,
            Some(_) => Command::Unknown,
        }
    }
}
