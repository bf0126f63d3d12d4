//! Interactive repository selection
//!
//! The listing itself lives on [`GitHubClient::list_repositories`]; this
//! module renders the numbered menu and reads the user's choice. Both take
//! generic readers/writers so the prompt loop can run against in-memory
//! buffers.
//!
//! [`GitHubClient::list_repositories`]: super::GitHubClient::list_repositories

use crate::error::{Error, Result};
use crate::types::Repository;
use std::io::{BufRead, Write};

/// Descriptions longer than this are cut and end in `...`
const MAX_DESCRIPTION_CHARS: usize = 60;

fn short_description(repo: &Repository) -> String {
    match repo.description.as_deref().map(str::trim) {
        None | Some("") => "(No description)".to_string(),
        Some(desc) if desc.chars().count() > MAX_DESCRIPTION_CHARS => {
            let cut: String = desc.chars().take(MAX_DESCRIPTION_CHARS - 3).collect();
            format!("{cut}...")
        }
        Some(desc) => desc.to_string(),
    }
}

/// Numbered menu, one repository per line, starting at 1
pub fn format_repository_list(owner: &str, repos: &[Repository]) -> String {
    let mut out = format!("Repositories for {owner}:\n");
    for (i, repo) in repos.iter().enumerate() {
        out.push_str(&format!(
            "[{}] {} - {}\n",
            i + 1,
            repo.name,
            short_description(repo)
        ));
    }
    out
}

/// Parse a 1-based menu choice
pub fn parse_selection(input: &str, count: usize) -> Option<usize> {
    input
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|n| (1..=count).contains(n))
}

/// Ask until a valid number in `1..=count` is entered; returns the 0-based index
///
/// End of input is an error rather than an endless prompt.
pub fn prompt_selection<R, W>(mut input: R, mut output: W, count: usize) -> Result<usize>
where
    R: BufRead,
    W: Write,
{
    if count == 0 {
        return Err(Error::Other("nothing to select from".to_string()));
    }

    loop {
        write!(output, "\nEnter repository number (1-{count}): ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Err(Error::Other("no selection made".to_string()));
        }
        match parse_selection(&line, count) {
            Some(n) => return Ok(n - 1),
            None => writeln!(
                output,
                "Invalid selection. Please enter a number between 1 and {count}."
            )?,
        }
    }
}
