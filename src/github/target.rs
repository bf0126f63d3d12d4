//! Resolution of user input into [`DownloadTarget`]s
//!
//! Accepted forms:
//! - `owner/repo`
//! - `owner/repo/some/dir`
//! - `owner/repo/tree/<branch>/some/dir`
//! - `https://github.com/owner/repo[/tree|blob/<branch>/some/dir]`

use crate::error::{Error, Result};
use crate::types::DownloadTarget;
use std::path::{Path, PathBuf};

/// Repository coordinates parsed from one input string
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepoLocation {
    /// Repository owner
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Branch ("" = repository default)
    pub branch: String,
    /// Directory inside the repository
    pub path: String,
}

impl RepoLocation {
    /// Directory name used when no output directory is given:
    /// `repo` or `repo-dir-sub` for a nested path
    pub fn default_dir_name(&self) -> String {
        if self.path.is_empty() {
            self.repo.clone()
        } else {
            format!("{}-{}", self.repo, self.path.replace('/', "-"))
        }
    }
}

/// Parse an `owner/repo[...]` path or a github.com URL
pub fn parse_location(input: &str) -> Result<RepoLocation> {
    let trimmed = input.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return parse_url(trimmed);
    }

    let parts = split_segments(trimmed);
    if parts.len() < 2 {
        return Err(Error::invalid_target(
            input,
            "must be at least owner/repo",
        ));
    }
    Ok(location_from_parts(&parts, false))
}

fn parse_url(input: &str) -> Result<RepoLocation> {
    let url = url::Url::parse(input).map_err(|e| Error::invalid_target(input, e.to_string()))?;

    match url.host_str() {
        Some("github.com") | Some("www.github.com") => {}
        _ => return Err(Error::invalid_target(input, "not a GitHub URL")),
    }

    let parts: Vec<String> = split_segments(url.path())
        .into_iter()
        .map(|segment| {
            urlencoding::decode(&segment)
                .map(|s| s.into_owned())
                .unwrap_or(segment)
        })
        .collect();
    if parts.len() < 2 {
        return Err(Error::invalid_target(input, "URL must name owner/repo"));
    }
    Ok(location_from_parts(&parts, true))
}

fn split_segments(path: &str) -> Vec<String> {
    path.trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `owner/repo` followed by `tree/<branch>/...` (or `blob/...` in URLs);
/// without the marker, the rest of a plain path is a directory, while the
/// rest of a URL is ignored
fn location_from_parts(parts: &[String], from_url: bool) -> RepoLocation {
    let owner = parts[0].clone();
    let repo = parts[1].trim_end_matches(".git").to_string();
    let mut branch = String::new();
    let mut path = String::new();

    let has_ref_marker = parts.len() >= 4
        && (parts[2] == "tree" || (from_url && parts[2] == "blob"));

    if has_ref_marker {
        branch = parts[3].clone();
        path = parts[4..].join("/");
    } else if !from_url && parts.len() > 2 {
        path = parts[2..].join("/");
    }

    RepoLocation {
        owner,
        repo,
        branch,
        path,
    }
}

/// Turn raw inputs into targets with local destinations
///
/// Without `base_dir`, each target lands in its default directory name. With
/// `base_dir` and a single input, the target lands in `base_dir` itself; with
/// several inputs each gets its own subdirectory of `base_dir`. In archive
/// mode the destination gets a `.zip` extension.
pub fn resolve_targets(
    inputs: &[String],
    base_dir: Option<&Path>,
    archive: bool,
) -> Result<Vec<DownloadTarget>> {
    let mut targets = Vec::with_capacity(inputs.len());

    for input in inputs {
        let location = parse_location(input)?;

        let local_dir = match base_dir {
            None => PathBuf::from(location.default_dir_name()),
            Some(base) if inputs.len() > 1 => base.join(location.default_dir_name()),
            Some(base) => base.to_path_buf(),
        };
        let local_dir = if archive {
            with_zip_extension(local_dir)
        } else {
            local_dir
        };

        targets.push(DownloadTarget {
            owner: location.owner,
            repo: location.repo,
            branch: location.branch,
            path: location.path,
            local_dir,
        });
    }

    Ok(targets)
}

fn with_zip_extension(path: PathBuf) -> PathBuf {
    let is_zip = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
    if is_zip {
        path
    } else {
        let mut name = path.into_os_string();
        name.push(".zip");
        PathBuf::from(name)
    }
}

/// Read targets from a list file: one per line, blank lines and `#` comments ignored
pub fn read_targets_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("failed to open list file '{}': {}", path.display(), e),
        ))
    })?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}
