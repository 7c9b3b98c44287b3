// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! File selection and output naming.
//!
//! `READ_FILES` holds tokens separated by `;` or `:`. Each token is, in
//! order of precedence:
//!
//! 1. an existing file, read as is
//! 2. an existing directory, all files in it
//! 3. a regular expression matched against `dir/name` of the files in the
//!    token's parent directory
//!
//! A token matching nothing is kept as a plain path so that opening it
//! reports the problem. Once a directory or pattern was expanded, the whole
//! selection is ordered by path.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use regex::Regex;
use tracing::warn;

/// Separators between `READ_FILES` tokens.
pub const TOKEN_SEPARATORS: &[char] = &[';', ':'];

static WRITE_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Resolves a `READ_FILES` setting into the files to read.
pub fn resolve_read_files(setting: &str) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut sort = false;

    for token in setting.split(TOKEN_SEPARATORS).filter(|t| !t.is_empty()) {
        let path = Path::new(token);
        if path.is_file() {
            files.push(path.to_path_buf());
        } else if path.is_dir() {
            files.extend(list_files(path, |_| true));
            sort = true;
        } else {
            let matched = expand_pattern(token);
            if matched.is_empty() {
                files.push(path.to_path_buf());
            } else {
                files.extend(matched);
            }
            sort = true;
        }
    }

    if sort {
        files.sort();
    }
    files
}

fn expand_pattern(token: &str) -> Vec<PathBuf> {
    let pattern = match Regex::new(&format!("^(?:{})$", token)) {
        Ok(pattern) => pattern,
        Err(e) => {
            warn!(token, error = %e, "READ_FILES token is neither a path nor a regular expression");
            return Vec::new();
        }
    };

    let (dir, separator) = match token.rfind('/').filter(|&pos| pos > 0) {
        Some(pos) => (&token[..pos], "/"),
        None => match token.rfind('\\').filter(|&pos| pos > 0) {
            Some(pos) => (&token[..pos], "\\"),
            None => ("", ""),
        },
    };
    let search = if dir.is_empty() { Path::new(".") } else { Path::new(dir) };

    list_files(search, |name| pattern.is_match(&format!("{}{}{}", dir, separator, name)))
}

fn list_files(dir: &Path, accept: impl Fn(&str) -> bool) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map(&accept)
                .unwrap_or(false)
        })
        .collect()
}

/// Returns the name of a new output file: `prefix` + millis + `_` + sequence + `suffix`.
pub fn output_file_name(prefix: &str, suffix: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let sequence = WRITE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{}{}_{}{}", prefix, millis, sequence, suffix)
}

/// Returns `true` if `name` looks like a file written into a `WRITE_FILES`
/// directory.
pub fn is_written_file(name: &str, prefix: &str, suffix: &str) -> bool {
    name.len() >= prefix.len() + suffix.len() && name.starts_with(prefix) && name.ends_with(suffix)
}
