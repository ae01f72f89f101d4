//! Prompt Assembler — builds a capability's system prompt from the `.txt`
//! fragments in its directory.
//!
//! Fragments are sorted by file name (byte-wise), trimmed, and joined with a
//! blank line. The same directory contents always produce the same bytes.

use std::collections::HashMap;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::{info, warn};

use crate::generation::capability::Capability;

const FRAGMENT_EXTENSION: &str = "txt";
const FRAGMENT_SEPARATOR: &str = "\n\n";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("failed to read prompt fragments from {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn unreadable(path: &Path) -> impl FnOnce(io::Error) -> PromptError + '_ {
    move |source| PromptError::Unreadable {
        path: path.to_path_buf(),
        source,
    }
}

/// Lists fragment files in `directory`, sorted by name.
fn fragment_files(directory: &Path) -> Result<Vec<PathBuf>, PromptError> {
    if !directory.is_dir() {
        return Err(PromptError::DirectoryNotFound(directory.to_path_buf()));
    }

    let mut names: Vec<OsString> = Vec::new();
    for entry in std::fs::read_dir(directory).map_err(unreadable(directory))? {
        let entry = entry.map_err(unreadable(directory))?;
        let path = entry.path();
        let is_fragment = path
            .extension()
            .is_some_and(|ext| ext == FRAGMENT_EXTENSION);
        if is_fragment && path.is_file() {
            names.push(entry.file_name());
        }
    }

    // OsString ordering is byte-wise, independent of locale and listing order.
    names.sort();

    Ok(names.into_iter().map(|n| directory.join(n)).collect())
}

/// Assembles the system prompt for one fragment directory.
///
/// An existing directory with no fragments yields an empty prompt and a warning.
pub fn assemble(directory: &Path) -> Result<String, PromptError> {
    let files = fragment_files(directory)?;

    if files.is_empty() {
        warn!("No prompt fragments found in {}", directory.display());
        return Ok(String::new());
    }

    let mut fragments = Vec::with_capacity(files.len());
    for file in &files {
        let content = std::fs::read_to_string(file).map_err(unreadable(file))?;
        fragments.push(content.trim().to_string());
    }

    info!(
        "Loaded {} prompt fragment(s) from {}",
        files.len(),
        directory.display()
    );

    Ok(fragments.join(FRAGMENT_SEPARATOR))
}

/// True when `directory` exists and holds at least one fragment.
pub fn validate_directory(directory: &Path) -> bool {
    fragment_files(directory).is_ok_and(|files| !files.is_empty())
}

/// Read-through cache of assembled prompts, keyed by capability.
///
/// Fragments only change with a redeploy, so a successful assembly is kept
/// for the life of the process. Failures are not cached. Two requests racing
/// on a cold entry both assemble and store identical text.
#[derive(Debug, Default)]
pub struct PromptCache {
    entries: RwLock<HashMap<Capability, Arc<str>>>,
}

impl PromptCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_assemble(
        &self,
        capability: Capability,
        directory: &Path,
    ) -> Result<Arc<str>, PromptError> {
        if let Some(prompt) = self.entries.read().get(&capability) {
            return Ok(Arc::clone(prompt));
        }

        let prompt: Arc<str> = assemble(directory)?.into();
        self.entries
            .write()
            .entry(capability)
            .or_insert_with(|| Arc::clone(&prompt));
        Ok(prompt)
    }
}
