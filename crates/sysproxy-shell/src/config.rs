//! Idempotent patching of line-oriented configuration files.
//!
//! A [`ManagedLineSet`] names the variables this crate owns inside one file.
//! Writing removes every assignment of those variables and appends fresh ones;
//! all other lines keep their content and position.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use log::debug;
use regex::Regex;
use sysproxy_backend::SinkError;
use sysproxy_backend::env::Assignment;

static POSIX_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*export\s+([A-Za-z_][A-Za-z0-9_]*)=").expect("valid posix pattern")
});

static FISH_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*set\s+(?:-[A-Za-z]*x[A-Za-z]*|--export)\s+([A-Za-z_][A-Za-z0-9_]*)(?:\s|$)")
        .expect("valid fish pattern")
});

static ENVIRONMENT_D_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)=").expect("valid environment.d pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// `export KEY="value"` (bash, zsh).
    PosixExport,
    /// `set -x KEY "value"` (fish).
    FishSetx,
    /// `KEY=value` (systemd `environment.d`).
    EnvironmentD,
}

impl Dialect {
    #[must_use]
    pub fn render(self, key: &str, value: &str) -> String {
        match self {
            Self::PosixExport => format!("export {key}=\"{}\"", escape(value, "\\\"$`")),
            Self::FishSetx => format!("set -x {key} \"{}\"", escape(value, "\\\"$")),
            Self::EnvironmentD => format!("{key}={}", escape(value, "")),
        }
    }

    /// The variable a line assigns in this dialect, if it is an assignment.
    #[must_use]
    pub fn assigned_key(self, line: &str) -> Option<&str> {
        let pattern = match self {
            Self::PosixExport => &*POSIX_ASSIGNMENT,
            Self::FishSetx => &*FISH_ASSIGNMENT,
            Self::EnvironmentD => &*ENVIRONMENT_D_ASSIGNMENT,
        };
        pattern
            .captures(line)
            .and_then(|captures| captures.get(1))
            .map(|key| key.as_str())
    }
}

fn escape(value: &str, specials: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars().filter(|c| !c.is_control()) {
        if specials.contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedLineSet {
    dialect: Dialect,
    keys: Vec<&'static str>,
}

impl ManagedLineSet {
    #[must_use]
    pub fn new(dialect: Dialect, keys: &[&'static str]) -> Self {
        Self {
            dialect,
            keys: keys.to_vec(),
        }
    }

    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    #[must_use]
    pub fn matches(&self, line: &str) -> bool {
        self.dialect
            .assigned_key(line)
            .is_some_and(|key| self.keys.contains(&key))
    }

    /// Filters managed lines out of `content` and appends `assignments`.
    ///
    /// Assigned keys are treated as managed even if the set does not list
    /// them, so repeated writes replace instead of accumulating.
    #[must_use]
    pub fn patch(&self, content: &str, assignments: &[Assignment]) -> SinkEdit {
        let mut modified = String::with_capacity(content.len());
        let mut removed = 0;

        for line in content.split_inclusive('\n') {
            let bare = line.trim_end_matches(['\n', '\r']);
            let assigned = self.dialect.assigned_key(bare);
            let managed = assigned.is_some_and(|key| {
                self.keys.contains(&key) || assignments.iter().any(|(k, _)| *k == key)
            });
            if managed {
                removed += 1;
            } else {
                modified.push_str(line);
            }
        }

        if !assignments.is_empty() && !modified.is_empty() && !modified.ends_with('\n') {
            modified.push('\n');
        }
        for (key, value) in assignments {
            modified.push_str(&self.dialect.render(key, value));
            modified.push('\n');
        }

        SinkEdit {
            original: content.to_string(),
            modified,
            removed,
            added: assignments.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkEdit {
    pub original: String,
    pub modified: String,
    pub removed: usize,
    pub added: usize,
}

impl SinkEdit {
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.original != self.modified
    }

    #[must_use]
    pub fn summary(&self) -> String {
        if !self.has_changes() {
            return "No changes needed.".to_string();
        }
        format!("- {} managed line(s)\n+ {} managed line(s)", self.removed, self.added)
    }
}

/// One sink file, loaded for a read-modify-replace cycle.
pub struct ManagedFile {
    path: PathBuf,
    content: String,
}

impl ManagedFile {
    /// Loads `path`, following a symlink to its target so the link survives
    /// the replace. A missing file loads as empty.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let path = resolve_symlink(path);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e),
        };
        Ok(Self { path, content })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Replaces the file contents atomically through a sibling temp file.
    pub fn apply_edit(&mut self, edit: &SinkEdit) -> std::io::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut staged = tempfile::NamedTempFile::new_in(&dir)?;
        staged.write_all(edit.modified.as_bytes())?;
        staged.as_file().sync_all()?;
        if let Ok(metadata) = fs::metadata(&self.path) {
            fs::set_permissions(staged.path(), metadata.permissions())?;
        }
        staged.persist(&self.path).map_err(|e| e.error)?;

        self.content.clone_from(&edit.modified);
        Ok(())
    }
}

fn resolve_symlink(path: &Path) -> PathBuf {
    let is_link = fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink());
    if is_link {
        fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
    } else {
        path.to_path_buf()
    }
}

/// Replaces every managed line in `path` with `assignments`, creating the
/// file when needed.
pub fn write(
    path: &Path,
    set: &ManagedLineSet,
    assignments: &[Assignment],
) -> Result<SinkEdit, SinkError> {
    let mut file = ManagedFile::load(path).map_err(|e| SinkError::file(path, &e))?;
    let edit = set.patch(file.content(), assignments);
    if edit.has_changes() {
        debug!("Patching {}:\n{}", file.path().display(), edit.summary());
        file.apply_edit(&edit)
            .map_err(|e| SinkError::file(file.path(), &e))?;
    }
    Ok(edit)
}

/// Strips every managed line from `path`; a missing file is left missing.
pub fn remove(path: &Path, set: &ManagedLineSet) -> Result<SinkEdit, SinkError> {
    write(path, set, &[])
}
