//! Test fixture helpers.
//!
//! A small, tempdir-backed workspace builder so both unit tests (within
//! each stage module) and the end-to-end integration suite can write
//! on-disk YAML sources without repeating `tempfile`/`fs::write`
//! boilerplate.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A disposable directory of YAML source files for one test.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp workspace"),
        }
    }

    /// The workspace root.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// The absolute path a relative file name would live at.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write a file relative to the workspace root, creating parent
    /// directories as needed.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create fixture parent directory");
        }
        std::fs::write(&path, contents).expect("failed to write fixture file");
        path
    }

    /// Write a simple (single-part) variation set.
    pub fn write_variations(&self, name: &str, entries: &[(&str, &str)]) -> PathBuf {
        let mut body = String::from("type: variations\nentries:\n");
        for (key, value) in entries {
            body.push_str(&format!("  {key}: {value:?}\n"));
        }
        self.write(name, &body)
    }

    /// Write a template document (`parent`/`imports` left empty unless the
    /// caller appends more YAML onto `extra`).
    pub fn write_template(&self, name: &str, template: &str, imports: &[(&str, &str)], extra: &str) -> PathBuf {
        let mut body = format!("template: {template:?}\n");
        if !imports.is_empty() {
            body.push_str("imports:\n");
            for (key, path) in imports {
                body.push_str(&format!("  {key}: {path}\n"));
            }
        }
        body.push_str(extra);
        self.write(name, &body)
    }

    /// Write a prompt document with a minimal `generation:` block, which
    /// is what makes the loader classify it as a prompt rather than a
    /// template.
    pub fn write_prompt(&self, name: &str, prompt: &str, imports: &[(&str, &str)]) -> PathBuf {
        let mut body = format!("prompt: {prompt:?}\ngeneration:\n  mode: combinatorial\n  seed_mode: fixed\n  seed: 0\n");
        if !imports.is_empty() {
            body.push_str("imports:\n");
            for (key, path) in imports {
                body.push_str(&format!("  {key}: {path}\n"));
            }
        }
        self.write(name, &body)
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}
