//! "New item" templates keyed by file extension.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use shellward_core::{FsError, FsResult};

/// Initial content for a newly created file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItemTemplate {
    /// File copied to the new location.
    pub template: Option<PathBuf>,
    /// Bytes written when there is no template file.
    pub data: Option<Vec<u8>>,
}

impl NewItemTemplate {
    /// Write this template to `destination`, creating an empty file if it
    /// carries nothing.
    pub fn write_to(&self, destination: &Path) -> FsResult<()> {
        if let Some(template) = &self.template {
            fs::copy(template, destination).map_err(|e| FsError::io(template, e))?;
            return Ok(());
        }

        fs::write(destination, self.data.as_deref().unwrap_or_default())
            .map_err(|e| FsError::io(destination, e))
    }
}

/// Provider of templates for new files.
pub trait NewItemTemplates: Send + Sync {
    /// Template registered for `extension` (without the dot), if any.
    fn template_for(&self, extension: &str) -> Option<NewItemTemplate>;
}

/// No templates: every new file is empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTemplates;

impl NewItemTemplates for NoTemplates {
    fn template_for(&self, _extension: &str) -> Option<NewItemTemplate> {
        None
    }
}

/// Templates stored as `new.<ext>` files in one directory.
#[derive(Debug, Clone)]
pub struct TemplateDirectory {
    root: PathBuf,
}

impl TemplateDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl NewItemTemplates for TemplateDirectory {
    fn template_for(&self, extension: &str) -> Option<NewItemTemplate> {
        if extension.is_empty() {
            return None;
        }

        let candidate = self.root.join(format!("new.{}", extension.to_lowercase()));
        candidate.is_file().then(|| NewItemTemplate {
            template: Some(candidate),
            data: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_template_directory_lookup() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("new.md"), b"# Title\n").unwrap();
        let templates = TemplateDirectory::new(temp.path());

        let found = templates.template_for("MD").unwrap();
        assert_eq!(found.template, Some(temp.path().join("new.md")));
        assert!(templates.template_for("txt").is_none());
        assert!(templates.template_for("").is_none());
    }

    #[test]
    fn test_write_template() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("a.bin");

        NewItemTemplate {
            template: None,
            data: Some(vec![1, 2, 3]),
        }
        .write_to(&dest)
        .unwrap();
        assert_eq!(fs::read(&dest).unwrap(), vec![1, 2, 3]);

        let empty = temp.path().join("b.txt");
        NewItemTemplate::default().write_to(&empty).unwrap();
        assert_eq!(fs::metadata(&empty).unwrap().len(), 0);
    }
}
