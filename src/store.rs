use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::domain::Category;
use crate::error::AvisetError;

/// Per-category URL ledger. The persisted form is plain text: first line is
/// the declared maximum, every following line one URL in fetch order. The
/// URL count doubles as the resumption cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    pub declared_max: u64,
    pub urls: Vec<String>,
}

impl Ledger {
    pub fn current(&self) -> u64 {
        self.urls.len() as u64
    }
}

#[derive(Debug, Clone)]
pub struct Store {
    root: Utf8PathBuf,
}

impl Store {
    pub fn new() -> Result<Self, AvisetError> {
        let cwd = std::env::current_dir().map_err(|err| AvisetError::Filesystem(err.to_string()))?;
        let root = Utf8PathBuf::from_path_buf(cwd)
            .map_err(|_| AvisetError::Filesystem("non-utf8 working directory".to_string()))?;
        Ok(Self { root })
    }

    pub fn new_with_root(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn urls_root(&self) -> Utf8PathBuf {
        self.root.join("urls")
    }

    pub fn images_root(&self) -> Utf8PathBuf {
        self.root.join("images")
    }

    pub fn ledger_path(&self, category: &Category) -> Utf8PathBuf {
        self.urls_root().join(format!("{category}_urls.txt"))
    }

    pub fn image_dir(&self, category: &Category) -> Utf8PathBuf {
        self.images_root().join(category.as_str())
    }

    pub fn manifest_path(&self, category: &Category) -> Utf8PathBuf {
        self.image_dir(category).join("manifest.json")
    }

    pub fn train_dir(&self, category: &Category) -> Utf8PathBuf {
        self.images_root().join("train").join(category.as_str())
    }

    pub fn test_dir(&self, category: &Category) -> Utf8PathBuf {
        self.images_root().join("test").join(category.as_str())
    }

    pub fn ensure_urls_root(&self) -> Result<(), AvisetError> {
        fs::create_dir_all(self.urls_root().as_std_path())
            .map_err(|err| AvisetError::Filesystem(err.to_string()))
    }

    pub fn ensure_image_dir(&self, category: &Category) -> Result<(), AvisetError> {
        fs::create_dir_all(self.image_dir(category).as_std_path())
            .map_err(|err| AvisetError::Filesystem(err.to_string()))
    }

    /// Read a category's ledger. Returns `Ok(None)` when no ledger exists
    /// yet. A non-integer first line is data corruption and fails loudly
    /// rather than silently truncating progress.
    pub fn read_ledger(&self, category: &Category) -> Result<Option<Ledger>, AvisetError> {
        let path = self.ledger_path(category);
        if !path.as_std_path().exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| AvisetError::Filesystem(err.to_string()))?;
        let mut lines = content.lines();
        let first = lines.next().unwrap_or("");
        let declared_max: u64 = first.trim().parse().map_err(|_| AvisetError::LedgerCorrupt {
            path: path.into_std_path_buf(),
            line: first.to_string(),
        })?;
        let urls = lines.map(|line| line.to_string()).collect();
        Ok(Some(Ledger { declared_max, urls }))
    }

    /// Append URLs to a category's ledger, creating it with `declared_max`
    /// as the first line when absent. The declared maximum is set exactly
    /// once; later calls never touch it. The whole file is rewritten through
    /// a temp file and renamed into place, so a crash mid-append never
    /// leaves a partial line behind.
    pub fn append_urls(
        &self,
        category: &Category,
        urls: &[String],
        declared_max: Option<u64>,
    ) -> Result<(), AvisetError> {
        let existing = self.read_ledger(category)?;
        let ledger = match existing {
            Some(mut ledger) => {
                ledger.urls.extend(urls.iter().cloned());
                ledger
            }
            None => {
                let declared_max = declared_max.ok_or_else(|| {
                    AvisetError::Filesystem(format!(
                        "creating ledger for {category} requires a declared maximum"
                    ))
                })?;
                Ledger {
                    declared_max,
                    urls: urls.to_vec(),
                }
            }
        };
        self.write_ledger(category, &ledger)
    }

    /// Atomic full rewrite used by the cleaning pass. The first line becomes
    /// the retained URL count.
    pub fn rewrite_ledger(&self, category: &Category, urls: &[String]) -> Result<(), AvisetError> {
        let ledger = Ledger {
            declared_max: urls.len() as u64,
            urls: urls.to_vec(),
        };
        self.write_ledger(category, &ledger)
    }

    fn write_ledger(&self, category: &Category, ledger: &Ledger) -> Result<(), AvisetError> {
        self.ensure_urls_root()?;
        let mut content = format!("{}\n", ledger.declared_max);
        for url in &ledger.urls {
            content.push_str(url);
            content.push('\n');
        }
        write_bytes_atomic(&self.ledger_path(category), content.as_bytes())
    }

    pub fn write_manifest(
        &self,
        category: &Category,
        manifest: &Manifest,
    ) -> Result<(), AvisetError> {
        let content = serde_json::to_vec_pretty(manifest)
            .map_err(|err| AvisetError::Filesystem(err.to_string()))?;
        write_bytes_atomic(&self.manifest_path(category), &content)
    }
}

/// Download manifest written after each completed download pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub category: String,
    pub declared_max: u64,
    pub downloaded: u64,
    pub placeholders: u64,
    pub skipped: u64,
    pub tool: String,
    pub completed_at: String,
}

pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), AvisetError> {
    let parent = path
        .parent()
        .ok_or_else(|| AvisetError::Filesystem("invalid destination path".to_string()))?;
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| AvisetError::Filesystem(err.to_string()))?;
    let temp = tempfile::Builder::new()
        .prefix("aviset")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| AvisetError::Filesystem(err.to_string()))?;
    fs::write(temp.path(), content).map_err(|err| AvisetError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| AvisetError::Filesystem(err.to_string()))?;
    Ok(())
}
