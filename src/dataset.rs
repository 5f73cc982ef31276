use std::fs;
use std::path::{Path, PathBuf};

use camino::Utf8Path;
use rand::seq::SliceRandom;
use tracing::{debug, info};

use crate::domain::media_type_of;
use crate::error::AvisetError;

#[derive(Debug, Clone, Copy, Default)]
pub struct PruneReport {
    pub checked: u64,
    pub removed: u64,
}

/// Delete every file under `images_root` that looks like an image by name
/// but fails to decode. Placeholder files from the downloader are zero
/// bytes and go the same way.
pub fn prune_invalid(images_root: &Utf8Path) -> Result<PruneReport, AvisetError> {
    if !images_root.as_std_path().is_dir() {
        return Err(AvisetError::MissingImagesDir(
            images_root.as_std_path().to_path_buf(),
        ));
    }
    let mut report = PruneReport::default();
    for path in walk_files(images_root.as_std_path())? {
        let name = path.file_name().and_then(|name| name.to_str()).unwrap_or("");
        if media_type_of(name).is_none() {
            continue;
        }
        report.checked += 1;
        if image::open(&path).is_err() {
            debug!(path = %path.display(), "removing undecodable image");
            fs::remove_file(&path).map_err(|err| AvisetError::Filesystem(err.to_string()))?;
            report.removed += 1;
        }
    }
    info!(
        checked = report.checked,
        removed = report.removed,
        "prune complete"
    );
    Ok(report)
}

#[derive(Debug, Clone, Default)]
pub struct SplitReport {
    pub categories: u64,
    pub train: u64,
    pub test: u64,
}

/// Destructive one-way partition of every species directory into
/// `train/<category>` and `test/<category>`. Files are moved, not copied,
/// and the sample is unseeded, so the split is not reproducible across runs.
pub fn split_train_test(
    images_root: &Utf8Path,
    test_fraction: f64,
) -> Result<SplitReport, AvisetError> {
    // Reject bad fractions (NaN included) before any file is moved; the
    // split is destructive and must not start with an invalid sample size.
    if !(0.0..=1.0).contains(&test_fraction) {
        return Err(AvisetError::InvalidTestFraction(test_fraction));
    }
    if !images_root.as_std_path().is_dir() {
        return Err(AvisetError::MissingImagesDir(
            images_root.as_std_path().to_path_buf(),
        ));
    }
    let mut report = SplitReport::default();
    let entries = fs::read_dir(images_root.as_std_path())
        .map_err(|err| AvisetError::Filesystem(err.to_string()))?;

    for entry in entries {
        let entry = entry.map_err(|err| AvisetError::Filesystem(err.to_string()))?;
        let species_dir = entry.path();
        if !species_dir.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_str().unwrap_or("");
        if name == "train" || name == "test" {
            continue;
        }

        let mut files: Vec<PathBuf> = fs::read_dir(&species_dir)
            .map_err(|err| AvisetError::Filesystem(err.to_string()))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .file_name()
                        .and_then(|file| file.to_str())
                        .is_some_and(|file| media_type_of(file).is_some())
            })
            .collect();

        let n_test = (files.len() as f64 * test_fraction) as usize;
        files.shuffle(&mut rand::thread_rng());
        let (test_files, train_files) = files.split_at(n_test);

        let train_dir = images_root.as_std_path().join("train").join(name);
        let test_dir = images_root.as_std_path().join("test").join(name);
        fs::create_dir_all(&train_dir).map_err(|err| AvisetError::Filesystem(err.to_string()))?;
        fs::create_dir_all(&test_dir).map_err(|err| AvisetError::Filesystem(err.to_string()))?;

        info!(species = name, total = files.len(), n_test, "splitting");
        for file in test_files {
            move_into(file, &test_dir)?;
            report.test += 1;
        }
        for file in train_files {
            move_into(file, &train_dir)?;
            report.train += 1;
        }
        report.categories += 1;
    }
    Ok(report)
}

fn move_into(file: &Path, target_dir: &Path) -> Result<(), AvisetError> {
    let name = file
        .file_name()
        .ok_or_else(|| AvisetError::Filesystem(format!("invalid file name: {}", file.display())))?;
    fs::rename(file, target_dir.join(name)).map_err(|err| AvisetError::Filesystem(err.to_string()))
}

fn walk_files(root: &Path) -> Result<Vec<PathBuf>, AvisetError> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries =
            fs::read_dir(&dir).map_err(|err| AvisetError::Filesystem(err.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|err| AvisetError::Filesystem(err.to_string()))?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                files.push(path);
            }
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use camino::Utf8PathBuf;

    use super::*;

    fn temp_root() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().join("images")).unwrap();
        fs::create_dir_all(root.as_std_path()).unwrap();
        (temp, root)
    }

    #[test]
    fn prune_removes_undecodable_files_only() {
        let (_temp, root) = temp_root();
        let species = root.join("amsel");
        fs::create_dir_all(species.as_std_path()).unwrap();

        let valid = species.join("1.png");
        image::RgbImage::new(4, 4).save(valid.as_std_path()).unwrap();
        fs::write(species.join("2.jpg").as_std_path(), b"not an image").unwrap();
        // zero-byte placeholder
        fs::write(species.join("3.jpg").as_std_path(), b"").unwrap();
        // no recognizable media type, must be left alone
        fs::write(species.join("notes.txt").as_std_path(), b"hello").unwrap();

        let report = prune_invalid(&root).unwrap();
        assert_eq!(report.checked, 3);
        assert_eq!(report.removed, 2);
        assert!(valid.as_std_path().exists());
        assert!(!species.join("2.jpg").as_std_path().exists());
        assert!(!species.join("3.jpg").as_std_path().exists());
        assert!(species.join("notes.txt").as_std_path().exists());
    }

    #[test]
    fn split_moves_every_image_exactly_once() {
        let (_temp, root) = temp_root();
        let species = root.join("amsel");
        fs::create_dir_all(species.as_std_path()).unwrap();
        for i in 1..=10 {
            fs::write(species.join(format!("{i}.jpg")).as_std_path(), b"x").unwrap();
        }
        fs::write(species.join("manifest.json").as_std_path(), b"{}").unwrap();

        let report = split_train_test(&root, 0.2).unwrap();
        assert_eq!(report.categories, 1);
        assert_eq!(report.test, 2);
        assert_eq!(report.train, 8);

        let count = |dir: &Utf8PathBuf| {
            fs::read_dir(dir.as_std_path())
                .map(|entries| entries.count())
                .unwrap_or(0)
        };
        assert_eq!(count(&root.join("train").join("amsel")), 8);
        assert_eq!(count(&root.join("test").join("amsel")), 2);
        // manifest stays behind, split only touches images
        assert!(species.join("manifest.json").as_std_path().exists());
    }

    #[test]
    fn split_rejects_out_of_range_fractions() {
        let (_temp, root) = temp_root();
        let species = root.join("amsel");
        fs::create_dir_all(species.as_std_path()).unwrap();
        fs::write(species.join("1.jpg").as_std_path(), b"x").unwrap();

        let err = split_train_test(&root, 2.0).unwrap_err();
        assert_matches!(err, AvisetError::InvalidTestFraction(_));
        let err = split_train_test(&root, -0.1).unwrap_err();
        assert_matches!(err, AvisetError::InvalidTestFraction(_));
        let err = split_train_test(&root, f64::NAN).unwrap_err();
        assert_matches!(err, AvisetError::InvalidTestFraction(_));

        // nothing was moved
        assert!(species.join("1.jpg").as_std_path().exists());
        assert!(!root.join("train").as_std_path().exists());
    }

    #[test]
    fn second_split_run_moves_nothing() {
        let (_temp, root) = temp_root();
        let species = root.join("amsel");
        fs::create_dir_all(species.as_std_path()).unwrap();
        for i in 1..=10 {
            fs::write(species.join(format!("{i}.jpg")).as_std_path(), b"x").unwrap();
        }

        split_train_test(&root, 0.2).unwrap();
        let report = split_train_test(&root, 0.2).unwrap();
        assert_eq!(report.train, 0);
        assert_eq!(report.test, 0);

        let count = |dir: std::path::PathBuf| {
            fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
        };
        assert_eq!(count(root.join("train").join("amsel").into_std_path_buf()), 8);
        assert_eq!(count(root.join("test").join("amsel").into_std_path_buf()), 2);
    }

    #[test]
    fn missing_images_dir_is_a_config_error() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().join("images")).unwrap();

        let err = prune_invalid(&root).unwrap_err();
        assert_matches!(err, AvisetError::MissingImagesDir(_));
        let err = split_train_test(&root, 0.2).unwrap_err();
        assert_matches!(err, AvisetError::MissingImagesDir(_));
    }
}
