//! Filesystem scanning for image and label files.

use crate::layout::{is_image, is_label, DatasetLayout};
use crate::types::{DatasetResult, SegDatasetError, SamplePaths};
use std::fs;
use std::path::{Path, PathBuf};

/// Sort by the full path string, bytewise ascending.
pub fn sort_paths(paths: &mut [PathBuf]) {
    paths.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
}

/// Collect every file under `dir` accepted by `keep`, sorted by path.
pub fn collect_files(
    dir: &Path,
    recursive: bool,
    keep: impl Fn(&Path) -> bool,
) -> DatasetResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(SegDatasetError::NotFound {
            path: dir.to_path_buf(),
        });
    }
    let mut out = Vec::new();
    walk(dir, recursive, &keep, &mut out)?;
    sort_paths(&mut out);
    Ok(out)
}

fn walk(
    dir: &Path,
    recursive: bool,
    keep: &dyn Fn(&Path) -> bool,
    out: &mut Vec<PathBuf>,
) -> DatasetResult<()> {
    let entries = fs::read_dir(dir).map_err(|e| SegDatasetError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| SegDatasetError::io(dir, e))?;
        let path = entry.path();
        // `file_type` does not follow links; symlinked directories are neither
        // descended into nor listed.
        let file_type = entry.file_type().map_err(|e| SegDatasetError::io(&path, e))?;
        if file_type.is_dir() {
            if recursive {
                walk(&path, recursive, keep, out)?;
            }
        } else if file_type.is_symlink() && path.is_dir() {
            continue;
        } else if keep(&path) {
            out.push(path);
        }
    }
    Ok(())
}

/// Image and label lists for a layout, each sorted independently.
#[derive(Debug, Clone, Default)]
pub struct DiscoveredFiles {
    pub images: Vec<PathBuf>,
    pub labels: Vec<PathBuf>,
}

impl DiscoveredFiles {
    pub fn pair(&self, index: usize) -> Option<SamplePaths> {
        Some(SamplePaths {
            image: self.images.get(index)?.clone(),
            label: self.labels.get(index)?.clone(),
        })
    }
}

pub fn discover(root: &Path, layout: &DatasetLayout) -> DatasetResult<DiscoveredFiles> {
    let images_root = layout.images_root(root);
    let labels_root = layout.labels_root(root);
    tracing::debug!(
        layout = layout.name(),
        images_root = %images_root.display(),
        labels_root = %labels_root.display(),
        "scanning dataset"
    );

    if layout.pairs_by_position() {
        let images = collect_files(&images_root, true, is_image)?;
        let labels = collect_files(&labels_root, true, is_label)?;
        return Ok(DiscoveredFiles { images, labels });
    }

    // VOC12: the basename list comes from the label directory and both
    // paths are rebuilt with a `.png` extension.
    if !images_root.is_dir() {
        return Err(SegDatasetError::NotFound { path: images_root });
    }
    let label_files = collect_files(&labels_root, false, is_image)?;
    let mut basenames: Vec<String> = label_files
        .iter()
        .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
        .collect();
    basenames.sort();
    let images = basenames
        .iter()
        .map(|name| images_root.join(format!("{name}.png")))
        .collect();
    let labels = basenames
        .iter()
        .map(|name| labels_root.join(format!("{name}.png")))
        .collect();
    Ok(DiscoveredFiles { images, labels })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_is_by_path_string() {
        let mut paths = vec![
            PathBuf::from("a/b.png"),
            PathBuf::from("a-b.png"),
            PathBuf::from("a/a.png"),
        ];
        sort_paths(&mut paths);
        assert_eq!(
            paths,
            vec![
                PathBuf::from("a-b.png"),
                PathBuf::from("a/a.png"),
                PathBuf::from("a/b.png"),
            ]
        );
    }

    #[test]
    fn missing_directory_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = collect_files(&tmp.path().join("nope"), true, is_image).unwrap_err();
        assert!(matches!(err, SegDatasetError::NotFound { .. }));
    }

    #[test]
    fn non_recursive_skips_subdirectories() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("top.png"), b"").unwrap();
        fs::write(tmp.path().join("sub/inner.png"), b"").unwrap();
        let flat = collect_files(tmp.path(), false, is_image).unwrap();
        assert_eq!(flat.len(), 1);
        let deep = collect_files(tmp.path(), true, is_image).unwrap();
        assert_eq!(deep.len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directories_are_not_followed() {
        let tmp = tempfile::tempdir().unwrap();
        let images = tmp.path().join("images");
        fs::create_dir_all(images.join("real")).unwrap();
        fs::create_dir_all(tmp.path().join("outside")).unwrap();
        fs::write(images.join("real/a.png"), b"").unwrap();
        fs::write(tmp.path().join("outside/z.png"), b"").unwrap();
        fs::write(tmp.path().join("outside/y.png"), b"").unwrap();
        std::os::unix::fs::symlink(tmp.path().join("outside"), images.join("link")).unwrap();
        std::os::unix::fs::symlink(tmp.path().join("outside/y.png"), images.join("y.png"))
            .unwrap();

        let found = collect_files(&images, true, is_image).unwrap();
        assert_eq!(found, vec![images.join("real/a.png"), images.join("y.png")]);
    }
}
