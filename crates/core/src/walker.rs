use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Expands the command-line paths into the ordered list of header units.
///
/// Explicit files are taken as given and keep their command-line order.
/// Directories are walked and contribute their headers sorted by path.
pub struct FileWalker {
    extensions: FxHashSet<String>,
    exclude: GlobSet,
}

impl FileWalker {
    pub fn new(extensions: &[String], exclude: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in exclude {
            builder.add(Glob::new(pattern).with_context(|| format!("invalid exclude pattern `{pattern}`"))?);
        }
        Ok(Self {
            extensions: extensions.iter().cloned().collect(),
            exclude: builder.build()?,
        })
    }

    pub fn collect(&self, paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut seen = FxHashSet::default();
        let mut files = Vec::new();

        for path in paths {
            if path.is_dir() {
                for file in self.walk(path)? {
                    if seen.insert(file.clone()) {
                        files.push(file);
                    }
                }
            } else if path.is_file() {
                if seen.insert(path.clone()) {
                    files.push(path.clone());
                }
            } else {
                bail!("{} does not exist", path.display());
            }
        }

        info!("Found {} header files", files.len());
        Ok(files)
    }

    fn walk(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        let walker = WalkBuilder::new(root)
            .hidden(false)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .require_git(false)
            .build();

        for entry in walker {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() || !self.is_header(path) {
                continue;
            }
            let relative = path.strip_prefix(root).unwrap_or(path);
            if self.exclude.is_match(relative) || self.exclude.is_match(path) {
                debug!("Excluded: {:?}", path);
                continue;
            }
            debug!("Found file: {:?}", path);
            files.push(path.to_path_buf());
        }

        files.sort();
        Ok(files)
    }

    fn is_header(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.contains(ext))
    }
}
