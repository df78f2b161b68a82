// Build-context packaging: the app folder is written into a gzip tarball
// that the backend turns into a container image.

use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use glob::Pattern;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

/// Prefix of the temp archive created inside the app folder.
pub const ARCHIVE_PREFIX: &str = ".appctl-build-";
/// Name the target file is copied to inside the archive.
pub const ENTRY_MODULE: &str = "_app.py";
/// Archive name used by older clients; never packed.
const LEGACY_ARCHIVE: &str = "docker.tar.gz";

const DEFAULT_DOCKERFILE: &str = "\
FROM python:3.9-slim-buster

WORKDIR /app

COPY . .

RUN pip install --no-cache-dir --disable-pip-version-check -r requirements.txt

EXPOSE 80

CMD [\"python\", \"-m\", \"_app\"]
";

/// A packed build context on disk. The file is removed when this value is
/// dropped or explicitly discarded.
#[derive(Debug)]
pub struct BuildArchive {
    file: NamedTempFile,
}

impl BuildArchive {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Deletes the archive now, reporting any I/O error.
    pub fn discard(self) -> std::io::Result<()> {
        self.file.close()
    }
}

/// Names ignored while packing, read from the folder's `.gitignore`.
fn ignore_patterns(folder: &Path) -> Vec<Pattern> {
    let text = match fs::read_to_string(folder.join(".gitignore")) {
        Ok(text) => text,
        Err(_) => return Vec::new(),
    };
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.replace('/', ""))
        .filter(|line| !line.is_empty())
        .filter_map(|line| match Pattern::new(&line) {
            Ok(p) => Some(p),
            Err(e) => {
                log::warn!("Skipping invalid .gitignore pattern '{}': {}", line, e);
                None
            }
        })
        .collect()
}

fn is_excluded(name: &str, patterns: &[Pattern]) -> bool {
    name == ".git"
        || name == LEGACY_ARCHIVE
        || name.starts_with(ARCHIVE_PREFIX)
        || patterns.iter().any(|p| p.matches(name))
}

/// Packs `folder` for building `file_name`. The archive root is the folder's
/// own name; the target file is also stored as `_app.py`, and a default
/// Dockerfile is added when the folder has none.
pub fn build_archive(folder: &Path, file_name: &str) -> Result<BuildArchive> {
    let folder = folder
        .canonicalize()
        .with_context(|| format!("Failed to resolve app folder {}", folder.display()))?;
    let root = PathBuf::from(
        folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "app".to_string()),
    );
    let patterns = ignore_patterns(&folder);

    let file = tempfile::Builder::new()
        .prefix(ARCHIVE_PREFIX)
        .suffix(".tar.gz")
        .tempfile_in(&folder)
        .context("Failed to create temporary archive")?;

    let encoder = GzEncoder::new(file.reopen()?, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);

    let walker = WalkDir::new(&folder).min_depth(1).into_iter().filter_entry(|entry| {
        !is_excluded(&entry.file_name().to_string_lossy(), &patterns)
    });
    let mut packed = 0usize;
    for entry in walker {
        let entry = entry.context("Failed to walk app folder")?;
        let relative = entry.path().strip_prefix(&folder)?;
        let name = root.join(relative);
        if entry.file_type().is_dir() {
            builder.append_dir(&name, entry.path())?;
        } else if entry.file_type().is_file() {
            builder
                .append_path_with_name(entry.path(), &name)
                .with_context(|| format!("Failed to add {} to archive", relative.display()))?;
            packed += 1;
        }
    }

    let target = folder.join(file_name);
    builder
        .append_path_with_name(&target, root.join(ENTRY_MODULE))
        .with_context(|| format!("Failed to add {} to archive", file_name))?;

    if !folder.join("Dockerfile").exists() {
        let mut header = tar::Header::new_gnu();
        header.set_size(DEFAULT_DOCKERFILE.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, root.join("Dockerfile"), DEFAULT_DOCKERFILE.as_bytes())?;
    }

    builder
        .into_inner()
        .context("Failed to finish tar archive")?
        .finish()
        .context("Failed to finish gzip stream")?;

    log::debug!("Packed {} files from {} into {}", packed, folder.display(), file.path().display());
    Ok(BuildArchive { file })
}
