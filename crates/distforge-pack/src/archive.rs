use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::PackError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub archive_path: String,
    pub source: PathBuf,
    pub mode: u32,
}

/// Every file under `root`, archived below `prefix`, sorted by archive path.
pub fn entries_from_dir(root: &Path, prefix: &str) -> Result<Vec<ArchiveEntry>, PackError> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|source| PackError::Walk {
            root: root.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_dir() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|_| PackError::OutsideRoot {
                path: entry.path().to_path_buf(),
                root: root.to_path_buf(),
            })?;
        entries.push(ArchiveEntry {
            archive_path: join_archive_path(prefix, &path_to_archive_path(relative)),
            source: entry.path().to_path_buf(),
            mode: file_mode(entry.path())?,
        });
    }
    entries.sort_by(|left, right| left.archive_path.cmp(&right.archive_path));
    Ok(entries)
}

pub fn file_entry(source: &Path, archive_path: &str) -> Result<ArchiveEntry, PackError> {
    if !source.is_file() {
        return Err(PackError::MissingFile {
            path: source.to_path_buf(),
        });
    }
    Ok(ArchiveEntry {
        archive_path: archive_path.to_string(),
        source: source.to_path_buf(),
        mode: file_mode(source)?,
    })
}

/// Writes a gzip-compressed tar with zeroed timestamps and ownership, so equal
/// inputs produce byte-identical archives.
pub fn write_tar_gz(path: &Path, entries: &[ArchiveEntry]) -> Result<(), PackError> {
    let io_error = |source| PackError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    let file = fs::File::create(path).map_err(io_error)?;
    let encoder = flate2::GzBuilder::new()
        .mtime(0)
        .write(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for entry in entries {
        let metadata = fs::metadata(&entry.source).map_err(|source| PackError::Io {
            path: entry.source.clone(),
            source,
        })?;
        let mut header = tar::Header::new_gnu();
        header.set_size(metadata.len());
        header.set_mode(entry.mode);
        header.set_uid(0);
        header.set_gid(0);
        header.set_mtime(0);
        header.set_cksum();
        let mut input = fs::File::open(&entry.source).map_err(|source| PackError::Io {
            path: entry.source.clone(),
            source,
        })?;
        builder
            .append_data(&mut header, &entry.archive_path, &mut input)
            .map_err(io_error)?;
    }
    builder
        .into_inner()
        .map_err(io_error)?
        .finish()
        .map_err(io_error)?;
    Ok(())
}

pub fn copy_file(source: &Path, destination: &Path) -> Result<(), PackError> {
    if !source.is_file() {
        return Err(PackError::MissingFile {
            path: source.to_path_buf(),
        });
    }
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|err| PackError::Io {
            path: parent.to_path_buf(),
            source: err,
        })?;
    }
    fs::copy(source, destination).map_err(|err| PackError::Io {
        path: destination.to_path_buf(),
        source: err,
    })?;
    Ok(())
}

/// Removes and recreates `dir`.
pub fn reset_dir(dir: &Path) -> Result<(), PackError> {
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|source| PackError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    fs::create_dir_all(dir).map_err(|source| PackError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

fn path_to_archive_path(path: &Path) -> String {
    let mut components = Vec::new();
    for component in path.components() {
        components.push(component.as_os_str().to_string_lossy().into_owned());
    }
    components.join("/")
}

fn join_archive_path(prefix: &str, suffix: &str) -> String {
    if prefix.is_empty() {
        suffix.to_string()
    } else if prefix.ends_with('/') {
        format!("{}{}", prefix, suffix)
    } else {
        format!("{}/{}", prefix, suffix)
    }
}

#[cfg(unix)]
fn file_mode(path: &Path) -> Result<u32, PackError> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::metadata(path).map_err(|source| PackError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(if metadata.permissions().mode() & 0o111 != 0 {
        0o755
    } else {
        0o644
    })
}

#[cfg(not(unix))]
fn file_mode(_path: &Path) -> Result<u32, PackError> {
    Ok(0o644)
}
