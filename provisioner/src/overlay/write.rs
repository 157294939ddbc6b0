//! Atomic file placement on the configuration surface.

use super::ConfigBundle;
use camino::{Utf8Path, Utf8PathBuf};
use std::io::Write as _;
use tempfile::NamedTempFile;

/// Errors writing the overlay.
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    /// A parent directory could not be created.
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A file could not be written or moved into place.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Destination file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Write every file of `bundle` below `mount_root`.
///
/// Each file is written to a temporary sibling and renamed into place, so a
/// reader never observes a partially written file. Returns the absolute
/// paths written, in bundle order.
///
/// # Errors
///
/// Returns [`OverlayError`] on the first file that cannot be written.
pub fn write(bundle: &ConfigBundle, mount_root: &Utf8Path) -> Result<Vec<Utf8PathBuf>, OverlayError> {
    let mut written = Vec::with_capacity(bundle.files().len());
    for file in bundle.files() {
        let path = place(mount_root, &file.path, &file.content, file.executable)?;
        log::debug!("wrote {path}");
        written.push(path);
    }
    Ok(written)
}

/// Atomically write a single text file below `root`.
///
/// # Errors
///
/// Returns [`OverlayError`] when the file cannot be written.
pub fn write_file(root: &Utf8Path, relative: &str, content: &str) -> Result<Utf8PathBuf, OverlayError> {
    place(root, Utf8Path::new(relative), content, false)
}

fn place(
    root: &Utf8Path,
    relative: &Utf8Path,
    content: &str,
    executable: bool,
) -> Result<Utf8PathBuf, OverlayError> {
    let path = root.join(relative);
    let parent = path.parent().unwrap_or(root).to_owned();
    std::fs::create_dir_all(&parent).map_err(|source| OverlayError::CreateDir {
        path: parent.clone(),
        source,
    })?;

    let write_err = |source| OverlayError::Write {
        path: path.clone(),
        source,
    };
    let mut temp = NamedTempFile::new_in(&parent).map_err(write_err)?;
    temp.write_all(content.as_bytes()).map_err(write_err)?;
    temp.as_file().sync_all().map_err(write_err)?;
    set_mode(&temp, executable).map_err(write_err)?;
    temp.persist(&path).map_err(|e| write_err(e.error))?;
    Ok(path)
}

#[cfg(unix)]
fn set_mode(temp: &NamedTempFile, executable: bool) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = if executable { 0o755 } else { 0o644 };
    temp.as_file()
        .set_permissions(std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_temp: &NamedTempFile, _executable: bool) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay;
    use crate::test_utils::utf8_temp_dir;

    #[test]
    fn writes_every_file_in_bundle_order() {
        let (_dir, root) = utf8_temp_dir();
        let profile = bootforge::catalogue::find("pi4-ili9486-35").expect("profile");
        let bundle = overlay::build(&profile);

        let written = write(&bundle, &root).expect("overlay written");

        assert_eq!(written.len(), bundle.files().len());
        for (path, file) in written.iter().zip(bundle.files()) {
            assert_eq!(*path, root.join(&file.path));
            let on_disk = std::fs::read_to_string(path).expect("read back");
            assert_eq!(on_disk, file.content);
        }
    }

    #[cfg(unix)]
    #[test]
    fn firstboot_script_is_executable() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, root) = utf8_temp_dir();
        let profile = bootforge::catalogue::find("pi-zero2w-headless").expect("profile");
        write(&overlay::build(&profile), &root).expect("overlay written");

        let mode = std::fs::metadata(root.join(overlay::FIRSTBOOT_SH))
            .expect("script exists")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn rewriting_replaces_existing_content() {
        let (_dir, root) = utf8_temp_dir();
        write_file(&root, "bootforge/verification.txt", "old\n").expect("first write");
        let path = write_file(&root, "bootforge/verification.txt", "new\n").expect("second write");
        assert_eq!(std::fs::read_to_string(path).expect("read back"), "new\n");
    }

    #[test]
    fn unwritable_root_reports_directory() {
        let (_dir, root) = utf8_temp_dir();
        let blocker = root.join("bootforge");
        std::fs::write(&blocker, "not a directory").expect("create blocker");

        let err = write_file(&root, "bootforge/SETUP.txt", "x\n").expect_err("parent is a file");
        assert!(matches!(err, OverlayError::CreateDir { path, .. } if path == blocker));
    }
}
