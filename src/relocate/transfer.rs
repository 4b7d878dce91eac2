//! One move attempt: atomic rename, or copy-then-delete when the rename is refused.
//!
//! The destination is always a name already claimed by this process (an empty placeholder on
//! real runs), so both strategies replace the placeholder and never anything else.
//!
//! Copy fallback:
//! 1. stream the source into a hidden temp file next to the destination (create_new + fsync);
//! 2. rename the temp file over the placeholder;
//! 3. remove the source; if that fails while the source still exists the destination is truncated
//!    back to a placeholder, and a source that vanished meanwhile leaves the copy as the moved file;
//! 4. copy timestamps and permissions when asked to.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use super::helpers::io_error_with_help;
use super::meta::preserve_metadata;
use super::space::ensure_space_for_copy;
use super::MoveStrategy;

const BUF_SIZE: usize = 1024 * 1024;

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Move `src` onto the claimed `dest`, preferring a rename.
pub(crate) fn move_once(src: &Path, dest: &Path, preserve: bool) -> io::Result<MoveStrategy> {
    match fs::rename(src, dest) {
        Ok(()) => {
            if let Some(parent) = dest.parent() {
                let _ = fsync_dir(parent);
            }
            Ok(MoveStrategy::Rename)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound && !src.exists() => {
            Err(io_error_with_help("rename source", src)(e))
        }
        Err(e) => {
            debug!(
                src = %src.display(),
                dest = %dest.display(),
                error = %e,
                cross_device = is_cross_device(&e),
                "rename refused; falling back to copy"
            );
            copy_then_delete(src, dest, preserve)?;
            Ok(MoveStrategy::CopyDelete)
        }
    }
}

pub(crate) fn copy_then_delete(src: &Path, dest: &Path, preserve: bool) -> io::Result<()> {
    let src_meta = fs::metadata(src).map_err(io_error_with_help("stat source", src))?;
    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    ensure_space_for_copy(dir, src_meta.len())?;

    let tmp = unique_temp_path(dir);
    let staged = copy_streaming(src, &tmp)
        .map_err(io_error_with_help("copy into temp file", &tmp))
        .and_then(|_| fs::rename(&tmp, dest).map_err(io_error_with_help("rename temp into place", dest)));
    if let Err(e) = staged {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    let _ = fsync_dir(dir);

    settle_source(src, dest, |p| fs::remove_file(p))?;

    if preserve {
        preserve_metadata(dest, &src_meta);
    }
    Ok(())
}

/// Remove `src` once its content is at `dest`.
///
/// A source that is already gone leaves `dest` as the only copy, so the move counts as done.
/// Otherwise a failed removal empties `dest` back to a placeholder; if that fails as well both
/// copies remain and the error says so.
pub(crate) fn settle_source<F>(src: &Path, dest: &Path, remove: F) -> io::Result<()>
where
    F: FnOnce(&Path) -> io::Result<()>,
{
    let err = match remove(src) {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };
    if err.kind() == io::ErrorKind::NotFound || fs::symlink_metadata(src).is_err() {
        debug!(src = %src.display(), dest = %dest.display(), error = %err, "source vanished after copy; keeping the copy");
        return Ok(());
    }

    let err = io_error_with_help("remove source after copy", src)(err);
    match OpenOptions::new().write(true).truncate(true).open(dest) {
        Ok(_) => Err(err),
        Err(t) => Err(io::Error::new(
            err.kind(),
            format!("{err}; rolling back '{}' also failed ({t}), the file now exists in both places", dest.display()),
        )),
    }
}

/// Copy `src` -> `dst` with buffered I/O, then fsync. `dst` must not exist yet.
pub(crate) fn copy_streaming(src: &Path, dst: &Path) -> io::Result<u64> {
    let src_f = File::open(src)?;
    let dst_f = OpenOptions::new().write(true).create_new(true).open(dst)?;

    #[cfg(target_os = "linux")]
    if let Some(bytes) = copy_in_kernel(&src_f, &dst_f)? {
        dst_f.sync_all()?;
        return Ok(bytes);
    }

    let mut reader = BufReader::with_capacity(BUF_SIZE, src_f);
    let mut writer = BufWriter::with_capacity(BUF_SIZE, dst_f);
    let bytes = io::copy(&mut reader, &mut writer)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(bytes)
}

/// `copy_file_range` loop. `None` means the kernel refused before any byte moved.
#[cfg(target_os = "linux")]
fn copy_in_kernel(src: &File, dst: &File) -> io::Result<Option<u64>> {
    use std::os::unix::io::AsRawFd;
    const CHUNK: usize = 16 * 1024 * 1024;
    let mut total: u64 = 0;
    loop {
        let rc = unsafe {
            libc::copy_file_range(
                src.as_raw_fd(),
                std::ptr::null_mut(),
                dst.as_raw_fd(),
                std::ptr::null_mut(),
                CHUNK,
                0,
            )
        };
        if rc > 0 {
            total += rc as u64;
            continue;
        }
        if rc == 0 {
            return Ok(Some(total));
        }
        let err = io::Error::last_os_error();
        let unsupported = matches!(
            err.raw_os_error(),
            Some(libc::EXDEV | libc::ENOSYS | libc::EINVAL | libc::EPERM | libc::EOPNOTSUPP)
        );
        if total == 0 && unsupported {
            return Ok(None);
        }
        return Err(err);
    }
}

pub(crate) fn unique_temp_path(dir: &Path) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    dir.join(format!(
        ".audio_dedupe.{}.{nanos}.{seq}.tmp",
        std::process::id()
    ))
}

pub(crate) fn is_cross_device(e: &io::Error) -> bool {
    match e.raw_os_error() {
        #[cfg(unix)]
        Some(code) => code == libc::EXDEV,
        // ERROR_NOT_SAME_DEVICE
        #[cfg(windows)]
        Some(code) => code == 17,
        #[cfg(not(any(unix, windows)))]
        Some(_) => false,
        None => false,
    }
}

#[cfg(unix)]
fn fsync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn fsync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
