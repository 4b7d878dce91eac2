//! Free-space check ahead of a copy fallback.

use std::io;
use std::path::Path;

#[cfg(unix)]
use std::os::unix::ffi::OsStrExt;
#[cfg(windows)]
use std::os::windows::ffi::OsStrExt;

/// Headroom kept free on the destination volume in addition to the file itself.
const CUSHION: u64 = 4 * 1024 * 1024;

pub(crate) fn format_bytes(n: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    let f = n as f64;
    if f >= GB {
        format!("{:.1} GiB", f / GB)
    } else if f >= MB {
        format!("{:.1} MiB", f / MB)
    } else if f >= KB {
        format!("{:.1} KiB", f / KB)
    } else {
        format!("{n} B")
    }
}

/// Fail with `StorageFull` when `dst_dir` cannot take `required` more bytes.
/// A volume whose free space cannot be queried is assumed to have room.
pub(crate) fn ensure_space_for_copy(dst_dir: &Path, required: u64) -> io::Result<()> {
    let Ok(free) = free_space_bytes(dst_dir) else {
        return Ok(());
    };
    if free < required.saturating_add(CUSHION) {
        return Err(io::Error::new(
            io::ErrorKind::StorageFull,
            format!(
                "not enough free space in '{}': need ~{}, free {}",
                dst_dir.display(),
                format_bytes(required),
                format_bytes(free)
            ),
        ));
    }
    Ok(())
}

#[cfg(unix)]
pub(crate) fn free_space_bytes(path: &Path) -> io::Result<u64> {
    let mut s: libc::statvfs = unsafe { std::mem::zeroed() };
    let cpath = std::ffi::CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains NUL"))?;
    let rc = unsafe { libc::statvfs(cpath.as_ptr(), &mut s) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    #[allow(clippy::unnecessary_cast)]
    Ok((s.f_bavail as u64).saturating_mul(s.f_frsize as u64))
}

#[cfg(windows)]
pub(crate) fn free_space_bytes(path: &Path) -> io::Result<u64> {
    use std::iter::once;
    use windows_sys::Win32::Storage::FileSystem::GetDiskFreeSpaceExW;
    let wide: Vec<u16> = path.as_os_str().encode_wide().chain(once(0)).collect();
    let mut free_avail: u64 = 0;
    let ok = unsafe {
        GetDiskFreeSpaceExW(
            wide.as_ptr(),
            &mut free_avail as *mut u64,
            std::ptr::null_mut(),
            std::ptr::null_mut(),
        )
    };
    if ok == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(free_avail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MiB");
    }

    #[test]
    fn absurd_requirement_is_rejected() {
        let td = tempfile::tempdir().unwrap();
        let err = ensure_space_for_copy(td.path(), u64::MAX - CUSHION).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::StorageFull);
    }
}
