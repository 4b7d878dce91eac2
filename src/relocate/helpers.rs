//! Error enrichment for filesystem calls.
//!
//! `io_error_with_help(op, path)` returns a closure for `.map_err(...)` that keeps the original
//! `ErrorKind` (retry classification depends on it) and adds the operation, the path and a
//! platform hint to the message.

use std::io;
use std::path::Path;

fn hint_for(e: &io::Error) -> Option<&'static str> {
    #[cfg(unix)]
    if let Some(code) = e.raw_os_error() {
        return match code {
            libc::EACCES | libc::EPERM => Some("permission denied; check ownership and write permissions"),
            libc::EXDEV => Some("cross-filesystem; atomic rename not possible"),
            libc::EBUSY => Some("resource busy; another process may be using the file"),
            libc::ENOENT => Some("path not found; it may have been removed during the run"),
            libc::EEXIST => Some("already exists"),
            libc::ENOSPC => Some("no space left on device"),
            libc::EROFS => Some("read-only filesystem"),
            libc::ENAMETOOLONG => Some("filename or path too long"),
            libc::EMFILE | libc::ENFILE => Some("too many open files"),
            _ => None,
        };
    }
    #[cfg(windows)]
    if let Some(code) = e.raw_os_error() {
        return match code {
            5 => Some("access denied; check permissions"),
            17 => Some("not same device; cross-filesystem move"),
            32 | 33 => Some("sharing violation; the file is in use"),
            2 | 3 => Some("path not found; it may have been removed during the run"),
            80 | 183 => Some("already exists"),
            39 | 112 => Some("insufficient disk space"),
            206 => Some("filename or path too long"),
            _ => None,
        };
    }
    match e.kind() {
        io::ErrorKind::PermissionDenied => Some("permission denied"),
        io::ErrorKind::NotFound => Some("path not found"),
        io::ErrorKind::AlreadyExists => Some("already exists"),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Some("busy or timed out"),
        _ => None,
    }
}

fn build_message(op: &str, path: &Path, e: &io::Error) -> String {
    let mut msg = format!("{op} '{}': {e}", path.display());
    if let Some(hint) = hint_for(e) {
        msg.push_str(" (");
        msg.push_str(hint);
        msg.push(')');
    }
    msg
}

/// Adapter for `io::Result` code; the returned error keeps the original kind.
pub fn io_error_with_help<'a>(
    op: &'a str,
    path: &'a Path,
) -> impl FnOnce(io::Error) -> io::Error + 'a {
    move |e: io::Error| io::Error::new(e.kind(), build_message(op, path, &e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_names_operation_and_path_and_keeps_kind() {
        let e = io::Error::from(io::ErrorKind::NotFound);
        let enriched = io_error_with_help("open source", Path::new("/music/a.mp3"))(e);
        assert_eq!(enriched.kind(), io::ErrorKind::NotFound);
        let msg = enriched.to_string();
        assert!(msg.contains("open source"));
        assert!(msg.contains("/music/a.mp3"));
        assert!(msg.contains("not found"));
    }

    #[cfg(unix)]
    #[test]
    fn cross_device_gets_a_hint() {
        let e = io::Error::from_raw_os_error(libc::EXDEV);
        let msg = io_error_with_help("rename", Path::new("/x"))(e).to_string();
        assert!(msg.contains("cross-filesystem"));
    }
}
