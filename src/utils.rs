//! Utility functions for disk space checks and human-readable formatting

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const MB: u64 = 1024 * 1024;

/// Format a duration in seconds as `MM:SS`, or `HH:MM:SS` past one hour
///
/// # Examples
///
/// ```
/// use dropzone_dl::utils::humanize_duration;
///
/// assert_eq!(humanize_duration(Some(65)), "01:05");
/// assert_eq!(humanize_duration(Some(3605)), "01:00:05");
/// assert_eq!(humanize_duration(None), "unknown");
/// ```
pub fn humanize_duration(seconds: Option<u64>) -> String {
    let Some(seconds) = seconds else {
        return "unknown".to_string();
    };
    let (h, rem) = (seconds / 3600, seconds % 3600);
    let (m, s) = (rem / 60, rem % 60);
    if h > 0 {
        format!("{h:02}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

/// Format a byte count with one decimal and a binary unit (`B` through `TB`)
///
/// # Examples
///
/// ```
/// use dropzone_dl::utils::sizeof_fmt;
///
/// assert_eq!(sizeof_fmt(500.0), "500.0 B");
/// assert_eq!(sizeof_fmt(1536.0), "1.5 KB");
/// ```
pub fn sizeof_fmt(bytes: f64) -> String {
    let mut num = bytes;
    for unit in ["B", "KB", "MB", "GB"] {
        if num < 1024.0 {
            return format!("{num:.1} {unit}");
        }
        num /= 1024.0;
    }
    format!("{num:.1} TB")
}

/// Get available disk space for a given path
///
/// Uses platform-specific APIs to query filesystem statistics:
/// - Linux/macOS: statvfs
/// - Windows: GetDiskFreeSpaceExW
pub fn get_available_space(path: &Path) -> std::io::Result<u64> {
    #[cfg(unix)]
    {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        // SAFETY: c_path is a valid NUL-terminated string, stat is zeroed before
        // the call and only read after statvfs reports success.
        unsafe {
            let mut stat: libc::statvfs = std::mem::zeroed();
            if libc::statvfs(c_path.as_ptr(), &mut stat) != 0 {
                return Err(std::io::Error::last_os_error());
            }

            // f_bavail: blocks available to unprivileged users
            #[allow(clippy::unnecessary_cast)]
            let available = (stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64);
            Ok(available)
        }
    }

    #[cfg(windows)]
    {
        use std::os::windows::ffi::OsStrExt;
        use winapi::um::fileapi::GetDiskFreeSpaceExW;

        let wide_path: Vec<u16> = path
            .as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        // SAFETY: wide_path is NUL-terminated and every out pointer refers to
        // a live, aligned u64 that is only read after a successful call.
        unsafe {
            let mut free_bytes_available: u64 = 0;
            let mut _total_bytes: u64 = 0;
            let mut _total_free_bytes: u64 = 0;

            if GetDiskFreeSpaceExW(
                wide_path.as_ptr(),
                &mut free_bytes_available as *mut u64 as *mut _,
                &mut _total_bytes as *mut u64 as *mut _,
                &mut _total_free_bytes as *mut u64 as *mut _,
            ) == 0
            {
                return Err(std::io::Error::last_os_error());
            }

            Ok(free_bytes_available)
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = path;
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "Disk space checking is not supported on this platform",
        ))
    }
}

/// Fail with [`Error::ResourceExhausted`] unless `dir` has `required_mb` free
///
/// A directory that does not exist yet is checked through its nearest
/// existing ancestor; if none exists the check passes.
pub fn ensure_free_space(dir: &Path, required_mb: u64) -> Result<()> {
    let Some(existing) = dir.ancestors().find(|p| p.exists()) else {
        tracing::debug!(path = %dir.display(), "no existing ancestor, skipping space check");
        return Ok(());
    };

    let available = get_available_space(existing).map_err(|e| {
        Error::DiskSpaceCheckFailed(format!("{}: {}", existing.display(), e))
    })?;

    if available < required_mb.saturating_mul(MB) {
        return Err(Error::ResourceExhausted {
            required_mb,
            available_mb: available / MB,
        });
    }
    Ok(())
}

/// Size of a file in whole MiB, rounded down
pub fn file_size_mb(bytes: u64) -> u64 {
    bytes / MB
}

/// Remove `paths`, returning how many files were actually deleted
///
/// Files that are already gone are skipped; other failures are logged.
pub async fn remove_files(paths: &[PathBuf]) -> usize {
    let mut removed = 0;
    for path in paths {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "removed file");
                removed += 1;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove file");
            }
        }
    }
    removed
}
