// Copyright (c) 2026-present, constdb
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Small file-system helpers shared by the writer and reader.

use std::fs::File;
use std::path::Path;

/// Reads exactly `len` bytes at `offset` without touching the file cursor,
/// so concurrent readers never interleave seeks.
pub fn read_exact_at(file: &File, offset: u64, len: usize) -> std::io::Result<Vec<u8>> {
    let mut buf = vec![0u8; len];

    #[cfg(unix)]
    {
        use std::os::unix::fs::FileExt;
        file.read_exact_at(&mut buf, offset)?;
    }

    #[cfg(windows)]
    {
        use std::os::windows::fs::FileExt;

        let mut pos = 0;
        while pos < buf.len() {
            let n = file.seek_read(
                buf.get_mut(pos..).unwrap_or_default(),
                offset + pos as u64,
            )?;
            if n == 0 {
                return Err(std::io::ErrorKind::UnexpectedEof.into());
            }
            pos += n;
        }
    }

    Ok(buf)
}

/// Flushes a directory entry to durable storage, making a just-renamed
/// file visible after a crash.
#[cfg(not(target_os = "windows"))]
pub fn fsync_directory(path: &Path) -> std::io::Result<()> {
    let file = File::open(path)?;
    debug_assert!(file.metadata()?.is_dir());
    file.sync_all()
}

/// Flushes a directory entry to durable storage, making a just-renamed
/// file visible after a crash.
#[cfg(target_os = "windows")]
pub fn fsync_directory(path: &Path) -> std::io::Result<()> {
    // Cannot fsync directory on Windows
    Ok(())
}
