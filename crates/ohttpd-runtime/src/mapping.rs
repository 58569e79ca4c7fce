//! Read-only memory mapping of a file body.

use ohttpd_core::error::Result;

use crate::sys::os_error;

use std::fs::File;
use std::os::unix::io::AsRawFd;
use std::ptr::NonNull;

/// A whole file mapped `PROT_READ`, `MAP_PRIVATE`.
///
/// The mapping outlives the descriptor it came from and is unmapped on
/// drop, so it is released exactly once whichever path ends the response.
/// An empty file gets no mapping at all.
pub struct MappedFile {
    ptr: NonNull<u8>,
    len: usize,
}

// The mapping is private and read-only.
unsafe impl Send for MappedFile {}
unsafe impl Sync for MappedFile {}

impl MappedFile {
    /// Map the first `len` bytes of `file`.
    pub fn map(file: &File, len: usize) -> Result<Self> {
        if len == 0 {
            return Ok(Self::empty());
        }
        let addr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ,
                libc::MAP_PRIVATE,
                file.as_raw_fd(),
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(os_error());
        }
        match NonNull::new(addr as *mut u8) {
            Some(ptr) => Ok(Self { ptr, len }),
            None => Err(os_error()),
        }
    }

    pub fn empty() -> Self {
        Self {
            ptr: NonNull::dangling(),
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for MappedFile {
    fn drop(&mut self) {
        if self.len > 0 {
            unsafe {
                libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.len);
            }
        }
    }
}

impl std::fmt::Debug for MappedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedFile").field("len", &self.len).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_map_matches_file() {
        let mut tmp = tempfile::tempfile().unwrap();
        tmp.write_all(b"<html>hello</html>").unwrap();
        let m = MappedFile::map(&tmp, 18).unwrap();
        drop(tmp);
        // Survives the descriptor.
        assert_eq!(m.as_slice(), b"<html>hello</html>");
        assert_eq!(m.len(), 18);
    }

    #[test]
    fn test_empty_file_has_no_mapping() {
        let tmp = tempfile::tempfile().unwrap();
        let m = MappedFile::map(&tmp, 0).unwrap();
        assert!(m.is_empty());
        assert!(m.as_slice().is_empty());
    }
}
