//! Map a request target onto a file under the document root.

use ohttpd_core::constants::MAX_PATH_LEN;
use ohttpd_core::outcome::Outcome;
use ohttpd_core::{hdebug, htrace};

use crate::mapping::MappedFile;

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::ErrorKind;
use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;

pub struct Resolver {
    root: PathBuf,
    max_path_len: usize,
}

impl Resolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_path_len: MAX_PATH_LEN,
        }
    }

    /// Resolve `url` (origin form, starts with `/`) to a mapped body.
    ///
    /// Every failure is the outcome to answer with.
    pub fn resolve(&self, url: &str) -> Result<MappedFile, Outcome> {
        let path = match url.find('?') {
            Some(q) => &url[..q],
            None => url,
        };
        if path.split('/').any(|seg| seg == "..") {
            hdebug!("rejecting traversal in {:?}", url);
            return Err(Outcome::Forbidden);
        }

        let mut full = OsString::from(self.root.as_os_str());
        full.push(path);
        if full.len() > self.max_path_len {
            return Err(Outcome::ResourceMissing);
        }
        let full = PathBuf::from(full);

        let meta = match fs::metadata(&full) {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::PermissionDenied => return Err(Outcome::Forbidden),
            Err(_) => return Err(Outcome::ResourceMissing),
        };
        if meta.mode() & libc::S_IROTH as u32 == 0 {
            return Err(Outcome::Forbidden);
        }
        if meta.is_dir() {
            return Err(Outcome::MalformedRequest);
        }
        // FIFOs and devices would block or never end.
        if !meta.is_file() {
            return Err(Outcome::Forbidden);
        }

        let file = File::open(&full).map_err(|_| Outcome::ServerError)?;
        let len = file.metadata().map_err(|_| Outcome::ServerError)?.len() as usize;
        let mapped = MappedFile::map(&file, len).map_err(|_| Outcome::ServerError)?;
        htrace!("{} -> {} ({} bytes)", url, full.display(), len);
        Ok(mapped)
    }
}
