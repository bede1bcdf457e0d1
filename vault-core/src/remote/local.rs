use std::fs::{self, File};
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use tracing::trace;

use super::{RemoteError, RemoteStore};
use crate::cancel::CancelToken;

/// Objects are plain files; `name` is a path resolved against `base`.
pub struct LocalStore {
    base: PathBuf,
}

impl LocalStore {
    pub fn new(base: PathBuf) -> Self {
        Self { base }
    }

    fn resolve(&self, name: &str) -> PathBuf {
        self.base.join(name)
    }
}

impl RemoteStore for LocalStore {
    fn exists(&self, name: &str, cancel: &CancelToken) -> Result<bool, RemoteError> {
        cancel.check()?;
        match fs::metadata(self.resolve(name)) {
            Ok(m) => Ok(m.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(RemoteError::transport(name, e)),
        }
    }

    fn get(&self, name: &str, cancel: &CancelToken) -> Result<Box<dyn Read + Send>, RemoteError> {
        cancel.check()?;
        let path = self.resolve(name);
        trace!(path = %path.display(), "reading object");
        match File::open(&path) {
            Ok(f) => Ok(Box::new(f)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(RemoteError::NotFound(name.to_string())),
            Err(e) => Err(RemoteError::transport(name, e)),
        }
    }

    fn put(
        &self,
        name: &str,
        data: &mut dyn Read,
        size_hint: u64,
        cancel: &CancelToken,
    ) -> Result<(), RemoteError> {
        cancel.check()?;
        let path = self.resolve(name);
        trace!(path = %path.display(), size = size_hint, "writing object");
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| RemoteError::transport(name, e))?;
        }
        // Write to a sibling temp file and rename so readers never see a partial object.
        let tmp = tmp_path(&path);
        let res = copy_to(&tmp, data, cancel)
            .and_then(|_| fs::rename(&tmp, &path).map_err(RemoteError::from_io(name)));
        if res.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        res
    }
}

impl RemoteError {
    fn from_io(name: &str) -> impl Fn(io::Error) -> RemoteError + '_ {
        move |e| RemoteError::transport(name, e)
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(format!(".tmp-{}", std::process::id()));
    PathBuf::from(s)
}

fn copy_to(tmp: &Path, data: &mut dyn Read, cancel: &CancelToken) -> Result<(), RemoteError> {
    let name = tmp.to_string_lossy();
    let mut out = File::create(tmp).map_err(RemoteError::from_io(&name))?;
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        cancel.check()?;
        let n = match data.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(RemoteError::transport(&name, e)),
        };
        out.write_all(&buf[..n]).map_err(RemoteError::from_io(&name))?;
    }
    out.sync_all().map_err(RemoteError::from_io(&name))
}
