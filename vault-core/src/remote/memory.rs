use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::sync::{Arc, Mutex};

use super::{RemoteError, RemoteStore};
use crate::cancel::CancelToken;

/// Process-local store, handy for tests and dry runs. Clones share contents.
#[derive(Clone, Default)]
pub struct MemoryStore {
    objects: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Object names starting with `prefix`, sorted.
    pub fn names(&self, prefix: &str) -> Vec<String> {
        let objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        objects.keys().filter(|k| k.starts_with(prefix)).cloned().collect()
    }
}

impl RemoteStore for MemoryStore {
    fn exists(&self, name: &str, cancel: &CancelToken) -> Result<bool, RemoteError> {
        cancel.check()?;
        Ok(self.objects.lock().unwrap_or_else(|e| e.into_inner()).contains_key(name))
    }

    fn get(&self, name: &str, cancel: &CancelToken) -> Result<Box<dyn Read + Send>, RemoteError> {
        cancel.check()?;
        let objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        match objects.get(name) {
            Some(data) => Ok(Box::new(Cursor::new(data.clone()))),
            None => Err(RemoteError::NotFound(name.to_string())),
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
        let mut buf = Vec::with_capacity(size_hint as usize);
        data.read_to_end(&mut buf).map_err(|e| RemoteError::transport(name, e))?;
        cancel.check()?;
        let mut objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        objects.insert(name.to_string(), buf);
        Ok(())
    }
}
