use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use super::{RemoteBlob, RemoteStore, SyncError};

#[derive(Debug, Default)]
struct Inner {
    blobs: BTreeMap<String, (Vec<u8>, u64)>,
    failures: VecDeque<SyncError>,
    calls: usize,
}

/// In-process remote. Clones share the same blobs, so a test can keep a
/// handle while a [`super::RemoteSync`] owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Rc<RefCell<Inner>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a failure for the next store call.
    pub fn fail_next(&self, err: SyncError) {
        self.inner.borrow_mut().failures.push_back(err);
    }

    /// Current content at `path`.
    #[must_use]
    pub fn content(&self, path: &str) -> Option<Vec<u8>> {
        self.inner.borrow().blobs.get(path).map(|(bytes, _)| bytes.clone())
    }

    /// Number of store calls made, failed ones included.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.inner.borrow().calls
    }

    fn begin(&self) -> Result<(), SyncError> {
        let mut inner = self.inner.borrow_mut();
        inner.calls += 1;
        inner.failures.pop_front().map_or(Ok(()), Err)
    }
}

impl RemoteStore for MemoryStore {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn fetch(&self, path: &str) -> Result<Option<RemoteBlob>, SyncError> {
        self.begin()?;
        Ok(self.inner.borrow().blobs.get(path).map(|(_, rev)| RemoteBlob {
            revision: rev.to_string(),
        }))
    }

    fn create(&self, path: &str, content: &[u8], _message: &str) -> Result<(), SyncError> {
        self.begin()?;
        let mut inner = self.inner.borrow_mut();
        if inner.blobs.contains_key(path) {
            return Err(SyncError::Rejected {
                status: 422,
                message: format!("{path} already exists"),
            });
        }
        inner.blobs.insert(path.to_string(), (content.to_vec(), 1));
        Ok(())
    }

    fn update(
        &self,
        path: &str,
        content: &[u8],
        revision: &str,
        _message: &str,
    ) -> Result<(), SyncError> {
        self.begin()?;
        let mut inner = self.inner.borrow_mut();
        let Some((bytes, rev)) = inner.blobs.get_mut(path) else {
            return Err(SyncError::Rejected {
                status: 404,
                message: format!("{path} does not exist"),
            });
        };
        if rev.to_string() != revision {
            return Err(SyncError::Rejected {
                status: 409,
                message: format!("{path} is at revision {rev}, not {revision}"),
            });
        }
        *bytes = content.to_vec();
        *rev += 1;
        Ok(())
    }
}
