//! Parallel hashing of many independent files.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::debug;

use crate::error::IntegrityError;
use crate::hasher::ResourceHasher;

const DEFAULT_CONCURRENCY: usize = 4;

/// Hashes a set of files with a bounded worker pool. Workers pull paths
/// from a shared queue; results are merged once every worker finishes, or
/// the first terminal error wins.
#[derive(Debug)]
pub struct BatchHasher {
    concurrency: usize,
}

impl Default for BatchHasher {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl BatchHasher {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    /// Hashes every file in `paths`, returning path → digest. Paths must
    /// be valid unicode so the result map is portable.
    pub fn hash_files(
        &self,
        paths: &[PathBuf],
    ) -> Result<BTreeMap<String, String>, IntegrityError> {
        if paths.is_empty() {
            return Ok(BTreeMap::new());
        }

        let queue: Mutex<Vec<&PathBuf>> = Mutex::new(paths.iter().rev().collect());
        let results: Mutex<BTreeMap<String, String>> = Mutex::new(BTreeMap::new());
        let first_error: Mutex<Option<IntegrityError>> = Mutex::new(None);
        let workers = self.concurrency.min(paths.len());
        debug!(files = paths.len(), workers, "batch hashing");

        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| {
                    let hasher = ResourceHasher::new();
                    loop {
                        let path = {
                            let mut queue = queue.lock().unwrap_or_else(|e| e.into_inner());
                            match queue.pop() {
                                Some(p) => p,
                                None => break,
                            }
                        };
                        if first_error
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .is_some()
                        {
                            break;
                        }
                        let outcome = path
                            .to_str()
                            .ok_or_else(|| IntegrityError::NonUnicodePath(path.clone()))
                            .and_then(|key| {
                                hasher.hash_file(path).map(|digest| (key.to_string(), digest))
                            });
                        match outcome {
                            Ok((key, digest)) => {
                                results
                                    .lock()
                                    .unwrap_or_else(|e| e.into_inner())
                                    .insert(key, digest);
                            }
                            Err(err) => {
                                let mut slot =
                                    first_error.lock().unwrap_or_else(|e| e.into_inner());
                                if slot.is_none() {
                                    *slot = Some(err);
                                }
                                break;
                            }
                        }
                    }
                });
            }
        });

        if let Some(err) = first_error.into_inner().unwrap_or_else(|e| e.into_inner()) {
            return Err(err);
        }
        Ok(results.into_inner().unwrap_or_else(|e| e.into_inner()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_all_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for i in 0..10 {
            let path = dir.path().join(format!("file{i}.bin"));
            std::fs::write(&path, format!("payload {i}")).unwrap();
            paths.push(path);
        }

        let batch = BatchHasher::default();
        let digests = batch.hash_files(&paths).unwrap();
        assert_eq!(digests.len(), 10);

        let single = ResourceHasher::new();
        for path in &paths {
            let expected = single.hash_file(path).unwrap();
            assert_eq!(digests[path.to_str().unwrap()], expected);
        }
    }

    #[test]
    fn first_error_is_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.bin");
        std::fs::write(&good, b"ok").unwrap();
        let paths = vec![good, dir.path().join("missing.bin")];

        let batch = BatchHasher::new(2);
        assert!(matches!(
            batch.hash_files(&paths),
            Err(IntegrityError::FileRead { .. })
        ));
    }

    #[test]
    fn empty_input_yields_empty_map() {
        let batch = BatchHasher::default();
        assert!(batch.hash_files(&[]).unwrap().is_empty());
    }
}
