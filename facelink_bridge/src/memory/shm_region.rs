//! Named shared memory region for the bridge/daemon handoff.
//!
//! Linux backs the region with a file on /dev/shm (tmpfs, RAM-backed); other
//! platforms fall back to a mapped file under the system temp directory. The
//! bridge and the daemon agree out-of-band on the region name and layout.

use crate::error::{BridgeError, BridgeResult};
use memmap2::{MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Directory holding facelink regions.
pub fn shm_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/dev/shm/facelink")
    }
    #[cfg(not(target_os = "linux"))]
    {
        std::env::temp_dir().join("facelink")
    }
}

/// A fixed-size named memory-mapped region shared across processes.
///
/// Create-or-open semantics: whichever process arrives first creates and
/// zero-fills the backing file and owns its cleanup; later arrivals map the
/// existing file. The size is fixed at open and never changes.
#[derive(Debug)]
pub struct ShmRegion {
    mmap: MmapMut,
    _file: File,
    path: PathBuf,
    size: usize,
    owner: bool,
}

impl ShmRegion {
    /// Create or open the region `name` with exactly `size` bytes.
    ///
    /// Every failure here is a `Memory` error: region setup has its own exit
    /// code, distinct from module-load faults.
    pub fn new(name: &str, size: usize) -> BridgeResult<Self> {
        let path = shm_dir().join(name);
        let (file, is_owner) = Self::open_backing(&path, size).map_err(|e| {
            BridgeError::memory(format!("failed to open region '{}': {}", name, e))
        })?;

        // SAFETY: file is open read/write with at least `size` bytes set above.
        let mut mmap = unsafe {
            MmapOptions::new().len(size).map_mut(&file).map_err(|e| {
                BridgeError::memory(format!("failed to map region '{}': {}", name, e))
            })?
        };

        if is_owner {
            mmap.fill(0);
        }

        Ok(Self {
            mmap,
            _file: file,
            path,
            size,
            owner: is_owner,
        })
    }

    /// Create or open the backing file, sized to at least `size` bytes.
    /// Returns whether this call created it.
    fn open_backing(path: &Path, size: usize) -> std::io::Result<(File, bool)> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        if path.exists() {
            let file = OpenOptions::new().read(true).write(true).open(path)?;
            if file.metadata()?.len() < size as u64 {
                file.set_len(size as u64)?;
            }
            Ok((file, false))
        } else {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(path)?;
            file.set_len(size as u64)?;
            Ok((file, true))
        }
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.mmap.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.mmap.as_mut_ptr()
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Whether this handle created the region (responsible for unlink on drop).
    pub fn is_owner(&self) -> bool {
        self.owner
    }
}

impl Drop for ShmRegion {
    fn drop(&mut self) {
        if self.owner && self.path.exists() {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

// SAFETY: the mapping has no thread-local state; field-level write ownership
// is partitioned between the bridge and the consumer at the record layer.
unsafe impl Send for ShmRegion {}
unsafe impl Sync for ShmRegion {}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_name(prefix: &str) -> String {
        format!(
            "{}_{}_{}",
            prefix,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        )
    }

    #[test]
    fn create_zero_fills_and_owns() {
        let name = unique_name("test_zeroed");
        let size = 1024;
        let region = ShmRegion::new(&name, size).expect("create region");
        assert!(region.is_owner());
        assert_eq!(region.len(), size);

        let ptr = region.as_ptr();
        for i in 0..size {
            // SAFETY: i < size, within the mapping.
            assert_eq!(unsafe { *ptr.add(i) }, 0, "byte {} not zeroed", i);
        }
    }

    #[test]
    fn second_open_sees_first_writers_bytes() {
        let name = unique_name("test_shared");
        let size = 256;
        let mut writer = ShmRegion::new(&name, size).expect("create region");

        let wptr = writer.as_mut_ptr();
        // SAFETY: offsets < size.
        unsafe {
            *wptr = 0xAB;
            *wptr.add(size - 1) = 0xCD;
        }

        let reader = ShmRegion::new(&name, size).expect("open region");
        assert!(!reader.is_owner());
        let rptr = reader.as_ptr();
        // SAFETY: offsets < size.
        unsafe {
            assert_eq!(*rptr, 0xAB);
            assert_eq!(*rptr.add(size - 1), 0xCD);
        }
    }

    #[test]
    fn unopenable_backing_path_is_a_memory_error() {
        use crate::error::EXIT_MEMORY;

        // A directory squatting on the region path makes the open fail.
        let name = unique_name("test_squatted");
        let path = shm_dir().join(&name);
        std::fs::create_dir_all(&path).unwrap();

        let err = ShmRegion::new(&name, 64).unwrap_err();
        assert!(matches!(err, BridgeError::Memory(_)));
        assert_eq!(err.exit_code(), EXIT_MEMORY);

        std::fs::remove_dir(&path).unwrap();
    }

    #[test]
    fn owner_unlinks_backing_file_on_drop() {
        let name = unique_name("test_unlink");
        let path = shm_dir().join(&name);
        {
            let _region = ShmRegion::new(&name, 64).expect("create region");
            assert!(path.exists());
        }
        assert!(!path.exists());
    }
}
