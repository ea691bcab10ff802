//! Shared device buffer handles.
//!
//! The CPU device keeps its memory host-side; a [`DeviceBuffer`] is a
//! cheaply clonable handle to one allocation. The frame-wide input buffer
//! is written between device tasks and only read while workers run; each
//! per-tile output buffer is exclusively owned by one mapped tile.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Handle to a device-side f32 allocation.
#[derive(Debug, Clone, Default)]
pub struct DeviceBuffer {
    data: Arc<RwLock<Vec<f32>>>,
}

impl DeviceBuffer {
    /// Allocates a zero-filled buffer of `len` floats.
    pub fn alloc(len: usize) -> Self {
        Self {
            data: Arc::new(RwLock::new(vec![0.0; len])),
        }
    }

    /// Wraps host data in a device buffer.
    pub fn from_vec(data: Vec<f32>) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
        }
    }

    /// Number of floats in the allocation.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` if the allocation is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Locks the buffer for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, Vec<f32>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Locks the buffer for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, Vec<f32>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copies the buffer contents back to host memory.
    pub fn to_vec(&self) -> Vec<f32> {
        self.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_and_share() {
        let buffer = DeviceBuffer::alloc(4);
        assert_eq!(buffer.len(), 4);

        let alias = buffer.clone();
        alias.write()[2] = 7.0;
        assert_eq!(buffer.to_vec(), vec![0.0, 0.0, 7.0, 0.0]);
    }
}
