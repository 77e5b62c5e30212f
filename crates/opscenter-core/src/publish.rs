// crates/opscenter-core/src/publish.rs
// ============================================================================
// Module: Versioned Publication
// Description: Copy-on-write cells publishing immutable configuration values.
// Purpose: Let readers take consistent snapshots while writers replace values
//          wholesale.
// Dependencies: serde, std
// ============================================================================

//! ## Overview
//! [`Published`] holds an `Arc<T>` behind a `RwLock`. Readers clone the `Arc`
//! and release the lock before using it, so an in-flight reader keeps the
//! value it started with. Writers build the next value off to the side and
//! swap it in under a short write lock, stamping a new [`ConfigVersion`].
//!
//! The guarded value is always a complete `Arc`, so a poisoned lock is
//! recovered rather than propagated.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Versions
// ============================================================================

/// Monotonically increasing identifier of a published configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigVersion(u64);

impl ConfigVersion {
    /// Version of the first published value.
    pub const INITIAL: Self = Self(1);

    /// Creates a version from its raw number.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw version number.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns the following version.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for ConfigVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

// ============================================================================
// SECTION: Snapshot
// ============================================================================

/// An immutable value together with the version it was published as.
#[derive(Debug, PartialEq, Eq)]
pub struct Snapshot<T> {
    /// Publication version.
    pub version: ConfigVersion,
    /// Published value.
    pub value: Arc<T>,
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            version: self.version,
            value: Arc::clone(&self.value),
        }
    }
}

// ============================================================================
// SECTION: Published Cell
// ============================================================================

/// Copy-on-write cell with versioned, wholesale replacement.
pub struct Published<T> {
    /// Current snapshot.
    current: RwLock<Snapshot<T>>,
}

impl<T> Published<T> {
    /// Publishes `value` as [`ConfigVersion::INITIAL`].
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            current: RwLock::new(Snapshot {
                version: ConfigVersion::INITIAL,
                value: Arc::new(value),
            }),
        }
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot<T> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Returns the current value.
    #[must_use]
    pub fn load(&self) -> Arc<T> {
        self.snapshot().value
    }

    /// Returns the current version.
    #[must_use]
    pub fn version(&self) -> ConfigVersion {
        self.current.read().unwrap_or_else(PoisonError::into_inner).version
    }

    /// Publishes `value` as the next version and returns that version.
    pub fn replace(&self, value: T) -> ConfigVersion {
        let value = Arc::new(value);
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let version = current.version.next();
        *current = Snapshot {
            version,
            value,
        };
        version
    }

    /// Validates the candidate built from the current value, then publishes it.
    ///
    /// The write lock is held for the whole update so concurrent writers
    /// cannot interleave; readers are blocked only for that duration.
    ///
    /// # Errors
    ///
    /// Returns the error of `build`; the current value stays published.
    pub fn try_update<E>(
        &self,
        build: impl FnOnce(&T) -> Result<T, E>,
    ) -> Result<ConfigVersion, E> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let next = build(&current.value)?;
        let version = current.version.next();
        *current = Snapshot {
            version,
            value: Arc::new(next),
        };
        Ok(version)
    }
}

impl<T: Default> Default for Published<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Published<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("Published")
            .field("version", &snapshot.version)
            .field("value", &snapshot.value)
            .finish()
    }
}
