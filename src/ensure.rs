//! Skip-existing helper: every mutating release step first looks for the
//! result it would produce and reuses it when a concurrent or earlier
//! invocation already created it.

use crate::error::Result;

/// Result of an idempotent create: either the pre-existing resource or the
/// one just created.
#[derive(Debug, Clone, PartialEq)]
pub enum Ensured<T> {
    Existing(T),
    Created(T),
}

impl<T> Ensured<T> {
    pub fn into_inner(self) -> T {
        match self {
            Ensured::Existing(value) | Ensured::Created(value) => value,
        }
    }

    pub fn already_existed(&self) -> bool {
        matches!(self, Ensured::Existing(_))
    }
}

/// Find-or-create. `find` is consulted first; `create` runs only when
/// nothing exists, and may itself report `Existing` when it loses a creation
/// race on the host side.
pub fn ensure<T, F, C>(find: F, create: C) -> Result<Ensured<T>>
where
    F: FnOnce() -> Result<Option<T>>,
    C: FnOnce() -> Result<Ensured<T>>,
{
    if let Some(existing) = find()? {
        return Ok(Ensured::Existing(existing));
    }
    create()
}
