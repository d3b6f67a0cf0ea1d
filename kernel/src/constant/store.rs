//! `ConstantStore`: per-bundle map from token to value bytes.
//!
//! # Invariants
//!
//! - Every entry's byte length equals its descriptor's type size.
//! - An entry that was never `set` holds its declared default bytes.
//! - Once frozen, no entry changes. `freeze` happens exactly once.
//!
//! Typed access goes through [`bytemuck`]; a request whose type does not
//! match the declared descriptor fails with `TypeMismatch` before any byte
//! is read or written.

use std::collections::BTreeMap;

use bytemuck::Pod;

use super::descriptor::{ConstantDescriptor, ConstantToken, TypeDescriptor};
use super::identity::SpecializationId;
use crate::error::SpecConstError;

#[derive(Debug, Clone, PartialEq, Eq)]
struct StoreEntry {
    descriptor: ConstantDescriptor,
    value: Vec<u8>,
    is_set: bool,
}

/// Value store for the constants declared by a bundle's images.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstantStore {
    entries: BTreeMap<ConstantToken, StoreEntry>,
    frozen: bool,
}

/// Read-only view of one store entry.
#[derive(Debug, Clone, Copy)]
pub struct EntryView<'a> {
    pub descriptor: &'a ConstantDescriptor,
    pub value: &'a [u8],
    pub is_set: bool,
}

impl ConstantStore {
    /// Build a store pre-filled with defaults.
    ///
    /// The same token may appear more than once (several images using one
    /// constant); every occurrence must carry the same type.
    ///
    /// # Errors
    ///
    /// Returns [`SpecConstError::TypeMismatch`] if a token is declared twice
    /// with different types.
    pub fn from_descriptors<'a>(
        descriptors: impl IntoIterator<Item = &'a ConstantDescriptor>,
    ) -> Result<Self, SpecConstError> {
        let mut entries: BTreeMap<ConstantToken, StoreEntry> = BTreeMap::new();
        for descriptor in descriptors {
            if let Some(existing) = entries.get(&descriptor.token()) {
                let declared = existing.descriptor.type_descriptor();
                if !declared.accepts(descriptor.type_descriptor()) {
                    return Err(SpecConstError::TypeMismatch {
                        token: descriptor.token(),
                        declared: declared.type_name(),
                        requested: descriptor.type_descriptor().type_name(),
                    });
                }
                continue;
            }
            entries.insert(
                descriptor.token(),
                StoreEntry {
                    descriptor: descriptor.clone(),
                    value: descriptor.default_bytes().to_vec(),
                    is_set: false,
                },
            );
        }
        Ok(Self {
            entries,
            frozen: false,
        })
    }

    /// Whether the store carries an entry for `token`, set or not.
    #[must_use]
    pub fn has(&self, token: ConstantToken) -> bool {
        self.entries.contains_key(&token)
    }

    /// Whether a host-side `set` happened for `token` in this store.
    #[must_use]
    pub fn is_set(&self, token: ConstantToken) -> bool {
        self.entries.get(&token).is_some_and(|e| e.is_set)
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in token order.
    pub fn entries(&self) -> impl Iterator<Item = EntryView<'_>> {
        self.entries.values().map(|e| EntryView {
            descriptor: &e.descriptor,
            value: &e.value,
            is_set: e.is_set,
        })
    }

    /// Current bytes for `token`.
    ///
    /// # Errors
    ///
    /// Returns [`SpecConstError::UnknownConstant`] if the token is absent.
    pub fn get_raw(&self, token: ConstantToken) -> Result<&[u8], SpecConstError> {
        self.entry(token).map(|e| e.value.as_slice())
    }

    /// Current value of `token` read as `T`.
    ///
    /// # Errors
    ///
    /// - [`SpecConstError::UnknownConstant`] if the token is absent.
    /// - [`SpecConstError::TypeMismatch`] if `T` is not the declared type.
    pub fn read<T: Pod>(&self, token: ConstantToken) -> Result<T, SpecConstError> {
        let entry = self.entry(token)?;
        check_type(token, entry.descriptor.type_descriptor(), &TypeDescriptor::of::<T>())?;
        Ok(bytemuck::pod_read_unaligned(&entry.value))
    }

    /// Typed read through a declared identity.
    ///
    /// # Errors
    ///
    /// Same as [`read`](Self::read).
    pub fn get<T: Pod>(&self, id: &SpecializationId<T>) -> Result<T, SpecConstError> {
        self.read(id.token())
    }

    /// Typed write through a declared identity.
    ///
    /// # Errors
    ///
    /// Same as [`set_raw`](Self::set_raw).
    pub fn set<T: Pod>(&mut self, id: &SpecializationId<T>, value: T) -> Result<(), SpecConstError> {
        self.set_raw(
            id.token(),
            &TypeDescriptor::of::<T>(),
            bytemuck::bytes_of(&value),
        )
    }

    /// Overwrite the bytes for `token` and mark it set.
    ///
    /// `ty` is the type the caller believes the constant has; it must match
    /// the declared type. Checks run before any write.
    ///
    /// # Errors
    ///
    /// - [`SpecConstError::InvalidState`] if the store is frozen.
    /// - [`SpecConstError::UnknownConstant`] if the token is absent.
    /// - [`SpecConstError::TypeMismatch`] on type or length disagreement.
    pub fn set_raw(
        &mut self,
        token: ConstantToken,
        ty: &TypeDescriptor,
        bytes: &[u8],
    ) -> Result<(), SpecConstError> {
        self.ensure_mutable()?;
        let entry = self.entry(token)?;
        check_type(token, entry.descriptor.type_descriptor(), ty)?;
        if bytes.len() != ty.size() {
            return Err(SpecConstError::TypeMismatch {
                token,
                declared: ty.type_name(),
                requested: "byte slice of different length",
            });
        }
        if let Some(entry) = self.entries.get_mut(&token) {
            entry.value.copy_from_slice(bytes);
            entry.is_set = true;
        }
        Ok(())
    }

    /// Restore the declared default for `token` and clear its set flag.
    ///
    /// # Errors
    ///
    /// - [`SpecConstError::InvalidState`] if the store is frozen.
    /// - [`SpecConstError::UnknownConstant`] if the token is absent.
    pub fn reset(&mut self, token: ConstantToken) -> Result<(), SpecConstError> {
        self.ensure_mutable()?;
        let entry = self
            .entries
            .get_mut(&token)
            .ok_or(SpecConstError::UnknownConstant { token })?;
        entry.value.copy_from_slice(entry.descriptor.default_bytes());
        entry.is_set = false;
        Ok(())
    }

    /// Make the store immutable.
    ///
    /// # Errors
    ///
    /// Returns [`SpecConstError::InvalidState`] if already frozen.
    pub fn freeze(&mut self) -> Result<(), SpecConstError> {
        if self.frozen {
            return Err(SpecConstError::invalid_state("constant store is already frozen"));
        }
        self.frozen = true;
        Ok(())
    }

    fn ensure_mutable(&self) -> Result<(), SpecConstError> {
        if self.frozen {
            return Err(SpecConstError::invalid_state(
                "constant store is frozen; values are fixed after compilation",
            ));
        }
        Ok(())
    }

    fn entry(&self, token: ConstantToken) -> Result<&StoreEntry, SpecConstError> {
        self.entries
            .get(&token)
            .ok_or(SpecConstError::UnknownConstant { token })
    }
}

fn check_type(
    token: ConstantToken,
    declared: &TypeDescriptor,
    requested: &TypeDescriptor,
) -> Result<(), SpecConstError> {
    if declared.accepts(requested) {
        Ok(())
    } else {
        Err(SpecConstError::TypeMismatch {
            token,
            declared: declared.type_name(),
            requested: requested.type_name(),
        })
    }
}
