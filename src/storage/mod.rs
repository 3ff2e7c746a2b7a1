// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod medium;
pub mod public_key_store;
pub mod string_storage;

pub use medium::{BlobUpdate, FileMedium, MediumError, MemoryMedium, StorageMedium, UnavailableMedium};
pub use public_key_store::{
    PublicKeyData, PublicKeyStore, PublicKeyStoreError, PUBLIC_KEY_STORAGE_KEY,
};
pub use string_storage::GenericStringStorage;
