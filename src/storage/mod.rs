//! Storage module for wallet configurations and pending artifacts

pub mod persistence;

pub use persistence::{
    load_from_file, save_to_file, ArtifactStore, FileArtifactStore, MemoryArtifactStore,
    StorageConfig, StorageError, Versioned,
};
