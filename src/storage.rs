use std::{fs, io, path::Path};

/// Durable storage for serialized model parameters.
pub trait Storage {
    /// Writes `blob` to `path`, replacing whatever was there.
    fn save(&mut self, blob: &[u8], path: &Path) -> io::Result<()>;
}

/// Stores blobs as files, creating missing parent directories.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileStorage;

impl Storage for FileStorage {
    fn save(&mut self, blob: &[u8], path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, blob)?;
        log::info!("saved {} bytes to {}", blob.len(), path.display());
        Ok(())
    }
}
