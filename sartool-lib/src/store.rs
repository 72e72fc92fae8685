//! Named-variable stores the provisioning codec reads from and writes to.

use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::constants::*;
use crate::error::SarError;
use crate::guid::Guid;

/// A store keyed by `(scope, name)`.
pub trait VariableStore {
    /// Obtain whatever privilege writes need. Called once before first use;
    /// a failure is reported but does not stop later calls from being tried.
    fn acquire_privilege(&mut self) -> Result<(), SarError> {
        Ok(())
    }

    /// Copy the variable into `buf` and return how many bytes were copied.
    fn read(&self, scope: &Guid, name: &str, buf: &mut [u8]) -> Result<usize, SarError>;

    fn write(&mut self, scope: &Guid, name: &str, data: &[u8]) -> Result<(), SarError>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

fn copy_into(source: &[u8], buf: &mut [u8]) -> usize {
    let n = source.len().min(buf.len());
    buf[..n].copy_from_slice(&source[..n]);
    n
}

/// Fail unless the mount under `root` is writable and we are root.
#[cfg(target_os = "linux")]
fn check_writable_mount(root: &Path) -> io::Result<()> {
    use rustix::fs::{StatVfsMountFlags, statvfs};

    let stats = statvfs(root)?;
    if stats.f_flag.contains(StatVfsMountFlags::RDONLY) {
        return Err(io::Error::new(ErrorKind::PermissionDenied, "efivarfs is mounted read-only"));
    }
    if !rustix::process::geteuid().is_root() {
        return Err(io::Error::new(
            ErrorKind::PermissionDenied,
            "writing firmware variables requires root",
        ));
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn check_writable_mount(_root: &Path) -> io::Result<()> {
    Ok(())
}

/// efivarfs marks existing variables immutable; drop the flag before a rewrite.
/// Filesystems without inode flags are left alone.
#[cfg(target_os = "linux")]
fn clear_immutable(path: &Path) -> io::Result<()> {
    use rustix::fs::{IFlags, ioctl_getflags, ioctl_setflags};

    let file = fs::File::open(path)?;
    let flags = match ioctl_getflags(&file) {
        Ok(flags) => flags,
        Err(e) => {
            debug!("No inode flags on {}: {}", path.display(), e);
            return Ok(());
        }
    };
    if flags.contains(IFlags::IMMUTABLE) {
        debug!("Clearing immutable flag on {}", path.display());
        ioctl_setflags(&file, flags - IFlags::IMMUTABLE)?;
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn clear_immutable(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// One `<name>.bin` file per variable in a flat directory. Scope is ignored.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    dir: PathBuf,
}

impl DirectoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.bin"))
    }
}

impl VariableStore for DirectoryStore {
    fn read(&self, _scope: &Guid, name: &str, buf: &mut [u8]) -> Result<usize, SarError> {
        let path = self.path_for(name);
        let contents = fs::read(&path).map_err(|e| SarError::store("read", path.display().to_string(), e))?;
        debug!("Read {} bytes from {}", contents.len(), path.display());
        Ok(copy_into(&contents, buf))
    }

    fn write(&mut self, _scope: &Guid, name: &str, data: &[u8]) -> Result<(), SarError> {
        let path = self.path_for(name);
        fs::write(&path, data).map_err(|e| SarError::store("write", path.display().to_string(), e))?;
        debug!("Wrote {} bytes to {}", data.len(), path.display());
        Ok(())
    }

    fn describe(&self) -> String {
        format!("directory {}", self.dir.display())
    }
}

/// UEFI variables through Linux efivarfs.
///
/// Each variable is a file `<root>/<name>-<guid>` whose first four bytes are
/// the little-endian attribute word; the payload follows.
#[derive(Debug, Clone)]
pub struct EfiVarStore {
    root: PathBuf,
    attributes: u32,
}

impl Default for EfiVarStore {
    fn default() -> Self {
        Self::new(DEFAULT_EFIVARS_ROOT)
    }
}

impl EfiVarStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            attributes: EFI_VARIABLE_DEFAULT_ATTRIBUTES,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, scope: &Guid, name: &str) -> PathBuf {
        self.root.join(format!("{}-{}", name, scope.to_efivar_string()))
    }
}

impl VariableStore for EfiVarStore {
    fn acquire_privilege(&mut self) -> Result<(), SarError> {
        let target = self.root.display().to_string();
        let meta = fs::metadata(&self.root).map_err(|e| SarError::store("access", target.clone(), e))?;

        if !meta.is_dir() {
            return Err(SarError::store(
                "access",
                target,
                io::Error::new(ErrorKind::NotADirectory, "efivarfs root is not a directory"),
            ));
        }
        check_writable_mount(&self.root).map_err(|e| SarError::store("access", target, e))?;

        info!("Firmware variable access available at {}", self.root.display());
        Ok(())
    }

    fn read(&self, scope: &Guid, name: &str, buf: &mut [u8]) -> Result<usize, SarError> {
        let path = self.path_for(scope, name);
        let contents = fs::read(&path).map_err(|e| SarError::store("read", path.display().to_string(), e))?;

        let Some(payload) = contents.get(EFI_VARIABLE_ATTRIBUTES_SIZE..) else {
            return Err(SarError::truncated(EFI_VARIABLE_ATTRIBUTES_SIZE, contents.len()));
        };
        debug!(
            "Read {} payload bytes from {} (attributes {})",
            payload.len(),
            path.display(),
            hex::encode(&contents[..EFI_VARIABLE_ATTRIBUTES_SIZE])
        );
        Ok(copy_into(payload, buf))
    }

    fn write(&mut self, scope: &Guid, name: &str, data: &[u8]) -> Result<(), SarError> {
        let path = self.path_for(scope, name);
        let mut contents = Vec::with_capacity(EFI_VARIABLE_ATTRIBUTES_SIZE + data.len());
        contents.extend_from_slice(&self.attributes.to_le_bytes());
        contents.extend_from_slice(data);

        let target = path.display().to_string();
        if path.exists() {
            clear_immutable(&path).map_err(|e| SarError::store("unlock", target.clone(), e))?;
        }

        // efivarfs replaces a variable with a single write and rejects truncation
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| SarError::store("write", target.clone(), e))?;
        file.write_all(&contents).map_err(|e| SarError::store("write", target, e))?;
        debug!("Wrote {} bytes to {}", data.len(), path.display());
        Ok(())
    }

    fn describe(&self) -> String {
        format!("firmware variables under {}", self.root.display())
    }
}

impl<S: VariableStore + ?Sized> VariableStore for Box<S> {
    fn acquire_privilege(&mut self) -> Result<(), SarError> {
        (**self).acquire_privilege()
    }

    fn read(&self, scope: &Guid, name: &str, buf: &mut [u8]) -> Result<usize, SarError> {
        (**self).read(scope, name, buf)
    }

    fn write(&mut self, scope: &Guid, name: &str, data: &[u8]) -> Result<(), SarError> {
        (**self).write(scope, name, data)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
