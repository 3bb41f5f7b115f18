//! # Mount Table
//!
//! Associa containers remotos a caminhos do tipo `/mnt/{conta}/{container}`, de modo
//! que o restante do pipeline só enxergue caminhos. Cada montagem guarda o backend
//! que efetivamente lê e grava os bytes (ADLS via REST, ou um diretório local).

use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::errors::{ApiError, MountError};

/// Entrada de listagem, no formato do `ls` de montagem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Caminho relativo ao container.
    pub path: String,
    pub name: String,
    pub size: u64,
    pub is_dir: bool,
}

/// Operações mínimas que o pipeline precisa de um container.
///
/// Caminhos são sempre relativos à raiz do container, separados por `/`.
pub trait StorageBackend: fmt::Debug {
    fn read(&self, path: &str) -> Result<Vec<u8>, ApiError>;

    /// Cria ou sobrescreve o arquivo.
    fn write(&self, path: &str, bytes: &[u8]) -> Result<(), ApiError>;

    /// Remove arquivo ou diretório (recursivo). Caminho inexistente não é erro.
    fn delete(&self, path: &str) -> Result<(), ApiError>;

    /// Lista o conteúdo imediato de um diretório. `""` = raiz do container.
    fn list(&self, path: &str) -> Result<Vec<FileInfo>, ApiError>;
}

/// Container simulado por um diretório do disco.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, ApiError> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(ApiError::FileSystemError(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("caminho inválido: {}", path),
            )));
        }
        Ok(self.root.join(relative))
    }
}

impl StorageBackend for LocalBackend {
    fn read(&self, path: &str) -> Result<Vec<u8>, ApiError> {
        Ok(fs::read(self.resolve(path)?)?)
    }

    fn write(&self, path: &str, bytes: &[u8]) -> Result<(), ApiError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(target, bytes)?;
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<(), ApiError> {
        let target = self.resolve(path)?;
        let result = if target.is_dir() {
            fs::remove_dir_all(&target)
        } else {
            fs::remove_file(&target)
        };
        match result {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn list(&self, path: &str) -> Result<Vec<FileInfo>, ApiError> {
        let dir = self.resolve(path)?;
        let prefix = path.trim_matches('/');
        let mut entries = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", prefix, name)
            };
            entries.push(FileInfo {
                path,
                name,
                size: if metadata.is_dir() { 0 } else { metadata.len() },
                is_dir: metadata.is_dir(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}

/// Resultado de uma chamada a `mount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountOutcome {
    Mounted,
    /// Mesma origem já montada no mesmo ponto: nada a fazer.
    AlreadyMounted,
}

#[derive(Debug)]
struct Mount {
    mount_point: String,
    source: String,
    backend: Box<dyn StorageBackend>,
}

/// Tabela de montagens do processo.
#[derive(Debug, Default)]
pub struct MountTable {
    mounts: Vec<Mount>,
}

impl MountTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Monta `source` em `mount_point`.
    ///
    /// O backend é sondado (listagem da raiz) antes de entrar na tabela; uma credencial
    /// recusada ou um container inexistente falham aqui.
    ///
    /// # Errors
    /// * `MountError::Conflict` se o ponto já estiver montado a partir de outra origem.
    /// * `MountError::Unreachable` se a sondagem falhar.
    pub fn mount(
        &mut self,
        source: &str,
        mount_point: &str,
        backend: Box<dyn StorageBackend>,
    ) -> Result<MountOutcome, MountError> {
        let mount_point = normalize_mount_point(mount_point);

        if let Some(existing) = self.mounts.iter().find(|m| m.mount_point == mount_point) {
            if existing.source == source {
                log::info!("{} já montado a partir de {}", mount_point, source);
                return Ok(MountOutcome::AlreadyMounted);
            }
            return Err(MountError::Conflict {
                mount_point,
                existing: existing.source.clone(),
            });
        }

        backend.list("").map_err(|e| MountError::Unreachable {
            source_uri: source.to_string(),
            reason: e.to_string(),
        })?;

        log::info!("Montado {} em {}", source, mount_point);
        self.mounts.push(Mount {
            mount_point,
            source: source.to_string(),
            backend,
        });
        Ok(MountOutcome::Mounted)
    }

    /// Pares `(ponto de montagem, origem)`.
    pub fn mounts(&self) -> impl Iterator<Item = (&str, &str)> {
        self.mounts
            .iter()
            .map(|m| (m.mount_point.as_str(), m.source.as_str()))
    }

    /// Resolve um caminho montado para o backend e o caminho relativo ao container.
    pub fn resolve(&self, path: &str) -> Result<(&dyn StorageBackend, String), MountError> {
        self.mounts
            .iter()
            .filter_map(|m| {
                let rest = path.strip_prefix(m.mount_point.as_str())?;
                if rest.is_empty() || rest.starts_with('/') {
                    Some((m, rest.trim_matches('/').to_string()))
                } else {
                    None
                }
            })
            .max_by_key(|(m, _)| m.mount_point.len())
            .map(|(m, rest)| (m.backend.as_ref(), rest))
            .ok_or_else(|| MountError::NotMounted(path.to_string()))
    }

    pub fn read(&self, path: &str) -> Result<Vec<u8>, MountError> {
        let (backend, relative) = self.resolve(path)?;
        Ok(backend.read(&relative)?)
    }

    pub fn write(&self, path: &str, bytes: &[u8]) -> Result<(), MountError> {
        let (backend, relative) = self.resolve(path)?;
        Ok(backend.write(&relative, bytes)?)
    }

    pub fn delete(&self, path: &str) -> Result<(), MountError> {
        let (backend, relative) = self.resolve(path)?;
        if relative.is_empty() {
            return Err(MountError::NotMounted(format!(
                "recusa apagar a raiz de uma montagem: {}",
                path
            )));
        }
        Ok(backend.delete(&relative)?)
    }

    pub fn ls(&self, path: &str) -> Result<Vec<FileInfo>, MountError> {
        let (backend, relative) = self.resolve(path)?;
        Ok(backend.list(&relative)?)
    }
}

fn normalize_mount_point(mount_point: &str) -> String {
    let trimmed = mount_point.trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_container(dir: &Path, name: &str) -> Box<dyn StorageBackend> {
        let root = dir.join(name);
        fs::create_dir_all(&root).unwrap();
        Box::new(LocalBackend::new(root))
    }

    #[test]
    fn mount_and_resolve_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = MountTable::new();
        table
            .mount("abfss://raw@acc/", "/mnt/acc/raw", local_container(dir.path(), "raw"))
            .unwrap();

        table.write("/mnt/acc/raw/a/b.txt", b"hello").unwrap();
        assert_eq!(table.read("/mnt/acc/raw/a/b.txt").unwrap(), b"hello");
        assert!(dir.path().join("raw/a/b.txt").exists());

        let listing = table.ls("/mnt/acc/raw").unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].name, "a");
        assert!(listing[0].is_dir);
    }

    #[test]
    fn remounting_same_source_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = MountTable::new();
        let first = table
            .mount("abfss://raw@acc/", "/mnt/acc/raw", local_container(dir.path(), "raw"))
            .unwrap();
        let second = table
            .mount("abfss://raw@acc/", "/mnt/acc/raw/", local_container(dir.path(), "raw"))
            .unwrap();
        assert_eq!(first, MountOutcome::Mounted);
        assert_eq!(second, MountOutcome::AlreadyMounted);
        assert_eq!(table.mounts().count(), 1);
    }

    #[test]
    fn mounting_different_source_on_same_point_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = MountTable::new();
        table
            .mount("abfss://raw@acc/", "/mnt/acc/raw", local_container(dir.path(), "raw"))
            .unwrap();
        let err = table
            .mount("abfss://other@acc/", "/mnt/acc/raw", local_container(dir.path(), "other"))
            .unwrap_err();
        assert!(matches!(err, MountError::Conflict { .. }));
    }

    #[test]
    fn unreachable_container_fails_the_mount() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = MountTable::new();
        let missing = Box::new(LocalBackend::new(dir.path().join("missing")));
        let err = table.mount("abfss://raw@acc/", "/mnt/acc/raw", missing).unwrap_err();
        assert!(matches!(err, MountError::Unreachable { .. }));
        assert_eq!(table.mounts().count(), 0);
    }

    #[test]
    fn paths_outside_mounts_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = MountTable::new();
        table
            .mount("abfss://raw@acc/", "/mnt/acc/raw", local_container(dir.path(), "raw"))
            .unwrap();
        assert!(matches!(
            table.read("/mnt/acc/rawish/file.csv"),
            Err(MountError::NotMounted(_))
        ));
        assert!(matches!(
            table.read("/mnt/acc/file.csv"),
            Err(MountError::NotMounted(_))
        ));
    }

    #[test]
    fn delete_is_recursive_and_tolerates_missing_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = MountTable::new();
        table
            .mount("abfss://p@acc/", "/mnt/acc/p", local_container(dir.path(), "p"))
            .unwrap();
        table.write("/mnt/acc/p/out/part-00000.parquet", b"x").unwrap();
        table.delete("/mnt/acc/p/out").unwrap();
        assert!(!dir.path().join("p/out").exists());
        table.delete("/mnt/acc/p/out").unwrap();
        assert!(table.delete("/mnt/acc/p").is_err());
    }

    #[test]
    fn local_backend_rejects_parent_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path());
        assert!(backend.read("../etc/passwd").is_err());
    }
}
