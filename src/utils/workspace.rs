//! Рабочий каталог одного запуска конвейера
//!
//! Промежуточные файлы живут во временном каталоге и удаляются вместе с ним.
//! При `keep_intermediates` каталог создаётся внутри выходного и сохраняется.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use tempfile::TempDir;

use crate::error::Result;

enum Root {
    Temp(TempDir),
    Kept(PathBuf),
}

/// Рабочий каталог запуска
pub struct RunWorkspace {
    root: Root,
}

impl RunWorkspace {
    /// Создаёт рабочий каталог.
    ///
    /// With `keep` set the directory is `<output_dir>/work_<uuid>` and survives
    /// the run; otherwise it is a temporary directory removed on drop.
    pub fn new(output_dir: &Path, keep: bool) -> Result<Self> {
        let root = if keep {
            let path = output_dir.join(format!("work_{}", uuid::Uuid::new_v4()));
            fs::create_dir_all(&path)?;
            info!("Keeping intermediates in {}", path.display());
            Root::Kept(path)
        } else {
            Root::Temp(tempfile::tempdir()?)
        };

        let workspace = Self { root };
        fs::create_dir_all(workspace.narration_dir())?;
        fs::create_dir_all(workspace.retimed_dir())?;
        Ok(workspace)
    }

    pub fn path(&self) -> &Path {
        match &self.root {
            Root::Temp(dir) => dir.path(),
            Root::Kept(path) => path,
        }
    }

    pub fn is_kept(&self) -> bool {
        matches!(self.root, Root::Kept(_))
    }

    /// Каталог синтезированной озвучки
    pub fn narration_dir(&self) -> PathBuf {
        self.path().join("narration")
    }

    /// Каталог растянутых клипов
    pub fn retimed_dir(&self) -> PathBuf {
        self.path().join("retimed")
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.path().join(name)
    }

    /// Переносит готовый файл в выходной каталог под тем же именем.
    ///
    /// Rename is tried first; across filesystems the file is copied. Kept
    /// workspaces are copied so the intermediate stays inspectable.
    pub fn publish(&self, file: &Path, output_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(output_dir)?;
        let name = file.file_name().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} has no file name", file.display()),
            )
        })?;
        let destination = output_dir.join(name);

        if self.is_kept() || fs::rename(file, &destination).is_err() {
            fs::copy(file, &destination)?;
        }

        debug!("Published {} -> {}", file.display(), destination.display());
        Ok(destination)
    }
}
