use std::{num::NonZeroUsize, path::Path};

use palraw_types::{FileVariant, PalError, PalResult};

use crate::reader::DEFAULT_READ_BUFFER;

/// Параметры загрузки файлов.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Вариант файла (None = по расширению)
    pub variant: Option<FileVariant>,
    /// Размер буфера потокового чтения (байт)
    pub read_buffer_bytes: usize,
    /// Потоков для пакетной загрузки
    pub workers: usize,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl LoaderConfig {
    /// Вариант для `path`: явно заданный или выведенный из расширения.
    pub fn resolve_variant(
        &self,
        path: &Path,
    ) -> PalResult<FileVariant> {
        match self.variant {
            Some(v) => Ok(v),
            None => FileVariant::from_path(path),
        }
    }

    /// Проверяет параметры, которые нельзя проверить типом.
    pub fn validate(&self) -> PalResult<()> {
        if self.workers == 0 {
            return Err(PalError::configuration("Worker count must be at least 1"));
        }

        Ok(())
    }

    pub fn with_variant(
        mut self,
        variant: FileVariant,
    ) -> Self {
        self.variant = Some(variant);
        self
    }

    pub fn with_workers(
        mut self,
        workers: usize,
    ) -> Self {
        self.workers = workers;
        self
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для LoaderConfig
////////////////////////////////////////////////////////////////////////////////

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            variant: None,
            read_buffer_bytes: DEFAULT_READ_BUFFER,
            workers: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
        }
    }
}
