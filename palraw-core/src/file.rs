//! Работа с файлами на диске: загрузка, потоковое чтение и перезапись
//! метки файла.

use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::Path,
};

use log::{debug, info};
use palraw_types::{FileMetadata, FileVariant, PalError, PalResult};

use crate::{
    body::decode_body,
    clock::SampleClock,
    config::LoaderConfig,
    format::{FILE_CODE_OFFSET, MIN_HEADER_SIZE},
    header::{encode_file_code, parse_header, read_header},
    reader::FrameReader,
    record::BodyLayout,
    signal::{DecodedFile, Signal},
};

/// Декодирует файл, целиком находящийся в памяти.
pub fn decode_bytes(
    bytes: &[u8],
    variant: FileVariant,
) -> PalResult<DecodedFile> {
    let mut metadata = parse_header(bytes, variant)?;
    let body = &bytes[metadata.header_len()..];
    metadata.body_len = Some(body.len() as u64);

    let columns = decode_body(body, &BodyLayout::from_metadata(&metadata))?;
    let signal = Signal::assemble(columns, &SampleClock::from_metadata(&metadata)?)?;

    Ok(DecodedFile::new(metadata, signal))
}

/// Загружает файл с настройками по умолчанию.
pub fn load<P: AsRef<Path>>(path: P) -> PalResult<DecodedFile> {
    load_with(path, &LoaderConfig::default())
}

pub fn load_with<P: AsRef<Path>>(
    path: P,
    config: &LoaderConfig,
) -> PalResult<DecodedFile> {
    let path = path.as_ref();
    let variant = config.resolve_variant(path)?;

    let file = File::open(path)?;
    let _lock = FileLock::shared(&file)?;

    let mut bytes = Vec::new();
    (&file).read_to_end(&mut bytes)?;

    let decoded = decode_bytes(&bytes, variant)?;

    info!(
        "Loaded {}: {} samples, {} Hz, code '{}'",
        path.display(),
        decoded.signal().len(),
        decoded.metadata().sample_rate_hz,
        decoded.metadata().file_code,
    );

    Ok(decoded)
}

/// Читает только заголовок. Длина тела берётся из размера файла.
pub fn read_metadata<P: AsRef<Path>>(path: P) -> PalResult<FileMetadata> {
    let path = path.as_ref();
    let file = File::open(path)?;

    read_metadata_from(&file, FileVariant::from_path(path)?)
}

/// Открывает файл для потокового декодирования тела.
pub fn open_frames<P: AsRef<Path>>(path: P) -> PalResult<(FileMetadata, FrameReader<File>)> {
    open_frames_with(path, &LoaderConfig::default())
}

pub fn open_frames_with<P: AsRef<Path>>(
    path: P,
    config: &LoaderConfig,
) -> PalResult<(FileMetadata, FrameReader<File>)> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let metadata = read_metadata_from(&file, config.resolve_variant(path)?)?;

    let reader = FrameReader::with_capacity(
        file,
        BodyLayout::from_metadata(&metadata),
        config.read_buffer_bytes,
    );

    Ok((metadata, reader))
}

/// Перезаписывает метку файла на диске.
///
/// Меняются только 8 байт по смещению 512. На время записи файл держится
/// под исключительной блокировкой.
pub fn change_file_code<P: AsRef<Path>>(
    path: P,
    new_code: &str,
) -> PalResult<()> {
    let path = path.as_ref();
    let field = encode_file_code(new_code)?;

    let file = OpenOptions::new().read(true).write(true).open(path)?;
    let _lock = FileLock::exclusive(&file)?;

    let len = file.metadata()?.len();
    if len < MIN_HEADER_SIZE as u64 {
        return Err(PalError::format_at(
            len,
            format!("File of {len} bytes has no complete header"),
        ));
    }

    (&file).seek(SeekFrom::Start(FILE_CODE_OFFSET as u64))?;
    (&file).write_all(&field)?;
    file.sync_data()?;

    info!("File code of {} set to '{new_code}'", path.display());

    Ok(())
}

fn read_metadata_from(
    file: &File,
    variant: FileVariant,
) -> PalResult<FileMetadata> {
    let _lock = FileLock::shared(file)?;
    let file_len = file.metadata()?.len();

    let mut metadata = read_header(&mut &*file, variant)?;
    metadata.body_len = Some(file_len.saturating_sub(metadata.header_len() as u64));

    Ok(metadata)
}

////////////////////////////////////////////////////////////////////////////////
// Блокировка файла
////////////////////////////////////////////////////////////////////////////////

/// Рекомендательная блокировка `flock`, снимается при удалении.
///
/// Держит ссылку на `File`, поэтому файл нельзя закрыть раньше блокировки.
struct FileLock<'a> {
    #[cfg_attr(not(unix), allow(dead_code))]
    file: &'a File,
}

impl<'a> FileLock<'a> {
    fn shared(file: &'a File) -> PalResult<Self> {
        #[cfg(unix)]
        return Self::acquire(file, libc::LOCK_SH);

        #[cfg(not(unix))]
        Ok(Self { file })
    }

    fn exclusive(file: &'a File) -> PalResult<Self> {
        #[cfg(unix)]
        return Self::acquire(file, libc::LOCK_EX);

        #[cfg(not(unix))]
        Ok(Self { file })
    }

    #[cfg(unix)]
    fn acquire(
        file: &'a File,
        op: libc::c_int,
    ) -> PalResult<Self> {
        use std::os::unix::io::AsRawFd;

        loop {
            // SAFETY: дескриптор принадлежит `file` и жив всё время вызова
            let rc = unsafe { libc::flock(file.as_raw_fd(), op) };
            if rc == 0 {
                break;
            }

            let err = std::io::Error::last_os_error();
            if err.kind() != std::io::ErrorKind::Interrupted {
                return Err(PalError::Io(err));
            }
        }

        debug!("flock({op}) acquired");

        Ok(Self { file })
    }
}

impl Drop for FileLock<'_> {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;

            // SAFETY: см. `acquire`
            unsafe {
                libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
            }
        }
    }
}
