//! Параллельная загрузка нескольких файлов.

use std::{path::Path, thread};

use crossbeam_channel::unbounded;
use log::{debug, warn};
use palraw_types::{PalError, PalResult};

use crate::{config::LoaderConfig, file::load_with, signal::DecodedFile};

/// Загружает файлы на `config.workers` потоках.
///
/// Результаты идут в порядке `paths`. Ошибка одного файла не влияет на
/// остальные; внешняя ошибка означает только неверную конфигурацию.
pub fn load_all<P>(
    paths: &[P],
    config: &LoaderConfig,
) -> PalResult<Vec<PalResult<DecodedFile>>>
where
    P: AsRef<Path> + Sync,
{
    config.validate()?;

    let workers = config.workers.min(paths.len()).max(1);
    let (job_tx, job_rx) = unbounded::<usize>();
    let (res_tx, res_rx) = unbounded::<(usize, PalResult<DecodedFile>)>();

    for i in 0..paths.len() {
        // Приёмник жив до конца функции
        let _ = job_tx.send(i);
    }
    drop(job_tx);

    debug!("Loading {} files on {workers} workers", paths.len());

    thread::scope(|s| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let res_tx = res_tx.clone();

            s.spawn(move || {
                for i in job_rx.iter() {
                    let path = paths[i].as_ref();
                    let result = load_with(path, config);

                    if let Err(ref e) = result {
                        warn!("Failed to load {}: {e}", path.display());
                    }

                    if res_tx.send((i, result)).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(res_tx);

    let mut slots: Vec<Option<PalResult<DecodedFile>>> = (0..paths.len()).map(|_| None).collect();
    for (i, result) in res_rx.iter() {
        slots[i] = Some(result);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| {
            slot.ok_or_else(|| PalError::internal(format!("No result for file #{i}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use chrono::NaiveDate;
    use palraw_types::{CompressionMode, FileVariant, Triplet};
    use tempfile::{Builder, NamedTempFile};

    use super::*;
    use crate::encode::{BodyEncoder, HeaderBuilder};

    fn datx_file(samples: usize) -> NamedTempFile {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();

        let mut raw = HeaderBuilder::new(FileVariant::Datx, 20, start)
            .build()
            .unwrap();
        let mut enc = BodyEncoder::new(CompressionMode::RunLength, FileVariant::Datx).unwrap();
        for i in 0..samples {
            enc.push(Triplet::new((i % 200) as u8 + 1, 2, 3)).unwrap();
        }
        raw.extend_from_slice(&enc.finish());

        let mut f = Builder::new().suffix(".datx").tempfile().unwrap();
        f.write_all(&raw).unwrap();
        f
    }

    #[test]
    fn test_results_keep_input_order() {
        let files: Vec<NamedTempFile> = (1..=6).map(|n| datx_file(n * 10)).collect();
        let paths: Vec<&Path> = files.iter().map(|f| f.path()).collect();

        let cfg = LoaderConfig::default().with_workers(3);
        let results = load_all(&paths, &cfg).unwrap();

        let lens: Vec<usize> = results
            .iter()
            .map(|r| r.as_ref().unwrap().signal().len())
            .collect();
        assert_eq!(lens, vec![10, 20, 30, 40, 50, 60]);
    }

    #[test]
    fn test_failure_is_isolated() {
        let good = datx_file(5);
        let mut bad = Builder::new().suffix(".datx").tempfile().unwrap();
        bad.write_all(&[0u8; 100]).unwrap();

        let paths = [good.path(), bad.path(), good.path()];
        let results = load_all(&paths, &LoaderConfig::default()).unwrap();

        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(PalError::Format { .. })));
        assert!(results[2].is_ok());
    }

    #[test]
    fn test_zero_workers() {
        let paths: [&Path; 0] = [];
        let cfg = LoaderConfig::default().with_workers(0);

        assert!(matches!(
            load_all(&paths, &cfg),
            Err(PalError::Configuration(_))
        ));
    }

    #[test]
    fn test_empty_input() {
        let paths: [&Path; 0] = [];

        assert!(load_all(&paths, &LoaderConfig::default()).unwrap().is_empty());
    }
}
