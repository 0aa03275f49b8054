//! Декодер raw-файлов акселерометра activPAL
//!
//! Разбирает заголовок `.dat` / `.datx`, распаковывает тело из
//! трёхбайтных записей с повторами, восстанавливает метки времени и
//! собирает колоночный сигнал.
//!
//! # Быстрый старт
//!
//! ```no_run
//! use palraw_core::load;
//! use palraw_types::Axis;
//!
//! let file = load("P01.datx")?;
//! let meta = file.metadata();
//! println!("{} Hz, code '{}'", meta.sample_rate_hz, meta.file_code);
//!
//! let x = file.signal().axis(Axis::X);
//! let magnitude: Vec<f64> = file.signal().rss().collect();
//! # let _ = (x, magnitude);
//! # Ok::<(), palraw_types::PalError>(())
//! ```

pub mod batch;
pub mod binary;
pub mod body;
pub mod clock;
pub mod config;
pub mod encode;
pub mod file;
pub mod format;
pub mod header;
pub mod reader;
pub mod record;
pub mod signal;

pub use batch::load_all;
pub use binary::*;
pub use body::*;
pub use clock::*;
pub use config::*;
pub use encode::*;
pub use file::*;
pub use format::*;
pub use header::*;
pub use reader::*;
pub use record::*;
pub use signal::*;

/// Версия библиотеки.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
