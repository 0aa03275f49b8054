//! Пример: чтение raw-файла activPAL
//!
//! Демонстрирует:
//! - чтение одного заголовка без декодирования тела
//! - потоковое декодирование через FrameReader со статистикой
//! - полную загрузку с метками времени и модулем вектора
//!
//! Запуск: `RUST_LOG=debug cargo run --example read_raw_file -- P01.datx`

use palraw_core::{load, open_frames, read_metadata};
use palraw_types::Axis;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let input_path = std::env::args()
        .nth(1)
        .ok_or("usage: read_raw_file <file.dat|file.datx>")?;

    // --- Только заголовок ---
    let meta = read_metadata(&input_path)?;
    println!("{}", serde_json::to_string_pretty(&meta)?);

    // --- Потоковое чтение ---
    let (_, mut reader) = open_frames(&input_path)?;
    let mut peak = 0.0f64;
    for frame in reader.by_ref() {
        peak = peak.max(frame?.triplet.rss());
    }

    let stats = reader.stats();
    println!("\n✓ Stream decoded");
    println!("  Samples        : {}", stats.samples);
    println!("  Literal records: {}", stats.literal_records);
    println!("  Repeat records : {}", stats.repeat_records);
    println!("  Body bytes     : {}", stats.bytes_processed);
    println!("  Tail marker    : {}", stats.ended_by_marker);
    println!("  Peak RSS (raw) : {peak:.2}");

    // --- Полная загрузка ---
    let file = load(&input_path)?;
    let signal = file.signal();

    println!("\nFirst samples:");
    for (i, ts) in signal.timestamps().iter().take(5).enumerate() {
        println!(
            "  [{i}] {ts}  x={:>3} y={:>3} z={:>3}",
            signal.axis(Axis::X)[i],
            signal.axis(Axis::Y)[i],
            signal.axis(Axis::Z)[i],
        );
    }

    Ok(())
}
