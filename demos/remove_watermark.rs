//! Remove a corner overlay watermark from a single image.
//!
//! Usage:
//! ```sh
//! cargo run --example remove_watermark -- input.png output.png [seed]
//! ```

use std::env;
use std::process;

use overlay_watermark_removal::{ProcessOptions, WatermarkEngine};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <input> <output> [seed]", args[0]);
        process::exit(1);
    }

    let input = &args[1];
    let output = &args[2];
    let seed = match args.get(3).map(|s| s.parse::<u64>()) {
        None => None,
        Some(Ok(seed)) => Some(seed),
        Some(Err(e)) => {
            eprintln!("Invalid seed: {e}");
            process::exit(1);
        }
    };

    let engine = WatermarkEngine::new(ProcessOptions {
        seed,
        ..ProcessOptions::default()
    });
    let result = engine.process_file(input.as_ref(), output.as_ref());

    if result.skipped {
        println!("Skipped: {}", result.message);
    } else if result.success {
        println!("Done: {}", result.message);
    } else {
        eprintln!("Error: {}", result.message);
        process::exit(1);
    }
}
