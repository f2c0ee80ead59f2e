use std::fs;

use ahash::AHashMap;
use score_sim::{Config, SCore};

fn main() {
    score_sim::trace::install_subscriber();

    tracing::info!("Initializing core runtime environment");

    let path = std::env::args().nth(1).unwrap_or_else(|| "./image.elf".to_string());
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::error!(%path, %err, "failed to read image");
            return;
        }
    };

    let image = match score_sim::loader::load_elf(&bytes) {
        Ok(image) => image,
        Err(err) => {
            tracing::error!(%err, "failed to load image");
            return;
        }
    };

    let mut core = SCore::new("core", Config::default());
    core.initialize();
    for (pc, word) in image.instructions {
        core.inject(pc, word);
    }

    let mut words: AHashMap<u64, u32> = AHashMap::default();
    for (addr, byte) in image.data {
        let word_addr = addr & !0x3;
        let shift = (addr & 0x3) * 8;
        *words.entry(word_addr).or_insert(0) |= (byte as u32) << shift;
    }
    for (addr, word) in words {
        core.inject_data(addr, word);
    }

    core.run_cycles(10_000);
    core.print_statistics();
}
