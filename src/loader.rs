//! Host-side ELF loader: parses `.text`/`.data` sections into the
//! `(pc, word)`/`(address, byte)` pairs a caller feeds through
//! [`crate::core::SCore::inject`]/`inject_data`. Grounded directly on
//! `RiscCore::load_binary`'s use of `object::read::elf::FileHeader32` and
//! its `.text`/`.data`/`.rodata`/`.bss` name filter, minus the cache-device
//! plumbing the teacher threads through (this crate has one flat memory
//! buffer, not a configurable cache hierarchy).

use object::read::elf::{FileHeader, SectionHeader};
use object::{Endianness, elf};

use crate::error::{ScoreError, ScoreResult};

#[derive(Debug, Default, Clone)]
pub struct LoadedImage {
    pub instructions: Vec<(u32, u32)>,
    pub data: Vec<(u64, u8)>,
}

fn section_name(
    sections: &elf::SectionTable32<Endianness>,
    endian: Endianness,
    section: &elf::SectionHeader32<Endianness>,
) -> ScoreResult<String> {
    let mut name = String::new();
    sections
        .section_name(endian, section)
        .map_err(|_| ScoreError::LoadFailure("unreadable section name".into()))?
        .read_to_string(&mut name)
        .map_err(|_| ScoreError::LoadFailure("non-utf8 section name".into()))?;
    Ok(name)
}

pub fn load_elf(bytes: &[u8]) -> ScoreResult<LoadedImage> {
    let header = elf::FileHeader32::<Endianness>::parse(bytes)
        .map_err(|_| ScoreError::LoadFailure("failed to parse ELF header".into()))?;
    let endian = header
        .endian()
        .map_err(|_| ScoreError::LoadFailure("failed to parse ELF endianness".into()))?;
    if endian != Endianness::Little {
        return Err(ScoreError::LoadFailure("only little-endian images are supported".into()));
    }

    let sections = header
        .sections(endian, bytes)
        .map_err(|_| ScoreError::LoadFailure("failed to parse section table".into()))?;

    let mut image = LoadedImage::default();
    for section in sections.iter() {
        let name = section_name(&sections, endian, section)?;
        let is_text = name.contains(".text");
        let is_data = name.contains(".data") || name.contains(".sdata") || name.contains(".rodata");
        if !is_text && !is_data {
            continue;
        }
        let data = section
            .data(endian, bytes)
            .map_err(|_| ScoreError::LoadFailure(format!("failed to read section {name}")))?;
        let base = section.sh_addr.get(endian);

        if is_text {
            for (i, chunk) in data.chunks_exact(4).enumerate() {
                let word = u32::from_le_bytes(chunk.try_into().unwrap());
                let pc = base.wrapping_add((i as u64) * 4) as u32;
                image.instructions.push((pc, word));
            }
        } else {
            for (i, &byte) in data.iter().enumerate() {
                image.data.push((base.wrapping_add(i as u64), byte));
            }
        }
    }
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_garbage_input() {
        assert!(load_elf(&[0u8; 16]).is_err());
    }
}
