//! The image loader (C3): reads a big-endian LC-3 object file and places
//! it in memory at its origin.

use crate::memory::Memory;
use byteorder::{BigEndian, ReadBytesExt};
use std::fs::File;
use std::io::{self, BufReader};

/// Loads `path` into `memory`, returning the word count placed. Trailing
/// odd bytes are ignored; words beyond `0xFFFF - origin` are never read.
pub fn load(path: &str, memory: &mut Memory) -> io::Result<usize> {
    let mut reader = BufReader::new(File::open(path)?);

    let origin = reader.read_u16::<BigEndian>()?;
    let mut address = origin;
    let mut count: u32 = 0;
    let max_words = (1u32 << 16) - u32::from(origin);

    while count < max_words {
        match reader.read_u16::<BigEndian>() {
            Ok(word) => {
                memory.write(address, word);
                address = address.wrapping_add(1);
                count += 1;
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e),
        }
    }

    Ok(count as usize)
}
