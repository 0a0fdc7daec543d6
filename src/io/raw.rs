/// Read / write flat arrays as little-endian raw binary

use std::fs::File;
use std::io::{Write, Read, BufWriter, BufReader};
use std::path::Path;

pub fn write_f32(data: impl IntoIterator<Item = f32>, path: &Path) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut buf = BufWriter::new(file);
    for datum in data {
        buf.write_all(&datum.to_le_bytes())?;
    }
    Ok(())
}

pub fn write_u32(data: impl IntoIterator<Item = u32>, path: &Path) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut buf = BufWriter::new(file);
    for datum in data {
        buf.write_all(&datum.to_le_bytes())?;
    }
    Ok(())
}

pub fn read_f32(path: &Path) -> std::io::Result<Vec<f32>> {
    read_words(path, f32::from_le_bytes)
}

pub fn read_u32(path: &Path) -> std::io::Result<Vec<u32>> {
    read_words(path, u32::from_le_bytes)
}

fn read_words<T>(path: &Path, decode: impl Fn([u8; 4]) -> T) -> std::io::Result<Vec<T>> {
    let file = File::open(path)?;
    let mut buf = BufReader::new(file);
    let mut word = [0; 4];
    let mut data = vec![];
    loop {
        use std::io::ErrorKind::UnexpectedEof;
        match buf.read_exact(&mut word) {
            Ok(()) => data.push(decode(word)),
            Err(e) if e.kind() == UnexpectedEof => return Ok(data),
            Err(e) => return Err(e),
        }
    }
}
