use std::io::Write;

use rand::RngCore;
use tempfile::NamedTempFile;

pub const BOUNDARY: &str = "boundary";

/// A temporary file filled with `len` random bytes, and those bytes.
pub fn temp_file(len: usize) -> (NamedTempFile, Vec<u8>) {
    let mut contents = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut contents);

    let mut file = NamedTempFile::new().expect("failed to create temp file");
    file.write_all(&contents).expect("failed to write temp file");
    file.flush().expect("failed to flush temp file");

    (file, contents)
}
