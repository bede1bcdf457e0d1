use sha2::{Digest, Sha512};
use std::io::{self, ErrorKind, Read};

/// Default block size. Every chunk but the last one of a file is exactly this long.
pub const CHUNK_SIZE: usize = 4096;

/// Hex SHA-512 of one block.
pub fn checksum(block: &[u8]) -> String {
    hex::encode(Sha512::digest(block))
}

/// Split `r` into `chunk_size` blocks and return the checksum of each, in order.
///
/// A stream whose length is an exact multiple of `chunk_size` yields no trailing
/// empty chunk; an empty stream yields an empty list.
pub fn chunk<R: Read>(mut r: R, chunk_size: usize) -> io::Result<Vec<String>> {
    let mut buf = vec![0u8; chunk_size];
    let mut chunks = Vec::new();
    loop {
        let n = read_block(&mut r, &mut buf)?;
        if n == 0 {
            break;
        }
        chunks.push(checksum(&buf[..n]));
        if n < chunk_size {
            break;
        }
    }
    Ok(chunks)
}

/// Fill `buf` as far as the stream allows. Returns fewer bytes only at end of stream.
pub(crate) fn read_block<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
