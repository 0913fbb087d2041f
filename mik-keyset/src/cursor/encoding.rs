//! Base64 encoding/decoding for the cursor text form.

/// Base64 encoding (URL-safe, no padding).
///
/// The URL-safe alphabet (`-_` instead of `+/`) and the missing padding make
/// cursors usable in query strings and headers without further escaping.
pub(super) fn base64_encode(bytes: &[u8]) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

    let mut result = String::with_capacity(bytes.len().div_ceil(3) * 4);

    for chunk in bytes.chunks(3) {
        let b0 = u32::from(chunk[0]);
        let b1 = u32::from(chunk.get(1).copied().unwrap_or(0));
        let b2 = u32::from(chunk.get(2).copied().unwrap_or(0));

        let n = (b0 << 16) | (b1 << 8) | b2;

        result.push(ALPHABET[((n >> 18) & 0x3F) as usize] as char);
        result.push(ALPHABET[((n >> 12) & 0x3F) as usize] as char);

        if chunk.len() > 1 {
            result.push(ALPHABET[((n >> 6) & 0x3F) as usize] as char);
        }
        if chunk.len() > 2 {
            result.push(ALPHABET[(n & 0x3F) as usize] as char);
        }
    }

    result
}

/// Base64 decoding (URL-safe, no padding).
///
/// Accepts the standard (`+/`) alphabet too. Rejects lengths that cannot come
/// out of [`base64_encode`] and chunks with non-zero trailing bits, so every
/// accepted string has exactly one byte sequence.
pub(super) fn base64_decode(input: &str) -> Result<Vec<u8>, ()> {
    const DECODE: [i8; 128] = {
        let mut table = [-1i8; 128];
        let mut i = 0u8;
        while i < 26 {
            table[(b'A' + i) as usize] = i as i8;
            table[(b'a' + i) as usize] = (i + 26) as i8;
            i += 1;
        }
        let mut i = 0u8;
        while i < 10 {
            table[(b'0' + i) as usize] = (i + 52) as i8;
            i += 1;
        }
        table[b'-' as usize] = 62;
        table[b'_' as usize] = 63;
        table[b'+' as usize] = 62;
        table[b'/' as usize] = 63;
        table
    };

    let bytes = input.as_bytes();
    if bytes.len() % 4 == 1 {
        return Err(());
    }

    let mut result = Vec::with_capacity(bytes.len() / 4 * 3 + 2);

    for chunk in bytes.chunks(4) {
        let mut n = 0u32;

        for (i, &b) in chunk.iter().enumerate() {
            let val = DECODE.get(b as usize).copied().unwrap_or(-1);
            if val < 0 {
                return Err(());
            }
            n |= (val as u32) << (18 - i * 6);
        }

        match chunk.len() {
            2 if n & 0xFFFF != 0 => return Err(()),
            3 if n & 0xFF != 0 => return Err(()),
            _ => {},
        }

        result.push((n >> 16) as u8);
        if chunk.len() > 2 {
            result.push((n >> 8) as u8);
        }
        if chunk.len() > 3 {
            result.push(n as u8);
        }
    }

    Ok(result)
}
