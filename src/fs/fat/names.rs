//! 8.3 short-name handling.
//!
//! On disk a short name is 11 bytes: 8 for the base, 3 for the extension,
//! both uppercase and space-padded, with no `.` stored.

/// Uppercase a single short-name byte. Only ASCII letters fold; everything
/// else passes through unmodified.
fn fold(b: u8) -> u8 {
    b.to_ascii_uppercase()
}

/// Convert a filename to its on-disk 11-byte 8.3 form.
///
/// The name is split at the last `.`; each half is uppercased, truncated to
/// its field width and space-padded. A leading 0xE5 byte is stored as 0x05
/// so it is not mistaken for a deleted-entry marker.
pub fn to_83(name: &str) -> [u8; 11] {
    let mut out = [b' '; 11];
    let bytes = name.as_bytes();
    let (base, ext) = match name.rfind('.') {
        Some(dot) => (&bytes[..dot], &bytes[dot + 1..]),
        None => (bytes, &[][..]),
    };
    for (slot, &b) in out.iter_mut().take(8).zip(base.iter()) {
        *slot = fold(b);
    }
    for (slot, &b) in out[8..].iter_mut().zip(ext.iter()) {
        *slot = fold(b);
    }
    if out[0] == 0xE5 {
        out[0] = 0x05;
    }
    out
}

/// Convert an on-disk 11-byte short name back to a filename.
///
/// Trailing spaces are trimmed from both halves, letters are lowercased, and
/// the `.` is reinserted only when the extension half is non-empty.
pub fn from_83(raw: &[u8; 11]) -> alloc::string::String {
    fn push_half(name: &mut alloc::string::String, half: &[u8]) {
        let len = half.iter().rposition(|&b| b != b' ').map_or(0, |p| p + 1);
        for (i, &b) in half[..len].iter().enumerate() {
            let b = if i == 0 && b == 0x05 { 0xE5 } else { b };
            name.push(char::from(b.to_ascii_lowercase()));
        }
    }
    let mut name = alloc::string::String::with_capacity(12);
    push_half(&mut name, &raw[..8]);
    if raw[8..] != *b"   " {
        name.push('.');
        push_half(&mut name, &raw[8..]);
    }
    name
}

/// The checksum stored in long-filename entries to tie them to their short
/// name: rotate right one bit, then add the next byte, over all 11 bytes.
pub fn lfn_checksum(short_name: &[u8; 11]) -> u8 {
    short_name
        .iter()
        .fold(0u8, |sum, &b| (sum >> 1).wrapping_add(sum << 7).wrapping_add(b))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn to_83_basic() {
        assert_eq!(&to_83("test.txt"), b"TEST    TXT");
        assert_eq!(&to_83("HELLO"), b"HELLO      ");
        assert_eq!(&to_83("verylongfilename.extension"), b"VERYLONGEXT");
        assert_eq!(&to_83("a.b"), b"A       B  ");
    }

    #[test]
    fn from_83_basic() {
        assert_eq!(from_83(b"TEST    TXT"), "test.txt");
        assert_eq!(from_83(b"HELLO      "), "hello");
        assert_eq!(from_83(b"A       B  "), "a.b");
    }

    #[test]
    fn valid_83_round_trips() {
        for name in ["readme.txt", "kernel8.img", "a.c", "noext", "12345678.123"] {
            let raw = to_83(name);
            assert_eq!(from_83(&raw), name);
            assert_eq!(to_83(&from_83(&raw)), raw);
        }
    }

    #[test]
    fn non_letters_pass_through() {
        assert_eq!(&to_83("a-b_c.1$"), b"A-B_C   1$ ");
        assert_eq!(from_83(b"A-B_C   1$ "), "a-b_c.1$");
    }

    #[test]
    fn checksum_rotation() {
        // reference value computed with the canonical algorithm
        let mut sum: u16 = 0;
        for &b in b"TEST    TXT" {
            sum = (((sum & 1) << 7) + (sum >> 1) + u16::from(b)) & 0xFF;
        }
        assert_eq!(u16::from(lfn_checksum(b"TEST    TXT")), sum);
    }
}
