//! String-literal escape handling.
//!
//! `Chars` values arrive carrying source-level escape sequences. They
//! are decoded to raw bytes here and re-encoded with the hex escapes
//! LLVM's lexer accepts. Unknown `\x` sequences and unknown
//! single-character escapes pass through literally, with a lint so the
//! behavior is visible instead of silently guessed at.

use tracing::warn;

/// Decode source-level escapes to raw bytes.
pub(super) fn decode(s: &str) -> Vec<u8> {
    decode_impl(s, true)
}

/// Decoded byte length, without re-triggering the escape lint.
pub(super) fn decoded_len(s: &str) -> usize {
    decode_impl(s, false).len()
}

fn decode_impl(s: &str, lint: bool) -> Vec<u8> {
    let cs: Vec<char> = s.chars().collect();
    let mut out = Vec::with_capacity(s.len());
    let mut i = 0;
    while i < cs.len() {
        if cs[i] != '\\' {
            push_char(&mut out, cs[i]);
            i += 1;
            continue;
        }
        if i + 1 >= cs.len() {
            // lone trailing backslash
            out.push(b'\\');
            break;
        }
        match cs[i + 1] {
            'b' => out.push(0x08),
            't' => out.push(0x09),
            'n' => out.push(0x0A),
            'f' => out.push(0x0C),
            'r' => out.push(0x0D),
            '"' => out.push(b'"'),
            '\'' => out.push(b'\''),
            '\\' => out.push(b'\\'),
            'x' => {
                let hi = cs.get(i + 2).and_then(|c| c.to_digit(16));
                let lo = cs.get(i + 3).and_then(|c| c.to_digit(16));
                if let (Some(hi), Some(lo)) = (hi, lo) {
                    out.push((hi * 16 + lo) as u8);
                    i += 4;
                    continue;
                }
                if lint {
                    warn!(r"malformed \x escape in string literal, passed through literally");
                }
                out.extend_from_slice(br"\x");
            }
            other => {
                if lint {
                    warn!(
                        sequence = %format!("\\{}", other),
                        "unknown escape in string literal, passed through literally"
                    );
                }
                out.push(b'\\');
                push_char(&mut out, other);
            }
        }
        i += 2;
    }
    out
}

fn push_char(out: &mut Vec<u8>, c: char) {
    let mut buf = [0u8; 4];
    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
}

/// Encode raw bytes for an LLVM `c"..."` literal: printable ASCII stays
/// as-is except `"` and `\`, everything else becomes `\HH`.
pub(super) fn encode(bytes: &[u8]) -> String {
    let mut result = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b' '..=b'!' | b'#'..=b'[' | b']'..=b'~' => result.push(b as char),
            _ => result.push_str(&format!("\\{:02X}", b)),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_common_escapes() {
        assert_eq!(decode(r"a\tb\n"), b"a\tb\n");
        assert_eq!(decode(r#"say \"hi\""#), b"say \"hi\"");
        assert_eq!(decode(r"back\\slash"), b"back\\slash");
    }

    #[test]
    fn decodes_hex_escapes() {
        assert_eq!(decode(r"\x41\x00\xff"), &[0x41, 0x00, 0xFF]);
    }

    #[test]
    fn unknown_escapes_pass_through_literally() {
        assert_eq!(decode(r"\q"), b"\\q");
        assert_eq!(decode(r"\xZZ"), b"\\xZZ");
        assert_eq!(decode(r"trailing\"), b"trailing\\");
    }

    #[test]
    fn non_ascii_decodes_to_utf8_bytes() {
        assert_eq!(decode("é"), "é".as_bytes());
    }

    #[test]
    fn encode_hex_escapes_everything_non_printable() {
        assert_eq!(encode(b"ok"), "ok");
        assert_eq!(encode(b"a\nb"), r"a\0Ab");
        assert_eq!(encode(b"\"\\"), r"\22\5C");
        assert_eq!(encode(&[0xFF]), r"\FF");
    }

    #[test]
    fn decoded_len_counts_bytes_not_chars() {
        assert_eq!(decoded_len(r"\x41bc"), 3);
        assert_eq!(decoded_len("é"), 2);
    }
}
