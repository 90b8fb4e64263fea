//! Line ending canonicalisation for text signatures and cleartext framing.

/// Converts all line endings (`\n`, `\r`, `\r\n`) to CRLF.
pub fn normalize_to_crlf(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        match data[i] {
            b'\r' => {
                out.extend_from_slice(b"\r\n");
                if i + 1 < data.len() && data[i + 1] == b'\n' {
                    i += 1;
                }
            }
            b'\n' => out.extend_from_slice(b"\r\n"),
            b => out.push(b),
        }
        i += 1;
    }

    out
}

fn cleartext_lines(text: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = text
        .split('\n')
        .map(|line| {
            let line = line.strip_suffix('\r').unwrap_or(line);
            line.trim_end_matches([' ', '\t'])
        })
        .collect();

    // A trailing line break belongs to the frame, not the message.
    if lines.len() > 1 && lines.last() == Some(&"") {
        lines.pop();
    }

    lines
}

/// Canonical text for cleartext signature hashing: CRLF line separators,
/// trailing spaces and tabs stripped from every line, no line break after
/// the final line.
pub fn cleartext_hash_text(text: &str) -> Vec<u8> {
    cleartext_lines(text).join("\r\n").into_bytes()
}

/// The body text as stored inside the cleartext frame: normalized line
/// endings and trailing whitespace stripped, so hashing the stored body and
/// re-hashing a parsed frame agree.
pub fn cleartext_body(text: &str) -> String {
    cleartext_lines(text).join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_to_crlf() {
        assert_eq!(normalize_to_crlf(b"a\nb"), b"a\r\nb");
        assert_eq!(normalize_to_crlf(b"a\r\nb"), b"a\r\nb");
        assert_eq!(normalize_to_crlf(b"a\rb"), b"a\r\nb");
        assert_eq!(normalize_to_crlf(b"ab\n"), b"ab\r\n");
    }

    #[test]
    fn test_cleartext_hash_text() {
        // Trailing whitespace is stripped per line, the final line break is
        // dropped.
        assert_eq!(
            cleartext_hash_text("Line 1   \r\nLine 2\r\n"),
            b"Line 1\r\nLine 2".to_vec()
        );
        assert_eq!(cleartext_hash_text("a \nb\t\nc"), b"a\r\nb\r\nc".to_vec());
        assert_eq!(cleartext_body("a \r\nb\r\n"), "a\nb");
    }
}
