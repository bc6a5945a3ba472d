//! Transfer encoding and line-ending utilities.
//!
//! Supports Quoted-Printable (RFC 2045 §6.7) and CRLF normalization.

use crate::error::{Error, Result};
use std::io::{self, Write};

/// Maximum encoded line length for Quoted-Printable, soft break included.
const MAX_LINE_LENGTH: usize = 76;

const UPPER_HEX: &[u8; 16] = b"0123456789ABCDEF";

/// Streaming Quoted-Printable encoder.
///
/// Input CR, LF and CRLF are treated as text line breaks and written as a
/// single CRLF. Space and tab are escaped only when they end a line. Lines
/// longer than 76 characters are split with a soft line break (`=` CRLF),
/// and an escape sequence is never split across two lines.
///
/// Output is buffered one line at a time; call [`finish`](Self::finish) to
/// write the last line and get the sink back.
#[derive(Debug)]
pub struct QuotedPrintableWriter<W: Write> {
    sink: W,
    line: Vec<u8>,
    after_cr: bool,
}

impl<W: Write> QuotedPrintableWriter<W> {
    /// Creates an encoder writing into `sink`.
    #[must_use]
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            line: Vec::with_capacity(MAX_LINE_LENGTH + 2),
            after_cr: false,
        }
    }

    /// Encodes `data` into the sink.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink rejects a write.
    pub fn write(&mut self, data: &[u8]) -> io::Result<()> {
        for &byte in data {
            match byte {
                b'\r' | b'\n' => {
                    self.hard_break(byte)?;
                    continue;
                }
                b' ' | b'\t' | b'!'..=b'<' | b'>'..=b'~' => self.push_literal(byte)?,
                _ => self.push_escaped(byte)?,
            }
            self.after_cr = false;
        }
        Ok(())
    }

    /// Writes the pending line, flushes the sink and returns it.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink rejects a write or flush.
    pub fn finish(mut self) -> io::Result<W> {
        self.escape_trailing_whitespace()?;
        self.flush_line()?;
        self.sink.flush()?;
        Ok(self.sink)
    }

    fn hard_break(&mut self, byte: u8) -> io::Result<()> {
        // LF completing a CRLF was already written by the CR.
        if byte == b'\n' && self.after_cr {
            self.after_cr = false;
            return Ok(());
        }
        self.after_cr = byte == b'\r';

        self.escape_trailing_whitespace()?;
        self.line.extend_from_slice(b"\r\n");
        self.flush_line()
    }

    fn push_literal(&mut self, byte: u8) -> io::Result<()> {
        if self.line.len() == MAX_LINE_LENGTH - 1 {
            self.soft_break()?;
        }
        self.line.push(byte);
        Ok(())
    }

    fn push_escaped(&mut self, byte: u8) -> io::Result<()> {
        if self.line.len() + 3 > MAX_LINE_LENGTH - 1 {
            self.soft_break()?;
        }
        self.line.extend_from_slice(&[
            b'=',
            UPPER_HEX[usize::from(byte >> 4)],
            UPPER_HEX[usize::from(byte & 0x0f)],
        ]);
        Ok(())
    }

    fn escape_trailing_whitespace(&mut self) -> io::Result<()> {
        match self.line.last() {
            Some(&byte @ (b' ' | b'\t')) => {
                self.line.pop();
                self.push_escaped(byte)
            }
            _ => Ok(()),
        }
    }

    fn soft_break(&mut self) -> io::Result<()> {
        self.line.extend_from_slice(b"=\r\n");
        self.flush_line()
    }

    fn flush_line(&mut self) -> io::Result<()> {
        self.sink.write_all(&self.line)?;
        self.line.clear();
        Ok(())
    }
}

/// Encodes bytes using Quoted-Printable encoding (RFC 2045).
///
/// Line breaks in the output are CRLF.
///
/// # Errors
///
/// Returns [`Error::Encoding`] if the encoder fails to write its output.
pub fn encode_quoted_printable(data: &[u8]) -> Result<String> {
    let mut writer = QuotedPrintableWriter::new(Vec::with_capacity(data.len() * 3 / 2));
    writer
        .write(data)
        .map_err(|e| Error::Encoding(e.to_string()))?;
    let encoded = writer
        .finish()
        .map_err(|e| Error::Encoding(e.to_string()))?;

    // The encoder only ever emits ASCII.
    String::from_utf8(encoded).map_err(|e| Error::Encoding(e.to_string()))
}

/// Decodes Quoted-Printable text (RFC 2045).
///
/// Accepts both `=\r\n` and `=\n` soft line breaks.
///
/// # Errors
///
/// Returns an error if the input contains invalid escape sequences or the
/// decoded bytes are not UTF-8.
pub fn decode_quoted_printable(text: &str) -> Result<String> {
    let mut result = Vec::with_capacity(text.len());
    let mut bytes = text.bytes();

    while let Some(byte) = bytes.next() {
        if byte != b'=' {
            result.push(byte);
            continue;
        }

        match bytes.next() {
            // Soft line break
            Some(b'\n') => {}
            Some(b'\r') => {
                if bytes.next() != Some(b'\n') {
                    return Err(Error::InvalidEncoding(
                        "Bare CR in soft line break".to_string(),
                    ));
                }
            }
            Some(high) => {
                let low = bytes.next().ok_or_else(|| {
                    Error::InvalidEncoding("Incomplete escape sequence".to_string())
                })?;
                result.push((hex_value(high)? << 4) | hex_value(low)?);
            }
            None => {
                return Err(Error::InvalidEncoding(
                    "Incomplete escape sequence".to_string(),
                ));
            }
        }
    }

    String::from_utf8(result).map_err(Into::into)
}

fn hex_value(digit: u8) -> Result<u8> {
    char::from(digit)
        .to_digit(16)
        .and_then(|value| u8::try_from(value).ok())
        .ok_or_else(|| {
            Error::InvalidEncoding(format!("Invalid hex digit: {:?}", char::from(digit)))
        })
}

/// Rewrites every line ending in `data` as CRLF.
///
/// Windows (CRLF), Unix (LF) and classic Mac (CR) endings may be mixed
/// freely. An existing CRLF counts as one line break, so the function is
/// idempotent.
#[must_use]
pub fn normalize_crlf(data: &[u8]) -> Vec<u8> {
    let mut normalized = Vec::with_capacity(data.len() + data.len() / 32);
    let mut bytes = data.iter().copied().peekable();

    while let Some(byte) = bytes.next() {
        match byte {
            b'\r' => {
                bytes.next_if_eq(&b'\n');
                normalized.extend_from_slice(b"\r\n");
            }
            b'\n' => normalized.extend_from_slice(b"\r\n"),
            _ => normalized.push(byte),
        }
    }

    normalized
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const PROSE: &str = "J'interdis aux marchands de vanter trop leur marchandises. Car ils se font vite pédagogues et t'enseignent comme but ce qui n'est par essence qu'un moyen, et te trompant ainsi sur la route à suivre les voilà bientôt qui te dégradent, car si leur musique est vulgaire ils te fabriquent pour te la vendre une âme vulgaire.";

    /// Reference behaviour: the three ordered replacement passes.
    fn three_pass(data: &[u8]) -> Vec<u8> {
        fn replace(data: &[u8], from: &[u8], to: &[u8]) -> Vec<u8> {
            let mut out = Vec::new();
            let mut i = 0;
            while i < data.len() {
                if data[i..].starts_with(from) {
                    out.extend_from_slice(to);
                    i += from.len();
                } else {
                    out.push(data[i]);
                    i += 1;
                }
            }
            out
        }
        let lf = replace(data, b"\r\n", b"\n");
        let lf = replace(&lf, b"\r", b"\n");
        replace(&lf, b"\n", b"\r\n")
    }

    #[test]
    fn test_quoted_printable_encode_ascii() {
        let encoded = encode_quoted_printable(b"Hello, World!").unwrap();
        assert_eq!(encoded, "Hello, World!");
    }

    #[test]
    fn test_quoted_printable_encode_utf8() {
        let encoded = encode_quoted_printable("café".as_bytes()).unwrap();
        assert_eq!(encoded, "caf=C3=A9");
    }

    #[test]
    fn test_quoted_printable_escapes_equals() {
        let encoded = encode_quoted_printable(b"a=b").unwrap();
        assert_eq!(encoded, "a=3Db");
    }

    #[test]
    fn test_quoted_printable_soft_wraps_prose() {
        let expected = "J'interdis aux marchands de vanter trop leur marchandises. Car ils se font =\r\n\
vite p=C3=A9dagogues et t'enseignent comme but ce qui n'est par essence qu'=\r\n\
un moyen, et te trompant ainsi sur la route =C3=A0 suivre les voil=C3=A0 bi=\r\n\
ent=C3=B4t qui te d=C3=A9gradent, car si leur musique est vulgaire ils te f=\r\n\
abriquent pour te la vendre une =C3=A2me vulgaire.";

        let encoded = encode_quoted_printable(PROSE.as_bytes()).unwrap();
        assert_eq!(encoded, expected);
    }

    #[test]
    fn test_quoted_printable_trailing_whitespace() {
        let encoded = encode_quoted_printable(b"end \nnext\t").unwrap();
        assert_eq!(encoded, "end=20\r\nnext=09");
    }

    #[test]
    fn test_quoted_printable_trailing_whitespace_before_crlf() {
        assert_eq!(encode_quoted_printable(b"a \r\nb").unwrap(), "a=20\r\nb");
        assert_eq!(encode_quoted_printable(b"a\t\r\n\r\nb").unwrap(), "a=09\r\n\r\nb");
        assert_eq!(encode_quoted_printable(b"a=\r\nb").unwrap(), "a=3D\r\nb");
    }

    #[test]
    fn test_quoted_printable_line_breaks() {
        let encoded = encode_quoted_printable(b"a\r\nb\nc\rd").unwrap();
        assert_eq!(encoded, "a\r\nb\r\nc\r\nd");
    }

    #[test]
    fn test_quoted_printable_keeps_escape_together() {
        let input = format!("{}é", "x".repeat(73));
        let encoded = encode_quoted_printable(input.as_bytes()).unwrap();
        assert_eq!(encoded, format!("{}=\r\n=C3=A9", "x".repeat(73)));
    }

    #[test]
    fn test_quoted_printable_decode() {
        assert_eq!(decode_quoted_printable("Hello, World!").unwrap(), "Hello, World!");
        assert_eq!(decode_quoted_printable("H=C3=A9llo").unwrap(), "Héllo");
    }

    #[test]
    fn test_quoted_printable_soft_line_break() {
        assert_eq!(decode_quoted_printable("Hello=\r\nWorld").unwrap(), "HelloWorld");
        assert_eq!(decode_quoted_printable("Hello=\nWorld").unwrap(), "HelloWorld");
    }

    #[test]
    fn test_quoted_printable_decode_errors() {
        assert!(decode_quoted_printable("bad=ZZ").is_err());
        assert!(decode_quoted_printable("trailing=").is_err());
        assert!(decode_quoted_printable("half=A").is_err());
    }

    #[test]
    fn test_quoted_printable_prose_round_trip() {
        let encoded = encode_quoted_printable(PROSE.as_bytes()).unwrap();
        assert_eq!(decode_quoted_printable(&encoded).unwrap(), PROSE);
    }

    #[test]
    fn test_writer_reports_sink_failure() {
        struct FailingSink;

        impl Write for FailingSink {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::other("sink closed"))
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut writer = QuotedPrintableWriter::new(FailingSink);
        writer.write(b"one line\n").unwrap_err();
    }

    #[test]
    fn test_normalize_mixed_line_endings() {
        let mixed = [78, 23, 13, 10, 94, 10, 23, 13];
        let expected = [78, 23, 13, 10, 94, 13, 10, 23, 13, 10];
        assert_eq!(normalize_crlf(&mixed), expected);
    }

    #[test]
    fn test_normalize_cr_before_crlf() {
        assert_eq!(normalize_crlf(b"a\r\r\nb"), b"a\r\n\r\nb");
        assert_eq!(normalize_crlf(b"\n\r"), b"\r\n\r\n");
        assert_eq!(normalize_crlf(b""), b"");
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let once = normalize_crlf(&data);
            prop_assert_eq!(normalize_crlf(&once), once);
        }

        #[test]
        fn normalize_matches_ordered_replacements(
            data in proptest::collection::vec(prop_oneof![Just(b'\r'), Just(b'\n'), Just(b'x')], 0..64)
        ) {
            prop_assert_eq!(normalize_crlf(&data), three_pass(&data));
        }

        #[test]
        fn quoted_printable_ascii_round_trip(text in "[ -~]{0,60}[!-~]?") {
            let encoded = encode_quoted_printable(text.as_bytes()).unwrap();
            prop_assert_eq!(decode_quoted_printable(&encoded).unwrap(), text);
        }

        #[test]
        fn quoted_printable_round_trip_with_line_breaks(text in "[ -~\t\r\n]{0,200}") {
            let encoded = encode_quoted_printable(text.as_bytes()).unwrap();
            let expected = String::from_utf8(normalize_crlf(text.as_bytes())).unwrap();
            prop_assert_eq!(decode_quoted_printable(&encoded).unwrap(), expected);
        }

        #[test]
        fn quoted_printable_line_limit(text in "\\PC{0,400}") {
            let encoded = encode_quoted_printable(text.as_bytes()).unwrap();
            for line in encoded.split("\r\n") {
                prop_assert!(line.len() <= MAX_LINE_LENGTH);
            }
        }
    }
}
