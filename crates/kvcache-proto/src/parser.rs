use crate::command::Command;
use crate::{key, ProtoError};

/// Caps the header line we're willing to accumulate while waiting for a
/// `\r\n`. Keys are at most 250 bytes, so a header of a few hundred bytes
/// is generous for `set <key> <flags> <exptime> <bytes>`.
const MAX_HEADER_BYTES: usize = 512;

/// Incremental command-header scanner: [`Parser::parse`] is fed arbitrary
/// byte chunks and reports how many bytes it consumed and whether a full
/// header line was recognized; [`Parser::build`] then turns the
/// accumulated line into a [`Command`] plus declared body length;
/// [`Parser::reset`] returns to the initial state.
#[derive(Default)]
pub struct Parser {
    header: Vec<u8>,
    saw_cr: bool,
    overflowed: bool,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk of the stream. Returns `(consumed, complete)`:
    /// `consumed` is how many leading bytes of `bytes` were consumed by the
    /// scan (including the terminating `\r\n` once complete), `complete`
    /// indicates a full header line is ready for [`Parser::build`].
    pub fn parse(&mut self, bytes: &[u8]) -> (usize, bool) {
        for (i, &b) in bytes.iter().enumerate() {
            if self.saw_cr && b == b'\n' {
                self.header.pop(); // drop the '\r' we already stored
                self.saw_cr = false;
                return (i + 1, true);
            }
            self.saw_cr = b == b'\r';
            if self.header.len() < MAX_HEADER_BYTES {
                self.header.push(b);
            } else {
                self.overflowed = true;
            }
        }
        (bytes.len(), false)
    }

    /// Build the command recognized by the last complete `parse` call.
    pub fn build(&self) -> Result<(Command, usize), ProtoError> {
        if self.overflowed {
            return Err(ProtoError::MalformedHeader);
        }
        parse_header(&self.header)
    }

    /// Return to the initial state, ready to parse the next header.
    pub fn reset(&mut self) {
        self.header.clear();
        self.saw_cr = false;
        self.overflowed = false;
    }
}

fn tokens(line: &[u8]) -> Vec<&[u8]> {
    line.split(|&b| b == b' ').filter(|t| !t.is_empty()).collect()
}

fn parse_u32(tok: &[u8]) -> Result<u32, ProtoError> {
    std::str::from_utf8(tok)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(ProtoError::MalformedHeader)
}

fn parse_header(line: &[u8]) -> Result<(Command, usize), ProtoError> {
    let toks = tokens(line);
    let Some((&verb, rest)) = toks.split_first() else {
        return Err(ProtoError::MalformedHeader);
    };

    match verb {
        b"set" | b"add" | b"replace" | b"append" => {
            let [key_tok, flags_tok, exptime_tok, bytes_tok] = rest else {
                return Err(ProtoError::MalformedHeader);
            };
            key::validate(key_tok)?;
            parse_u32(flags_tok)?;
            parse_u32(exptime_tok)?;
            let arg_len = parse_u32(bytes_tok)? as usize;
            let key: Box<[u8]> = (*key_tok).into();
            let cmd = match verb {
                b"set" => Command::Set { key },
                b"add" => Command::Add { key },
                b"replace" => Command::Replace { key },
                b"append" => Command::Append { key },
                _ => unreachable!(),
            };
            Ok((cmd, arg_len))
        }
        b"get" => {
            if rest.is_empty() {
                return Err(ProtoError::MalformedHeader);
            }
            let mut keys = Vec::with_capacity(rest.len());
            for k in rest {
                key::validate(k)?;
                keys.push((*k).into());
            }
            Ok((Command::Get { keys }, 0))
        }
        b"delete" => {
            let [key_tok] = rest else {
                return Err(ProtoError::MalformedHeader);
            };
            key::validate(key_tok)?;
            Ok((Command::Delete { key: (*key_tok).into() }, 0))
        }
        _ => Err(ProtoError::UnknownCommand),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(p: &mut Parser, input: &[u8]) -> usize {
        let mut total = 0;
        let mut rest = input;
        loop {
            let (consumed, complete) = p.parse(rest);
            total += consumed;
            rest = &rest[consumed..];
            if complete {
                return total;
            }
            if consumed == 0 {
                panic!("parser made no progress");
            }
        }
    }

    #[test]
    fn parses_set_header() {
        let mut p = Parser::new();
        let consumed = feed_all(&mut p, b"set foo 0 0 3\r\nbar\r\n");
        assert_eq!(consumed, "set foo 0 0 3\r\n".len());
        let (cmd, arg_len) = p.build().unwrap();
        assert!(matches!(cmd, Command::Set { .. }));
        assert_eq!(arg_len, 3);
    }

    #[test]
    fn chunked_feeding_matches_whole_stream() {
        let whole = b"set foo 0 0 3\r\n";
        for split in 0..whole.len() {
            let mut p = Parser::new();
            let (a, b) = whole.split_at(split);
            let (c1, done1) = p.parse(a);
            assert_eq!(c1, a.len());
            if done1 {
                continue; // header finished entirely in the first chunk
            }
            let (c2, done2) = p.parse(b);
            assert_eq!(c1 + c2, whole.len());
            assert!(done2);
            let (cmd, arg_len) = p.build().unwrap();
            assert!(matches!(cmd, Command::Set { .. }));
            assert_eq!(arg_len, 3);
        }
    }

    #[test]
    fn split_crlf_across_chunks() {
        let mut p = Parser::new();
        let (c1, done1) = p.parse(b"get foo\r");
        assert_eq!(c1, 8);
        assert!(!done1);
        let (c2, done2) = p.parse(b"\nrest");
        assert_eq!(c2, 1);
        assert!(done2);
        let (cmd, arg_len) = p.build().unwrap();
        assert_eq!(arg_len, 0);
        assert!(matches!(cmd, Command::Get { .. }));
    }

    #[test]
    fn unknown_verb_is_error() {
        let mut p = Parser::new();
        feed_all(&mut p, b"frobnicate x\r\n");
        assert_eq!(p.build().unwrap_err(), ProtoError::UnknownCommand);
    }

    #[test]
    fn get_multiple_keys() {
        let mut p = Parser::new();
        feed_all(&mut p, b"get a b c\r\n");
        let (cmd, _) = p.build().unwrap();
        match cmd {
            Command::Get { keys } => assert_eq!(keys.len(), 3),
            _ => panic!("wrong command"),
        }
    }
}
