use kvcache_store::{ConditionalOutcome, DeleteOutcome, PutOutcome, Storage};

/// A fully parsed command, as produced by [`crate::Parser::build`].
///
/// Storage commands carry only the key; the body (the `<bytes>`-long
/// argument plus its trailing `\r\n`) is accumulated separately by the
/// connection and passed to [`Command::execute`], which never retains a
/// store reference beyond the call.
#[derive(Debug)]
pub enum Command {
    Set { key: Box<[u8]> },
    Add { key: Box<[u8]> },
    Replace { key: Box<[u8]> },
    Append { key: Box<[u8]> },
    Get { keys: Vec<Box<[u8]>> },
    Delete { key: Box<[u8]> },
}

/// Strip the trailing `\r\n` trailer a storage command's body carries.
fn trim_trailer(body: &[u8]) -> &[u8] {
    body.strip_suffix(crate::CRLF).unwrap_or(body)
}

impl Command {
    /// Execute against `storage`, returning the response bytes (including
    /// the trailing `\r\n` of whichever reply line applies).
    pub fn execute(&self, body: &[u8], storage: &dyn Storage) -> Vec<u8> {
        match self {
            Command::Set { key } => match storage.put(key, trim_trailer(body)) {
                PutOutcome::Stored => b"STORED\r\n".to_vec(),
                PutOutcome::Rejected => b"NOT_STORED\r\n".to_vec(),
            },
            Command::Add { key } => match storage.put_if_absent(key, trim_trailer(body)) {
                ConditionalOutcome::Stored => b"STORED\r\n".to_vec(),
                ConditionalOutcome::NotStored => b"NOT_STORED\r\n".to_vec(),
            },
            Command::Replace { key } => {
                if storage.get(key).is_some() {
                    match storage.set(key, trim_trailer(body)) {
                        ConditionalOutcome::Stored => b"STORED\r\n".to_vec(),
                        ConditionalOutcome::NotStored => b"NOT_STORED\r\n".to_vec(),
                    }
                } else {
                    b"NOT_STORED\r\n".to_vec()
                }
            }
            Command::Append { key } => match storage.get(key) {
                Some(old) => {
                    let mut combined = old.into_vec();
                    combined.extend_from_slice(trim_trailer(body));
                    match storage.put(key, &combined) {
                        PutOutcome::Stored => b"STORED\r\n".to_vec(),
                        PutOutcome::Rejected => b"NOT_STORED\r\n".to_vec(),
                    }
                }
                None => b"NOT_STORED\r\n".to_vec(),
            },
            Command::Delete { key } => match storage.delete(key) {
                DeleteOutcome::Deleted => b"DELETED\r\n".to_vec(),
                DeleteOutcome::Absent => b"NOT_FOUND\r\n".to_vec(),
            },
            Command::Get { keys } => {
                let mut out = Vec::new();
                for key in keys {
                    if let Some(value) = storage.get(key) {
                        out.extend_from_slice(b"VALUE ");
                        out.extend_from_slice(key);
                        out.extend_from_slice(format!(" 0 {}\r\n", value.len()).as_bytes());
                        out.extend_from_slice(&value);
                        out.extend_from_slice(b"\r\n");
                    }
                }
                out.extend_from_slice(b"END\r\n");
                out
            }
        }
    }
}

/// Response emitted for a protocol error.
pub const ERROR_RESPONSE: &[u8] = b"ERROR\r\n";

#[cfg(test)]
mod tests {
    use super::*;
    use kvcache_store::SimpleLru;

    #[test]
    fn set_get_roundtrip() {
        let store = SimpleLru::new(1024);
        let cmd = Command::Set { key: (*b"foo").into() };
        assert_eq!(cmd.execute(b"bar\r\n", &store), b"STORED\r\n");
        let get = Command::Get { keys: vec![(*b"foo").into()] };
        assert_eq!(get.execute(b"", &store), b"VALUE foo 0 3\r\nbar\r\nEND\r\n");
    }

    #[test]
    fn append_concatenates() {
        let store = SimpleLru::new(1024);
        Command::Set { key: (*b"k").into() }.execute(b"hi\r\n", &store);
        let resp = Command::Append { key: (*b"k").into() }.execute(b"!!!\r\n", &store);
        assert_eq!(resp, b"STORED\r\n");
        let get = Command::Get { keys: vec![(*b"k").into()] };
        assert_eq!(get.execute(b"", &store), b"VALUE k 0 5\r\nhi!!!\r\nEND\r\n");
    }

    #[test]
    fn get_miss_is_end_only() {
        let store = SimpleLru::new(1024);
        let get = Command::Get { keys: vec![(*b"nope").into()] };
        assert_eq!(get.execute(b"", &store), b"END\r\n");
    }
}
