use std::io::BufRead;

use crate::errors::ConnectorError;

/// Prefix carried by every payload line of an event stream.
pub const DATA_MARKER: &str = "data:";

/// Iterator over the `data:` payloads of a line-delimited event stream.
///
/// Empty lines, comments, and any line without the data marker are skipped.
/// Bytes are decoded lossily so a stray invalid sequence cannot abort a stream.
pub struct DataLines<R> {
    reader: R,
    buf: Vec<u8>,
    done: bool,
}

impl<R: BufRead> DataLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for DataLines<R> {
    type Item = Result<String, ConnectorError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => self.done = true,
                Ok(_) => {
                    if let Some(payload) = data_payload(&self.buf) {
                        return Some(Ok(payload));
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(ConnectorError::Transport(format!(
                        "stream read failed: {e}"
                    ))));
                }
            }
        }
        None
    }
}

fn data_payload(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let line = text.trim_end_matches(['\n', '\r']);
    if line.is_empty() {
        return None;
    }
    let rest = line.strip_prefix(DATA_MARKER)?;
    Some(rest.trim().to_string())
}
