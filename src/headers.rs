use core::fmt;
use std::collections::HashMap;

use anyhow::{bail, Result};
use tokio::io::AsyncBufRead;

use crate::request::read_crlf_line;

/// Upper bound on the number of header lines accepted in one request.
const MAX_HEADERS: usize = 100;

#[derive(Debug, Clone, Default)]
pub struct Headers(pub HashMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn insert(&mut self, k: &str, v: &str) -> Option<String> {
        self.0.insert(k.to_string(), v.to_string())
    }

    /// Case-insensitive lookup.
    pub fn get(&self, k: &str) -> Option<&String> {
        self.0
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(k))
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Adds a field, folding repeated names into one comma-separated value.
    pub fn append(&mut self, k: &str, v: &str) {
        self.0
            .entry(k.to_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(v);
            })
            .or_insert_with(|| v.to_string());
    }

    /// Reads header lines up to and including the empty line that ends them.
    pub async fn read_from<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Self> {
        let mut headers = Headers::new();
        for _ in 0..MAX_HEADERS {
            let line = read_crlf_line(reader).await?;
            match Self::parse_header_line(&line)? {
                Some((name, value)) => headers.append(&name, &value),
                None => return Ok(headers),
            }
        }
        bail!("too many header fields (limit {})", MAX_HEADERS)
    }

    /// Parses a single header line without its CRLF. `None` marks the end of the header block.
    pub fn parse_header_line(raw_header: &str) -> Result<Option<(String, String)>> {
        let raw_header = raw_header.trim();
        if raw_header.is_empty() {
            return Ok(None);
        }
        if let Some((field_name, field_value)) = raw_header.split_once(':') {
            if field_name.trim_end() != field_name {
                bail!("Field name included invalid whitespace: '{}'", raw_header);
            }
            if !Self::valid_field_name(field_name) {
                bail!("Invalid characters detected: '{}'", field_name);
            }
            Ok(Some((field_name.to_lowercase(), field_value.trim().to_string())))
        } else {
            bail!("No ':' found in raw_header: {}", raw_header);
        }
    }

    fn valid_field_name(s: &str) -> bool {
        const SPECIAL_CHARS: [char; 15] = ['!', '#', '$', '%', '&', '\'', '*', '+', '-', '.', '^', '_', '`', '|', '~'];
        !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || SPECIAL_CHARS.contains(&c))
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}",
            self.0.iter().map(|(k, v)| format!("{}: {}\r\n", k, v)).collect::<String>()
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn header_line_basics() {
        let ok = Headers::parse_header_line("Host: localhost:8000").unwrap();
        assert_eq!(ok, Some(("host".to_string(), "localhost:8000".to_string())));

        let padded = Headers::parse_header_line("  Content-Type:   text/plain  ").unwrap();
        assert_eq!(padded, Some(("content-type".to_string(), "text/plain".to_string())));

        assert_eq!(Headers::parse_header_line("").unwrap(), None);
        assert!(Headers::parse_header_line("Host : localhost").is_err()); // space before ':'
        assert!(Headers::parse_header_line("HÂ©st: localhost").is_err()); // invalid character
        assert!(Headers::parse_header_line("Host localhost").is_err()); // missing ':'
    }

    #[tokio::test]
    async fn read_folds_repeated_fields() {
        let data = b"Set-Person: lane-loves-go\r\nSet-Person: prime-loves-zig\r\nAccept: */*\r\n\r\n".to_vec();
        let mut reader = std::io::Cursor::new(data);
        let headers = Headers::read_from(&mut reader).await.unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("Set-Person").map(|s| s.as_str()), Some("lane-loves-go, prime-loves-zig"));
        assert_eq!(headers.get("ACCEPT").map(|s| s.as_str()), Some("*/*"));
    }

    #[tokio::test]
    async fn read_requires_terminating_blank_line() {
        let data = b"Host: localhost:8000\r\nAccept: */*".to_vec();
        let mut reader = std::io::Cursor::new(data);
        assert!(Headers::read_from(&mut reader).await.is_err());
    }
}
