/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c) ZeroTier, Inc.
 * https://www.zerotier.com/
 */

use crate::utils::hex_str_to_u64;

/// A flat associative container mapping short text keys to arbitrary byte
/// strings, serialized as `key=value\n` lines with CR, LF, NUL, `=`, and
/// backslash escaped inside values.
///
/// Insertion order is preserved in the serialized form. Writing a key that
/// is already present fails; when reading, the first occurrence of a key
/// wins. Total serialized size is bounded by C.
#[derive(Clone, PartialEq, Eq)]
pub struct Dictionary<const C: usize> {
    b: Vec<u8>,
}

fn append_escaped(out: &mut Vec<u8>, value: &[u8]) {
    for c in value {
        match *c {
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\n' => out.extend_from_slice(b"\\n"),
            0 => out.extend_from_slice(b"\\0"),
            b'=' => out.extend_from_slice(b"\\e"),
            b'\\' => out.extend_from_slice(b"\\\\"),
            c => out.push(c),
        }
    }
}

fn unescape(value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    let mut i = 0;
    while i < value.len() {
        let c = value[i];
        if c == b'\\' && i + 1 < value.len() {
            out.push(match value[i + 1] {
                b'r' => b'\r',
                b'n' => b'\n',
                b'0' => 0,
                b'e' => b'=',
                c => c,
            });
            i += 2;
        } else {
            out.push(c);
            i += 1;
        }
    }
    out
}

impl<const C: usize> Dictionary<C> {
    pub fn new() -> Self {
        Self { b: Vec::new() }
    }

    /// Wrap a received serialized dictionary. Returns None if over capacity.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() > C {
            return None;
        }
        Some(Self { b: data.to_vec() })
    }

    pub fn clear(&mut self) {
        self.b.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.b.is_empty()
    }

    pub fn size(&self) -> usize {
        self.b.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.b
    }

    /// Iterate raw `(key, escaped value)` lines.
    fn lines(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.b.split(|c| *c == b'\n').filter_map(|line| {
            let eq = line.iter().position(|c| *c == b'=')?;
            Some((&line[..eq], &line[eq + 1..]))
        })
    }

    /// Add a key with an arbitrary byte string value. Returns false if the
    /// key is already present or the result would exceed the size bound.
    pub fn add(&mut self, key: &str, value: &[u8]) -> bool {
        if key.is_empty() || key.contains(['=', '\n', '\r', '\\', '\0']) {
            return false;
        }
        if self.lines().any(|(k, _)| k == key.as_bytes()) {
            return false;
        }
        let mut line = Vec::with_capacity(key.len() + value.len() + 2);
        line.extend_from_slice(key.as_bytes());
        line.push(b'=');
        append_escaped(&mut line, value);
        line.push(b'\n');
        if self.b.len() + line.len() > C {
            return false;
        }
        self.b.extend_from_slice(&line);
        true
    }

    pub fn add_str(&mut self, key: &str, value: &str) -> bool {
        self.add(key, value.as_bytes())
    }

    /// Add an integer as lower-case hex ASCII without a 0x prefix.
    pub fn add_u64(&mut self, key: &str, value: u64) -> bool {
        self.add_str(key, &format!("{:x}", value))
    }

    pub fn add_bool(&mut self, key: &str, value: bool) -> bool {
        self.add_str(key, if value { "1" } else { "0" })
    }

    /// Get a value with escapes decoded, or None if the key is absent.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.lines().find(|(k, _)| *k == key.as_bytes()).map(|(_, v)| unescape(v))
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| String::from_utf8(v).ok())
    }

    /// Get an integer value parsed as hex, or `default` if absent.
    pub fn get_ui(&self, key: &str, default: u64) -> u64 {
        match self.get_str(key) {
            Some(s) => hex_str_to_u64(&s),
            None => default,
        }
    }

    /// Get a boolean value, or `default` if absent. Anything starting with
    /// `1`, `t`, or `y` is true.
    pub fn get_b(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(v) => matches!(v.first(), Some(b'1') | Some(b't') | Some(b'T') | Some(b'y') | Some(b'Y')),
            None => default,
        }
    }
}

impl<const C: usize> Default for Dictionary<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escaping_round_trip() {
        let mut d = Dictionary::<256>::new();
        let value = b"a=b\r\nc\\d\0e";
        assert!(d.add("k", value));
        assert_eq!(d.get("k").unwrap(), value);
        // The serialized form contains exactly one newline (the terminator).
        assert_eq!(d.as_bytes().iter().filter(|c| **c == b'\n').count(), 1);
    }

    #[test]
    fn scalars() {
        let mut d = Dictionary::<256>::new();
        assert!(d.add_u64("nwid", 0x8056c2e21c000001));
        assert!(d.add_bool("eb", true));
        assert!(d.add_str("n", "earth"));
        assert_eq!(d.get_ui("nwid", 0), 0x8056c2e21c000001);
        assert_eq!(d.get_ui("absent", 7), 7);
        assert!(d.get_b("eb", false));
        assert!(!d.get_b("absent", false));
        assert_eq!(d.get_str("n").unwrap(), "earth");
    }

    #[test]
    fn duplicate_keys_rejected_first_wins() {
        let mut d = Dictionary::<256>::new();
        assert!(d.add_str("k", "first"));
        assert!(!d.add_str("k", "second"));
        // A hand-built dictionary with duplicates reads first-wins.
        let d = Dictionary::<256>::from_bytes(b"k=first\nk=second\n").unwrap();
        assert_eq!(d.get_str("k").unwrap(), "first");
    }

    #[test]
    fn overflow() {
        let mut d = Dictionary::<8>::new();
        assert!(!d.add_str("key", "toolong"));
        assert!(d.is_empty());
        assert!(Dictionary::<8>::from_bytes(&[0u8; 9]).is_none());
    }

    #[test]
    fn bad_keys_rejected() {
        let mut d = Dictionary::<256>::new();
        assert!(!d.add_str("", "v"));
        assert!(!d.add_str("a=b", "v"));
        assert!(!d.add_str("a\nb", "v"));
    }
}
