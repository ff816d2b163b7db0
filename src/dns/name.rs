//! Domain names held as raw wire labels.

use std::fmt;

/// A domain name kept as the label bytes seen on the wire.
///
/// Label bytes are never reinterpreted, so names carrying non-ASCII or
/// non-UTF-8 bytes decode and encode unchanged. The text form escapes bytes
/// outside printable ASCII as `\DDD`, and `.` or `\` inside a label as `\.`
/// and `\\`; parsing a `&str` understands the same escapes.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Name {
    labels: Vec<Vec<u8>>,
}

impl Name {
    /// The root name, written `"."`.
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a name from raw labels. Empty labels are skipped.
    pub fn from_labels<I, L>(labels: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Vec<u8>>,
    {
        Self {
            labels: labels
                .into_iter()
                .map(Into::into)
                .filter(|l| !l.is_empty())
                .collect(),
        }
    }

    pub fn labels(&self) -> impl Iterator<Item = &[u8]> {
        self.labels.iter().map(Vec::as_slice)
    }

    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    /// Copy with ASCII letters lowercased; other bytes are left alone.
    pub fn to_ascii_lowercase(&self) -> Self {
        Self {
            labels: self.labels.iter().map(|l| l.to_ascii_lowercase()).collect(),
        }
    }

    pub(crate) fn push_label(&mut self, label: &[u8]) {
        self.labels.push(label.to_vec());
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.labels.is_empty() {
            return f.write_str(".");
        }
        for (i, label) in self.labels.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            for &b in label {
                match b {
                    b'.' | b'\\' => write!(f, "\\{}", b as char)?,
                    0x21..=0x7E => write!(f, "{}", b as char)?,
                    _ => write!(f, "\\{b:03}")?,
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Name").field(&format_args!("{self}")).finish()
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        let bytes = s.as_bytes();
        let mut labels = Vec::new();
        let mut label = Vec::new();
        let mut i = 0;

        while i < bytes.len() {
            match bytes[i] {
                b'.' => {
                    if !label.is_empty() {
                        labels.push(std::mem::take(&mut label));
                    }
                    i += 1;
                }
                b'\\' => {
                    let rest = &bytes[i + 1..];
                    if rest.len() >= 3 && rest[..3].iter().all(u8::is_ascii_digit) {
                        let value = rest[..3]
                            .iter()
                            .fold(0u16, |acc, &d| acc * 10 + u16::from(d - b'0'));
                        if let Ok(byte) = u8::try_from(value) {
                            label.push(byte);
                            i += 4;
                            continue;
                        }
                    }
                    match rest.first() {
                        Some(&c) => {
                            label.push(c);
                            i += 2;
                        }
                        None => {
                            label.push(b'\\');
                            i += 1;
                        }
                    }
                }
                b => {
                    label.push(b);
                    i += 1;
                }
            }
        }
        if !label.is_empty() {
            labels.push(label);
        }

        Self { labels }
    }
}

impl From<String> for Name {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl PartialEq<str> for Name {
    fn eq(&self, other: &str) -> bool {
        *self == Name::from(other)
    }
}

impl PartialEq<&str> for Name {
    fn eq(&self, other: &&str) -> bool {
        *self == Name::from(*other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dotted_text() {
        let name = Name::from("www.example.com");

        assert_eq!(
            name.labels().collect::<Vec<_>>(),
            vec![&b"www"[..], b"example", b"com"]
        );
        assert_eq!(name.to_string(), "www.example.com");
    }

    #[test]
    fn root_forms() {
        assert!(Name::from("").is_root());
        assert!(Name::from(".").is_root());
        assert_eq!(Name::root().to_string(), ".");
        assert_eq!(Name::from("example.com."), "example.com");
    }

    #[test]
    fn escapes_non_printable_bytes() {
        let name = Name::from_labels([vec![b'c', b'a', b'f', 0xE9], b"a.b".to_vec()]);

        assert_eq!(name.to_string(), "caf\\233.a\\.b");
        assert_eq!(Name::from(name.to_string()), name);
    }

    #[test]
    fn keeps_non_utf8_bytes() {
        let label = vec![0xFF; 63];
        let name = Name::from_labels([label.clone()]);

        assert_eq!(name.labels().next(), Some(&label[..]));
        assert_eq!(Name::from(name.to_string()), name);
    }

    #[test]
    fn ascii_lowercase_leaves_other_bytes() {
        let name = Name::from_labels([vec![b'W', 0xC9, b'b']]);

        assert_eq!(
            name.to_ascii_lowercase(),
            Name::from_labels([vec![b'w', 0xC9, b'b']])
        );
    }

    #[test]
    fn equality_is_case_sensitive() {
        assert_ne!(Name::from("WWW.example.com"), Name::from("www.example.com"));
        assert_eq!(Name::from("WWW.example.com"), "WWW.example.com");
    }

    #[test]
    fn stray_backslash_is_literal() {
        assert_eq!(Name::from("a\\").labels().next(), Some(&b"a\\"[..]));
        assert_eq!(Name::from("\\999").labels().next(), Some(&b"999"[..]));
    }
}
