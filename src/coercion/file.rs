//! File references: URI strings with an optional scheme (`gs://bucket/object`,
//! `https://host/path`, `/local/path`, `relative/path`).

use std::fmt;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CbasFile(String);

impl CbasFile {
    /// Validate `raw` as a URI reference. The original text is kept as-is.
    ///
    /// Errors carry the reason the string is not a valid URI.
    pub fn parse(raw: &str) -> Result<Self, String> {
        validate_uri_characters(raw)?;

        match Url::parse(raw) {
            Ok(_) => Ok(Self(raw.to_string())),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = Url::parse("file:///").map_err(|e| e.to_string())?;
                base.join(raw)
                    .map(|_| Self(raw.to_string()))
                    .map_err(|e| format!("{e}: {raw}"))
            }
            Err(e) => Err(format!("{e}: {raw}")),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Scheme of the reference, if it has one.
    pub fn scheme(&self) -> Option<&str> {
        let (scheme, _) = self.0.split_once(':')?;
        let mut chars = scheme.chars();
        let starts_alpha = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
        let rest_valid = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        (starts_alpha && rest_valid).then_some(scheme)
    }
}

impl fmt::Display for CbasFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_allowed_uri_char(c: char) -> bool {
    if !c.is_ascii() {
        return c.is_alphanumeric();
    }
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '-' | '.' | '_' | '~'
                | ':' | '/' | '?' | '#' | '[' | ']' | '@'
                | '!' | '$' | '&' | '\'' | '(' | ')' | '*' | '+' | ',' | ';' | '='
        )
}

fn validate_uri_characters(raw: &str) -> Result<(), String> {
    let chars: Vec<char> = raw.chars().collect();
    let mut index = 0;
    while index < chars.len() {
        let c = chars[index];
        if c == '%' {
            let escape_ok = chars
                .get(index + 1..index + 3)
                .is_some_and(|pair| pair.iter().all(|h| h.is_ascii_hexdigit()));
            if !escape_ok {
                return Err(format!("Malformed escape pair at index {index}: {raw}"));
            }
            index += 3;
            continue;
        }
        if !is_allowed_uri_char(c) {
            return Err(format!("Illegal character at index {index}: {raw}"));
        }
        index += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_common_references() {
        for raw in [
            "gs://bucket/object.bam",
            "https://example.com/data/file.txt?sig=abc%20def",
            "drs://dg.4503/1234-abcd",
            "/cromwell_root/input.vcf",
            "relative/path.txt",
        ] {
            let file = CbasFile::parse(raw).unwrap();
            assert_eq!(file.as_str(), raw);
        }
    }

    #[test]
    fn test_rejects_malformed_references() {
        let err = CbasFile::parse("gs://bucket/has space").unwrap_err();
        assert!(err.contains("Illegal character at index 15"), "{err}");

        let err = CbasFile::parse("gs://bucket/%zz").unwrap_err();
        assert!(err.contains("Malformed escape pair"), "{err}");

        assert!(CbasFile::parse("https://[::1/file").is_err());
    }

    #[test]
    fn test_scheme() {
        assert_eq!(CbasFile::parse("gs://b/o").unwrap().scheme(), Some("gs"));
        assert_eq!(CbasFile::parse("/abs/path").unwrap().scheme(), None);
    }
}
