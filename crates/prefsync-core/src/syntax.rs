//! DID and AT-URI syntax helpers.

use std::fmt;
use std::str::FromStr;

use crate::model::validate::ValidationError;

/// Collection NSID for feed generator records.
pub const FEED_GENERATOR_COLLECTION: &str = "app.bsky.feed.generator";
/// Collection NSID for list records.
pub const LIST_COLLECTION: &str = "app.bsky.graph.list";

const MAX_DID_LEN: usize = 2048;

/// Check that `did` is a syntactically valid `did:<method>:<identifier>`.
///
/// # Errors
///
/// Returns an identifier [`ValidationError`] describing the first problem.
pub fn ensure_valid_did(did: &str) -> Result<(), ValidationError> {
    let fail = |reason: &str| Err(ValidationError::identifier("did", format!("{reason}: {did}")));

    if did.len() > MAX_DID_LEN {
        return fail("DID is too long");
    }
    let Some(rest) = did.strip_prefix("did:") else {
        return fail("DID must start with `did:`");
    };
    let Some((method, identifier)) = rest.split_once(':') else {
        return fail("DID requires a method and an identifier");
    };
    if method.is_empty() || !method.bytes().all(|b| b.is_ascii_lowercase()) {
        return fail("DID method must be lowercase letters");
    }
    if identifier.is_empty() {
        return fail("DID identifier is empty");
    }
    if !identifier
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b':' | b'%' | b'-'))
    {
        return fail("DID identifier contains disallowed characters");
    }
    if identifier.ends_with(':') || identifier.ends_with('%') {
        return fail("DID cannot end with `:` or `%`");
    }
    Ok(())
}

/// Returns `true` if `did` passes [`ensure_valid_did`].
#[must_use]
pub fn is_valid_did(did: &str) -> bool {
    ensure_valid_did(did).is_ok()
}

/// A parsed `at://authority[/collection[/rkey]]` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtUri {
    pub authority: String,
    pub collection: Option<String>,
    pub rkey: Option<String>,
}

impl AtUri {
    /// The collection segment, or `""` when absent.
    #[must_use]
    pub fn collection(&self) -> &str {
        self.collection.as_deref().unwrap_or_default()
    }
}

impl FromStr for AtUri {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ValidationError::identifier("uri", format!("{reason}: {raw}"));

        let rest = raw
            .strip_prefix("at://")
            .ok_or_else(|| invalid("AT-URI must start with `at://`"))?;
        let path = rest.split(['?', '#']).next().unwrap_or_default();
        let mut segments = path.split('/');

        let authority = segments.next().unwrap_or_default();
        if authority.is_empty() {
            return Err(invalid("AT-URI authority is empty"));
        }
        let collection = segments.next().filter(|s| !s.is_empty()).map(str::to_string);
        let rkey = segments.next().filter(|s| !s.is_empty()).map(str::to_string);
        if segments.any(|s| !s.is_empty()) {
            return Err(invalid("AT-URI has too many path segments"));
        }
        if rkey.is_some() && collection.is_none() {
            return Err(invalid("AT-URI record key without collection"));
        }

        Ok(Self {
            authority: authority.to_string(),
            collection,
            rkey,
        })
    }
}

impl fmt::Display for AtUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at://{}", self.authority)?;
        if let Some(collection) = &self.collection {
            write!(f, "/{collection}")?;
            if let Some(rkey) = &self.rkey {
                write!(f, "/{rkey}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_dids() {
        assert!(is_valid_did("did:plc:ar7c4by46qjdydhdevvrndac"));
        assert!(is_valid_did("did:web:example.com"));
        assert!(is_valid_did("did:web:localhost%3A1234"));
    }

    #[test]
    fn rejects_malformed_dids() {
        for bad in [
            "",
            "did",
            "did:",
            "did:plc",
            "did:plc:",
            "did:PLC:abc",
            "plc:abc",
            "did:plc:abc:",
            "did:plc:abc%",
            "did:plc:a b",
        ] {
            assert!(!is_valid_did(bad), "{bad} should be rejected");
        }
    }

    #[test]
    fn parses_feed_uri() {
        let uri: AtUri = "at://did:plc:alice/app.bsky.feed.generator/whats-hot"
            .parse()
            .expect("valid uri");
        assert_eq!(uri.authority, "did:plc:alice");
        assert_eq!(uri.collection(), FEED_GENERATOR_COLLECTION);
        assert_eq!(uri.rkey.as_deref(), Some("whats-hot"));
        assert_eq!(
            uri.to_string(),
            "at://did:plc:alice/app.bsky.feed.generator/whats-hot"
        );
    }

    #[test]
    fn parses_authority_only_uri() {
        let uri: AtUri = "at://alice.test".parse().expect("valid uri");
        assert_eq!(uri.collection(), "");
        assert!(uri.rkey.is_none());
    }

    #[test]
    fn rejects_non_at_uris() {
        assert!("https://example.com/feed".parse::<AtUri>().is_err());
        assert!("at://".parse::<AtUri>().is_err());
        assert!("at://did:plc:a/coll/rkey/extra".parse::<AtUri>().is_err());
    }
}
