//! Token data model.
//!
//! Every token looks like `"{token_key}.{token_secret}"`. The key is a
//! public identifier; the secret is signing material and is never logged.
//!
//! Site tokens come in two flavours:
//! - *normal*: the key is an opaque random string and never starts with `;`
//! - *special*: the key is structured as `;{special_id}{version};{remote_id};`
//!
//! Stored user tokens carry a third segment, the owning user's id:
//! `"{token_key}.{token_secret}.{user_id}"`.

use std::fmt;

use subtle::ConstantTimeEq;

/// Separates the key from the secret (and the secret from a user id)
pub const TOKEN_DELIMITER: char = '.';

/// Leading character of every special token key
pub const SPECIAL_MARKER: char = ';';

/// Who a token authenticates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    /// The site itself
    Site,
    /// A specific connected user. `User(0)` looks up the token stored for
    /// id 0 and never falls back to the site; use `Site` for that.
    User(u64),
    /// Whichever user owns the connection; resolved through the store
    MasterUser,
}

/// How to choose among several candidate tokens
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TokenKeyHint {
    /// First candidate, special tokens first
    #[default]
    NoHint,
    /// First normal token, ignoring special tokens entirely
    FirstNormal,
    /// The candidate whose key equals this one
    ExactKey(String),
}

impl TokenKeyHint {
    pub fn exact(key: impl Into<String>) -> Self {
        TokenKeyHint::ExactKey(key.into())
    }
}

/// A resolved credential
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    /// The full `"{token_key}.{token_secret}"` string
    pub secret: String,
    /// Id of the user the token belongs to, `0` for the site
    pub external_user_id: u64,
}

impl AccessToken {
    pub fn token(&self) -> Option<Token<'_>> {
        Token::parse(&self.secret)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = self.token().map(|t| t.key).unwrap_or("<malformed>");
        f.debug_struct("AccessToken")
            .field("key", &key)
            .field("external_user_id", &self.external_user_id)
            .finish()
    }
}

/// A token split into its public key and private secret
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub key: &'a str,
    pub secret: &'a str,
}

impl<'a> Token<'a> {
    /// Split on the first delimiter. Both halves must be non-empty.
    pub fn parse(raw: &'a str) -> Option<Self> {
        let (key, secret) = raw.split_once(TOKEN_DELIMITER)?;
        if key.is_empty() || secret.is_empty() {
            return None;
        }
        Some(Self { key, secret })
    }

    pub fn kind(&self) -> TokenKind {
        TokenKind::of(self.key)
    }
}

impl fmt::Debug for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Normal,
    Special(SpecialKey),
}

impl TokenKind {
    /// Classify a token (or bare token key) by its leading character
    pub fn of(token: &str) -> Self {
        match SpecialKey::parse(token) {
            Some(key) => TokenKind::Special(key),
            None if is_special(token) => TokenKind::Special(SpecialKey::default()),
            None => TokenKind::Normal,
        }
    }

    pub fn is_special(&self) -> bool {
        matches!(self, TokenKind::Special(_))
    }
}

/// Whether a token string is special. Only the leading `;` matters.
pub fn is_special(token: &str) -> bool {
    token.starts_with(SPECIAL_MARKER)
}

/// The structured parts of a special token key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecialKey {
    pub special_id: String,
    pub version: Option<u32>,
    pub remote_id: String,
}

impl SpecialKey {
    /// Parse `;{special_id}{version};{remote_id};`, with or without a
    /// trailing `.{secret}`.
    pub fn parse(token: &str) -> Option<Self> {
        let key = token.split(TOKEN_DELIMITER).next()?;
        let body = key.strip_prefix(SPECIAL_MARKER)?.strip_suffix(SPECIAL_MARKER)?;
        let (id_and_version, remote_id) = body.split_once(SPECIAL_MARKER)?;
        if remote_id.contains(SPECIAL_MARKER) {
            return None;
        }

        let special_id = id_and_version.trim_end_matches(|c: char| c.is_ascii_digit());
        let version = &id_and_version[special_id.len()..];
        if special_id.is_empty() {
            return None;
        }

        Some(Self {
            special_id: special_id.to_string(),
            version: version.parse().ok(),
            remote_id: remote_id.to_string(),
        })
    }
}

/// A stored user token: `"{token_key}.{token_secret}.{user_id}"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserTokenRecord {
    Valid(String),
    Malformed(&'static str),
}

impl UserTokenRecord {
    /// Check a stored user token against the id it is filed under.
    ///
    /// Segments past the third are ignored.
    pub fn parse(stored: &str, user_id: u64) -> Self {
        let mut chunks = stored.split(TOKEN_DELIMITER);
        let key = chunks.next().unwrap_or_default();
        let secret = chunks.next().unwrap_or_default();
        let owner = chunks.next().unwrap_or_default();

        if secret.is_empty() {
            return UserTokenRecord::Malformed("missing_secret");
        }
        if owner.is_empty() {
            return UserTokenRecord::Malformed("missing_owner");
        }
        match owner.parse::<u64>() {
            Ok(id) if id == user_id => {
                UserTokenRecord::Valid(format!("{key}{TOKEN_DELIMITER}{secret}"))
            }
            _ => UserTokenRecord::Malformed("owner_mismatch"),
        }
    }
}

/// Normalize a token key hint so it ends in exactly one delimiter
pub fn key_check(token_key: &str) -> String {
    let mut check = token_key.trim_end_matches(TOKEN_DELIMITER).to_string();
    check.push(TOKEN_DELIMITER);
    check
}

/// Whether `candidate` starts with `check`, compared in constant time.
///
/// Only the lengths can influence the running time; the bytes compared
/// never do.
pub fn key_matches(candidate: &str, check: &str) -> bool {
    let candidate = candidate.as_bytes();
    let prefix = &candidate[..check.len().min(candidate.len())];
    prefix.ct_eq(check.as_bytes()).into()
}
