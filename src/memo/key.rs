//! Cache Key Derivation
//!
//! Turns an operation identity plus its call arguments into a fixed-size key.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::ser::{Error as _, SerializeStruct};
use serde::{Serialize, Serializer};
use serde_json::Value;
use sha2::{Digest, Sha256};

// == Cache Key ==
/// SHA-256 digest of an operation identity and its arguments, as 64 hex chars.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Digests `identity` together with the canonical JSON form of `args`.
    ///
    /// JSON objects are emitted with sorted keys, so maps and keyword
    /// arguments produce the same key whatever their insertion order.
    pub fn digest<A: Serialize + ?Sized>(
        identity: &str,
        args: &A,
    ) -> Result<Self, serde_json::Error> {
        let canonical = serde_json::to_string(&serde_json::to_value(args)?)?;

        let mut hasher = Sha256::new();
        hasher.update(identity.as_bytes());
        hasher.update([0u8]);
        hasher.update(canonical.as_bytes());
        Ok(Self(format!("{:x}", hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

// == Call Args ==
/// Positional and keyword arguments of a call, pre-serialized for keying.
///
/// Keyword arguments are kept sorted by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    positional: Vec<Value>,
    keyword: BTreeMap<String, Value>,
    /// First serialization failure; such args cannot be keyed
    invalid: Option<String>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    pub fn arg<T: Serialize>(mut self, value: T) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => self.positional.push(value),
            Err(e) => self.mark_invalid(e),
        }
        self
    }

    /// Sets a keyword argument, replacing any previous value for `name`.
    pub fn kwarg<T: Serialize>(mut self, name: impl Into<String>, value: T) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => {
                self.keyword.insert(name.into(), value);
            }
            Err(e) => self.mark_invalid(e),
        }
        self
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn keyword(&self, name: &str) -> Option<&Value> {
        self.keyword.get(name)
    }

    /// Whether every argument serialized cleanly.
    pub fn is_keyable(&self) -> bool {
        self.invalid.is_none()
    }

    fn mark_invalid(&mut self, e: serde_json::Error) {
        if self.invalid.is_none() {
            self.invalid = Some(e.to_string());
        }
    }
}

impl Serialize for CallArgs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if let Some(reason) = &self.invalid {
            return Err(S::Error::custom(format!("unserializable argument: {reason}")));
        }
        let mut state = serializer.serialize_struct("CallArgs", 2)?;
        state.serialize_field("args", &self.positional)?;
        state.serialize_field("kwargs", &self.keyword)?;
        state.end()
    }
}

// == Key Strategy ==
/// How a memoized operation derives its cache key from its arguments.
pub enum KeyStrategy<A: ?Sized> {
    /// Digest of the identity and the serialized arguments
    Arguments,
    /// Digest of the identity and a caller-built string
    Custom(Arc<dyn Fn(&A) -> String + Send + Sync>),
}

impl<A: ?Sized> KeyStrategy<A> {
    pub fn custom(f: impl Fn(&A) -> String + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(f))
    }
}

impl<A: Serialize + ?Sized> KeyStrategy<A> {
    /// Derives the key for a call of `identity` with `args`.
    pub fn derive(&self, identity: &str, args: &A) -> Result<CacheKey, serde_json::Error> {
        match self {
            Self::Arguments => CacheKey::digest(identity, args),
            Self::Custom(build) => CacheKey::digest(identity, &build(args)),
        }
    }
}

impl<A: ?Sized> Default for KeyStrategy<A> {
    fn default() -> Self {
        Self::Arguments
    }
}

impl<A: ?Sized> Clone for KeyStrategy<A> {
    fn clone(&self) -> Self {
        match self {
            Self::Arguments => Self::Arguments,
            Self::Custom(build) => Self::Custom(Arc::clone(build)),
        }
    }
}

impl<A: ?Sized> fmt::Debug for KeyStrategy<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arguments => f.write_str("Arguments"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_digest_is_fixed_size_hex() {
        let key = CacheKey::digest("balance", &("0xabc", 3)).unwrap();
        assert_eq!(key.as_str().len(), 64);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_digest_is_deterministic() {
        let a = CacheKey::digest("f", &[1, 2, 3]).unwrap();
        let b = CacheKey::digest("f", &[1, 2, 3]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_identity_changes_key() {
        let a = CacheKey::digest("f", &1).unwrap();
        let b = CacheKey::digest("g", &1).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_keyword_order_does_not_matter() {
        let a = CallArgs::new().kwarg("a", 1).kwarg("b", 2);
        let b = CallArgs::new().kwarg("b", 2).kwarg("a", 1);

        assert_eq!(
            CacheKey::digest("f", &a).unwrap(),
            CacheKey::digest("f", &b).unwrap()
        );
    }

    #[test]
    fn test_positional_order_matters() {
        let a = CallArgs::new().arg(1).arg(2);
        let b = CallArgs::new().arg(2).arg(1);

        assert_ne!(
            CacheKey::digest("f", &a).unwrap(),
            CacheKey::digest("f", &b).unwrap()
        );
    }

    #[test]
    fn test_positional_and_keyword_are_distinct() {
        let a = CallArgs::new().arg(1);
        let b = CallArgs::new().kwarg("0", 1);

        assert_ne!(
            CacheKey::digest("f", &a).unwrap(),
            CacheKey::digest("f", &b).unwrap()
        );
    }

    #[test]
    fn test_hash_map_args_are_canonical() {
        let mut first = HashMap::new();
        let mut second = HashMap::new();
        for i in 0..16 {
            first.insert(format!("k{i}"), i);
        }
        for i in (0..16).rev() {
            second.insert(format!("k{i}"), i);
        }

        assert_eq!(
            CacheKey::digest("f", &first).unwrap(),
            CacheKey::digest("f", &second).unwrap()
        );
    }

    #[test]
    fn test_unserializable_args_cannot_be_keyed() {
        // Maps with non-string keys have no JSON form
        let mut bad = HashMap::new();
        bad.insert((1, 2), "x");

        let args = CallArgs::new().arg(1).arg(bad);
        assert!(!args.is_keyable());
        assert!(CacheKey::digest("f", &args).is_err());
    }

    #[test]
    fn test_call_args_accessors() {
        let args = CallArgs::new().arg("addr").kwarg("chain", "eth");

        assert_eq!(args.positional(), &[Value::from("addr")]);
        assert_eq!(args.keyword("chain"), Some(&Value::from("eth")));
        assert_eq!(args.keyword("missing"), None);
    }

    #[test]
    fn test_custom_strategy() {
        let strategy: KeyStrategy<(String, u32)> =
            KeyStrategy::custom(|(addr, _): &(String, u32)| addr.clone());

        let a = strategy.derive("f", &("x".to_string(), 1)).unwrap();
        let b = strategy.derive("f", &("x".to_string(), 2)).unwrap();
        let c = strategy.derive("f", &("y".to_string(), 1)).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 64);
    }
}
