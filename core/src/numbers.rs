use blake2::{
    digest::{Update, VariableOutput},
    Blake2bVar,
};
use rand::Rng;
use std::fmt::{Debug, Display};

fn encode_hex(bytes: &[u8]) -> String {
    let mut result = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        result.push_str(&format!("{:02X}", byte));
    }
    result
}

fn decode_hex(s: &str, target: &mut [u8]) -> anyhow::Result<()> {
    if s.len() != target.len() * 2 {
        bail!("invalid hex length");
    }
    for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
        let hex = std::str::from_utf8(chunk)?;
        target[i] = u8::from_str_radix(hex, 16)?;
    }
    Ok(())
}

macro_rules! u256_newtype {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name([u8; 32]);

        impl $name {
            pub fn zero() -> Self {
                Self([0; 32])
            }

            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }

            pub fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn random() -> Self {
                let mut bytes = [0u8; 32];
                rand::thread_rng().fill(&mut bytes);
                Self(bytes)
            }

            pub fn encode_hex(&self) -> String {
                encode_hex(&self.0)
            }

            pub fn decode_hex(s: impl AsRef<str>) -> anyhow::Result<Self> {
                let mut bytes = [0u8; 32];
                decode_hex(s.as_ref(), &mut bytes)?;
                Ok(Self(bytes))
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                let mut bytes = [0u8; 32];
                bytes[24..].copy_from_slice(&value.to_be_bytes());
                Self(bytes)
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.encode_hex())
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.encode_hex())
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.encode_hex())
            }
        }
    };
}

u256_newtype!(BlockHash);
u256_newtype!(PublicKey);
u256_newtype!(Account);
u256_newtype!(Root);

impl From<PublicKey> for Account {
    fn from(key: PublicKey) -> Self {
        Account(key.0)
    }
}

impl From<Account> for PublicKey {
    fn from(account: Account) -> Self {
        PublicKey(account.0)
    }
}

impl From<Account> for Root {
    fn from(account: Account) -> Self {
        Root(account.0)
    }
}

impl From<BlockHash> for Root {
    fn from(hash: BlockHash) -> Self {
        Root(hash.0)
    }
}

/// Identity of one account-chain position. Two blocks with the same
/// qualified root are forks of each other.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct QualifiedRoot {
    pub root: Root,
    pub previous: BlockHash,
}

impl QualifiedRoot {
    pub fn new(root: Root, previous: BlockHash) -> Self {
        Self { root, previous }
    }
}

impl Debug for QualifiedRoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.root, self.previous)
    }
}

impl Display for QualifiedRoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.root, self.previous)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; 64]);

impl Signature {
    pub fn new(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self([0; 64])
    }
}

impl Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", encode_hex(&self.0))
    }
}

impl serde::Serialize for Signature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode_hex(&self.0))
    }
}

/// Blake2b-256 digest builder for block and vote hashing
pub struct BlockHashBuilder {
    hasher: Blake2bVar,
}

impl Default for BlockHashBuilder {
    fn default() -> Self {
        Self {
            hasher: Blake2bVar::new(32).unwrap(),
        }
    }
}

impl BlockHashBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn update(mut self, data: impl AsRef<[u8]>) -> Self {
        self.hasher.update(data.as_ref());
        self
    }

    pub fn build(self) -> BlockHash {
        let mut digest = [0u8; 32];
        self.hasher.finalize_variable(&mut digest).unwrap();
        BlockHash::from_bytes(digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let hash = BlockHash::random();
        let decoded = BlockHash::decode_hex(hash.encode_hex()).unwrap();
        assert_eq!(decoded, hash);
    }

    #[test]
    fn from_u64_is_big_endian() {
        let hash = BlockHash::from(1);
        assert_eq!(hash.as_bytes()[31], 1);
        assert!(!hash.is_zero());
    }

    #[test]
    fn hash_builder_is_deterministic() {
        let a = BlockHashBuilder::new().update(b"lattice").build();
        let b = BlockHashBuilder::new().update(b"lattice").build();
        assert_eq!(a, b);
        assert_ne!(a, BlockHashBuilder::new().update(b"other").build());
    }

    #[test]
    fn qualified_root_distinguishes_previous() {
        let root = Root::from(Account::from(7));
        let a = QualifiedRoot::new(root, BlockHash::from(1));
        let b = QualifiedRoot::new(root, BlockHash::from(2));
        assert_ne!(a, b);
    }
}
