use crate::{
    Account, Amount, BlockHash, BlockHashBuilder, PrivateKey, PublicKey, QualifiedRoot, Root,
    Signature,
};

/// A state block on one account chain. The consensus engine only needs
/// identity (`hash`), chain position (`root` / `qualified_root`) and the
/// ability to rebroadcast the full block; validation against the ledger
/// happens before a block reaches this crate.
#[derive(Clone, PartialEq, Eq)]
pub struct Block {
    account: Account,
    previous: BlockHash,
    representative: PublicKey,
    balance: Amount,
    link: BlockHash,
    signature: Signature,
    work: u64,
    hash: BlockHash,
}

impl Block {
    pub fn new(
        account: Account,
        previous: BlockHash,
        representative: PublicKey,
        balance: Amount,
        link: BlockHash,
        key: &PrivateKey,
        work: u64,
    ) -> Self {
        let hash = Self::hash_parts(&account, &previous, &representative, &balance, &link);
        let signature = key.sign(hash.as_bytes());
        Self {
            account,
            previous,
            representative,
            balance,
            link,
            signature,
            work,
            hash,
        }
    }

    fn hash_parts(
        account: &Account,
        previous: &BlockHash,
        representative: &PublicKey,
        balance: &Amount,
        link: &BlockHash,
    ) -> BlockHash {
        BlockHashBuilder::new()
            .update(account.as_bytes())
            .update(previous.as_bytes())
            .update(representative.as_bytes())
            .update(balance.number().to_be_bytes())
            .update(link.as_bytes())
            .build()
    }

    pub fn hash(&self) -> BlockHash {
        self.hash
    }

    pub fn account(&self) -> Account {
        self.account
    }

    pub fn previous(&self) -> BlockHash {
        self.previous
    }

    pub fn representative(&self) -> PublicKey {
        self.representative
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    pub fn link(&self) -> BlockHash {
        self.link
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn work(&self) -> u64 {
        self.work
    }

    /// An open block is rooted in its account, every other block in its
    /// predecessor
    pub fn root(&self) -> Root {
        if self.previous.is_zero() {
            self.account.into()
        } else {
            self.previous.into()
        }
    }

    pub fn qualified_root(&self) -> QualifiedRoot {
        QualifiedRoot::new(self.root(), self.previous)
    }

    pub fn new_test_instance() -> Self {
        let key = PrivateKey::from_bytes(&[42; 32]);
        Self::new(
            key.account(),
            BlockHash::from(1),
            key.public_key(),
            Amount::raw(1_000_000),
            BlockHash::from(2),
            &key,
            424269420,
        )
    }
}

impl std::fmt::Debug for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Block")
            .field("hash", &self.hash)
            .field("account", &self.account)
            .field("previous", &self.previous)
            .field("balance", &self.balance)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_block_roots_in_account() {
        let key = PrivateKey::new();
        let block = Block::new(
            key.account(),
            BlockHash::zero(),
            key.public_key(),
            Amount::raw(100),
            BlockHash::from(3),
            &key,
            0,
        );
        assert_eq!(block.root(), key.account().into());
    }

    #[test]
    fn successor_block_roots_in_previous() {
        let block = Block::new_test_instance();
        assert_eq!(block.root(), block.previous().into());
    }

    #[test]
    fn forks_share_qualified_root() {
        let key = PrivateKey::new();
        let previous = BlockHash::from(7);
        let fork1 = Block::new(
            key.account(),
            previous,
            key.public_key(),
            Amount::raw(10),
            BlockHash::zero(),
            &key,
            0,
        );
        let fork2 = Block::new(
            key.account(),
            previous,
            key.public_key(),
            Amount::raw(20),
            BlockHash::zero(),
            &key,
            0,
        );
        assert_ne!(fork1.hash(), fork2.hash());
        assert_eq!(fork1.qualified_root(), fork2.qualified_root());
    }
}
