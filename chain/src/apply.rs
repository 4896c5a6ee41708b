//! State application: the unified apply protocol for transactions and blocks.
//!
//! `apply_unconfirmed` reserves a transaction's outflow against the sender's
//! unconfirmed balance and reports double spends; `apply` settles confirmed
//! balances and attachment effects; `apply_block` drives a whole accepted
//! block, crediting the block's fees to its generator.

use crate::account::AccountLedger;
use crate::alias::AliasLedger;
use crate::attachment::Attachment;
use crate::block::Block;
use crate::genesis;
use crate::transaction::Transaction;
use ignis_types::PublicKey;
use std::sync::Arc;
use tracing::warn;

pub struct TransactionApplier {
    accounts: Arc<AccountLedger>,
    aliases: Arc<AliasLedger>,
}

impl TransactionApplier {
    pub fn new(accounts: Arc<AccountLedger>, aliases: Arc<AliasLedger>) -> Self {
        Self { accounts, aliases }
    }

    pub fn accounts(&self) -> &Arc<AccountLedger> {
        &self.accounts
    }

    pub fn aliases(&self) -> &Arc<AliasLedger> {
        &self.aliases
    }

    fn total_outflow(tx: &Transaction) -> i64 {
        (tx.amount_nqt + tx.fee_nqt) as i64
    }

    /// Reserve the transaction's outflow against the sender's unconfirmed
    /// balance. Returns `false` on a double spend.
    pub fn apply_unconfirmed(&self, tx: &Transaction, height: u32) -> bool {
        self.accounts
            .add_to_unconfirmed(tx.sender_id(), -Self::total_outflow(tx), height)
    }

    /// Release a previously reserved outflow.
    pub fn undo_unconfirmed(&self, tx: &Transaction, height: u32) {
        self.accounts
            .add_to_unconfirmed(tx.sender_id(), Self::total_outflow(tx), height);
    }

    /// Settle the transaction's confirmed effects.
    pub fn apply(&self, tx: &Transaction, height: u32) {
        let sender = tx.sender_id();
        if let Err(e) = self
            .accounts
            .apply_public_key(sender, &tx.sender_public_key, height)
        {
            warn!(%sender, "ignoring sender key binding: {e}");
        }
        self.accounts
            .add_to_balance(sender, -Self::total_outflow(tx), height);

        if !tx.recipient_id.is_zero() {
            self.accounts
                .add_to_balance_and_unconfirmed(tx.recipient_id, tx.amount_nqt as i64, height);
        }
        if let Some(announcement) = &tx.public_key_announcement {
            if let Err(e) =
                self.accounts
                    .apply_public_key(tx.recipient_id, &announcement.public_key, height)
            {
                warn!(recipient = %tx.recipient_id, "ignoring announced key: {e}");
            }
        }
        if let Attachment::AliasAssignment { alias, uri } = &tx.attachment {
            self.aliases.set_alias(alias, sender, uri, height);
        }
    }

    /// Apply an accepted block: credit the generator with the block's fees,
    /// then settle every transaction in block order.
    pub fn apply_block(&self, block: &Block) {
        let generator = block.generator_id();
        if let Err(e) = self.accounts.apply_public_key(
            generator,
            &block.generator_public_key,
            block.height,
        ) {
            warn!(%generator, "ignoring generator key binding: {e}");
        }
        self.accounts.add_to_balance_and_unconfirmed(
            generator,
            block.total_fee_nqt as i64,
            block.height,
        );
        for tx in &block.transactions {
            self.apply(tx, block.height);
        }
    }

    /// Bind the genesis creator's public key (the bootstrap step of a full
    /// rescan, before the genesis block itself is replayed).
    pub fn bootstrap_creator(&self) {
        let creator = genesis::creator_id();
        if let Err(e) =
            self.accounts
                .apply_public_key(creator, &PublicKey(genesis::CREATOR_PUBLIC_KEY), 0)
        {
            warn!("ignoring creator key binding: {e}");
        }
    }

    /// Apply the genesis block on a fresh chain: creator key, unconfirmed
    /// reservations, and confirmed allocations.
    pub fn apply_genesis(&self, block: &Block) {
        self.bootstrap_creator();
        for tx in &block.transactions {
            // The creator is exempt from balance checks, so this cannot fail.
            self.apply_unconfirmed(tx, 0);
        }
        self.apply_block(block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::Attachment;
    use crate::transaction::TransactionBuilder;
    use ignis_crypto::{account_id_from_public_key, keypair_from_secret_phrase};
    use ignis_types::amount::{MAX_BALANCE_NQT, ONE_IGNIS};
    use ignis_types::{AccountId, ChainParams, Timestamp};

    fn applier() -> TransactionApplier {
        let accounts = Arc::new(AccountLedger::new(genesis::creator_id()));
        let aliases = Arc::new(AliasLedger::new());
        TransactionApplier::new(accounts, aliases)
    }

    fn payment(from_phrase: &str, to: AccountId, amount: u64) -> Transaction {
        let kp = keypair_from_secret_phrase(from_phrase);
        let mut tx = TransactionBuilder::new(
            1,
            kp.public,
            amount,
            ONE_IGNIS,
            Timestamp::new(100),
            60,
            Attachment::OrdinaryPayment,
        )
        .recipient_id(to)
        .build();
        tx.sign(&kp.secret);
        tx
    }

    #[test]
    fn genesis_application_balances_out() {
        let applier = applier();
        let genesis_block =
            genesis::create_genesis_block(&ChainParams::dev()).unwrap();
        applier.apply_genesis(&genesis_block);

        let creator = genesis::creator_id();
        assert_eq!(
            applier.accounts().balance_nqt(creator),
            -(MAX_BALANCE_NQT as i64)
        );
        let faucet = account_id_from_public_key(
            &keypair_from_secret_phrase(genesis::DEV_FAUCET_SECRET_PHRASE).public,
        );
        assert_eq!(
            applier.accounts().balance_nqt(faucet),
            MAX_BALANCE_NQT as i64
        );
    }

    #[test]
    fn double_spend_is_refused() {
        let applier = applier();
        let sender_kp = keypair_from_secret_phrase("poor sender");
        let sender = account_id_from_public_key(&sender_kp.public);
        applier
            .accounts()
            .add_to_balance_and_unconfirmed(sender, 3 * ONE_IGNIS as i64, 1);

        let tx = payment("poor sender", AccountId::new(99), 2 * ONE_IGNIS);
        assert!(applier.apply_unconfirmed(&tx, 2));
        // Second reservation exceeds the remaining unconfirmed balance.
        assert!(!applier.apply_unconfirmed(&tx, 2));

        applier.undo_unconfirmed(&tx, 2);
        assert_eq!(
            applier.accounts().unconfirmed_balance_nqt(sender),
            3 * ONE_IGNIS as i64
        );
    }

    #[test]
    fn apply_moves_confirmed_balances() {
        let applier = applier();
        let sender_kp = keypair_from_secret_phrase("rich sender");
        let sender = account_id_from_public_key(&sender_kp.public);
        let recipient = AccountId::new(77);
        applier
            .accounts()
            .add_to_balance_and_unconfirmed(sender, 10 * ONE_IGNIS as i64, 1);

        let tx = payment("rich sender", recipient, 4 * ONE_IGNIS);
        assert!(applier.apply_unconfirmed(&tx, 2));
        applier.apply(&tx, 2);

        assert_eq!(
            applier.accounts().balance_nqt(sender),
            5 * ONE_IGNIS as i64
        );
        assert_eq!(
            applier.accounts().balance_nqt(recipient),
            4 * ONE_IGNIS as i64
        );
    }

    #[test]
    fn alias_assignment_lands_in_ledger() {
        let applier = applier();
        let kp = keypair_from_secret_phrase("alias owner");
        let owner = account_id_from_public_key(&kp.public);
        applier
            .accounts()
            .add_to_balance_and_unconfirmed(owner, 2 * ONE_IGNIS as i64, 1);

        let mut tx = TransactionBuilder::new(
            1,
            kp.public,
            0,
            ONE_IGNIS,
            Timestamp::new(100),
            60,
            Attachment::AliasAssignment {
                alias: "treasury".into(),
                uri: "ignis://treasury".into(),
            },
        )
        .build();
        tx.sign(&kp.secret);

        applier.apply(&tx, 2);
        let entry = applier.aliases().alias("TREASURY").unwrap();
        assert_eq!(entry.owner, owner);
    }
}
