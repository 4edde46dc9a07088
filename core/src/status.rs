use crate::types::{Order, Status};

/// Pure projection of an order's swap facts onto the canonical status table.
///
/// This is the *only* place order status is computed anywhere in this
/// workspace — watchers and executors call this function rather than
/// re-deriving status from their own local view of events, which is what
/// keeps the projection idempotent and monotone (Invariant 3, Testable
/// Property 1).
pub fn project(order: &Order) -> Status {
    let src = &order.source_swap;
    let dst = &order.destination_swap;

    if src.is_refunded() || dst.is_refunded() {
        return Status::Refunded;
    }

    if src.is_redeemed() {
        return Status::Completed;
    }

    // Bitcoin sources have no "redeem" of their own in this system: once the
    // destination has been redeemed, the counterparty's only remaining source
    // action is a Bitcoin-specific claim out of scope for the EVM executor.
    // The projection still reports `completed` once destination is redeemed
    // and the source chain is Bitcoin, matching the spec's status table
    // ("completed: source redeem_tx_hash set (or Bitcoin source and
    // destination redeemed)").
    if dst.is_redeemed() && src.chain.as_str().starts_with("bitcoin") {
        return Status::Completed;
    }

    if dst.is_redeemed() {
        return Status::CounterPartyRedeemed;
    }

    if src.is_initiated() && dst.is_initiated() {
        return Status::CounterPartyInitiated;
    }

    if dst.is_initiated() {
        return Status::Redeeming;
    }

    if src.is_confirmed() {
        return Status::DepositConfirmed;
    }

    if src.is_initiated() {
        return Status::DepositDetected;
    }

    Status::Created
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AssetKey, ChainId, CreateOrder, SecretHash, Swap};

    fn empty_swap(chain: &str) -> Swap {
        Swap {
            swap_id: "swap".into(),
            chain: ChainId::from(chain),
            asset: "btc".into(),
            htlc_address: "addr".into(),
            token_address: "".into(),
            initiator: "i".into(),
            redeemer: "r".into(),
            deposit_address: None,
            amount: crate::types::Amount::from_u64(1000),
            filled_amount: crate::types::Amount::zero(),
            timelock: 100,
            secret_hash: SecretHash([1u8; 32]),
            secret: None,
            initiate_tx_hash: None,
            redeem_tx_hash: None,
            refund_tx_hash: None,
            initiate_block_number: None,
            redeem_block_number: None,
            refund_block_number: None,
        }
    }

    fn base_order() -> Order {
        Order {
            create_id: "cid".into(),
            create_order: CreateOrder {
                from: AssetKey::parse("bitcoin_testnet:btc").unwrap(),
                to: AssetKey::parse("avalanche_testnet:avax").unwrap(),
                source_amount: crate::types::Amount::from_u64(1000),
                destination_amount: crate::types::Amount::from_u64(1000),
                nonce: 1,
                initiator_source_address: "a".into(),
                initiator_destination_address: "b".into(),
                secret_hash: SecretHash([1u8; 32]),
                bitcoin_optional_recipient: None,
                created_at: chrono::Utc::now(),
                input_token_price: None,
                output_token_price: None,
            },
            source_swap: empty_swap("bitcoin_testnet"),
            destination_swap: empty_swap("avalanche_testnet"),
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn created_when_no_source_tx() {
        let order = base_order();
        assert_eq!(project(&order), Status::Created);
    }

    #[test]
    fn deposit_detected_when_source_tx_unconfirmed() {
        let mut order = base_order();
        order.source_swap.initiate_tx_hash = Some("tx1".into());
        assert_eq!(project(&order), Status::DepositDetected);
    }

    #[test]
    fn deposit_confirmed_when_source_block_set() {
        let mut order = base_order();
        order.source_swap.initiate_tx_hash = Some("tx1".into());
        order.source_swap.initiate_block_number = Some(10);
        assert_eq!(project(&order), Status::DepositConfirmed);
    }

    #[test]
    fn counter_party_initiated_when_both_sides_initiated() {
        let mut order = base_order();
        order.source_swap.initiate_tx_hash = Some("tx1".into());
        order.source_swap.initiate_block_number = Some(10);
        order.destination_swap.initiate_tx_hash = Some("tx2".into());
        assert_eq!(project(&order), Status::CounterPartyInitiated);
    }

    #[test]
    fn redeeming_tracks_destination_initiate_without_redeem() {
        let mut order = base_order();
        order.destination_swap.initiate_tx_hash = Some("tx2".into());
        assert_eq!(project(&order), Status::Redeeming);
    }

    #[test]
    fn counter_party_redeemed_for_evm_source_awaits_source_redeem() {
        let mut order = base_order();
        order.source_swap.chain = ChainId::from("arbitrum_sepolia");
        order.destination_swap.redeem_tx_hash = Some("tx3".into());
        assert_eq!(project(&order), Status::CounterPartyRedeemed);
    }

    #[test]
    fn completed_when_bitcoin_source_and_destination_redeemed() {
        let mut order = base_order();
        order.destination_swap.redeem_tx_hash = Some("tx3".into());
        assert_eq!(project(&order), Status::Completed);
    }

    #[test]
    fn completed_when_source_redeemed() {
        let mut order = base_order();
        order.source_swap.redeem_tx_hash = Some("tx4".into());
        assert_eq!(project(&order), Status::Completed);
    }

    #[test]
    fn refunded_takes_priority_over_all_other_facts() {
        let mut order = base_order();
        order.source_swap.redeem_tx_hash = Some("tx4".into());
        order.destination_swap.refund_tx_hash = Some("tx5".into());
        assert_eq!(project(&order), Status::Refunded);
    }

    #[test]
    fn status_ordering_is_monotone() {
        let ordering = [
            Status::Created,
            Status::DepositDetected,
            Status::DepositConfirmed,
            Status::CounterPartyInitiated,
            Status::Redeeming,
            Status::CounterPartyRedeemed,
            Status::Completed,
        ];
        for w in ordering.windows(2) {
            assert!(w[0] < w[1], "{:?} should precede {:?}", w[0], w[1]);
        }
    }

    #[test]
    fn projection_is_idempotent() {
        let mut order = base_order();
        order.source_swap.initiate_tx_hash = Some("tx1".into());
        let first = project(&order);
        let second = project(&order);
        assert_eq!(first, second);
    }
}
