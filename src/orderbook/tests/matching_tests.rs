//! Matching semantics: crossing, price-time priority, maker pricing,
//! self-match rejection, trading windows and contract isolation.

#[cfg(test)]
mod tests {
    use crate::error::ExchangeError;
    use crate::orderbook::{OrderStatus, Side};
    use crate::orderbook::tests::test_helpers::{
        Rig, contract, next_contract, now_in_window,
    };

    // -----------------------------------------------------------------------
    // Literal scenarios
    // -----------------------------------------------------------------------

    #[test]
    fn test_exact_match_clears_both_sides() {
        let mut rig = Rig::new();
        rig.submit("a", Side::Sell, 150, 1000).expect("sell");
        let buy = rig.submit("b", Side::Buy, 150, 1000).expect("buy");

        assert_eq!(buy.status, OrderStatus::Filled);
        assert_eq!(buy.filled_quantity, 1000);
        assert_eq!(rig.trades.len(), 1);
        let trade = &rig.trades[0];
        assert_eq!(trade.price, 150);
        assert_eq!(trade.quantity, 1000);
        assert_eq!(trade.seller, "a");
        assert_eq!(trade.buyer, "b");

        let (bids, asks) = rig.levels();
        assert!(bids.is_empty());
        assert!(asks.is_empty());
    }

    #[test]
    fn test_price_improvement_trades_at_maker_price() {
        let mut rig = Rig::new();
        rig.submit("a", Side::Sell, 150, 500).expect("sell");
        let buy = rig.submit("b", Side::Buy, 155, 500).expect("buy");

        assert_eq!(buy.filled_quantity, 500);
        assert_eq!(rig.trades.len(), 1);
        // Taker pays the resting price, keeping the improvement.
        assert_eq!(rig.trades[0].price, 150);

        let (bids, asks) = rig.levels();
        assert!(bids.is_empty());
        assert!(asks.is_empty());
    }

    #[test]
    fn test_partial_fill_rests_residual() {
        let mut rig = Rig::new();
        rig.submit("a", Side::Sell, 150, 500).expect("sell");
        let buy = rig.submit("b", Side::Buy, 150, 1200).expect("buy");

        assert_eq!(buy.filled_quantity, 500);
        assert_eq!(rig.trades.len(), 1);
        assert_eq!(rig.trades[0].quantity, 500);

        let (bids, asks) = rig.levels();
        assert!(asks.is_empty());
        assert_eq!(bids.len(), 1);
        assert_eq!(bids[0].owner, "b");
        assert_eq!(bids[0].side, Side::Buy);
        assert_eq!(bids[0].price, 150);
        assert_eq!(bids[0].remaining_quantity, 700);
        assert_eq!(bids[0].original_quantity, 1200);
    }

    #[test]
    fn test_multi_level_fifo_sweep() {
        let t = now_in_window();
        let mut rig = Rig::new();
        rig.submit_at("a", Side::Sell, 148, 400, t + 1).expect("s1");
        rig.submit_at("a", Side::Sell, 148, 300, t + 2).expect("s2");
        rig.submit_at("a", Side::Sell, 150, 500, t + 3).expect("s3");

        let buy = rig.submit_at("b", Side::Buy, 150, 1000, t + 4).expect("buy");
        assert_eq!(buy.filled_quantity, 1000);
        assert_eq!(buy.status, OrderStatus::Filled);

        let fills: Vec<(i64, i64)> = rig.trades.iter().map(|t| (t.quantity, t.price)).collect();
        assert_eq!(fills, vec![(400, 148), (300, 148), (300, 150)]);

        let (bids, asks) = rig.levels();
        assert!(bids.is_empty());
        assert_eq!(asks.len(), 1);
        assert_eq!(asks[0].price, 150);
        assert_eq!(asks[0].remaining_quantity, 200);
    }

    #[test]
    fn test_self_match_rejected_leaves_book_unchanged() {
        let mut rig = Rig::new();
        let sell = rig.submit("a", Side::Sell, 150, 100).expect("sell");

        let buy = rig.submit("a", Side::Buy, 150, 100);
        assert_eq!(buy, Err(ExchangeError::SelfMatch));
        assert!(rig.trades.is_empty());

        let (bids, asks) = rig.levels();
        assert!(bids.is_empty());
        assert_eq!(asks.len(), 1);
        assert_eq!(asks[0].order_id, sell.order_id);
        assert_eq!(asks[0].remaining_quantity, 100);
    }

    // -----------------------------------------------------------------------
    // Priority and consumption order
    // -----------------------------------------------------------------------

    #[test]
    fn test_same_price_first_in_first_consumed() {
        let t = now_in_window();
        let mut rig = Rig::new();
        rig.submit_at("a", Side::Sell, 150, 100, t + 1).expect("s1");
        rig.submit_at("b", Side::Sell, 150, 100, t + 2).expect("s2");

        rig.submit_at("c", Side::Buy, 150, 100, t + 3).expect("buy");
        assert_eq!(rig.trades.len(), 1);
        assert_eq!(rig.trades[0].seller, "a");

        // The later sell is still resting.
        let (_, asks) = rig.levels();
        assert_eq!(asks.len(), 1);
        assert_eq!(asks[0].owner, "b");
    }

    #[test]
    fn test_better_price_beats_earlier_arrival() {
        let t = now_in_window();
        let mut rig = Rig::new();
        rig.submit_at("a", Side::Sell, 151, 100, t + 1).expect("s1");
        rig.submit_at("b", Side::Sell, 149, 100, t + 2).expect("s2");

        rig.submit_at("c", Side::Buy, 151, 100, t + 3).expect("buy");
        assert_eq!(rig.trades.len(), 1);
        assert_eq!(rig.trades[0].seller, "b");
        assert_eq!(rig.trades[0].price, 149);
    }

    #[test]
    fn test_self_match_probe_respects_consumption_order() {
        // a's own sell sits behind enough foreign liquidity that the buy
        // never reaches it: not a self-match.
        let t = now_in_window();
        let mut rig = Rig::new();
        rig.submit_at("b", Side::Sell, 149, 100, t + 1).expect("s1");
        rig.submit_at("a", Side::Sell, 150, 100, t + 2).expect("s2");

        let buy = rig
            .submit_at("a", Side::Buy, 150, 100, t + 3)
            .expect("buy consumes only b's order");
        assert_eq!(buy.filled_quantity, 100);
        assert_eq!(rig.trades.len(), 1);
        assert_eq!(rig.trades[0].seller, "b");

        // a's sell must be untouched.
        let (_, asks) = rig.levels();
        assert_eq!(asks.len(), 1);
        assert_eq!(asks[0].owner, "a");
    }

    #[test]
    fn test_self_match_probe_detects_reachable_own_order() {
        let t = now_in_window();
        let mut rig = Rig::new();
        rig.submit_at("b", Side::Sell, 149, 100, t + 1).expect("s1");
        rig.submit_at("a", Side::Sell, 150, 100, t + 2).expect("s2");

        // Quantity 150 would reach a's own sell after consuming b's 100.
        let buy = rig.submit_at("a", Side::Buy, 150, 150, t + 3);
        assert_eq!(buy, Err(ExchangeError::SelfMatch));
        // Probe-only: nothing traded, not even the safe prefix.
        assert!(rig.trades.is_empty());
    }

    #[test]
    fn test_negative_prices_trade() {
        let mut rig = Rig::new();
        rig.submit("a", Side::Sell, -25, 100).expect("sell");
        let buy = rig.submit("b", Side::Buy, -20, 100).expect("buy");
        assert_eq!(buy.filled_quantity, 100);
        assert_eq!(rig.trades[0].price, -25);
    }

    // -----------------------------------------------------------------------
    // Status reporting
    // -----------------------------------------------------------------------

    #[test]
    fn test_unmatched_order_reports_active() {
        let mut rig = Rig::new();
        let sell = rig.submit("a", Side::Sell, 150, 100).expect("sell");
        assert_eq!(sell.status, OrderStatus::Active);
        assert_eq!(sell.filled_quantity, 0);
    }

    #[test]
    fn test_partial_fill_reports_filled_for_compatibility() {
        // Compatibility quirk kept on purpose: a partially matched order
        // reports FILLED even though its residual rests ACTIVE in the book.
        let mut rig = Rig::new();
        rig.submit("a", Side::Sell, 150, 500).expect("sell");
        let buy = rig.submit("b", Side::Buy, 150, 1200).expect("buy");

        assert_eq!(buy.status, OrderStatus::Filled);
        assert_eq!(buy.filled_quantity, 500);
        let resting = rig.book.get(&buy.order_id).expect("resting residual");
        assert_eq!(resting.status, OrderStatus::Active);
    }

    #[test]
    fn test_conservation_per_submission() {
        let mut rig = Rig::new();
        rig.submit("a", Side::Sell, 150, 300).expect("sell");
        let buy = rig.submit("b", Side::Buy, 150, 1000).expect("buy");

        let produced: i64 = rig.trades.iter().map(|t| t.quantity).sum();
        assert!(produced <= 1000);
        assert_eq!(produced, buy.filled_quantity);
    }

    // -----------------------------------------------------------------------
    // Validation, windows, isolation
    // -----------------------------------------------------------------------

    #[test]
    fn test_zero_quantity_rejected() {
        let mut rig = Rig::new();
        assert!(matches!(
            rig.submit("a", Side::Sell, 150, 0),
            Err(ExchangeError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_submission_before_window_opens() {
        let mut rig = Rig::new();
        let early = contract().trading_open() - 1;
        assert_eq!(
            rig.submit_at("a", Side::Sell, 150, 100, early),
            Err(ExchangeError::TooEarly)
        );
    }

    #[test]
    fn test_submission_after_window_closes() {
        let mut rig = Rig::new();
        let late = contract().trading_close() + 1;
        assert_eq!(
            rig.submit_at("a", Side::Sell, 150, 100, late),
            Err(ExchangeError::TooLate)
        );
    }

    #[test]
    fn test_matching_never_crosses_contracts() {
        let mut rig = Rig::new();
        rig.submit_in("a", Side::Sell, 150, 100, contract(), now_in_window())
            .expect("sell");
        let buy = rig
            .submit_in("b", Side::Buy, 150, 100, next_contract(), now_in_window())
            .expect("buy");

        assert_eq!(buy.status, OrderStatus::Active);
        assert!(rig.trades.is_empty());
        // Each contract holds its own order.
        let (_, asks) = rig.book.levels(contract(), now_in_window());
        let (bids, _) = rig.book.levels(next_contract(), now_in_window());
        assert_eq!(asks.len(), 1);
        assert_eq!(bids.len(), 1);
    }

    #[test]
    fn test_cancel_removes_from_book() {
        let mut rig = Rig::new();
        let sell = rig.submit("a", Side::Sell, 150, 100).expect("sell");
        rig.book.cancel("a", sell.order_id).expect("cancel");

        let (_, asks) = rig.levels();
        assert!(asks.is_empty());
        let order = rig.book.get(&sell.order_id).expect("still tracked");
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.remaining_quantity, 0);

        // Terminal orders reject cancel and look absent.
        assert!(matches!(
            rig.book.cancel("a", sell.order_id),
            Err(ExchangeError::NotFound(_))
        ));
    }

    #[test]
    fn test_cancel_owner_mismatch_forbidden() {
        let mut rig = Rig::new();
        let sell = rig.submit("a", Side::Sell, 150, 100).expect("sell");
        assert_eq!(
            rig.book.cancel("b", sell.order_id),
            Err(ExchangeError::Forbidden)
        );
    }

    #[test]
    fn test_cancelled_liquidity_not_consumed() {
        let t = now_in_window();
        let mut rig = Rig::new();
        let s1 = rig.submit_at("a", Side::Sell, 150, 100, t + 1).expect("s1");
        rig.submit_at("b", Side::Sell, 150, 100, t + 2).expect("s2");
        rig.book.cancel("a", s1.order_id).expect("cancel");

        rig.submit_at("c", Side::Buy, 150, 100, t + 3).expect("buy");
        assert_eq!(rig.trades.len(), 1);
        assert_eq!(rig.trades[0].seller, "b");
    }

    #[test]
    fn test_book_outside_window_reads_empty() {
        let mut rig = Rig::new();
        rig.submit("a", Side::Sell, 150, 100).expect("sell");
        let after_close = contract().trading_close() + 1;
        let (bids, asks) = rig.book.levels(contract(), after_close);
        assert!(bids.is_empty());
        assert!(asks.is_empty());
    }

    #[test]
    fn test_my_active_newest_first() {
        let t = now_in_window();
        let mut rig = Rig::new();
        let first = rig.submit_at("a", Side::Sell, 150, 10, t + 1).expect("s1");
        let second = rig.submit_at("a", Side::Sell, 151, 10, t + 2).expect("s2");
        rig.submit_at("b", Side::Sell, 152, 10, t + 3).expect("other owner");

        let mine = rig.book.my_active("a");
        let ids: Vec<_> = mine.iter().map(|o| o.order_id).collect();
        assert_eq!(ids, vec![second.order_id, first.order_id]);
    }
}
