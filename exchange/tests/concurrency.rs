use exchange::config::{DispatchMode, RuntimeConfig};
use exchange::{AccountId, LogNotifier, MatchEngine, MatchOutcome, OrderSide, OrderStatus, PlaceOrder, Symbol};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::{Arc, Barrier};
use std::thread;

fn engine(dispatch: DispatchMode) -> Arc<MatchEngine> {
    let config = RuntimeConfig {
        dispatch,
        ..RuntimeConfig::new()
    };
    Arc::new(MatchEngine::new(&config, Arc::new(LogNotifier)))
}

fn order(account_id: AccountId, side: &str, price: Decimal, amount: Decimal) -> PlaceOrder {
    PlaceOrder {
        account_id,
        symbol: "BTC".to_string(),
        side: side.to_string(),
        price,
        amount,
    }
}

#[test]
fn mutually_matching_orders_settle_once() {
    for _ in 0..50 {
        let engine = engine(DispatchMode::Off);
        let buyer = engine.open_account(dec!(1000)).unwrap();
        let seller = engine.open_account(dec!(0)).unwrap();
        engine.deposit_asset(seller, "BTC", dec!(1)).unwrap();
        let buy = engine.place_order(&order(buyer, "buy", dec!(100), dec!(1))).unwrap();
        let sell = engine.place_order(&order(seller, "sell", dec!(99), dec!(1))).unwrap();

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = [buy.id, sell.id]
            .into_iter()
            .map(|id| {
                let engine = engine.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    engine.match_order(id).unwrap()
                })
            })
            .collect();
        let outcomes: Vec<MatchOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let matched = outcomes
            .iter()
            .filter(|o| matches!(o, MatchOutcome::Matched(_)))
            .count();
        assert_eq!(matched, 1, "outcomes: {:?}", outcomes);
        assert_eq!(engine.trades().len(), 1);
        assert_eq!(engine.order(buy.id).unwrap().status, OrderStatus::Filled);
        assert_eq!(engine.order(sell.id).unwrap().status, OrderStatus::Filled);
        assert_eq!(engine.account(buyer).unwrap().usd_balance, dec!(1000) - dec!(100.485));
        assert_eq!(engine.account(seller).unwrap().usd_balance, dec!(99));
    }
}

#[test]
fn cancel_races_match() {
    for _ in 0..50 {
        let engine = engine(DispatchMode::Off);
        let buyer = engine.open_account(dec!(1000)).unwrap();
        let seller = engine.open_account(dec!(0)).unwrap();
        engine.deposit_asset(seller, "BTC", dec!(1)).unwrap();
        let buy = engine.place_order(&order(buyer, "buy", dec!(100), dec!(1))).unwrap();
        let sell = engine.place_order(&order(seller, "sell", dec!(100), dec!(1))).unwrap();

        let barrier = Arc::new(Barrier::new(2));
        let matching = {
            let engine = engine.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                engine.match_order(buy.id).unwrap()
            })
        };
        let cancelling = {
            let engine = engine.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                engine.cancel_order(sell.id)
            })
        };
        let outcome = matching.join().unwrap();
        let cancelled = cancelling.join().unwrap();

        let seller_account = engine.account(seller).unwrap();
        let btc = &seller_account.holdings[&Symbol::BTC];
        match (outcome, cancelled) {
            (MatchOutcome::Matched(_), Err(_)) => {
                assert_eq!(btc.free_amount + btc.locked_amount, dec!(0));
                assert_eq!(engine.order(sell.id).unwrap().status, OrderStatus::Filled);
            }
            (MatchOutcome::StillOpen, Ok(order)) => {
                assert_eq!(order.status, OrderStatus::Cancelled);
                assert_eq!(btc.free_amount, dec!(1));
                assert_eq!(btc.locked_amount, dec!(0));
                assert_eq!(engine.order(buy.id).unwrap().status, OrderStatus::Open);
                assert!(engine.trades().is_empty());
            }
            other => panic!("inconsistent race result: {:?}", other),
        }
    }
}

#[test]
fn concurrent_traders_conserve_value() {
    const TRADERS: usize = 8;
    const ROUNDS: usize = 200;
    let engine = engine(DispatchMode::Inline);
    let accounts: Vec<AccountId> = (0..TRADERS)
        .map(|_| {
            let id = engine.open_account(dec!(100000)).unwrap();
            engine.deposit_asset(id, "BTC", dec!(50)).unwrap();
            id
        })
        .collect();

    let handles: Vec<_> = accounts
        .iter()
        .enumerate()
        .map(|(i, account_id)| {
            let engine = engine.clone();
            let account_id = *account_id;
            thread::spawn(move || {
                for round in 0..ROUNDS {
                    let side = if (round + i) % 2 == 0 { "buy" } else { "sell" };
                    let price = Decimal::from(95 + ((round * 7 + i) % 10) as i64);
                    let amount = Decimal::from(1 + (round % 3) as i64);
                    if let Ok(placed) = engine.place_order(&order(account_id, side, price, amount)) {
                        if round % 5 == 0 {
                            let _ = engine.cancel_order(placed.id);
                        }
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    engine.run_match_sweep();

    let mut usd = Decimal::ZERO;
    let mut btc = Decimal::ZERO;
    for account_id in &accounts {
        let account = engine.account(*account_id).unwrap();
        assert!(account.usd_balance >= Decimal::ZERO);
        usd += account.usd_balance;
        for holding in account.holdings.values() {
            assert!(holding.free_amount >= Decimal::ZERO);
            assert!(holding.locked_amount >= Decimal::ZERO);
            btc += holding.free_amount + holding.locked_amount;
        }
    }
    let mut reserved = Decimal::ZERO;
    for account_id in &accounts {
        for order in engine.list_my_orders(*account_id) {
            if order.status == OrderStatus::Open && order.side == OrderSide::Buy {
                reserved += order.reserved_usd().unwrap();
            }
        }
    }
    let fees: Decimal = engine.trades().iter().map(|t| t.buyer_fee).sum();

    assert_eq!(usd + reserved + fees, dec!(100000) * Decimal::from(TRADERS as i64));
    assert_eq!(btc, dec!(50) * Decimal::from(TRADERS as i64));
}
