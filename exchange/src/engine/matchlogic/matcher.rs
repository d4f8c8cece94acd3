use std::sync::Arc;

use super::Settlement;
use crate::engine::data::{OrderStore, Store};
use crate::engine::entry::{OrderId, OrderSide, Trade};
use crate::engine::event::Notifier;
use crate::error::Result;
use crate::metrics;

/// Terminal state of one match attempt. None of them is an error.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    /// Settled against the oldest qualifying counter-order
    Matched(Box<Trade>),
    /// No counter-order, or the counter-order was taken concurrently
    StillOpen,
    /// The order was already filled or cancelled
    NotOpen,
}

impl MatchOutcome {
    fn label(&self) -> &'static str {
        match self {
            MatchOutcome::Matched(_) => "matched",
            MatchOutcome::StillOpen => "still_open",
            MatchOutcome::NotOpen => "not_open",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub matched: usize,
    pub failed: usize,
}

pub struct Matcher {
    store: Arc<Store>,
    settlement: Settlement,
}

impl Matcher {
    pub fn new(store: Arc<Store>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            settlement: Settlement::new(notifier),
        }
    }

    /// Try to fill `order_id` against the book. Safe to repeat: an order that
    /// is no longer open is left alone.
    pub fn match_order(&self, order_id: OrderId) -> Result<MatchOutcome> {
        match self.try_match(order_id) {
            Ok(outcome) => {
                metrics::MATCH_OUTCOME_VEC
                    .with_label_values(&[outcome.label()])
                    .inc();
                Ok(outcome)
            }
            Err(e) => {
                if e.is_fatal() {
                    log::error!("match of order {} rolled back: {}", order_id, e);
                }
                metrics::MATCH_OUTCOME_VEC.with_label_values(&["failed"]).inc();
                Err(e)
            }
        }
    }

    fn try_match(&self, order_id: OrderId) -> Result<MatchOutcome> {
        let mut uow = self.store.begin();

        let target = uow.lock_order(order_id)?.clone();
        if !target.is_open() {
            log::debug!("order {} is {}, skip", order_id, target.status);
            return Ok(MatchOutcome::NotOpen);
        }

        let candidate = match OrderStore::find_open_counter_order(&self.store, &target) {
            Some(candidate) => candidate,
            None => {
                log::debug!("no counter order for {}", order_id);
                return Ok(MatchOutcome::StillOpen);
            }
        };

        // May release and re-acquire the target to keep ascending id order,
        // so both rows are re-read below.
        uow.lock_order(candidate.id)?;
        if !uow.order(order_id)?.is_open() {
            log::debug!("order {} closed while locking {}", order_id, candidate.id);
            return Ok(MatchOutcome::NotOpen);
        }
        if !uow.order(candidate.id)?.is_open() {
            log::debug!("counter order {} taken concurrently", candidate.id);
            return Ok(MatchOutcome::StillOpen);
        }

        let (buy_id, sell_id) = match target.side {
            OrderSide::Buy => (target.id, candidate.id),
            OrderSide::Sell => (candidate.id, target.id),
        };
        let settled = self.settlement.settle(&mut uow, buy_id, sell_id)?;
        uow.commit();

        log::info!(
            "Trade executed buy_order_id={} sell_order_id={} symbol={} amount={} price={} trade_value={} commission={} buyer_total_payment={}",
            buy_id,
            sell_id,
            settled.trade.symbol,
            settled.trade.amount,
            settled.economics.trade_price,
            settled.economics.trade_value,
            settled.economics.commission,
            settled.economics.buyer_pays
        );
        metrics::TRADE_COUNTER_VEC
            .with_label_values(&[settled.trade.symbol.as_str()])
            .inc();
        self.settlement.publish(&settled.event);

        Ok(MatchOutcome::Matched(Box::new(settled.trade)))
    }

    /// One pass over every open order, oldest first. Each attempt is its own
    /// unit of work; a failure is counted and the pass moves on.
    pub fn sweep(&self) -> SweepReport {
        let mut open = self.store.open_orders();
        open.sort_by_key(|order| order.age_key());

        let mut report = SweepReport::default();
        for order in open {
            report.examined += 1;
            match self.match_order(order.id) {
                Ok(MatchOutcome::Matched(_)) => report.matched += 1,
                Ok(_) => {}
                Err(e) => {
                    log::warn!("sweep: order {} failed: {}", order.id, e);
                    report.failed += 1;
                }
            }
        }
        log::info!(
            "sweep done: examined={} matched={} failed={}",
            report.examined,
            report.matched,
            report.failed
        );
        report
    }
}
