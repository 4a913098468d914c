use crate::errors::PipelineError;
use crate::models::CostEvent;
use crate::sources::CostSink;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Handle returned by `reserve`; must be either committed or released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationId(Uuid);

#[derive(Debug)]
struct Reservation {
    source: String,
    amount_cents: u64,
}

#[derive(Debug)]
struct LedgerState {
    spent_cents: u64,
    reserved_cents: u64,
    reservations: HashMap<Uuid, Reservation>,
}

/// Tracks spend against a fixed campaign budget with a two-phase
/// reserve/commit/release protocol.
///
/// Every paid call must `reserve` before dispatch and then either `commit`
/// (with the real billed cost) or `release`. The invariant
/// `spent + reserved <= budget` holds at every observation point; no caller
/// may read "remaining" and act on it without an atomic reserve.
pub struct CostLedger {
    budget_cents: u64,
    state: Mutex<LedgerState>,
    cost_sink: Option<Arc<dyn CostSink>>,
}

impl CostLedger {
    pub fn new(budget_cents: u64, cost_sink: Option<Arc<dyn CostSink>>) -> Self {
        Self {
            budget_cents,
            state: Mutex::new(LedgerState {
                spent_cents: 0,
                reserved_cents: 0,
                reservations: HashMap::new(),
            }),
            cost_sink,
        }
    }

    /// Atomically set aside `amount_cents` for a pending call. Fails iff the
    /// reservation would push `spent + reserved` past the budget.
    pub fn reserve(
        &self,
        source: &str,
        amount_cents: u64,
    ) -> Result<ReservationId, PipelineError> {
        let mut state = self.state.lock().expect("ledger lock poisoned");
        let committed_or_pending = state.spent_cents + state.reserved_cents;
        // checked_add: an absurd estimate must refuse, not wrap past the cap.
        let fits = committed_or_pending
            .checked_add(amount_cents)
            .map(|total| total <= self.budget_cents)
            .unwrap_or(false);
        if !fits {
            return Err(PipelineError::BudgetExceeded {
                requested_cents: amount_cents,
                available_cents: self.budget_cents - committed_or_pending,
            });
        }

        let id = Uuid::new_v4();
        state.reserved_cents += amount_cents;
        state.reservations.insert(
            id,
            Reservation {
                source: source.to_string(),
                amount_cents,
            },
        );
        tracing::debug!(source, amount_cents, "Reserved budget");
        Ok(ReservationId(id))
    }

    /// Settle a reservation with the real billed cost, which may differ from
    /// the estimate. Spend is clamped so the budget invariant holds even when
    /// a source over-bills; the discrepancy is logged for the accounting
    /// collaborator to reconcile.
    pub fn commit(&self, id: ReservationId, actual_cents: u64) -> Result<(), PipelineError> {
        let event = {
            let mut state = self.state.lock().expect("ledger lock poisoned");
            let reservation = state
                .reservations
                .remove(&id.0)
                .ok_or(PipelineError::ReservationNotFound(id.0))?;
            state.reserved_cents -= reservation.amount_cents;

            let headroom = self.budget_cents - state.spent_cents - state.reserved_cents;
            let charged = if actual_cents > headroom {
                tracing::warn!(
                    source = %reservation.source,
                    actual_cents,
                    headroom,
                    "Source billed past remaining budget; spend clamped"
                );
                headroom
            } else {
                actual_cents
            };
            state.spent_cents += charged;

            tracing::debug!(
                source = %reservation.source,
                reserved = reservation.amount_cents,
                charged,
                "Committed spend"
            );
            CostEvent {
                source: reservation.source,
                amount_cents: charged,
                at: Utc::now(),
            }
        };

        if let Some(sink) = &self.cost_sink {
            sink.record(&event);
        }
        Ok(())
    }

    /// Return a reservation unspent (call failed or was skipped).
    pub fn release(&self, id: ReservationId) -> Result<(), PipelineError> {
        let mut state = self.state.lock().expect("ledger lock poisoned");
        let reservation = state
            .reservations
            .remove(&id.0)
            .ok_or(PipelineError::ReservationNotFound(id.0))?;
        state.reserved_cents -= reservation.amount_cents;
        tracing::debug!(
            source = %reservation.source,
            amount_cents = reservation.amount_cents,
            "Released reservation"
        );
        Ok(())
    }

    pub fn budget_cents(&self) -> u64 {
        self.budget_cents
    }

    pub fn spent_cents(&self) -> u64 {
        self.state.lock().expect("ledger lock poisoned").spent_cents
    }

    pub fn reserved_cents(&self) -> u64 {
        self.state
            .lock()
            .expect("ledger lock poisoned")
            .reserved_cents
    }

    /// Budget not yet spent or reserved.
    pub fn remaining_cents(&self) -> u64 {
        let state = self.state.lock().expect("ledger lock poisoned");
        self.budget_cents - state.spent_cents - state.reserved_cents
    }

    /// True once nothing can be reserved at all.
    pub fn is_exhausted(&self) -> bool {
        self.remaining_cents() == 0
    }

    /// True when `amount_cents` could currently be reserved. Advisory only;
    /// callers still go through `reserve` before spending.
    pub fn can_afford(&self, amount_cents: u64) -> bool {
        self.remaining_cents() >= amount_cents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger(budget: u64) -> CostLedger {
        CostLedger::new(budget, None)
    }

    #[test]
    fn reserve_fails_past_budget() {
        let l = ledger(100);
        let r1 = l.reserve("lookup-a", 60).unwrap();
        assert!(matches!(
            l.reserve("lookup-b", 50),
            Err(PipelineError::BudgetExceeded { .. })
        ));
        l.release(r1).unwrap();
        assert!(l.reserve("lookup-b", 50).is_ok());
    }

    #[test]
    fn commit_uses_actual_cost() {
        let l = ledger(100);
        let r = l.reserve("lookup-a", 40).unwrap();
        l.commit(r, 35).unwrap();
        assert_eq!(l.spent_cents(), 35);
        assert_eq!(l.reserved_cents(), 0);
        assert_eq!(l.remaining_cents(), 65);
    }

    #[test]
    fn overbilled_commit_is_clamped() {
        let l = ledger(100);
        let r = l.reserve("lookup-a", 90).unwrap();
        l.commit(r, 150).unwrap();
        assert_eq!(l.spent_cents(), 100);
        assert_eq!(l.remaining_cents(), 0);
        assert!(l.is_exhausted());
    }

    #[test]
    fn absurd_reservation_refused_without_overflow() {
        let l = ledger(100);
        let _held = l.reserve("lookup-a", 60).unwrap();
        assert!(matches!(
            l.reserve("lookup-b", u64::MAX),
            Err(PipelineError::BudgetExceeded {
                available_cents: 40,
                ..
            })
        ));
        assert_eq!(l.spent_cents(), 0);
        assert_eq!(l.reserved_cents(), 60);
    }

    #[test]
    fn double_commit_rejected() {
        let l = ledger(100);
        let r = l.reserve("lookup-a", 10).unwrap();
        l.commit(r, 10).unwrap();
        assert!(matches!(
            l.commit(r, 10),
            Err(PipelineError::ReservationNotFound(_))
        ));
    }

    #[test]
    fn invariant_holds_across_mixed_operations() {
        let l = ledger(100);
        let mut open = Vec::new();
        for i in 0..20 {
            match l.reserve("src", 15) {
                Ok(r) => open.push((i, r)),
                Err(_) => break,
            }
            assert!(l.spent_cents() + l.reserved_cents() <= 100);
        }
        for (i, r) in open {
            if i % 2 == 0 {
                l.commit(r, 15).unwrap();
            } else {
                l.release(r).unwrap();
            }
            assert!(l.spent_cents() + l.reserved_cents() <= 100);
        }
    }
}
