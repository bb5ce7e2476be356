//! NotificationGate: one alert per loss-to-profit transition.
//!
//! State machine per context:
//!
//! | previous | current | effect                                     |
//! |----------|---------|--------------------------------------------|
//! | loss     | profit  | fire the latch; alert if it was armed      |
//! | profit   | loss    | re-arm under `RearmOnLoss`, else nothing   |
//! | same     | same    | nothing                                    |
//!
//! Under `Acknowledge` the latch only re-arms when the user accepts the
//! alert of the current occasion through its [`AckHandle`].

use plwatch_core::{Classification, ContextKey, Pnl};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::alert::{AckHandle, Acknowledgement, Alert};
use crate::latch::{AlertLatch, RearmReason};

/// When a fired gate becomes armed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyPolicy {
    /// Re-arm as soon as the total is back in loss.
    #[default]
    #[serde(alias = "a")]
    RearmOnLoss,
    /// Re-arm only after the user accepts the alert.
    #[serde(alias = "b")]
    Acknowledge,
}

impl NotifyPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RearmOnLoss => "rearm_on_loss",
            Self::Acknowledge => "acknowledge",
        }
    }
}

impl std::fmt::Display for NotifyPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one evaluation.
#[derive(Debug, Clone)]
pub struct GateDecision {
    pub previous: Classification,
    pub current: Classification,
    /// Present only on an armed loss-to-profit edge.
    pub alert: Option<Alert>,
}

impl GateDecision {
    pub fn transitioned(&self) -> bool {
        self.previous != self.current
    }
}

pub struct NotificationGate {
    context: ContextKey,
    policy: NotifyPolicy,
    state: Classification,
    latch: AlertLatch,
    ack_tx: mpsc::UnboundedSender<Acknowledgement>,
    ack_rx: mpsc::UnboundedReceiver<Acknowledgement>,
}

impl NotificationGate {
    /// Create an armed gate in the loss state.
    pub fn new(context: ContextKey, policy: NotifyPolicy) -> Self {
        let (ack_tx, ack_rx) = mpsc::unbounded_channel();
        Self {
            context,
            policy,
            state: Classification::Loss,
            latch: AlertLatch::new(),
            ack_tx,
            ack_rx,
        }
    }

    pub fn context(&self) -> &ContextKey {
        &self.context
    }

    pub fn policy(&self) -> NotifyPolicy {
        self.policy
    }

    pub fn state(&self) -> Classification {
        self.state
    }

    pub fn is_armed(&self) -> bool {
        self.latch.is_armed()
    }

    /// Last occasion fired (0 if never).
    pub fn occasion(&self) -> u64 {
        self.latch.occasion()
    }

    /// Handle for answering the current occasion from outside the gate.
    pub fn ack_handle(&self) -> AckHandle {
        AckHandle::new(self.latch.occasion(), self.ack_tx.clone())
    }

    /// Feed one computed total through the state machine.
    pub fn evaluate(&mut self, total: Pnl) -> GateDecision {
        self.drain_acks();

        let previous = self.state;
        let current = total.classify();

        let alert = match (previous, current) {
            (Classification::Loss, Classification::Profit) => match self.latch.fire() {
                Some(occasion) => {
                    info!(
                        context = %self.context,
                        occasion,
                        total = %total,
                        "Turned profitable"
                    );
                    let ack = AckHandle::new(occasion, self.ack_tx.clone());
                    Some(Alert::turned_profitable(&self.context, occasion, total).with_ack(ack))
                }
                None => {
                    debug!(
                        context = %self.context,
                        occasion = self.latch.occasion(),
                        "Turned profitable while disarmed, alert suppressed"
                    );
                    None
                }
            },
            (Classification::Profit, Classification::Loss) => {
                if self.policy == NotifyPolicy::RearmOnLoss {
                    self.latch.rearm(RearmReason::ReturnedToLoss);
                }
                None
            }
            _ => None,
        };

        self.state = current;

        GateDecision {
            previous,
            current,
            alert,
        }
    }

    /// Re-arm regardless of policy. Returns `false` if already armed.
    pub fn rearm(&self) -> bool {
        self.latch.rearm(RearmReason::Manual)
    }

    fn drain_acks(&mut self) {
        while let Ok(ack) = self.ack_rx.try_recv() {
            let current = self.latch.occasion();
            if ack.occasion != current {
                debug!(
                    context = %self.context,
                    ack_occasion = ack.occasion,
                    current_occasion = current,
                    "Ignoring stale acknowledgment"
                );
                continue;
            }

            if ack.accepted {
                self.latch.rearm(RearmReason::Acknowledged {
                    occasion: ack.occasion,
                });
            } else {
                info!(context = %self.context, occasion = ack.occasion, "Alert dismissed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn gate(policy: NotifyPolicy) -> NotificationGate {
        NotificationGate::new(ContextKey::new("/trading/smart-orders/71994").unwrap(), policy)
    }

    fn pnl(v: Decimal) -> Pnl {
        Pnl::new(v)
    }

    /// Run a sequence of totals, returning the alerts fired.
    fn run(gate: &mut NotificationGate, totals: &[Decimal]) -> Vec<Alert> {
        totals
            .iter()
            .filter_map(|t| gate.evaluate(pnl(*t)).alert)
            .collect()
    }

    #[test]
    fn test_initial_state_is_armed_loss() {
        let gate = gate(NotifyPolicy::RearmOnLoss);
        assert_eq!(gate.state(), Classification::Loss);
        assert!(gate.is_armed());
        assert_eq!(gate.occasion(), 0);
    }

    #[test]
    fn test_first_profit_alerts() {
        let mut gate = gate(NotifyPolicy::RearmOnLoss);

        let decision = gate.evaluate(pnl(dec!(360)));

        assert!(decision.transitioned());
        let alert = decision.alert.unwrap();
        assert_eq!(alert.body, "Current profit: $360.00");
        assert_eq!(alert.occasion, 1);
        assert_eq!(alert.ack.as_ref().map(AckHandle::occasion), Some(1));
        assert!(!gate.is_armed());
    }

    #[test]
    fn test_repeated_profit_no_realert() {
        let mut gate = gate(NotifyPolicy::RearmOnLoss);
        let alerts = run(&mut gate, &[dec!(360), dec!(360), dec!(300), dec!(130)]);
        assert_eq!(alerts.len(), 1);
    }

    #[test]
    fn test_zero_is_loss() {
        let mut gate = gate(NotifyPolicy::RearmOnLoss);
        let decision = gate.evaluate(Pnl::ZERO);
        assert_eq!(decision.current, Classification::Loss);
        assert!(!decision.transitioned());
        assert!(decision.alert.is_none());
    }

    #[test]
    fn test_policy_rearm_on_loss_fires_twice() {
        let mut gate = gate(NotifyPolicy::RearmOnLoss);

        let alerts = run(&mut gate, &[dec!(-5), dec!(10), dec!(-5), dec!(10)]);

        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].occasion, 1);
        assert_eq!(alerts[1].occasion, 2);
        assert_eq!(alerts[0].dedupe_tag, alerts[1].dedupe_tag);
    }

    #[test]
    fn test_policy_acknowledge_stays_disarmed() {
        let mut gate = gate(NotifyPolicy::Acknowledge);

        let alerts = run(
            &mut gate,
            &[dec!(-5), dec!(10), dec!(-5), dec!(10), dec!(-1), dec!(1)],
        );

        assert_eq!(alerts.len(), 1);
        assert!(!gate.is_armed());
    }

    #[test]
    fn test_policy_acknowledge_rearms_after_accept() {
        let mut gate = gate(NotifyPolicy::Acknowledge);

        let alert = gate.evaluate(pnl(dec!(10))).alert.unwrap();
        gate.evaluate(pnl(dec!(-5)));
        alert.ack.unwrap().acknowledge(true).unwrap();

        // Ack is drained at the start of this evaluation.
        let second = gate.evaluate(pnl(dec!(10))).alert;
        assert_eq!(second.map(|a| a.occasion), Some(2));
    }

    #[test]
    fn test_policy_acknowledge_accept_while_in_profit() {
        let mut gate = gate(NotifyPolicy::Acknowledge);

        let alert = gate.evaluate(pnl(dec!(10))).alert.unwrap();
        alert.ack.unwrap().acknowledge(true).unwrap();

        // Still in profit: no new edge, no alert.
        assert!(gate.evaluate(pnl(dec!(12))).alert.is_none());
        assert!(gate.is_armed());

        assert!(gate.evaluate(pnl(dec!(-1))).alert.is_none());
        assert!(gate.evaluate(pnl(dec!(1))).alert.is_some());
    }

    #[test]
    fn test_dismiss_keeps_disarmed() {
        let mut gate = gate(NotifyPolicy::Acknowledge);

        let alert = gate.evaluate(pnl(dec!(10))).alert.unwrap();
        alert.ack.unwrap().acknowledge(false).unwrap();

        let alerts = run(&mut gate, &[dec!(-5), dec!(10)]);
        assert!(alerts.is_empty());
        assert!(!gate.is_armed());
    }

    #[test]
    fn test_stale_ack_ignored() {
        let mut gate = gate(NotifyPolicy::RearmOnLoss);

        let first = gate.evaluate(pnl(dec!(10))).alert.unwrap();
        gate.evaluate(pnl(dec!(-1)));
        let second = gate.evaluate(pnl(dec!(10))).alert.unwrap();
        assert_eq!(second.occasion, 2);

        // Answering occasion 1 must not re-arm occasion 2.
        first.ack.unwrap().acknowledge(true).unwrap();
        gate.evaluate(pnl(dec!(11)));
        assert!(!gate.is_armed());
    }

    #[test]
    fn test_manual_rearm() {
        let mut gate = gate(NotifyPolicy::Acknowledge);
        gate.evaluate(pnl(dec!(10)));
        assert!(gate.rearm());
        assert!(!gate.rearm());

        gate.evaluate(pnl(dec!(-1)));
        assert!(gate.evaluate(pnl(dec!(1))).alert.is_some());
    }

    #[test]
    fn test_ack_handle_from_gate_targets_current_occasion() {
        let mut gate = gate(NotifyPolicy::Acknowledge);
        gate.evaluate(pnl(dec!(10)));

        gate.ack_handle().acknowledge(true).unwrap();
        gate.evaluate(pnl(dec!(-1)));

        assert!(gate.is_armed());
    }

    #[test]
    fn test_policy_serde() {
        let a: NotifyPolicy = serde_json::from_str("\"a\"").unwrap();
        let b: NotifyPolicy = serde_json::from_str("\"acknowledge\"").unwrap();
        assert_eq!(a, NotifyPolicy::RearmOnLoss);
        assert_eq!(b, NotifyPolicy::Acknowledge);
        assert_eq!(serde_json::to_string(&a).unwrap(), "\"rearm_on_loss\"");
    }
}
