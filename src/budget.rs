use crate::calculator::ClientBilling;
use crate::schema::BillingConfig;
use crate::utils::BillingPeriod;
use log::{debug, warn};
use std::collections::BTreeMap;

/// Remaining budget per client. Read at run start, never mutated in place;
/// the tracker returns a new state that the operator persists for the next
/// run. Re-running a period can therefore never deduct twice.
pub type BudgetState = BTreeMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertState {
    Ok,
    Alert,
}

/// Everything the report needs about one client for one period.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientPeriodSummary {
    pub client: String,
    pub hours: f64,
    pub rate: Option<f64>,
    pub billed: Option<f64>,
    pub starting_remaining: f64,
    pub ending_remaining: f64,
    /// None when the rate is missing and no amount could be computed.
    pub burn_rate: Option<f64>,
    /// None when there is no burn to project against.
    pub months_remaining: Option<f64>,
    pub alert: AlertState,
}

#[derive(Debug, Clone)]
pub struct TrackerOutput {
    pub summaries: Vec<ClientPeriodSummary>,
    /// Proposed remaining-budget state after this period. Clients with no
    /// activity this period are carried forward unchanged.
    pub new_state: BudgetState,
}

/// Applies this period's billed amounts to the remaining-budget state and
/// projects depletion. `new_remaining = old_remaining - billed`, exactly,
/// with rounding deferred to the report boundary. Clients absent from the
/// starting state begin at 0.0.
pub fn track_budgets(
    billings: &[ClientBilling],
    config: &BillingConfig,
    period: BillingPeriod,
) -> TrackerOutput {
    let mut new_state = config.remaining_budget.clone();
    let mut summaries = Vec::with_capacity(billings.len());

    for billing in billings {
        let starting = config
            .remaining_budget
            .get(&billing.client)
            .copied()
            .unwrap_or(0.0);

        let (ending, burn_rate, months_remaining) = match billing.billed {
            Some(amount) => {
                let ending = starting - amount;
                let burn = trailing_burn_rate(&billing.client, amount, config, period);
                let months = if burn > 0.0 { Some(ending / burn) } else { None };
                new_state.insert(billing.client.clone(), ending);
                (ending, Some(burn), months)
            }
            // Rate missing: nothing to deduct, nothing to project.
            None => (starting, None, None),
        };

        let alert = alert_state(ending, months_remaining, config.alert_threshold_months);
        if alert == AlertState::Alert {
            warn!(
                "Budget alert for {}: remaining {:.2}, months remaining {:?}",
                billing.client, ending, months_remaining
            );
        }

        summaries.push(ClientPeriodSummary {
            client: billing.client.clone(),
            hours: billing.hours,
            rate: billing.rate,
            billed: billing.billed,
            starting_remaining: starting,
            ending_remaining: ending,
            burn_rate,
            months_remaining,
            alert,
        });
    }

    TrackerOutput {
        summaries,
        new_state,
    }
}

/// Two-state alert machine, evaluated fresh each run. An overrun always
/// alerts regardless of burn rate; the burn-rate check only matters while
/// the budget is non-negative. A client clears back to Ok only when both
/// conditions clear on a later run.
fn alert_state(ending_remaining: f64, months_remaining: Option<f64>, threshold: f64) -> AlertState {
    if ending_remaining < 0.0 {
        return AlertState::Alert;
    }
    match months_remaining {
        Some(months) if months < threshold => AlertState::Alert,
        _ => AlertState::Ok,
    }
}

/// Arithmetic mean of billed amounts over the trailing window. The window
/// holds at most `lookback_periods` amounts: the current period first when
/// configured, then prior-period history, most recent first. Fewer periods
/// than the window means averaging what exists; an empty window falls back
/// to the current amount. Missing history is never treated as zero spend.
fn trailing_burn_rate(
    client: &str,
    current_amount: f64,
    config: &BillingConfig,
    period: BillingPeriod,
) -> f64 {
    let lookback = config.burn_rate.lookback_periods;
    let mut amounts: Vec<f64> = Vec::with_capacity(lookback);

    if config.burn_rate.include_current_period {
        amounts.push(current_amount);
    }

    if let Some(history) = config.spend_history.get(client) {
        let mut prior: Vec<(BillingPeriod, f64)> = history
            .iter()
            .filter_map(|spend| {
                BillingPeriod::parse(&spend.period)
                    .ok()
                    .map(|p| (p, spend.amount))
            })
            .filter(|(p, _)| *p < period)
            .collect();
        prior.sort_by(|a, b| b.0.cmp(&a.0));

        for (_, amount) in prior
            .into_iter()
            .take(lookback.saturating_sub(amounts.len()))
        {
            amounts.push(amount);
        }
    }

    if amounts.is_empty() {
        debug!(
            "No burn-rate history for {}; using current period only",
            client
        );
        return current_amount;
    }

    amounts.iter().sum::<f64>() / amounts.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PeriodSpend;

    fn billing(client: &str, hours: f64, rate: Option<f64>) -> ClientBilling {
        ClientBilling {
            client: client.to_string(),
            hours,
            rate,
            billed: rate.map(|r| hours * r),
        }
    }

    fn period() -> BillingPeriod {
        BillingPeriod::new(2025, 9).unwrap()
    }

    fn config_with_budget(client: &str, remaining: f64) -> BillingConfig {
        let mut config = BillingConfig::default();
        config.billing_rates.insert(client.to_string(), 100.0);
        config
            .remaining_budget
            .insert(client.to_string(), remaining);
        config
    }

    #[test]
    fn test_budget_monotonicity() {
        let config = config_with_budget("Acme", 1000.0);
        let output = track_budgets(&[billing("Acme", 2.5, Some(100.0))], &config, period());

        let summary = &output.summaries[0];
        assert_eq!(summary.starting_remaining, 1000.0);
        assert_eq!(summary.ending_remaining, 1000.0 - 250.0);
        assert_eq!(output.new_state["Acme"], 750.0);
    }

    #[test]
    fn test_zero_billed_leaves_budget_unchanged() {
        let config = config_with_budget("Acme", 1000.0);
        let output = track_budgets(&[billing("Acme", 0.0, Some(100.0))], &config, period());

        let summary = &output.summaries[0];
        assert_eq!(summary.ending_remaining, 1000.0);
        assert_eq!(output.new_state["Acme"], 1000.0);
        // Zero burn with non-negative budget never alerts.
        assert_eq!(summary.months_remaining, None);
        assert_eq!(summary.alert, AlertState::Ok);
    }

    #[test]
    fn test_overrun_always_alerts() {
        let config = config_with_budget("Acme", 200.0);
        let output = track_budgets(&[billing("Acme", 3.5, Some(100.0))], &config, period());

        let summary = &output.summaries[0];
        assert_eq!(summary.ending_remaining, -150.0);
        assert_eq!(summary.alert, AlertState::Alert);
    }

    #[test]
    fn test_low_months_remaining_alerts() {
        // 900 remaining after billing 100, burn 100/month: 9 months, no alert.
        let config = config_with_budget("Acme", 1000.0);
        let output = track_budgets(&[billing("Acme", 1.0, Some(100.0))], &config, period());
        assert_eq!(output.summaries[0].months_remaining, Some(9.0));
        assert_eq!(output.summaries[0].alert, AlertState::Ok);

        // 100 remaining after billing 100: 1 month left, below the 2.0 default.
        let config = config_with_budget("Acme", 200.0);
        let output = track_budgets(&[billing("Acme", 1.0, Some(100.0))], &config, period());
        assert_eq!(output.summaries[0].months_remaining, Some(1.0));
        assert_eq!(output.summaries[0].alert, AlertState::Alert);
    }

    #[test]
    fn test_alert_clears_when_both_conditions_clear() {
        assert_eq!(alert_state(-1.0, Some(50.0), 2.0), AlertState::Alert);
        assert_eq!(alert_state(100.0, Some(1.0), 2.0), AlertState::Alert);
        assert_eq!(alert_state(100.0, Some(5.0), 2.0), AlertState::Ok);
        assert_eq!(alert_state(100.0, None, 2.0), AlertState::Ok);
    }

    #[test]
    fn test_missing_rate_keeps_budget_untouched() {
        let mut config = config_with_budget("Acme", 500.0);
        config.billing_rates.clear();
        let output = track_budgets(&[billing("Acme", 4.0, None)], &config, period());

        let summary = &output.summaries[0];
        assert_eq!(summary.billed, None);
        assert_eq!(summary.ending_remaining, 500.0);
        assert_eq!(summary.burn_rate, None);
        assert_eq!(output.new_state["Acme"], 500.0);
    }

    #[test]
    fn test_client_absent_from_state_starts_at_zero() {
        let mut config = BillingConfig::default();
        config.billing_rates.insert("Acme".to_string(), 100.0);
        let output = track_budgets(&[billing("Acme", 1.0, Some(100.0))], &config, period());

        let summary = &output.summaries[0];
        assert_eq!(summary.starting_remaining, 0.0);
        assert_eq!(summary.ending_remaining, -100.0);
        assert_eq!(summary.alert, AlertState::Alert);
    }

    #[test]
    fn test_inactive_clients_carried_forward() {
        let mut config = config_with_budget("Acme", 1000.0);
        config
            .remaining_budget
            .insert("Dormant Co".to_string(), 400.0);

        let output = track_budgets(&[billing("Acme", 1.0, Some(100.0))], &config, period());
        assert_eq!(output.new_state["Dormant Co"], 400.0);
        assert_eq!(output.new_state["Acme"], 900.0);
    }

    #[test]
    fn test_burn_rate_window_includes_current_by_default() {
        let mut config = config_with_budget("Acme", 10000.0);
        config.spend_history.insert(
            "Acme".to_string(),
            vec![
                PeriodSpend {
                    period: "2025-06".to_string(),
                    amount: 700.0,
                },
                PeriodSpend {
                    period: "2025-07".to_string(),
                    amount: 400.0,
                },
                PeriodSpend {
                    period: "2025-08".to_string(),
                    amount: 100.0,
                },
            ],
        );

        // Lookback 3, current included: (100 current + 100 Aug + 400 Jul) / 3.
        let output = track_budgets(&[billing("Acme", 1.0, Some(100.0))], &config, period());
        assert_eq!(output.summaries[0].burn_rate, Some(200.0));
    }

    #[test]
    fn test_burn_rate_window_can_exclude_current() {
        let mut config = config_with_budget("Acme", 10000.0);
        config.burn_rate.include_current_period = false;
        config.spend_history.insert(
            "Acme".to_string(),
            vec![
                PeriodSpend {
                    period: "2025-07".to_string(),
                    amount: 300.0,
                },
                PeriodSpend {
                    period: "2025-08".to_string(),
                    amount: 500.0,
                },
            ],
        );

        let output = track_budgets(&[billing("Acme", 1.0, Some(100.0))], &config, period());
        assert_eq!(output.summaries[0].burn_rate, Some(400.0));
    }

    #[test]
    fn test_sparse_history_averages_what_exists() {
        let mut config = config_with_budget("Acme", 10000.0);
        config.spend_history.insert(
            "Acme".to_string(),
            vec![PeriodSpend {
                period: "2025-08".to_string(),
                amount: 300.0,
            }],
        );

        // Only two periods available for a three-period window.
        let output = track_budgets(&[billing("Acme", 1.0, Some(100.0))], &config, period());
        assert_eq!(output.summaries[0].burn_rate, Some(200.0));
    }

    #[test]
    fn test_no_history_with_current_excluded_falls_back_to_current() {
        let mut config = config_with_budget("Acme", 10000.0);
        config.burn_rate.include_current_period = false;

        let output = track_budgets(&[billing("Acme", 1.0, Some(100.0))], &config, period());
        assert_eq!(output.summaries[0].burn_rate, Some(100.0));
    }

    #[test]
    fn test_future_history_is_ignored() {
        let mut config = config_with_budget("Acme", 10000.0);
        config.spend_history.insert(
            "Acme".to_string(),
            vec![PeriodSpend {
                period: "2025-10".to_string(),
                amount: 9999.0,
            }],
        );

        let output = track_budgets(&[billing("Acme", 1.0, Some(100.0))], &config, period());
        assert_eq!(output.summaries[0].burn_rate, Some(100.0));
    }
}
