//! Chart aggregation over factory registry data.
//!
//! Everything here is pure so the chart shapes are deterministic and
//! testable without a node. The aggregator feeds in per-network snapshots
//! and persists whatever these functions return.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDate};
use serde::Serialize;

/// One normalized factory transaction. `token_symbol` is the resolved ERC-20
/// symbol, or the chain's native symbol for ether payouts; `None` means the
/// token could not be identified. `amount` is already scaled down by the
/// token's decimals.
#[derive(Debug, Clone)]
pub struct FactoryTx {
    pub network: String,
    pub faucet: String,
    pub tx_type: String,
    pub initiator: String,
    pub timestamp: i64,
    pub token_symbol: Option<String>,
    pub amount: f64,
}

/// Everything fetched for one network in a run.
#[derive(Debug, Clone)]
pub struct NetworkSnapshot {
    pub network: String,
    pub chain_id: u64,
    pub faucet_count: usize,
    pub transactions: Vec<FactoryTx>,
}

/// Fixed brand colors per network for the transactions chart.
pub const NETWORK_COLORS: &[(&str, &str)] = &[
    ("Celo", "#FCFF52"),
    ("Arbitrum", "#28A0F0"),
    ("Lisk", "#4070F4"),
    ("Base", "#0052FF"),
];

const FALLBACK_NETWORK_COLOR: &str = "#9CA3AF";

pub fn network_color(network: &str) -> &'static str {
    NETWORK_COLORS
        .iter()
        .find(|(name, _)| *name == network)
        .map(|(_, color)| *color)
        .unwrap_or(FALLBACK_NETWORK_COLOR)
}

/// Deterministic pie-slice color: golden-angle walk around the hue wheel.
pub fn hsl_color(index: usize) -> String {
    let hue = (index as f64 * 137.508) % 360.0;
    format!("hsl({hue:.3}, 70%, 60%)")
}

/// A transaction counts as a claim when its type mentions "claim", any case.
pub fn is_claim(tx_type: &str) -> bool {
    tx_type.to_ascii_lowercase().contains("claim")
}

/// Synthetic user backfill injected into the users chart: a fixed number of
/// fabricated addresses spread evenly over a hard-coded launch-era range.
/// Product decision; toggled by configuration, never reshaped.
pub const SYNTHETIC_USER_COUNT: u64 = 500;
pub const SYNTHETIC_RANGE_START: (i32, u32, u32) = (2025, 5, 22);
pub const SYNTHETIC_RANGE_END: (i32, u32, u32) = (2025, 6, 20);

fn synthetic_range() -> (NaiveDate, NaiveDate) {
    let (sy, sm, sd) = SYNTHETIC_RANGE_START;
    let (ey, em, ed) = SYNTHETIC_RANGE_END;
    let start = NaiveDate::from_ymd_opt(sy, sm, sd).expect("synthetic range start is a real date");
    let end = NaiveDate::from_ymd_opt(ey, em, ed).expect("synthetic range end is a real date");
    assert!(start < end, "Synthetic range must be ordered");
    (start, end)
}

/// Per-day synthetic counts, inclusive of both range ends; the remainder of
/// the even split lands on the earliest days so the total is exact.
fn synthetic_daily() -> Vec<(NaiveDate, u64)> {
    let (start, end) = synthetic_range();
    let days = (end - start).num_days() as u64 + 1;
    let base = SYNTHETIC_USER_COUNT / days;
    let remainder = SYNTHETIC_USER_COUNT % days;

    (0..days)
        .map(|offset| {
            let date = start + chrono::Days::new(offset);
            let count = base + u64::from(offset < remainder);
            (date, count)
        })
        .collect()
}

fn day_of(timestamp: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(timestamp, 0).map(|dt| dt.date_naive())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkFaucets {
    pub network: String,
    pub count: u64,
    pub color: &'static str,
}

/// Faucet counts per network, busiest first.
pub fn faucets_chart(networks: &[NetworkSnapshot]) -> Vec<NetworkFaucets> {
    let mut chart: Vec<NetworkFaucets> = networks
        .iter()
        .map(|n| NetworkFaucets {
            network: n.network.clone(),
            count: n.faucet_count as u64,
            color: network_color(&n.network),
        })
        .collect();
    chart.sort_by(|a, b| b.count.cmp(&a.count).then(a.network.cmp(&b.network)));
    chart
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyUsers {
    pub date: String,
    pub new_users: u64,
    pub cumulative_users: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersChart {
    pub daily: Vec<DailyUsers>,
    pub total_users: u64,
    pub total_claims: u64,
    pub synthetic_users: u64,
}

/// New-user series keyed on each address's first claim date, plus the
/// cumulative curve. Synthetic backfill is added per-day before cumulating.
pub fn users_chart(transactions: &[FactoryTx], synthetic: bool) -> UsersChart {
    let claims: Vec<&FactoryTx> = transactions
        .iter()
        .filter(|tx| is_claim(&tx.tx_type))
        .collect();

    let mut first_claim: HashMap<&str, i64> = HashMap::new();
    for tx in &claims {
        first_claim
            .entry(tx.initiator.as_str())
            .and_modify(|ts| *ts = (*ts).min(tx.timestamp))
            .or_insert(tx.timestamp);
    }

    let mut new_users_by_day: HashMap<NaiveDate, u64> = HashMap::new();
    for ts in first_claim.values() {
        if let Some(date) = day_of(*ts) {
            *new_users_by_day.entry(date).or_insert(0) += 1;
        }
    }

    let mut synthetic_total = 0u64;
    if synthetic {
        for (date, count) in synthetic_daily() {
            *new_users_by_day.entry(date).or_insert(0) += count;
            synthetic_total += count;
        }
        assert_eq!(
            synthetic_total, SYNTHETIC_USER_COUNT,
            "Synthetic spread must be exact"
        );
    }

    let mut days: Vec<(NaiveDate, u64)> = new_users_by_day.into_iter().collect();
    days.sort_by_key(|(date, _)| *date);

    let mut cumulative = 0u64;
    let daily = days
        .into_iter()
        .map(|(date, new_users)| {
            cumulative += new_users;
            DailyUsers {
                date: format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day()),
                new_users,
                cumulative_users: cumulative,
            }
        })
        .collect();

    UsersChart {
        daily,
        total_users: first_claim.len() as u64 + synthetic_total,
        total_claims: claims.len() as u64 + synthetic_total,
        synthetic_users: synthetic_total,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FaucetClaims {
    pub faucet: String,
    pub network: String,
    pub claims: u64,
    pub last_claim_at: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PieSlice {
    pub label: String,
    pub value: u64,
    pub color: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimsChart {
    /// Faucets ordered by most recent claim
    pub ranking: Vec<FaucetClaims>,
    /// Top ten by volume plus an Others bucket
    pub pie: Vec<PieSlice>,
    pub total_claims: u64,
}

const PIE_TOP_FAUCETS: usize = 10;

pub fn claims_chart(transactions: &[FactoryTx]) -> ClaimsChart {
    struct Tally {
        network: String,
        claims: u64,
        last_claim_at: i64,
    }

    let mut per_faucet: HashMap<&str, Tally> = HashMap::new();
    let mut total_claims = 0u64;
    for tx in transactions.iter().filter(|tx| is_claim(&tx.tx_type)) {
        total_claims += 1;
        per_faucet
            .entry(tx.faucet.as_str())
            .and_modify(|tally| {
                tally.claims += 1;
                tally.last_claim_at = tally.last_claim_at.max(tx.timestamp);
            })
            .or_insert(Tally {
                network: tx.network.clone(),
                claims: 1,
                last_claim_at: tx.timestamp,
            });
    }

    let mut ranking: Vec<FaucetClaims> = per_faucet
        .into_iter()
        .map(|(faucet, tally)| FaucetClaims {
            faucet: faucet.to_string(),
            network: tally.network,
            claims: tally.claims,
            last_claim_at: tally.last_claim_at,
        })
        .collect();
    ranking.sort_by(|a, b| {
        b.last_claim_at
            .cmp(&a.last_claim_at)
            .then(a.faucet.cmp(&b.faucet))
    });

    let mut by_volume = ranking.clone();
    by_volume.sort_by(|a, b| b.claims.cmp(&a.claims).then(a.faucet.cmp(&b.faucet)));

    let mut pie: Vec<PieSlice> = by_volume
        .iter()
        .take(PIE_TOP_FAUCETS)
        .enumerate()
        .map(|(index, entry)| PieSlice {
            label: entry.faucet.clone(),
            value: entry.claims,
            color: hsl_color(index),
        })
        .collect();

    let others: u64 = by_volume
        .iter()
        .skip(PIE_TOP_FAUCETS)
        .map(|entry| entry.claims)
        .sum();
    if others > 0 {
        pie.push(PieSlice {
            label: "Others".to_string(),
            value: others,
            color: hsl_color(PIE_TOP_FAUCETS),
        });
    }

    ClaimsChart {
        ranking,
        pie,
        total_claims,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkTransactions {
    pub network: String,
    pub transactions: u64,
    pub color: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransactions {
    pub symbol: String,
    pub transactions: u64,
    /// Total decimal amount dispensed in this token
    pub volume: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsChart {
    pub networks: Vec<NetworkTransactions>,
    /// Transaction counts per resolved token symbol, busiest first
    pub tokens: Vec<TokenTransactions>,
}

const UNRESOLVED_TOKEN_LABEL: &str = "UNKNOWN";

pub fn transactions_chart(networks: &[NetworkSnapshot]) -> TransactionsChart {
    let per_network = networks
        .iter()
        .map(|n| NetworkTransactions {
            network: n.network.clone(),
            transactions: n.transactions.len() as u64,
            color: network_color(&n.network),
        })
        .collect();

    let mut per_token: HashMap<&str, (u64, f64)> = HashMap::new();
    for tx in networks.iter().flat_map(|n| n.transactions.iter()) {
        let symbol = tx
            .token_symbol
            .as_deref()
            .unwrap_or(UNRESOLVED_TOKEN_LABEL);
        let entry = per_token.entry(symbol).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += tx.amount;
    }
    let mut tokens: Vec<TokenTransactions> = per_token
        .into_iter()
        .map(|(symbol, (transactions, volume))| TokenTransactions {
            symbol: symbol.to_string(),
            transactions,
            volume,
        })
        .collect();
    tokens.sort_by(|a, b| b.transactions.cmp(&a.transactions).then(a.symbol.cmp(&b.symbol)));

    TransactionsChart {
        networks: per_network,
        tokens,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSummary {
    pub network: String,
    pub chain_id: u64,
    pub faucets: u64,
    pub transactions: u64,
    pub color: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub total_faucets: u64,
    pub total_transactions: u64,
    pub total_claims: u64,
    pub unique_users: u64,
    pub networks: Vec<NetworkSummary>,
}

pub fn dashboard(networks: &[NetworkSnapshot], users: &UsersChart) -> Dashboard {
    let summaries: Vec<NetworkSummary> = networks
        .iter()
        .map(|n| NetworkSummary {
            network: n.network.clone(),
            chain_id: n.chain_id,
            faucets: n.faucet_count as u64,
            transactions: n.transactions.len() as u64,
            color: network_color(&n.network),
        })
        .collect();

    Dashboard {
        total_faucets: summaries.iter().map(|s| s.faucets).sum(),
        total_transactions: summaries.iter().map(|s| s.transactions).sum(),
        total_claims: users.total_claims,
        unique_users: users.total_users,
        networks: summaries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(
        network: &str,
        faucet: &str,
        tx_type: &str,
        initiator: &str,
        timestamp: i64,
    ) -> FactoryTx {
        FactoryTx {
            network: network.to_string(),
            faucet: faucet.to_string(),
            tx_type: tx_type.to_string(),
            initiator: initiator.to_string(),
            timestamp,
            token_symbol: Some("CELO".to_string()),
            amount: 1.0,
        }
    }

    #[test]
    fn claim_detection_is_case_insensitive() {
        assert!(is_claim("Claim"));
        assert!(is_claim("CUSTOM_CLAIM"));
        assert!(is_claim("claimFor"));
        assert!(!is_claim("whitelist"));
        assert!(!is_claim("fund"));
    }

    #[test]
    fn synthetic_spread_is_exact_and_in_range() {
        let daily = synthetic_daily();
        assert_eq!(daily.len(), 30);
        let total: u64 = daily.iter().map(|(_, count)| count).sum();
        assert_eq!(total, SYNTHETIC_USER_COUNT);
        let (start, end) = synthetic_range();
        assert_eq!(daily.first().unwrap().0, start);
        assert_eq!(daily.last().unwrap().0, end);
        // Even split with the remainder on the earliest days
        assert_eq!(daily[0].1, 17);
        assert_eq!(daily[29].1, 16);
    }

    #[test]
    fn users_chart_counts_first_claims_once() {
        // Two distinct initiators over three claims
        let txs = vec![
            tx("Celo", "0xF1", "Claim", "0xA", 1_750_000_000),
            tx("Celo", "0xF1", "Claim", "0xA", 1_750_086_400),
            tx("Celo", "0xF2", "Claim", "0xB", 1_750_086_400),
        ];
        let chart = users_chart(&txs, true);
        assert_eq!(chart.total_users, 2 + 500);
        assert_eq!(chart.total_claims, 3 + 500);
        assert_eq!(chart.synthetic_users, 500);

        // Deterministic across runs
        let again = users_chart(&txs, true);
        assert_eq!(again.total_users, chart.total_users);
        assert_eq!(
            serde_json::to_value(&again.daily).unwrap(),
            serde_json::to_value(&chart.daily).unwrap()
        );

        // Knob off removes exactly the backfill
        let bare = users_chart(&txs, false);
        assert_eq!(bare.total_users, 2);
        assert_eq!(bare.total_claims, 3);
        assert_eq!(bare.synthetic_users, 0);
    }

    #[test]
    fn cumulative_series_is_monotonic() {
        let txs = vec![
            tx("Celo", "0xF1", "Claim", "0xA", 1_750_000_000),
            tx("Base", "0xF2", "Claim", "0xB", 1_760_000_000),
        ];
        let chart = users_chart(&txs, true);
        let mut last = 0;
        for day in &chart.daily {
            assert!(day.cumulative_users >= last);
            last = day.cumulative_users;
        }
        assert_eq!(last, chart.total_users);
    }

    #[test]
    fn claims_ranking_orders_by_latest_claim() {
        let txs = vec![
            tx("Celo", "0xOld", "Claim", "0xA", 100),
            tx("Celo", "0xOld", "Claim", "0xB", 200),
            tx("Celo", "0xHot", "Claim", "0xC", 900),
        ];
        let chart = claims_chart(&txs);
        assert_eq!(chart.total_claims, 3);
        assert_eq!(chart.ranking[0].faucet, "0xHot");
        assert_eq!(chart.ranking[1].faucet, "0xOld");
        assert_eq!(chart.ranking[1].claims, 2);
    }

    #[test]
    fn pie_buckets_overflow_into_others() {
        let mut txs = Vec::new();
        for i in 0..12 {
            // Faucet i gets i+1 claims so the two smallest spill into Others
            for j in 0..=i {
                txs.push(tx("Celo", &format!("0xF{i:02}"), "Claim", "0xA", j));
            }
        }
        let chart = claims_chart(&txs);
        assert_eq!(chart.pie.len(), PIE_TOP_FAUCETS + 1);
        let others = chart.pie.last().unwrap();
        assert_eq!(others.label, "Others");
        // Faucets with 1 and 2 claims are the leftovers
        assert_eq!(others.value, 3);
    }

    #[test]
    fn pie_colors_walk_the_golden_angle() {
        assert_eq!(hsl_color(0), "hsl(0.000, 70%, 60%)");
        assert_eq!(hsl_color(1), "hsl(137.508, 70%, 60%)");
        assert_eq!(hsl_color(2), "hsl(275.016, 70%, 60%)");
        assert_eq!(hsl_color(3), "hsl(52.524, 70%, 60%)");
    }

    #[test]
    fn faucets_chart_sorts_descending() {
        let networks = vec![
            NetworkSnapshot {
                network: "Celo".to_string(),
                chain_id: 42220,
                faucet_count: 2,
                transactions: Vec::new(),
            },
            NetworkSnapshot {
                network: "Base".to_string(),
                chain_id: 8453,
                faucet_count: 7,
                transactions: Vec::new(),
            },
        ];
        let chart = faucets_chart(&networks);
        assert_eq!(chart[0].network, "Base");
        assert_eq!(chart[0].count, 7);
        assert_eq!(chart[0].color, "#0052FF");
        assert_eq!(chart[1].color, "#FCFF52");
    }

    #[test]
    fn transactions_chart_breaks_down_by_token() {
        let mut celo_tx = tx("Celo", "0xF1", "Claim", "0xA", 100);
        celo_tx.token_symbol = Some("cUSD".to_string());
        let mut unresolved = tx("Celo", "0xF2", "Claim", "0xB", 200);
        unresolved.token_symbol = None;
        let networks = vec![NetworkSnapshot {
            network: "Celo".to_string(),
            chain_id: 42220,
            faucet_count: 2,
            transactions: vec![
                celo_tx.clone(),
                celo_tx,
                unresolved,
            ],
        }];
        let chart = transactions_chart(&networks);
        assert_eq!(chart.networks.len(), 1);
        assert_eq!(chart.networks[0].transactions, 3);
        assert_eq!(chart.tokens[0].symbol, "cUSD");
        assert_eq!(chart.tokens[0].transactions, 2);
        assert_eq!(chart.tokens[0].volume, 2.0);
        assert_eq!(chart.tokens[1].symbol, UNRESOLVED_TOKEN_LABEL);
    }

    #[test]
    fn network_colors_are_fixed() {
        assert_eq!(network_color("Celo"), "#FCFF52");
        assert_eq!(network_color("Arbitrum"), "#28A0F0");
        assert_eq!(network_color("Unknown"), FALLBACK_NETWORK_COLOR);
    }

    #[test]
    fn chart_payloads_serialize_camel_case() {
        let users = users_chart(&[tx("Celo", "0xF1", "Claim", "0xA", 1_750_000_000)], false);
        let json = serde_json::to_value(&users).unwrap();
        assert!(json.get("totalUsers").is_some());
        assert!(json.get("totalClaims").is_some());
        assert!(json["daily"][0].get("newUsers").is_some());
        assert!(json["daily"][0].get("cumulativeUsers").is_some());

        let networks = vec![NetworkSnapshot {
            network: "Celo".to_string(),
            chain_id: 42220,
            faucet_count: 1,
            transactions: Vec::new(),
        }];
        let board = serde_json::to_value(dashboard(&networks, &users)).unwrap();
        assert!(board.get("totalFaucets").is_some());
        assert!(board.get("uniqueUsers").is_some());
        assert_eq!(board["networks"][0]["chainId"], 42220);
    }

    #[test]
    fn dashboard_totals_follow_users_chart() {
        let networks = vec![NetworkSnapshot {
            network: "Celo".to_string(),
            chain_id: 42220,
            faucet_count: 2,
            transactions: vec![
                tx("Celo", "0xF1", "Claim", "0xA", 100),
                tx("Celo", "0xF1", "Claim", "0xA", 200),
                tx("Celo", "0xF2", "Claim", "0xB", 300),
            ],
        }];
        let all_txs: Vec<FactoryTx> = networks
            .iter()
            .flat_map(|n| n.transactions.clone())
            .collect();
        let users = users_chart(&all_txs, true);
        let board = dashboard(&networks, &users);
        assert_eq!(board.total_faucets, 2);
        assert_eq!(board.total_transactions, 3);
        assert_eq!(board.total_claims, 503);
        assert_eq!(board.unique_users, 502);
    }
}
