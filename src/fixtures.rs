//! Shared builders for unit tests

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal_macros::dec;

use crate::types::{
    AssetHistory, AssetMetrics, BootstrapElement, BootstrapSnapshot, PriceTier, StatusFlag, Team,
};

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 11, 20, 18, 0, 0).unwrap()
}

pub fn make_asset(id: u32, ownership_pct: f64, transfers_in: u64, transfers_out: u64) -> AssetMetrics {
    AssetMetrics {
        id,
        name: format!("Asset {}", id),
        team_id: (id % 20) + 1,
        position_id: 3,
        ownership_pct,
        form: 5.0,
        recent_points: 6.0,
        total_points: 60,
        status: StatusFlag::None,
        previous_status: None,
        status_changed_at: None,
        price_tier: PriceTier::Mid,
        cost: dec!(7.5),
        cost_change: dec!(0),
        special: false,
        transfers_in,
        transfers_out,
        history: AssetHistory {
            transfers_in: vec![20_000, 25_000, 30_000, 35_000],
            transfers_out: vec![10_000, 10_000, 10_000, 10_000],
            points: vec![4.0, 5.0, 6.0, 7.0],
            upcoming_difficulty: vec![3, 3, 3],
        },
    }
}

pub fn make_element(id: u32, ownership_pct: f64, transfers_in: u64, transfers_out: u64) -> BootstrapElement {
    BootstrapElement {
        id,
        web_name: format!("Asset {}", id),
        team: (id % 20) + 1,
        element_type: 3,
        selected_by_percent: ownership_pct,
        form: 5.0,
        event_points: 6.0,
        total_points: 60,
        status: "a".to_string(),
        previous_status: None,
        news_added: None,
        now_cost: dec!(7.5),
        cost_change_event: dec!(0),
        price_tier: None,
        special: false,
        transfers_in_event: transfers_in,
        transfers_out_event: transfers_out,
        history: AssetHistory {
            transfers_in: vec![20_000, 25_000, 30_000, 35_000],
            transfers_out: vec![10_000, 10_000, 10_000, 10_000],
            points: vec![4.0, 5.0, 6.0, 7.0],
            upcoming_difficulty: vec![3, 3, 3],
        },
    }
}

pub fn make_snapshot(elements: Vec<BootstrapElement>) -> BootstrapSnapshot {
    BootstrapSnapshot {
        gameweek: 12,
        hours_to_deadline: 48.0,
        total_managers: 10_000_000,
        teams: (1..=20)
            .map(|id| Team {
                id,
                name: format!("Team {}", id),
                short_name: format!("T{:02}", id),
            })
            .collect(),
        positions: vec![],
        elements,
    }
}
