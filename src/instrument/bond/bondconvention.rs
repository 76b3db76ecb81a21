use serde::{
    Serialize,
    Deserialize
};

use crate::manager::manager::{
    IManager,
    Manager
};
use crate::manager::managererror::{
    ManagerError,
    parse_json_value
};
use crate::time::daycounter::daycounter::DayCount;
use crate::time::period::DateFrequency;

pub const ZERO_COUPON_BOND: &str = "ZeroCouponBond";
pub const FIXED_RATE_BOND: &str = "FixedRateBond";

/// How coupon day count fractions are assigned to the periods.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CouponConvention {
    /// 依頻率的固定權重
    Uniform,
    /// 調整後期間的實際 day count
    AdjDateDcf,
}

impl CouponConvention {
    pub fn uniform_weight(frequency: DateFrequency) -> f64 {
        1.0 / frequency.periods_per_year()
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum YieldConvention {
    #[default]
    TrueYield,
    UsStreet,
}

/// Named set of bond conventions; the registry key is the JSON `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BondConvention {
    #[serde(rename = "type")]
    pub bond_type: String,
    #[serde(default)]
    pub settlement_days: u32,
    #[serde(default)]
    pub settlement_calendars: Vec<String>,
    #[serde(default)]
    pub payment_days: u32,
    #[serde(default)]
    pub payment_calendars: Vec<String>,
    #[serde(default)]
    pub payment_frequency: Option<DateFrequency>,
    #[serde(default)]
    pub coupon_day_count: Option<DayCount>,
    #[serde(default)]
    pub coupon_convention: Option<CouponConvention>,
    #[serde(default)]
    pub accrued_interest_day_count: Option<DayCount>,
    #[serde(default)]
    pub yield_convention: YieldConvention,
}

impl BondConvention {
    /// US Treasury bill: zero coupon, T+1, true yield.
    pub fn ust_bill() -> BondConvention {
        BondConvention {
            bond_type: ZERO_COUPON_BOND.to_string(),
            settlement_days: 1,
            settlement_calendars: vec!["WEEKENDS".to_string()],
            payment_days: 0,
            payment_calendars: vec!["WEEKENDS".to_string()],
            payment_frequency: None,
            coupon_day_count: None,
            coupon_convention: None,
            accrued_interest_day_count: None,
            yield_convention: YieldConvention::TrueYield,
        }
    }

    /// US Treasury note/bond: semiannual uniform coupons, ACT/ACT accrual, US street yield.
    pub fn ust_bond() -> BondConvention {
        BondConvention {
            bond_type: FIXED_RATE_BOND.to_string(),
            settlement_days: 1,
            settlement_calendars: vec!["WEEKENDS".to_string()],
            payment_days: 0,
            payment_calendars: vec!["WEEKENDS".to_string()],
            payment_frequency: Some(DateFrequency::Semiannually),
            coupon_day_count: Some(DayCount::ActAct),
            coupon_convention: Some(CouponConvention::Uniform),
            accrued_interest_day_count: Some(DayCount::ActAct),
            yield_convention: YieldConvention::UsStreet,
        }
    }
}

pub type BondConventionManager = Manager<BondConvention>;

fn bond_convention_from_json(json_value: serde_json::Value) -> Result<BondConvention, ManagerError> {
    parse_json_value(json_value)
}

/// Registry pre-loaded with `USTBill` and `USTBond`.
pub fn bond_convention_manager() -> BondConventionManager {
    let manager = Manager::new(bond_convention_from_json);
    manager.insert("USTBill", BondConvention::ust_bill());
    manager.insert("USTBond", BondConvention::ust_bond());
    manager
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builtins_are_registered() {
        let manager = bond_convention_manager();
        assert_eq!(manager.names(), vec!["USTBill".to_string(), "USTBond".to_string()]);
        let bond = manager.get("USTBond").unwrap();
        assert_eq!(bond.yield_convention, YieldConvention::UsStreet);
        assert_eq!(bond.payment_frequency, Some(DateFrequency::Semiannually));
    }

    #[test]
    fn loads_from_json_and_overrides() {
        let manager = bond_convention_manager();
        manager
            .insert_obj_from_json(json!({
                "name": "USTBond",
                "type": "FixedRateBond",
                "settlement_days": 1,
                "settlement_calendars": ["NYB"],
                "payment_calendars": ["NYB"],
                "payment_frequency": "SEMIANNUALLY",
                "coupon_convention": "UNIFORM",
                "accrued_interest_day_count": "ACT_ACT",
                "yield_convention": "US_STREET"
            }))
            .unwrap();
        let bond = manager.get("USTBond").unwrap();
        assert_eq!(bond.settlement_calendars, vec!["NYB".to_string()]);
        assert_eq!(bond.coupon_day_count, None);
        assert!(manager.insert_obj_from_json(json!({"name": "Bad", "type": "FixedRateBond", "coupon_convention": "ODD"})).is_err());
    }

    #[test]
    fn uniform_weights() {
        assert_eq!(CouponConvention::uniform_weight(DateFrequency::Semiannually), 0.5);
        assert_eq!(CouponConvention::uniform_weight(DateFrequency::Quarterly), 0.25);
        assert_eq!(CouponConvention::uniform_weight(DateFrequency::Daily), 1.0 / 365.0);
    }
}
