use approx::assert_abs_diff_eq;
use chrono::NaiveDate;
use serde_json::json;

use curvebuilder::buildsettings::ModelType;
use curvebuilder::configuration::Configuration;
use curvebuilder::curveerror::CurveError;
use curvebuilder::model::modelfactory::{
    BuildRequest,
    Model,
    build_model
};

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// On-the-run Treasuries quoted as yields on 2022-10-10.
fn otr_quotes() -> Vec<serde_json::Value> {
    let bills = [
        ("2022-11-08", 0.02967),
        ("2023-01-05", 0.03378),
        ("2023-04-06", 0.04089),
        ("2023-10-05", 0.04181),
    ];
    let bonds = [
        ("2024-09-30", "2022-09-30", 0.04250, 0.04312),
        ("2025-09-30", "2022-09-15", 0.03500, 0.04349),
        ("2027-09-30", "2022-09-30", 0.04125, 0.04149),
        ("2029-09-30", "2022-09-30", 0.03875, 0.04037),
        ("2032-08-15", "2022-08-15", 0.02750, 0.03888),
        ("2042-08-15", "2022-08-15", 0.03375, 0.04148),
        ("2052-08-15", "2022-08-15", 0.03000, 0.03848),
    ];

    let mut quotes: Vec<serde_json::Value> = bills
        .iter()
        .map(|(maturity, ytm)| {
            json!({
                "type": "BondYieldDataPoint",
                "ytm": ytm,
                "bond": {"Convention": "USTBill", "notional": 100.0, "maturity_date": maturity}
            })
        })
        .collect();
    quotes.extend(bonds.iter().map(|(maturity, dated, rate, ytm)| {
        json!({
            "type": "BondYieldDataPoint",
            "ytm": ytm,
            "bond": {
                "Convention": "USTBond",
                "notional": 100.0,
                "rate": rate,
                "maturity_date": maturity,
                "dated_date": dated
            }
        })
    }));
    quotes
}

fn request(opt_method: &str) -> BuildRequest {
    BuildRequest::from_json(json!({
        "model_type": "BondCurve",
        "base_date": "2022-10-10",
        "model_data": otr_quotes(),
        "domainX": "TIME_ACT_365",
        "domainY": "TIME_WEIGHTED_ZERO_RATE",
        "fitting_method_str": "PiecewiseLinear",
        "t0_date": "2022-10-10",
        "calibration_tolerance": 1e-8,
        "opt_method": opt_method
    }))
    .unwrap()
}

fn calibrate(opt_method: &str) {
    let model = build_model(&request(opt_method), &Configuration::default(), None).unwrap();
    let Model::Bond(model) = model else {
        panic!("expected a bond model");
    };

    assert!(model.square_error() < 1e-8);
    assert_eq!(model.training_data().len(), 12);
    for p in model.bond_points() {
        assert_abs_diff_eq!(model.bond_model_yield(&p.bond).unwrap(), p.ytm, epsilon = 5e-5);
    }
    for diagnostic in model.calibration_report().unwrap() {
        assert!(diagnostic.square_diff < 1e-8, "{}", diagnostic.instrument);
    }

    // 殖利率曲線大致落在報價範圍內
    let zr_10y = model.zero_rate(ymd(2032, 10, 10)).unwrap();
    assert!(zr_10y > 0.03 && zr_10y < 0.05, "10y zero rate {zr_10y}");
    assert!(model.df(ymd(2052, 8, 15)).unwrap() < model.df(ymd(2032, 8, 15)).unwrap());
}

#[test]
fn bfgs_calibration() {
    calibrate("BFGS");
}

#[test]
fn conjugate_gradient_calibration() {
    calibrate("CG");
}

#[test]
fn results_span_thirty_one_years() {
    let model = build_model(&request("BFGS"), &Configuration::default(), None).unwrap();
    let results = model.results();
    assert_eq!(results.model_type, ModelType::BondCurve);
    assert_eq!(&results.model_id, model.curve_model().uuid());

    let df = results.series("df").unwrap();
    assert_eq!(df.first().unwrap(), &("2022-10-10".to_string(), 1.0));
    assert_eq!(df.last().unwrap().0, "2053-10-10");
    assert!(df.iter().all(|(_, v)| *v > 0.0 && *v <= 1.0 + 1e-12));

    let json = serde_json::to_value(&results).unwrap();
    assert_eq!(json["model_type"], "BondCurve");
    assert!(json["results"]["instantaneous_forward_rate"].is_array());
}

#[test]
fn unreachable_tolerance_reports_diagnostics() {
    let mut request = request("NelderMead");
    request.calibration_tolerance = Some(1e-30);
    let config = Configuration::from_json_value(json!({"defaults": {"max_iters": 5}})).unwrap();

    match build_model(&request, &config, None) {
        Err(CurveError::Convergence { diagnostics, .. }) => {
            assert_eq!(diagnostics.len(), 11);
            assert!(diagnostics[0].instrument.starts_with("Consistent_BondYieldDataPoint_2022-11-08"));
        }
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("calibration should fail"),
    }
}

#[test]
fn bills_sharing_a_maturity_are_rejected() {
    let bill = |maturity: &str, ytm: f64| {
        json!({
            "type": "BondYieldDataPoint",
            "ytm": ytm,
            "bond": {"Convention": "USTBill", "notional": 100.0, "maturity_date": maturity}
        })
    };
    let request = BuildRequest::from_json(json!({
        "model_type": "BondCurve",
        "base_date": "2022-10-10",
        "model_data": [bill("2023-04-06", 0.0408), bill("2023-04-06", 0.0410), bill("2023-10-05", 0.0418)],
        "domainY": "TIME_WEIGHTED_ZERO_RATE",
        "fitting_method_str": "PiecewiseLinear"
    }))
    .unwrap();

    match build_model(&request, &Configuration::default(), None) {
        Err(CurveError::Validation(message)) => assert!(message.contains("2023-04-06"), "{message}"),
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("duplicate maturities should not calibrate"),
    }
}
