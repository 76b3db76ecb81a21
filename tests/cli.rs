use std::fs;
use std::path::PathBuf;
use std::process::Command;

use serde_json::json;

fn write_temp(name: &str, value: &serde_json::Value) -> PathBuf {
    let path = std::env::temp_dir().join(format!("curvebuilder-{}-{name}", std::process::id()));
    fs::write(&path, value.to_string()).unwrap();
    path
}

fn curvebuilder() -> Command {
    Command::new(env!("CARGO_BIN_EXE_curvebuilder"))
}

#[test]
fn schedule_prints_the_bond_cashflows() {
    let bond = write_temp(
        "bond.json",
        &json!({
            "Convention": "USTBond",
            "notional": 100.0,
            "rate": 0.0425,
            "maturity_date": "2024-09-30",
            "dated_date": "2022-09-30"
        }),
    );
    let output = curvebuilder()
        .args(["schedule", bond.to_str().unwrap(), "--base-date", "2022-10-10"])
        .output()
        .unwrap();
    fs::remove_file(&bond).unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let records: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
    assert!(records.len() >= 5);
    assert!(records.iter().any(|r| r["payment_date"] == "2024-09-30"));
}

#[test]
fn build_prints_model_results() {
    let months = ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"];
    let data: Vec<serde_json::Value> = months
        .iter()
        .enumerate()
        .map(|(i, m)| json!({"type": "AdditiveSeasonalityDataPoint", "value": if i < 6 { 0.01 } else { -0.01 }, "month_str": m}))
        .collect();
    let request = write_temp(
        "seasonality.json",
        &json!({"model_type": "Seasonality", "base_date": "2022-01-01", "model_data": data}),
    );
    let output = curvebuilder()
        .args(["build", request.to_str().unwrap()])
        .output()
        .unwrap();
    fs::remove_file(&request).unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let results: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(results["model_type"], "Seasonality");
    assert!(results["results"]["zero_rate"].is_array());
}

#[test]
fn missing_request_fails() {
    let output = curvebuilder()
        .args(["build", "/nonexistent/request.json"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}
