use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn test_malformed_csv_handling() {
    let dir = tempfile::tempdir().unwrap();
    let output_path = dir.path().join("robustness_test.csv");
    let mut wtr = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(&output_path)
        .unwrap();
    wtr.write_record(["op", "user", "account", "counterparty", "amount", "term", "rate", "kind"])
        .unwrap();

    wtr.write_record(["open", "1", "a", "", "", "", "", "checking"]).unwrap();
    // Valid deposit
    wtr.write_record(["deposit", "", "a", "", "1.0", "", "", ""]).unwrap();
    // Unknown operation
    wtr.write_record(["refund", "", "a", "", "1.0", "", "", ""]).unwrap();
    // Missing amount for deposit (required)
    wtr.write_record(["deposit", "", "a", "", "", "", "", ""]).unwrap();
    // Unknown alias
    wtr.write_record(["deposit", "", "ghost", "", "1.0", "", "", ""]).unwrap();
    // Short row
    wtr.write_record(["withdraw", "", "a"]).unwrap();
    // Valid deposit again
    wtr.write_record(["deposit", "", "a", "", "2.0", "", "", ""]).unwrap();
    wtr.flush().unwrap();
    drop(wtr);

    let mut cmd = Command::new(cargo_bin!("credit-ledger"));
    cmd.arg("replay").arg(&output_path);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("operation skipped"))
        .stdout(predicate::str::contains("a,1,checking,3.0,true"));
}

#[test]
fn test_invalid_data_types() {
    let dir = tempfile::tempdir().unwrap();
    let output_path = dir.path().join("data_type_test.csv");
    let mut wtr = csv::Writer::from_path(&output_path).unwrap();
    wtr.write_record(["op", "user", "account", "counterparty", "amount", "term", "rate", "kind"])
        .unwrap();

    wtr.write_record(["open", "1", "a", "", "", "", "", ""]).unwrap();
    // Text in amount field
    wtr.write_record(["deposit", "", "a", "", "not_a_number", "", "", ""]).unwrap();
    // Non-integer user id
    wtr.write_record(["open", "abc", "b", "", "", "", "", ""]).unwrap();
    // Sub-cent amount
    wtr.write_record(["deposit", "", "a", "", "0.001", "", "", ""]).unwrap();
    // Valid deposit
    wtr.write_record(["deposit", "", "a", "", "5.0", "", "", ""]).unwrap();
    wtr.flush().unwrap();
    drop(wtr);

    let mut cmd = Command::new(cargo_bin!("credit-ledger"));
    cmd.arg("replay").arg(&output_path);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("operation skipped"))
        .stdout(predicate::str::contains("a,1,checking,5.0,true"))
        .stdout(predicate::str::contains("b,").not());
}
