// CLI integration tests for scan, prefix-range, and the cell codecs.
use std::path::PathBuf;
use std::process::Command;

use serde_json::{Value, json};

fn cmd() -> Command {
    let exe = env!("CARGO_BIN_EXE_widerow");
    Command::new(exe)
}

fn parse_json(value: &str) -> Value {
    serde_json::from_str(value).expect("valid json")
}

fn parse_json_line(output: &[u8]) -> Value {
    let text = String::from_utf8_lossy(output);
    let line = text.lines().next().expect("json line");
    parse_json(line)
}

fn parse_json_lines(output: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(output)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_json)
        .collect()
}

fn write_fixture(dir: &tempfile::TempDir) -> PathBuf {
    let rows = ["a", "b", "user#1", "user#2", "user$", "z"]
        .iter()
        .map(|key| {
            json!({
                "key": key,
                "families": [{
                    "name": "cf",
                    "columns": [{"qualifier": "v", "cells": [{"value": format!("val-{key}"), "timestamp": 1}]}]
                }]
            })
        })
        .collect::<Vec<_>>();
    let path = dir.path().join("fixture.json");
    std::fs::write(&path, json!({"tables": {"users": rows}}).to_string()).expect("write fixture");
    path
}

fn keys(rows: &[Value]) -> Vec<String> {
    rows.iter()
        .map(|row| row["key"].as_str().expect("key").to_string())
        .collect()
}

#[test]
fn scan_fixture_prefix_in_small_batches() {
    let temp = tempfile::tempdir().expect("tempdir");
    let fixture = write_fixture(&temp);

    let scan = cmd()
        .args(["scan", "users", "--fixture", fixture.to_str().unwrap()])
        .args(["--prefix", "user#", "--batch-size", "1"])
        .output()
        .expect("scan");
    assert!(scan.status.success(), "{}", String::from_utf8_lossy(&scan.stderr));
    let rows = parse_json_lines(&scan.stdout);
    assert_eq!(keys(&rows), vec!["user#1", "user#2"]);
    assert_eq!(rows[0]["families"][0]["columns"][0]["cells"][0]["value"], "val-user#1");
}

#[test]
fn scan_bounds_keys_and_limit() {
    let temp = tempfile::tempdir().expect("tempdir");
    let fixture = write_fixture(&temp);
    let fixture = fixture.to_str().unwrap();

    let bounded = cmd()
        .args(["scan", "users", "--fixture", fixture])
        .args(["--start", "a", "--start-exclusive", "--end", "user#2", "--end-inclusive"])
        .output()
        .expect("bounded");
    assert!(bounded.status.success());
    assert_eq!(keys(&parse_json_lines(&bounded.stdout)), vec!["b", "user#1", "user#2"]);

    let by_key = cmd()
        .args(["scan", "users", "--fixture", fixture, "--key", "z", "--key", "a", "--key", "missing"])
        .output()
        .expect("keys");
    assert!(by_key.status.success());
    assert_eq!(keys(&parse_json_lines(&by_key.stdout)), vec!["a", "z"]);

    let limited = cmd()
        .args(["scan", "users", "--fixture", fixture, "--limit", "2", "--batch-size", "5"])
        .output()
        .expect("limit");
    assert!(limited.status.success());
    assert_eq!(keys(&parse_json_lines(&limited.stdout)), vec!["a", "b"]);
}

#[test]
fn empty_user_range_exits_with_range_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    let fixture = write_fixture(&temp);

    let scan = cmd()
        .args(["scan", "users", "--fixture", fixture.to_str().unwrap()])
        .args(["--start", "m", "--end", "m"])
        .output()
        .expect("scan");
    assert_eq!(scan.status.code().unwrap(), 3);
    let err = parse_json_line(&scan.stderr);
    assert_eq!(err["error"]["kind"], "range");
    assert!(scan.stdout.is_empty());
}

#[test]
fn not_found_exit_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    let fixture = write_fixture(&temp);

    let scan = cmd()
        .args(["scan", "orders", "--fixture", fixture.to_str().unwrap()])
        .output()
        .expect("scan");
    assert_eq!(scan.status.code().unwrap(), 4);
    let err = parse_json_line(&scan.stderr);
    assert_eq!(err["error"]["kind"], "not_found");
    assert_eq!(err["error"]["table"], "orders");
}

#[test]
fn usage_exit_code() {
    let missing_fixture = cmd().args(["scan", "users"]).output().expect("scan");
    assert_eq!(missing_fixture.status.code().unwrap(), 2);

    let temp = tempfile::tempdir().expect("tempdir");
    let fixture = write_fixture(&temp);
    let zero_batch = cmd()
        .args(["scan", "users", "--fixture", fixture.to_str().unwrap(), "--batch-size", "0"])
        .output()
        .expect("scan");
    assert_eq!(zero_batch.status.code().unwrap(), 2);

    let token_local = cmd()
        .args(["scan", "users", "--fixture", fixture.to_str().unwrap(), "--token", "x"])
        .output()
        .expect("scan");
    assert_eq!(token_local.status.code().unwrap(), 2);

    let unknown_flag = cmd().args(["scan", "--nope"]).output().expect("scan");
    assert_eq!(unknown_flag.status.code().unwrap(), 2);
    let err = parse_json_line(&unknown_flag.stderr);
    assert_eq!(err["error"]["kind"], "usage");
}

#[test]
fn missing_fixture_file_is_io() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("absent.json");
    let scan = cmd()
        .args(["scan", "users", "--fixture", path.to_str().unwrap()])
        .output()
        .expect("scan");
    assert_eq!(scan.status.code().unwrap(), 6);
}

#[test]
fn prefix_range_reports_successor() {
    let out = cmd().args(["prefix-range", "abc"]).output().expect("prefix");
    assert!(out.status.success());
    let value = parse_json_line(&out.stdout);
    assert_eq!(value["range"]["start"], json!({"closed": "abc"}));
    assert_eq!(value["range"]["end"], json!({"open": "abd"}));
    assert_eq!(value["unbounded_end"], false);

    let carry = cmd().args(["prefix-range", "--hex", "61ff"]).output().expect("carry");
    let value = parse_json_line(&carry.stdout);
    assert_eq!(value["range"]["end"], json!({"open": "b"}));

    let all_ff = cmd().args(["prefix-range", "--hex", "ffff"]).output().expect("ff");
    let value = parse_json_line(&all_ff.stdout);
    assert_eq!(value["range"]["end"], "unbounded");
    assert_eq!(value["unbounded_end"], true);
}

#[test]
fn encode_then_decode_integer() {
    let encoded = cmd()
        .args(["encode", "--type", "integer", "--", "-1"])
        .output()
        .expect("encode");
    assert!(encoded.status.success());
    let value = parse_json_line(&encoded.stdout);
    assert_eq!(value, json!({"type": "integer", "hex": "ffffffffffffffff"}));

    let decoded = cmd()
        .args(["decode", "--type", "integer", "ffffffffffffffff"])
        .output()
        .expect("decode");
    assert!(decoded.status.success());
    assert_eq!(parse_json_line(&decoded.stdout)["value"], -1);
}

#[test]
fn decode_timestamp_epoch() {
    let decoded = cmd()
        .args(["decode", "--type", "timestamp", "0000000000000000"])
        .output()
        .expect("decode");
    assert!(decoded.status.success());
    assert_eq!(parse_json_line(&decoded.stdout)["value"], "1970-01-01T00:00:00Z");
}

#[test]
fn decode_wrong_width_is_codec_error() {
    let decoded = cmd()
        .args(["decode", "--type", "integer", "000102"])
        .output()
        .expect("decode");
    assert_eq!(decoded.status.code().unwrap(), 8);
    let err = parse_json_line(&decoded.stderr);
    assert_eq!(err["error"]["kind"], "invalid_integer_format");

    let boolean = cmd()
        .args(["decode", "--type", "boolean", "02"])
        .output()
        .expect("decode");
    assert_eq!(boolean.status.code().unwrap(), 8);
}

#[test]
fn completion_generates_script() {
    let out = cmd().args(["completion", "bash"]).output().expect("completion");
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("widerow"));
}
