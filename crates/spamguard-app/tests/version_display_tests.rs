//! Integration tests for VERSION propagation into runtime display.

use std::fs;

use spamguard_app::{ControllerOptions, app_version};

mod common;

#[test]
fn version_display_tests_matches_root_version_file() {
    let root_version_path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../VERSION");
    let root_version = fs::read_to_string(root_version_path).expect("VERSION should be readable");
    assert_eq!(app_version(), root_version.trim());
}

#[test]
fn version_display_tests_view_carries_app_version() {
    let harness = common::harness(ControllerOptions::default());
    assert_eq!(harness.controller.view().version, app_version());
}
