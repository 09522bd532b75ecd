// defense-config/tests/config_validation.rs
// ============================================================================
// Test: Config validation
// Description: Loads a deployment-shaped TOML document and confirms it
//              builds a usable stage graph and agent registry, and that a
//              graph referencing an unregistered agent fails validation.
// ============================================================================

#![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

use defense_config::ConfigError;
use defense_config::DeliberationConfig;
use defense_core::StageId;

const SAMPLE_CONFIG: &str = r#"
defense_file_root = "defense_files"

[timeouts]
model_call_ms = 45000
retrieval_call_ms = 8000
stage_ms = 90000
model_retry_attempts = 3

[[agents]]
id = "a1_sponsor"
stage = "e1_strategy"
display_name = "Strategy reviewer"
system_prompt = "Review the business case for a genuine rationale."

[[agents]]
id = "a2_fiscal"
stage = "e2_fiscal"
display_name = "Fiscal reviewer"
system_prompt = "Review fiscal compliance."

[[plan_assignments]]
company = "acme"
plan = "pro"

[stage_graph]
entry_stage = "e1_strategy"

[[stage_graph.transitions]]
stage = "e1_strategy"
on_approve = "e2_fiscal"
on_reject = "rejected"

[[stage_graph.transitions]]
stage = "e2_fiscal"
on_approve = "e5_approved"
on_reject = "rejected"
"#;

#[test]
fn a_well_formed_document_builds_a_usable_wiring() {
    let config = DeliberationConfig::from_toml_str(SAMPLE_CONFIG).expect("parse");
    let wiring = config.build().expect("build");
    assert_eq!(wiring.graph.entry_stage(), StageId::E1Strategy);
    assert_eq!(wiring.timeouts.model_call_ms, 45_000);
    assert!(wiring.registry.get_for_stage(StageId::E2Fiscal).is_ok());
}

#[test]
fn a_graph_referencing_an_unregistered_agent_fails_to_build() {
    let raw = r#"
        defense_file_root = "defense_files"

        [[agents]]
        id = "a1_sponsor"
        stage = "e1_strategy"
        display_name = "Strategy reviewer"
        system_prompt = "Review."

        [stage_graph]
        entry_stage = "e1_strategy"

        [[stage_graph.transitions]]
        stage = "e1_strategy"
        on_approve = "e2_fiscal"
        on_reject = "rejected"
    "#;
    let config = DeliberationConfig::from_toml_str(raw).expect("parse");
    assert!(matches!(config.build(), Err(ConfigError::Graph(_))));
}
