use super::support::{organization, template_repo};
use conformer::config::ConformerConfig;
use conformer::remediation::{Decision, ScriptedOperator};
use conformer::remote::memory::MemoryCheckout;
use conformer::tooling::cli::{CliContext, Commands, ConfigCommands, TemplateCommands};
use conformer::types::RepoId;

fn config() -> ConformerConfig {
    let mut config = ConformerConfig::default();
    config.template.owner = template_repo().owner;
    config.template.name = template_repo().name;
    config
}

#[test]
fn check_reports_missing_files_as_json() {
    let host = organization();
    let temp = tempfile::tempdir().unwrap();
    let checkout = MemoryCheckout::new(&host, temp.path());
    let operator = ScriptedOperator::new([]);
    let context = CliContext::new(config(), &host, &checkout, &operator);

    let out = context
        .execute(&Commands::Check {
            repo: RepoId::new("org", "service"),
            format: "json".to_string(),
        })
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["missing_count"], 3);
}

#[test]
fn check_of_a_mistyped_repository_fails() {
    let host = organization();
    let temp = tempfile::tempdir().unwrap();
    let checkout = MemoryCheckout::new(&host, temp.path());
    let operator = ScriptedOperator::new([]);
    let context = CliContext::new(config(), &host, &checkout, &operator);

    let err = context
        .execute(&Commands::Check {
            repo: RepoId::new("org", "typo"),
            format: "json".to_string(),
        })
        .unwrap_err();
    assert!(err.is_lookup_failure());
}

#[test]
fn template_show_respects_display_depth() {
    let host = organization();
    let temp = tempfile::tempdir().unwrap();
    let checkout = MemoryCheckout::new(&host, temp.path());
    let operator = ScriptedOperator::new([]);

    let out = CliContext::new(config(), &host, &checkout, &operator)
        .execute(&Commands::Template {
            command: TemplateCommands::Show {
                format: "text".to_string(),
            },
        })
        .unwrap();
    assert!(out.contains("ISSUE_TEMPLATE/"));
    assert!(out.contains("10 files"));

    let mut shallow = config();
    shallow.template.max_display_depth = 1;
    let err = CliContext::new(shallow, &host, &checkout, &operator)
        .execute(&Commands::Template {
            command: TemplateCommands::Show {
                format: "text".to_string(),
            },
        })
        .unwrap_err();
    assert!(err.to_string().contains("display limit is 1"));
}

#[test]
fn template_is_loaded_once_per_context() {
    let host = organization();
    let temp = tempfile::tempdir().unwrap();
    let checkout = MemoryCheckout::new(&host, temp.path());
    let operator = ScriptedOperator::new([]);
    let context = CliContext::new(config(), &host, &checkout, &operator);

    let check = Commands::Check {
        repo: RepoId::new("org", "service"),
        format: "text".to_string(),
    };
    context.execute(&check).unwrap();
    context.execute(&check).unwrap();
    let template_listings = host
        .calls()
        .iter()
        .filter(|c| c.starts_with("list_directory org/template"))
        .count();
    // Root, .github, .github/ISSUE_TEMPLATE and docs, listed once.
    assert_eq!(template_listings, 4);
}

#[test]
fn scan_skips_the_template_itself() {
    let host = organization();
    let temp = tempfile::tempdir().unwrap();
    let checkout = MemoryCheckout::new(&host, temp.path());
    let operator = ScriptedOperator::new([]);
    let out = CliContext::new(config(), &host, &checkout, &operator)
        .execute(&Commands::Scan {
            owner: "org".to_string(),
            format: "json".to_string(),
        })
        .unwrap();
    let rows: Vec<serde_json::Value> = serde_json::from_str(&out).unwrap();
    assert_eq!(rows.len(), 1);
}

#[test]
fn remediate_with_yes_skips_prompts() {
    let host = organization();
    let temp = tempfile::tempdir().unwrap();
    let checkout = MemoryCheckout::new(&host, temp.path());
    let operator = ScriptedOperator::new([Decision::Skip, Decision::Skip]);
    let context = CliContext::new(config(), &host, &checkout, &operator);

    let out = context
        .execute(&Commands::Remediate {
            repo: RepoId::new("org", "service"),
            yes: true,
        })
        .unwrap();
    assert!(out.starts_with("Opened pull request #1"));
    assert!(operator.asked().is_empty());
}

#[test]
fn remediate_without_yes_asks_the_operator() {
    let host = organization();
    let temp = tempfile::tempdir().unwrap();
    let checkout = MemoryCheckout::new(&host, temp.path());
    let operator = ScriptedOperator::new([Decision::Skip]);
    let context = CliContext::new(config(), &host, &checkout, &operator);

    let out = context
        .execute(&Commands::Remediate {
            repo: RepoId::new("org", "service"),
            yes: false,
        })
        .unwrap();
    assert!(out.starts_with("Skipped org/service"));
    assert_eq!(operator.asked().len(), 1);
}

#[test]
fn remediate_failure_is_an_error() {
    let host = organization();
    let temp = tempfile::tempdir().unwrap();
    let checkout = MemoryCheckout::new(&host, temp.path());
    checkout.fail_operation("clone_branch", "disk full");
    let operator = ScriptedOperator::new([]);
    let context = CliContext::new(config(), &host, &checkout, &operator);

    assert!(context
        .execute(&Commands::Remediate {
            repo: RepoId::new("org", "service"),
            yes: true,
        })
        .is_err());
}

#[test]
fn batch_reports_each_repository() {
    let host = organization();
    let temp = tempfile::tempdir().unwrap();
    let checkout = MemoryCheckout::new(&host, temp.path());
    let operator = ScriptedOperator::new([]);
    let out = CliContext::new(config(), &host, &checkout, &operator)
        .execute(&Commands::Batch {
            owner: "org".to_string(),
            yes: true,
            format: "json".to_string(),
        })
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["quit"], false);
    assert_eq!(value["entries"][0]["repo"]["name"], "service");
    assert_eq!(value["entries"][0]["status"], "remediated");
    assert_eq!(value["entries"][0]["files"], 3);
}

#[test]
fn config_show_prints_toml() {
    let host = organization();
    let temp = tempfile::tempdir().unwrap();
    let checkout = MemoryCheckout::new(&host, temp.path());
    let operator = ScriptedOperator::new([]);
    let out = CliContext::new(config(), &host, &checkout, &operator)
        .execute(&Commands::Config {
            command: ConfigCommands::Show,
        })
        .unwrap();
    let parsed: ConformerConfig = toml::from_str(&out).unwrap();
    assert_eq!(parsed, config());
}
