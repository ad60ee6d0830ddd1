use clap::{CommandFactory, Parser};
use conformer::tooling::cli::{Cli, Commands, TemplateCommands};
use conformer::types::RepoId;

#[test]
fn parse_valid_command_matrix() {
    let cases: Vec<Vec<&str>> = vec![
        vec!["conformer", "template", "show"],
        vec!["conformer", "template", "show", "--template", "org/tpl"],
        vec!["conformer", "template", "show", "--format", "json"],
        vec!["conformer", "check", "org/repo"],
        vec!["conformer", "check", "org/repo", "--format", "json"],
        vec!["conformer", "scan", "org"],
        vec!["conformer", "remediate", "org/repo", "--yes"],
        vec!["conformer", "batch", "org", "-y", "--format", "json"],
        vec!["conformer", "config", "show"],
        vec!["conformer", "--no-cache", "--log-level", "debug", "scan", "org"],
        vec!["conformer", "--config", "/tmp/c.toml", "check", "org/repo"],
    ];

    for args in cases {
        let parsed = Cli::try_parse_from(args.clone());
        assert!(parsed.is_ok(), "expected valid parse for args: {args:?}");
    }
}

#[test]
fn parse_rejects_malformed_repository() {
    assert!(Cli::try_parse_from(["conformer", "check", "just-a-name"]).is_err());
    assert!(Cli::try_parse_from(["conformer", "remediate", "a/b/c"]).is_err());
    assert!(Cli::try_parse_from(["conformer", "--template", "x", "scan", "org"]).is_err());
}

#[test]
fn parse_rejects_unknown_format() {
    assert!(Cli::try_parse_from(["conformer", "check", "org/repo", "--format", "yaml"]).is_err());
}

#[test]
fn parse_requires_a_subcommand() {
    assert!(Cli::try_parse_from(["conformer"]).is_err());
    assert!(Cli::try_parse_from(["conformer", "template"]).is_err());
}

#[test]
fn parsed_values_land_in_commands() {
    let cli = Cli::try_parse_from(["conformer", "check", "org/repo"]).unwrap();
    assert_eq!(
        cli.command,
        Commands::Check {
            repo: RepoId::new("org", "repo"),
            format: "text".to_string(),
        }
    );

    let cli = Cli::try_parse_from(["conformer", "template", "show", "--template", "a/b"]).unwrap();
    assert_eq!(cli.template, Some(RepoId::new("a", "b")));
    assert!(matches!(
        cli.command,
        Commands::Template {
            command: TemplateCommands::Show { .. }
        }
    ));
}

#[test]
fn help_lists_every_command() {
    let help = Cli::command().render_help().to_string();
    for name in ["template", "check", "scan", "remediate", "batch", "config"] {
        assert!(help.contains(name), "help is missing {name}");
    }
}
