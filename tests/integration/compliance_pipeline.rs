use super::support::{organization, template_repo, TEMPLATE_FILES};
use conformer::compliance::evaluate;
use conformer::remediation::{
    AbortReason, Decision, Gate, Outcome, RemediationSettings, RemediationState, Remediator,
    ScriptedOperator,
};
use conformer::remote::memory::MemoryCheckout;
use conformer::stage::stage;
use conformer::template::Template;
use conformer::types::RepoId;
use walkdir::WalkDir;

#[test]
fn missing_files_are_counted_and_staged() {
    let host = organization();
    let template = Template::load(&host, &template_repo()).unwrap();
    assert_eq!(template.file_list().len(), TEMPLATE_FILES.len());

    let report = evaluate(&host, &RepoId::new("org", "service"), &template).unwrap();
    assert_eq!(report.missing_count, 3);
    assert_eq!(
        report.missing_paths(),
        vec!["docs/index.md", "docs/install.md", "docs/usage.md"]
    );

    let temp = tempfile::tempdir().unwrap();
    let diff = report.diff.as_ref().unwrap();
    let manifest = stage(diff, temp.path(), &host).unwrap();
    assert_eq!(manifest.len(), 3);
    assert_eq!(manifest.written().len(), 3);

    let staged: Vec<_> = WalkDir::new(temp.path())
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .collect();
    assert_eq!(staged.len(), 3);
    assert_eq!(
        std::fs::read_to_string(temp.path().join("docs/usage.md")).unwrap(),
        "template docs/usage.md"
    );
}

#[test]
fn compliant_repository_has_empty_diff() {
    let host = organization();
    let template = Template::load(&host, &template_repo()).unwrap();
    let report = evaluate(&host, &template_repo(), &template).unwrap();
    assert!(report.is_compliant());
    assert_eq!(report.missing_count, 0);
}

#[test]
fn remediation_pushes_missing_files_and_opens_pull_request() {
    let host = organization();
    let template = Template::load(&host, &template_repo()).unwrap();
    let temp = tempfile::tempdir().unwrap();
    let checkout = MemoryCheckout::new(&host, temp.path());
    let operator = ScriptedOperator::new([Decision::Proceed, Decision::Proceed]);
    let remediator = Remediator::new(&host, &checkout, &operator, RemediationSettings::default());

    let service = RepoId::new("org", "service");
    let run = remediator.remediate(&template, &service).unwrap();

    assert_eq!(run.final_state(), RemediationState::Done);
    let pull_request = match &run.outcome {
        Outcome::Done {
            pull_request,
            updated,
            written,
        } => {
            assert!(!updated);
            assert_eq!(written.len(), 3);
            pull_request.clone()
        }
        other => panic!("unexpected outcome {:?}", other),
    };
    assert_eq!(pull_request.head_owner, "org");
    assert_eq!(host.pull_requests(&service).len(), 1);

    let pushes = host.pushes();
    assert_eq!(pushes.len(), 1);
    assert_eq!(
        pushes[0].files,
        vec!["docs/index.md", "docs/install.md", "docs/usage.md"]
    );
    assert_eq!(
        operator.asked(),
        vec![
            (Gate::BeforeStaging, service.clone()),
            (Gate::BeforePush, service.clone())
        ]
    );
    // The working copy is gone once the run ends.
    assert!(!temp.path().join("org").join("service").exists());
}

#[test]
fn second_run_updates_the_open_pull_request() {
    let host = organization();
    let template = Template::load(&host, &template_repo()).unwrap();
    let temp = tempfile::tempdir().unwrap();
    let checkout = MemoryCheckout::new(&host, temp.path());
    let operator = ScriptedOperator::new([Decision::Proceed; 4]);
    let remediator = Remediator::new(&host, &checkout, &operator, RemediationSettings::default());
    let service = RepoId::new("org", "service");

    remediator.remediate(&template, &service).unwrap();
    let again = remediator.remediate(&template, &service).unwrap();

    assert!(matches!(again.outcome, Outcome::Done { updated: true, .. }));
    assert_eq!(host.pull_requests(&service).len(), 1);
}

#[test]
fn declining_first_gate_touches_nothing() {
    let host = organization();
    let template = Template::load(&host, &template_repo()).unwrap();
    let temp = tempfile::tempdir().unwrap();
    let checkout = MemoryCheckout::new(&host, temp.path());
    let operator = ScriptedOperator::new([Decision::Skip]);
    let remediator = Remediator::new(&host, &checkout, &operator, RemediationSettings::default());
    let service = RepoId::new("org", "service");

    let run = remediator.remediate(&template, &service).unwrap();
    assert_eq!(
        run.outcome,
        Outcome::Aborted(AbortReason::Declined(Gate::BeforeStaging))
    );
    assert_eq!(host.count_calls("create_branch"), 0);
    assert!(host.pushes().is_empty());
}
