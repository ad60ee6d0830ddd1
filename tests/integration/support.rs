use conformer::remote::MemoryHost;
use conformer::types::{Permission, RepoId};

pub const TEMPLATE_FILES: [&str; 10] = [
    "README.md",
    "LICENSE",
    "CONTRIBUTING.md",
    "CODE_OF_CONDUCT.md",
    ".github/pull_request_template.md",
    ".github/ISSUE_TEMPLATE/bug_report.md",
    ".github/ISSUE_TEMPLATE/feature_request.md",
    "docs/index.md",
    "docs/install.md",
    "docs/usage.md",
];

pub fn template_repo() -> RepoId {
    RepoId::new("org", "template")
}

/// An organization with the ten-file template and `org/service`, which
/// carries the first seven of them.
pub fn organization() -> MemoryHost {
    let host = MemoryHost::new("bot");
    let template = template_repo();
    host.add_repository(&template, "main");
    for path in TEMPLATE_FILES {
        host.put_file(&template, path, format!("template {}", path).as_bytes());
    }

    let service = RepoId::new("org", "service");
    host.add_repository(&service, "main");
    for path in &TEMPLATE_FILES[..7] {
        host.put_file(&service, path, b"own content");
    }
    host.set_permission(&service, "bot", Permission::Write);
    host
}
