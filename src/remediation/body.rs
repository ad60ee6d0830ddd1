//! Pull request description.

use crate::remediation::RemediationSettings;
use crate::stage::ChangeManifest;
use crate::types::RepoId;
use std::fmt::Write as _;

/// Compose the pull request body: a summary sentence, one link per manifest
/// entry into the remediation branch, and the attribution line.
pub fn render(
    settings: &RemediationSettings,
    template: &RepoId,
    target: &RepoId,
    destination: &RepoId,
    manifest: &ChangeManifest,
) -> String {
    let web = settings.web_url.as_str();
    let mut body = format!(
        "This PR adds missing files to make the `{}` repository compliant with the [{}]({})'s [{}]({}) template.",
        target.full_name(),
        template.owner,
        template.owner_url(web),
        template.name,
        template.html_url(web),
    );

    body.push_str("\n\nChanges made:\n");
    let branch_link = format!("{}/tree/{}", destination.html_url(web), settings.branch);
    for (name, descriptor) in manifest.entries() {
        let _ = writeln!(body, " - Added [{}]({}/{})", name, branch_link, descriptor.path);
    }

    let _ = write!(
        body,
        "\nThis PR was automatically generated by the [{}]({}).",
        settings.attribution_name, settings.attribution_url
    );
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryHost;
    use crate::stage::stage;
    use crate::tree::TreeBuilder;

    #[test]
    fn test_body_links_every_entry() {
        let template = RepoId::new("org", "template");
        let host = MemoryHost::new("bot");
        host.add_repository(&template, "main");
        host.put_file(&template, "LICENSE", b"MIT");
        host.put_file(&template, ".github/CODEOWNERS", b"* @org");
        let tree = TreeBuilder::new(&host).build(&template, "").unwrap();
        let temp = tempfile::tempdir().unwrap();
        let manifest = stage(&tree, temp.path(), &host).unwrap();

        let settings = RemediationSettings::default();
        let target = RepoId::new("org", "project");
        let fork = RepoId::new("bot", "project");
        let body = render(&settings, &template, &target, &fork, &manifest);

        assert!(body.starts_with(
            "This PR adds missing files to make the `org/project` repository compliant with the \
             [org](https://github.com/org)'s [template](https://github.com/org/template) template."
        ));
        assert!(body.contains(&format!(
            " - Added [CODEOWNERS](https://github.com/bot/project/tree/{}/.github/CODEOWNERS)\n",
            settings.branch
        )));
        assert!(body.contains(" - Added [LICENSE]("));
        assert!(body.ends_with(&format!(
            "generated by the [{}]({}).",
            settings.attribution_name, settings.attribution_url
        )));
    }
}
