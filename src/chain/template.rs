//! Phase template for automatic chain construction

use crate::target::TargetKind;
use crate::tools::types::ToolCategory;
use std::collections::BTreeSet;

/// Which target kinds a template step applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Applies {
    Any,
    Web,
    Host,
    Network,
}

impl Applies {
    fn accepts(&self, kind: TargetKind) -> bool {
        match self {
            Applies::Any => true,
            Applies::Web => kind.is_web(),
            Applies::Host => kind.is_host(),
            Applies::Network => matches!(kind, TargetKind::Ip | TargetKind::Network),
        }
    }
}

/// One step of the template; node id equals the tool name
#[derive(Debug, Clone, Copy)]
pub struct TemplateStep {
    pub tool: &'static str,
    pub phase: ToolCategory,
    applies: Applies,
    /// Earlier steps whose findings this one consumes
    pub after: &'static [&'static str],
}

const fn step(
    tool: &'static str,
    phase: ToolCategory,
    applies: Applies,
    after: &'static [&'static str],
) -> TemplateStep {
    TemplateStep {
        tool,
        phase,
        applies,
        after,
    }
}

/// Steps in phase order
const STEPS: &[TemplateStep] = &[
    step("nmap_scan", ToolCategory::Recon, Applies::Any, &[]),
    step("subdomain_enum", ToolCategory::Recon, Applies::Web, &[]),
    step("whatweb", ToolCategory::Recon, Applies::Web, &[]),
    step(
        "vuln_scan",
        ToolCategory::VulnScan,
        Applies::Any,
        &["nmap_scan", "subdomain_enum", "whatweb"],
    ),
    step("nikto_scan", ToolCategory::VulnScan, Applies::Web, &["nmap_scan", "whatweb"]),
    step("dir_scan", ToolCategory::WebAttack, Applies::Web, &["whatweb"]),
    step("sqli_test", ToolCategory::WebAttack, Applies::Web, &["vuln_scan", "dir_scan"]),
    step("brute_force", ToolCategory::NetworkAttack, Applies::Host, &["nmap_scan"]),
    step("smb_enum", ToolCategory::NetworkAttack, Applies::Network, &["nmap_scan"]),
    step("msf_search", ToolCategory::Exploit, Applies::Any, &["vuln_scan"]),
];

/// Phases enabled by a set of objectives
///
/// `recon` and `vuln` enable reconnaissance and vulnerability scanning;
/// `web` and `network` add the matching attack phase; `exploit`, `full` or
/// no recognised objective enable everything.
pub fn phases_for(objectives: &[String]) -> BTreeSet<ToolCategory> {
    use ToolCategory::*;

    let mut phases = BTreeSet::new();
    let mut recognised = false;
    for objective in objectives {
        let added: &[ToolCategory] = match objective.trim().to_lowercase().as_str() {
            "recon" | "vuln" | "vuln_scan" => &[Recon, VulnScan],
            "web" => &[Recon, VulnScan, WebAttack],
            "network" => &[Recon, VulnScan, NetworkAttack],
            "exploit" | "full" => &[Recon, VulnScan, WebAttack, NetworkAttack, Exploit],
            _ => continue,
        };
        recognised = true;
        phases.extend(added.iter().copied());
    }
    if !recognised {
        phases.extend([Recon, VulnScan, WebAttack, NetworkAttack, Exploit]);
    }
    phases
}

/// Template steps applicable to a target kind and objectives
pub fn plan(kind: TargetKind, objectives: &[String]) -> Vec<TemplateStep> {
    let phases = phases_for(objectives);
    STEPS
        .iter()
        .filter(|s| phases.contains(&s.phase) && s.applies.accepts(kind))
        .copied()
        .collect()
}
