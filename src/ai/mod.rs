//! Target analysis and plan generation
//!
//! [`AiEngine`] is the boundary to whatever produces free-text analysis.
//! [`PlaybookAi`] is the built-in deterministic implementation: a fixed
//! five-phase playbook filtered by target kind and objectives.

use crate::chain::template::phases_for;
use crate::target::{TargetDescriptor, TargetKind};
use crate::tools::registry::ToolRegistry;
use crate::tools::types::ToolCategory;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Structured analysis of one target
#[derive(Debug, Clone, Serialize)]
pub struct TargetAnalysis {
    pub target: TargetDescriptor,
    pub summary: String,
    pub recommended_phases: Vec<String>,
    pub recommended_tools: Vec<String>,
    pub request: String,
    pub generated_at: DateTime<Utc>,
}

/// One phase of an attack plan
#[derive(Debug, Clone, Serialize)]
pub struct PlanPhase {
    pub phase: u8,
    pub name: String,
    pub description: String,
    pub tools: Vec<String>,
    /// Subset of `tools` present in the registry
    pub available: Vec<String>,
}

/// Phased attack plan
#[derive(Debug, Clone, Serialize)]
pub struct AttackPlan {
    pub target: String,
    pub generated_at: DateTime<Utc>,
    pub phases: Vec<PlanPhase>,
    pub recommendations: Vec<String>,
}

/// Analysis collaborator
pub trait AiEngine: Send + Sync {
    fn analyze_target(&self, target: &TargetDescriptor, context: &str) -> TargetAnalysis;

    fn generate_plan(&self, target: &TargetDescriptor, objectives: &[String]) -> AttackPlan;
}

struct PlaybookPhase {
    name: &'static str,
    description: &'static str,
    category: ToolCategory,
    web_only: bool,
    tools: &'static [&'static str],
}

const PLAYBOOK: &[PlaybookPhase] = &[
    PlaybookPhase {
        name: "Reconnaissance",
        description: "Collect open ports, subdomains, DNS records and technologies",
        category: ToolCategory::Recon,
        web_only: false,
        tools: &["nmap_scan", "subdomain_enum", "dns_enum", "whatweb"],
    },
    PlaybookPhase {
        name: "Vulnerability scanning",
        description: "Scan the discovered surface with automated scanners",
        category: ToolCategory::VulnScan,
        web_only: false,
        tools: &["vuln_scan", "nikto_scan", "sslscan"],
    },
    PlaybookPhase {
        name: "Web application testing",
        description: "Probe web applications for common injection flaws",
        category: ToolCategory::WebAttack,
        web_only: true,
        tools: &["dir_scan", "sqli_test", "xss_scan"],
    },
    PlaybookPhase {
        name: "Exploitation",
        description: "Match findings against known exploits",
        category: ToolCategory::Exploit,
        web_only: false,
        tools: &["msf_search", "searchsploit"],
    },
    PlaybookPhase {
        name: "Post-exploitation",
        description: "Privilege escalation and persistence checks",
        category: ToolCategory::Exploit,
        web_only: false,
        tools: &["linpeas", "winpeas", "linux_exploit_suggester"],
    },
];

const RECOMMENDATIONS: &[&str] = &[
    "Start with passive collection to avoid triggering alerts",
    "Prioritise high-severity findings once the attack surface is known",
    "Choose attack vectors that match the identified technology stack",
    "Keep scan rates low on production targets",
    "Record every step for the final report",
];

/// Deterministic playbook engine
#[derive(Default)]
pub struct PlaybookAi {
    registry: Option<Arc<dyn ToolRegistry>>,
}

impl PlaybookAi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark plan tools that the registry actually provides
    pub fn with_registry(registry: Arc<dyn ToolRegistry>) -> Self {
        Self {
            registry: Some(registry),
        }
    }

    fn available(&self, tools: &[&str]) -> Vec<String> {
        match &self.registry {
            Some(registry) => tools
                .iter()
                .filter(|t| registry.get_tool(t).is_some())
                .map(|t| t.to_string())
                .collect(),
            None => Vec::new(),
        }
    }

    fn phases(&self, kind: TargetKind, objectives: &[String]) -> Vec<PlanPhase> {
        let enabled = phases_for(objectives);
        PLAYBOOK
            .iter()
            .enumerate()
            .filter(|(_, p)| enabled.contains(&p.category))
            .filter(|(_, p)| !p.web_only || kind.is_web() || kind == TargetKind::Unknown)
            .map(|(i, p)| PlanPhase {
                phase: (i + 1) as u8,
                name: p.name.to_string(),
                description: p.description.to_string(),
                tools: p.tools.iter().map(|t| t.to_string()).collect(),
                available: self.available(p.tools),
            })
            .collect()
    }
}

impl AiEngine for PlaybookAi {
    fn analyze_target(&self, target: &TargetDescriptor, context: &str) -> TargetAnalysis {
        let summary = match target.kind {
            TargetKind::Url => format!("Web application at {}", target.value),
            TargetKind::Domain => format!("Domain {}; enumerate subdomains first", target.value),
            TargetKind::Ip => format!("Single host {}", target.value),
            TargetKind::Network => {
                format!("Network range {}; sweep live hosts before service scans", target.value)
            }
            TargetKind::Unknown => "No target recognised".to_string(),
        };
        let phases = if target.is_unknown() {
            Vec::new()
        } else {
            self.phases(target.kind, &[])
        };

        TargetAnalysis {
            target: target.clone(),
            summary,
            recommended_phases: phases.iter().map(|p| p.name.clone()).collect(),
            recommended_tools: phases
                .first()
                .map(|p| p.tools.clone())
                .unwrap_or_default(),
            request: context.to_string(),
            generated_at: Utc::now(),
        }
    }

    fn generate_plan(&self, target: &TargetDescriptor, objectives: &[String]) -> AttackPlan {
        AttackPlan {
            target: target.value.clone(),
            generated_at: Utc::now(),
            phases: self.phases(target.kind, objectives),
            recommendations: RECOMMENDATIONS.iter().map(|r| r.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::catalog::builtin_catalog;
    use std::time::Duration;

    #[test]
    fn test_full_plan_for_url() {
        let ai = PlaybookAi::new();
        let plan = ai.generate_plan(&TargetDescriptor::new(TargetKind::Url, "https://a.io"), &[]);
        let numbers: Vec<u8> = plan.phases.iter().map(|p| p.phase).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
        assert_eq!(plan.recommendations.len(), 5);
    }

    #[test]
    fn test_plan_for_ip_drops_web_phase() {
        let ai = PlaybookAi::new();
        let plan = ai.generate_plan(&TargetDescriptor::new(TargetKind::Ip, "10.0.0.1"), &["recon".into()]);
        let names: Vec<&str> = plan.phases.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Reconnaissance", "Vulnerability scanning"]);
    }

    #[test]
    fn test_available_tools_marked() {
        let catalog = builtin_catalog(Duration::from_secs(10)).unwrap();
        let ai = PlaybookAi::with_registry(Arc::new(catalog));
        let plan = ai.generate_plan(&TargetDescriptor::new(TargetKind::Domain, "example.com"), &[]);
        let post = plan.phases.iter().find(|p| p.name == "Post-exploitation").unwrap();
        assert!(post.available.is_empty());
        assert_eq!(plan.phases[0].available.len(), 4);
    }

    #[test]
    fn test_analyze_unknown_target() {
        let analysis = PlaybookAi::new().analyze_target(&TargetDescriptor::unknown(), "hello");
        assert!(analysis.recommended_phases.is_empty());
        assert_eq!(analysis.request, "hello");
    }

    #[test]
    fn test_analyze_domain() {
        let analysis = PlaybookAi::new()
            .analyze_target(&TargetDescriptor::new(TargetKind::Domain, "example.com"), "scan it");
        assert!(analysis.summary.contains("example.com"));
        assert_eq!(analysis.recommended_tools[0], "nmap_scan");
    }
}
