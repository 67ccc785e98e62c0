//! Dependency gate
//!
//! Pre-flight check for the external executable a tool wraps. Advisory
//! only: a missing executable is reported, never raised.

use crate::tools::registry::ToolRegistry;
use crate::tools::types::ToolCategory;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Executable lookup on the search path
pub trait PathLookup: Send + Sync {
    fn exists(&self, program: &str) -> bool;
}

/// Lookup backed by `which`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPath;

impl PathLookup for SystemPath {
    fn exists(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

/// Exact tool → executable table
const STATIC_DEPENDENCIES: &[(&str, &str)] = &[
    ("nmap_scan", "nmap"),
    ("nmap_quick", "nmap"),
    ("quick_recon", "nmap"),
    ("subdomain_enum", "subfinder"),
    ("dns_enum", "dig"),
    ("zone_transfer", "dig"),
    ("whois_lookup", "whois"),
    ("theharvester", "theHarvester"),
    ("whatweb", "whatweb"),
    ("wafw00f", "wafw00f"),
    ("httpx_probe", "httpx"),
    ("vuln_scan", "nuclei"),
    ("nuclei_full", "nuclei"),
    ("nuclei_cve", "nuclei"),
    ("nuclei_complete_scan", "nuclei"),
    ("nikto_scan", "nikto"),
    ("sslscan", "sslscan"),
    ("testssl", "testssl.sh"),
    ("searchsploit", "searchsploit"),
    ("sqli_test", "sqlmap"),
    ("xss_scan", "xsstrike"),
    ("dir_scan", "gobuster"),
    ("gobuster", "gobuster"),
    ("ffuf", "ffuf"),
    ("brute_force", "hydra"),
    ("crackmapexec", "crackmapexec"),
    ("smb_enum", "enum4linux"),
    ("ssh_audit", "ssh-audit"),
    ("snmp_walk", "snmpwalk"),
    ("ldap_enum", "ldapsearch"),
    ("msf_search", "msfconsole"),
    ("msfvenom", "msfvenom"),
    ("aws_enum", "aws"),
    ("s3_scanner", "aws"),
    ("azure_enum", "az"),
    ("kube_hunter", "kube-hunter"),
];

/// Alternative executable names tried after the primary one
const ALIASES: &[(&str, &[&str])] = &[
    ("theHarvester", &["theharvester", "theHarvester.py"]),
    ("testssl.sh", &["testssl", "testssl.sh"]),
    ("ssh-audit", &["ssh_audit", "sshaudit"]),
    ("kube-hunter", &["kube_hunter", "kubehunter"]),
    ("enum4linux", &["enum4linux-ng", "enum4linux.pl"]),
];

/// How a heuristic rule matches the lower-cased tool name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    Prefix(&'static str),
    Contains(&'static str),
}

impl Matcher {
    fn matches(&self, name: &str) -> bool {
        match self {
            Matcher::Prefix(p) => name.starts_with(p),
            Matcher::Contains(s) => name.contains(s),
        }
    }
}

/// One heuristic: any matcher hit maps the tool to `dependency`
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub matchers: &'static [Matcher],
    pub dependency: &'static str,
}

/// Ordered heuristic table; the first matching rule wins
pub const RULES: &[Rule] = &[
    Rule {
        matchers: &[Matcher::Prefix("nmap"), Matcher::Contains("_nmap")],
        dependency: "nmap",
    },
    Rule {
        matchers: &[Matcher::Contains("nuclei")],
        dependency: "nuclei",
    },
    Rule {
        matchers: &[Matcher::Contains("sqlmap"), Matcher::Contains("sqli")],
        dependency: "sqlmap",
    },
    Rule {
        matchers: &[Matcher::Contains("nikto")],
        dependency: "nikto",
    },
    Rule {
        matchers: &[Matcher::Contains("gobuster"), Matcher::Contains("dir_scan")],
        dependency: "gobuster",
    },
    Rule {
        matchers: &[Matcher::Contains("hydra"), Matcher::Contains("brute")],
        dependency: "hydra",
    },
];

/// Result of a dependency check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyStatus {
    pub dependency: Option<String>,
    pub available: bool,
}

impl DependencyStatus {
    fn free() -> Self {
        Self {
            dependency: None,
            available: true,
        }
    }
}

/// Per-tool entry of a link report
#[derive(Debug, Clone, Serialize)]
pub struct ToolLink {
    pub tool: String,
    pub category: ToolCategory,
    pub linked: bool,
    pub dependency: Option<String>,
    pub dependency_ok: bool,
    pub requires_root: bool,
}

/// Registry-wide dependency report
#[derive(Debug, Clone, Serialize)]
pub struct LinkReport {
    pub total_tools: usize,
    pub ok: usize,
    pub missing: usize,
    pub tools: Vec<ToolLink>,
}

/// Tool dependency gate
pub struct DependencyGate {
    table: HashMap<&'static str, &'static str>,
    lookup: Arc<dyn PathLookup>,
}

impl Default for DependencyGate {
    fn default() -> Self {
        Self::new()
    }
}

impl DependencyGate {
    /// Create gate that searches the process PATH
    pub fn new() -> Self {
        Self::with_lookup(Arc::new(SystemPath))
    }

    /// Create gate with a custom executable lookup
    pub fn with_lookup(lookup: Arc<dyn PathLookup>) -> Self {
        Self {
            table: STATIC_DEPENDENCIES.iter().copied().collect(),
            lookup,
        }
    }

    /// Executable a tool needs, if any
    pub fn dependency_for(&self, tool_name: &str) -> Option<&'static str> {
        let tool_name = tool_name.trim();
        if let Some(dep) = self.table.get(tool_name) {
            return Some(*dep);
        }
        let name = tool_name.to_lowercase();
        RULES
            .iter()
            .find(|rule| rule.matchers.iter().any(|m| m.matches(&name)))
            .map(|rule| rule.dependency)
    }

    /// Check whether the executable for a tool is present
    pub fn check(&self, tool_name: &str) -> DependencyStatus {
        let Some(dependency) = self.dependency_for(tool_name) else {
            return DependencyStatus::free();
        };
        let available = self.is_installed(dependency);
        if !available {
            debug!(tool = tool_name, dependency, "dependency not found on PATH");
        }
        DependencyStatus {
            dependency: Some(dependency.to_string()),
            available,
        }
    }

    fn is_installed(&self, program: &str) -> bool {
        if self.lookup.exists(program) {
            return true;
        }
        ALIASES
            .iter()
            .find(|(primary, _)| *primary == program)
            .map(|(_, alts)| alts.iter().any(|alt| self.lookup.exists(alt)))
            .unwrap_or(false)
    }

    /// Dependency status of every registered tool
    pub fn link_status(&self, registry: &dyn ToolRegistry) -> LinkReport {
        let tools: Vec<ToolLink> = registry
            .list_tools()
            .iter()
            .map(|tool| {
                let status = self.check(&tool.name);
                ToolLink {
                    tool: tool.name.clone(),
                    category: tool.category,
                    linked: true,
                    dependency: status.dependency,
                    dependency_ok: status.available,
                    requires_root: tool.requires_root,
                }
            })
            .collect();

        let ok = tools.iter().filter(|t| t.dependency_ok).count();
        LinkReport {
            total_tools: tools.len(),
            ok,
            missing: tools.len() - ok,
            tools,
        }
    }
}
