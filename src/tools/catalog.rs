//! Built-in tool catalog
//!
//! Descriptors for the command-line tools the chain templates reference,
//! each backed by a [`CommandTool`] wrapper.

use crate::errors::Result;
use crate::tools::process::{CommandTool, OutputKind};
use crate::tools::registry::ToolCatalog;
use crate::tools::types::{ParamType, ParameterSpec, ToolCategory, ToolDescriptor};
use serde_json::json;
use std::time::Duration;

use crate::tools::process::ArgSpec::{Flag, Format, Literal, Param};

fn req(name: &str) -> ParameterSpec {
    ParameterSpec::required(name, ParamType::String)
}

fn opt(name: &str) -> ParameterSpec {
    ParameterSpec::optional(name, ParamType::String)
}

/// Build the catalog of built-in command tools
pub fn builtin_catalog(timeout: Duration) -> Result<ToolCatalog> {
    let mut catalog = ToolCatalog::new();
    let mut add = |descriptor: ToolDescriptor, tool: CommandTool| {
        catalog.register(descriptor, tool.with_timeout(timeout))
    };

    // Recon
    add(
        ToolDescriptor::new("nmap_scan", "Service/version port scan", ToolCategory::Recon)
            .param(req("target"))
            .param(opt("ports")),
        CommandTool::new("nmap", vec![Literal("-sV"), Flag("-p", "ports"), Param("target")])
            .with_output(OutputKind::Ports),
    )?;
    add(
        ToolDescriptor::new("nmap_quick", "Fast top-ports scan", ToolCategory::Recon)
            .param(req("target")),
        CommandTool::new("nmap", vec![Literal("-F"), Param("target")])
            .with_output(OutputKind::Ports),
    )?;
    add(
        ToolDescriptor::new("subdomain_enum", "Passive subdomain enumeration", ToolCategory::Recon)
            .param(req("domain")),
        CommandTool::new("subfinder", vec![Literal("-silent"), Literal("-d"), Param("domain")])
            .with_output(OutputKind::Lines("subdomains")),
    )?;
    add(
        ToolDescriptor::new("dns_enum", "DNS record lookup", ToolCategory::Recon)
            .param(req("domain"))
            .param(opt("record_type").with_default(json!("ANY"))),
        CommandTool::new("dig", vec![Param("domain"), Param("record_type"), Literal("+short")])
            .with_output(OutputKind::Lines("records")),
    )?;
    add(
        ToolDescriptor::new("whois_lookup", "Registrar lookup", ToolCategory::Recon)
            .param(req("domain")),
        CommandTool::new("whois", vec![Param("domain")]),
    )?;
    add(
        ToolDescriptor::new("whatweb", "Web technology fingerprinting", ToolCategory::Recon)
            .param(req("url")),
        CommandTool::new("whatweb", vec![Literal("--color=never"), Param("url")]),
    )?;
    add(
        ToolDescriptor::new("httpx_probe", "HTTP liveness probe", ToolCategory::Recon)
            .param(req("targets")),
        CommandTool::new("httpx", vec![Literal("-silent"), Literal("-u"), Param("targets")])
            .with_output(OutputKind::Lines("urls")),
    )?;
    add(
        ToolDescriptor::new("wafw00f", "WAF detection", ToolCategory::Recon).param(req("url")),
        CommandTool::new("wafw00f", vec![Param("url")]),
    )?;

    // Vulnerability scanning
    add(
        ToolDescriptor::new("vuln_scan", "Template-based vulnerability scan", ToolCategory::VulnScan)
            .param(req("target"))
            .param(opt("severity").with_default(json!("medium,high,critical"))),
        CommandTool::new(
            "nuclei",
            vec![Literal("-silent"), Literal("-u"), Param("target"), Flag("-severity", "severity")],
        )
        .with_output(OutputKind::Lines("vulnerabilities")),
    )?;
    add(
        ToolDescriptor::new("nikto_scan", "Web server misconfiguration scan", ToolCategory::VulnScan)
            .param(req("url")),
        CommandTool::new("nikto", vec![Literal("-h"), Param("url")]),
    )?;
    add(
        ToolDescriptor::new("sslscan", "TLS configuration scan", ToolCategory::VulnScan)
            .param(req("target")),
        CommandTool::new("sslscan", vec![Literal("--no-colour"), Param("target")]),
    )?;

    // Web attacks
    add(
        ToolDescriptor::new("dir_scan", "Content discovery", ToolCategory::WebAttack)
            .param(req("url"))
            .param(opt("wordlist").with_default(json!("/usr/share/wordlists/dirb/common.txt"))),
        CommandTool::new(
            "gobuster",
            vec![Literal("dir"), Literal("-q"), Literal("-u"), Param("url"), Flag("-w", "wordlist")],
        )
        .with_output(OutputKind::Lines("paths")),
    )?;
    add(
        ToolDescriptor::new("sqli_test", "SQL injection probe", ToolCategory::WebAttack)
            .param(req("url")),
        CommandTool::new("sqlmap", vec![Literal("-u"), Param("url"), Literal("--batch")]),
    )?;
    add(
        ToolDescriptor::new("xss_scan", "Reflected XSS probe", ToolCategory::WebAttack)
            .param(req("url")),
        CommandTool::new("xsstrike", vec![Literal("-u"), Param("url")]),
    )?;

    // Network attacks
    add(
        ToolDescriptor::new("brute_force", "Online credential brute force", ToolCategory::NetworkAttack)
            .param(req("target"))
            .param(req("service"))
            .param(opt("username").with_default(json!("root")))
            .param(opt("wordlist").with_default(json!("/usr/share/wordlists/rockyou.txt"))),
        CommandTool::new(
            "hydra",
            vec![
                Flag("-l", "username"),
                Flag("-P", "wordlist"),
                Param("target"),
                Param("service"),
            ],
        ),
    )?;
    add(
        ToolDescriptor::new("smb_enum", "SMB share and user enumeration", ToolCategory::NetworkAttack)
            .param(req("target")),
        CommandTool::new("enum4linux", vec![Literal("-a"), Param("target")]),
    )?;
    add(
        ToolDescriptor::new("ssh_audit", "SSH configuration audit", ToolCategory::NetworkAttack)
            .param(req("target")),
        CommandTool::new("ssh-audit", vec![Param("target")]),
    )?;

    // Exploitation
    add(
        ToolDescriptor::new("msf_search", "Search exploit modules", ToolCategory::Exploit)
            .param(req("query")),
        CommandTool::new("msfconsole", vec![Literal("-q"), Literal("-x"), Format("search {query}; exit")]),
    )?;
    add(
        ToolDescriptor::new("searchsploit", "Offline exploit database search", ToolCategory::Exploit)
            .param(req("query")),
        CommandTool::new("searchsploit", vec![Param("query")]),
    )?;

    // Cloud
    add(
        ToolDescriptor::new("aws_enum", "AWS identity enumeration", ToolCategory::Cloud)
            .param(opt("profile").with_default(json!("default"))),
        CommandTool::new(
            "aws",
            vec![Literal("sts"), Literal("get-caller-identity"), Flag("--profile", "profile")],
        ),
    )?;
    add(
        ToolDescriptor::new("kube_hunter", "Kubernetes attack surface scan", ToolCategory::Cloud)
            .param(req("target")),
        CommandTool::new("kube-hunter", vec![Literal("--remote"), Param("target")]),
    )?;

    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::registry::ToolRegistry;

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = builtin_catalog(Duration::from_secs(60)).unwrap();
        assert_eq!(catalog.len(), 21);
        assert!(catalog.contains("nmap_scan"));
        assert!(catalog.contains("vuln_scan"));
        assert!(catalog.contains("msf_search"));
    }

    #[test]
    fn test_every_tool_has_description() {
        let catalog = builtin_catalog(Duration::from_secs(60)).unwrap();
        for tool in catalog.list_tools() {
            assert!(!tool.description.is_empty(), "{} lacks description", tool.name);
        }
    }

    #[test]
    fn test_brute_force_requires_service() {
        let catalog = builtin_catalog(Duration::from_secs(60)).unwrap();
        let tool = catalog.get_tool("brute_force").unwrap();
        let required: Vec<_> = tool.required_parameters().map(|p| p.name.as_str()).collect();
        assert_eq!(required, vec!["target", "service"]);
    }
}
