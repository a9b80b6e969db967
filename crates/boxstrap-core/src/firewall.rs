use crate::error::Result;
use crate::host::{run_checked, Host};
use serde::Serialize;

/// Firewall front-ends, in preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FirewallTool {
    Ufw,
    Iptables,
}

impl FirewallTool {
    pub fn name(&self) -> &'static str {
        match self {
            FirewallTool::Ufw => "ufw",
            FirewallTool::Iptables => "iptables",
        }
    }
}

/// Pick the preferred firewall tool available on the host.
pub fn detect(host: &dyn Host) -> Option<FirewallTool> {
    if host.has_tool("ufw") {
        return Some(FirewallTool::Ufw);
    }
    if host.has_tool("iptables") {
        return Some(FirewallTool::Iptables);
    }
    None
}

/// Commands that open `ports` (tcp) with `tool`, in execution order.
///
/// For iptables the allow rules come before the default-drop policy so an
/// SSH session survives the change.
pub fn plan(tool: FirewallTool, ports: &[u16]) -> Vec<Vec<String>> {
    let mut cmds: Vec<Vec<String>> = Vec::new();
    match tool {
        FirewallTool::Ufw => {
            for port in ports {
                cmds.push(argv(&["ufw", "allow", &format!("{port}/tcp")]));
            }
            cmds.push(argv(&["ufw", "--force", "enable"]));
        }
        FirewallTool::Iptables => {
            cmds.push(argv(&["iptables", "-A", "INPUT", "-i", "lo", "-j", "ACCEPT"]));
            cmds.push(argv(&[
                "iptables",
                "-A",
                "INPUT",
                "-m",
                "conntrack",
                "--ctstate",
                "ESTABLISHED,RELATED",
                "-j",
                "ACCEPT",
            ]));
            for port in ports {
                cmds.push(argv(&[
                    "iptables",
                    "-A",
                    "INPUT",
                    "-p",
                    "tcp",
                    "--dport",
                    &port.to_string(),
                    "-j",
                    "ACCEPT",
                ]));
            }
            cmds.push(argv(&["iptables", "-P", "INPUT", "DROP"]));
        }
    }
    cmds
}

/// For an `iptables -A` append, the `iptables -C` probe that exits 0 when the
/// same rule is already in the chain. None for every other command.
///
/// ufw's `allow` is idempotent on its own and the policy change is a set, so
/// only appends need the probe.
pub fn existing_rule_check(cmd: &[String]) -> Option<Vec<String>> {
    match cmd {
        [program, flag, rule @ ..] if program == "iptables" && flag == "-A" => {
            let mut check = argv(&["iptables", "-C"]);
            check.extend(rule.iter().cloned());
            Some(check)
        }
        _ => None,
    }
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// Open `ports` with the best available tool.
///
/// Returns None, after logging a warning, when the host has neither tool.
/// That case is not an error.
pub fn configure(host: &dyn Host, ports: &[u16]) -> Result<Option<FirewallTool>> {
    let Some(tool) = detect(host) else {
        tracing::warn!("neither ufw nor iptables found; skipping firewall configuration");
        return Ok(None);
    };

    for cmd in plan(tool, ports) {
        if let Some(check) = existing_rule_check(&cmd) {
            let args: Vec<&str> = check[1..].iter().map(String::as_str).collect();
            if host.run(&check[0], &args, None)?.success() {
                tracing::debug!(rule = %cmd[2..].join(" "), "rule already present");
                continue;
            }
        }
        let args: Vec<&str> = cmd[1..].iter().map(String::as_str).collect();
        run_checked(host, &cmd[0], &args)?;
    }
    tracing::info!(tool = tool.name(), ?ports, "firewall configured");
    Ok(Some(tool))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined(cmds: &[Vec<String>]) -> Vec<String> {
        cmds.iter().map(|c| c.join(" ")).collect()
    }

    #[test]
    fn ufw_plan_allows_each_port_then_enables() {
        let cmds = joined(&plan(FirewallTool::Ufw, &[22, 80, 443]));
        assert_eq!(
            cmds,
            vec![
                "ufw allow 22/tcp",
                "ufw allow 80/tcp",
                "ufw allow 443/tcp",
                "ufw --force enable",
            ]
        );
    }

    #[test]
    fn iptables_plan_ends_with_default_drop() {
        let cmds = joined(&plan(FirewallTool::Iptables, &[22, 443]));
        assert_eq!(cmds.first().unwrap(), "iptables -A INPUT -i lo -j ACCEPT");
        assert!(cmds[1].contains("ESTABLISHED,RELATED"));
        assert!(cmds.contains(&"iptables -A INPUT -p tcp --dport 22 -j ACCEPT".to_string()));
        assert!(cmds.contains(&"iptables -A INPUT -p tcp --dport 443 -j ACCEPT".to_string()));
        assert_eq!(cmds.last().unwrap(), "iptables -P INPUT DROP");
    }

    #[test]
    fn appends_are_probed_with_check() {
        let cmds = plan(FirewallTool::Iptables, &[443]);
        let checks: Vec<String> = cmds
            .iter()
            .filter_map(|c| existing_rule_check(c))
            .map(|c| c.join(" "))
            .collect();
        assert_eq!(checks.len(), 3);
        assert!(checks.contains(&"iptables -C INPUT -p tcp --dport 443 -j ACCEPT".to_string()));
        assert!(checks.iter().all(|c| c.starts_with("iptables -C INPUT ")));
    }

    #[test]
    fn policy_and_ufw_commands_have_no_check() {
        assert!(existing_rule_check(&argv(&["iptables", "-P", "INPUT", "DROP"])).is_none());
        assert!(existing_rule_check(&argv(&["ufw", "allow", "443/tcp"])).is_none());
    }
}
