// Turning model text into plan commands

use super::types::PlanCommand;
use serde_json::Value;

fn parse_json_object(content: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(content.trim()) {
        return Some(value);
    }
    // Models like to wrap JSON in prose or code fences
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&content[start..=end]).ok()
}

/// Read `{"commands":[{"cmd","explain"}]}` from a chat reply.
///
/// Unparseable replies or a missing `commands` array give an empty plan.
/// Entries without a usable `cmd` are skipped.
pub fn parse_plan_response(content: &str) -> Vec<PlanCommand> {
    let Some(value) = parse_json_object(content) else {
        return Vec::new();
    };
    let Some(items) = value.get("commands").and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::String(cmd) => Some(PlanCommand::new(cmd.trim(), "")),
            Value::Object(map) => {
                let cmd = map.get("cmd").and_then(Value::as_str)?.trim();
                let explain = map.get("explain").and_then(Value::as_str).unwrap_or("");
                Some(PlanCommand::new(cmd, explain))
            }
            _ => None,
        })
        .filter(|c| !c.cmd.is_empty())
        .collect()
}

/// Shell-command candidates in interpreter output: lines starting with `$` or `#`
pub fn extract_candidate_commands(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let rest = line.trim_start();
            let rest = rest.strip_prefix('$').or_else(|| rest.strip_prefix('#'))?;
            let cmd = rest.trim();
            (!cmd.is_empty()).then(|| cmd.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strict_json() {
        let commands = parse_plan_response(
            r#"{"commands":[{"cmd":"df -h","explain":"disk usage"},{"cmd":"uptime"}]}"#,
        );
        assert_eq!(
            commands,
            vec![
                PlanCommand::new("df -h", "disk usage"),
                PlanCommand::new("uptime", ""),
            ]
        );
    }

    #[test]
    fn test_parse_embedded_json() {
        let reply = "Sure! Here is the plan:\n```json\n{\"commands\":[{\"cmd\":\"ls\"}]}\n```";
        assert_eq!(parse_plan_response(reply), vec![PlanCommand::new("ls", "")]);
    }

    #[test]
    fn test_parse_garbage_is_empty() {
        assert!(parse_plan_response("I cannot help with that").is_empty());
        assert!(parse_plan_response(r#"{"steps":[]}"#).is_empty());
        assert!(parse_plan_response(r#"{"commands":[{"cmd":"  "},{"explain":"x"}]}"#).is_empty());
    }

    #[test]
    fn test_extract_candidates() {
        let output = "I'll check the disk.\n$ df -h\n  # du -sh /var\n$\nDone.";
        assert_eq!(extract_candidate_commands(output), vec!["df -h", "du -sh /var"]);
    }
}
