use std::collections::BTreeMap;

/// Parses `scontrol show job <id>` / `scontrol show node <name>` output: a
/// block of whitespace-separated `Key=Value` tokens, possibly spread across
/// several lines, where a value may itself contain spaces (e.g.
/// `Command=/path/run.sh --flag value`). Field order is not guaranteed and
/// unknown keys are kept rather than dropped, so callers can tolerate Slurm
/// versions that add fields this parser doesn't know about (spec §4.2).
pub fn parse_kv_block(text: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    let mut current_key: Option<String> = None;
    let mut current_value = String::new();

    for token in text.split_whitespace() {
        if let Some(eq) = token.find('=') {
            let (key, value) = token.split_at(eq);
            let value = &value[1..];
            if is_likely_key(key) {
                if let Some(k) = current_key.take() {
                    map.insert(k, std::mem::take(&mut current_value));
                }
                current_key = Some(key.to_string());
                current_value = value.to_string();
                continue;
            }
        }
        if current_key.is_some() {
            if !current_value.is_empty() {
                current_value.push(' ');
            }
            current_value.push_str(token);
        }
    }
    if let Some(k) = current_key.take() {
        map.insert(k, current_value);
    }
    map
}

/// A token before `=` looks like a scontrol field name if it's a short
/// identifier made of letters, digits, `_`, and `/` — rules out the common
/// false positive of a path or flag value that happens to contain `=`.
fn is_likely_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= 32
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '/')
        && key.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multi_line_block() {
        let text = "JobId=42 JobName=test\n   UserId=alice(1000) JobState=RUNNING\n   NumNodes=1 NumCPUs=4";
        let kv = parse_kv_block(text);
        assert_eq!(kv.get("JobId").unwrap(), "42");
        assert_eq!(kv.get("JobState").unwrap(), "RUNNING");
        assert_eq!(kv.get("NumCPUs").unwrap(), "4");
    }

    #[test]
    fn tolerates_unknown_keys_and_missing_fields() {
        let kv = parse_kv_block("JobId=1 SomeFutureField=xyz");
        assert_eq!(kv.get("SomeFutureField").unwrap(), "xyz");
        assert!(kv.get("NotPresent").is_none());
    }

    #[test]
    fn captures_multi_word_values() {
        let kv = parse_kv_block("Command=/opt/run.sh --flag value StdOut=/tmp/out");
        assert_eq!(kv.get("Command").unwrap(), "/opt/run.sh --flag value");
        assert_eq!(kv.get("StdOut").unwrap(), "/tmp/out");
    }
}
