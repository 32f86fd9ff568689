use anyhow::{Result, anyhow};
use regex::Regex;

/// Translate a glob pattern into an anchored regex over forward-slash
/// relative paths. Supported: `**` (any depth), `*` (within a component),
/// `?` (single char), `{a,b,c}` (alternation, not nested).
pub fn glob_regex(pattern: &str) -> Result<Regex> {
    let mut re = String::from("^");
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    // "**/" may match zero directories
                    if chars.peek() == Some(&'/') {
                        chars.next();
                        re.push_str("(?:.*/)?");
                    } else {
                        re.push_str(".*");
                    }
                } else {
                    re.push_str("[^/]*");
                }
            }
            '?' => re.push_str("[^/]"),
            '{' => {
                let mut body = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    body.push(c);
                }
                if !closed {
                    return Err(anyhow!("unclosed '{{' in glob: {pattern}"));
                }
                let alts: Vec<String> =
                    body.split(',').map(|a| regex::escape(a.trim())).collect();
                re.push_str("(?:");
                re.push_str(&alts.join("|"));
                re.push(')');
            }
            _ => re.push_str(&regex::escape(&c.to_string())),
        }
    }

    re.push('$');
    Regex::new(&re).map_err(|e| anyhow!("bad glob {pattern}: {e}"))
}

pub fn compile_all(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns.iter().map(|p| glob_regex(p)).collect()
}

pub fn matches_any(regexes: &[Regex], rel: &str) -> bool {
    regexes.iter().any(|r| r.is_match(rel))
}
