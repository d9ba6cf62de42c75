//! Knife command scripts for `exec`

use crate::domain::DomainError;

/// One command line from a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLine {
    /// 1-based line number in the source
    pub line: usize,
    pub argv: Vec<String>,
}

/// Split a command line into words with shell-style quoting.
///
/// Single quotes are literal, double quotes honour `\"` and `\\`, and a
/// backslash outside quotes escapes the next character.
pub fn tokenize(line: &str) -> Result<Vec<String>, DomainError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => current.push(ch),
                        None => return Err(DomainError::UnterminatedQuote(line.to_string())),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(ch @ ('"' | '\\')) => current.push(ch),
                            Some(ch) => {
                                current.push('\\');
                                current.push(ch);
                            }
                            None => {
                                return Err(DomainError::UnterminatedQuote(line.to_string()))
                            }
                        },
                        Some(ch) => current.push(ch),
                        None => return Err(DomainError::UnterminatedQuote(line.to_string())),
                    }
                }
            }
            '\\' => {
                in_word = true;
                if let Some(ch) = chars.next() {
                    current.push(ch);
                }
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

/// Parse a script: blank lines and `#` comments are skipped, a leading
/// `knife` word is optional.
pub fn parse_script(source: &str) -> Result<Vec<ScriptLine>, (usize, DomainError)> {
    let mut lines = Vec::new();
    for (idx, raw) in source.lines().enumerate() {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut argv = tokenize(trimmed).map_err(|e| (idx + 1, e))?;
        if argv.first().map(String::as_str) == Some("knife") {
            argv.remove(0);
        }
        if !argv.is_empty() {
            lines.push(ScriptLine {
                line: idx + 1,
                argv,
            });
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_quoted_words_when_tokenizing_then_keeps_spaces() {
        let words = tokenize(r#"search node 'role:web AND name:*' -a "ec2.public ip""#).unwrap();
        assert_eq!(
            words,
            vec!["search", "node", "role:web AND name:*", "-a", "ec2.public ip"]
        );
    }

    #[test]
    fn given_unterminated_quote_when_tokenizing_then_error() {
        assert!(tokenize("node show 'web").is_err());
    }

    #[test]
    fn given_script_when_parsing_then_skips_comments_and_strips_knife() {
        let script = "# list everything\n\nknife node list\nrole show base\n";
        let lines = parse_script(script).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].line, 3);
        assert_eq!(lines[0].argv, vec!["node", "list"]);
        assert_eq!(lines[1].argv, vec!["role", "show", "base"]);
    }

    #[test]
    fn given_bad_line_when_parsing_script_then_reports_line_number() {
        let err = parse_script("node list\nnode show \"x\n").unwrap_err();
        assert_eq!(err.0, 2);
    }
}
