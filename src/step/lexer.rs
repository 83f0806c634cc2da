//! Tokenizer for the STEP clear-text encoding.

use std::fmt;

use crate::error::{IfcGraphError, Result};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Keyword(String),
    InstanceName(u64),
    Integer(i64),
    Real(f64),
    String(String),
    Enum(String),
    Binary(String),
    Dollar,
    Star,
    LParen,
    RParen,
    Comma,
    Semicolon,
    Equals,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Keyword(k) => write!(f, "keyword {}", k),
            Token::InstanceName(id) => write!(f, "#{}", id),
            Token::Integer(i) => write!(f, "integer {}", i),
            Token::Real(r) => write!(f, "real {}", r),
            Token::String(_) => write!(f, "string"),
            Token::Enum(e) => write!(f, ".{}.", e),
            Token::Binary(_) => write!(f, "binary"),
            Token::Dollar => write!(f, "'$'"),
            Token::Star => write!(f, "'*'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::Comma => write!(f, "','"),
            Token::Semicolon => write!(f, "';'"),
            Token::Equals => write!(f, "'='"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub line: usize,
}

pub(crate) fn tokenize(input: &str) -> Result<Vec<Spanned>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start_line = line;
        let token = match c {
            '\n' => {
                line += 1;
                i += 1;
                continue;
            }
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                loop {
                    match chars.get(i) {
                        None => return Err(lex_error(start_line, "unterminated comment")),
                        Some('*') if chars.get(i + 1) == Some(&'/') => {
                            i += 2;
                            break;
                        }
                        Some('\n') => line += 1,
                        Some(_) => {}
                    }
                    i += 1;
                }
                continue;
            }
            '(' => {
                i += 1;
                Token::LParen
            }
            ')' => {
                i += 1;
                Token::RParen
            }
            ',' => {
                i += 1;
                Token::Comma
            }
            ';' => {
                i += 1;
                Token::Semicolon
            }
            '=' => {
                i += 1;
                Token::Equals
            }
            '$' => {
                i += 1;
                Token::Dollar
            }
            '*' => {
                i += 1;
                Token::Star
            }
            '#' => {
                let start = i + 1;
                i = start;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                if i == start {
                    return Err(lex_error(line, "expected digits after '#'"));
                }
                let digits: String = chars[start..i].iter().collect();
                let id = digits
                    .parse::<u64>()
                    .map_err(|_| lex_error(line, &format!("instance id out of range: #{}", digits)))?;
                Token::InstanceName(id)
            }
            '\'' => {
                let (raw, next, newlines) = read_quoted(&chars, i + 1)
                    .ok_or_else(|| lex_error(start_line, "unterminated string"))?;
                i = next;
                line += newlines;
                Token::String(decode_string(&raw).map_err(|msg| lex_error(start_line, &msg))?)
            }
            '"' => {
                let start = i + 1;
                let end = chars[start..]
                    .iter()
                    .position(|&ch| ch == '"')
                    .map(|p| start + p)
                    .ok_or_else(|| lex_error(line, "unterminated binary"))?;
                i = end + 1;
                Token::Binary(chars[start..end].iter().collect())
            }
            '.' if chars.get(i + 1).is_some_and(|ch| ch.is_ascii_alphabetic() || *ch == '_') => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_') {
                    end += 1;
                }
                if chars.get(end) != Some(&'.') {
                    return Err(lex_error(line, "unterminated enumeration"));
                }
                i = end + 1;
                Token::Enum(chars[start..end].iter().collect())
            }
            c if c.is_ascii_digit()
                || ((c == '-' || c == '+') && chars.get(i + 1).is_some_and(|ch| ch.is_ascii_digit())) =>
            {
                let (token, next) = read_number(&chars, i).map_err(|msg| lex_error(line, &msg))?;
                i = next;
                token
            }
            c if c.is_ascii_alphabetic() || c == '!' || c == '_' => {
                let start = i;
                i += 1;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '-')
                {
                    i += 1;
                }
                Token::Keyword(chars[start..i].iter().collect::<String>().to_ascii_uppercase())
            }
            other => {
                return Err(lex_error(line, &format!("unexpected character {:?}", other)));
            }
        };
        tokens.push(Spanned {
            token,
            line: start_line,
        });
    }

    Ok(tokens)
}

fn lex_error(line: usize, msg: &str) -> IfcGraphError {
    IfcGraphError::Parse(format!("line {}: {}", line, msg))
}

/// Read the body of a quoted string starting after the opening quote.
/// Returns the raw body (with `''` collapsed), the index after the closing
/// quote and the number of newlines consumed.
fn read_quoted(chars: &[char], mut i: usize) -> Option<(String, usize, usize)> {
    let mut raw = String::new();
    let mut newlines = 0;
    loop {
        match chars.get(i)? {
            '\'' if chars.get(i + 1) == Some(&'\'') => {
                raw.push('\'');
                i += 2;
            }
            '\'' => return Some((raw, i + 1, newlines)),
            ch => {
                if *ch == '\n' {
                    newlines += 1;
                } else if *ch != '\r' {
                    raw.push(*ch);
                }
                i += 1;
            }
        }
    }
}

fn read_number(chars: &[char], start: usize) -> std::result::Result<(Token, usize), String> {
    let mut i = start;
    if chars[i] == '-' || chars[i] == '+' {
        i += 1;
    }
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    let mut is_real = false;
    if chars.get(i) == Some(&'.') {
        is_real = true;
        i += 1;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }
    if is_real && matches!(chars.get(i), Some('E') | Some('e')) {
        i += 1;
        if matches!(chars.get(i), Some('-') | Some('+')) {
            i += 1;
        }
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }
    let text: String = chars[start..i].iter().collect();
    let token = if is_real {
        Token::Real(text.parse::<f64>().map_err(|_| format!("invalid real {}", text))?)
    } else {
        Token::Integer(text.parse::<i64>().map_err(|_| format!("invalid integer {}", text))?)
    };
    Ok((token, i))
}

fn starts_at(chars: &[char], i: usize, pat: &str) -> bool {
    let mut idx = i;
    for p in pat.chars() {
        if chars.get(idx) != Some(&p) {
            return false;
        }
        idx += 1;
    }
    true
}

fn hex_value(chars: &[char], start: usize, len: usize) -> std::result::Result<u32, String> {
    let text: String = chars
        .get(start..start + len)
        .ok_or_else(|| "truncated hex escape".to_string())?
        .iter()
        .collect();
    u32::from_str_radix(&text, 16).map_err(|_| format!("invalid hex escape {}", text))
}

/// Decode the ISO 10303-21 string control directives.
fn decode_string(raw: &str) -> std::result::Result<String, String> {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '\\' {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        if starts_at(&chars, i, "\\\\") {
            out.push('\\');
            i += 2;
        } else if starts_at(&chars, i, "\\S\\") {
            let base = chars.get(i + 3).ok_or("truncated \\S\\ escape")?;
            let ch = char::from_u32(*base as u32 + 128).ok_or("invalid \\S\\ escape")?;
            out.push(ch);
            i += 4;
        } else if starts_at(&chars, i, "\\X\\") {
            let value = hex_value(&chars, i + 3, 2)?;
            out.push(char::from_u32(value).ok_or("invalid \\X\\ escape")?);
            i += 5;
        } else if starts_at(&chars, i, "\\X2\\") {
            i += 4;
            let mut units = Vec::new();
            while !starts_at(&chars, i, "\\X0\\") {
                units.push(hex_value(&chars, i, 4)? as u16);
                i += 4;
            }
            out.push_str(&String::from_utf16(&units).map_err(|_| "invalid \\X2\\ sequence")?);
            i += 4;
        } else if starts_at(&chars, i, "\\X4\\") {
            i += 4;
            while !starts_at(&chars, i, "\\X0\\") {
                let value = hex_value(&chars, i, 8)?;
                out.push(char::from_u32(value).ok_or("invalid \\X4\\ code point")?);
                i += 8;
            }
            i += 4;
        } else if starts_at(&chars, i, "\\P") && chars.get(i + 3) == Some(&'\\') {
            // Code page switch; text is decoded as Latin-1 regardless.
            i += 4;
        } else {
            out.push('\\');
            i += 1;
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token> {
        tokenize(input).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn test_tokenize_instance() {
        let tokens = kinds("#12=IFCWALL('2O2Fr$t4X7Zf8NOew3FLOH',#5,$,*,.T.,(1.5,-2),\"0F\");");
        assert_eq!(tokens[0], Token::InstanceName(12));
        assert_eq!(tokens[1], Token::Equals);
        assert_eq!(tokens[2], Token::Keyword("IFCWALL".to_string()));
        assert!(tokens.contains(&Token::String("2O2Fr$t4X7Zf8NOew3FLOH".to_string())));
        assert!(tokens.contains(&Token::InstanceName(5)));
        assert!(tokens.contains(&Token::Dollar));
        assert!(tokens.contains(&Token::Star));
        assert!(tokens.contains(&Token::Enum("T".to_string())));
        assert!(tokens.contains(&Token::Real(1.5)));
        assert!(tokens.contains(&Token::Integer(-2)));
        assert!(tokens.contains(&Token::Binary("0F".to_string())));
        assert_eq!(tokens.last(), Some(&Token::Semicolon));
    }

    #[test]
    fn test_tokenize_reals() {
        assert_eq!(kinds("1."), vec![Token::Real(1.0)]);
        assert_eq!(kinds("-2.5E-3"), vec![Token::Real(-0.0025)]);
        assert_eq!(kinds("42"), vec![Token::Integer(42)]);
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(kinds("'it''s'"), vec![Token::String("it's".to_string())]);
        assert_eq!(kinds("'a\\\\b'"), vec![Token::String("a\\b".to_string())]);
        assert_eq!(
            kinds("'Stra\\X2\\00DF\\X0\\e'"),
            vec![Token::String("Straße".to_string())]
        );
        assert_eq!(kinds("'\\X\\E9t\\X\\E9'"), vec![Token::String("été".to_string())]);
        assert_eq!(
            kinds("'\\X4\\0001F600\\X0\\'"),
            vec![Token::String("\u{1F600}".to_string())]
        );
    }

    #[test]
    fn test_comments_and_lines() {
        let tokens = tokenize("/* header\n comment */\n#1=IFCA();").unwrap();
        assert_eq!(tokens[0].token, Token::InstanceName(1));
        assert_eq!(tokens[0].line, 3);
    }

    #[test]
    fn test_keywords_with_hyphen() {
        assert_eq!(
            kinds("ISO-10303-21;"),
            vec![Token::Keyword("ISO-10303-21".to_string()), Token::Semicolon]
        );
    }

    #[test]
    fn test_unterminated_string_reports_line() {
        let err = tokenize("\n\n'abc").unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_unexpected_character() {
        assert!(tokenize("#1=IFCA(@);").is_err());
    }
}
