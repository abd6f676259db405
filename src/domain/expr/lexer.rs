use super::ExprError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Int(i64),
    Str(String),
    Ident(String),
    And,
    Or,
    Not,
    In,
    True,
    False,
    None,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Plus,
    Minus,
    Star,
    FloorDiv,
    Percent,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

pub fn tokenize(src: &str) -> Result<Vec<Token>, ExprError> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        // r'...' and R"..." are raw strings; anything else starting with a letter is a name.
        if (c == 'r' || c == 'R') && matches!(chars.get(i + 1), Some('\'' | '"')) {
            let (s, next) = read_string(&chars, i + 1, true)?;
            tokens.push(Token::Str(s));
            i = next;
            continue;
        }

        if c == '\'' || c == '"' {
            let (s, next) = read_string(&chars, i, false)?;
            tokens.push(Token::Str(s));
            i = next;
            continue;
        }

        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '_') {
                i += 1;
            }
            let text: String = chars[start..i].iter().filter(|c| **c != '_').collect();
            let n = text
                .parse::<i64>()
                .map_err(|_| ExprError::Syntax(format!("invalid integer literal '{text}'")))?;
            tokens.push(Token::Int(n));
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            tokens.push(keyword(word));
            continue;
        }

        let next = chars.get(i + 1).copied();
        let (tok, width) = match (c, next) {
            ('=', Some('=')) => (Token::Eq, 2),
            ('!', Some('=')) => (Token::Ne, 2),
            ('<', Some('=')) => (Token::Le, 2),
            ('>', Some('=')) => (Token::Ge, 2),
            ('/', Some('/')) => (Token::FloorDiv, 2),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            (',', _) => (Token::Comma, 1),
            ('.', _) => (Token::Dot, 1),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('%', _) => (Token::Percent, 1),
            _ => {
                return Err(ExprError::Syntax(format!(
                    "unexpected character '{c}' at offset {i}"
                )))
            }
        };
        tokens.push(tok);
        i += width;
    }

    Ok(tokens)
}

fn keyword(word: String) -> Token {
    match word.as_str() {
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        "in" => Token::In,
        "True" => Token::True,
        "False" => Token::False,
        "None" => Token::None,
        _ => Token::Ident(word),
    }
}

fn read_string(chars: &[char], start: usize, raw: bool) -> Result<(String, usize), ExprError> {
    let quote = chars[start];
    let mut out = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        let c = chars[i];
        if c == quote {
            return Ok((out, i + 1));
        }
        if c == '\\' {
            let Some(&esc) = chars.get(i + 1) else {
                break;
            };
            if raw {
                // Raw strings keep the backslash but still cannot end on an escaped quote.
                out.push('\\');
                out.push(esc);
            } else {
                match esc {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    '0' => out.push('\0'),
                    '\\' | '\'' | '"' => out.push(esc),
                    other => {
                        out.push('\\');
                        out.push(other);
                    }
                }
            }
            i += 2;
            continue;
        }
        out.push(c);
        i += 1;
    }

    Err(ExprError::Syntax("unterminated string literal".into()))
}
