//! JSON词法分析器：逐token读取并跟踪字符偏移
//!
//! 与结构解析器解耦，可以在解析失败后单独驱动到底，
//! 为错误恢复提供精确的出错位置（见 recovery 模块）

use thiserror::Error;

/// 词法错误：描述信息 + 出错的字符偏移
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} (偏移 {position})")]
pub struct TokenError {
    pub message: String,
    pub position: usize,
}

impl TokenError {
    fn new(message: impl Into<String>, position: usize) -> Self {
        Self { message: message.into(), position }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    ObjectStart,
    ObjectEnd,
    ArrayStart,
    ArrayEnd,
    Comma,
    Colon,
    Str(String),
    Number(serde_json::Number),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bracket {
    Curly,
    Square,
}

pub struct Tokenizer {
    chars: Vec<char>,
    pos: usize,
    depth: Vec<Bracket>,
}

impl Tokenizer {
    pub fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            depth: Vec::new(),
        }
    }

    /// 当前字符偏移；每消费一个token/字符后单调递增
    pub fn position(&self) -> usize {
        self.pos
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    /// 读取下一个token；输入耗尽返回 Ok(None)
    pub fn read(&mut self) -> Result<Option<Token>, TokenError> {
        while matches!(self.peek(), Some(' ' | '\t' | '\n' | '\r')) {
            self.pos += 1;
        }
        let Some(c) = self.peek() else {
            return Ok(None);
        };
        match c {
            '{' => {
                self.pos += 1;
                self.depth.push(Bracket::Curly);
                Ok(Some(Token::ObjectStart))
            }
            '[' => {
                self.pos += 1;
                self.depth.push(Bracket::Square);
                Ok(Some(Token::ArrayStart))
            }
            '}' => self.close(Bracket::Curly, '}').map(|_| Some(Token::ObjectEnd)),
            ']' => self.close(Bracket::Square, ']').map(|_| Some(Token::ArrayEnd)),
            ',' => {
                self.pos += 1;
                Ok(Some(Token::Comma))
            }
            ':' => {
                self.pos += 1;
                Ok(Some(Token::Colon))
            }
            '"' => self.read_string().map(Some),
            c if c == '-' || c.is_ascii_digit() => self.read_number().map(Some),
            c if c.is_ascii_alphabetic() => self.read_keyword().map(Some),
            other => Err(TokenError::new(
                format!("字符串之外出现意外字符 '{}'", other),
                self.pos,
            )),
        }
    }

    fn close(&mut self, expected: Bracket, ch: char) -> Result<(), TokenError> {
        match self.depth.pop() {
            Some(b) if b == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(_) => Err(TokenError::new(
                format!("结构字符不配对: '{}' 与最近的开括号不匹配", ch),
                self.pos,
            )),
            None => Err(TokenError::new(
                format!("结构字符不配对: 多余的 '{}'", ch),
                self.pos,
            )),
        }
    }

    fn read_string(&mut self) -> Result<Token, TokenError> {
        // 未终结的字符串报开始引号的位置，而不是输入末尾
        let start = self.pos;
        self.pos += 1;
        let mut buf = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(TokenError::new("字符串缺少结束引号", start));
            };
            self.pos += 1;
            match c {
                '"' => return Ok(Token::Str(buf)),
                '\\' => {
                    let esc_pos = self.pos - 1;
                    buf.push(self.read_escape(start, esc_pos)?);
                }
                _ => buf.push(c),
            }
        }
    }

    fn read_escape(&mut self, string_start: usize, esc_pos: usize) -> Result<char, TokenError> {
        let Some(c) = self.peek() else {
            return Err(TokenError::new("字符串缺少结束引号", string_start));
        };
        self.pos += 1;
        match c {
            '"' => Ok('"'),
            '\\' => Ok('\\'),
            '/' => Ok('/'),
            'b' => Ok('\u{0008}'),
            'f' => Ok('\u{000c}'),
            'n' => Ok('\n'),
            'r' => Ok('\r'),
            't' => Ok('\t'),
            'u' => self.read_unicode_escape(esc_pos),
            other => Err(TokenError::new(
                format!("无效的转义序列 '\\{}'", other),
                esc_pos,
            )),
        }
    }

    fn read_unicode_escape(&mut self, esc_pos: usize) -> Result<char, TokenError> {
        let high = self.read_hex4(esc_pos)?;
        if (0xD800..=0xDBFF).contains(&high) {
            // 高位代理：后面必须紧跟低位代理 \uXXXX
            if self.peek() == Some('\\') {
                self.pos += 1;
                if self.peek() == Some('u') {
                    self.pos += 1;
                    let low = self.read_hex4(esc_pos)?;
                    if (0xDC00..=0xDFFF).contains(&low) {
                        let combined = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                        if let Some(ch) = char::from_u32(combined) {
                            return Ok(ch);
                        }
                    }
                }
            }
            return Err(TokenError::new("无效的转义序列: 代理对不完整", esc_pos));
        }
        char::from_u32(high)
            .ok_or_else(|| TokenError::new("无效的转义序列: 非法码位", esc_pos))
    }

    fn read_hex4(&mut self, esc_pos: usize) -> Result<u32, TokenError> {
        let mut value = 0u32;
        for _ in 0..4 {
            let digit = self
                .peek()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| TokenError::new("无效的转义序列: \\u 需要4位十六进制", esc_pos))?;
            self.pos += 1;
            value = value * 16 + digit;
        }
        Ok(value)
    }

    fn read_number(&mut self) -> Result<Token, TokenError> {
        let start = self.pos;
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E') {
                text.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        match serde_json::from_str::<serde_json::Number>(&text) {
            Ok(n) => Ok(Token::Number(n)),
            Err(_) => Err(TokenError::new(format!("数字格式错误 '{}'", text), start)),
        }
    }

    fn read_keyword(&mut self) -> Result<Token, TokenError> {
        let start = self.pos;
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphabetic() {
                word.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        match word.as_str() {
            "true" => Ok(Token::Bool(true)),
            "false" => Ok(Token::Bool(false)),
            "null" => Ok(Token::Null),
            _ => Err(TokenError::new(
                format!("无法识别的字面量 '{}'", word),
                start,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(text: &str) -> Result<Vec<Token>, TokenError> {
        let mut tokenizer = Tokenizer::new(text);
        let mut out = Vec::new();
        while let Some(token) = tokenizer.read()? {
            out.push(token);
        }
        Ok(out)
    }

    #[test]
    fn test_simple_object_tokens() {
        let tokens = drain(r#"{"a": 1, "b": [true, null]}"#).expect("合法输入不应报错");
        assert_eq!(tokens[0], Token::ObjectStart);
        assert_eq!(tokens[1], Token::Str("a".into()));
        assert_eq!(tokens[2], Token::Colon);
        assert!(matches!(tokens[3], Token::Number(_)));
        assert_eq!(tokens[7], Token::ArrayStart);
        assert_eq!(tokens[8], Token::Bool(true));
        assert_eq!(tokens[10], Token::Null);
        assert_eq!(*tokens.last().expect("非空"), Token::ObjectEnd);
    }

    #[test]
    fn test_position_advances_past_token() {
        let mut tokenizer = Tokenizer::new(r#"{"ab":1}"#);
        tokenizer.read().expect("读取失败");
        assert_eq!(tokenizer.position(), 1, "消费'{{'后位置应为1");
        tokenizer.read().expect("读取失败");
        assert_eq!(tokenizer.position(), 5, "消费\"ab\"后位置应越过结束引号");
    }

    #[test]
    fn test_string_escapes() {
        let tokens = drain(r#"["a\n\t\"A"]"#).expect("合法转义不应报错");
        assert_eq!(tokens[1], Token::Str("a\n\t\"A".into()));
    }

    #[test]
    fn test_surrogate_pair_escape() {
        let tokens = drain("[\"\\ud83d\\ude00\"]").expect("代理对不应报错");
        assert_eq!(tokens[1], Token::Str("😀".into()));
    }

    #[test]
    fn test_lone_surrogate_is_invalid() {
        let err = drain(r#"["\ud83d"]"#).expect_err("孤立高位代理应报错");
        assert_eq!(err.position, 2, "位置应指向反斜杠");
    }

    #[test]
    fn test_unterminated_string_reports_opening_quote() {
        let err = drain(r#"{"a": "bc"#).expect_err("应报错");
        assert_eq!(err.position, 6, "位置应指向字符串开始的引号");
        assert!(err.message.contains("引号"), "信息应说明缺少引号: {}", err.message);
    }

    #[test]
    fn test_invalid_escape_reports_backslash() {
        let err = drain(r#"["a\qb"]"#).expect_err("应报错");
        assert_eq!(err.position, 3, "位置应指向反斜杠");
        assert!(err.message.contains("转义"), "信息应说明转义非法: {}", err.message);
    }

    #[test]
    fn test_malformed_number() {
        let err = drain("[1.2.3]").expect_err("应报错");
        assert_eq!(err.position, 1, "位置应指向数字开始处");
        assert!(err.message.contains("数字"), "信息应说明数字格式: {}", err.message);
    }

    #[test]
    fn test_unexpected_character() {
        let err = drain("  %").expect_err("应报错");
        assert_eq!(err.position, 2, "位置应指向意外字符");
    }

    #[test]
    fn test_unknown_literal() {
        let err = drain("[truth]").expect_err("应报错");
        assert_eq!(err.position, 1);
        assert!(err.message.contains("truth"), "信息应带上字面量本身");
    }

    #[test]
    fn test_unbalanced_close() {
        let err = drain("]").expect_err("应报错");
        assert_eq!(err.position, 0);
        assert!(err.message.contains("不配对"), "信息应说明不配对: {}", err.message);

        let err = drain(r#"{"a": 1]"#).expect_err("应报错");
        assert_eq!(err.position, 7, "位置应指向不匹配的']'");
    }

    #[test]
    fn test_unclosed_container_ends_without_token_error() {
        // 只开不合在词法层不是错误，留给结构解析器判定
        let tokens = drain("{").expect("不应报词法错误");
        assert_eq!(tokens, vec![Token::ObjectStart]);
    }
}
