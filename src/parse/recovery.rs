//! 错误位置恢复：结构解析失败后重扫词法流，补齐出错偏移
//!
//! 结构解析器的错误不保证携带偏移，而词法器始终跟踪位置，
//! 所以失败路径上用词法器单独把原始输入从头吃到底——
//! 以牺牲失败路径的速度换取诊断精度

use super::parser::JsonParseError;
use super::tokenizer::Tokenizer;

/// 最近一次解析失败的描述；message为None表示没有错误
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorDetails {
    pub message: Option<String>,
    pub position: usize,
}

impl ErrorDetails {
    pub fn clear(&mut self) {
        self.message = None;
        self.position = 0;
    }

    pub fn has_error(&self) -> bool {
        self.message.is_some()
    }
}

/// 三级回退：
/// 1. 重扫词法流报错 → 用它的message和位置
/// 2. 否则用结构解析器的message
/// 3. 位置始终没被捕获（token全合法但结构非法，如根值后有垃圾）
///    → 回退到文本末尾
pub fn recover(text: &str, parse_error: &JsonParseError) -> ErrorDetails {
    let mut details = ErrorDetails::default();
    let mut tokenizer = Tokenizer::new(text);
    let mut failed = false;
    loop {
        match tokenizer.read() {
            Ok(Some(_)) => {}
            Ok(None) => break,
            Err(e) => {
                details.message = Some(e.message);
                details.position = e.position;
                failed = true;
                break;
            }
        }
    }
    if details.message.is_none() {
        details.message = Some(parse_error.message.clone());
    }
    if !failed && details.position == 0 {
        details.position = text.chars().count();
    }
    details
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::parser::parse_document;

    fn recovered(text: &str) -> ErrorDetails {
        let err = parse_document(text).expect_err("测试输入必须是非法JSON");
        recover(text, &err)
    }

    #[test]
    fn test_tokenizer_error_wins() {
        let details = recovered(r#"{"a": "bc"#);
        assert!(details.has_error());
        assert_eq!(details.position, 6, "应报字符串开始引号的位置");
        assert!(
            details.message.as_deref().unwrap_or("").contains("引号"),
            "应采用词法器的错误信息"
        );
    }

    #[test]
    fn test_structural_error_falls_back_to_parser_message() {
        // token全部合法、仅结构非法：根值之后还有一个完整的值
        let text = r#"{"a":1} {}"#;
        let err = parse_document(text).expect_err("应报错");
        let details = recover(text, &err);
        assert_eq!(details.message, Some(err.message.clone()), "应采用结构解析器的信息");
        assert_eq!(details.position, 10, "位置应回退到文本末尾");
    }

    #[test]
    fn test_trailing_garbage_literal_uses_tokenizer_position() {
        // 根值后的垃圾本身是非法字面量时，重扫会在它身上报错
        let details = recovered(r#"{"a":1} x"#);
        assert_eq!(details.position, 8, "位置应指向垃圾字面量");
    }

    #[test]
    fn test_position_never_stays_zero_without_failure() {
        let details = recovered(r#"[1,2"#);
        assert_eq!(details.position, 4, "token合法但结构非法时位置是文本长度");
    }

    #[test]
    fn test_unterminated_string_not_at_boundaries() {
        let text = r#"{"key": "value"#;
        let details = recovered(text);
        assert_ne!(details.position, 0, "不应报在0");
        assert_ne!(details.position, text.chars().count(), "不应报在末尾");
        assert_eq!(details.position, 8, "应报在字符串字面量开始处");
    }
}
