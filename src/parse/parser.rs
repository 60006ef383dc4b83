//! 结构解析器：消费token流，自底向上构建JsonObject树
//!
//! 遇到第一个结构违规即失败；错误只携带message，可用的偏移
//! 由 recovery 模块重扫词法流补齐

use serde_json::Value;
use thiserror::Error;

use super::tokenizer::{Token, TokenError, Tokenizer};
use crate::model::json_tree::{JsonObject, JsonObjectTree, JsonValueKind};

/// 结构解析错误：只保证message，不保证偏移
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct JsonParseError {
    pub message: String,
}

impl JsonParseError {
    fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl From<TokenError> for JsonParseError {
    fn from(e: TokenError) -> Self {
        Self { message: e.message }
    }
}

pub fn parse_document(text: &str) -> Result<JsonObjectTree, JsonParseError> {
    let mut tokens = Tokenizer::new(text);
    let first = tokens
        .read()?
        .ok_or_else(|| JsonParseError::new("文档为空"))?;
    let root = parse_value(&mut tokens, first, "$".to_string(), "$".to_string())?;
    if tokens.read()?.is_some() {
        return Err(JsonParseError::new("根值之后存在多余内容"));
    }
    Ok(JsonObjectTree::new(root))
}

fn next_required(tokens: &mut Tokenizer, context: &str) -> Result<Token, JsonParseError> {
    tokens
        .read()?
        .ok_or_else(|| JsonParseError::new(format!("输入意外结束: {}", context)))
}

fn parse_value(
    tokens: &mut Tokenizer,
    token: Token,
    text: String,
    path: String,
) -> Result<JsonObject, JsonParseError> {
    match token {
        Token::ObjectStart => parse_object(tokens, text, path),
        Token::ArrayStart => parse_array(tokens, text, path),
        Token::Str(s) => Ok(JsonObject::scalar(text, path, Value::String(s))),
        Token::Number(n) => Ok(JsonObject::scalar(text, path, Value::Number(n))),
        Token::Bool(b) => Ok(JsonObject::scalar(text, path, Value::Bool(b))),
        Token::Null => Ok(JsonObject::scalar(text, path, Value::Null)),
        other => Err(JsonParseError::new(format!("此处不允许出现 {:?}", other))),
    }
}

fn parse_object(
    tokens: &mut Tokenizer,
    text: String,
    path: String,
) -> Result<JsonObject, JsonParseError> {
    let mut obj = JsonObject::container(JsonValueKind::Object, text, path.clone());
    let mut token = next_required(tokens, "对象未结束")?;
    if token == Token::ObjectEnd {
        return Ok(obj);
    }
    loop {
        let key = match token {
            Token::Str(s) => s,
            other => {
                return Err(JsonParseError::new(format!(
                    "对象的键必须是字符串，遇到 {:?}",
                    other
                )))
            }
        };
        match next_required(tokens, "对象未结束")? {
            Token::Colon => {}
            other => {
                return Err(JsonParseError::new(format!(
                    "键 \"{}\" 之后期望 ':'，遇到 {:?}",
                    key, other
                )))
            }
        }
        let value_token = next_required(tokens, "对象未结束")?;
        let child_path = JsonObject::child_path(&path, &key);
        obj.push_field(parse_value(tokens, value_token, key, child_path)?);
        match next_required(tokens, "对象未结束")? {
            Token::Comma => token = next_required(tokens, "对象未结束")?,
            Token::ObjectEnd => return Ok(obj),
            other => {
                return Err(JsonParseError::new(format!(
                    "对象内期望 ',' 或 '}}'，遇到 {:?}",
                    other
                )))
            }
        }
    }
}

fn parse_array(
    tokens: &mut Tokenizer,
    text: String,
    path: String,
) -> Result<JsonObject, JsonParseError> {
    let mut arr = JsonObject::container(JsonValueKind::Array, text, path.clone());
    let mut token = next_required(tokens, "数组未结束")?;
    if token == Token::ArrayEnd {
        return Ok(arr);
    }
    let mut index = 0usize;
    loop {
        let item_path = format!("{}[{}]", path, index);
        arr.push_field(parse_value(tokens, token, index.to_string(), item_path)?);
        index += 1;
        match next_required(tokens, "数组未结束")? {
            Token::Comma => token = next_required(tokens, "数组未结束")?,
            Token::ArrayEnd => return Ok(arr),
            other => {
                return Err(JsonParseError::new(format!(
                    "数组内期望 ',' 或 ']'，遇到 {:?}",
                    other
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_shape() {
        let tree = parse_document(r#"{"a":1,"b":{"c":2}}"#).expect("解析失败");
        let root = tree.root();
        assert_eq!(root.kind, JsonValueKind::Object);

        let names: Vec<&str> = root.fields.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(names, vec!["a", "b"], "字段顺序必须保持输入顺序");

        let b = root.field("b").expect("缺少字段b");
        assert_eq!(b.kind, JsonValueKind::Object);
        assert_eq!(b.fields.len(), 1);
        let c = b.field("c").expect("缺少字段c");
        assert_eq!(c.kind, JsonValueKind::Value);
        assert_eq!(c.value, Some(Value::from(2)));
        assert_eq!(c.path, "$.b.c");
    }

    #[test]
    fn test_array_fields_are_stringified_indices() {
        let tree = parse_document(r#"{"items":["x",{"id":1},[2]]}"#).expect("解析失败");
        let items = tree.root().field("items").expect("缺少items");
        assert_eq!(items.kind, JsonValueKind::Array);
        let names: Vec<&str> = items.fields.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(names, vec!["0", "1", "2"], "数组键是下标的字符串形式");
        assert_eq!(items.fields[1].path, "$.items[1]");
        assert_eq!(
            items.fields[1].field("id").map(|f| f.path.as_str()),
            Some("$.items[1].id")
        );
    }

    #[test]
    fn test_scalar_root() {
        let tree = parse_document("42").expect("裸标量也是合法文档");
        assert_eq!(tree.root().kind, JsonValueKind::Value);
        assert_eq!(tree.root().path, "$");
    }

    #[test]
    fn test_trailing_content_rejected() {
        let err = parse_document(r#"{"a":1} {}"#).expect_err("应报错");
        assert!(err.message.contains("多余"), "信息应说明存在多余内容: {}", err);
    }

    #[test]
    fn test_missing_colon() {
        let err = parse_document(r#"{"a" 1}"#).expect_err("应报错");
        assert!(err.message.contains(':'), "信息应提到缺少冒号: {}", err);
    }

    #[test]
    fn test_non_string_key() {
        let err = parse_document("{1: 2}").expect_err("应报错");
        assert!(err.message.contains("键"), "信息应提到键类型: {}", err);
    }

    #[test]
    fn test_empty_containers() {
        let tree = parse_document(r#"{"o":{},"a":[]}"#).expect("解析失败");
        assert!(tree.root().field("o").expect("缺o").fields.is_empty());
        assert!(tree.root().field("a").expect("缺a").fields.is_empty());
    }

    #[test]
    fn test_round_trip() {
        let doc = r#"{"a":1,"b":{"c":[true,null,"字 符"],"d":-2.5},"e":[]}"#;
        let first = parse_document(doc).expect("解析失败");
        let serialized = first.to_json_string().expect("序列化失败");
        let second = parse_document(&serialized).expect("再解析失败");
        assert_eq!(first, second, "序列化再解析后树应逐节点相等");
    }
}
