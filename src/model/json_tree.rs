//! JsonObject树模型：解析结果的唯一事实来源
//!
//! 由结构解析器在单趟解析中自底向上构建，构建完成后不可变；
//! 每次重新解析都整树丢弃重建，展示层的可变状态一律放在树外
//! （以节点path为键，见 node_state 模块）

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::Value;

/// JSON 节点类型（与 UI 展示解耦）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonValueKind {
    Object,
    Array,
    Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JsonObject {
    pub kind: JsonValueKind,
    /// 显示标签种子：属性名、数组下标的字符串形式，根节点为 "$"
    pub text: String,
    /// JSONPath，节点的稳定身份（供展示层侧状态与选择寻址使用）
    pub path: String,
    /// 仅 Value 节点持有标量（字符串/数字/布尔/空）
    pub value: Option<Value>,
    /// 有序子节点；子节点的 text 即字段名，插入顺序是唯一有意义的顺序
    pub fields: Vec<JsonObject>,
}

impl JsonObject {
    pub fn scalar(text: String, path: String, value: Value) -> Self {
        Self {
            kind: JsonValueKind::Value,
            text,
            path,
            value: Some(value),
            fields: Vec::new(),
        }
    }

    pub fn container(kind: JsonValueKind, text: String, path: String) -> Self {
        Self {
            kind,
            text,
            path,
            value: None,
            fields: Vec::new(),
        }
    }

    /// 仅限构建期使用；树建成后不再变更
    pub(crate) fn push_field(&mut self, child: JsonObject) {
        self.fields.push(child);
    }

    /// 按字段名查找直接子节点（保序线性查找）
    pub fn field(&self, name: &str) -> Option<&JsonObject> {
        self.fields.iter().find(|f| f.text == name)
    }

    pub fn contains_field(&self, name: &str, kind: JsonValueKind) -> bool {
        self.field(name).map(|f| f.kind == kind).unwrap_or(false)
    }

    /// 标量的展示文本：字符串不带引号，其余用JSON字面形式
    pub fn value_text(&self) -> String {
        match &self.value {
            Some(Value::String(s)) => s.clone(),
            Some(v) => v.to_string(),
            None => String::new(),
        }
    }

    /// 按路径查找后代（含自身）
    pub fn find_path(&self, path: &str) -> Option<&JsonObject> {
        if self.path == path {
            return Some(self);
        }
        self.fields.iter().find_map(|f| f.find_path(path))
    }

    /// 对象字段的子路径；字段名含特殊字符时使用 bracket-notation
    pub fn child_path(parent: &str, key: &str) -> String {
        if !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            format!("{}.{}", parent, key)
        } else {
            format!("{}['{}']", parent, key.replace('\'', "\\'"))
        }
    }
}

impl Serialize for JsonObject {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.kind {
            JsonValueKind::Value => self.value.serialize(serializer),
            JsonValueKind::Object => {
                let mut map = serializer.serialize_map(Some(self.fields.len()))?;
                for field in &self.fields {
                    map.serialize_entry(&field.text, field)?;
                }
                map.end()
            }
            JsonValueKind::Array => {
                let mut seq = serializer.serialize_seq(Some(self.fields.len()))?;
                for field in &self.fields {
                    seq.serialize_element(field)?;
                }
                seq.end()
            }
        }
    }
}

/// 一次成功解析的产物，整树替换、只读消费
#[derive(Debug, Clone, PartialEq)]
pub struct JsonObjectTree {
    root: JsonObject,
}

impl JsonObjectTree {
    pub(crate) fn new(root: JsonObject) -> Self {
        Self { root }
    }

    /// 解析JSON文本；失败时错误只保证message（偏移由错误恢复补齐）
    pub fn parse(text: &str) -> Result<Self, crate::parse::JsonParseError> {
        crate::parse::parser::parse_document(text)
    }

    pub fn root(&self) -> &JsonObject {
        &self.root
    }

    /// 把树序列化回等价的JSON文档
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_path_notation() {
        assert_eq!(JsonObject::child_path("$", "name"), "$.name");
        assert_eq!(JsonObject::child_path("$.a", "b_2"), "$.a.b_2");
        assert_eq!(
            JsonObject::child_path("$", "key with spaces"),
            "$['key with spaces']"
        );
        assert_eq!(
            JsonObject::child_path("$", "key'q"),
            "$['key\\'q']"
        );
        assert_eq!(JsonObject::child_path("$", ""), "$['']", "空键走bracket形式");
    }

    #[test]
    fn test_field_lookup_preserves_order() {
        let mut obj = JsonObject::container(JsonValueKind::Object, "$".into(), "$".into());
        obj.push_field(JsonObject::scalar("b".into(), "$.b".into(), Value::from(1)));
        obj.push_field(JsonObject::scalar("a".into(), "$.a".into(), Value::from(2)));

        let names: Vec<&str> = obj.fields.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(names, vec!["b", "a"], "字段顺序必须是插入顺序，不重排");
        assert!(obj.contains_field("a", JsonValueKind::Value));
        assert!(!obj.contains_field("a", JsonValueKind::Object));
        assert!(obj.field("c").is_none());
    }

    #[test]
    fn test_value_text_forms() {
        let s = JsonObject::scalar("s".into(), "$.s".into(), Value::String("文本".into()));
        assert_eq!(s.value_text(), "文本", "字符串不带引号");
        let n = JsonObject::scalar("n".into(), "$.n".into(), Value::from(42));
        assert_eq!(n.value_text(), "42");
        let b = JsonObject::scalar("b".into(), "$.b".into(), Value::Bool(true));
        assert_eq!(b.value_text(), "true");
        let null = JsonObject::scalar("z".into(), "$.z".into(), Value::Null);
        assert_eq!(null.value_text(), "null");
    }

    #[test]
    fn test_find_path() {
        let mut root = JsonObject::container(JsonValueKind::Object, "$".into(), "$".into());
        let mut inner = JsonObject::container(JsonValueKind::Object, "b".into(), "$.b".into());
        inner.push_field(JsonObject::scalar("c".into(), "$.b.c".into(), Value::from(2)));
        root.push_field(inner);

        assert_eq!(root.find_path("$").map(|o| o.text.as_str()), Some("$"));
        assert_eq!(root.find_path("$.b.c").map(|o| o.text.as_str()), Some("c"));
        assert!(root.find_path("$.x").is_none());
    }
}
