//! 可视化插件契约与注册表
//!
//! 两套能力集：Visualizer 为选中节点渲染富视图，TextProvider 给节点
//! 标签追加括号后缀。注册表在进程启动时显式构建、显式传入
//! （依赖注入，便于测试伪造插件），之后只读，不做任何反射式发现

use std::rc::Rc;

use thiserror::Error;

use crate::model::json_tree::JsonObject;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PluginError {
    #[error("插件执行失败: {0}")]
    Failed(String),
}

/// 不透明的可渲染控件句柄
///
/// 同一插件对同一节点可以重复返回相同句柄；调用方只在句柄变化时
/// 替换显示的控件，避免闪烁与重建
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlHandle(pub u64);

pub trait JsonVisualizer {
    fn display_name(&self) -> &str;
    fn can_visualize(&self, node: &JsonObject) -> bool;
    /// 获取（可复用的）渲染控件句柄
    fn get_control(&self, node: &JsonObject) -> ControlHandle;
    /// 把当前节点数据推进已获取的控件
    fn visualize(&self, node: &JsonObject);
}

pub trait TextProvider {
    fn can_visualize(&self, node: &JsonObject) -> bool;
    /// 返回追加到标签的文本；Err 由调用方静默吞掉
    fn get_text(&self, node: &JsonObject) -> Result<String, PluginError>;
}

/// 进程级插件注册表；注册顺序就是解析顺序
#[derive(Default)]
pub struct PluginRegistry {
    visualizers: Vec<Rc<dyn JsonVisualizer>>,
    text_providers: Vec<Rc<dyn TextProvider>>,
    default_visualizer: Option<Rc<dyn JsonVisualizer>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_visualizer(&mut self, visualizer: Rc<dyn JsonVisualizer>) {
        self.visualizers.push(visualizer);
    }

    /// 注册唯一的默认可视化器（同时加入解析列表）
    pub fn register_default_visualizer(&mut self, visualizer: Rc<dyn JsonVisualizer>) {
        self.default_visualizer = Some(visualizer.clone());
        self.visualizers.push(visualizer);
    }

    pub fn register_text_provider(&mut self, provider: Rc<dyn TextProvider>) {
        self.text_providers.push(provider);
    }

    pub fn default_visualizer(&self) -> Option<Rc<dyn JsonVisualizer>> {
        self.default_visualizer.clone()
    }

    pub fn visualizers(&self) -> &[Rc<dyn JsonVisualizer>] {
        &self.visualizers
    }

    pub fn text_providers(&self) -> &[Rc<dyn TextProvider>] {
        &self.text_providers
    }

    /// 按注册顺序筛出声明支持该节点的可视化器
    pub fn applicable_visualizers(&self, node: &JsonObject) -> Vec<Rc<dyn JsonVisualizer>> {
        self.visualizers
            .iter()
            .filter(|v| v.can_visualize(node))
            .cloned()
            .collect()
    }

    pub fn applicable_text_providers(&self, node: &JsonObject) -> Vec<Rc<dyn TextProvider>> {
        self.text_providers
            .iter()
            .filter(|p| p.can_visualize(node))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::json_tree::JsonValueKind;
    use serde_json::Value;

    struct KindVisualizer {
        name: &'static str,
        kind: JsonValueKind,
    }

    impl JsonVisualizer for KindVisualizer {
        fn display_name(&self) -> &str {
            self.name
        }
        fn can_visualize(&self, node: &JsonObject) -> bool {
            node.kind == self.kind
        }
        fn get_control(&self, _node: &JsonObject) -> ControlHandle {
            ControlHandle(1)
        }
        fn visualize(&self, _node: &JsonObject) {}
    }

    fn scalar() -> JsonObject {
        JsonObject::scalar("n".into(), "$.n".into(), Value::from(1))
    }

    #[test]
    fn test_applicable_in_registration_order() {
        let mut registry = PluginRegistry::new();
        registry.register_default_visualizer(Rc::new(KindVisualizer {
            name: "默认",
            kind: JsonValueKind::Value,
        }));
        registry.register_visualizer(Rc::new(KindVisualizer {
            name: "标量专用",
            kind: JsonValueKind::Value,
        }));
        registry.register_visualizer(Rc::new(KindVisualizer {
            name: "对象专用",
            kind: JsonValueKind::Object,
        }));

        let node = scalar();
        let applicable = registry.applicable_visualizers(&node);
        let names: Vec<&str> = applicable.iter().map(|v| v.display_name()).collect();
        assert_eq!(names, vec!["默认", "标量专用"], "筛选必须保持注册顺序");
    }

    #[test]
    fn test_default_visualizer_is_also_registered() {
        let mut registry = PluginRegistry::new();
        assert!(registry.default_visualizer().is_none());
        registry.register_default_visualizer(Rc::new(KindVisualizer {
            name: "默认",
            kind: JsonValueKind::Value,
        }));
        assert_eq!(registry.visualizers().len(), 1);
        let default = registry.default_visualizer().expect("应有默认可视化器");
        assert!(Rc::ptr_eq(&default, &registry.visualizers()[0]));
    }
}
