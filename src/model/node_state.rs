//! 展示层的每节点侧状态
//!
//! 懒插件解析的结果与"上次使用的可视化器"都属于已渲染节点，
//! 不属于不可变的解析树；以节点path为键存放在 ViewerState 的映射里，
//! 树重建时整体丢弃

use std::rc::Rc;

use crate::model::json_tree::JsonValueKind;
use crate::plugin::{JsonVisualizer, TextProvider};

/// 树控件里一个已渲染节点的侧状态
pub struct NodeState {
    /// 父节点首次展开时置真（懒初始化标记）
    pub initialized: bool,
    /// 按注册顺序筛出的适用可视化器
    pub visualizers: Vec<Rc<dyn JsonVisualizer>>,
    pub text_providers: Vec<Rc<dyn TextProvider>>,
    /// 该节点上次被显式选择的可视化器
    pub last_visualizer: Option<Rc<dyn JsonVisualizer>>,
    /// 渲染后的标签（含文本插件的括号后缀）
    pub label: String,
}

/// 提供给树控件的节点视图（选择契约）
#[derive(Debug, Clone, PartialEq)]
pub struct NodeView {
    pub label: String,
    pub kind: JsonValueKind,
}
