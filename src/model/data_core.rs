//! ViewerState：查看器核心状态与解析/可视化管线的编排
//!
//! 单线程同步模型：解析、插件解析、查找都在调用线程上一次跑完；
//! 新的 set_json 直接整体丢弃旧树与旧错误（last-write-wins），
//! 唯一的"延迟"是节点展开时才做插件解析（懒加载），不是异步

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::model::json_tree::{JsonObject, JsonObjectTree, JsonValueKind};
use crate::model::node_state::{NodeState, NodeView};
use crate::parse::{recover, ErrorDetails, JsonParseError};
use crate::plugin::{ControlHandle, JsonVisualizer, PluginRegistry};
use crate::utils::fs::read_source_text;
use crate::utils::text::{
    clamp_range, count_missing_crnl, raw_to_display, to_display_text,
};

/// 标签截断上限：parse-tree 模式下源码片段超过此长度只显示开头
const LABEL_SNIPPET_MAX: i64 = 256;

/// 错误高亮的启发式窗口长度
const ERROR_MARK_LEN: i64 = 10;

/// 保留元数据字段名（仅 parse-tree 模式有意义）
const FIELD_PARSE_TREE_MODE: &str = "parseTreeMode";
const FIELD_SRC_INDEX_START: &str = "srcIndexStart";
const FIELD_SRC_LENGTH: &str = "srcLength";
const FIELD_SOURCE: &str = "source";
const FIELD_FILE: &str = "file";

/// parse-tree 模式下源码文本的来源
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOrigin {
    None,
    Embedded,
    File(PathBuf),
}

/// 一次查找的结果：命中路径与是否绕回根部
#[derive(Debug, Clone, PartialEq)]
pub struct FindOutcome {
    pub path: Option<String>,
    pub wrapped: bool,
}

pub struct ViewerState {
    registry: PluginRegistry,
    json: String,
    tree: Option<JsonObjectTree>,
    error: ErrorDetails,
    parse_tree_mode: bool,
    /// parse-tree 模式默认只渲染 Object 节点
    objects_only: bool,
    /// 可选的标签字段名：标签后追加该子字段的标量值
    label_field: Option<String>,
    /// 原始源码与其显示形态（"\r\n"折叠为'\n'）
    parsed_src: String,
    display_src: String,
    source_origin: SourceOrigin,
    /// 每个已渲染节点的侧状态，以path为键；树重建时整体丢弃
    node_states: HashMap<String, NodeState>,
    selected: Option<String>,
    /// 控件范围内上一次激活的可视化器（组合框当前选中项的对应物）
    active_visualizer: Option<Rc<dyn JsonVisualizer>>,
    /// 当前展示的控件句柄；句柄不变就不替换显示，避免闪烁
    last_control: Option<ControlHandle>,
    control_swaps: usize,
    /// 当前选中节点在显示文本里的高亮区间
    src_highlight: Option<(usize, usize)>,
}

impl ViewerState {
    pub fn new(registry: PluginRegistry) -> Self {
        Self {
            registry,
            json: String::new(),
            tree: None,
            error: ErrorDetails::default(),
            parse_tree_mode: false,
            objects_only: false,
            label_field: None,
            parsed_src: String::new(),
            display_src: String::new(),
            source_origin: SourceOrigin::None,
            node_states: HashMap::new(),
            selected: None,
            active_visualizer: None,
            last_control: None,
            control_swaps: 0,
            src_highlight: None,
        }
    }

    // === 只读访问 ===

    pub fn json(&self) -> &str {
        &self.json
    }

    pub fn tree(&self) -> Option<&JsonObjectTree> {
        self.tree.as_ref()
    }

    pub fn error_details(&self) -> &ErrorDetails {
        &self.error
    }

    pub fn has_errors(&self) -> bool {
        self.error.has_error()
    }

    pub fn parse_tree_mode(&self) -> bool {
        self.parse_tree_mode
    }

    pub fn parsed_src(&self) -> &str {
        &self.parsed_src
    }

    pub fn display_src(&self) -> &str {
        &self.display_src
    }

    pub fn source_origin(&self) -> &SourceOrigin {
        &self.source_origin
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn active_visualizer(&self) -> Option<Rc<dyn JsonVisualizer>> {
        self.active_visualizer.clone()
    }

    pub fn src_highlight(&self) -> Option<(usize, usize)> {
        self.src_highlight
    }

    pub fn control_swaps(&self) -> usize {
        self.control_swaps
    }

    // === 文档装载 ===

    /// 装载新的JSON文本：旧树、旧错误、旧侧状态全部丢弃
    pub fn set_json(&mut self, text: &str) {
        self.json = text.trim().to_string();
        self.tree = None;
        self.error.clear();
        if !self.json.is_empty() {
            match JsonObjectTree::parse(&self.json) {
                Ok(tree) => {
                    self.tree = Some(tree);
                    tracing::debug!("JSON解析成功，{} 字符", self.json.chars().count());
                }
                Err(e) => {
                    self.error = recover(&self.json, &e);
                    tracing::warn!(
                        "JSON解析失败: {} (偏移 {})",
                        self.error.message.as_deref().unwrap_or(""),
                        self.error.position
                    );
                }
            }
        }
        let mode = self
            .rootish_value(FIELD_PARSE_TREE_MODE)
            .trim()
            .eq_ignore_ascii_case("true");
        self.parse_tree_mode = mode;
        self.objects_only = mode;
        self.update_parse_source();
        self.redraw();
    }

    /// 手动开关 parse-tree 模式（随动 objects-only，与原行为一致）
    pub fn set_parse_tree_mode(&mut self, on: bool) {
        self.parse_tree_mode = on;
        self.objects_only = on;
        self.update_parse_source();
        self.redraw();
    }

    pub fn set_objects_only(&mut self, on: bool) {
        self.objects_only = on;
        self.redraw();
    }

    /// 设置标签字段名；空白视为未设置
    pub fn set_label_field(&mut self, field: Option<String>) {
        self.label_field = field
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty());
        self.redraw();
    }

    fn update_parse_source(&mut self) {
        self.parsed_src.clear();
        self.display_src.clear();
        self.source_origin = SourceOrigin::None;
        if !self.parse_tree_mode {
            return;
        }
        let embedded = self.rootish_value(FIELD_SOURCE);
        if !embedded.is_empty() {
            self.parsed_src = embedded;
            self.source_origin = SourceOrigin::Embedded;
        } else {
            let filename = self.rootish_value(FIELD_FILE).trim().to_string();
            if !filename.is_empty() {
                let path = PathBuf::from(&filename);
                self.parsed_src = read_source_text(Path::new(&filename));
                self.source_origin = SourceOrigin::File(path);
            }
        }
        self.display_src = to_display_text(&self.parsed_src);
    }

    /// 重建展示层：清空侧状态，初始化并展开根、选中根
    fn redraw(&mut self) {
        self.node_states.clear();
        self.selected = None;
        self.active_visualizer = None;
        self.last_control = None;
        self.src_highlight = None;
        let Some(root_kind) = self.tree.as_ref().map(|t| t.root().kind) else {
            return;
        };
        if self.objects_only && root_kind != JsonValueKind::Object {
            return;
        }
        self.init_node("$");
        self.expand_node("$");
        self.select_node("$");
    }

    // === 节点寻址与元数据 ===

    fn node(&self, path: &str) -> Option<&JsonObject> {
        self.tree.as_ref().and_then(|t| t.root().find_path(path))
    }

    fn field_value(obj: &JsonObject, key: &str) -> String {
        obj.field(key)
            .filter(|f| f.kind == JsonValueKind::Value)
            .map(|f| f.value_text())
            .unwrap_or_default()
    }

    /// 保留字段读取：先看根，再看根的直接子节点，取第一个非空值
    fn rootish_value(&self, key: &str) -> String {
        let Some(tree) = &self.tree else {
            return String::new();
        };
        let root = tree.root();
        let mut value = Self::field_value(root, key);
        if value.is_empty() {
            for child in &root.fields {
                value = Self::field_value(child, key);
                if !value.is_empty() {
                    break;
                }
            }
        }
        value
    }

    /// 元数据整数；缺失或不可转换时静默降级为None
    fn metadata_i64(obj: &JsonObject, key: &str) -> Option<i64> {
        let text = Self::field_value(obj, key);
        text.trim().parse().ok()
    }

    fn source_span(obj: &JsonObject) -> Option<(i64, i64)> {
        Some((
            Self::metadata_i64(obj, FIELD_SRC_INDEX_START)?,
            Self::metadata_i64(obj, FIELD_SRC_LENGTH)?,
        ))
    }

    // === 标签 ===

    /// 基础标签：种子文本 + 标签字段值 或 parse-tree 源码片段
    fn base_label(&self, obj: &JsonObject) -> String {
        let mut label = obj.text.clone();
        if let Some(field) = &self.label_field {
            if let Some(extra) = obj.field(field).filter(|f| f.kind == JsonValueKind::Value) {
                label.push_str(": ");
                label.push_str(&extra.value_text());
            }
        } else if self.parse_tree_mode {
            if let Some((start, mut length)) = Self::source_span(obj) {
                let mut shortened = false;
                if length > LABEL_SNIPPET_MAX {
                    length = LABEL_SNIPPET_MAX;
                    shortened = true;
                }
                let src_len = self.parsed_src.chars().count() as i64;
                let (start, length) = clamp_range(start, length, 0, src_len);
                let snippet: String =
                    self.parsed_src.chars().skip(start).take(length).collect();
                let mut snippet = snippet.trim().to_string();
                if let Some(newline) = snippet.find(|c| c == '\n' || c == '\r') {
                    snippet.truncate(newline);
                    shortened = true;
                }
                label.push_str(": ");
                label.push_str(&snippet);
                if shortened && !snippet.trim().is_empty() {
                    label.push_str("...");
                }
            }
        }
        label
    }

    /// 渲染标签：已初始化节点用侧状态里的（含插件后缀），否则现算基础标签
    pub fn rendered_label(&self, path: &str) -> String {
        if let Some(state) = self.node_states.get(path) {
            if state.initialized {
                return state.label.clone();
            }
        }
        self.node(path)
            .map(|obj| self.base_label(obj))
            .unwrap_or_default()
    }

    pub fn node_view(&self, path: &str) -> Option<NodeView> {
        let obj = self.node(path)?;
        Some(NodeView {
            label: self.rendered_label(path),
            kind: obj.kind,
        })
    }

    // === 懒初始化与展开 ===

    /// 该节点可见的直接子节点路径（objects-only 过滤在此生效）
    pub fn child_paths(&self, path: &str) -> Vec<String> {
        let Some(obj) = self.node(path) else {
            return Vec::new();
        };
        obj.fields
            .iter()
            .filter(|f| !self.objects_only || f.kind == JsonValueKind::Object)
            .map(|f| f.path.clone())
            .collect()
    }

    /// 展开节点：此时才为每个子节点做插件解析（懒加载，
    /// 启动成本只与可见节点数相关）
    pub fn expand_node(&mut self, path: &str) {
        for child in self.child_paths(path) {
            self.init_node(&child);
        }
    }

    fn init_node(&mut self, path: &str) {
        if self
            .node_states
            .get(path)
            .map(|s| s.initialized)
            .unwrap_or(false)
        {
            return;
        }
        let Some(obj) = self.node(path) else {
            return;
        };
        let mut label = self.base_label(obj);
        let text_providers = self.registry.applicable_text_providers(obj);
        for provider in &text_providers {
            match provider.get_text(obj) {
                Ok(extra) => {
                    label.push_str(" (");
                    label.push_str(&extra);
                    label.push(')');
                }
                Err(e) => {
                    // 单个插件出错不能拖垮树的渲染
                    tracing::warn!("文本插件执行失败，已忽略: {}", e);
                }
            }
        }
        let visualizers = self.registry.applicable_visualizers(obj);
        self.node_states.insert(
            path.to_string(),
            NodeState {
                initialized: true,
                visualizers,
                text_providers,
                last_visualizer: None,
                label,
            },
        );
    }

    // === 选择与可视化器解析 ===

    /// 选中节点：解析激活的可视化器并刷新源码高亮
    ///
    /// 激活优先级：节点记忆的上次可视化器 → 控件范围内上次激活的 →
    /// 注册的默认；选出的不在该节点的适用列表里时退回默认在列表中的
    /// 位置，默认也不适用则无选择
    pub fn select_node(&mut self, path: &str) {
        if self.node(path).is_none() {
            return;
        }
        self.selected = Some(path.to_string());
        self.update_src_highlight(path);

        let Some(default) = self.registry.default_visualizer() else {
            return;
        };
        let (applicable, remembered) = match self.node_states.get(path) {
            Some(state) => (state.visualizers.clone(), state.last_visualizer.clone()),
            None => (Vec::new(), None),
        };
        let wanted = remembered
            .or_else(|| self.active_visualizer.clone())
            .unwrap_or_else(|| default.clone());
        let index = applicable
            .iter()
            .position(|v| Rc::ptr_eq(v, &wanted))
            .or_else(|| applicable.iter().position(|v| Rc::ptr_eq(v, &default)));
        match index {
            Some(i) => self.activate_visualizer(path, applicable[i].clone()),
            None => self.active_visualizer = None,
        }
    }

    /// 用户在适用列表里显式换可视化器；记忆在该节点上
    pub fn choose_visualizer(&mut self, index: usize) -> bool {
        let Some(path) = self.selected.clone() else {
            return false;
        };
        let Some(visualizer) = self
            .node_states
            .get(&path)
            .and_then(|s| s.visualizers.get(index).cloned())
        else {
            return false;
        };
        self.activate_visualizer(&path, visualizer.clone());
        if let Some(state) = self.node_states.get_mut(&path) {
            state.last_visualizer = Some(visualizer);
        }
        true
    }

    fn activate_visualizer(&mut self, path: &str, visualizer: Rc<dyn JsonVisualizer>) {
        let Some(control) = self.node(path).map(|obj| visualizer.get_control(obj)) else {
            return;
        };
        if self.last_control != Some(control) {
            self.last_control = Some(control);
            self.control_swaps += 1;
        }
        if let Some(obj) = self.node(path) {
            visualizer.visualize(obj);
        }
        self.active_visualizer = Some(visualizer);
    }

    fn update_src_highlight(&mut self, path: &str) {
        self.src_highlight = None;
        if !self.parse_tree_mode {
            return;
        }
        let Some((start, length)) = self.node(path).and_then(Self::source_span) else {
            return;
        };
        let raw_len = self.parsed_src.chars().count() as i64;
        let (start, length) = clamp_range(start, length, 0, raw_len);
        let display_len = self.display_src.chars().count();
        self.src_highlight = Some(raw_to_display(&self.parsed_src, start, length, display_len));
    }

    // === 错误高亮 ===

    /// 错误的启发式高亮窗口 [max(0,pos-1), +10)，夹紧到文本内
    pub fn error_mark_range(&self) -> Option<(usize, usize)> {
        self.error.message.as_ref()?;
        let len = self.json.chars().count() as i64;
        Some(clamp_range(
            self.error.position.saturating_sub(1) as i64,
            ERROR_MARK_LEN,
            0,
            len,
        ))
    }

    // === 查找 ===

    /// 可见节点的先序遍历（子先于兄弟），查找与遍历都走这条序
    fn visible_preorder(&self) -> Vec<String> {
        fn collect(obj: &JsonObject, objects_only: bool, out: &mut Vec<String>) {
            if objects_only && obj.kind != JsonValueKind::Object {
                return;
            }
            out.push(obj.path.clone());
            for field in &obj.fields {
                collect(field, objects_only, out);
            }
        }
        let mut out = Vec::new();
        if let Some(tree) = &self.tree {
            collect(tree.root(), self.objects_only, &mut out);
        }
        out
    }

    fn label_matches(&self, path: &str, needle: &str) -> bool {
        self.rendered_label(path).to_lowercase().contains(needle)
    }

    /// 大小写不敏感的标签子串查找；遍历绕回根部时置 wrapped，
    /// 空查询返回当前节点，找不到则选择保持不变
    pub fn find_next(&mut self, query: &str, include_selected: bool) -> FindOutcome {
        let order = self.visible_preorder();
        if order.is_empty() {
            return FindOutcome { path: None, wrapped: false };
        }
        let start = self
            .selected
            .clone()
            .unwrap_or_else(|| order[0].clone());
        if query.is_empty() {
            return FindOutcome { path: Some(start), wrapped: false };
        }
        let needle = query.to_lowercase();
        let start_index = order.iter().position(|p| *p == start).unwrap_or(0);
        if include_selected && self.label_matches(&order[start_index], &needle) {
            // 命中起始节点同样要走一遍选择，刷新可视化与高亮
            self.select_node(&order[start_index]);
            return FindOutcome {
                path: Some(order[start_index].clone()),
                wrapped: false,
            };
        }
        let mut wrapped = false;
        let mut i = start_index;
        loop {
            i += 1;
            if i >= order.len() {
                i = 0;
                wrapped = true;
            }
            if i == start_index {
                break;
            }
            if self.label_matches(&order[i], &needle) {
                let found = order[i].clone();
                self.select_node(&found);
                return FindOutcome { path: Some(found), wrapped };
            }
        }
        FindOutcome { path: None, wrapped }
    }

    // === 源码位置 → 节点（jump-to-node） ===

    /// 把显示文本里的位置映射回节点：逐层下钻，每层取
    /// srcIndexStart 不超过该位置的最后一个子节点
    pub fn node_at_source_pos(&self, display_pos: usize) -> Option<String> {
        if !self.parse_tree_mode {
            return None;
        }
        let raw_pos = display_pos
            + count_missing_crnl(&self.parsed_src, &self.display_src, display_pos).ok()?;
        let tree = self.tree.as_ref()?;
        let mut node = tree.root();
        loop {
            let mut prev: Option<&JsonObject> = None;
            let mut boundary: Option<Option<&JsonObject>> = None;
            for sub in node
                .fields
                .iter()
                .filter(|f| !self.objects_only || f.kind == JsonValueKind::Object)
            {
                let start = Self::metadata_i64(sub, FIELD_SRC_INDEX_START).unwrap_or(0);
                if start > raw_pos as i64 {
                    boundary = Some(prev);
                    break;
                }
                prev = Some(sub);
            }
            let step = match boundary {
                Some(chosen) => chosen,
                None => prev,
            };
            match step {
                Some(next) => node = next,
                None => break,
            }
        }
        Some(node.path.clone())
    }

    // === 输入文本工具 ===

    /// 当前文档的4空格缩进美化输出（不改变查看器状态）
    ///
    /// 走树自己的保序序列化，字段顺序原样保留
    pub fn format_pretty(&self) -> Result<String, JsonParseError> {
        let parsed;
        let tree = match &self.tree {
            Some(tree) => tree,
            None => {
                parsed = JsonObjectTree::parse(&self.json)?;
                &parsed
            }
        };
        let mut buf = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        tree.root()
            .serialize(&mut serializer)
            .map_err(|e| JsonParseError { message: format!("序列化失败: {}", e) })?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// 美化并重新装载
    pub fn reformat(&mut self) -> Result<(), JsonParseError> {
        let pretty = self.format_pretty()?;
        self.set_json(&pretty);
        Ok(())
    }

    /// 把文本裁剪到首个开括号与最后一个闭括号之间并重新装载；
    /// 区间退化时不动
    pub fn strip_to(&mut self, open: char, close: char) {
        let text = self.json.clone();
        let (Some(start), Some(end)) = (text.find(open), text.rfind(close)) else {
            return;
        };
        if end > start {
            let stripped = text[start..=end].to_string();
            self.set_json(&stripped);
        }
    }
}
