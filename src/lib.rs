//! JSON树查看器核心库
//!
//! 提供JSON词法/结构解析（带精确错误偏移恢复）、解析树模型、
//! 可视化插件注册表与懒解析、以及原始文本与显示文本之间的偏移映射
//! 核心状态机不依赖任何具体UI框架，便于在测试里直接驱动

pub mod model;
pub mod parse;
pub mod plugin;
pub mod utils;

// 重新导出主要类型
pub use model::data_core::{FindOutcome, SourceOrigin, ViewerState};
pub use model::json_tree::{JsonObject, JsonObjectTree, JsonValueKind};
pub use model::node_state::{NodeState, NodeView};
pub use parse::{ErrorDetails, JsonParseError, TokenError};
pub use plugin::{ControlHandle, JsonVisualizer, PluginError, PluginRegistry, TextProvider};
