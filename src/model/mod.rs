//! 数据层：解析树模型、节点侧状态与查看器核心状态机

pub mod data_core;
pub mod json_tree;
pub mod node_state;

pub use data_core::{FindOutcome, SourceOrigin, ViewerState};
pub use json_tree::{JsonObject, JsonObjectTree, JsonValueKind};
pub use node_state::{NodeState, NodeView};
