//! IO helper: parse-tree 模式下读取被解析的原始源码

use std::io::ErrorKind;
use std::path::Path;

pub const PLACEHOLDER_NOT_FOUND: &str = "{File Not Found}";
pub const PLACEHOLDER_READ_ERROR: &str = "{Error Reading File}";

/// 读取源码文件的全文
///
/// 文件缺失或不可读时退化为占位文本，绝不向调用方传播错误：
/// 源码面只是附加信息，不能因为它失败而拖垮整个树的渲染
pub fn read_source_text(p: &Path) -> String {
    match std::fs::read_to_string(p) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::warn!("源码文件不存在: {}", p.display());
            PLACEHOLDER_NOT_FOUND.to_string()
        }
        Err(e) => {
            tracing::warn!("源码文件读取失败: {} ({})", p.display(), e);
            PLACEHOLDER_READ_ERROR.to_string()
        }
    }
}
