//! 程序入口：初始化日志，读取JSON文本并在终端打印解析树
//!
//! 图形外壳之外的最小驱动：参数给文件路径则读文件，否则读标准输入

use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context};
use tracing_subscriber::fmt::SubscriberBuilder;

use jsonshu_viewer::{JsonValueKind, PluginRegistry, ViewerState};

fn main() -> anyhow::Result<()> {
    // 初始化日志输出
    let _ = SubscriberBuilder::default()
        .with_max_level(tracing::Level::INFO)
        .try_init();

    let text = match std::env::args_os().nth(1) {
        Some(arg) => {
            let path = PathBuf::from(arg);
            std::fs::read_to_string(&path)
                .with_context(|| format!("读取文件失败: {}", path.display()))?
        }
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("读取标准输入失败")?;
            buf
        }
    };

    let mut viewer = ViewerState::new(PluginRegistry::new());
    viewer.set_json(&text);

    if viewer.has_errors() {
        let details = viewer.error_details();
        let message = details.message.clone().unwrap_or_default();
        bail!("JSON解析失败: {} (偏移 {})", message, details.position);
    }

    print_subtree(&mut viewer, "$", 0);
    Ok(())
}

/// 前序打印：每个节点一行，子节点按需懒展开
fn print_subtree(viewer: &mut ViewerState, path: &str, depth: usize) {
    let Some(view) = viewer.node_view(path) else {
        return;
    };
    let marker = match view.kind {
        JsonValueKind::Object => "{}",
        JsonValueKind::Array => "[]",
        JsonValueKind::Value => "··",
    };
    println!("{}{} {}", "  ".repeat(depth), marker, view.label);

    viewer.expand_node(path);
    for child in viewer.child_paths(path) {
        print_subtree(viewer, &child, depth + 1);
    }
}
