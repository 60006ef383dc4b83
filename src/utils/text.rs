//! 文本偏移工具：原始文本与显示文本之间的范围换算
//!
//! 显示面会把两字符换行 "\r\n" 折叠成单个 '\n'，而节点携带的源码偏移
//! 是针对原始文本的，因此高亮前必须做双向换算

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TextMapError {
    #[error("原始文本与显示文本的差异不止换行符（显示偏移 {0}）")]
    Corrupted(usize),
}

/// 把 (start, length) 区间夹紧到 [min, max]
///
/// start 低于 min 的亏损吸收进 length；start 高于 max 时夹到 max；
/// 区间末端超过 max 时收缩 length；length 永不为负
pub fn clamp_range(start: i64, length: i64, min: i64, max: i64) -> (usize, usize) {
    let mut start = start;
    let mut length = length;
    if start < min {
        length -= min - start;
        start = min;
    }
    if start > max {
        start = max;
    }
    if start + length > max {
        length = max - start;
    }
    if length < 0 {
        length = 0;
    }
    (start as usize, length as usize)
}

/// 统计字符区间 [start, start+length) 内完整包含的 "\r\n" 对数
/// 跨越区间边界的配对不计入
pub fn count_crnl(text: &str, start: usize, length: usize) -> usize {
    let mut count = 0;
    let mut prev = 'x';
    for ch in text.chars().skip(start).take(length) {
        if ch == '\n' && prev == '\r' {
            count += 1;
        }
        prev = ch;
    }
    count
}

/// 原始文本的显示形态：仅折叠 "\r\n"，孤立的 '\r' 保持不变
pub fn to_display_text(raw: &str) -> String {
    raw.replace("\r\n", "\n")
}

/// 原始偏移区间 → 显示偏移区间
///
/// 从 start 中减去其之前完整的 "\r\n" 对数，从 length 中减去区间内的对数，
/// 再夹紧到 [0, display_len]
pub fn raw_to_display(
    raw_text: &str,
    start: usize,
    length: usize,
    display_len: usize,
) -> (usize, usize) {
    let before = count_crnl(raw_text, 0, start);
    let inside = count_crnl(raw_text, start, length);
    clamp_range(
        start as i64 - before as i64,
        length as i64 - inside as i64,
        0,
        display_len as i64,
    )
}

/// 显示位置换回原始位置所需的偏移差
///
/// 双文本从 0 开始锁步推进；字符不一致时必须是显示 '\n' 对应原始 '\r'
/// 或 '\n'，否则视为两份文本已脱节，报错而不是静默猜测。
/// display_pos 超出文本末尾时返回推进到末尾为止累计的偏移差
pub fn count_missing_crnl(
    raw_text: &str,
    display_text: &str,
    display_pos: usize,
) -> Result<usize, TextMapError> {
    let raw: Vec<char> = raw_text.chars().collect();
    let display: Vec<char> = display_text.chars().collect();
    let mut raw_index = 0usize;
    let mut display_index = 0usize;
    while display_index < display_pos {
        if display_index >= display.len() || raw_index >= raw.len() {
            break;
        }
        if display[display_index] != raw[raw_index] {
            if display[display_index] != '\n'
                || !(raw[raw_index] == '\r' || raw[raw_index] == '\n')
            {
                return Err(TextMapError::Corrupted(display_index));
            }
            // 折叠掉的 '\r'：跳过与之配对的原始字符
            if raw[raw_index] == '\r' {
                raw_index += 1;
            }
        }
        raw_index += 1;
        display_index += 1;
    }
    Ok(raw_index - display_index)
}

/// 显示位置 → 原始位置
pub fn display_to_raw(
    raw_text: &str,
    display_text: &str,
    display_pos: usize,
) -> Result<usize, TextMapError> {
    Ok(display_pos + count_missing_crnl(raw_text, display_text, display_pos)?)
}
