//! 字数估算
//!
//! 拉丁文字按空白分词计数，中日韩文字为主的文本按非空白字符计数

/// 统计字数
///
/// 非 ASCII 字符超过总字符数一半时视为 CJK 文本，返回非空白字符数；
/// 否则返回以空白分隔的词数
pub fn count_words(text: &str) -> usize {
    let total = text.chars().count();
    if total == 0 {
        return 0;
    }

    let non_ascii = text.chars().filter(|c| !c.is_ascii()).count();
    if non_ascii * 2 > total {
        text.chars().filter(|c| !c.is_whitespace()).count()
    } else {
        text.split_whitespace().count()
    }
}

/// 进度百分比：min(100, round(count / target * 100))
pub fn progress_percent(count: usize, target: u32) -> u8 {
    if target == 0 {
        return 100;
    }
    let percent = (count as f64 / target as f64 * 100.0).round();
    percent.min(100.0) as u8
}
