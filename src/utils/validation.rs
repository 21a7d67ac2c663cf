use crate::error::{AppError, Result};
use regex::Regex;
use std::sync::OnceLock;

/// 电话号码格式验证
/// 允许可选的国家码前缀，3-15 位数字
pub fn is_valid_phone(phone: &str) -> bool {
    static PHONE_PATTERN: OnceLock<Regex> = OnceLock::new();

    let pattern = PHONE_PATTERN.get_or_init(|| {
        Regex::new(r"^\+?[0-9]{3,15}$").unwrap()
    });

    pattern.is_match(phone)
}

/// 规范化电话号码：去掉空格、连字符和括号
pub fn normalize_phone(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect()
}

/// 验证电话号码并返回详细错误信息
pub fn validate_phone_format(phone: &str) -> Result<()> {
    if phone.trim().is_empty() {
        return Err(AppError::Validation("电话号码不能为空".to_string()));
    }

    if !is_valid_phone(&normalize_phone(phone)) {
        return Err(AppError::Validation("电话号码格式不正确".to_string()));
    }

    Ok(())
}

/// 规范化邮箱：去掉首尾空白并统一小写
/// 写入和比对都走这里，保证 resolve/reveal 的精确匹配语义
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}
