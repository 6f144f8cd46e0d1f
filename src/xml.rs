//! 标记处理
//!
//! 判断文本是否包含 XML/HTML 标签，并在调用托管 API 前后做实体转义与反转义。

use regex::Regex;
use std::sync::OnceLock;

/// 实体名最长字节数（不含 `&` 与 `;`）
const MAX_ENTITY_LEN: usize = 9;

fn tag_regex() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| {
        Regex::new(r"<(?:[A-Za-z_]|/[A-Za-z_]|!)[^<>]*>").expect("valid tag regex")
    })
}

/// 文本中是否含有形如 `<tag ...>`、`</tag>`、`<!-- -->` 的标签
pub fn has_xml_tag(text: &str) -> bool {
    tag_regex().is_match(text)
}

/// 将 `&`、`<`、`>` 转义为实体
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// 还原命名实体与数字实体，无法识别的实体原样保留
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];

        // 只在实体名可能的长度内寻找 `;`
        let window = &rest.as_bytes()[..rest.len().min(MAX_ENTITY_LEN + 2)];
        let decoded = window
            .iter()
            .position(|&b| b == b';')
            .and_then(|end| decode_entity(&rest[1..end]).map(|c| (c, end)));

        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = entity.strip_prefix('#')?;
            let value = match code.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            char::from_u32(value)
        }
    }
}
