/// 用于处理 SurrealDB 记录 ID 的序列化/反序列化辅助模块

use serde::{Deserialize, Deserializer, Serializer};

/// 处理 SurrealDB 的记录 ID 格式 (例如: "donor:xxxxx")
///
/// Queries in this crate normalize ids with `type::string(id)`, so the
/// common case is a plain string. Records fetched through other paths can
/// still carry a raw `Thing`, either as `{tb, id: "xxx"}` or with the
/// inner id wrapped as `{tb, id: {"String": "xxx"}}`.
pub mod thing_id {
    use super::*;

    pub fn serialize<S>(id: &str, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(id)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum IdValue {
            String(String),
            Thing {
                tb: String,
                id: serde_json::Value,
            },
        }

        match IdValue::deserialize(deserializer)? {
            IdValue::String(s) => Ok(s),
            IdValue::Thing { tb, id } => match id {
                serde_json::Value::String(s) => Ok(format!("{}:{}", tb, s)),
                serde_json::Value::Number(n) => Ok(format!("{}:{}", tb, n)),
                serde_json::Value::Object(map) => {
                    match map.get("String").and_then(|v| v.as_str()) {
                        Some(s) => Ok(format!("{}:{}", tb, s)),
                        None => Ok(format!("{}:{}", tb, serde_json::Value::Object(map))),
                    }
                }
                _ => Ok(format!("{}:{}", tb, id)),
            },
        }
    }
}
