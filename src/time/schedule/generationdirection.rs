use serde::{
    Serialize,
    Deserialize
};

/// 數值即日期推移的方向符號
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationDirection {
    Forward = 1,
    Backward = -1
}

impl Default for GenerationDirection {
    fn default() -> Self {
        GenerationDirection::Backward
    }
}
