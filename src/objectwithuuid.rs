use uuid::Uuid;

/// 每個建好的模型都有一個隨機 v4 id，結果集會沿用它。
pub trait ObjectWithUUID {
    fn uuid(&self) -> &Uuid;
}
