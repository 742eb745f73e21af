use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::DomainError;

/// ストアに格納されるエンティティ。
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync {
    /// 完全一致検索に使えるフィールド。
    type Field: Copy + std::fmt::Debug + Send + Sync;

    /// ログ出力用の種別名。
    const KIND: &'static str;

    fn record_id(&self) -> &str;

    fn field_value(&self, field: Self::Field) -> &str;

    fn matches(&self, field: Self::Field, value: &str) -> bool {
        self.field_value(field) == value
    }

    /// 読み込んだレコードが不変条件を満たすか。手で編集されたファイル向け。
    fn validate(&self) -> Result<(), DomainError> {
        Ok(())
    }
}

/// 永続化の抽象。Infra層が実装する。1 Repository = 1エンティティ種別の全件。
pub trait RecordRepository<T: Record> {
    type Error: std::error::Error + Send + Sync + 'static;

    /// 全件を読み込む。未作成なら空。
    fn load(&self) -> Result<Vec<T>, Self::Error>;

    /// 全件で上書きする。
    fn save(&self, records: &[T]) -> Result<(), Self::Error>;

    /// ログ・エラー表示用の保存先。
    fn location(&self) -> String;
}
