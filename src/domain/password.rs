use super::error::DomainError;

/// パスワードのハッシュ化と照合。具体的なアルゴリズムはInfra層が提供する。
pub trait PasswordScheme: Send + Sync {
    fn hash(&self, plaintext: &str) -> Result<String, DomainError>;

    /// 照合失敗・ハッシュ形式不正はいずれも false。
    fn verify(&self, candidate: &str, stored_hash: &str) -> bool;
}
