use std::sync::Arc;

use crate::config::WritePolicy;
use crate::domain::model::id::UserId;
use crate::domain::model::user::{Role, User, UserField};
use crate::domain::password::PasswordScheme;
use crate::domain::repository::RecordRepository;

use super::error::AppError;
use super::store::RecordStore;

/// 照合対象がないときに代わりに照合する平文。
const DECOY_PASSWORD: &str = "decoy-password-never-assigned";

/// 利用者のユースケース。
/// メールアドレスは登録時に一意性を検査する（大文字小文字を区別しない）。
pub struct UserManager<R: RecordRepository<User>> {
    store: RecordStore<User, R>,
    scheme: Arc<dyn PasswordScheme>,
    policy: WritePolicy,
    decoy_hash: String,
}

impl<R: RecordRepository<User>> UserManager<R> {
    pub fn open(
        repo: R,
        scheme: Arc<dyn PasswordScheme>,
        policy: WritePolicy,
    ) -> Result<Self, AppError> {
        let store = RecordStore::open(repo)?;
        let decoy_hash = scheme.hash(DECOY_PASSWORD)?;
        Ok(Self {
            store,
            scheme,
            policy,
            decoy_hash,
        })
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn find_by(&self, field: UserField, value: &str) -> Vec<User> {
        self.store.find_by(field, value)
    }

    pub fn get(&self, id: &UserId) -> Option<User> {
        self.store.get(id.as_str())
    }

    pub fn all(&self) -> Vec<User> {
        self.store.snapshot()
    }

    /// メールとパスワードを照合する。
    ///
    /// 該当なし・複数該当・パスワード不一致はすべて `None`。
    /// どの場合もハッシュ照合を1回行い、失敗理由を外に出さない。
    pub fn verify_credentials(&self, email: &str, candidate: &str) -> Option<User> {
        let mut matches = self.store.find_by(UserField::Email, email);
        let user = if matches.len() == 1 { matches.pop() } else { None };
        match user {
            Some(user) if user.verify_password(candidate, self.scheme.as_ref()) => {
                tracing::debug!(user = %user.id(), "credentials verified");
                Some(user)
            }
            Some(_) => {
                tracing::warn!("credential check failed");
                None
            }
            None => {
                let _ = self.scheme.verify(candidate, &self.decoy_hash);
                tracing::warn!("credential check failed");
                None
            }
        }
    }

    /// 利用者を追加する。IDかメールが既存と重複すればエラー。
    pub fn add(&self, user: User) -> Result<(), AppError> {
        let mut writer = self.store.write();
        if writer.contains(user.id().as_str()) {
            return Err(AppError::DuplicateId(user.id().to_string()));
        }
        if writer
            .records()
            .iter()
            .any(|u| u.email().eq_ignore_ascii_case(user.email()))
        {
            return Err(AppError::DuplicateEmail(user.email().to_string()));
        }
        tracing::info!(user = %user.id(), "user added");
        writer.push(user);
        if self.policy.flush_on_write {
            writer.flush()?;
        }
        Ok(())
    }

    /// 平文パスワードをハッシュ化して新規登録する。
    pub fn register(
        &self,
        first_name: &str,
        last_name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<User, AppError> {
        let hash = self.scheme.hash(password)?;
        let user = User::new(first_name, last_name, email, hash, role);
        self.add(user.clone())?;
        Ok(user)
    }

    /// 1件を更新する。更新後のメールが他の利用者と重複する場合は変更しない。
    pub fn update<O, F>(&self, id: &UserId, f: F) -> Result<O, AppError>
    where
        F: FnOnce(&mut User) -> Result<O, AppError>,
    {
        let mut writer = self.store.write();
        let taken: Vec<String> = writer
            .records()
            .iter()
            .filter(|u| u.id() != id)
            .map(|u| u.email().to_ascii_lowercase())
            .collect();
        let out = writer
            .update(id.as_str(), |user| {
                let out = f(user)?;
                if taken.contains(&user.email().to_ascii_lowercase()) {
                    return Err(AppError::DuplicateEmail(user.email().to_string()));
                }
                Ok(out)
            })?
            .ok_or_else(|| AppError::UserNotFound(id.clone()))?;
        if self.policy.flush_on_write {
            writer.flush()?;
        }
        Ok(out)
    }

    /// ハッシュ計算はロックの外で行い、差し替えだけを書き込みロック下で行う。
    pub fn change_password(&self, id: &UserId, password: &str) -> Result<(), AppError> {
        let hash = self.scheme.hash(password)?;
        self.update(id, |user| {
            user.set_password_hash(hash);
            Ok(())
        })
    }

    pub fn flush(&self) -> Result<(), AppError> {
        self.store.flush()
    }

    pub fn is_dirty(&self) -> bool {
        self.store.is_dirty()
    }

    pub fn close(self) -> Result<(), AppError> {
        self.store.close()
    }
}
