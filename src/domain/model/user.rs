use serde::{Deserialize, Serialize};
use std::fmt;

use super::id::{BookId, UserId};
use crate::domain::error::DomainError;
use crate::domain::password::PasswordScheme;
use crate::domain::repository::Record;

/// アカウント種別。ファイル上は大文字の文字列。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    User,
    /// 未知の種別はそのまま保持する
    Other(String),
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "ADMIN" => Role::Admin,
            "USER" => Role::User,
            _ => Role::Other(s),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => f.write_str("ADMIN"),
            Role::User => f.write_str("USER"),
            Role::Other(s) => f.write_str(s),
        }
    }
}

/// 利用者。パスワードはハッシュのみ保持する。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "fname")]
    first_name: String,
    #[serde(rename = "lname")]
    last_name: String,
    email: String,
    #[serde(rename = "password")]
    password_hash: String,
    role: Role,
    #[serde(default)]
    id: UserId,
    #[serde(default)]
    books: Vec<BookId>,
    #[serde(default)]
    notes: Vec<String>,
}

/// API公開用のビュー（パスワードハッシュを含まない）。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    pub books: Vec<BookId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserField {
    Id,
    Email,
}

impl User {
    /// `password_hash` は `PasswordScheme::hash` 済みの値。
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            role,
            id: UserId::new(),
            books: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: UserId) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> &UserId {
        &self.id
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn books(&self) -> &[BookId] {
        &self.books
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn set_first_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.first_name = name.into();
        self
    }

    pub fn set_last_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.last_name = name.into();
        self
    }

    pub fn set_email(&mut self, email: impl Into<String>) -> &mut Self {
        self.email = email.into();
        self
    }

    pub fn set_role(&mut self, role: Role) -> &mut Self {
        self.role = role;
        self
    }

    /// 平文を受け取り、ハッシュ化して置き換える。
    pub fn set_password(
        &mut self,
        plaintext: &str,
        scheme: &dyn PasswordScheme,
    ) -> Result<&mut Self, DomainError> {
        self.password_hash = scheme.hash(plaintext)?;
        Ok(self)
    }

    /// 計算済みのハッシュで置き換える。
    pub fn set_password_hash(&mut self, hash: impl Into<String>) -> &mut Self {
        self.password_hash = hash.into();
        self
    }

    pub fn verify_password(&self, candidate: &str, scheme: &dyn PasswordScheme) -> bool {
        scheme.verify(candidate, &self.password_hash)
    }

    /// 借りている本を記録する。重複は無視。
    pub fn add_book(&mut self, book: BookId) -> &mut Self {
        if !self.books.contains(&book) {
            self.books.push(book);
        }
        self
    }

    pub fn remove_book(&mut self, book: &BookId) -> bool {
        let before = self.books.len();
        self.books.retain(|b| b != book);
        self.books.len() != before
    }

    pub fn add_note(&mut self, note: impl Into<String>) -> &mut Self {
        self.notes.push(note.into());
        self
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            role: self.role.clone(),
            books: self.books.clone(),
        }
    }
}

impl Record for User {
    type Field = UserField;

    const KIND: &'static str = "user";

    fn record_id(&self) -> &str {
        self.id.as_str()
    }

    fn field_value(&self, field: UserField) -> &str {
        match field {
            UserField::Id => self.id.as_str(),
            UserField::Email => &self.email,
        }
    }
}
