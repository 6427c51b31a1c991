//! Account directory: password hashing and the built-in demo accounts.

use chrono::{DateTime, Utc};
use iverton_types::auth::{Account, User, UserRole};
use iverton_types::error::AuthError;
use uuid::Uuid;

/// One-way password hashing for stored accounts.
///
/// Hashes are self-describing strings that carry their own salt and
/// parameters, so `verify` needs nothing but the stored hash.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, AuthError>;

    /// Whether `password` matches `hash`. A malformed hash never matches.
    fn verify(&self, password: &str, hash: &str) -> bool;
}

/// Demo logins available on a fresh install: (email, password, name, role).
pub const DEMO_ACCOUNTS: &[(&str, &str, &str, UserRole)] = &[
    ("demo@example.com", "demo123", "Demo User", UserRole::BrandManager),
    ("admin@example.com", "admin123", "Admin User", UserRole::Admin),
    ("analyst@example.com", "analyst123", "Data Analyst", UserRole::Analyst),
];

pub fn create_account(
    hasher: &dyn PasswordHasher,
    email: &str,
    password: &str,
    name: &str,
    role: UserRole,
    now: DateTime<Utc>,
) -> Result<Account, AuthError> {
    let password_hash = hasher.hash(password)?;
    Ok(Account {
        user: User {
            id: Uuid::now_v7(),
            email: email.trim().to_lowercase(),
            name: name.trim().to_string(),
            role,
            created_at: now,
        },
        password_hash,
    })
}

pub fn demo_accounts(hasher: &dyn PasswordHasher, now: DateTime<Utc>) -> Vec<Account> {
    DEMO_ACCOUNTS
        .iter()
        .filter_map(|(email, password, name, role)| {
            match create_account(hasher, email, password, name, *role, now) {
                Ok(account) => Some(account),
                Err(e) => {
                    tracing::warn!(email, error = %e, "skipping demo account");
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Non-cryptographic hasher for store tests: a fresh salt, then the password.
    pub(crate) struct PlainHasher;

    impl PasswordHasher for PlainHasher {
        fn hash(&self, password: &str) -> Result<String, AuthError> {
            Ok(format!("{}:{password}", Uuid::new_v4().simple()))
        }

        fn verify(&self, password: &str, hash: &str) -> bool {
            hash.split_once(':').is_some_and(|(_, p)| p == password)
        }
    }

    struct FailingHasher;

    impl PasswordHasher for FailingHasher {
        fn hash(&self, _password: &str) -> Result<String, AuthError> {
            Err(AuthError::Hashing)
        }

        fn verify(&self, _password: &str, _hash: &str) -> bool {
            false
        }
    }

    #[test]
    fn demo_accounts_verify_their_passwords() {
        let accounts = demo_accounts(&PlainHasher, Utc::now());
        assert_eq!(accounts.len(), 3);
        let demo = &accounts[0];
        assert_eq!(demo.user.role, UserRole::BrandManager);
        assert!(PlainHasher.verify("demo123", &demo.password_hash));
        assert!(!PlainHasher.verify("demo124", &demo.password_hash));
    }

    #[test]
    fn same_password_hashes_differently_per_account() {
        let now = Utc::now();
        let a = create_account(&PlainHasher, "a@x.io", "pw1234", "A", UserRole::Viewer, now).unwrap();
        let b = create_account(&PlainHasher, "b@x.io", "pw1234", "B", UserRole::Viewer, now).unwrap();
        assert_ne!(a.password_hash, b.password_hash);
    }

    #[test]
    fn hashing_failure_is_reported() {
        let err = create_account(&FailingHasher, "a@x.io", "pw1234", "A", UserRole::Viewer, Utc::now())
            .unwrap_err();
        assert_eq!(err, AuthError::Hashing);
        assert!(demo_accounts(&FailingHasher, Utc::now()).is_empty());
    }
}
