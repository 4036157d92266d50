//! # Registry — Users, Groups, Modules, Questions
//!
//! The relational bookkeeping the submission protocol needs: who holds
//! which key, who belongs to which group, which group administers which
//! module, and which questions a module has.
//!
//! ## Atomicity
//!
//! All tables and their unique indexes sit behind one `parking_lot`
//! `RwLock`. Every upsert performs its authorization check and its
//! mutation under a single write guard, so a concurrent request can never
//! slip between "is the actor a member?" and "apply the change". The lock
//! is never held across an `.await`.
//!
//! ## Identities
//!
//! Group membership is keyed by [`KeyId`], not by user row, so operator
//! keys from the server key ring can hold memberships without a user
//! registration.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use grader_core::KeyId;
use parking_lot::RwLock;
use serde::Serialize;

use crate::error::LedgerError;
use crate::store::{Row, Table};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub key_id: KeyId,
    /// DER SubjectPublicKeyInfo of the registered key.
    #[serde(skip)]
    pub public_key_der: Vec<u8>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRecord {
    pub id: i64,
    pub name: String,
    pub members: BTreeSet<KeyId>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl GroupRecord {
    pub fn is_member(&self, kid: &KeyId) -> bool {
        self.members.contains(kid)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleRecord {
    pub id: i64,
    pub name: String,
    pub admin_group: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionRecord {
    pub id: i64,
    pub module: String,
    pub name: String,
    /// Base64 grader definition, opaque to the ledger.
    pub grader: String,
    /// Distinct answers one submitter may own; zero or less is unlimited.
    pub max_try: i64,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

macro_rules! impl_row {
    ($($ty:ty),*) => {
        $(impl Row for $ty {
            fn id(&self) -> i64 {
                self.id
            }
        })*
    };
}

impl_row!(UserRecord, GroupRecord, ModuleRecord, QuestionRecord);

/// Result of an insert-or-update.
#[derive(Debug, Clone, PartialEq)]
pub struct Upsert<T> {
    pub record: T,
    pub created: bool,
}

/// Fields of a user registration.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub key_id: KeyId,
    pub public_key_der: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Tables {
    users: Table<UserRecord>,
    user_by_email: HashMap<String, i64>,
    user_by_kid: HashMap<KeyId, i64>,
    groups: Table<GroupRecord>,
    group_by_name: HashMap<String, i64>,
    modules: Table<ModuleRecord>,
    module_by_name: HashMap<String, i64>,
    questions: Table<QuestionRecord>,
    question_by_ref: HashMap<(i64, String), i64>,
}

impl Tables {
    fn group(&self, name: &str) -> Result<&GroupRecord, LedgerError> {
        self.group_by_name
            .get(name)
            .and_then(|id| self.groups.get(*id))
            .ok_or_else(|| LedgerError::UnknownGroup(name.to_string()))
    }

    fn require_member(&self, group: &str, kid: &KeyId) -> Result<&GroupRecord, LedgerError> {
        let record = self.group(group)?;
        if record.is_member(kid) {
            Ok(record)
        } else {
            Err(LedgerError::NotMember {
                kid: kid.clone(),
                group: group.to_string(),
            })
        }
    }

    fn module(&self, name: &str) -> Result<&ModuleRecord, LedgerError> {
        self.module_by_name
            .get(name)
            .and_then(|id| self.modules.get(*id))
            .ok_or_else(|| LedgerError::UnknownModule(name.to_string()))
    }
}

/// Shared handle to the registry tables. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    tables: Arc<RwLock<Tables>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Users ---------------------------------------------------------------

    pub fn user_by_kid(&self, kid: &KeyId) -> Option<UserRecord> {
        let tables = self.tables.read();
        let id = *tables.user_by_kid.get(kid)?;
        tables.users.get(id).cloned()
    }

    pub fn user_by_email(&self, email: &str) -> Option<UserRecord> {
        let tables = self.tables.read();
        let id = *tables.user_by_email.get(email)?;
        tables.users.get(id).cloned()
    }

    /// Insert a user keyed by email, or update the existing one.
    ///
    /// `authorize` sees the currently stored user (if any) and may veto
    /// the change. It runs under the write lock, so it must stay cheap:
    /// verify signatures beforehand and only compare key ids here.
    pub fn upsert_user<E>(
        &self,
        new: NewUser,
        authorize: impl FnOnce(Option<&UserRecord>) -> Result<(), E>,
    ) -> Result<Upsert<UserRecord>, E>
    where
        E: From<LedgerError>,
    {
        let mut guard = self.tables.write();
        let tables = &mut *guard;
        let existing_id = tables.user_by_email.get(&new.email).copied();
        let existing = existing_id.and_then(|id| tables.users.get(id));
        authorize(existing)?;

        if let Some(owner) = tables.user_by_kid.get(&new.key_id) {
            if Some(*owner) != existing_id {
                return Err(LedgerError::KeyInUse { kid: new.key_id }.into());
            }
        }

        let now = Utc::now();
        if let Some(user) = existing_id.and_then(|id| tables.users.get_mut(id)) {
            if user.key_id != new.key_id {
                tables.user_by_kid.remove(&user.key_id);
                tables.user_by_kid.insert(new.key_id.clone(), user.id);
            }
            user.username = new.username;
            user.key_id = new.key_id;
            user.public_key_der = new.public_key_der;
            user.updated = now;
            return Ok(Upsert {
                record: user.clone(),
                created: false,
            });
        }

        let id = tables.users.allocate_id();
        let record = UserRecord {
            id,
            username: new.username,
            email: new.email,
            key_id: new.key_id,
            public_key_der: new.public_key_der,
            created: now,
            updated: now,
        };
        tables.user_by_email.insert(record.email.clone(), id);
        tables.user_by_kid.insert(record.key_id.clone(), id);
        tables.users.insert(record.clone());
        Ok(Upsert {
            record,
            created: true,
        })
    }

    // -- Groups --------------------------------------------------------------

    pub fn group(&self, name: &str) -> Option<GroupRecord> {
        self.tables.read().group(name).ok().cloned()
    }

    /// Create a group with `actor` as its first member, or touch an
    /// existing one if `actor` is a member.
    pub fn upsert_group(&self, name: &str, actor: &KeyId) -> Result<Upsert<GroupRecord>, LedgerError> {
        let mut tables = self.tables.write();
        let now = Utc::now();
        if let Some(&id) = tables.group_by_name.get(name) {
            tables.require_member(name, actor)?;
            let group = tables
                .groups
                .get_mut(id)
                .ok_or_else(|| LedgerError::UnknownGroup(name.to_string()))?;
            group.updated = now;
            return Ok(Upsert {
                record: group.clone(),
                created: false,
            });
        }

        let id = tables.groups.allocate_id();
        let record = GroupRecord {
            id,
            name: name.to_string(),
            members: BTreeSet::from([actor.clone()]),
            created: now,
            updated: now,
        };
        tables.group_by_name.insert(record.name.clone(), id);
        tables.groups.insert(record.clone());
        Ok(Upsert {
            record,
            created: true,
        })
    }

    /// Add `member` to `group`. Only an existing member may do this.
    pub fn add_member(&self, group: &str, actor: &KeyId, member: &KeyId) -> Result<GroupRecord, LedgerError> {
        let mut tables = self.tables.write();
        let id = tables.require_member(group, actor)?.id;
        let record = tables
            .groups
            .get_mut(id)
            .ok_or_else(|| LedgerError::UnknownGroup(group.to_string()))?;
        if record.members.insert(member.clone()) {
            record.updated = Utc::now();
        }
        Ok(record.clone())
    }

    pub fn is_member(&self, group: &str, kid: &KeyId) -> Result<bool, LedgerError> {
        Ok(self.tables.read().group(group)?.is_member(kid))
    }

    // -- Modules -------------------------------------------------------------

    pub fn module(&self, name: &str) -> Option<ModuleRecord> {
        self.tables.read().module(name).ok().cloned()
    }

    /// Create or touch a module. The actor must belong to `admin_group`,
    /// and an existing module keeps the admin group it was created with.
    pub fn upsert_module(
        &self,
        name: &str,
        admin_group: &str,
        actor: &KeyId,
    ) -> Result<Upsert<ModuleRecord>, LedgerError> {
        let mut tables = self.tables.write();
        tables.require_member(admin_group, actor)?;
        let now = Utc::now();

        if let Some(&id) = tables.module_by_name.get(name) {
            let module = tables
                .modules
                .get_mut(id)
                .ok_or_else(|| LedgerError::UnknownModule(name.to_string()))?;
            if module.admin_group != admin_group {
                return Err(LedgerError::AdminGroupMismatch {
                    module: name.to_string(),
                    admin_group: module.admin_group.clone(),
                    requested: admin_group.to_string(),
                });
            }
            module.updated = now;
            return Ok(Upsert {
                record: module.clone(),
                created: false,
            });
        }

        let id = tables.modules.allocate_id();
        let record = ModuleRecord {
            id,
            name: name.to_string(),
            admin_group: admin_group.to_string(),
            created: now,
            updated: now,
        };
        tables.module_by_name.insert(record.name.clone(), id);
        tables.modules.insert(record.clone());
        Ok(Upsert {
            record,
            created: true,
        })
    }

    // -- Questions -----------------------------------------------------------

    pub fn question(&self, module: &str, name: &str) -> Result<QuestionRecord, LedgerError> {
        let tables = self.tables.read();
        let module_id = tables.module(module)?.id;
        tables
            .question_by_ref
            .get(&(module_id, name.to_string()))
            .and_then(|id| tables.questions.get(*id))
            .cloned()
            .ok_or_else(|| LedgerError::UnknownQuestion {
                module: module.to_string(),
                name: name.to_string(),
            })
    }

    /// Create a question, or replace the grader and try limit of an
    /// existing one. The actor must administer the module.
    pub fn upsert_question(
        &self,
        module: &str,
        name: &str,
        grader: &str,
        max_try: i64,
        actor: &KeyId,
    ) -> Result<Upsert<QuestionRecord>, LedgerError> {
        let mut tables = self.tables.write();
        let (module_id, admin_group) = {
            let m = tables.module(module)?;
            (m.id, m.admin_group.clone())
        };
        tables.require_member(&admin_group, actor)?;
        let now = Utc::now();
        let key = (module_id, name.to_string());

        if let Some(&id) = tables.question_by_ref.get(&key) {
            let question = tables.questions.get_mut(id).ok_or_else(|| LedgerError::UnknownQuestion {
                module: module.to_string(),
                name: name.to_string(),
            })?;
            question.grader = grader.to_string();
            question.max_try = max_try;
            question.updated = now;
            return Ok(Upsert {
                record: question.clone(),
                created: false,
            });
        }

        let id = tables.questions.allocate_id();
        let record = QuestionRecord {
            id,
            module: module.to_string(),
            name: name.to_string(),
            grader: grader.to_string(),
            max_try,
            created: now,
            updated: now,
        };
        tables.question_by_ref.insert(key, id);
        tables.questions.insert(record.clone());
        Ok(Upsert {
            record,
            created: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kid(n: u8) -> KeyId {
        KeyId::from_digest_prefix(&[n; 32], 20)
    }

    fn new_user(email: &str, k: u8) -> NewUser {
        NewUser {
            username: email.split('@').next().unwrap_or_default().to_string(),
            email: email.to_string(),
            key_id: kid(k),
            public_key_der: vec![k],
        }
    }

    fn allow(_: Option<&UserRecord>) -> Result<(), LedgerError> {
        Ok(())
    }

    #[test]
    fn test_user_create_then_update() {
        let reg = Registry::new();
        let first = reg.upsert_user(new_user("alice@example.org", 1), allow).unwrap();
        assert!(first.created);

        let mut renamed = new_user("alice@example.org", 1);
        renamed.username = "alice2".into();
        let second = reg.upsert_user(renamed, allow).unwrap();
        assert!(!second.created);
        assert_eq!(second.record.id, first.record.id);
        assert_eq!(reg.user_by_kid(&kid(1)).unwrap().username, "alice2");
    }

    #[test]
    fn test_key_rotation_reindexes() {
        let reg = Registry::new();
        reg.upsert_user(new_user("alice@example.org", 1), allow).unwrap();
        reg.upsert_user(new_user("alice@example.org", 2), allow).unwrap();
        assert!(reg.user_by_kid(&kid(1)).is_none());
        assert_eq!(reg.user_by_kid(&kid(2)).unwrap().email, "alice@example.org");
    }

    #[test]
    fn test_authorize_veto_leaves_user_untouched() {
        let reg = Registry::new();
        reg.upsert_user(new_user("alice@example.org", 1), allow).unwrap();
        let result = reg.upsert_user(new_user("alice@example.org", 2), |existing| {
            match existing {
                Some(u) if u.key_id != kid(2) => Err(LedgerError::KeyInUse { kid: kid(2) }),
                _ => Ok(()),
            }
        });
        assert!(result.is_err());
        assert!(reg.user_by_kid(&kid(1)).is_some());
    }

    #[test]
    fn test_key_cannot_be_shared_between_users() {
        let reg = Registry::new();
        reg.upsert_user(new_user("alice@example.org", 1), allow).unwrap();
        assert_eq!(
            reg.upsert_user(new_user("bob@example.org", 1), allow),
            Err(LedgerError::KeyInUse { kid: kid(1) })
        );
    }

    #[test]
    fn test_group_creator_is_member_and_outsider_rejected() {
        let reg = Registry::new();
        let g = reg.upsert_group("G", &kid(1)).unwrap();
        assert!(g.created);
        assert!(reg.is_member("G", &kid(1)).unwrap());

        assert!(matches!(
            reg.upsert_group("G", &kid(2)),
            Err(LedgerError::NotMember { .. })
        ));
        assert!(!reg.upsert_group("G", &kid(1)).unwrap().created);
    }

    #[test]
    fn test_add_member_requires_membership() {
        let reg = Registry::new();
        reg.upsert_group("G", &kid(1)).unwrap();
        assert!(reg.add_member("G", &kid(2), &kid(3)).is_err());
        let g = reg.add_member("G", &kid(1), &kid(2)).unwrap();
        assert!(g.is_member(&kid(2)));
        assert!(matches!(
            reg.add_member("H", &kid(1), &kid(2)),
            Err(LedgerError::UnknownGroup(_))
        ));
    }

    #[test]
    fn test_module_admin_group_is_fixed() {
        let reg = Registry::new();
        reg.upsert_group("staff", &kid(1)).unwrap();
        reg.upsert_group("other", &kid(1)).unwrap();
        assert!(reg.upsert_module("M", "staff", &kid(1)).unwrap().created);
        assert!(matches!(
            reg.upsert_module("M", "other", &kid(1)),
            Err(LedgerError::AdminGroupMismatch { .. })
        ));
        assert!(matches!(
            reg.upsert_module("M2", "staff", &kid(9)),
            Err(LedgerError::NotMember { .. })
        ));
    }

    #[test]
    fn test_question_upsert_replaces_grader() {
        let reg = Registry::new();
        reg.upsert_group("staff", &kid(1)).unwrap();
        reg.upsert_module("M", "staff", &kid(1)).unwrap();

        let q = reg.upsert_question("M", "Q", "Zw==", 3, &kid(1)).unwrap();
        assert!(q.created);
        let q2 = reg.upsert_question("M", "Q", "aA==", 5, &kid(1)).unwrap();
        assert!(!q2.created);
        assert_eq!(q2.record.id, q.record.id);

        let stored = reg.question("M", "Q").unwrap();
        assert_eq!((stored.grader.as_str(), stored.max_try), ("aA==", 5));

        assert!(matches!(
            reg.upsert_question("M", "Q", "Zw==", 3, &kid(2)),
            Err(LedgerError::NotMember { .. })
        ));
        assert!(matches!(
            reg.question("M", "nope"),
            Err(LedgerError::UnknownQuestion { .. })
        ));
    }
}
