use super::{db_error, rows_json};
use roster_core::{Error, HttpResponse, envelope};
use roster_db::{Column, Condition, Database, QuerySpec, SortOrder};
use roster_log::Logger;

const TABLE: &str = "users";

/// Which users a listing returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserListKind {
    All,
    Active,
    Admins,
}

impl UserListKind {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Some(UserListKind::All),
            "active" => Some(UserListKind::Active),
            "admins" => Some(UserListKind::Admins),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserListKind::All => "all",
            UserListKind::Active => "active",
            UserListKind::Admins => "admins",
        }
    }

    fn conditions(&self) -> Vec<Condition> {
        match self {
            UserListKind::All => Vec::new(),
            UserListKind::Active => vec![Condition::eq("active", 1)],
            UserListKind::Admins => vec![Condition::eq("role", "admin")],
        }
    }
}

pub struct UserController {
    db: Database,
    logger: Logger,
}

impl UserController {
    pub fn new(db: Database, logger: Logger) -> Self {
        Self { db, logger }
    }

    pub fn index(&mut self, kind: UserListKind) -> Result<HttpResponse, Error> {
        let spec = kind
            .conditions()
            .into_iter()
            .fold(Self::base_query(), QuerySpec::filter)
            .order_by("username", SortOrder::Asc);

        let rows = self.db.select_spec(&spec).map_err(db_error)?;
        self.logger
            .debug(&format!("Listed {} {} users", rows.len(), kind.as_str()));
        Ok(envelope::success(rows_json(rows).into(), None))
    }

    pub fn show(&mut self, id: i64) -> Result<HttpResponse, Error> {
        let rows = self
            .db
            .select_spec(&Self::base_query().filter(Condition::eq("id", id)).limit(1))
            .map_err(db_error)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("User {} not found", id)))?;
        Ok(envelope::success(row.into_json(), None))
    }

    fn base_query() -> QuerySpec {
        QuerySpec::table(TABLE).columns([
            Column::from("id"),
            Column::from("username"),
            Column::from("email"),
            Column::from("role"),
            Column::from("active"),
            Column::from("created_at"),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;
    use roster_db::Values;
    use serde_json::Value;

    fn controller() -> UserController {
        let mut db = Database::open_in_memory().unwrap();
        schema::bootstrap(&mut db).unwrap();
        for (username, role, active) in [
            ("carol", "admin", 1),
            ("alice", "member", 1),
            ("bob", "admin", 0),
        ] {
            db.insert(
                TABLE,
                &Values::new()
                    .set("username", username)
                    .set("role", role)
                    .set("active", active),
            )
            .unwrap();
        }
        UserController::new(db, Logger::new("roster::test"))
    }

    fn usernames(resp: HttpResponse) -> Vec<String> {
        match resp {
            HttpResponse::Json { payload, .. } => payload["data"]
                .as_array()
                .unwrap()
                .iter()
                .map(|u| u["username"].as_str().unwrap().to_string())
                .collect(),
            other => panic!("expected json, got {:?}", other),
        }
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!(UserListKind::from_str("Admins"), Some(UserListKind::Admins));
        assert_eq!(UserListKind::from_str("deleted"), None);
    }

    #[test]
    fn test_listing_kinds() {
        let mut ctl = controller();
        assert_eq!(
            usernames(ctl.index(UserListKind::All).unwrap()),
            vec!["alice", "bob", "carol"]
        );
        assert_eq!(
            usernames(ctl.index(UserListKind::Active).unwrap()),
            vec!["alice", "carol"]
        );
        assert_eq!(
            usernames(ctl.index(UserListKind::Admins).unwrap()),
            vec!["bob", "carol"]
        );
    }

    #[test]
    fn test_show() {
        let mut ctl = controller();
        match ctl.show(2).unwrap() {
            HttpResponse::Json { payload, .. } => {
                assert_eq!(payload["data"]["username"], Value::from("alice"));
            }
            other => panic!("expected json, got {:?}", other),
        }
        assert!(matches!(ctl.show(99), Err(Error::NotFound(_))));
    }
}
