use super::{LogKind, audit, db_error, rows_json};
use roster_core::{Error, HttpRequest, HttpResponse, envelope};
use roster_db::{
    ColumnValue, CompareOp, Comparison, Condition, Database, DbResult, Pagination, QuerySpec, Row,
    SortOrder, Values,
};
use roster_log::Logger;
use serde_json::json;

const TABLE: &str = "influencers";
const STATUSES: [&str; 3] = ["active", "inactive", "archived"];
const SORTABLE: [&str; 4] = ["id", "name", "followers", "created_at"];

pub struct InfluencerController {
    db: Database,
    logger: Logger,
}

impl InfluencerController {
    pub fn new(db: Database, logger: Logger) -> Self {
        Self { db, logger }
    }

    /// Paginated list in the tabulator envelope.
    ///
    /// Query parameters: `page`, `size`, `search` (name, handle or platform)
    /// and `sort`/`dir`.
    pub fn index(&mut self, req: &HttpRequest) -> Result<HttpResponse, Error> {
        let pagination = Pagination::from_params(req.input("page"), req.input("size"));

        let sort = req.input("sort").unwrap_or("id");
        if !SORTABLE.contains(&sort) {
            return Err(Error::BadRequest(format!("cannot sort by '{}'", sort)));
        }
        let dir = req
            .input("dir")
            .map(SortOrder::parse_lenient)
            .unwrap_or(SortOrder::Desc);

        let mut spec = QuerySpec::table(TABLE).order_by(sort, dir);
        if let Some(term) = req.input("search").map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = format!("%{}%", term);
            spec = spec.filter(Condition::or(vec![
                Comparison::new("name", CompareOp::Like, pattern.as_str()),
                Comparison::new("handle", CompareOp::Like, pattern.as_str()),
                Comparison::new("platform", CompareOp::Like, pattern.as_str()),
            ]));
        }

        let page = self.db.paginate(&spec, &pagination).map_err(db_error)?;
        Ok(envelope::tabulator(
            rows_json(page.items),
            page.total,
            page.per_page,
            None,
        ))
    }

    pub fn show(&mut self, id: i64) -> Result<HttpResponse, Error> {
        let row = self.find(id)?;
        Ok(envelope::success(row.into_json(), None))
    }

    pub fn store(&mut self, req: &HttpRequest) -> Result<HttpResponse, Error> {
        let input = InfluencerInput::from_request(req)?;
        let name = match input.name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                return Err(Error::validation(
                    "Validation failed",
                    vec!["name is required".to_string()],
                ));
            }
        };
        let values = input
            .values()
            .set("created_at", ColumnValue::raw("CURRENT_TIMESTAMP"));

        let id = self
            .db
            .transaction(|db| -> DbResult<i64> {
                let id = db.insert(TABLE, &values)?;
                audit(
                    db,
                    LogKind::Influencer,
                    Some(id),
                    "create",
                    &format!("Created influencer {}", name),
                )?;
                Ok(id)
            })
            .map_err(db_error)?;

        self.logger.info(&format!("Influencer {} created", id));
        let row = self.find(id)?;
        Ok(envelope::success_with_status(
            row.into_json(),
            Some("Influencer created"),
            201,
        ))
    }

    pub fn update(&mut self, req: &HttpRequest, id: i64) -> Result<HttpResponse, Error> {
        let input = InfluencerInput::from_request(req)?;
        if matches!(input.name.as_deref(), Some("")) {
            return Err(Error::validation(
                "Validation failed",
                vec!["name cannot be empty".to_string()],
            ));
        }
        let values = input.values();
        if values.is_empty() {
            return Err(Error::validation(
                "Validation failed",
                vec!["no fields to update".to_string()],
            ));
        }
        self.find(id)?;

        let fields = values.iter().map(|(c, _)| c).collect::<Vec<_>>().join(", ");
        let values = values.set("updated_at", ColumnValue::raw("CURRENT_TIMESTAMP"));
        self.db
            .transaction(|db| -> DbResult<()> {
                db.update(TABLE, &values, &[Condition::eq("id", id)])?;
                audit(
                    db,
                    LogKind::Influencer,
                    Some(id),
                    "update",
                    &format!("Updated {}", fields),
                )?;
                Ok(())
            })
            .map_err(db_error)?;

        self.logger.info(&format!("Influencer {} updated", id));
        let row = self.find(id)?;
        Ok(envelope::success(row.into_json(), Some("Influencer updated")))
    }

    pub fn destroy(&mut self, id: i64) -> Result<HttpResponse, Error> {
        let row = self.find(id)?;
        let name = row.get_str("name").unwrap_or_default().to_string();

        self.db
            .transaction(|db| -> DbResult<()> {
                db.delete(TABLE, &[Condition::eq("id", id)])?;
                audit(
                    db,
                    LogKind::Influencer,
                    Some(id),
                    "delete",
                    &format!("Deleted influencer {}", name),
                )?;
                Ok(())
            })
            .map_err(db_error)?;

        self.logger.info(&format!("Influencer {} deleted", id));
        Ok(envelope::success(json!({ "id": id }), Some("Influencer deleted")))
    }

    fn find(&mut self, id: i64) -> Result<Row, Error> {
        self.db
            .select_one(TABLE, &[Condition::eq("id", id)])
            .map_err(db_error)?
            .ok_or_else(|| Error::NotFound(format!("Influencer {} not found", id)))
    }
}

/// Fields accepted from a form or JSON body; absent fields stay untouched.
#[derive(Debug, Default)]
struct InfluencerInput {
    name: Option<String>,
    handle: Option<String>,
    platform: Option<String>,
    followers: Option<i64>,
    email: Option<String>,
    status: Option<String>,
}

impl InfluencerInput {
    fn from_request(req: &HttpRequest) -> Result<Self, Error> {
        let params = req.body_params();
        let text = |key: &str| params.get(key).map(|v| v.trim().to_string());
        let mut errors = Vec::new();

        let followers = match params.get("followers").map(str::trim) {
            None | Some("") => None,
            Some(raw) => match raw.parse::<i64>() {
                Ok(n) if n >= 0 => Some(n),
                _ => {
                    errors.push("followers must be a non-negative integer".to_string());
                    None
                }
            },
        };

        let email = text("email").filter(|e| !e.is_empty());
        if let Some(email) = &email {
            if !email.contains('@') {
                errors.push("email must be a valid address".to_string());
            }
        }

        let status = text("status").filter(|s| !s.is_empty());
        if let Some(status) = &status {
            if !STATUSES.contains(&status.as_str()) {
                errors.push(format!("status must be one of {}", STATUSES.join(", ")));
            }
        }

        if !errors.is_empty() {
            return Err(Error::validation("Validation failed", errors));
        }

        Ok(Self {
            name: text("name"),
            handle: text("handle"),
            platform: text("platform").map(|p| p.to_lowercase()),
            followers,
            email,
            status,
        })
    }

    fn values(&self) -> Values {
        let mut values = Values::new();
        if let Some(name) = &self.name {
            values.insert("name", name.as_str());
        }
        if let Some(handle) = &self.handle {
            values.insert("handle", handle.as_str());
        }
        if let Some(platform) = &self.platform {
            values.insert("platform", platform.as_str());
        }
        if let Some(followers) = self.followers {
            values.insert("followers", followers);
        }
        if let Some(email) = &self.email {
            values.insert("email", email.as_str());
        }
        if let Some(status) = &self.status {
            values.insert("status", status.as_str());
        }
        values
    }
}
