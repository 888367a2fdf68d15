use super::{db_error, rows_json};
use roster_core::{Error, HttpRequest, HttpResponse, envelope};
use roster_db::{
    Column, Condition, Database, Join, Paginated, Pagination, QuerySpec, Row, SortOrder,
};
use roster_log::Logger;

const TABLE: &str = "logs";

/// The audit trail a log entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Influencer,
    User,
    System,
}

impl LogKind {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "influencer" | "influencers" => Some(LogKind::Influencer),
            "user" | "users" => Some(LogKind::User),
            "system" => Some(LogKind::System),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::Influencer => "influencer",
            LogKind::User => "user",
            LogKind::System => "system",
        }
    }
}

pub struct LogController {
    db: Database,
    logger: Logger,
}

impl LogController {
    pub fn new(db: Database, logger: Logger) -> Self {
        Self { db, logger }
    }

    /// Paginated log entries of one kind, newest first.
    ///
    /// `subject_id` narrows influencer and user logs to one record.
    pub fn index(&mut self, req: &HttpRequest, kind: LogKind) -> Result<HttpResponse, Error> {
        let pagination = Pagination::from_params(req.input("page"), req.input("size"));
        let subject = match req.input("subject_id") {
            Some(raw) => Some(raw.trim().parse::<i64>().map_err(|_| {
                Error::BadRequest(format!("invalid subject_id '{}'", raw))
            })?),
            None => None,
        };

        let page = match kind {
            LogKind::Influencer => self.influencer_logs(subject, &pagination),
            LogKind::User => self.user_logs(subject, &pagination),
            LogKind::System => self.system_logs(&pagination),
        }?;

        self.logger.debug(&format!(
            "Listed {} of {} {} log entries",
            page.items.len(),
            page.total,
            kind.as_str()
        ));
        Ok(envelope::tabulator(
            rows_json(page.items),
            page.total,
            page.per_page,
            None,
        ))
    }

    fn influencer_logs(
        &mut self,
        subject: Option<i64>,
        pagination: &Pagination,
    ) -> Result<Paginated<Row>, Error> {
        let spec = Self::subject_query(
            LogKind::Influencer,
            Join::left("influencers", "influencers.id = logs.subject_id"),
            Column::As("influencers.name".into(), "subject_name".into()),
            subject,
        );
        self.db.paginate(&spec, pagination).map_err(db_error)
    }

    fn user_logs(
        &mut self,
        subject: Option<i64>,
        pagination: &Pagination,
    ) -> Result<Paginated<Row>, Error> {
        let spec = Self::subject_query(
            LogKind::User,
            Join::left("users", "users.id = logs.subject_id"),
            Column::As("users.username".into(), "subject_name".into()),
            subject,
        );
        self.db.paginate(&spec, pagination).map_err(db_error)
    }

    fn system_logs(&mut self, pagination: &Pagination) -> Result<Paginated<Row>, Error> {
        let spec = QuerySpec::table(TABLE)
            .filter(Condition::eq("kind", LogKind::System.as_str()))
            .order_by("id", SortOrder::Desc);
        self.db.paginate(&spec, pagination).map_err(db_error)
    }

    fn subject_query(kind: LogKind, join: Join, name: Column, subject: Option<i64>) -> QuerySpec {
        let mut spec = QuerySpec::table(TABLE)
            .columns([Column::from("logs.*"), name])
            .join(join)
            .filter(Condition::eq("logs.kind", kind.as_str()))
            .order_by("logs.id", SortOrder::Desc);
        if let Some(id) = subject {
            spec = spec.filter(Condition::eq("logs.subject_id", id));
        }
        spec
    }
}
