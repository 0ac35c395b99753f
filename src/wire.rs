use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::Sink;
use futures::stream;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;

use crate::auth::{StaybookAuthSource, login_err, session_username};
use crate::engine::{BookingManager, EngineError};
use crate::model::*;
use crate::observability;
use crate::sql::{self, Command, ResultShape, SqlError};
use crate::store::{Store, StoreError, UserDirectory};

pub struct StaybookHandler {
    manager: Arc<BookingManager>,
    store: Arc<Store>,
    query_parser: Arc<StaybookQueryParser>,
}

impl StaybookHandler {
    pub fn new(manager: Arc<BookingManager>, store: Arc<Store>) -> Self {
        Self {
            manager,
            store,
            query_parser: Arc::new(StaybookQueryParser),
        }
    }

    /// The registered user behind the session's login name.
    async fn requester<C: ClientInfo>(&self, client: &C) -> PgWireResult<User> {
        let username = session_username(client)?;
        match self.store.user_by_username(username).await.map_err(store_err)? {
            Some(user) => Ok(user),
            None => {
                metrics::counter!(observability::UNKNOWN_USER_TOTAL).increment(1);
                Err(login_err(format!(
                    "user {username} is not registered; INSERT INTO users first"
                )))
            }
        }
    }

    async fn run<C: ClientInfo>(&self, client: &C, sql: &str) -> PgWireResult<Response> {
        let cmd = sql::parse_sql(sql).map_err(sql_err)?;
        let label = observability::command_label(&cmd);
        let started = Instant::now();
        let result = self.execute_command(client, cmd).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::QUERIES_TOTAL, "command" => label, "status" => status)
            .increment(1);
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn execute_command<C: ClientInfo>(
        &self,
        client: &C,
        cmd: Command,
    ) -> PgWireResult<Response> {
        match cmd {
            Command::RegisterUser {
                first_name,
                last_name,
            } => {
                let username = session_username(client)?;
                let user = self
                    .store
                    .register_user(username, &first_name, &last_name)
                    .await
                    .map_err(store_err)?;
                Ok(rows(user_schema(), [user], encode_user))
            }
            Command::ListSpot { listing } => {
                let owner = self.requester(client).await?;
                let spot = self
                    .store
                    .list_spot(owner.id, listing)
                    .await
                    .map_err(store_err)?;
                Ok(rows(spot_schema(), [spot], encode_spot))
            }
            Command::SelectSpots => {
                let spots = self.store.spots().await;
                Ok(rows(spot_schema(), spots, encode_spot))
            }
            Command::SelectSpot { id } => {
                let detail = self.store.spot_detail(id).await.map_err(store_err)?;
                Ok(rows(spot_detail_schema(), [detail], encode_spot_detail))
            }
            Command::SelectOwnerSpots { owner_id } => {
                let spots = self.store.spots_of_owner(owner_id).await;
                Ok(rows(spot_schema(), spots, encode_spot))
            }
            Command::UpdateSpot { id, patch } => {
                let owner = self.requester(client).await?;
                let spot = self
                    .store
                    .update_spot(owner.id, id, patch)
                    .await
                    .map_err(store_err)?;
                Ok(rows(spot_schema(), [spot], encode_spot))
            }
            Command::DeleteSpot { id } => {
                let owner = self.requester(client).await?;
                self.store
                    .delete_spot(owner.id, id, self.manager.today())
                    .await
                    .map_err(store_err)?;
                Ok(Response::Execution(Tag::new("DELETE").with_rows(1)))
            }
            Command::SelectMe => {
                let me = self.requester(client).await?;
                Ok(rows(user_schema(), [me], encode_user))
            }
            Command::CreateBooking {
                spot_id,
                start,
                end,
            } => {
                let renter = self.requester(client).await?;
                let booking = self
                    .manager
                    .create(spot_id, renter.id, start, end)
                    .await
                    .map_err(engine_err)?;
                Ok(rows(booking_schema(), [booking], encode_booking))
            }
            Command::UpdateBooking { id, start, end } => {
                let requester = self.requester(client).await?;
                let booking = self
                    .manager
                    .update(id, requester.id, start, end)
                    .await
                    .map_err(engine_err)?;
                Ok(rows(booking_schema(), [booking], encode_booking))
            }
            Command::DeleteBooking { id } => {
                let requester = self.requester(client).await?;
                self.manager
                    .delete(id, requester.id)
                    .await
                    .map_err(engine_err)?;
                Ok(Response::Execution(Tag::new("DELETE").with_rows(1)))
            }
            Command::SelectMyBookings => {
                let requester = self.requester(client).await?;
                let bookings = self
                    .manager
                    .list_for_user(requester.id)
                    .await
                    .map_err(engine_err)?;
                Ok(rows(renter_booking_schema(), bookings, encode_renter_booking))
            }
            Command::SelectSpotBookings { spot_id } => {
                let requester = self.requester(client).await?;
                let bookings = self
                    .manager
                    .list_for_spot(spot_id, requester.id)
                    .await
                    .map_err(engine_err)?;
                Ok(rows(spot_booking_schema(), bookings, encode_spot_booking))
            }
            Command::PostReview { review } => {
                let author = self.requester(client).await?;
                let review = self
                    .store
                    .post_review(author.id, review)
                    .await
                    .map_err(store_err)?;
                Ok(rows(review_schema(), [review], encode_review))
            }
            Command::EditReview { id, text, stars } => {
                let author = self.requester(client).await?;
                let review = self
                    .store
                    .edit_review(author.id, id, text, stars)
                    .await
                    .map_err(store_err)?;
                Ok(rows(review_schema(), [review], encode_review))
            }
            Command::DeleteReview { id } => {
                let author = self.requester(client).await?;
                self.store
                    .delete_review(author.id, id)
                    .await
                    .map_err(store_err)?;
                Ok(Response::Execution(Tag::new("DELETE").with_rows(1)))
            }
            Command::SelectMyReviews => {
                let author = self.requester(client).await?;
                let reviews = self
                    .store
                    .reviews_by_author(author.id)
                    .await
                    .map_err(store_err)?;
                Ok(rows(author_review_schema(), reviews, encode_author_review))
            }
            Command::SelectSpotReviews { spot_id } => {
                let reviews = self.store.reviews_of_spot(spot_id).await.map_err(store_err)?;
                Ok(rows(spot_review_schema(), reviews, encode_spot_review))
            }
        }
    }
}

// ── Result encoding ──────────────────────────────────────────────

fn rows<T, I, F>(schema: Vec<FieldInfo>, items: I, encode: F) -> Response
where
    I: IntoIterator<Item = T>,
    F: Fn(&mut DataRowEncoder, T) -> PgWireResult<()>,
{
    let schema = Arc::new(schema);
    let rows: Vec<PgWireResult<_>> = items
        .into_iter()
        .map(|item| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encode(&mut encoder, item)?;
            Ok(encoder.take_row())
        })
        .collect();
    Response::Query(QueryResponse::new(schema, stream::iter(rows)))
}

fn text(name: &str, ty: Type) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, ty, FieldFormat::Text)
}

fn user_schema() -> Vec<FieldInfo> {
    vec![
        text("id", Type::VARCHAR),
        text("username", Type::VARCHAR),
        text("first_name", Type::VARCHAR),
        text("last_name", Type::VARCHAR),
    ]
}

fn spot_columns(prefix: &str) -> Vec<FieldInfo> {
    [
        ("name", Type::VARCHAR),
        ("address", Type::VARCHAR),
        ("city", Type::VARCHAR),
        ("state", Type::VARCHAR),
        ("country", Type::VARCHAR),
        ("lat", Type::FLOAT8),
        ("lng", Type::FLOAT8),
        ("price", Type::FLOAT8),
        ("preview_image", Type::VARCHAR),
    ]
    .into_iter()
    .map(|(name, ty)| text(&format!("{prefix}{name}"), ty))
    .collect()
}

fn spot_schema() -> Vec<FieldInfo> {
    let mut fields = vec![text("id", Type::VARCHAR), text("owner_id", Type::VARCHAR)];
    fields.extend(spot_columns(""));
    fields
}

/// A spot plus its owner's name and review summary. `avg_rating` is NULL
/// before the first review.
fn spot_detail_schema() -> Vec<FieldInfo> {
    let mut fields = spot_schema();
    fields.extend([
        text("owner_first_name", Type::VARCHAR),
        text("owner_last_name", Type::VARCHAR),
        text("num_reviews", Type::INT8),
        text("avg_rating", Type::FLOAT8),
    ]);
    fields
}

/// Dates go over the wire as `YYYY-MM-DD` text.
fn booking_schema() -> Vec<FieldInfo> {
    vec![
        text("id", Type::VARCHAR),
        text("spot_id", Type::VARCHAR),
        text("renter_id", Type::VARCHAR),
        text("start_date", Type::VARCHAR),
        text("end_date", Type::VARCHAR),
        text("created_at", Type::INT8),
        text("updated_at", Type::INT8),
    ]
}

fn renter_booking_schema() -> Vec<FieldInfo> {
    let mut fields = booking_schema();
    fields.extend(spot_columns("spot_"));
    fields
}

/// Renter and timestamp columns are NULL unless the requester owns the spot.
fn spot_booking_schema() -> Vec<FieldInfo> {
    vec![
        text("id", Type::VARCHAR),
        text("spot_id", Type::VARCHAR),
        text("start_date", Type::VARCHAR),
        text("end_date", Type::VARCHAR),
        text("renter_id", Type::VARCHAR),
        text("renter_first_name", Type::VARCHAR),
        text("renter_last_name", Type::VARCHAR),
        text("created_at", Type::INT8),
        text("updated_at", Type::INT8),
    ]
}

fn review_schema() -> Vec<FieldInfo> {
    vec![
        text("id", Type::VARCHAR),
        text("spot_id", Type::VARCHAR),
        text("author_id", Type::VARCHAR),
        text("review", Type::VARCHAR),
        text("stars", Type::INT4),
        text("created_at", Type::INT8),
        text("updated_at", Type::INT8),
    ]
}

fn author_review_schema() -> Vec<FieldInfo> {
    let mut fields = review_schema();
    fields.extend(spot_columns("spot_"));
    fields
}

fn spot_review_schema() -> Vec<FieldInfo> {
    let mut fields = review_schema();
    fields.extend([
        text("author_first_name", Type::VARCHAR),
        text("author_last_name", Type::VARCHAR),
    ]);
    fields
}

fn schema_for(shape: Option<ResultShape>) -> Vec<FieldInfo> {
    match shape {
        Some(ResultShape::User) => user_schema(),
        Some(ResultShape::Spot) => spot_schema(),
        Some(ResultShape::SpotDetail) => spot_detail_schema(),
        Some(ResultShape::Review) => review_schema(),
        Some(ResultShape::AuthorReview) => author_review_schema(),
        Some(ResultShape::SpotReview) => spot_review_schema(),
        Some(ResultShape::Booking) => booking_schema(),
        Some(ResultShape::RenterBooking) => renter_booking_schema(),
        Some(ResultShape::SpotBooking) => spot_booking_schema(),
        None => vec![],
    }
}

fn encode_user(encoder: &mut DataRowEncoder, user: User) -> PgWireResult<()> {
    encoder.encode_field(&user.id.to_string())?;
    encoder.encode_field(&user.username)?;
    encoder.encode_field(&user.first_name)?;
    encoder.encode_field(&user.last_name)
}

/// Spot attribute columns; all NULL when the spot is gone.
fn encode_spot_columns(
    encoder: &mut DataRowEncoder,
    spot: Option<&SpotSnapshot>,
) -> PgWireResult<()> {
    encoder.encode_field(&spot.map(|s| s.name.clone()))?;
    encoder.encode_field(&spot.map(|s| s.address.clone()))?;
    encoder.encode_field(&spot.map(|s| s.city.clone()))?;
    encoder.encode_field(&spot.map(|s| s.state.clone()))?;
    encoder.encode_field(&spot.map(|s| s.country.clone()))?;
    encoder.encode_field(&spot.map(|s| s.lat))?;
    encoder.encode_field(&spot.map(|s| s.lng))?;
    encoder.encode_field(&spot.map(|s| s.price))?;
    encoder.encode_field(&spot.and_then(|s| s.preview_image.clone()))
}

fn encode_spot(encoder: &mut DataRowEncoder, spot: Spot) -> PgWireResult<()> {
    encoder.encode_field(&spot.id.to_string())?;
    encoder.encode_field(&spot.owner_id.to_string())?;
    encode_spot_columns(encoder, Some(&spot.snapshot()))
}

fn encode_spot_detail(encoder: &mut DataRowEncoder, detail: SpotDetail) -> PgWireResult<()> {
    encode_spot(encoder, detail.spot)?;
    encoder.encode_field(&detail.owner.as_ref().map(|o| o.first_name.clone()))?;
    encoder.encode_field(&detail.owner.as_ref().map(|o| o.last_name.clone()))?;
    encoder.encode_field(&(detail.reviews.count as i64))?;
    encoder.encode_field(&detail.reviews.avg_stars)
}

fn encode_booking(encoder: &mut DataRowEncoder, booking: Booking) -> PgWireResult<()> {
    encoder.encode_field(&booking.id.to_string())?;
    encoder.encode_field(&booking.spot_id.to_string())?;
    encoder.encode_field(&booking.renter_id.to_string())?;
    encoder.encode_field(&booking.range.start.to_string())?;
    encoder.encode_field(&booking.range.end.to_string())?;
    encoder.encode_field(&booking.created_at)?;
    encoder.encode_field(&booking.updated_at)
}

fn encode_renter_booking(encoder: &mut DataRowEncoder, row: RenterBooking) -> PgWireResult<()> {
    encode_booking(encoder, row.booking)?;
    encode_spot_columns(encoder, row.spot.as_ref())
}

fn encode_spot_booking(encoder: &mut DataRowEncoder, row: SpotBooking) -> PgWireResult<()> {
    match row {
        SpotBooking::Owner { booking, renter } => {
            encoder.encode_field(&booking.id.to_string())?;
            encoder.encode_field(&booking.spot_id.to_string())?;
            encoder.encode_field(&booking.range.start.to_string())?;
            encoder.encode_field(&booking.range.end.to_string())?;
            encoder.encode_field(&booking.renter_id.to_string())?;
            encoder.encode_field(&renter.as_ref().map(|r| r.first_name.clone()))?;
            encoder.encode_field(&renter.as_ref().map(|r| r.last_name.clone()))?;
            encoder.encode_field(&booking.created_at)?;
            encoder.encode_field(&booking.updated_at)
        }
        SpotBooking::Public { id, spot_id, range } => {
            encoder.encode_field(&id.to_string())?;
            encoder.encode_field(&spot_id.to_string())?;
            encoder.encode_field(&range.start.to_string())?;
            encoder.encode_field(&range.end.to_string())?;
            encoder.encode_field(&None::<String>)?;
            encoder.encode_field(&None::<String>)?;
            encoder.encode_field(&None::<String>)?;
            encoder.encode_field(&None::<i64>)?;
            encoder.encode_field(&None::<i64>)
        }
    }
}

fn encode_review(encoder: &mut DataRowEncoder, review: Review) -> PgWireResult<()> {
    encoder.encode_field(&review.id.to_string())?;
    encoder.encode_field(&review.spot_id.to_string())?;
    encoder.encode_field(&review.author_id.to_string())?;
    encoder.encode_field(&review.text)?;
    encoder.encode_field(&i32::from(review.stars))?;
    encoder.encode_field(&review.created_at)?;
    encoder.encode_field(&review.updated_at)
}

fn encode_author_review(encoder: &mut DataRowEncoder, row: AuthorReview) -> PgWireResult<()> {
    encode_review(encoder, row.review)?;
    encode_spot_columns(encoder, row.spot.as_ref())
}

fn encode_spot_review(encoder: &mut DataRowEncoder, row: SpotReview) -> PgWireResult<()> {
    encode_review(encoder, row.review)?;
    encoder.encode_field(&row.author.as_ref().map(|a| a.first_name.clone()))?;
    encoder.encode_field(&row.author.as_ref().map(|a| a.last_name.clone()))
}

#[async_trait]
impl SimpleQueryHandler for StaybookHandler {
    async fn do_query<C>(&self, client: &mut C, query: &str) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(vec![self.run(client, query).await?])
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct StaybookQueryParser;

#[async_trait]
impl QueryParser for StaybookQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(schema_for(sql::result_shape(stmt)))
    }
}

#[async_trait]
impl ExtendedQueryHandler for StaybookHandler {
    type Statement = String;
    type QueryParser = StaybookQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let sql = substitute_params(portal);
        self.run(client, &sql).await
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        let fields = schema_for(sql::result_shape(&target.statement));
        Ok(DescribeStatementResponse::new(param_types, fields))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let fields = schema_for(sql::result_shape(&target.statement.statement));
        Ok(DescribePortalResponse::new(fields))
    }
}

/// Highest `$N` placeholder in the statement.
fn count_params(sql: &str) -> usize {
    let bytes = sql.as_bytes();
    let mut max = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'$' {
            i += 1;
            continue;
        }
        i += 1;
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if let Ok(n) = sql[start..i].parse::<usize>() {
            max = max.max(n);
        }
    }
    max
}

fn substitute_params(portal: &Portal<String>) -> String {
    inline_params(&portal.statement.statement, &portal.parameters)
}

/// Inline bound text parameters as quoted literals in a single pass over the
/// statement. Inserted values are never rescanned, and `$N` inside a quoted
/// literal of the statement is left alone.
fn inline_params<P: AsRef<[u8]>>(sql: &str, params: &[Option<P>]) -> String {
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len());
    let mut in_literal = false;
    let mut copied = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                in_literal = !in_literal;
                i += 1;
            }
            b'$' if !in_literal => {
                let digits_start = i + 1;
                let mut j = digits_start;
                while j < bytes.len() && bytes[j].is_ascii_digit() {
                    j += 1;
                }
                let param = sql[digits_start..j]
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|idx| params.get(idx));
                if let Some(param) = param {
                    out.push_str(&sql[copied..i]);
                    match param {
                        Some(value) => {
                            let text = String::from_utf8_lossy(value.as_ref());
                            out.push('\'');
                            out.push_str(&text.replace('\'', "''"));
                            out.push('\'');
                        }
                        None => out.push_str("NULL"),
                    }
                    copied = j;
                }
                i = j.max(i + 1);
            }
            _ => i += 1,
        }
    }
    out.push_str(&sql[copied..]);
    out
}

// ── Factory ──────────────────────────────────────────────────────

pub struct StaybookFactory {
    handler: Arc<StaybookHandler>,
    auth_handler: Arc<
        CleartextPasswordAuthStartupHandler<StaybookAuthSource, DefaultServerParameterProvider>,
    >,
    noop: Arc<NoopHandler>,
}

impl StaybookFactory {
    pub fn new(manager: Arc<BookingManager>, store: Arc<Store>, password: String) -> Self {
        Self {
            handler: Arc::new(StaybookHandler::new(manager, store)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                StaybookAuthSource::new(password),
                DefaultServerParameterProvider::default(),
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for StaybookFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client connection until it closes.
pub async fn process_connection(
    socket: TcpStream,
    manager: Arc<BookingManager>,
    store: Arc<Store>,
    password: String,
    tls: Option<TlsAcceptor>,
) -> std::io::Result<()> {
    let factory = Arc::new(StaybookFactory::new(manager, store, password));
    pgwire::tokio::process_socket(socket, tls, factory).await
}

// ── Error mapping ────────────────────────────────────────────────

fn user_error(code: &str, msg: String) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new("ERROR".into(), code.into(), msg)))
}

/// SQLSTATE for a failed manager call.
pub fn engine_sqlstate(e: &EngineError) -> &'static str {
    match e {
        EngineError::NotFound(_) => "P0002",
        EngineError::Forbidden(_) => "42501",
        EngineError::InvalidInput { .. } => "22023",
        EngineError::Conflict { .. } => "23P01",
        EngineError::LimitExceeded(_) => "54000",
        EngineError::Storage(_) => "58030",
    }
}

fn engine_err(e: EngineError) -> PgWireError {
    user_error(engine_sqlstate(&e), e.to_string())
}

/// SQLSTATE for a failed catalog or review call.
pub fn store_sqlstate(e: &StoreError) -> &'static str {
    match e {
        StoreError::NotFound(_) => "P0002",
        StoreError::AlreadyExists(_) => "23505",
        StoreError::Overlap(_) => "23P01",
        StoreError::Invalid(_) => "22023",
        StoreError::Forbidden(_) => "42501",
        StoreError::InUse(_) => "23503",
        StoreError::LimitExceeded(_) => "54000",
        StoreError::WalError(_) => "58030",
    }
}

fn store_err(e: StoreError) -> PgWireError {
    user_error(store_sqlstate(&e), e.to_string())
}

fn sql_err(e: SqlError) -> PgWireError {
    user_error("42601", e.to_string())
}
