use chrono::NaiveDate;
use sqlparser::ast::{
    self, AssignmentTarget, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor,
    TableObject, Value, ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::model::{NewReview, NewSpot, SpotPatch};

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    /// Register the session's login name.
    RegisterUser {
        first_name: String,
        last_name: String,
    },
    /// List a spot owned by the session user.
    ListSpot {
        listing: NewSpot,
    },
    SelectSpots,
    /// One spot with its owner and review summary.
    SelectSpot {
        id: Ulid,
    },
    SelectOwnerSpots {
        owner_id: Ulid,
    },
    /// Owner edit of a listing.
    UpdateSpot {
        id: Ulid,
        patch: SpotPatch,
    },
    DeleteSpot {
        id: Ulid,
    },
    /// The session user's own account.
    SelectMe,
    CreateBooking {
        spot_id: Ulid,
        start: NaiveDate,
        end: NaiveDate,
    },
    UpdateBooking {
        id: Ulid,
        start: NaiveDate,
        end: NaiveDate,
    },
    DeleteBooking {
        id: Ulid,
    },
    /// The session user's own bookings.
    SelectMyBookings,
    SelectSpotBookings {
        spot_id: Ulid,
    },
    PostReview {
        review: NewReview,
    },
    EditReview {
        id: Ulid,
        text: Option<String>,
        stars: Option<i64>,
    },
    DeleteReview {
        id: Ulid,
    },
    /// The session user's own reviews.
    SelectMyReviews,
    SelectSpotReviews {
        spot_id: Ulid,
    },
}

/// Which row layout a statement returns, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    User,
    Spot,
    SpotDetail,
    Booking,
    RenterBooking,
    SpotBooking,
    Review,
    AuthorReview,
    SpotReview,
}

const USER_COLUMNS: &[&str] = &["first_name", "last_name"];
const SPOT_COLUMNS: &[&str] = &[
    "name",
    "address",
    "city",
    "state",
    "country",
    "lat",
    "lng",
    "price",
    "preview_image",
];
const BOOKING_COLUMNS: &[&str] = &["spot_id", "start_date", "end_date"];
const REVIEW_COLUMNS: &[&str] = &["spot_id", "review", "stars"];

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let stmt = parse_one(sql)?;
    match &stmt {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Update {
            table,
            assignments,
            selection,
            ..
        } => parse_update(&table.relation, assignments, selection),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

/// Result layout of `sql` without evaluating its values, so statements with
/// unbound `$n` placeholders can be described.
pub fn result_shape(sql: &str) -> Option<ResultShape> {
    let stmt = parse_one(sql).ok()?;
    match &stmt {
        Statement::Insert(insert) => match insert_table_name(insert).ok()?.as_str() {
            "users" => Some(ResultShape::User),
            "spots" => Some(ResultShape::Spot),
            "bookings" => Some(ResultShape::Booking),
            "reviews" => Some(ResultShape::Review),
            _ => None,
        },
        Statement::Update { table, .. } => match table_factor_name(&table.relation).ok()?.as_str() {
            "spots" => Some(ResultShape::Spot),
            "bookings" => Some(ResultShape::Booking),
            "reviews" => Some(ResultShape::Review),
            _ => None,
        },
        Statement::Query(query) => {
            let SetExpr::Select(select) = query.body.as_ref() else {
                return None;
            };
            let table = table_factor_name(&select.from.first()?.relation).ok()?;
            let filter = select.selection.as_ref().and_then(where_column);
            match (table.as_str(), filter.as_deref()) {
                ("users", _) => Some(ResultShape::User),
                ("spots", Some("id")) => Some(ResultShape::SpotDetail),
                ("spots", _) => Some(ResultShape::Spot),
                ("bookings", Some(_)) => Some(ResultShape::SpotBooking),
                ("bookings", None) => Some(ResultShape::RenterBooking),
                ("reviews", Some(_)) => Some(ResultShape::SpotReview),
                ("reviews", None) => Some(ResultShape::AuthorReview),
                _ => None,
            }
        }
        _ => None,
    }
}

fn parse_one(sql: &str) -> Result<Statement, SqlError> {
    let dialect = PostgreSqlDialect {};
    let mut stmts =
        Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }
    if stmts.len() > 1 {
        return Err(SqlError::Unsupported("multiple statements".into()));
    }
    Ok(stmts.remove(0))
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let rows = extract_insert_rows(insert)?;
    if rows.len() != 1 {
        return Err(SqlError::Unsupported(format!(
            "{table}: insert one row at a time"
        )));
    }

    match table.as_str() {
        "users" => {
            let row = Row::bind("users", USER_COLUMNS, &insert.columns, &rows[0])?;
            Ok(Command::RegisterUser {
                first_name: parse_string(row.require("first_name")?)?,
                last_name: parse_string(row.require("last_name")?)?,
            })
        }
        "spots" => {
            let row = Row::bind("spots", SPOT_COLUMNS, &insert.columns, &rows[0])?;
            let preview_image = match row.get("preview_image") {
                Some(expr) => parse_string_or_null(expr)?,
                None => None,
            };
            Ok(Command::ListSpot {
                listing: NewSpot {
                    name: parse_string(row.require("name")?)?,
                    address: parse_string(row.require("address")?)?,
                    city: parse_string(row.require("city")?)?,
                    state: parse_string(row.require("state")?)?,
                    country: parse_string(row.require("country")?)?,
                    lat: parse_f64(row.require("lat")?)?,
                    lng: parse_f64(row.require("lng")?)?,
                    price: parse_f64(row.require("price")?)?,
                    preview_image,
                },
            })
        }
        "bookings" => {
            let row = Row::bind("bookings", BOOKING_COLUMNS, &insert.columns, &rows[0])?;
            Ok(Command::CreateBooking {
                spot_id: parse_ulid(row.require("spot_id")?)?,
                start: parse_date(row.require("start_date")?)?,
                end: parse_date(row.require("end_date")?)?,
            })
        }
        "reviews" => {
            let row = Row::bind("reviews", REVIEW_COLUMNS, &insert.columns, &rows[0])?;
            Ok(Command::PostReview {
                review: NewReview {
                    spot_id: parse_ulid(row.require("spot_id")?)?,
                    text: parse_string(row.require("review")?)?,
                    stars: parse_i64(row.require("stars")?)?,
                },
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_update(
    relation: &TableFactor,
    assignments: &[ast::Assignment],
    selection: &Option<Expr>,
) -> Result<Command, SqlError> {
    let table = table_factor_name(relation)?;
    match table.as_str() {
        "bookings" => {
            let (mut start, mut end) = (None, None);
            for (column, value) in set_columns(assignments)? {
                match column.as_str() {
                    "start_date" => start = Some(parse_date(value)?),
                    "end_date" => end = Some(parse_date(value)?),
                    _ => return Err(SqlError::UnknownColumn("bookings", column)),
                }
            }
            Ok(Command::UpdateBooking {
                id: extract_where_eq(selection, "id")?,
                start: start.ok_or(SqlError::MissingColumn("start_date"))?,
                end: end.ok_or(SqlError::MissingColumn("end_date"))?,
            })
        }
        "spots" => {
            let mut patch = SpotPatch::default();
            for (column, value) in set_columns(assignments)? {
                match column.as_str() {
                    "name" => patch.name = Some(parse_string(value)?),
                    "address" => patch.address = Some(parse_string(value)?),
                    "city" => patch.city = Some(parse_string(value)?),
                    "state" => patch.state = Some(parse_string(value)?),
                    "country" => patch.country = Some(parse_string(value)?),
                    "lat" => patch.lat = Some(parse_f64(value)?),
                    "lng" => patch.lng = Some(parse_f64(value)?),
                    "price" => patch.price = Some(parse_f64(value)?),
                    "preview_image" => patch.preview_image = Some(parse_string_or_null(value)?),
                    _ => return Err(SqlError::UnknownColumn("spots", column)),
                }
            }
            Ok(Command::UpdateSpot {
                id: extract_where_eq(selection, "id")?,
                patch,
            })
        }
        "reviews" => {
            let (mut text, mut stars) = (None, None);
            for (column, value) in set_columns(assignments)? {
                match column.as_str() {
                    "review" => text = Some(parse_string(value)?),
                    "stars" => stars = Some(parse_i64(value)?),
                    _ => return Err(SqlError::UnknownColumn("reviews", column)),
                }
            }
            Ok(Command::EditReview {
                id: extract_where_eq(selection, "id")?,
                text,
                stars,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let id = || extract_where_eq(&delete.selection, "id");
    match table.as_str() {
        "bookings" => Ok(Command::DeleteBooking { id: id()? }),
        "spots" => Ok(Command::DeleteSpot { id: id()? }),
        "reviews" => Ok(Command::DeleteReview { id: id()? }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };
    let Some(from) = select.from.first() else {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    };
    let table = table_factor_name(&from.relation)?;

    let selection = &select.selection;
    let filter = selection.as_ref().and_then(where_column);
    match (table.as_str(), filter.as_deref()) {
        ("users", _) => Ok(Command::SelectMe),
        ("spots", None) if selection.is_none() => Ok(Command::SelectSpots),
        ("spots", Some("owner_id")) => Ok(Command::SelectOwnerSpots {
            owner_id: extract_where_eq(selection, "owner_id")?,
        }),
        ("spots", _) => Ok(Command::SelectSpot {
            id: extract_where_eq(selection, "id")?,
        }),
        ("bookings", None) if selection.is_none() => Ok(Command::SelectMyBookings),
        ("bookings", _) => Ok(Command::SelectSpotBookings {
            spot_id: extract_where_eq(selection, "spot_id")?,
        }),
        ("reviews", None) if selection.is_none() => Ok(Command::SelectMyReviews),
        ("reviews", _) => Ok(Command::SelectSpotReviews {
            spot_id: extract_where_eq(selection, "spot_id")?,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

// ── Helpers ───────────────────────────────────────────────────

/// One VALUES row keyed by column. Without a column list, values are taken
/// positionally in the table's declared order.
struct Row<'a> {
    values: Vec<(String, &'a Expr)>,
}

impl<'a> Row<'a> {
    fn bind(
        table: &'static str,
        declared: &[&str],
        columns: &[ast::Ident],
        values: &'a [Expr],
    ) -> Result<Self, SqlError> {
        let names: Vec<String> = if columns.is_empty() {
            declared.iter().map(|c| c.to_string()).collect()
        } else {
            columns.iter().map(|c| c.value.to_lowercase()).collect()
        };
        if values.len() > names.len() || (!columns.is_empty() && values.len() != names.len()) {
            return Err(SqlError::WrongArity(table, names.len(), values.len()));
        }
        for name in &names {
            if !declared.contains(&name.as_str()) {
                return Err(SqlError::UnknownColumn(table, name.clone()));
            }
        }
        Ok(Self {
            values: names.into_iter().zip(values.iter()).collect(),
        })
    }

    fn get(&self, column: &str) -> Option<&'a Expr> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, expr)| *expr)
    }

    fn require(&self, column: &'static str) -> Result<&'a Expr, SqlError> {
        self.get(column).ok_or(SqlError::MissingColumn(column))
    }
}

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    match tables_with_joins.first() {
        Some(first) => table_factor_name(&first.relation),
        None => Err(SqlError::Parse("DELETE without table".into())),
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_insert_rows(insert: &ast::Insert) -> Result<&[Vec<Expr>], SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) if values.rows.is_empty() => {
            Err(SqlError::Parse("empty VALUES".into()))
        }
        SetExpr::Values(values) => Ok(&values.rows),
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

/// `SET` targets as lowercase column names with their values.
fn set_columns(assignments: &[ast::Assignment]) -> Result<Vec<(String, &Expr)>, SqlError> {
    assignments
        .iter()
        .map(|assignment| {
            let column = match &assignment.target {
                AssignmentTarget::ColumnName(name) => object_name_last(name),
                AssignmentTarget::Tuple(_) => None,
            }
            .ok_or_else(|| SqlError::Parse("unsupported SET target".into()))?;
            Ok((column, &assignment.value))
        })
        .collect()
}

/// Column on the left of a `WHERE <column> = ...` filter.
fn where_column(selection: &Expr) -> Option<String> {
    match selection {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            ..
        } => expr_column_name(left),
        _ => None,
    }
}

/// `WHERE <column> = '<ulid>'` and nothing else.
fn extract_where_eq(selection: &Option<Expr>, column: &'static str) -> Result<Ulid, SqlError> {
    let sel = selection.as_ref().ok_or(SqlError::MissingFilter(column))?;
    match sel {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } if expr_column_name(left).as_deref() == Some(column) => parse_ulid(right),
        _ => Err(SqlError::MissingFilter(column)),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn parse_string(expr: &Expr) -> Result<String, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) => Ok(s.clone()),
        Some(value) => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    }
}

fn parse_string_or_null(expr: &Expr) -> Result<Option<String>, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        _ => parse_string(expr).map(Some),
    }
}

fn parse_ulid(expr: &Expr) -> Result<Ulid, SqlError> {
    let s = parse_string(expr)?;
    Ulid::from_string(&s).map_err(|e| SqlError::Parse(format!("bad ULID: {e}")))
}

/// `'YYYY-MM-DD'`.
fn parse_date(expr: &Expr) -> Result<NaiveDate, SqlError> {
    let s = parse_string(expr)?;
    s.parse::<NaiveDate>()
        .map_err(|e| SqlError::Parse(format!("bad date {s:?}: {e}")))
}

fn parse_f64(expr: &Expr) -> Result<f64, SqlError> {
    if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        return Ok(-parse_f64(expr)?);
    }
    match extract_value(expr) {
        Some(Value::Number(s, _)) | Some(Value::SingleQuotedString(s)) => s
            .parse()
            .map_err(|e| SqlError::Parse(format!("bad number {s:?}: {e}"))),
        Some(value) => Err(SqlError::Parse(format!("expected number, got {value:?}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    }
}

fn parse_i64(expr: &Expr) -> Result<i64, SqlError> {
    if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        return Ok(-parse_i64(expr)?);
    }
    match extract_value(expr) {
        Some(Value::Number(s, _)) | Some(Value::SingleQuotedString(s)) => s
            .parse()
            .map_err(|e| SqlError::Parse(format!("bad integer {s:?}: {e}"))),
        Some(value) => Err(SqlError::Parse(format!("expected integer, got {value:?}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    }
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    UnknownColumn(&'static str, String),
    WrongArity(&'static str, usize, usize),
    MissingColumn(&'static str),
    MissingFilter(&'static str),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::UnknownColumn(t, c) => write!(f, "{t}: unknown column {c}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected {expected} values, got {got}")
            }
            SqlError::MissingColumn(col) => write!(f, "missing column: {col}"),
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
        }
    }
}

impl std::error::Error for SqlError {}
