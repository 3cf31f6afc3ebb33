//! Compiles an [`ApplicationQuery`] into SQL.
//!
//! Filters become positional parameters; only the sort column and direction
//! are spliced into the statement text, and both come from closed enums.

use rusqlite::types::Value;
use tessera_core::{
  applicant::Applicant,
  query::{ApplicationQuery, SortColumn, SortOrder},
};

use crate::encode::{
  APPLICANT_COLUMNS, APPLICATION_COLUMNS, STAFF_SUMMARY_COLUMNS, encode_uuid,
};

const FROM_JOINED: &str = "
  FROM applications t
  JOIN applicants a ON a.applicant_id = t.applicant_id
  LEFT JOIN staff s ON s.staff_id = t.assigned_staff_id";

/// Counts are correlated sub-selects so that each one is scoped to its own
/// application and no join multiplies another.
const COUNT_COLUMNS: &str = "
  (SELECT COUNT(*) FROM messages m
     WHERE m.application_id = t.application_id
       AND m.is_read = 0 AND m.sender_type = 'applicant') AS unread_messages,
  (SELECT COUNT(*) FROM documents d
     WHERE d.application_id = t.application_id) AS documents_count,
  (SELECT COUNT(*) FROM documents d
     WHERE d.application_id = t.application_id AND d.is_approved = 1) AS approved_documents";

/// A query split into its statement fragments and bound parameters.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
  where_clause: String,
  params:       Vec<Value>,
  order_by:     String,
  limit:        i64,
  offset:       i64,
}

impl CompiledQuery {
  pub fn compile(query: &ApplicationQuery) -> Self {
    let mut conds: Vec<String> = Vec::new();
    let mut params: Vec<Value> = Vec::new();

    if let Some(status) = query.status {
      params.push(Value::Text(status.as_str().to_owned()));
      conds.push(format!("t.status = ?{}", params.len()));
    }
    if let Some(staff_id) = query.assigned_staff_id {
      params.push(Value::Text(encode_uuid(staff_id)));
      conds.push(format!("t.assigned_staff_id = ?{}", params.len()));
    }
    if let Some(payment_status) = query.payment_status {
      params.push(Value::Text(payment_status.as_str().to_owned()));
      conds.push(format!("t.payment_status = ?{}", params.len()));
    }
    if let Some(term) = query.search_term() {
      let term = term.to_lowercase();
      params.push(Value::Text(format!("%{}%", escape_like(&term))));
      conds.push(format!("a.search_key LIKE ?{} ESCAPE '\\'", params.len()));
    }

    let where_clause = if conds.is_empty() {
      String::new()
    } else {
      format!("WHERE {}", conds.join(" AND "))
    };

    let direction = match query.sort_order {
      SortOrder::Asc => "ASC",
      SortOrder::Desc => "DESC",
    };
    let order_by = format!(
      "ORDER BY {} {direction}, t.application_id {direction}",
      sort_expression(query.sort_by)
    );

    Self {
      where_clause,
      params,
      order_by,
      limit: i64::from(query.limit()),
      offset: i64::try_from(query.offset()).unwrap_or(i64::MAX),
    }
  }

  /// The statement selecting one page of listing rows, and its parameters.
  pub fn page_statement(&self) -> (String, Vec<Value>) {
    let mut params = self.params.clone();
    params.push(Value::Integer(self.limit));
    let limit_at = params.len();
    params.push(Value::Integer(self.offset));
    let offset_at = params.len();

    let sql = format!(
      "SELECT {APPLICATION_COLUMNS}, {APPLICANT_COLUMNS}, {STAFF_SUMMARY_COLUMNS}, {COUNT_COLUMNS}
       {FROM_JOINED}
       {where_clause}
       {order_by}
       LIMIT ?{limit_at} OFFSET ?{offset_at}",
      where_clause = self.where_clause,
      order_by = self.order_by,
    );
    (sql, params)
  }

  /// The statement counting every matching row, ignoring pagination.
  pub fn count_statement(&self) -> (String, Vec<Value>) {
    let sql = format!(
      "SELECT COUNT(*) {FROM_JOINED} {where_clause}",
      where_clause = self.where_clause,
    );
    (sql, self.params.clone())
  }
}

fn sort_expression(column: SortColumn) -> &'static str {
  match column {
    SortColumn::CreatedAt => "t.created_at",
    SortColumn::UpdatedAt => "t.updated_at",
    SortColumn::FullName => "a.full_name COLLATE NOCASE",
    SortColumn::Status => "t.status",
    SortColumn::PaymentStatus => "t.payment_status",
  }
}

/// Lowercased haystack for free-text search. SQLite's `LIKE` only folds
/// ASCII case, so the folding happens here with full Unicode rules and search
/// terms are folded the same way. Fields are newline-separated so a term
/// never matches across two of them.
pub fn search_key(applicant: &Applicant) -> String {
  [&applicant.full_name, &applicant.email, &applicant.fiscal_code]
    .map(|field| field.to_lowercase())
    .join(SEARCH_KEY_SEPARATOR)
}

const SEARCH_KEY_SEPARATOR: &str = "\n";

/// Escape `LIKE` wildcards so the term matches literally.
fn escape_like(term: &str) -> String {
  let mut out = String::with_capacity(term.len());
  for c in term.chars() {
    if matches!(c, '%' | '_' | '\\') {
      out.push('\\');
    }
    out.push(c);
  }
  out
}
