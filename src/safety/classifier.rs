//! SQL parsing and classification logic.
//!
//! Uses sqlparser-rs with the MS SQL dialect. T-SQL control flow and DBCC
//! commands are outside what the parser understands; those statements come
//! back as [`SafetyLevel::Unverified`] rather than failing the audit.

use sqlparser::ast::{Query, SetExpr, Statement, TableFactor, TableWithJoins};
use sqlparser::dialect::MsSqlDialect;
use sqlparser::parser::Parser;

use super::{ClassificationResult, SafetyLevel, StatementType};

type Verdict = (SafetyLevel, StatementType);

/// SQL classifier that parses and classifies statements.
#[derive(Debug)]
pub struct SqlClassifier {
    dialect: MsSqlDialect,
}

impl Default for SqlClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlClassifier {
    pub fn new() -> Self {
        Self {
            dialect: MsSqlDialect {},
        }
    }

    /// Classifies a SQL batch by its most dangerous statement.
    pub fn classify(&self, sql: &str) -> ClassificationResult {
        let statements = match Parser::parse_sql(&self.dialect, sql) {
            Ok(statements) => statements,
            Err(e) => return ClassificationResult::unverified(format!("not parsed: {e}")),
        };

        match statements.as_slice() {
            [] => ClassificationResult::unverified("empty statement"),
            [single] => {
                let (level, statement_type) = classify_statement(single);
                ClassificationResult::new(level, statement_type)
            }
            many => {
                let (level, statement_type) = many
                    .iter()
                    .map(classify_statement)
                    .max_by_key(|(level, _)| *level)
                    .unwrap_or((SafetyLevel::Safe, StatementType::Unknown));
                ClassificationResult::new(level, StatementType::Multiple(Box::new(statement_type)))
            }
        }
    }
}

/// Convenience function to classify SQL without creating a classifier instance.
pub fn classify_sql(sql: &str) -> ClassificationResult {
    SqlClassifier::new().classify(sql)
}

/// Keeps whichever verdict is more dangerous; ties keep the first.
fn worst(current: Verdict, candidate: Verdict) -> Verdict {
    if candidate.0 > current.0 {
        candidate
    } else {
        current
    }
}

fn classify_statement(statement: &Statement) -> Verdict {
    use SafetyLevel::*;

    match statement {
        Statement::Query(query) => classify_query(query),
        Statement::Explain {
            analyze, statement, ..
        } => {
            if *analyze {
                (classify_statement(statement).0, StatementType::Explain)
            } else {
                (Safe, StatementType::Explain)
            }
        }
        Statement::ShowVariable { .. }
        | Statement::ShowTables { .. }
        | Statement::ShowColumns { .. }
        | Statement::ShowCreate { .. }
        | Statement::ShowFunctions { .. }
        | Statement::ShowStatus { .. }
        | Statement::ShowCollation { .. } => (Safe, StatementType::Show),
        Statement::Declare { .. } => (Safe, StatementType::Declare),

        Statement::Execute { .. } => (Unverified, StatementType::Execute),

        Statement::Insert(_) => (Mutating, StatementType::Insert),
        Statement::Update { .. } => (Mutating, StatementType::Update),
        Statement::Merge { .. } => (Mutating, StatementType::Merge),

        Statement::Delete(_) => (Destructive, StatementType::Delete),
        Statement::Drop { .. } => (Destructive, StatementType::Drop),
        Statement::Truncate { .. } => (Destructive, StatementType::Truncate),
        Statement::AlterTable { .. }
        | Statement::AlterIndex { .. }
        | Statement::AlterView { .. }
        | Statement::AlterRole { .. } => (Destructive, StatementType::Alter),
        Statement::CreateTable { .. }
        | Statement::CreateIndex { .. }
        | Statement::CreateView { .. }
        | Statement::CreateSchema { .. }
        | Statement::CreateDatabase { .. }
        | Statement::CreateFunction { .. }
        | Statement::CreateProcedure { .. }
        | Statement::CreateRole { .. }
        | Statement::CreateSequence { .. }
        | Statement::CreateType { .. } => (Destructive, StatementType::Create),
        Statement::Grant { .. } => (Destructive, StatementType::Grant),
        Statement::Revoke { .. } => (Destructive, StatementType::Revoke),

        _ => (Unverified, StatementType::Unknown),
    }
}

/// Walks CTEs and the query body for data-modifying operations.
fn classify_query(query: &Query) -> Verdict {
    let mut verdict = (SafetyLevel::Safe, StatementType::Select);

    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            verdict = worst(verdict, classify_query(&cte.query));
        }
    }

    worst(verdict, classify_set_expr(&query.body))
}

fn classify_set_expr(set_expr: &SetExpr) -> Verdict {
    match set_expr {
        SetExpr::Update(stmt) | SetExpr::Insert(stmt) => classify_statement(stmt),
        SetExpr::Query(query) => classify_query(query),
        SetExpr::Select(select) => {
            // SELECT ... INTO creates and fills a table.
            let base = if select.into.is_some() {
                (SafetyLevel::Mutating, StatementType::SelectInto)
            } else {
                (SafetyLevel::Safe, StatementType::Select)
            };
            select
                .from
                .iter()
                .map(classify_table_with_joins)
                .fold(base, worst)
        }
        SetExpr::SetOperation { left, right, .. } => {
            worst(classify_set_expr(left), classify_set_expr(right))
        }
        _ => (SafetyLevel::Safe, StatementType::Select),
    }
}

fn classify_table_with_joins(twj: &TableWithJoins) -> Verdict {
    twj.joins
        .iter()
        .map(|join| classify_table_factor(&join.relation))
        .fold(classify_table_factor(&twj.relation), worst)
}

fn classify_table_factor(factor: &TableFactor) -> Verdict {
    match factor {
        TableFactor::Derived { subquery, .. } => classify_query(subquery),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => classify_table_with_joins(table_with_joins),
        _ => (SafetyLevel::Safe, StatementType::Select),
    }
}
