//! Parsing and executing the two statements the REPL understands:
//! `insert <id> <username> <email>` and `select`.

use std::str::FromStr;

use thiserror::Error;

use crate::{
    error::{Result, RowError},
    row::Row,
    table::{InsertOutcome, Table},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Insert(Row),
    Select,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrepareError {
    #[error("ID must be positive.")]
    NegativeId,

    #[error("String is too long.")]
    StringTooLong,

    #[error("Syntax error. could not parse statement.")]
    SyntaxError,

    #[error("Unrecognized keyword at start of '{0}'.")]
    UnrecognizedStatement(String),
}

/// Turn one input line into a statement
pub fn prepare(input: &str) -> std::result::Result<Statement, PrepareError> {
    if input.starts_with("insert") {
        return prepare_insert(input);
    }
    if input == "select" {
        return Ok(Statement::Select);
    }
    Err(PrepareError::UnrecognizedStatement(input.to_string()))
}

/// Tokens past the email are ignored
fn prepare_insert(input: &str) -> std::result::Result<Statement, PrepareError> {
    let mut tokens = input.split_whitespace().skip(1);
    let (Some(id), Some(username), Some(email)) = (tokens.next(), tokens.next(), tokens.next())
    else {
        return Err(PrepareError::SyntaxError);
    };

    let id: i64 = id.parse().map_err(|_| PrepareError::SyntaxError)?;
    if id < 0 {
        return Err(PrepareError::NegativeId);
    }
    let id = u32::try_from(id).map_err(|_| PrepareError::SyntaxError)?;

    let row = Row::new(id, username, email).map_err(|e| match e {
        RowError::UsernameTooLong { .. } | RowError::EmailTooLong { .. } => {
            PrepareError::StringTooLong
        }
        RowError::EmbeddedNul { .. } => PrepareError::SyntaxError,
    })?;
    Ok(Statement::Insert(row))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecuteResult {
    Inserted(InsertOutcome),
    Rows(Vec<Row>),
}

pub fn execute(statement: &Statement, table: &mut Table) -> Result<ExecuteResult> {
    match statement {
        Statement::Insert(row) => table.insert(row).map(ExecuteResult::Inserted),
        Statement::Select => table.select().map(ExecuteResult::Rows),
    }
}

/// Commands starting with `.` that act on the session rather than the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaCommand {
    Exit,
    BTree,
    Constants,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unrecognized command '{0}'.")]
pub struct UnrecognizedCommand(pub String);

impl FromStr for MetaCommand {
    type Err = UnrecognizedCommand;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            ".exit" => Ok(MetaCommand::Exit),
            ".btree" => Ok(MetaCommand::BTree),
            ".constants" => Ok(MetaCommand::Constants),
            other => Err(UnrecognizedCommand(other.to_string())),
        }
    }
}

#[cfg(test)]
mod statement_tests {
    use super::*;
    use crate::{row::COLUMN_USERNAME_SIZE, test_utils::TestDir};

    #[test]
    fn test_prepare_insert() {
        let statement = prepare("insert 1 user1 person1@example.com").unwrap();
        assert_eq!(
            statement,
            Statement::Insert(Row::new(1, "user1", "person1@example.com").unwrap())
        );

        //  trailing tokens are ignored
        assert!(matches!(
            prepare("insert 2 a b extra"),
            Ok(Statement::Insert(row)) if row.id() == 2
        ));
    }

    #[test]
    fn test_prepare_insert_errors() {
        assert_eq!(prepare("insert 1 user1"), Err(PrepareError::SyntaxError));
        assert_eq!(prepare("insert one a b"), Err(PrepareError::SyntaxError));
        assert_eq!(prepare("insert -1 a b"), Err(PrepareError::NegativeId));
        assert_eq!(
            prepare("insert 4294967296 a b"),
            Err(PrepareError::SyntaxError)
        );

        let long_name = "a".repeat(COLUMN_USERNAME_SIZE + 1);
        assert_eq!(
            prepare(&format!("insert 1 {long_name} a@b.c")),
            Err(PrepareError::StringTooLong)
        );

        assert_eq!(
            prepare("insert 1 ab\0cd x@y.z"),
            Err(PrepareError::SyntaxError)
        );
    }

    #[test]
    fn test_prepare_error_messages() {
        assert_eq!(
            PrepareError::SyntaxError.to_string(),
            "Syntax error. could not parse statement."
        );
        assert_eq!(PrepareError::NegativeId.to_string(), "ID must be positive.");
        assert_eq!(PrepareError::StringTooLong.to_string(), "String is too long.");
    }

    #[test]
    fn test_prepare_select_and_unknown() {
        assert_eq!(prepare("select"), Ok(Statement::Select));
        assert_eq!(
            prepare("update foo"),
            Err(PrepareError::UnrecognizedStatement("update foo".to_string()))
        );
        assert_eq!(
            PrepareError::UnrecognizedStatement("update foo".to_string()).to_string(),
            "Unrecognized keyword at start of 'update foo'."
        );
    }

    #[test]
    fn test_meta_commands() {
        assert_eq!(".exit".parse::<MetaCommand>(), Ok(MetaCommand::Exit));
        assert_eq!(".btree".parse::<MetaCommand>(), Ok(MetaCommand::BTree));
        assert_eq!(
            ".constants".parse::<MetaCommand>(),
            Ok(MetaCommand::Constants)
        );
        let err = ".foo".parse::<MetaCommand>().unwrap_err();
        assert_eq!(err.to_string(), "Unrecognized command '.foo'.");
    }

    #[test]
    fn test_execute() {
        let dir = TestDir::new();
        let mut table = Table::open(dir.db_file()).unwrap();

        let insert = prepare("insert 1 user1 person1@example.com").unwrap();
        assert_eq!(
            execute(&insert, &mut table).unwrap(),
            ExecuteResult::Inserted(InsertOutcome::Success)
        );
        assert_eq!(
            execute(&insert, &mut table).unwrap(),
            ExecuteResult::Inserted(InsertOutcome::DuplicateKey)
        );

        let rows = match execute(&Statement::Select, &mut table).unwrap() {
            ExecuteResult::Rows(rows) => rows,
            other => panic!("expected rows, got {other:?}"),
        };
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].to_string(), "(1, user1, person1@example.com)");
    }
}
