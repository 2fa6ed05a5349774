//! Request descriptions handed to the encoder.
//!
//! Plain values: the state machine stores them as the pending action of the
//! in-flight task and the encoder turns them into bytes.

use std::sync::Arc;

use bytes::Bytes;

use super::constants::csfrm;
use super::describe::ColumnMetadata;
use crate::types::{DataType, ToOracle, TypeError};

/// Statement category, decided by the leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Query,
    Dml,
    Ddl,
    PlSql,
    Other,
}

impl StatementKind {
    pub fn classify(sql: &str) -> Self {
        let keyword = leading_keyword(sql).to_ascii_lowercase();
        match keyword.as_str() {
            "select" | "with" => StatementKind::Query,
            "insert" | "update" | "delete" | "merge" => StatementKind::Dml,
            "create" | "alter" | "drop" | "grant" | "revoke" | "analyze" | "audit"
            | "comment" | "truncate" => StatementKind::Ddl,
            "declare" | "begin" | "call" => StatementKind::PlSql,
            _ => StatementKind::Other,
        }
    }

    pub fn is_query(self) -> bool {
        self == StatementKind::Query
    }
}

/// First word after whitespace, comments and opening parentheses.
fn leading_keyword(sql: &str) -> &str {
    let mut rest = sql;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '(');
        if let Some(line) = rest.strip_prefix("--") {
            rest = line.find('\n').map_or("", |end| &line[end..]);
        } else if let Some(block) = rest.strip_prefix("/*") {
            rest = block.find("*/").map_or("", |end| &block[end + 2..]);
        } else {
            break;
        }
    }
    let end = rest
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    &rest[..end]
}

/// One bind parameter, already encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bind {
    pub data_type: DataType,
    pub value: Option<Vec<u8>>,
    pub buffer_size: u32,
    pub csfrm: u8,
}

impl Bind {
    /// Encode a value; fails when it has no Oracle representation.
    pub fn new<T: ToOracle + ?Sized>(value: &T) -> Result<Self, TypeError> {
        let (bytes, data_type) = value.to_oracle()?;
        let buffer_size = match data_type.buffer_size() {
            0 => (bytes.len() as u32).max(1),
            fixed => fixed,
        };
        Ok(Self {
            data_type,
            value: Some(bytes),
            buffer_size,
            csfrm: charset_form(data_type),
        })
    }

    pub fn null(data_type: DataType) -> Self {
        Self {
            data_type,
            value: None,
            buffer_size: data_type.buffer_size().max(1),
            csfrm: charset_form(data_type),
        }
    }
}

fn charset_form(data_type: DataType) -> u8 {
    match data_type {
        DataType::Varchar | DataType::Char | DataType::Long | DataType::Clob => csfrm::IMPLICIT,
        _ => 0,
    }
}

impl<T: ToOracle> TryFrom<Option<T>> for Bind {
    type Error = TypeError;

    fn try_from(value: Option<T>) -> Result<Self, TypeError> {
        match value {
            Some(v) => Bind::new(&v),
            None => Ok(Bind::null(DataType::Varchar)),
        }
    }
}

/// Execution knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteOptions {
    pub prefetch_rows: u32,
    pub array_size: u32,
    pub auto_commit: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            prefetch_rows: 2,
            array_size: 100,
            auto_commit: false,
        }
    }
}

impl ExecuteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefetch_rows(mut self, rows: u32) -> Self {
        self.prefetch_rows = rows;
        self
    }

    pub fn array_size(mut self, size: u32) -> Self {
        self.array_size = size.max(1);
        self
    }

    pub fn auto_commit(mut self, enabled: bool) -> Self {
        self.auto_commit = enabled;
        self
    }
}

/// A statement ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementRequest {
    pub sql: String,
    pub kind: StatementKind,
    pub binds: Vec<Bind>,
    pub options: ExecuteOptions,
    /// Nonzero when the cursor was found in the statement cache.
    pub cursor_id: u16,
    pub columns: Option<Arc<[ColumnMetadata]>>,
}

impl StatementRequest {
    pub fn new(sql: impl Into<String>, binds: Vec<Bind>, options: ExecuteOptions) -> Self {
        let sql = sql.into();
        Self {
            kind: StatementKind::classify(&sql),
            sql,
            binds,
            options,
            cursor_id: 0,
            columns: None,
        }
    }

    pub fn needs_parse(&self) -> bool {
        self.cursor_id == 0 || self.kind == StatementKind::Ddl
    }
}

/// LOB operations carried as their own task kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobOperation {
    GetLength,
    /// `offset` is 1-based, in characters for CLOB and bytes for BLOB.
    Read { offset: u64, amount: u64 },
    Write { offset: u64, data: Bytes },
    Trim { new_size: u64 },
    Copy {
        dest: Bytes,
        source_offset: u64,
        dest_offset: u64,
        amount: u64,
    },
}

/// A LOB operation against a server-side locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobRequest {
    pub locator: Bytes,
    pub operation: LobOperation,
}

impl LobRequest {
    pub fn new(locator: Bytes, operation: LobOperation) -> Self {
        Self { locator, operation }
    }

    pub(crate) fn opcode(&self) -> u32 {
        use super::constants::lob_op;
        match self.operation {
            LobOperation::GetLength => lob_op::GET_LENGTH,
            LobOperation::Read { .. } => lob_op::READ,
            LobOperation::Write { .. } => lob_op::WRITE,
            LobOperation::Trim { .. } => lob_op::TRIM,
            LobOperation::Copy { .. } => lob_op::COPY,
        }
    }

    pub(crate) fn dest(&self) -> Option<&Bytes> {
        match &self.operation {
            LobOperation::Copy { dest, .. } => Some(dest),
            _ => None,
        }
    }

    /// Whether the request carries an amount and the reply returns one.
    pub(crate) fn sends_amount(&self) -> bool {
        !matches!(self.operation, LobOperation::Write { .. })
    }
}

/// Result of a LOB operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LobResult {
    pub data: Option<Bytes>,
    pub amount: Option<i64>,
    pub locator: Option<Bytes>,
    pub dest_locator: Option<Bytes>,
}

/// Cleanup work piggybacked on the next function request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupContext {
    pub cursors_to_close: Vec<u16>,
    pub temp_lobs_to_close: Vec<Bytes>,
    pub temp_lobs_total_size: usize,
}

impl CleanupContext {
    pub fn close_cursor(&mut self, cursor_id: u16) {
        if cursor_id != 0 && !self.cursors_to_close.contains(&cursor_id) {
            self.cursors_to_close.push(cursor_id);
        }
    }

    pub fn free_temp_lob(&mut self, locator: Bytes) {
        self.temp_lobs_total_size += locator.len();
        self.temp_lobs_to_close.push(locator);
    }

    pub fn is_empty(&self) -> bool {
        self.cursors_to_close.is_empty() && self.temp_lobs_to_close.is_empty()
    }

    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }
}
