//! Connection state machine.
//!
//! Pure and synchronous: every event (a decoded server message, a submitted
//! task, a transport failure) runs to completion and returns the one action
//! the I/O layer must perform next. Exactly one task is on the wire at a time;
//! everything else waits in the FIFO queue.
//!
//! ```text
//! Connecting → ProtocolNegotiation → DataTypeNegotiation
//!   → Authenticating(One) → Authenticating(Two) → ReadyForStatement
//!   ⇄ StatementInFlight → Closing → Closed
//! ```
//!
//! Any fatal error moves to `Errored` and fails every pending handle.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::{debug, trace, warn};

use super::row::QueryResult;
use super::statement::{CachedStatement, StatementCache};
use super::task::{Task, TaskId, TaskQueue};
use crate::error::OraError;
use crate::protocol::constants::{marker_type, nsi, version};
use crate::protocol::{
    Accept, AuthContext, BackendError, BackendMessage, Capabilities, CleanupContext,
    ColumnMetadata, ColumnValue, LobParameters, LobRequest, LobResult, Parameter, ProtocolInfo,
    Refuse, ServerPiggyback, SessionData, StatementRequest, Status, VerifierResponse,
    generate_verifier,
};

/// Default number of cached server cursors.
pub const DEFAULT_STATEMENT_CACHE_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    One,
    Two,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    ProtocolNegotiation,
    DataTypeNegotiation,
    Authenticating(AuthPhase),
    ReadyForStatement,
    StatementInFlight,
    Closing,
    Closed,
    Errored,
}

/// What the I/O layer must do next.
#[derive(Debug, Clone)]
pub enum ConnectionAction {
    Wait,
    SendConnect,
    /// Install the capabilities, then send the protocol request.
    SendProtocol(Capabilities),
    /// Install the capabilities, then send the data types request.
    SendDataTypes(Capabilities),
    SendAuthPhaseOne(Arc<AuthContext>),
    SendAuthPhaseTwo {
        auth: Arc<AuthContext>,
        verifier: Arc<VerifierResponse>,
    },
    /// The session is established; no bytes to send. Follow with
    /// `ready_for_statement_received` to start work queued during logon.
    AuthenticationComplete(SessionData),
    SendPing,
    SendStatement(StatementRequest),
    SendFetch {
        cursor_id: u16,
        array_size: u32,
        columns: Option<Arc<[ColumnMetadata]>>,
    },
    SendLobOperation(LobRequest),
    SendLogoff,
    SendResetMarker,
    /// Write the last request again, byte for byte.
    Resend(Box<ConnectionAction>),
    /// Send the close packet if there is no error, then drop the transport.
    CloseConnection { error: Option<OraError> },
}

/// The task on the wire and what its response has produced so far.
#[derive(Debug)]
struct InFlight {
    task: Task,
    result: QueryResult,
    lob: LobResult,
    lob_data: Option<BytesMut>,
    failure: Option<BackendError>,
    more_rows: bool,
}

impl InFlight {
    fn new(task: Task) -> Self {
        Self {
            task,
            result: QueryResult::default(),
            lob: LobResult::default(),
            lob_data: None,
            failure: None,
            more_rows: false,
        }
    }

    fn record_error(&mut self, error: BackendError) {
        if error.cursor_id != 0 {
            self.result.cursor_id = error.cursor_id;
        }
        self.result.row_count = error.row_count;
        if error.is_no_data_found() {
            self.more_rows = false;
        } else if error.is_failure() {
            self.more_rows = false;
            self.failure = Some(error);
        } else {
            self.more_rows = match &self.task {
                Task::Statement { request, .. } => {
                    request.kind.is_query() && self.result.cursor_id != 0
                }
                _ => false,
            };
            if error.is_warning {
                warn!(number = error.number, "Server warning: {}", error);
                self.result.warning = Some(error);
            }
        }
    }
}

/// State machine for one connection.
pub struct ConnectionStateMachine {
    state: ConnectionState,
    auth: Arc<AuthContext>,
    capabilities: Capabilities,
    rng: Box<dyn RngCore + Send>,
    session: SessionData,
    verifier: Option<Arc<VerifierResponse>>,
    auth_parameters_seen: bool,
    awaiting_response: bool,
    reset_sent: bool,
    last_request: Option<ConnectionAction>,
    in_flight: Option<InFlight>,
    queue: TaskQueue,
    statements: StatementCache,
    cleanup: CleanupContext,
    session_state: Option<(u32, u16)>,
    ltxid: Option<Bytes>,
}

impl std::fmt::Debug for ConnectionStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionStateMachine")
            .field("state", &self.state)
            .field("queued", &self.queue.len())
            .field("in_flight", &self.in_flight.is_some())
            .finish_non_exhaustive()
    }
}

impl ConnectionStateMachine {
    pub fn new(auth: AuthContext) -> Self {
        Self::with_rng(auth, Box::new(StdRng::from_os_rng()))
    }

    /// Use a specific random source for the handshake key material.
    pub fn with_rng(auth: AuthContext, rng: Box<dyn RngCore + Send>) -> Self {
        Self {
            state: ConnectionState::Connecting,
            auth: Arc::new(auth),
            capabilities: Capabilities::default(),
            rng,
            session: SessionData::default(),
            verifier: None,
            auth_parameters_seen: false,
            awaiting_response: false,
            reset_sent: false,
            last_request: None,
            in_flight: None,
            queue: TaskQueue::new(),
            statements: StatementCache::new(DEFAULT_STATEMENT_CACHE_SIZE),
            cleanup: CleanupContext::default(),
            session_state: None,
            ltxid: None,
        }
    }

    pub fn with_statement_cache(mut self, capacity: usize) -> Self {
        self.statements = StatementCache::new(capacity);
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn session(&self) -> &SessionData {
        &self.session
    }

    /// Session id and serial number, once the server reported them.
    pub fn session_state(&self) -> Option<(u32, u16)> {
        self.session_state
    }

    pub fn ltxid(&self) -> Option<&Bytes> {
        self.ltxid.as_ref()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn is_queued(&self, id: TaskId) -> bool {
        self.queue.contains(id)
    }

    pub fn has_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn statement_cache(&self) -> &StatementCache {
        &self.statements
    }

    /// Cleanup work for the next function request.
    pub fn take_cleanup(&mut self) -> CleanupContext {
        self.cleanup.take()
    }

    /// Free a temporary LOB with the next request.
    pub fn release_temporary_lob(&mut self, locator: Bytes) {
        self.cleanup.free_temp_lob(locator);
    }

    // ==================== Setup ====================

    /// The transport is open.
    pub fn connected(&mut self) -> ConnectionAction {
        match self.state {
            ConnectionState::Connecting => self.send(ConnectionAction::SendConnect),
            _ => ConnectionAction::Wait,
        }
    }

    pub fn accept_received(&mut self, accept: Accept) -> ConnectionAction {
        if self.state != ConnectionState::Connecting {
            return self.unexpected("ACCEPT");
        }
        if accept.protocol_version < version::MINIMUM {
            return self.error_happened(OraError::UnsupportedServerVersion(
                accept.protocol_version,
            ));
        }
        if accept.nsi_flags & nsi::NA_REQUIRED != 0 {
            return self.error_happened(OraError::Connection(
                "server requires native network encryption".to_string(),
            ));
        }
        self.capabilities = self.capabilities.with_accept(
            accept.protocol_version,
            accept.protocol_options,
            accept.sdu,
            accept.flags2,
        );
        debug!(
            protocol_version = accept.protocol_version,
            sdu = accept.sdu,
            end_of_response = self.capabilities.supports_end_of_response,
            "Connection accepted"
        );
        self.transition(ConnectionState::ProtocolNegotiation);
        self.send(ConnectionAction::SendProtocol(self.capabilities.clone()))
    }

    pub fn refuse_received(&mut self, refuse: Refuse) -> ConnectionAction {
        warn!(reason = refuse.user_reason, "Connection refused: {}", refuse.data);
        self.error_happened(OraError::Refused {
            code: refuse.error_code(),
            message: refuse.data,
        })
    }

    pub fn protocol_received(&mut self, info: ProtocolInfo) -> ConnectionAction {
        if self.state != ConnectionState::ProtocolNegotiation {
            return self.unexpected("PROTOCOL");
        }
        self.capabilities = self.capabilities.with_protocol(
            info.compile_caps.as_deref(),
            info.runtime_caps.as_deref(),
            info.ncharset_id,
        );
        debug!(
            server_version = info.server_version,
            banner = %info.banner,
            field_version = self.capabilities.ttc_field_version,
            max_string_size = self.capabilities.max_string_size,
            "Protocol negotiated"
        );
        self.transition(ConnectionState::DataTypeNegotiation);
        self.send(ConnectionAction::SendDataTypes(self.capabilities.clone()))
    }

    pub fn data_types_received(&mut self) -> ConnectionAction {
        if self.state != ConnectionState::DataTypeNegotiation {
            return self.unexpected("DATA_TYPES");
        }
        self.transition(ConnectionState::Authenticating(AuthPhase::One));
        self.start_response();
        self.auth_parameters_seen = false;
        self.send(ConnectionAction::SendAuthPhaseOne(self.auth.clone()))
    }

    fn auth_response_complete(&mut self, phase: AuthPhase) -> ConnectionAction {
        // An end-of-response without parameters belongs to an earlier exchange.
        if !self.auth_parameters_seen {
            return ConnectionAction::Wait;
        }
        self.awaiting_response = false;
        match phase {
            AuthPhase::One => {
                let verifier = match generate_verifier(&self.auth, &self.session, &mut *self.rng) {
                    Ok(verifier) => Arc::new(verifier),
                    Err(e) => return self.error_happened(e.into()),
                };
                debug!(generation = ?verifier.generation, "Sending verifier");
                self.verifier = Some(verifier.clone());
                self.transition(ConnectionState::Authenticating(AuthPhase::Two));
                self.start_response();
                self.auth_parameters_seen = false;
                self.send(ConnectionAction::SendAuthPhaseTwo {
                    auth: self.auth.clone(),
                    verifier,
                })
            }
            AuthPhase::Two => {
                if let Some(verifier) = &self.verifier
                    && let Err(e) = verifier.verify_server_response(&self.session)
                {
                    return self.error_happened(e.into());
                }
                self.verifier = None;
                self.last_request = None;
                self.transition(ConnectionState::ReadyForStatement);
                ConnectionAction::AuthenticationComplete(self.session.clone())
            }
        }
    }

    // ==================== Tasks ====================

    /// Submit a task. Returns its id while it stays queued, and the next action.
    ///
    /// A ping joins any ping that is already queued or in flight.
    pub fn enqueue(&mut self, task: Task) -> (Option<TaskId>, ConnectionAction) {
        if matches!(
            self.state,
            ConnectionState::Closing | ConnectionState::Closed | ConnectionState::Errored
        ) {
            task.fail(OraError::ConnectionClosed);
            return (None, ConnectionAction::Wait);
        }

        let task = match task {
            Task::Ping(handles) => {
                let handles = match self.in_flight.as_mut() {
                    Some(in_flight) => match in_flight.task.absorb_ping(handles) {
                        Ok(()) => return (None, ConnectionAction::Wait),
                        Err(handles) => handles,
                    },
                    None => handles,
                };
                let handles = match self.queue.queued_ping_mut() {
                    Some(queued) => match queued.absorb_ping(handles) {
                        Ok(()) => return (None, ConnectionAction::Wait),
                        Err(handles) => handles,
                    },
                    None => handles,
                };
                Task::Ping(handles)
            }
            other => other,
        };

        let id = self.queue.push(task);
        if self.state == ConnectionState::ReadyForStatement && self.in_flight.is_none() {
            return (None, self.ready_for_statement_received());
        }
        trace!(queued = self.queue.len(), "Task queued");
        (Some(id), ConnectionAction::Wait)
    }

    /// Remove a queued task and fail it with `Cancelled`.
    ///
    /// Returns `false` if the task is already in flight or resolved.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        match self.queue.remove(id) {
            Some(task) => {
                task.fail(OraError::Cancelled);
                true
            }
            None => false,
        }
    }

    /// The in-flight exchange is finished; start the next queued task.
    pub fn ready_for_statement_received(&mut self) -> ConnectionAction {
        if self.in_flight.is_some()
            || !matches!(
                self.state,
                ConnectionState::ReadyForStatement | ConnectionState::StatementInFlight
            )
        {
            return ConnectionAction::Wait;
        }
        while let Some((_, task)) = self.queue.pop_front() {
            if task.is_abandoned() {
                trace!("Skipping task without waiter");
                continue;
            }
            return self.start_task(task);
        }
        self.transition(ConnectionState::ReadyForStatement);
        ConnectionAction::Wait
    }

    fn start_task(&mut self, mut task: Task) -> ConnectionAction {
        let mut in_flight_result = QueryResult::default();
        let action = match &mut task {
            Task::Ping(_) => ConnectionAction::SendPing,
            Task::Statement { request, .. } => {
                if request.cursor_id == 0
                    && let Some(cached) = self.statements.get(&request.sql)
                {
                    request.cursor_id = cached.cursor_id;
                    request.columns = cached.columns;
                }
                in_flight_result.cursor_id = request.cursor_id;
                in_flight_result.columns = request.columns.clone();
                ConnectionAction::SendStatement(request.clone())
            }
            Task::Lob { request, .. } => ConnectionAction::SendLobOperation(request.clone()),
            Task::Close(_) => ConnectionAction::SendLogoff,
        };
        let next = match task {
            Task::Close(_) => ConnectionState::Closing,
            _ => ConnectionState::StatementInFlight,
        };
        let mut in_flight = InFlight::new(task);
        in_flight.result = in_flight_result;
        self.in_flight = Some(in_flight);
        self.transition(next);
        self.start_response();
        self.send(action)
    }

    // ==================== Responses ====================

    /// Dispatch one decoded server message.
    pub fn handle_message(&mut self, message: BackendMessage) -> ConnectionAction {
        match message {
            BackendMessage::Accept(accept) => self.accept_received(accept),
            BackendMessage::Refuse(refuse) => self.refuse_received(refuse),
            BackendMessage::Redirect(address) => {
                warn!(%address, "Connection redirected");
                self.error_happened(OraError::Redirected(address))
            }
            BackendMessage::Marker(marker) => self.marker_received(marker),
            BackendMessage::Control(control) => {
                trace!(control, "Control packet");
                ConnectionAction::Wait
            }
            BackendMessage::Resend => self.resend_received(),
            BackendMessage::Protocol(info) => self.protocol_received(info),
            BackendMessage::DataTypes => self.data_types_received(),
            BackendMessage::Parameter(parameter) => self.parameter_received(parameter),
            BackendMessage::Status(status) => self.status_received(status),
            BackendMessage::Error(error) => self.backend_error_received(error),
            BackendMessage::Warning(warning) => self.warning_received(warning),
            BackendMessage::DescribeInfo(columns) => self.describe_info_received(columns),
            BackendMessage::RowHeader | BackendMessage::BitVector | BackendMessage::FlushOutBinds => {
                ConnectionAction::Wait
            }
            BackendMessage::RowData(values) => self.row_data_received(values),
            BackendMessage::LobData(data) => self.lob_data_received(data),
            BackendMessage::ServerPiggyback(piggyback) => {
                self.server_piggyback_received(piggyback)
            }
            BackendMessage::EndOfResponse => self.end_of_response_received(),
        }
    }

    pub fn parameter_received(&mut self, parameter: Parameter) -> ConnectionAction {
        let authenticating = matches!(self.state, ConnectionState::Authenticating(_));
        match parameter {
            Parameter::Authentication(data) if authenticating => {
                self.auth_parameters_seen = true;
                self.session.extend(data);
            }
            Parameter::Lob(params) => {
                let Some(in_flight) = self.in_flight.as_mut() else {
                    return self.unexpected("PARAMETER");
                };
                let LobParameters {
                    source_locator,
                    dest_locator,
                    amount,
                    ..
                } = params;
                in_flight.lob.locator = source_locator;
                in_flight.lob.dest_locator = dest_locator;
                in_flight.lob.amount = amount;
            }
            Parameter::Statement(keywords) if self.in_flight.is_some() => {
                trace!(count = keywords.len(), "Statement keywords");
            }
            _ => return self.unexpected("PARAMETER"),
        }
        ConnectionAction::Wait
    }

    /// End-of-call status. Ends the response unless the server sends an explicit end.
    pub fn status_received(&mut self, status: Status) -> ConnectionAction {
        trace!(call_status = status.call_status, "Status");
        if self.capabilities.supports_end_of_response {
            return ConnectionAction::Wait;
        }
        self.response_complete()
    }

    /// Error block for the current call.
    ///
    /// Failures resolve the in-flight task with the error, warnings resolve it
    /// with a warning attached. During authentication any failure is fatal.
    pub fn backend_error_received(&mut self, error: BackendError) -> ConnectionAction {
        match self.state {
            ConnectionState::Authenticating(_) if error.is_failure() => {
                return self.error_happened(OraError::Server(error));
            }
            ConnectionState::Authenticating(_) => {
                if error.is_warning {
                    warn!(number = error.number, "Server warning during logon: {}", error);
                }
            }
            _ => match self.in_flight.as_mut() {
                Some(in_flight) => in_flight.record_error(error),
                None => {
                    warn!(number = error.number, "Server error without a task: {}", error);
                    return ConnectionAction::Wait;
                }
            },
        }
        if self.capabilities.supports_end_of_response {
            return ConnectionAction::Wait;
        }
        self.response_complete()
    }

    pub fn warning_received(&mut self, warning: BackendError) -> ConnectionAction {
        warn!(number = warning.number, "Server warning: {}", warning);
        if let Some(in_flight) = self.in_flight.as_mut() {
            in_flight.result.warning = Some(warning);
        }
        ConnectionAction::Wait
    }

    pub fn describe_info_received(&mut self, columns: Arc<[ColumnMetadata]>) -> ConnectionAction {
        match self.in_flight.as_mut() {
            Some(in_flight) => {
                in_flight.result.columns = Some(columns);
                ConnectionAction::Wait
            }
            None => self.unexpected("DESCRIBE_INFO"),
        }
    }

    pub fn row_data_received(&mut self, values: Vec<ColumnValue>) -> ConnectionAction {
        match self.in_flight.as_mut() {
            Some(in_flight) => {
                in_flight.result.push_row(values);
                ConnectionAction::Wait
            }
            None => self.unexpected("ROW_DATA"),
        }
    }

    pub fn lob_data_received(&mut self, data: Bytes) -> ConnectionAction {
        match self.in_flight.as_mut() {
            Some(in_flight) => {
                in_flight
                    .lob_data
                    .get_or_insert_with(BytesMut::new)
                    .extend_from_slice(&data);
                ConnectionAction::Wait
            }
            None => self.unexpected("LOB_DATA"),
        }
    }

    pub fn server_piggyback_received(&mut self, piggyback: ServerPiggyback) -> ConnectionAction {
        match piggyback {
            ServerPiggyback::Ltxid(ltxid) => self.ltxid = Some(ltxid),
            ServerPiggyback::SessionState {
                session_id,
                serial_num,
            } => self.session_state = Some((session_id, serial_num)),
            ServerPiggyback::Skipped(opcode) => trace!(opcode, "Server piggyback"),
        }
        ConnectionAction::Wait
    }

    pub fn end_of_response_received(&mut self) -> ConnectionAction {
        self.response_complete()
    }

    /// A BREAK is answered once with a RESET; the server then reports the error.
    pub fn marker_received(&mut self, marker: u8) -> ConnectionAction {
        if marker == marker_type::BREAK && self.awaiting_response && !self.reset_sent {
            self.reset_sent = true;
            return ConnectionAction::SendResetMarker;
        }
        trace!(marker, "Marker");
        ConnectionAction::Wait
    }

    /// Re-issue the pending request without re-deriving it.
    pub fn resend_received(&mut self) -> ConnectionAction {
        match &self.last_request {
            Some(action) => ConnectionAction::Resend(Box::new(action.clone())),
            None => self.unexpected("RESEND"),
        }
    }

    fn response_complete(&mut self) -> ConnectionAction {
        if !self.awaiting_response {
            return ConnectionAction::Wait;
        }
        match self.state {
            ConnectionState::Authenticating(phase) => self.auth_response_complete(phase),
            ConnectionState::StatementInFlight | ConnectionState::Closing => {
                self.complete_in_flight()
            }
            _ => ConnectionAction::Wait,
        }
    }

    fn complete_in_flight(&mut self) -> ConnectionAction {
        self.awaiting_response = false;
        let Some(mut in_flight) = self.in_flight.take() else {
            return ConnectionAction::Wait;
        };
        match in_flight.task {
            Task::Ping(handles) => {
                for handle in handles {
                    match &in_flight.failure {
                        Some(error) => handle.fail(OraError::Server(error.clone())),
                        None => handle.succeed(()),
                    }
                }
            }
            Task::Statement {
                request,
                completion,
            } => {
                if let Some(error) = in_flight.failure.take() {
                    if let Some(cursor_id) = self.statements.remove(&request.sql) {
                        self.cleanup.close_cursor(cursor_id);
                    }
                    self.cleanup.close_cursor(in_flight.result.cursor_id);
                    completion.fail(OraError::Server(error));
                } else if in_flight.more_rows {
                    in_flight.more_rows = false;
                    let action = ConnectionAction::SendFetch {
                        cursor_id: in_flight.result.cursor_id,
                        array_size: request.options.array_size,
                        columns: in_flight.result.columns.clone(),
                    };
                    in_flight.task = Task::Statement {
                        request,
                        completion,
                    };
                    self.in_flight = Some(in_flight);
                    self.start_response();
                    return self.send(action);
                } else {
                    self.cache_cursor(&request, &in_flight.result);
                    completion.succeed(in_flight.result);
                }
            }
            Task::Lob { completion, .. } => match in_flight.failure {
                Some(error) => completion.fail(OraError::Server(error)),
                None => {
                    let mut lob = in_flight.lob;
                    lob.data = in_flight.lob_data.map(BytesMut::freeze);
                    completion.succeed(lob);
                }
            },
            Task::Close(completion) => {
                match in_flight.failure {
                    Some(error) => completion.fail(OraError::Server(error)),
                    None => completion.succeed(()),
                }
                for task in self.queue.drain() {
                    task.fail(OraError::ConnectionClosed);
                }
                self.transition(ConnectionState::Closed);
                return ConnectionAction::CloseConnection { error: None };
            }
        }
        self.ready_for_statement_received()
    }

    fn cache_cursor(&mut self, request: &StatementRequest, result: &QueryResult) {
        if result.cursor_id == 0 {
            return;
        }
        let to_close = if StatementCache::is_cacheable(request.kind) {
            self.statements.insert(
                &request.sql,
                CachedStatement {
                    cursor_id: result.cursor_id,
                    columns: result.columns.clone(),
                },
            )
        } else {
            Some(result.cursor_id)
        };
        if let Some(cursor_id) = to_close {
            self.cleanup.close_cursor(cursor_id);
        }
    }

    // ==================== Failure ====================

    /// Fatal for the connection: fail the in-flight task and every queued task.
    pub fn error_happened(&mut self, error: OraError) -> ConnectionAction {
        if matches!(self.state, ConnectionState::Closed | ConnectionState::Errored) {
            return ConnectionAction::Wait;
        }
        warn!(state = ?self.state, "Connection failed: {}", error);
        self.fail_all(error.clone());
        self.transition(ConnectionState::Errored);
        ConnectionAction::CloseConnection { error: Some(error) }
    }

    /// The transport is gone.
    pub fn closed(&mut self) {
        if self.state != ConnectionState::Closed {
            self.fail_all(OraError::ConnectionClosed);
            self.transition(ConnectionState::Closed);
        }
    }

    fn fail_all(&mut self, error: OraError) {
        self.awaiting_response = false;
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.task.fail(error.clone());
        }
        for task in self.queue.drain() {
            task.fail(error.clone());
        }
    }

    fn unexpected(&mut self, message: &'static str) -> ConnectionAction {
        self.error_happened(OraError::UnexpectedMessage(message))
    }

    // ==================== Helpers ====================

    fn start_response(&mut self) {
        self.awaiting_response = true;
        self.reset_sent = false;
    }

    fn send(&mut self, action: ConnectionAction) -> ConnectionAction {
        self.last_request = Some(action.clone());
        action
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "Connection state changed");
            self.state = next;
        }
    }
}
