//! Oracle Connection
//!
//! `OraConnection` is a cheap, cloneable handle. Each call turns into a task
//! sent to the connection's background driver, which owns the socket, the
//! codecs and the state machine and runs one round trip at a time.
//!
//! The handshake runs inline in `connect`; the driver is spawned only once
//! the session is established.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use super::config::{ConnectOptions, Descriptor, OraDriverBuilder};
use super::row::{OraRow, QueryResult};
use super::state::{ConnectionAction, ConnectionStateMachine};
use super::stream::OraStream;
use super::task::{Task, TaskId};
use crate::error::{OraError, OraResult};
use crate::protocol::constants::marker_type;
use crate::protocol::{
    BackendMessage, Bind, Capabilities, ExecuteOptions, FrameDecoder, LobLocator, LobOperation,
    LobRequest, LobResult, RequestEncoder, ResponseContext, SessionData, StatementRequest,
};

/// Initial read buffer capacity (64KB)
pub(crate) const BUFFER_CAPACITY: usize = 65536;

#[derive(Debug)]
enum Command {
    Submit { ticket: u64, task: Task },
    Cancel(u64),
    ReleaseLob(Bytes),
}

/// A submitted task. Await it with `wait`, or `cancel` it while still queued.
#[derive(Debug)]
pub struct PendingTask<T> {
    ticket: u64,
    receiver: oneshot::Receiver<OraResult<T>>,
    commands: mpsc::UnboundedSender<Command>,
}

impl<T> PendingTask<T> {
    /// Remove the task from the queue; it then resolves with `Cancelled`.
    ///
    /// Has no effect once the task is on the wire.
    pub fn cancel(&self) {
        let _ = self.commands.send(Command::Cancel(self.ticket));
    }

    pub async fn wait(self) -> OraResult<T> {
        self.receiver
            .await
            .map_err(|_| OraError::ConnectionClosed)?
    }
}

/// Handle to one Oracle session.
#[derive(Debug, Clone)]
pub struct OraConnection {
    commands: mpsc::UnboundedSender<Command>,
    session: Arc<SessionData>,
    tickets: Arc<AtomicU64>,
}

impl OraConnection {
    /// Builder pattern for ergonomic connection configuration.
    pub fn builder() -> OraDriverBuilder {
        OraDriverBuilder::new()
    }

    /// Open the transport, negotiate, authenticate, and spawn the driver.
    ///
    /// The whole setup is bounded by the descriptor's connect timeout.
    pub async fn connect(options: ConnectOptions) -> OraResult<Self> {
        let timeout = options.descriptor.connect_timeout;
        tokio::time::timeout(timeout, Self::establish(options))
            .await
            .map_err(|_| OraError::Timeout(timeout))?
    }

    async fn establish(options: ConnectOptions) -> OraResult<Self> {
        let ConnectOptions {
            descriptor,
            auth,
            statement_cache_size,
        } = options;
        let stream = OraStream::connect(&descriptor).await?;
        let connect_data = descriptor.connect_data(&auth.identity);
        let state =
            ConnectionStateMachine::new(auth).with_statement_cache(statement_cache_size);
        let (commands, receiver) = mpsc::unbounded_channel();

        let mut driver = ConnectionDriver {
            stream,
            read_buf: BytesMut::with_capacity(BUFFER_CAPACITY),
            decoder: FrameDecoder::new(Capabilities::default()),
            encoder: RequestEncoder::new(Capabilities::default()),
            state,
            messages: VecDeque::new(),
            last_packet: None,
            descriptor,
            connect_data,
            commands: receiver,
            tickets: HashMap::new(),
            close_waiter: None,
        };
        let session = driver.handshake().await?;
        debug!(user_keys = session.len(), "Session established");
        tokio::spawn(driver.run());

        Ok(Self {
            commands,
            session: Arc::new(session),
            tickets: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Key/value pairs the server returned during logon.
    pub fn session(&self) -> &SessionData {
        &self.session
    }

    /// The background driver has stopped.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn submit<T>(&self, task: Task, receiver: oneshot::Receiver<OraResult<T>>) -> PendingTask<T> {
        let ticket = self.tickets.fetch_add(1, Ordering::Relaxed);
        // A send error drops the task, which resolves it with ConnectionClosed.
        let _ = self.commands.send(Command::Submit { ticket, task });
        PendingTask {
            ticket,
            receiver,
            commands: self.commands.clone(),
        }
    }

    pub async fn ping(&self) -> OraResult<()> {
        let (task, rx) = Task::ping();
        self.submit(task, rx).wait().await
    }

    /// Queue a statement without waiting for it.
    pub fn submit_statement(&self, request: StatementRequest) -> PendingTask<QueryResult> {
        let (task, rx) = Task::statement(request);
        self.submit(task, rx)
    }

    /// Execute a statement with explicit options and get the full result.
    pub async fn execute_with(
        &self,
        sql: &str,
        binds: Vec<Bind>,
        options: ExecuteOptions,
    ) -> OraResult<QueryResult> {
        self.submit_statement(StatementRequest::new(sql, binds, options))
            .wait()
            .await
    }

    /// Execute DML, DDL or PL/SQL. Returns the affected row count.
    pub async fn execute(&self, sql: &str, binds: Vec<Bind>) -> OraResult<u64> {
        let result = self.execute_with(sql, binds, ExecuteOptions::default()).await?;
        Ok(result.row_count)
    }

    /// Run a query and fetch every row.
    ///
    /// # Example
    /// ```ignore
    /// let rows = conn.query("select ename from emp where deptno = :1", vec![Bind::new(&10i64)?]).await?;
    /// for row in &rows {
    ///     let name: String = row.get(0)?;
    /// }
    /// ```
    pub async fn query(&self, sql: &str, binds: Vec<Bind>) -> OraResult<Vec<OraRow>> {
        let result = self.execute_with(sql, binds, ExecuteOptions::default()).await?;
        Ok(result.rows)
    }

    pub async fn commit(&self) -> OraResult<()> {
        self.execute("commit", vec![]).await.map(|_| ())
    }

    pub async fn rollback(&self) -> OraResult<()> {
        self.execute("rollback", vec![]).await.map(|_| ())
    }

    /// Run a raw LOB operation.
    pub async fn lob_operation(&self, request: LobRequest) -> OraResult<LobResult> {
        let (task, rx) = Task::lob(request);
        self.submit(task, rx).wait().await
    }

    /// Length in characters (CLOB) or bytes (BLOB).
    pub async fn lob_length(&self, lob: &LobLocator) -> OraResult<u64> {
        let result = self
            .lob_operation(LobRequest::new(lob.locator.clone(), LobOperation::GetLength))
            .await?;
        Ok(result.amount.unwrap_or(0).max(0) as u64)
    }

    /// Read `amount` units starting at the 1-based `offset`.
    pub async fn lob_read(&self, lob: &LobLocator, offset: u64, amount: u64) -> OraResult<Bytes> {
        let result = self
            .lob_operation(LobRequest::new(
                lob.locator.clone(),
                LobOperation::Read { offset, amount },
            ))
            .await?;
        Ok(result.data.unwrap_or_default())
    }

    /// Write `data` at the 1-based `offset`. Returns the updated locator.
    pub async fn lob_write(&self, lob: &LobLocator, offset: u64, data: Bytes) -> OraResult<Bytes> {
        let result = self
            .lob_operation(LobRequest::new(
                lob.locator.clone(),
                LobOperation::Write { offset, data },
            ))
            .await?;
        Ok(result.locator.unwrap_or_else(|| lob.locator.clone()))
    }

    pub async fn lob_trim(&self, lob: &LobLocator, new_size: u64) -> OraResult<()> {
        self.lob_operation(LobRequest::new(
            lob.locator.clone(),
            LobOperation::Trim { new_size },
        ))
        .await
        .map(|_| ())
    }

    /// Copy `amount` units from `source` into `dest`.
    pub async fn lob_copy(
        &self,
        source: &LobLocator,
        source_offset: u64,
        dest: &LobLocator,
        dest_offset: u64,
        amount: u64,
    ) -> OraResult<()> {
        self.lob_operation(LobRequest::new(
            source.locator.clone(),
            LobOperation::Copy {
                dest: dest.locator.clone(),
                source_offset,
                dest_offset,
                amount,
            },
        ))
        .await
        .map(|_| ())
    }

    /// Free a temporary LOB with the next request.
    pub fn release_temporary_lob(&self, lob: &LobLocator) {
        let _ = self.commands.send(Command::ReleaseLob(lob.locator.clone()));
    }

    /// Log off and close the transport. Queued work behind it fails.
    pub async fn close(&self) -> OraResult<()> {
        let (task, rx) = Task::close();
        self.submit(task, rx).wait().await
    }
}

/// Owns the transport and feeds the state machine.
struct ConnectionDriver {
    stream: OraStream,
    read_buf: BytesMut,
    decoder: FrameDecoder,
    encoder: RequestEncoder,
    state: ConnectionStateMachine,
    messages: VecDeque<BackendMessage>,
    last_packet: Option<Bytes>,
    descriptor: Descriptor,
    connect_data: String,
    commands: mpsc::UnboundedReceiver<Command>,
    tickets: HashMap<u64, TaskId>,
    close_waiter: Option<oneshot::Receiver<OraResult<()>>>,
}

impl ConnectionDriver {
    async fn handshake(&mut self) -> OraResult<SessionData> {
        let mut action = self.state.connected();
        loop {
            match action {
                ConnectionAction::AuthenticationComplete(session) => return Ok(session),
                ConnectionAction::CloseConnection { error } => {
                    let _ = self.stream.shutdown().await;
                    return Err(error.unwrap_or(OraError::ConnectionClosed));
                }
                other => {
                    if let Err(e) = self.perform(other).await {
                        self.state.error_happened(e.clone());
                        return Err(e);
                    }
                }
            }
            let message = match self.next_message().await {
                Ok(message) => message,
                Err(e) => {
                    self.state.error_happened(e.clone());
                    return Err(e);
                }
            };
            action = self.state.handle_message(message);
        }
    }

    /// Next decoded message, reading from the socket as needed.
    async fn next_message(&mut self) -> OraResult<BackendMessage> {
        loop {
            if let Some(message) = self.messages.pop_front() {
                return Ok(message);
            }
            if let Some(messages) = self.decoder.decode(&mut self.read_buf)? {
                self.messages.extend(messages);
                continue;
            }
            if self.stream.read_buf(&mut self.read_buf).await? == 0 {
                return Err(OraError::ConnectionClosed);
            }
        }
    }

    async fn run(mut self) {
        // Whatever arrived behind the last logon message, then anything queued meanwhile.
        while let Some(message) = self.messages.pop_front() {
            let action = self.state.handle_message(message);
            if !self.execute(action).await {
                return;
            }
        }
        if !self.process_buffer().await {
            return;
        }
        let action = self.state.ready_for_statement_received();
        if !self.execute(action).await {
            return;
        }
        let mut commands_open = true;
        loop {
            tokio::select! {
                command = self.commands.recv(), if commands_open => {
                    let action = match command {
                        Some(command) => self.command(command),
                        None => {
                            // Every handle is gone: log off.
                            commands_open = false;
                            let (task, rx) = Task::close();
                            self.close_waiter = Some(rx);
                            self.state.enqueue(task).1
                        }
                    };
                    if !self.execute(action).await {
                        break;
                    }
                }
                read = self.stream.read_buf(&mut self.read_buf) => {
                    match read {
                        Ok(0) => {
                            self.state.closed();
                            break;
                        }
                        Ok(_) => {
                            if !self.process_buffer().await {
                                break;
                            }
                        }
                        Err(e) => {
                            let action = self.state.error_happened(e.into());
                            self.execute(action).await;
                            break;
                        }
                    }
                }
            }
        }
        debug!(host = %self.descriptor.host, "Connection driver stopped");
    }

    fn command(&mut self, command: Command) -> ConnectionAction {
        match command {
            Command::Submit { ticket, task } => {
                let (id, action) = self.state.enqueue(task);
                let state = &self.state;
                self.tickets.retain(|_, id| state.is_queued(*id));
                if let Some(id) = id {
                    self.tickets.insert(ticket, id);
                }
                action
            }
            Command::Cancel(ticket) => {
                if let Some(id) = self.tickets.remove(&ticket) {
                    self.state.cancel(id);
                }
                ConnectionAction::Wait
            }
            Command::ReleaseLob(locator) => {
                self.state.release_temporary_lob(locator);
                ConnectionAction::Wait
            }
        }
    }

    /// Decode every complete packet in the buffer and act on each message.
    async fn process_buffer(&mut self) -> bool {
        loop {
            let messages = match self.decoder.decode(&mut self.read_buf) {
                Ok(Some(messages)) => messages,
                Ok(None) => return true,
                Err(e) => {
                    let action = self.state.error_happened(e.into());
                    self.execute(action).await;
                    return false;
                }
            };
            for message in messages {
                let action = self.state.handle_message(message);
                if !self.execute(action).await {
                    return false;
                }
            }
        }
    }

    /// Perform an action; `false` once the connection is finished.
    async fn execute(&mut self, action: ConnectionAction) -> bool {
        match self.perform(action).await {
            Ok(keep_running) => keep_running,
            Err(e) => {
                let action = self.state.error_happened(e);
                let _ = self.perform(action).await;
                false
            }
        }
    }

    async fn perform(&mut self, action: ConnectionAction) -> OraResult<bool> {
        let packet = match action {
            ConnectionAction::Wait | ConnectionAction::AuthenticationComplete(_) => return Ok(true),
            ConnectionAction::SendConnect => {
                self.encoder.connect(&self.connect_data, self.descriptor.sdu)
            }
            ConnectionAction::SendProtocol(capabilities) => {
                self.install(capabilities);
                self.encoder.protocol()
            }
            ConnectionAction::SendDataTypes(capabilities) => {
                self.install(capabilities);
                self.encoder.data_types()
            }
            ConnectionAction::SendAuthPhaseOne(auth) => {
                self.decoder.set_context(ResponseContext::Authentication);
                self.encoder.auth_phase_one(&auth)
            }
            ConnectionAction::SendAuthPhaseTwo { auth, verifier } => {
                self.decoder.set_context(ResponseContext::Authentication);
                self.encoder.auth_phase_two(&auth, &verifier)
            }
            ConnectionAction::SendPing => {
                self.decoder.set_context(ResponseContext::Statement);
                let mut cleanup = self.state.take_cleanup();
                self.encoder.ping(&mut cleanup)
            }
            ConnectionAction::SendStatement(request) => {
                self.decoder.set_context(ResponseContext::Statement);
                self.decoder.set_columns(request.columns.clone());
                let mut cleanup = self.state.take_cleanup();
                self.encoder.execute(&request, &mut cleanup)
            }
            ConnectionAction::SendFetch {
                cursor_id,
                array_size,
                columns,
            } => {
                self.decoder.set_context(ResponseContext::Statement);
                self.decoder.set_columns(columns);
                let mut cleanup = self.state.take_cleanup();
                self.encoder.fetch(cursor_id, array_size, &mut cleanup)
            }
            ConnectionAction::SendLobOperation(request) => {
                self.decoder.set_context(ResponseContext::LobOperation {
                    source_len: request.locator.len(),
                    dest_len: request.dest().map_or(0, Bytes::len),
                    operation: request.opcode(),
                    send_amount: request.sends_amount(),
                });
                let mut cleanup = self.state.take_cleanup();
                self.encoder.lob_operation(&request, &mut cleanup)
            }
            ConnectionAction::SendLogoff => {
                self.decoder.set_context(ResponseContext::Statement);
                let mut cleanup = self.state.take_cleanup();
                self.encoder.logoff(&mut cleanup)
            }
            ConnectionAction::SendResetMarker => {
                let marker = self.encoder.marker(marker_type::RESET);
                self.write(&marker).await?;
                return Ok(true);
            }
            ConnectionAction::Resend(action) => {
                trace!(?action, "Resending last packet");
                let packet = self
                    .last_packet
                    .clone()
                    .ok_or(OraError::UnexpectedMessage("RESEND"))?;
                self.write(&packet).await?;
                return Ok(true);
            }
            ConnectionAction::CloseConnection { error } => {
                if error.is_none() {
                    let close = self.encoder.close();
                    let _ = self.write(&close).await;
                }
                let _ = self.stream.shutdown().await;
                return Ok(false);
            }
        };
        let packet = packet.freeze();
        self.write(&packet).await?;
        self.last_packet = Some(packet);
        Ok(true)
    }

    fn install(&mut self, capabilities: Capabilities) {
        self.encoder.set_capabilities(capabilities.clone());
        self.decoder.set_capabilities(capabilities);
    }

    async fn write(&mut self, packet: &[u8]) -> OraResult<()> {
        trace!(length = packet.len(), "Sending packet");
        self.stream.write_all(packet).await?;
        self.stream.flush().await?;
        Ok(())
    }
}
