//! Session protocol engine.
//!
//! A session owns one message stream and, once the handshake completes, the
//! one shared secret derived for it. Nothing is shared across sessions.
//!
//! ## Server lifecycle
//!
//! ```text
//! AwaitingPeerKey --peer key--> Handshaking --own key sent--> Established
//!        |                           |                            |
//!        +------- any error ---------+---- end / error / stop ----+--> Terminated
//! ```
//!
//! The first message from the client is its raw X25519 public key, the first
//! message back is the server's. Every later message is an envelope sealed
//! under the derived key.

use bytes::Bytes;
use tokio::sync::watch;

use neuron_core::{Document, Request, Response, Status};
use neuron_crypto::{
    decrypt, derive_shared, encrypt, generate_key_pair, public_key, PublicKey, SharedSecret,
};
use neuron_store::DocumentStore;

use crate::dispatcher::Dispatcher;
use crate::error::{log_status, Result, SessionError, TransportError};
use crate::signal::{cancelled, is_cancelled};
use crate::transport::MessageStream;

/// Server-side session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the client's public key.
    AwaitingPeerKey,
    /// Deriving the key and answering with our own public key.
    Handshaking,
    /// Exchanging envelopes.
    Established,
    /// Finished, cleanly or not. No further frames are processed.
    Terminated,
}

/// What the serve loop saw next.
enum Inbound {
    Message(Vec<u8>),
    Finished,
    Shutdown,
}

/// The server end of one session.
pub struct ServerSession<T> {
    stream: T,
    state: SessionState,
    shared: Option<SharedSecret>,
}

impl<T: MessageStream> ServerSession<T> {
    /// Wrap a freshly opened stream.
    pub fn new(stream: T) -> Self {
        Self {
            stream,
            state: SessionState::AwaitingPeerKey,
            shared: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the handshake.
    ///
    /// On failure the stream is aborted with the mapped status and the
    /// session is terminated.
    pub async fn accept(&mut self) -> Result<()> {
        self.expect_state(SessionState::AwaitingPeerKey)?;

        match self.handshake().await {
            Ok(shared) => {
                self.shared = Some(shared);
                self.state = SessionState::Established;
                Ok(())
            }
            Err(err) => Err(self.terminate(err).await),
        }
    }

    async fn handshake(&mut self) -> Result<SharedSecret> {
        let peer_key = match self.stream.recv().await {
            Ok(Some(key)) => key,
            Ok(None) => {
                return Err(SessionError::Handshake(
                    "stream closed before the peer key arrived".into(),
                ))
            }
            Err(e @ TransportError::Remote(_)) => return Err(e.into()),
            Err(e) => {
                return Err(SessionError::Handshake(format!(
                    "reading initial message: {}",
                    e
                )))
            }
        };
        self.state = SessionState::Handshaking;

        let secret = generate_key_pair()?;
        let shared = derive_shared(&secret, &peer_key).map_err(SessionError::InvalidPeerKey)?;
        let local = public_key(&secret)?;

        self.stream
            .send(Bytes::copy_from_slice(local.as_bytes()))
            .await?;
        tracing::trace!(local = %local.fingerprint(), "session handshake complete");

        Ok(shared)
    }

    /// Receive and open the next request envelope.
    ///
    /// Returns `None` once the peer has finished; the session then ends
    /// cleanly. An envelope that does not open terminates the session with
    /// `InvalidArgument`.
    pub async fn next_request(&mut self) -> Result<Option<Vec<u8>>> {
        self.expect_state(SessionState::Established)?;

        let envelope = match self.stream.recv().await {
            Ok(Some(envelope)) => envelope,
            Ok(None) => {
                self.close(Ok(())).await;
                return Ok(None);
            }
            Err(e) => return Err(self.terminate(e.into()).await),
        };

        let opened = decrypt(self.shared()?, &envelope);
        match opened {
            Ok(plaintext) => Ok(Some(plaintext)),
            Err(e) => Err(self.terminate(SessionError::Decrypt(e)).await),
        }
    }

    /// Seal and send one response plaintext.
    pub async fn respond(&mut self, plaintext: &[u8]) -> Result<()> {
        self.expect_state(SessionState::Established)?;

        let sealed = encrypt(self.shared()?, plaintext);
        let envelope = match sealed {
            Ok(envelope) => envelope,
            Err(e) => return Err(self.terminate(e.into()).await),
        };

        if let Err(e) = self.stream.send(Bytes::from(envelope)).await {
            return Err(self.terminate(e.into()).await);
        }
        Ok(())
    }

    /// Serve typed requests until the peer finishes, an error terminates the
    /// stream, or shutdown is requested.
    ///
    /// Runs the handshake first if it has not happened yet.
    pub async fn serve<S>(
        &mut self,
        dispatcher: &Dispatcher<S>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<()>
    where
        S: DocumentStore + ?Sized,
    {
        if self.state == SessionState::AwaitingPeerKey {
            self.accept().await?;
        }

        loop {
            let plaintext = match self.next_inbound(shutdown).await? {
                Inbound::Message(plaintext) => plaintext,
                Inbound::Finished | Inbound::Shutdown => return Ok(()),
            };

            let response = match dispatcher.dispatch(&plaintext).await {
                Ok(response) => response,
                Err(status) => return Err(self.terminate(SessionError::Status(status)).await),
            };

            let encoded = match response.to_bytes() {
                Ok(encoded) => encoded,
                Err(e) => return Err(self.terminate(e.into()).await),
            };
            self.respond(&encoded).await?;
        }
    }

    /// Decrypt every message and send it straight back, re-encrypted.
    ///
    /// Runs the handshake first if it has not happened yet.
    pub async fn echo(&mut self, shutdown: &mut watch::Receiver<bool>) -> Result<()> {
        if self.state == SessionState::AwaitingPeerKey {
            self.accept().await?;
        }

        loop {
            match self.next_inbound(shutdown).await? {
                Inbound::Message(plaintext) => self.respond(&plaintext).await?,
                Inbound::Finished | Inbound::Shutdown => return Ok(()),
            }
        }
    }

    /// Wait for the next request or for shutdown, whichever comes first.
    async fn next_inbound(&mut self, shutdown: &mut watch::Receiver<bool>) -> Result<Inbound> {
        if is_cancelled(shutdown) {
            self.close(Ok(())).await;
            return Ok(Inbound::Shutdown);
        }

        let next = tokio::select! {
            biased;
            _ = cancelled(shutdown) => None,
            next = self.next_request() => Some(next),
        };

        match next {
            None => {
                tracing::debug!("session closed for shutdown");
                self.close(Ok(())).await;
                Ok(Inbound::Shutdown)
            }
            Some(Ok(Some(plaintext))) => Ok(Inbound::Message(plaintext)),
            Some(Ok(None)) => Ok(Inbound::Finished),
            Some(Err(e)) => Err(e),
        }
    }

    fn shared(&self) -> Result<&SharedSecret> {
        self.shared.as_ref().ok_or(SessionError::InvalidState {
            expected: SessionState::Established,
            actual: self.state,
        })
    }

    fn expect_state(&self, expected: SessionState) -> Result<()> {
        if self.state != expected {
            return Err(SessionError::InvalidState {
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }

    /// End the session and tell the peer, ignoring delivery failures.
    async fn close(&mut self, outcome: std::result::Result<(), Status>) {
        if self.state == SessionState::Terminated {
            return;
        }
        self.state = SessionState::Terminated;
        self.shared = None;

        if let Err(e) = self.stream.finish(outcome).await {
            tracing::debug!(error = %e, "could not deliver end of stream");
        }
    }

    /// Terminate with the status mapped from `err` and hand `err` back.
    async fn terminate(&mut self, err: SessionError) -> SessionError {
        let status = err.to_status();
        // Dispatcher statuses are logged where they are produced.
        if !matches!(err, SessionError::Status(_)) {
            log_status(&status);
        }
        self.close(Err(status)).await;
        err
    }
}

/// The client end of one session.
pub struct ClientSession<T> {
    stream: T,
    shared: SharedSecret,
    server_key: PublicKey,
}

impl<T: MessageStream> ClientSession<T> {
    /// Send our public key, read the server's and derive the session key.
    pub async fn connect(mut stream: T) -> Result<Self> {
        let secret = generate_key_pair()?;
        let local = public_key(&secret)?;

        stream.send(Bytes::copy_from_slice(local.as_bytes())).await?;

        let reply = stream.recv().await?.ok_or_else(|| {
            SessionError::Handshake("server closed before sending its key".into())
        })?;
        let shared = derive_shared(&secret, &reply).map_err(SessionError::InvalidPeerKey)?;
        let server_key = PublicKey::from_slice(&reply).map_err(SessionError::InvalidPeerKey)?;

        tracing::trace!(server = %server_key.fingerprint(), "session established");
        Ok(Self {
            stream,
            shared,
            server_key,
        })
    }

    /// The server's ephemeral public key for this session.
    pub fn server_key(&self) -> &PublicKey {
        &self.server_key
    }

    /// Seal and send an arbitrary plaintext.
    pub async fn send_plaintext(&mut self, plaintext: &[u8]) -> Result<()> {
        let envelope = encrypt(&self.shared, plaintext)?;
        self.stream.send(Bytes::from(envelope)).await?;
        Ok(())
    }

    /// Receive and open the next envelope; `None` once the server finished.
    pub async fn recv_plaintext(&mut self) -> Result<Option<Vec<u8>>> {
        match self.stream.recv().await? {
            Some(envelope) => decrypt(&self.shared, &envelope)
                .map(Some)
                .map_err(SessionError::Decrypt),
            None => Ok(None),
        }
    }

    /// Send one request and wait for its response.
    ///
    /// Per-message failures come back as `Ok(Response::Error(..))`; a
    /// terminated stream comes back as `Err`.
    pub async fn call(&mut self, request: &Request) -> Result<Response> {
        self.send_plaintext(&request.to_bytes()?).await?;
        let plaintext = self.recv_plaintext().await?.ok_or(SessionError::Closed)?;
        Ok(Response::from_bytes(&plaintext)?)
    }

    /// Store a new document.
    pub async fn add(&mut self, owner: &str, content: &str, name: &str) -> Result<Document> {
        let response = self.call(&Request::add(owner, content, name)).await?;
        expect_document(response)
    }

    /// Fetch a document by id.
    pub async fn get(&mut self, id: &str) -> Result<Document> {
        let response = self.call(&Request::get(id)).await?;
        expect_document(response)
    }

    /// List an owner's documents, newest first.
    pub async fn list(&mut self, owner: &str) -> Result<Vec<Document>> {
        match self.call(&Request::list(owner)).await? {
            Response::Documents(docs) => Ok(docs),
            Response::Error(status) => Err(SessionError::Status(status)),
            other => Err(unexpected("documents", &other)),
        }
    }

    /// Finish our half and wait for the server to finish its own.
    pub async fn close(mut self) -> Result<()> {
        self.stream.finish(Ok(())).await?;
        while self.stream.recv().await?.is_some() {}
        Ok(())
    }
}

fn expect_document(response: Response) -> Result<Document> {
    match response {
        Response::Document(doc) => Ok(doc),
        Response::Error(status) => Err(SessionError::Status(status)),
        other => Err(unexpected("document", &other)),
    }
}

fn unexpected(wanted: &str, got: &Response) -> SessionError {
    let got = match got {
        Response::Document(_) => "document",
        Response::Documents(_) => "documents",
        Response::Error(_) => "error",
    };
    SessionError::UnexpectedResponse(format!("wanted {}, got {}", wanted, got))
}
