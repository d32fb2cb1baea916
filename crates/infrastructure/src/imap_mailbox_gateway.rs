//! IMAP-over-TLS mailbox gateway using `async-imap` and `tokio-rustls`.

mod decode;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_imap::{Client, Session};
use async_trait::async_trait;
use futures::TryStreamExt;
use otpdesk_application::{MailboxGateway, MailboxQuery};
use otpdesk_core::{AppError, AppResult};
use otpdesk_domain::MailMessage;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{self, ClientConfig, RootCertStore};
use tracing::{debug, warn};

use decode::parse_message;

type ImapSession = Session<TlsStream<TcpStream>>;

/// Mailbox server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImapSettings {
    /// IMAP server hostname.
    pub host: String,
    /// IMAP server TLS port.
    pub port: u16,
    /// Deadline for TCP connect, TLS handshake, greeting, and login.
    pub connect_timeout: Duration,
    /// Deadline for each of select, search, fetch, and logout.
    pub command_timeout: Duration,
}

impl Default for ImapSettings {
    fn default() -> Self {
        Self {
            host: "imap.dreamhost.com".to_owned(),
            port: 993,
            connect_timeout: Duration::from_secs(15),
            command_timeout: Duration::from_secs(30),
        }
    }
}

/// Production mailbox gateway speaking IMAP over TLS.
#[derive(Clone)]
pub struct ImapMailboxGateway {
    settings: ImapSettings,
    connector: TlsConnector,
}

impl ImapMailboxGateway {
    /// Creates a gateway trusting the bundled web PKI roots.
    pub fn new(settings: ImapSettings) -> AppResult<Self> {
        let roots = RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };

        let config =
            ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
                .with_safe_default_protocol_versions()
                .map_err(|error| {
                    AppError::Internal(format!("failed to configure mailbox tls: {error}"))
                })?
                .with_root_certificates(roots)
                .with_no_client_auth();

        Ok(Self {
            settings,
            connector: TlsConnector::from(Arc::new(config)),
        })
    }

    /// Returns the configured server settings.
    #[must_use]
    pub fn settings(&self) -> &ImapSettings {
        &self.settings
    }

    async fn open_session(&self, query: &MailboxQuery) -> AppResult<ImapSession> {
        let host = self.settings.host.as_str();
        let deadline = self.settings.connect_timeout;

        let tcp = bounded(
            deadline,
            TcpStream::connect((host, self.settings.port)),
            AppError::MailConnect,
            "tcp connect",
        )
        .await?;

        let server_name = ServerName::try_from(host.to_owned()).map_err(|error| {
            AppError::MailConnect(format!("invalid mailbox host '{host}': {error}"))
        })?;
        let tls = bounded(
            deadline,
            self.connector.connect(server_name, tcp),
            AppError::MailConnect,
            "tls handshake",
        )
        .await?;

        let mut client = Client::new(tls);
        let greeting = tokio::time::timeout(deadline, client.read_response())
            .await
            .map_err(|_| AppError::MailConnect(format!("greeting timed out after {deadline:?}")))?;
        check_greeting(greeting)?;

        let login = tokio::time::timeout(
            deadline,
            client.login(
                query.mailbox_address.as_str(),
                query.mailbox_password.expose(),
            ),
        )
        .await
        .map_err(|_| AppError::MailConnect(format!("login timed out after {deadline:?}")))?;

        login.map_err(|(error, _client)| AppError::MailConnect(format!("login failed: {error}")))
    }

    async fn newest_message(
        &self,
        session: &mut ImapSession,
        query: &MailboxQuery,
    ) -> AppResult<Option<Vec<u8>>> {
        let deadline = self.settings.command_timeout;

        bounded(
            deadline,
            session.select("INBOX"),
            AppError::MailSearch,
            "select",
        )
        .await?;

        let criteria = search_criteria(query);
        debug!(mailbox = %query.mailbox_address, criteria = criteria.as_str(), stage = "searching", "searching mailbox");
        let uids = bounded(
            deadline,
            session.uid_search(criteria.as_str()),
            AppError::MailSearch,
            "search",
        )
        .await?;

        let Some(newest) = uids.into_iter().max() else {
            return Ok(None);
        };

        debug!(mailbox = %query.mailbox_address, uid = newest, stage = "fetching", "fetching newest match");
        let fetches = tokio::time::timeout(deadline, async {
            let stream = session.uid_fetch(newest.to_string(), "BODY.PEEK[]").await?;
            stream.try_collect::<Vec<_>>().await
        })
        .await
        .map_err(|_| AppError::MailSearch(format!("fetch timed out after {deadline:?}")))?
        .map_err(|error| AppError::MailSearch(format!("fetch failed: {error}")))?;

        Ok(fetches
            .iter()
            .find_map(|fetch| fetch.body().map(<[u8]>::to_vec)))
    }
}

#[async_trait]
impl MailboxGateway for ImapMailboxGateway {
    async fn fetch_latest(&self, query: &MailboxQuery) -> AppResult<Option<MailMessage>> {
        let mut session = self.open_session(query).await?;
        debug!(mailbox = %query.mailbox_address, stage = "connected", "mailbox session opened");

        let newest = self.newest_message(&mut session, query).await;

        match tokio::time::timeout(self.settings.command_timeout, session.logout()).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                warn!(mailbox = %query.mailbox_address, error = %error, "mailbox logout failed");
            }
            Err(_) => warn!(mailbox = %query.mailbox_address, "mailbox logout timed out"),
        }

        let Some(raw) = newest? else {
            return Ok(None);
        };

        debug!(mailbox = %query.mailbox_address, stage = "parsing", "decoding fetched message");
        parse_message(raw.as_slice()).map(Some)
    }
}

async fn bounded<T, E, F>(
    deadline: Duration,
    future: F,
    category: fn(String) -> AppError,
    step: &str,
) -> AppResult<T>
where
    F: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    tokio::time::timeout(deadline, future)
        .await
        .map_err(|_| category(format!("{step} timed out after {deadline:?}")))?
        .map_err(|error| category(format!("{step} failed: {error}")))
}

fn check_greeting<T, E>(greeting: Option<Result<T, E>>) -> AppResult<()>
where
    E: std::fmt::Display,
{
    match greeting {
        Some(Ok(_)) => Ok(()),
        Some(Err(error)) => Err(AppError::MailConnect(format!("greeting failed: {error}"))),
        None => Err(AppError::MailConnect(
            "mailbox closed the connection before the greeting".to_owned(),
        )),
    }
}

fn search_criteria(query: &MailboxQuery) -> String {
    let sender = query
        .provider_address
        .as_str()
        .replace('\\', "\\\\")
        .replace('"', "\\\"");

    format!(
        "FROM \"{sender}\" SINCE {}",
        query.since.format("%d-%b-%Y")
    )
}
