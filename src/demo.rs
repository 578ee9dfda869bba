//! Deposit service used by the demo binary.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use mqframe::{
    client::{SendSettings, SyncMessenger, SyncRequest},
    config::Settings,
    header::HeaderLayout,
    prelude::*,
    reader::{HeaderReader, MessageReader},
    record::{FixedLayout, MemoryFormatRepository, RecordType},
    resend::ResendCoordinator,
    store::{MemoryStore, Row},
    transport::{MemoryTransport, MessageId, OutboundMessage, QueueTransport, RawMessage, TransportError},
};
use tokio_util::sync::CancellationToken;

use crate::cli::Cli;

const ACCOUNTS: &str = "ACCOUNT";
const ACCOUNT_ID: &str = "demo";
const REPLY_QUEUE: &str = "MQFRAME.REPLY";

/// Adds the deposited amount to the account balance.
struct Deposit;

#[async_trait]
impl Action for Deposit {
    async fn handle(
        &self,
        record: Option<Record>,
        _request: &mut Request,
        tx: &mut dyn Transaction,
    ) -> Result<Response, ActionError> {
        let record = record.ok_or_else(|| ActionError::InvalidDataFormat("deposit record missing".into()))?;
        let account = record.get("account").unwrap_or_default().to_owned();
        let amount: u64 = record
            .get("amount")
            .unwrap_or_default()
            .parse()
            .map_err(|_| ActionError::InvalidDataFormat("amount is not a number".into()))?;

        let key = vec![account];
        let current = match tx.get(ACCOUNTS, &key).await? {
            Some(row) => row.text("BALANCE").and_then(|b| b.parse::<u64>().ok()).unwrap_or(0),
            None => 0,
        };
        let balance = (current + amount).to_string();
        tx.put(ACCOUNTS, key, Row::new().with("BALANCE", balance.as_str())).await?;
        Ok(Response::ok().with_record(Record::new().with("balance", balance)))
    }
}

/// Loses the first reply sent to the reply queue.
struct LossyTransport {
    inner: Arc<MemoryTransport>,
    dropped: AtomicBool,
}

#[async_trait]
impl QueueTransport for LossyTransport {
    async fn send(&self, message: OutboundMessage) -> Result<MessageId, TransportError> {
        if message.destination == REPLY_QUEUE && !self.dropped.swap(true, Ordering::SeqCst) {
            tracing::info!("dropping the first reply");
            return Ok("lost".into());
        }
        self.inner.send(message).await
    }

    async fn receive(
        &self,
        queue: &str,
        correlation_id: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Option<RawMessage>, TransportError> {
        self.inner.receive(queue, correlation_id, timeout).await
    }
}

fn formats() -> Result<MemoryFormatRepository, mqframe::record::LayoutError> {
    Ok(MemoryFormatRepository::new()
        .with(HeaderLayout::standard())
        .with(
            FixedLayout::builder("Deposit_RECEIVE")
                .record_type(RecordType::new("deposit").text("account", 8).number("amount", 9))
                .build()?,
        )
        .with(
            FixedLayout::builder("Deposit_SEND")
                .record_type(RecordType::new("balance").number("balance", 12))
                .build()?,
        ))
}

/// Serve deposits, send the requested number of them and return the final
/// balances.
pub async fn run(settings: &Settings, cli: &Cli) -> Result<Vec<(String, String)>, Box<dyn std::error::Error>> {
    let formats = Arc::new(formats().map_err(mqframe::ConfigError::from)?);
    let memory = Arc::new(MemoryTransport::auto_create());
    let transport: Arc<dyn QueueTransport> = if cli.drop_first_reply {
        Arc::new(LossyTransport {
            inner: Arc::clone(&memory),
            dropped: AtomicBool::new(false),
        })
    } else {
        memory.clone()
    };
    let store = MemoryStore::new();
    let codec = Arc::new(settings.header_codec(formats.clone())?);

    let reader_config = settings.reader_config()?;
    let queue = reader_config.queue().to_owned();
    let reader = HeaderReader::new(
        MessageReader::new(Arc::clone(&transport), reader_config),
        settings.header_codec(formats.clone())?,
    );
    let coordinator = ResendCoordinator::new(Arc::new(store.clone()), settings.sent_table()?)
        .with_config(settings.resend_config());
    let processor = RequestProcessor::new(
        Arc::clone(&transport),
        Arc::clone(&codec),
        Router::new().route("Deposit", Deposit)?,
        coordinator,
    );
    let server = MessagingServer::new(reader, processor, settings.server_config()?);
    let shutdown = CancellationToken::new();
    let running = tokio::spawn(server.run(shutdown.clone()));

    let send = match settings.send_settings()? {
        Some(send) => send,
        None => SendSettings::builder(queue, REPLY_QUEUE)
            .timeout_millis(500)
            .retries(2)
            .build()?,
    };
    let messenger = SyncMessenger::new(Arc::clone(&transport), codec);
    for n in 1..=cli.deposits {
        let request = SyncRequest::new("Deposit").with_record(
            Record::new()
                .with("account", ACCOUNT_ID)
                .with("amount", cli.amount.to_string()),
        );
        let reply = messenger.send_sync(&send, &request).await?;
        let balance = reply.records().first().and_then(|r| r.get("balance")).unwrap_or("-");
        tracing::info!(deposit = n, status = ?reply.status_code(), attempts = reply.attempts(), balance, "deposit answered");
    }

    shutdown.cancel();
    running.await??;

    Ok(store
        .rows(ACCOUNTS)
        .into_iter()
        .map(|(key, row)| (key.join("/"), row.text("BALANCE").unwrap_or_default().to_owned()))
        .collect())
}
