//! Background ingestion of controller messages
//!
//! A dedicated thread reads from the attached [`ByteSource`], decodes the
//! bytes, scans for controller messages and applies the resulting events to
//! the [`AreaStateStore`] in stream order.
//!
//! The source handle sits behind a single mutex, held for each read and for
//! close, so a close from the controlling thread never races a read in
//! progress. Shutdown is cooperative: [`SerialIngestor::stop`] clears the
//! running flag and the loop notices it after at most one read timeout.

use super::ByteSource;
use crate::areas::AreaStateStore;
use crate::error::{IngestError, Result};
use crate::protocol::{AreaEvent, ChunkDecoder, IngestBuffer, MessageGrammar, GRAMMAR_V1};
use chrono::Local;
use log::{debug, error, info, warn};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

#[cfg(feature = "serial")]
use super::{PortConfig, SerialConnection};

/// Default cap on buffered unmatched text
pub const DEFAULT_BUFFER_LIMIT: usize = 4096;

type SharedSource = Arc<Mutex<Option<Box<dyn ByteSource>>>>;

/// Connection status as seen from outside the read loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No port attached (open failed or never attempted)
    Disconnected,
    /// Port attached, loop not started
    Connected,
    Running,
    /// Source reported end of stream
    Finished,
    /// Read error ended the loop
    Failed,
    /// Stopped on request
    Stopped,
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LinkState::Disconnected => "DISCONNECTED",
            LinkState::Connected => "CONNECTED",
            LinkState::Running => "LIVE",
            LinkState::Finished => "FINISHED",
            LinkState::Failed => "LINK FAILED",
            LinkState::Stopped => "STOPPED",
        };
        write!(f, "{}", s)
    }
}

/// Settings fixed when the ingestor is created
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub grammar: MessageGrammar,
    /// Maximum bytes of unmatched text kept in the buffer
    pub buffer_limit: usize,
    /// Optional file receiving one line per applied event
    pub journal: Option<PathBuf>,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            grammar: GRAMMAR_V1.clone(),
            buffer_limit: DEFAULT_BUFFER_LIMIT,
            journal: None,
        }
    }
}

/// Owns the port handle and the read loop thread
pub struct SerialIngestor {
    store: Arc<AreaStateStore>,
    settings: IngestSettings,
    source: SharedSource,
    running: Arc<AtomicBool>,
    link: Arc<Mutex<LinkState>>,
    worker: Option<JoinHandle<()>>,
}

impl SerialIngestor {
    pub fn new(store: Arc<AreaStateStore>, settings: IngestSettings) -> Self {
        Self {
            store,
            settings,
            source: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            link: Arc::new(Mutex::new(LinkState::Disconnected)),
            worker: None,
        }
    }

    /// Open the serial device and attach it.
    ///
    /// On failure the ingestor stays disconnected; the caller decides whether
    /// that is fatal.
    #[cfg(feature = "serial")]
    pub fn open(&mut self, config: &PortConfig) -> Result<()> {
        match SerialConnection::open(config.clone()) {
            Ok(conn) => {
                info!(
                    "Serial connection opened on {} at {} baud",
                    config.port_path, config.baud_rate
                );
                self.attach(Box::new(conn));
                Ok(())
            }
            Err(e) => {
                set_link(&self.link, LinkState::Disconnected);
                Err(e)
            }
        }
    }

    /// Attach an already-open source, replacing any previous one
    pub fn attach(&mut self, source: Box<dyn ByteSource>) {
        close_source(&self.source);
        *lock(&self.source) = Some(source);
        set_link(&self.link, LinkState::Connected);
    }

    /// Spawn the read loop thread
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(IngestError::AlreadyRunning);
        }
        if lock(&self.source).is_none() {
            return Err(IngestError::NotConnected);
        }

        let journal = match self.settings.journal {
            Some(ref path) => {
                let file = File::options()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| IngestError::Journal {
                        path: path.display().to_string(),
                        source: e,
                    })?;
                Some(BufWriter::new(file))
            }
            None => None,
        };

        let read_loop = ReadLoop {
            source: Arc::clone(&self.source),
            running: Arc::clone(&self.running),
            link: Arc::clone(&self.link),
            store: Arc::clone(&self.store),
            buffer: IngestBuffer::new(self.settings.grammar.clone(), self.settings.buffer_limit),
            decoder: ChunkDecoder::new(),
            journal,
        };

        self.running.store(true, Ordering::SeqCst);
        set_link(&self.link, LinkState::Running);

        let worker = std::thread::Builder::new()
            .name("serial-ingest".to_string())
            .spawn(move || read_loop.run())
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                set_link(&self.link, LinkState::Connected);
                IngestError::Spawn(e)
            })?;

        self.worker = Some(worker);
        Ok(())
    }

    /// Ask the read loop to exit, wait for it, and close the port
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.join();
        self.close();
    }

    /// Wait for the read loop to end on its own (end of stream, read error)
    pub fn wait(&mut self) {
        self.join();
    }

    fn join(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Read loop thread panicked");
                set_link(&self.link, LinkState::Failed);
            }
        }
    }

    /// Close the port if open. Safe to call repeatedly.
    pub fn close(&self) {
        close_source(&self.source);
    }

    pub fn link_state(&self) -> LinkState {
        *lock(&self.link)
    }

    /// Whether the read loop thread is alive
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    #[cfg(test)]
    pub fn store(&self) -> &Arc<AreaStateStore> {
        &self.store
    }
}

impl Drop for SerialIngestor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State owned by the read loop thread
struct ReadLoop {
    source: SharedSource,
    running: Arc<AtomicBool>,
    link: Arc<Mutex<LinkState>>,
    store: Arc<AreaStateStore>,
    buffer: IngestBuffer,
    decoder: ChunkDecoder,
    journal: Option<BufWriter<File>>,
}

impl ReadLoop {
    fn run(mut self) {
        debug!("Read loop started");

        while self.running.load(Ordering::SeqCst) {
            let chunk = {
                let mut guard = lock(&self.source);
                match guard.as_mut() {
                    Some(source) => source.read_chunk(),
                    None => {
                        debug!("Port closed underneath the read loop");
                        break;
                    }
                }
            };

            match chunk {
                Ok(Some(bytes)) => {
                    match self.decoder.decode(&bytes) {
                        Ok(text) => self.buffer.push(&text),
                        Err(e) => warn!("{}", e.report()),
                    }
                    self.dispatch(false);
                }
                Ok(None) => self.dispatch(true),
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    self.dispatch(true);
                    info!("End of stream");
                    set_link(&self.link, LinkState::Finished);
                    break;
                }
                Err(e) => {
                    self.dispatch(true);
                    error!("{}", IngestError::Read(e).report());
                    set_link(&self.link, LinkState::Failed);
                    break;
                }
            }
        }

        // A number held back by the last read is complete once reading stops
        self.dispatch(true);

        if self.buffer.trimmed() > 0 {
            warn!(
                "Buffer limit dropped {} bytes of unmatched text this session",
                self.buffer.trimmed()
            );
        }
        if !self.buffer.is_empty() {
            debug!("Discarding {} bytes of unmatched text", self.buffer.len());
        }

        {
            let mut link = lock(&self.link);
            if *link == LinkState::Running {
                *link = LinkState::Stopped;
            }
        }

        close_source(&self.source);
        debug!("Read loop exited");
    }

    fn dispatch(&mut self, at_rest: bool) {
        for event in self.buffer.scan(at_rest) {
            let changed = self.store.apply_event(event);
            if changed {
                info!("{}", event);
            } else {
                debug!("{} (no change)", event);
            }
            self.record(event);
        }
    }

    fn record(&mut self, event: AreaEvent) {
        let Some(ref mut writer) = self.journal else {
            return;
        };

        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let written = writeln!(writer, "[{}] {}", timestamp, event).and_then(|_| writer.flush());
        if let Err(e) = written {
            warn!("Event journal write failed, disabling journal: {}", e);
            self.journal = None;
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn set_link(link: &Mutex<LinkState>, state: LinkState) {
    *lock(link) = state;
}

fn close_source(source: &SharedSource) {
    let mut guard = lock(source);
    if let Some(mut port) = guard.take() {
        match port.close() {
            Ok(()) => info!("Serial connection closed: {}", port.name()),
            Err(e) => warn!("{}", IngestError::Close(e).report()),
        }
    }
}
