//! Sound recorder task
//!
//! The recorder owns the captured bytes. Callers drive it through a command
//! channel and only ever receive the finished [`SoundRecord`]; the raw chunk
//! stream stays inside the task.
//!
//! States: `Idle -> Recording -> Stopped`. `Stop` hands the record back
//! through a oneshot; `Cancel` drops the buffer and ends in `Stopped` with no
//! record. A stopped recorder can start a fresh recording.

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};

use super::data_uri;
use crate::error::{DwdyError, Result};
use crate::models::{SoundDraft, UploadFile};

/// Encoding of the captured stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFormat {
    pub mime_type: String,
    /// Bytes produced per second of audio
    pub bytes_per_second: u32,
}

impl AudioFormat {
    pub fn new(mime_type: impl Into<String>, bytes_per_second: u32) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes_per_second,
        }
    }
}

/// Recorder state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
    Stopped,
}

/// A finished recording
#[derive(Debug, Clone, PartialEq)]
pub struct SoundRecord {
    pub data_url: String,
    /// Seconds
    pub duration: f64,
    pub blob: Vec<u8>,
    pub mime_type: String,
}

impl SoundRecord {
    /// Package the record as a draft for `Journal::add_content`
    pub fn into_draft(self, file_name: impl Into<String>) -> SoundDraft {
        SoundDraft {
            file: UploadFile::new(file_name, self.mime_type, self.blob),
            duration: self.duration,
        }
    }
}

/// Commands sent to the recorder task
#[derive(Debug)]
pub enum RecorderCommand {
    /// Begin a new recording, discarding any previous buffer
    Start,
    /// Finish the recording and send back the record
    Stop(oneshot::Sender<Result<SoundRecord>>),
    /// Discard the recording
    Cancel,
    /// End the task
    Shutdown,
}

/// Handle to control a recorder task
pub struct RecorderHandle {
    /// Send commands to the recorder task
    pub command_tx: mpsc::Sender<RecorderCommand>,
    /// Watch the recorder state
    pub state_rx: watch::Receiver<RecorderState>,
}

impl RecorderHandle {
    pub async fn start(&self) -> Result<()> {
        self.send(RecorderCommand::Start).await
    }

    /// Stop recording and wait for the finished record
    pub async fn stop(&self) -> Result<SoundRecord> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RecorderCommand::Stop(reply_tx)).await?;
        reply_rx
            .await
            .map_err(|_| DwdyError::Worker("recorder dropped the stop reply".into()))?
    }

    pub async fn cancel(&self) -> Result<()> {
        self.send(RecorderCommand::Cancel).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(RecorderCommand::Shutdown).await
    }

    pub fn state(&self) -> RecorderState {
        *self.state_rx.borrow()
    }

    async fn send(&self, command: RecorderCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| DwdyError::Worker("recorder task has exited".into()))
    }
}

/// Spawn a recorder reading captured chunks from `chunk_rx`
///
/// Chunks that arrive while not recording are dropped.
pub fn spawn_recorder(format: AudioFormat, chunk_rx: mpsc::Receiver<Vec<u8>>) -> RecorderHandle {
    let (command_tx, command_rx) = mpsc::channel(16);
    let (state_tx, state_rx) = watch::channel(RecorderState::Idle);

    tokio::spawn(recorder_loop(format, command_rx, chunk_rx, state_tx));

    RecorderHandle {
        command_tx,
        state_rx,
    }
}

async fn recorder_loop(
    format: AudioFormat,
    mut command_rx: mpsc::Receiver<RecorderCommand>,
    mut chunk_rx: mpsc::Receiver<Vec<u8>>,
    state_tx: watch::Sender<RecorderState>,
) {
    let mut state = RecorderState::Idle;
    let mut buffer: Vec<u8> = Vec::new();
    let mut source_open = true;

    loop {
        tokio::select! {
            // Commands first, so a stop sees every chunk queued before it
            biased;

            cmd = command_rx.recv() => {
                match cmd {
                    Some(RecorderCommand::Start) => {
                        if state == RecorderState::Recording {
                            warn!("Recorder already recording; ignoring start");
                            continue;
                        }
                        buffer.clear();
                        state = RecorderState::Recording;
                    }
                    Some(RecorderCommand::Stop(reply)) => {
                        if state != RecorderState::Recording {
                            let _ = reply.send(Err(DwdyError::Worker("recorder is not recording".into())));
                            continue;
                        }
                        // Take whatever the source delivered before the stop
                        while let Ok(chunk) = chunk_rx.try_recv() {
                            buffer.extend_from_slice(&chunk);
                        }
                        state = RecorderState::Stopped;
                        let _ = state_tx.send(state);
                        let _ = reply.send(finish(&format, std::mem::take(&mut buffer)));
                    }
                    Some(RecorderCommand::Cancel) => {
                        while chunk_rx.try_recv().is_ok() {}
                        debug!("Recording cancelled; discarding {} bytes", buffer.len());
                        buffer.clear();
                        state = RecorderState::Stopped;
                    }
                    Some(RecorderCommand::Shutdown) | None => break,
                }
                let _ = state_tx.send(state);
            }
            chunk = chunk_rx.recv(), if source_open => {
                match chunk {
                    Some(chunk) if state == RecorderState::Recording => buffer.extend_from_slice(&chunk),
                    Some(_) => {}
                    None => source_open = false,
                }
            }
        }
    }
}

fn finish(format: &AudioFormat, blob: Vec<u8>) -> Result<SoundRecord> {
    if format.bytes_per_second == 0 {
        return Err(DwdyError::invalid("audio byte rate must be positive"));
    }

    let duration = blob.len() as f64 / f64::from(format.bytes_per_second);
    debug!("Recording finished: {} bytes, {:.3}s", blob.len(), duration);

    Ok(SoundRecord {
        data_url: data_uri(&format.mime_type, &blob),
        duration,
        blob,
        mime_type: format.mime_type.clone(),
    })
}
