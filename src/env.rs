use std::sync::Arc;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use vlogs_export::download::DownloadEvent;

pub enum Message {
    // Invalidate the current frame and request a redraw
    Invalidate,
    DownloadFinished(DownloadEvent),
}

pub struct Env {
    tx: Arc<EnvTx>,
    rx: UnboundedReceiver<Message>,
}

struct EnvTx {
    tx: UnboundedSender<Message>,
}

impl EnvTx {
    fn new(tx: UnboundedSender<Message>) -> Self {
        EnvTx { tx }
    }

    fn send(&self, msg: Message) {
        let _ = self.tx.send(msg);
    }
}

impl crate::widgets::Env for EnvTx {
    fn invalidate(&self) {
        self.send(Message::Invalidate);
    }

    fn download_finished(&self, event: DownloadEvent) {
        self.send(Message::DownloadFinished(event));
    }
}

impl Env {
    pub fn new() -> Self {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Message>();
        Env {
            tx: Arc::new(EnvTx::new(tx)),
            rx,
        }
    }

    pub fn tx(&self) -> crate::widgets::EnvHandle {
        self.tx.clone()
    }

    pub fn rx(&mut self) -> &mut UnboundedReceiver<Message> {
        &mut self.rx
    }
}
