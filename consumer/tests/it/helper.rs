use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use ais_consumer::{
    dead_letter::DeadLetterQueue,
    error::{Error, Result},
    models::PositionFrame,
    settings::{
        BackoffSettings, Environment, OrderingSettings, Settings, SourceSettings, StoreKind,
        StoreSettings, Transport, ValidationSettings, WriterSettings,
    },
    source::{FrameSource, FrameStream},
    startup::App,
};
use ais_core::{Metrics, QueryEngine};
use async_trait::async_trait;
use futures::StreamExt;
use memory_store::MemoryAdapter;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

pub struct TestHelper {
    pub store: MemoryAdapter,
    pub metrics: Arc<Metrics>,
    pub queries: QueryEngine,
    pub dead_letters: DeadLetterQueue,
    pub source: SourceControl,
    token: CancellationToken,
    app: Option<JoinHandle<Result<()>>>,
}

enum Connection {
    Refused,
    Open(mpsc::Receiver<Result<String>>),
}

/// Frame source whose connections are handed out by the test.
struct ChannelSource {
    connections: async_channel::Receiver<Connection>,
    attempts: Arc<AtomicUsize>,
}

pub struct SourceControl {
    connections: async_channel::Sender<Connection>,
    attempts: Arc<AtomicUsize>,
}

/// One open connection, dropping it ends the stream.
pub struct Feed {
    out: mpsc::Sender<Result<String>>,
}

#[async_trait]
impl FrameSource for ChannelSource {
    async fn connect(&self) -> Result<FrameStream> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match self.connections.recv().await {
            Ok(Connection::Open(frames)) => Ok(ReceiverStream::new(frames).boxed()),
            Ok(Connection::Refused) | Err(_) => {
                Err(std::io::Error::from(std::io::ErrorKind::ConnectionRefused).into())
            }
        }
    }

    fn endpoint(&self) -> &str {
        "test://frames"
    }
}

impl SourceControl {
    pub async fn connect(&self) -> Feed {
        let (out, frames) = mpsc::channel(100);
        self.connections
            .send(Connection::Open(frames))
            .await
            .unwrap();
        Feed { out }
    }

    pub async fn refuse(&self) {
        self.connections.send(Connection::Refused).await.unwrap();
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Feed {
    pub async fn send(&self, frame: &PositionFrame) {
        self.send_line(&frame.to_line()).await
    }

    pub async fn send_line(&self, line: &str) {
        self.out.send(Ok(line.to_string())).await.unwrap();
    }

    pub async fn send_error(&self, error: Error) {
        self.out.send(Err(error)).await.unwrap();
    }
}

impl TestHelper {
    /// Cancels the pipeline and waits for it to drain.
    pub async fn shutdown(&mut self) {
        self.token.cancel();
        if let Some(app) = self.app.take() {
            tokio::time::timeout(Duration::from_secs(10), app)
                .await
                .expect("pipeline did not shut down")
                .unwrap()
                .unwrap();
        }
    }

    pub async fn wait_for(&self, what: &str, condition: impl Fn(&TestHelper) -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        while !condition(self) {
            if tokio::time::Instant::now() > deadline {
                panic!("timed out waiting for {what}, metrics: {:#?}", self.metrics.snapshot());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

pub fn test_settings() -> Settings {
    Settings {
        environment: Environment::Test,
        log_level: "info".into(),
        store: StoreSettings {
            kind: StoreKind::Memory,
            postgres: None,
        },
        source: SourceSettings {
            transport: Transport::Http,
            url: "http://127.0.0.1/frames".into(),
            backoff: BackoffSettings {
                min_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(50),
            },
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(5),
            max_frame_length: 4096,
        },
        validation: ValidationSettings::default(),
        ordering: OrderingSettings {
            num_shards: 4,
            window_size: 8,
            max_delay: Duration::from_millis(100),
            dedup_horizon: Duration::from_secs(600),
            vessel_idle_timeout: Duration::from_secs(3600),
            sweep_interval: Duration::from_millis(20),
        },
        writer: WriterSettings {
            batch_size: 50,
            flush_interval: Duration::from_millis(50),
            max_attempts: 3,
            retry_min_delay: Duration::from_millis(10),
            retry_max_delay: Duration::from_millis(20),
            store_timeout: Duration::from_secs(5),
            dead_letter_capacity: 16,
            dead_letter_path: None,
        },
        channel_capacity: 100,
        quality_report_interval: Duration::from_secs(3600),
    }
}

pub async fn test<T, Fut>(test_closure: T)
where
    T: FnOnce(TestHelper) -> Fut,
    Fut: Future<Output = ()>,
{
    test_with_settings(|_| {}, test_closure).await
}

pub async fn test_with_settings<S, T, Fut>(modify: S, test_closure: T)
where
    S: FnOnce(&mut Settings),
    T: FnOnce(TestHelper) -> Fut,
    Fut: Future<Output = ()>,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();

    let mut settings = test_settings();
    modify(&mut settings);
    settings.validate().unwrap();

    let store = MemoryAdapter::new();
    let (connections, connection_receiver) = async_channel::unbounded();
    let attempts = Arc::new(AtomicUsize::new(0));
    let source = ChannelSource {
        connections: connection_receiver,
        attempts: attempts.clone(),
    };

    let app = App::from_parts(
        &settings,
        Arc::new(source),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
    );

    let helper = TestHelper {
        store,
        metrics: app.metrics(),
        queries: app.query_engine(),
        dead_letters: app.dead_letters(),
        source: SourceControl {
            connections,
            attempts,
        },
        token: app.cancellation_token(),
        app: Some(tokio::spawn(app.run())),
    };

    test_closure(helper).await;
}
