use std::{sync::Arc, time::Duration};

use mongodb::{Client, Collection, Database, bson::doc, options::ClientOptions};
use tokio::{sync::RwLock, time::sleep};

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
};

struct RetryPolicy;

impl RetryPolicy {
    const MAX_ATTEMPTS: u32 = 10;
    const INITIAL_DELAY_MS: u64 = 250;

    fn initial_delay() -> Duration {
        Duration::from_millis(Self::INITIAL_DELAY_MS)
    }

    fn next_delay(current: Duration) -> Duration {
        (current * 2).min(Duration::from_secs(5))
    }
}

/// Shared, swappable MongoDB client used by both the session store and the catalog.
#[derive(Clone)]
pub(super) struct MongoHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoHandle {
    pub(super) async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;
        Ok(Self {
            inner: Arc::new(HandleInner {
                state: RwLock::new(MongoState { client, database }),
                config,
            }),
        })
    }

    pub(super) async fn client(&self) -> Client {
        self.inner.state.read().await.client.clone()
    }

    pub(super) async fn database(&self) -> Database {
        self.inner.state.read().await.database.clone()
    }

    pub(super) async fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.inner.state.read().await.database.collection::<T>(name)
    }

    pub(super) async fn ping(&self) -> MongoResult<()> {
        let database = self.database().await;
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    pub(super) async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.inner.config.options, &self.inner.config.database_name)
                .await?;
        let mut guard = self.inner.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

async fn establish_connection(
    options: &ClientOptions,
    database_name: &str,
) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(database_name);

    let mut attempts = 0;
    let mut delay = RetryPolicy::initial_delay();

    loop {
        match database.run_command(doc! { "ping": 1 }).await {
            Ok(_) => break,
            Err(err) => {
                attempts += 1;
                if attempts >= RetryPolicy::MAX_ATTEMPTS {
                    return Err(MongoDaoError::InitialPing {
                        attempts,
                        source: err,
                    });
                }
                sleep(delay).await;
                delay = RetryPolicy::next_delay(delay);
            }
        }
    }

    Ok((client, database))
}
