use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tokio::time::{timeout, Duration};

use crate::models::HistoricalBuy;
use crate::orders::BuyLedger;
use crate::Result;

/// Redis persistence for the buy ledger.
///
/// Lots live in a hash `buys:{symbol}`, one JSON value per lot id, so a
/// restart resumes with the same unsold inventory the fills left behind.
pub struct BuyStore {
    conn: ConnectionManager,
    key: String,
}

impl BuyStore {
    /// Connect to Redis, e.g. "redis://127.0.0.1:6379".
    pub async fn new(redis_url: &str, symbol: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;

        // 5 second cap on the connection attempt
        let conn = timeout(Duration::from_secs(5), ConnectionManager::new(client))
            .await
            .map_err(|_| "Redis connection timeout after 5 seconds")??;

        tracing::info!("Connected to Redis at {}", redis_url);

        Ok(Self {
            conn,
            key: format!("buys:{}", symbol),
        })
    }

    /// Load all stored lots for the symbol, in no particular order.
    pub async fn load_lots(&mut self) -> Result<Vec<HistoricalBuy>> {
        let raw: Vec<(String, String)> = self.conn.hgetall(&self.key).await?;

        let mut lots = Vec::with_capacity(raw.len());
        for (_, json) in raw {
            lots.push(serde_json::from_str(&json)?);
        }

        tracing::info!("Loaded {} open lots from Redis", lots.len());
        Ok(lots)
    }

    /// Replace the stored lots with the ledger's current contents.
    pub async fn save_ledger(&mut self, ledger: &BuyLedger) -> Result<()> {
        self.conn.del::<_, ()>(&self.key).await?;

        if ledger.is_empty() {
            tracing::debug!("Ledger empty, cleared {}", self.key);
            return Ok(());
        }

        let mut fields = Vec::with_capacity(ledger.len());
        for lot in ledger.lots() {
            fields.push((lot.id.to_string(), serde_json::to_string(lot)?));
        }
        self.conn.hset_multiple::<_, _, _, ()>(&self.key, &fields).await?;

        tracing::debug!("Saved {} lots to {}", fields.len(), self.key);
        Ok(())
    }

    /// Drop every stored lot for the symbol.
    pub async fn clear(&mut self) -> Result<()> {
        self.conn.del::<_, ()>(&self.key).await?;
        Ok(())
    }

    pub async fn count(&mut self) -> Result<usize> {
        let count: usize = self.conn.hlen(&self.key).await?;
        Ok(count)
    }
}
