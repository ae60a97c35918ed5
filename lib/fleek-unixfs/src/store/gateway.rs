//! Read-only block store backed by a trustless HTTP gateway.
use std::ops::Deref;

use async_trait::async_trait;
use bytes::Bytes;
use ipld_core::cid::Cid;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use tracing::warn;
use url::Url;

use super::BlockStore;
use crate::dag_pb::Block;
use crate::errors::UnixFsError;
use crate::prefix;

const RAW_BLOCK: &str = "application/vnd.ipld.raw";

/// Fetches blocks as `GET {url}/ipfs/{cid}?format=raw` and verifies them against their CID.
#[derive(Clone, Debug)]
pub struct GatewayBlockStore {
    url: Url,
    client: reqwest::Client,
}

impl Deref for GatewayBlockStore {
    type Target = Url;

    fn deref(&self) -> &Self::Target {
        &self.url
    }
}

impl GatewayBlockStore {
    pub fn new(url: &str) -> Result<Self, UnixFsError> {
        Ok(Self {
            url: Url::parse(url)?,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl BlockStore for GatewayBlockStore {
    async fn get(&self, cid: &Cid) -> Result<Bytes, UnixFsError> {
        let url = self.join(&format!("ipfs/{}?format=raw", cid))?;
        let response = self.client.get(url).header(ACCEPT, RAW_BLOCK).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => return Err(UnixFsError::BlockNotFound(*cid)),
            status if !status.is_success() => {
                warn!("gateway {} answered {status} for {cid}", self.url);
                return Err(UnixFsError::HttpStatus(status));
            },
            _ => {},
        }
        let data = response.bytes().await?;
        prefix::verify(cid, &data)?;
        Ok(data)
    }

    async fn put(&self, _block: Block) -> Result<(), UnixFsError> {
        Err(UnixFsError::ReadOnlyStore)
    }

    async fn has(&self, cid: &Cid) -> Result<bool, UnixFsError> {
        match self.get(cid).await {
            Ok(_) => Ok(true),
            Err(UnixFsError::BlockNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;

    use super::*;
    use crate::prefix::{CidBuilder, Prefix, RAW};

    #[tokio::test]
    async fn test_get() {
        let data = b"gateway block";
        let cid = Prefix::v0().build(RAW, data).unwrap();
        let mock_server = MockServer::start_async().await;

        let mock = mock_server.mock(|when, then| {
            when.method(GET)
                .path(format!("/ipfs/{cid}"))
                .query_param("format", "raw");
            then.status(200)
                .header("content-type", RAW_BLOCK)
                .body(data);
        });

        let store = GatewayBlockStore::new(&mock_server.base_url()).unwrap();
        assert_eq!(store.get(&cid).await.unwrap().as_ref(), data);
        mock.assert();
    }

    #[tokio::test]
    async fn test_get_rejects_wrong_content() {
        let cid = Prefix::v0().build(RAW, b"expected").unwrap();
        let mock_server = MockServer::start_async().await;
        mock_server.mock(|when, then| {
            when.method(GET).path(format!("/ipfs/{cid}"));
            then.status(200).body("something else");
        });

        let store = GatewayBlockStore::new(&mock_server.base_url()).unwrap();
        assert!(matches!(
            store.get(&cid).await,
            Err(UnixFsError::HashMismatch(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_block_and_read_only() {
        let cid = Prefix::v0().build(RAW, b"missing").unwrap();
        let mock_server = MockServer::start_async().await;
        mock_server.mock(|when, then| {
            when.method(GET).path(format!("/ipfs/{cid}"));
            then.status(404);
        });

        let store = GatewayBlockStore::new(&mock_server.base_url()).unwrap();
        assert!(!store.has(&cid).await.unwrap());
        assert!(matches!(
            store.put(Block::new(cid, Bytes::new())).await,
            Err(UnixFsError::ReadOnlyStore)
        ));
    }
}
