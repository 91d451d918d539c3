//! Lifecycle of the local networking node that backs the live document
//! store: endpoint, gossip, blob store, docs sync engine, and the protocol
//! router tying them together.

use std::path::PathBuf;

use anyhow::Result;
pub use iroh::NodeId;
use iroh::{protocol::Router, SecretKey};
use iroh_blobs::net_protocol::Blobs;
use iroh_blobs::rpc::{client::blobs, proto as blobs_proto};
use iroh_docs::protocol::Docs;
use iroh_docs::rpc::{client::docs, proto as docs_proto};
use iroh_gossip::net::{Gossip, GOSSIP_ALPN};
use quic_rpc::transport::flume::FlumeConnector;
use tracing::{info, warn};

pub type BlobsRPCConnector = FlumeConnector<blobs_proto::Response, blobs_proto::Request>;

pub type DocsRPCConnector = FlumeConnector<docs_proto::Response, docs_proto::Request>;

pub type BlobsClient = blobs::Client<BlobsRPCConnector>;

pub type DocsClient = docs::Client<DocsRPCConnector>;

/// The local node. Owns the endpoint and the sync/blob engines; hands out
/// RPC clients for document access.
pub struct ChatNode {
    router: Router,
    blobs: BlobsClient,
    docs: DocsClient,
}

impl ChatNode {
    /// Spawn the node, persisting blob and document data under `data_root`.
    ///
    /// Pass a stored secret key to keep a stable node identity across runs.
    pub async fn spawn(secret_key: Option<SecretKey>, data_root: PathBuf) -> Result<Self> {
        let secret_key = secret_key.unwrap_or_else(|| SecretKey::generate(rand::rngs::OsRng));
        let endpoint = iroh::Endpoint::builder()
            .secret_key(secret_key)
            .discovery_n0()
            .alpns(vec![
                GOSSIP_ALPN.to_vec(),
                iroh_blobs::ALPN.to_vec(),
                iroh_docs::ALPN.to_vec(),
            ])
            .bind()
            .await?;

        let node_id = endpoint.node_id();
        info!("endpoint bound");
        info!("node id: {node_id:#?}");

        let blobs = Blobs::persistent(&data_root).await?.build(&endpoint);
        let gossip = Gossip::builder().spawn(endpoint.clone()).await?;
        let docs = Docs::persistent(data_root).spawn(&blobs, &gossip).await?;
        info!("docs engine spawned");

        let router = Router::builder(endpoint)
            .accept(GOSSIP_ALPN, gossip.clone())
            .accept(iroh_blobs::ALPN, blobs.clone())
            .accept(iroh_docs::ALPN, docs.clone())
            .spawn();
        info!("router spawned");

        Ok(Self {
            router,
            blobs: blobs.client().clone(),
            docs: docs.client().clone(),
        })
    }

    /// Returns the node id of this node.
    pub fn node_id(&self) -> NodeId {
        self.router.endpoint().node_id()
    }

    /// Document RPC client.
    pub fn docs(&self) -> &DocsClient {
        &self.docs
    }

    /// Blob RPC client.
    pub fn blobs(&self) -> &BlobsClient {
        &self.blobs
    }

    pub async fn shutdown(&self) {
        if let Err(err) = self.router.shutdown().await {
            warn!("failed to shutdown router cleanly: {err}");
        }
        self.router.endpoint().close().await;
    }
}
