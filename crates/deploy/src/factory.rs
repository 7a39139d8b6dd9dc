//! Contract factory: turns an artifact and constructor arguments into an on-chain contract.

use std::{sync::Arc, time::Duration};

use alloy_core::primitives::{Address, B256, Bytes, U64};
use anyhow::Context;
use backon::{ConstantBuilder, Retryable};
use futures::future::BoxFuture;
use serde::Deserialize;
use url::Url;

use crate::{ArtifactSource, DeployResult, rpc};

/// Default maximum time to wait for a deployment receipt.
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default interval between receipt polls.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A request to deploy one contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRequest {
    /// Name of the contract artifact.
    pub contract: String,
    /// Account sending the creation transaction.
    pub from: Address,
    /// Constructor arguments.
    pub args: Vec<Address>,
}

impl DeployRequest {
    pub fn new(contract: impl Into<String>, from: Address) -> Self {
        Self {
            contract: contract.into(),
            from,
            args: Vec::new(),
        }
    }

    /// Append an address constructor argument.
    pub fn arg(mut self, arg: Address) -> Self {
        self.args.push(arg);
        self
    }

    /// Creation calldata: bytecode followed by the ABI-encoded arguments.
    pub fn calldata(&self, bytecode: &Bytes) -> Bytes {
        let mut data = bytecode.to_vec();
        for arg in &self.args {
            data.extend_from_slice(arg.into_word().as_slice());
        }
        data.into()
    }
}

/// Deploys contracts on chain.
pub trait ContractFactory: Send + Sync {
    fn deploy_contract(&self, request: DeployRequest) -> BoxFuture<'_, anyhow::Result<DeployResult>>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionReceipt {
    transaction_hash: B256,
    contract_address: Option<Address>,
    block_number: U64,
    #[serde(default)]
    status: Option<U64>,
}

/// Deploys contracts through `eth_sendTransaction` on a node holding unlocked accounts.
#[derive(Clone)]
pub struct RpcContractFactory {
    client: reqwest::Client,
    url: Url,
    artifacts: Arc<dyn ArtifactSource>,
    receipt_timeout: Duration,
    poll_interval: Duration,
}

impl RpcContractFactory {
    pub fn new(client: reqwest::Client, url: Url, artifacts: Arc<dyn ArtifactSource>) -> Self {
        Self {
            client,
            url,
            artifacts,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set the maximum time to wait for the creation receipt.
    pub fn receipt_timeout(mut self, timeout: Duration) -> Self {
        self.receipt_timeout = timeout;
        self
    }

    /// Set the interval between receipt polls.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn max_polls(&self) -> usize {
        let interval = self.poll_interval.as_millis().max(1);
        usize::try_from(self.receipt_timeout.as_millis() / interval)
            .unwrap_or(usize::MAX)
            .max(1)
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> anyhow::Result<TransactionReceipt> {
        let poll = move || async move {
            rpc::json_rpc_call::<Option<TransactionReceipt>>(
                &self.client,
                &self.url,
                "eth_getTransactionReceipt",
                vec![serde_json::json!(tx_hash)],
            )
            .await?
            .with_context(|| format!("Receipt for {} is not available yet", tx_hash))
        };

        poll.retry(
            ConstantBuilder::default()
                .with_delay(self.poll_interval)
                .with_max_times(self.max_polls()),
        )
        .notify(|err, _| tracing::trace!(err = %err, "Waiting for receipt"))
        .await
        .with_context(|| {
            format!(
                "Timeout waiting {}s for the receipt of {}",
                self.receipt_timeout.as_secs(),
                tx_hash
            )
        })
    }

    async fn deploy(&self, request: DeployRequest) -> anyhow::Result<DeployResult> {
        let artifact = self.artifacts.artifact(&request.contract)?;

        tracing::info!(
            contract = %request.contract,
            from = %request.from,
            args = ?request.args,
            "Sending creation transaction"
        );

        let tx = serde_json::json!({
            "from": request.from,
            "data": request.calldata(&artifact.bytecode),
        });
        let tx_hash: B256 = rpc::json_rpc_call(&self.client, &self.url, "eth_sendTransaction", vec![tx])
            .await
            .with_context(|| format!("Failed to send creation transaction of {}", request.contract))?;

        let receipt = self.wait_for_receipt(tx_hash).await?;

        if receipt.status.is_some_and(|status| status.is_zero()) {
            anyhow::bail!(
                "Creation transaction {} of {} reverted",
                receipt.transaction_hash,
                request.contract
            );
        }

        let address = receipt.contract_address.with_context(|| {
            format!(
                "Receipt of {} has no contract address",
                receipt.transaction_hash
            )
        })?;

        Ok(DeployResult {
            contract_name: artifact.contract_name,
            address,
            transaction_hash: receipt.transaction_hash,
            artifact: request.contract,
            block_number: receipt.block_number.to::<u64>(),
        })
    }
}

impl ContractFactory for RpcContractFactory {
    fn deploy_contract(&self, request: DeployRequest) -> BoxFuture<'_, anyhow::Result<DeployResult>> {
        Box::pin(self.deploy(request))
    }
}

#[cfg(test)]
mod tests {
    use alloy_core::primitives::address;

    use super::*;
    use crate::InMemoryArtifacts;

    const DEPLOYER: Address = address!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266");
    const TOKEN: Address = address!("5fbdb2315678afecb367f032d93f642f64180aa3");

    #[test]
    fn test_calldata_appends_padded_arguments() {
        let request = DeployRequest::new("Staking", DEPLOYER).arg(TOKEN).arg(TOKEN);
        let bytecode = Bytes::from(vec![0x60, 0x80]);

        let data = request.calldata(&bytecode);

        assert_eq!(data.len(), 2 + 2 * 32);
        assert_eq!(&data[..2], &[0x60, 0x80]);
        assert_eq!(&data[2..14], &[0u8; 12]);
        assert_eq!(&data[14..34], TOKEN.as_slice());
        assert_eq!(&data[34..66], &data[2..34]);
    }

    #[test]
    fn test_calldata_without_arguments_is_bytecode() {
        let request = DeployRequest::new("RewardToken", DEPLOYER);
        let bytecode = Bytes::from(vec![0x60, 0x80, 0x60, 0x40]);

        assert_eq!(request.calldata(&bytecode), bytecode);
    }

    #[test]
    fn test_receipt_deserializes_hex_quantities() {
        let receipt: TransactionReceipt = serde_json::from_value(serde_json::json!({
            "transactionHash": "0x0000000000000000000000000000000000000000000000000000000000000001",
            "contractAddress": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
            "blockNumber": "0x1b4",
            "status": "0x1",
            "gasUsed": "0x5208"
        }))
        .unwrap();

        assert_eq!(receipt.block_number.to::<u64>(), 436);
        assert_eq!(receipt.contract_address, Some(TOKEN));
        assert!(!receipt.status.unwrap().is_zero());
    }

    #[test]
    fn test_poll_budget_follows_timeout() {
        let factory = RpcContractFactory::new(
            reqwest::Client::new(),
            Url::parse("http://127.0.0.1:8545").unwrap(),
            Arc::new(InMemoryArtifacts::new()),
        )
        .receipt_timeout(Duration::from_secs(30))
        .poll_interval(Duration::from_millis(500));

        assert_eq!(factory.max_polls(), 60);
    }
}
