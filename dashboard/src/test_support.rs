//! Scripted chain and wallet doubles for the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy::primitives::{address, Address, TxHash, B256, U256};
use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::{
    asset_registry::{Asset, NetworkDescriptor},
    blockchain_manager::{LendingChain, RawBorrowingPower, RawPosition},
    errors::DashboardError,
    session_manager::{WalletBridge, WalletEvent},
};

pub(crate) const ACCOUNT: Address = address!("00000000000000000000000000000000000000aa");
pub(crate) const OTHER_ACCOUNT: Address = address!("00000000000000000000000000000000000000bb");
pub(crate) const POOL: Address = address!("00000000000000000000000000000000000000cc");

pub(crate) fn usdt_address() -> Address {
    address!("40918ba7f132e0acba2ce4de4c4baf9bd2d7d849")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteKind {
    Approve,
    Supply,
    Withdraw,
    Borrow,
    Repay,
}

#[derive(Debug, Clone)]
pub(crate) struct WriteCall {
    pub kind: WriteKind,
    pub target: Address,
    pub amount: U256,
    pub native_value: bool,
    pub tx_hash: TxHash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChainEvent {
    Submitted(TxHash),
    Confirmed(TxHash),
}

/// In-memory [`LendingChain`] double with per-operation failure injection and
/// an ordered submit/confirm log.
pub(crate) struct MockChain {
    native_balance: Mutex<U256>,
    token_balances: Mutex<HashMap<Address, U256>>,
    allowances: Mutex<HashMap<Address, U256>>,
    positions: Mutex<HashMap<Address, RawPosition>>,
    prices: Mutex<HashMap<Address, U256>>,
    health_factor: Mutex<U256>,
    borrowing_power: Mutex<RawBorrowingPower>,

    failing_prices: Mutex<HashSet<Address>>,
    failing_balances: Mutex<HashSet<Address>>,
    health_factor_fails: Mutex<bool>,
    write_failure: Mutex<Option<String>>,

    allowance_reads: AtomicUsize,
    next_hash: AtomicUsize,
    writes: Mutex<Vec<WriteCall>>,
    events: Mutex<Vec<ChainEvent>>,

    /// Held by tests to keep reads in flight.
    pub read_gate: Arc<tokio::sync::Mutex<()>>,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            native_balance: Mutex::new(U256::ZERO),
            token_balances: Mutex::new(HashMap::new()),
            allowances: Mutex::new(HashMap::new()),
            positions: Mutex::new(HashMap::new()),
            prices: Mutex::new(HashMap::new()),
            health_factor: Mutex::new(U256::MAX),
            borrowing_power: Mutex::new(RawBorrowingPower::default()),
            failing_prices: Mutex::new(HashSet::new()),
            failing_balances: Mutex::new(HashSet::new()),
            health_factor_fails: Mutex::new(false),
            write_failure: Mutex::new(None),
            allowance_reads: AtomicUsize::new(0),
            next_hash: AtomicUsize::new(1),
            writes: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            read_gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn set_native_balance(&self, balance: U256) {
        *self.native_balance.lock().unwrap() = balance;
    }

    pub fn set_token_balance(&self, token: Address, balance: U256) {
        self.token_balances.lock().unwrap().insert(token, balance);
    }

    pub fn set_allowance(&self, token: Address, allowance: U256) {
        self.allowances.lock().unwrap().insert(token, allowance);
    }

    pub fn set_position(&self, asset: Address, supplied: U256, borrowed: U256) {
        self.positions
            .lock()
            .unwrap()
            .insert(asset, RawPosition { supplied, borrowed });
    }

    pub fn set_price(&self, asset: Address, price: U256) {
        self.prices.lock().unwrap().insert(asset, price);
    }

    pub fn set_health_factor(&self, raw: U256) {
        *self.health_factor.lock().unwrap() = raw;
    }

    pub fn set_borrowing_power(&self, power: U256, borrows: U256) {
        *self.borrowing_power.lock().unwrap() = RawBorrowingPower { power, borrows };
    }

    pub fn fail_price(&self, asset: Address) {
        self.failing_prices.lock().unwrap().insert(asset);
    }

    pub fn fail_balance(&self, token: Address) {
        self.failing_balances.lock().unwrap().insert(token);
    }

    pub fn fail_health_factor(&self) {
        *self.health_factor_fails.lock().unwrap() = true;
    }

    pub fn fail_writes(&self, reason: &str) {
        *self.write_failure.lock().unwrap() = Some(reason.to_string());
    }

    pub fn writes(&self) -> Vec<WriteCall> {
        self.writes.lock().unwrap().clone()
    }

    pub fn allowance_reads(&self) -> usize {
        self.allowance_reads.load(Ordering::SeqCst)
    }

    /// Whether `confirmed` was confirmed before `submitted` was submitted.
    pub fn confirmed_before_submit(&self, confirmed: TxHash, submitted: TxHash) -> bool {
        let events = self.events.lock().unwrap();
        let confirm_index = events
            .iter()
            .position(|e| *e == ChainEvent::Confirmed(confirmed));
        let submit_index = events
            .iter()
            .position(|e| *e == ChainEvent::Submitted(submitted));
        matches!((confirm_index, submit_index), (Some(c), Some(s)) if c < s)
    }

    async fn pass_gate(&self) {
        let _gate = self.read_gate.lock().await;
    }

    fn submit(
        &self,
        kind: WriteKind,
        target: Address,
        amount: U256,
        native_value: bool,
    ) -> Result<TxHash, DashboardError> {
        let tx_hash = B256::from(U256::from(self.next_hash.fetch_add(1, Ordering::SeqCst)));
        self.writes.lock().unwrap().push(WriteCall {
            kind,
            target,
            amount,
            native_value,
            tx_hash,
        });
        if let Some(reason) = self.write_failure.lock().unwrap().clone() {
            return Err(DashboardError::ChainWrite(reason));
        }
        self.events.lock().unwrap().push(ChainEvent::Submitted(tx_hash));
        Ok(tx_hash)
    }
}

#[async_trait]
impl LendingChain for MockChain {
    async fn native_balance(&self, _account: Address) -> Result<U256, DashboardError> {
        self.pass_gate().await;
        Ok(*self.native_balance.lock().unwrap())
    }

    async fn token_balance(
        &self,
        token: Address,
        _account: Address,
    ) -> Result<U256, DashboardError> {
        self.pass_gate().await;
        if self.failing_balances.lock().unwrap().contains(&token) {
            return Err(DashboardError::ChainRead("balance read failed".to_string()));
        }
        Ok(self
            .token_balances
            .lock()
            .unwrap()
            .get(&token)
            .copied()
            .unwrap_or(U256::ZERO))
    }

    async fn token_allowance(
        &self,
        token: Address,
        _owner: Address,
        _spender: Address,
    ) -> Result<U256, DashboardError> {
        self.pass_gate().await;
        self.allowance_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .allowances
            .lock()
            .unwrap()
            .get(&token)
            .copied()
            .unwrap_or(U256::ZERO))
    }

    async fn user_position(
        &self,
        _account: Address,
        asset: Address,
    ) -> Result<RawPosition, DashboardError> {
        self.pass_gate().await;
        Ok(self
            .positions
            .lock()
            .unwrap()
            .get(&asset)
            .copied()
            .unwrap_or_default())
    }

    async fn asset_price(&self, asset: Address) -> Result<U256, DashboardError> {
        self.pass_gate().await;
        if self.failing_prices.lock().unwrap().contains(&asset) {
            return Err(DashboardError::ChainRead("oracle read failed".to_string()));
        }
        Ok(self
            .prices
            .lock()
            .unwrap()
            .get(&asset)
            .copied()
            .unwrap_or(U256::ZERO))
    }

    async fn health_factor(&self, _account: Address) -> Result<U256, DashboardError> {
        self.pass_gate().await;
        if *self.health_factor_fails.lock().unwrap() {
            return Err(DashboardError::ChainRead(
                "health factor read failed".to_string(),
            ));
        }
        Ok(*self.health_factor.lock().unwrap())
    }

    async fn borrowing_power(
        &self,
        _account: Address,
    ) -> Result<RawBorrowingPower, DashboardError> {
        self.pass_gate().await;
        Ok(*self.borrowing_power.lock().unwrap())
    }

    async fn approve(
        &self,
        token: Address,
        _spender: Address,
        amount: U256,
    ) -> Result<TxHash, DashboardError> {
        self.submit(WriteKind::Approve, token, amount, false)
    }

    async fn supply(&self, asset: &Asset, amount: U256) -> Result<TxHash, DashboardError> {
        self.submit(WriteKind::Supply, asset.address, amount, asset.native)
    }

    async fn withdraw(&self, asset: &Asset, amount: U256) -> Result<TxHash, DashboardError> {
        self.submit(WriteKind::Withdraw, asset.address, amount, false)
    }

    async fn borrow(&self, asset: &Asset, amount: U256) -> Result<TxHash, DashboardError> {
        self.submit(WriteKind::Borrow, asset.address, amount, false)
    }

    async fn repay(&self, asset: &Asset, amount: U256) -> Result<TxHash, DashboardError> {
        self.submit(WriteKind::Repay, asset.address, amount, asset.native)
    }

    async fn confirm(&self, tx_hash: TxHash) -> Result<(), DashboardError> {
        self.events.lock().unwrap().push(ChainEvent::Confirmed(tx_hash));
        Ok(())
    }
}

/// Scripted [`WalletBridge`] double recording prompts, switches and added
/// networks.
pub(crate) struct MockWallet {
    accounts: Mutex<Vec<Address>>,
    authorized: Mutex<Vec<Address>>,
    chain_id: Mutex<u64>,
    known_chains: Mutex<HashSet<u64>>,
    prompts: AtomicUsize,
    switches: Mutex<Vec<u64>>,
    added: Mutex<Vec<u64>>,
    events_tx: UnboundedSender<WalletEvent>,
    events_rx: Mutex<Option<UnboundedReceiver<WalletEvent>>>,
}

impl MockWallet {
    pub fn new(accounts: Vec<Address>, chain_id: u64) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            accounts: Mutex::new(accounts),
            authorized: Mutex::new(Vec::new()),
            chain_id: Mutex::new(chain_id),
            known_chains: Mutex::new(HashSet::from([chain_id])),
            prompts: AtomicUsize::new(0),
            switches: Mutex::new(Vec::new()),
            added: Mutex::new(Vec::new()),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    pub fn authorize(&self, account: Address) {
        self.authorized.lock().unwrap().push(account);
    }

    pub fn learn_chain(&self, chain_id: u64) {
        self.known_chains.lock().unwrap().insert(chain_id);
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    pub fn switched_to(&self) -> Vec<u64> {
        self.switches.lock().unwrap().clone()
    }

    pub fn added_chains(&self) -> Vec<u64> {
        self.added.lock().unwrap().clone()
    }

    pub fn emit(&self, event: WalletEvent) {
        let _ = self.events_tx.send(event);
    }
}

#[async_trait]
impl WalletBridge for MockWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, DashboardError> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        Ok(self.accounts.lock().unwrap().clone())
    }

    async fn authorized_accounts(&self) -> Result<Vec<Address>, DashboardError> {
        Ok(self.authorized.lock().unwrap().clone())
    }

    async fn chain_id(&self) -> Result<u64, DashboardError> {
        Ok(*self.chain_id.lock().unwrap())
    }

    async fn switch_network(&self, chain_id: u64) -> Result<(), DashboardError> {
        self.switches.lock().unwrap().push(chain_id);
        if !self.known_chains.lock().unwrap().contains(&chain_id) {
            return Err(DashboardError::UnknownNetwork(chain_id));
        }
        *self.chain_id.lock().unwrap() = chain_id;
        Ok(())
    }

    async fn add_network(&self, network: &NetworkDescriptor) -> Result<(), DashboardError> {
        self.added.lock().unwrap().push(network.chain_id);
        self.known_chains.lock().unwrap().insert(network.chain_id);
        Ok(())
    }

    fn subscribe(&self) -> UnboundedReceiver<WalletEvent> {
        self.events_rx
            .lock()
            .unwrap()
            .take()
            .expect("wallet event feed already taken")
    }
}
