//! Command flows: account queries and the delegate-signed open/close sequence.
//!
//! Every trade uses a fresh delegate credential:
//! generate -> approve (primary wallet) -> sign actions -> discard.
//! The credential is discarded on success and on every error path.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use alloy::primitives::{Address, U256};
use fundarb_client::{
    ClearinghouseState, ClientResult, ExchangeClient, ExchangeResponse, FundingRate, OrderStatus,
};
use fundarb_core::{format_price, format_size, FormattedPrice, Price, PriceFormatConfig, Size};
use fundarb_signer::{
    BridgeDeposit, DelegateCredential, ExchangeActionSigner, ExchangeNonces, OrderRequest,
    SignedEnvelope, SignerResult, TimeInForce, UsdcPermit, WalletKeys,
};
use fundarb_telemetry::Metrics;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};

/// Asset parameters needed to price and size an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketQuote {
    pub asset_index: u32,
    pub sz_decimals: u32,
    pub mid: Price,
}

/// Outcome of an open/close command.
#[derive(Debug, Clone)]
pub struct TradeReport {
    pub coin: String,
    /// Delegate that signed the order (already discarded).
    pub delegate: Address,
    pub order: OrderRequest,
    pub statuses: Vec<OrderStatus>,
}

impl TradeReport {
    /// First per-order error in an otherwise accepted request.
    pub fn order_error(&self) -> Option<&str> {
        self.statuses.iter().find_map(|status| match status {
            OrderStatus::Error(msg) => Some(msg.as_str()),
            _ => None,
        })
    }
}

/// Bridge permits expire an hour after signing.
pub const BRIDGE_PERMIT_TTL_SECS: i64 = 60 * 60;

/// Short limit order at `mid * (1 - slippage)` sized `usd / mid`.
///
/// # Errors
/// Fails when the mid is not positive or the size rounds to zero.
pub fn plan_open(
    quote: &MarketQuote,
    usd: Decimal,
    slippage_bps: Decimal,
    price_format: &PriceFormatConfig,
) -> AppResult<OrderRequest> {
    let size = Size::from_notional(usd, quote.mid)?;
    let limit = quote.mid.with_slippage_bps(slippage_bps, false);
    build_order(quote, false, limit, size, false, price_format)
}

/// Reduce-only buy at `mid * (1 + slippage)`.
pub fn plan_close(
    quote: &MarketQuote,
    size: Size,
    slippage_bps: Decimal,
    price_format: &PriceFormatConfig,
) -> AppResult<OrderRequest> {
    let limit = quote.mid.with_slippage_bps(slippage_bps, true);
    build_order(quote, true, limit, size, true, price_format)
}

fn build_order(
    quote: &MarketQuote,
    is_buy: bool,
    limit: Price,
    size: Size,
    reduce_only: bool,
    price_format: &PriceFormatConfig,
) -> AppResult<OrderRequest> {
    let size_text = format_size(size, quote.sz_decimals);
    let rounded: Size = size_text.parse()?;
    if !rounded.inner().is_sign_positive() || rounded.is_zero() {
        return Err(fundarb_core::CoreError::InvalidSize(format!(
            "{size} rounds to {size_text} at {} decimals",
            quote.sz_decimals
        ))
        .into());
    }

    Ok(OrderRequest {
        asset_index: quote.asset_index,
        is_buy,
        limit_price: format_price(limit, quote.sz_decimals, price_format).to_wire(),
        size: size_text,
        reduce_only,
        time_in_force: TimeInForce::Gtc,
    })
}

/// Count a signing attempt.
fn record_signing<T>(kind: &str, result: SignerResult<T>) -> AppResult<T> {
    match result {
        Ok(signed) => {
            Metrics::action_signed(kind);
            Ok(signed)
        }
        Err(e) => {
            Metrics::signing_failed(kind);
            Err(e.into())
        }
    }
}

/// Count an info request.
fn record_info<T>(started: Instant, result: ClientResult<T>) -> AppResult<T> {
    Metrics::exchange_latency("info", started.elapsed().as_secs_f64() * 1000.0);
    let outcome = if result.is_ok() { "ok" } else { "error" };
    Metrics::exchange_request("info", outcome);
    Ok(result?)
}

/// Main application.
pub struct Application {
    config: AppConfig,
    client: ExchangeClient,
    nonces: Arc<ExchangeNonces>,
}

impl Application {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let client = ExchangeClient::new(config.api_url())?;
        Ok(Self {
            config,
            client,
            nonces: Arc::new(ExchangeNonces::with_system_clock()),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Apply the configured precision rules to `price`.
    pub fn format_price(&self, price: Price, sz_decimals: u32) -> FormattedPrice {
        format_price(price, sz_decimals, &self.config.price_format)
    }

    pub async fn mids(&self) -> AppResult<HashMap<String, Decimal>> {
        let started = Instant::now();
        record_info(started, self.client.all_mids().await)
    }

    /// Account state for `user`, or the configured `user_address`.
    pub async fn account(&self, user: Option<&str>) -> AppResult<ClearinghouseState> {
        let user = match user {
            Some(user) => user.to_string(),
            None => self
                .config
                .user_address
                .clone()
                .ok_or_else(|| AppError::Config("no user given and user_address unset".to_string()))?,
        };
        let started = Instant::now();
        record_info(started, self.client.clearinghouse_state(&user).await)
    }

    /// Listed perps by current funding, highest first.
    pub async fn funding(&self, top: usize) -> AppResult<Vec<FundingRate>> {
        let started = Instant::now();
        let response = record_info(started, self.client.meta_and_asset_ctxs().await)?;
        let mut rates = response.funding_rates();
        rates.truncate(top);
        Ok(rates)
    }

    /// Signed `batchedDepositWithPermit` entry moving `usd` USDC from the
    /// wallet into the exchange. `token_nonce` is the token's `nonces(owner)`.
    pub async fn bridge_permit(&self, usd: Decimal, token_nonce: u64) -> AppResult<BridgeDeposit> {
        if !self.config.is_mainnet {
            return Err(AppError::Config(
                "bridge permits target the Arbitrum One bridge; set is_mainnet = true".to_string(),
            ));
        }
        let wallet = self.load_wallet()?;
        let permit = UsdcPermit::for_bridge(
            wallet.address(),
            usd,
            U256::from(token_nonce),
            BRIDGE_PERMIT_TTL_SECS,
        )?;
        let signature = record_signing("permit", permit.sign(wallet.signer()).await)?;
        info!(owner = %wallet.address(), %usd, deadline = permit.deadline, "Bridge permit signed");
        Ok(BridgeDeposit::new(&permit, &signature)?)
    }

    /// Open a short worth `usd` on `coin`.
    pub async fn open_short(
        &self,
        coin: &str,
        usd: Decimal,
        leverage: Option<u32>,
    ) -> AppResult<TradeReport> {
        let wallet = self.load_wallet()?;
        let quote = self.quote(coin).await?;
        let order = plan_open(
            &quote,
            usd,
            self.config.trade.slippage_bps,
            &self.config.price_format,
        )?;
        let signer = self.action_signer()?;
        self.sync_clock(&signer, &wallet).await?;

        let leverage = leverage.unwrap_or(self.config.trade.leverage);
        info!(coin, %usd, leverage, mid = %quote.mid, "Opening short");

        let mut credential = self.new_credential();
        let result = self
            .open_with(&signer, &wallet, &mut credential, &quote, leverage, order)
            .await;
        credential.discard();

        result.map(|(order, statuses)| TradeReport {
            coin: coin.to_string(),
            delegate: credential.address(),
            order,
            statuses,
        })
    }

    /// Buy back `size` of `coin` (reduce-only). Without `size`, closes the
    /// whole short on the trading account (the vault when one is configured).
    pub async fn close_short(&self, coin: &str, size: Option<Size>) -> AppResult<TradeReport> {
        let wallet = self.load_wallet()?;
        let quote = self.quote(coin).await?;
        let signer = self.action_signer()?;
        let state = self.sync_clock(&signer, &wallet).await?;

        let size = match size {
            Some(size) => size,
            None => {
                let position = state
                    .position(coin)
                    .filter(|position| position.is_short())
                    .ok_or_else(|| AppError::NoOpenShort {
                        coin: coin.to_string(),
                        account: self.trading_account(&signer, &wallet),
                    })?;
                Size::new(position.szi.abs())
            }
        };
        let order = plan_close(
            &quote,
            size,
            self.config.trade.close_slippage_bps,
            &self.config.price_format,
        )?;
        info!(coin, %size, mid = %quote.mid, "Closing short");

        let mut credential = self.new_credential();
        let result = self.close_with(&signer, &wallet, &mut credential, order).await;
        credential.discard();

        result.map(|(order, statuses)| TradeReport {
            coin: coin.to_string(),
            delegate: credential.address(),
            order,
            statuses,
        })
    }

    async fn open_with(
        &self,
        signer: &ExchangeActionSigner,
        wallet: &WalletKeys,
        credential: &mut DelegateCredential,
        quote: &MarketQuote,
        leverage: u32,
        order: OrderRequest,
    ) -> AppResult<(OrderRequest, Vec<OrderStatus>)> {
        self.authorize_delegate(signer, wallet, credential).await?;

        let envelope = record_signing(
            "updateLeverage",
            signer
                .update_leverage(credential, quote.asset_index, self.config.trade.is_cross, leverage)
                .await,
        )?;
        self.submit(&envelope).await?;

        let envelope = record_signing(
            "order",
            signer.place_order(credential, order.clone()).await,
        )?;
        let response = self.submit(&envelope).await?;
        Ok((order, response.order_statuses()?))
    }

    async fn close_with(
        &self,
        signer: &ExchangeActionSigner,
        wallet: &WalletKeys,
        credential: &mut DelegateCredential,
        order: OrderRequest,
    ) -> AppResult<(OrderRequest, Vec<OrderStatus>)> {
        self.authorize_delegate(signer, wallet, credential).await?;

        let envelope = record_signing(
            "order",
            signer.place_order(credential, order.clone()).await,
        )?;
        let response = self.submit(&envelope).await?;
        Ok((order, response.order_statuses()?))
    }

    async fn authorize_delegate(
        &self,
        signer: &ExchangeActionSigner,
        wallet: &WalletKeys,
        credential: &mut DelegateCredential,
    ) -> AppResult<()> {
        let envelope = record_signing(
            "approveAgent",
            signer
                .approve_delegate(
                    wallet.signer(),
                    credential,
                    self.config.trade.delegate_label.clone(),
                )
                .await,
        )?;
        self.submit(&envelope).await?;
        credential.mark_authorized();
        info!(delegate = %credential.address(), "Delegate approved");
        Ok(())
    }

    async fn submit(&self, envelope: &SignedEnvelope) -> AppResult<ExchangeResponse> {
        let started = Instant::now();
        let result = self.client.post_action(envelope).await;
        Metrics::exchange_latency("exchange", started.elapsed().as_secs_f64() * 1000.0);

        let outcome = match &result {
            Ok(_) => "ok",
            Err(fundarb_client::ClientError::Rejected(_)) => "rejected",
            Err(_) => "error",
        };
        Metrics::exchange_request("exchange", outcome);
        Ok(result?)
    }

    fn action_signer(&self) -> AppResult<ExchangeActionSigner> {
        Ok(
            ExchangeActionSigner::new(self.config.is_mainnet, self.nonces.clone())
                .with_vault_address(self.config.vault_address()?),
        )
    }

    fn new_credential(&self) -> DelegateCredential {
        let credential = DelegateCredential::generate();
        match self.config.trade.delegate_max_actions {
            Some(max) => credential.with_max_actions(max),
            None => credential,
        }
    }

    fn load_wallet(&self) -> AppResult<WalletKeys> {
        let wallet = WalletKeys::load(self.config.key_source()?, self.config.user_address()?)?;
        debug!(wallet = %wallet.address(), "Primary wallet loaded");
        Ok(wallet)
    }

    async fn quote(&self, coin: &str) -> AppResult<MarketQuote> {
        let started = Instant::now();
        let meta = record_info(started, self.client.meta().await)?;
        let (asset_index, asset) = meta
            .asset(coin)
            .ok_or_else(|| AppError::MarketNotFound(coin.to_string()))?;

        let mids = self.mids().await?;
        let mid = mids
            .get(coin)
            .copied()
            .ok_or_else(|| AppError::MissingMid(coin.to_string()))?;

        Ok(MarketQuote {
            asset_index,
            sz_decimals: asset.sz_decimals,
            mid: Price::new(mid),
        })
    }

    fn trading_account(&self, signer: &ExchangeActionSigner, wallet: &WalletKeys) -> String {
        let account = signer.vault_address().unwrap_or_else(|| wallet.address());
        format!("{account:#x}")
    }

    /// Fetch the trading account and align nonces with the exchange clock.
    ///
    /// The trading account is the vault when one is configured, otherwise
    /// the wallet.
    async fn sync_clock(
        &self,
        signer: &ExchangeActionSigner,
        wallet: &WalletKeys,
    ) -> AppResult<ClearinghouseState> {
        let account = self.trading_account(signer, wallet);
        let state = self.account(Some(&account)).await?;
        if let Some(server_time) = state.time {
            signer.observe_server_time(server_time);
        }
        Ok(state)
    }
}
