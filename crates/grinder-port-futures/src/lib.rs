//! grinder-port-futures
//!
//! Live `ExchangePort` adapter: async-capable `reqwest` over `rustls-tls`,
//! HMAC-SHA256 query-string signing in the Binance-futures convention
//! (signature appended to the query, API key in a header). Every call goes
//! through the shared pre-check gate chain and a rolling circuit breaker
//! before it touches the wire; `dry_run` skips the wire entirely.

mod sign;

use std::collections::BTreeMap;
use std::time::Duration;

use grinder_port::{
    pre_check, Ack, AmendOrder, CircuitBreaker, ExchangePort, PlaceOrder, PortConfig, PortError,
    PreCheckRequest,
};
use grinder_router::SymbolConstraints;
use grinder_types::{AccountSnapshot, OpenOrderSnap, OrderType, PositionSnap, Side, TimeInForce};

/// Per-symbol metadata the port needs beyond the router's constraints: how
/// many decimal digits the exchange expects in the wire price/qty strings.
#[derive(Debug, Clone, Copy)]
pub struct SymbolMeta {
    pub constraints: SymbolConstraints,
    pub price_scale_digits: u32,
    pub qty_scale_digits: u32,
}

#[derive(Debug, Clone)]
pub struct BinanceFuturesConfig {
    pub base_url: String,
    pub api_key: String,
    pub api_secret: String,
    pub recv_window_ms: i64,
    pub dry_run: bool,
    pub port: PortConfig,
}

pub struct BinanceFuturesPort {
    cfg: BinanceFuturesConfig,
    client: reqwest::blocking::Client,
    circuit_breaker: CircuitBreaker,
    symbols: BTreeMap<String, SymbolMeta>,
    orders_placed_this_run: u32,
}

/// Run a blocking closure safely whether or not we're inside a Tokio
/// runtime — `reqwest::blocking` panics if dropped from within one without
/// this.
fn blocking<F, T>(f: F) -> T
where
    F: FnOnce() -> T,
{
    match tokio::runtime::Handle::try_current() {
        Ok(_) => tokio::task::block_in_place(f),
        Err(_) => f(),
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl BinanceFuturesPort {
    pub fn new(cfg: BinanceFuturesConfig) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder().build()?;
        Ok(Self {
            circuit_breaker: CircuitBreaker::new(now_ms()),
            client,
            cfg,
            symbols: BTreeMap::new(),
            orders_placed_this_run: 0,
        })
    }

    pub fn set_symbol_meta(&mut self, symbol: impl Into<String>, meta: SymbolMeta) {
        self.symbols.insert(symbol.into(), meta);
    }

    fn symbol_meta(&self, symbol: &str) -> Result<&SymbolMeta, PortError> {
        self.symbols.get(symbol).ok_or(PortError::ConstraintViolation)
    }

    fn pre_check_order(&self, client_order_id: &str, symbol: &str, side: Side, price_ticks: i64, qty_steps: i64) -> Result<(), PortError> {
        let meta = self.symbol_meta(symbol)?;
        let req = PreCheckRequest {
            client_order_id,
            symbol,
            side,
            price_ticks,
            qty_steps,
            constraints: &meta.constraints,
            orders_placed_this_run: self.orders_placed_this_run,
            is_mainnet: !self.cfg.dry_run,
        };
        pre_check(&req, &self.cfg.port)
    }

    fn signed_query(&self, params: &[(&str, String)]) -> String {
        let mut query = String::new();
        for (k, v) in params {
            if !query.is_empty() {
                query.push('&');
            }
            query.push_str(k);
            query.push('=');
            query.push_str(v);
        }
        if !query.is_empty() {
            query.push('&');
        }
        query.push_str(&format!("timestamp={}&recvWindow={}", now_ms(), self.cfg.recv_window_ms));
        let signature = sign::sign_query(&self.cfg.api_secret, &query);
        format!("{query}&signature={signature}")
    }

    /// One HTTP attempt. Returns `Ok` with the parsed JSON body, or `Err`
    /// carrying whether the failure is worth retrying (5xx/429) alongside
    /// the typed error to surface if retries are exhausted.
    fn send_once(
        &self,
        method: reqwest::Method,
        path: &str,
        query: &str,
        deadline_ms: u64,
    ) -> Result<serde_json::Value, (bool, PortError)> {
        let url = format!("{}{}?{}", self.cfg.base_url, path, query);
        let client = self.client.clone();
        let result = blocking(move || {
            client
                .request(method, url)
                .header(sign::API_KEY_HEADER, &self.cfg.api_key)
                .timeout(Duration::from_millis(deadline_ms))
                .send()
        });

        let resp = match result {
            Ok(resp) => resp,
            Err(e) => return Err((e.is_timeout() || e.is_connect(), if e.is_timeout() { PortError::Timeout } else { PortError::Transport })),
        };

        let status = resp.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err((true, PortError::Transport));
        }
        if !status.is_success() {
            return Err((false, PortError::Transport));
        }
        resp.json::<serde_json::Value>().map_err(|_| (false, PortError::Transport))
    }

    fn execute(&mut self, method: reqwest::Method, path: &str, params: &[(&str, String)], deadline_ms: u64, max_attempts: u32) -> Result<serde_json::Value, PortError> {
        if self.circuit_breaker.is_open(now_ms(), &self.cfg.port) {
            return Err(PortError::CircuitOpen);
        }

        let query = self.signed_query(params);
        let mut last_err = PortError::Transport;
        for attempt in 1..=max_attempts.max(1) {
            match self.send_once(method.clone(), path, &query, deadline_ms) {
                Ok(value) => {
                    self.circuit_breaker.record(now_ms(), &self.cfg.port, false);
                    return Ok(value);
                }
                Err((retryable, err)) => {
                    self.circuit_breaker.record(now_ms(), &self.cfg.port, retryable);
                    last_err = err;
                    if !retryable || attempt == max_attempts {
                        break;
                    }
                    let delay = grinder_port::backoff_delay_ms(attempt, 200, 5_000, attempt as u64);
                    std::thread::sleep(Duration::from_millis(delay));
                }
            }
        }
        Err(last_err)
    }
}

fn dry_run_ack(client_order_id: &str) -> Ack {
    Ack { client_order_id: client_order_id.to_string(), broker_order_id: client_order_id.to_string(), ts_ms: now_ms() }
}

impl ExchangePort for BinanceFuturesPort {
    fn place(&mut self, order: &PlaceOrder) -> Result<Ack, PortError> {
        self.pre_check_order(&order.client_order_id, &order.symbol, order.side, order.price_ticks, order.qty_steps)?;

        if self.cfg.dry_run {
            self.orders_placed_this_run += 1;
            return Ok(dry_run_ack(&order.client_order_id));
        }

        let meta = *self.symbol_meta(&order.symbol)?;
        let side_str = match order.side {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        };
        let type_str = match order.order_type {
            OrderType::Limit => "LIMIT",
            OrderType::Market => "MARKET",
        };
        let tif_str = match order.tif {
            TimeInForce::Gtc => "GTC",
            TimeInForce::Ioc => "IOC",
            TimeInForce::PostOnly => "GTX",
        };
        let price = grinder_types::render_decimal(order.price_ticks, meta.price_scale_digits);
        let qty = grinder_types::render_decimal(order.qty_steps, meta.qty_scale_digits);

        let params = [
            ("symbol", order.symbol.clone()),
            ("side", side_str.to_string()),
            ("type", type_str.to_string()),
            ("timeInForce", tif_str.to_string()),
            ("quantity", qty),
            ("price", price),
            ("reduceOnly", order.reduce_only.to_string()),
            ("newClientOrderId", order.client_order_id.clone()),
        ];
        let value = self.execute(reqwest::Method::POST, "/fapi/v1/order", &params, self.cfg.port.http_deadline_place_ms, self.cfg.port.http_max_attempts_place)?;
        self.orders_placed_this_run += 1;
        Ok(Ack {
            client_order_id: order.client_order_id.clone(),
            broker_order_id: value.get("orderId").map(|v| v.to_string()).unwrap_or_else(|| order.client_order_id.clone()),
            ts_ms: now_ms(),
        })
    }

    fn cancel(&mut self, client_order_id: &str) -> Result<Ack, PortError> {
        if self.cfg.dry_run {
            return Ok(dry_run_ack(client_order_id));
        }
        let params = [("origClientOrderId", client_order_id.to_string())];
        self.execute(reqwest::Method::DELETE, "/fapi/v1/order", &params, self.cfg.port.http_deadline_cancel_ms, self.cfg.port.http_max_attempts_cancel)?;
        Ok(dry_run_ack(client_order_id))
    }

    fn amend(&mut self, order: &AmendOrder) -> Result<Ack, PortError> {
        let meta = *self.symbol_meta(&order.symbol)?;
        if self.cfg.dry_run {
            return Ok(dry_run_ack(&order.client_order_id));
        }
        let price = grinder_types::render_decimal(order.price_ticks, meta.price_scale_digits);
        let qty = grinder_types::render_decimal(order.qty_steps, meta.qty_scale_digits);
        let params = [
            ("symbol", order.symbol.clone()),
            ("origClientOrderId", order.client_order_id.clone()),
            ("price", price),
            ("quantity", qty),
        ];
        self.execute(reqwest::Method::PUT, "/fapi/v1/order", &params, self.cfg.port.http_deadline_amend_ms, self.cfg.port.http_max_attempts_amend)?;
        Ok(dry_run_ack(&order.client_order_id))
    }

    fn fetch_open_orders(&mut self, symbol: &str) -> Result<Vec<OpenOrderSnap>, PortError> {
        if self.cfg.dry_run {
            return Ok(vec![]);
        }
        let params = [("symbol", symbol.to_string())];
        let value = self.execute(reqwest::Method::GET, "/fapi/v1/openOrders", &params, self.cfg.port.http_deadline_fetch_ms, self.cfg.port.http_max_attempts_fetch)?;
        let arr = value.as_array().cloned().unwrap_or_default();
        Ok(arr
            .into_iter()
            .filter_map(|o| {
                Some(OpenOrderSnap {
                    broker_order_id: o.get("orderId")?.to_string(),
                    client_order_id: o.get("clientOrderId").and_then(|v| v.as_str()).map(str::to_string),
                    symbol: symbol.to_string(),
                    side: if o.get("side")?.as_str()? == "BUY" { Side::Buy } else { Side::Sell },
                    price: o.get("price")?.as_str()?.to_string(),
                    qty: o.get("origQty")?.as_str()?.to_string(),
                    filled_qty: o.get("executedQty")?.as_str()?.to_string(),
                })
            })
            .collect())
    }

    fn fetch_positions(&mut self, symbol: &str) -> Result<Vec<PositionSnap>, PortError> {
        if self.cfg.dry_run {
            return Ok(vec![]);
        }
        let params = [("symbol", symbol.to_string())];
        let value = self.execute(reqwest::Method::GET, "/fapi/v2/positionRisk", &params, self.cfg.port.http_deadline_fetch_ms, self.cfg.port.http_max_attempts_fetch)?;
        let arr = value.as_array().cloned().unwrap_or_default();
        Ok(arr
            .into_iter()
            .filter_map(|p| {
                Some(PositionSnap {
                    symbol: symbol.to_string(),
                    qty: p.get("positionAmt")?.as_str()?.to_string(),
                    avg_entry_price: p.get("entryPrice")?.as_str()?.to_string(),
                    unrealized_pnl: p.get("unRealizedProfit")?.as_str()?.to_string(),
                })
            })
            .collect())
    }

    fn fetch_account_snapshot(&mut self) -> Result<AccountSnapshot, PortError> {
        if self.cfg.dry_run {
            return Ok(AccountSnapshot { ts_ms: now_ms(), equity: "0".to_string(), available_balance: "0".to_string(), positions: vec![], open_orders: vec![] });
        }
        let value = self.execute(reqwest::Method::GET, "/fapi/v2/account", &[], self.cfg.port.http_deadline_fetch_ms, self.cfg.port.http_max_attempts_fetch)?;
        let equity = value.get("totalMarginBalance").and_then(|v| v.as_str()).unwrap_or("0").to_string();
        let available = value.get("availableBalance").and_then(|v| v.as_str()).unwrap_or("0").to_string();
        Ok(AccountSnapshot { ts_ms: now_ms(), equity, available_balance: available, positions: vec![], open_orders: vec![] })
    }
}
