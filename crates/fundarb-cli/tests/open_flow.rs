//! Full open/close sequences against a scripted local exchange.

use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use fundarb_cli::{AppConfig, AppError, Application};
use fundarb_client::{ClientError, OrderStatus};
use rust_decimal_macros::dec;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const TEST_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const TEST_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

const META: &str = r#"{"universe":[{"name":"BTC","szDecimals":5,"maxLeverage":50},{"name":"ETH","szDecimals":4,"maxLeverage":50}]}"#;
const MIDS: &str = r#"{"BTC":"64000.0","ETH":"2000.0"}"#;
const META_AND_CTXS: &str = r#"[{"universe":[{"name":"BTC","szDecimals":5,"maxLeverage":50},{"name":"ETH","szDecimals":4,"maxLeverage":50}]},[{"funding":"0.0000125","markPx":"64000.0"},{"funding":"0.00005","markPx":"2000.0"}]]"#;
const VAULT: &str = "0x4242424242424242424242424242424242424242";

/// Bodies posted to `/exchange`, in order.
type Posted = Arc<Mutex<Vec<serde_json::Value>>>;

#[derive(Clone, Copy)]
enum Script {
    AcceptAll,
    RejectApproval,
    /// Order accepted at the request level, refused per order.
    OrderError,
    /// The ETH short is held by the vault, not the wallet.
    VaultShort,
}

struct MockExchange {
    url: String,
    posted: Posted,
    /// `user` of every clearinghouseState query.
    accounts: Arc<Mutex<Vec<String>>>,
}

async fn read_request(socket: &mut TcpStream) -> (String, String) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf).to_string();
        if let Some(pos) = text.find("\r\n\r\n") {
            let length = text[..pos]
                .lines()
                .find_map(|line| {
                    line.to_ascii_lowercase()
                        .strip_prefix("content-length:")
                        .map(|v| v.trim().parse::<usize>().unwrap())
                })
                .unwrap_or(0);
            if buf.len() >= pos + 4 + length {
                let request_line = text.lines().next().unwrap_or_default().to_string();
                return (request_line, text[pos + 4..pos + 4 + length].to_string());
            }
        }
    }
    (String::new(), String::new())
}

async fn spawn_exchange(script: Script) -> MockExchange {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let posted: Posted = Arc::new(Mutex::new(Vec::new()));
    let accounts = Arc::new(Mutex::new(Vec::new()));
    let log = posted.clone();
    let queried = accounts.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let (request_line, body) = read_request(&mut socket).await;
            let json: serde_json::Value = serde_json::from_str(&body).unwrap_or_default();

            let reply = if request_line.starts_with("POST /info") {
                match json["type"].as_str() {
                    Some("meta") => META.to_string(),
                    Some("allMids") => MIDS.to_string(),
                    Some("metaAndAssetCtxs") => META_AND_CTXS.to_string(),
                    _ => {
                        let user = json["user"].as_str().unwrap_or_default().to_string();
                        let holds_short = match script {
                            Script::VaultShort => user == VAULT,
                            _ => true,
                        };
                        queried.lock().unwrap().push(user);
                        let positions = if holds_short {
                            r#"[{"position":{"coin":"ETH","szi":"-0.05"},"type":"oneWay"}]"#
                        } else {
                            "[]"
                        };
                        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis();
                        format!(r#"{{"assetPositions":{positions},"time":{now}}}"#)
                    }
                }
            } else {
                let kind = json["action"]["type"].as_str().unwrap_or_default().to_string();
                log.lock().unwrap().push(json);
                match (script, kind.as_str()) {
                    (Script::RejectApproval, "approveAgent") => {
                        r#"{"status":"err","response":"Must deposit before performing actions."}"#.to_string()
                    }
                    (Script::OrderError, "order") => {
                        r#"{"status":"ok","response":{"type":"order","data":{"statuses":[{"error":"Insufficient margin to place order. asset=1"}]}}}"#.to_string()
                    }
                    (_, "order") => {
                        r#"{"status":"ok","response":{"type":"order","data":{"statuses":[{"resting":{"oid":7}}]}}}"#.to_string()
                    }
                    _ => r#"{"status":"ok","response":{"type":"default"}}"#.to_string(),
                }
            };

            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{reply}",
                reply.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    MockExchange {
        url: format!("http://{addr}"),
        posted,
        accounts,
    }
}

fn config_with(api_url: &str, key_env: &str, extra: &str) -> AppConfig {
    std::env::set_var(key_env, TEST_PRIVATE_KEY);
    AppConfig::from_toml(&format!(
        r#"
        is_mainnet = false
        api_url = "{api_url}"
        user_address = "{TEST_ADDRESS}"
        private_key_env = "{key_env}"
        {extra}

        [trade]
        leverage = 2
        "#
    ))
    .unwrap()
}

fn config(api_url: &str, key_env: &str) -> AppConfig {
    config_with(api_url, key_env, "")
}

#[tokio::test]
async fn test_open_short_posts_approve_leverage_order() {
    let MockExchange { url, posted, .. } = spawn_exchange(Script::AcceptAll).await;
    let app = Application::new(config(&url, "FUNDARB_TEST_KEY_OPEN")).unwrap();

    let report = app.open_short("ETH", dec!(100), None).await.unwrap();
    assert_eq!(report.order.limit_price, "1999.8");
    assert_eq!(report.order.size, "0.0500");
    assert_eq!(report.statuses, vec![OrderStatus::Resting { oid: 7 }]);

    let posted = posted.lock().unwrap();
    let kinds: Vec<&str> = posted
        .iter()
        .map(|body| body["action"]["type"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["approveAgent", "updateLeverage", "order"]);

    let approval = &posted[0]["action"];
    assert_eq!(approval["hyperliquidChain"], "Testnet");
    assert_eq!(
        approval["agentAddress"].as_str().unwrap(),
        format!("{:#x}", report.delegate)
    );

    let leverage = &posted[1]["action"];
    assert_eq!(leverage["asset"], 1);
    assert_eq!(leverage["leverage"], 2);
    assert_eq!(leverage["isCross"], false);

    let order = &posted[2]["action"]["orders"][0];
    assert_eq!(order["a"], 1);
    assert_eq!(order["b"], false);
    assert_eq!(order["r"], false);

    let nonces: Vec<u64> = posted.iter().map(|b| b["nonce"].as_u64().unwrap()).collect();
    assert!(nonces.windows(2).all(|w| w[1] > w[0]));
}

#[tokio::test]
async fn test_close_defaults_to_open_short_size() {
    let MockExchange {
        url,
        posted,
        accounts,
    } = spawn_exchange(Script::AcceptAll).await;
    let app = Application::new(config(&url, "FUNDARB_TEST_KEY_CLOSE")).unwrap();

    let report = app.close_short("ETH", None).await.unwrap();
    assert!(report.order.is_buy);
    assert!(report.order.reduce_only);
    assert_eq!(report.order.size, "0.0500");
    assert_eq!(report.order.limit_price, "2002");

    let posted = posted.lock().unwrap();
    assert_eq!(posted.len(), 2);
    assert_eq!(posted[1]["action"]["orders"][0]["r"], true);
    assert!(posted[1].get("vaultAddress").is_none());
    assert_eq!(
        *accounts.lock().unwrap(),
        vec![TEST_ADDRESS.to_lowercase()]
    );
}

#[tokio::test]
async fn test_rejected_approval_stops_flow() {
    let MockExchange { url, posted, .. } = spawn_exchange(Script::RejectApproval).await;
    let app = Application::new(config(&url, "FUNDARB_TEST_KEY_REJECT")).unwrap();

    let result = app.open_short("ETH", dec!(100), None).await;
    assert!(matches!(
        result,
        Err(AppError::Client(ClientError::Rejected(_)))
    ));
    // Nothing signed by the delegate was sent
    assert_eq!(posted.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_market() {
    let MockExchange { url, .. } = spawn_exchange(Script::AcceptAll).await;
    let app = Application::new(config(&url, "FUNDARB_TEST_KEY_UNKNOWN")).unwrap();

    let result = app.open_short("DOGE", dec!(100), None).await;
    assert!(matches!(result, Err(AppError::MarketNotFound(_))));
}

#[tokio::test]
async fn test_close_finds_vault_short() {
    let MockExchange {
        url,
        posted,
        accounts,
    } = spawn_exchange(Script::VaultShort).await;
    let vault = format!(r#"vault_address = "{VAULT}""#);
    let app = Application::new(config_with(&url, "FUNDARB_TEST_KEY_VAULT", &vault)).unwrap();

    let report = app.close_short("ETH", None).await.unwrap();
    assert_eq!(report.order.size, "0.0500");
    assert_eq!(*accounts.lock().unwrap(), vec![VAULT.to_string()]);

    let posted = posted.lock().unwrap();
    // Approval is user-signed and carries no vault; the order does
    assert!(posted[0].get("vaultAddress").is_none());
    assert_eq!(posted[1]["vaultAddress"], VAULT);
}

#[tokio::test]
async fn test_close_without_short_names_account() {
    let MockExchange { url, posted, .. } = spawn_exchange(Script::VaultShort).await;
    let app = Application::new(config(&url, "FUNDARB_TEST_KEY_NO_SHORT")).unwrap();

    let result = app.close_short("ETH", None).await;
    match result {
        Err(AppError::NoOpenShort { coin, account }) => {
            assert_eq!(coin, "ETH");
            assert_eq!(account, TEST_ADDRESS.to_lowercase());
        }
        other => panic!("expected NoOpenShort, got {other:?}"),
    }
    assert!(posted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_per_order_error_is_reported() {
    let MockExchange { url, .. } = spawn_exchange(Script::OrderError).await;
    let app = Application::new(config(&url, "FUNDARB_TEST_KEY_ORDER_ERR")).unwrap();

    let report = app.open_short("ETH", dec!(100), None).await.unwrap();
    assert_eq!(
        report.order_error(),
        Some("Insufficient margin to place order. asset=1")
    );
}

#[tokio::test]
async fn test_funding_ranked_and_truncated() {
    let MockExchange { url, .. } = spawn_exchange(Script::AcceptAll).await;
    let app = Application::new(config(&url, "FUNDARB_TEST_KEY_FUNDING")).unwrap();

    let rates = app.funding(1).await.unwrap();
    assert_eq!(rates.len(), 1);
    assert_eq!(rates[0].coin, "ETH");
    assert_eq!(rates[0].annualized_pct, dec!(43.8));
}

#[tokio::test]
async fn test_bridge_permit_signed_by_wallet() {
    let MockExchange { url, posted, .. } = spawn_exchange(Script::AcceptAll).await;
    let mut config = config(&url, "FUNDARB_TEST_KEY_BRIDGE");

    let testnet = Application::new(config.clone()).unwrap();
    assert!(matches!(
        testnet.bridge_permit(dec!(25), 0).await,
        Err(AppError::Config(_))
    ));

    config.is_mainnet = true;
    let app = Application::new(config).unwrap();
    let deposit = app.bridge_permit(dec!(25), 3).await.unwrap();
    assert_eq!(deposit.user, TEST_ADDRESS.to_lowercase());
    assert_eq!(deposit.usd, "25000000");
    assert!(deposit.signature.v == 27 || deposit.signature.v == 28);
    assert!(deposit.signature.r.chars().all(|c| c.is_ascii_digit()));

    // Signing only; nothing goes to the exchange
    assert!(posted.lock().unwrap().is_empty());
}
