//! HMAC-SHA256 query-string signing, Binance-futures convention: sign the
//! fully-assembled query string (including `timestamp`/`recvWindow`) and
//! append the resulting hex digest as a trailing `signature` parameter,
//! with the API key carried in a header rather than the query.

use hmac::{Hmac, Mac};
use sha2::Sha256;

pub const API_KEY_HEADER: &str = "X-MBX-APIKEY";

pub fn sign_query(secret: &str, query: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(query.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
