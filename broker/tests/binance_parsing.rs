//! Tests for Binance API response parsing, error classification and the
//! venue adapter. No live connection needed.

#[cfg(feature = "binance")]
mod binance_tests {
    use freqkeeper::Asset;
    use freqkeeper_broker::binance::BinanceVenue;
    use freqkeeper_broker::binance::auth;
    use freqkeeper_broker::binance::client::{BinanceClient, classify_error};
    use freqkeeper_broker::binance::types::{AccountInfo, DustTransferResponse, OrderResponse};
    use freqkeeper_broker::{BrokerError, MarketSell, OrderState, Venue};
    use mockito::Matcher;
    use rust_decimal_macros::dec;

    fn venue(server: &mockito::Server) -> BinanceVenue {
        let client = BinanceClient::new("test-key", "test-secret", true)
            .unwrap()
            .with_base_url(&server.url());
        BinanceVenue::from_client(client)
    }

    // ========================================================================
    // HMAC-SHA256 signing
    // ========================================================================

    #[test]
    fn sign_binance_docs_example() {
        // Official Binance API documentation example
        let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC\
                     &quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
        let secret = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";
        assert_eq!(
            auth::sign(query, secret),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn sign_different_keys_differ() {
        let a = auth::sign("foo=bar", "key1");
        let b = auth::sign("foo=bar", "key2");
        assert_ne!(a, b, "different keys must produce different signatures");
        assert_eq!(a.len(), 64, "SHA256 hex is always 64 chars");
    }

    // ========================================================================
    // Response parsing
    // ========================================================================

    #[test]
    fn parse_account_info_extra_fields_ignored() {
        let json = r#"{
            "makerCommission": 15,
            "balances": [
                { "asset": "BTC", "free": "1.00000000", "locked": "0.50000000" }
            ],
            "canTrade": true,
            "permissions": ["SPOT"]
        }"#;

        let info: AccountInfo = serde_json::from_str(json).unwrap();
        assert!(info.can_trade);
        assert_eq!(info.balances[0].free, "1.00000000");
    }

    #[test]
    fn parse_order_response_without_quote_qty() {
        let json = r#"{
            "symbol": "ETHBTC",
            "orderId": 123456,
            "status": "NEW",
            "executedQty": "0.00000000"
        }"#;

        let resp: OrderResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.status, "NEW");
        assert_eq!(resp.cummulative_quote_qty, "");
    }

    #[test]
    fn parse_dust_transfer() {
        let json = r#"{
            "totalServiceCharge": "0.02102542",
            "totalTransfered": "1.05127099",
            "transferResult": [
                {
                    "amount": "0.03000000",
                    "fromAsset": "ETH",
                    "operateTime": 1563368549307,
                    "serviceChargeAmount": "0.00500000",
                    "tranId": 2970932918,
                    "transferedAmount": "0.25000000"
                }
            ]
        }"#;

        let resp: DustTransferResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.transfer_result.len(), 1);
        assert_eq!(resp.transfer_result[0].from_asset, "ETH");
        assert_eq!(resp.total_transfered, "1.05127099");
    }

    #[test]
    fn reject_empty_json() {
        assert!(serde_json::from_str::<AccountInfo>("{}").is_err());
        assert!(serde_json::from_str::<OrderResponse>("{}").is_err());
    }

    // ========================================================================
    // Error classification
    // ========================================================================

    #[test]
    fn lot_size_is_below_minimum() {
        let body = r#"{"code":-1013,"msg":"Filter failure: LOT_SIZE"}"#;
        assert!(matches!(
            classify_error(400, body, "order"),
            BrokerError::BelowMinimum(_)
        ));
    }

    #[test]
    fn notional_is_below_minimum() {
        let body = r#"{"code":-1013,"msg":"Filter failure: NOTIONAL"}"#;
        assert!(matches!(
            classify_error(400, body, "order"),
            BrokerError::BelowMinimum(_)
        ));
    }

    #[test]
    fn bad_key_is_auth() {
        let body = r#"{"code":-2015,"msg":"Invalid API-key, IP, or permissions for action."}"#;
        let err = classify_error(401, body, "account");
        assert!(matches!(err, BrokerError::Auth(_)));
        assert!(err.is_venue_wide());
    }

    #[test]
    fn rate_limit_status() {
        assert!(matches!(classify_error(429, "", "order"), BrokerError::RateLimit));
        assert!(matches!(classify_error(418, "", "order"), BrokerError::RateLimit));
    }

    #[test]
    fn server_error_is_connection() {
        assert!(matches!(
            classify_error(503, "Service Unavailable", "order"),
            BrokerError::Connection(_)
        ));
    }

    #[test]
    fn other_rejection_is_order() {
        let body = r#"{"code":-2010,"msg":"Account has insufficient balance for requested action."}"#;
        assert!(matches!(
            classify_error(400, body, "order"),
            BrokerError::Order(_)
        ));
    }

    // ========================================================================
    // Venue adapter over HTTP
    // ========================================================================

    #[test]
    fn balances_from_account() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/api/v3/account")
            .match_query(Matcher::Regex("timestamp=\\d+&signature=[0-9a-f]{64}".into()))
            .match_header("X-MBX-APIKEY", "test-key")
            .with_status(200)
            .with_body(
                r#"{"balances":[
                    {"asset":"BTC","free":"0.50000000","locked":"0.00000000"},
                    {"asset":"ETH","free":"2.00000000","locked":"1.00000000"}
                ],"canTrade":true}"#,
            )
            .create();

        let balances = venue(&server).balances().unwrap();
        mock.assert();
        assert_eq!(balances.get(&Asset::new("BTC")), Some(dec!(0.5)));
        assert_eq!(balances.get(&Asset::new("ETH")), Some(dec!(2)));
    }

    #[test]
    fn prices_skip_delisted_pairs() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/api/v3/ticker/price")
            .with_status(200)
            .with_body(
                r#"[{"symbol":"ETHBTC","price":"0.05000000"},
                    {"symbol":"OLDBTC","price":"0.00000000"}]"#,
            )
            .create();

        let prices = venue(&server).prices().unwrap();
        assert_eq!(prices.get("ETHBTC"), Some(dec!(0.05)));
        assert_eq!(prices.get("OLDBTC"), None);
    }

    #[test]
    fn market_sell_posts_signed_form() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/api/v3/order")
            .match_body(Matcher::Regex(
                "^symbol=ETHBTC&side=SELL&type=MARKET&quantity=1.2345&".into(),
            ))
            .with_status(200)
            .with_body(
                r#"{"symbol":"ETHBTC","orderId":28,"status":"FILLED",
                    "executedQty":"1.23450000","cummulativeQuoteQty":"0.06172500"}"#,
            )
            .create();

        let fill = venue(&server)
            .market_sell(&MarketSell {
                base: Asset::new("ETH"),
                quote: Asset::new("BTC"),
                quantity: dec!(1.2345),
            })
            .unwrap();

        mock.assert();
        assert_eq!(fill.status, OrderState::Filled);
        assert_eq!(fill.executed_qty, dec!(1.2345));
        assert_eq!(fill.quote_qty, dec!(0.061725));
    }

    #[test]
    fn market_sell_lot_size_rejection() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/api/v3/order")
            .with_status(400)
            .with_body(r#"{"code":-1013,"msg":"Filter failure: LOT_SIZE"}"#)
            .create();

        let err = venue(&server)
            .market_sell(&MarketSell {
                base: Asset::new("ETH"),
                quote: Asset::new("BTC"),
                quantity: dec!(0.0001),
            })
            .unwrap_err();
        assert!(matches!(err, BrokerError::BelowMinimum(_)));
    }

    #[test]
    fn dust_batch_sends_every_asset() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/sapi/v1/asset/dust")
            .match_body(Matcher::Regex("^asset=ADA&asset=ETH&timestamp=".into()))
            .with_status(200)
            .with_body(
                r#"{"totalServiceCharge":"0.0001","totalTransfered":"0.0040",
                    "transferResult":[{"fromAsset":"ETH","amount":"0.001","transferedAmount":"0.004"}]}"#,
            )
            .create();

        let result = venue(&server)
            .convert_dust(&[Asset::new("ADA"), Asset::new("ETH")])
            .unwrap();

        mock.assert();
        assert_eq!(result.converted, vec![Asset::new("ETH")]);
        assert_eq!(result.total_received, dec!(0.004));
    }

    #[test]
    fn open_orders_and_cancel() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/api/v3/openOrders")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"[{"symbol":"ETHBTC","orderId":7,"clientOrderId":"abc","side":"BUY","price":"0.04"}]"#,
            )
            .create();
        let cancel = server
            .mock("DELETE", "/api/v3/order")
            .match_query(Matcher::Regex("^symbol=ETHBTC&orderId=7&".into()))
            .with_status(200)
            .with_body(r#"{"symbol":"ETHBTC","orderId":7,"status":"CANCELED"}"#)
            .create();

        let venue = venue(&server);
        let orders = venue.open_orders().unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].client_order_id, "abc");

        venue.cancel_order(&orders[0]).unwrap();
        cancel.assert();
    }
}
