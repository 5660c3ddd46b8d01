// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bank API client (cash and credit-card transaction listings).
//!
//! Every call is authenticated with the session's bearer token; obtaining a
//! valid token is the caller's job (see `auth::OAuthFlow::access_token`).
//! Non-2xx responses surface as [`BankError::Status`] carrying the status
//! code and the response body.

use chrono::NaiveDate;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

pub const CASH_TRANSACTIONS_PATH: &str = "gw/dbapi/banking/transactions/v2/";
pub const CREDIT_CARDS_PATH: &str = "gw/Dbapi/banking/creditCards/v1/";
pub const CREDIT_CARD_TRANSACTIONS_PATH: &str = "gw/Dbapi/banking/creditCardTransactions/v1";

/// Page size requested from the cash transaction listing.
pub const CASH_PAGE_LIMIT: usize = 100;

/// Upper bound on followed pages, in case `totalItems` never converges.
const MAX_PAGES: usize = 50;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, thiserror::Error)]
pub enum BankError {
    #[error("bank API GET {path} returned {status}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },

    #[error("bank API GET {path} failed: {message}")]
    Transport { path: String, message: String },

    #[error("bank API response was invalid: {0}")]
    InvalidResponse(String),
}

/// Cash account transaction as returned by the bank.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbCashTransaction {
    pub booking_date: String,
    #[serde(default)]
    pub counter_party_name: String,
    #[serde(default)]
    pub payment_reference: String,
    /// Bank-assigned, globally unique.
    pub id: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct DbAmount {
    pub amount: f64,
}

/// Credit card transaction. Carries no bank-assigned identifier.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbCreditTransaction {
    pub booking_date: String,
    #[serde(default)]
    pub reason_for_payment: String,
    pub amount_in_account_currency: DbAmount,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DbCreditCard {
    #[serde(rename = "technicalId")]
    pub technical_id: String,
    /// Masked PAN, e.g. `************1599`.
    #[serde(rename = "securePAN")]
    pub secure_pan: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CashTransactionsPage {
    #[serde(default)]
    transactions: Vec<DbCashTransaction>,
    #[serde(default)]
    total_items: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ItemsPage<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Clone)]
pub struct BankClient {
    base_url: Url,
    http: Client,
}

impl BankClient {
    /// `base_url` must end with `/` so relative paths join below it.
    pub fn new(base_url: &str, http: Client) -> Result<Self, url::ParseError> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            http,
        })
    }

    /// Cash transactions of `iban` booked on or after `booking_date_from`,
    /// newest first. Pages are followed until `totalItems` are collected.
    pub async fn list_cash_transactions(
        &self,
        bearer: &str,
        iban: &str,
        booking_date_from: NaiveDate,
    ) -> Result<Vec<DbCashTransaction>, BankError> {
        let from = booking_date_from.format(DATE_FORMAT).to_string();
        let limit = CASH_PAGE_LIMIT.to_string();
        let mut collected = Vec::new();
        // `totalItems` while more pages are expected.
        let mut outstanding = None;

        for _ in 0..MAX_PAGES {
            let offset = collected.len().to_string();
            let mut query = vec![
                ("limit", limit.as_str()),
                ("bookingDateFrom", from.as_str()),
                ("sortBy", "bookingDate[DESC]"),
                ("iban", iban),
            ];
            if !collected.is_empty() {
                query.push(("offset", offset.as_str()));
            }

            let page: CashTransactionsPage =
                self.get_json(CASH_TRANSACTIONS_PATH, &query, bearer).await?;
            let received = page.transactions.len();
            collected.extend(page.transactions);

            match page.total_items {
                Some(total) if received > 0 && collected.len() < total => {
                    debug!(collected = collected.len(), total, "Fetching next transactions page");
                    outstanding = Some(total);
                }
                _ => {
                    outstanding = None;
                    break;
                }
            }
        }

        if let Some(total) = outstanding {
            warn!(
                collected = collected.len(),
                total_items = total,
                max_pages = MAX_PAGES,
                "Page limit reached; returning a partial transaction listing"
            );
        }
        Ok(collected)
    }

    /// Credit cards attached to the authorized customer.
    pub async fn list_credit_cards(&self, bearer: &str) -> Result<Vec<DbCreditCard>, BankError> {
        let page: ItemsPage<DbCreditCard> = self.get_json(CREDIT_CARDS_PATH, &[], bearer).await?;
        Ok(page.items)
    }

    /// Transactions of the card identified by `technical_id` booked in
    /// `[booking_date_from, booking_date_to]`.
    pub async fn list_credit_card_transactions(
        &self,
        bearer: &str,
        technical_id: &str,
        booking_date_from: NaiveDate,
        booking_date_to: NaiveDate,
    ) -> Result<Vec<DbCreditTransaction>, BankError> {
        let from = booking_date_from.format(DATE_FORMAT).to_string();
        let to = booking_date_to.format(DATE_FORMAT).to_string();
        let query = [
            ("technicalId", technical_id),
            ("bookingDateTo", to.as_str()),
            ("bookingDateFrom", from.as_str()),
        ];
        let page: ItemsPage<DbCreditTransaction> = self
            .get_json(CREDIT_CARD_TRANSACTIONS_PATH, &query, bearer)
            .await?;
        Ok(page.items)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        bearer: &str,
    ) -> Result<T, BankError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| BankError::InvalidResponse(format!("bad request path {path}: {e}")))?;

        let response = self
            .http
            .get(url)
            .query(query)
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(|e| BankError::Transport {
                path: path.to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BankError::Status {
                path: path.to_string(),
                status,
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| BankError::InvalidResponse(format!("GET {path}: {e}")))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::providers::build_http_client;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) const CASH_TRANSACTIONS_RESPONSE: &str = r#"{"transactions":[{"originIban":"DE10010000000000006136","amount":-19.05,"paymentReference":"POS MIT PIN. Mein Drogeriemarkt, Leipziger Str.","counterPartyName":"Rossmann","transactionCode":"123","valueDate":"2018-04-23","counterPartyIban":"","paymentIdentification":"212+ZKLE 911/696682-X-ABC","mandateReference":"MX0355443","externalBankTransactionDomainCode":"D001","externalBankTransactionFamilyCode":"CCRD","externalBankTransactionSubFamilyCode":"CWDL","bookingDate":"2019-11-04","id":"_2FMRe0AhzLaZu14Cz-lol2H_DDY4z9yIOJKrDlDjHCSCjlJk4dfM_2MOWo6JSezeNJJz5Fm23hOEFccXR0AXmZFmyFv_dI6xHu-DADUYh-_ue-2e1let853sS4-glBM","e2eReference":"E2E - Reference","currencyCode":"EUR","creditorId":"DE0222200004544221"},{"originIban":"DE10010000000000006136","amount":-22.50,"paymentReference":"POS MIT PIN. Lebensmittelhandel, Kölner Str.","counterPartyName":"Rewe","transactionCode":"123","valueDate":"2019-11-05","counterPartyIban":"","paymentIdentification":"12345678","mandateReference":"MX0355443","externalBankTransactionDomainCode":"D001","externalBankTransactionFamilyCode":"CCRD","externalBankTransactionSubFamilyCode":"CWDL","bookingDate":"2019-11-05","id":"_2FMRelmnop13z-lol2H_DDY4z9yIOJKrlmnop12345677894dfM_2MOWo6JSezeNJJz5Fm23hOEFccXR0AXmZFmyFv_dI6xHu-DADUYh-_ue-2e1let853sS4-glBM","e2eReference":"E2E Reference","currencyCode":"EUR","creditorId":"DE0111100004544221"}]}"#;

    pub(crate) const CARD_LIST_RESPONSE: &str = r#"{  "totalItems": 1,  "items": [    {      "technicalId": "24842",      "embossedLine1": "DR HANS LUEDENSCHE",      "hasDebitFeatures": false,      "expiryDate": "10.2018",      "productName": "Deutsche Bank BusinessCard",      "securePAN": "************1599"    }  ]}"#;

    pub(crate) const CARD_TRANSACTIONS_RESPONSE: &str = r#"{"totalItems":1,"items":[{"bookingDate":"2017-09-02","valueDate":"2017-09-02","billingDate":"2017-09-28","reasonForPayment":"Marvel Comics Inc.","amountInForeignCurrency":{"amount":42.21,"currency":"EUR"},"amountInAccountCurrency":{"amount":42.21,"currency":"EUR"},"foreignFxRate":{"sourceCurrency":"EUR","targetCurrency":"EUR","rate":1}}]}"#;

    fn client(server: &MockServer) -> BankClient {
        BankClient::new(&format!("{}/", server.uri()), build_http_client().unwrap()).unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    #[test]
    fn parses_cash_fixture() {
        let page: CashTransactionsPage = serde_json::from_str(CASH_TRANSACTIONS_RESPONSE).unwrap();
        assert_eq!(page.transactions.len(), 2);
        let first = &page.transactions[0];
        assert_eq!(first.booking_date, "2019-11-04");
        assert_eq!(first.counter_party_name, "Rossmann");
        assert_eq!(first.amount, -19.05);
        assert!(first.id.starts_with("_2FMRe0Ahz"));
        assert_eq!(page.total_items, None);
    }

    #[tokio::test]
    async fn lists_cash_transactions_with_bearer_and_filters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gw/dbapi/banking/transactions/v2/"))
            .and(query_param("iban", "DE49500105178844289951"))
            .and(query_param("limit", "100"))
            .and(query_param("sortBy", "bookingDate[DESC]"))
            .and(query_param("bookingDateFrom", "2019-10-26"))
            .and(header("authorization", "Bearer ACCESS_TOKEN"))
            .respond_with(ResponseTemplate::new(200).set_body_string(CASH_TRANSACTIONS_RESPONSE))
            .expect(1)
            .mount(&server)
            .await;

        let transactions = client(&server)
            .list_cash_transactions("ACCESS_TOKEN", "DE49500105178844289951", date("2019-10-26"))
            .await
            .unwrap();
        assert_eq!(transactions.len(), 2);
        assert_eq!(transactions[1].counter_party_name, "Rewe");
    }

    #[tokio::test]
    async fn follows_cash_pages_until_total_items() {
        let server = MockServer::start().await;
        let tx = |id: &str| {
            json!({"bookingDate": "2019-11-04", "counterPartyName": "Shop", "paymentReference": "", "id": id, "amount": -1.0})
        };
        Mock::given(method("GET"))
            .and(path("/gw/dbapi/banking/transactions/v2/"))
            .and(query_param("offset", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "totalItems": 3, "offset": 2, "limit": 2, "transactions": [tx("c")]
            })))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gw/dbapi/banking/transactions/v2/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "totalItems": 3, "offset": 0, "limit": 2, "transactions": [tx("a"), tx("b")]
            })))
            .mount(&server)
            .await;

        let transactions = client(&server)
            .list_cash_transactions("t", "DE49500105178844289951", date("2019-11-01"))
            .await
            .unwrap();
        let ids: Vec<_> = transactions.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn stops_at_the_page_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gw/dbapi/banking/transactions/v2/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "totalItems": 10_000,
                "transactions": [{"bookingDate": "2019-11-04", "counterPartyName": "Shop", "paymentReference": "", "id": "x", "amount": -1.0}]
            })))
            .expect(MAX_PAGES as u64)
            .mount(&server)
            .await;

        let transactions = client(&server)
            .list_cash_transactions("t", "DE49500105178844289951", date("2019-11-01"))
            .await
            .unwrap();
        assert_eq!(transactions.len(), MAX_PAGES);
    }

    #[tokio::test]
    async fn non_success_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
            .mount(&server)
            .await;

        let err = client(&server)
            .list_credit_cards("stale")
            .await
            .unwrap_err();
        match err {
            BankError::Status { status, body, path } => {
                assert_eq!(status, 401);
                assert_eq!(body, "token expired");
                assert_eq!(path, CREDIT_CARDS_PATH);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_bank_is_transport_error() {
        let client = BankClient::new("http://127.0.0.1:1/", build_http_client().unwrap()).unwrap();
        let err = client.list_credit_cards("t").await.unwrap_err();
        assert!(matches!(err, BankError::Transport { .. }));
    }

    #[tokio::test]
    async fn lists_cards_and_card_transactions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gw/Dbapi/banking/creditCards/v1/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(CARD_LIST_RESPONSE))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gw/Dbapi/banking/creditCardTransactions/v1"))
            .and(query_param("technicalId", "24842"))
            .and(query_param("bookingDateFrom", "2017-08-24"))
            .and(query_param("bookingDateTo", "2017-09-03"))
            .respond_with(ResponseTemplate::new(200).set_body_string(CARD_TRANSACTIONS_RESPONSE))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let cards = client.list_credit_cards("t").await.unwrap();
        assert_eq!(
            cards,
            vec![DbCreditCard {
                technical_id: "24842".to_string(),
                secure_pan: "************1599".to_string(),
            }]
        );

        let transactions = client
            .list_credit_card_transactions("t", "24842", date("2017-08-24"), date("2017-09-03"))
            .await
            .unwrap();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].reason_for_payment, "Marvel Comics Inc.");
        assert_eq!(transactions[0].amount_in_account_currency.amount, 42.21);
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client(&server).list_credit_cards("t").await.unwrap_err();
        assert!(matches!(err, BankError::InvalidResponse(_)));
    }
}
