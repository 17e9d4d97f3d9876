//! In-memory stand-in for the Mingle card endpoints.
//!
//! Serves `POST /cards.xml`, `GET|PUT /cards/{number}.xml` and
//! `GET /cards/execute_mql.xml?mql=…` with XML bodies. Every request must
//! carry a basic `Authorization` header. The MQL support covers
//! `SELECT col, … [WHERE col = value]` over the built-in card columns.

use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use quick_xml::escape::escape;
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardType {
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename = "card")]
pub struct Card {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub card_type: CardType,
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub number: u64,
    #[serde(default)]
    pub version: u64,
}

impl Card {
    fn column(&self, column: &str) -> Option<String> {
        match column {
            "name" => Some(self.name.clone()),
            "description" => Some(self.description.clone()),
            "type" | "card_type" => Some(self.card_type.name.clone()),
            "id" => Some(self.id.to_string()),
            "number" => Some(self.number.to_string()),
            "version" => Some(self.version.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct Store {
    cards: BTreeMap<u64, Card>,
    next_number: u64,
}

pub type Db = Arc<RwLock<Store>>;

#[derive(Deserialize)]
struct ResourceParams {
    mql: Option<String>,
    version: Option<u64>,
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    Router::new()
        .route("/cards.xml", post(create_card))
        .route("/cards/{file}", get(get_resource).put(update_card))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn xml(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, "application/xml")], body).into_response()
}

fn authorized(headers: &HeaderMap) -> Result<(), Response> {
    let ok = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("Basic "));
    if ok {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "Incorrect username or password.").into_response())
    }
}

fn card_number(file: &str) -> Option<u64> {
    file.strip_suffix(".xml")?.parse().ok()
}

fn render_card(card: &Card) -> Response {
    match quick_xml::se::to_string(card) {
        Ok(body) => xml(StatusCode::OK, body),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn create_card(State(db): State<Db>, headers: HeaderMap, body: String) -> Response {
    if let Err(denied) = authorized(&headers) {
        return denied;
    }
    let input: Card = match quick_xml::de::from_str(&body) {
        Ok(card) => card,
        Err(e) => return (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response(),
    };
    if input.name.trim().is_empty() {
        return (StatusCode::UNPROCESSABLE_ENTITY, "Name can't be blank").into_response();
    }

    let mut store = db.write().await;
    store.next_number += 1;
    let number = store.next_number;
    let card = Card {
        id: 1000 + number,
        number,
        version: 1,
        ..input
    };
    info!(number, name = %card.name, "card created");
    store.cards.insert(number, card);

    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    let location = format!("http://{host}/cards/{number}.xml");
    (StatusCode::CREATED, [(header::LOCATION, location)]).into_response()
}

async fn get_resource(
    State(db): State<Db>,
    Path(file): Path<String>,
    headers: HeaderMap,
    Query(params): Query<ResourceParams>,
) -> Response {
    if let Err(denied) = authorized(&headers) {
        return denied;
    }
    if file == "execute_mql.xml" {
        return match params.mql {
            Some(mql) => execute_mql(&db, &mql).await,
            None => (StatusCode::BAD_REQUEST, "mql parameter is required").into_response(),
        };
    }

    let Some(number) = card_number(&file) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let store = db.read().await;
    match store.cards.get(&number) {
        Some(card) => match params.version {
            Some(version) if version != card.version => StatusCode::NOT_FOUND.into_response(),
            _ => render_card(card),
        },
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn update_card(
    State(db): State<Db>,
    Path(file): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Response {
    if let Err(denied) = authorized(&headers) {
        return denied;
    }
    let Some(number) = card_number(&file) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let input: Card = match quick_xml::de::from_str(&body) {
        Ok(card) => card,
        Err(e) => return (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response(),
    };

    let mut store = db.write().await;
    let Some(card) = store.cards.get_mut(&number) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    card.name = input.name;
    card.description = input.description;
    if !input.card_type.name.is_empty() {
        card.card_type = input.card_type;
    }
    card.version += 1;
    debug!(number, version = card.version, "card updated");
    render_card(card)
}

async fn execute_mql(db: &Db, mql: &str) -> Response {
    let query = match Mql::parse(mql) {
        Ok(query) => query,
        Err(message) => {
            return xml(
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("<errors><error>{}</error></errors>", escape(message.as_str())),
            )
        }
    };

    let store = db.read().await;
    let mut body = String::from("<results type=\"array\">");
    for card in store.cards.values().filter(|card| query.matches(card)) {
        body.push_str("<result>");
        for column in &query.columns {
            let value = card.column(column).unwrap_or_default();
            body.push_str(&format!("<{column}>{}</{column}>", escape(value.as_str())));
        }
        body.push_str("</result>");
    }
    body.push_str("</results>");
    xml(StatusCode::OK, body)
}

/// `SELECT a, b [WHERE col = value]`, case-insensitive keywords.
#[derive(Debug, PartialEq, Eq)]
pub struct Mql {
    pub columns: Vec<String>,
    pub filter: Option<(String, String)>,
}

impl Mql {
    pub fn parse(mql: &str) -> Result<Self, String> {
        let trimmed = mql.trim();
        let upper = trimmed.to_ascii_uppercase();
        if !upper.starts_with("SELECT ") {
            return Err(format!("Invalid MQL: expected SELECT in `{trimmed}`"));
        }

        let (select, filter) = match upper.find(" WHERE ") {
            Some(at) => (&trimmed["SELECT ".len()..at], Some(&trimmed[at + " WHERE ".len()..])),
            None => (&trimmed["SELECT ".len()..], None),
        };

        let columns = select
            .split(',')
            .map(|c| c.trim().trim_matches('\'').to_ascii_lowercase())
            .collect::<Vec<_>>();
        if let Some(unknown) = columns.iter().find(|c| Card::default().column(c).is_none()) {
            return Err(format!("Card property '{unknown}' does not exist"));
        }

        let filter = match filter {
            None => None,
            Some(clause) => {
                let (column, value) = clause
                    .split_once('=')
                    .ok_or_else(|| format!("Invalid MQL: cannot parse condition `{clause}`"))?;
                let column = column.trim().to_ascii_lowercase();
                if Card::default().column(&column).is_none() {
                    return Err(format!("Card property '{column}' does not exist"));
                }
                Some((column, value.trim().trim_matches('\'').to_string()))
            }
        };

        Ok(Self { columns, filter })
    }

    fn matches(&self, card: &Card) -> bool {
        match &self.filter {
            None => true,
            Some((column, value)) => card
                .column(column)
                .is_some_and(|actual| actual.eq_ignore_ascii_case(value)),
        }
    }
}
