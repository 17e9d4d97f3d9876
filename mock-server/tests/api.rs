use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::app;
use tower::ServiceExt;

const AUTH: &str = "Basic bWluZ2xlOnNlY3JldA==";

async fn body_text(response: axum::response::Response) -> String {
    let bytes: bytes::Bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn xml_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/xml")
        .header(http::header::AUTHORIZATION, AUTH)
        .header(http::header::HOST, "mingle.test")
        .body(body.to_string())
        .unwrap()
}

fn get_request(uri: &str) -> Request<String> {
    xml_request("GET", uri, "")
}

const NEW_CARD: &str = "<card><name>Walk dog</name><description>daily</description><card_type><name>Story</name></card_type></card>";

// --- auth ---

#[tokio::test]
async fn missing_authorization_is_rejected() {
    let resp = app()
        .oneshot(Request::builder().uri("/cards/1.xml").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// --- create ---

#[tokio::test]
async fn create_card_returns_201_with_location() {
    let resp = app()
        .oneshot(xml_request("POST", "/cards.xml", NEW_CARD))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    let location = resp.headers().get(http::header::LOCATION).unwrap();
    assert_eq!(location, "http://mingle.test/cards/1.xml");
}

#[tokio::test]
async fn create_card_without_name_returns_422() {
    let resp = app()
        .oneshot(xml_request(
            "POST",
            "/cards.xml",
            "<card><name></name><card_type><name>Story</name></card_type></card>",
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn create_card_malformed_xml_returns_422() {
    let resp = app()
        .oneshot(xml_request("POST", "/cards.xml", "<card><name>oops</card>"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// --- get ---

#[tokio::test]
async fn get_card_not_found() {
    let resp = app().oneshot(get_request("/cards/1.xml")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_card_without_extension_not_found() {
    let resp = app().oneshot(get_request("/cards/1")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- update ---

#[tokio::test]
async fn update_card_not_found() {
    let resp = app()
        .oneshot(xml_request("PUT", "/cards/5.xml", NEW_CARD))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- query ---

#[tokio::test]
async fn query_without_cards_is_empty() {
    let resp = app()
        .oneshot(get_request("/cards/execute_mql.xml?mql=SELECT+name"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_text(resp).await, "<results type=\"array\"></results>");
}

#[tokio::test]
async fn query_with_bad_mql_returns_422() {
    let resp = app()
        .oneshot(get_request("/cards/execute_mql.xml?mql=SELEKT+name"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_text(resp).await.contains("<error>"));
}

#[tokio::test]
async fn query_without_mql_returns_400() {
    let resp = app()
        .oneshot(get_request("/cards/execute_mql.xml"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- full lifecycle ---

#[tokio::test]
async fn card_lifecycle() {
    use tower::Service;

    let mut app = app().into_service();

    // create
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(xml_request("POST", "/cards.xml", NEW_CARD))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    // get
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get_request("/cards/1.xml"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_text(resp).await;
    assert!(body.contains("<name>Walk dog</name>"), "{body}");
    assert!(body.contains("<number>1</number>"), "{body}");
    assert!(body.contains("<version>1</version>"), "{body}");

    // update bumps the version
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(xml_request(
            "PUT",
            "/cards/1.xml",
            "<card><name>Walk cat</name><description>daily</description><card_type><name>Story</name></card_type><number>1</number></card>",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_text(resp).await;
    assert!(body.contains("<name>Walk cat</name>"), "{body}");
    assert!(body.contains("<version>2</version>"), "{body}");

    // old version is gone, current one is served
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get_request("/cards/1.xml?version=1"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get_request("/cards/1.xml?version=2"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // query
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get_request(
            "/cards/execute_mql.xml?mql=SELECT+number%2C+name+WHERE+type+%3D+Story",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        body_text(resp).await,
        "<results type=\"array\"><result><number>1</number><name>Walk cat</name></result></results>"
    );
}
